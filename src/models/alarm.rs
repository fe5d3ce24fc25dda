//! Alarm entity and its invariants.
//!
//! Records are persisted as elements of a JSON array (one array per schedule
//! slot). `scheduled_for` is only stamped on records returned by a check and
//! `executed_at` only on records that live in past storage.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{AlarmError, AlarmResult};

use super::Recurrence;

pub const MAX_CONTEXT_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub id: String,
    pub context: String,
    pub created_at: DateTime<Local>,
    pub recurrence: Recurrence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Local>>,
}

impl AlarmRecord {
    pub fn new(context: impl Into<String>, recurrence: Recurrence, now: DateTime<Local>) -> Self {
        Self {
            id: generate_id(recurrence, now),
            context: context.into(),
            created_at: now,
            recurrence,
            expires_at: None,
            scheduled_for: None,
            executed_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: Option<DateTime<Local>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn with_scheduled_for(mut self, at: DateTime<Local>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn with_executed_at(mut self, at: DateTime<Local>) -> Self {
        self.executed_at = Some(at);
        self
    }

    /// Check entity invariants against the given instant.
    pub fn validate(&self, now: DateTime<Local>) -> AlarmResult<()> {
        if self.id.trim().is_empty() {
            return Err(AlarmError::InvalidAlarm("id is required".into()));
        }

        if self.context.trim().is_empty() {
            return Err(AlarmError::InvalidAlarm("context is required".into()));
        }

        if self.context.chars().count() > MAX_CONTEXT_CHARS {
            return Err(AlarmError::InvalidAlarm(format!(
                "context too long (max {MAX_CONTEXT_CHARS} characters)"
            )));
        }

        // The Unix epoch is what an unset timestamp deserializes to.
        if self.created_at.timestamp() <= 0 {
            return Err(AlarmError::InvalidAlarm("created_at is required".into()));
        }

        if let Some(expires_at) = self.expires_at {
            if !self.recurrence.is_recurring() {
                return Err(AlarmError::InvalidAlarm(
                    "expires_at is not allowed for one-time alarms".into(),
                ));
            }
            if expires_at <= now {
                return Err(AlarmError::InvalidAlarm(
                    "expires_at must be in the future".into(),
                ));
            }
        }

        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        self.expires_at.map_or(false, |expires_at| now > expires_at)
    }

    /// Firing eligibility is gated by expiry only; duplicate suppression
    /// belongs to the store.
    pub fn should_fire(&self, now: DateTime<Local>) -> bool {
        !self.is_expired(now)
    }

    /// A slot that lands on or after `expires_at` is this alarm's last. The
    /// check that visits a slot always runs some seconds into its minute.
    pub fn expires_by_slot(&self, slot: DateTime<Local>) -> bool {
        !self.should_fire(slot) || self.expires_at == Some(slot)
    }
}

impl PartialEq for AlarmRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AlarmRecord {}

impl Hash for AlarmRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// `alarm_<kind>_<unix seconds>_<8 hex chars>`
fn generate_id(recurrence: Recurrence, now: DateTime<Local>) -> String {
    let suffix: [u8; 4] = rand::random();
    let suffix: String = suffix.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("alarm_{}_{}_{}", recurrence, now.timestamp(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 11, 21, 14, 30, 0).single().unwrap()
    }

    #[test]
    fn new_record_has_prefixed_unique_id() {
        let first = AlarmRecord::new("Review PR", Recurrence::Once, now());
        let second = AlarmRecord::new("Review PR", Recurrence::Once, now());

        assert!(first.id.starts_with("alarm_once_"));
        assert_eq!(first.id.rsplit('_').next().unwrap().len(), 8);
        assert_ne!(first.id, second.id);
        assert_eq!(first.created_at, now());
    }

    #[test]
    fn validate_accepts_well_formed_records() {
        let once = AlarmRecord::new("Valid context", Recurrence::Once, now());
        assert!(once.validate(now()).is_ok());

        let daily = AlarmRecord::new("Valid recurring", Recurrence::Daily, now())
            .with_expiry(Some(now() + Duration::days(1)));
        assert!(daily.validate(now()).is_ok());
    }

    #[test]
    fn validate_rejects_broken_invariants() {
        let base = AlarmRecord::new("context", Recurrence::Daily, now());

        let mut missing_id = base.clone();
        missing_id.id.clear();

        let mut missing_context = base.clone();
        missing_context.context = "   ".into();

        let mut long_context = base.clone();
        long_context.context = "a".repeat(MAX_CONTEXT_CHARS + 1);

        let mut unset_created = base.clone();
        unset_created.created_at = Local.timestamp_opt(0, 0).single().unwrap();

        let once_with_expiry = AlarmRecord::new("context", Recurrence::Once, now())
            .with_expiry(Some(now() + Duration::days(1)));

        let expired_already = base.clone().with_expiry(Some(now() - Duration::days(1)));
        let expires_now = base.with_expiry(Some(now()));

        for record in [
            missing_id,
            missing_context,
            long_context,
            unset_created,
            once_with_expiry,
            expired_already,
            expires_now,
        ] {
            let err = record.validate(now()).unwrap_err();
            assert!(matches!(err, AlarmError::InvalidAlarm(_)), "{err}");
        }
    }

    #[test]
    fn context_limit_counts_characters() {
        let mut record = AlarmRecord::new("x", Recurrence::Once, now());
        record.context = "é".repeat(MAX_CONTEXT_CHARS);
        assert!(record.validate(now()).is_ok());
    }

    #[test]
    fn expiry_is_strictly_after() {
        let expires_at = now() + Duration::hours(1);
        let record = AlarmRecord::new("x", Recurrence::Weekly, now()).with_expiry(Some(expires_at));

        assert!(!record.is_expired(expires_at));
        assert!(record.should_fire(expires_at));
        assert!(record.is_expired(expires_at + Duration::minutes(1)));
        assert!(!record.should_fire(expires_at + Duration::minutes(1)));

        let open_ended = AlarmRecord::new("x", Recurrence::Weekly, now());
        assert!(!open_ended.is_expired(now() + Duration::days(3650)));
    }

    #[test]
    fn slot_on_expiry_is_the_last_one() {
        let expires_at = now() + Duration::days(1);
        let record = AlarmRecord::new("x", Recurrence::Daily, now()).with_expiry(Some(expires_at));

        assert!(!record.expires_by_slot(now()));
        assert!(!record.expires_by_slot(expires_at - Duration::minutes(1)));
        assert!(record.expires_by_slot(expires_at));
        assert!(record.expires_by_slot(expires_at + Duration::days(1)));
        assert!(!AlarmRecord::new("x", Recurrence::Daily, now()).expires_by_slot(expires_at));
    }

    #[test]
    fn equality_is_by_id() {
        let record = AlarmRecord::new("x", Recurrence::Daily, now());
        let mut stamped = record.clone().with_scheduled_for(now());
        stamped.context = "changed".into();
        assert_eq!(record, stamped);
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let record = AlarmRecord::new("x", Recurrence::Once, now());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("expires_at").is_none());
        assert!(json.get("scheduled_for").is_none());
        assert!(json.get("executed_at").is_none());
        assert_eq!(json["recurrence"], "once");
    }
}
