use std::sync::Arc;

use chrono::{DateTime, Local};
use log::{debug, info, warn};

use crate::{
    clock::Clock,
    db::{ActiveAlarm, AlarmStore},
    error::{AlarmError, AlarmResult},
    models::{AlarmRecord, Recurrence},
    schedule::{truncate_to_minute, ScheduleKey},
};

use super::parse;

/// Alarms fired for one user during a multi-user check.
#[derive(Debug, Clone)]
pub struct UserFirings {
    pub user: String,
    pub fired: Vec<AlarmRecord>,
}

/// Entry point for alarm creation, checking, listing and cancelling. Parses
/// user-facing schedule strings and hands typed requests to the store.
pub struct AlarmService {
    store: AlarmStore,
    clock: Arc<dyn Clock>,
}

impl AlarmService {
    pub fn new(store: AlarmStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &AlarmStore {
        &self.store
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    /// One-time alarm. `at` must lie strictly in the future and is stored
    /// truncated to the minute.
    pub fn add_once(&self, user: &str, at: &str, context: &str) -> AlarmResult<ActiveAlarm> {
        let now = self.now();
        let at = parse::parse_when(at, now)?;
        if at <= now {
            return Err(AlarmError::InvalidInput(format!(
                "alarm time {} is in the past",
                at.format("%Y-%m-%d %H:%M")
            )));
        }

        let slot = truncate_to_minute(at);
        let key = ScheduleKey::once(slot.naive_local());
        let record = AlarmRecord::new(context.trim(), Recurrence::Once, now);
        let record = self.store.add(user, &key, record, now)?;
        Ok(ActiveAlarm {
            schedule: key,
            record: record.with_scheduled_for(slot),
        })
    }

    pub fn add_daily(
        &self,
        user: &str,
        time: &str,
        context: &str,
        expires: Option<&str>,
    ) -> AlarmResult<ActiveAlarm> {
        let key = parse::parse_daily(time)?;
        self.add_recurring(user, key, context, expires)
    }

    pub fn add_weekly(
        &self,
        user: &str,
        schedule: &str,
        context: &str,
        expires: Option<&str>,
    ) -> AlarmResult<ActiveAlarm> {
        let key = parse::parse_weekly(schedule)?;
        self.add_recurring(user, key, context, expires)
    }

    pub fn add_monthly(
        &self,
        user: &str,
        schedule: &str,
        context: &str,
        expires: Option<&str>,
    ) -> AlarmResult<ActiveAlarm> {
        let key = parse::parse_monthly(schedule)?;
        self.add_recurring(user, key, context, expires)
    }

    pub fn add_yearly(
        &self,
        user: &str,
        schedule: &str,
        context: &str,
        expires: Option<&str>,
    ) -> AlarmResult<ActiveAlarm> {
        let key = parse::parse_yearly(schedule)?;
        self.add_recurring(user, key, context, expires)
    }

    fn add_recurring(
        &self,
        user: &str,
        key: ScheduleKey,
        context: &str,
        expires: Option<&str>,
    ) -> AlarmResult<ActiveAlarm> {
        let now = self.now();
        let expires_at = expires.map(parse::parse_expires).transpose()?;
        if let Some(expires_at) = expires_at {
            if expires_at <= now {
                return Err(AlarmError::InvalidInput(format!(
                    "expiry {} is in the past",
                    expires_at.format("%Y-%m-%d %H:%M")
                )));
            }
        }

        let record =
            AlarmRecord::new(context.trim(), key.recurrence(), now).with_expiry(expires_at);
        let record = self.store.add(user, &key, record, now)?;
        Ok(ActiveAlarm {
            schedule: key,
            record,
        })
    }

    /// Fire whatever is due for `user` right now.
    pub fn check(&self, user: &str) -> AlarmResult<Vec<AlarmRecord>> {
        self.check_at(user, self.now())
    }

    pub fn check_at(&self, user: &str, now: DateTime<Local>) -> AlarmResult<Vec<AlarmRecord>> {
        let fired = self.store.check(user, now)?;
        if fired.is_empty() {
            debug!("No alarms due for user {user} at {}", now.format("%Y-%m-%d %H:%M"));
        }
        Ok(fired)
    }

    /// Check every user that has alarm data. A failure for one user is
    /// logged and does not stop the others; the first error is returned
    /// after everyone has been checked.
    pub fn check_all(&self, now: DateTime<Local>) -> AlarmResult<Vec<UserFirings>> {
        let mut results = Vec::new();
        let mut first_error = None;

        for user in self.store.users()? {
            match self.store.check(&user, now) {
                Ok(fired) if fired.is_empty() => {}
                Ok(fired) => results.push(UserFirings { user, fired }),
                Err(err) => {
                    warn!("Alarm check failed for user {user}: {err}");
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                info!("Checked alarms for all users: {} with firings", results.len());
                Ok(results)
            }
        }
    }

    pub fn list_active(&self, user: &str) -> AlarmResult<Vec<ActiveAlarm>> {
        self.store.list_active_entries(user)
    }

    pub fn list_past(&self, user: &str) -> AlarmResult<Vec<AlarmRecord>> {
        self.store.list_past(user)
    }

    pub fn cancel(&self, user: &str, id: &str) -> AlarmResult<AlarmRecord> {
        let id = id.trim();
        if id.is_empty() {
            return Err(AlarmError::InvalidInput("alarm id is required".into()));
        }
        self.store.cancel(user, id)
    }
}
