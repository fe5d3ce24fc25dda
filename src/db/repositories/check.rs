//! The due-alarm scan.
//!
//! Every minute-grid instant in the last `RECOVERY_WINDOW_MINUTES` minutes is
//! a candidate. One-time buckets leave active storage as soon as they fire,
//! so re-scanning them is harmless. Recurring buckets stay active; for those
//! an execution marker `fired_<minute>` in the kind's past location records
//! that the candidate minute has been handled.

use chrono::{DateTime, Duration, Local};

use crate::{
    db::{helpers::validate_user_id, AlarmStore, Bucket, BucketState, Location},
    error::AlarmResult,
    log_error, log_info,
    models::{AlarmRecord, Recurrence},
    schedule::{marker_key, truncate_to_minute, ScheduleKey},
};

const ENABLE_LOGS: bool = true;

/// Alarms missed for longer than this are dropped without notice.
pub const RECOVERY_WINDOW_MINUTES: i64 = 60;

impl AlarmStore {
    /// Fire everything due at `now`, recovering missed slots, and commit the
    /// resulting state transitions.
    ///
    /// Records come back in scan order (one-time, daily, weekly, monthly,
    /// yearly; newest candidate first within a kind), each stamped with the
    /// candidate instant in `scheduled_for`.
    pub fn check(&self, user: &str, now: DateTime<Local>) -> AlarmResult<Vec<AlarmRecord>> {
        validate_user_id(user)?;
        let slot_now = truncate_to_minute(now);
        let mut fired = Vec::new();

        for candidate in candidates(slot_now) {
            self.fire_once_slot(user, candidate, now, &mut fired)?;
        }

        for kind in Recurrence::RECURRING {
            for candidate in candidates(slot_now) {
                self.fire_recurring_slot(user, kind, candidate, now, &mut fired)?;
            }
        }

        if !fired.is_empty() {
            log_info!("Fired {} alarm(s) for user {}", fired.len(), user);
        }
        Ok(fired)
    }

    fn fire_once_slot(
        &self,
        user: &str,
        candidate: DateTime<Local>,
        now: DateTime<Local>,
        fired: &mut Vec<AlarmRecord>,
    ) -> AlarmResult<()> {
        let store = self.buckets();
        let slot = ScheduleKey::for_instant(Recurrence::Once, candidate.naive_local()).to_string();
        let Some(mut bucket) = Bucket::load(store, user, Location::active(Recurrence::Once), &slot)?
        else {
            return Ok(());
        };

        for record in bucket.records_mut() {
            record.scheduled_for = Some(candidate);
            fired.push(record.clone());
            record.executed_at = Some(now);
        }

        bucket
            .move_to(store, user, BucketState::Past)
            .inspect_err(|err| log_error!("Failed to retire one-time slot {}: {}", slot, err))?;
        log_info!("One-time slot {} fired for user {}", slot, user);
        Ok(())
    }

    fn fire_recurring_slot(
        &self,
        user: &str,
        kind: Recurrence,
        candidate: DateTime<Local>,
        now: DateTime<Local>,
        fired: &mut Vec<AlarmRecord>,
    ) -> AlarmResult<()> {
        let store = self.buckets();
        let instant = candidate.naive_local();
        let marker = marker_key(instant);
        let past = Location::past(kind);

        if store.contains(user, past, &marker)? {
            return Ok(());
        }

        let slot = ScheduleKey::for_instant(kind, instant).to_string();
        let Some(mut bucket) = Bucket::load(store, user, Location::active(kind), &slot)? else {
            return Ok(());
        };

        let mut marker_bucket = Bucket::new(past, marker.as_str());
        let mut expired_ids = Vec::new();

        for record in bucket.records_mut() {
            // A slot that passed before the alarm existed is not a missed firing.
            if truncate_to_minute(record.created_at) > candidate {
                continue;
            }

            record.scheduled_for = Some(candidate);
            if record.expires_by_slot(candidate) {
                expired_ids.push(record.id.clone());
            }
            fired.push(record.clone());
            marker_bucket.append(record.clone().with_executed_at(now));
        }

        if marker_bucket.is_empty() {
            return Ok(());
        }
        marker_bucket
            .save(store, user)
            .inspect_err(|err| log_error!("Failed to record firing {}: {}", marker, err))?;

        if !expired_ids.is_empty() {
            self.retire_expired(user, &mut bucket, &expired_ids, now)?;
        }
        Ok(())
    }

    /// Move expired records of a recurring bucket to past storage. Records
    /// that are still live stay where they are.
    fn retire_expired(
        &self,
        user: &str,
        bucket: &mut Bucket,
        expired_ids: &[String],
        now: DateTime<Local>,
    ) -> AlarmResult<()> {
        let store = self.buckets();
        let is_expired = |record: &AlarmRecord| expired_ids.contains(&record.id);

        for record in bucket.records_mut().iter_mut().filter(|r| is_expired(r)) {
            record.executed_at = Some(now);
        }

        if bucket.records().iter().all(|r| is_expired(r)) {
            bucket.move_to(store, user, BucketState::Past)?;
        } else {
            let retired: Vec<AlarmRecord> = bucket
                .records()
                .iter()
                .filter(|r| is_expired(r))
                .cloned()
                .collect();
            let mut past_bucket = Bucket::load_or_new(
                store,
                user,
                Location::past(bucket.location().recurrence),
                bucket.key(),
            )?;
            for record in retired {
                past_bucket.append(record);
            }
            past_bucket.save(store, user)?;

            bucket.records_mut().retain(|r| !is_expired(r));
            bucket.save(store, user)?;
        }

        log_info!(
            "Retired {} expired alarm(s) from slot {} for user {}",
            expired_ids.len(),
            bucket.key(),
            user
        );
        Ok(())
    }
}

/// `slot_now`, then each earlier minute back to the edge of the window.
fn candidates(slot_now: DateTime<Local>) -> impl Iterator<Item = DateTime<Local>> {
    (0..=RECOVERY_WINDOW_MINUTES).map(move |offset| slot_now - Duration::minutes(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteBucketStore;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, 0).single().unwrap()
    }

    fn store() -> AlarmStore {
        AlarmStore::new(Box::new(SqliteBucketStore::open_in_memory().unwrap()))
    }

    #[test]
    fn candidates_cover_the_window_newest_first() {
        let now = at(2025, 11, 21, 14, 30);
        let all: Vec<_> = candidates(now).collect();
        assert_eq!(all.len(), 61);
        assert_eq!(all[0], now);
        assert_eq!(all[60], at(2025, 11, 21, 13, 30));
    }

    #[test]
    fn seconds_are_ignored_when_scanning() {
        let store = store();
        let created = at(2025, 11, 21, 8, 0);
        let key = ScheduleKey::once(at(2025, 11, 21, 14, 30).naive_local());
        store
            .add("u1", &key, AlarmRecord::new("tea", Recurrence::Once, created), created)
            .unwrap();

        let now = at(2025, 11, 21, 14, 30) + Duration::seconds(42);
        let fired = store.check("u1", now).unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].scheduled_for, Some(at(2025, 11, 21, 14, 30)));
        assert_eq!(fired[0].executed_at, None);
    }

    #[test]
    fn recurring_alarm_created_after_its_slot_waits_for_next_one() {
        let store = store();
        let created = at(2025, 11, 21, 14, 45);
        store
            .add(
                "u1",
                &ScheduleKey::daily(14, 30).unwrap(),
                AlarmRecord::new("stand-up", Recurrence::Daily, created),
                created,
            )
            .unwrap();

        assert!(store.check("u1", created).unwrap().is_empty());
        assert_eq!(store.check("u1", at(2025, 11, 22, 14, 30)).unwrap().len(), 1);
    }

    #[test]
    fn expired_record_leaves_live_neighbours_active() {
        let store = store();
        let created = at(2025, 11, 20, 8, 0);
        let key = ScheduleKey::daily(9, 0).unwrap();
        store
            .add(
                "u1",
                &key,
                AlarmRecord::new("short", Recurrence::Daily, created)
                    .with_expiry(Some(at(2025, 11, 20, 12, 0))),
                created,
            )
            .unwrap();
        let live = store
            .add("u1", &key, AlarmRecord::new("long", Recurrence::Daily, created), created)
            .unwrap();

        let fired = store.check("u1", at(2025, 11, 21, 9, 0)).unwrap();
        assert_eq!(fired.len(), 2);

        assert_eq!(store.list_active("u1").unwrap(), vec![live]);
        let past = store.list_past("u1").unwrap();
        assert!(past.iter().any(|r| r.context == "short" && r.executed_at.is_some()));
        assert!(store.check("u1", at(2025, 11, 22, 9, 0)).unwrap().len() == 1);
    }
}
