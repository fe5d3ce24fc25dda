use chrono::{DateTime, Local, TimeZone};

use crate::{
    db::{helpers::validate_user_id, AlarmStore, Bucket, Location},
    error::{AlarmError, AlarmResult},
    log_info, log_warn,
    models::{AlarmRecord, Recurrence},
    schedule::ScheduleKey,
};

const ENABLE_LOGS: bool = true;

/// An active alarm together with the slot it lives in.
#[derive(Debug, Clone)]
pub struct ActiveAlarm {
    pub schedule: ScheduleKey,
    pub record: AlarmRecord,
}

fn once_instant(key: &ScheduleKey) -> Option<DateTime<Local>> {
    match key {
        ScheduleKey::Once(at) => Local.from_local_datetime(at).earliest(),
        _ => None,
    }
}

impl AlarmStore {
    /// Store `record` in the active bucket for `key`.
    pub fn add(
        &self,
        user: &str,
        key: &ScheduleKey,
        record: AlarmRecord,
        now: DateTime<Local>,
    ) -> AlarmResult<AlarmRecord> {
        validate_user_id(user)?;
        record.validate(now)?;

        if key.recurrence() != record.recurrence {
            return Err(AlarmError::InvalidAlarm(format!(
                "{} alarm cannot be stored in a {} slot",
                record.recurrence,
                key.recurrence()
            )));
        }

        let store = self.buckets();
        let slot = key.to_string();
        let location = Location::active(record.recurrence);
        let mut bucket = Bucket::load_or_new(store, user, location, &slot)?;
        bucket.append(record.clone());
        bucket.save(store, user)?;

        log_info!(
            "Added {} alarm {} for user {} at slot {}",
            record.recurrence,
            record.id,
            user,
            slot
        );
        Ok(record)
    }

    /// Every active record: one-time alarms first, then each recurring kind.
    pub fn list_active(&self, user: &str) -> AlarmResult<Vec<AlarmRecord>> {
        Ok(self
            .list_active_entries(user)?
            .into_iter()
            .map(|entry| entry.record)
            .collect())
    }

    /// Like `list_active`, with each record's slot attached. One-time
    /// records carry their slot instant in `scheduled_for`. Files whose name
    /// is not a slot key are never scanned, so they are left out here too.
    pub fn list_active_entries(&self, user: &str) -> AlarmResult<Vec<ActiveAlarm>> {
        validate_user_id(user)?;
        let store = self.buckets();
        let mut entries = Vec::new();

        for kind in Recurrence::ALL {
            let location = Location::active(kind);
            for slot in store.keys(user, location)? {
                let schedule = match ScheduleKey::parse(kind, &slot) {
                    Ok(schedule) => schedule,
                    Err(err) => {
                        log_warn!("Ignoring {} bucket with unknown slot {}: {}", kind, slot, err);
                        continue;
                    }
                };
                let Some(bucket) = Bucket::load(store, user, location, &slot)? else {
                    continue;
                };

                let scheduled_for = once_instant(&schedule);
                for mut record in bucket.into_records() {
                    if let Some(at) = scheduled_for {
                        record.scheduled_for = Some(at);
                    }
                    entries.push(ActiveAlarm { schedule, record });
                }
            }
        }

        Ok(entries)
    }

    /// Fired, expired and marker records. Unreadable buckets are skipped.
    pub fn list_past(&self, user: &str) -> AlarmResult<Vec<AlarmRecord>> {
        validate_user_id(user)?;
        let store = self.buckets();
        let mut records = Vec::new();

        for kind in Recurrence::ALL {
            let location = Location::past(kind);
            for key in store.keys(user, location)? {
                match Bucket::load(store, user, location, &key) {
                    Ok(Some(bucket)) => records.extend(bucket.into_records()),
                    Ok(None) => {}
                    Err(err) => {
                        log_warn!("Skipping unreadable past {} bucket {}: {}", kind, key, err);
                    }
                }
            }
        }

        Ok(records)
    }

    /// Remove one active alarm by id, searching one-time alarms first.
    pub fn cancel(&self, user: &str, id: &str) -> AlarmResult<AlarmRecord> {
        validate_user_id(user)?;
        let store = self.buckets();

        for kind in Recurrence::ALL {
            let location = Location::active(kind);
            for key in store.keys(user, location)? {
                let mut bucket = match Bucket::load(store, user, location, &key) {
                    Ok(Some(bucket)) => bucket,
                    Ok(None) => continue,
                    Err(err) => {
                        log_warn!("Skipping unreadable {} bucket {}: {}", kind, key, err);
                        continue;
                    }
                };

                if let Some(record) = bucket.remove(id) {
                    bucket.save(store, user)?;
                    log_info!("Cancelled alarm {} for user {}", id, user);
                    return Ok(record);
                }
            }
        }

        Err(AlarmError::NotFound(id.to_string()))
    }

    /// Users that have alarm data.
    pub fn users(&self) -> AlarmResult<Vec<String>> {
        self.buckets().users()
    }
}
