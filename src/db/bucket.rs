use crate::{error::AlarmResult, models::AlarmRecord};

use super::{BucketState, BucketStore, Location};

/// In-memory view of one bucket. Real schedule slots and execution markers
/// both go through this type.
#[derive(Debug, Clone)]
pub struct Bucket {
    location: Location,
    key: String,
    records: Vec<AlarmRecord>,
    persisted: bool,
}

impl Bucket {
    /// Empty bucket that does not exist in storage yet.
    pub fn new(location: Location, key: impl Into<String>) -> Self {
        Self {
            location,
            key: key.into(),
            records: Vec::new(),
            persisted: false,
        }
    }

    /// `Ok(None)` when nothing is stored at this address.
    pub fn load(
        store: &dyn BucketStore,
        user: &str,
        location: Location,
        key: &str,
    ) -> AlarmResult<Option<Self>> {
        Ok(store.load(user, location, key)?.map(|records| Self {
            location,
            key: key.to_string(),
            records,
            persisted: true,
        }))
    }

    /// Existing bucket, or an empty one ready to be filled.
    pub fn load_or_new(
        store: &dyn BucketStore,
        user: &str,
        location: Location,
        key: &str,
    ) -> AlarmResult<Self> {
        Ok(Self::load(store, user, location, key)?.unwrap_or_else(|| Self::new(location, key)))
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn records(&self) -> &[AlarmRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<AlarmRecord> {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<AlarmRecord> {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn append(&mut self, record: AlarmRecord) {
        self.records.push(record);
    }

    /// Removes the record with `id`, returning it.
    pub fn remove(&mut self, id: &str) -> Option<AlarmRecord> {
        let index = self.records.iter().position(|record| record.id == id)?;
        Some(self.records.remove(index))
    }

    /// Persist the bucket; an emptied bucket is deleted instead.
    pub fn save(&mut self, store: &dyn BucketStore, user: &str) -> AlarmResult<()> {
        if self.records.is_empty() {
            if self.persisted {
                store.delete(user, self.location, &self.key)?;
                self.persisted = false;
            }
            return Ok(());
        }
        store.save(user, self.location, &self.key, &self.records)?;
        self.persisted = true;
        Ok(())
    }

    /// Relocate the bucket (with its current records) under the same key.
    pub fn move_to(
        &mut self,
        store: &dyn BucketStore,
        user: &str,
        state: BucketState,
    ) -> AlarmResult<()> {
        let target = Location {
            state,
            recurrence: self.location.recurrence,
        };
        if target == self.location {
            return self.save(store, user);
        }
        store.transfer(user, self.location, target, &self.key, &self.records)?;
        self.location = target;
        self.persisted = true;
        Ok(())
    }
}
