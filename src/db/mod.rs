//! Alarm storage engine.
//!
//! Alarms live in buckets: JSON arrays of records sharing one schedule slot,
//! addressed by (user, location, key). `BucketStore` is the seam between the
//! scan/transition logic in `AlarmStore` and the physical backend, so the
//! directory tree can be swapped for the embedded SQLite store without the
//! service noticing.

use std::path::Path;

use log::info;

use crate::{error::AlarmResult, models::{AlarmRecord, Recurrence}};

pub mod bucket;
pub mod fs;
pub mod helpers;
mod migrations;
pub mod repositories;
pub mod sqlite;

pub use bucket::Bucket;
pub use fs::FsBucketStore;
pub use repositories::alarms::ActiveAlarm;
pub use repositories::check::RECOVERY_WINDOW_MINUTES;
pub use sqlite::SqliteBucketStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketState {
    /// Pending one-time alarms and live recurring alarms.
    Active,
    /// Fired, expired and execution-marker buckets.
    Past,
}

impl BucketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketState::Active => "active",
            BucketState::Past => "past",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub state: BucketState,
    pub recurrence: Recurrence,
}

impl Location {
    pub fn active(recurrence: Recurrence) -> Self {
        Self {
            state: BucketState::Active,
            recurrence,
        }
    }

    pub fn past(recurrence: Recurrence) -> Self {
        Self {
            state: BucketState::Past,
            recurrence,
        }
    }
}

/// Physical bucket storage. Implementations only move bytes around; every
/// scheduling rule lives in `AlarmStore`.
pub trait BucketStore {
    /// `Ok(None)` when the bucket does not exist.
    fn load(&self, user: &str, location: Location, key: &str)
        -> AlarmResult<Option<Vec<AlarmRecord>>>;

    /// Create or replace a bucket.
    fn save(&self, user: &str, location: Location, key: &str, records: &[AlarmRecord])
        -> AlarmResult<()>;

    /// Remove a bucket; missing buckets are not an error.
    fn delete(&self, user: &str, location: Location, key: &str) -> AlarmResult<()>;

    fn contains(&self, user: &str, location: Location, key: &str) -> AlarmResult<bool>;

    /// Bucket keys at a location, sorted.
    fn keys(&self, user: &str, location: Location) -> AlarmResult<Vec<String>>;

    /// Users that own any alarm data, sorted.
    fn users(&self) -> AlarmResult<Vec<String>>;

    /// Move a bucket holding `records` from `from` to `to`.
    ///
    /// The destination is written (merged with whatever already sits under
    /// the same key) before the source is removed, so an interruption leaves
    /// the bucket visible twice rather than not at all.
    fn transfer(
        &self,
        user: &str,
        from: Location,
        to: Location,
        key: &str,
        records: &[AlarmRecord],
    ) -> AlarmResult<()> {
        let mut merged = self.load(user, to, key)?.unwrap_or_default();
        merged.extend_from_slice(records);
        self.save(user, to, key, &merged)?;
        self.delete(user, from, key)
    }
}

/// Alarm persistence and the due-alarm scan, on top of any `BucketStore`.
pub struct AlarmStore {
    buckets: Box<dyn BucketStore>,
}

impl AlarmStore {
    pub fn new(buckets: Box<dyn BucketStore>) -> Self {
        Self { buckets }
    }

    /// Directory-tree store rooted at `data_dir`.
    pub fn open_files(data_dir: &Path) -> Self {
        info!("Alarm store using files under {}", data_dir.display());
        Self::new(Box::new(FsBucketStore::new(data_dir)))
    }

    /// Embedded SQLite store at `db_path`.
    pub fn open_sqlite(db_path: &Path) -> AlarmResult<Self> {
        let store = SqliteBucketStore::open(db_path)?;
        Ok(Self::new(Box::new(store)))
    }

    pub(crate) fn buckets(&self) -> &dyn BucketStore {
        self.buckets.as_ref()
    }
}
