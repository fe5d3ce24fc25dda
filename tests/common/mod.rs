#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone};
use tempfile::TempDir;
use tickler::{
    alarms::AlarmService,
    clock::FixedClock,
    db::{AlarmStore, FsBucketStore, SqliteBucketStore},
};

pub fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(y, mo, d, h, mi, 0)
        .single()
        .expect("unambiguous local time")
}

/// A service over one backend, with its clock and (for files) its tree.
pub struct Harness {
    pub name: &'static str,
    pub service: AlarmService,
    pub clock: Arc<FixedClock>,
    pub dir: Option<TempDir>,
}

impl Harness {
    pub fn files(now: DateTime<Local>) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let store = AlarmStore::new(Box::new(FsBucketStore::new(dir.path())));
        Self::build("files", store, now, Some(dir))
    }

    pub fn sqlite(now: DateTime<Local>) -> Self {
        let store = AlarmStore::new(Box::new(
            SqliteBucketStore::open_in_memory().expect("in-memory database"),
        ));
        Self::build("sqlite", store, now, None)
    }

    fn build(
        name: &'static str,
        store: AlarmStore,
        now: DateTime<Local>,
        dir: Option<TempDir>,
    ) -> Self {
        let clock = Arc::new(FixedClock::new(now));
        Self {
            name,
            service: AlarmService::new(store, clock.clone()),
            clock,
            dir,
        }
    }

    pub fn fs(&self) -> FsBucketStore {
        let dir = self.dir.as_ref().expect("files backend");
        FsBucketStore::new(dir.path())
    }
}

/// Run `test` once per storage backend, each with a fresh store.
pub fn each_backend(now: DateTime<Local>, test: impl Fn(Harness)) {
    test(Harness::files(now));
    test(Harness::sqlite(now));
}
