use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::{
    error::{AlarmResult, StorageContext},
    models::{AlarmRecord, Recurrence},
};

use super::{
    helpers::{decode_records, encode_records, validate_bucket_key, validate_user_id},
    BucketState, BucketStore, Location,
};

const BUCKET_EXTENSION: &str = "json";

/// Buckets as pretty-printed JSON files under `<root>/users/<user>/alarms/`.
#[derive(Debug, Clone)]
pub struct FsBucketStore {
    root: PathBuf,
}

impl FsBucketStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn users_dir(&self) -> PathBuf {
        self.root.join("users")
    }

    fn alarms_dir(&self, user: &str) -> PathBuf {
        self.users_dir().join(user).join("alarms")
    }

    /// Directory holding the buckets of one location.
    pub fn location_dir(&self, user: &str, location: Location) -> PathBuf {
        let alarms = self.alarms_dir(user);
        match (location.state, location.recurrence) {
            (BucketState::Active, Recurrence::Once) => alarms.join("pending"),
            (BucketState::Active, kind) => alarms.join("recurring").join(kind.as_str()),
            (BucketState::Past, Recurrence::Once) => alarms.join("past").join("one-time"),
            (BucketState::Past, kind) => alarms.join("past").join("recurring").join(kind.as_str()),
        }
    }

    pub fn bucket_path(&self, user: &str, location: Location, key: &str) -> PathBuf {
        self.location_dir(user, location)
            .join(format!("{key}.{BUCKET_EXTENSION}"))
    }

    fn checked_path(&self, user: &str, location: Location, key: &str) -> AlarmResult<PathBuf> {
        validate_user_id(user)?;
        validate_bucket_key(key).storage_context(|| "refusing to address bucket")?;
        Ok(self.bucket_path(user, location, key))
    }
}

fn read_bucket(path: &Path) -> Result<Option<Vec<AlarmRecord>>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()))
        }
    };
    decode_records(&raw, &path.display().to_string()).map(Some)
}

/// Write through a sibling temp file and rename it over the target, so a
/// reader never sees a half-written bucket.
fn write_bucket(path: &Path, records: &[AlarmRecord]) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("bucket path {} has no parent", path.display()))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    let serialized = encode_records(records)?;
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(serialized.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .with_context(|| format!("failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

fn list_dir(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("failed to list {}", dir.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err).with_context(|| format!("failed to list {}", dir.display())),
    }
}

impl BucketStore for FsBucketStore {
    fn load(
        &self,
        user: &str,
        location: Location,
        key: &str,
    ) -> AlarmResult<Option<Vec<AlarmRecord>>> {
        let path = self.checked_path(user, location, key)?;
        read_bucket(&path).storage_context(|| format!("failed to load bucket {key}"))
    }

    fn save(
        &self,
        user: &str,
        location: Location,
        key: &str,
        records: &[AlarmRecord],
    ) -> AlarmResult<()> {
        let path = self.checked_path(user, location, key)?;
        write_bucket(&path, records).storage_context(|| format!("failed to save bucket {key}"))
    }

    fn delete(&self, user: &str, location: Location, key: &str) -> AlarmResult<()> {
        let path = self.checked_path(user, location, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).storage_context(|| format!("failed to delete {}", path.display())),
        }
    }

    fn contains(&self, user: &str, location: Location, key: &str) -> AlarmResult<bool> {
        let path = self.checked_path(user, location, key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).storage_context(|| format!("failed to inspect {}", path.display()))
            }
        }
    }

    fn keys(&self, user: &str, location: Location) -> AlarmResult<Vec<String>> {
        validate_user_id(user)?;
        let dir = self.location_dir(user, location);
        let entries = list_dir(&dir).storage_context(|| "failed to list buckets")?;

        let mut keys: Vec<String> = entries
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(BUCKET_EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()).map(String::from))
            .filter(|stem| !stem.starts_with('.'))
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn users(&self) -> AlarmResult<Vec<String>> {
        let entries = list_dir(&self.users_dir()).storage_context(|| "failed to list users")?;

        let mut users: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.path().join("alarms").is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(String::from))
            .filter(|name| validate_user_id(name).is_ok())
            .collect();
        users.sort();
        Ok(users)
    }
}
