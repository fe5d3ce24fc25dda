use std::path::Path;

use anyhow::Context;
use chrono::Local;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};

use crate::{
    error::{AlarmResult, StorageContext},
    models::AlarmRecord,
};

use super::{
    helpers::{decode_records, encode_records, validate_bucket_key, validate_user_id},
    migrations::run_migrations,
    BucketStore, Location,
};

/// Buckets as rows of one SQLite table, each holding the same JSON array the
/// file store would write.
pub struct SqliteBucketStore {
    conn: Connection,
}

impl SqliteBucketStore {
    pub fn open(db_path: &Path) -> AlarmResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).storage_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(db_path)
            .storage_context(|| format!("failed to open {}", db_path.display()))?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            error!("Failed to enable WAL mode: {err}");
        }

        let store = Self::from_connection(conn)?;
        info!("Alarm database initialized at {}", db_path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> AlarmResult<Self> {
        let conn = Connection::open_in_memory()
            .storage_context(|| "failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> AlarmResult<Self> {
        run_migrations(&mut conn).storage_context(|| "failed to run database migrations")?;
        Ok(Self { conn })
    }

    fn check_address(user: &str, key: &str) -> AlarmResult<()> {
        validate_user_id(user)?;
        validate_bucket_key(key).storage_context(|| "refusing to address bucket")
    }
}

fn upsert(
    conn: &Connection,
    user: &str,
    location: Location,
    key: &str,
    records: &[AlarmRecord],
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO alarm_buckets (user_id, state, recurrence, bucket_key, records, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id, state, recurrence, bucket_key)
         DO UPDATE SET records = excluded.records, updated_at = excluded.updated_at",
        params![
            user,
            location.state.as_str(),
            location.recurrence.as_str(),
            key,
            encode_records(records)?,
            Local::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("failed to write bucket {key}"))?;
    Ok(())
}

fn select(
    conn: &Connection,
    user: &str,
    location: Location,
    key: &str,
) -> anyhow::Result<Option<Vec<AlarmRecord>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT records FROM alarm_buckets
             WHERE user_id = ?1 AND state = ?2 AND recurrence = ?3 AND bucket_key = ?4",
            params![user, location.state.as_str(), location.recurrence.as_str(), key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read bucket {key}"))?;

    raw.map(|raw| decode_records(&raw, key)).transpose()
}

fn remove(conn: &Connection, user: &str, location: Location, key: &str) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM alarm_buckets
         WHERE user_id = ?1 AND state = ?2 AND recurrence = ?3 AND bucket_key = ?4",
        params![user, location.state.as_str(), location.recurrence.as_str(), key],
    )
    .with_context(|| format!("failed to delete bucket {key}"))?;
    Ok(())
}

impl BucketStore for SqliteBucketStore {
    fn load(
        &self,
        user: &str,
        location: Location,
        key: &str,
    ) -> AlarmResult<Option<Vec<AlarmRecord>>> {
        Self::check_address(user, key)?;
        select(&self.conn, user, location, key)
            .storage_context(|| format!("failed to load bucket {key}"))
    }

    fn save(
        &self,
        user: &str,
        location: Location,
        key: &str,
        records: &[AlarmRecord],
    ) -> AlarmResult<()> {
        Self::check_address(user, key)?;
        upsert(&self.conn, user, location, key, records)
            .storage_context(|| format!("failed to save bucket {key}"))
    }

    fn delete(&self, user: &str, location: Location, key: &str) -> AlarmResult<()> {
        Self::check_address(user, key)?;
        remove(&self.conn, user, location, key).storage_context(|| "failed to delete bucket")
    }

    fn contains(&self, user: &str, location: Location, key: &str) -> AlarmResult<bool> {
        Self::check_address(user, key)?;
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM alarm_buckets
                 WHERE user_id = ?1 AND state = ?2 AND recurrence = ?3 AND bucket_key = ?4",
                params![user, location.state.as_str(), location.recurrence.as_str(), key],
                |row| row.get(0),
            )
            .optional()
            .storage_context(|| format!("failed to look up bucket {key}"))?;
        Ok(found.is_some())
    }

    fn keys(&self, user: &str, location: Location) -> AlarmResult<Vec<String>> {
        validate_user_id(user)?;
        let mut stmt = self
            .conn
            .prepare(
                "SELECT bucket_key FROM alarm_buckets
                 WHERE user_id = ?1 AND state = ?2 AND recurrence = ?3
                 ORDER BY bucket_key ASC",
            )
            .storage_context(|| "failed to prepare bucket listing")?;

        let rows = stmt
            .query_map(
                params![user, location.state.as_str(), location.recurrence.as_str()],
                |row| row.get::<_, String>(0),
            )
            .storage_context(|| "failed to list buckets")?;

        let keys = rows
            .collect::<Result<Vec<_>, _>>()
            .storage_context(|| "failed to read bucket key")?;
        Ok(keys)
    }

    fn users(&self) -> AlarmResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT user_id FROM alarm_buckets ORDER BY user_id ASC")
            .storage_context(|| "failed to prepare user listing")?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .storage_context(|| "failed to list users")?;

        let users = rows
            .collect::<Result<Vec<_>, _>>()
            .storage_context(|| "failed to read user id")?;
        Ok(users)
    }

    fn transfer(
        &self,
        user: &str,
        from: Location,
        to: Location,
        key: &str,
        records: &[AlarmRecord],
    ) -> AlarmResult<()> {
        Self::check_address(user, key)?;
        let result: anyhow::Result<()> = (|| {
            let tx = self
                .conn
                .unchecked_transaction()
                .context("failed to open transfer transaction")?;

            let mut merged = select(&tx, user, to, key)?.unwrap_or_default();
            merged.extend_from_slice(records);
            upsert(&tx, user, to, key, &merged)?;
            remove(&tx, user, from, key)?;

            tx.commit().context("failed to commit transfer")?;
            Ok(())
        })();
        result.storage_context(|| format!("failed to move bucket {key}"))
    }
}
