use anyhow::{anyhow, Context, Result};

use crate::{
    error::{AlarmError, AlarmResult},
    models::AlarmRecord,
};

/// User ids become a single directory name, so they must not be able to
/// address anything outside `users/`.
pub fn validate_user_id(user: &str) -> AlarmResult<()> {
    if user.trim().is_empty() {
        return Err(AlarmError::InvalidInput("user id is required".into()));
    }
    if user.contains('/') || user.contains('\\') || user.contains("..") || user.starts_with('.') {
        return Err(AlarmError::InvalidInput(format!(
            "user id '{user}' must be a single path component"
        )));
    }
    if user.chars().any(char::is_control) {
        return Err(AlarmError::InvalidInput(format!(
            "user id '{}' contains control characters",
            user.escape_default()
        )));
    }
    Ok(())
}

pub fn encode_records(records: &[AlarmRecord]) -> Result<String> {
    serde_json::to_string_pretty(records).context("failed to serialize alarm bucket")
}

pub fn decode_records(raw: &str, origin: &str) -> Result<Vec<AlarmRecord>> {
    serde_json::from_str(raw).with_context(|| format!("malformed alarm bucket {origin}"))
}

/// Bucket keys are file stems, so they follow the same rule as user ids.
pub fn validate_bucket_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.starts_with('.') {
        return Err(anyhow!("invalid bucket key '{key}'"));
    }
    Ok(())
}
