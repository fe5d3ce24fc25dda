use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/tickler/config.json";
pub const DEFAULT_DATA_DIR: &str = "/var/lib/tickler";
const SQLITE_FILE_NAME: &str = "tickler.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON files in a directory tree
    #[default]
    Files,
    /// Embedded SQLite database inside the data directory
    Sqlite,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "files" | "fs" => Ok(Backend::Files),
            "sqlite" => Ok(Backend::Sqlite),
            other => bail!("unknown backend '{other}' (expected files or sqlite)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub user: Option<String>,
    pub log_level: String,
    pub backend: Backend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            user: None,
            log_level: "info".into(),
            backend: Backend::Files,
        }
    }
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub user: Option<String>,
    pub backend: Option<Backend>,
}

impl Settings {
    /// Defaults, then the settings file, then `TICKLER_*` variables, then
    /// `overrides`. A missing settings file is fine; a malformed one is not.
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut settings = Self::from_file(path)?;
        settings.apply_env(|name| std::env::var(name).ok())?;
        settings.apply_overrides(overrides);
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(dir) = non_empty("TICKLER_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(user) = non_empty("TICKLER_USER") {
            self.user = Some(user);
        }
        if let Some(level) = non_empty("TICKLER_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(backend) = non_empty("TICKLER_BACKEND") {
            self.backend = backend.parse().context("Invalid TICKLER_BACKEND")?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(dir) = overrides.data_dir {
            self.data_dir = dir;
        }
        if let Some(user) = overrides.user {
            self.user = Some(user);
        }
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join(SQLITE_FILE_NAME)
    }

    /// The configured user, which every single-user command needs.
    pub fn require_user(&self) -> Result<&str> {
        match self.user.as_deref() {
            Some(user) if !user.trim().is_empty() => Ok(user),
            _ => bail!("no user configured (pass --user or set TICKLER_USER)"),
        }
    }

    /// Level for the logger; `-v` flags raise it.
    pub fn level_filter(&self, verbosity: u8) -> LevelFilter {
        match verbosity {
            0 => LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info),
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
