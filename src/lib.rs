pub mod alarms;
pub mod cli;
pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod schedule;
pub mod settings;
mod utils;

use std::{io, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

use alarms::AlarmService;
use cli::{Cli, Command};
use clock::SystemClock;
use db::AlarmStore;
use settings::{Backend, Overrides, Settings};

pub use error::{AlarmError, AlarmResult};

/// Open the configured backend and wrap it in a service driven by the
/// system clock.
pub fn build_service(settings: &Settings) -> Result<AlarmService> {
    let store = match settings.backend {
        Backend::Files => AlarmStore::open_files(&settings.data_dir),
        Backend::Sqlite => AlarmStore::open_sqlite(&settings.sqlite_path())
            .context("failed to open alarm database")?,
    };
    Ok(AlarmService::new(store, Arc::new(SystemClock)))
}

/// Binary entry point. Returns the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let overrides = Overrides {
        data_dir: cli.data_dir,
        user: cli.user,
        backend: cli.backend,
    };
    let settings = Settings::load(cli.config.as_deref(), overrides)?;

    env_logger::Builder::from_default_env()
        .filter_level(settings.level_filter(cli.verbose))
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok();

    log::debug!(
        "tickler starting with {:?} backend at {}",
        settings.backend,
        settings.data_dir.display()
    );

    let service = build_service(&settings)?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Command::Alarm(command) => {
            alarms::commands::execute(&service, &settings, command, &mut stdout)
        }
    }
}
