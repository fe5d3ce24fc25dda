use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand};

use crate::settings::Backend;

#[derive(Debug, Parser)]
#[command(name = "tickler")]
#[command(about = "Personal alarms with missed-run recovery, stored as plain JSON files")]
#[command(version)]
pub struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true, env = "TICKLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root of the alarm data tree
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// User whose alarms are managed
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// Storage backend
    #[arg(long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// More log output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage alarms
    #[command(subcommand)]
    Alarm(AlarmCommand),
}

#[derive(Debug, Subcommand)]
pub enum AlarmCommand {
    /// Create a one-time or recurring alarm
    Add(AddArgs),
    /// Fire due alarms, recovering those missed in the last hour
    Check(CheckArgs),
    /// Show active (and optionally past) alarms
    List(ListArgs),
    /// Remove an active alarm
    Cancel(CancelArgs),
}

#[derive(Debug, Args)]
#[command(group(
    ArgGroup::new("schedule")
        .required(true)
        .args(["at", "daily", "weekly", "monthly", "yearly"])
))]
pub struct AddArgs {
    /// Reminder text shown when the alarm fires
    #[arg(long, short = 'c')]
    pub context: String,

    /// One-time: "YYYY-MM-DD HH:MM", "tomorrow 10:00", "+30m"
    #[arg(long)]
    pub at: Option<String>,

    /// Every day: "HH:MM"
    #[arg(long)]
    pub daily: Option<String>,

    /// Every week: "monday 09:00"
    #[arg(long)]
    pub weekly: Option<String>,

    /// Every month: "15 14:30"
    #[arg(long)]
    pub monthly: Option<String>,

    /// Every year: "12-25 08:00"
    #[arg(long)]
    pub yearly: Option<String>,

    /// Stop a recurring alarm after this date ("YYYY-MM-DD" or "YYYY-MM-DD HH:MM")
    #[arg(long, conflicts_with = "at")]
    pub expires: Option<String>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Print fired alarms as JSON
    #[arg(long)]
    pub json: bool,

    /// Check every user under the data directory
    #[arg(long)]
    pub all_users: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Include fired and expired alarms
    #[arg(long)]
    pub past: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CancelArgs {
    /// Alarm id as shown by `alarm list`
    pub alarm_id: String,
}
