use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;

use crate::{
    cli::{AddArgs, AlarmCommand, CancelArgs, CheckArgs, ListArgs},
    db::ActiveAlarm,
    models::AlarmRecord,
    settings::Settings,
};

use super::{AlarmService, UserFirings};

const CONTEXT_COLUMN_WIDTH: usize = 40;

#[derive(Serialize)]
struct ActiveView<'a> {
    #[serde(flatten)]
    record: &'a AlarmRecord,
    schedule: String,
}

#[derive(Serialize)]
struct ListView<'a> {
    active: Vec<ActiveView<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    past: Option<&'a [AlarmRecord]>,
}

#[derive(Serialize)]
struct UserFiringsView<'a> {
    user: &'a str,
    fired: &'a [AlarmRecord],
}

pub fn execute<W: Write>(
    service: &AlarmService,
    settings: &Settings,
    command: AlarmCommand,
    out: &mut W,
) -> Result<()> {
    match command {
        AlarmCommand::Add(args) => add(service, settings.require_user()?, args, out),
        AlarmCommand::Check(args) if args.all_users => check_all(service, args, out),
        AlarmCommand::Check(args) => check(service, settings.require_user()?, args, out),
        AlarmCommand::List(args) => list(service, settings.require_user()?, args, out),
        AlarmCommand::Cancel(args) => cancel(service, settings.require_user()?, args, out),
    }
}

fn add<W: Write>(service: &AlarmService, user: &str, args: AddArgs, out: &mut W) -> Result<()> {
    let expires = args.expires.as_deref();
    let added = if let Some(at) = &args.at {
        service.add_once(user, at, &args.context)?
    } else if let Some(time) = &args.daily {
        service.add_daily(user, time, &args.context, expires)?
    } else if let Some(schedule) = &args.weekly {
        service.add_weekly(user, schedule, &args.context, expires)?
    } else if let Some(schedule) = &args.monthly {
        service.add_monthly(user, schedule, &args.context, expires)?
    } else if let Some(schedule) = &args.yearly {
        service.add_yearly(user, schedule, &args.context, expires)?
    } else {
        anyhow::bail!("one of --at, --daily, --weekly, --monthly or --yearly is required");
    };

    write_created(out, &added.record, &added.schedule.describe())
}

fn check<W: Write>(service: &AlarmService, user: &str, args: CheckArgs, out: &mut W) -> Result<()> {
    let fired = service.check(user)?;
    if fired.is_empty() {
        info!("No alarms to fire for user {user}");
        return Ok(());
    }

    if args.json {
        write_json(out, &fired)
    } else {
        write_fired(out, &fired)
    }
}

fn check_all<W: Write>(service: &AlarmService, args: CheckArgs, out: &mut W) -> Result<()> {
    let firings = service.check_all(service.now())?;
    if firings.is_empty() {
        return Ok(());
    }

    if args.json {
        let views: Vec<UserFiringsView<'_>> = firings
            .iter()
            .map(|entry| UserFiringsView {
                user: &entry.user,
                fired: &entry.fired,
            })
            .collect();
        return write_json(out, &views);
    }

    for UserFirings { user, fired } in &firings {
        writeln!(out, "## {user}")?;
        write_fired(out, fired)?;
    }
    Ok(())
}

fn list<W: Write>(service: &AlarmService, user: &str, args: ListArgs, out: &mut W) -> Result<()> {
    let active = service.list_active(user)?;
    let past = if args.past {
        Some(service.list_past(user)?)
    } else {
        None
    };

    if args.json {
        let view = ListView {
            active: active
                .iter()
                .map(|entry| ActiveView {
                    record: &entry.record,
                    schedule: entry.schedule.to_string(),
                })
                .collect(),
            past: past.as_deref(),
        };
        return write_json(out, &view);
    }

    write_tables(out, &active, past.as_deref())
}

fn cancel<W: Write>(
    service: &AlarmService,
    user: &str,
    args: CancelArgs,
    out: &mut W,
) -> Result<()> {
    let record = service.cancel(user, &args.alarm_id)?;
    writeln!(out, "Alarm cancelled: {} ({})", record.id, record.context)?;
    Ok(())
}

fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    writeln!(out, "{json}")?;
    Ok(())
}

fn timestamp(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

pub fn write_created<W: Write>(out: &mut W, record: &AlarmRecord, schedule: &str) -> Result<()> {
    writeln!(out, "Alarm created")?;
    writeln!(out)?;
    writeln!(out, "ID:         {}", record.id)?;
    writeln!(out, "Type:       {}", record.recurrence)?;
    writeln!(out, "Scheduled:  {schedule}")?;
    writeln!(out, "Context:    {}", record.context)?;
    if let Some(expires_at) = record.expires_at {
        writeln!(out, "Expires:    {}", timestamp(expires_at))?;
    }
    Ok(())
}

/// Cron-friendly report of fired alarms.
pub fn write_fired<W: Write>(out: &mut W, fired: &[AlarmRecord]) -> Result<()> {
    for record in fired {
        writeln!(out, "=== {}", record.context)?;
        writeln!(out, "    ID: {}", record.id)?;
        writeln!(out, "    Recurrence: {}", record.recurrence.label())?;
        if let Some(scheduled_for) = record.scheduled_for {
            writeln!(out, "    Scheduled for: {}", scheduled_for.to_rfc3339())?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn truncate_context(context: &str) -> String {
    if context.chars().count() <= CONTEXT_COLUMN_WIDTH {
        return context.to_string();
    }
    let kept: String = context.chars().take(CONTEXT_COLUMN_WIDTH - 3).collect();
    format!("{kept}...")
}

pub fn write_tables<W: Write>(
    out: &mut W,
    active: &[ActiveAlarm],
    past: Option<&[AlarmRecord]>,
) -> Result<()> {
    let past = past.unwrap_or_default();
    if active.is_empty() && past.is_empty() {
        writeln!(out, "No alarms")?;
        return Ok(());
    }

    if !active.is_empty() {
        writeln!(out, "ACTIVE ALARMS:")?;
        writeln!(out)?;
        writeln!(out, "{:<25} {:<10} {:<20} {}", "ID", "TYPE", "SCHEDULE", "CONTEXT")?;
        writeln!(out, "{}", "-".repeat(100))?;
        for entry in active {
            writeln!(
                out,
                "{:<25} {:<10} {:<20} {}",
                entry.record.id,
                entry.record.recurrence,
                entry.schedule.describe(),
                truncate_context(&entry.record.context)
            )?;
        }
        writeln!(out)?;
    }

    if !past.is_empty() {
        writeln!(out, "PAST ALARMS:")?;
        writeln!(out)?;
        writeln!(out, "{:<25} {:<10} {:<20} {}", "ID", "TYPE", "EXECUTED", "CONTEXT")?;
        writeln!(out, "{}", "-".repeat(100))?;
        for record in past {
            let executed = record.executed_at.map(timestamp).unwrap_or_default();
            writeln!(
                out,
                "{:<25} {:<10} {:<20} {}",
                record.id,
                record.recurrence,
                executed,
                truncate_context(&record.context)
            )?;
        }
        writeln!(out)?;
    }

    Ok(())
}
