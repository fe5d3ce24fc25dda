mod common;

use std::fs;

use clap::Parser;
use common::{local, Harness};
use tickler::{
    alarms::commands::execute,
    cli::{Cli, Command},
    db::Location,
    models::Recurrence,
    settings::Settings,
};

fn run(h: &Harness, args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("tickler").chain(args.iter().copied()))?;
    let settings = Settings {
        user: cli.user.clone().or_else(|| Some("u1".into())),
        ..Settings::default()
    };
    let mut out = Vec::new();
    match cli.command {
        Command::Alarm(command) => execute(&h.service, &settings, command, &mut out)?,
    }
    Ok(String::from_utf8(out)?)
}

#[test]
fn add_then_list_as_table_and_json() {
    let h = Harness::sqlite(local(2025, 11, 21, 8, 0));

    let created = run(&h, &["alarm", "add", "--daily", "14:30", "--context", "standup"]).unwrap();
    assert!(created.starts_with("Alarm created"));
    assert!(created.contains("Scheduled:  every day 14:30"));

    let table = run(&h, &["alarm", "list"]).unwrap();
    assert!(table.contains("ACTIVE ALARMS:"));
    assert!(table.contains("daily"));
    assert!(table.contains("standup"));

    let json = run(&h, &["alarm", "list", "--json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["active"][0]["context"], "standup");
    assert_eq!(value["active"][0]["schedule"], "14-30-00");
    assert!(value.get("past").is_none());
}

#[test]
fn check_is_silent_when_nothing_is_due() {
    let h = Harness::sqlite(local(2025, 11, 21, 8, 0));
    run(&h, &["alarm", "add", "--daily", "14:30", "--context", "standup"]).unwrap();

    assert_eq!(run(&h, &["alarm", "check"]).unwrap(), "");
}

#[test]
fn check_prints_text_and_json_reports() {
    let h = Harness::sqlite(local(2025, 11, 21, 8, 0));
    run(&h, &["alarm", "add", "--at", "+1h", "--context", "stretch"]).unwrap();
    run(&h, &["alarm", "add", "--daily", "09:00", "--context", "standup"]).unwrap();

    h.clock.set(local(2025, 11, 21, 9, 0));
    let text = run(&h, &["alarm", "check"]).unwrap();
    assert!(text.contains("=== stretch\n"));
    assert!(text.contains("    Recurrence: One-time\n"));
    assert!(text.contains("=== standup\n"));
    assert!(text.contains("    Recurrence: Daily\n"));

    h.clock.set(local(2025, 11, 22, 9, 0));
    let json = run(&h, &["alarm", "check", "--json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value.as_array().map(Vec::len), Some(1));
    assert_eq!(value[0]["recurrence"], "daily");
    assert!(value[0]["scheduled_for"].is_string());
}

#[test]
fn list_past_after_firing() {
    let h = Harness::sqlite(local(2025, 11, 21, 8, 0));
    run(&h, &["alarm", "add", "--at", "2025-11-21 08:30", "--context", "tea"]).unwrap();
    h.clock.set(local(2025, 11, 21, 8, 30));
    run(&h, &["alarm", "check"]).unwrap();

    let table = run(&h, &["alarm", "list", "--past"]).unwrap();
    assert!(!table.contains("ACTIVE ALARMS:"));
    assert!(table.contains("PAST ALARMS:"));
    assert!(table.contains("2025-11-21 08:30"));

    let json = run(&h, &["alarm", "list", "--past", "--json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["active"].as_array().map(Vec::len), Some(0));
    assert_eq!(value["past"][0]["context"], "tea");
}

#[test]
fn cancel_reports_and_errors() {
    let h = Harness::sqlite(local(2025, 11, 21, 8, 0));
    let record = h.service.add_weekly("u1", "monday 09:00", "review", None).unwrap().record;

    let out = run(&h, &["alarm", "cancel", &record.id]).unwrap();
    assert!(out.contains(&record.id));

    let err = run(&h, &["alarm", "cancel", &record.id]).unwrap_err();
    assert!(err.to_string().contains("alarm not found"));
    assert_eq!(run(&h, &["alarm", "list"]).unwrap(), "No alarms\n");
}

#[test]
fn bad_input_surfaces_as_error() {
    let h = Harness::sqlite(local(2025, 11, 21, 8, 0));
    let err = run(&h, &["alarm", "add", "--monthly", "32 09:00", "--context", "x"]).unwrap_err();
    assert!(err.to_string().starts_with("invalid input"));
}

#[test]
fn check_all_users_groups_output() {
    let h = Harness::sqlite(local(2025, 11, 21, 8, 0));
    h.service.add_daily("alice", "09:00", "a", None).unwrap();
    h.service.add_daily("bob", "09:00", "b", None).unwrap();
    h.clock.set(local(2025, 11, 21, 9, 0));

    let text = run(&h, &["alarm", "check", "--all-users"]).unwrap();
    assert!(text.contains("## alice\n=== a\n"));
    assert!(text.contains("## bob\n=== b\n"));
}

#[test]
fn stray_file_in_active_storage_does_not_break_add_or_list() {
    let h = Harness::files(local(2025, 11, 21, 8, 0));
    let stray = h.fs().bucket_path("u1", Location::active(Recurrence::Once), "notes");
    fs::create_dir_all(stray.parent().unwrap()).unwrap();
    fs::write(&stray, "[]").unwrap();

    let created = run(&h, &["alarm", "add", "--daily", "09:00", "--context", "standup"]).unwrap();
    assert!(created.starts_with("Alarm created"));
    assert!(created.contains("Scheduled:  every day 09:00"));

    let table = run(&h, &["alarm", "list"]).unwrap();
    assert!(table.contains("standup"));
    assert!(!table.contains("notes"));

    assert_eq!(h.service.check_at("u1", local(2025, 11, 21, 9, 0)).unwrap().len(), 1);
    assert!(stray.is_file());
}
