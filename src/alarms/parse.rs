//! Schedule strings accepted on the command line.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::{
    error::{AlarmError, AlarmResult},
    schedule::{parse_weekday, ScheduleKey},
};

const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

fn invalid(message: impl Into<String>) -> AlarmError {
    AlarmError::InvalidInput(message.into())
}

/// Resolve a wall-clock time in the local zone. Ambiguous times (clocks
/// going back) take the earlier instant.
pub fn resolve_local(naive: NaiveDateTime) -> AlarmResult<DateTime<Local>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| invalid(format!("{} does not exist in the local time zone", naive)))
}

/// Absolute local date-time: `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM`, with
/// optional `:SS`.
pub fn parse_date_time(input: &str) -> AlarmResult<DateTime<Local>> {
    let input = input.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .ok_or_else(|| invalid(format!("invalid date-time '{input}' (use YYYY-MM-DD HH:MM)")))
        .and_then(resolve_local)
}

/// One-time alarm instant. Besides absolute date-times this accepts
/// `today HH:MM`, `tomorrow HH:MM` and offsets `+30m`, `+2h`, `+1d`.
pub fn parse_when(input: &str, now: DateTime<Local>) -> AlarmResult<DateTime<Local>> {
    let input = input.trim();

    if let Some(offset) = input.strip_prefix('+') {
        return parse_offset(offset).map(|duration| now + duration);
    }

    let mut words = input.split_whitespace();
    let day = match words.next().map(|word| word.to_ascii_lowercase()).as_deref() {
        Some("today") => Some(now.date_naive()),
        Some("tomorrow") => now.date_naive().succ_opt(),
        _ => None,
    };
    if let Some(day) = day {
        let clock = words
            .next()
            .ok_or_else(|| invalid(format!("missing time in '{input}' (use HH:MM)")))?;
        if words.next().is_some() {
            return Err(invalid(format!("unexpected text in '{input}'")));
        }
        let (hour, minute) = parse_clock(clock)?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| invalid(format!("invalid time '{clock}'")))?;
        return resolve_local(day.and_time(time));
    }

    parse_date_time(input)
}

fn parse_offset(offset: &str) -> AlarmResult<Duration> {
    let bad = || invalid(format!("invalid offset '+{offset}' (use +Nm, +Nh or +Nd)"));
    if offset.len() < 2 {
        return Err(bad());
    }
    let (amount, unit) = offset.split_at(offset.len() - 1);
    if !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let amount: i64 = amount.parse().map_err(|_| bad())?;
    if amount == 0 || amount > 366 * 24 * 60 {
        return Err(bad());
    }
    match unit {
        "m" => Ok(Duration::minutes(amount)),
        "h" => Ok(Duration::hours(amount)),
        "d" => Ok(Duration::days(amount)),
        _ => Err(bad()),
    }
}

/// Expiry instant. A bare `YYYY-MM-DD` means the end of that day.
pub fn parse_expires(input: &str) -> AlarmResult<DateTime<Local>> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59)
            .ok_or_else(|| invalid("invalid end of day"))?;
        return resolve_local(date.and_time(end_of_day));
    }
    parse_date_time(input)
}

/// `HH:MM`, one- or two-digit components.
pub fn parse_clock(input: &str) -> AlarmResult<(u32, u32)> {
    let input = input.trim();
    let (hour, minute) = input
        .split_once(':')
        .ok_or_else(|| invalid(format!("invalid time '{input}' (must be HH:MM)")))?;
    let hour = parse_number(hour, "hour")?;
    let minute = parse_number(minute, "minute")?;
    if hour > 23 {
        return Err(invalid(format!("invalid hour: {hour} (must be 0-23)")));
    }
    if minute > 59 {
        return Err(invalid(format!("invalid minute: {minute} (must be 0-59)")));
    }
    Ok((hour, minute))
}

fn parse_number(text: &str, field: &str) -> AlarmResult<u32> {
    if text.is_empty() || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!("invalid {field}: '{text}'")));
    }
    text.parse()
        .map_err(|_| invalid(format!("invalid {field}: '{text}'")))
}

fn two_fields<'a>(input: &'a str, usage: &str) -> AlarmResult<(&'a str, &'a str)> {
    let mut fields = input.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(first), Some(second), None) => Ok((first, second)),
        _ => Err(invalid(format!("invalid schedule '{}' (must be {usage})", input.trim()))),
    }
}

/// `HH:MM`
pub fn parse_daily(input: &str) -> AlarmResult<ScheduleKey> {
    let (hour, minute) = parse_clock(input)?;
    ScheduleKey::daily(hour, minute)
}

/// `<weekday> HH:MM`
pub fn parse_weekly(input: &str) -> AlarmResult<ScheduleKey> {
    let (day, clock) = two_fields(input, "DAYNAME HH:MM")?;
    let weekday = parse_weekday(day)?;
    let (hour, minute) = parse_clock(clock)?;
    ScheduleKey::weekly(weekday, hour, minute)
}

/// `D HH:MM`
pub fn parse_monthly(input: &str) -> AlarmResult<ScheduleKey> {
    let (day, clock) = two_fields(input, "DAY HH:MM")?;
    let day = parse_number(day, "day of month")?;
    let (hour, minute) = parse_clock(clock)?;
    ScheduleKey::monthly(day, hour, minute)
}

/// `MM-DD HH:MM`
pub fn parse_yearly(input: &str) -> AlarmResult<ScheduleKey> {
    let (date, clock) = two_fields(input, "MM-DD HH:MM")?;
    let (month, day) = date
        .split_once('-')
        .ok_or_else(|| invalid(format!("invalid date '{date}' (must be MM-DD)")))?;
    let month = parse_number(month, "month")?;
    let day = parse_number(day, "day")?;
    let (hour, minute) = parse_clock(clock)?;
    ScheduleKey::yearly(month, day, hour, minute)
}
