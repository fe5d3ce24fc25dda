use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};

use crate::{
    error::{AlarmError, AlarmResult},
    models::Recurrence,
};

const ONCE_FORMAT: &str = "%Y-%m-%d_%H-%M-00";
const MARKER_PREFIX: &str = "fired_";

/// Canonical identity of an alarm slot. The `Display` form is the bucket name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleKey {
    Once(NaiveDateTime),
    Daily { hour: u32, minute: u32 },
    Weekly { weekday: Weekday, hour: u32, minute: u32 },
    Monthly { day: u32, hour: u32, minute: u32 },
    Yearly { month: u32, day: u32, hour: u32, minute: u32 },
}

impl ScheduleKey {
    /// Slot that `instant` falls into for the given recurrence kind.
    pub fn for_instant(recurrence: Recurrence, instant: NaiveDateTime) -> Self {
        let instant = truncate_to_minute(instant);
        let (hour, minute) = (instant.hour(), instant.minute());
        match recurrence {
            Recurrence::Once => ScheduleKey::Once(instant),
            Recurrence::Daily => ScheduleKey::Daily { hour, minute },
            Recurrence::Weekly => ScheduleKey::Weekly {
                weekday: instant.weekday(),
                hour,
                minute,
            },
            Recurrence::Monthly => ScheduleKey::Monthly {
                day: instant.day(),
                hour,
                minute,
            },
            Recurrence::Yearly => ScheduleKey::Yearly {
                month: instant.month(),
                day: instant.day(),
                hour,
                minute,
            },
        }
    }

    pub fn once(at: NaiveDateTime) -> Self {
        ScheduleKey::Once(truncate_to_minute(at))
    }

    pub fn daily(hour: u32, minute: u32) -> AlarmResult<Self> {
        check_clock(hour, minute)?;
        Ok(ScheduleKey::Daily { hour, minute })
    }

    pub fn weekly(weekday: Weekday, hour: u32, minute: u32) -> AlarmResult<Self> {
        check_clock(hour, minute)?;
        Ok(ScheduleKey::Weekly {
            weekday,
            hour,
            minute,
        })
    }

    pub fn monthly(day: u32, hour: u32, minute: u32) -> AlarmResult<Self> {
        if !(1..=31).contains(&day) {
            return Err(AlarmError::InvalidInput(format!(
                "invalid day of month: {day} (must be 1-31)"
            )));
        }
        check_clock(hour, minute)?;
        Ok(ScheduleKey::Monthly { day, hour, minute })
    }

    /// February 29 is accepted; it only matches in leap years.
    pub fn yearly(month: u32, day: u32, hour: u32, minute: u32) -> AlarmResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(AlarmError::InvalidInput(format!(
                "invalid month: {month} (must be 1-12)"
            )));
        }
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(AlarmError::InvalidInput(format!(
                "invalid day {day} for month {month:02}"
            )));
        }
        check_clock(hour, minute)?;
        Ok(ScheduleKey::Yearly {
            month,
            day,
            hour,
            minute,
        })
    }

    pub fn recurrence(&self) -> Recurrence {
        match self {
            ScheduleKey::Once(_) => Recurrence::Once,
            ScheduleKey::Daily { .. } => Recurrence::Daily,
            ScheduleKey::Weekly { .. } => Recurrence::Weekly,
            ScheduleKey::Monthly { .. } => Recurrence::Monthly,
            ScheduleKey::Yearly { .. } => Recurrence::Yearly,
        }
    }

    /// Inverse of `Display` for the given kind.
    pub fn parse(recurrence: Recurrence, text: &str) -> AlarmResult<Self> {
        let invalid = || {
            AlarmError::InvalidInput(format!("'{text}' is not a valid {recurrence} slot key"))
        };

        match recurrence {
            Recurrence::Once => NaiveDateTime::parse_from_str(text, ONCE_FORMAT)
                .map(ScheduleKey::Once)
                .map_err(|_| invalid()),
            Recurrence::Daily => {
                let (hour, minute) = parse_slot_clock(text).ok_or_else(invalid)?;
                ScheduleKey::daily(hour, minute)
            }
            Recurrence::Weekly => {
                let (name, clock) = text.split_once('_').ok_or_else(invalid)?;
                if name != name.to_ascii_lowercase() {
                    return Err(invalid());
                }
                let weekday = parse_weekday(name)?;
                let (hour, minute) = parse_slot_clock(clock).ok_or_else(invalid)?;
                ScheduleKey::weekly(weekday, hour, minute)
            }
            Recurrence::Monthly => {
                let (day, clock) = text.split_once('_').ok_or_else(invalid)?;
                let day = two_digits(day).ok_or_else(invalid)?;
                let (hour, minute) = parse_slot_clock(clock).ok_or_else(invalid)?;
                ScheduleKey::monthly(day, hour, minute)
            }
            Recurrence::Yearly => {
                let (date, clock) = text.split_once('_').ok_or_else(invalid)?;
                let (month, day) = date.split_once('-').ok_or_else(invalid)?;
                let month = two_digits(month).ok_or_else(invalid)?;
                let day = two_digits(day).ok_or_else(invalid)?;
                let (hour, minute) = parse_slot_clock(clock).ok_or_else(invalid)?;
                ScheduleKey::yearly(month, day, hour, minute)
            }
        }
    }

    /// Short human description, e.g. `monday 09:00` or `2025-11-23 14:30`.
    pub fn describe(&self) -> String {
        match self {
            ScheduleKey::Once(at) => at.format("%Y-%m-%d %H:%M").to_string(),
            ScheduleKey::Daily { hour, minute } => format!("every day {hour:02}:{minute:02}"),
            ScheduleKey::Weekly {
                weekday,
                hour,
                minute,
            } => format!("{} {hour:02}:{minute:02}", weekday_name(*weekday)),
            ScheduleKey::Monthly { day, hour, minute } => {
                format!("day {day} {hour:02}:{minute:02}")
            }
            ScheduleKey::Yearly {
                month,
                day,
                hour,
                minute,
            } => format!("{month:02}-{day:02} {hour:02}:{minute:02}"),
        }
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleKey::Once(at) => write!(f, "{}", at.format(ONCE_FORMAT)),
            ScheduleKey::Daily { hour, minute } => write!(f, "{hour:02}-{minute:02}-00"),
            ScheduleKey::Weekly {
                weekday,
                hour,
                minute,
            } => write!(f, "{}_{hour:02}-{minute:02}-00", weekday_name(*weekday)),
            ScheduleKey::Monthly { day, hour, minute } => {
                write!(f, "{day:02}_{hour:02}-{minute:02}-00")
            }
            ScheduleKey::Yearly {
                month,
                day,
                hour,
                minute,
            } => write!(f, "{month:02}-{day:02}_{hour:02}-{minute:02}-00"),
        }
    }
}

/// Bucket name of the idempotency marker for a recurring slot fired at `instant`.
///
/// The full date and time are part of the name, so a marker written today for
/// the daily `14-30-00` slot never hides tomorrow's firing.
pub fn marker_key(instant: NaiveDateTime) -> String {
    format!(
        "{MARKER_PREFIX}{}",
        truncate_to_minute(instant).format(ONCE_FORMAT)
    )
}

pub fn truncate_to_minute<T: Timelike>(instant: T) -> T {
    match instant.with_nanosecond(0).and_then(|t| t.with_second(0)) {
        Some(truncated) => truncated,
        None => instant,
    }
}

pub fn parse_weekday(value: &str) -> AlarmResult<Weekday> {
    match value.trim().to_ascii_lowercase().as_str() {
        "sunday" => Ok(Weekday::Sun),
        "monday" => Ok(Weekday::Mon),
        "tuesday" => Ok(Weekday::Tue),
        "wednesday" => Ok(Weekday::Wed),
        "thursday" => Ok(Weekday::Thu),
        "friday" => Ok(Weekday::Fri),
        "saturday" => Ok(Weekday::Sat),
        _ => Err(AlarmError::InvalidInput(format!(
            "invalid weekday: {}",
            value.trim()
        ))),
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn check_clock(hour: u32, minute: u32) -> AlarmResult<()> {
    if hour > 23 {
        return Err(AlarmError::InvalidInput(format!(
            "invalid hour: {hour} (must be 0-23)"
        )));
    }
    if minute > 59 {
        return Err(AlarmError::InvalidInput(format!(
            "invalid minute: {minute} (must be 0-59)"
        )));
    }
    Ok(())
}

/// `HH-MM-00`
fn parse_slot_clock(text: &str) -> Option<(u32, u32)> {
    let mut parts = text.split('-');
    let hour = two_digits(parts.next()?)?;
    let minute = two_digits(parts.next()?)?;
    if parts.next()? != "00" || parts.next().is_some() {
        return None;
    }
    Some((hour, minute))
}

fn two_digits(text: &str) -> Option<u32> {
    if text.len() != 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
