use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AlarmError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Once,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    /// Every kind, in the order the store scans them.
    pub const ALL: [Recurrence; 5] = [
        Recurrence::Once,
        Recurrence::Daily,
        Recurrence::Weekly,
        Recurrence::Monthly,
        Recurrence::Yearly,
    ];

    pub const RECURRING: [Recurrence; 4] = [
        Recurrence::Daily,
        Recurrence::Weekly,
        Recurrence::Monthly,
        Recurrence::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Once => "once",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
            Recurrence::Yearly => "yearly",
        }
    }

    /// Human-facing label used in check reports.
    pub fn label(&self) -> &'static str {
        match self {
            Recurrence::Once => "One-time",
            Recurrence::Daily => "Daily",
            Recurrence::Weekly => "Weekly",
            Recurrence::Monthly => "Monthly",
            Recurrence::Yearly => "Yearly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Recurrence::Once)
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = AlarmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(Recurrence::Once),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            "yearly" => Ok(Recurrence::Yearly),
            other => Err(AlarmError::InvalidInput(format!(
                "unknown recurrence '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds() {
        for kind in Recurrence::ALL {
            assert_eq!(kind.as_str().parse::<Recurrence>().unwrap(), kind);
        }
        assert_eq!(" Weekly ".parse::<Recurrence>().unwrap(), Recurrence::Weekly);
    }

    #[test]
    fn rejects_unknown_kinds() {
        assert!("hourly".parse::<Recurrence>().is_err());
        assert!("".parse::<Recurrence>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Recurrence::Monthly).unwrap();
        assert_eq!(json, "\"monthly\"");
        assert!(serde_json::from_str::<Recurrence>("\"invalid\"").is_err());
    }

    #[test]
    fn once_is_not_recurring() {
        assert!(!Recurrence::Once.is_recurring());
        assert!(Recurrence::RECURRING.iter().all(Recurrence::is_recurring));
    }
}
