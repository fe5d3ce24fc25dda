pub mod alarms;
pub mod check;
