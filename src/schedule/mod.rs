pub mod key;

pub use key::{marker_key, parse_weekday, truncate_to_minute, weekday_name, ScheduleKey};
