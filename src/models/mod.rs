pub mod alarm;
pub mod recurrence;

pub use alarm::{AlarmRecord, MAX_CONTEXT_CHARS};
pub use recurrence::Recurrence;
