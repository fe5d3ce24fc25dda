pub mod commands;
pub mod controller;
pub mod parse;

pub use controller::{AlarmService, UserFirings};
