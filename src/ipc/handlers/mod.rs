pub mod accounts;
pub mod core;
pub mod progress;
pub mod schedule;
pub mod sessions;
pub mod units;
