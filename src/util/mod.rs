//! Utility functions.

pub mod time;

pub use time::{day_window, format_period_label, format_timestamp, start_of_day, today};
