//! Calendar-day windows and timestamp formatting in local time.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};

use crate::core::models::Window;
use crate::error::{PbxError, Result};

/// Epoch seconds of local midnight on `date`.
///
/// # Errors
/// Returns [`PbxError::InvalidDate`] if local midnight does not exist on that date.
pub fn start_of_day(date: NaiveDate) -> Result<i64> {
    local_timestamp(date, NaiveTime::MIN)
}

/// Local `00:00:00`..=`23:59:59` of `date`.
///
/// # Errors
/// Returns [`PbxError::InvalidDate`] if either boundary cannot be resolved.
pub fn day_window(date: NaiveDate) -> Result<Window> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59)
        .ok_or_else(|| PbxError::InvalidDate("23:59:59".to_string()))?;
    Ok(Window::new(
        start_of_day(date)?,
        local_timestamp(date, last_second)?,
    ))
}

fn local_timestamp(date: NaiveDate, time: NaiveTime) -> Result<i64> {
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| PbxError::InvalidDate(format!("{date} {time} does not exist locally")))
}

fn to_local(timestamp: i64) -> Option<DateTime<Local>> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.with_timezone(&Local))
}

/// Format a timestamp as `HH:MM:SS dd.mm.yy`, falling back to the raw number.
#[must_use]
pub fn format_timestamp(timestamp: i64) -> String {
    to_local(timestamp).map_or_else(
        || timestamp.to_string(),
        |dt| dt.format("%H:%M:%S %d.%m.%y").to_string(),
    )
}

/// Label for a window: `dd.mm.YYYY HH:MM-HH:MM` within one day,
/// `dd.mm.YYYY HH:MM-dd.mm.YYYY HH:MM` across days.
#[must_use]
pub fn format_period_label(window: Window) -> String {
    let (Some(start), Some(end)) = (to_local(window.start), to_local(window.end)) else {
        return String::new();
    };

    if start.date_naive() == end.date_naive() {
        format!(
            "{} {}-{}",
            start.format("%d.%m.%Y"),
            start.format("%H:%M"),
            end.format("%H:%M")
        )
    } else {
        format!(
            "{}-{}",
            start.format("%d.%m.%Y %H:%M"),
            end.format("%d.%m.%Y %H:%M")
        )
    }
}

/// Today's date in local time.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
