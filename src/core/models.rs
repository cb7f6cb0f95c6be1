//! Core data models.
//!
//! Call records as persisted and surfaced, the windows that scope a query,
//! and the aggregate shapes handed back to the dashboard layer.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ExitCode, PbxError, Result};
use crate::util::time::{day_window, format_timestamp, start_of_day};

/// The only call direction this system surfaces.
pub const OUTBOUND: &str = "outbound";

/// Billed seconds above which a call counts as "long".
pub const LONG_CALL_THRESHOLD_SECS: i64 = 45;

// =============================================================================
// Windows
// =============================================================================

/// A `[start, end]` pair of epoch-second timestamps, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: i64,
    pub end: i64,
}

impl Window {
    /// Create a window from epoch seconds.
    #[must_use]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Whether a timestamp falls inside the window.
    #[must_use]
    pub const fn contains(&self, stamp: i64) -> bool {
        stamp >= self.start && stamp <= self.end
    }
}

/// What the dashboard asked for, before it is pinned to a concrete window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallQuery {
    /// Trailing window ending `offset_seconds` before now. Never writes aggregates.
    Rolling { seconds: i64, offset_seconds: i64 },
    /// Fixed window tagged with the calendar day its aggregates belong to.
    Period {
        start: i64,
        end: i64,
        date: NaiveDate,
    },
}

impl CallQuery {
    /// Last 10 minutes.
    pub const LAST_10_MINUTES: Self = Self::rolling(600);
    /// Last hour.
    pub const LAST_HOUR: Self = Self::rolling(3600);
    /// Last 4 hours.
    pub const LAST_4_HOURS: Self = Self::rolling(14_400);
    /// Last 8 hours.
    pub const LAST_8_HOURS: Self = Self::rolling(28_800);

    /// Trailing window of `seconds` ending now.
    #[must_use]
    pub const fn rolling(seconds: i64) -> Self {
        Self::Rolling {
            seconds,
            offset_seconds: 0,
        }
    }

    /// Local midnight until `now`, tagged with today's date.
    ///
    /// # Errors
    /// Returns an error if local midnight does not exist for the current date.
    pub fn today(now: DateTime<Local>) -> Result<Self> {
        let date = now.date_naive();
        Ok(Self::Period {
            start: start_of_day(date)?,
            end: now.timestamp(),
            date,
        })
    }

    /// The whole local calendar day before `now`.
    ///
    /// # Errors
    /// Returns an error if the day boundaries cannot be resolved.
    pub fn yesterday(now: DateTime<Local>) -> Result<Self> {
        Self::days_ago(now, 1)
    }

    /// The whole local calendar day two days before `now`.
    ///
    /// # Errors
    /// Returns an error if the day boundaries cannot be resolved.
    pub fn day_before_yesterday(now: DateTime<Local>) -> Result<Self> {
        Self::days_ago(now, 2)
    }

    fn days_ago(now: DateTime<Local>, days: u64) -> Result<Self> {
        let date = now
            .date_naive()
            .checked_sub_days(chrono::Days::new(days))
            .ok_or_else(|| PbxError::InvalidDate(format!("{days} days before {now}")))?;
        Self::whole_day(date)
    }

    /// A whole past or current calendar day. Future dates are rejected.
    ///
    /// # Errors
    /// Returns [`PbxError::InvalidDate`] if `date` is after `today`.
    pub fn for_date(date: NaiveDate, today: NaiveDate) -> Result<Self> {
        if date > today {
            return Err(PbxError::InvalidDate(format!(
                "{date} is in the future"
            )));
        }
        Self::whole_day(date)
    }

    fn whole_day(date: NaiveDate) -> Result<Self> {
        let window = day_window(date)?;
        Ok(Self::Period {
            start: window.start,
            end: window.end,
            date,
        })
    }

    /// Pin the query to a concrete window.
    #[must_use]
    pub const fn resolve(&self, now: i64) -> Window {
        match *self {
            Self::Rolling {
                seconds,
                offset_seconds,
            } => {
                let end = now - offset_seconds;
                Window::new(end - seconds, end)
            }
            Self::Period { start, end, .. } => Window::new(start, end),
        }
    }

    /// Date tag for aggregate write-through, if this query carries one.
    #[must_use]
    pub const fn aggregate_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Rolling { .. } => None,
            Self::Period { date, .. } => Some(*date),
        }
    }
}

// =============================================================================
// Call records
// =============================================================================

/// Upstream call record as returned by the search endpoint.
///
/// Every field is optional upstream; normalization into [`CallRecord`]
/// applies the documented fallbacks. Upstream is loose about scalar types,
/// so numbers may arrive as strings and identifiers as numbers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCall {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub start_stamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub end_stamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub caller_id_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub caller_id_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub destination_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub billsec: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub duration: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub accountcode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gateway: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_as_string(&value))
}

/// Integers, integral strings, and floats (truncated). Anything else is absent.
fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value_as_i64(&value))
}

#[allow(clippy::cast_possible_truncation)]
fn value_as_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

/// Whether a raw search element is an outbound call, judged before parsing.
#[must_use]
pub fn is_outbound_payload(payload: &serde_json::Value) -> bool {
    payload
        .get("accountcode")
        .and_then(serde_json::Value::as_str)
        == Some(OUTBOUND)
}

/// One PBX call leg, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Upstream id, or a deterministic hash when upstream has none.
    pub id: String,
    pub start_stamp: i64,
    pub end_stamp: i64,
    /// `gateway`, else `caller_id_number`, else `caller_id_name`.
    pub originating_number: String,
    pub destination_number: String,
    /// `billsec`, else `duration`.
    pub billed_seconds: i64,
    pub duration_seconds: i64,
    pub account_class: String,
    pub gateway: Option<String>,
    pub caller_name: Option<String>,
    /// Trunk description, resolved from the trunk directory at read time.
    #[serde(default)]
    pub description: String,
    /// Start time as `HH:MM:SS dd.mm.yy` in local time.
    #[serde(default)]
    pub formatted_start: String,
    /// The upstream object exactly as received.
    pub payload: serde_json::Value,
}

impl CallRecord {
    /// Normalize one upstream payload object.
    ///
    /// # Errors
    /// Returns [`PbxError::ParseResponse`] if the object does not have the
    /// shape of a call record.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self> {
        let raw: RawCall = serde_json::from_value(payload.clone())
            .map_err(|e| PbxError::ParseResponse(format!("call record: {e}")))?;
        Ok(Self::normalize(raw, payload))
    }

    fn normalize(raw: RawCall, payload: serde_json::Value) -> Self {
        let originating_number = first_non_empty([
            raw.gateway.as_deref(),
            raw.caller_id_number.as_deref(),
            raw.caller_id_name.as_deref(),
        ])
        .unwrap_or_default()
        .to_string();
        let start_stamp = raw.start_stamp.unwrap_or(0);
        let destination_number = raw.destination_number.unwrap_or_default();

        let id = first_non_empty([raw.id.as_deref(), raw.uuid.as_deref()]).map_or_else(
            || derive_record_id(start_stamp, &originating_number, &destination_number),
            str::to_string,
        );

        Self {
            id,
            start_stamp,
            end_stamp: raw.end_stamp.unwrap_or(0),
            originating_number,
            destination_number,
            billed_seconds: raw.billsec.or(raw.duration).unwrap_or(0),
            duration_seconds: raw.duration.unwrap_or(0),
            account_class: raw.accountcode.unwrap_or_default(),
            gateway: raw.gateway,
            caller_name: raw.caller_id_name,
            description: String::new(),
            formatted_start: format_timestamp(start_stamp),
            payload,
        }
    }

    /// Whether this is an outbound call (the only direction surfaced).
    #[must_use]
    pub fn is_outbound(&self) -> bool {
        self.account_class == OUTBOUND
    }

    /// Whether the call is billed above the long-call threshold.
    #[must_use]
    pub const fn is_long(&self) -> bool {
        self.billed_seconds > LONG_CALL_THRESHOLD_SECS
    }
}

fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
}

/// Stable id for records upstream did not identify.
#[must_use]
pub fn derive_record_id(start_stamp: i64, originating: &str, destination: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{start_stamp}_{originating}_{destination}").as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

// =============================================================================
// Aggregates
// =============================================================================

/// Per-number rollup over a set of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerStat {
    pub number: String,
    pub description: String,
    pub total_calls: i64,
    pub calls_over_threshold: i64,
    /// Share of long calls, rounded to one decimal place.
    pub percentage_over_threshold: f64,
}

/// Totals shown on a single day's detail view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayStats {
    pub date: NaiveDate,
    pub stats: Vec<CallerStat>,
    pub total_calls: i64,
    pub total_calls_over_threshold: i64,
}

/// One date in the stats overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsDate {
    pub date: NaiveDate,
    pub window: Window,
    pub total_calls: i64,
}

/// Counts stored for one (date, number) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCell {
    pub total_calls: i64,
    pub calls_over_threshold: i64,
    pub percentage_over_threshold: f64,
}

/// One number across every stored date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRow {
    pub number: String,
    pub description: String,
    /// Aligned with [`StatsMatrix::dates`]; `None` means nothing was recorded.
    pub cells: Vec<Option<DayCell>>,
}

/// Number × date overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsMatrix {
    pub rows: Vec<MatrixRow>,
    /// Newest first.
    pub dates: Vec<NaiveDate>,
}

// =============================================================================
// Trunks
// =============================================================================

/// A trunk (external number) known to the PBX.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trunk {
    pub number: String,
    pub description: String,
    /// The upstream object exactly as received.
    pub payload: serde_json::Value,
}

impl Trunk {
    /// Build from an upstream trunk object. Objects without a number are skipped.
    #[must_use]
    pub fn from_payload(payload: serde_json::Value) -> Option<Self> {
        let number = payload.get("number").and_then(value_as_string)?;
        if number.is_empty() {
            return None;
        }
        let description = payload
            .get("description")
            .and_then(value_as_string)
            .unwrap_or_default();
        Some(Self {
            number,
            description,
            payload,
        })
    }
}

fn value_as_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Where the records in a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Cache,
    Upstream,
}

/// A surfaced failure, attached to a report instead of failing the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportError {
    pub code: String,
    pub message: String,
    /// Exit code the binary uses when this error ends a command.
    #[serde(skip)]
    pub exit_code: ExitCode,
}

impl From<&PbxError> for ReportError {
    fn from(err: &PbxError) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
            exit_code: err.exit_code(),
        }
    }
}

/// Everything a dashboard view needs for one window.
#[derive(Debug, Clone, Serialize)]
pub struct CallsReport {
    pub window: Window,
    pub label: String,
    pub source: Option<DataSource>,
    pub records: Vec<CallRecord>,
    pub caller_stats: Vec<CallerStat>,
    pub error: Option<ReportError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn originating_number_prefers_gateway() {
        let record = CallRecord::from_payload(json!({
            "uuid": "a",
            "gateway": "74951234567",
            "caller_id_number": "101",
            "caller_id_name": "Reception",
            "accountcode": "outbound"
        }))
        .unwrap();
        assert_eq!(record.originating_number, "74951234567");
    }

    #[test]
    fn originating_number_skips_empty_values() {
        let record = CallRecord::from_payload(json!({
            "uuid": "a",
            "gateway": "",
            "caller_id_number": "",
            "caller_id_name": "Reception"
        }))
        .unwrap();
        assert_eq!(record.originating_number, "Reception");
    }

    #[test]
    fn billed_seconds_falls_back_to_duration() {
        let with_billsec =
            CallRecord::from_payload(json!({"uuid": "a", "billsec": 0, "duration": 30})).unwrap();
        assert_eq!(with_billsec.billed_seconds, 0);

        let without =
            CallRecord::from_payload(json!({"uuid": "b", "duration": 30})).unwrap();
        assert_eq!(without.billed_seconds, 30);
        assert_eq!(without.duration_seconds, 30);
    }

    #[test]
    fn missing_id_is_derived_deterministically() {
        let payload = json!({
            "start_stamp": 1_700_000_000,
            "caller_id_number": "74951234567",
            "destination_number": "79990001122"
        });
        let first = CallRecord::from_payload(payload.clone()).unwrap();
        let second = CallRecord::from_payload(payload).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.id.len(), 32);
        assert_eq!(
            first.id,
            derive_record_id(1_700_000_000, "74951234567", "79990001122")
        );
    }

    #[test]
    fn payload_is_preserved() {
        let payload = json!({"uuid": "x", "extra": {"nested": true}});
        let record = CallRecord::from_payload(payload.clone()).unwrap();
        assert_eq!(record.payload, payload);
    }

    #[test]
    fn rolling_query_honours_offset() {
        let query = CallQuery::Rolling {
            seconds: 600,
            offset_seconds: 60,
        };
        assert_eq!(query.resolve(10_000), Window::new(9_340, 9_940));
        assert_eq!(query.aggregate_date(), None);
    }

    #[test]
    fn future_dates_are_rejected() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert!(matches!(
            CallQuery::for_date(tomorrow, today),
            Err(PbxError::InvalidDate(_))
        ));
        let query = CallQuery::for_date(today, today).unwrap();
        assert_eq!(query.aggregate_date(), Some(today));
    }

    #[test]
    fn yesterday_is_a_whole_local_day() {
        let now = Local.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
        let query = CallQuery::yesterday(now).unwrap();
        let window = query.resolve(now.timestamp());
        assert_eq!(window.end - window.start, 86_399);
        assert_eq!(
            query.aggregate_date(),
            NaiveDate::from_ymd_opt(2024, 3, 9)
        );
    }

    #[test]
    fn trunk_without_number_is_skipped() {
        assert!(Trunk::from_payload(json!({"description": "x"})).is_none());
        let trunk = Trunk::from_payload(json!({"number": 74951234567_i64})).unwrap();
        assert_eq!(trunk.number, "74951234567");
        assert_eq!(trunk.description, "");
    }
}
