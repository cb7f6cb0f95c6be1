//! Per-number call statistics.

use std::collections::HashMap;

use super::models::{CallRecord, CallerStat, MatrixRow};

/// Numbers this short are internal extensions, not external lines.
const MAX_EXTENSION_LEN: usize = 3;

/// Group records by originating number and count long calls.
///
/// Extensions (three characters or fewer) are skipped. The result is sorted
/// by total calls, highest first; ties keep first-seen order. Each number's
/// description comes from the first record seen for it.
#[must_use]
pub fn compute_from_records(records: &[CallRecord]) -> Vec<CallerStat> {
    let mut stats: Vec<CallerStat> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let number = record.originating_number.as_str();
        if number.chars().count() <= MAX_EXTENSION_LEN {
            continue;
        }

        let idx = *index.entry(number).or_insert_with(|| {
            stats.push(CallerStat {
                number: number.to_string(),
                description: record.description.clone(),
                total_calls: 0,
                calls_over_threshold: 0,
                percentage_over_threshold: 0.0,
            });
            stats.len() - 1
        });

        let stat = &mut stats[idx];
        stat.total_calls += 1;
        if record.is_long() {
            stat.calls_over_threshold += 1;
        }
    }

    for stat in &mut stats {
        stat.percentage_over_threshold = percentage(stat.calls_over_threshold, stat.total_calls);
    }

    stats.sort_by(|a, b| b.total_calls.cmp(&a.total_calls));
    stats
}

/// `part / total` as a percentage rounded to one decimal place.
///
/// Halves round to even, so 1 of 16 is 6.2.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round_ties_even() / 10.0
}

/// Order matrix rows by call count on the second-newest date, highest first.
///
/// With a single date the newest is used. Missing cells count as zero for
/// ordering. The sort is stable, so rows with equal counts keep their order.
///
/// The second-newest stored date is treated as "yesterday" even when days
/// are missing in between.
pub fn sort_matrix_rows(rows: &mut [MatrixRow], date_count: usize) {
    let key_idx = match date_count {
        0 => return,
        1 => 0,
        _ => 1,
    };

    rows.sort_by_key(|row| {
        std::cmp::Reverse(
            row.cells
                .get(key_idx)
                .and_then(Option::as_ref)
                .map_or(0, |cell| cell.total_calls),
        )
    });
}
