//! Rule-based default intervals.

use crate::models::{minutes_to_duration, trailing_successes, ReviewRecord};
use crate::settings::Settings;
use chrono::Duration;

/// Shortest wait the interval model will return.
const MIN_WAIT_MS: i64 = 1;

/// Default wait before the next review of an item with this history.
///
/// Empty history waits the initial interval, a trailing failure waits the
/// forgotten interval, and a run of `n` trailing successes waits
/// `remembered * factor^(n - 1)`.
pub fn calculate_default_interval(history: &[ReviewRecord], settings: &Settings) -> Duration {
    let minutes = match history.last() {
        None => settings.initial_interval_minutes,
        Some(last) if !last.remembered => settings.forgotten_interval_minutes,
        Some(_) => {
            let streak = trailing_successes(history);
            let exponent = i32::try_from(streak - 1).unwrap_or(i32::MAX);
            settings.remembered_interval_minutes * settings.lengthening_factor.powi(exponent)
        }
    };
    minutes_to_duration(minutes).max(Duration::milliseconds(MIN_WAIT_MS))
}
