//! Learned wait recommendations derived from pattern statistics.

use crate::models::{minutes_to_duration, streak_number, Item, FAILURE};
use crate::settings::Settings;
use crate::statistics::{PatternStats, StatisticsTables};
use chrono::Duration;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::info;

/// Largest success-rate deviation the correction curve responds to.
const MAX_DIFF: f64 = 10.0;

/// Reviews in practice happen later than their due time.
const LATENESS_DISCOUNT: f64 = 0.80;

/// Multiplier for a success-rate deviation from the ideal, in percentage points.
///
/// Quadratic in the clamped deviation: 0.5 at -10, 1.0 at 0, 1.5 at +10.
pub fn correction_multiplier(diff: f64) -> f64 {
    let diff = diff.clamp(-MAX_DIFF, MAX_DIFF);
    if diff < 0.0 {
        (100.0 - 0.5 * diff * diff) / 100.0
    } else if diff > 0.0 {
        (100.0 + 0.5 * diff * diff) / 100.0
    } else {
        1.0
    }
}

/// Recommended wait in minutes for a statistics bucket.
///
/// Uses the median successful wait, or the median of all samples when nothing
/// succeeded. Returns `None` for an empty bucket.
pub fn corrected_minutes(stats: &PatternStats, ideal_success_percentage: f64) -> Option<f64> {
    let base = stats.median_success().or_else(|| stats.median_all())?;
    let success_rate = stats.success_percentage()?;
    let improved = base * correction_multiplier(success_rate - ideal_success_percentage);
    Some(improved * LATENESS_DISCOUNT)
}

/// Learned waits for every pattern and streak bucket with enough samples.
///
/// Must be rebuilt whenever the collection is reloaded.
#[derive(Debug, Clone, Default)]
pub struct RecommendationTable {
    statistics: StatisticsTables,
    exact: HashMap<String, Duration>,
    streaks: BTreeMap<i64, Duration>,
    threshold: usize,
    ideal_success_percentage: f64,
    learn_after_failure: bool,
}

impl RecommendationTable {
    /// Derive recommendations from freshly built statistics.
    pub fn from_statistics(statistics: StatisticsTables, settings: &Settings) -> Self {
        let threshold = settings.reliability_threshold;
        let ideal = settings.ideal_success_percentage;

        let exact: HashMap<String, Duration> = statistics
            .patterns
            .iter()
            .filter(|(_, stats)| stats.sample_count() >= threshold)
            .filter_map(|(pattern, stats)| {
                corrected_minutes(stats, ideal).map(|m| (pattern.clone(), minutes_to_duration(m)))
            })
            .collect();

        let streaks: BTreeMap<i64, Duration> = statistics
            .streaks
            .iter()
            .filter(|(_, stats)| stats.sample_count() >= threshold)
            .filter_map(|(&streak, stats)| {
                corrected_minutes(stats, ideal).map(|m| (streak, minutes_to_duration(m)))
            })
            .collect();

        info!(
            patterns = statistics.patterns.len(),
            reliable_patterns = exact.len(),
            reliable_streaks = streaks.len(),
            threshold,
            "built recommendation table"
        );

        Self {
            statistics,
            exact,
            streaks,
            threshold,
            ideal_success_percentage: ideal,
            learn_after_failure: settings.learn_after_failure,
        }
    }

    /// Build statistics and recommendations for a whole collection.
    pub fn build(items: &[Item], settings: &Settings) -> Self {
        Self::from_statistics(StatisticsTables::build(items), settings)
    }

    /// Learned wait for this exact pattern.
    pub fn exact(&self, pattern: &str) -> Option<Duration> {
        self.exact.get(pattern).copied()
    }

    /// Learned wait for this streak bucket.
    pub fn streak(&self, streak: i64) -> Option<Duration> {
        self.streaks.get(&streak).copied()
    }

    /// Exact pattern first, then its streak bucket.
    pub fn recommend(&self, pattern: &str) -> Option<Duration> {
        self.exact(pattern)
            .or_else(|| self.streak(streak_number(pattern)))
    }

    pub fn statistics(&self) -> &StatisticsTables {
        &self.statistics
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Per-pattern and per-streak summary for display.
    pub fn report(&self) -> AnalysisReport {
        let patterns = self
            .statistics
            .patterns
            .iter()
            .map(|(pattern, stats)| {
                let scheduled = self.learn_after_failure || !pattern.ends_with(FAILURE);
                let row = ReportRow::new(stats, self.exact(pattern), scheduled);
                (pattern.clone(), row)
            })
            .collect();
        let streaks = self
            .statistics
            .streaks
            .iter()
            .map(|(&streak, stats)| {
                let scheduled = self.learn_after_failure || streak >= 0;
                (streak, ReportRow::new(stats, self.streak(streak), scheduled))
            })
            .collect();

        AnalysisReport {
            threshold: self.threshold,
            ideal_success_percentage: self.ideal_success_percentage,
            learn_after_failure: self.learn_after_failure,
            patterns,
            streaks,
        }
    }
}

/// Summary of one statistics bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub sample_count: usize,
    pub success_percentage: f64,
    pub median_success_minutes: Option<f64>,
    pub median_failure_minutes: Option<f64>,
    /// `None` means insufficient data.
    pub recommended_minutes: Option<f64>,
    /// False when items in this bucket always get the rule default, because
    /// their last review failed and `learn_after_failure` is off.
    pub scheduled: bool,
}

impl ReportRow {
    fn new(stats: &PatternStats, recommended: Option<Duration>, scheduled: bool) -> Self {
        Self {
            sample_count: stats.sample_count(),
            success_percentage: stats.success_percentage().unwrap_or(0.0),
            median_success_minutes: stats.median_success(),
            median_failure_minutes: stats.median_failure(),
            recommended_minutes: recommended.map(crate::models::duration_to_minutes),
            scheduled,
        }
    }
}

/// Analysis of every observed pattern and streak.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub threshold: usize,
    pub ideal_success_percentage: f64,
    pub learn_after_failure: bool,
    pub patterns: BTreeMap<String, ReportRow>,
    pub streaks: BTreeMap<i64, ReportRow>,
}

fn fmt_minutes(minutes: Option<f64>) -> String {
    minutes.map_or_else(|| "-".to_string(), |m| format!("{m:.1}"))
}

fn fmt_row(f: &mut fmt::Formatter<'_>, key: &str, row: &ReportRow) -> fmt::Result {
    let recommended = match (row.recommended_minutes, row.scheduled) {
        (None, _) => "insufficient data".to_string(),
        (Some(m), true) => format!("{m:.1}"),
        (Some(m), false) => format!("{m:.1} (unused, rule default after failure)"),
    };
    writeln!(
        f,
        "{:<12} {:>8} {:>8.1}% {:>12} {:>12}  {}",
        key,
        row.sample_count,
        row.success_percentage,
        fmt_minutes(row.median_success_minutes),
        fmt_minutes(row.median_failure_minutes),
        recommended
    )
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Reliability threshold: {} samples, ideal success: {:.0}%",
            self.threshold, self.ideal_success_percentage
        )?;
        writeln!(
            f,
            "{:<12} {:>8} {:>9} {:>12} {:>12}  recommended",
            "pattern", "samples", "success", "med ok", "med fail"
        )?;
        for (pattern, row) in &self.patterns {
            let key = if pattern.is_empty() { "(new)" } else { pattern.as_str() };
            fmt_row(f, key, row)?;
        }
        writeln!(f)?;
        writeln!(f, "streak buckets")?;
        for (streak, row) in &self.streaks {
            fmt_row(f, &format!("{streak:+}"), row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewRecord;
    use chrono::{DateTime, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    /// `count` items each reviewed once, `wait` minutes after creation.
    fn single_review_items(count: usize, wait: i64, remembered: bool) -> Vec<Item> {
        (0..count)
            .map(|i| {
                let record = ReviewRecord::new(
                    base() + Duration::minutes(wait),
                    remembered,
                    Duration::seconds(4),
                );
                Item::with_reviews(format!("item {i}"), "back", base(), vec![record])
            })
            .collect()
    }

    #[test]
    fn test_multiplier_endpoints() {
        assert_eq!(correction_multiplier(-10.0), 0.5);
        assert_eq!(correction_multiplier(10.0), 1.5);
        assert_eq!(correction_multiplier(0.0), 1.0);
        assert_eq!(correction_multiplier(-40.0), 0.5);
        assert_eq!(correction_multiplier(25.0), 1.5);
        assert_eq!(correction_multiplier(-4.0), 0.92);
    }

    #[test]
    fn test_corrected_minutes_without_successes_uses_all_samples() {
        let mut stats = PatternStats::default();
        stats.add(100.0, false);
        stats.add(300.0, false);
        // 0% success, diff clamps to -10, multiplier 0.5.
        let minutes = corrected_minutes(&stats, 85.0).unwrap();
        assert!((minutes - 200.0 * 0.5 * 0.8).abs() < 1e-9);
        assert_eq!(corrected_minutes(&PatternStats::default(), 85.0), None);
    }

    #[test]
    fn test_end_to_end_empty_pattern_recommendation() {
        let items = single_review_items(100, 1440, true);
        let settings = Settings::builder().ideal_success_percentage(85.0).build().unwrap();
        let table = RecommendationTable::build(&items, &settings);

        let minutes = corrected_minutes(table.statistics().pattern("").unwrap(), 85.0).unwrap();
        assert!((minutes - 1728.0).abs() < 1e-6);
        assert_eq!(table.recommend(""), Some(Duration::minutes(1728)));
    }

    #[test]
    fn test_threshold_boundary() {
        let settings = Settings::default();

        let table = RecommendationTable::build(&single_review_items(59, 600, true), &settings);
        assert_eq!(table.exact(""), None);
        assert_eq!(table.recommend(""), None);

        let table = RecommendationTable::build(&single_review_items(60, 600, true), &settings);
        assert!(table.exact("").is_some());
    }

    #[test]
    fn test_falls_back_to_streak_bucket() {
        // Sixty "S" samples populate streak +1 without any "SFS" data.
        let items: Vec<Item> = (0..60)
            .map(|i| {
                let records = vec![
                    ReviewRecord::new(base() + Duration::minutes(10), true, Duration::seconds(1)),
                    ReviewRecord::new(base() + Duration::minutes(110), true, Duration::seconds(1)),
                ];
                Item::with_reviews(format!("card {i}"), "back", base(), records)
            })
            .collect();
        let table = RecommendationTable::build(&items, &Settings::default());

        assert_eq!(table.exact("SFS"), None);
        assert_eq!(table.recommend("SFS"), table.streak(1));
        assert!(table.streak(1).is_some());
        assert_eq!(table.recommend("FFS"), table.streak(1));
        assert_eq!(table.recommend("SF"), None);
    }

    #[test]
    fn test_report_marks_insufficient_data() {
        let items = single_review_items(5, 30, false);
        let table = RecommendationTable::build(&items, &Settings::default());
        let report = table.report();

        let row = &report.patterns[""];
        assert_eq!(row.sample_count, 5);
        assert_eq!(row.success_percentage, 0.0);
        assert_eq!(row.median_success_minutes, None);
        assert_eq!(row.median_failure_minutes, Some(30.0));
        assert_eq!(row.recommended_minutes, None);
        assert!(report.to_string().contains("insufficient data"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["patterns"][""]["sample_count"], 5);
    }

    #[test]
    fn test_report_flags_buckets_after_failure() {
        // Sixty items reviewed "F" then "S": pattern "F" and streak -1 are reliable.
        let items: Vec<Item> = (0..60)
            .map(|i| {
                let records = vec![
                    ReviewRecord::new(base() + Duration::minutes(10), false, Duration::seconds(1)),
                    ReviewRecord::new(base() + Duration::minutes(110), true, Duration::seconds(1)),
                ];
                Item::with_reviews(format!("card {i}"), "back", base(), records)
            })
            .collect();

        let report = RecommendationTable::build(&items, &Settings::default()).report();
        assert!(report.patterns["F"].recommended_minutes.is_some());
        assert!(!report.patterns["F"].scheduled);
        assert!(report.patterns[""].scheduled);
        assert!(!report.streaks[&-1].scheduled);
        assert!(report.to_string().contains("rule default after failure"));

        let settings = Settings::builder().learn_after_failure(true).build().unwrap();
        let report = RecommendationTable::build(&items, &settings).report();
        assert!(report.patterns["F"].scheduled);
        assert!(report.streaks[&-1].scheduled);
        assert!(!report.to_string().contains("rule default after failure"));
    }
}
