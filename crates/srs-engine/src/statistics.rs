//! Pattern statistics mined from every item's review history.

use crate::models::{duration_to_minutes, pattern_of, streak_number, Item};
use std::collections::BTreeMap;
use tracing::debug;

/// Observed waits before a review, split by that review's outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternStats {
    /// Minutes waited before reviews that succeeded.
    pub successes: Vec<f64>,
    /// Minutes waited before reviews that failed.
    pub failures: Vec<f64>,
}

impl PatternStats {
    /// Record one observed wait.
    pub fn add(&mut self, elapsed_minutes: f64, remembered: bool) {
        if remembered {
            self.successes.push(elapsed_minutes);
        } else {
            self.failures.push(elapsed_minutes);
        }
    }

    /// Combined sample count.
    pub fn sample_count(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Percentage of samples that succeeded, or `None` with no samples.
    pub fn success_percentage(&self) -> Option<f64> {
        let total = self.sample_count();
        if total == 0 {
            return None;
        }
        Some(100.0 * self.successes.len() as f64 / total as f64)
    }

    pub fn median_success(&self) -> Option<f64> {
        median(&self.successes)
    }

    pub fn median_failure(&self) -> Option<f64> {
        median(&self.failures)
    }

    /// Median over successes and failures together.
    pub fn median_all(&self) -> Option<f64> {
        let all: Vec<f64> = self
            .successes
            .iter()
            .chain(self.failures.iter())
            .copied()
            .collect();
        median(&all)
    }
}

/// Median of a sample list. Even-length lists average the two central values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Statistics keyed by exact pattern and by streak number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsTables {
    pub patterns: BTreeMap<String, PatternStats>,
    pub streaks: BTreeMap<i64, PatternStats>,
}

impl StatisticsTables {
    /// Scan every item and rebuild both tables from scratch.
    ///
    /// For review `i` of an item, the key is the pattern of reviews `0..i` and
    /// the sample is the wait since review `i - 1`, or since creation for the
    /// first review.
    pub fn build(items: &[Item]) -> Self {
        let mut tables = Self::default();
        let mut samples = 0usize;

        for item in items {
            let reviews = item.reviews();
            let mut anchor = item.created_at;
            for (i, record) in reviews.iter().enumerate() {
                let pattern = pattern_of(&reviews[..i]);
                let elapsed = duration_to_minutes(record.reviewed_at - anchor).max(0.0);

                tables
                    .streaks
                    .entry(streak_number(&pattern))
                    .or_default()
                    .add(elapsed, record.remembered);
                tables
                    .patterns
                    .entry(pattern)
                    .or_default()
                    .add(elapsed, record.remembered);

                anchor = record.reviewed_at;
                samples += 1;
            }
        }

        debug!(
            items = items.len(),
            samples,
            patterns = tables.patterns.len(),
            streaks = tables.streaks.len(),
            "rebuilt pattern statistics"
        );
        tables
    }

    pub fn pattern(&self, pattern: &str) -> Option<&PatternStats> {
        self.patterns.get(pattern)
    }

    pub fn streak(&self, streak: i64) -> Option<&PatternStats> {
        self.streaks.get(&streak)
    }

    /// Total samples across all patterns.
    pub fn total_samples(&self) -> usize {
        self.patterns.values().map(PatternStats::sample_count).sum()
    }
}
