//! Interchangeable ways of turning a history into a wait.

use crate::interval::calculate_default_interval;
use crate::models::{streak_number, ReviewRecord};
use crate::recommendation::RecommendationTable;
use crate::settings::Settings;
use chrono::Duration;

/// Everything a strategy may consult for one item.
#[derive(Debug, Clone, Copy)]
pub struct WaitQuery<'a> {
    pub history: &'a [ReviewRecord],
    pub pattern: &'a str,
    pub table: &'a RecommendationTable,
    pub settings: &'a Settings,
}

impl WaitQuery<'_> {
    /// Whether learned recommendations apply to this history.
    ///
    /// Items whose last review failed use the rule default unless
    /// `learn_after_failure` is set.
    fn learned_allowed(&self) -> bool {
        self.settings.learn_after_failure || self.history.last().map_or(true, |r| r.remembered)
    }
}

/// Trait for wait-time strategies.
pub trait WaitStrategy: Send + Sync {
    /// Strategy name.
    fn name(&self) -> &'static str;

    /// Produce a wait, or `None` to defer to the next strategy.
    fn wait(&self, query: &WaitQuery<'_>) -> Option<Duration>;
}

/// Learned wait for the exact outcome pattern.
pub struct ExactPattern;

impl WaitStrategy for ExactPattern {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn wait(&self, query: &WaitQuery<'_>) -> Option<Duration> {
        if !query.learned_allowed() {
            return None;
        }
        query.table.exact(query.pattern)
    }
}

/// Learned wait for the pattern's streak bucket.
pub struct StreakBucket;

impl WaitStrategy for StreakBucket {
    fn name(&self) -> &'static str {
        "streak"
    }

    fn wait(&self, query: &WaitQuery<'_>) -> Option<Duration> {
        if !query.learned_allowed() {
            return None;
        }
        query.table.streak(streak_number(query.pattern))
    }
}

/// Rule-based interval. Always produces a wait.
pub struct RuleDefault;

impl WaitStrategy for RuleDefault {
    fn name(&self) -> &'static str {
        "default"
    }

    fn wait(&self, query: &WaitQuery<'_>) -> Option<Duration> {
        Some(calculate_default_interval(query.history, query.settings))
    }
}

/// Exact pattern, then streak bucket, then the rule default.
pub fn default_strategies() -> Vec<Box<dyn WaitStrategy>> {
    vec![Box::new(ExactPattern), Box::new(StreakBucket), Box::new(RuleDefault)]
}

/// Evaluate strategies in order, returning the first wait and the name of its producer.
pub fn first_wait(
    strategies: &[Box<dyn WaitStrategy>],
    query: &WaitQuery<'_>,
) -> Option<(Duration, &'static str)> {
    strategies
        .iter()
        .find_map(|s| s.wait(query).map(|wait| (wait, s.name())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{pattern_of, Item};
    use chrono::{DateTime, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap()
    }

    fn records(outcomes: &[bool]) -> Vec<ReviewRecord> {
        outcomes
            .iter()
            .enumerate()
            .map(|(i, &ok)| {
                ReviewRecord::new(base() + Duration::hours(i as i64 + 1), ok, Duration::seconds(1))
            })
            .collect()
    }

    /// Table where the empty pattern and streaks 0 and -1 are reliable.
    fn table(settings: &Settings) -> RecommendationTable {
        let items: Vec<Item> = (0..settings.reliability_threshold)
            .map(|i| Item::with_reviews(format!("f{i}"), "b", base(), records(&[false, true])))
            .collect();
        RecommendationTable::build(&items, settings)
    }

    #[test]
    fn test_rule_default_always_answers() {
        let settings = Settings::default();
        let table = RecommendationTable::default();
        let history = records(&[true, true]);
        let pattern = pattern_of(&history);
        let query = WaitQuery {
            history: &history,
            pattern: &pattern,
            table: &table,
            settings: &settings,
        };

        assert_eq!(ExactPattern.wait(&query), None);
        assert_eq!(StreakBucket.wait(&query), None);
        let (wait, source) = first_wait(&default_strategies(), &query).unwrap();
        assert_eq!(source, "default");
        assert_eq!(wait, Duration::minutes(3600));
    }

    #[test]
    fn test_failure_skips_learned_unless_enabled() {
        let settings = Settings::default();
        let table = table(&settings);
        let history = records(&[false]);
        let pattern = pattern_of(&history);
        let query = WaitQuery {
            history: &history,
            pattern: &pattern,
            table: &table,
            settings: &settings,
        };

        assert!(table.exact("F").is_some());
        let (wait, source) = first_wait(&default_strategies(), &query).unwrap();
        assert_eq!(source, "default");
        assert_eq!(wait, Duration::minutes(10));

        let learning = Settings::builder().learn_after_failure(true).build().unwrap();
        let query = WaitQuery { settings: &learning, ..query };
        let (wait, source) = first_wait(&default_strategies(), &query).unwrap();
        assert_eq!(source, "pattern");
        assert_eq!(Some(wait), table.exact("F"));
    }

    #[test]
    fn test_streak_bucket_used_when_pattern_is_sparse() {
        let settings = Settings::default();
        let table = table(&settings);
        // "SSF" is never observed, but streak -1 is reliable; learning after failure is on.
        let learning = Settings::builder().learn_after_failure(true).build().unwrap();
        let history = records(&[true, true, false]);
        let pattern = pattern_of(&history);
        let query = WaitQuery {
            history: &history,
            pattern: &pattern,
            table: &table,
            settings: &learning,
        };

        let (wait, source) = first_wait(&default_strategies(), &query).unwrap();
        assert_eq!(source, "streak");
        assert_eq!(Some(wait), table.streak(-1));
    }
}
