//! Per-item scheduling.

use crate::collection::Collection;
use crate::error::EngineResult;
use crate::interval::calculate_default_interval;
use crate::models::Item;
use crate::recommendation::{AnalysisReport, RecommendationTable};
use crate::settings::Settings;
use crate::strategy::{default_strategies, first_wait, WaitQuery, WaitStrategy};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

/// How an item's next review was decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDecision {
    pub wait: Duration,
    /// Name of the strategy that produced the wait.
    pub source: &'static str,
    pub next_review: DateTime<Utc>,
}

/// Summary counts for a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionOverview {
    pub total_items: usize,
    pub never_reviewed: usize,
    pub due: usize,
    pub total_reviews: usize,
    /// Fraction of all reviews that were remembered.
    pub retention_rate: f64,
}

/// Merges learned recommendations with the rule-based default.
pub struct Scheduler {
    settings: Settings,
    table: RecommendationTable,
    strategies: Vec<Box<dyn WaitStrategy>>,
}

impl Scheduler {
    /// Create a scheduler with an empty recommendation table.
    pub fn new(settings: Settings) -> EngineResult<Self> {
        Self::with_strategies(settings, default_strategies())
    }

    /// Create a scheduler with a custom strategy chain.
    ///
    /// The rule default is still used if no strategy answers.
    pub fn with_strategies(
        settings: Settings,
        strategies: Vec<Box<dyn WaitStrategy>>,
    ) -> EngineResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            table: RecommendationTable::default(),
            strategies,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn table(&self) -> &RecommendationTable {
        &self.table
    }

    /// Rebuild statistics and recommendations from scratch.
    pub fn rebuild(&mut self, items: &[Item]) {
        self.table = RecommendationTable::build(items, &self.settings);
    }

    /// Rebuild from the current state of a collection.
    pub fn rebuild_from(&mut self, collection: &impl Collection) -> EngineResult<()> {
        let items = collection.items()?;
        info!(items = items.len(), "rebuilding schedule statistics");
        self.rebuild(&items);
        Ok(())
    }

    /// Decide the next review for an item.
    pub fn decide(&self, item: &Item) -> ScheduleDecision {
        let pattern = item.pattern();
        let query = WaitQuery {
            history: item.reviews(),
            pattern: &pattern,
            table: &self.table,
            settings: &self.settings,
        };
        let (wait, source) = first_wait(&self.strategies, &query).unwrap_or_else(|| {
            (calculate_default_interval(item.reviews(), &self.settings), "default")
        });

        ScheduleDecision {
            wait,
            source,
            next_review: item.anchor() + wait,
        }
    }

    pub fn next_review(&self, item: &Item) -> DateTime<Utc> {
        self.decide(item).next_review
    }

    /// Signed time until the next review. Negative when overdue.
    pub fn time_until_next_review_at(&self, item: &Item, now: DateTime<Utc>) -> Duration {
        self.next_review(item) - now
    }

    pub fn time_until_next_review(&self, item: &Item) -> Duration {
        self.time_until_next_review_at(item, Utc::now())
    }

    pub fn is_due_at(&self, item: &Item, now: DateTime<Utc>) -> bool {
        self.time_until_next_review_at(item, now) < Duration::zero()
    }

    pub fn is_due(&self, item: &Item) -> bool {
        self.is_due_at(item, Utc::now())
    }

    /// Due items with their signed time until review, in collection order.
    pub fn due_items_at<'a>(
        &self,
        items: &'a [Item],
        now: DateTime<Utc>,
    ) -> Vec<(&'a Item, Duration)> {
        items
            .iter()
            .map(|item| (item, self.time_until_next_review_at(item, now)))
            .filter(|(_, until)| *until < Duration::zero())
            .collect()
    }

    pub fn overview_at(&self, items: &[Item], now: DateTime<Utc>) -> CollectionOverview {
        let total_reviews: usize = items.iter().map(|i| i.reviews().len()).sum();
        let remembered = items
            .iter()
            .flat_map(|i| i.reviews())
            .filter(|r| r.remembered)
            .count();

        CollectionOverview {
            total_items: items.len(),
            never_reviewed: items.iter().filter(|i| i.reviews().is_empty()).count(),
            due: self.due_items_at(items, now).len(),
            total_reviews,
            retention_rate: if total_reviews == 0 {
                0.0
            } else {
                remembered as f64 / total_reviews as f64
            },
        }
    }

    pub fn report(&self) -> AnalysisReport {
        self.table.report()
    }
}
