//! Data models for review scheduling.

use chrono::{DateTime, Duration, Utc};

/// Items are identified by their front text.
pub type ItemId = String;

/// Pattern character for a remembered review.
pub const SUCCESS: char = 'S';
/// Pattern character for a forgotten review.
pub const FAILURE: char = 'F';

/// One recorded judgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    /// When the judgement was recorded.
    pub reviewed_at: DateTime<Utc>,
    /// Whether the learner remembered the answer.
    pub remembered: bool,
    /// Time between showing the front and revealing the answer.
    pub thinking_time: Duration,
}

impl ReviewRecord {
    /// Create a new review record.
    pub fn new(reviewed_at: DateTime<Utc>, remembered: bool, thinking_time: Duration) -> Self {
        Self {
            reviewed_at,
            remembered,
            thinking_time,
        }
    }

    /// Pattern character for this outcome.
    pub fn outcome(&self) -> char {
        if self.remembered {
            SUCCESS
        } else {
            FAILURE
        }
    }
}

/// A front/back study item with its review history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Front text, unique within a collection.
    pub front: ItemId,
    /// Back text.
    pub back: String,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// Chronological review history.
    reviews: Vec<ReviewRecord>,
}

impl Item {
    /// Create an item with no reviews.
    pub fn new(
        front: impl Into<String>,
        back: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
            created_at,
            reviews: Vec::new(),
        }
    }

    /// Create an item from an existing history. Records must be in chronological order.
    pub fn with_reviews(
        front: impl Into<String>,
        back: impl Into<String>,
        created_at: DateTime<Utc>,
        reviews: Vec<ReviewRecord>,
    ) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
            created_at,
            reviews,
        }
    }

    /// Review history, oldest first.
    pub fn reviews(&self) -> &[ReviewRecord] {
        &self.reviews
    }

    /// Most recent review, if any.
    pub fn last_review(&self) -> Option<&ReviewRecord> {
        self.reviews.last()
    }

    /// Timestamp the next wait is measured from.
    pub fn anchor(&self) -> DateTime<Utc> {
        self.last_review()
            .map(|r| r.reviewed_at)
            .unwrap_or(self.created_at)
    }

    /// Full outcome pattern of the history.
    pub fn pattern(&self) -> String {
        pattern_of(&self.reviews)
    }

    /// Append a review. Rejects records that are not strictly later than the last one.
    pub fn push_review(&mut self, record: ReviewRecord) -> Result<(), ReviewRecord> {
        if let Some(last) = self.reviews.last() {
            if record.reviewed_at <= last.reviewed_at {
                return Err(record);
            }
        }
        self.reviews.push(record);
        Ok(())
    }
}

/// Outcome pattern for a slice of records.
pub fn pattern_of(records: &[ReviewRecord]) -> String {
    records.iter().map(ReviewRecord::outcome).collect()
}

/// Signed length of the trailing run in a pattern.
///
/// Positive for a run of successes, negative for a run of failures, zero when empty.
pub fn streak_number(pattern: &str) -> i64 {
    let mut chars = pattern.chars().rev();
    let Some(last) = chars.next() else {
        return 0;
    };
    let run = 1 + chars.take_while(|&c| c == last).count() as i64;
    if last == SUCCESS {
        run
    } else {
        -run
    }
}

/// Count of trailing successes in a history.
pub fn trailing_successes(records: &[ReviewRecord]) -> usize {
    records.iter().rev().take_while(|r| r.remembered).count()
}

/// Convert fractional minutes to a duration, rounded to milliseconds.
pub fn minutes_to_duration(minutes: f64) -> Duration {
    const MAX_MINUTES: f64 = 1.0e9;
    let clamped = minutes.clamp(0.0, MAX_MINUTES);
    Duration::milliseconds((clamped * 60_000.0).round() as i64)
}

/// Convert a duration to fractional minutes.
pub fn duration_to_minutes(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 60_000.0
}
