//! Review session state machine.
//!
//! A session selects the items that are due, presents them one at a time,
//! and records a [`ReviewRecord`] for every judgement. It reconciles against
//! the live collection before presenting each item, so items removed while
//! the session runs are skipped rather than shown from a stale snapshot.

use crate::clock::Clock;
use crate::collection::{Collection, CollectionChange};
use crate::error::{EngineError, EngineResult};
use crate::models::{ItemId, ReviewRecord};
use crate::scheduler::Scheduler;
use crate::settings::SessionOrder;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started, or abandoned.
    Idle,
    /// Selecting and ordering due items.
    Initializing,
    /// Front shown, waiting for the answer to be revealed.
    AwaitingAnswer,
    /// Answer shown, waiting for a judgement.
    AwaitingJudgement,
    /// Every selected item has been handled.
    Finished,
}

impl SessionState {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::AwaitingAnswer => "awaiting answer",
            Self::AwaitingJudgement => "awaiting judgement",
            Self::Finished => "finished",
        }
    }

    /// Whether an item is currently being presented.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::AwaitingAnswer | Self::AwaitingJudgement)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running totals for judged items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Items judged this session.
    pub reviewed: usize,
    /// Items judged as remembered.
    pub remembered: usize,
    /// Total thinking time across judged items.
    pub thinking_time: Duration,
}

impl SessionSummary {
    fn record(&mut self, record: &ReviewRecord) {
        self.reviewed += 1;
        if record.remembered {
            self.remembered += 1;
        }
        self.thinking_time += record.thinking_time;
    }

    /// Get accuracy rate.
    pub fn accuracy(&self) -> f64 {
        if self.reviewed == 0 {
            0.0
        } else {
            self.remembered as f64 / self.reviewed as f64
        }
    }
}

/// One bounded batch of reviews.
pub struct ReviewSession {
    clock: Arc<dyn Clock>,
    rng: ChaCha8Rng,
    state: SessionState,
    queue: Vec<ItemId>,
    cursor: usize,
    front_shown_at: Option<DateTime<Utc>>,
    answer_shown_at: Option<DateTime<Utc>>,
    summary: SessionSummary,
}

impl ReviewSession {
    /// Create an idle session.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(clock, ChaCha8Rng::from_entropy())
    }

    /// Create an idle session with a fixed shuffle seed.
    pub fn with_seed(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self::with_rng(clock, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(clock: Arc<dyn Clock>, rng: ChaCha8Rng) -> Self {
        Self {
            clock,
            rng,
            state: SessionState::Idle,
            queue: Vec::new(),
            cursor: 0,
            front_shown_at: None,
            answer_shown_at: None,
            summary: SessionSummary::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Front of the item being presented.
    pub fn current(&self) -> Option<&str> {
        if self.state.is_active() {
            self.queue.get(self.cursor).map(String::as_str)
        } else {
            None
        }
    }

    /// Items from the cursor to the end of the queue, including the current one.
    pub fn remaining_count(&self) -> usize {
        self.queue.len().saturating_sub(self.cursor)
    }

    /// The ordered selection, judged items included.
    pub fn queue(&self) -> &[ItemId] {
        &self.queue
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn front_shown_at(&self) -> Option<DateTime<Utc>> {
        self.front_shown_at
    }

    pub fn answer_shown_at(&self) -> Option<DateTime<Utc>> {
        self.answer_shown_at
    }

    /// Select due items, order them and present the first.
    pub fn start(
        &mut self,
        collection: &impl Collection,
        scheduler: &Scheduler,
    ) -> EngineResult<SessionState> {
        if !matches!(self.state, SessionState::Idle | SessionState::Finished) {
            return Err(self.invalid("start"));
        }
        self.reset();
        self.state = SessionState::Initializing;

        let items = match collection.items() {
            Ok(items) => items,
            Err(e) => {
                self.state = SessionState::Idle;
                return Err(e);
            }
        };
        let now = self.clock.now();
        let mut due = scheduler.due_items_at(&items, now);

        let settings = scheduler.settings();
        if let Some(cap) = settings.session_size_cap {
            due.truncate(cap);
        }
        // Least overdue first: the largest (closest to zero) time-until value leads.
        due.sort_by(|a, b| b.1.cmp(&a.1));
        if settings.session_order == SessionOrder::Shuffled {
            due.shuffle(&mut self.rng);
        }

        self.queue = due.into_iter().map(|(item, _)| item.front.clone()).collect();
        info!(
            due = self.queue.len(),
            order = ?settings.session_order,
            "review session started"
        );
        self.present_next(collection)?;
        Ok(self.state)
    }

    /// Reveal the answer. Repeated calls keep the first timestamp.
    pub fn reveal_answer(&mut self) -> EngineResult<DateTime<Utc>> {
        match (self.state, self.answer_shown_at) {
            (SessionState::AwaitingJudgement, Some(shown)) => Ok(shown),
            (SessionState::AwaitingAnswer, _) => {
                let now = self.clock.now();
                self.answer_shown_at = Some(now);
                self.state = SessionState::AwaitingJudgement;
                Ok(now)
            }
            _ => Err(self.invalid("reveal answer")),
        }
    }

    /// Record the learner's judgement for the current item and move on.
    ///
    /// If the item has vanished from the collection, nothing is recorded,
    /// the session advances past it and `ItemNotFound` is returned.
    pub fn record_judgement(
        &mut self,
        collection: &mut impl Collection,
        remembered: bool,
    ) -> EngineResult<ReviewRecord> {
        if self.state != SessionState::AwaitingJudgement {
            return Err(self.invalid("record judgement"));
        }
        let (Some(front), Some(front_shown), Some(answer_shown)) = (
            self.queue.get(self.cursor).cloned(),
            self.front_shown_at,
            self.answer_shown_at,
        ) else {
            return Err(self.invalid("record judgement"));
        };

        let thinking_time = (answer_shown - front_shown).max(Duration::zero());
        let record = ReviewRecord::new(self.clock.now(), remembered, thinking_time);
        if let Err(e) = collection.append_review(&front, record.clone()) {
            if matches!(e, EngineError::ItemNotFound(_)) {
                self.queue.remove(self.cursor);
                info!(front = %front, "current item removed, skipping");
                self.present_next(&*collection)?;
            }
            return Err(e);
        }
        self.summary.record(&record);
        debug!(
            front = %front,
            remembered,
            thinking_ms = thinking_time.num_milliseconds(),
            "recorded judgement"
        );

        self.cursor += 1;
        self.present_next(&*collection)?;
        Ok(record)
    }

    /// Drop queued items that no longer exist in the collection.
    ///
    /// If the current item is gone, the session moves straight to the next
    /// remaining item without recording anything.
    pub fn handle_collection_change(
        &mut self,
        collection: &impl Collection,
        change: &CollectionChange,
    ) -> EngineResult<()> {
        if !self.state.is_active() {
            return Ok(());
        }
        debug!(?change, "reconciling session with collection");

        let current_exists = match self.queue.get(self.cursor) {
            Some(front) => collection.contains(front)?,
            None => false,
        };
        if current_exists {
            self.prune_from(collection, self.cursor + 1)?;
        } else {
            if self.cursor < self.queue.len() {
                let skipped = self.queue.remove(self.cursor);
                info!(front = %skipped, "current item removed, skipping");
            }
            self.present_next(collection)?;
        }
        Ok(())
    }

    /// Discard the pending queue. Nothing is recorded for the item in progress.
    pub fn abandon(&mut self) {
        if self.state != SessionState::Idle {
            info!(
                discarded = self.remaining_count(),
                reviewed = self.summary.reviewed,
                "review session abandoned"
            );
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.queue.clear();
        self.cursor = 0;
        self.front_shown_at = None;
        self.answer_shown_at = None;
        self.summary = SessionSummary::default();
    }

    /// Reconcile the pending queue, then present the item at the cursor or finish.
    fn present_next(&mut self, collection: &impl Collection) -> EngineResult<()> {
        self.prune_from(collection, self.cursor)?;
        self.answer_shown_at = None;

        if self.cursor < self.queue.len() {
            self.front_shown_at = Some(self.clock.now());
            self.state = SessionState::AwaitingAnswer;
        } else {
            self.front_shown_at = None;
            self.state = SessionState::Finished;
            info!(
                reviewed = self.summary.reviewed,
                remembered = self.summary.remembered,
                "review session finished"
            );
        }
        Ok(())
    }

    fn prune_from(&mut self, collection: &impl Collection, from: usize) -> EngineResult<()> {
        let mut keep = Vec::with_capacity(self.queue.len());
        for (i, front) in self.queue.iter().enumerate() {
            keep.push(i < from || collection.contains(front)?);
        }
        let before = self.queue.len();
        let mut flags = keep.into_iter();
        self.queue.retain(|_| flags.next().unwrap_or(true));

        let removed = before - self.queue.len();
        if removed > 0 {
            info!(removed, "dropped deleted items from session queue");
        }
        Ok(())
    }

    fn invalid(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidState {
            operation,
            state: self.state,
        }
    }
}
