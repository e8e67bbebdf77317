//! Application state and logic.

use crate::config::Config;
use crate::db::Database;
use chrono::{DateTime, Duration, Utc};
use srs_engine::{
    AnalysisReport, Clock, Collection, CollectionChange, CollectionOverview, EngineError, Item,
    ReviewSession, Scheduler, SessionState, SessionSummary,
};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};

pub struct App {
    pub db: Database,
    pub config: Config,
    pub scheduler: Scheduler,
    pub session: ReviewSession,
    clock: Arc<dyn Clock>,
    due_count: usize,
}

/// What the learner typed at a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Continue,
    Remembered,
    Forgotten,
    Quit,
    Unknown,
}

impl Reply {
    fn parse(line: &str) -> Self {
        match line.trim().to_lowercase().as_str() {
            "" => Self::Continue,
            "y" | "yes" => Self::Remembered,
            "n" | "no" => Self::Forgotten,
            "q" | "quit" => Self::Quit,
            _ => Self::Unknown,
        }
    }
}

impl App {
    pub fn new(db: Database, config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let scheduler = Scheduler::new(config.settings()?)?;
        let session = ReviewSession::new(clock.clone());

        let mut app = Self {
            db,
            config,
            scheduler,
            session,
            clock,
            due_count: 0,
        };
        app.reload_statistics()?;
        app.tick()?;
        Ok(app)
    }

    /// Switch to a different collection. Any session in progress is discarded.
    pub fn load_collection(&mut self, db: Database) -> anyhow::Result<()> {
        self.session.abandon();
        self.db = db;
        self.reload_statistics()?;
        self.tick()?;
        Ok(())
    }

    pub fn reload_statistics(&mut self) -> anyhow::Result<()> {
        self.scheduler.rebuild_from(&self.db)?;
        Ok(())
    }

    /// Periodic check. Only recomputes how many items are due.
    pub fn tick(&mut self) -> anyhow::Result<usize> {
        let items = self.db.items()?;
        self.due_count = self.scheduler.due_items_at(&items, self.clock.now()).len();
        Ok(self.due_count)
    }

    pub fn due_count(&self) -> usize {
        self.due_count
    }

    pub fn add_item(&mut self, front: &str, back: &str) -> anyhow::Result<()> {
        let change = self.db.add_item(front, back, self.clock.now())?;
        self.notify(change)
    }

    pub fn edit_item(&mut self, front: &str, back: &str) -> anyhow::Result<()> {
        let change = self.db.update_back(front, back)?;
        self.notify(change)
    }

    pub fn remove_item(&mut self, front: &str) -> anyhow::Result<()> {
        let change = self.db.delete_item(front)?;
        self.notify(change)
    }

    fn notify(&mut self, change: CollectionChange) -> anyhow::Result<()> {
        self.session.handle_collection_change(&self.db, &change)?;
        self.tick()?;
        Ok(())
    }

    /// Items with the time until their next review, soonest first.
    pub fn schedule(&self) -> anyhow::Result<Vec<(Item, Duration)>> {
        let now = self.clock.now();
        let mut rows: Vec<(Item, Duration)> = self
            .db
            .items()?
            .into_iter()
            .map(|item| {
                let until = self.scheduler.time_until_next_review_at(&item, now);
                (item, until)
            })
            .collect();
        rows.sort_by_key(|(_, until)| *until);
        Ok(rows)
    }

    pub fn overview(&self) -> anyhow::Result<CollectionOverview> {
        let items = self.db.items()?;
        Ok(self.scheduler.overview_at(&items, self.clock.now()))
    }

    /// Rebuild from the current collection and report on every pattern.
    pub fn analyze(&mut self) -> anyhow::Result<AnalysisReport> {
        self.reload_statistics()?;
        Ok(self.scheduler.report())
    }

    /// Run one interactive session over line-oriented input.
    ///
    /// Enter reveals the answer, `y`/`n` judges it and `q` abandons. End of
    /// input also abandons.
    pub fn run_review<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        out: &mut W,
    ) -> anyhow::Result<SessionSummary> {
        if self.session.start(&self.db, &self.scheduler)? == SessionState::Finished {
            writeln!(out, "No items are due.")?;
            return Ok(SessionSummary::default());
        }

        while self.session.state().is_active() {
            let Some(front) = self.session.current().map(str::to_string) else {
                break;
            };
            let Some(item) = self.db.get(&front)? else {
                // Removed behind our back; reconciliation moves past it.
                self.session
                    .handle_collection_change(&self.db, &CollectionChange::Removed(front))?;
                continue;
            };

            writeln!(out, "\n[{} left] {}", self.session.remaining_count(), item.front)?;
            write!(out, "(enter to reveal, q to quit) ")?;
            out.flush()?;
            match read_reply(input)? {
                Some(Reply::Quit) | None => return Ok(self.abandon(out)?),
                _ => {}
            }

            self.session.reveal_answer()?;
            writeln!(out, "{}", item.back)?;
            let remembered = loop {
                write!(out, "Remembered? (y/n, q to quit) ")?;
                out.flush()?;
                match read_reply(input)? {
                    Some(Reply::Remembered) => break true,
                    Some(Reply::Forgotten) => break false,
                    Some(Reply::Quit) | None => return Ok(self.abandon(out)?),
                    Some(_) => writeln!(out, "Please answer y or n.")?,
                }
            };

            let record = match self.session.record_judgement(&mut self.db, remembered) {
                Ok(record) => record,
                Err(EngineError::ItemNotFound(front)) => {
                    writeln!(out, "\"{front}\" was removed, skipping.")?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if self.config.display.show_thinking_time {
                writeln!(
                    out,
                    "Thinking time: {:.1}s",
                    record.thinking_time.num_milliseconds() as f64 / 1000.0
                )?;
            }
            if self.config.display.show_next_review {
                if let Some(updated) = self.db.get(&front)? {
                    let next = self.scheduler.next_review(&updated);
                    writeln!(out, "Next review: {}", format_timestamp(next))?;
                }
            }
        }

        let summary = self.session.summary().clone();
        writeln!(
            out,
            "\nSession complete: {} reviewed, {:.0}% remembered.",
            summary.reviewed,
            summary.accuracy() * 100.0
        )?;
        info!(reviewed = summary.reviewed, "session complete");
        self.tick()?;
        Ok(summary)
    }

    fn abandon<W: Write>(&mut self, out: &mut W) -> anyhow::Result<SessionSummary> {
        let summary = self.session.summary().clone();
        self.session.abandon();
        writeln!(out, "\nSession abandoned after {} reviews.", summary.reviewed)?;
        self.tick()?;
        Ok(summary)
    }
}

fn read_reply<R: BufRead>(input: &mut R) -> anyhow::Result<Option<Reply>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        warn!("input closed during review");
        return Ok(None);
    }
    Ok(Some(Reply::parse(&line)))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Human-readable signed duration, e.g. `3d 4h` or `overdue 20m`.
pub fn format_until(until: Duration) -> String {
    let overdue = until < Duration::zero();
    let d = if overdue { -until } else { until };
    let text = if d.num_days() > 0 {
        format!("{}d {}h", d.num_days(), d.num_hours() % 24)
    } else if d.num_hours() > 0 {
        format!("{}h {}m", d.num_hours(), d.num_minutes() % 60)
    } else {
        format!("{}m", d.num_minutes())
    };
    if overdue {
        format!("overdue {text}")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use srs_engine::ManualClock;
    use std::io::Cursor;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap()
    }

    fn app_with(items: &[(&str, &str)]) -> (Arc<ManualClock>, App) {
        let clock = Arc::new(ManualClock::new(base()));
        let db = Database::in_memory().unwrap();
        for (front, back) in items {
            db.add_item(front, back, base()).unwrap();
        }
        let app = App::new(db, Config::default(), clock.clone()).unwrap();
        clock.advance(Duration::days(2));
        (clock, app)
    }

    #[test]
    fn test_reply_parsing() {
        assert_eq!(Reply::parse("\n"), Reply::Continue);
        assert_eq!(Reply::parse(" Y \n"), Reply::Remembered);
        assert_eq!(Reply::parse("no"), Reply::Forgotten);
        assert_eq!(Reply::parse("q"), Reply::Quit);
        assert_eq!(Reply::parse("maybe"), Reply::Unknown);
    }

    #[test]
    fn test_review_loop_records_judgements() {
        let (_clock, mut app) = app_with(&[("uno", "one"), ("due", "two")]);
        assert_eq!(app.tick().unwrap(), 2);

        let mut input = Cursor::new("\ny\n\nmaybe\nn\n");
        let mut out = Vec::new();
        let summary = app.run_review(&mut input, &mut out).unwrap();

        assert_eq!(summary.reviewed, 2);
        assert_eq!(summary.remembered, 1);
        assert_eq!(app.db.review_count().unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Please answer y or n."));
        assert!(text.contains("Session complete"));
        assert_eq!(app.session.state(), SessionState::Finished);
    }

    #[test]
    fn test_quit_abandons_without_recording() {
        let (_clock, mut app) = app_with(&[("uno", "one"), ("due", "two")]);
        let mut input = Cursor::new("\ny\n\nq\n");
        let mut out = Vec::new();
        let summary = app.run_review(&mut input, &mut out).unwrap();

        assert_eq!(summary.reviewed, 1);
        assert_eq!(app.db.review_count().unwrap(), 1);
        assert_eq!(app.session.state(), SessionState::Idle);
    }

    #[test]
    fn test_end_of_input_abandons() {
        let (_clock, mut app) = app_with(&[("uno", "one")]);
        let mut out = Vec::new();
        let summary = app.run_review(&mut Cursor::new(""), &mut out).unwrap();
        assert_eq!(summary.reviewed, 0);
        assert_eq!(app.db.review_count().unwrap(), 0);
    }

    #[test]
    fn test_nothing_due() {
        let clock = Arc::new(ManualClock::new(base()));
        let db = Database::in_memory().unwrap();
        db.add_item("fresh", "card", base()).unwrap();
        let mut app = App::new(db, Config::default(), clock).unwrap();

        let mut out = Vec::new();
        app.run_review(&mut Cursor::new(""), &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("No items are due."));
    }

    #[test]
    fn test_edits_reconcile_active_session() {
        let (_clock, mut app) = app_with(&[("A", "a"), ("B", "b"), ("C", "c")]);
        app.session.start(&app.db, &app.scheduler).unwrap();
        assert_eq!(app.session.remaining_count(), 3);

        app.remove_item("B").unwrap();
        assert_eq!(app.session.remaining_count(), 2);
        assert_eq!(app.due_count(), 2);

        app.add_item("D", "d").unwrap();
        assert_eq!(app.session.remaining_count(), 2);
    }

    #[test]
    fn test_load_collection_discards_session() {
        let (_clock, mut app) = app_with(&[("A", "a")]);
        app.session.start(&app.db, &app.scheduler).unwrap();
        app.session.reveal_answer().unwrap();

        app.load_collection(Database::in_memory().unwrap()).unwrap();
        assert_eq!(app.session.state(), SessionState::Idle);
        assert_eq!(app.due_count(), 0);
    }

    #[test]
    fn test_schedule_and_overview() {
        let (clock, mut app) = app_with(&[("A", "a"), ("B", "b")]);
        app.add_item("C", "c").unwrap();

        let schedule = app.schedule().unwrap();
        assert_eq!(schedule.len(), 3);
        assert!(schedule[0].1 < Duration::zero());
        assert_eq!(schedule[2].0.front, "C");
        assert_eq!(schedule[2].1, Duration::days(1));

        let overview = app.overview().unwrap();
        assert_eq!(overview.total_items, 3);
        assert_eq!(overview.due, 2);

        clock.advance(Duration::days(2));
        assert_eq!(app.tick().unwrap(), 3);
        assert!(app.analyze().unwrap().patterns.is_empty());
    }

    #[test]
    fn test_format_until() {
        assert_eq!(format_until(Duration::minutes(90)), "1h 30m");
        assert_eq!(format_until(Duration::hours(-50)), "overdue 2d 2h");
        assert_eq!(format_until(Duration::minutes(5)), "5m");
    }
}
