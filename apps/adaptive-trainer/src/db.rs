//! Database operations for the adaptive trainer.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use srs_engine::{Collection, CollectionChange, EngineError, EngineResult, Item, ReviewRecord};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Duplicate(String),
    #[error("Review for {0} is not later than its previous review")]
    OutOfOrder(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for EngineError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(front) => EngineError::ItemNotFound(front),
            DbError::Duplicate(front) => EngineError::DuplicateItem(front),
            DbError::OutOfOrder(front) => EngineError::NonMonotonicReview(front),
            DbError::Sqlite(e) => EngineError::Collection(e.to_string()),
        }
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> DbResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                front TEXT PRIMARY KEY,
                back TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                front TEXT NOT NULL REFERENCES items(front),
                reviewed_at TEXT NOT NULL,
                remembered INTEGER NOT NULL,
                thinking_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reviews_front ON reviews(front, id);
            "#,
        )?;
        Ok(())
    }

    // Item operations

    /// Insert an item together with any history it already carries.
    pub fn insert_item(&self, item: &Item) -> DbResult<CollectionChange> {
        if self.item_exists(&item.front)? {
            return Err(DbError::Duplicate(item.front.clone()));
        }
        self.conn.execute(
            "INSERT INTO items (front, back, created_at) VALUES (?1, ?2, ?3)",
            params![item.front, item.back, format_timestamp(item.created_at)],
        )?;
        for review in item.reviews() {
            self.insert_review_row(&item.front, review)?;
        }
        Ok(CollectionChange::Added(item.front.clone()))
    }

    pub fn add_item(
        &self,
        front: &str,
        back: &str,
        created_at: DateTime<Utc>,
    ) -> DbResult<CollectionChange> {
        self.insert_item(&Item::new(front, back, created_at))
    }

    pub fn update_back(&self, front: &str, back: &str) -> DbResult<CollectionChange> {
        let updated = self.conn.execute(
            "UPDATE items SET back = ?2 WHERE front = ?1",
            params![front, back],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(front.to_string()));
        }
        Ok(CollectionChange::Edited(front.to_string()))
    }

    pub fn delete_item(&self, front: &str) -> DbResult<CollectionChange> {
        self.conn.execute("DELETE FROM reviews WHERE front = ?1", params![front])?;
        let deleted = self.conn.execute("DELETE FROM items WHERE front = ?1", params![front])?;
        if deleted == 0 {
            return Err(DbError::NotFound(front.to_string()));
        }
        Ok(CollectionChange::Removed(front.to_string()))
    }

    pub fn item_exists(&self, front: &str) -> DbResult<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM items WHERE front = ?1", params![front], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_item(&self, front: &str) -> DbResult<Option<Item>> {
        let mut stmt = self
            .conn
            .prepare("SELECT front, back, created_at FROM items WHERE front = ?1")?;
        let row = stmt
            .query_row(params![front], parse_item_row)
            .optional()?;

        let Some((front, back, created_at)) = row else {
            return Ok(None);
        };
        let reviews = self.reviews_for(&front)?;
        Ok(Some(Item::with_reviews(front, back, created_at, reviews)))
    }

    /// Every item with its full history, in insertion order.
    pub fn list_items(&self) -> DbResult<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare("SELECT front, back, created_at FROM items ORDER BY rowid")?;
        let rows = stmt
            .query_map([], parse_item_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT front, reviewed_at, remembered, thinking_ms FROM reviews ORDER BY front, id",
        )?;
        let mut histories: HashMap<String, Vec<ReviewRecord>> = HashMap::new();
        let reviews = stmt.query_map([], |row| {
            let front: String = row.get(0)?;
            Ok((front, parse_review_row(row, 1)?))
        })?;
        for review in reviews {
            let (front, record) = review?;
            histories.entry(front).or_default().push(record);
        }

        Ok(rows
            .into_iter()
            .map(|(front, back, created_at)| {
                let reviews = histories.remove(&front).unwrap_or_default();
                Item::with_reviews(front, back, created_at, reviews)
            })
            .collect())
    }

    // Review operations

    /// Append a review, keeping each history strictly increasing in time.
    pub fn insert_review(&self, front: &str, review: &ReviewRecord) -> DbResult<()> {
        if !self.item_exists(front)? {
            return Err(DbError::NotFound(front.to_string()));
        }
        let last: Option<String> = self
            .conn
            .query_row(
                "SELECT reviewed_at FROM reviews WHERE front = ?1 ORDER BY id DESC LIMIT 1",
                params![front],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(last) = last {
            if review.reviewed_at <= parse_timestamp(0, &last)? {
                return Err(DbError::OutOfOrder(front.to_string()));
            }
        }
        self.insert_review_row(front, review)
    }

    fn insert_review_row(&self, front: &str, review: &ReviewRecord) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO reviews (front, reviewed_at, remembered, thinking_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                front,
                format_timestamp(review.reviewed_at),
                review.remembered,
                review.thinking_time.num_milliseconds(),
            ],
        )?;
        Ok(())
    }

    fn reviews_for(&self, front: &str) -> DbResult<Vec<ReviewRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT reviewed_at, remembered, thinking_ms FROM reviews WHERE front = ?1 ORDER BY id",
        )?;
        let reviews = stmt
            .query_map(params![front], |row| parse_review_row(row, 0))?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(reviews)
    }

    pub fn review_count(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl Collection for Database {
    fn items(&self) -> EngineResult<Vec<Item>> {
        Ok(self.list_items()?)
    }

    fn get(&self, front: &str) -> EngineResult<Option<Item>> {
        Ok(self.get_item(front)?)
    }

    fn contains(&self, front: &str) -> EngineResult<bool> {
        Ok(self.item_exists(front)?)
    }

    fn append_review(&mut self, front: &str, record: ReviewRecord) -> EngineResult<()> {
        Ok(self.insert_review(front, &record)?)
    }
}

/// Full sub-second precision, so ordering checks see what was stored.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(idx: usize, value: &str) -> SqlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_item_row(row: &rusqlite::Row) -> SqlResult<(String, String, DateTime<Utc>)> {
    let created_str: String = row.get(2)?;
    Ok((row.get(0)?, row.get(1)?, parse_timestamp(2, &created_str)?))
}

/// Parse `reviewed_at, remembered, thinking_ms` starting at column `first`.
fn parse_review_row(row: &rusqlite::Row, first: usize) -> SqlResult<ReviewRecord> {
    let reviewed_str: String = row.get(first)?;
    Ok(ReviewRecord::new(
        parse_timestamp(first, &reviewed_str)?,
        row.get(first + 1)?,
        Duration::milliseconds(row.get(first + 2)?),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_item_crud() {
        let db = Database::in_memory().unwrap();
        db.add_item("la mela", "the apple", base()).unwrap();
        assert!(matches!(
            db.add_item("la mela", "again", base()),
            Err(DbError::Duplicate(_))
        ));

        db.update_back("la mela", "apple").unwrap();
        let item = db.get_item("la mela").unwrap().unwrap();
        assert_eq!(item.back, "apple");
        assert_eq!(item.created_at, base());

        assert_eq!(db.list_items().unwrap().len(), 1);
        db.delete_item("la mela").unwrap();
        assert!(db.get_item("la mela").unwrap().is_none());
        assert!(matches!(db.delete_item("la mela"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_reviews_round_trip_in_order() {
        let mut db = Database::in_memory().unwrap();
        db.add_item("b", "second", base()).unwrap();
        db.add_item("a", "first", base()).unwrap();

        let first = ReviewRecord::new(
            base() + Duration::hours(1),
            true,
            Duration::milliseconds(2500),
        );
        let second = ReviewRecord::new(base() + Duration::hours(30), false, Duration::seconds(9));
        db.append_review("a", first.clone()).unwrap();
        db.append_review("a", second.clone()).unwrap();

        let items = db.list_items().unwrap();
        assert_eq!(items[0].front, "b");
        assert_eq!(items[1].reviews(), &[first, second]);
        assert_eq!(items[1].pattern(), "SF");
        assert_eq!(db.review_count().unwrap(), 2);
    }

    #[test]
    fn test_rejects_out_of_order_and_unknown_reviews() {
        let mut db = Database::in_memory().unwrap();
        db.add_item("q", "a", base()).unwrap();
        let review = ReviewRecord::new(base() + Duration::minutes(5), true, Duration::seconds(1));
        db.append_review("q", review.clone()).unwrap();

        assert!(matches!(
            db.append_review("q", review.clone()),
            Err(EngineError::NonMonotonicReview(_))
        ));
        assert!(matches!(
            db.append_review("nope", review),
            Err(EngineError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_sub_millisecond_reviews_stay_ordered() {
        let mut db = Database::in_memory().unwrap();
        db.add_item("quick", "fingers", base()).unwrap();
        let first = ReviewRecord::new(
            base() + Duration::microseconds(1200),
            true,
            Duration::milliseconds(300),
        );
        let second = ReviewRecord::new(
            base() + Duration::microseconds(1700),
            false,
            Duration::milliseconds(200),
        );
        db.append_review("quick", first.clone()).unwrap();
        db.append_review("quick", second.clone()).unwrap();
        assert!(matches!(
            db.append_review("quick", second.clone()),
            Err(EngineError::NonMonotonicReview(_))
        ));

        let item = db.get_item("quick").unwrap().unwrap();
        assert_eq!(item.reviews(), &[first, second]);
        assert!(item.reviews()[0].reviewed_at < item.reviews()[1].reviewed_at);
    }

    #[test]
    fn test_delete_removes_history() {
        let db = Database::in_memory().unwrap();
        let review = ReviewRecord::new(base() + Duration::days(1), true, Duration::seconds(3));
        db.insert_item(&Item::with_reviews("gone", "soon", base(), vec![review]))
            .unwrap();
        assert_eq!(db.review_count().unwrap(), 1);

        assert_eq!(
            db.delete_item("gone").unwrap(),
            CollectionChange::Removed("gone".to_string())
        );
        assert_eq!(db.review_count().unwrap(), 0);
    }

    #[test]
    fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trainer.db");
        {
            let db = Database::open(&path).unwrap();
            db.add_item("persist", "me", base()).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.item_exists("persist").unwrap());
    }
}
