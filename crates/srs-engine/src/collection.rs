//! The item collection seam.

use crate::error::{EngineError, EngineResult};
use crate::models::{Item, ReviewRecord};
use chrono::{DateTime, Utc};

/// A change to the backing collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionChange {
    Added(String),
    Removed(String),
    Edited(String),
}

/// Read access to items plus appending reviews.
pub trait Collection {
    /// Every item, in collection order.
    fn items(&self) -> EngineResult<Vec<Item>>;

    /// Look up one item by front.
    fn get(&self, front: &str) -> EngineResult<Option<Item>>;

    /// Whether an item with this front exists.
    fn contains(&self, front: &str) -> EngineResult<bool> {
        Ok(self.get(front)?.is_some())
    }

    /// Append a review to an item's history.
    fn append_review(&mut self, front: &str, record: ReviewRecord) -> EngineResult<()>;
}

/// A collection held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollection {
    items: Vec<Item>,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from existing items. Later duplicates of a front are dropped.
    pub fn from_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut collection = Self::new();
        for item in items {
            let _ = collection.insert(item);
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert an item whose front is not yet taken.
    pub fn insert(&mut self, item: Item) -> EngineResult<CollectionChange> {
        if self.position(&item.front).is_some() {
            return Err(EngineError::DuplicateItem(item.front));
        }
        let change = CollectionChange::Added(item.front.clone());
        self.items.push(item);
        Ok(change)
    }

    /// Add a new item with no reviews.
    pub fn add(
        &mut self,
        front: impl Into<String>,
        back: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> EngineResult<CollectionChange> {
        self.insert(Item::new(front, back, created_at))
    }

    pub fn remove(&mut self, front: &str) -> EngineResult<CollectionChange> {
        let index = self
            .position(front)
            .ok_or_else(|| EngineError::ItemNotFound(front.to_string()))?;
        self.items.remove(index);
        Ok(CollectionChange::Removed(front.to_string()))
    }

    /// Replace an item's back text. History is kept.
    pub fn edit_back(
        &mut self,
        front: &str,
        back: impl Into<String>,
    ) -> EngineResult<CollectionChange> {
        let item = self.item_mut(front)?;
        item.back = back.into();
        Ok(CollectionChange::Edited(front.to_string()))
    }

    fn position(&self, front: &str) -> Option<usize> {
        self.items.iter().position(|i| i.front == front)
    }

    fn item_mut(&mut self, front: &str) -> EngineResult<&mut Item> {
        self.items
            .iter_mut()
            .find(|i| i.front == front)
            .ok_or_else(|| EngineError::ItemNotFound(front.to_string()))
    }
}

impl Collection for MemoryCollection {
    fn items(&self) -> EngineResult<Vec<Item>> {
        Ok(self.items.clone())
    }

    fn get(&self, front: &str) -> EngineResult<Option<Item>> {
        Ok(self.items.iter().find(|i| i.front == front).cloned())
    }

    fn contains(&self, front: &str) -> EngineResult<bool> {
        Ok(self.position(front).is_some())
    }

    fn append_review(&mut self, front: &str, record: ReviewRecord) -> EngineResult<()> {
        self.item_mut(front)?
            .push_review(record)
            .map_err(|_| EngineError::NonMonotonicReview(front.to_string()))
    }
}
