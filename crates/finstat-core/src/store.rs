//! Store interfaces for operations and categories, plus in-memory implementations.
//!
//! The engine never reaches a global store: every entry point takes a
//! `&dyn OperationStore` / `&dyn CategoryStore` handle, so tests and tools can
//! run against isolated instances.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::{Category, Operation};

/// Errors raised by store implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A point lookup found nothing.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// What was looked up ("operation", "category").
        kind: &'static str,
        /// The missing key.
        key: String,
    },
    /// The storage backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Missing operation id.
    pub fn operation_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "operation",
            key: id.into(),
        }
    }

    /// Missing category name.
    pub fn category_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "category",
            key: name.into(),
        }
    }
}

/// Persistent set of operations, keyed by id with a secondary date index.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// All records, tombstones included, sorted by date with a stable tie-break.
    async fn read_all(&self) -> Result<Vec<Operation>, StoreError>;

    /// Records dated within `lower..=upper`, in the same order as [`OperationStore::read_all`].
    async fn read_range(
        &self,
        lower: NaiveDate,
        upper: NaiveDate,
    ) -> Result<Vec<Operation>, StoreError>;

    /// Insert or replace records by id.
    async fn write(&self, operations: Vec<Operation>) -> Result<(), StoreError>;

    /// Look up one record by id.
    async fn get(&self, id: &str) -> Result<Operation, StoreError>;
}

/// Persistent set of categories, keyed by name.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// All records, tombstones included, sorted by name.
    async fn read_all(&self) -> Result<Vec<Category>, StoreError>;

    /// Look up one record by name. Tombstones are returned too.
    async fn get(&self, name: &str) -> Result<Category, StoreError>;

    /// Insert or replace a record by name.
    async fn write(&self, category: Category) -> Result<(), StoreError>;
}

/// Position of an operation in the date index: date, then insertion sequence.
type IndexKey = (NaiveDate, u64);

#[derive(Debug, Default)]
struct OperationIndex {
    by_date: BTreeMap<IndexKey, Operation>,
    by_id: HashMap<String, IndexKey>,
    next_seq: u64,
}

impl OperationIndex {
    fn upsert(&mut self, operation: Operation) {
        // Keep the original sequence when a record stays on its date, so the
        // tie-break between same-day operations survives rewrites.
        let seq = match self.by_id.get(&operation.id).copied() {
            Some(key) => {
                self.by_date.remove(&key);
                if key.0 == operation.date {
                    key.1
                } else {
                    self.bump()
                }
            }
            None => self.bump(),
        };
        let key = (operation.date, seq);
        self.by_id.insert(operation.id.clone(), key);
        self.by_date.insert(key, operation);
    }

    fn bump(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// In-memory [`OperationStore`].
#[derive(Debug, Default)]
pub struct MemoryOperationStore {
    index: RwLock<OperationIndex>,
}

impl MemoryOperationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `operations`. Later records replace earlier ones with the same id.
    pub fn with_operations(operations: impl IntoIterator<Item = Operation>) -> Self {
        let mut index = OperationIndex::default();
        for op in operations {
            index.upsert(op);
        }
        Self {
            index: RwLock::new(index),
        }
    }

    /// Synchronous snapshot of every record, in date order.
    pub fn snapshot(&self) -> Vec<Operation> {
        self.index.read().by_date.values().cloned().collect()
    }

    /// Number of records, tombstones included.
    pub fn len(&self) -> usize {
        self.index.read().by_id.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OperationStore for MemoryOperationStore {
    async fn read_all(&self) -> Result<Vec<Operation>, StoreError> {
        Ok(self.snapshot())
    }

    async fn read_range(
        &self,
        lower: NaiveDate,
        upper: NaiveDate,
    ) -> Result<Vec<Operation>, StoreError> {
        if lower > upper {
            return Ok(Vec::new());
        }
        let index = self.index.read();
        Ok(index
            .by_date
            .range((lower, 0)..=(upper, u64::MAX))
            .map(|(_, op)| op.clone())
            .collect())
    }

    async fn write(&self, operations: Vec<Operation>) -> Result<(), StoreError> {
        let mut index = self.index.write();
        tracing::debug!(count = operations.len(), "writing operations");
        for op in operations {
            index.upsert(op);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Operation, StoreError> {
        let index = self.index.read();
        index
            .by_id
            .get(id)
            .and_then(|key| index.by_date.get(key))
            .cloned()
            .ok_or_else(|| StoreError::operation_not_found(id))
    }
}

/// In-memory [`CategoryStore`].
#[derive(Debug, Default)]
pub struct MemoryCategoryStore {
    categories: RwLock<BTreeMap<String, Category>>,
}

impl MemoryCategoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `categories`.
    pub fn with_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        Self {
            categories: RwLock::new(
                categories
                    .into_iter()
                    .map(|c| (c.name.clone(), c))
                    .collect(),
            ),
        }
    }

    /// Synchronous snapshot of every record, sorted by name.
    pub fn snapshot(&self) -> Vec<Category> {
        self.categories.read().values().cloned().collect()
    }
}

#[async_trait]
impl CategoryStore for MemoryCategoryStore {
    async fn read_all(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self.snapshot())
    }

    async fn get(&self, name: &str) -> Result<Category, StoreError> {
        self.categories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::category_not_found(name))
    }

    async fn write(&self, category: Category) -> Result<(), StoreError> {
        self.categories
            .write()
            .insert(category.name.clone(), category);
        Ok(())
    }
}
