//! JSON ledger loader for finstat.
//!
//! A ledger file is one JSON document holding options, operations,
//! categories and conversion rates:
//!
//! ```json
//! {
//!   "options": { "title": "Household", "base_currency": "USD" },
//!   "operations": [
//!     { "id": "op-1", "date": "2024-01-15", "type": "expense",
//!       "account": "Cash", "currency": "USD", "amount": "42.50",
//!       "categories": [{ "category": "Food", "amount": "42.50" }] }
//!   ],
//!   "categories": [{ "name": "Food", "currency": "USD", "goal": "3000" }],
//!   "rates": [{ "date": "2024-01-01", "base": "EUR", "quote": "USD", "rate": "1.10" }]
//! }
//! ```
//!
//! Loading fills in-memory stores and a rate table. Records sharing an id
//! (or a category name) are resolved to the most recently modified one.
//! [`save`] writes the stores back atomically.
//!
//! # Example
//!
//! ```ignore
//! use finstat_loader::load;
//! use std::path::Path;
//!
//! let ledger = load(Path::new("ledger.json"))?;
//! println!("{} operations", ledger.operations.len());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod options;

pub use options::Options;

use finstat_core::{Category, MemoryCategoryStore, MemoryOperationStore, Operation};
use finstat_query::{RateEntry, RateTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during loading or saving.
#[derive(Debug, Error)]
pub enum LoadError {
    /// IO error reading or writing a file.
    #[error("failed to access file {path}: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid ledger document.
    #[error("invalid ledger {path}: {source}")]
    Json {
        /// The file with the error.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An option has an invalid value.
    #[error("invalid option {option} = {value:?}: {reason}")]
    InvalidOption {
        /// Option name.
        option: String,
        /// Rejected value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// On-disk layout of a ledger file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct LedgerFile {
    options: Options,
    operations: Vec<Operation>,
    categories: Vec<Category>,
    rates: Vec<RateEntry>,
}

/// Result of loading a ledger file.
#[derive(Debug)]
pub struct LoadResult {
    /// Parsed options.
    pub options: Options,
    /// Every operation, tombstones included.
    pub operations: MemoryOperationStore,
    /// Every category record, tombstones included.
    pub categories: MemoryCategoryStore,
    /// Conversion rates.
    pub rates: RateTable,
    /// Number of records dropped because a newer record shared their key.
    pub duplicates: usize,
}

/// Load a ledger file.
pub fn load(path: &Path) -> Result<LoadResult, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, path)
}

/// Parse ledger content. `path` is only used in error messages.
pub fn parse(content: &str, path: &Path) -> Result<LoadResult, LoadError> {
    let file: LedgerFile = serde_json::from_str(content).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    file.options.validate()?;

    let mut duplicates = 0;
    let operations = newest_by_key(file.operations, &mut duplicates, |op| op.id.clone(), |op| {
        op.last_modified
    });
    let categories = newest_by_key(
        file.categories,
        &mut duplicates,
        |c| c.name.clone(),
        |c| c.last_modified,
    );
    if duplicates > 0 {
        warn!(
            path = %path.display(),
            duplicates,
            "resolved duplicate records by last modification time"
        );
    }

    let rates = RateTable::from_entries(&file.rates);
    debug!(
        path = %path.display(),
        operations = operations.len(),
        categories = categories.len(),
        rates = rates.len(),
        "ledger loaded"
    );

    Ok(LoadResult {
        options: file.options,
        operations: MemoryOperationStore::with_operations(operations),
        categories: MemoryCategoryStore::with_categories(categories),
        rates,
        duplicates,
    })
}

/// Keep one record per key: the most recently modified, the later one on ties.
/// Survivors keep their original relative order.
fn newest_by_key<T, K, M>(
    records: Vec<T>,
    duplicates: &mut usize,
    key: impl Fn(&T) -> K,
    modified: impl Fn(&T) -> M,
) -> Vec<T>
where
    K: std::hash::Hash + Eq,
    M: PartialOrd,
{
    let mut winners: HashMap<K, usize> = HashMap::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let slot = winners.entry(key(record)).or_insert(index);
        if *slot != index {
            *duplicates += 1;
            if modified(record) >= modified(&records[*slot]) {
                *slot = index;
            }
        }
    }
    let mut keep = vec![false; records.len()];
    for index in winners.into_values() {
        keep[index] = true;
    }
    records
        .into_iter()
        .zip(keep)
        .filter_map(|(record, keep)| keep.then_some(record))
        .collect()
}

/// Write the stores back to `path`, replacing it atomically.
pub fn save(
    path: &Path,
    options: &Options,
    operations: &MemoryOperationStore,
    categories: &MemoryCategoryStore,
    rates: &RateTable,
) -> Result<(), LoadError> {
    let file = LedgerFile {
        options: options.clone(),
        operations: operations.snapshot(),
        categories: categories.snapshot(),
        rates: rates.entries(),
    };
    let io_error = |source: std::io::Error| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_error)?;
    serde_json::to_writer_pretty(&mut tmp, &file).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.write_all(b"\n").map_err(io_error)?;
    tmp.persist(path).map_err(|e| io_error(e.error))?;

    debug!(path = %path.display(), "ledger saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_by_key_keeps_latest() {
        let records = vec![("a", 1), ("b", 1), ("a", 3), ("a", 2)];
        let mut duplicates = 0;
        let kept = newest_by_key(records, &mut duplicates, |r| r.0, |r| r.1);
        assert_eq!(kept, vec![("b", 1), ("a", 3)]);
        assert_eq!(duplicates, 2);
    }

    #[test]
    fn test_newest_by_key_tie_prefers_later() {
        let records = vec![("a", 1, "first"), ("a", 1, "second")];
        let mut duplicates = 0;
        let kept = newest_by_key(records, &mut duplicates, |r| r.0, |r| r.1);
        assert_eq!(kept, vec![("a", 1, "second")]);
    }

    #[test]
    fn test_empty_document() {
        let result = parse("{}", Path::new("empty.json")).unwrap();
        assert!(result.operations.is_empty());
        assert!(result.rates.is_empty());
        assert_eq!(result.options, Options::new());
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let err = parse("{ not json", Path::new("broken.json")).unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
