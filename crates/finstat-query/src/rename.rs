//! Category rename.
//!
//! Category names are storage keys, so a rename rewrites every referencing
//! split, writes a record under the new name and tombstones the old record.
//! Each step is idempotent given the same inputs: if the sequence fails
//! part-way, running it again completes it.

use chrono::{DateTime, Utc};
use finstat_core::{CategoryStore, Operation, OperationStore, StoreError};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CompileError, StatsError};

/// What a rename changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenameOutcome {
    /// Operations rewritten.
    pub operations: usize,
    /// Splits rewritten across those operations.
    pub splits: usize,
    /// The new name already belonged to a live category, whose record was kept.
    pub merged: bool,
}

/// Rename category `from` to `to` across both stores.
///
/// Renaming a category to its own name does nothing.
///
/// # Errors
///
/// Returns [`StatsError::Store`] with a not-found error if `from` does not
/// name a live category, [`StatsError::Compile`] if `to` is empty, or any
/// store failure.
pub async fn rename_category(
    operations: &dyn OperationStore,
    categories: &dyn CategoryStore,
    from: &str,
    to: &str,
) -> Result<RenameOutcome, StatsError> {
    rename_category_at(operations, categories, from, to, Utc::now()).await
}

/// [`rename_category`] with an explicit modification time.
#[tracing::instrument(skip(operations, categories, now))]
pub async fn rename_category_at(
    operations: &dyn OperationStore,
    categories: &dyn CategoryStore,
    from: &str,
    to: &str,
    now: DateTime<Utc>,
) -> Result<RenameOutcome, StatsError> {
    if to.is_empty() {
        return Err(CompileError::EmptyCategory.into());
    }
    let old = categories.get(from).await?;
    if !old.is_live() {
        return Err(StoreError::category_not_found(from).into());
    }
    if from == to {
        return Ok(RenameOutcome::default());
    }

    let mut outcome = RenameOutcome::default();
    let rewritten: Vec<Operation> = operations
        .read_all()
        .await?
        .into_iter()
        .filter(|op| op.has_category(from))
        .map(|mut op| {
            outcome.splits += op.rename_category(from, to);
            op.last_modified = now;
            op
        })
        .collect();
    outcome.operations = rewritten.len();
    debug!(
        operations = outcome.operations,
        splits = outcome.splits,
        "rewriting splits"
    );

    if !rewritten.is_empty() {
        operations.write(rewritten).await?;
    }

    // A live target equal to our own renamed record is left over from an
    // earlier run of this rename, not a category to merge into.
    outcome.merged = match categories.get(to).await {
        Ok(existing) => {
            existing.is_live() && existing != old.renamed(to, existing.last_modified)
        }
        Err(StoreError::NotFound { .. }) => false,
        Err(e) => return Err(e.into()),
    };
    if !outcome.merged {
        categories.write(old.renamed(to, now)).await?;
    }
    categories.write(old.tombstone(now)).await?;

    info!(from, to, merged = outcome.merged, "category renamed");
    Ok(outcome)
}
