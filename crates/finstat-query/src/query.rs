//! Chainable operation queries.
//!
//! An [`OperationQuery`] holds one date-sorted snapshot of the operation log
//! and a predicate. Narrowing methods return a new query and leave the
//! receiver untouched; terminals iterate lazily over the snapshot.
//!
//! ```
//! use finstat_core::{NaiveDate, Operation};
//! use finstat_query::{OperationQuery, SortDirection};
//! use rust_decimal_macros::dec;
//!
//! let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
//! let query = OperationQuery::from_operations(vec![
//!     Operation::expense("e1", day, "Cash", dec!(12), "USD").with_split("Food", dec!(12)),
//!     Operation::income("i1", day, "Bank", dec!(900), "USD"),
//! ]);
//!
//! let food = query.for_categories(["Food"]).unwrap();
//! assert_eq!(food.count(), 1);
//! assert_eq!(query.count(), 2);
//! assert_eq!(food.sum_category_amount("Food"), dec!(12));
//! assert_eq!(food.operations(SortDirection::Desc).next().unwrap().id, "e1");
//! ```

use chrono::NaiveDate;
use finstat_core::{sort_operations, Operation, OperationKind, OperationStore, StoreError};
use rust_decimal::Decimal;
use std::iter::{FusedIterator, Peekable};
use std::sync::Arc;

use crate::ast::Predicate;
use crate::compile::{compile, CompiledPredicate};
use crate::error::CompileError;
use crate::span::TimeSpan;

/// Iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Oldest first (default).
    #[default]
    Asc,
    /// Newest first.
    Desc,
}

/// An immutable, narrowable view over a snapshot of operations.
#[derive(Debug, Clone)]
pub struct OperationQuery {
    snapshot: Arc<[Operation]>,
    predicate: Predicate,
    filter: CompiledPredicate,
    lower: Option<NaiveDate>,
    upper: Option<NaiveDate>,
}

impl OperationQuery {
    /// Snapshot the store with a single [`OperationStore::read_all`].
    pub async fn load(store: &dyn OperationStore) -> Result<Self, StoreError> {
        Ok(Self::from_sorted(store.read_all().await?))
    }

    /// Query over an in-memory vector. Operations are sorted by date (stable).
    #[must_use]
    pub fn from_operations(mut operations: Vec<Operation>) -> Self {
        sort_operations(&mut operations);
        Self::from_sorted(operations)
    }

    fn from_sorted(operations: Vec<Operation>) -> Self {
        Self {
            snapshot: operations.into(),
            predicate: Predicate::Any,
            filter: CompiledPredicate::always(),
            lower: None,
            upper: None,
        }
    }

    /// The accumulated predicate, without the date range.
    pub const fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Restrict to `span`, intersecting any earlier span.
    #[must_use]
    pub fn time_span(&self, span: &TimeSpan) -> Self {
        let mut query = self.clone();
        query.lower = Some(query.lower.map_or(span.start(), |d| d.max(span.start())));
        query.upper = Some(query.upper.map_or(span.end(), |d| d.min(span.end())));
        query
    }

    /// Add an arbitrary conjunct.
    pub fn filter(&self, predicate: Predicate) -> Result<Self, CompileError> {
        let predicate = self.predicate.clone().and(predicate);
        let filter = compile(&predicate)?;
        Ok(Self {
            predicate,
            filter,
            ..self.clone()
        })
    }

    /// Keep operations touching any of `accounts`.
    pub fn for_accounts<I, S>(&self, accounts: I) -> Result<Self, CompileError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter(Predicate::accounts(accounts))
    }

    /// Keep incomes and expenses with a split in any of `categories`.
    pub fn for_categories<I, S>(&self, categories: I) -> Result<Self, CompileError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let any_category = categories
            .into_iter()
            .map(Predicate::category)
            .reduce(Predicate::or)
            .ok_or(CompileError::NoOperands("or"))?;
        self.filter(
            Predicate::kinds([OperationKind::Income, OperationKind::Expense]).and(any_category),
        )
    }

    /// Keep operations of the given kinds.
    pub fn keep_types(
        &self,
        kinds: impl IntoIterator<Item = OperationKind>,
    ) -> Result<Self, CompileError> {
        self.filter(Predicate::kinds(kinds))
    }

    fn window(&self) -> &[Operation] {
        let from = self
            .lower
            .map_or(0, |lower| self.snapshot.partition_point(|op| op.date < lower));
        let to = self.upper.map_or(self.snapshot.len(), |upper| {
            self.snapshot.partition_point(|op| op.date <= upper)
        });
        self.snapshot.get(from..to).unwrap_or_default()
    }

    /// Matching operations in date order. Tombstones are never yielded.
    pub fn operations(&self, direction: SortDirection) -> Operations<'_> {
        Operations {
            inner: self.window().iter(),
            filter: &self.filter,
            direction,
        }
    }

    /// Matching operations grouped into runs of the same date.
    pub fn group_by_date(&self, direction: SortDirection) -> DateGroups<'_> {
        DateGroups {
            inner: self.operations(direction).peekable(),
        }
    }

    /// Number of matching operations.
    pub fn count(&self) -> usize {
        self.operations(SortDirection::Asc).count()
    }

    /// Sum of the split amounts attributed to `category` across matching operations.
    pub fn sum_category_amount(&self, category: &str) -> Decimal {
        self.operations(SortDirection::Asc)
            .map(|op| op.category_amount(category))
            .sum()
    }
}

/// Lazy iterator over the operations of a query.
#[derive(Debug, Clone)]
pub struct Operations<'a> {
    inner: std::slice::Iter<'a, Operation>,
    filter: &'a CompiledPredicate,
    direction: SortDirection,
}

impl<'a> Iterator for Operations<'a> {
    type Item = &'a Operation;

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter;
        match self.direction {
            SortDirection::Asc => self.inner.find(|op| filter.matches(op)),
            SortDirection::Desc => self.inner.rfind(|op| filter.matches(op)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.inner.len()))
    }
}

impl FusedIterator for Operations<'_> {}

/// Lazy iterator over same-date runs of a query.
#[derive(Debug, Clone)]
pub struct DateGroups<'a> {
    inner: Peekable<Operations<'a>>,
}

impl<'a> Iterator for DateGroups<'a> {
    type Item = (NaiveDate, Vec<&'a Operation>);

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.inner.next()?;
        let date = first.date;
        let mut group = vec![first];
        while let Some(op) = self.inner.next_if(|op| op.date == date) {
            group.push(op);
        }
        Some((date, group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finstat_core::MemoryOperationStore;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Vec<Operation> {
        vec![
            Operation::expense("e2", date(2024, 1, 3), "Card", dec!(20), "USD")
                .with_split("Food", dec!(15))
                .with_split("Home", dec!(5)),
            Operation::expense("e1", date(2024, 1, 1), "Cash", dec!(10), "USD")
                .with_split("Food", dec!(10)),
            Operation::income("i1", date(2024, 1, 3), "Bank", dec!(500), "USD")
                .with_split("Salary", dec!(500)),
            Operation::transfer("t1", date(2024, 1, 2), "Bank", "Cash", dec!(50), "USD"),
            Operation::deleted("x1", date(2024, 1, 2)),
            Operation::adjustment("a1", date(2024, 1, 5), "Cash", dec!(-1), "USD"),
        ]
    }

    fn ids<'a>(ops: impl Iterator<Item = &'a Operation>) -> Vec<&'a str> {
        ops.map(|op| op.id.as_str()).collect()
    }

    #[test]
    fn test_tombstones_never_yielded() {
        let query = OperationQuery::from_operations(sample());
        assert_eq!(query.count(), 5);
        assert!(query
            .operations(SortDirection::Asc)
            .all(|op| !op.is_deleted()));
    }

    #[test]
    fn test_directions() {
        let query = OperationQuery::from_operations(sample());
        assert_eq!(
            ids(query.operations(SortDirection::Asc)),
            vec!["e1", "t1", "e2", "i1", "a1"]
        );
        assert_eq!(
            ids(query.operations(SortDirection::Desc)),
            vec!["a1", "i1", "e2", "t1", "e1"]
        );
    }

    #[test]
    fn test_narrowing_leaves_receiver_untouched() {
        let query = OperationQuery::from_operations(sample());
        let cash = query.for_accounts(["Cash"]).unwrap();

        // Transfer into Cash counts as touching Cash.
        assert_eq!(ids(cash.operations(SortDirection::Asc)), vec!["e1", "t1", "a1"]);
        assert_eq!(query.count(), 5);
    }

    #[test]
    fn test_time_spans_intersect() {
        let query = OperationQuery::from_operations(sample())
            .time_span(&TimeSpan::new(date(2024, 1, 1), date(2024, 1, 3)).unwrap())
            .time_span(&TimeSpan::new(date(2024, 1, 2), date(2024, 1, 10)).unwrap());
        assert_eq!(
            ids(query.operations(SortDirection::Asc)),
            vec!["t1", "e2", "i1"]
        );

        let disjoint = query.time_span(&TimeSpan::day(date(2024, 2, 1)));
        assert_eq!(disjoint.count(), 0);
    }

    #[test]
    fn test_for_categories_and_sum() {
        let query = OperationQuery::from_operations(sample());
        let food = query.for_categories(["Food"]).unwrap();
        assert_eq!(food.count(), 2);
        assert_eq!(food.sum_category_amount("Food"), dec!(25));
        assert_eq!(food.sum_category_amount("Home"), dec!(5));

        let either = query.for_categories(["Home", "Salary"]).unwrap();
        assert_eq!(ids(either.operations(SortDirection::Asc)), vec!["e2", "i1"]);

        assert_eq!(
            query.for_categories(Vec::<String>::new()).unwrap_err(),
            CompileError::NoOperands("or")
        );
        assert_eq!(
            query.for_categories([""]).unwrap_err(),
            CompileError::EmptyCategory
        );
    }

    #[test]
    fn test_keep_types() {
        let query = OperationQuery::from_operations(sample())
            .keep_types([OperationKind::Transfer, OperationKind::Adjustment])
            .unwrap();
        assert_eq!(ids(query.operations(SortDirection::Asc)), vec!["t1", "a1"]);
    }

    #[test]
    fn test_group_by_date() {
        let query = OperationQuery::from_operations(sample());
        let groups: Vec<_> = query
            .group_by_date(SortDirection::Desc)
            .map(|(date, ops)| (date, ids(ops.into_iter())))
            .collect();

        assert_eq!(
            groups,
            vec![
                (date(2024, 1, 5), vec!["a1"]),
                (date(2024, 1, 3), vec!["i1", "e2"]),
                (date(2024, 1, 2), vec!["t1"]),
                (date(2024, 1, 1), vec!["e1"]),
            ]
        );
    }

    #[test]
    fn test_iterators_are_restartable() {
        let query = OperationQuery::from_operations(sample());
        let first: Vec<_> = ids(query.operations(SortDirection::Asc));
        let second: Vec<_> = ids(query.operations(SortDirection::Asc));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = MemoryOperationStore::with_operations(sample());
        let query = OperationQuery::load(&store).await.unwrap();
        assert_eq!(query.count(), 5);
    }
}
