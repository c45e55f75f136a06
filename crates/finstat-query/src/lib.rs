//! Statistics engine for finstat.
//!
//! This crate answers time-windowed, currency-normalized, filtered aggregate
//! questions over an operation log ("total spent on Food over the last 30
//! days, in USD").
//!
//! # Overview
//!
//! - [`Predicate`] - declarative filter expressions, compiled once with [`compile`]
//! - [`OperationQuery`] - chainable, lazily evaluated queries over a snapshot
//! - [`TimeSpan`] / [`Interval`] / [`Period`] - calendar spans and buckets
//! - [`RateProvider`] / [`RateTable`] - dated currency conversion
//! - [`Reducer`] / [`SumReducer`] and [`calc_stats`] - the aggregation walk
//! - [`CategoryStats`] - totals, averages, goal pace and per-day series
//! - [`rename_category`] - the multi-step category rename
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use finstat_core::{Decimal, MemoryOperationStore, NaiveDate, Operation};
//! use finstat_query::{calc_stats, Interval, Predicate, RateTable, Reducer, SumReducer, TimeSpan};
//! use rust_decimal_macros::dec;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
//! let store = MemoryOperationStore::with_operations([
//!     Operation::expense("e1", day(1), "Cash", dec!(10), "USD").with_split("Food", dec!(10)),
//!     Operation::expense("e2", day(3), "Cash", dec!(5), "USD").with_split("Food", dec!(5)),
//! ]);
//!
//! let mut reducers: BTreeMap<&str, Box<dyn Reducer<Decimal>>> = BTreeMap::new();
//! reducers.insert("daily", Box::new(SumReducer::per_interval(Interval::Day, "USD")));
//! reducers.insert("running", Box::new(SumReducer::cumulative(Interval::Day, "USD")));
//!
//! let span = TimeSpan::new(day(1), day(3)).unwrap();
//! let stats = calc_stats(&store, &RateTable::new(), &Predicate::category("Food"), &span, day(3), &reducers)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(stats["daily"], vec![dec!(10), dec!(0), dec!(5)]);
//! assert_eq!(stats["running"], vec![dec!(10), dec!(10), dec!(15)]);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
pub mod compile;
pub mod error;
pub mod facade;
pub mod query;
pub mod rates;
pub mod reducer;
pub mod rename;
pub mod span;
pub mod stats;

pub use ast::Predicate;
pub use compile::{compile, CompiledPredicate};
pub use error::{CompileError, RateError, StatsError};
pub use facade::{CategoryStats, CategorySummary};
pub use query::{DateGroups, OperationQuery, Operations, SortDirection};
pub use rates::{convert, rate, CachingRateProvider, RateEntry, RateProvider, RateTable};
pub use reducer::{Event, ReduceContext, Reducer, SumReducer};
pub use rename::{rename_category, rename_category_at, RenameOutcome};
pub use span::{Dates, Interval, IntervalBounds, Period, TimeSpan};
pub use stats::calc_stats;
