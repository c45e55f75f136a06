//! Core types for finstat
//!
//! This crate provides the fundamental types used throughout the finstat project:
//!
//! - [`Operation`] - One recorded financial event (income, expense, transfer, adjustment, tombstone)
//! - [`Split`] - A `{ category, amount }` part of an income or expense
//! - [`Category`] - A category record with optional annual goal
//! - [`OperationStore`] / [`CategoryStore`] - Storage interfaces consumed by the engine
//!
//! # Example
//!
//! ```
//! use finstat_core::{Operation, OperationKind};
//! use rust_decimal_macros::dec;
//! use chrono::NaiveDate;
//!
//! let op = Operation::expense(
//!     "op-1",
//!     NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
//!     "Cash",
//!     dec!(42.50),
//!     "USD",
//! )
//! .with_split("Food", dec!(30.00))
//! .with_split("Coffee", dec!(12.50));
//!
//! assert_eq!(op.kind(), OperationKind::Expense);
//! assert_eq!(op.category_amount("Food"), dec!(30.00));
//! assert_eq!(op.signed_amount(), dec!(-42.50));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod category;
pub mod operation;
pub mod store;

pub use category::{days_in_year, Category};
pub use operation::{
    sort_operations, Adjustment, Flow, Operation, OperationBody, OperationKind, Split, Transfer,
    UnknownKind,
};
pub use store::{
    CategoryStore, MemoryCategoryStore, MemoryOperationStore, OperationStore, StoreError,
};

// Re-export commonly used external types
pub use chrono::NaiveDate;
pub use rust_decimal::Decimal;
