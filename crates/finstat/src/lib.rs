//! Personal finance statistics from the command line.
//!
//! This crate provides the `finstat` binary:
//!
//! - `totals` - per-interval and running totals for any filter
//! - `category` - totals, averages and goal pace for one category
//! - `daily` - per-day and cumulative series for one category
//! - `list` - operations grouped by date, newest first
//! - `rename` - rename a category across the whole ledger
//!
//! # Example Usage
//!
//! ```bash
//! finstat ledger.json totals --category Food --interval week
//! finstat ledger.json category Food --days 30 --last 3m
//! finstat ledger.json --format csv daily Food --from 2024-01-01 --to 2024-01-31
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod output;
