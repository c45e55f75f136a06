//! Engine error types.

use chrono::NaiveDate;
use finstat_core::StoreError;
use thiserror::Error;

/// Error returned when a predicate expression is malformed.
///
/// Raised while compiling, before any operation is evaluated, so a bad filter
/// never silently passes operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A category leaf with an empty name.
    #[error("category predicate requires a non-empty name")]
    EmptyCategory,
    /// An account leaf with no names, or with an empty name.
    #[error("account predicate requires at least one non-empty account name")]
    EmptyAccounts,
    /// An `and`/`or` node without operands.
    #[error("'{0}' predicate requires at least one operand")]
    NoOperands(&'static str),
    /// A type leaf naming a kind that cannot match live operations.
    #[error("type predicate cannot select {0} operations")]
    InvalidType(String),
    /// A textual expression that does not describe a predicate.
    #[error("malformed predicate expression: {0}")]
    Malformed(String),
}

/// Error returned when no conversion rate is known.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    /// No direct, inverse or chained rate for the pair on or before the date.
    #[error("no rate from {from} to {to} on {date}")]
    Unavailable {
        /// Source currency.
        from: String,
        /// Target currency.
        to: String,
        /// Date of the lookup.
        date: NaiveDate,
    },
}

impl RateError {
    /// Create an [`RateError::Unavailable`].
    pub fn unavailable(from: &str, to: &str, date: NaiveDate) -> Self {
        Self::Unavailable {
            from: from.to_string(),
            to: to.to_string(),
            date,
        }
    }
}

/// Error returned when computing statistics fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// Malformed predicate.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    /// Currency conversion failed.
    #[error("rate error: {0}")]
    Rate(#[from] RateError),
    /// Store access failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// A time span whose start is after its end.
    #[error("invalid time span: {start} is after {end}")]
    InvalidSpan {
        /// Requested start.
        start: NaiveDate,
        /// Requested end.
        end: NaiveDate,
    },
    /// A trailing period reaching before the supported calendar.
    #[error("period {period} before {today} is out of range")]
    PeriodOutOfRange {
        /// The period, as written.
        period: String,
        /// The date it was subtracted from.
        today: NaiveDate,
    },
}
