//! Reducer framework.
//!
//! A [`Reducer`] is a fold that owns one growing output buffer. The
//! aggregator ([`crate::calc_stats`]) drives every registered reducer through
//! one chronological walk: a [`Event::Boundary`] opens a fresh bucket and an
//! [`Event::Operation`] folds one operation into the current bucket.
//!
//! [`SumReducer`] covers the standard shapes: per-interval sums, running
//! totals and single period totals, with optional category, filter, sign and
//! elapsed-only modifiers.

use async_trait::async_trait;
use chrono::NaiveDate;
use finstat_core::{Operation, OperationBody};
use rust_decimal::Decimal;

use crate::compile::CompiledPredicate;
use crate::error::StatsError;
use crate::rates::{self, RateProvider};
use crate::span::{Interval, IntervalBounds};

/// One step of the aggregation walk.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// Start of a new interval bucket.
    Boundary,
    /// A matching operation inside the current bucket.
    Operation(&'a Operation),
}

/// Per-call state handed to [`Reducer::reduce`].
pub struct ReduceContext<'a> {
    /// Bounds of the bucket the event belongs to.
    pub bounds: IntervalBounds,
    /// True at a boundary and at the first operation folded into a bucket.
    pub first_in_interval: bool,
    /// Interval of the reducer being driven.
    pub interval: Option<Interval>,
    /// The caller's notion of today.
    pub today: NaiveDate,
    /// Conversion rates.
    pub rates: &'a dyn RateProvider,
}

impl std::fmt::Debug for ReduceContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReduceContext")
            .field("bounds", &self.bounds)
            .field("first_in_interval", &self.first_in_interval)
            .field("interval", &self.interval)
            .field("today", &self.today)
            .finish_non_exhaustive()
    }
}

/// A stateful fold producing a sequence of `T`.
///
/// Implementations must only touch the buffer they are given; the
/// aggregator awaits each call before issuing the next one.
#[async_trait]
pub trait Reducer<T: Send>: Send + Sync {
    /// Bucket size, or `None` for one bucket spanning the query.
    fn interval(&self) -> Option<Interval>;

    /// Check whether this reducer wants `op`. Defaults to every operation.
    fn accepts(&self, _op: &Operation) -> bool {
        true
    }

    /// Fold one event into `buffer`.
    async fn reduce(
        &self,
        event: Event<'_>,
        ctx: &ReduceContext<'_>,
        buffer: &mut Vec<T>,
    ) -> Result<(), StatsError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    PerInterval,
    Cumulative,
}

/// Sums converted operation amounts into buckets.
#[derive(Debug, Clone)]
pub struct SumReducer {
    shape: Shape,
    interval: Option<Interval>,
    currency: String,
    categories: Vec<String>,
    filter: Option<CompiledPredicate>,
    since: Option<NaiveDate>,
    signed: bool,
    elapsed_only: bool,
}

impl SumReducer {
    fn with_shape(shape: Shape, interval: Option<Interval>, currency: impl Into<String>) -> Self {
        Self {
            shape,
            interval,
            currency: currency.into(),
            categories: Vec::new(),
            filter: None,
            since: None,
            signed: false,
            elapsed_only: false,
        }
    }

    /// One independent sum per bucket. Empty buckets stay `0`.
    #[must_use]
    pub fn per_interval(interval: Interval, currency: impl Into<String>) -> Self {
        Self::with_shape(Shape::PerInterval, Some(interval), currency)
    }

    /// A running total; each bucket starts from the previous bucket's value.
    #[must_use]
    pub fn cumulative(interval: Interval, currency: impl Into<String>) -> Self {
        Self::with_shape(Shape::Cumulative, Some(interval), currency)
    }

    /// One bucket holding the total over the whole span.
    #[must_use]
    pub fn period_total(currency: impl Into<String>) -> Self {
        Self::with_shape(Shape::PerInterval, None, currency)
    }

    /// Sum only the splits of `category`, and only accept operations that have one.
    #[must_use]
    pub fn for_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Sum only the splits of any of `categories`, and only accept operations
    /// that have at least one such split.
    #[must_use]
    pub fn for_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.extend(categories.into_iter().map(Into::into));
        self
    }

    /// Only accept operations matching `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: CompiledPredicate) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Ignore operations dated before `date`.
    #[must_use]
    pub const fn since(mut self, date: NaiveDate) -> Self {
        self.since = Some(date);
        self
    }

    /// Apply the direction of each operation (income positive, expense negative).
    #[must_use]
    pub const fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// Ignore operations dated after today.
    #[must_use]
    pub const fn elapsed_only(mut self) -> Self {
        self.elapsed_only = true;
        self
    }

    fn value(&self, op: &Operation) -> Decimal {
        let magnitude = if !self.categories.is_empty() {
            op.splits()
                .iter()
                .filter(|split| self.categories.contains(&split.category))
                .map(|split| split.amount)
                .sum()
        } else if self.signed {
            return op.signed_amount();
        } else {
            op.amount()
        };
        if self.signed && matches!(op.body, OperationBody::Expense(_)) {
            -magnitude
        } else {
            magnitude
        }
    }
}

#[async_trait]
impl Reducer<Decimal> for SumReducer {
    fn interval(&self) -> Option<Interval> {
        self.interval
    }

    fn accepts(&self, op: &Operation) -> bool {
        if self.since.is_some_and(|since| op.date < since) {
            return false;
        }
        if !self.categories.is_empty()
            && !self.categories.iter().any(|c| op.has_category(c))
        {
            return false;
        }
        self.filter.as_ref().map_or(true, |f| f.matches(op))
    }

    async fn reduce(
        &self,
        event: Event<'_>,
        ctx: &ReduceContext<'_>,
        buffer: &mut Vec<Decimal>,
    ) -> Result<(), StatsError> {
        let op = match event {
            Event::Boundary => {
                let opening = match self.shape {
                    Shape::PerInterval => Decimal::ZERO,
                    Shape::Cumulative => buffer.last().copied().unwrap_or_default(),
                };
                buffer.push(opening);
                return Ok(());
            }
            Event::Operation(op) => op,
        };

        if self.elapsed_only && op.date > ctx.today {
            return Ok(());
        }
        let Some(currency) = op.currency() else {
            return Ok(());
        };

        let value = self.value(op);
        let converted =
            rates::convert(ctx.rates, value, op.date, currency, &self.currency).await?;
        match buffer.last_mut() {
            Some(last) => *last += converted,
            None => buffer.push(converted),
        }
        Ok(())
    }
}
