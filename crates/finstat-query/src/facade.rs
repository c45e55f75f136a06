//! Derived statistics for one category or predicate.
//!
//! [`CategoryStats`] runs the aggregator once on construction (a period total
//! and a per-day series) and derives averages, goal pace and per-day series
//! from the result. Trailing-window averages run one more aggregation.

use chrono::NaiveDate;
use finstat_core::{Category, CategoryStore, OperationStore};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::ast::Predicate;
use crate::error::StatsError;
use crate::rates::RateProvider;
use crate::reducer::{Reducer, SumReducer};
use crate::span::{Interval, Period, TimeSpan};
use crate::stats::calc_stats;

const TOTAL: &str = "total";
const DAILY: &str = "daily";

/// Statistics for a category or predicate over a span, in one currency.
pub struct CategoryStats<'a> {
    store: &'a dyn OperationStore,
    rates: &'a dyn RateProvider,
    predicate: Predicate,
    category: Option<Category>,
    currency: String,
    span: TimeSpan,
    today: NaiveDate,
    period_total: Decimal,
    daily: Vec<Decimal>,
}

impl std::fmt::Debug for CategoryStats<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryStats")
            .field("predicate", &self.predicate)
            .field("currency", &self.currency)
            .field("span", &self.span)
            .field("today", &self.today)
            .field("period_total", &self.period_total)
            .finish_non_exhaustive()
    }
}

/// Scalar metrics of a [`CategoryStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    /// Category name, if built for a category.
    pub category: Option<String>,
    /// Currency of every amount.
    pub currency: String,
    /// First day of the span.
    pub start: NaiveDate,
    /// Last day of the span.
    pub end: NaiveDate,
    /// Days of the span up to today.
    pub elapsed_days: i64,
    /// Number of days the averages are scaled to.
    pub days: u32,
    /// Total over the span.
    pub period_total: Decimal,
    /// Average per `days` over the elapsed part of the span.
    pub period_avg: Decimal,
    /// Trailing window used for `last_period_avg`.
    pub last_period: String,
    /// Average per `days` over the trailing window.
    pub last_period_avg: Decimal,
    /// Annual goal prorated to `days`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal: Option<Decimal>,
}

impl<'a> CategoryStats<'a> {
    /// Statistics for the live category `name`, in the category's currency.
    ///
    /// # Errors
    ///
    /// Returns a not-found [`StatsError::Store`] if no live category is
    /// called `name`, or any aggregation error.
    pub async fn for_category(
        store: &'a dyn OperationStore,
        categories: &dyn CategoryStore,
        rates: &'a dyn RateProvider,
        name: &str,
        span: TimeSpan,
        today: NaiveDate,
    ) -> Result<Self, StatsError> {
        let category = categories.get(name).await?;
        if !category.is_live() {
            return Err(finstat_core::StoreError::category_not_found(name).into());
        }
        let mut stats = Self {
            store,
            rates,
            predicate: Predicate::category(name),
            currency: category.currency.clone(),
            category: Some(category),
            span,
            today,
            period_total: Decimal::ZERO,
            daily: Vec::new(),
        };
        stats.refresh().await?;
        Ok(stats)
    }

    /// Statistics for every operation matching `predicate`, converted to `currency`.
    pub async fn for_predicate(
        store: &'a dyn OperationStore,
        rates: &'a dyn RateProvider,
        predicate: Predicate,
        currency: impl Into<String>,
        span: TimeSpan,
        today: NaiveDate,
    ) -> Result<Self, StatsError> {
        let mut stats = Self {
            store,
            rates,
            predicate,
            category: None,
            currency: currency.into(),
            span,
            today,
            period_total: Decimal::ZERO,
            daily: Vec::new(),
        };
        stats.refresh().await?;
        Ok(stats)
    }

    fn reducer(&self, reducer: SumReducer) -> SumReducer {
        match &self.category {
            Some(category) => reducer.for_category(category.name.as_str()),
            None => reducer,
        }
    }

    async fn refresh(&mut self) -> Result<(), StatsError> {
        let mut reducers: BTreeMap<&str, Box<dyn Reducer<Decimal>>> = BTreeMap::new();
        reducers.insert(
            TOTAL,
            Box::new(self.reducer(SumReducer::period_total(self.currency.as_str()))),
        );
        reducers.insert(
            DAILY,
            Box::new(self.reducer(SumReducer::per_interval(
                Interval::Day,
                self.currency.as_str(),
            ))),
        );

        let mut result = calc_stats(
            self.store,
            self.rates,
            &self.predicate,
            &self.span,
            self.today,
            &reducers,
        )
        .await?;
        self.period_total = result
            .get(TOTAL)
            .and_then(|buffer| buffer.last().copied())
            .unwrap_or_default();
        self.daily = result.remove(DAILY).unwrap_or_default();
        Ok(())
    }

    /// The span the statistics cover.
    pub const fn span(&self) -> &TimeSpan {
        &self.span
    }

    /// Currency of every amount.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The category record, if built for a category.
    pub const fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }

    /// Total over the span.
    pub const fn period_total(&self) -> Decimal {
        self.period_total
    }

    /// Total scaled to an average over `days` of the elapsed part of the span.
    ///
    /// Zero if the span has not started.
    pub fn period_avg(&self, days: u32) -> Decimal {
        let elapsed = self.span.elapsed_days(self.today);
        if elapsed <= 0 {
            return Decimal::ZERO;
        }
        self.period_total * Decimal::from(days) / Decimal::from(elapsed)
    }

    /// The category's annual goal prorated to `days`.
    pub fn goal(&self, days: u32) -> Option<Decimal> {
        self.category
            .as_ref()
            .and_then(|c| c.goal_for_days(days, self.today))
    }

    /// Total over the trailing `period` ending today, scaled to `days`.
    pub async fn last_period_avg(&self, days: u32, period: Period) -> Result<Decimal, StatsError> {
        let window = TimeSpan::last_period(self.today, period)?;
        if window.total_days() <= 0 {
            return Ok(Decimal::ZERO);
        }
        // The window spans total_days + 1 calendar days; skip its first day.
        let mut reducer = self.reducer(SumReducer::period_total(self.currency.as_str()));
        if let Some(first) = window.start().succ_opt() {
            reducer = reducer.since(first);
        }
        let mut reducers: BTreeMap<&str, Box<dyn Reducer<Decimal>>> = BTreeMap::new();
        reducers.insert(TOTAL, Box::new(reducer));

        let result = calc_stats(
            self.store,
            self.rates,
            &self.predicate,
            &window,
            self.today,
            &reducers,
        )
        .await?;
        let total = result
            .get(TOTAL)
            .and_then(|buffer| buffer.last().copied())
            .unwrap_or_default();
        Ok(total * Decimal::from(days) / Decimal::from(window.total_days()))
    }

    /// One amount per day of the span. `None` after today, zero on quiet days.
    pub fn amount_by_date(&self) -> Vec<Option<Decimal>> {
        self.span
            .all_dates(false)
            .zip(self.daily.iter().copied())
            .map(|(date, amount)| (date <= self.today).then_some(amount))
            .collect()
    }

    /// Running total of [`Self::amount_by_date`], carrying `None` after today.
    pub fn cumulative_amount_by_dates(&self) -> Vec<Option<Decimal>> {
        let mut running = Decimal::ZERO;
        self.amount_by_date()
            .into_iter()
            .map(|amount| {
                amount.map(|amount| {
                    running += amount;
                    running
                })
            })
            .collect()
    }

    /// Dates aligned with [`Self::amount_by_date`].
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.span.all_dates(false).collect()
    }

    /// Every scalar metric, with averages scaled to `days`.
    pub async fn summary(&self, days: u32, last: Period) -> Result<CategorySummary, StatsError> {
        Ok(CategorySummary {
            category: self.category.as_ref().map(|c| c.name.clone()),
            currency: self.currency.clone(),
            start: self.span.start(),
            end: self.span.end(),
            elapsed_days: self.span.elapsed_days(self.today),
            days,
            period_total: self.period_total,
            period_avg: self.period_avg(days),
            last_period: last.to_string(),
            last_period_avg: self.last_period_avg(days, last).await?,
            goal: self.goal(days),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::RateTable;
    use finstat_core::{MemoryCategoryStore, MemoryOperationStore, Operation, StoreError};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn food(id: &str, day: NaiveDate, amount: Decimal) -> Operation {
        Operation::expense(id, day, "Cash", amount, "USD").with_split("Food", amount)
    }

    #[tokio::test]
    async fn test_amount_by_date_marks_future_days() {
        let d = date(2024, 5, 10);
        let store = MemoryOperationStore::with_operations([food("e1", d, dec!(10))]);
        let cats = MemoryCategoryStore::with_categories([Category::new("Food", "USD")]);
        let rates = RateTable::new();
        let span = TimeSpan::new(d, date(2024, 5, 12)).unwrap();

        let stats =
            CategoryStats::for_category(&store, &cats, &rates, "Food", span, date(2024, 5, 11))
                .await
                .unwrap();
        assert_eq!(stats.amount_by_date(), vec![Some(dec!(10)), Some(dec!(0)), None]);
        assert_eq!(
            stats.cumulative_amount_by_dates(),
            vec![Some(dec!(10)), Some(dec!(10)), None]
        );
    }

    #[tokio::test]
    async fn test_period_avg_and_goal() {
        let store = MemoryOperationStore::with_operations([
            food("e1", date(2023, 4, 1), dec!(100)),
            food("e2", date(2023, 4, 20), dec!(200)),
        ]);
        let cats = MemoryCategoryStore::with_categories([
            Category::new("Food", "USD").with_goal(dec!(3650))
        ]);
        let rates = RateTable::new();
        let span = TimeSpan::month_of(date(2023, 4, 1));

        let stats =
            CategoryStats::for_category(&store, &cats, &rates, "Food", span, date(2023, 12, 1))
                .await
                .unwrap();
        assert_eq!(stats.period_total(), dec!(300));
        // Past span: 300 * 30 / 30 days.
        assert_eq!(stats.period_avg(30), dec!(300));
        assert_eq!(stats.period_avg(1), dec!(10));
        assert_eq!(stats.goal(30), Some(dec!(300)));
    }

    #[tokio::test]
    async fn test_period_avg_zero_before_span_starts() {
        let store = MemoryOperationStore::new();
        let rates = RateTable::new();
        let span = TimeSpan::month_of(date(2030, 1, 1));
        let stats = CategoryStats::for_predicate(
            &store,
            &rates,
            Predicate::any(),
            "USD",
            span,
            date(2024, 1, 1),
        )
        .await
        .unwrap();
        assert_eq!(stats.period_avg(30), Decimal::ZERO);
        assert_eq!(stats.goal(30), None);
        assert!(stats.amount_by_date().iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_last_period_avg() {
        let today = date(2024, 3, 31);
        let store = MemoryOperationStore::with_operations([
            // Outside the 30 day window (starts 2024-03-01, exclusive).
            food("e0", date(2024, 3, 1), dec!(1000)),
            food("e1", date(2024, 3, 2), dec!(60)),
            food("e2", date(2024, 3, 31), dec!(30)),
        ]);
        let cats = MemoryCategoryStore::with_categories([Category::new("Food", "USD")]);
        let rates = RateTable::new();

        let stats = CategoryStats::for_category(
            &store,
            &cats,
            &rates,
            "Food",
            TimeSpan::month_of(today),
            today,
        )
        .await
        .unwrap();
        let avg = stats.last_period_avg(30, Period::Days(30)).await.unwrap();
        assert_eq!(avg, dec!(90));

        let summary = stats.summary(30, Period::Days(30)).await.unwrap();
        assert_eq!(summary.period_total, dec!(1090));
        assert_eq!(summary.last_period_avg, dec!(90));
        assert_eq!(summary.last_period, "30d");
    }

    #[tokio::test]
    async fn test_missing_or_deleted_category() {
        let store = MemoryOperationStore::new();
        let cats = MemoryCategoryStore::with_categories([
            Category::new("Old", "USD").tombstone(chrono::Utc::now())
        ]);
        let rates = RateTable::new();
        let span = TimeSpan::day(date(2024, 1, 1));

        for name in ["Old", "Missing"] {
            let err = CategoryStats::for_category(
                &store,
                &cats,
                &rates,
                name,
                span,
                date(2024, 1, 1),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, StatsError::Store(StoreError::NotFound { .. })));
        }
    }
}
