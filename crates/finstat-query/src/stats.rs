//! The statistics aggregator.
//!
//! [`calc_stats`] reads one snapshot of the operations inside a span, keeps
//! those matching a predicate and walks them forward once, merged with the
//! bucket boundaries of every distinct reducer interval.

use chrono::NaiveDate;
use finstat_core::{Operation, OperationStore};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::ast::Predicate;
use crate::compile::compile;
use crate::error::StatsError;
use crate::rates::RateProvider;
use crate::reducer::{Event, ReduceContext, Reducer};
use crate::span::{Interval, IntervalBounds, TimeSpan};

/// Boundary schedule shared by every reducer with the same interval.
struct Schedule {
    interval: Option<Interval>,
    bounds: Vec<IntervalBounds>,
    /// Number of boundaries already emitted.
    emitted: usize,
}

impl Schedule {
    fn current(&self) -> Option<IntervalBounds> {
        self.emitted.checked_sub(1).map(|i| self.bounds[i])
    }

    fn pending_until(&self, date: NaiveDate) -> bool {
        self.bounds
            .get(self.emitted)
            .is_some_and(|b| b.start <= date)
    }
}

/// One registered reducer and its output.
struct Lane<'r, K, T> {
    key: &'r K,
    reducer: &'r dyn Reducer<T>,
    schedule: usize,
    buffer: Vec<T>,
    fresh: bool,
}

/// Compute every reducer's series over the operations matching `predicate` in `span`.
///
/// Operations are read once with [`OperationStore::read_range`]. Boundaries
/// dated on or before an operation are emitted before it. Every reducer
/// call is awaited in chronological order, and any error (including a
/// missing conversion rate) aborts the whole computation.
///
/// # Errors
///
/// Returns [`StatsError`] if the predicate is malformed, the store fails or
/// a reducer fails.
#[tracing::instrument(skip_all, fields(time_span = %span, predicate = %predicate, reducers = reducers.len()))]
pub async fn calc_stats<K, T>(
    store: &dyn OperationStore,
    rates: &dyn RateProvider,
    predicate: &Predicate,
    span: &TimeSpan,
    today: NaiveDate,
    reducers: &BTreeMap<K, Box<dyn Reducer<T>>>,
) -> Result<BTreeMap<K, Vec<T>>, StatsError>
where
    K: Ord + Clone,
    T: Send,
{
    let filter = compile(predicate)?;
    let mut operations = store.read_range(span.start(), span.end()).await?;
    operations.retain(|op| filter.matches(op));

    let mut schedules: Vec<Schedule> = Vec::new();
    let mut lanes: Vec<Lane<'_, K, T>> = Vec::with_capacity(reducers.len());
    for (key, reducer) in reducers {
        let interval = reducer.interval();
        let schedule = match schedules.iter().position(|s| s.interval == interval) {
            Some(index) => index,
            None => {
                schedules.push(Schedule {
                    interval,
                    bounds: span.intervals(interval),
                    emitted: 0,
                });
                schedules.len() - 1
            }
        };
        lanes.push(Lane {
            key,
            reducer: reducer.as_ref(),
            schedule,
            buffer: Vec::new(),
            fresh: true,
        });
    }

    for op in &operations {
        emit_boundaries(&mut schedules, &mut lanes, rates, today, Some(op.date)).await?;
        fold(&schedules, &mut lanes, rates, today, op).await?;
    }
    emit_boundaries(&mut schedules, &mut lanes, rates, today, None).await?;

    debug!(
        operations = operations.len(),
        schedules = schedules.len(),
        "aggregation walk complete"
    );

    Ok(lanes
        .into_iter()
        .map(|lane| (lane.key.clone(), lane.buffer))
        .collect())
}

/// Emit every boundary starting on or before `until` (all remaining ones if `None`).
async fn emit_boundaries<K, T: Send>(
    schedules: &mut [Schedule],
    lanes: &mut [Lane<'_, K, T>],
    rates: &dyn RateProvider,
    today: NaiveDate,
    until: Option<NaiveDate>,
) -> Result<(), StatsError> {
    loop {
        // Earliest pending boundary across schedules, so the walk stays chronological.
        let next = schedules
            .iter()
            .enumerate()
            .filter(|(_, s)| match until {
                Some(date) => s.pending_until(date),
                None => s.emitted < s.bounds.len(),
            })
            .min_by_key(|(_, s)| s.bounds[s.emitted].start)
            .map(|(index, _)| index);
        let Some(index) = next else {
            return Ok(());
        };

        let schedule = &mut schedules[index];
        let bounds = schedule.bounds[schedule.emitted];
        schedule.emitted += 1;
        trace!(interval = ?schedule.interval, start = %bounds.start, end = %bounds.end, "boundary");

        let ctx = ReduceContext {
            bounds,
            first_in_interval: true,
            interval: schedule.interval,
            today,
            rates,
        };
        for lane in lanes.iter_mut().filter(|l| l.schedule == index) {
            lane.reducer
                .reduce(Event::Boundary, &ctx, &mut lane.buffer)
                .await?;
            lane.fresh = true;
        }
    }
}

async fn fold<K, T: Send>(
    schedules: &[Schedule],
    lanes: &mut [Lane<'_, K, T>],
    rates: &dyn RateProvider,
    today: NaiveDate,
    op: &Operation,
) -> Result<(), StatsError> {
    for lane in lanes.iter_mut() {
        if !lane.reducer.accepts(op) {
            continue;
        }
        let schedule = &schedules[lane.schedule];
        let Some(bounds) = schedule.current() else {
            continue;
        };
        let ctx = ReduceContext {
            bounds,
            first_in_interval: lane.fresh,
            interval: schedule.interval,
            today,
            rates,
        };
        lane.reducer
            .reduce(Event::Operation(op), &ctx, &mut lane.buffer)
            .await?;
        lane.fresh = false;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::RateTable;
    use crate::reducer::SumReducer;
    use async_trait::async_trait;
    use finstat_core::MemoryOperationStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Records which operations opened a bucket.
    struct FirstOps;

    #[async_trait]
    impl Reducer<Vec<String>> for FirstOps {
        fn interval(&self) -> Option<Interval> {
            Some(Interval::Week)
        }

        async fn reduce(
            &self,
            event: Event<'_>,
            ctx: &ReduceContext<'_>,
            buffer: &mut Vec<Vec<String>>,
        ) -> Result<(), StatsError> {
            match event {
                Event::Boundary => buffer.push(Vec::new()),
                Event::Operation(op) => {
                    if ctx.first_in_interval {
                        if let Some(last) = buffer.last_mut() {
                            last.push(op.id.clone());
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_first_in_interval_flag() {
        // 2024-01-01 is a Monday.
        let store = MemoryOperationStore::with_operations([
            Operation::expense("a", date(2024, 1, 1), "Cash", dec!(1), "USD"),
            Operation::expense("b", date(2024, 1, 3), "Cash", dec!(1), "USD"),
            Operation::expense("c", date(2024, 1, 9), "Cash", dec!(1), "USD"),
        ]);
        let span = TimeSpan::new(date(2024, 1, 1), date(2024, 1, 21)).unwrap();
        let mut reducers: BTreeMap<&str, Box<dyn Reducer<Vec<String>>>> = BTreeMap::new();
        reducers.insert("first", Box::new(FirstOps));

        let result = calc_stats(
            &store,
            &RateTable::new(),
            &Predicate::any(),
            &span,
            date(2024, 1, 21),
            &reducers,
        )
        .await
        .unwrap();

        assert_eq!(
            result["first"],
            vec![vec!["a".to_string()], vec!["c".to_string()], vec![]]
        );
    }

    #[tokio::test]
    async fn test_operations_outside_span_are_ignored() {
        let store = MemoryOperationStore::with_operations([
            Operation::expense("a", date(2023, 12, 31), "Cash", dec!(100), "USD"),
            Operation::expense("b", date(2024, 1, 1), "Cash", dec!(1), "USD"),
            Operation::expense("c", date(2024, 2, 1), "Cash", dec!(100), "USD"),
        ]);
        let span = TimeSpan::month_of(date(2024, 1, 10));
        let mut reducers: BTreeMap<&str, Box<dyn Reducer<Decimal>>> = BTreeMap::new();
        reducers.insert("total", Box::new(SumReducer::period_total("USD")));

        let result = calc_stats(
            &store,
            &RateTable::new(),
            &Predicate::any(),
            &span,
            date(2024, 1, 31),
            &reducers,
        )
        .await
        .unwrap();
        assert_eq!(result["total"], vec![dec!(1)]);
    }

    #[tokio::test]
    async fn test_malformed_predicate_fails_before_reading() {
        let store = MemoryOperationStore::new();
        let span = TimeSpan::day(date(2024, 1, 1));
        let reducers: BTreeMap<&str, Box<dyn Reducer<Decimal>>> = BTreeMap::new();

        let err = calc_stats(
            &store,
            &RateTable::new(),
            &Predicate::category(""),
            &span,
            date(2024, 1, 1),
            &reducers,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StatsError::Compile(_)));
    }
}
