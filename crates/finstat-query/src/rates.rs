//! Currency conversion rates.
//!
//! The engine resolves rates through the [`RateProvider`] trait: a synchronous
//! [`RateProvider::cached_rate`] fast path and an asynchronous
//! [`RateProvider::get_rate`] fallback. [`RateTable`] is an in-memory provider
//! holding dated rates; [`CachingRateProvider`] memoizes any other provider.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::RateError;

/// Source of conversion rates as of a date.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Rate available without suspending, if any.
    fn cached_rate(&self, _date: NaiveDate, _from: &str, _to: &str) -> Option<Decimal> {
        None
    }

    /// Rate converting one unit of `from` into `to` as of `date`.
    async fn get_rate(&self, date: NaiveDate, from: &str, to: &str) -> Result<Decimal, RateError>;
}

/// Resolve a rate: identical codes yield one, then the fast path, then the fallback.
pub async fn rate(
    provider: &dyn RateProvider,
    date: NaiveDate,
    from: &str,
    to: &str,
) -> Result<Decimal, RateError> {
    if from == to {
        return Ok(Decimal::ONE);
    }
    if let Some(rate) = provider.cached_rate(date, from, to) {
        return Ok(rate);
    }
    provider.get_rate(date, from, to).await
}

/// Convert `amount` of `from` into `to` as of `date`.
pub async fn convert(
    provider: &dyn RateProvider,
    amount: Decimal,
    date: NaiveDate,
    from: &str,
    to: &str,
) -> Result<Decimal, RateError> {
    if from == to {
        return Ok(amount);
    }
    Ok(amount * rate(provider, date, from, to).await?)
}

/// One dated rate: one unit of `base` is worth `rate` units of `quote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateEntry {
    /// Date the rate was observed.
    pub date: NaiveDate,
    /// Base currency.
    pub base: String,
    /// Quote currency.
    pub quote: String,
    /// Units of `quote` per unit of `base`.
    pub rate: Decimal,
}

#[derive(Debug, Clone)]
struct Quote {
    date: NaiveDate,
    rate: Decimal,
    currency: String,
}

/// In-memory table of dated rates.
///
/// Stores rates as a map from base currency to quotes kept sorted by date.
/// Lookups use the latest rate on or before the requested date and try a
/// direct quote, the inverse quote, then one intermediate currency.
#[derive(Debug, Default, Clone)]
pub struct RateTable {
    quotes: HashMap<String, Vec<Quote>>,
}

impl RateTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from entries.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a RateEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.add_rate(entry.date, &entry.base, &entry.quote, entry.rate);
        }
        table
    }

    /// Add a rate, keeping quotes sorted by date.
    pub fn add_rate(&mut self, date: NaiveDate, base: &str, quote: &str, rate: Decimal) {
        let quotes = self.quotes.entry(base.to_string()).or_default();
        let at = quotes.partition_point(|q| q.date <= date);
        quotes.insert(
            at,
            Quote {
                date,
                rate,
                currency: quote.to_string(),
            },
        );
    }

    /// All entries, sorted by base currency then date.
    pub fn entries(&self) -> Vec<RateEntry> {
        let mut bases: Vec<_> = self.quotes.keys().collect();
        bases.sort();
        bases
            .into_iter()
            .flat_map(|base| {
                self.quotes[base].iter().map(move |q| RateEntry {
                    date: q.date,
                    base: base.clone(),
                    quote: q.currency.clone(),
                    rate: q.rate,
                })
            })
            .collect()
    }

    /// Rate of `base` in `quote` on or before `date`.
    pub fn lookup(&self, date: NaiveDate, base: &str, quote: &str) -> Option<Decimal> {
        if base == quote {
            return Some(Decimal::ONE);
        }

        if let Some(rate) = self.direct(base, quote, date) {
            return Some(rate);
        }

        if let Some(rate) = self.direct(quote, base, date) {
            if !rate.is_zero() {
                return Some(Decimal::ONE / rate);
            }
        }

        self.chained(base, quote, date)
    }

    fn direct(&self, base: &str, quote: &str, date: NaiveDate) -> Option<Decimal> {
        self.quotes.get(base).and_then(|quotes| {
            quotes
                .iter()
                .rev()
                .find(|q| q.date <= date && q.currency == quote)
                .map(|q| q.rate)
        })
    }

    /// For A→C, try A→B then B→C for every intermediate B (either leg may be inverted).
    fn chained(&self, base: &str, quote: &str, date: NaiveDate) -> Option<Decimal> {
        let mut intermediates: Vec<(String, Decimal)> = Vec::new();

        if let Some(quotes) = self.quotes.get(base) {
            for q in quotes.iter().filter(|q| q.date <= date) {
                if q.currency != quote {
                    if let Some(first) = self.direct(base, &q.currency, date) {
                        intermediates.push((q.currency.clone(), first));
                    }
                }
            }
        }
        for (currency, quotes) in &self.quotes {
            if let Some(q) = quotes
                .iter()
                .rev()
                .find(|q| q.date <= date && q.currency == base && !q.rate.is_zero())
            {
                intermediates.push((currency.clone(), Decimal::ONE / q.rate));
            }
        }

        for (intermediate, first) in intermediates {
            if let Some(second) = self.direct(&intermediate, quote, date) {
                return Some(first * second);
            }
            if let Some(second) = self.direct(quote, &intermediate, date) {
                if !second.is_zero() {
                    return Some(first / second);
                }
            }
        }

        None
    }

    /// Number of stored rates.
    pub fn len(&self) -> usize {
        self.quotes.values().map(Vec::len).sum()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[async_trait]
impl RateProvider for RateTable {
    fn cached_rate(&self, date: NaiveDate, from: &str, to: &str) -> Option<Decimal> {
        self.lookup(date, from, to)
    }

    async fn get_rate(&self, date: NaiveDate, from: &str, to: &str) -> Result<Decimal, RateError> {
        self.lookup(date, from, to)
            .ok_or_else(|| RateError::unavailable(from, to, date))
    }
}

type RateKey = (NaiveDate, String, String);

/// Memoizes the rates returned by another provider.
///
/// Rates already fetched are served from [`RateProvider::cached_rate`];
/// failures are not cached, so a later call retries the inner provider.
#[derive(Debug)]
pub struct CachingRateProvider<P> {
    inner: P,
    cache: Mutex<HashMap<RateKey, Decimal>>,
}

impl<P> CachingRateProvider<P> {
    /// Wrap `inner`.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of memoized rates.
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }

    /// The wrapped provider.
    pub const fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: RateProvider> RateProvider for CachingRateProvider<P> {
    fn cached_rate(&self, date: NaiveDate, from: &str, to: &str) -> Option<Decimal> {
        let key = (date, from.to_string(), to.to_string());
        if let Some(rate) = self.cache.lock().get(&key) {
            return Some(*rate);
        }
        let rate = self.inner.cached_rate(date, from, to)?;
        self.cache.lock().insert(key, rate);
        Some(rate)
    }

    async fn get_rate(&self, date: NaiveDate, from: &str, to: &str) -> Result<Decimal, RateError> {
        if let Some(rate) = self.cached_rate(date, from, to) {
            return Ok(rate);
        }
        let rate = self.inner.get_rate(date, from, to).await?;
        tracing::trace!(%date, from, to, %rate, "caching fetched rate");
        self.cache
            .lock()
            .insert((date, from.to_string(), to.to_string()), rate);
        Ok(rate)
    }
}
