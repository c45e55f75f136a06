//! Time spans, bucketing intervals and trailing periods.
//!
//! A [`TimeSpan`] is an inclusive range of calendar days. It can be walked
//! day by day with [`TimeSpan::all_dates`] or partitioned into interval
//! buckets with [`TimeSpan::intervals`]; `None` as the interval means one
//! bucket for the whole span.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;

use crate::error::StatsError;

/// Bucketing granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    /// One bucket per calendar day.
    Day,
    /// One bucket per ISO week (Monday to Sunday).
    Week,
    /// One bucket per calendar month.
    Month,
    /// One bucket per calendar year.
    Year,
}

impl Interval {
    /// First day of the interval containing `date`.
    #[must_use]
    pub fn start_of(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Day => date,
            Self::Week => date
                .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
                .unwrap_or(date),
            Self::Month => date.with_day(1).unwrap_or(date),
            Self::Year => date.with_ordinal(1).unwrap_or(date),
        }
    }

    /// First day of the interval following the one containing `date`.
    ///
    /// Returns `None` past the end of the supported calendar.
    #[must_use]
    pub fn next_start(self, date: NaiveDate) -> Option<NaiveDate> {
        let start = self.start_of(date);
        match self {
            Self::Day => start.checked_add_days(Days::new(1)),
            Self::Week => start.checked_add_days(Days::new(7)),
            Self::Month => start.checked_add_months(Months::new(1)),
            Self::Year => start.checked_add_months(Months::new(12)),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        })
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Self::Day),
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            "year" | "yearly" => Ok(Self::Year),
            other => Err(format!("unknown interval: {other}")),
        }
    }
}

/// Inclusive bounds of one bucket, clamped to the span it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntervalBounds {
    /// First day of the bucket.
    pub start: NaiveDate,
    /// Last day of the bucket.
    pub end: NaiveDate,
}

/// A trailing duration such as "the last 3 months".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// A number of days.
    Days(u32),
    /// A number of weeks.
    Weeks(u32),
    /// A number of calendar months.
    Months(u32),
    /// A number of calendar years.
    Years(u32),
}

impl Period {
    /// The day `self` before `date`, clamped to the end of shorter months.
    #[must_use]
    pub fn before(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Days(n) => date.checked_sub_days(Days::new(u64::from(n))),
            Self::Weeks(n) => date.checked_sub_days(Days::new(u64::from(n) * 7)),
            Self::Months(n) => date.checked_sub_months(Months::new(n)),
            Self::Years(n) => date.checked_sub_months(Months::new(n.saturating_mul(12))),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(n) => write!(f, "{n}d"),
            Self::Weeks(n) => write!(f, "{n}w"),
            Self::Months(n) => write!(f, "{n}m"),
            Self::Years(n) => write!(f, "{n}y"),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    /// Parse `"30d"`, `"2w"`, `"3m"` or `"1y"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in period: {s}"))?;
        let (count, unit) = s.split_at(split);
        let count: u32 = count
            .parse()
            .map_err(|_| format!("invalid count in period: {s}"))?;
        match unit {
            "d" => Ok(Self::Days(count)),
            "w" => Ok(Self::Weeks(count)),
            "m" => Ok(Self::Months(count)),
            "y" => Ok(Self::Years(count)),
            other => Err(format!("unknown period unit: {other}")),
        }
    }
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeSpan {
    start: NaiveDate,
    end: NaiveDate,
    total_days: i64,
}

impl TimeSpan {
    /// Create a span covering `start..=end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, StatsError> {
        if start > end {
            return Err(StatsError::InvalidSpan { start, end });
        }
        Ok(Self {
            start,
            end,
            total_days: (end - start).num_days() + 1,
        })
    }

    /// A single day.
    #[must_use]
    pub const fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
            total_days: 1,
        }
    }

    /// The trailing window `today - period ..= today`.
    ///
    /// `total_days` is the exact length of `period` (e.g. 91 for three months
    /// ending in early December), not the number of calendar days covered.
    pub fn last_period(today: NaiveDate, period: Period) -> Result<Self, StatsError> {
        let start = period
            .before(today)
            .ok_or_else(|| StatsError::PeriodOutOfRange {
                period: period.to_string(),
                today,
            })?;
        Ok(Self {
            start,
            end: today,
            total_days: (today - start).num_days(),
        })
    }

    /// The calendar month containing `date`.
    #[must_use]
    pub fn month_of(date: NaiveDate) -> Self {
        let start = Interval::Month.start_of(date);
        let end = Interval::Month
            .next_start(date)
            .and_then(|d| d.pred_opt())
            .unwrap_or(date);
        Self {
            start,
            end,
            total_days: (end - start).num_days() + 1,
        }
    }

    /// First day.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day.
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Length of the span in days.
    #[must_use]
    pub const fn total_days(&self) -> i64 {
        self.total_days
    }

    /// Days of the span up to and including `today`. Zero if the span starts after today.
    #[must_use]
    pub fn elapsed_days(&self, today: NaiveDate) -> i64 {
        let end = self.end.min(today);
        if end < self.start {
            0
        } else {
            (end - self.start).num_days() + 1
        }
    }

    /// Every day of the span in ascending order, optionally preceded by the day before `start`.
    #[must_use]
    pub fn all_dates(&self, include_day_before: bool) -> Dates {
        let first = if include_day_before {
            self.start.pred_opt()
        } else {
            Some(self.start)
        };
        Dates {
            next: first,
            end: self.end,
        }
    }

    /// Bucket bounds for `interval`, each clamped to the span.
    ///
    /// `None` yields one bucket covering the whole span.
    #[must_use]
    pub fn intervals(&self, interval: Option<Interval>) -> Vec<IntervalBounds> {
        let Some(interval) = interval else {
            return vec![IntervalBounds {
                start: self.start,
                end: self.end,
            }];
        };

        let mut bounds = Vec::new();
        let mut start = self.start;
        loop {
            let next = interval.next_start(start);
            let end = next
                .and_then(|d| d.pred_opt())
                .map_or(self.end, |d| d.min(self.end));
            bounds.push(IntervalBounds { start, end });
            match next {
                Some(next) if next <= self.end => start = next,
                _ => break,
            }
        }
        bounds
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Lazy ascending sequence of days. See [`TimeSpan::all_dates`].
#[derive(Debug, Clone)]
pub struct Dates {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for Dates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|d| *d <= self.end)?;
        self.next = current.succ_opt();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self
            .next
            .filter(|d| *d <= self.end)
            .map_or(0, |d| (self.end - d).num_days() as usize + 1);
        (len, Some(len))
    }
}

impl ExactSizeIterator for Dates {}

impl FusedIterator for Dates {}
