//! Category records.
//!
//! A category is keyed by its unique name. Because the name is the storage
//! key, a rename is never an in-place mutation: a new record is created and
//! the old one is tombstoned (see `finstat_query::rename_category`).

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A spending or income category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique name, also the storage key.
    pub name: String,
    /// Home currency in which the goal is expressed.
    pub currency: String,
    /// Optional annual goal amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Decimal>,
    /// Hidden from listings.
    #[serde(default)]
    pub hidden: bool,
    /// Tombstone flag.
    #[serde(default)]
    pub deleted: bool,
    /// Time of the last change to this record.
    #[serde(default)]
    pub last_modified: DateTime<Utc>,
}

impl Category {
    /// Create a new live category.
    #[must_use]
    pub fn new(name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            currency: currency.into(),
            goal: None,
            hidden: false,
            deleted: false,
            last_modified: DateTime::<Utc>::default(),
        }
    }

    /// Set the annual goal.
    #[must_use]
    pub const fn with_goal(mut self, goal: Decimal) -> Self {
        self.goal = Some(goal);
        self
    }

    /// Mark the category as hidden.
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Check if the record is live (not tombstoned).
    #[must_use]
    pub const fn is_live(&self) -> bool {
        !self.deleted
    }

    /// A copy of this record under a new name, live, stamped with `now`.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            deleted: false,
            last_modified: now,
            ..self.clone()
        }
    }

    /// A tombstone of this record, stamped with `now`.
    #[must_use]
    pub fn tombstone(&self, now: DateTime<Utc>) -> Self {
        Self {
            deleted: true,
            last_modified: now,
            ..self.clone()
        }
    }

    /// Goal prorated to `days` of the year containing `today`.
    ///
    /// Returns `None` if no goal is configured.
    #[must_use]
    pub fn goal_for_days(&self, days: u32, today: NaiveDate) -> Option<Decimal> {
        self.goal
            .map(|goal| goal * Decimal::from(days) / Decimal::from(days_in_year(today.year())))
    }
}

/// Number of days in `year` (365 or 366).
#[must_use]
pub fn days_in_year(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 31).map_or(365, |d| d.ordinal())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_days_in_year() {
        assert_eq!(days_in_year(2023), 365);
        assert_eq!(days_in_year(2024), 366);
    }

    #[test]
    fn test_goal_for_days() {
        let cat = Category::new("Food", "USD").with_goal(dec!(3650));
        let today = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        assert_eq!(cat.goal_for_days(10, today), Some(dec!(100)));
        assert_eq!(Category::new("Fun", "USD").goal_for_days(10, today), None);
    }

    #[test]
    fn test_renamed_and_tombstone() {
        let now = DateTime::<Utc>::default();
        let food = Category::new("Food", "EUR").with_goal(dec!(1200)).hidden();
        let groceries = food.renamed("Groceries", now);
        assert_eq!(groceries.name, "Groceries");
        assert_eq!(groceries.goal, Some(dec!(1200)));
        assert!(groceries.hidden);
        assert!(groceries.is_live());

        let dead = food.tombstone(now);
        assert_eq!(dead.name, "Food");
        assert!(!dead.is_live());
    }
}
