//! Operation types representing recorded financial events.
//!
//! An [`Operation`] is one entry of the operation log. Its payload is an
//! [`OperationBody`], a closed set of variants:
//!
//! - [`OperationBody::Income`] - Money received, optionally split across categories
//! - [`OperationBody::Expense`] - Money spent, optionally split across categories
//! - [`OperationBody::Transfer`] - Money moved between two accounts
//! - [`OperationBody::Adjustment`] - A correction of an account balance
//! - [`OperationBody::Deleted`] - A tombstone left behind by a deletion
//!
//! # Sign convention
//!
//! Amounts of incomes, expenses, transfers and splits are stored as
//! non-negative magnitudes. The direction is carried by the variant, and
//! [`Operation::signed_amount`] applies it in one place. Adjustments store a
//! signed balance delta.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `{ category, amount }` pair within an income or expense.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Split {
    /// Name of the category this part of the operation belongs to.
    pub category: String,
    /// Amount attributed to the category, in the operation's currency.
    pub amount: Decimal,
}

impl Split {
    /// Create a new split.
    #[must_use]
    pub fn new(category: impl Into<String>, amount: Decimal) -> Self {
        Self {
            category: category.into(),
            amount,
        }
    }
}

/// Payload shared by incomes and expenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    /// Account the money was received on or paid from.
    pub account: String,
    /// Currency code of `amount` and of every split.
    pub currency: String,
    /// Total amount of the operation.
    pub amount: Decimal,
    /// Category splits. Empty means uncategorized.
    #[serde(default)]
    pub categories: Vec<Split>,
}

/// Payload of a transfer between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Source account.
    pub account: String,
    /// Currency of the source amount.
    pub currency: String,
    /// Amount leaving the source account.
    pub amount: Decimal,
    /// Destination account.
    pub to_account: String,
    /// Currency of the destination amount.
    pub to_currency: String,
    /// Amount arriving on the destination account.
    pub to_amount: Decimal,
}

/// Payload of a balance adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Adjusted account.
    pub account: String,
    /// Currency of the delta.
    pub currency: String,
    /// Signed balance delta.
    pub amount: Decimal,
}

/// The variant-specific part of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationBody {
    /// Money received.
    Income(Flow),
    /// Money spent.
    Expense(Flow),
    /// Money moved between accounts.
    Transfer(Transfer),
    /// Balance correction.
    Adjustment(Adjustment),
    /// Tombstone of a deleted operation.
    Deleted,
}

/// Kind of an operation, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// See [`OperationBody::Income`].
    Income,
    /// See [`OperationBody::Expense`].
    Expense,
    /// See [`OperationBody::Transfer`].
    Transfer,
    /// See [`OperationBody::Adjustment`].
    Adjustment,
    /// See [`OperationBody::Deleted`].
    Deleted,
}

impl OperationKind {
    /// Name used in files and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown operation kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation type: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for OperationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            "adjustment" => Ok(Self::Adjustment),
            "deleted" => Ok(Self::Deleted),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// One recorded financial event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique identifier.
    pub id: String,
    /// Calendar day of the operation.
    pub date: NaiveDate,
    /// Time of the last change to this record.
    #[serde(default)]
    pub last_modified: DateTime<Utc>,
    /// Variant-specific payload.
    #[serde(flatten)]
    pub body: OperationBody,
}

impl Operation {
    /// Create an operation from its parts.
    #[must_use]
    pub fn new(id: impl Into<String>, date: NaiveDate, body: OperationBody) -> Self {
        Self {
            id: id.into(),
            date,
            last_modified: DateTime::<Utc>::default(),
            body,
        }
    }

    /// Create an uncategorized income.
    #[must_use]
    pub fn income(
        id: impl Into<String>,
        date: NaiveDate,
        account: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            date,
            OperationBody::Income(Flow {
                account: account.into(),
                currency: currency.into(),
                amount,
                categories: Vec::new(),
            }),
        )
    }

    /// Create an uncategorized expense.
    #[must_use]
    pub fn expense(
        id: impl Into<String>,
        date: NaiveDate,
        account: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            date,
            OperationBody::Expense(Flow {
                account: account.into(),
                currency: currency.into(),
                amount,
                categories: Vec::new(),
            }),
        )
    }

    /// Create a same-currency transfer.
    #[must_use]
    pub fn transfer(
        id: impl Into<String>,
        date: NaiveDate,
        from: impl Into<String>,
        to: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let currency = currency.into();
        Self::new(
            id,
            date,
            OperationBody::Transfer(Transfer {
                account: from.into(),
                currency: currency.clone(),
                amount,
                to_account: to.into(),
                to_currency: currency,
                to_amount: amount,
            }),
        )
    }

    /// Create a balance adjustment.
    #[must_use]
    pub fn adjustment(
        id: impl Into<String>,
        date: NaiveDate,
        account: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            date,
            OperationBody::Adjustment(Adjustment {
                account: account.into(),
                currency: currency.into(),
                amount,
            }),
        )
    }

    /// Create a tombstone for `id`.
    #[must_use]
    pub fn deleted(id: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(id, date, OperationBody::Deleted)
    }

    /// Add a category split. Has no effect on transfers, adjustments and tombstones.
    #[must_use]
    pub fn with_split(mut self, category: impl Into<String>, amount: Decimal) -> Self {
        if let Some(flow) = self.flow_mut() {
            flow.categories.push(Split::new(category, amount));
        }
        self
    }

    /// Set the last-modified timestamp.
    #[must_use]
    pub const fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Get the kind of this operation.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match &self.body {
            OperationBody::Income(_) => OperationKind::Income,
            OperationBody::Expense(_) => OperationKind::Expense,
            OperationBody::Transfer(_) => OperationKind::Transfer,
            OperationBody::Adjustment(_) => OperationKind::Adjustment,
            OperationBody::Deleted => OperationKind::Deleted,
        }
    }

    /// Check if this is a tombstone.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(self.body, OperationBody::Deleted)
    }

    /// Get the income/expense payload, if this is one.
    #[must_use]
    pub const fn flow(&self) -> Option<&Flow> {
        match &self.body {
            OperationBody::Income(flow) | OperationBody::Expense(flow) => Some(flow),
            _ => None,
        }
    }

    /// Get the income/expense payload mutably, if this is one.
    pub fn flow_mut(&mut self) -> Option<&mut Flow> {
        match &mut self.body {
            OperationBody::Income(flow) | OperationBody::Expense(flow) => Some(flow),
            _ => None,
        }
    }

    /// Originating account. `None` for tombstones.
    #[must_use]
    pub fn account(&self) -> Option<&str> {
        match &self.body {
            OperationBody::Income(flow) | OperationBody::Expense(flow) => Some(&flow.account),
            OperationBody::Transfer(t) => Some(&t.account),
            OperationBody::Adjustment(a) => Some(&a.account),
            OperationBody::Deleted => None,
        }
    }

    /// Check whether the operation touches `account`, including a transfer's destination.
    #[must_use]
    pub fn touches_account(&self, account: &str) -> bool {
        match &self.body {
            OperationBody::Transfer(t) => t.account == account || t.to_account == account,
            _ => self.account() == Some(account),
        }
    }

    /// Currency of [`Operation::amount`]. `None` for tombstones.
    #[must_use]
    pub fn currency(&self) -> Option<&str> {
        match &self.body {
            OperationBody::Income(flow) | OperationBody::Expense(flow) => Some(&flow.currency),
            OperationBody::Transfer(t) => Some(&t.currency),
            OperationBody::Adjustment(a) => Some(&a.currency),
            OperationBody::Deleted => None,
        }
    }

    /// Stored amount (a magnitude, except for adjustments). Zero for tombstones.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        match &self.body {
            OperationBody::Income(flow) | OperationBody::Expense(flow) => flow.amount,
            OperationBody::Transfer(t) => t.amount,
            OperationBody::Adjustment(a) => a.amount,
            OperationBody::Deleted => Decimal::ZERO,
        }
    }

    /// Amount with the direction of the variant applied.
    ///
    /// Income is positive, expense negative, a transfer is negative from the
    /// point of view of its source account, and adjustments keep their sign.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match &self.body {
            OperationBody::Income(flow) => flow.amount,
            OperationBody::Expense(flow) => -flow.amount,
            OperationBody::Transfer(t) => -t.amount,
            OperationBody::Adjustment(a) => a.amount,
            OperationBody::Deleted => Decimal::ZERO,
        }
    }

    /// Category splits. Empty for everything but incomes and expenses.
    #[must_use]
    pub fn splits(&self) -> &[Split] {
        match self.flow() {
            Some(flow) => &flow.categories,
            None => &[],
        }
    }

    /// Check whether any split references `category`.
    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        self.splits().iter().any(|s| s.category == category)
    }

    /// Sum of the split amounts attributed to `category`.
    #[must_use]
    pub fn category_amount(&self, category: &str) -> Decimal {
        self.splits()
            .iter()
            .filter(|s| s.category == category)
            .map(|s| s.amount)
            .sum()
    }

    /// Rename every split of `from` to `to`, keeping amounts.
    ///
    /// Returns the number of rewritten splits.
    pub fn rename_category(&mut self, from: &str, to: &str) -> usize {
        let Some(flow) = self.flow_mut() else {
            return 0;
        };
        let mut renamed = 0;
        for split in flow.categories.iter_mut().filter(|s| s.category == from) {
            split.category = to.to_string();
            renamed += 1;
        }
        renamed
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.date, self.kind(), self.id)?;
        match &self.body {
            OperationBody::Income(flow) | OperationBody::Expense(flow) => {
                write!(f, " {} {} {}", flow.account, flow.amount, flow.currency)?;
                for split in &flow.categories {
                    write!(f, " [{} {}]", split.category, split.amount)?;
                }
            }
            OperationBody::Transfer(t) => write!(
                f,
                " {} {} {} -> {} {} {}",
                t.account, t.amount, t.currency, t.to_account, t.to_amount, t.to_currency
            )?,
            OperationBody::Adjustment(a) => {
                write!(f, " {} {} {}", a.account, a.amount, a.currency)?;
            }
            OperationBody::Deleted => {}
        }
        Ok(())
    }
}

/// Sort operations by date.
///
/// This is a stable sort that preserves insertion order for operations
/// on the same date.
pub fn sort_operations(operations: &mut [Operation]) {
    operations.sort_by_key(|op| op.date);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_expense_with_splits() {
        let op = Operation::expense("e1", date(2024, 3, 1), "Cash", dec!(30), "USD")
            .with_split("Food", dec!(20))
            .with_split("Fun", dec!(10));

        assert_eq!(op.kind(), OperationKind::Expense);
        assert_eq!(op.splits().len(), 2);
        assert!(op.has_category("Food"));
        assert!(!op.has_category("Rent"));
        assert_eq!(op.category_amount("Fun"), dec!(10));
        assert_eq!(op.signed_amount(), dec!(-30));
    }

    #[test]
    fn test_split_ignored_for_transfer() {
        let op = Operation::transfer("t1", date(2024, 3, 1), "Cash", "Bank", dec!(5), "USD")
            .with_split("Food", dec!(5));
        assert!(op.splits().is_empty());
        assert!(op.touches_account("Bank"));
        assert!(op.touches_account("Cash"));
        assert_eq!(op.signed_amount(), dec!(-5));
    }

    #[test]
    fn test_tombstone_has_no_payload() {
        let op = Operation::deleted("x", date(2024, 1, 1));
        assert!(op.is_deleted());
        assert_eq!(op.account(), None);
        assert_eq!(op.currency(), None);
        assert_eq!(op.amount(), Decimal::ZERO);
    }

    #[test]
    fn test_rename_category_keeps_amounts() {
        let mut op = Operation::income("i1", date(2024, 1, 1), "Bank", dec!(100), "EUR")
            .with_split("Salary", dec!(90))
            .with_split("Bonus", dec!(10));

        assert_eq!(op.rename_category("Salary", "Wages"), 1);
        assert_eq!(op.category_amount("Wages"), dec!(90));
        assert_eq!(op.category_amount("Salary"), Decimal::ZERO);
    }

    #[test]
    fn test_sort_operations_is_stable() {
        let mut ops = vec![
            Operation::expense("b", date(2024, 1, 2), "Cash", dec!(1), "USD"),
            Operation::expense("a1", date(2024, 1, 1), "Cash", dec!(1), "USD"),
            Operation::expense("a2", date(2024, 1, 1), "Cash", dec!(1), "USD"),
        ];
        sort_operations(&mut ops);
        let ids: Vec<_> = ops.iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, ["a1", "a2", "b"]);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Expense".parse::<OperationKind>(), Ok(OperationKind::Expense));
        assert!("refund".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_serde_tagged_layout() {
        let json = r#"{
            "id": "e1",
            "date": "2024-05-01",
            "type": "expense",
            "account": "Cash",
            "currency": "USD",
            "amount": "12.50",
            "categories": [{"category": "Food", "amount": "12.50"}]
        }"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert_eq!(op.kind(), OperationKind::Expense);
        assert_eq!(op.category_amount("Food"), dec!(12.50));

        let tombstone: Operation =
            serde_json::from_str(r#"{"id": "x", "date": "2024-05-01", "type": "deleted"}"#)
                .unwrap();
        assert!(tombstone.is_deleted());
    }
}
