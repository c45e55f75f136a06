//! Predicate expression tree.
//!
//! A [`Predicate`] is an immutable, declarative filter over operations. Leaves
//! test one property of an operation; `and`, `or` and `not` combine them.
//! Trees are compiled once with [`crate::compile`] and the compiled form is
//! reused across every operation of a query.
//!
//! Predicates round-trip through JSON with a `kind` tag:
//!
//! ```
//! use finstat_query::Predicate;
//!
//! let p = Predicate::from_json(
//!     r#"{"kind": "and", "operands": [
//!         {"kind": "category", "name": "Food"},
//!         {"kind": "account", "names": ["Cash"]}
//!     ]}"#,
//! )
//! .unwrap();
//! assert_eq!(p, Predicate::category("Food").and(Predicate::account("Cash")));
//! ```

use finstat_core::OperationKind;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CompileError;

/// A filter expression over operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every live operation.
    Any,
    /// Matches incomes and expenses with a split for `name`.
    Category {
        /// Category name.
        name: String,
    },
    /// Matches operations touching any of `names`.
    Account {
        /// Account names.
        names: Vec<String>,
    },
    /// Matches operations of one kind.
    Type {
        /// The operation kind.
        operation: OperationKind,
    },
    /// Matches when every operand matches.
    And {
        /// Operands, evaluated left to right.
        operands: Vec<Predicate>,
    },
    /// Matches when at least one operand matches.
    Or {
        /// Operands, evaluated left to right.
        operands: Vec<Predicate>,
    },
    /// Matches when the operand does not.
    Not {
        /// The negated expression.
        operand: Box<Predicate>,
    },
}

impl Default for Predicate {
    fn default() -> Self {
        Self::Any
    }
}

impl Predicate {
    /// Match everything.
    #[must_use]
    pub const fn any() -> Self {
        Self::Any
    }

    /// Match a category.
    #[must_use]
    pub fn category(name: impl Into<String>) -> Self {
        Self::Category { name: name.into() }
    }

    /// Match one account.
    #[must_use]
    pub fn account(name: impl Into<String>) -> Self {
        Self::Account {
            names: vec![name.into()],
        }
    }

    /// Match any of several accounts.
    #[must_use]
    pub fn accounts<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Account {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Match one operation kind.
    #[must_use]
    pub const fn kind(operation: OperationKind) -> Self {
        Self::Type { operation }
    }

    /// Match any of several operation kinds.
    #[must_use]
    pub fn kinds(kinds: impl IntoIterator<Item = OperationKind>) -> Self {
        Self::Or {
            operands: kinds.into_iter().map(Self::kind).collect(),
        }
    }

    /// Conjunction with `other`. `Any` operands are absorbed and nested `and`s flattened.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Any, p) | (p, Self::Any) => p,
            (Self::And { mut operands }, Self::And { operands: rhs }) => {
                operands.extend(rhs);
                Self::And { operands }
            }
            (Self::And { mut operands }, p) => {
                operands.push(p);
                Self::And { operands }
            }
            (p, Self::And { operands: rhs }) => {
                let mut operands = vec![p];
                operands.extend(rhs);
                Self::And { operands }
            }
            (a, b) => Self::And {
                operands: vec![a, b],
            },
        }
    }

    /// Disjunction with `other`. Nested `or`s are flattened.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Or { mut operands }, Self::Or { operands: rhs }) => {
                operands.extend(rhs);
                Self::Or { operands }
            }
            (Self::Or { mut operands }, p) => {
                operands.push(p);
                Self::Or { operands }
            }
            (a, b) => Self::Or {
                operands: vec![a, b],
            },
        }
    }

    /// Negation.
    #[must_use]
    pub fn not(self) -> Self {
        Self::Not {
            operand: Box::new(self),
        }
    }

    /// Parse a JSON expression.
    ///
    /// Unknown `kind` tags, unknown operation types and missing fields are
    /// reported as [`CompileError::Malformed`].
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        serde_json::from_str(json).map_err(|e| CompileError::Malformed(e.to_string()))
    }

    /// Serialize to JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        // Serializing a tree of strings and enums cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Category { name } => write!(f, "category = {name:?}"),
            Self::Account { names } => write!(f, "account in {names:?}"),
            Self::Type { operation } => write!(f, "type = {operation}"),
            Self::And { operands } => write_joined(f, operands, " and "),
            Self::Or { operands } => write_joined(f, operands, " or "),
            Self::Not { operand } => write!(f, "not {operand}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{operand}")?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_absorbs_any_and_flattens() {
        let p = Predicate::any()
            .and(Predicate::category("Food"))
            .and(Predicate::account("Cash"))
            .and(Predicate::kind(OperationKind::Expense));

        match p {
            Predicate::And { operands } => assert_eq!(operands.len(), 3),
            other => panic!("expected and, got {other:?}"),
        }
    }

    #[test]
    fn test_or_flattens() {
        let p = Predicate::category("A")
            .or(Predicate::category("B"))
            .or(Predicate::category("C"));
        assert_eq!(p.to_string(), r#"(category = "A" or category = "B" or category = "C")"#);
    }

    #[test]
    fn test_json_round_trip() {
        let p = Predicate::kinds([OperationKind::Income, OperationKind::Expense])
            .and(Predicate::category("Food").not());
        let back = Predicate::from_json(&p.to_json()).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let err = Predicate::from_json(r#"{"kind": "payee", "name": "Shop"}"#).unwrap_err();
        assert!(matches!(err, CompileError::Malformed(_)));

        let err = Predicate::from_json(r#"{"kind": "type", "operation": "refund"}"#).unwrap_err();
        assert!(matches!(err, CompileError::Malformed(_)));
    }
}
