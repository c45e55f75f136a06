//! Predicate compiler.
//!
//! Lowers a [`Predicate`] tree into a [`CompiledPredicate`]: validation
//! happens once, account lists become hash sets, and single-operand
//! combinators collapse. The result is a pure test over one operation.

use finstat_core::{Operation, OperationKind};
use std::collections::HashSet;

use crate::ast::Predicate;
use crate::error::CompileError;

/// A validated, reusable operation filter.
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    root: Node,
}

#[derive(Debug, Clone)]
enum Node {
    Any,
    Category(String),
    Accounts(HashSet<String>),
    Kind(OperationKind),
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
}

/// Compile a predicate expression.
///
/// # Errors
///
/// Returns [`CompileError`] for an empty category name, an empty account
/// list or name, an `and`/`or` without operands, or a type leaf selecting
/// tombstones.
pub fn compile(predicate: &Predicate) -> Result<CompiledPredicate, CompileError> {
    Ok(CompiledPredicate {
        root: lower(predicate)?,
    })
}

fn lower(predicate: &Predicate) -> Result<Node, CompileError> {
    match predicate {
        Predicate::Any => Ok(Node::Any),
        Predicate::Category { name } => {
            if name.is_empty() {
                return Err(CompileError::EmptyCategory);
            }
            Ok(Node::Category(name.clone()))
        }
        Predicate::Account { names } => {
            if names.is_empty() || names.iter().any(String::is_empty) {
                return Err(CompileError::EmptyAccounts);
            }
            Ok(Node::Accounts(names.iter().cloned().collect()))
        }
        Predicate::Type { operation } => match operation {
            OperationKind::Deleted => Err(CompileError::InvalidType(operation.to_string())),
            kind => Ok(Node::Kind(*kind)),
        },
        Predicate::And { operands } => {
            let mut nodes = lower_all(operands, "and")?;
            nodes.retain(|n| !matches!(n, Node::Any));
            Ok(match nodes.len() {
                0 => Node::Any,
                1 => nodes.remove(0),
                _ => Node::And(nodes),
            })
        }
        Predicate::Or { operands } => {
            let mut nodes = lower_all(operands, "or")?;
            if nodes.iter().any(|n| matches!(n, Node::Any)) {
                return Ok(Node::Any);
            }
            Ok(if nodes.len() == 1 {
                nodes.remove(0)
            } else {
                Node::Or(nodes)
            })
        }
        Predicate::Not { operand } => Ok(Node::Not(Box::new(lower(operand)?))),
    }
}

fn lower_all(operands: &[Predicate], op: &'static str) -> Result<Vec<Node>, CompileError> {
    if operands.is_empty() {
        return Err(CompileError::NoOperands(op));
    }
    operands.iter().map(lower).collect()
}

impl Node {
    fn test(&self, op: &Operation) -> bool {
        match self {
            Self::Any => true,
            Self::Category(name) => op.has_category(name),
            Self::Accounts(names) => names.iter().any(|name| op.touches_account(name)),
            Self::Kind(kind) => op.kind() == *kind,
            Self::And(nodes) => nodes.iter().all(|n| n.test(op)),
            Self::Or(nodes) => nodes.iter().any(|n| n.test(op)),
            Self::Not(node) => !node.test(op),
        }
    }
}

impl CompiledPredicate {
    /// A predicate matching every live operation.
    #[must_use]
    pub const fn always() -> Self {
        Self { root: Node::Any }
    }

    /// Test one operation. Tombstones never match.
    #[must_use]
    pub fn matches(&self, op: &Operation) -> bool {
        !op.is_deleted() && self.root.test(op)
    }

    /// Check if this predicate matches every live operation.
    #[must_use]
    pub const fn is_always(&self) -> bool {
        matches!(self.root, Node::Any)
    }
}

impl Default for CompiledPredicate {
    fn default() -> Self {
        Self::always()
    }
}
