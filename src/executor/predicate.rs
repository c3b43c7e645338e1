//! Tuple comparison predicates.

use crate::access::tuple::{Field, Tuple};
use crate::error::DbResult;
use std::cmp::Ordering;

/// Comparison operators a predicate can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
}

impl CmpOp {
    fn matches(&self, ord: Ordering) -> bool {
        match self {
            CmpOp::Equals => ord == Ordering::Equal,
            CmpOp::NotEquals => ord != Ordering::Equal,
            CmpOp::GreaterThan => ord == Ordering::Greater,
            CmpOp::GreaterThanOrEq => ord != Ordering::Less,
            CmpOp::LessThan => ord == Ordering::Less,
            CmpOp::LessThanOrEq => ord != Ordering::Greater,
        }
    }
}

/// Compares one field of a tuple against a constant.
#[derive(Debug, Clone)]
pub struct Predicate {
    field_index: usize,
    op: CmpOp,
    operand: Field,
}

impl Predicate {
    pub fn new(field_index: usize, op: CmpOp, operand: Field) -> Self {
        Self {
            field_index,
            op,
            operand,
        }
    }

    /// True when the tuple passes. Out-of-range field indexes and
    /// cross-type comparisons are caller errors.
    pub fn eval(&self, tuple: &Tuple) -> DbResult<bool> {
        let field = tuple.field(self.field_index)?;
        let ord = field.compare(&self.operand)?;
        Ok(self.op.matches(ord))
    }
}
