// Comparison operators over fields, shared by predicates and the
// selectivity estimator.

use std::fmt;

use crate::storage::tuple::{Field, Tuple};

/// The six comparators the engine estimates and evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Equals,
    GreaterThan,
    LessThan,
    LessThanOrEq,
    GreaterThanOrEq,
    NotEquals,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Equals => "=",
            Op::GreaterThan => ">",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::GreaterThanOrEq => ">=",
            Op::NotEquals => "<>",
        };
        write!(f, "{}", s)
    }
}

impl Field {
    /// Typed comparison. Fields of different types never compare true.
    pub fn compare(&self, op: Op, other: &Field) -> bool {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => compare_ord(a, op, b),
            (Field::Str(a), Field::Str(b)) => compare_ord(a, op, b),
            _ => false,
        }
    }
}

fn compare_ord<T: Ord>(a: &T, op: Op, b: &T) -> bool {
    match op {
        Op::Equals => a == b,
        Op::GreaterThan => a > b,
        Op::LessThan => a < b,
        Op::LessThanOrEq => a <= b,
        Op::GreaterThanOrEq => a >= b,
        Op::NotEquals => a != b,
    }
}

/// `column op constant`, evaluated against one tuple at a time
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: Op,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: Op, operand: Field) -> Self {
        Predicate { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        tuple.field(self.field).compare(self.op, &self.operand)
    }
}
