// Grouped aggregation.
//
// An aggregator folds a tuple stream into an in-memory group table keyed
// by the group-by field (`None` when ungrouped). The `Aggregate` operator
// feeds a child into an aggregator and serves the result tuples.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::common::error::{DbError, DbResult};
use crate::query::executor::{OpIterator, TupleIterator};
use crate::storage::tuple::{Field, FieldType, Tuple, TupleDesc};

/// Aggregation operators over a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Sum => "sum",
            AggOp::Avg => "avg",
            AggOp::Count => "count",
        };
        write!(f, "{}", s)
    }
}

/// Folds tuples into per-group aggregates and serves the result rows.
pub trait Aggregator {
    fn merge(&mut self, tuple: &Tuple) -> DbResult<()>;

    /// Result rows `(group, agg)` (or `(agg)` when ungrouped), in
    /// unspecified group order.
    fn iterator(&self) -> TupleIterator;
}

fn result_desc(group_type: Option<FieldType>) -> Arc<TupleDesc> {
    match group_type {
        Some(gt) => Arc::new(TupleDesc::with_types(vec![gt, FieldType::Int])),
        None => Arc::new(TupleDesc::with_types(vec![FieldType::Int])),
    }
}

/// MIN/MAX/SUM/AVG/COUNT over an integer column.
pub struct IntAggregator {
    group_by: Option<(usize, FieldType)>,
    afield: usize,
    op: AggOp,
    counts: HashMap<Option<Field>, i64>,
    accums: HashMap<Option<Field>, i64>,
}

impl IntAggregator {
    pub fn new(group_by: Option<(usize, FieldType)>, afield: usize, op: AggOp) -> Self {
        IntAggregator {
            group_by,
            afield,
            op,
            counts: HashMap::new(),
            accums: HashMap::new(),
        }
    }

    fn group_key(&self, tuple: &Tuple) -> Option<Field> {
        self.group_by.map(|(i, _)| tuple.field(i).clone())
    }
}

impl Aggregator for IntAggregator {
    fn merge(&mut self, tuple: &Tuple) -> DbResult<()> {
        let key = self.group_key(tuple);
        *self.counts.entry(key.clone()).or_insert(0) += 1;

        let value = match tuple.field(self.afield) {
            Field::Int(v) => i64::from(*v),
            other => {
                return Err(DbError::InvalidOperation(format!(
                    "integer aggregate over a {} field",
                    other.field_type()
                )))
            }
        };
        match self.op {
            AggOp::Min => {
                let cur = self.accums.entry(key).or_insert(i64::from(i32::MAX));
                *cur = (*cur).min(value);
            }
            AggOp::Max => {
                let cur = self.accums.entry(key).or_insert(i64::from(i32::MIN));
                *cur = (*cur).max(value);
            }
            AggOp::Sum | AggOp::Avg => {
                *self.accums.entry(key).or_insert(0) += value;
            }
            AggOp::Count => {}
        }
        Ok(())
    }

    fn iterator(&self) -> TupleIterator {
        let desc = result_desc(self.group_by.map(|(_, gt)| gt));
        let tuples = self
            .counts
            .iter()
            .map(|(key, &count)| {
                let agg = match self.op {
                    AggOp::Min | AggOp::Max | AggOp::Sum => self.accums[key],
                    AggOp::Avg => self.accums[key] / count,
                    AggOp::Count => count,
                };
                let agg = Field::Int(agg as i32);
                let fields = match key {
                    Some(group) => vec![group.clone(), agg],
                    None => vec![agg],
                };
                Tuple::new(desc.clone(), fields)
            })
            .collect();
        TupleIterator::new(desc, tuples)
    }
}

/// COUNT over a string column; other operators are rejected.
pub struct StrAggregator {
    group_by: Option<(usize, FieldType)>,
    counts: HashMap<Option<Field>, i64>,
}

impl StrAggregator {
    pub fn new(group_by: Option<(usize, FieldType)>, op: AggOp) -> DbResult<Self> {
        if op != AggOp::Count {
            return Err(DbError::InvalidOperation(format!(
                "string aggregator supports count, not {}",
                op
            )));
        }
        Ok(StrAggregator {
            group_by,
            counts: HashMap::new(),
        })
    }
}

impl Aggregator for StrAggregator {
    fn merge(&mut self, tuple: &Tuple) -> DbResult<()> {
        let key = self.group_by.map(|(i, _)| tuple.field(i).clone());
        *self.counts.entry(key).or_insert(0) += 1;
        Ok(())
    }

    fn iterator(&self) -> TupleIterator {
        let desc = result_desc(self.group_by.map(|(_, gt)| gt));
        let tuples = self
            .counts
            .iter()
            .map(|(key, &count)| {
                let agg = Field::Int(count as i32);
                let fields = match key {
                    Some(group) => vec![group.clone(), agg],
                    None => vec![agg],
                };
                Tuple::new(desc.clone(), fields)
            })
            .collect();
        TupleIterator::new(desc, tuples)
    }
}

/// Aggregation operator: exhausts its child into the right aggregator on
/// `open`, then iterates the group table.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    afield: usize,
    group_by: Option<usize>,
    op: AggOp,
    results: Option<TupleIterator>,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn OpIterator>,
        afield: usize,
        group_by: Option<usize>,
        op: AggOp,
    ) -> DbResult<Self> {
        let desc = child.tuple_desc();
        if desc.field_type(afield) == FieldType::Str && op != AggOp::Count {
            return Err(DbError::InvalidOperation(format!(
                "string aggregator supports count, not {}",
                op
            )));
        }
        Ok(Aggregate {
            child,
            afield,
            group_by,
            op,
            results: None,
        })
    }

    fn make_aggregator(&self) -> DbResult<Box<dyn Aggregator>> {
        let desc = self.child.tuple_desc();
        let group_by = self.group_by.map(|i| (i, desc.field_type(i)));
        match desc.field_type(self.afield) {
            FieldType::Int => Ok(Box::new(IntAggregator::new(group_by, self.afield, self.op))),
            FieldType::Str => Ok(Box::new(StrAggregator::new(group_by, self.op)?)),
        }
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> DbResult<()> {
        let mut agg = self.make_aggregator()?;
        self.child.open()?;
        while let Some(tuple) = self.child.next()? {
            agg.merge(&tuple)?;
        }
        let mut results = agg.iterator();
        results.open()?;
        self.results = Some(results);
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        match self.results.as_mut() {
            Some(results) => results.next(),
            None => Ok(None),
        }
    }

    fn rewind(&mut self) -> DbResult<()> {
        match self.results.as_mut() {
            Some(results) => results.rewind(),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        self.child.close();
        self.results = None;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        let child_desc = self.child.tuple_desc();
        result_desc(self.group_by.map(|i| child_desc.field_type(i)))
    }
}
