// Join ordering.
//
// Cardinalities come from per-table statistics; join costs follow a
// nested-loops model. `order_joins` runs a Selinger-style dynamic program
// over subsets of the join list, keyed by bitmask, keeping the cheapest
// way to produce each subset.

use std::collections::{HashMap, HashSet};

use crate::common::error::{DbError, DbResult};
use crate::query::predicate::Op;
use crate::query::stats::TableStats;

/// An equi- or range-join between two base tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalJoinNode {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
    pub op: Op,
}

impl LogicalJoinNode {
    pub fn new(left_table: &str, left_column: &str, right_table: &str, right_column: &str, op: Op) -> Self {
        LogicalJoinNode {
            left_table: left_table.to_string(),
            left_column: left_column.to_string(),
            right_table: right_table.to_string(),
            right_column: right_column.to_string(),
            op,
        }
    }
}

struct SubPlan {
    cost: f64,
    card: usize,
    order: Vec<LogicalJoinNode>,
    tables: HashSet<String>,
}

pub struct JoinPlanner {
    stats: HashMap<String, TableStats>,
    /// Selectivity of the filters already applied to each base table
    filter_selectivities: HashMap<String, f64>,
}

impl JoinPlanner {
    pub fn new(stats: HashMap<String, TableStats>, filter_selectivities: HashMap<String, f64>) -> Self {
        JoinPlanner {
            stats,
            filter_selectivities,
        }
    }

    fn table_stats(&self, table: &str) -> DbResult<&TableStats> {
        self.stats
            .get(table)
            .ok_or_else(|| DbError::InvalidOperation(format!("no statistics for table {}", table)))
    }

    fn base_cost(&self, table: &str) -> DbResult<f64> {
        Ok(self.table_stats(table)?.estimate_scan_cost())
    }

    fn base_cardinality(&self, table: &str) -> DbResult<usize> {
        let selectivity = self.filter_selectivities.get(table).copied().unwrap_or(1.0);
        Ok(self
            .table_stats(table)?
            .estimate_table_cardinality(selectivity)
            .max(1))
    }

    /// Nested-loops cost: scan the outer once, the inner once per outer
    /// tuple, then pay per produced pair.
    pub fn estimate_join_cost(&self, card1: usize, card2: usize, cost1: f64, cost2: f64) -> f64 {
        cost1 + card1 as f64 * cost2 + (card1 as f64) * (card2 as f64)
    }

    /// Equi-joins keep the larger input's cardinality; range joins are
    /// assumed to keep 30% of the cross product.
    pub fn estimate_join_cardinality(&self, join: &LogicalJoinNode, card1: usize, card2: usize) -> usize {
        let card = match join.op {
            Op::Equals => card1.max(card2),
            _ => (0.3 * card1 as f64 * card2 as f64) as usize,
        };
        card.max(1)
    }

    /// Pick an execution order for `joins` by dynamic programming over
    /// subsets: for every subset, the best plan is the cheapest way of
    /// peeling off one join whose tables connect to the rest.
    pub fn order_joins(&self, joins: Vec<LogicalJoinNode>) -> DbResult<Vec<LogicalJoinNode>> {
        let n = joins.len();
        if n == 0 {
            return Ok(joins);
        }
        if n >= 64 {
            return Err(DbError::InvalidOperation(format!(
                "cannot order {} joins",
                n
            )));
        }

        let mut cache: HashMap<u64, SubPlan> = HashMap::new();

        for (j, node) in joins.iter().enumerate() {
            let cost1 = self.base_cost(&node.left_table)?;
            let card1 = self.base_cardinality(&node.left_table)?;
            let cost2 = self.base_cost(&node.right_table)?;
            let card2 = self.base_cardinality(&node.right_table)?;
            cache.insert(
                1 << j,
                SubPlan {
                    cost: self.estimate_join_cost(card1, card2, cost1, cost2),
                    card: self.estimate_join_cardinality(node, card1, card2),
                    order: vec![node.clone()],
                    tables: [node.left_table.clone(), node.right_table.clone()]
                        .into_iter()
                        .collect(),
                },
            );
        }

        for size in 2..=n {
            for mask in 1u64..(1 << n) {
                if mask.count_ones() as usize != size {
                    continue;
                }
                let mut best: Option<SubPlan> = None;
                for (j, node) in joins.iter().enumerate() {
                    if mask & (1 << j) == 0 {
                        continue;
                    }
                    let rest = mask & !(1 << j);
                    let Some(sub) = cache.get(&rest) else { continue };

                    // the peeled join must share a table with the rest
                    let joined = if sub.tables.contains(&node.left_table) {
                        &node.right_table
                    } else if sub.tables.contains(&node.right_table) {
                        &node.left_table
                    } else {
                        continue;
                    };

                    let cost2 = self.base_cost(joined)?;
                    let card2 = self.base_cardinality(joined)?;
                    let cost = self.estimate_join_cost(sub.card, card2, sub.cost, cost2);
                    if best.as_ref().map_or(true, |b| cost < b.cost) {
                        let mut order = sub.order.clone();
                        order.push(node.clone());
                        let mut tables = sub.tables.clone();
                        tables.insert(node.left_table.clone());
                        tables.insert(node.right_table.clone());
                        best = Some(SubPlan {
                            cost,
                            card: self.estimate_join_cardinality(node, sub.card, card2),
                            order,
                            tables,
                        });
                    }
                }
                if let Some(best) = best {
                    cache.insert(mask, best);
                }
            }
        }

        cache
            .remove(&((1 << n) - 1))
            .map(|plan| plan.order)
            .ok_or_else(|| DbError::InvalidOperation("join graph is disconnected".to_string()))
    }
}
