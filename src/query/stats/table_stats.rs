// Per-table statistics: one histogram per column plus the scan-cost and
// cardinality figures the join planner consumes.
//
// Building takes two scans under a throwaway transaction: the first finds
// per-column min/max so histogram domains are tight, the second fills the
// histograms.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::catalog::Catalog;
use crate::common::error::DbResult;
use crate::common::types::{TableId, NUM_HIST_BINS};
use crate::query::predicate::Op;
use crate::query::stats::int_histogram::IntHistogram;
use crate::query::stats::string_histogram::StrHistogram;
use crate::storage::buffer::BufferPool;
use crate::storage::tuple::{Field, FieldType};
use crate::transaction::Transaction;

enum ColumnHistogram {
    Int(IntHistogram),
    Str(StrHistogram),
}

pub struct TableStats {
    total_tuples: usize,
    num_pages: usize,
    io_cost_per_page: usize,
    histograms: Vec<ColumnHistogram>,
    mins: Vec<i32>,
    maxs: Vec<i32>,
    columns: HashMap<String, usize>,
}

impl TableStats {
    /// Scan the table and build statistics for every column.
    pub fn build(
        table_id: TableId,
        io_cost_per_page: usize,
        catalog: &Arc<Catalog>,
        pool: &Arc<BufferPool>,
    ) -> DbResult<TableStats> {
        let file = catalog.table(table_id)?;
        let desc = file.tuple_desc().clone();
        let num_fields = desc.num_fields();

        let mut mins = vec![i32::MAX; num_fields];
        let mut maxs = vec![i32::MIN; num_fields];
        let mut total_tuples = 0;

        let txn = Transaction::new();
        let mut iter = file.iter(txn.id(), pool.clone());
        iter.open()?;
        while let Some(tuple) = iter.next()? {
            for i in 0..num_fields {
                if let Field::Int(v) = tuple.field(i) {
                    mins[i] = mins[i].min(*v);
                    maxs[i] = maxs[i].max(*v);
                }
            }
            total_tuples += 1;
        }

        let mut columns = HashMap::new();
        let mut histograms = Vec::with_capacity(num_fields);
        for (i, item) in desc.items().enumerate() {
            if let Some(name) = &item.name {
                columns.insert(name.clone(), i);
            }
            histograms.push(match item.field_type {
                FieldType::Int => {
                    // empty column: collapse the domain to a single point
                    let (lo, hi) = if mins[i] <= maxs[i] {
                        (mins[i], maxs[i])
                    } else {
                        (0, 0)
                    };
                    let span = i64::from(hi) - i64::from(lo) + 1;
                    let bins = (NUM_HIST_BINS as i64).min(span).max(1) as usize;
                    ColumnHistogram::Int(IntHistogram::new(bins, lo, hi))
                }
                FieldType::Str => ColumnHistogram::Str(StrHistogram::new(NUM_HIST_BINS)),
            });
        }

        iter.rewind()?;
        while let Some(tuple) = iter.next()? {
            for (i, hist) in histograms.iter_mut().enumerate() {
                match (hist, tuple.field(i)) {
                    (ColumnHistogram::Int(h), Field::Int(v)) => h.add_value(*v),
                    (ColumnHistogram::Str(h), Field::Str(s)) => h.add_value(s),
                    _ => {}
                }
            }
        }
        iter.close();
        txn.commit(pool)?;

        let num_pages = file.num_pages()?;
        debug!(
            "stats for table {:x}: {} tuples over {} pages",
            table_id, total_tuples, num_pages
        );

        Ok(TableStats {
            total_tuples,
            num_pages,
            io_cost_per_page,
            histograms,
            mins,
            maxs,
            columns,
        })
    }

    /// Cost of one full sequential scan; partially filled trailing pages
    /// cost as much as full ones.
    pub fn estimate_scan_cost(&self) -> f64 {
        (self.num_pages * self.io_cost_per_page) as f64
    }

    /// Expected tuple count after applying a predicate with the given
    /// selectivity.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.total_tuples as f64 * selectivity) as usize
    }

    /// Selectivity of `column op constant` from the column's histogram.
    /// Integer operands against a string column compare against the
    /// string keys directly.
    pub fn estimate_selectivity(&self, column: usize, op: Op, constant: &Field) -> f64 {
        match (&self.histograms[column], constant) {
            (ColumnHistogram::Int(h), Field::Int(v)) => h.estimate_selectivity(op, *v),
            (ColumnHistogram::Str(h), Field::Str(s)) => h.estimate_selectivity(op, s),
            (ColumnHistogram::Str(h), Field::Int(v)) => {
                h.int_histogram().estimate_selectivity(op, *v)
            }
            (ColumnHistogram::Int(_), Field::Str(_)) => 0.0,
        }
    }

    pub fn total_tuples(&self) -> usize {
        self.total_tuples
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    pub fn min(&self, column: usize) -> i32 {
        self.mins[column]
    }

    pub fn max(&self, column: usize) -> i32 {
        self.maxs[column]
    }
}
