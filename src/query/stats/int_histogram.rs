// Fixed-width histogram over one integer column.
//
// `[min, max]` is split into `buckets` integer ranges whose widths differ
// by at most one. Bucket starts come from a closed form; a sorted index
// gives floor-lookup from value to bucket; counts live in a Fenwick tree
// so prefix and suffix sums are O(log buckets).

use std::collections::BTreeMap;

use crate::query::predicate::Op;
use crate::query::stats::fenwick::Fenwick;

/// Integer division rounding toward negative infinity.
fn floor_div(lhs: i64, rhs: i64) -> i64 {
    lhs.div_euclid(rhs)
}

pub struct IntHistogram {
    buckets: usize,
    /// First value of each bucket
    starts: Vec<i64>,
    /// Width of each bucket
    widths: Vec<i64>,
    /// Floor lookup: bucket start -> bucket index
    index: BTreeMap<i64, usize>,
    counts: Fenwick,
}

impl IntHistogram {
    /// Histogram over `[min, max]` with `buckets >= 1` buckets.
    pub fn new(buckets: usize, min: i32, max: i32) -> Self {
        assert!(buckets >= 1, "histogram needs at least one bucket");
        assert!(min <= max, "empty value domain");

        let b = buckets as i64;
        let lo = i64::from(min);
        let hi = i64::from(max) + 1;

        let mut starts = Vec::with_capacity(buckets);
        let mut widths = Vec::with_capacity(buckets);
        let mut index = BTreeMap::new();
        for i in 0..b {
            let start = floor_div(lo * (b - i) + hi * i, b);
            let next = floor_div(lo * (b - i - 1) + hi * (i + 1), b);
            index.insert(start, i as usize);
            starts.push(start);
            widths.push(next - start);
        }

        IntHistogram {
            buckets,
            starts,
            widths,
            index,
            counts: Fenwick::new(buckets),
        }
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    /// `(start, width)` of bucket `i`. Zero-width buckets occur when
    /// there are more buckets than distinct values.
    pub fn bucket_bounds(&self, i: usize) -> (i64, i64) {
        (self.starts[i], self.widths[i])
    }

    fn bucket_of(&self, v: i64) -> usize {
        self.index
            .range(..=v)
            .next_back()
            .map(|(_, &i)| i)
            .unwrap_or(0)
    }

    /// Count one occurrence of `v`, which must lie within `[min, max]`.
    pub fn add_value(&mut self, v: i32) {
        let bucket = self.bucket_of(i64::from(v));
        self.counts.increment(bucket);
    }

    /// Estimated fraction of recorded values satisfying `value op v`.
    pub fn estimate_selectivity(&self, op: Op, v: i32) -> f64 {
        let v = i64::from(v);
        let last = self.buckets - 1;

        if v < self.starts[0] {
            return match op {
                Op::GreaterThan | Op::GreaterThanOrEq | Op::NotEquals => 1.0,
                _ => 0.0,
            };
        }
        if v >= self.starts[last] + self.widths[last] {
            return match op {
                Op::LessThan | Op::LessThanOrEq | Op::NotEquals => 1.0,
                _ => 0.0,
            };
        }

        let total = self.counts.total() as f64;
        if total == 0.0 {
            return 0.0;
        }

        let i = self.bucket_of(v);
        let (start, width) = (self.starts[i], self.widths[i]);
        let w = width as f64;
        let c = self.counts.range(i, i) as f64;
        let below = if i > 0 { self.counts.range(0, i - 1) as f64 } else { 0.0 };
        let above = self.counts.range(i + 1, last) as f64;

        let estimate = match op {
            Op::Equals => c / w,
            Op::NotEquals => total - c / w,
            Op::LessThan => below + c * (v - start) as f64 / w,
            Op::LessThanOrEq => below + c * (v - start + 1) as f64 / w,
            Op::GreaterThan => above + c * (start + width - v - 1) as f64 / w,
            Op::GreaterThanOrEq => above + c * (start + width - v) as f64 / w,
        };
        estimate / total
    }
}
