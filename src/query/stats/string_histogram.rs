// Histogram over a string column, backed by an integer histogram.
//
// Strings map to integer keys by packing the first four UTF-8 bytes
// big-endian and shifting right one bit into the non-negative i32 range.
// The mapping is total and monotonic with respect to byte order, so range
// predicates over strings order the same way as their keys; strings that
// share a four-byte prefix collapse into one key, which only coarsens
// the estimate.

use crate::query::predicate::Op;
use crate::query::stats::int_histogram::IntHistogram;

pub struct StrHistogram {
    hist: IntHistogram,
}

impl StrHistogram {
    pub fn new(buckets: usize) -> Self {
        StrHistogram {
            hist: IntHistogram::new(buckets, 0, i32::MAX),
        }
    }

    fn key(s: &str) -> i32 {
        let bytes = s.as_bytes();
        let mut packed: u32 = 0;
        for i in 0..4 {
            packed = (packed << 8) | u32::from(bytes.get(i).copied().unwrap_or(0));
        }
        (packed >> 1) as i32
    }

    pub fn add_value(&mut self, s: &str) {
        self.hist.add_value(Self::key(s));
    }

    pub fn estimate_selectivity(&self, op: Op, s: &str) -> f64 {
        self.hist.estimate_selectivity(op, Self::key(s))
    }

    /// The backing histogram, for integer predicates against a string
    /// column.
    pub fn int_histogram(&self) -> &IntHistogram {
        &self.hist
    }
}
