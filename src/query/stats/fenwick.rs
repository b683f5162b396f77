// Fenwick (binary indexed) tree over bucket counts: point increments and
// O(log n) prefix/range sums.

/// Counts are 1-indexed internally; the public API is 0-indexed.
pub struct Fenwick {
    data: Vec<i64>,
}

impl Fenwick {
    pub fn new(size: usize) -> Self {
        Fenwick {
            data: vec![0; size + 1],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add one to position `i`.
    pub fn increment(&mut self, i: usize) {
        let mut i = i + 1;
        while i < self.data.len() {
            self.data[i] += 1;
            i += i & i.wrapping_neg();
        }
    }

    /// Sum of the first `i` positions.
    fn prefix(&self, i: usize) -> i64 {
        let mut i = i.min(self.len());
        let mut sum = 0;
        while i > 0 {
            sum += self.data[i];
            i -= i & i.wrapping_neg();
        }
        sum
    }

    /// Inclusive sum over `[lo, hi]`; empty ranges sum to zero.
    pub fn range(&self, lo: usize, hi: usize) -> i64 {
        if lo > hi {
            return 0;
        }
        self.prefix(hi + 1) - self.prefix(lo)
    }

    /// Sum over every position.
    pub fn total(&self) -> i64 {
        self.prefix(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn empty_tree_sums_to_zero() {
        let fenwick = Fenwick::new(16);
        assert_eq!(fenwick.total(), 0);
        assert_eq!(fenwick.range(0, 15), 0);
        assert_eq!(fenwick.range(5, 3), 0);
    }

    #[test]
    fn single_increment_lands_in_its_ranges() {
        let mut fenwick = Fenwick::new(10);
        fenwick.increment(4);
        assert_eq!(fenwick.range(0, 3), 0);
        assert_eq!(fenwick.range(4, 4), 1);
        assert_eq!(fenwick.range(0, 9), 1);
        assert_eq!(fenwick.range(5, 9), 0);
    }

    #[test]
    fn matches_naive_counts_over_random_stream() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let size = 64;
        let mut fenwick = Fenwick::new(size);
        let mut naive = vec![0i64; size];

        for _ in 0..10_000 {
            let i = rng.gen_range(0..size);
            fenwick.increment(i);
            naive[i] += 1;

            let a = rng.gen_range(0..size);
            let b = rng.gen_range(0..size);
            let (lo, hi) = (a.min(b), a.max(b));
            let want: i64 = naive[lo..=hi].iter().sum();
            assert_eq!(fenwick.range(lo, hi), want);
        }
        assert_eq!(fenwick.total(), 10_000);
    }
}
