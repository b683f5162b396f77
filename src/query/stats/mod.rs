// Statistics used for selectivity and cardinality estimation.

pub mod fenwick;
pub mod int_histogram;
pub mod string_histogram;
pub mod table_stats;

pub use fenwick::Fenwick;
pub use int_histogram::IntHistogram;
pub use string_histogram::StrHistogram;
pub use table_stats::TableStats;
