// Execution operators: leaf scans, table mutation, and aggregation.

pub mod aggregate;
pub mod delete;
pub mod insert;
pub mod scan;

pub use aggregate::{AggOp, Aggregate, Aggregator, IntAggregator, StrAggregator};
pub use delete::Delete;
pub use insert::Insert;
pub use scan::SeqScan;
