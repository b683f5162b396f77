// Export public modules
pub mod catalog;
pub mod common;
pub mod query;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use catalog::Catalog;
pub use common::error::{DbError, DbResult};
pub use storage::buffer::BufferPool;
pub use storage::heap::HeapFile;
pub use transaction::Transaction;
