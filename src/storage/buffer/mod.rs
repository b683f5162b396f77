pub mod lock;
pub mod pool;
pub mod wait_graph;

pub use lock::{LockMode, PageLock};
pub use pool::BufferPool;
pub use wait_graph::WaitForGraph;
