// Transaction facade: hands out monotonic ids and routes completion to
// the buffer pool, which owns all per-transaction state.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::error::DbResult;
use crate::common::types::TransactionId;
use crate::storage::buffer::BufferPool;

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

pub struct Transaction {
    id: TransactionId,
}

impl Transaction {
    pub fn new() -> Self {
        let raw = NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst);
        Transaction {
            id: TransactionId::new(raw),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Flush this transaction's pages and release its locks.
    pub fn commit(&self, pool: &BufferPool) -> DbResult<()> {
        pool.transaction_complete(self.id, true)
    }

    /// Discard this transaction's cached pages and release its locks.
    /// The victim of a deadlock abort calls this itself.
    pub fn abort(&self, pool: &BufferPool) -> DbResult<()> {
        pool.transaction_complete(self.id, false)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Transaction::new()
    }
}
