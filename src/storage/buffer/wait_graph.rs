// Wait-for graph used for deadlock detection.
//
// An edge runs from a waiting transaction to every transaction holding
// the lock it wants in a conflicting mode. Edges are checked for cycles
// at the moment they are inserted: the transaction whose edge would close
// a cycle is the victim, and its edge is never recorded.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::common::types::{PageId, TransactionId};
use crate::storage::buffer::lock::LockMode;

#[derive(Default)]
struct Inner {
    waiting: HashMap<TransactionId, (PageId, LockMode)>,
    holders: HashMap<PageId, HashSet<(TransactionId, LockMode)>>,
}

impl Inner {
    fn cycle_from(&self, start: TransactionId, cur: TransactionId) -> bool {
        let Some(&(pid, wanted)) = self.waiting.get(&cur) else {
            return false;
        };
        let Some(holders) = self.holders.get(&pid) else {
            return false;
        };
        for &(holder, held) in holders {
            if !wanted.conflicts(held) {
                continue;
            }
            if holder == cur {
                continue;
            }
            if holder == start || self.cycle_from(start, holder) {
                return true;
            }
        }
        false
    }
}

/// The graph. Every mutation and the cycle check run under one mutex, so
/// check-then-insert is a single critical section.
#[derive(Default)]
pub struct WaitForGraph {
    inner: Mutex<Inner>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        WaitForGraph::default()
    }

    /// Record that `tid` is about to block on `pid` in `mode`. Returns
    /// true when the edge would close a cycle; the edge is then dropped
    /// and the caller must abort instead of blocking.
    pub fn begin_wait(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> bool {
        let mut graph = self.inner.lock();
        graph.waiting.insert(tid, (pid, mode));
        if graph.cycle_from(tid, tid) {
            graph.waiting.remove(&tid);
            true
        } else {
            false
        }
    }

    /// `tid` got the lock: drop its wait edge, record the hold.
    pub fn grant(&self, tid: TransactionId, pid: PageId, mode: LockMode) {
        let mut graph = self.inner.lock();
        graph.waiting.remove(&tid);
        graph.holders.entry(pid).or_default().insert((tid, mode));
    }

    /// `tid` released the lock it held in `mode`.
    pub fn release(&self, tid: TransactionId, pid: PageId, mode: LockMode) {
        let mut graph = self.inner.lock();
        if let Some(holders) = graph.holders.get_mut(&pid) {
            holders.remove(&(tid, mode));
            if holders.is_empty() {
                graph.holders.remove(&pid);
            }
        }
    }
}
