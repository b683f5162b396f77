// Per-page reader/writer lock with transaction-aware upgrade.
//
// Invariants: at most one exclusive holder; no shared holder while the
// exclusive holder exists; an upgrade never gives up its shared grant
// before the exclusive grant lands. An in-progress upgrade blocks new
// shared admissions so the upgrader cannot be starved by late readers.

use std::collections::HashMap;

use log::warn;
use parking_lot::{Condvar, Mutex};

use crate::common::error::{DbError, DbResult};
use crate::common::types::{PageId, TransactionId};
use crate::storage::buffer::wait_graph::WaitForGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    /// Two grants conflict when either side is exclusive.
    pub fn conflicts(self, other: LockMode) -> bool {
        self == LockMode::Exclusive || other == LockMode::Exclusive
    }
}

#[derive(Default)]
struct LockState {
    holders: HashMap<TransactionId, LockMode>,
    upgrading: Option<TransactionId>,
}

impl LockState {
    fn exclusive_held(&self) -> bool {
        self.holders.values().any(|&m| m == LockMode::Exclusive)
    }
}

/// The lock guarding one page. Created on first request and kept for the
/// process lifetime.
pub struct PageLock {
    pid: PageId,
    state: Mutex<LockState>,
    cond: Condvar,
}

impl PageLock {
    pub fn new(pid: PageId) -> Self {
        PageLock {
            pid,
            state: Mutex::new(LockState::default()),
            cond: Condvar::new(),
        }
    }

    pub fn acquire(
        &self,
        tid: TransactionId,
        mode: LockMode,
        graph: &WaitForGraph,
    ) -> DbResult<()> {
        match mode {
            LockMode::Shared => self.acquire_shared(tid, graph),
            LockMode::Exclusive => self.acquire_exclusive(tid, graph),
        }
    }

    /// Take the lock in shared mode. A no-op when `tid` already holds the
    /// lock in either mode.
    pub fn acquire_shared(&self, tid: TransactionId, graph: &WaitForGraph) -> DbResult<()> {
        let mut state = self.state.lock();
        if state.holders.contains_key(&tid) {
            return Ok(());
        }
        loop {
            if !state.exclusive_held() && state.upgrading.is_none() {
                state.holders.insert(tid, LockMode::Shared);
                graph.grant(tid, self.pid, LockMode::Shared);
                return Ok(());
            }
            if graph.begin_wait(tid, self.pid, LockMode::Shared) {
                warn!("{} aborted: shared wait on {} closes a cycle", tid, self.pid);
                return Err(DbError::TransactionAborted(tid));
            }
            self.cond.wait(&mut state);
        }
    }

    /// Take the lock in exclusive mode, upgrading in place when `tid`
    /// already holds it shared.
    pub fn acquire_exclusive(&self, tid: TransactionId, graph: &WaitForGraph) -> DbResult<()> {
        let mut state = self.state.lock();
        match state.holders.get(&tid).copied() {
            Some(LockMode::Exclusive) => Ok(()),
            Some(LockMode::Shared) => loop {
                if state.holders.len() == 1 {
                    state.holders.insert(tid, LockMode::Exclusive);
                    if state.upgrading == Some(tid) {
                        state.upgrading = None;
                    }
                    graph.release(tid, self.pid, LockMode::Shared);
                    graph.grant(tid, self.pid, LockMode::Exclusive);
                    return Ok(());
                }
                if graph.begin_wait(tid, self.pid, LockMode::Exclusive) {
                    // back out so blocked readers can be admitted again
                    if state.upgrading == Some(tid) {
                        state.upgrading = None;
                        self.cond.notify_all();
                    }
                    warn!("{} aborted: upgrade wait on {} closes a cycle", tid, self.pid);
                    return Err(DbError::TransactionAborted(tid));
                }
                if state.upgrading.is_none() {
                    state.upgrading = Some(tid);
                }
                self.cond.wait(&mut state);
            },
            None => loop {
                if state.holders.is_empty() {
                    state.holders.insert(tid, LockMode::Exclusive);
                    graph.grant(tid, self.pid, LockMode::Exclusive);
                    return Ok(());
                }
                if graph.begin_wait(tid, self.pid, LockMode::Exclusive) {
                    warn!("{} aborted: exclusive wait on {} closes a cycle", tid, self.pid);
                    return Err(DbError::TransactionAborted(tid));
                }
                self.cond.wait(&mut state);
            },
        }
    }

    /// Drop an exclusive grant back to shared. Used to undo an upgrade
    /// whose caller failed after the grant (e.g. the page could not be
    /// loaded).
    pub fn downgrade(&self, tid: TransactionId, graph: &WaitForGraph) {
        let mut state = self.state.lock();
        if state.holders.get(&tid) == Some(&LockMode::Exclusive) {
            state.holders.insert(tid, LockMode::Shared);
            graph.release(tid, self.pid, LockMode::Exclusive);
            graph.grant(tid, self.pid, LockMode::Shared);
            self.cond.notify_all();
        }
    }

    /// Release whatever grant `tid` holds and wake waiters.
    pub fn release(&self, tid: TransactionId, graph: &WaitForGraph) {
        let mut state = self.state.lock();
        if let Some(mode) = state.holders.remove(&tid) {
            graph.release(tid, self.pid, mode);
            self.cond.notify_all();
        }
    }

    pub fn holds(&self, tid: TransactionId) -> Option<LockMode> {
        self.state.lock().holders.get(&tid).copied()
    }
}
