// Buffer pool: a bounded page cache that also owns page locking.
//
// Policy is NO STEAL / FORCE. Pages dirtied by an uncommitted transaction
// never reach disk; commit flushes exactly the committer's pages; abort
// discards its cached pages so the on-disk versions win on the next read.
// Locks follow strict two-phase locking and are only released by
// `transaction_complete`.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::catalog::Catalog;
use crate::common::error::{DbError, DbResult};
use crate::common::types::{PageId, Permissions, TableId, TransactionId, DEFAULT_PAGES};
use crate::storage::buffer::lock::{LockMode, PageLock};
use crate::storage::buffer::wait_graph::WaitForGraph;
use crate::storage::page::{PageError, PagePtr};
use crate::storage::tuple::Tuple;

pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    pages: Mutex<HashMap<PageId, PagePtr>>,
    locks: Mutex<HashMap<PageId, Arc<PageLock>>>,
    held: Mutex<HashMap<(TransactionId, PageId), LockMode>>,
    graph: WaitForGraph,
}

impl BufferPool {
    /// A pool with the default capacity of `DEFAULT_PAGES` pages.
    pub fn with_default_capacity(catalog: Arc<Catalog>) -> Self {
        BufferPool::new(DEFAULT_PAGES, catalog)
    }

    /// A pool caching at most `capacity` pages.
    pub fn new(capacity: usize, catalog: Arc<Catalog>) -> Self {
        BufferPool {
            capacity,
            catalog,
            pages: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            held: Mutex::new(HashMap::new()),
            graph: WaitForGraph::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn lock_for(&self, pid: PageId) -> Arc<PageLock> {
        self.locks
            .lock()
            .entry(pid)
            .or_insert_with(|| Arc::new(PageLock::new(pid)))
            .clone()
    }

    /// Fetch a page on behalf of `tid`, taking (or upgrading to) the lock
    /// mode the permissions require. Blocks while a conflicting holder
    /// exists; fails with `TransactionAborted` when waiting would close a
    /// deadlock cycle.
    pub fn get_page(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> DbResult<PagePtr> {
        let wanted = match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        };
        let lock = self.lock_for(pid);
        let prior = self.held.lock().get(&(tid, pid)).copied();

        let acquired = match (prior, wanted) {
            (None, mode) => {
                lock.acquire(tid, mode, &self.graph)?;
                self.held.lock().insert((tid, pid), mode);
                true
            }
            (Some(LockMode::Shared), LockMode::Exclusive) => {
                lock.acquire_exclusive(tid, &self.graph)?;
                self.held.lock().insert((tid, pid), LockMode::Exclusive);
                true
            }
            _ => false,
        };

        match self.load(pid) {
            Ok(ptr) => Ok(ptr),
            Err(e) => {
                // this call must not leak a grant it created
                if acquired {
                    match prior {
                        None => {
                            lock.release(tid, &self.graph);
                            self.held.lock().remove(&(tid, pid));
                        }
                        Some(LockMode::Shared) => {
                            lock.downgrade(tid, &self.graph);
                            self.held.lock().insert((tid, pid), LockMode::Shared);
                        }
                        Some(LockMode::Exclusive) => {}
                    }
                }
                Err(e)
            }
        }
    }

    /// Return the cached page, loading (and evicting if necessary) on a
    /// miss. The caller already holds the page lock.
    fn load(&self, pid: PageId) -> DbResult<PagePtr> {
        let mut pages = self.pages.lock();
        if let Some(ptr) = pages.get(&pid) {
            return Ok(ptr.clone());
        }
        if pages.len() >= self.capacity {
            self.evict(&mut pages)?;
        }
        let file = self.catalog.table(pid.table_id)?;
        let page = file.read_page(pid)?;
        let ptr: PagePtr = Arc::new(parking_lot::RwLock::new(page));
        pages.insert(pid, ptr.clone());
        Ok(ptr)
    }

    /// NO STEAL eviction: drop the first clean page the sweep finds.
    /// Dirty pages belong to uncommitted transactions and must stay.
    fn evict(&self, pages: &mut HashMap<PageId, PagePtr>) -> DbResult<()> {
        let victim = pages
            .iter()
            .find(|(_, ptr)| ptr.read().dirtied_by().is_none())
            .map(|(pid, _)| *pid);
        match victim {
            Some(pid) => {
                debug!("evicting clean page {}", pid);
                pages.remove(&pid);
                Ok(())
            }
            None => {
                warn!("cache full: all {} cached pages are dirty", pages.len());
                Err(DbError::CacheFull)
            }
        }
    }

    /// Insert a tuple into `table_id`, dirtying every touched page.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> DbResult<()> {
        let file = self.catalog.table(table_id)?;
        let touched = file.insert_tuple(tid, self, tuple)?;
        self.install_dirty(tid, touched)
    }

    /// Delete the tuple named by its record id, dirtying the page.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> DbResult<()> {
        let rid = tuple.record_id().ok_or(PageError::TupleNotFound)?;
        let file = self.catalog.table(rid.page_id.table_id)?;
        let touched = file.delete_tuple(tid, self, tuple)?;
        self.install_dirty(tid, touched)
    }

    /// Mark the pages dirty and (re)install them in the cache. A page can
    /// slip out between its load and the dirty mark (it was still clean
    /// and thus evictable), so the dirtied version is put back under the
    /// cache mutex.
    fn install_dirty(&self, tid: TransactionId, touched: Vec<PagePtr>) -> DbResult<()> {
        let mut pages = self.pages.lock();
        for ptr in touched {
            let pid = {
                let mut page = ptr.write();
                page.mark_dirty(Some(tid));
                page.id()
            };
            if !pages.contains_key(&pid) {
                if pages.len() >= self.capacity {
                    self.evict(&mut pages)?;
                }
                pages.insert(pid, ptr.clone());
            }
        }
        Ok(())
    }

    /// Commit or abort `tid`: flush (commit) or discard (abort) its
    /// exclusively held pages, then release every lock. Idempotent.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> DbResult<()> {
        let mine: Vec<(PageId, LockMode)> = self
            .held
            .lock()
            .iter()
            .filter(|((t, _), _)| *t == tid)
            .map(|((_, pid), mode)| (*pid, *mode))
            .collect();

        if commit {
            self.flush_pages(tid)?;
        } else {
            for &(pid, mode) in &mine {
                if mode == LockMode::Exclusive {
                    self.discard_page(pid);
                }
            }
        }

        for &(pid, _) in &mine {
            if let Some(lock) = self.locks.lock().get(&pid).cloned() {
                lock.release(tid, &self.graph);
            }
            self.held.lock().remove(&(tid, pid));
        }
        if !mine.is_empty() {
            debug!(
                "{} {} with {} page locks released",
                tid,
                if commit { "committed" } else { "aborted" },
                mine.len()
            );
        }
        Ok(())
    }

    /// True when `tid` currently holds a lock on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.held.lock().contains_key(&(tid, pid))
    }

    /// Release one page lock early. Breaks two-phase locking; callers
    /// must know the page was not modified.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        if self.held.lock().remove(&(tid, pid)).is_some() {
            if let Some(lock) = self.locks.lock().get(&pid).cloned() {
                lock.release(tid, &self.graph);
            }
        }
    }

    /// Write one cached page through to disk if dirty, then mark clean.
    pub fn flush_page(&self, pid: PageId) -> DbResult<()> {
        let ptr = self.pages.lock().get(&pid).cloned();
        if let Some(ptr) = ptr {
            let mut page = ptr.write();
            if page.dirtied_by().is_some() {
                let file = self.catalog.table(pid.table_id)?;
                file.write_page(&page)?;
                page.mark_dirty(None);
            }
        }
        Ok(())
    }

    /// Flush the pages `tid` holds exclusively.
    pub fn flush_pages(&self, tid: TransactionId) -> DbResult<()> {
        let mine: Vec<PageId> = self
            .held
            .lock()
            .iter()
            .filter(|((t, _), mode)| *t == tid && **mode == LockMode::Exclusive)
            .map(|((_, pid), _)| *pid)
            .collect();
        for pid in mine {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Flush every dirty cached page. Breaks NO STEAL; only for tests
    /// and shutdown, outside any active write transaction.
    pub fn flush_all_pages(&self) -> DbResult<()> {
        let pids: Vec<PageId> = self.pages.lock().keys().copied().collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it, so the next read
    /// sees the on-disk version.
    pub fn discard_page(&self, pid: PageId) {
        self.pages.lock().remove(&pid);
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.pages.lock().len()
    }
}
