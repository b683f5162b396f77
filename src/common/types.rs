use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default page size in bytes (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool capacity, in pages
pub const DEFAULT_PAGES: usize = 50;

/// Default cost of reading one page from disk, used by table statistics
pub const IO_COST_PER_PAGE: usize = 1000;

/// Default number of histogram bins per column
pub const NUM_HIST_BINS: usize = 100;

/// Fixed payload width of a string field, in bytes
pub const STRING_LEN: usize = 128;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Current page size in bytes.
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::SeqCst)
}

/// Override the process-wide page size. FOR TESTING ONLY: shrinking pages
/// lets tests span many pages with little data.
pub fn set_page_size(bytes: usize) {
    PAGE_SIZE.store(bytes, Ordering::SeqCst);
}

/// Restore the default page size. FOR TESTING ONLY.
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::SeqCst);
}

/// Table ID type, derived from a stable hash of the backing file path
pub type TableId = u64;

/// Opaque transaction identifier, allocated by the `Transaction` facade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub(crate) fn new(raw: u64) -> Self {
        TransactionId(raw)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Identity of a page within a table file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: usize,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: usize) -> Self {
        PageId { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}.{}", self.table_id, self.page_no)
    }
}

/// Location of a tuple: a page plus a slot index within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: usize) -> Self {
        RecordId { page_id, slot }
    }
}

/// Access mode a transaction requests on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}
