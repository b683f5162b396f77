// Heap file access method: an unordered collection of slotted pages in a
// single on-disk file, addressed by `page_no * page_size()` byte offsets.
//
// All page traffic from insert/delete/scan goes through the buffer pool,
// which owns locking; this module only performs the raw file I/O.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::error::{DbError, DbResult};
use crate::common::types::{page_size, PageId, Permissions, TableId, TransactionId};
use crate::storage::buffer::BufferPool;
use crate::storage::page::{HeapPage, PageError, PagePtr};
use crate::storage::tuple::{Tuple, TupleDesc};

/// FNV-1a over the canonical path. The table id must be stable across
/// process runs, which rules out the randomized std hasher.
fn stable_table_id(path: &Path) -> TableId {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in path.to_string_lossy().as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// A heap-organized table backed by one random-access file.
pub struct HeapFile {
    file: Mutex<File>,
    path: PathBuf,
    desc: Arc<TupleDesc>,
    id: TableId,
}

impl HeapFile {
    /// Open (creating if missing) the heap file at `path`.
    pub fn open(path: impl AsRef<Path>, desc: Arc<TupleDesc>) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;
        let path = path.as_ref().canonicalize()?;
        let id = stable_table_id(&path);
        Ok(HeapFile {
            file: Mutex::new(file),
            path,
            desc,
            id,
        })
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Number of pages currently backed by the file.
    pub fn num_pages(&self) -> DbResult<usize> {
        let len = self.file.lock().metadata()?.len() as usize;
        Ok((len + page_size() - 1) / page_size())
    }

    /// Read and decode one page.
    ///
    /// The page one past the end of the file decodes as a fresh empty
    /// image (the extension window); anything further is out of bounds.
    pub fn read_page(&self, pid: PageId) -> DbResult<HeapPage> {
        let ps = page_size();
        let mut file = self.file.lock();
        let len = file.metadata()?.len() as usize;
        let offset = pid.page_no * ps;

        if offset >= len {
            let backed = (len + ps - 1) / ps;
            if pid.page_no > backed {
                return Err(DbError::InvalidPage(pid));
            }
            return Ok(HeapPage::new(pid, &HeapPage::empty_page_data(), self.desc.clone())?);
        }

        let mut buf = vec![0u8; ps];
        file.seek(SeekFrom::Start(offset as u64))?;
        file.read_exact(&mut buf)?;
        Ok(HeapPage::new(pid, &buf, self.desc.clone())?)
    }

    /// Write exactly one page image at its offset.
    pub fn write_page(&self, page: &HeapPage) -> DbResult<()> {
        let offset = page.id().page_no * page_size();
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset as u64))?;
        file.write_all(&page.page_data())?;
        file.flush()?;
        Ok(())
    }

    /// Append an empty page image, returning its page number. Length
    /// check and write happen under one file guard so two concurrent
    /// extensions get distinct pages.
    fn extend_with_empty_page(&self) -> DbResult<usize> {
        let ps = page_size();
        let mut file = self.file.lock();
        let len = file.metadata()?.len() as usize;
        let page_no = (len + ps - 1) / ps;
        file.seek(SeekFrom::Start((page_no * ps) as u64))?;
        file.write_all(&HeapPage::empty_page_data())?;
        file.flush()?;
        debug!("heap file {:x} extended to page {}", self.id, page_no);
        Ok(page_no)
    }

    /// Insert `tuple` into the first page with a free slot, extending the
    /// file when every existing page is full. Returns the dirtied pages.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        pool: &BufferPool,
        tuple: &mut Tuple,
    ) -> DbResult<Vec<PagePtr>> {
        loop {
            for page_no in 0..self.num_pages()? {
                let pid = PageId::new(self.id, page_no);
                let ptr = pool.get_page(tid, pid, Permissions::ReadWrite)?;
                let mut page = ptr.write();
                if page.num_empty_slots() > 0 {
                    page.insert_tuple(tuple)?;
                    drop(page);
                    return Ok(vec![ptr]);
                }
            }

            let page_no = self.extend_with_empty_page()?;
            let pid = PageId::new(self.id, page_no);
            let ptr = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            let mut page = ptr.write();
            // another transaction may have raced us into the new page
            match page.insert_tuple(tuple) {
                Ok(()) => {
                    drop(page);
                    return Ok(vec![ptr]);
                }
                Err(PageError::PageFull) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Delete `tuple` from the page named by its record id. Returns the
    /// dirtied page.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        pool: &BufferPool,
        tuple: &Tuple,
    ) -> DbResult<Vec<PagePtr>> {
        let rid = tuple.record_id().ok_or(PageError::TupleNotFound)?;
        let ptr = pool.get_page(tid, rid.page_id, Permissions::ReadWrite)?;
        ptr.write().delete_tuple(tuple)?;
        Ok(vec![ptr])
    }

    /// Restartable scan over every tuple in the file, page by page.
    pub fn iter(self: &Arc<Self>, tid: TransactionId, pool: Arc<BufferPool>) -> HeapFileIter {
        HeapFileIter {
            file: self.clone(),
            pool,
            tid,
            page_no: 0,
            tuples: Vec::new(),
            next_tuple: 0,
            opened: false,
        }
    }
}

/// Cursor over a heap file: a page index plus a position within the
/// current page's tuples. Every page fetch goes through the buffer pool
/// under a shared lock.
pub struct HeapFileIter {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    page_no: usize,
    tuples: Vec<Tuple>,
    next_tuple: usize,
    opened: bool,
}

impl HeapFileIter {
    pub fn open(&mut self) -> DbResult<()> {
        self.opened = true;
        self.page_no = 0;
        self.next_tuple = 0;
        self.tuples.clear();
        if self.file.num_pages()? > 0 {
            self.load_page(0)?;
        }
        Ok(())
    }

    fn load_page(&mut self, page_no: usize) -> DbResult<()> {
        let pid = PageId::new(self.file.id(), page_no);
        let ptr = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
        self.page_no = page_no;
        self.tuples = ptr.read().iter().collect();
        self.next_tuple = 0;
        Ok(())
    }

    pub fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.opened {
            return Ok(None);
        }
        loop {
            if self.next_tuple < self.tuples.len() {
                let tuple = self.tuples[self.next_tuple].clone();
                self.next_tuple += 1;
                return Ok(Some(tuple));
            }
            if self.page_no + 1 >= self.file.num_pages()? {
                return Ok(None);
            }
            let next = self.page_no + 1;
            self.load_page(next)?;
        }
    }

    /// Reset both the page cursor and the tuple cursor.
    pub fn rewind(&mut self) -> DbResult<()> {
        self.open()
    }

    pub fn close(&mut self) {
        self.opened = false;
        self.tuples.clear();
        self.next_tuple = 0;
        self.page_no = 0;
    }
}
