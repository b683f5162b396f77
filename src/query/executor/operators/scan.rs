// Sequential scan leaf operator: the heap file cursor behind the
// OpIterator interface.

use std::sync::Arc;

use crate::common::error::DbResult;
use crate::common::types::TransactionId;
use crate::query::executor::OpIterator;
use crate::storage::buffer::BufferPool;
use crate::storage::heap::{HeapFile, HeapFileIter};
use crate::storage::tuple::{Tuple, TupleDesc};

pub struct SeqScan {
    tid: TransactionId,
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    desc: Arc<TupleDesc>,
    iter: Option<HeapFileIter>,
}

impl SeqScan {
    pub fn new(
        tid: TransactionId,
        file: Arc<HeapFile>,
        pool: Arc<BufferPool>,
        alias: Option<&str>,
    ) -> Self {
        let desc = match alias {
            Some(alias) => Arc::new(file.tuple_desc().prefixed(alias)),
            None => file.tuple_desc().clone(),
        };
        SeqScan {
            tid,
            file,
            pool,
            desc,
            iter: None,
        }
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> DbResult<()> {
        let mut iter = self.file.iter(self.tid, self.pool.clone());
        iter.open()?;
        self.iter = Some(iter);
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        match self.iter.as_mut() {
            Some(iter) => iter.next(),
            None => Ok(None),
        }
    }

    fn rewind(&mut self) -> DbResult<()> {
        match self.iter.as_mut() {
            Some(iter) => iter.rewind(),
            None => self.open(),
        }
    }

    fn close(&mut self) {
        if let Some(mut iter) = self.iter.take() {
            iter.close();
        }
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }
}
