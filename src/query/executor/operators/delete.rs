// Delete operator: removes every tuple its child produces, then emits
// one tuple holding the deleted count.

use std::sync::Arc;

use crate::common::error::DbResult;
use crate::common::types::TransactionId;
use crate::query::executor::OpIterator;
use crate::storage::buffer::BufferPool;
use crate::storage::tuple::{Field, FieldType, Tuple, TupleDesc};

pub struct Delete {
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    pool: Arc<BufferPool>,
    desc: Arc<TupleDesc>,
    done: bool,
}

impl Delete {
    pub fn new(tid: TransactionId, child: Box<dyn OpIterator>, pool: Arc<BufferPool>) -> Self {
        Delete {
            tid,
            child,
            pool,
            desc: Arc::new(TupleDesc::with_types(vec![FieldType::Int])),
            done: false,
        }
    }
}

impl OpIterator for Delete {
    fn open(&mut self) -> DbResult<()> {
        self.done = false;
        self.child.open()
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            // a deadlock abort from the pool propagates untouched
            self.pool.delete_tuple(self.tid, &tuple)?;
            count += 1;
        }
        Ok(Some(Tuple::new(self.desc.clone(), vec![Field::Int(count)])))
    }

    fn rewind(&mut self) -> DbResult<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.done = true;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }
}
