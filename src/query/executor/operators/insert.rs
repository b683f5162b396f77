// Insert operator: drains its child into a table through the buffer
// pool, then emits one tuple holding the inserted count.

use std::sync::Arc;

use crate::common::error::{DbError, DbResult};
use crate::common::types::{TableId, TransactionId};
use crate::query::executor::OpIterator;
use crate::storage::buffer::BufferPool;
use crate::storage::tuple::{Field, FieldType, Tuple, TupleDesc};

pub struct Insert {
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    table_id: TableId,
    pool: Arc<BufferPool>,
    desc: Arc<TupleDesc>,
    done: bool,
}

impl Insert {
    pub fn new(
        tid: TransactionId,
        child: Box<dyn OpIterator>,
        table_id: TableId,
        pool: Arc<BufferPool>,
    ) -> DbResult<Self> {
        let table_desc = pool.catalog().tuple_desc(table_id)?;
        if !child.tuple_desc().compatible(&table_desc) {
            return Err(DbError::InvalidOperation(
                "child schema does not match the target table".to_string(),
            ));
        }
        Ok(Insert {
            tid,
            child,
            table_id,
            pool,
            desc: Arc::new(TupleDesc::with_types(vec![FieldType::Int])),
            done: false,
        })
    }
}

impl OpIterator for Insert {
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
        while let Some(mut tuple) = self.child.next()? {
            // a deadlock abort from the pool propagates untouched
            self.pool.insert_tuple(self.tid, self.table_id, &mut tuple)?;
            count += 1;
        }
        Ok(Some(Tuple::new(self.desc.clone(), vec![Field::Int(count)])))
    }

    fn rewind(&mut self) -> DbResult<()> {
        // inserts are not replayable; the count was already produced
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
