// Iterator-based execution model.
//
// Operators produce tuples one at a time; each pulls from its child when
// asked for the next row. `next` on a closed or exhausted operator
// returns `Ok(None)`.

pub mod operators;

use std::sync::Arc;

use crate::common::error::DbResult;
use crate::storage::tuple::{Tuple, TupleDesc};

/// The interface every execution operator implements.
pub trait OpIterator {
    /// Prepare for iteration; may be called again after `close`.
    fn open(&mut self) -> DbResult<()>;

    /// Produce the next tuple, or `None` at end of stream.
    fn next(&mut self) -> DbResult<Option<Tuple>>;

    /// Restart the stream from the beginning.
    fn rewind(&mut self) -> DbResult<()>;

    /// Release resources; `next` returns `None` until reopened.
    fn close(&mut self);

    /// Schema of the tuples this operator produces.
    fn tuple_desc(&self) -> Arc<TupleDesc>;
}

/// An operator over an in-memory list of tuples. Used for aggregate
/// results and as a test fixture child.
pub struct TupleIterator {
    desc: Arc<TupleDesc>,
    tuples: Vec<Tuple>,
    pos: usize,
    opened: bool,
}

impl TupleIterator {
    pub fn new(desc: Arc<TupleDesc>, tuples: Vec<Tuple>) -> Self {
        TupleIterator {
            desc,
            tuples,
            pos: 0,
            opened: false,
        }
    }
}

impl OpIterator for TupleIterator {
    fn open(&mut self) -> DbResult<()> {
        self.opened = true;
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.opened || self.pos >= self.tuples.len() {
            return Ok(None);
        }
        let tuple = self.tuples[self.pos].clone();
        self.pos += 1;
        Ok(Some(tuple))
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.pos = 0;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }
}
