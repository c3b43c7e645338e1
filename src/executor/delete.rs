//! Delete operator.

use crate::access::tuple::{Field, Tuple, TupleDesc, Type};
use crate::database::Context;
use crate::error::{DbError, DbResult};
use crate::executor::OpIterator;
use crate::transaction::id::TransactionId;

/// Reads tuples from its child and removes each from its table through the
/// buffer pool, then yields a single one-column count tuple.
pub struct Delete {
    ctx: Context,
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    desc: TupleDesc,
    deleted: usize,
    emitted: bool,
    open: bool,
}

impl Delete {
    pub fn new(ctx: &Context, tid: TransactionId, child: Box<dyn OpIterator>) -> Self {
        Self {
            ctx: ctx.clone(),
            tid,
            child,
            desc: TupleDesc::of_types(vec![Type::Int]),
            deleted: 0,
            emitted: false,
            open: false,
        }
    }
}

impl OpIterator for Delete {
    /// The deletes happen here, at open time.
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            self.ctx.buffer_pool().delete_tuple(self.tid, &tuple)?;
            self.deleted += 1;
        }
        self.open = true;
        self.emitted = false;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        Ok(self.open && !self.emitted)
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if !self.open || self.emitted {
            return Err(DbError::NoSuchElement("delete already reported".into()));
        }
        self.emitted = true;
        Tuple::new(self.desc.clone(), vec![Field::Int(self.deleted as i32)])
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.emitted = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.open = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
