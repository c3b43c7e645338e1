//! Sequential table scan.

use crate::access::heap::DbFileIterator;
use crate::access::tuple::{Tuple, TupleDesc};
use crate::database::Context;
use crate::error::{DbError, DbResult};
use crate::executor::OpIterator;
use crate::transaction::id::TransactionId;
use std::sync::Arc;

/// Leaf operator reading every tuple of a table through the buffer pool
/// under shared page locks.
pub struct SeqScan {
    ctx: Context,
    tid: TransactionId,
    table_id: u32,
    desc: TupleDesc,
    inner: Option<Box<dyn DbFileIterator>>,
}

impl SeqScan {
    pub fn new(ctx: &Context, tid: TransactionId, table_id: u32) -> DbResult<Self> {
        let desc = ctx.catalog().tuple_desc(table_id)?;
        Ok(Self {
            ctx: ctx.clone(),
            tid,
            table_id,
            desc,
            inner: None,
        })
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> DbResult<()> {
        let file = self.ctx.catalog().file(self.table_id)?;
        let mut inner = file.iterator(Arc::clone(self.ctx.buffer_pool()), self.tid);
        inner.open()?;
        self.inner = Some(inner);
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        match &mut self.inner {
            Some(inner) => inner.has_next(),
            None => Ok(false),
        }
    }

    fn next(&mut self) -> DbResult<Tuple> {
        match &mut self.inner {
            Some(inner) => inner.next(),
            None => Err(DbError::NoSuchElement("scan is not open".into())),
        }
    }

    fn rewind(&mut self) -> DbResult<()> {
        match &mut self.inner {
            Some(inner) => inner.rewind(),
            None => Err(DbError::NoSuchElement("scan is not open".into())),
        }
    }

    fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.close();
        }
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
