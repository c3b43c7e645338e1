//! Insert operator.

use crate::access::tuple::{Field, Tuple, TupleDesc, Type};
use crate::database::Context;
use crate::error::{DbError, DbResult};
use crate::executor::OpIterator;
use crate::transaction::id::TransactionId;

/// Drains its child into a table through the buffer pool, then yields a
/// single one-column tuple holding the number of rows inserted.
pub struct Insert {
    ctx: Context,
    tid: TransactionId,
    table_id: u32,
    child: Box<dyn OpIterator>,
    desc: TupleDesc,
    inserted: usize,
    emitted: bool,
    open: bool,
}

impl Insert {
    pub fn new(
        ctx: &Context,
        tid: TransactionId,
        child: Box<dyn OpIterator>,
        table_id: u32,
    ) -> DbResult<Self> {
        let table_desc = ctx.catalog().tuple_desc(table_id)?;
        if child.tuple_desc() != &table_desc {
            return Err(DbError::IllegalArgument(
                "child schema does not match target table".into(),
            ));
        }
        Ok(Self {
            ctx: ctx.clone(),
            tid,
            table_id,
            child,
            desc: TupleDesc::of_types(vec![Type::Int]),
            inserted: 0,
            emitted: false,
            open: false,
        })
    }
}

impl OpIterator for Insert {
    /// The inserts happen here, at open time.
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        while self.child.has_next()? {
            let mut tuple = self.child.next()?;
            self.ctx
                .buffer_pool()
                .insert_tuple(self.tid, self.table_id, &mut tuple)?;
            self.inserted += 1;
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
            return Err(DbError::NoSuchElement("insert already reported".into()));
        }
        self.emitted = true;
        Tuple::new(self.desc.clone(), vec![Field::Int(self.inserted as i32)])
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
