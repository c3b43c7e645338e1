//! Transaction lifecycle.
//!
//! [`Transaction`] is a thin façade sequencing begin, work, and exactly one
//! of commit or abort against the buffer pool and the log. The `started`
//! flag makes completion at-most-once.

pub mod id;

pub use id::{TransactionId, TransactionIdGenerator};

use crate::database::Context;
use crate::error::DbResult;

pub struct Transaction {
    ctx: Context,
    tid: TransactionId,
    started: bool,
}

impl Transaction {
    /// Creates a transaction with a fresh id. It does nothing until
    /// [`start`](Self::start) is called.
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            tid: ctx.next_tid(),
            started: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.tid
    }

    /// Begins the transaction and logs BEGIN.
    pub fn start(&mut self) -> DbResult<()> {
        if !self.started {
            self.started = true;
            self.ctx.log().log_begin(self.tid)?;
            log::debug!("{} started", self.tid);
        }
        Ok(())
    }

    /// Commits: dirty pages are logged, forced, and written through, the
    /// COMMIT record is forced, and only then are page effects finalized and
    /// locks released.
    pub fn commit(&mut self) -> DbResult<()> {
        if self.started {
            let pool = self.ctx.buffer_pool();
            pool.flush_pages(self.tid)?;
            self.ctx.log().log_commit(self.tid)?;
            self.ctx.log().force()?;
            pool.transaction_complete(self.tid, true)?;
            self.started = false;
            log::debug!("{} committed", self.tid);
        }
        Ok(())
    }

    /// Aborts: the ABORT record is forced, every dirtied page reverts to its
    /// before-image, and locks are released.
    pub fn abort(&mut self) -> DbResult<()> {
        if self.started {
            self.ctx.log().log_abort(self.tid)?;
            self.ctx.log().force()?;
            self.ctx.buffer_pool().transaction_complete(self.tid, false)?;
            self.started = false;
            log::debug!("{} aborted", self.tid);
        }
        Ok(())
    }
}

/// A transaction dropped while still started aborts, best effort.
impl Drop for Transaction {
    fn drop(&mut self) {
        if self.started {
            let _ = self.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::wal::LogRecord;
    use tempfile::tempdir;

    #[test]
    fn test_lifecycle_records() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let ctx = Context::new(&dir.path().join("wal.log"), 8)?;

        let mut txn = Transaction::new(&ctx);
        txn.start()?;
        txn.commit()?;

        let mut txn2 = Transaction::new(&ctx);
        txn2.start()?;
        txn2.abort()?;

        let records = ctx.log().records()?;
        assert_eq!(records.len(), 4);
        assert!(matches!(records[0], LogRecord::Begin { .. }));
        assert!(matches!(records[1], LogRecord::Commit { .. }));
        assert!(matches!(records[2], LogRecord::Begin { .. }));
        assert!(matches!(records[3], LogRecord::Abort { .. }));
        Ok(())
    }

    #[test]
    fn test_completion_is_at_most_once() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let ctx = Context::new(&dir.path().join("wal.log"), 8)?;

        let mut txn = Transaction::new(&ctx);
        txn.start()?;
        txn.commit()?;
        // Further completions are no-ops.
        txn.commit()?;
        txn.abort()?;

        let records = ctx.log().records()?;
        assert_eq!(records.len(), 2);
        Ok(())
    }

    #[test]
    fn test_drop_aborts_started_transaction() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let ctx = Context::new(&dir.path().join("wal.log"), 8)?;

        {
            let mut txn = Transaction::new(&ctx);
            txn.start()?;
        }

        let records = ctx.log().records()?;
        assert_eq!(records.len(), 2);
        assert!(matches!(records[1], LogRecord::Abort { .. }));
        Ok(())
    }

    #[test]
    fn test_unstarted_transaction_logs_nothing() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let ctx = Context::new(&dir.path().join("wal.log"), 8)?;

        {
            let mut txn = Transaction::new(&ctx);
            txn.commit()?;
        }
        assert!(ctx.log().records()?.is_empty());
        Ok(())
    }
}
