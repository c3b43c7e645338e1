//! Crate-wide error types.

use thiserror::Error;

use crate::storage::page::PageId;
use crate::transaction::id::TransactionId;

/// Errors that can surface at the engine boundary.
#[derive(Error, Debug)]
pub enum DbError {
    /// The lock manager refused to block this transaction because waiting
    /// would have closed a cycle in the waits-for graph. The owning thread
    /// must unwind and abort the transaction.
    #[error("transaction {0} aborted: deadlock detected")]
    TransactionAborted(TransactionId),

    /// The buffer pool is at capacity and every resident page is dirty, so
    /// nothing can be evicted (NO-STEAL). Retriable once other transactions
    /// complete.
    #[error("buffer pool is full: no clean page to evict")]
    BufferFull,

    /// A page has no free slot for the tuple being inserted.
    #[error("page {0} is full")]
    PageFull(PageId),

    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log serialization error: {0}")]
    LogCodec(#[from] bincode::Error),
}

/// Result type for engine operations.
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// True when the error is the deadlock-abort signal, which callers must
    /// never swallow.
    pub fn is_abort(&self) -> bool {
        matches!(self, DbError::TransactionAborted(_))
    }
}
