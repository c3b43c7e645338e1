//! Logical log records.

use crate::storage::page::PageId;
use crate::transaction::id::TransactionId;
use serde::{Deserialize, Serialize};

/// One entry in the write-ahead log.
///
/// `Update` carries full physical before/after images of the page, which is
/// enough for both undo and redo without any knowledge of the page layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogRecord {
    Begin {
        tid: TransactionId,
    },
    Update {
        tid: TransactionId,
        pid: PageId,
        before: Vec<u8>,
        after: Vec<u8>,
    },
    Commit {
        tid: TransactionId,
    },
    Abort {
        tid: TransactionId,
    },
}

impl LogRecord {
    /// The transaction this record belongs to.
    pub fn tid(&self) -> TransactionId {
        match self {
            LogRecord::Begin { tid }
            | LogRecord::Update { tid, .. }
            | LogRecord::Commit { tid }
            | LogRecord::Abort { tid } => *tid,
        }
    }
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogRecord::Begin { tid } => write!(f, "BEGIN {}", tid),
            LogRecord::Update { tid, pid, .. } => write!(f, "UPDATE {} page {}", tid, pid),
            LogRecord::Commit { tid } => write!(f, "COMMIT {}", tid),
            LogRecord::Abort { tid } => write!(f, "ABORT {}", tid),
        }
    }
}
