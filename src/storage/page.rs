//! Page identity and the capability surface the buffer pool needs.

pub mod heap_page;

use crate::transaction::id::TransactionId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

pub use heap_page::HeapPage;

/// Address of a page: which table, and which page within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId {
    pub table_id: u32,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: u32, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// What the buffer pool requires of any cached page, independent of its
/// concrete layout.
///
/// A page is mutated only by a transaction holding the exclusive lock on its
/// id; `dirtied_by` names that transaction until commit or abort. The
/// before-image is the committed content of the page as of the moment the
/// current dirtying transaction first touched it, and is what an abort
/// restores.
pub trait Page: Send + Sync {
    fn id(&self) -> PageId;

    /// Serialized on-disk representation, exactly `PAGE_SIZE` bytes.
    fn page_data(&self) -> Vec<u8>;

    fn mark_dirty(&mut self, tid: Option<TransactionId>);

    fn dirtied_by(&self) -> Option<TransactionId>;

    /// Snapshots the current contents as the new before-image. Called after
    /// a successful flush, when the current contents become the committed
    /// state.
    fn set_before_image(&mut self);

    fn before_image_data(&self) -> Vec<u8>;

    /// Re-parses the before-image in place, discarding uncommitted changes
    /// and clearing the dirty mark. This is the logical undo used on abort.
    fn restore_before_image(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Shared handle to a cached page.
pub type PageRef = Arc<RwLock<dyn Page>>;
