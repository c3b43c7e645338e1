//! Engine wiring.
//!
//! [`Context`] is the explicit replacement for a process-wide database
//! singleton: it owns the catalog, buffer pool, and log, is cheap to clone,
//! and is passed into operators and stored in transactions. Process-wide
//! state is created once at startup and dropped at shutdown.

use std::path::Path;
use std::sync::Arc;

use crate::access::heap::DbFile;
use crate::catalog::Catalog;
use crate::error::DbResult;
use crate::storage::buffer::{BufferPool, DEFAULT_POOL_SIZE};
use crate::storage::wal::LogManager;
use crate::transaction::id::{TransactionId, TransactionIdGenerator};

#[derive(Clone)]
pub struct Context {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
    log: Arc<LogManager>,
    tid_generator: Arc<TransactionIdGenerator>,
}

impl Context {
    /// Builds an engine: a fresh catalog, a write-ahead log at `wal_path`,
    /// and a buffer pool of `pool_capacity` pages.
    pub fn new(wal_path: &Path, pool_capacity: usize) -> DbResult<Self> {
        let catalog = Arc::new(Catalog::new());
        let log = Arc::new(LogManager::open(wal_path)?);
        let buffer_pool = Arc::new(BufferPool::new(
            pool_capacity,
            Arc::clone(&catalog),
            Arc::clone(&log),
        ));
        Ok(Self {
            catalog,
            buffer_pool,
            log,
            tid_generator: Arc::new(TransactionIdGenerator::new()),
        })
    }

    pub fn with_default_pool(wal_path: &Path) -> DbResult<Self> {
        Self::new(wal_path, DEFAULT_POOL_SIZE)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    pub fn log(&self) -> &Arc<LogManager> {
        &self.log
    }

    pub fn next_tid(&self) -> TransactionId {
        self.tid_generator.next()
    }

    /// Registers a table with the catalog.
    pub fn add_table(&self, file: Arc<dyn DbFile>, name: &str, primary_key: &str) {
        self.catalog.add_table(file, name, primary_key);
    }
}
