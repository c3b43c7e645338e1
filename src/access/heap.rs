//! Heap table files: unordered collections of tuples in slotted pages.
//!
//! `HeapFile` never touches pages directly during tuple operations; every
//! page it reads or writes for a transaction goes through the buffer pool so
//! the proper lock is taken first. Only the raw page I/O at the bottom
//! (`read_page`/`write_page`) talks to the page store.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use crate::access::tuple::{Tuple, TupleDesc};
use crate::concurrency::lock::LockMode;
use crate::error::{DbError, DbResult};
use crate::storage::buffer::BufferPool;
use crate::storage::disk::PageStore;
use crate::storage::page::{HeapPage, Page, PageId, PageRef};
use crate::storage::PAGE_SIZE;
use crate::transaction::id::TransactionId;

/// A table's backing file.
pub trait DbFile: Send + Sync {
    /// Stable table id, equal across runs for the same file path.
    fn id(&self) -> u32;

    fn tuple_desc(&self) -> &TupleDesc;

    fn num_pages(&self) -> DbResult<usize>;

    /// Reads a page from disk, zero-materializing pages past end-of-file.
    fn read_page(&self, pid: PageId) -> DbResult<PageRef>;

    /// Writes a page at its offset, extending the file if needed.
    fn write_page(&self, page: &dyn Page) -> DbResult<()>;

    /// Inserts `tuple` on behalf of `tid`, going through the buffer pool for
    /// every page touched. Returns the modified pages so the pool can mark
    /// them dirty.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> DbResult<Vec<PageRef>>;

    /// Removes `tuple` (located by its record id). Returns the modified
    /// pages.
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> DbResult<Vec<PageRef>>;

    /// A cursor over every tuple of the table under `tid`.
    fn iterator(
        self: Arc<Self>,
        pool: Arc<BufferPool>,
        tid: TransactionId,
    ) -> Box<dyn DbFileIterator>;
}

/// Cursor contract shared by every table iterator.
///
/// `next`/`has_next` before `open` or after `close` do not yield tuples;
/// `next` reports `NoSuchElement`. `rewind` restarts from the first tuple,
/// `close` is idempotent.
pub trait DbFileIterator: Send {
    fn open(&mut self) -> DbResult<()>;
    fn has_next(&mut self) -> DbResult<bool>;
    fn next(&mut self) -> DbResult<Tuple>;
    fn rewind(&mut self) -> DbResult<()>;
    fn close(&mut self);
}

fn heap_page_ref<'a>(page: &'a dyn Page) -> DbResult<&'a HeapPage> {
    page.as_any()
        .downcast_ref::<HeapPage>()
        .ok_or_else(|| DbError::IllegalArgument("page is not a heap page".into()))
}

fn heap_page_mut<'a>(page: &'a mut dyn Page) -> DbResult<&'a mut HeapPage> {
    page.as_any_mut()
        .downcast_mut::<HeapPage>()
        .ok_or_else(|| DbError::IllegalArgument("page is not a heap page".into()))
}

pub struct HeapFile {
    store: Mutex<PageStore>,
    desc: TupleDesc,
    id: u32,
}

impl HeapFile {
    /// Opens (or creates) the heap file at `path` with the given schema.
    pub fn open(path: &Path, desc: TupleDesc) -> DbResult<Self> {
        if HeapPage::slot_count(&desc) == 0 {
            return Err(DbError::IllegalArgument(format!(
                "tuple of {} bytes does not fit in a page",
                desc.byte_size()
            )));
        }
        let store = PageStore::open(path)?;
        let id = store.table_id();
        Ok(Self {
            store: Mutex::new(store),
            desc,
            id,
        })
    }
}

impl DbFile for HeapFile {
    fn id(&self) -> u32 {
        self.id
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    fn num_pages(&self) -> DbResult<usize> {
        self.store.lock().num_pages()
    }

    fn read_page(&self, pid: PageId) -> DbResult<PageRef> {
        if pid.table_id != self.id {
            return Err(DbError::IllegalArgument(format!(
                "page {} does not belong to table {}",
                pid, self.id
            )));
        }
        let bytes = self.store.lock().read_page(pid.page_no)?;
        let page = HeapPage::from_bytes(pid, self.desc.clone(), &bytes[..])?;
        Ok(Arc::new(RwLock::new(page)))
    }

    fn write_page(&self, page: &dyn Page) -> DbResult<()> {
        let pid = page.id();
        if pid.table_id != self.id {
            return Err(DbError::IllegalArgument(format!(
                "page {} does not belong to table {}",
                pid, self.id
            )));
        }
        let data = page.page_data();
        let buf: &[u8; PAGE_SIZE] = data
            .as_slice()
            .try_into()
            .map_err(|_| DbError::IllegalArgument("page data is not PAGE_SIZE bytes".into()))?;
        self.store.lock().write_page(pid.page_no, buf)
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> DbResult<Vec<PageRef>> {
        if tuple.desc() != &self.desc {
            return Err(DbError::IllegalArgument(
                "tuple schema does not match table schema".into(),
            ));
        }

        // Scan for a page with room, holding the exclusive lock on each page
        // we look at (strict 2PL keeps those locks until the transaction
        // completes). Pages at or past end-of-file that are not yet cached
        // materialize as fresh, empty pages.
        let mut page_no = 0u32;
        loop {
            let pid = PageId::new(self.id, page_no);
            let fresh = page_no as usize >= self.num_pages()? && !pool.contains_page(pid);
            let page = pool.get_page(tid, pid, LockMode::Exclusive)?;

            let inserted = {
                let mut guard = page.write();
                match heap_page_mut(&mut *guard)?.insert_tuple(tuple) {
                    Ok(()) => true,
                    Err(DbError::PageFull(_)) if !fresh => false,
                    Err(e) => return Err(e),
                }
            };
            if inserted {
                return Ok(vec![page]);
            }
            page_no += 1;
        }
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> DbResult<Vec<PageRef>> {
        let rid = tuple.record_id().ok_or_else(|| {
            DbError::IllegalArgument("tuple has no record id, cannot delete".into())
        })?;
        if rid.page_id.table_id != self.id {
            return Err(DbError::IllegalArgument(format!(
                "tuple belongs to table {}, not {}",
                rid.page_id.table_id, self.id
            )));
        }

        let page = pool.get_page(tid, rid.page_id, LockMode::Exclusive)?;
        {
            let mut guard = page.write();
            heap_page_mut(&mut *guard)?.delete_tuple(rid)?;
        }
        Ok(vec![page])
    }

    fn iterator(
        self: Arc<Self>,
        pool: Arc<BufferPool>,
        tid: TransactionId,
    ) -> Box<dyn DbFileIterator> {
        Box::new(HeapFileIterator::new(self, pool, tid))
    }
}

enum IterState {
    Unopened,
    Open {
        /// Next page to pull tuples from.
        next_page_no: u32,
        /// Tuples of the current page not yet handed out.
        tuples: VecDeque<Tuple>,
    },
    Closed,
}

/// Cursor over one heap file. Each page is fetched through the buffer pool
/// under a shared lock, which the transaction keeps until it completes.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    state: IterState,
}

impl HeapFileIterator {
    pub fn new(file: Arc<HeapFile>, pool: Arc<BufferPool>, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            state: IterState::Unopened,
        }
    }
}

impl DbFileIterator for HeapFileIterator {
    fn open(&mut self) -> DbResult<()> {
        self.state = IterState::Open {
            next_page_no: 0,
            tuples: VecDeque::new(),
        };
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        let num_pages = self.file.num_pages()? as u32;
        match &mut self.state {
            IterState::Unopened | IterState::Closed => Ok(false),
            IterState::Open {
                next_page_no,
                tuples,
            } => {
                while tuples.is_empty() && *next_page_no < num_pages {
                    let loaded = {
                        let pid = PageId::new(self.file.id, *next_page_no);
                        let page = self.pool.get_page(self.tid, pid, LockMode::Shared)?;
                        let guard = page.read();
                        heap_page_ref(&*guard)?.iter().cloned().collect()
                    };
                    *tuples = loaded;
                    *next_page_no += 1;
                }
                Ok(!tuples.is_empty())
            }
        }
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if matches!(self.state, IterState::Unopened | IterState::Closed) {
            return Err(DbError::NoSuchElement("iterator is not open".into()));
        }
        if !self.has_next()? {
            return Err(DbError::NoSuchElement("iterator exhausted".into()));
        }
        match &mut self.state {
            IterState::Open { tuples, .. } => Ok(tuples.pop_front().expect("has_next was true")),
            _ => unreachable!(),
        }
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.open()
    }

    fn close(&mut self) {
        self.state = IterState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tuple::{Field, Type};
    use crate::catalog::Catalog;
    use crate::storage::wal::LogManager;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        pool: Arc<BufferPool>,
        file: Arc<HeapFile>,
        desc: TupleDesc,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let desc = TupleDesc::of_types(vec![Type::Int, Type::Int]);
        let file = Arc::new(HeapFile::open(&dir.path().join("t.dat"), desc.clone()).unwrap());

        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::clone(&file) as Arc<dyn DbFile>, "t", "");
        let log = Arc::new(LogManager::open(&dir.path().join("wal.log")).unwrap());
        let pool = Arc::new(BufferPool::new(16, catalog, log));

        Fixture {
            _dir: dir,
            pool,
            file,
            desc,
        }
    }

    fn tuple(desc: &TupleDesc, a: i32, b: i32) -> Tuple {
        Tuple::new(desc.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap()
    }

    /// Inserts `n` tuples under `tid` and commits, so the pages are on disk
    /// and the locks are released for later transactions.
    fn insert_n(fx: &Fixture, tid: TransactionId, n: usize) {
        for i in 0..n {
            let mut t = tuple(&fx.desc, i as i32, (i * 2) as i32);
            fx.pool.insert_tuple(tid, fx.file.id(), &mut t).unwrap();
        }
        fx.pool.transaction_complete(tid, true).unwrap();
    }

    #[test]
    fn test_id_stable_and_distinct() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let desc = TupleDesc::of_types(vec![Type::Int]);
        let a = HeapFile::open(&dir.path().join("a.dat"), desc.clone())?;
        let b = HeapFile::open(&dir.path().join("b.dat"), desc.clone())?;
        assert_ne!(a.id(), b.id());

        let a_again = HeapFile::open(&dir.path().join("a.dat"), desc)?;
        assert_eq!(a.id(), a_again.id());
        Ok(())
    }

    #[test]
    fn test_insert_allocates_page_lazily() {
        let fx = fixture();
        let tid = TransactionId(1);
        assert_eq!(fx.file.num_pages().unwrap(), 0);

        let mut t = tuple(&fx.desc, 1, 2);
        let pages = fx.file.insert_tuple(&fx.pool, tid, &mut t).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(t.record_id().unwrap().page_id.page_no, 0);

        // The page exists in memory only until a flush.
        assert_eq!(fx.file.num_pages().unwrap(), 0);
        assert!(fx.pool.contains_page(PageId::new(fx.file.id(), 0)));
    }

    #[test]
    fn test_insert_spills_to_second_page() {
        let fx = fixture();
        let tid = TransactionId(1);
        let per_page = HeapPage::slot_count(&fx.desc);

        for i in 0..per_page + 1 {
            let mut t = tuple(&fx.desc, i as i32, 0);
            fx.pool.insert_tuple(tid, fx.file.id(), &mut t).unwrap();
            let expected_page = if i < per_page { 0 } else { 1 };
            assert_eq!(t.record_id().unwrap().page_id.page_no, expected_page);
        }
    }

    #[test]
    fn test_delete_requires_record_id() {
        let fx = fixture();
        let t = tuple(&fx.desc, 1, 2);
        let result = fx.file.delete_tuple(&fx.pool, TransactionId(1), &t);
        assert!(matches!(result, Err(DbError::IllegalArgument(_))));
    }

    #[test]
    fn test_iterator_before_open_and_after_close() {
        let fx = fixture();
        let tid = TransactionId(1);
        insert_n(&fx, tid, 3);

        let mut it = Arc::clone(&fx.file).iterator(Arc::clone(&fx.pool), tid);
        assert!(!it.has_next().unwrap());
        assert!(matches!(it.next(), Err(DbError::NoSuchElement(_))));

        it.open().unwrap();
        let mut count = 0;
        while it.has_next().unwrap() {
            it.next().unwrap();
            count += 1;
        }
        assert_eq!(count, 3);
        assert!(!it.has_next().unwrap());

        it.close();
        assert!(matches!(it.next(), Err(DbError::NoSuchElement(_))));
        // Closing twice is harmless.
        it.close();
    }

    #[test]
    fn test_iterator_rewind() {
        let fx = fixture();
        let tid = TransactionId(1);
        insert_n(&fx, tid, 5);

        let mut it = Arc::clone(&fx.file).iterator(Arc::clone(&fx.pool), tid);
        it.open().unwrap();
        for _ in 0..3 {
            it.next().unwrap();
        }
        it.rewind().unwrap();

        let mut count = 0;
        while it.has_next().unwrap() {
            it.next().unwrap();
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn test_iterator_takes_shared_locks() {
        let fx = fixture();
        let tid = TransactionId(1);
        insert_n(&fx, tid, 2);

        let scan_tid = TransactionId(2);
        let mut it = Arc::clone(&fx.file).iterator(Arc::clone(&fx.pool), scan_tid);
        it.open().unwrap();
        while it.has_next().unwrap() {
            it.next().unwrap();
        }
        // The scanning transaction retains its page lock (strict 2PL).
        assert!(fx.pool.holds_lock(scan_tid, PageId::new(fx.file.id(), 0)));
    }

    #[test]
    fn test_iterator_on_empty_file() {
        let fx = fixture();
        let mut it = Arc::clone(&fx.file).iterator(Arc::clone(&fx.pool), TransactionId(1));
        it.open().unwrap();
        assert!(!it.has_next().unwrap());
        assert!(matches!(it.next(), Err(DbError::NoSuchElement(_))));
    }
}
