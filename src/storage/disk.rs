//! Page-granular file I/O for a single table.

use crate::error::DbResult;
use crate::storage::PAGE_SIZE;
use std::collections::hash_map::DefaultHasher;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Durable storage for one table: a flat file of `PAGE_SIZE`-byte pages.
///
/// Reads at or past end-of-file come back zero-filled, which is how new
/// pages are materialized before they are ever written.
pub struct PageStore {
    file: File,
    path: PathBuf,
    table_id: u32,
}

impl PageStore {
    /// Opens the page file at `path`, creating it if it does not exist.
    pub fn open(path: &Path) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        // The table id must be stable across runs for the same file, so it
        // is derived from the absolute path rather than any runtime state.
        let absolute = path
            .canonicalize()
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_default().join(path));
        let mut hasher = DefaultHasher::new();
        absolute.hash(&mut hasher);
        let table_id = hasher.finish() as u32;

        Ok(Self {
            file,
            path: absolute,
            table_id,
        })
    }

    /// Stable identifier of this table, equal for equal file paths.
    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads page `page_no`. Bytes beyond the end of the file are zeroes.
    pub fn read_page(&mut self, page_no: u32) -> DbResult<Box<[u8; PAGE_SIZE]>> {
        let mut buf = Box::new([0u8; PAGE_SIZE]);
        let offset = page_no as u64 * PAGE_SIZE as u64;
        let file_len = self.file.metadata()?.len();

        if offset < file_len {
            self.file.seek(SeekFrom::Start(offset))?;
            let available = ((file_len - offset) as usize).min(PAGE_SIZE);
            self.file.read_exact(&mut buf[..available])?;
        }
        Ok(buf)
    }

    /// Writes exactly one page at its offset, extending the file if needed.
    pub fn write_page(&mut self, page_no: u32, data: &[u8; PAGE_SIZE]) -> DbResult<()> {
        let offset = page_no as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Number of pages currently backed by the file, `ceil(len / PAGE_SIZE)`.
    pub fn num_pages(&self) -> DbResult<usize> {
        let len = self.file.metadata()?.len() as usize;
        Ok(len.div_ceil(PAGE_SIZE))
    }
}
