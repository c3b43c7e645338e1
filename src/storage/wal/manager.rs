//! Append/force log manager.
//!
//! Records are bincode-serialized and framed with a little-endian `u32`
//! length prefix. A single mutex serializes appends, so per-transaction
//! record order is simply append order.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::DbResult;
use crate::storage::page::PageId;
use crate::storage::wal::record::LogRecord;
use crate::transaction::id::TransactionId;

pub struct LogManager {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl LogManager {
    /// Opens the log at `path`, creating it if absent and appending to any
    /// existing records.
    pub fn open(path: &Path) -> DbResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    fn append(&self, record: &LogRecord) -> DbResult<()> {
        let payload = bincode::serialize(record)?;
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        writer.write_all(&payload)?;
        log::trace!("log append: {}", record);
        Ok(())
    }

    pub fn log_begin(&self, tid: TransactionId) -> DbResult<()> {
        self.append(&LogRecord::Begin { tid })
    }

    pub fn log_update(
        &self,
        tid: TransactionId,
        pid: PageId,
        before: Vec<u8>,
        after: Vec<u8>,
    ) -> DbResult<()> {
        self.append(&LogRecord::Update {
            tid,
            pid,
            before,
            after,
        })
    }

    pub fn log_commit(&self, tid: TransactionId) -> DbResult<()> {
        self.append(&LogRecord::Commit { tid })
    }

    pub fn log_abort(&self, tid: TransactionId) -> DbResult<()> {
        self.append(&LogRecord::Abort { tid })
    }

    /// Durably flushes everything appended so far.
    pub fn force(&self) -> DbResult<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Reads back every record in the log, in append order. Used by
    /// recovery tooling and tests; flushes buffered appends first so the
    /// view is current.
    pub fn records(&self) -> DbResult<Vec<LogRecord>> {
        {
            let mut writer = self.writer.lock().unwrap();
            writer.flush()?;
        }

        let mut file = File::open(&self.path)?;
        let mut records = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match file.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut payload = vec![0u8; len];
            file.read_exact(&mut payload)?;
            records.push(bincode::deserialize(&payload)?);
        }
        Ok(records)
    }
}
