//! Durable record store: an append-only JSONL file.
//!
//! One [`AttendanceRecord`] per line, newline-terminated. The store is the
//! only durable piece of the pipeline; it is treated as a queue, not a
//! database. Readers tolerate and skip malformed lines, so a partially
//! written line after a crash never blocks the records around it.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{LanyardError, Result};
use crate::types::AttendanceRecord;

/// Append-only attendance record log.
///
/// Clones share the same file and the same internal guard, so `append` and
/// `truncate_to_tail` never interleave: a record appended concurrently with
/// a truncation is either part of the rewrite or lands after it, never lost.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    guard: Arc<Mutex<()>>,
}

impl RecordStore {
    /// Create a store over the given JSONL file. The file and its parent
    /// directories are created lazily on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns [`LanyardError::StoreIo`] when the medium is unwritable
    /// (disk full, permission denied, unreachable parent directory).
    pub fn append(&self, record: &AttendanceRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| self.io_error(std::io::Error::new(ErrorKind::InvalidData, e)))?;

        let _held = self.guard.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(format!("{line}\n").as_bytes())
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// Read every stored record, oldest first.
    ///
    /// A missing file yields an empty vec. Malformed lines, blank lines and
    /// records violating the non-empty-field invariant are skipped with a
    /// warning; they never abort the read.
    ///
    /// # Errors
    ///
    /// Returns [`LanyardError::StoreIo`] only for I/O failures other than
    /// the file not existing.
    pub fn read_all(&self) -> Result<Vec<AttendanceRecord>> {
        let _held = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_all_locked()
    }

    /// Number of records currently pending delivery.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::read_all`].
    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.read_all()?.len())
    }

    /// Retain only the last `n` records by append order.
    ///
    /// A no-op when the store holds `n` records or fewer. The rewrite goes
    /// through a temp file in the same directory followed by an atomic
    /// rename, and runs under the same guard as `append`.
    ///
    /// # Errors
    ///
    /// Returns [`LanyardError::StoreIo`] when the rewrite fails; the
    /// original file is left in place in that case.
    pub fn truncate_to_tail(&self, n: usize) -> Result<()> {
        let _held = self.guard.lock().unwrap_or_else(PoisonError::into_inner);

        let records = self.read_all_locked()?;
        if records.len() <= n {
            return Ok(());
        }

        let tail = &records[records.len() - n..];
        let mut content = String::new();
        for record in tail {
            let line = serde_json::to_string(record)
                .map_err(|e| self.io_error(std::io::Error::new(ErrorKind::InvalidData, e)))?;
            content.push_str(&line);
            content.push('\n');
        }

        let tmp = self.tmp_path();
        fs::write(&tmp, content).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn read_all_locked(&self) -> Result<Vec<AttendanceRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| self.io_error(e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<AttendanceRecord>(trimmed) {
                Ok(record) if record.is_well_formed() => records.push(record),
                Ok(_) => {
                    tracing::warn!(path = %self.path.display(), "skipping record with empty required fields");
                }
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), %err, "skipping malformed record line");
                }
            }
        }
        Ok(records)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }

    fn io_error(&self, source: std::io::Error) -> LanyardError {
        LanyardError::StoreIo {
            path: self.path.clone(),
            source,
        }
    }
}
