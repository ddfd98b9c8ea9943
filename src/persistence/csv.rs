//! CSV file sink
//!
//! Rows are escaped the way spreadsheet tools expect: a field containing a
//! comma, a double quote or a line break is wrapped in double quotes with
//! inner quotes doubled. Each row is flushed as soon as it is written so a
//! crashed run still leaves every completed row on disk.

use super::{PersistenceMechanism, Value};
use crate::error::PersistenceError;
use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Thread-safe CSV writer
pub struct CsvFile {
    path: PathBuf,
    header: Option<Vec<String>>,
    out: Mutex<Option<BufWriter<File>>>,
}

impl CsvFile {
    /// Create (truncating) `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        Self::open(path.as_ref(), None, false)
    }

    /// Append to `path`, creating it if needed
    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        Self::open(path.as_ref(), None, true)
    }

    /// Create `path` and write `header` as its first row
    ///
    /// Every later row must have exactly as many columns as the header.
    pub fn with_header<P: AsRef<Path>>(path: P, header: &[&str]) -> Result<Self, PersistenceError> {
        let header = header.iter().map(|h| h.to_string()).collect();
        Self::open(path.as_ref(), Some(header), false)
    }

    /// Create `name` inside `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P, name: &str) -> Result<Self, PersistenceError> {
        Self::create(dir.as_ref().join(name))
    }

    fn open(
        path: &Path,
        header: Option<Vec<String>>,
        append: bool,
    ) -> Result<Self, PersistenceError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .map_err(|e| PersistenceError::OpenFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut out = BufWriter::new(file);
        if let Some(header) = &header {
            write_row(&mut out, header.iter().map(|h| escape(h)))?;
        }

        tracing::debug!("Opened CSV output at: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            header,
            out: Mutex::new(Some(out)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }
}

impl PersistenceMechanism for CsvFile {
    fn write(&self, row: &[Value]) -> Result<(), PersistenceError> {
        if let Some(header) = &self.header
            && header.len() != row.len()
        {
            return Err(PersistenceError::ColumnMismatch {
                expected: header.len(),
                actual: row.len(),
            });
        }

        let mut guard = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let out = guard.as_mut().ok_or(PersistenceError::Closed)?;
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        write_row(out, cells.iter().map(|c| escape(c)))
    }

    fn close(&self) -> Result<(), PersistenceError> {
        let mut guard = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut out) = guard.take() {
            out.flush()?;
            tracing::debug!("Closed CSV output at: {}", self.path.display());
        }
        Ok(())
    }
}

impl Drop for CsvFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

fn write_row<'a>(
    out: &mut BufWriter<File>,
    cells: impl Iterator<Item = Cow<'a, str>>,
) -> Result<(), PersistenceError> {
    let line = cells.collect::<Vec<_>>().join(",");
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Quote a field if it contains a separator, quote or line break
pub fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
