//! Crash-safe file replacement.
//!
//! Content goes to a uniquely named sibling temp file which is fsynced and
//! then renamed over the target. A crash at any point leaves either the old
//! file or the new one, never a truncated mix.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Error as IoError, ErrorKind, Result as IoResult, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

const TEMP_MARKER: &str = ".tmp.";

fn temp_prefix(final_path: &Path) -> IoResult<OsString> {
    let name = final_path.file_name().ok_or_else(|| {
        IoError::new(
            ErrorKind::InvalidInput,
            format!("path has no file name: {}", final_path.display()),
        )
    })?;
    let mut prefix = name.to_os_string();
    prefix.push(TEMP_MARKER);
    Ok(prefix)
}

/// Writes a file atomically via temp-file-then-rename.
pub struct AtomicFileWriter {
    temp_path: Option<PathBuf>,
    final_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl AtomicFileWriter {
    /// Open a temp file next to `final_path`.
    pub fn create(final_path: &Path) -> IoResult<Self> {
        let mut temp_name = temp_prefix(final_path)?;
        temp_name.push(Uuid::new_v4().simple().to_string());
        let temp_path = final_path.with_file_name(temp_name);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;

        Ok(Self {
            temp_path: Some(temp_path),
            final_path: final_path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Append bytes to the pending file.
    pub fn write_all(&mut self, bytes: &[u8]) -> IoResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| IoError::new(ErrorKind::Other, "writer already consumed"))?;
        writer.write_all(bytes)
    }

    /// Flush, fsync and rename over the target.
    ///
    /// This is the commit point.
    pub fn finalize(mut self) -> IoResult<()> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| IoError::new(ErrorKind::Other, "writer already consumed"))?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        let temp_path = self
            .temp_path
            .take()
            .ok_or_else(|| IoError::new(ErrorKind::Other, "temp_path already consumed"))?;
        if let Err(e) = fs::rename(&temp_path, &self.final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }
}

impl Drop for AtomicFileWriter {
    fn drop(&mut self) {
        // Not finalized: discard the partial file.
        self.writer.take();
        if let Some(ref temp_path) = self.temp_path {
            let _ = fs::remove_file(temp_path);
        }
    }
}

/// Remove temp files left behind by writers that never finished.
///
/// Returns how many were removed. Errors on individual entries are skipped.
pub fn sweep_stale_temp_files(final_path: &Path) -> IoResult<usize> {
    let prefix = temp_prefix(final_path)?;
    let prefix = prefix.to_string_lossy();
    let dir = match final_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(&*prefix) && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}
