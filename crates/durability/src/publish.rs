//! Crash-safe publication of finished files.
//!
//! Published files are written to `<target>.tmp`, fsynced, and renamed over
//! the target. Readers therefore see either the previous file or the
//! complete new one, never a partial write. An [`AtomicFile`] dropped
//! without [`AtomicFile::commit`] removes its temporary file and leaves the
//! target untouched.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Temporary-path companion of `target`.
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was actually removed.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Buffered writer that publishes its target atomically on commit.
pub struct AtomicFile {
    writer: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    target: PathBuf,
}

impl AtomicFile {
    /// Start writing a replacement for `target`.
    pub fn create(target: &Path) -> io::Result<Self> {
        let dir = target.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;
        let tmp_path = temp_path(target);
        let file = File::create(&tmp_path)?;
        Ok(AtomicFile {
            writer: Some(BufWriter::new(file)),
            tmp_path,
            target: target.to_path_buf(),
        })
    }

    /// Path being written to until commit.
    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Flush, fsync and rename into place.
    pub fn commit(mut self) -> io::Result<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "atomic file already closed"))?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&self.tmp_path, &self.target)?;
        sync_parent_dir(&self.target)?;
        Ok(())
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "atomic file already closed"))
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            // Not committed
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
