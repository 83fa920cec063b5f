//! Installing finished documents on disk
//!
//! A reader must never observe a truncated PDF at the destination path. Both
//! helpers here write into a temporary file next to the destination and
//! rename it into place only once every byte is on disk.

use crate::error::Result;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

fn staging_dir(destination: &Path) -> &Path {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Atomically write `bytes` to `destination`.
///
/// On failure nothing is left behind: the staging file is removed and an
/// existing file at `destination` is untouched.
pub fn persist_bytes(bytes: &[u8], destination: impl AsRef<Path>) -> Result<()> {
    let destination = destination.as_ref();
    let mut staged = NamedTempFile::new_in(staging_dir(destination))?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(destination).map_err(|e| e.error)?;
    debug!(path = %destination.display(), bytes = bytes.len(), "installed PDF");
    Ok(())
}

/// A file sink for the streaming writer variant.
///
/// Bytes go to a hidden temporary file in the destination directory.
/// [`commit`](Self::commit) renames it into place; dropping a `StagedFile`
/// without committing deletes the temporary file.
pub struct StagedFile {
    file: BufWriter<NamedTempFile>,
    destination: PathBuf,
}

impl StagedFile {
    pub fn create(destination: impl Into<PathBuf>) -> Result<Self> {
        let destination = destination.into();
        let file = NamedTempFile::new_in(staging_dir(&destination))?;
        Ok(Self {
            file: BufWriter::new(file),
            destination,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Path of the temporary file currently receiving bytes
    pub fn staging_path(&self) -> &Path {
        self.file.get_ref().path()
    }

    /// Flush, sync and move the file to its destination
    pub fn commit(self) -> Result<PathBuf> {
        let Self { file, destination } = self;
        let staged = file.into_inner().map_err(|e| e.into_error())?;
        staged.as_file().sync_all()?;
        staged.persist(&destination).map_err(|e| e.error)?;
        debug!(path = %destination.display(), "committed staged PDF");
        Ok(destination)
    }

    /// Drop the staged bytes explicitly
    pub fn discard(self) -> Result<()> {
        let Self { file, .. } = self;
        match file.into_inner() {
            Ok(staged) => staged.close()?,
            Err(e) => {
                let (_, staged) = e.into_parts();
                drop(staged);
            }
        }
        Ok(())
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Remove a partially written file, ignoring a file that does not exist
pub fn remove_partial(path: impl AsRef<Path>) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_persist_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.pdf");
        persist_bytes(b"%PDF-1.7\n%%EOF\n", &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7\n%%EOF\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_persist_into_missing_directory_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.pdf");
        assert!(persist_bytes(b"data", &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_staged_file_commit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.pdf");

        let mut staged = StagedFile::create(&path).unwrap();
        staged.write_all(b"hello").unwrap();
        assert!(!path.exists());
        assert!(staged.staging_path().starts_with(dir.path()));
        assert_eq!(staged.destination(), path.as_path());

        let installed = staged.commit().unwrap();
        assert_eq!(installed, path);
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_staged_file_dropped_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.pdf");
        {
            let mut staged = StagedFile::create(&path).unwrap();
            staged.write_all(b"partial").unwrap();
        }
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        let staged = StagedFile::create(&path).unwrap();
        staged.discard().unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_remove_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("half.pdf");
        fs::write(&path, b"%PDF-").unwrap();
        remove_partial(&path).unwrap();
        assert!(!path.exists());
        remove_partial(&path).unwrap();
    }
}
