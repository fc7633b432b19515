//! Local filesystem store using std::fs.
//!
//! Serves as the local side of CLI transfers and exercises the atomic
//! upload protocol against a real filesystem.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::StoreError;
use crate::store::{FileEntry, FileStat, ObjectStore};
use crate::transfer::atomic::{self, AtomicTarget};

/// Buffer size for BufReader/BufWriter: 256KB.
const BUF_SIZE: usize = 256 * 1024;

#[derive(Debug, Default)]
pub struct LocalStore;

impl LocalStore {
    pub fn new() -> Self {
        LocalStore
    }
}

/// Convert std::fs::Metadata to FileStat.
fn metadata_to_stat(meta: &std::fs::Metadata) -> FileStat {
    #[cfg(unix)]
    let permissions = {
        use std::os::unix::fs::PermissionsExt;
        Some(meta.permissions().mode())
    };
    #[cfg(not(unix))]
    let permissions = None;

    FileStat {
        size: meta.len(),
        is_dir: meta.is_dir(),
        is_file: meta.is_file(),
        modified: meta.modified().ok(),
        permissions,
    }
}

/// Map an io::Error to a StoreError, using the path for context.
fn map_io_error(err: io::Error, path: &Path) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound {
            path: path.to_path_buf(),
        },
        io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => StoreError::Io { source: err },
    }
}

impl AtomicTarget for LocalStore {
    fn promote(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
        std::fs::rename(from, to).map_err(|e| map_io_error(e, to))
    }

    fn discard(&self, path: &Path) -> Result<(), StoreError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io_error(e, path)),
        }
    }
}

impl ObjectStore for LocalStore {
    fn stat(&self, path: &Path) -> Result<FileStat, StoreError> {
        let meta = std::fs::metadata(path).map_err(|e| map_io_error(e, path))?;
        Ok(metadata_to_stat(&meta))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<FileEntry>, StoreError> {
        let read_dir = std::fs::read_dir(path).map_err(|e| map_io_error(e, path))?;

        let mut entries = Vec::new();
        for entry_result in read_dir {
            let entry = entry_result.map_err(|e| map_io_error(e, path))?;
            let meta = entry.metadata().map_err(|e| map_io_error(e, &entry.path()))?;
            entries.push(FileEntry {
                path: entry.path(),
                stat: metadata_to_stat(&meta),
            });
        }
        Ok(entries)
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>, StoreError> {
        let file = std::fs::File::open(path).map_err(|e| map_io_error(e, path))?;
        Ok(Box::new(BufReader::with_capacity(BUF_SIZE, file)))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StoreError> {
        std::fs::create_dir_all(path).map_err(|e| map_io_error(e, path))
    }

    fn remove_file(&self, path: &Path) -> Result<(), StoreError> {
        self.discard(path)
    }

    fn write_file(&self, path: &Path, reader: &mut dyn Read) -> Result<u64, StoreError> {
        let file = std::fs::File::create(path).map_err(|e| map_io_error(e, path))?;
        let mut writer = BufWriter::with_capacity(BUF_SIZE, file);
        let bytes = io::copy(reader, &mut writer)?;
        writer.flush()?;
        Ok(bytes)
    }

    fn upload(&self, reader: &mut dyn Read, dest: &Path) -> Result<u64, StoreError> {
        atomic::upload_atomic(self, dest, |tmp| self.write_file(tmp, reader))
    }

    fn put_file(&self, local: &Path, dest: &Path) -> Result<u64, StoreError> {
        let mut reader = self.open_read(local)?;
        self.upload(&mut *reader, dest)
    }
}
