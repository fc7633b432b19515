pub mod local;
pub mod locator;
pub mod ssh;

use std::io::Read;
use std::path::Path;

use crate::error::StoreError;
use crate::transfer::atomic::AtomicTarget;

/// Metadata about a file or directory.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    pub modified: Option<std::time::SystemTime>,
    pub permissions: Option<u32>,
}

/// Entry in a directory listing.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: std::path::PathBuf,
    pub stat: FileStat,
}

/// Uniform surface over a file store.
///
/// `write_file` is the raw, non-atomic write path; callers outside this
/// trait's implementations should reach objects through `upload` or
/// `put_file`, which route every write through the atomic protocol so the
/// destination is never observable half-written.
pub trait ObjectStore: AtomicTarget + Send + Sync {
    /// Get file/directory metadata.
    fn stat(&self, path: &Path) -> Result<FileStat, StoreError>;

    /// Whether an object exists at `path`.
    fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List directory contents (non-recursive).
    fn list_dir(&self, path: &Path) -> Result<Vec<FileEntry>, StoreError>;

    /// Open a file for reading.
    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>, StoreError>;

    /// Create directory and parents as needed.
    fn create_dir_all(&self, path: &Path) -> Result<(), StoreError>;

    /// Remove a file; succeeds silently if it is already absent.
    fn remove_file(&self, path: &Path) -> Result<(), StoreError>;

    /// Write `reader` to `path`, replacing any existing content.
    /// Non-atomic; the upload entry points wrap this.
    fn write_file(&self, path: &Path, reader: &mut dyn Read) -> Result<u64, StoreError>;

    /// Atomically upload a stream to `dest`.
    fn upload(&self, reader: &mut dyn Read, dest: &Path) -> Result<u64, StoreError>;

    /// Atomically upload a local file to `dest`.
    fn put_file(&self, local: &Path, dest: &Path) -> Result<u64, StoreError>;
}
