//! SSH-backed object store using the ssh2 crate (libssh2 bindings).
//!
//! One store instance holds one lazily-established SSH session plus an SFTP
//! channel; the first operation to need the connection builds it under a
//! lock, so concurrent first-use produces exactly one session. All uploads
//! route through the atomic temp-then-rename protocol.
//!
//! # Thread safety
//!
//! libssh2 is **not** thread-safe: `ssh2::Session` and `ssh2::Sftp` must
//! never be touched concurrently from multiple threads. The connection
//! state lives in a `Mutex<Option<SshInner>>`; every operation acquires the
//! lock for the duration of its libssh2 calls and releases it on return.

use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, UNIX_EPOCH};

use ssh2::{ErrorCode, OpenFlags, OpenType, RenameFlags, Session, Sftp};

use crate::config::params::ConnectionParameters;
use crate::error::StoreError;
use crate::session::factory;
use crate::store::{FileEntry, FileStat, ObjectStore};
use crate::transfer::atomic::{self, AtomicTarget};

/// Buffer size for local reads feeding an upload: 256KB.
const BUF_SIZE: usize = 256 * 1024;

/// Connection state owning the libssh2 handles.
///
/// `Session` and `Sftp` are stored together so one `Mutex` covers all
/// libssh2 calls; `Sftp` internally borrows resources from `Session`, so
/// splitting them across locks would be unsound.
struct SshInner {
    /// Must outlive `sftp`.
    #[allow(dead_code)]
    session: Session,
    sftp: Sftp,
}

// SAFETY: `Session` and `Sftp` wrap raw pointers into libssh2's session
// struct and are `!Send` by default. `SshInner` is only ever reached
// through `Mutex<Option<SshInner>>`, which guarantees at most one thread
// touches the pointers at any instant, and the pointers stay valid for the
// lifetime of the owning `Session` value. `Sync` is left to the `Mutex`.
unsafe impl Send for SshInner {}

/// SSH object store over a single shared session.
pub struct SshStore {
    params: ConnectionParameters,
    inner: Mutex<Option<SshInner>>,
}

impl SshStore {
    /// Create a store; no connection is made until first use.
    pub fn new(params: ConnectionParameters) -> Self {
        Self {
            params,
            inner: Mutex::new(None),
        }
    }

    /// The parameters this store was built with.
    pub fn params(&self) -> &ConnectionParameters {
        &self.params
    }

    /// Canonical locator for a remote path on this store.
    pub fn url_for(&self, path: &Path) -> String {
        crate::store::locator::format(&self.params.host, self.params.port, path)
    }

    /// Run `f` with the live connection, establishing it first if needed.
    fn with_inner<T>(
        &self,
        f: impl FnOnce(&SshInner) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.lock()?;

        if guard.is_none() {
            let session = factory::connect(&self.params)?;
            let sftp = session.sftp().map_err(|e| StoreError::Connection {
                host: self.params.host.clone(),
                port: self.params.port,
                reason: format!("failed to open SFTP channel: {}", e),
            })?;
            *guard = Some(SshInner { session, sftp });
        }

        match guard.as_ref() {
            Some(inner) => f(inner),
            None => Err(StoreError::Io {
                source: io::Error::other("SSH connection state lost after setup"),
            }),
        }
    }

    /// Acquire the connection mutex, surfacing a poisoned lock as an I/O
    /// error rather than propagating the panic.
    fn lock(&self) -> Result<MutexGuard<'_, Option<SshInner>>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Io {
            source: io::Error::other(
                "SSH connection mutex was poisoned; a previous operation panicked",
            ),
        })
    }
}

impl AtomicTarget for SshStore {
    fn promote(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            inner
                .sftp
                .rename(
                    from,
                    to,
                    Some(RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE),
                )
                .map_err(|e| sftp_err(e, to))
        })
    }

    fn discard(&self, path: &Path) -> Result<(), StoreError> {
        self.with_inner(|inner| match inner.sftp.unlink(path) {
            Ok(()) => Ok(()),
            Err(e) if not_found(&e) => Ok(()),
            Err(e) => Err(sftp_err(e, path)),
        })
    }
}

impl ObjectStore for SshStore {
    fn stat(&self, path: &Path) -> Result<FileStat, StoreError> {
        self.with_inner(|inner| {
            let stat = inner.sftp.stat(path).map_err(|e| sftp_err(e, path))?;
            Ok(stat_of(path, &stat).stat)
        })
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<FileEntry>, StoreError> {
        self.with_inner(|inner| {
            let entries = inner.sftp.readdir(path).map_err(|e| sftp_err(e, path))?;
            Ok(entries
                .into_iter()
                .filter(|(p, _)| {
                    let name = p.file_name();
                    name != Some(std::ffi::OsStr::new("."))
                        && name != Some(std::ffi::OsStr::new(".."))
                })
                .map(|(p, stat)| stat_of(&p, &stat))
                .collect())
        })
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>, StoreError> {
        // `ssh2::File` borrows from `Sftp` inside the mutex, so it cannot be
        // returned directly. The remote content is buffered while the lock
        // is held and handed back as a cursor.
        self.with_inner(|inner| {
            let mut file = inner
                .sftp
                .open_mode(path, OpenFlags::READ, 0o644, OpenType::File)
                .map_err(|e| sftp_err(e, path))?;

            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            Ok(Box::new(io::Cursor::new(buf)) as Box<dyn Read + Send>)
        })
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StoreError> {
        self.with_inner(|inner| {
            // SFTP mkdir creates one level at a time.
            let mut current = PathBuf::new();
            for component in path.components() {
                current.push(component);
                if current.as_os_str().is_empty() || current == Path::new("/") {
                    continue;
                }
                match inner.sftp.mkdir(&current, 0o755) {
                    Ok(()) => {}
                    Err(e) => {
                        // Tolerate "already exists" no matter how the server
                        // spells it: a stat that shows a directory wins.
                        if let Ok(stat) = inner.sftp.stat(&current) {
                            if stat.is_dir() {
                                continue;
                            }
                        }
                        return Err(sftp_err(e, &current));
                    }
                }
            }
            Ok(())
        })
    }

    fn remove_file(&self, path: &Path) -> Result<(), StoreError> {
        self.discard(path)
    }

    fn write_file(&self, path: &Path, reader: &mut dyn Read) -> Result<u64, StoreError> {
        self.with_inner(|inner| {
            let mut file = inner
                .sftp
                .open_mode(
                    path,
                    OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                    0o644,
                    OpenType::File,
                )
                .map_err(|e| sftp_err(e, path))?;

            let bytes = io::copy(reader, &mut file)?;
            Ok(bytes)
        })
    }

    fn upload(&self, reader: &mut dyn Read, dest: &Path) -> Result<u64, StoreError> {
        atomic::upload_atomic(self, dest, |tmp| self.write_file(tmp, reader))
    }

    fn put_file(&self, local: &Path, dest: &Path) -> Result<u64, StoreError> {
        let file = std::fs::File::open(local).map_err(|e| StoreError::Io { source: e })?;
        let mut reader = BufReader::with_capacity(BUF_SIZE, file);
        self.upload(&mut reader, dest)
    }
}

fn stat_of(path: &Path, stat: &ssh2::FileStat) -> FileEntry {
    FileEntry {
        path: path.to_path_buf(),
        stat: FileStat {
            size: stat.size.unwrap_or(0),
            is_dir: stat.is_dir(),
            is_file: !stat.is_dir(),
            modified: stat.mtime.map(|t| UNIX_EPOCH + Duration::from_secs(t)),
            permissions: stat.perm,
        },
    }
}

/// SFTP status code for "no such file".
const SFTP_NO_SUCH_FILE: i32 = 2;
/// SFTP status code for "permission denied".
const SFTP_PERMISSION_DENIED: i32 = 3;

fn not_found(e: &ssh2::Error) -> bool {
    matches!(e.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE))
}

fn sftp_err(e: ssh2::Error, path: &Path) -> StoreError {
    match e.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => StoreError::NotFound {
            path: path.to_path_buf(),
        },
        ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => StoreError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => {
            let io_err: io::Error = e.into();
            StoreError::Io { source: io_err }
        }
    }
}
