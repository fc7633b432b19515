//! Atomic upload protocol: a destination is either absent or fully written.
//!
//! The transfer writes to a uniquely-named temporary sibling of the
//! destination; only a completed write promotes it with one atomic rename.
//! Same-directory placement keeps the promotion a same-filesystem rename --
//! a cross-directory copy would not be atomic and is never used.
//!
//! Cleanup is a drop guard, not a check after the fact, so the temporary
//! artifact is removed on every non-promoted exit path including panics.

use std::path::{Path, PathBuf};

use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::StoreError;

/// The two path operations the protocol needs from a backend.
pub trait AtomicTarget {
    /// Atomically rename `from` onto `to`, replacing any existing object.
    fn promote(&self, from: &Path, to: &Path) -> Result<(), StoreError>;

    /// Remove a temporary artifact. Must succeed silently if absent.
    fn discard(&self, path: &Path) -> Result<(), StoreError>;
}

/// Run `write` against a temporary sibling of `dest` and promote the result.
///
/// On any failure the temporary path is discarded, `dest` is left exactly as
/// it was, and the original error propagates wrapped with the destination
/// path. Returns the byte count reported by `write`.
pub fn upload_atomic<T, F>(target: &T, dest: &Path, write: F) -> Result<u64, StoreError>
where
    T: AtomicTarget + ?Sized,
    F: FnOnce(&Path) -> Result<u64, StoreError>,
{
    let tmp = temp_sibling(dest);
    tracing::debug!("Uploading to {} via {}", dest.display(), tmp.display());

    let mut guard = TempGuard {
        target,
        path: &tmp,
        armed: true,
    };

    let bytes = write(&tmp).map_err(|e| StoreError::transfer(dest, e))?;
    target
        .promote(&tmp, dest)
        .map_err(|e| StoreError::transfer(dest, e))?;
    guard.armed = false;

    Ok(bytes)
}

/// A temporary path in the same parent directory as `dest`, with a
/// randomized suffix so concurrent writers never collide.
pub fn temp_sibling(dest: &Path) -> PathBuf {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let tmp_name = format!(".{}.{}.tmp", name, suffix);
    match dest.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}

struct TempGuard<'a, T: AtomicTarget + ?Sized> {
    target: &'a T,
    path: &'a Path,
    armed: bool,
}

impl<T: AtomicTarget + ?Sized> Drop for TempGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.target.discard(self.path) {
                tracing::debug!("Could not remove temp file {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records promote/discard calls instead of touching a filesystem.
    #[derive(Default)]
    struct RecordingTarget {
        promoted: RefCell<Vec<(PathBuf, PathBuf)>>,
        discarded: RefCell<Vec<PathBuf>>,
    }

    impl AtomicTarget for RecordingTarget {
        fn promote(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
            self.promoted
                .borrow_mut()
                .push((from.to_path_buf(), to.to_path_buf()));
            Ok(())
        }

        fn discard(&self, path: &Path) -> Result<(), StoreError> {
            self.discarded.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn successful_write_promotes_and_skips_discard() {
        let target = RecordingTarget::default();
        let dest = Path::new("/data/obj");

        let bytes = upload_atomic(&target, dest, |tmp| {
            assert_eq!(tmp.parent(), dest.parent());
            assert_ne!(tmp, dest);
            Ok(42)
        })
        .unwrap();

        assert_eq!(bytes, 42);
        assert_eq!(target.promoted.borrow().len(), 1);
        assert_eq!(target.promoted.borrow()[0].1, dest);
        assert!(target.discarded.borrow().is_empty());
    }

    #[test]
    fn failed_write_discards_temp_and_reports_destination() {
        let target = RecordingTarget::default();
        let dest = Path::new("/data/obj");

        let err = upload_atomic(&target, dest, |_tmp| {
            Err(StoreError::Io {
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "mid-transfer"),
            })
        })
        .unwrap_err();

        assert!(target.promoted.borrow().is_empty());
        assert_eq!(target.discarded.borrow().len(), 1);
        let msg = format!("{}", err);
        assert!(msg.contains("/data/obj"));
        assert!(msg.contains("mid-transfer"));
    }

    #[test]
    fn panicking_write_still_discards_temp() {
        let target = RecordingTarget::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = upload_atomic(&target, Path::new("/data/obj"), |_tmp| {
                panic!("interrupted");
            });
        }));
        assert!(result.is_err());
        assert_eq!(target.discarded.borrow().len(), 1);
        assert!(target.promoted.borrow().is_empty());
    }

    #[test]
    fn failed_promote_discards_temp() {
        struct FailingPromote;
        impl AtomicTarget for FailingPromote {
            fn promote(&self, _: &Path, _: &Path) -> Result<(), StoreError> {
                Err(StoreError::Io {
                    source: std::io::Error::new(std::io::ErrorKind::Other, "rename failed"),
                })
            }
            fn discard(&self, _: &Path) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let err = upload_atomic(&FailingPromote, Path::new("/d/o"), |_| Ok(1)).unwrap_err();
        assert!(format!("{}", err).contains("rename failed"));
    }

    #[test]
    fn temp_sibling_shares_parent_and_differs_per_call() {
        let dest = Path::new("/data/deep/obj.bin");
        let a = temp_sibling(dest);
        let b = temp_sibling(dest);
        assert_eq!(a.parent(), Some(Path::new("/data/deep")));
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".obj.bin."));
        assert!(name.ends_with(".tmp"));
    }

    #[test]
    fn temp_sibling_of_relative_file() {
        let tmp = temp_sibling(Path::new("obj"));
        assert!(tmp.to_string_lossy().starts_with(".obj."));
    }
}
