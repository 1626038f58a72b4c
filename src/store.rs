//! Output storage.
//!
//! The pipeline writes through the minimal [`Store`] capability: create a
//! directory, write a file, remove a file. [`FsStore`] is the real
//! filesystem. Tests use the in-memory `MemoryStore` from this module's
//! test half.
//!
//! `FsStore` writes are atomic per file: the bytes go to a temporary file
//! in the target directory which is then renamed over the final path, so a
//! failed write never leaves a truncated artifact behind.

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("creating directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("removing {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait Store {
    /// Create `path` and its parents. Returns whether anything was created.
    fn ensure_dir(&self, path: &Path) -> Result<bool, StoreError>;

    /// Replace the contents of `path`. Returns the number of bytes written.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<usize, StoreError>;

    /// Remove `path`. A missing file is not an error.
    fn remove_file(&self, path: &Path) -> Result<(), StoreError>;
}

/// The local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl Store for FsStore {
    fn ensure_dir(&self, path: &Path) -> Result<bool, StoreError> {
        if path.is_dir() {
            return Ok(false);
        }
        std::fs::create_dir_all(path).map_err(|source| StoreError::CreateDir {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<usize, StoreError> {
        let write_err = |source: std::io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(bytes.len())
    }

    fn remove_file(&self, path: &Path) -> Result<(), StoreError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory store. Can be told to fail writes under a prefix, or removals.
    #[derive(Debug, Default)]
    pub struct MemoryStore {
        files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
        dirs: Mutex<BTreeSet<PathBuf>>,
        fail_under: Option<PathBuf>,
        fail_removes: bool,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every write below `prefix` fail with a permission error.
        pub fn failing_under(prefix: impl Into<PathBuf>) -> Self {
            Self {
                fail_under: Some(prefix.into()),
                ..Self::default()
            }
        }

        /// Make every removal fail.
        pub fn failing_removes() -> Self {
            Self {
                fail_removes: true,
                ..Self::default()
            }
        }

        pub fn get(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
            self.lock_files().get(path.as_ref()).cloned()
        }

        /// Contents as UTF-8 text, lossily.
        pub fn text(&self, path: impl AsRef<Path>) -> Option<String> {
            self.get(path)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        }

        /// All written paths, sorted.
        pub fn paths(&self) -> Vec<PathBuf> {
            self.lock_files().keys().cloned().collect()
        }

        pub fn has_dir(&self, path: impl AsRef<Path>) -> bool {
            self.dirs
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .contains(path.as_ref())
        }

        fn lock_files(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
            self.files.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    impl Store for MemoryStore {
        fn ensure_dir(&self, path: &Path) -> Result<bool, StoreError> {
            let mut dirs = self.dirs.lock().unwrap_or_else(|e| e.into_inner());
            let created = !dirs.contains(path);
            for ancestor in path.ancestors() {
                dirs.insert(ancestor.to_path_buf());
            }
            Ok(created)
        }

        fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<usize, StoreError> {
            if let Some(prefix) = &self.fail_under
                && path.starts_with(prefix)
            {
                return Err(StoreError::Write {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            self.lock_files().insert(path.to_path_buf(), bytes.to_vec());
            Ok(bytes.len())
        }

        fn remove_file(&self, path: &Path) -> Result<(), StoreError> {
            if self.fail_removes {
                return Err(StoreError::Remove {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            self.lock_files().remove(path);
            Ok(())
        }
    }

    // =========================================================================
    // FsStore
    // =========================================================================

    #[test]
    fn ensure_dir_reports_creation() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a/b/c");
        assert!(FsStore.ensure_dir(&dir).unwrap());
        assert!(!FsStore.ensure_dir(&dir).unwrap());
        assert!(dir.is_dir());
    }

    #[test]
    fn write_replaces_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.md");
        assert_eq!(FsStore.write_file(&path, b"first version").unwrap(), 13);
        assert_eq!(FsStore.write_file(&path, b"second").unwrap(), 6);
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        FsStore.write_file(&tmp.path().join("x.md"), b"x").unwrap();
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("x.md")]);
    }

    #[test]
    fn write_into_missing_dir_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = FsStore
            .write_file(&tmp.path().join("missing/x.md"), b"x")
            .unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let tmp = TempDir::new().unwrap();
        FsStore.remove_file(&tmp.path().join("nope.md")).unwrap();
    }

    #[test]
    fn remove_deletes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.md");
        fs::write(&path, "x").unwrap();
        FsStore.remove_file(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.ensure_dir(Path::new("out/posts")).unwrap());
        assert!(!store.ensure_dir(Path::new("out/posts")).unwrap());
        assert!(store.has_dir("out"));

        store.write_file(Path::new("out/posts/a.md"), b"a").unwrap();
        assert_eq!(store.text("out/posts/a.md").as_deref(), Some("a"));
        store.remove_file(Path::new("out/posts/a.md")).unwrap();
        assert!(store.paths().is_empty());
    }

    #[test]
    fn memory_store_injected_failure() {
        let store = MemoryStore::failing_under("out/locked");
        assert!(store.write_file(Path::new("out/ok.md"), b"x").is_ok());
        assert!(store.write_file(Path::new("out/locked/x.md"), b"x").is_err());
    }
}
