//! Filesystem Provider
//!
//! The engine's path-resolution layer is consumed here only as a path
//! resolver plus byte I/O. It is abstracted as the [`ShaderFs`] trait so the
//! loader, cache, and compiler receive it by injection and tests can run
//! against an in-memory fake instead of real disk.
//!
//! Two implementations are provided:
//!
//! | Type         | Use case                                   |
//! |--------------|--------------------------------------------|
//! | [`DiskFs`]   | Production: sources and cache on real disk |
//! | [`MemoryFs`] | Tests: everything in a process-local map   |

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::errors::Result;

/// Path resolution and byte I/O consumed by the shader build subsystem.
pub trait ShaderFs: Send + Sync {
    /// Resolves a logical source path to a concrete one, or `None` if the
    /// source does not exist.
    fn resolve_path(&self, logical: &str) -> Option<PathBuf>;

    /// Returns whether `path` currently exists.
    fn exists(&self, path: &Path) -> bool;

    /// Creates `path` and all missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Reads a UTF-8 text file.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Reads a binary file.
    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;

    /// Writes a binary file, replacing any previous content.
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

// ─── DiskFs ───────────────────────────────────────────────────────────────────

/// Real-filesystem provider rooted at the engine's shader source directory.
pub struct DiskFs {
    root: PathBuf,
}

impl DiskFs {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ShaderFs for DiskFs {
    fn resolve_path(&self, logical: &str) -> Option<PathBuf> {
        let candidate = self.root.join(logical);
        candidate.is_file().then_some(candidate)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

// ─── MemoryFs ─────────────────────────────────────────────────────────────────

/// In-memory provider for tests. Paths are stored verbatim; directories are
/// implicit.
#[derive(Default)]
pub struct MemoryFs {
    files: RwLock<FxHashMap<PathBuf, Vec<u8>>>,
}

impl MemoryFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a UTF-8 source under its logical path.
    pub fn insert_text(&self, logical: &str, text: &str) {
        self.files
            .write()
            .insert(PathBuf::from(logical), text.as_bytes().to_vec());
    }

    /// Registers a binary file.
    pub fn insert_bytes(&self, logical: &str, bytes: Vec<u8>) {
        self.files.write().insert(PathBuf::from(logical), bytes);
    }

    /// Removes a file, returning whether it was present.
    pub fn remove(&self, logical: &str) -> bool {
        self.files.write().remove(Path::new(logical)).is_some()
    }

    /// Number of stored files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }
}

impl ShaderFs for MemoryFs {
    fn resolve_path(&self, logical: &str) -> Option<PathBuf> {
        let path = PathBuf::from(logical);
        self.files.read().contains_key(&path).then_some(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    fn create_dir_all(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "file is not UTF-8").into()
        })
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.files.read().get(path).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
            .into()
        })
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.files.write().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}
