//! Two-Tier Shader Cache
//!
//! Content-addressed cache for compiled stage artifacts.
//!
//! # Tiers
//!
//! | Tier   | Keyed by                  | Holds                                |
//! |--------|---------------------------|--------------------------------------|
//! | Memory | [`CacheKey`]              | shared futures of wrapped shaders    |
//! | Disk   | `<cacheDir>/<key>.cache`  | serialized per-stage artifacts (§ format below) |
//!
//! The memory tier is the single-flight point: `find_or_register` performs
//! the check-then-insert pair under one mutex, so at most one compile is
//! ever in flight per key and every other concurrent caller receives the
//! same future to wait on. The mutex guards the map structure only, never
//! I/O and never compilation. Published futures are read without the lock.
//!
//! # Disk format
//!
//! Host byte order (the cache is machine-local, not portable):
//!
//! ```text
//! u32 stage_count
//! repeat stage_count:
//!   u32 stage_id
//!   u32 entry_point_len
//!   byte[entry_point_len] entry_point_utf8
//!   u32 code_size_bytes            // multiple of 4
//!   byte[code_size_bytes] bytecode // 32-bit words
//! ```
//!
//! The reader is fail-closed: every declared length is bound-checked against
//! the remaining buffer before copying, and any violation aborts parsing and
//! discards everything read so far.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::{Result, ShaderError};
use crate::io::ShaderFs;
use crate::utils::Promise;

use super::artifact::{CompiledStageArtifact, ShaderCacheData, StageArtifacts};
use super::request::{CacheKey, CompileRequest};
use super::stage::ShaderStage;

/// What a resolved shader future carries: the shared stage map, or the
/// failure of the thread that held the compile slot.
pub type CompileOutcome = std::result::Result<Arc<ShaderCacheData>, Arc<ShaderError>>;

/// Shared future for one cache key.
pub type ShaderFuture = Promise<CompileOutcome>;

/// Result of the atomic memory-tier lookup.
pub enum MemoryEntry {
    /// Another caller already registered this key; wait on its future.
    Found(ShaderFuture),
    /// This caller owns the compile slot and must resolve the future.
    Registered(ShaderFuture),
}

/// Two-tier shader cache. One instance per [`ShaderLoader`].
///
/// [`ShaderLoader`]: super::loader::ShaderLoader
pub struct ShaderCache {
    fs: Arc<dyn ShaderFs>,
    cache_dir: PathBuf,
    memory: Mutex<FxHashMap<CacheKey, ShaderFuture>>,
    /// Serializes artifact writes; never held around compilation or reads.
    write_lock: Mutex<()>,
}

impl ShaderCache {
    #[must_use]
    pub fn new(fs: Arc<dyn ShaderFs>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            cache_dir: cache_dir.into(),
            memory: Mutex::new(FxHashMap::default()),
            write_lock: Mutex::new(()),
        }
    }

    #[inline]
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    // ── Disk Tier ────────────────────────────────────────────────────────────

    /// Computes the deterministic cache path for `request` and whether an
    /// entry currently exists there.
    #[must_use]
    pub fn disk_entry(&self, request: &CompileRequest) -> (bool, PathBuf) {
        let path = self.cache_dir.join(format!("{}.cache", request.cache_key()));
        (self.fs.exists(&path), path)
    }

    /// Deserializes a cache file. Fail-closed: corruption yields an error
    /// and no partial map.
    pub fn read_disk(&self, path: &Path) -> Result<StageArtifacts> {
        let bytes = self.fs.read_bytes(path)?;
        deserialize_artifacts(&bytes).map_err(|reason| ShaderError::CorruptCache {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Serializes `artifacts` to `path`, creating the cache directory on
    /// first use. Writes are serialized on a dedicated lock.
    pub fn write_disk(&self, path: &Path, artifacts: &StageArtifacts) -> Result<()> {
        let bytes = serialize_artifacts(artifacts);
        let _guard = self.write_lock.lock();
        self.fs.create_dir_all(&self.cache_dir)?;
        self.fs.write_bytes(path, &bytes)
    }

    // ── Memory Tier ──────────────────────────────────────────────────────────

    /// Returns the in-flight-or-completed future for `key`, if any.
    #[must_use]
    pub fn find(&self, key: CacheKey) -> Option<ShaderFuture> {
        self.memory.lock().get(&key).cloned()
    }

    /// Atomic check-then-insert: returns the existing future for `key`, or
    /// registers a fresh unresolved one and hands the caller the compile
    /// slot. This closes the single-flight window; the registration is
    /// observed by every later lookup for the same key.
    #[must_use]
    pub fn find_or_register(&self, key: CacheKey) -> MemoryEntry {
        let mut memory = self.memory.lock();
        if let Some(existing) = memory.get(&key) {
            return MemoryEntry::Found(existing.clone());
        }
        let future = ShaderFuture::new();
        memory.insert(key, future.clone());
        MemoryEntry::Registered(future)
    }

    /// Registers a future under `key`, replacing any previous entry.
    pub fn insert(&self, key: CacheKey, future: ShaderFuture) {
        self.memory.lock().insert(key, future);
    }

    /// Evicts `key`, returning whether it was present. Used after a failed
    /// compile so later calls retry instead of observing the stale error.
    pub fn remove(&self, key: CacheKey) -> bool {
        self.memory.lock().remove(&key).is_some()
    }

    /// Number of registered keys (in-flight and completed).
    #[must_use]
    pub fn len(&self) -> usize {
        self.memory.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memory.lock().is_empty()
    }

    /// Drops every memory-tier entry. Disk entries are untouched.
    pub fn clear_memory(&self) {
        let drained = {
            let mut memory = self.memory.lock();
            std::mem::take(&mut *memory)
        };
        drop(drained);
    }
}

// ─── Binary Codec ─────────────────────────────────────────────────────────────

fn serialize_artifacts(artifacts: &StageArtifacts) -> Vec<u8> {
    let payload: usize = artifacts
        .values()
        .map(|a| 12 + a.entry_point.len() + a.code_size_bytes())
        .sum();
    let mut out = Vec::with_capacity(4 + payload);

    // Stable stage order keeps byte-identical files for identical content.
    let mut stages: Vec<(&ShaderStage, &CompiledStageArtifact)> = artifacts.iter().collect();
    stages.sort_by_key(|(stage, _)| stage.id());

    out.extend_from_slice(&(stages.len() as u32).to_ne_bytes());
    for (stage, artifact) in stages {
        out.extend_from_slice(&stage.id().to_ne_bytes());
        out.extend_from_slice(&(artifact.entry_point.len() as u32).to_ne_bytes());
        out.extend_from_slice(artifact.entry_point.as_bytes());
        out.extend_from_slice(&(artifact.code_size_bytes() as u32).to_ne_bytes());
        for word in &artifact.words {
            out.extend_from_slice(&word.to_ne_bytes());
        }
    }
    out
}

fn deserialize_artifacts(bytes: &[u8]) -> std::result::Result<StageArtifacts, String> {
    let mut reader = Reader { buf: bytes, pos: 0 };

    let stage_count = reader.u32().ok_or("truncated stage count")?;
    let mut artifacts = StageArtifacts::default();

    for index in 0..stage_count {
        let stage_id = reader
            .u32()
            .ok_or_else(|| format!("truncated stage id (record {index})"))?;
        let stage = ShaderStage::from_id(stage_id)
            .ok_or_else(|| format!("unknown stage id {stage_id} (record {index})"))?;

        let entry_len = reader
            .u32()
            .ok_or_else(|| format!("truncated entry point length (record {index})"))?;
        let entry_bytes = reader
            .bytes(entry_len as usize)
            .ok_or_else(|| format!("entry point overruns buffer (record {index})"))?;
        let entry_point = std::str::from_utf8(entry_bytes)
            .map_err(|_| format!("entry point is not UTF-8 (record {index})"))?
            .to_string();

        let code_size = reader
            .u32()
            .ok_or_else(|| format!("truncated code size (record {index})"))?;
        if code_size % 4 != 0 {
            return Err(format!(
                "code size {code_size} is not a multiple of 4 (record {index})"
            ));
        }
        let code_bytes = reader
            .bytes(code_size as usize)
            .ok_or_else(|| format!("bytecode overruns buffer (record {index})"))?;
        let words: Vec<u32> = code_bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        if artifacts
            .insert(stage, CompiledStageArtifact::new(entry_point, words))
            .is_some()
        {
            return Err(format!("duplicate stage {stage} (record {index})"));
        }
    }

    if reader.pos != bytes.len() {
        return Err(format!(
            "{} trailing bytes after last record",
            bytes.len() - reader.pos
        ));
    }
    Ok(artifacts)
}

/// Bounds-checked cursor over a cache file buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn u32(&mut self) -> Option<u32> {
        let bytes = self.bytes(4)?;
        Some(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn bytes(&mut self, len: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(len)?;
        if end > self.buf.len() {
            return None;
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Some(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StageArtifacts {
        let mut artifacts = StageArtifacts::default();
        artifacts.insert(
            ShaderStage::Vertex,
            CompiledStageArtifact::new("vs_main", vec![0x0723_0203, 42, 7]),
        );
        artifacts.insert(
            ShaderStage::Fragment,
            CompiledStageArtifact::new("fs_main", vec![0x0723_0203, 9]),
        );
        artifacts
    }

    #[test]
    fn round_trip_preserves_entries_and_bytecode() {
        let original = sample();
        let bytes = serialize_artifacts(&original);
        let decoded = deserialize_artifacts(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn serialization_is_deterministic() {
        assert_eq!(serialize_artifacts(&sample()), serialize_artifacts(&sample()));
    }

    #[test]
    fn truncation_anywhere_fails_closed() {
        let bytes = serialize_artifacts(&sample());
        for len in 0..bytes.len() {
            assert!(
                deserialize_artifacts(&bytes[..len]).is_err(),
                "truncation at {len} of {} must fail",
                bytes.len()
            );
        }
    }

    #[test]
    fn unknown_stage_id_is_rejected() {
        let mut artifacts = StageArtifacts::default();
        artifacts.insert(
            ShaderStage::Compute,
            CompiledStageArtifact::new("main", vec![1]),
        );
        let mut bytes = serialize_artifacts(&artifacts);
        // stage_count(4) .. stage_id(4)
        bytes[4..8].copy_from_slice(&99u32.to_ne_bytes());
        assert!(deserialize_artifacts(&bytes).is_err());
    }

    #[test]
    fn misaligned_code_size_is_rejected() {
        let mut artifacts = StageArtifacts::default();
        artifacts.insert(
            ShaderStage::Compute,
            CompiledStageArtifact::new("main", vec![1]),
        );
        let mut bytes = serialize_artifacts(&artifacts);
        // stage_count(4) + stage_id(4) + entry_len(4) + "main"(4) .. code_size(4)
        let at = 4 + 4 + 4 + 4;
        bytes[at..at + 4].copy_from_slice(&3u32.to_ne_bytes());
        assert!(deserialize_artifacts(&bytes).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = serialize_artifacts(&sample());
        bytes.push(0);
        assert!(deserialize_artifacts(&bytes).is_err());
    }
}
