//! Shader Cache Tests
//!
//! Tests for:
//! - Disk tier: deterministic `<key>.cache` paths, write/read round trip
//!   through the injected filesystem, fail-closed handling of corrupt files
//! - Memory tier: find/register/remove bookkeeping and the single-flight
//!   check-then-insert contract

use std::sync::Arc;

use rustc_hash::FxHashMap;

use vesper_shaders::shader::cache::{MemoryEntry, ShaderCache};
use vesper_shaders::{
    CompileRequest, CompiledStageArtifact, MemoryFs, ShaderError, ShaderFs, ShaderStage,
};

fn cache_over(fs: &Arc<MemoryFs>) -> ShaderCache {
    ShaderCache::new(Arc::clone(fs) as Arc<dyn ShaderFs>, "cache")
}

fn sample_artifacts() -> FxHashMap<ShaderStage, CompiledStageArtifact> {
    let mut artifacts = FxHashMap::default();
    artifacts.insert(
        ShaderStage::Vertex,
        CompiledStageArtifact::new("vs_main", vec![0x0723_0203, 1, 2, 3]),
    );
    artifacts.insert(
        ShaderStage::Fragment,
        CompiledStageArtifact::new("fs_main", vec![0x0723_0203, 4, 5]),
    );
    artifacts
}

// ============================================================================
// Disk Tier
// ============================================================================

#[test]
fn disk_entry_uses_the_cache_key_as_file_stem() {
    let fs = Arc::new(MemoryFs::new());
    let cache = cache_over(&fs);
    let request = CompileRequest::new("pbr.wgsl", "fn f() {}");

    let (exists, path) = cache.disk_entry(&request);
    assert!(!exists);
    assert_eq!(
        path,
        std::path::Path::new("cache").join(format!("{}.cache", request.cache_key()))
    );
}

#[test]
fn write_then_read_round_trips_through_the_fs() {
    let fs = Arc::new(MemoryFs::new());
    let cache = cache_over(&fs);
    let request = CompileRequest::new("pbr.wgsl", "fn f() {}");
    let artifacts = sample_artifacts();

    let (_, path) = cache.disk_entry(&request);
    cache.write_disk(&path, &artifacts).unwrap();

    let (exists, _) = cache.disk_entry(&request);
    assert!(exists, "entry must be visible after the write");

    let decoded = cache.read_disk(&path).unwrap();
    assert_eq!(decoded, artifacts);
}

#[test]
fn corrupt_file_reads_as_error_not_partial_map() {
    let fs = Arc::new(MemoryFs::new());
    let cache = cache_over(&fs);
    let request = CompileRequest::new("pbr.wgsl", "fn f() {}");
    let artifacts = sample_artifacts();

    let (_, path) = cache.disk_entry(&request);
    cache.write_disk(&path, &artifacts).unwrap();

    // Truncate the stored bytes just past the first record's header.
    let full = fs.read_bytes(&path).unwrap();
    fs.insert_bytes(path.to_str().unwrap(), full[..full.len() / 2].to_vec());

    match cache.read_disk(&path) {
        Err(ShaderError::CorruptCache { .. }) => {}
        other => panic!("expected CorruptCache, got {other:?}"),
    }
}

// ============================================================================
// Memory Tier
// ============================================================================

#[test]
fn find_is_empty_until_registration() {
    let fs = Arc::new(MemoryFs::new());
    let cache = cache_over(&fs);
    let key = CompileRequest::new("a.wgsl", "x").cache_key();

    assert!(cache.find(key).is_none());
    assert!(cache.is_empty());

    let MemoryEntry::Registered(_) = cache.find_or_register(key) else {
        panic!("first lookup must hand out the compile slot");
    };
    assert!(cache.find(key).is_some());
    assert_eq!(cache.len(), 1);
}

#[test]
fn second_lookup_joins_the_first_registration() {
    let fs = Arc::new(MemoryFs::new());
    let cache = cache_over(&fs);
    let key = CompileRequest::new("a.wgsl", "x").cache_key();

    let MemoryEntry::Registered(owner) = cache.find_or_register(key) else {
        panic!("expected the compile slot");
    };
    let MemoryEntry::Found(waiter) = cache.find_or_register(key) else {
        panic!("second lookup must observe the registration");
    };

    assert!(!waiter.is_resolved());
    owner.resolve(Ok(Arc::new(FxHashMap::default())));
    assert!(waiter.is_resolved());
}

#[test]
fn remove_evicts_and_allows_reregistration() {
    let fs = Arc::new(MemoryFs::new());
    let cache = cache_over(&fs);
    let key = CompileRequest::new("a.wgsl", "x").cache_key();

    let MemoryEntry::Registered(_) = cache.find_or_register(key) else {
        panic!("expected the compile slot");
    };
    assert!(cache.remove(key));
    assert!(!cache.remove(key), "double eviction reports absence");

    let MemoryEntry::Registered(_) = cache.find_or_register(key) else {
        panic!("key must be reusable after eviction");
    };
}

#[test]
fn clear_memory_does_not_touch_disk_entries() {
    let fs = Arc::new(MemoryFs::new());
    let cache = cache_over(&fs);
    let request = CompileRequest::new("pbr.wgsl", "fn f() {}");

    let (_, path) = cache.disk_entry(&request);
    cache.write_disk(&path, &sample_artifacts()).unwrap();
    let MemoryEntry::Registered(_) = cache.find_or_register(request.cache_key()) else {
        panic!("expected the compile slot");
    };

    cache.clear_memory();
    assert!(cache.is_empty());
    let (exists, _) = cache.disk_entry(&request);
    assert!(exists, "disk tier survives a memory clear");
}
