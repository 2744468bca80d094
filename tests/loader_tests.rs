//! Shader Loader Tests
//!
//! End-to-end loads through an in-memory filesystem and the null
//! backend/reflector fakes:
//! - Pipeline classification scenarios (graphics, compute, mesh+task)
//! - Virtual module injection
//! - Memory-tier adoption and single-flight coalescing across threads
//! - Disk-tier reuse, corrupt-entry fallback, and the bypass flag
//! - Compile-failure reporting and eviction

use std::sync::Arc;

use rustc_hash::FxHashMap;

use vesper_shaders::{
    CompileRequest, CompiledStageArtifact, MemoryFs, NullBackend, NullReflector, PipelineKind,
    ShaderBackend, ShaderError, ShaderFs, ShaderLoadInfo, ShaderLoader, ShaderReflector,
    ShaderSourceRequest, ShaderStage, ShaderSystemConfig,
};

const GEOMETRY_WGSL: &str = "
@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    return vec4<f32>(0.0, 0.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 1.0, 1.0);
}
";

const COMPUTE_WGSL: &str = "
@compute @workgroup_size(64)
fn main() {
}
";

fn fixture() -> (Arc<MemoryFs>, Arc<NullBackend>, ShaderLoader) {
    let _ = env_logger::builder().is_test(true).try_init();

    let fs = Arc::new(MemoryFs::new());
    fs.insert_text("geometry.wgsl", GEOMETRY_WGSL);
    fs.insert_text("sim.wgsl", COMPUTE_WGSL);

    let backend = Arc::new(NullBackend::new());
    let loader = ShaderLoader::new(
        ShaderSystemConfig::new("shaders", "cache"),
        Arc::clone(&fs) as Arc<dyn ShaderFs>,
        Arc::clone(&backend) as Arc<dyn ShaderBackend>,
        Arc::new(NullReflector) as Arc<dyn ShaderReflector>,
    );
    (fs, backend, loader)
}

fn geometry_load() -> ShaderLoadInfo {
    ShaderLoadInfo::new("test geometry").with_source(
        ShaderSourceRequest::new("geometry.wgsl")
            .with_entry(ShaderStage::Vertex, "vs_main")
            .with_entry(ShaderStage::Fragment, "fs_main"),
    )
}

// ============================================================================
// Pipeline Scenarios
// ============================================================================

#[test]
fn vertex_plus_fragment_is_a_graphics_pipeline() {
    let (_fs, _backend, loader) = fixture();

    let asset = loader.load(&geometry_load()).unwrap();
    assert!(asset.is_valid());
    assert_eq!(asset.pipeline_kind(), Some(PipelineKind::Graphics));

    let program = asset.program().unwrap();
    let order: Vec<ShaderStage> = program.ordered().iter().map(|s| s.stage()).collect();
    assert_eq!(order, [ShaderStage::Vertex, ShaderStage::Fragment]);
    assert_eq!(
        asset.stage_shader(ShaderStage::Vertex).unwrap().entry_point(),
        "vs_main"
    );
    assert!(!asset
        .stage_shader(ShaderStage::Fragment)
        .unwrap()
        .gpu_handle()
        .is_null());
}

#[test]
fn compute_alone_is_a_compute_pipeline() {
    let (_fs, _backend, loader) = fixture();

    let info = ShaderLoadInfo::new("test compute").with_source(
        ShaderSourceRequest::new("sim.wgsl").with_entry(ShaderStage::Compute, "main"),
    );
    let asset = loader.load(&info).unwrap();
    assert_eq!(asset.pipeline_kind(), Some(PipelineKind::Compute));

    let program = asset.program().unwrap();
    let order: Vec<ShaderStage> = program.ordered().iter().map(|s| s.stage()).collect();
    assert_eq!(order, [ShaderStage::Compute]);
    let words = asset.stage_shader(ShaderStage::Compute).unwrap().words();
    assert_eq!(words.first(), Some(&0x0723_0203), "SPIR-V magic number");
}

#[test]
fn declared_task_stage_rides_along_with_a_mesh_request() {
    // A program containing Task+Mesh+Fragment artifacts, requested as
    // Mesh+Fragment: the cached task stage joins the aggregate and the
    // canonical order is Task, Mesh, Fragment. Seeded through the disk tier.
    let (fs, _backend, loader) = fixture();
    let source = "// meshlet pipeline (precompiled)\n";
    fs.insert_text("meshlet.wgsl", source);

    let request = CompileRequest::new("meshlet.wgsl", source);
    let mut artifacts = FxHashMap::default();
    artifacts.insert(
        ShaderStage::Task,
        CompiledStageArtifact::new("ts_main", vec![0x0723_0203, 1]),
    );
    artifacts.insert(
        ShaderStage::Mesh,
        CompiledStageArtifact::new("ms_main", vec![0x0723_0203, 2]),
    );
    artifacts.insert(
        ShaderStage::Fragment,
        CompiledStageArtifact::new("fs_main", vec![0x0723_0203, 3]),
    );
    let (_, path) = loader.cache().disk_entry(&request);
    loader.cache().write_disk(&path, &artifacts).unwrap();

    let info = ShaderLoadInfo::new("test meshlet").with_source(
        ShaderSourceRequest::new("meshlet.wgsl")
            .with_entry(ShaderStage::Mesh, "ms_main")
            .with_entry(ShaderStage::Fragment, "fs_main"),
    );
    let asset = loader.load(&info).unwrap();
    assert_eq!(asset.pipeline_kind(), Some(PipelineKind::Mesh));

    let program = asset.program().unwrap();
    let order: Vec<ShaderStage> = program.ordered().iter().map(|s| s.stage()).collect();
    assert_eq!(
        order,
        [ShaderStage::Task, ShaderStage::Mesh, ShaderStage::Fragment]
    );
}

#[test]
fn stages_aggregate_across_source_files() {
    let (fs, _backend, loader) = fixture();
    fs.insert_text(
        "vert_only.wgsl",
        "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(1.0); }",
    );
    fs.insert_text(
        "frag_only.wgsl",
        "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(0.5); }",
    );

    let info = ShaderLoadInfo::new("split sources")
        .with_source(
            ShaderSourceRequest::new("vert_only.wgsl").with_entry(ShaderStage::Vertex, "vs_main"),
        )
        .with_source(
            ShaderSourceRequest::new("frag_only.wgsl")
                .with_entry(ShaderStage::Fragment, "fs_main"),
        );
    let asset = loader.load(&info).unwrap();
    assert_eq!(asset.pipeline_kind(), Some(PipelineKind::Graphics));
    assert_eq!(asset.source_desc(), "vert_only.wgsl;frag_only.wgsl");
}

#[test]
fn unsupported_stage_set_fails_the_load() {
    let (fs, _backend, loader) = fixture();
    fs.insert_text(
        "vert_only.wgsl",
        "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(1.0); }",
    );

    let info = ShaderLoadInfo::new("vertex alone").with_source(
        ShaderSourceRequest::new("vert_only.wgsl").with_entry(ShaderStage::Vertex, "vs_main"),
    );
    match loader.load(&info) {
        Err(ShaderError::UnsupportedStageSet(_)) => {}
        other => panic!("expected UnsupportedStageSet, got {other:?}"),
    }
}

// ============================================================================
// Virtual Modules
// ============================================================================

#[test]
fn injected_module_is_visible_to_the_source() {
    let (fs, _backend, loader) = fixture();
    fs.insert_text(
        "tinted.wgsl",
        "
@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    return vec4<f32>(0.0, 0.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return tint_color();
}
",
    );

    let module = "fn tint_color() -> vec4<f32> { return vec4<f32>(0.2, 0.4, 0.6, 1.0); }";
    let info = ShaderLoadInfo::new("tinted").with_source(
        ShaderSourceRequest::new("tinted.wgsl")
            .with_entry(ShaderStage::Vertex, "vs_main")
            .with_entry(ShaderStage::Fragment, "fs_main")
            .with_module("tint", module),
    );
    let asset = loader.load(&info).unwrap();
    assert!(asset.is_valid());

    // Without the module the same source must fail to compile.
    let broken = ShaderLoadInfo::new("tinted, no module")
        .with_bypass_cache(true)
        .with_source(
            ShaderSourceRequest::new("tinted.wgsl")
                .with_entry(ShaderStage::Vertex, "vs_main")
                .with_entry(ShaderStage::Fragment, "fs_main"),
        );
    assert!(loader.load(&broken).is_err());
}

// ============================================================================
// Cache Tiers
// ============================================================================

#[test]
fn second_load_adopts_the_same_pool_owned_handles() {
    let (_fs, backend, loader) = fixture();

    let first = loader.load(&geometry_load()).unwrap();
    let created_after_first = backend.created_count();

    let second = loader.load(&geometry_load()).unwrap();
    assert_eq!(
        backend.created_count(),
        created_after_first,
        "memory hit must not mint new GPU objects"
    );

    for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
        let a = first.stage_shader(stage).unwrap();
        let b = second.stage_shader(stage).unwrap();
        assert!(Arc::ptr_eq(a, b), "{stage} handle must be shared");
    }
}

#[test]
fn single_flight_coalesces_concurrent_identical_loads() {
    const THREADS: usize = 8;
    let (_fs, backend, loader) = fixture();
    // Bypass the disk tier so a compile is the only way to produce data.
    let info = geometry_load().with_bypass_cache(true);

    let assets: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| scope.spawn(|| loader.load(&info).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(
        backend.created_count(),
        2,
        "exactly one compile: one vertex and one fragment object"
    );
    let reference = assets[0].stage_shader(ShaderStage::Vertex).unwrap();
    for asset in &assets {
        let handle = asset.stage_shader(ShaderStage::Vertex).unwrap();
        assert!(Arc::ptr_eq(reference, handle));
    }
}

#[test]
fn persisted_artifacts_satisfy_a_fresh_loader() {
    let (fs, _backend, loader) = fixture();
    let _ = loader.load(&geometry_load()).unwrap();

    let request = CompileRequest::new("geometry.wgsl", GEOMETRY_WGSL);
    let (exists, _) = loader.cache().disk_entry(&request);
    assert!(exists, "first load must persist the artifacts");

    // A fresh loader has an empty memory tier and resolves from disk.
    let backend2 = Arc::new(NullBackend::new());
    let loader2 = ShaderLoader::new(
        ShaderSystemConfig::new("shaders", "cache"),
        Arc::clone(&fs) as Arc<dyn ShaderFs>,
        Arc::clone(&backend2) as Arc<dyn ShaderBackend>,
        Arc::new(NullReflector) as Arc<dyn ShaderReflector>,
    );
    let asset = loader2.load(&geometry_load()).unwrap();
    assert!(asset.is_valid());
    assert_eq!(backend2.created_count(), 2);
}

#[test]
fn disk_hit_short_circuits_the_compiler() {
    // The source is not valid WGSL; only the seeded disk entry can satisfy
    // the load, so success proves the compiler never ran.
    let (fs, _backend, loader) = fixture();
    let source = "definitely not wgsl";
    fs.insert_text("opaque.wgsl", source);

    let request = CompileRequest::new("opaque.wgsl", source);
    let mut artifacts = FxHashMap::default();
    artifacts.insert(
        ShaderStage::Compute,
        CompiledStageArtifact::new("main", vec![0x0723_0203, 9]),
    );
    let (_, path) = loader.cache().disk_entry(&request);
    loader.cache().write_disk(&path, &artifacts).unwrap();

    let info = ShaderLoadInfo::new("precompiled").with_source(
        ShaderSourceRequest::new("opaque.wgsl").with_entry(ShaderStage::Compute, "main"),
    );
    let asset = loader.load(&info).unwrap();
    assert_eq!(asset.pipeline_kind(), Some(PipelineKind::Compute));
}

#[test]
fn corrupt_disk_entry_falls_back_to_recompilation() {
    let (fs, _backend, loader) = fixture();
    let _ = loader.load(&geometry_load()).unwrap();

    let request = CompileRequest::new("geometry.wgsl", GEOMETRY_WGSL);
    let (_, path) = loader.cache().disk_entry(&request);
    let full = fs.read_bytes(&path).unwrap();
    fs.insert_bytes(path.to_str().unwrap(), full[..full.len() - 3].to_vec());

    // Fresh loader, empty memory tier: the corrupt entry must be absorbed.
    let loader2 = ShaderLoader::new(
        ShaderSystemConfig::new("shaders", "cache"),
        Arc::clone(&fs) as Arc<dyn ShaderFs>,
        Arc::new(NullBackend::new()) as Arc<dyn ShaderBackend>,
        Arc::new(NullReflector) as Arc<dyn ShaderReflector>,
    );
    let asset = loader2.load(&geometry_load()).unwrap();
    assert!(asset.is_valid(), "corruption is non-fatal");
}

#[test]
fn bypass_flag_skips_read_and_write() {
    let (fs, _backend, loader) = fixture();
    let files_before = fs.file_count();

    let asset = loader
        .load(&geometry_load().with_bypass_cache(true))
        .unwrap();
    assert!(asset.is_valid());
    assert_eq!(fs.file_count(), files_before, "no cache file may be written");
}

// ============================================================================
// Failure Modes
// ============================================================================

#[test]
fn unresolvable_source_is_load_fatal() {
    let (_fs, _backend, loader) = fixture();
    let info = ShaderLoadInfo::new("missing").with_source(
        ShaderSourceRequest::new("nope.wgsl").with_entry(ShaderStage::Compute, "main"),
    );
    match loader.load(&info) {
        Err(ShaderError::SourceNotFound(path)) => assert_eq!(path, "nope.wgsl"),
        other => panic!("expected SourceNotFound, got {other:?}"),
    }
}

#[test]
fn compiler_diagnostics_are_fatal_and_reported() {
    let (fs, _backend, loader) = fixture();
    fs.insert_text("broken.wgsl", "@fragment fn fs_main() -> { oops }");

    let info = ShaderLoadInfo::new("broken").with_source(
        ShaderSourceRequest::new("broken.wgsl").with_entry(ShaderStage::Fragment, "fs_main"),
    );
    let err = loader.load(&info).unwrap_err();
    assert!(
        err.to_string().contains("broken.wgsl"),
        "diagnostic must name the source, got: {err}"
    );
}

#[test]
fn missing_entry_point_is_fatal() {
    let (_fs, _backend, loader) = fixture();
    let info = ShaderLoadInfo::new("wrong entry").with_source(
        ShaderSourceRequest::new("geometry.wgsl")
            .with_entry(ShaderStage::Vertex, "vs_main")
            .with_entry(ShaderStage::Fragment, "does_not_exist"),
    );
    let err = loader.load(&info).unwrap_err();
    assert!(err.to_string().contains("does_not_exist"), "got: {err}");
}

#[test]
fn failed_compile_is_evicted_so_later_loads_retry() {
    let (fs, _backend, loader) = fixture();
    fs.insert_text("flaky.wgsl", "not wgsl at all");

    let info = ShaderLoadInfo::new("flaky").with_source(
        ShaderSourceRequest::new("flaky.wgsl").with_entry(ShaderStage::Compute, "main"),
    );
    assert!(loader.load(&info).is_err());
    assert!(
        loader.cache().is_empty(),
        "failed key must not linger in the memory tier"
    );

    // Fixing the source under the same logical path changes the key and the
    // next load compiles cleanly.
    fs.insert_text("flaky.wgsl", COMPUTE_WGSL);
    let asset = loader.load(&info).unwrap();
    assert_eq!(asset.pipeline_kind(), Some(PipelineKind::Compute));
}
