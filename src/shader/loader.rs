//! Shader Loader
//!
//! Public entry point of the shader build subsystem. A load resolves each
//! requested source through three tiers (the in-memory future map, the
//! on-disk artifact cache, the compiler), aggregates the resulting stages,
//! classifies them into a pipeline shape, and returns a [`ShaderAsset`].
//!
//! # Concurrency
//!
//! `load` may be called from any number of threads. The memory tier's
//! check-then-insert runs under one mutex, so for each cache key exactly one
//! caller owns the compile slot; everyone else waits on the shared future
//! and adopts the same pool-owned handles. A failed compile resolves the
//! future with the shared error and evicts the key, so later calls retry
//! instead of inheriting a stale failure.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::config::ShaderSystemConfig;
use crate::errors::{Result, ShaderError};
use crate::io::ShaderFs;
use crate::pool::{AnyObjectPool, ConcurrentObjectPool};

use super::artifact::{CompiledShader, ShaderCacheData, StageArtifacts};
use super::asset::{ShaderAsset, ShaderProgram};
use super::backend::{ShaderBackend, ShaderReflector};
use super::cache::{MemoryEntry, ShaderCache};
use super::compiler::ShaderCompiler;
use super::request::CompileRequest;
use super::stage::{PipelineKind, ShaderStage};

// ─── Load Description ─────────────────────────────────────────────────────────

/// One source file and the entry points required from it.
#[derive(Debug, Clone)]
pub struct ShaderSourceRequest {
    /// Logical path, resolved through the injected filesystem provider.
    pub path: String,
    /// The exact (stage → entry point) set this load needs from the file.
    pub entry_points: FxHashMap<ShaderStage, String>,
    /// Named virtual modules spliced into the source at compile time.
    pub modules: Vec<(String, String)>,
}

impl ShaderSourceRequest {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry_points: FxHashMap::default(),
            modules: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_entry(mut self, stage: ShaderStage, entry_point: impl Into<String>) -> Self {
        self.entry_points.insert(stage, entry_point.into());
        self
    }

    #[must_use]
    pub fn with_module(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.modules.push((name.into(), text.into()));
        self
    }
}

/// Full description of one `load` call.
#[derive(Debug, Clone)]
pub struct ShaderLoadInfo {
    /// Name attached to the resulting asset for diagnostics.
    pub debug_name: String,
    /// Source files contributing stages to the program.
    pub sources: Vec<ShaderSourceRequest>,
    /// Skip the disk tier for this load (read and write).
    pub bypass_cache: bool,
}

impl ShaderLoadInfo {
    #[must_use]
    pub fn new(debug_name: impl Into<String>) -> Self {
        Self {
            debug_name: debug_name.into(),
            sources: Vec::new(),
            bypass_cache: false,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: ShaderSourceRequest) -> Self {
        self.sources.push(source);
        self
    }

    #[must_use]
    pub fn with_bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }
}

// ─── Loader ───────────────────────────────────────────────────────────────────

/// Shader build orchestrator. One instance serves the whole engine; shared
/// behind an `Arc` across worker threads.
pub struct ShaderLoader {
    fs: Arc<dyn ShaderFs>,
    config: ShaderSystemConfig,
    cache: ShaderCache,
    compiler: ShaderCompiler,
    backend: Arc<dyn ShaderBackend>,
    reflector: Arc<dyn ShaderReflector>,
    shader_pool: ConcurrentObjectPool<CompiledShader>,
    program_pool: AnyObjectPool,
}

impl ShaderLoader {
    #[must_use]
    pub fn new(
        config: ShaderSystemConfig,
        fs: Arc<dyn ShaderFs>,
        backend: Arc<dyn ShaderBackend>,
        reflector: Arc<dyn ShaderReflector>,
    ) -> Self {
        let cache = ShaderCache::new(Arc::clone(&fs), config.cache_dir.clone());
        let compiler = ShaderCompiler::new(Arc::clone(&fs), &config.source_root);
        Self {
            fs,
            config,
            cache,
            compiler,
            backend,
            reflector,
            shader_pool: ConcurrentObjectPool::new(),
            program_pool: AnyObjectPool::new(),
        }
    }

    /// The cache, exposed for diagnostics and explicit eviction.
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ShaderCache {
        &self.cache
    }

    /// Live pool-owned shader count, for diagnostics.
    #[must_use]
    pub fn live_shader_count(&self) -> usize {
        self.shader_pool.allocation_count()
    }

    /// Loads (or resolves from cache) the program described by `info`.
    pub fn load(&self, info: &ShaderLoadInfo) -> Result<ShaderAsset> {
        let bypass = info.bypass_cache || self.config.bypass_cache;

        let mut aggregated = ShaderCacheData::default();
        for source in &info.sources {
            let data = self.load_source(source, bypass)?;
            for (stage, shader) in data.iter() {
                if aggregated.insert(*stage, Arc::clone(shader)).is_some() {
                    log::warn!(
                        "{}: stage {stage} provided by more than one source; keeping {}",
                        info.debug_name,
                        source.path
                    );
                }
            }
        }

        let kind = PipelineKind::classify(aggregated.keys().copied()).map_err(|err| {
            log::error!("{}: {err}", info.debug_name);
            err
        })?;

        let mut ordered: SmallVec<[Arc<CompiledShader>; 3]> = SmallVec::new();
        for stage in kind.stage_order() {
            if let Some(shader) = aggregated.get(stage) {
                ordered.push(Arc::clone(shader));
            }
        }

        let reflection = self.reflector.reflect(&ordered);
        let program = self
            .program_pool
            .allocate(ShaderProgram::new(kind, aggregated, ordered));

        let source_desc = info
            .sources
            .iter()
            .map(|s| s.path.as_str())
            .collect::<Vec<_>>()
            .join(";");

        log::debug!(
            "loaded shader '{}' ({kind} pipeline, {} stages)",
            info.debug_name,
            program.stage_count()
        );
        Ok(ShaderAsset::new(
            program,
            reflection,
            source_desc,
            info.debug_name.clone(),
        ))
    }

    // ── Per-Source Resolution ────────────────────────────────────────────────

    fn load_source(
        &self,
        source: &ShaderSourceRequest,
        bypass: bool,
    ) -> Result<Arc<ShaderCacheData>> {
        let resolved = self
            .fs
            .resolve_path(&source.path)
            .ok_or_else(|| ShaderError::SourceNotFound(source.path.clone()))?;
        let text = self.fs.read_to_string(&resolved)?;

        let mut request = CompileRequest::new(&source.path, text);
        for (name, module_text) in &source.modules {
            request.add_module(name, module_text);
        }
        if let Some(dump_dir) = &self.config.dump_dir {
            request.set_dump_dir(dump_dir.clone());
        }

        let key = request.cache_key();
        match self.cache.find_or_register(key) {
            MemoryEntry::Found(future) => {
                let data = future.wait().map_err(ShaderError::Shared)?;
                verify_complete_hit(&data, source)?;
                Ok(data)
            }
            MemoryEntry::Registered(future) => {
                // This thread owns the compile slot: whatever happens, the
                // future must resolve so waiters never stall on our failure.
                match self.produce(&request, source, bypass) {
                    Ok(data) => {
                        future.resolve(Ok(Arc::clone(&data)));
                        Ok(data)
                    }
                    Err(err) => {
                        let shared = Arc::new(err);
                        future.resolve(Err(Arc::clone(&shared)));
                        self.cache.remove(key);
                        Err(ShaderError::Shared(shared))
                    }
                }
            }
        }
    }

    /// Disk tier, then compiler. Runs only on the thread holding the
    /// compile slot for this key.
    fn produce(
        &self,
        request: &CompileRequest,
        source: &ShaderSourceRequest,
        bypass: bool,
    ) -> Result<Arc<ShaderCacheData>> {
        if !bypass {
            let (exists, path) = self.cache.disk_entry(request);
            if exists {
                match self.cache.read_disk(&path) {
                    Ok(artifacts) if covers(&artifacts, source) => {
                        log::debug!("disk cache hit for {} ({})", source.path, path.display());
                        return self.wrap_artifacts(artifacts);
                    }
                    Ok(_) => {
                        log::info!(
                            "disk cache entry {} lacks requested entry points; recompiling",
                            path.display()
                        );
                    }
                    Err(err) => {
                        log::warn!("discarding corrupt shader cache entry: {err}");
                    }
                }
            }
        }

        let artifacts = self.compiler.compile(request, &source.entry_points)?;

        if !bypass {
            let (_, path) = self.cache.disk_entry(request);
            if let Err(err) = self.cache.write_disk(&path, &artifacts) {
                log::warn!("failed to persist shader cache {}: {err}", path.display());
            }
        }

        self.wrap_artifacts(artifacts)
    }

    /// Mints GPU handles and moves each artifact into the pool.
    fn wrap_artifacts(&self, artifacts: StageArtifacts) -> Result<Arc<ShaderCacheData>> {
        let mut data = ShaderCacheData::default();
        for (stage, artifact) in artifacts {
            let gpu = self
                .backend
                .create_shader(stage, &artifact.entry_point, &artifact.words)?;
            let shader = self.shader_pool.allocate(CompiledShader::new(
                stage,
                artifact.entry_point,
                artifact.words,
                gpu,
            ));
            data.insert(stage, shader);
        }
        Ok(Arc::new(data))
    }
}

/// A memory-tier hit must cover every requested (stage, entry point) pair.
/// A miss here means two call sites request inconsistent entry sets for one
/// source, which is a caller bug.
fn verify_complete_hit(data: &ShaderCacheData, source: &ShaderSourceRequest) -> Result<()> {
    for (stage, entry) in &source.entry_points {
        let matches = data
            .get(stage)
            .is_some_and(|shader| shader.entry_point() == entry.as_str());
        if !matches {
            debug_assert!(
                false,
                "incomplete cache hit for {}: {stage} entry '{entry}'",
                source.path
            );
            return Err(ShaderError::IncompleteCacheHit {
                file: source.path.clone(),
                stage: *stage,
                entry: entry.clone(),
            });
        }
    }
    Ok(())
}

/// Whether a deserialized disk entry satisfies the requested entry points.
fn covers(artifacts: &StageArtifacts, source: &ShaderSourceRequest) -> bool {
    source.entry_points.iter().all(|(stage, entry)| {
        artifacts
            .get(stage)
            .is_some_and(|artifact| artifact.entry_point == *entry)
    })
}
