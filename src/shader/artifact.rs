//! Compiled Stage Artifacts
//!
//! Value types produced by a compile and shared through the cache. A
//! [`CompiledStageArtifact`] is the raw per-stage compiler output; a
//! [`CompiledShader`] is the pool-owned object the loader wraps it into,
//! carrying the GPU handle minted by the injected backend. Both are
//! immutable once produced.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::backend::GpuShaderHandle;
use super::stage::ShaderStage;

/// Raw compiler output for one stage: entry-point name plus SPIR-V words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStageArtifact {
    /// Entry-point name the bytecode was emitted for.
    pub entry_point: String,
    /// Bytecode as 32-bit words.
    pub words: Vec<u32>,
}

impl CompiledStageArtifact {
    #[must_use]
    pub fn new(entry_point: impl Into<String>, words: Vec<u32>) -> Self {
        Self {
            entry_point: entry_point.into(),
            words,
        }
    }

    /// Bytecode size in bytes (always a multiple of 4).
    #[inline]
    #[must_use]
    pub fn code_size_bytes(&self) -> usize {
        self.words.len() * 4
    }
}

/// Pool-owned compiled shader for one stage. Immutable post-construction;
/// safe to read from any thread without synchronization.
#[derive(Debug)]
pub struct CompiledShader {
    stage: ShaderStage,
    entry_point: String,
    words: Vec<u32>,
    gpu: GpuShaderHandle,
}

impl CompiledShader {
    #[must_use]
    pub fn new(
        stage: ShaderStage,
        entry_point: impl Into<String>,
        words: Vec<u32>,
        gpu: GpuShaderHandle,
    ) -> Self {
        Self {
            stage,
            entry_point: entry_point.into(),
            words,
            gpu,
        }
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    #[inline]
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    #[inline]
    #[must_use]
    pub fn code_size_bytes(&self) -> usize {
        self.words.len() * 4
    }

    #[inline]
    #[must_use]
    pub fn gpu_handle(&self) -> GpuShaderHandle {
        self.gpu
    }
}

/// The unit of sharing between cache tiers and callers: every caller that
/// resolves one cache key observes the same `Arc`s.
pub type ShaderCacheData = FxHashMap<ShaderStage, Arc<CompiledShader>>;

/// Raw per-stage compiler output before wrapping.
pub type StageArtifacts = FxHashMap<ShaderStage, CompiledStageArtifact>;
