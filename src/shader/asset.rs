//! Shader Assets
//!
//! [`ShaderProgram`] is the multi-stage compiled program handle produced by
//! one load; [`ShaderAsset`] is the loaded-asset wrapper handed back to the
//! caller, carrying the program plus reflection metadata and descriptive
//! strings. A valid asset is exactly one with a program handle.

use std::sync::Arc;
use std::time::SystemTime;

use smallvec::SmallVec;

use super::artifact::{CompiledShader, ShaderCacheData};
use super::backend::ReflectionData;
use super::stage::{PipelineKind, ShaderStage};

/// Compiled multi-stage program: the aggregated stage map plus its
/// classification and the canonical stage order.
#[derive(Debug)]
pub struct ShaderProgram {
    kind: PipelineKind,
    stages: ShaderCacheData,
    ordered: SmallVec<[Arc<CompiledShader>; 3]>,
}

impl ShaderProgram {
    #[must_use]
    pub fn new(
        kind: PipelineKind,
        stages: ShaderCacheData,
        ordered: SmallVec<[Arc<CompiledShader>; 3]>,
    ) -> Self {
        Self {
            kind,
            stages,
            ordered,
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// The shared per-stage handle, if the stage is active.
    #[must_use]
    pub fn stage(&self, stage: ShaderStage) -> Option<&Arc<CompiledShader>> {
        self.stages.get(&stage)
    }

    #[inline]
    #[must_use]
    pub fn stages(&self) -> &ShaderCacheData {
        &self.stages
    }

    /// Shaders in the canonical order for this pipeline shape.
    #[inline]
    #[must_use]
    pub fn ordered(&self) -> &[Arc<CompiledShader>] {
        &self.ordered
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// A loaded shader asset.
pub struct ShaderAsset {
    program: Option<Arc<ShaderProgram>>,
    reflection: ReflectionData,
    source_desc: String,
    debug_name: String,
    loaded_at: SystemTime,
}

impl ShaderAsset {
    #[must_use]
    pub fn new(
        program: Arc<ShaderProgram>,
        reflection: ReflectionData,
        source_desc: impl Into<String>,
        debug_name: impl Into<String>,
    ) -> Self {
        Self {
            program: Some(program),
            reflection,
            source_desc: source_desc.into(),
            debug_name: debug_name.into(),
            loaded_at: SystemTime::now(),
        }
    }

    /// Placeholder asset with no program; `is_valid()` is `false`.
    #[must_use]
    pub fn invalid(source_desc: impl Into<String>, debug_name: impl Into<String>) -> Self {
        Self {
            program: None,
            reflection: ReflectionData::none(),
            source_desc: source_desc.into(),
            debug_name: debug_name.into(),
            loaded_at: SystemTime::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.program.is_some()
    }

    #[inline]
    #[must_use]
    pub fn program(&self) -> Option<&Arc<ShaderProgram>> {
        self.program.as_ref()
    }

    #[must_use]
    pub fn pipeline_kind(&self) -> Option<PipelineKind> {
        self.program.as_ref().map(|p| p.kind())
    }

    /// The shared handle for one stage, if present.
    #[must_use]
    pub fn stage_shader(&self, stage: ShaderStage) -> Option<&Arc<CompiledShader>> {
        self.program.as_ref().and_then(|p| p.stage(stage))
    }

    #[inline]
    #[must_use]
    pub fn reflection(&self) -> &ReflectionData {
        &self.reflection
    }

    #[inline]
    #[must_use]
    pub fn source_desc(&self) -> &str {
        &self.source_desc
    }

    #[inline]
    #[must_use]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    #[inline]
    #[must_use]
    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }
}

impl std::fmt::Debug for ShaderAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderAsset")
            .field("debug_name", &self.debug_name)
            .field("source_desc", &self.source_desc)
            .field("valid", &self.is_valid())
            .field("pipeline_kind", &self.pipeline_kind())
            .finish_non_exhaustive()
    }
}
