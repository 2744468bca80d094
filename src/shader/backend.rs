//! Injected Collaborators
//!
//! The GPU-object factory and the reflection system are external to the
//! build subsystem. Both are consumed through constructor-injected traits so
//! tests substitute fakes; [`NullBackend`] and [`NullReflector`] are those
//! fakes (and useful for headless tooling that only wants the bytecode).

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::Result;

use super::artifact::CompiledShader;
use super::stage::ShaderStage;

// ─── GPU Object Factory ───────────────────────────────────────────────────────

/// Opaque handle to a GPU shader object minted by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct GpuShaderHandle(pub u64);

impl GpuShaderHandle {
    /// Null handle.
    pub const NULL: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl Default for GpuShaderHandle {
    fn default() -> Self {
        Self::NULL
    }
}

/// Factory turning (stage, entry point, bytecode) into an opaque GPU handle.
pub trait ShaderBackend: Send + Sync {
    fn create_shader(
        &self,
        stage: ShaderStage,
        entry_point: &str,
        words: &[u32],
    ) -> Result<GpuShaderHandle>;
}

/// Backend fake minting sequential non-null handles.
#[derive(Default)]
pub struct NullBackend {
    next: AtomicU64,
}

impl NullBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles minted so far.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl ShaderBackend for NullBackend {
    fn create_shader(
        &self,
        _stage: ShaderStage,
        _entry_point: &str,
        _words: &[u32],
    ) -> Result<GpuShaderHandle> {
        Ok(GpuShaderHandle::new(
            self.next.fetch_add(1, Ordering::Relaxed) + 1,
        ))
    }
}

// ─── Reflection ───────────────────────────────────────────────────────────────

/// Binding metadata produced by the engine's reflection system. Opaque to
/// the build subsystem: it is carried on the asset, never interpreted here.
#[derive(Clone, Default)]
pub struct ReflectionData {
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl ReflectionData {
    /// Empty reflection data.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Wraps a reflection payload produced by the collaborator.
    #[must_use]
    pub fn with(payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.payload.as_ref()
    }
}

impl std::fmt::Debug for ReflectionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionData")
            .field("present", &self.payload.is_some())
            .finish()
    }
}

/// Collaborator extracting binding metadata from the canonically ordered
/// shader list.
pub trait ShaderReflector: Send + Sync {
    fn reflect(&self, ordered: &[Arc<CompiledShader>]) -> ReflectionData;
}

/// Reflector fake returning empty metadata.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReflector;

impl ShaderReflector for NullReflector {
    fn reflect(&self, _ordered: &[Arc<CompiledShader>]) -> ReflectionData {
        ReflectionData::none()
    }
}
