//! Shader Stages & Pipeline Classification
//!
//! [`ShaderStage`] is the closed set of programmable pipeline units this
//! subsystem produces bytecode for. [`PipelineKind`] classifies an active
//! stage set into one of the supported pipeline shapes and fixes the
//! canonical stage order handed to the pipeline-creation and reflection
//! collaborators.

use crate::errors::{Result, ShaderError};

/// One programmable GPU pipeline stage.
///
/// The `u32` ids are part of the on-disk cache format and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ShaderStage {
    Vertex = 0,
    Fragment = 1,
    Compute = 2,
    Task = 3,
    Mesh = 4,
}

impl ShaderStage {
    /// Every supported stage.
    pub const ALL: [ShaderStage; 5] = [
        ShaderStage::Vertex,
        ShaderStage::Fragment,
        ShaderStage::Compute,
        ShaderStage::Task,
        ShaderStage::Mesh,
    ];

    /// Stable id used in the disk cache format.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Inverse of [`ShaderStage::id`]; `None` for unknown ids.
    #[must_use]
    pub const fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Vertex),
            1 => Some(Self::Fragment),
            2 => Some(Self::Compute),
            3 => Some(Self::Task),
            4 => Some(Self::Mesh),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
            Self::Task => "task",
            Self::Mesh => "mesh",
        }
    }

    /// File extension used for bytecode dumps.
    #[must_use]
    pub const fn dump_extension(self) -> &'static str {
        match self {
            Self::Vertex => "vert.spv",
            Self::Fragment => "frag.spv",
            Self::Compute => "comp.spv",
            Self::Task => "task.spv",
            Self::Mesh => "mesh.spv",
        }
    }

    pub(crate) fn from_naga(stage: naga::ShaderStage) -> Option<Self> {
        match stage {
            naga::ShaderStage::Vertex => Some(Self::Vertex),
            naga::ShaderStage::Fragment => Some(Self::Fragment),
            naga::ShaderStage::Compute => Some(Self::Compute),
            naga::ShaderStage::Task => Some(Self::Task),
            naga::ShaderStage::Mesh => Some(Self::Mesh),
            _ => None,
        }
    }

    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            Self::Vertex => naga::ShaderStage::Vertex,
            Self::Fragment => naga::ShaderStage::Fragment,
            Self::Compute => naga::ShaderStage::Compute,
            Self::Task => naga::ShaderStage::Task,
            Self::Mesh => naga::ShaderStage::Mesh,
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Pipeline Classification ──────────────────────────────────────────────────

/// Supported pipeline shapes for an aggregated stage set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Vertex + Fragment.
    Graphics,
    /// Mesh + Fragment, optionally preceded by Task.
    Mesh,
    /// Compute alone.
    Compute,
}

impl PipelineKind {
    /// Classifies an active stage set.
    ///
    /// `{Compute}` ⇒ [`Compute`]; `{Mesh [+Task], Fragment}` ⇒ [`Mesh`];
    /// `{Vertex, Fragment}` ⇒ [`Graphics`]; anything else is rejected.
    ///
    /// [`Compute`]: PipelineKind::Compute
    /// [`Mesh`]: PipelineKind::Mesh
    /// [`Graphics`]: PipelineKind::Graphics
    pub fn classify(stages: impl IntoIterator<Item = ShaderStage>) -> Result<Self> {
        let mut present = [false; ShaderStage::ALL.len()];
        let mut count = 0usize;
        for stage in stages {
            if !present[stage.id() as usize] {
                present[stage.id() as usize] = true;
                count += 1;
            }
        }

        let has = |stage: ShaderStage| present[stage.id() as usize];

        if has(ShaderStage::Compute) {
            if count == 1 {
                return Ok(Self::Compute);
            }
        } else if has(ShaderStage::Mesh) {
            if has(ShaderStage::Fragment) && count == 2 + usize::from(has(ShaderStage::Task)) {
                return Ok(Self::Mesh);
            }
        } else if has(ShaderStage::Vertex) && has(ShaderStage::Fragment) && count == 2 {
            return Ok(Self::Graphics);
        }

        let listed: Vec<&str> = ShaderStage::ALL
            .iter()
            .filter(|s| has(**s))
            .map(|s| s.name())
            .collect();
        Err(ShaderError::UnsupportedStageSet(listed.join(", ")))
    }

    /// Canonical stage order for this pipeline shape, as expected by the
    /// downstream pipeline-creation collaborator. Optional stages (Task) are
    /// listed; callers skip the ones absent from their stage map.
    #[must_use]
    pub const fn stage_order(self) -> &'static [ShaderStage] {
        match self {
            Self::Graphics => &[ShaderStage::Vertex, ShaderStage::Fragment],
            Self::Mesh => &[ShaderStage::Task, ShaderStage::Mesh, ShaderStage::Fragment],
            Self::Compute => &[ShaderStage::Compute],
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Graphics => "graphics",
            Self::Mesh => "mesh",
            Self::Compute => "compute",
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
