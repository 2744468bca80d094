#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod config;
pub mod errors;
pub mod io;
pub mod pool;
pub mod shader;
pub mod utils;

pub use config::ShaderSystemConfig;
pub use errors::{Result, ShaderError};
pub use io::{DiskFs, MemoryFs, ShaderFs};
pub use pool::{AnyObjectPool, ConcurrentObjectPool, ObjectPool};
pub use shader::artifact::{CompiledShader, CompiledStageArtifact, ShaderCacheData};
pub use shader::asset::{ShaderAsset, ShaderProgram};
pub use shader::backend::{
    GpuShaderHandle, NullBackend, NullReflector, ReflectionData, ShaderBackend, ShaderReflector,
};
pub use shader::cache::{CompileOutcome, MemoryEntry, ShaderCache, ShaderFuture};
pub use shader::compiler::ShaderCompiler;
pub use shader::loader::{ShaderLoadInfo, ShaderLoader, ShaderSourceRequest};
pub use shader::request::{CacheKey, CompileRequest};
pub use shader::stage::{PipelineKind, ShaderStage};
