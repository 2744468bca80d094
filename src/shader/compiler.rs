//! Compiler Adapter
//!
//! Wraps the naga compiler behind the shape the loader needs: one
//! [`CompileRequest`] in, one bytecode blob + entry-point name per declared
//! stage out.
//!
//! Session initialization (SPIR-V target configuration plus source-root
//! resolution) runs once, on a background thread started at construction,
//! and is awaited lazily through a shared future on first compile, so loader
//! construction never blocks on it.
//!
//! Any parse or validation diagnostic is fatal for that compile: the error
//! carries the rendered diagnostics and no partial output is emitted. Debug
//! dumps are the opposite; each one is independent and best-effort.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use naga::back::spv;
use rustc_hash::FxHashMap;

use crate::errors::{Result, ShaderError};
use crate::io::ShaderFs;
use crate::utils::Promise;

use super::artifact::{CompiledStageArtifact, StageArtifacts};
use super::request::CompileRequest;
use super::stage::ShaderStage;

/// Process-wide compiler session state, built once.
struct CompilerSession {
    spv_options: spv::Options<'static>,
    source_root: PathBuf,
}

impl CompilerSession {
    fn initialize(fs: &Arc<dyn ShaderFs>, source_root: &Path) -> Result<Self> {
        let mut spv_options = spv::Options::default();
        spv_options.lang_version = (1, 3);
        spv_options
            .flags
            .set(spv::WriterFlags::DEBUG, cfg!(debug_assertions));

        if !fs.exists(source_root) {
            log::warn!(
                "shader source root {} does not exist; sources must resolve elsewhere",
                source_root.display()
            );
        }
        log::info!("shader compiler session ready (root {})", source_root.display());

        Ok(Self {
            spv_options,
            source_root: source_root.to_path_buf(),
        })
    }
}

type SessionFuture = Promise<std::result::Result<Arc<CompilerSession>, Arc<ShaderError>>>;

/// naga-backed shader compiler.
pub struct ShaderCompiler {
    fs: Arc<dyn ShaderFs>,
    session: SessionFuture,
}

impl ShaderCompiler {
    /// Starts session initialization in the background and returns
    /// immediately.
    #[must_use]
    pub fn new(fs: Arc<dyn ShaderFs>, source_root: &Path) -> Self {
        let session = SessionFuture::new();

        let init_future = session.clone();
        let init_fs = Arc::clone(&fs);
        let init_root = source_root.to_path_buf();
        let spawned = std::thread::Builder::new()
            .name("shader-session-init".into())
            .spawn(move || {
                init_future.resolve(
                    CompilerSession::initialize(&init_fs, &init_root)
                        .map(Arc::new)
                        .map_err(Arc::new),
                );
            });
        if let Err(err) = spawned {
            // No worker thread available; initialize on the caller instead.
            log::warn!("failed to spawn shader session thread: {err}");
            session.resolve(
                CompilerSession::initialize(&fs, source_root)
                    .map(Arc::new)
                    .map_err(Arc::new),
            );
        }

        Self { fs, session }
    }

    /// Whether the one-time session initialization has completed.
    #[must_use]
    pub fn session_ready(&self) -> bool {
        self.session.is_resolved()
    }

    fn session(&self) -> Result<Arc<CompilerSession>> {
        self.session.wait().map_err(ShaderError::Shared)
    }

    /// Compiles `request`, producing one artifact per stage declared in the
    /// composed source.
    ///
    /// The result covers at least `required`: a required (stage, entry
    /// point) pair missing from the compiled program is an error. Declared
    /// entry points beyond the required set ride along (a task entry point
    /// feeding a requested mesh stage, for instance). Entry points for
    /// unsupported stages are skipped with a warning, and only the first
    /// entry point per stage is kept.
    pub fn compile(
        &self,
        request: &CompileRequest,
        required: &FxHashMap<ShaderStage, String>,
    ) -> Result<StageArtifacts> {
        let session = self.session()?;
        let source_name = request.source_name();
        log::debug!(
            "compiling shader {source_name} ({} modules, root {})",
            request.modules().len(),
            session.source_root.display()
        );

        let patched = request.patched_source();

        let module = naga::front::wgsl::parse_str(&patched).map_err(|err| {
            let message = err.emit_to_string(&patched);
            log::error!("shader parse failed for {source_name}:\n{message}");
            ShaderError::Compile {
                file: source_name.to_string(),
                message,
            }
        })?;

        let info = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|err| {
            let message = err.emit_to_string(&patched);
            log::error!("shader validation failed for {source_name}:\n{message}");
            ShaderError::Compile {
                file: source_name.to_string(),
                message,
            }
        })?;

        let mut artifacts = StageArtifacts::default();
        for entry in &module.entry_points {
            let Some(stage) = ShaderStage::from_naga(entry.stage) else {
                log::warn!(
                    "{source_name}: entry point '{}' targets an unsupported stage; skipped",
                    entry.name
                );
                continue;
            };
            if artifacts.contains_key(&stage) {
                log::warn!(
                    "{source_name}: duplicate {stage} entry point '{}'; keeping the first",
                    entry.name
                );
                continue;
            }

            let pipeline_options = spv::PipelineOptions {
                shader_stage: stage.to_naga(),
                entry_point: entry.name.clone(),
            };
            let words =
                spv::write_vec(&module, &info, &session.spv_options, Some(&pipeline_options))
                    .map_err(|err| ShaderError::Compile {
                        file: source_name.to_string(),
                        message: format!(
                            "SPIR-V emission failed for {stage} entry '{}': {err}",
                            entry.name
                        ),
                    })?;

            artifacts.insert(stage, CompiledStageArtifact::new(entry.name.clone(), words));
        }

        for (stage, entry) in required {
            match artifacts.get(stage) {
                Some(artifact) if artifact.entry_point == *entry => {}
                _ => {
                    return Err(ShaderError::MissingEntryPoint {
                        file: source_name.to_string(),
                        stage: *stage,
                        entry: entry.clone(),
                    });
                }
            }
        }

        if let Some(dump_dir) = request.dump_dir() {
            self.dump(request, &patched, &artifacts, dump_dir);
        }

        Ok(artifacts)
    }

    // ── Debug Dumps ──────────────────────────────────────────────────────────

    /// Mirrors modules, the patched source, and raw bytecode into
    /// `dump_dir`. Every dump is independent; failures are logged and never
    /// abort the compile.
    fn dump(
        &self,
        request: &CompileRequest,
        patched: &str,
        artifacts: &StageArtifacts,
        dump_dir: &Path,
    ) {
        if let Err(err) = self.fs.create_dir_all(dump_dir) {
            log::warn!("cannot create dump dir {}: {err}", dump_dir.display());
            return;
        }

        for (name, text) in request.modules() {
            let path = dump_dir.join(format!("{}.wgsl", sanitize(name)));
            if let Err(err) = self.fs.write_bytes(&path, text.as_bytes()) {
                log::warn!("module dump failed for {}: {err}", path.display());
            }
        }

        let stem = sanitize(request.source_name());
        let patched_path = dump_dir.join(format!("{stem}.patched.wgsl"));
        if let Err(err) = self.fs.write_bytes(&patched_path, patched.as_bytes()) {
            log::warn!("patched source dump failed for {}: {err}", patched_path.display());
        }

        for (stage, artifact) in artifacts {
            let path = dump_dir.join(format!("{stem}.{}", stage.dump_extension()));
            let mut bytes = Vec::with_capacity(artifact.code_size_bytes());
            for word in &artifact.words {
                bytes.extend_from_slice(&word.to_ne_bytes());
            }
            if let Err(err) = self.fs.write_bytes(&path, &bytes) {
                log::warn!("bytecode dump failed for {}: {err}", path.display());
            }
        }
    }
}

/// Flattens a logical path into a dump file stem.
fn sanitize(name: &str) -> String {
    name.replace(['/', '\\', ':'], "_")
}
