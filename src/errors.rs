//! Error Types
//!
//! This module defines the error types used throughout the shader build
//! subsystem.
//!
//! # Overview
//!
//! The main error type [`ShaderError`] covers all failure modes including:
//! - Shader compilation failures (parse/validation diagnostics, missing
//!   entry points, unsupported stage combinations)
//! - Cache corruption (absorbed internally; callers see a recompile, not
//!   an error)
//! - Filesystem and I/O errors
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, ShaderError>`.

use std::sync::Arc;

use thiserror::Error;

use crate::shader::stage::ShaderStage;

/// The main error type for the shader build subsystem.
#[derive(Error, Debug)]
pub enum ShaderError {
    // ========================================================================
    // Compilation Errors (fatal to the load call)
    // ========================================================================
    /// The compiler emitted diagnostics for this source.
    #[error("Shader compile error in {file}: {message}")]
    Compile {
        /// Logical source path the compile was requested for
        file: String,
        /// Rendered compiler diagnostics
        message: String,
    },

    /// A requested (stage, entry point) pair was not produced by the compile.
    #[error("Entry point '{entry}' for stage {stage} not found in {file}")]
    MissingEntryPoint {
        /// Logical source path
        file: String,
        /// Requested stage
        stage: ShaderStage,
        /// Requested entry point name
        entry: String,
    },

    /// The aggregated stage set does not form a supported pipeline shape.
    #[error("Unsupported shader stage combination: [{0}]")]
    UnsupportedStageSet(String),

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// A disk cache file failed to parse. Absorbed by the loader as a miss.
    #[error("Corrupt shader cache file {path}: {reason}")]
    CorruptCache {
        /// Path of the offending cache file
        path: String,
        /// What the parser rejected
        reason: String,
    },

    /// A memory-tier hit did not cover the requested entry points.
    ///
    /// This indicates inconsistent load requests against one source and is a
    /// caller bug; debug builds additionally assert.
    #[error("Incomplete shader cache hit for {file}: missing {stage} entry '{entry}'")]
    IncompleteCacheHit {
        /// Logical source path
        file: String,
        /// Stage missing from the cached data
        stage: ShaderStage,
        /// Entry point that was requested
        entry: String,
    },

    // ========================================================================
    // Session & Backend Errors
    // ========================================================================
    /// Compiler session initialization failed.
    #[error("Shader session error: {0}")]
    Session(String),

    /// The GPU object factory rejected a compiled artifact.
    #[error("Shader backend error for stage {stage}: {message}")]
    Backend {
        /// Stage whose artifact was rejected
        stage: ShaderStage,
        /// Backend-provided reason
        message: String,
    },

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// A logical source path could not be resolved by the filesystem provider.
    #[error("Shader source not found: {0}")]
    SourceNotFound(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure that happened on another thread holding the compile slot
    /// for the same cache key.
    #[error("{0}")]
    Shared(Arc<ShaderError>),
}

/// Alias for `Result<T, ShaderError>`.
pub type Result<T> = std::result::Result<T, ShaderError>;
