//! Compile Requests & Content-Addressed Cache Keys
//!
//! A [`CompileRequest`] fully describes one compilation: the primary source,
//! a set of named virtual modules spliced in ahead of it, and an optional
//! debug-dump directory. Its [`CacheKey`] is a pure function of the content:
//! the content address used by both cache tiers and as the on-disk file stem.
//!
//! Modules live in a `BTreeMap`, so the hash is independent of insertion
//! order by construction.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use xxhash_rust::xxh3::xxh3_128;

/// Fixed-width content digest of a [`CompileRequest`].
///
/// Renders as 32 lowercase hex characters; the rendering doubles as the
/// cache file stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(u128);

impl CacheKey {
    #[inline]
    #[must_use]
    pub const fn from_digest(digest: u128) -> Self {
        Self(digest)
    }

    /// The 32-char lowercase hex rendering.
    #[must_use]
    pub fn hex(&self) -> String {
        format!("{:032x}", self.0)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Full description of one shader compilation.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    source_name: String,
    source_text: String,
    modules: BTreeMap<String, String>,
    dump_dir: Option<PathBuf>,
}

impl CompileRequest {
    #[must_use]
    pub fn new(source_name: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            source_text: source_text.into(),
            modules: BTreeMap::new(),
            dump_dir: None,
        }
    }

    /// Registers a virtual module. Re-registering a name replaces its text.
    pub fn add_module(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.modules.insert(name.into(), text.into());
    }

    #[must_use]
    pub fn with_module(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.add_module(name, text);
        self
    }

    pub fn set_dump_dir(&mut self, dir: impl Into<PathBuf>) {
        self.dump_dir = Some(dir.into());
    }

    #[inline]
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    #[inline]
    #[must_use]
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    #[inline]
    #[must_use]
    pub fn modules(&self) -> &BTreeMap<String, String> {
        &self.modules
    }

    #[inline]
    #[must_use]
    pub fn dump_dir(&self) -> Option<&Path> {
        self.dump_dir.as_deref()
    }

    /// Derives the content address for this request.
    ///
    /// Hashes the source name, the primary text, then every module's
    /// (name, text) in ascending name order. Identical content produces an
    /// identical key regardless of module insertion order; any edit to the
    /// primary or a module text produces a different key. The dump directory
    /// does not participate; it never affects the produced bytecode.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        let mut buf = String::with_capacity(
            self.source_name.len()
                + self.source_text.len()
                + self
                    .modules
                    .iter()
                    .map(|(n, t)| n.len() + t.len() + 2)
                    .sum::<usize>()
                + 2,
        );
        buf.push_str(&self.source_name);
        buf.push('\0');
        buf.push_str(&self.source_text);
        buf.push('\0');
        for (name, text) in &self.modules {
            buf.push_str(name);
            buf.push('\0');
            buf.push_str(text);
            buf.push('\0');
        }
        CacheKey(xxh3_128(buf.as_bytes()))
    }

    /// Composes the source actually handed to the compiler: each module's
    /// text spliced in ahead of the primary, in module-name order. Virtual
    /// modules never touch disk.
    #[must_use]
    pub(crate) fn patched_source(&self) -> String {
        if self.modules.is_empty() {
            return self.source_text.clone();
        }
        let mut out = String::new();
        for (name, text) in &self.modules {
            let _ = writeln!(out, "// -- module: {name}");
            out.push_str(text);
            if !text.ends_with('\n') {
                out.push('\n');
            }
        }
        let _ = writeln!(out, "// -- source: {}", self.source_name);
        out.push_str(&self.source_text);
        out
    }
}
