//! Client path sanitization.
//!
//! Every path that arrives from a client is untrusted. [`PathSanitizer`]
//! turns such a string into a [`SanitizedPath`], an absolute path proven to
//! resolve inside a single base directory, or rejects it. File operations
//! only ever accept a [`SanitizedPath`].

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::warn;

/// Substrings that mark a traversal attempt anywhere in the decoded path.
///
/// This is intentionally stricter than a per-segment check: `foo/..bar` is
/// rejected even though `..bar` is a legal file name.
const TRAVERSAL_PATTERNS: &[&str] = &["../", "..\\", "/..", "\\.."];

/// Reasons a client path is rejected.
#[derive(Debug, Error)]
pub enum SanitizeError {
    /// The percent-encoding is malformed or does not decode to UTF-8.
    #[error("path is not valid percent-encoded UTF-8: {0}")]
    Decode(String),

    /// The decoded path contains a NUL byte.
    #[error("path contains a null byte")]
    NullByte,

    /// The decoded path contains a parent-directory sequence.
    #[error("path traversal detected: {0}")]
    Traversal(String),

    /// The resolved path lies outside the base directory.
    #[error("path escapes base directory: {0}")]
    OutsideBase(PathBuf),

    /// The base directory itself cannot be resolved.
    #[error("base directory unavailable: {path}: {source}")]
    BaseUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The candidate path could not be resolved.
    #[error("path could not be resolved: {0}")]
    Unresolvable(#[from] io::Error),
}

/// An absolute path guaranteed to be inside the sanitizer's base directory.
///
/// Only [`PathSanitizer::sanitize`] can construct one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedPath {
    path: PathBuf,
    root: PathBuf,
}

impl SanitizedPath {
    /// The absolute path under the canonical root, symlinks not followed.
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// The canonical base directory this path was checked against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether this path is the base directory itself.
    pub fn is_root(&self) -> bool {
        self.path == self.root
    }

    /// Client-facing form of this path: relative to the root, `/`-separated,
    /// with a leading `/`. The root itself is the empty string.
    pub fn relative(&self) -> String {
        relative_display(&self.path, &self.root)
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for SanitizedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Render `path` relative to `root` the way clients expect (`/a/b`, or `""`
/// for the root). Paths outside `root` render as their full display form.
pub fn relative_display(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(format!("/{}", part.to_string_lossy())),
                _ => None,
            })
            .collect(),
        Err(_) => path.display().to_string(),
    }
}

/// Resolves untrusted client paths against a fixed base directory.
#[derive(Debug, Clone)]
pub struct PathSanitizer {
    base_dir: PathBuf,
}

impl PathSanitizer {
    /// Create a sanitizer rooted at `base_dir`.
    ///
    /// The base directory is canonicalized on every call, so it may be
    /// created or remounted after construction.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// The configured (not necessarily canonical) base directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Canonical form of the base directory.
    pub fn canonical_base(&self) -> Result<PathBuf, SanitizeError> {
        fs::canonicalize(&self.base_dir).map_err(|source| SanitizeError::BaseUnavailable {
            path: self.base_dir.clone(),
            source,
        })
    }

    /// Turn a raw client path into a [`SanitizedPath`].
    ///
    /// Checks run in order and the first failure rejects the path:
    /// percent-decoding, NUL bytes, traversal substrings, then containment
    /// of the canonical candidate inside the canonical base directory.
    pub fn sanitize(&self, raw: &str) -> Result<SanitizedPath, SanitizeError> {
        let decoded = percent_decode(raw)?;

        if decoded.contains('\0') {
            warn!(path = %raw, "Rejected path containing a null byte");
            return Err(SanitizeError::NullByte);
        }

        let normalized = decoded.replace('\\', "/");

        if normalized == ".." || TRAVERSAL_PATTERNS.iter().any(|p| normalized.contains(p)) {
            warn!(path = %normalized, "Path traversal attempt detected");
            return Err(SanitizeError::Traversal(normalized));
        }

        let relative = normalized.trim_start_matches('/');

        let mut parts: Vec<&OsStr> = Vec::new();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => parts.push(part),
                Component::CurDir => {}
                // Unreachable after the traversal and leading-slash checks,
                // but never let one through.
                _ => return Err(SanitizeError::Traversal(normalized.clone())),
            }
        }

        let root = self.canonical_base()?;

        let mut candidate = root.clone();
        candidate.extend(&parts);

        // Containment is checked on the resolved form. The returned path
        // stays unresolved so a symlink entry is handled as the link itself.
        let resolved = resolve_lenient(&candidate)?;
        if !resolved.starts_with(&root) {
            warn!(
                path = %raw,
                resolved = %resolved.display(),
                "Path escape attempt"
            );
            return Err(SanitizeError::OutsideBase(resolved));
        }

        Ok(SanitizedPath {
            path: candidate,
            root,
        })
    }
}

/// Strictly percent-decode `raw`.
///
/// A `%` not followed by two hex digits, or a decoded byte sequence that is
/// not UTF-8, is a decoding failure.
fn percent_decode(raw: &str) -> Result<String, SanitizeError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes
                .get(i + 1..i + 3)
                .map(|hex| hex.iter().all(|b| b.is_ascii_hexdigit()))
                .unwrap_or(false);
            if !well_formed {
                return Err(SanitizeError::Decode(raw.to_string()));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| SanitizeError::Decode(raw.to_string()))
}

/// Canonicalize `path`, tolerating a missing tail.
///
/// The longest existing prefix is resolved through the filesystem (following
/// symlinks) and the missing components are appended to it unchanged.
fn resolve_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();

    loop {
        match fs::canonicalize(&existing) {
            Ok(mut resolved) => {
                for part in missing.iter().rev() {
                    resolved.push(part);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let Some(name) = existing.file_name().map(|n| n.to_os_string()) else {
                    return Err(e);
                };
                missing.push(name);
                if !existing.pop() {
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    }
}
