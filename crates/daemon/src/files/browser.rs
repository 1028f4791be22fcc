//! Directory browsing.
//!
//! Produces the `{parent?, dirs, files}` listing for a sanitized directory.
//! Hidden entries are skipped and both lists are sorted case-insensitively.

use std::fs;
use std::path::{Path, PathBuf};

use protocol::messages::{DirectoryListing, FileEntry};
use thiserror::Error;
use tracing::debug;

use super::sanitizer::{relative_display, SanitizedPath};

/// Extensions (lowercase, without the dot) flagged as playable media.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "avi", "mp4", "m4v", "mkv", "mov", "mpeg", "mpg", "mpe", "rm", "rmvb", "3gp", "wmv", "asf",
    "asx", "dat", "vob", "m3u8", "flv", "ts", "webm", "mp3", "wav", "flac", "aac", "ogg", "wma",
];

/// Errors that can occur during directory browsing.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The requested path does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    /// The requested path is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether `path` has an extension from [`MEDIA_EXTENSIONS`].
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            MEDIA_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// List the immediate children of `dir`.
pub fn list_directory(dir: &SanitizedPath) -> Result<DirectoryListing, BrowserError> {
    let path = dir.as_path();
    let root = dir.root();

    let metadata = fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BrowserError::PathNotFound(path.to_path_buf())
        } else {
            BrowserError::Io(e)
        }
    })?;

    if !metadata.is_dir() {
        return Err(BrowserError::NotADirectory(path.to_path_buf()));
    }

    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if is_hidden(&name) {
            continue;
        }

        let entry_path = entry.path();

        // Follow symlinks for the type, but still list dangling links as files.
        let metadata = match fs::metadata(&entry_path) {
            Ok(m) => m,
            Err(_) => match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    debug!(path = %entry_path.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            },
        };

        let mut item = FileEntry {
            name,
            path: relative_display(&entry_path, root),
            full_path: entry_path.display().to_string(),
            size: None,
            is_media: None,
        };

        if metadata.is_dir() {
            dirs.push(item);
        } else {
            item.size = Some(metadata.len());
            item.is_media = Some(is_media_file(&entry_path));
            files.push(item);
        }
    }

    sort_entries(&mut dirs);
    sort_entries(&mut files);

    let parent = if dir.is_root() {
        None
    } else {
        path.parent().map(|p| relative_display(p, root))
    };

    Ok(DirectoryListing {
        parent,
        dirs,
        files,
    })
}

fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by_cached_key(|e| e.name.to_lowercase());
}
