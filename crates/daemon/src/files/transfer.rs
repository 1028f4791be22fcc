//! File transfer and batch filesystem operations.
//!
//! This module provides:
//! - Download sources with size and MIME type
//! - Placing uploaded temp files into a target directory
//! - Recursive copy, move and delete primitives
//! - Batch copy/cut/delete where one failing item does not abort the rest

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::sanitizer::SanitizedPath;

/// Errors that can occur during file transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The requested file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// The requested path is a directory, not a file.
    #[error("path is a directory: {0}")]
    IsADirectory(PathBuf),

    /// The target of an upload, copy or move is not a directory.
    #[error("target is not a directory: {0}")]
    TargetNotDirectory(PathBuf),

    /// The client-supplied file name is unusable.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// A directory cannot be copied or moved into itself.
    #[error("cannot place {source_path} inside itself ({target})")]
    IntoItself { source_path: PathBuf, target: PathBuf },

    /// The base directory itself cannot be moved or deleted.
    #[error("refusing to modify the browsing root: {0}")]
    RootProtected(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn not_found_or_io(path: &Path, e: io::Error) -> TransferError {
    if e.kind() == io::ErrorKind::NotFound {
        TransferError::FileNotFound(path.to_path_buf())
    } else {
        TransferError::Io(e)
    }
}

// ============================================================================
// Download
// ============================================================================

/// An opened file ready to be streamed to a client.
#[derive(Debug)]
pub struct DownloadSource {
    pub file: tokio::fs::File,
    pub len: u64,
    pub content_type: String,
}

/// Open a sanitized file for download.
pub async fn open_download(path: &SanitizedPath) -> Result<DownloadSource, TransferError> {
    let path = path.as_path();

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| not_found_or_io(path, e))?;

    if metadata.is_dir() {
        return Err(TransferError::IsADirectory(path.to_path_buf()));
    }

    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| not_found_or_io(path, e))?;

    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Ok(DownloadSource {
        file,
        len: metadata.len(),
        content_type,
    })
}

// ============================================================================
// Upload
// ============================================================================

/// Reduce a client-supplied file name to its final component.
///
/// Both `/` and `\` count as separators so that names from any client OS
/// collapse to a bare file name.
pub fn upload_file_name(client_name: &str) -> Result<String, TransferError> {
    let name = client_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
        return Err(TransferError::InvalidFileName(client_name.to_string()));
    }

    Ok(name.to_string())
}

/// Move an uploaded temp file into `target_dir` under the client's file name.
///
/// Returns the final destination path. An existing file with the same name
/// is replaced.
pub fn place_upload(
    temp_file: &Path,
    target_dir: &SanitizedPath,
    client_name: &str,
) -> Result<PathBuf, TransferError> {
    let name = upload_file_name(client_name)?;
    let dir = target_dir.as_path();

    let metadata = fs::metadata(dir).map_err(|e| not_found_or_io(dir, e))?;
    if !metadata.is_dir() {
        return Err(TransferError::TargetNotDirectory(dir.to_path_buf()));
    }

    let destination = dir.join(&name);

    if fs::rename(temp_file, &destination).is_err() {
        // Temp storage may live on another filesystem.
        fs::copy(temp_file, &destination)?;
        if let Err(e) = fs::remove_file(temp_file) {
            warn!(path = ?temp_file, error = %e, "Failed to remove upload temp file after copy");
        }
    }

    info!(destination = %destination.display(), "Upload stored");
    Ok(destination)
}

// ============================================================================
// Recursive primitives
// ============================================================================

fn destination_in(src: &Path, dest_dir: &Path) -> Result<PathBuf, TransferError> {
    let name = src
        .file_name()
        .ok_or_else(|| TransferError::InvalidFileName(src.display().to_string()))?;
    Ok(dest_dir.join(name))
}

/// Copy `src` (file or directory tree) into `dest_dir`.
///
/// Symlinks are recreated rather than followed.
pub fn copy_recursive(src: &Path, dest_dir: &Path) -> Result<(), TransferError> {
    let metadata = fs::symlink_metadata(src).map_err(|e| not_found_or_io(src, e))?;
    let destination = destination_in(src, dest_dir)?;

    if destination == src {
        debug!(path = %src.display(), "Copy onto itself skipped");
        return Ok(());
    }

    if metadata.is_dir() {
        if dest_dir.starts_with(src) {
            return Err(TransferError::IntoItself {
                source_path: src.to_path_buf(),
                target: dest_dir.to_path_buf(),
            });
        }
        copy_tree(src, &destination)
    } else {
        copy_entry(src, &destination, &metadata)
    }
}

fn copy_tree(src: &Path, destination: &Path) -> Result<(), TransferError> {
    fs::create_dir_all(destination)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        let target = destination.join(entry.file_name());

        if metadata.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            copy_entry(&entry.path(), &target, &metadata)?;
        }
    }

    Ok(())
}

fn copy_entry(src: &Path, destination: &Path, metadata: &fs::Metadata) -> Result<(), TransferError> {
    if metadata.file_type().is_symlink() {
        return copy_symlink(src, destination);
    }
    fs::copy(src, destination)?;
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, destination: &Path) -> Result<(), TransferError> {
    let link_target = fs::read_link(src)?;
    if fs::symlink_metadata(destination).is_ok() {
        fs::remove_file(destination)?;
    }
    std::os::unix::fs::symlink(link_target, destination)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, destination: &Path) -> Result<(), TransferError> {
    fs::copy(src, destination)?;
    Ok(())
}

/// Move `src` into `dest_dir`, falling back to copy-then-delete when a
/// rename is not possible.
pub fn move_recursive(src: &Path, dest_dir: &Path) -> Result<(), TransferError> {
    let metadata = fs::symlink_metadata(src).map_err(|e| not_found_or_io(src, e))?;
    let destination = destination_in(src, dest_dir)?;

    if destination == src {
        return Ok(());
    }

    if metadata.is_dir() && dest_dir.starts_with(src) {
        return Err(TransferError::IntoItself {
            source_path: src.to_path_buf(),
            target: dest_dir.to_path_buf(),
        });
    }

    match fs::rename(src, &destination) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                from = %src.display(),
                to = %destination.display(),
                error = %e,
                "Rename failed, copying instead"
            );
            copy_recursive(src, dest_dir)?;
            delete_recursive(src)
        }
    }
}

/// Delete a file, symlink or directory tree.
pub fn delete_recursive(path: &Path) -> Result<(), TransferError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| not_found_or_io(path, e))?;

    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }

    Ok(())
}

// ============================================================================
// Batches
// ============================================================================

/// A batch filesystem operation requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp {
    Copy,
    Cut,
    Delete,
}

impl BatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOp::Copy => "copy",
            BatchOp::Cut => "cut",
            BatchOp::Delete => "delete",
        }
    }

    /// Whether this operation needs a target directory.
    pub fn needs_target(&self) -> bool {
        !matches!(self, BatchOp::Delete)
    }
}

/// Outcome counts of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Apply `op` to every source, logging and counting per-item failures.
///
/// Copy and cut are a no-op when the target is missing or not a directory.
pub fn run_batch(
    op: BatchOp,
    sources: &[SanitizedPath],
    target: Option<&SanitizedPath>,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    let target_dir = if op.needs_target() {
        match target {
            Some(t) if t.as_path().is_dir() => Some(t.as_path()),
            _ => {
                debug!(op = op.as_str(), "Batch target missing or not a directory");
                return summary;
            }
        }
    } else {
        None
    };

    for source in sources {
        let result = apply_one(op, source, target_dir);
        match result {
            Ok(()) => summary.succeeded += 1,
            Err(e) => {
                warn!(
                    op = op.as_str(),
                    path = %source.as_path().display(),
                    error = %e,
                    "Batch item failed"
                );
                summary.failed += 1;
            }
        }
    }

    info!(
        op = op.as_str(),
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Batch finished"
    );
    summary
}

fn apply_one(
    op: BatchOp,
    source: &SanitizedPath,
    target_dir: Option<&Path>,
) -> Result<(), TransferError> {
    if source.is_root() {
        return Err(TransferError::RootProtected(source.as_path().to_path_buf()));
    }

    match (op, target_dir) {
        (BatchOp::Delete, _) => delete_recursive(source.as_path()),
        (BatchOp::Copy, Some(dir)) => copy_recursive(source.as_path(), dir),
        (BatchOp::Cut, Some(dir)) => move_recursive(source.as_path(), dir),
        (_, None) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::sanitizer::PathSanitizer;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathSanitizer) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("dest")).unwrap();
        fs::write(root.join("src/file.txt"), "Hello").unwrap();
        fs::write(root.join("src/nested/deep.txt"), "Deep").unwrap();
        let sanitizer = PathSanitizer::new(root);
        (temp_dir, sanitizer)
    }

    #[tokio::test]
    async fn test_open_download() {
        let (temp_dir, sanitizer) = setup();
        fs::write(temp_dir.path().join("clip.mp4"), vec![0u8; 1024]).unwrap();

        let source = open_download(&sanitizer.sanitize("clip.mp4").unwrap())
            .await
            .unwrap();
        assert_eq!(source.len, 1024);
        assert_eq!(source.content_type, "video/mp4");

        let source = open_download(&sanitizer.sanitize("src/file.txt").unwrap())
            .await
            .unwrap();
        assert_eq!(source.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_open_download_missing_or_directory() {
        let (_temp_dir, sanitizer) = setup();

        let result = open_download(&sanitizer.sanitize("missing.bin").unwrap()).await;
        assert!(matches!(result, Err(TransferError::FileNotFound(_))));

        let result = open_download(&sanitizer.sanitize("src").unwrap()).await;
        assert!(matches!(result, Err(TransferError::IsADirectory(_))));
    }

    #[test]
    fn test_upload_file_name() {
        assert_eq!(upload_file_name("movie.mkv").unwrap(), "movie.mkv");
        assert_eq!(upload_file_name("C:\\Users\\me\\movie.mkv").unwrap(), "movie.mkv");
        assert_eq!(upload_file_name("../../etc/passwd").unwrap(), "passwd");
        assert!(upload_file_name("").is_err());
        assert!(upload_file_name("dir/").is_err());
        assert!(upload_file_name("..").is_err());
    }

    #[test]
    fn test_place_upload() {
        let (temp_dir, sanitizer) = setup();
        let staging = TempDir::new().unwrap();
        let temp_file = staging.path().join("upload.tmp");
        fs::write(&temp_file, "payload").unwrap();

        let target = sanitizer.sanitize("dest").unwrap();
        let destination = place_upload(&temp_file, &target, "report.pdf").unwrap();

        assert!(destination.ends_with("dest/report.pdf"));
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("dest/report.pdf")).unwrap(),
            "payload"
        );
        assert!(!temp_file.exists());
    }

    #[test]
    fn test_place_upload_into_missing_directory() {
        let (_temp_dir, sanitizer) = setup();
        let staging = TempDir::new().unwrap();
        let temp_file = staging.path().join("upload.tmp");
        fs::write(&temp_file, "payload").unwrap();

        let target = sanitizer.sanitize("nowhere").unwrap();
        let result = place_upload(&temp_file, &target, "report.pdf");
        assert!(matches!(result, Err(TransferError::FileNotFound(_))));
        assert!(temp_file.exists());
    }

    #[test]
    fn test_copy_recursive_directory() {
        let (temp_dir, _sanitizer) = setup();
        let root = temp_dir.path();

        copy_recursive(&root.join("src"), &root.join("dest")).unwrap();

        assert_eq!(fs::read_to_string(root.join("dest/src/file.txt")).unwrap(), "Hello");
        assert_eq!(
            fs::read_to_string(root.join("dest/src/nested/deep.txt")).unwrap(),
            "Deep"
        );
        assert!(root.join("src/file.txt").exists());
    }

    #[test]
    fn test_copy_into_itself_rejected() {
        let (temp_dir, _sanitizer) = setup();
        let root = temp_dir.path();

        let result = copy_recursive(&root.join("src"), &root.join("src/nested"));
        assert!(matches!(result, Err(TransferError::IntoItself { .. })));
    }

    #[test]
    fn test_copy_onto_same_location_keeps_content() {
        let (temp_dir, _sanitizer) = setup();
        let root = temp_dir.path();

        copy_recursive(&root.join("src/file.txt"), &root.join("src")).unwrap();
        assert_eq!(fs::read_to_string(root.join("src/file.txt")).unwrap(), "Hello");
    }

    #[test]
    fn test_move_recursive() {
        let (temp_dir, _sanitizer) = setup();
        let root = temp_dir.path();

        move_recursive(&root.join("src"), &root.join("dest")).unwrap();

        assert!(!root.join("src").exists());
        assert_eq!(
            fs::read_to_string(root.join("dest/src/nested/deep.txt")).unwrap(),
            "Deep"
        );
    }

    #[test]
    fn test_delete_recursive() {
        let (temp_dir, _sanitizer) = setup();
        let root = temp_dir.path();

        delete_recursive(&root.join("src/file.txt")).unwrap();
        assert!(!root.join("src/file.txt").exists());

        delete_recursive(&root.join("src")).unwrap();
        assert!(!root.join("src").exists());

        let result = delete_recursive(&root.join("src"));
        assert!(matches!(result, Err(TransferError::FileNotFound(_))));
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let (temp_dir, sanitizer) = setup();
        let root = temp_dir.path();
        fs::write(root.join("other.txt"), "Other").unwrap();

        let sources = vec![
            sanitizer.sanitize("missing.txt").unwrap(),
            sanitizer.sanitize("other.txt").unwrap(),
            sanitizer.sanitize("src/file.txt").unwrap(),
        ];
        let summary = run_batch(BatchOp::Delete, &sources, None);

        assert_eq!(summary, BatchSummary { succeeded: 2, failed: 1 });
        assert!(!root.join("other.txt").exists());
        assert!(!root.join("src/file.txt").exists());
    }

    #[test]
    fn test_batch_copy_without_target_is_noop() {
        let (temp_dir, sanitizer) = setup();

        let sources = vec![sanitizer.sanitize("src/file.txt").unwrap()];
        let missing = sanitizer.sanitize("no_such_dir").unwrap();
        let summary = run_batch(BatchOp::Copy, &sources, Some(&missing));

        assert_eq!(summary, BatchSummary::default());
        assert!(!temp_dir.path().join("no_such_dir").exists());

        let summary = run_batch(BatchOp::Cut, &sources, None);
        assert_eq!(summary, BatchSummary::default());
        assert!(temp_dir.path().join("src/file.txt").exists());
    }

    #[test]
    fn test_batch_never_touches_root() {
        let (temp_dir, sanitizer) = setup();

        let sources = vec![sanitizer.sanitize("").unwrap()];
        let summary = run_batch(BatchOp::Delete, &sources, None);

        assert_eq!(summary, BatchSummary { succeeded: 0, failed: 1 });
        assert!(temp_dir.path().join("src/file.txt").exists());
    }

    #[test]
    fn test_batch_cut() {
        let (temp_dir, sanitizer) = setup();
        let root = temp_dir.path();

        let sources = vec![sanitizer.sanitize("src/file.txt").unwrap()];
        let target = sanitizer.sanitize("dest").unwrap();
        let summary = run_batch(BatchOp::Cut, &sources, Some(&target));

        assert_eq!(summary.succeeded, 1);
        assert!(!root.join("src/file.txt").exists());
        assert!(root.join("dest/file.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_batch_delete_removes_link_not_target() {
        let (temp_dir, sanitizer) = setup();
        let root = temp_dir.path();
        std::os::unix::fs::symlink(root.join("src"), root.join("shortcut")).unwrap();

        let sources = vec![sanitizer.sanitize("shortcut").unwrap()];
        let summary = run_batch(BatchOp::Delete, &sources, None);

        assert_eq!(summary, BatchSummary { succeeded: 1, failed: 0 });
        assert!(fs::symlink_metadata(root.join("shortcut")).is_err());
        assert_eq!(fs::read_to_string(root.join("src/file.txt")).unwrap(), "Hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_batch_cut_moves_link_not_target() {
        let (temp_dir, sanitizer) = setup();
        let root = temp_dir.path();
        std::os::unix::fs::symlink(root.join("src"), root.join("shortcut")).unwrap();

        let sources = vec![sanitizer.sanitize("shortcut").unwrap()];
        let target = sanitizer.sanitize("dest").unwrap();
        let summary = run_batch(BatchOp::Cut, &sources, Some(&target));

        assert_eq!(summary.succeeded, 1);
        assert!(fs::symlink_metadata(root.join("shortcut")).is_err());
        assert!(fs::symlink_metadata(root.join("dest/shortcut"))
            .unwrap()
            .file_type()
            .is_symlink());
        assert!(root.join("src/file.txt").exists());
        assert!(!root.join("dest/src").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_batch_copy_recreates_link() {
        let (temp_dir, sanitizer) = setup();
        let root = temp_dir.path();
        std::os::unix::fs::symlink(root.join("src/file.txt"), root.join("alias.txt")).unwrap();

        let sources = vec![sanitizer.sanitize("alias.txt").unwrap()];
        let target = sanitizer.sanitize("dest").unwrap();
        run_batch(BatchOp::Copy, &sources, Some(&target));

        let copied = root.join("dest/alias.txt");
        assert!(fs::symlink_metadata(&copied).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&copied).unwrap(), "Hello");
    }
}
