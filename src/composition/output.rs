//! Temporary workspace and atomic publishing of run outputs.
//!
//! Everything is written to a temporary file in the destination directory
//! and renamed into place only once it is complete. Dropping a staged file
//! removes it, so failed runs leave nothing behind at the destination.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder as TempFileBuilder, NamedTempFile, TempDir};
use tracing::debug;

use crate::error::{CompositionError, Result};

/// Per-run scratch directory. Auto-cleaned when dropped.
pub fn create_workspace(base: Option<&Path>) -> Result<TempDir> {
    let workspace = match base {
        Some(base) => {
            std::fs::create_dir_all(base)?;
            TempFileBuilder::new().prefix("news-compositor-").tempdir_in(base)?
        }
        None => TempFileBuilder::new().prefix("news-compositor-").tempdir()?,
    };
    debug!("Workspace: {:?}", workspace.path());
    Ok(workspace)
}

/// Empty temporary file next to `destination`, with the same extension
pub fn stage_next_to(destination: &Path) -> Result<NamedTempFile> {
    let dir = parent_dir(destination);
    std::fs::create_dir_all(&dir)?;

    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let suffix = destination
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    Ok(TempFileBuilder::new()
        .prefix(&format!(".{}.", name))
        .suffix(&suffix)
        .tempfile_in(dir)?)
}

/// Staged file holding `bytes`, ready to publish
pub fn stage_bytes(destination: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut staged = stage_next_to(destination)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

/// Move a staged file over `destination`
pub fn publish(staged: NamedTempFile, destination: &Path) -> Result<PathBuf> {
    staged.persist(destination).map_err(|e| CompositionError::OutputFailed {
        reason: format!("could not publish {}: {}", destination.display(), e.error),
    })?;
    debug!("Published {:?}", destination);
    Ok(destination.to_path_buf())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
