//! Staging of the source tree.
//!
//! The pipeline never archives the live folder directly. It first copies the
//! tree into a staging directory next to the app config, then prunes
//! dependency directories from the copy. The source stays untouched and the
//! staged tree can be thinned out before packing.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Replaces `staging` with a fresh copy of the `source` tree.
///
/// Any staging directory left over from a previous run is removed first, so
/// files deleted from the source since then do not linger in the copy.
/// Symbolic links are not followed; they are recreated as links in the copy.
///
/// # Arguments
///
/// * `source` - Folder to back up. Must exist and be a directory.
/// * `staging` - Destination for the copy. Created as needed.
///
/// # Returns
///
/// The number of files copied, symbolic links included.
#[instrument(skip_all, fields(source = %source.display(), staging = %staging.display()))]
pub async fn stage_source(source: &Path, staging: &Path) -> Result<u64> {
    let metadata = tokio::fs::metadata(source)
        .await
        .with_context(|| format!("Source folder does not exist: {}", source.display()))?;
    if !metadata.is_dir() {
        bail!("Source path is not a directory: {}", source.display());
    }

    match tokio::fs::remove_dir_all(staging).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| {
                format!("Failed to clear staging directory: {}", staging.display())
            });
        }
    }
    tokio::fs::create_dir_all(staging)
        .await
        .with_context(|| format!("Failed to create staging directory: {}", staging.display()))?;

    let source_dir = source.to_path_buf();
    let staging_dir = staging.to_path_buf();
    let copied = tokio::task::spawn_blocking(move || copy_tree(&source_dir, &staging_dir))
        .await
        .context("Staging copy task failed")??;

    info!(files = copied, "Source staged");
    Ok(copied)
}

/// Mirrors `source` under `staging`. Blocking; run on a blocking thread.
fn copy_tree(source: &Path, staging: &Path) -> Result<u64> {
    let mut copied = 0u64;
    for entry in WalkDir::new(source) {
        let entry = entry.context("Failed to walk source folder")?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .context("Walked path escaped the source folder")?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = staging.join(rel);
        if entry.path_is_symlink() {
            let link_target = std::fs::read_link(entry.path())
                .with_context(|| format!("Failed to read link: {}", entry.path().display()))?;
            std::os::unix::fs::symlink(&link_target, &target).with_context(|| {
                format!("Failed to recreate link {} in staging", entry.path().display())
            })?;
            copied += 1;
        } else if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {} to staging", entry.path().display()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Removes every directory named `marker` from the tree under `root`.
///
/// A matching directory is dropped whole; the walk does not descend into it
/// looking for nested matches. Files that happen to carry the marker name are
/// kept.
///
/// # Returns
///
/// The number of directories removed.
#[instrument(skip_all, fields(root = %root.display(), marker))]
pub async fn prune_marker_dirs(root: &Path, marker: &str) -> Result<u32> {
    let root_dir = root.to_path_buf();
    let marker_name = marker.to_string();
    let pruned = tokio::task::spawn_blocking(move || prune_tree(&root_dir, &marker_name))
        .await
        .context("Staging prune task failed")??;

    if pruned > 0 {
        info!(directories = pruned, "Pruned dependency directories");
    }
    Ok(pruned)
}

fn prune_tree(root: &Path, marker: &str) -> Result<u32> {
    let mut doomed: Vec<PathBuf> = Vec::new();
    let mut walker = WalkDir::new(root).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.context("Failed to walk staging directory")?;
        if entry.file_type().is_dir() && entry.file_name().to_str() == Some(marker) {
            doomed.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }
    for dir in &doomed {
        std::fs::remove_dir_all(dir)
            .with_context(|| format!("Failed to remove {}", dir.display()))?;
        debug!(path = %dir.display(), "Removed dependency directory");
    }
    Ok(doomed.len() as u32)
}
