//! Tar packing of the staged tree.
//!
//! The staged copy is measured first so byte progress can be reported while
//! packing. A tree with zero total bytes produces no archive at all; the
//! pipeline treats that as a completed no-op rather than shipping an empty
//! tar.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use gds_core::progress::{percent, ProgressSink};
use tracing::{info, instrument};
use walkdir::WalkDir;

/// Total byte size of the regular files under `dir`.
///
/// Directories and symbolic links contribute nothing.
pub fn measure_source(dir: &Path) -> Result<u64> {
    let mut bytes = 0u64;
    for entry in WalkDir::new(dir) {
        let entry = entry.context("Failed to walk staging directory")?;
        if entry.file_type().is_file() {
            bytes += entry
                .metadata()
                .context("Failed to read file metadata")?
                .len();
        }
    }
    Ok(bytes)
}

/// Packs the tree under `source` into a tar file at `archive_path`.
///
/// Symbolic links are carried as link entries and contribute no bytes.
/// Drives `sink` from `start` through byte-progress events to `done`, with
/// the final progress value at exactly 100.
///
/// # Returns
///
/// The number of file bytes packed, or `None` when the tree measures zero
/// bytes. In the `None` case no archive file is written and the sink sees no
/// events.
#[instrument(skip_all, fields(source = %source.display(), archive = %archive_path.display()))]
pub async fn build_archive(
    source: &Path,
    archive_path: &Path,
    sink: Arc<dyn ProgressSink>,
) -> Result<Option<u64>> {
    let source_dir = source.to_path_buf();
    let archive = archive_path.to_path_buf();
    let total =
        tokio::task::spawn_blocking(move || build_archive_blocking(&source_dir, &archive, sink))
            .await
            .context("Archive task failed")??;

    if let Some(bytes) = total {
        info!(bytes, "Archive built");
    }
    Ok(total)
}

fn build_archive_blocking(
    source: &Path,
    archive_path: &Path,
    sink: Arc<dyn ProgressSink>,
) -> Result<Option<u64>> {
    let total = measure_source(source)?;
    if total == 0 {
        return Ok(None);
    }

    sink.start();
    let file = File::create(archive_path)
        .with_context(|| format!("Failed to create archive file: {}", archive_path.display()))?;
    let mut builder = tar::Builder::new(file);
    let processed = Arc::new(AtomicU64::new(0));

    for entry in WalkDir::new(source) {
        let entry = entry.context("Failed to walk staging directory")?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .context("Walked path escaped the staging directory")?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        if entry.path_is_symlink() {
            let link_target = std::fs::read_link(entry.path())
                .with_context(|| format!("Failed to read link: {}", entry.path().display()))?;
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_mode(0o777);
            builder
                .append_link(&mut header, rel, &link_target)
                .with_context(|| format!("Failed to add link to archive: {}", rel.display()))?;
        } else if entry.file_type().is_dir() {
            builder.append_dir(rel, entry.path()).with_context(|| {
                format!("Failed to add directory to archive: {}", rel.display())
            })?;
        } else if entry.file_type().is_file() {
            let metadata = entry.metadata().context("Failed to read file metadata")?;
            let mut header = tar::Header::new_gnu();
            header.set_metadata(&metadata);
            let reader = CountingReader {
                inner: File::open(entry.path()).with_context(|| {
                    format!("Failed to open {} for archiving", entry.path().display())
                })?,
                processed: Arc::clone(&processed),
                total,
                sink: Arc::clone(&sink),
            };
            builder
                .append_data(&mut header, rel, reader)
                .with_context(|| format!("Failed to add file to archive: {}", rel.display()))?;
        }
    }
    builder.finish().context("Failed to finalize archive")?;

    // Per-read events round; the closing event is exact.
    sink.progress(percent(total, total));
    sink.done();
    Ok(Some(total))
}

/// Reader that adds every byte it yields to a shared running count and
/// reports the cumulative percentage to the sink.
struct CountingReader {
    inner: File,
    processed: Arc<AtomicU64>,
    total: u64,
    sink: Arc<dyn ProgressSink>,
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            let done = self.processed.fetch_add(n as u64, Ordering::Relaxed) + n as u64;
            self.sink.progress(percent(done, self.total));
        }
        Ok(n)
    }
}
