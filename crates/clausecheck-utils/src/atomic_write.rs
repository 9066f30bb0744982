//! Atomic file writes for reports, cache entries and the history file
//!
//! Content goes to a temporary file in the target directory, is fsynced, then
//! renamed over the target. Readers never observe a half-written file.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Result of an atomic write operation
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Bytes written after line-ending normalization
    pub bytes_written: usize,
    /// Whether the cross-filesystem fallback was used
    pub used_cross_filesystem_fallback: bool,
}

/// Atomically write content to a file using temp file + fsync + rename
///
/// Line endings are normalized to LF. Parent directories are created.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<AtomicWriteResult> {
    let normalized_content = normalize_line_endings(content);
    let mut result = AtomicWriteResult {
        bytes_written: normalized_content.len(),
        ..AtomicWriteResult::default()
    };

    let temp_dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(temp_dir)
        .with_context(|| format!("Failed to create parent directory: {temp_dir}"))?;

    let mut temp_file = NamedTempFile::new_in(temp_dir)
        .with_context(|| format!("Failed to create temporary file in: {temp_dir}"))?;

    temp_file
        .write_all(normalized_content.as_bytes())
        .with_context(|| "Failed to write content to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync temporary file")?;

    let temp_path = temp_file.path().to_path_buf();

    match temp_file.persist(path.as_std_path()) {
        Ok(_) => {}
        Err(e) if is_cross_filesystem_error(&e.error) => {
            result.used_cross_filesystem_fallback = true;
            cross_filesystem_copy_from_path(&temp_path, path)?;
        }
        Err(e) => {
            return Err(anyhow::anyhow!(e.error))
                .with_context(|| format!("Failed to atomically write file: {path}"));
        }
    }

    Ok(result)
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(unix)]
fn is_cross_filesystem_error(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(18) // EXDEV
}

#[cfg(not(unix))]
fn is_cross_filesystem_error(_err: &std::io::Error) -> bool {
    false
}

fn cross_filesystem_copy_from_path(temp_path: &Path, target: &Utf8Path) -> Result<()> {
    let content = fs::read(temp_path)
        .with_context(|| "Failed to read temporary file for cross-filesystem copy")?;

    let target_dir = target.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut target_temp = NamedTempFile::new_in(target_dir)
        .with_context(|| format!("Failed to create temp file in target directory: {target_dir}"))?;

    target_temp
        .write_all(&content)
        .with_context(|| "Failed to write content during cross-filesystem copy")?;
    target_temp
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync during cross-filesystem copy")?;
    target_temp
        .persist(target.as_std_path())
        .map_err(|e| anyhow::anyhow!(e.error))
        .with_context(|| "Failed to persist during cross-filesystem copy")?;

    let _ = fs::remove_file(temp_path);
    Ok(())
}
