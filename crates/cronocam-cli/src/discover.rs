//! Candidate file enumeration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Regular files under `root`, sorted by file name within each directory.
///
/// Only the top level is listed unless `recursive` is set. Unreadable entries
/// are logged and skipped.
pub fn collect_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("Failed to access directory {}", root.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let mut walker = WalkDir::new(root).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable entry"),
        }
    }

    Ok(files)
}

/// Paths listed one per line in `list_path`; blank lines are ignored.
///
/// Fails if any listed path does not exist, before anything is uploaded.
pub fn read_file_list(list_path: &Path) -> Result<Vec<PathBuf>> {
    let contents = std::fs::read_to_string(list_path)
        .with_context(|| format!("Failed to read file list {}", list_path.display()))?;

    let files: Vec<PathBuf> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect();

    for file in &files {
        if !file.exists() {
            anyhow::bail!("File not found: {}", file.display());
        }
    }

    Ok(files)
}
