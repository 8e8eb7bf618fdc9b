//! Input discovery: list the invoice files of a directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern, glob_with};
use tracing::{debug, info, warn};

use crate::error::InputError;
use crate::models::config::InputConfig;

/// List invoice files in `dir` in a deterministic order.
///
/// Files are matched on their extension, ignoring case, and sorted by their
/// path relative to `dir`. A missing directory yields an empty list and a
/// warning; a path that exists but cannot be listed is an error.
pub fn enumerate_invoices(dir: &Path, config: &InputConfig) -> Result<Vec<PathBuf>, InputError> {
    if !dir.exists() {
        warn!("Input directory not found: {}", dir.display());
        return Ok(Vec::new());
    }

    if !dir.is_dir() {
        return Err(InputError::NotADirectory(dir.to_path_buf()));
    }

    // Surface permission problems that glob would silently skip
    fs::read_dir(dir).map_err(|e| InputError::Unreadable {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let dir_str = dir.to_str().ok_or_else(|| InputError::Unreadable {
        path: dir.to_path_buf(),
        reason: "path is not valid UTF-8".to_string(),
    })?;

    let extension = config.extension.trim_start_matches('.');
    let pattern = if config.recursive {
        format!("{}/**/*.{}", Pattern::escape(dir_str), Pattern::escape(extension))
    } else {
        format!("{}/*.{}", Pattern::escape(dir_str), Pattern::escape(extension))
    };
    debug!("Scanning with pattern {}", pattern);

    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let entries = glob_with(&pattern, options).map_err(|e| InputError::Unreadable {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();

    files.sort_by(|a, b| source_name(dir, a).cmp(&source_name(dir, b)));

    if files.is_empty() {
        warn!("No .{} files found in {}", extension, dir.display());
    } else {
        info!("Found {} invoice files in {}", files.len(), dir.display());
    }

    Ok(files)
}

/// Name identifying `path` in records: relative to `dir`, `/`-separated.
///
/// `./` components are ignored on both sides, so `Data` and `./Data` name
/// files the same way.
pub fn source_name(dir: &Path, path: &Path) -> String {
    let dir = plain_components(dir);
    let path = plain_components(path);
    let relative = path.strip_prefix(dir.as_slice()).unwrap_or(path.as_slice());

    relative
        .iter()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn plain_components(path: &Path) -> Vec<Component<'_>> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
