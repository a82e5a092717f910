use std::{
    fs::DirEntry,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{config::PipelineConfig, error::Result, flat_name::split_extension};

/// A source file discovered in one of the repositories under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute origin path.
    pub path: PathBuf,
    /// Bare file name, used as the starting point for the flat name.
    pub file_name: String,
    /// Lower-cased, dot-prefixed extension.
    pub extension: String,
}

/// Something under the root that could not be listed or inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unreadable {
    /// The entry, or the directory being listed when the entry itself is
    /// unknown.
    pub path: PathBuf,
    pub reason: String,
}

/// Result of walking the repositories under a root.
#[derive(Debug, Default)]
pub struct Discovery {
    pub sources: Vec<SourceFile>,
    pub unreadable: Vec<Unreadable>,
}

/// Walk every repository (direct subdirectory) of `root` and collect files
/// with an accepted extension.
///
/// Repositories are visited in name order and each one is walked depth
/// first with entries in name order, so the result is stable for a fixed
/// filesystem state. Plain files directly under `root` are not part of any
/// repository and are ignored. Paths listed in `skip` (typically the flat
/// output directory) are never entered. Directories and entries that cannot
/// be read are logged, listed in [`Discovery::unreadable`] and skipped.
pub fn discover_sources(
    root: &Path,
    config: &PipelineConfig,
    skip: &[PathBuf],
) -> Result<Discovery> {
    let root = root.canonicalize()?;
    let skip: Vec<PathBuf> =
        skip.iter().filter_map(|p| p.canonicalize().ok()).collect();

    let mut found = Discovery::default();
    for entry in sorted_entries(&root, &mut found.unreadable)? {
        let path = entry.path();
        if !path.is_dir() || is_skipped(&path, &skip) {
            continue;
        }
        debug!(repository = %path.display(), "walking repository");
        walk_dir(&path, config, &skip, &mut found);
    }

    Ok(found)
}

fn walk_dir(
    current: &Path,
    config: &PipelineConfig,
    skip: &[PathBuf],
    found: &mut Discovery,
) {
    let entries = match sorted_entries(current, &mut found.unreadable) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %current.display(), error = %e, "cannot read directory");
            found.unreadable.push(Unreadable {
                path: current.to_path_buf(),
                reason: e.to_string(),
            });
            return;
        }
    };

    for entry in entries {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat entry");
                found.unreadable.push(Unreadable {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if file_type.is_dir() {
            if !is_skipped(&path, skip) {
                walk_dir(&path, config, skip, found);
            }
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file())
        {
            // Symlinked directories are not followed.
            if let Some(source) = make_source(&path, config) {
                found.sources.push(source);
            }
        }
    }
}

/// Entries of `dir` in name order. Entries that fail to read are recorded
/// against `dir`.
fn sorted_entries(
    dir: &Path,
    unreadable: &mut Vec<Unreadable>,
) -> std::io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read directory entry");
                unreadable.push(Unreadable {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

fn is_skipped(path: &Path, skip: &[PathBuf]) -> bool {
    if skip.is_empty() {
        return false;
    }
    path.canonicalize()
        .map(|p| skip.iter().any(|s| *s == p))
        .unwrap_or(false)
}

/// Non-UTF-8 names are kept in lossy form so the file still gets a flat
/// name.
fn make_source(path: &Path, config: &PipelineConfig) -> Option<SourceFile> {
    let raw_name = path.file_name()?;
    let file_name = raw_name.to_string_lossy().into_owned();
    if raw_name.to_str().is_none() {
        warn!(
            path = %path.display(),
            name = %file_name,
            "file name is not valid UTF-8, using a lossy name"
        );
    }
    let (_, ext) = split_extension(&file_name);
    if ext.is_empty() || !config.accepts_extension(ext) {
        return None;
    }
    Some(SourceFile {
        path: path.to_path_buf(),
        extension: ext.to_lowercase(),
        file_name,
    })
}
