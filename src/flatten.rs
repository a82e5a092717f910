//! Corpus flattening: copy every accepted file from a tree of repositories
//! into one flat working directory.

use std::{
    fs::{File, FileTimes},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    config::PipelineConfig,
    error::{Error, Result},
    flat_name::FlatNamer,
    walker::{self, SourceFile},
};

/// A file copied into the flat working set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedFile {
    /// Unique name inside the working directory. Never changes afterwards.
    pub file_name: String,
    /// Where the file was copied from.
    pub origin: PathBuf,
    /// Lower-cased, dot-prefixed extension.
    pub extension: String,
}

/// A file that could not be copied, or a path that could not be read while
/// looking for files. The rest of the run is unaffected.
#[derive(Debug, Clone)]
pub struct CopyFailure {
    pub origin: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct FlattenReport {
    /// The working directory that now holds the flat corpus.
    pub target_dir: PathBuf,
    /// Copied files in processing order.
    pub files: Vec<FlattenedFile>,
    pub failures: Vec<CopyFailure>,
}

/// Default working directory for a root: `<root>/<working_dir_name>`.
pub fn default_target(root: &Path, config: &PipelineConfig) -> PathBuf {
    root.join(&config.working_dir_name)
}

/// Flatten all repositories under `root` into `target_dir` (or the default
/// working directory when `None`).
///
/// Fails before touching the filesystem when `root` is not a directory.
/// Individual copy failures are collected in the report and logged; files
/// already copied stay in place.
pub fn flatten_repositories(
    root: &Path,
    target_dir: Option<&Path>,
    config: &PipelineConfig,
) -> Result<FlattenReport> {
    if !root.is_dir() {
        return Err(Error::InvalidRoot(root.to_path_buf()));
    }
    config.validate()?;

    let target_dir = target_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_target(root, config));
    std::fs::create_dir_all(&target_dir)?;

    let discovery = walker::discover_sources(
        root,
        config,
        std::slice::from_ref(&target_dir),
    )?;
    let sources = discovery.sources;
    info!(
        count = sources.len(),
        target = %target_dir.display(),
        "flattening source files"
    );

    let mut namer = FlatNamer::new(&target_dir);
    let mut files = Vec::with_capacity(sources.len());
    let mut failures: Vec<CopyFailure> = discovery
        .unreadable
        .into_iter()
        .map(|u| CopyFailure {
            origin: u.path,
            reason: u.reason,
        })
        .collect();

    for source in sources {
        let file_name = namer.claim(&source.file_name);
        let dest = target_dir.join(&file_name);

        match copy_preserving_mtime(&source.path, &dest) {
            Ok(()) => {
                debug!(
                    from = %source.path.display(),
                    to = %dest.display(),
                    "copied"
                );
                files.push(flattened(source, file_name));
            }
            Err(e) => {
                warn!(
                    from = %source.path.display(),
                    error = %e,
                    "failed to copy file"
                );
                failures.push(CopyFailure {
                    origin: source.path,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        copied = files.len(),
        failed = failures.len(),
        target = %target_dir.display(),
        "flattening complete"
    );

    Ok(FlattenReport {
        target_dir,
        files,
        failures,
    })
}

fn flattened(source: SourceFile, file_name: String) -> FlattenedFile {
    FlattenedFile {
        file_name,
        origin: source.path,
        extension: source.extension,
    }
}

/// Copy bytes and carry over access/modification times.
fn copy_preserving_mtime(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::copy(from, to)?;

    let meta = std::fs::metadata(from)?;
    let mut times = FileTimes::new();
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    File::options().write(true).open(to)?.set_times(times)
}
