use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    flat_name::split_extension,
    flatten::FlattenedFile,
    language::Language,
    normalize::normalize,
    text_util::is_blank,
};

/// Canonical text of one flattened file, ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    /// Same key as the [`FlattenedFile`] it came from.
    pub file_name: String,
    pub origin: PathBuf,
    pub language: Language,
    pub text: String,
}

impl NormalizedDocument {
    pub fn byte_len(&self) -> usize {
        self.text.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The extension has no normalization rules.
    Unsupported,
    /// Nothing left after normalization.
    Empty,
    /// Reading or rewriting the file failed.
    Io(String),
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub file_name: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct NormalizeReport {
    /// Documents in the order of the input file list.
    pub documents: Vec<NormalizedDocument>,
    pub skipped: Vec<SkippedFile>,
}

impl NormalizeReport {
    pub fn skipped_because(&self, reason: &SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == *reason).count()
    }
}

enum Outcome {
    Normalized(NormalizedDocument),
    Skipped(SkippedFile),
}

/// List the files of an existing flat working directory, in name order.
///
/// Files listed this way are their own origin. A name that is not valid
/// UTF-8 is listed in lossy form; it cannot be opened under that name, so
/// [`normalize_corpus`] reports it as an I/O skip.
pub fn list_working_set(dir: &Path) -> Result<Vec<FlattenedFile>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let raw_name = entry.file_name();
        let file_name = raw_name.to_string_lossy().into_owned();
        if raw_name.to_str().is_none() {
            warn!(
                path = %entry.path().display(),
                "file name is not valid UTF-8"
            );
        }
        let (_, ext) = split_extension(&file_name);
        files.push(FlattenedFile {
            extension: ext.to_lowercase(),
            origin: entry.path(),
            file_name,
        });
    }
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(files)
}

/// Normalize every file of the working set in `dir`.
///
/// Files are processed in parallel, but the report keeps input order. Each
/// successfully normalized file is rewritten in place with its canonical
/// text. Unsupported, empty and unreadable files are skipped, left as they
/// are on disk, and recorded in the report.
pub fn normalize_corpus(dir: &Path, files: &[FlattenedFile]) -> NormalizeReport {
    let outcomes: Vec<Outcome> =
        files.par_iter().map(|file| normalize_file(dir, file)).collect();

    let mut report = NormalizeReport::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Normalized(doc) => report.documents.push(doc),
            Outcome::Skipped(skip) => report.skipped.push(skip),
        }
    }

    info!(
        normalized = report.documents.len(),
        unsupported = report.skipped_because(&SkipReason::Unsupported),
        empty = report.skipped_because(&SkipReason::Empty),
        skipped = report.skipped.len(),
        "normalization complete"
    );
    report
}

fn normalize_file(dir: &Path, file: &FlattenedFile) -> Outcome {
    let skip = |reason: SkipReason| {
        Outcome::Skipped(SkippedFile {
            file_name: file.file_name.clone(),
            reason,
        })
    };

    let Some(language) = Language::from_extension(&file.extension) else {
        debug!(file = %file.file_name, "skipping unsupported file type");
        return skip(SkipReason::Unsupported);
    };

    let path = dir.join(&file.file_name);
    let raw = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "cannot read file");
            return skip(SkipReason::Io(e.to_string()));
        }
    };

    let text = normalize(&String::from_utf8_lossy(&raw), language);
    if is_blank(&text) {
        info!(file = %file.file_name, "skipping file, empty after normalization");
        return skip(SkipReason::Empty);
    }

    if let Err(e) = std::fs::write(&path, &text) {
        warn!(file = %path.display(), error = %e, "cannot rewrite file");
        return skip(SkipReason::Io(e.to_string()));
    }
    debug!(file = %file.file_name, %language, bytes = text.len(), "normalized");

    Outcome::Normalized(NormalizedDocument {
        file_name: file.file_name.clone(),
        origin: file.origin.clone(),
        language,
        text,
    })
}
