use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{
    artifacts::ArtifactDir,
    config::PipelineConfig,
    embedding::{Embedder, EmbeddingFailure, embed_documents},
    error::Result,
    flatten::{CopyFailure, flatten_repositories},
    ingestion::{SkipReason, SkippedFile, normalize_corpus},
    search::VectorIndex,
};

/// What happened to every file in a full run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub working_dir: PathBuf,
    pub copied: usize,
    pub copy_failures: Vec<CopyFailure>,
    pub normalized: usize,
    pub skipped: Vec<SkippedFile>,
    pub embedded: usize,
    pub embedding_failures: Vec<EmbeddingFailure>,
    /// Vector width, when at least one document was embedded.
    pub dimension: Option<usize>,
    /// The index that was written, still in memory.
    pub index: Option<VectorIndex>,
    /// Artifacts of an earlier run deleted because nothing was embedded.
    pub stale_removed: usize,
}

impl PipelineReport {
    pub fn index_written(&self) -> bool {
        self.index.is_some()
    }

    pub fn skipped_because(&self, reason: &SkipReason) -> usize {
        self.skipped.iter().filter(|s| s.reason == *reason).count()
    }
}

/// Flatten, normalize, embed and index the repositories under `root`.
///
/// Stages run one after another. Only configuration problems and an invalid
/// root abort the run; every per-file problem is logged and counted in the
/// report. When no document could be embedded, no index is written and
/// the artifacts of any earlier run in `artifacts` are deleted.
pub fn run_pipeline(
    root: &Path,
    dest: Option<&Path>,
    artifacts: &ArtifactDir,
    embedder: &mut dyn Embedder,
    config: &PipelineConfig,
) -> Result<PipelineReport> {
    config.validate()?;

    let flat = flatten_repositories(root, dest, config)?;
    let normalized = normalize_corpus(&flat.target_dir, &flat.files);
    let mut run = embed_documents(embedder, &normalized.documents, config)?;

    let mut report = PipelineReport {
        working_dir: flat.target_dir,
        copied: flat.files.len(),
        copy_failures: flat.failures,
        normalized: normalized.documents.len(),
        skipped: normalized.skipped,
        embedded: run.len(),
        embedding_failures: std::mem::take(&mut run.failures),
        dimension: run.dimension,
        ..PipelineReport::default()
    };

    match VectorIndex::from_run(run)? {
        Some(index) => {
            index.save(artifacts)?;
            report.index = Some(index);
        }
        None => {
            warn!("no documents were embedded, index not written");
            report.stale_removed = artifacts.remove_stale()?;
        }
    }

    info!(
        copied = report.copied,
        copy_failures = report.copy_failures.len(),
        normalized = report.normalized,
        skipped = report.skipped.len(),
        embedded = report.embedded,
        embedding_failures = report.embedding_failures.len(),
        "pipeline complete"
    );
    Ok(report)
}
