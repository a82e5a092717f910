use std::io::IsTerminal;

use kdam::{BarExt, tqdm};
use tracing::{debug, info, warn};

use crate::{
    config::PipelineConfig,
    error::{Error, Result},
    ingestion::NormalizedDocument,
    metadata::EmbeddingRecord,
    text_util::truncate_chars,
};

/// A synchronous text-to-vector model.
///
/// Implementations must return vectors of one fixed dimension and should be
/// deterministic for identical input.
pub trait Embedder {
    /// Embed a single document.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;

    /// Embed several documents, one result per input in the same order.
    ///
    /// Override when the backend is faster on batches; a failure must only
    /// affect the document it belongs to.
    fn embed_batch(&mut self, texts: &[&str]) -> Vec<Result<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for &mut E {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&mut self, texts: &[&str]) -> Vec<Result<Vec<f32>>> {
        (**self).embed_batch(texts)
    }
}

/// A document the embedder could not handle. It has no row in the output.
#[derive(Debug, Clone)]
pub struct EmbeddingFailure {
    pub file_name: String,
    pub reason: String,
}

/// Vectors and metadata produced from a set of documents.
///
/// `vectors` is row-major with `records.len()` rows of `dimension` floats,
/// and `records[i].embedding_index == i`.
#[derive(Debug, Default)]
pub struct EmbeddingRun {
    /// Vector width, known once the first document succeeds.
    pub dimension: Option<usize>,
    pub vectors: Vec<f32>,
    pub records: Vec<EmbeddingRecord>,
    pub failures: Vec<EmbeddingFailure>,
}

impl EmbeddingRun {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The vector stored at `embedding_index`.
    pub fn vector(&self, embedding_index: usize) -> Option<&[f32]> {
        let dim = self.dimension?;
        let start = embedding_index.checked_mul(dim)?;
        self.vectors.get(start..start + dim)
    }

    fn push(&mut self, doc: &NormalizedDocument, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::Embedding("embedder returned an empty vector".into()));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::Embedding("embedder returned non-finite values".into()));
        }
        let expected = *self.dimension.get_or_insert(vector.len());
        if vector.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let embedding_index = self.records.len();
        self.vectors.extend_from_slice(&vector);
        self.records.push(EmbeddingRecord {
            file_name: doc.file_name.clone(),
            original_path: doc.origin.clone(),
            embedding_index,
            source_len: doc.byte_len(),
        });
        Ok(())
    }
}

/// Embed `documents` in batches of `config.batch_size`.
///
/// Each text is cut to the configured length budget first. Output order
/// follows input order whatever the batch size. Documents whose embedding
/// fails are logged and listed in [`EmbeddingRun::failures`] instead of
/// aborting the run.
pub fn embed_documents<E: Embedder + ?Sized>(
    embedder: &mut E,
    documents: &[NormalizedDocument],
    config: &PipelineConfig,
) -> Result<EmbeddingRun> {
    config.validate()?;
    let max_chars = config.max_chars();

    info!(
        documents = documents.len(),
        batch_size = config.batch_size,
        "embedding documents"
    );

    let mut pb = tqdm!(
        total = documents.len(),
        desc = "Embedding",
        disable = !std::io::stderr().is_terminal()
    );

    let mut run = EmbeddingRun::default();
    for batch in documents.chunks(config.batch_size) {
        let texts: Vec<&str> = batch
            .iter()
            .map(|doc| truncate_chars(&doc.text, max_chars))
            .collect();

        let results = embedder.embed_batch(&texts);
        if results.len() != batch.len() {
            warn!(
                expected = batch.len(),
                got = results.len(),
                "embedder returned a short batch"
            );
        }

        let mut results = results.into_iter();
        for doc in batch {
            let outcome = results
                .next()
                .unwrap_or_else(|| Err(Error::Embedding("no result returned".into())))
                .and_then(|vector| run.push(doc, vector));

            if let Err(e) = outcome {
                warn!(file = %doc.file_name, error = %e, "failed to embed document");
                run.failures.push(EmbeddingFailure {
                    file_name: doc.file_name.clone(),
                    reason: e.to_string(),
                });
            }
        }

        if let Err(e) = pb.update(batch.len()) {
            debug!(error = %e, "progress bar update failed");
        }
    }

    info!(
        embedded = run.len(),
        failed = run.failures.len(),
        dimension = run.dimension.unwrap_or(0),
        "embedding complete"
    );
    Ok(run)
}
