use candle_core::{Device, Tensor};
use pylate_rs::ColBERT;
use tracing::{debug, info, warn};

use crate::{
    embedding::Embedder,
    error::{Error, Result},
};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";
pub const MODEL_ENV_VAR: &str = "CODEVEC_MODEL";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

fn backend_error(context: &str) -> impl Fn(candle_core::Error) -> Error + '_ {
    move |e| Error::Embedding(format!("{context}: {e}"))
}

/// Owns the ColBERT model and loads it on first use.
///
/// Each document is reduced to a single vector: the output row at the first
/// token position.
pub struct ModelManager {
    model: Option<ColBERT>,
    model_id: String,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager {
    /// Creates a new `ModelManager`. The model ID is resolved from:
    /// 1. The `CODEVEC_MODEL` environment variable, if set
    /// 2. Otherwise, the default model (`lightonai/GTE-ModernColBERT-v1`)
    ///
    /// Nothing is loaded until the first embedding call.
    pub fn new() -> Self {
        let model_id = std::env::var(MODEL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());

        Self {
            model: None,
            model_id,
        }
    }

    /// Creates a `ModelManager` with an explicit model ID, bypassing
    /// environment variable resolution.
    pub fn with_model_id(model_id: String) -> Self {
        Self {
            model: None,
            model_id,
        }
    }

    /// `--model` when given, else the environment/default.
    pub fn from_option(model_id: Option<String>) -> Self {
        match model_id {
            Some(id) => Self::with_model_id(id),
            None => Self::new(),
        }
    }

    /// Returns the model ID that will be (or has been) loaded.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns `true` if the model has already been loaded into memory.
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Ensures the model is loaded, downloading from HuggingFace Hub if needed.
    fn ensure_loaded(&mut self) -> Result<&mut ColBERT> {
        if self.model.is_none() {
            info!(model = %self.model_id, "loading model");
            let colbert: ColBERT = ColBERT::from(&self.model_id)
                .with_device(default_device())
                .try_into()
                .map_err(|e| {
                    Error::Embedding(format!(
                        "cannot load model {}: {e}",
                        self.model_id
                    ))
                })?;
            self.model = Some(colbert);
        }

        self.model.as_mut().ok_or_else(|| {
            Error::Embedding(format!("model {} not loaded", self.model_id))
        })
    }

    /// Encodes document texts into a `[batch, tokens, dimension]` tensor.
    pub fn encode_documents(&mut self, texts: &[String]) -> Result<Tensor> {
        let model = self.ensure_loaded()?;
        model
            .encode(texts, false)
            .map_err(|e| Error::Embedding(format!("encode failed: {e}")))
    }
}

/// Take the first token row of every document in a `[B, T, D]` tensor.
fn pool_first_token(embeddings: &Tensor) -> Result<Vec<Vec<f32>>> {
    let (batch, _tokens, _dim) = embeddings
        .dims3()
        .map_err(backend_error("unexpected embedding tensor shape"))?;

    (0..batch)
        .map(|i| {
            embeddings
                .get(i)
                .and_then(|doc| doc.get(0))
                .and_then(|row| row.to_vec1::<f32>())
                .map_err(backend_error("cannot read document embedding"))
        })
        .collect()
}

impl Embedder for ModelManager {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let tensor = self.encode_documents(&[text.to_string()])?;
        pool_first_token(&tensor)?
            .pop()
            .ok_or_else(|| Error::Embedding("model returned no rows".into()))
    }

    /// Encode the whole batch at once, retrying one document at a time if the
    /// batched call fails so a bad document only costs its own slot.
    fn embed_batch(&mut self, texts: &[&str]) -> Vec<Result<Vec<f32>>> {
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let batched = self
            .encode_documents(&owned)
            .and_then(|tensor| pool_first_token(&tensor));

        match batched {
            Ok(rows) if rows.len() == texts.len() => {
                debug!(documents = rows.len(), "embedded batch");
                rows.into_iter().map(Ok).collect()
            }
            Ok(rows) => {
                warn!(
                    expected = texts.len(),
                    got = rows.len(),
                    "batch size mismatch, retrying documents one by one"
                );
                texts.iter().map(|text| self.embed(text)).collect()
            }
            Err(e) => {
                warn!(error = %e, "batch failed, retrying documents one by one");
                texts.iter().map(|text| self.embed(text)).collect()
            }
        }
    }
}
