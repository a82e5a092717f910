//! Pipeline configuration.
//!
//! Every stage receives a [`PipelineConfig`] explicitly; there is no global
//! state. Values are layered: built-in defaults, then an optional JSON file,
//! then environment variables, then whatever the caller sets last (usually
//! command-line flags).
//!
//! The length budget is expressed in model tokens. Documents are truncated
//! by characters before they reach the embedder, using a rough 4 characters
//! per token for source code.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Approximate characters per token for source text.
pub const CHARS_PER_TOKEN: usize = 4;

/// Default token budget per document.
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Default number of documents per embedding batch.
pub const DEFAULT_BATCH_SIZE: usize = 4;

/// Default name of the flat working directory created under the root.
pub const DEFAULT_WORKING_DIR: &str = "codefiles";

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".java", ".c", ".cc", ".cpp", ".h", ".js", ".xml", ".html",
];

pub const BATCH_SIZE_ENV_VAR: &str = "CODEVEC_BATCH_SIZE";
pub const MAX_LENGTH_ENV_VAR: &str = "CODEVEC_MAX_LENGTH";

/// Settings shared by the flattener, normalizer and orchestrator.
///
/// # Examples
///
/// ```
/// use codevec::config::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert!(config.accepts_extension("PY"));
/// assert_eq!(config.max_chars(), 512 * 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Accepted extensions, lower-cased and dot-prefixed.
    pub extensions: Vec<String>,
    /// Documents per embedding batch.
    pub batch_size: usize,
    /// Token budget per document.
    pub max_length: usize,
    /// Name of the working directory used when no destination is given.
    pub working_dir_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_length: DEFAULT_MAX_LENGTH,
            working_dir_name: DEFAULT_WORKING_DIR.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields keep their
    /// defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config: Self = serde_json::from_str(&contents)?;
        config.extensions = canonical_extensions(&config.extensions);
        Ok(config)
    }

    /// Resolve defaults, an optional JSON file and the environment.
    pub fn resolve(file: Option<&Path>) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Override numeric settings from `CODEVEC_BATCH_SIZE` and
    /// `CODEVEC_MAX_LENGTH`.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_usize(BATCH_SIZE_ENV_VAR)? {
            self.batch_size = v;
        }
        if let Some(v) = env_usize(MAX_LENGTH_ENV_VAR)? {
            self.max_length = v;
        }
        Ok(())
    }

    /// Replace the accepted extensions, canonicalizing each entry.
    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.extensions = canonical_extensions(extensions);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.max_length == 0 {
            return Err(Error::Config("max_length must be at least 1".into()));
        }
        if self.extensions.is_empty() {
            return Err(Error::Config(
                "at least one file extension is required".into(),
            ));
        }
        if self.working_dir_name.is_empty()
            || self.working_dir_name.contains(['/', '\\'])
        {
            return Err(Error::Config(format!(
                "invalid working directory name: '{}'",
                self.working_dir_name
            )));
        }
        Ok(())
    }

    /// Case-insensitive membership test. Accepts `py`, `.py` or `.PY`.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        let ext = canonical_extension(ext);
        self.extensions.iter().any(|e| *e == ext)
    }

    /// Character budget derived from the token budget.
    pub fn max_chars(&self) -> usize {
        self.max_length.saturating_mul(CHARS_PER_TOKEN).max(1)
    }
}

/// Lower-case an extension and make sure it starts with a dot.
pub fn canonical_extension(ext: &str) -> String {
    let lower = ext.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

fn canonical_extensions<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(extensions.len());
    for ext in extensions {
        let ext = canonical_extension(ext.as_ref());
        if ext.len() > 1 && !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}

fn env_usize(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|_| {
            Error::Config(format!("{name} must be a positive integer: {raw}"))
        }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct SentenceTransformersConfig {
    document_length: Option<usize>,
}

/// Resolve the token budget for a model.
///
/// Local model directories may carry `config_sentence_transformers.json`
/// with a `document_length` field; remote model IDs fall back to
/// `fallback`.
pub fn resolve_max_length(model_id: &str, fallback: usize) -> usize {
    let model_path = Path::new(model_id);
    if model_path.is_dir()
        && let Some(len) = load_document_length(model_path)
        && len > 0
    {
        return len;
    }
    fallback
}

fn load_document_length(model_dir: &Path) -> Option<usize> {
    let config_path = model_dir.join("config_sentence_transformers.json");
    let contents = std::fs::read_to_string(config_path).ok()?;
    let config: SentenceTransformersConfig =
        serde_json::from_str(&contents).ok()?;
    config.document_length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.max_length, 512);
        assert_eq!(config.extensions.len(), 9);
    }

    #[test]
    fn extensions_are_case_insensitive() {
        let config = PipelineConfig::default();
        assert!(config.accepts_extension(".JAVA"));
        assert!(config.accepts_extension("html"));
        assert!(!config.accepts_extension(".rs"));
    }

    #[test]
    fn with_extensions_canonicalizes_and_dedups() {
        let config =
            PipelineConfig::default().with_extensions(&["PY", ".py", "Js", ""]);
        assert_eq!(config.extensions, vec![".py", ".js"]);
    }

    #[test]
    fn validate_rejects_zero_batch() {
        let config = PipelineConfig {
            batch_size: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_empty_extensions() {
        let config = PipelineConfig::default().with_extensions::<&str>(&[]);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn json_file_overrides_some_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("codevec.json");
        std::fs::write(&path, r#"{"batch_size": 16, "extensions": ["PY"]}"#)
            .unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.max_length, DEFAULT_MAX_LENGTH);
        assert_eq!(config.extensions, vec![".py"]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("codevec.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&path),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn max_length_from_local_model_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config_sentence_transformers.json"),
            r#"{"document_length": 300}"#,
        )
        .unwrap();

        let model = tmp.path().to_string_lossy().to_string();
        assert_eq!(resolve_max_length(&model, 512), 300);
    }

    #[test]
    fn max_length_falls_back_for_remote_ids() {
        assert_eq!(resolve_max_length("lightonai/ColBERT-Zero", 512), 512);
    }
}
