use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};

pub const ARTIFACT_DIR_ENV_VAR: &str = "CODEVEC_EMBEDDINGS_DIR";
pub const DEFAULT_ARTIFACT_DIR: &str = "embeddings";

/// Directory holding the persisted index, metadata and raw vectors.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    /// Resolve the artifact directory from, in order of priority:
    /// 1. An explicit path (from --out)
    /// 2. The CODEVEC_EMBEDDINGS_DIR environment variable
    /// 3. `./embeddings`
    ///
    /// Nothing is created here; [`ArtifactDir::ensure_exists`] does that
    /// when an index is about to be written.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var(ARTIFACT_DIR_ENV_VAR) {
            PathBuf::from(val)
        } else {
            PathBuf::from(DEFAULT_ARTIFACT_DIR)
        };

        if root.exists() && !root.is_dir() {
            return Err(Error::Config(format!(
                "artifact path is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    /// Create the directory (and parents) if it is missing.
    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            Error::Config(format!(
                "cannot create artifact directory {}: {e}",
                self.root.display()
            ))
        })
    }

    /// Delete the index, metadata and raw vectors files left by an earlier
    /// run. Returns how many files were removed.
    pub fn remove_stale(&self) -> Result<usize> {
        let mut removed = 0;
        for path in [
            self.index_file(),
            self.metadata_file(),
            self.raw_vectors_file(),
        ] {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    warn!(file = %path.display(), "removed stale artifact");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join("code_embeddings.index")
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.root.join("metadata.json")
    }

    pub fn raw_vectors_file(&self) -> PathBuf {
        self.root.join("raw_embeddings.bin")
    }
}
