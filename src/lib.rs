//! codevec - turn a directory of source repositories into a searchable
//! vector index.
//!
//! The pipeline runs in four stages, strictly one after another:
//!
//! 1. [`flatten`] copies every accepted file of every repository into one
//!    flat working directory, giving each a unique name.
//! 2. [`ingestion`] normalizes the working set (comments, strings, imports and
//!    whitespace removed, see [`normalize`]).
//! 3. [`embedding`] turns each canonical text into one vector through an
//!    [`Embedder`], such as the ColBERT-backed [`ModelManager`].
//! 4. [`search`] keeps the vectors with the metadata that maps them back to
//!    files, and answers exact nearest-neighbour queries.
//!
//! # Quick start
//!
//! ```no_run
//! use codevec::{ArtifactDir, ModelManager, PipelineConfig, VectorIndex};
//! use codevec::pipeline::run_pipeline;
//!
//! let config = PipelineConfig::default();
//! let artifacts = ArtifactDir::resolve(None).unwrap();
//! let mut model = ModelManager::new();
//!
//! let report = run_pipeline(
//!     "repos".as_ref(),
//!     None,
//!     &artifacts,
//!     &mut model,
//!     &config,
//! )
//! .unwrap();
//! println!("embedded {} files", report.embedded);
//!
//! let index = VectorIndex::load(&artifacts).unwrap();
//! for hit in index.neighbors_of("main.c", 5).unwrap() {
//!     println!("{} ({:.3})", hit.record.file_name, hit.distance);
//! }
//! ```

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod embedding_db;
pub mod error;
pub mod flat_name;
pub mod flatten;
pub mod index;
pub mod ingestion;
pub mod language;
pub mod metadata;
pub mod model_manager;
pub mod normalize;
pub mod pipeline;
pub mod raw_vectors;
pub mod script_comments;
pub mod search;
pub mod text_util;
pub mod walker;

pub use artifacts::ArtifactDir;
pub use config::PipelineConfig;
pub use embedding::Embedder;
pub use embedding_db::EmbeddingDb;
pub use error::{Error, Result};
pub use language::Language;
pub use model_manager::ModelManager;
pub use search::VectorIndex;
