use serde::Serialize;
use tracing::{debug, info};

use crate::{
    artifacts::ArtifactDir,
    embedding::EmbeddingRun,
    embedding_db::EmbeddingDb,
    error::{Error, Result},
    index::FlatIndex,
    metadata::{EmbeddingRecord, check_alignment, read_metadata, write_metadata},
    raw_vectors::{read_raw_vectors, write_raw_vectors},
};

/// A search result resolved to the file it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub distance: f32,
    #[serde(flatten)]
    pub record: EmbeddingRecord,
}

/// Vector index plus the metadata that maps each row back to a file.
///
/// Row `i` of the index always belongs to `records[i]`.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    index: FlatIndex,
    records: Vec<EmbeddingRecord>,
}

impl VectorIndex {
    /// Pair a row-major vector array with its records.
    pub fn build(
        dimension: usize,
        vectors: Vec<f32>,
        records: Vec<EmbeddingRecord>,
    ) -> Result<Self> {
        let index = FlatIndex::from_rows(dimension, vectors)?;
        if index.len() != records.len() {
            return Err(Error::Corrupt {
                artifact: "metadata",
                reason: format!(
                    "{} vectors but {} records",
                    index.len(),
                    records.len()
                ),
            });
        }
        check_alignment(&records)?;
        Ok(Self { index, records })
    }

    /// Index the successful part of an embedding run.
    ///
    /// Returns `None` when nothing was embedded.
    pub fn from_run(run: EmbeddingRun) -> Result<Option<Self>> {
        let Some(dimension) = run.dimension else {
            return Ok(None);
        };
        Self::build(dimension, run.vectors, run.records).map(Some)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    /// Look up an indexed file by its flat name.
    pub fn find(&self, file_name: &str) -> Option<&EmbeddingRecord> {
        self.records.iter().find(|r| r.file_name == file_name)
    }

    /// The stored vector of an indexed file.
    pub fn vector_of(&self, file_name: &str) -> Option<&[f32]> {
        let record = self.find(file_name)?;
        self.index.vector(record.embedding_index)
    }

    /// The `k` files closest to `query`, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let neighbors = self.index.search(query, k)?;
        Ok(self.resolve(neighbors.into_iter().map(|n| (n.position, n.distance))))
    }

    /// The `k` files closest to an already indexed file, excluding itself.
    pub fn neighbors_of(
        &self,
        file_name: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let record = self.find(file_name).ok_or_else(|| Error::NotFound {
            kind: "indexed file",
            name: file_name.to_string(),
        })?;
        let own = record.embedding_index;
        let query = self.index.vector(own).ok_or_else(|| Error::Corrupt {
            artifact: "index",
            reason: format!("no row {own} for {file_name}"),
        })?;

        let neighbors = self.index.search(query, k.saturating_add(1))?;
        Ok(self.resolve(
            neighbors
                .into_iter()
                .filter(|n| n.position != own)
                .take(k)
                .map(|n| (n.position, n.distance)),
        ))
    }

    fn resolve(
        &self,
        neighbors: impl Iterator<Item = (usize, f32)>,
    ) -> Vec<SearchHit> {
        neighbors
            .enumerate()
            .filter_map(|(i, (position, distance))| {
                Some(SearchHit {
                    rank: i + 1,
                    distance,
                    record: self.records.get(position)?.clone(),
                })
            })
            .collect()
    }

    /// Write the index file, the metadata and the raw vectors.
    pub fn save(&self, artifacts: &ArtifactDir) -> Result<()> {
        let dimension = self.dimension();
        let data = self.index.as_slice();

        artifacts.ensure_exists()?;
        EmbeddingDb::create(&artifacts.index_file(), dimension, data)?;
        write_metadata(&artifacts.metadata_file(), &self.records)?;
        write_raw_vectors(&artifacts.raw_vectors_file(), dimension, data)?;

        info!(
            vectors = self.len(),
            dimension,
            dir = %artifacts.root().display(),
            "index written"
        );
        Ok(())
    }

    /// Load a saved index and check that its artifacts agree.
    ///
    /// The raw vectors file is optional; when present it must match the
    /// index exactly.
    pub fn load(artifacts: &ArtifactDir) -> Result<Self> {
        let db = EmbeddingDb::open(&artifacts.index_file())?;
        let (dimension, data) = db.load_all()?;

        let metadata_file = artifacts.metadata_file();
        if !metadata_file.is_file() {
            return Err(Error::NotFound {
                kind: "metadata",
                name: metadata_file.display().to_string(),
            });
        }
        let records = read_metadata(&metadata_file)?;

        let raw_file = artifacts.raw_vectors_file();
        if raw_file.is_file() {
            let (raw_dimension, raw_data) = read_raw_vectors(&raw_file)?;
            if raw_dimension != dimension || raw_data != data {
                return Err(Error::Corrupt {
                    artifact: "raw vectors",
                    reason: "does not match the index file".into(),
                });
            }
        } else {
            debug!(path = %raw_file.display(), "no raw vectors file");
        }

        let index = Self::build(dimension, data, records)?;
        debug!(vectors = index.len(), dimension, "index loaded");
        Ok(index)
    }
}

/// Format hits for terminal output.
pub fn format_human(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.\n".to_string();
    }

    let mut out = String::new();
    for hit in hits {
        out.push_str(&format!(
            "{:>3}. [{:.4}] {}\n     {}\n",
            hit.rank,
            hit.distance,
            hit.record.file_name,
            hit.record.original_path.display()
        ));
    }
    out.push_str(&format!("\n{} result(s)\n", hits.len()));
    out
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    result_count: usize,
    results: &'a [SearchHit],
}

/// Format hits as a single JSON object.
pub fn format_json(hits: &[SearchHit], query: &str) -> Result<String> {
    Ok(serde_json::to_string(&JsonOutput {
        query,
        result_count: hits.len(),
        results: hits,
    })?)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn record(name: &str, index: usize) -> EmbeddingRecord {
        EmbeddingRecord {
            file_name: name.to_string(),
            original_path: PathBuf::from("/repos/r").join(name),
            embedding_index: index,
            source_len: 1,
        }
    }

    fn sample() -> VectorIndex {
        VectorIndex::build(
            2,
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 3.0],
            vec![record("a.c", 0), record("b.c", 1), record("c.py", 2)],
        )
        .unwrap()
    }

    #[test]
    fn search_resolves_records() {
        let hits = sample().search(&[0.9, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.file_name, "b.c");
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].record.file_name, "a.c");
        assert_eq!(hits[1].rank, 2);
    }

    #[test]
    fn neighbors_exclude_self() {
        let hits = sample().neighbors_of("a.c", 5).unwrap();
        let names: Vec<_> =
            hits.iter().map(|h| h.record.file_name.as_str()).collect();
        assert_eq!(names, vec!["b.c", "c.py"]);
        assert_eq!(hits[0].rank, 1);
    }

    #[test]
    fn neighbors_of_unknown_file() {
        assert!(matches!(
            sample().neighbors_of("nope.c", 1),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn build_rejects_count_mismatch() {
        let err = VectorIndex::build(2, vec![0.0; 4], vec![record("a.c", 0)]);
        assert!(matches!(err, Err(Error::Corrupt { .. })));
    }

    #[test]
    fn build_rejects_misaligned_records() {
        let err = VectorIndex::build(
            1,
            vec![0.0, 1.0],
            vec![record("a.c", 1), record("b.c", 0)],
        );
        assert!(matches!(err, Err(Error::Corrupt { .. })));
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::resolve(Some(tmp.path())).unwrap();
        let index = sample();
        index.save(&artifacts).unwrap();

        assert!(artifacts.index_file().is_file());
        assert!(artifacts.metadata_file().is_file());
        assert!(artifacts.raw_vectors_file().is_file());

        let loaded = VectorIndex::load(&artifacts).unwrap();
        assert_eq!(loaded.records(), index.records());
        assert_eq!(loaded.dimension(), 2);
        assert_eq!(
            loaded.search(&[0.0, 2.5], 3).unwrap(),
            index.search(&[0.0, 2.5], 3).unwrap()
        );
    }

    #[test]
    fn save_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested").join("out");
        let artifacts = ArtifactDir::resolve(Some(out.as_path())).unwrap();
        assert!(!out.exists());

        sample().save(&artifacts).unwrap();
        assert!(artifacts.index_file().is_file());
    }

    #[test]
    fn load_without_raw_vectors() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::resolve(Some(tmp.path())).unwrap();
        sample().save(&artifacts).unwrap();
        std::fs::remove_file(artifacts.raw_vectors_file()).unwrap();

        assert_eq!(VectorIndex::load(&artifacts).unwrap().len(), 3);
    }

    #[test]
    fn load_detects_metadata_drift() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::resolve(Some(tmp.path())).unwrap();
        sample().save(&artifacts).unwrap();
        write_metadata(
            &artifacts.metadata_file(),
            &[record("a.c", 0), record("b.c", 1)],
        )
        .unwrap();

        assert!(matches!(
            VectorIndex::load(&artifacts),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn load_detects_raw_vector_drift() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::resolve(Some(tmp.path())).unwrap();
        sample().save(&artifacts).unwrap();
        write_raw_vectors(&artifacts.raw_vectors_file(), 2, &[9.0; 6]).unwrap();

        assert!(matches!(
            VectorIndex::load(&artifacts),
            Err(Error::Corrupt { artifact: "raw vectors", .. })
        ));
    }

    #[test]
    fn load_missing_index() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = ArtifactDir::resolve(Some(tmp.path())).unwrap();
        assert!(matches!(
            VectorIndex::load(&artifacts),
            Err(Error::NotFound { kind: "index", .. })
        ));
    }

    #[test]
    fn json_output_shape() {
        let hits = sample().search(&[0.0, 0.0], 1).unwrap();
        let json = format_json(&hits, "int main").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["query"], "int main");
        assert_eq!(value["result_count"], 1);
        assert_eq!(value["results"][0]["file_name"], "a.c");
        assert_eq!(value["results"][0]["embedding_index"], 0);
        assert_eq!(value["results"][0]["rank"], 1);
    }

    #[test]
    fn human_output() {
        assert_eq!(format_human(&[]), "No results found.\n");
        let hits = sample().search(&[0.0, 0.0], 1).unwrap();
        let text = format_human(&hits);
        assert!(text.contains("a.c"));
        assert!(text.contains("/repos/r/a.c"));
        assert!(text.ends_with("1 result(s)\n"));
    }
}
