use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Binds one indexed file to its row in the vector array.
///
/// # Examples
///
/// ```
/// use codevec::metadata::EmbeddingRecord;
///
/// let record = EmbeddingRecord {
///     file_name: "util_1.py".to_string(),
///     original_path: "/repos/b/util.py".into(),
///     embedding_index: 0,
///     source_len: 42,
/// };
/// let json = serde_json::to_string(&record).unwrap();
/// assert!(json.contains("\"embedding_index\":0"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Name in the flat working set.
    pub file_name: String,
    /// Where the file was copied from.
    pub original_path: PathBuf,
    /// Row of this file's vector. Always equals the record's own position.
    pub embedding_index: usize,
    /// Byte length of the canonical text.
    pub source_len: usize,
}

/// Check that every record sits at the position it claims.
pub fn check_alignment(records: &[EmbeddingRecord]) -> Result<()> {
    for (pos, record) in records.iter().enumerate() {
        if record.embedding_index != pos {
            return Err(Error::Corrupt {
                artifact: "metadata",
                reason: format!(
                    "record for {} has embedding_index {} at position {pos}",
                    record.file_name, record.embedding_index
                ),
            });
        }
    }
    Ok(())
}

/// Write records as a pretty-printed JSON array.
pub fn write_metadata(path: &Path, records: &[EmbeddingRecord]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read records back, rejecting files whose order is broken.
pub fn read_metadata(path: &Path) -> Result<Vec<EmbeddingRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let records: Vec<EmbeddingRecord> = serde_json::from_reader(reader)?;
    check_alignment(&records)?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, index: usize) -> EmbeddingRecord {
        EmbeddingRecord {
            file_name: name.to_string(),
            original_path: PathBuf::from("/src").join(name),
            embedding_index: index,
            source_len: 10 + index,
        }
    }

    #[test]
    fn write_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metadata.json");
        let records = vec![record("a.c", 0), record("b.c", 1)];

        write_metadata(&path, &records).unwrap();
        assert_eq!(read_metadata(&path).unwrap(), records);
    }

    #[test]
    fn file_is_human_readable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metadata.json");
        write_metadata(&path, &[record("a.c", 0)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"file_name\": \"a.c\""));
        assert!(text.contains("\"original_path\": \"/src/a.c\""));
        assert!(text.contains("\"source_len\": 10"));
        assert!(text.lines().count() > 3);
    }

    #[test]
    fn misaligned_records_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metadata.json");
        write_metadata(&path, &[record("a.c", 1)]).unwrap();

        assert!(matches!(
            read_metadata(&path),
            Err(Error::Corrupt { artifact: "metadata", .. })
        ));
    }

    #[test]
    fn empty_metadata_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("metadata.json");
        write_metadata(&path, &[]).unwrap();
        assert!(read_metadata(&path).unwrap().is_empty());
    }
}
