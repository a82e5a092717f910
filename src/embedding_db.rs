use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::error::{Error, Result};

const SETTINGS: TableDefinition<&str, u64> = TableDefinition::new("settings");
const VECTORS: TableDefinition<u64, &[u8]> = TableDefinition::new("vectors");

const DIMENSION_KEY: &str = "dimension";
const COUNT_KEY: &str = "count";

/// The persisted vector index: one fixed-width f32 vector per row.
///
/// Rows are keyed `0..count` and stored as raw f32 LE bytes. The `settings`
/// table records the dimension and row count so a reader can validate the
/// file before trusting it.
pub struct EmbeddingDb {
    db: Database,
}

impl EmbeddingDb {
    /// Create a fresh index file, replacing whatever was at `path`.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use codevec::EmbeddingDb;
    ///
    /// let path = tmp.path().join("code_embeddings.index");
    /// let db = EmbeddingDb::create(&path, 2, &[1.0, 0.0, 0.0, 1.0]).unwrap();
    /// assert_eq!(db.len().unwrap(), 2);
    /// assert_eq!(db.load_all().unwrap(), (2, vec![1.0, 0.0, 0.0, 1.0]));
    /// ```
    pub fn create(path: &Path, dimension: usize, data: &[f32]) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: data.len(),
            });
        }
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let db = Database::create(path)?;
        let count = data.len() / dimension;

        let txn = db.begin_write()?;
        {
            let mut settings = txn.open_table(SETTINGS)?;
            settings.insert(DIMENSION_KEY, dimension as u64)?;
            settings.insert(COUNT_KEY, count as u64)?;

            let mut vectors = txn.open_table(VECTORS)?;
            let row_bytes = dimension * std::mem::size_of::<f32>();
            for (row, values) in data.chunks_exact(dimension).enumerate() {
                let mut guard = vectors.insert_reserve(row as u64, row_bytes)?;
                guard.as_mut().copy_from_slice(bytemuck::cast_slice(values));
            }
        }
        txn.commit()?;

        Ok(Self { db })
    }

    /// Open an existing index file.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound {
                kind: "index",
                name: path.display().to_string(),
            });
        }
        let db = Database::open(path)?;
        Ok(Self { db })
    }

    fn setting(&self, key: &'static str) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        let value = table.get(key)?.map(|v| v.value()).ok_or_else(|| {
            Error::Corrupt {
                artifact: "index",
                reason: format!("missing setting {key}"),
            }
        })?;
        Ok(value as usize)
    }

    pub fn dimension(&self) -> Result<usize> {
        self.setting(DIMENSION_KEY)
    }

    /// Number of stored vectors.
    pub fn len(&self) -> Result<usize> {
        self.setting(COUNT_KEY)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read every row in key order into one row-major array.
    ///
    /// Fails with [`Error::Corrupt`] when rows are missing, out of order or
    /// of the wrong width.
    pub fn load_all(&self) -> Result<(usize, Vec<f32>)> {
        let dimension = self.dimension()?;
        let count = self.len()?;
        if dimension == 0 {
            return Err(Error::Corrupt {
                artifact: "index",
                reason: "dimension is zero".into(),
            });
        }

        let txn = self.db.begin_read()?;
        let table = txn.open_table(VECTORS)?;

        let mut data = Vec::with_capacity(count.saturating_mul(dimension));
        let mut expected_row = 0u64;
        for entry in table.iter()? {
            let (key, value) = entry?;
            if key.value() != expected_row {
                return Err(Error::Corrupt {
                    artifact: "index",
                    reason: format!(
                        "expected row {expected_row}, found {}",
                        key.value()
                    ),
                });
            }
            data.extend(decode_row(value.value(), dimension, expected_row)?);
            expected_row += 1;
        }

        if expected_row as usize != count {
            return Err(Error::Corrupt {
                artifact: "index",
                reason: format!(
                    "settings say {count} rows, found {expected_row}"
                ),
            });
        }
        Ok((dimension, data))
    }
}

fn decode_row(bytes: &[u8], dimension: usize, row: u64) -> Result<Vec<f32>> {
    if bytes.len() != dimension * std::mem::size_of::<f32>() {
        return Err(Error::Corrupt {
            artifact: "index",
            reason: format!(
                "row {row} has {} bytes, expected {}",
                bytes.len(),
                dimension * 4
            ),
        });
    }
    // Stored bytes carry no alignment guarantee.
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

impl std::fmt::Debug for EmbeddingDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingDb").finish_non_exhaustive()
    }
}
