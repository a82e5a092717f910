use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::error::{Error, Result};

const MAGIC: &[u8; 8] = b"CVRAWF32";

/// Magic + row count + dimension.
const HEADER_SIZE: usize = 16;

/// Write a row-major `rows x dimension` f32 array.
///
/// Layout: 8-byte magic `CVRAWF32`, u32 LE row count, u32 LE dimension, then
/// the values as f32 LE.
pub fn write_raw_vectors(
    path: &Path,
    dimension: usize,
    data: &[f32],
) -> Result<()> {
    if dimension == 0 || data.len() % dimension != 0 {
        return Err(Error::DimensionMismatch {
            expected: dimension,
            actual: data.len(),
        });
    }
    let rows = u32::try_from(data.len() / dimension)
        .map_err(|_| Error::Config("too many vectors".into()))?;
    let dim = u32::try_from(dimension)
        .map_err(|_| Error::Config("dimension too large".into()))?;

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(MAGIC)?;
    writer.write_all(&rows.to_le_bytes())?;
    writer.write_all(&dim.to_le_bytes())?;
    for value in data {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read an array written by [`write_raw_vectors`].
///
/// Returns `(dimension, data)`.
///
/// # Examples
///
/// ```
/// # let tmp = tempfile::tempdir().unwrap();
/// use codevec::raw_vectors::{read_raw_vectors, write_raw_vectors};
///
/// let path = tmp.path().join("raw_embeddings.bin");
/// write_raw_vectors(&path, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
/// let (dim, data) = read_raw_vectors(&path).unwrap();
/// assert_eq!(dim, 2);
/// assert_eq!(data, vec![1.0, 2.0, 3.0, 4.0]);
/// ```
pub fn read_raw_vectors(path: &Path) -> Result<(usize, Vec<f32>)> {
    let bytes = std::fs::read(path)?;
    let corrupt = |reason: String| Error::Corrupt {
        artifact: "raw vectors",
        reason,
    };

    if bytes.len() < HEADER_SIZE || &bytes[0..8] != MAGIC {
        return Err(corrupt("missing header".into()));
    }
    let rows = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]])
        as usize;
    let dimension =
        u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]])
            as usize;

    let body = &bytes[HEADER_SIZE..];
    let expected = rows
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| corrupt("header overflows".into()))?;
    if body.len() != expected {
        return Err(corrupt(format!(
            "{rows} rows of {dimension} need {expected} bytes, found {}",
            body.len()
        )));
    }

    // Vec<u8> gives no alignment guarantee, so decode per value.
    let data = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((dimension, data))
}
