//! Fixed-layout binary encoding shared by every persisted artifact.
//!
//! All integers are written as little-endian `i64`, all reals as little-endian
//! `f64`, with no padding, alignment or versioning between fields.

use std::io::{self, Read, Write};

use log::{debug, info};

use crate::error::{Result, SubspaceError};

/// Progress line that is only shown at `info` level in verbose mode.
pub(crate) fn progress(verbose: bool, message: &str) {
    if verbose {
        info!("{}", message);
    } else {
        debug!("{}", message);
    }
}

pub(crate) fn write_i64<W: Write>(writer: &mut W, value: i64) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_len<W: Write>(writer: &mut W, value: usize) -> Result<()> {
    let value = i64::try_from(value)
        .map_err(|_| SubspaceError::Format(format!("length {} does not fit in 64 bits", value)))?;
    write_i64(writer, value)
}

pub(crate) fn write_f64<W: Write>(writer: &mut W, value: f64) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_f64_iter<'a, W, I>(writer: &mut W, values: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a f64>,
{
    for &value in values {
        write_f64(writer, value)?;
    }
    Ok(())
}

pub(crate) fn read_i64<R: Read>(reader: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Reads an `i64` that has to be a valid, non-negative length or index.
pub(crate) fn read_len<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let value = read_i64(reader)?;
    usize::try_from(value)
        .map_err(|_| SubspaceError::Format(format!("negative {}: {}", what, value)))
}

pub(crate) fn read_f64<R: Read>(reader: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// `a * b` for lengths taken from a file header.
pub(crate) fn checked_len(a: usize, b: usize, what: &str) -> Result<usize> {
    a.checked_mul(b)
        .ok_or_else(|| SubspaceError::Format(format!("{} overflows: {} x {}", what, a, b)))
}

/// Reads `len` reals. The buffer grows with the data actually read, so a
/// corrupt length fails with an I/O error instead of a huge allocation.
pub(crate) fn read_f64_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<f64>> {
    let byte_len = checked_len(len, 8, "value count")?;
    let limit = u64::try_from(byte_len)
        .map_err(|_| SubspaceError::Format(format!("value count too large: {}", len)))?;
    let mut bytes = Vec::new();
    reader.take(limit).read_to_end(&mut bytes)?;
    if bytes.len() != byte_len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} values, found {}", len, bytes.len() / 8),
        )
        .into());
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            f64::from_le_bytes(buf)
        })
        .collect())
}

/// Indices of `scores` ordered by descending `key(score)`.
///
/// The sort is stable, so equal keys keep their original relative order.
pub(crate) fn descending_order<F>(scores: &[f64], key: F) -> Vec<usize>
where
    F: Fn(f64) -> f64,
{
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| key(scores[b]).total_cmp(&key(scores[a])));
    order
}
