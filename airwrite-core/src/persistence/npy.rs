//! Minimal NumPy `.npy` codec for `(N, 2)` integer point arrays.
//!
//! Written files use format version 1.0, dtype `<i4`, C order.  The reader
//! also accepts `<i8` and version 2.0 headers so arrays re-saved by other
//! tools still load.

use std::io::{Read, Write};
use std::sync::LazyLock;

use anyhow::{bail, ensure, Context, Result};
use regex::Regex;

use crate::contour::Point;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
/// Header (magic + version + length + dict) is padded to this alignment.
const HEADER_ALIGN: usize = 64;

static DESCR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'descr':\s*'([<>|]?[a-z]\d+)'").expect("valid descr regex"));
static SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'shape':\s*\((\d+),\s*(\d+)\s*\)").expect("valid shape regex")
});
static FORTRAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'fortran_order':\s*(True|False)").expect("valid order regex"));

pub fn write_points<W: Write>(out: &mut W, points: &[Point]) -> Result<()> {
    let dict = format!(
        "{{'descr': '<i4', 'fortran_order': False, 'shape': ({}, 2), }}",
        points.len()
    );
    // magic(6) + version(2) + header_len(2) + dict + padding + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    let header_len = dict.len() + padding + 1;
    let header_len = u16::try_from(header_len).context("npy header too long")?;

    let mut buf = Vec::with_capacity(unpadded + padding + points.len() * 8);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&[1, 0]);
    buf.extend_from_slice(&header_len.to_le_bytes());
    buf.extend_from_slice(dict.as_bytes());
    buf.resize(buf.len() + padding, b' ');
    buf.push(b'\n');
    for p in points {
        buf.extend_from_slice(&p.x.to_le_bytes());
        buf.extend_from_slice(&p.y.to_le_bytes());
    }

    out.write_all(&buf).context("failed to write npy data")
}

pub fn read_points<R: Read>(input: &mut R) -> Result<Vec<Point>> {
    let mut bytes = Vec::new();
    input
        .read_to_end(&mut bytes)
        .context("failed to read npy data")?;

    ensure!(bytes.len() >= 10 && &bytes[..6] == MAGIC, "not an npy file");
    let major = bytes[6];
    let (header_len, data_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            ensure!(bytes.len() >= 12, "truncated npy header");
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => bail!("unsupported npy format version {v}"),
    };
    let body_start = data_start + header_len;
    ensure!(bytes.len() >= body_start, "truncated npy header");
    let header = std::str::from_utf8(&bytes[data_start..body_start])
        .context("npy header is not valid text")?;

    let descr = DESCR
        .captures(header)
        .map(|c| c[1].to_string())
        .context("npy header has no dtype")?;
    let width = match descr.as_str() {
        "<i4" => 4,
        "<i8" => 8,
        other => bail!("unsupported npy dtype {other}"),
    };
    if let Some(order) = FORTRAN.captures(header) {
        ensure!(&order[1] == "False", "fortran-ordered npy arrays are not supported");
    }
    let shape = SHAPE.captures(header).context("npy array is not two-dimensional")?;
    let rows: usize = shape[1].parse().context("bad npy row count")?;
    let cols: usize = shape[2].parse().context("bad npy column count")?;
    ensure!(cols == 2, "expected (N, 2) point array, got ({rows}, {cols})");

    let body = &bytes[body_start..];
    ensure!(
        body.len() >= rows * cols * width,
        "npy data holds {} bytes, expected {}",
        body.len(),
        rows * cols * width
    );

    let value = |i: usize| -> Result<i32> {
        let raw = &body[i * width..(i + 1) * width];
        if width == 4 {
            Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        } else {
            let mut wide = [0u8; 8];
            wide.copy_from_slice(raw);
            i32::try_from(i64::from_le_bytes(wide)).context("coordinate out of range")
        }
    };
    (0..rows)
        .map(|r| Ok(Point::new(value(2 * r)?, value(2 * r + 1)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        write_points(&mut buf, &[Point::new(1, 2), Point::new(-3, 400)]).expect("write");

        assert_eq!(&buf[..6], MAGIC);
        assert_eq!(&buf[6..8], &[1, 0]);
        let header_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        assert_eq!((10 + header_len) % HEADER_ALIGN, 0);
        assert_eq!(buf[10 + header_len - 1], b'\n');
        let header = std::str::from_utf8(&buf[10..10 + header_len]).expect("utf8");
        assert!(header.contains("'shape': (2, 2)"));
        assert_eq!(buf.len(), 10 + header_len + 16);
        assert_eq!(&buf[10 + header_len..10 + header_len + 4], &1i32.to_le_bytes());
    }

    #[test]
    fn test_reads_back_what_it_wrote() {
        let points: Vec<Point> = (0..37).map(|i| Point::new(i * 7, 480 - i)).collect();
        let mut buf = Vec::new();
        write_points(&mut buf, &points).expect("write");
        assert_eq!(read_points(&mut buf.as_slice()).expect("read"), points);
    }

    #[test]
    fn test_reads_int64_arrays() {
        let dict = "{'descr': '<i8', 'fortran_order': False, 'shape': (1, 2), }";
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&[1, 0]);
        buf.extend_from_slice(&((dict.len() + 1) as u16).to_le_bytes());
        buf.extend_from_slice(dict.as_bytes());
        buf.push(b'\n');
        buf.extend_from_slice(&12i64.to_le_bytes());
        buf.extend_from_slice(&34i64.to_le_bytes());

        assert_eq!(read_points(&mut buf.as_slice()).expect("read"), vec![Point::new(12, 34)]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(read_points(&mut &b"hello world"[..]).is_err());
        let mut buf = Vec::new();
        write_points(&mut buf, &[Point::new(1, 1)]).expect("write");
        buf.truncate(buf.len() - 2);
        assert!(read_points(&mut buf.as_slice()).is_err());
    }
}
