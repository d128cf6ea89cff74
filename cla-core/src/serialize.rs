//! Flat binary encoding of `Matrix` and `Vector` state.
//!
//! Layout, all little-endian:
//!
//! | field   | type            | notes                          |
//! |---------|-----------------|--------------------------------|
//! | kind    | `u8`            | 1 = vector, 2 = matrix         |
//! | dims    | `u64` x 1 or 2  | length, or rows then cols      |
//! | payload | `f64` x n       | row-major, full precision      |

use crate::error::{ClaError, Result};
use crate::matrix::Matrix;
use crate::traits::Dense;
use crate::vector::Vector;
use std::mem;

const KIND_VECTOR: u8 = 1;
const KIND_MATRIX: u8 = 2;

const DIM_BYTES: usize = mem::size_of::<u64>();
const VALUE_BYTES: usize = mem::size_of::<f64>();

/// A decoded object of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Vector(Vector),
    Matrix(Matrix),
}

fn encode(kind: u8, dims: &[usize], values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + dims.len() * DIM_BYTES + values.len() * VALUE_BYTES);
    out.push(kind);
    for &d in dims {
        out.extend_from_slice(&(d as u64).to_le_bytes());
    }
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Cursor over an encoded record that fails with `MalformedData` instead of panicking.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.bytes.len());
        match end {
            Some(end) => {
                let chunk = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(chunk)
            }
            None => Err(ClaError::MalformedData(format!(
                "Truncated record: {} needs {} bytes at offset {}, only {} available",
                what,
                n,
                self.pos,
                self.bytes.len() - self.pos
            ))),
        }
    }

    fn kind(&mut self) -> Result<u8> {
        Ok(self.take(1, "kind")?[0])
    }

    fn dim(&mut self) -> Result<usize> {
        let mut raw = [0u8; DIM_BYTES];
        raw.copy_from_slice(self.take(DIM_BYTES, "dimension")?);
        usize::try_from(u64::from_le_bytes(raw))
            .map_err(|_| ClaError::MalformedData("Dimension does not fit in usize".to_string()))
    }

    /// Reads exactly `count` values and requires the record to end there.
    fn payload(&mut self, count: usize) -> Result<Vec<f64>> {
        let n_bytes = count.checked_mul(VALUE_BYTES).ok_or_else(|| {
            ClaError::MalformedData(format!("Element count {} overflows", count))
        })?;
        let remaining = self.bytes.len() - self.pos;
        if remaining != n_bytes {
            return Err(ClaError::MalformedData(format!(
                "Payload holds {} bytes, header announces {} values ({} bytes)",
                remaining, count, n_bytes
            )));
        }
        let values = self
            .take(n_bytes, "payload")?
            .chunks_exact(VALUE_BYTES)
            .map(|chunk| {
                let mut raw = [0u8; VALUE_BYTES];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();
        Ok(values)
    }
}

fn decode_vector_body(reader: &mut Reader<'_>) -> Result<Vector> {
    let len = reader.dim()?;
    Ok(Vector::from_vec(reader.payload(len)?))
}

fn decode_matrix_body(reader: &mut Reader<'_>) -> Result<Matrix> {
    let rows = reader.dim()?;
    let cols = reader.dim()?;
    let count = rows.checked_mul(cols).ok_or_else(|| {
        ClaError::MalformedData(format!("Shape {}x{} overflows", rows, cols))
    })?;
    let values = reader.payload(count)?;
    Matrix::from_vec(rows, cols, values)
}

fn kind_name(kind: u8) -> &'static str {
    match kind {
        KIND_VECTOR => "vector",
        KIND_MATRIX => "matrix",
        _ => "unknown",
    }
}

fn expect_kind(reader: &mut Reader<'_>, expected: u8) -> Result<()> {
    let kind = reader.kind()?;
    if kind != expected {
        return Err(ClaError::MalformedData(format!(
            "Expected a {} record, found kind {} ({})",
            kind_name(expected),
            kind,
            kind_name(kind)
        )));
    }
    Ok(())
}

/// Decodes a record of either kind.
pub fn decode(bytes: &[u8]) -> Result<Entity> {
    let mut reader = Reader::new(bytes);
    match reader.kind()? {
        KIND_VECTOR => Ok(Entity::Vector(decode_vector_body(&mut reader)?)),
        KIND_MATRIX => Ok(Entity::Matrix(decode_matrix_body(&mut reader)?)),
        other => Err(ClaError::MalformedData(format!(
            "Unknown record kind {}",
            other
        ))),
    }
}

impl Entity {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Entity::Vector(v) => v.to_bytes(),
            Entity::Matrix(m) => m.to_bytes(),
        }
    }
}

impl Matrix {
    /// Encodes shape and elements; see the module docs for the layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(KIND_MATRIX, &[self.rows(), self.cols()], self.as_slice())
    }

    /// Decodes a matrix record, validating the header before the payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Matrix> {
        let mut reader = Reader::new(bytes);
        expect_kind(&mut reader, KIND_MATRIX)?;
        decode_matrix_body(&mut reader)
    }
}

impl Vector {
    /// Encodes length and elements; see the module docs for the layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(KIND_VECTOR, &[self.len()], self.as_slice())
    }

    /// Decodes a vector record, validating the header before the payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Vector> {
        let mut reader = Reader::new(bytes);
        expect_kind(&mut reader, KIND_VECTOR)?;
        decode_vector_body(&mut reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_round_trip_is_exact() {
        let values = vec![
            0.1,
            -0.0,
            f64::MAX,
            f64::MIN_POSITIVE,
            1.0 / 3.0,
            f64::INFINITY,
        ];
        let m = Matrix::from_vec(2, 3, values).unwrap();
        let back = Matrix::from_bytes(&m.to_bytes()).unwrap();
        assert_eq!(back.shape(), (2, 3));
        for (a, b) in m.as_slice().iter().zip(back.as_slice()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_matrix_layout() {
        let m = Matrix::from_vec(1, 2, vec![1.0, 2.0]).unwrap();
        let bytes = m.to_bytes();
        assert_eq!(bytes.len(), 1 + 2 * 8 + 2 * 8);
        assert_eq!(bytes[0], KIND_MATRIX);
        assert_eq!(&bytes[1..9], &1u64.to_le_bytes());
        assert_eq!(&bytes[9..17], &2u64.to_le_bytes());
        assert_eq!(&bytes[17..25], &1.0f64.to_le_bytes());
    }

    #[test]
    fn test_vector_round_trip() {
        let v = Vector::from_vec(vec![1.0, 3.0, -7.5]);
        assert_eq!(Vector::from_bytes(&v.to_bytes()).unwrap(), v);
        let empty = Vector::new(0);
        assert_eq!(Vector::from_bytes(&empty.to_bytes()).unwrap(), empty);
    }

    #[test]
    fn test_decode_dispatches_on_kind() {
        let m = Matrix::identity(3);
        match decode(&m.to_bytes()).unwrap() {
            Entity::Matrix(back) => assert_eq!(back, m),
            _ => panic!("Expected a matrix"),
        }
        let v = Vector::from_vec(vec![2.0]);
        assert_eq!(decode(&v.to_bytes()).unwrap(), Entity::Vector(v.clone()));
        assert_eq!(Entity::Vector(v.clone()).to_bytes(), v.to_bytes());
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = Matrix::identity(2).to_bytes();
        let err = Matrix::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
        match err {
            ClaError::MalformedData(msg) => assert!(msg.contains("Payload")),
            _ => panic!("Expected MalformedData error"),
        }
    }

    #[test]
    fn test_truncated_header() {
        let bytes = Matrix::identity(2).to_bytes();
        match Matrix::from_bytes(&bytes[..5]).unwrap_err() {
            ClaError::MalformedData(msg) => assert!(msg.contains("Truncated")),
            _ => panic!("Expected MalformedData error"),
        }
        assert!(matches!(decode(&[]), Err(ClaError::MalformedData(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = Vector::from_vec(vec![1.0]).to_bytes();
        bytes.push(0);
        assert!(matches!(
            Vector::from_bytes(&bytes),
            Err(ClaError::MalformedData(_))
        ));
    }

    #[test]
    fn test_wrong_kind() {
        let bytes = Vector::from_vec(vec![1.0, 2.0]).to_bytes();
        match Matrix::from_bytes(&bytes).unwrap_err() {
            ClaError::MalformedData(msg) => assert!(msg.contains("Expected a matrix")),
            _ => panic!("Expected MalformedData error"),
        }
        assert!(matches!(decode(&[9]), Err(ClaError::MalformedData(_))));
    }

    #[test]
    fn test_overflowing_shape() {
        let mut bytes = vec![KIND_MATRIX];
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(
            Matrix::from_bytes(&bytes),
            Err(ClaError::MalformedData(_))
        ));
    }
}
