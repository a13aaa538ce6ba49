//! Exact nearest neighbour search over densely stored `f32` vectors.
//!
//! Serialized layout, little-endian:
//!
//! | offset | size            | field                 |
//! |--------|-----------------|-----------------------|
//! | 0      | 8               | magic `RKFLATL2`      |
//! | 8      | 4               | format version (`u32`)|
//! | 12     | 4               | dimension (`u32`)     |
//! | 16     | 8               | vector count (`u64`)  |
//! | 24     | count * dim * 4 | vector values (`f32`) |

use crate::{err, error::RagError};
use rayon::prelude::*;

pub const MAGIC: &[u8; 8] = b"RKFLATL2";
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 24;
const VALUE_LEN: usize = std::mem::size_of::<f32>();

#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2 {
    dimension: usize,

    /// Vectors in insertion order, each occupying `dimension` values.
    data: Vec<f32>,
}

impl FlatL2 {
    pub fn new(dimension: usize) -> Result<Self, RagError> {
        if dimension == 0 {
            return err!(InvalidInput, "vector dimension must be greater than 0");
        }
        Ok(Self {
            dimension,
            data: vec![],
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Amount of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<(), RagError> {
        if vector.len() != self.dimension {
            return err!(
                InvalidEmbeddings,
                "expected dimension {}, got {}",
                self.dimension,
                vector.len()
            );
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Return the positions and squared L2 distances of the `k` vectors closest
    /// to `query`, nearest first. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, RagError> {
        if query.len() != self.dimension {
            return err!(
                InvalidEmbeddings,
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            );
        }

        let mut distances: Vec<(usize, f32)> = self
            .data
            .par_chunks_exact(self.dimension)
            .map(|vector| l2_squared(query, vector))
            .enumerate()
            .collect();

        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        distances.truncate(k);

        Ok(distances)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * VALUE_LEN);

        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());

        for value in self.data.iter() {
            out.extend_from_slice(&value.to_le_bytes());
        }

        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RagError> {
        if bytes.len() < HEADER_LEN {
            return err!(
                CorruptArtifact,
                "vector artifact too short for header ({} bytes)",
                bytes.len()
            );
        }

        let (header, values) = bytes.split_at(HEADER_LEN);

        if &header[..8] != MAGIC {
            return err!(CorruptArtifact, "vector artifact has an invalid magic");
        }

        let version = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
        if version != FORMAT_VERSION {
            return err!(
                CorruptArtifact,
                "unsupported vector artifact version {version}"
            );
        }

        let dimension = u32::from_le_bytes([header[12], header[13], header[14], header[15]]);
        if dimension == 0 {
            return err!(CorruptArtifact, "vector artifact has dimension 0");
        }

        let mut count = [0; 8];
        count.copy_from_slice(&header[16..24]);
        let count = u64::from_le_bytes(count);

        let expected = (count as u128) * (dimension as u128) * (VALUE_LEN as u128);
        if expected != values.len() as u128 {
            return err!(
                CorruptArtifact,
                "expected {expected} bytes for {count} vectors of dimension {dimension}, found {}",
                values.len()
            );
        }

        let mut index = Self::new(dimension as usize)?;
        index.data = values
            .chunks_exact(VALUE_LEN)
            .map(|v| f32::from_le_bytes([v[0], v[1], v[2], v[3]]))
            .collect();

        Ok(index)
    }
}

#[inline(always)]
fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(a, b)| (a - b) * (a - b)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagErr;

    fn index(vectors: &[[f32; 3]]) -> FlatL2 {
        let mut index = FlatL2::new(3).unwrap();
        for v in vectors {
            index.add(v).unwrap();
        }
        index
    }

    #[test]
    fn searches_nearest_first() {
        let index = index(&[[1., 0., 0.], [0., 1., 0.], [0., 0., 1.], [0., 0.9, 0.]]);
        assert_eq!(4, index.len());

        let results = index.search(&[0., 1., 0.], 3).unwrap();

        assert_eq!(3, results.len());
        assert_eq!((1, 0.), results[0]);
        assert_eq!(3, results[1].0);
        assert!((results[1].1 - 0.01).abs() < 1e-6);
        assert_eq!((0, 2.), results[2]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = index(&[[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]]);
        let results = index.search(&[0., 0., 0.], 10).unwrap();
        assert_eq!(vec![(0, 1.), (1, 1.), (2, 1.)], results);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = FlatL2::new(3).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[0., 0., 0.], 5).unwrap().is_empty());
    }

    #[test]
    fn rejects_wrong_dimension() {
        let mut index = index(&[[1., 0., 0.]]);
        assert!(index.add(&[1., 0.]).is_err());
        assert!(index.search(&[1., 0., 0., 0.], 1).is_err());
        assert!(FlatL2::new(0).is_err());
    }

    #[test]
    fn bytes_layout() {
        let index = index(&[[1., 2., 3.], [4., 5., 6.]]);
        let bytes = index.to_bytes();

        assert_eq!(HEADER_LEN + 6 * 4, bytes.len());
        assert_eq!(MAGIC, &bytes[..8]);
        assert_eq!(1u32.to_le_bytes(), bytes[8..12]);
        assert_eq!(3u32.to_le_bytes(), bytes[12..16]);
        assert_eq!(2u64.to_le_bytes(), bytes[16..24]);
        assert_eq!(1f32.to_le_bytes(), bytes[24..28]);

        assert_eq!(index, FlatL2::from_bytes(&bytes).unwrap());
    }

    #[test]
    fn rejects_malformed_bytes() {
        let bytes = index(&[[1., 2., 3.]]).to_bytes();

        let truncated = FlatL2::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(truncated.error, RagErr::CorruptArtifact(_)));

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(FlatL2::from_bytes(&trailing).is_err());

        let mut magic = bytes.clone();
        magic[0] = b'X';
        assert!(FlatL2::from_bytes(&magic).is_err());

        let mut version = bytes.clone();
        version[8] = 2;
        assert!(FlatL2::from_bytes(&version).is_err());

        assert!(FlatL2::from_bytes(&bytes[..10]).is_err());
    }

    #[test]
    fn rejects_zero_dimension() {
        let mut bytes = FlatL2::new(3).unwrap().to_bytes();
        bytes[12..16].copy_from_slice(&0_u32.to_le_bytes());

        let error = FlatL2::from_bytes(&bytes).unwrap_err();
        assert!(matches!(error.error, RagErr::CorruptArtifact(_)));
    }
}
