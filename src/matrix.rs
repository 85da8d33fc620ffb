//! Row-major embedding matrix backing the vector index.
//!
//! Rows are appended in place, so adding `n` vectors costs `O(n · dimension)`
//! regardless of how many rows are already stored. The dimension is fixed by
//! the first row appended to an empty matrix and stays fixed until
//! [`EmbeddingMatrix::clear`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::similarity::squared_euclidean;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    dimension: usize,
    rows: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Width of every row; `0` while the matrix is empty.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    /// Append `vectors` as new rows.
    ///
    /// Every vector is checked before anything is written, so a rejected
    /// batch leaves the matrix unchanged.
    ///
    /// # Errors
    /// - [`StoreError::DimensionMismatch`] if any vector's length differs from
    ///   the stored dimension (or from the first vector when empty).
    /// - [`StoreError::Embedding`] for zero-length vectors.
    pub fn append(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let dimension = if self.is_empty() {
            first.len()
        } else {
            self.dimension
        };
        if dimension == 0 {
            return Err(StoreError::Embedding(
                "embedder produced an empty vector".to_string(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(StoreError::DimensionMismatch {
                expected: dimension,
                found: bad.len(),
            });
        }

        self.data.reserve(vectors.len() * dimension);
        for v in vectors {
            self.data.extend_from_slice(v);
        }
        self.rows += vectors.len();
        self.dimension = dimension;
        Ok(())
    }

    /// Squared Euclidean distance from `query` to every row, in row order.
    ///
    /// # Errors
    /// [`StoreError::DimensionMismatch`] when `query` is not exactly
    /// `dimension` wide.
    pub fn squared_distances(&self, query: &[f32]) -> Result<Vec<f32>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }
        self.data
            .par_chunks_exact(self.dimension)
            .map(|row| squared_euclidean(row, query))
            .collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.rows = 0;
        self.dimension = 0;
    }

    /// `true` when the header agrees with the payload. Decoded snapshots
    /// failing this check are treated as corrupt.
    pub fn is_consistent(&self) -> bool {
        match self.rows.checked_mul(self.dimension) {
            Some(expected) => {
                self.data.len() == expected && (self.rows == 0 || self.dimension > 0)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_sets_dimension_and_rows() {
        let mut m = EmbeddingMatrix::new();
        assert!(m.is_empty());
        m.append(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.dimension(), 3);
        assert_eq!(m.row(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(m.row(2), None);
        assert!(m.is_consistent());
    }

    #[test]
    fn test_append_is_incremental() {
        let mut m = EmbeddingMatrix::new();
        m.append(&[vec![0.0, 1.0]]).unwrap();
        m.append(&[vec![1.0, 0.0], vec![1.0, 1.0]]).unwrap();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.row(0), Some(&[0.0, 1.0][..]));
        assert_eq!(m.row(2), Some(&[1.0, 1.0][..]));
    }

    #[test]
    fn test_append_rejects_mixed_dimensions_atomically() {
        let mut m = EmbeddingMatrix::new();
        m.append(&[vec![0.0, 1.0]]).unwrap();
        let err = m.append(&[vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 2,
                found: 3
            }
        ));
        assert_eq!(m.rows(), 1);
    }

    #[test]
    fn test_append_rejects_empty_vectors() {
        let mut m = EmbeddingMatrix::new();
        assert!(matches!(
            m.append(&[Vec::new()]),
            Err(StoreError::Embedding(_))
        ));
    }

    #[test]
    fn test_squared_distances() {
        let mut m = EmbeddingMatrix::new();
        m.append(&[vec![0.0, 0.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.squared_distances(&[0.0, 0.0]).unwrap(), vec![0.0, 25.0]);
    }

    #[test]
    fn test_squared_distances_rejects_wrong_query_width() {
        let mut m = EmbeddingMatrix::new();
        m.append(&[vec![0.0, 0.0]]).unwrap();
        assert!(matches!(
            m.squared_distances(&[0.0, 0.0, 0.0]),
            Err(StoreError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn test_clear_resets_dimension() {
        let mut m = EmbeddingMatrix::new();
        m.append(&[vec![0.0, 0.0]]).unwrap();
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.dimension(), 0);
        m.append(&[vec![1.0, 2.0, 3.0]]).unwrap();
        assert_eq!(m.dimension(), 3);
    }

    #[test]
    fn test_inconsistent_header_detected() {
        let m = EmbeddingMatrix {
            dimension: 4,
            rows: 2,
            data: vec![0.0; 7],
        };
        assert!(!m.is_consistent());
    }
}
