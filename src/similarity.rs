//! # Similarity math
//!
//! Exact nearest-neighbor ranking used by [`crate::vector_store::VectorIndex`]:
//!
//! - [`squared_euclidean`]: `Σ (a[i] - b[i])²` over the full dimension.
//! - [`distance_to_score`]: `1 / (1 + distance)`, monotonically decreasing and
//!   always in `(0, 1]` for finite non-negative distances.
//! - [`rank_top_k`]: the `k` best entries by score, ties broken by lower
//!   insertion index.
//!
//! The score is deliberately not normalised by dimension; models with larger
//! embeddings produce smaller scores for the same angular distance.

use std::cmp::Ordering;

use crate::error::{Result, StoreError};

/// Squared Euclidean distance between two vectors of equal length.
///
/// # Errors
/// [`StoreError::DimensionMismatch`] when the lengths differ. Vectors are
/// never padded or truncated.
///
/// # Examples
/// ```rust
/// use news_copilot::similarity::squared_euclidean;
///
/// let d = squared_euclidean(&[1.0, 2.0], &[4.0, 6.0]).unwrap();
/// assert_eq!(d, 25.0);
/// ```
pub fn squared_euclidean(stored: &[f32], query: &[f32]) -> Result<f32> {
    if stored.len() != query.len() {
        return Err(StoreError::DimensionMismatch {
            expected: stored.len(),
            found: query.len(),
        });
    }
    Ok(stored
        .iter()
        .zip(query)
        .map(|(a, b)| (a - b).powi(2))
        .sum())
}

/// Map a distance onto a similarity score in `(0, 1]`.
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Rank `distances` (one per stored row) and keep the best `k`.
///
/// Returns `(row_index, score)` pairs sorted by descending score. Equal
/// scores keep insertion order, so the lower row index wins.
pub fn rank_top_k(distances: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = distances
        .iter()
        .enumerate()
        .map(|(i, d)| (i, distance_to_score(*d)))
        .collect();

    scored.sort_by(|(ia, sa), (ib, sb)| match sb.total_cmp(sa) {
        Ordering::Equal => ia.cmp(ib),
        other => other,
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_euclidean() {
        let d = squared_euclidean(&[0.0, 0.0, 0.0], &[1.0, 2.0, 2.0]).unwrap();
        assert_eq!(d, 9.0);
        assert_eq!(squared_euclidean(&[0.5, 0.5], &[0.5, 0.5]).unwrap(), 0.0);
    }

    #[test]
    fn test_squared_euclidean_rejects_mismatched_lengths() {
        let err = squared_euclidean(&[1.0, 2.0, 3.0], &[1.0, 2.0]).unwrap_err();
        match err {
            StoreError::DimensionMismatch { expected, found } => {
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_score_bounds() {
        assert_eq!(distance_to_score(0.0), 1.0);
        assert_eq!(distance_to_score(1.0), 0.5);
        for d in [0.0_f32, 0.001, 1.0, 4.0, 1e6] {
            let s = distance_to_score(d);
            assert!(s > 0.0 && s <= 1.0, "score {s} out of range for distance {d}");
        }
        assert!(distance_to_score(0.1) > distance_to_score(0.2));
    }

    #[test]
    fn test_rank_orders_by_score_then_index() {
        let ranked = rank_top_k(&[2.0, 0.5, 2.0, 0.0], 4);
        let order: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![3, 1, 0, 2]);
        assert_eq!(ranked[0].1, 1.0);
    }

    #[test]
    fn test_rank_truncates_to_k() {
        assert_eq!(rank_top_k(&[1.0, 2.0, 3.0], 2).len(), 2);
        assert_eq!(rank_top_k(&[1.0], 10).len(), 1);
        assert!(rank_top_k(&[1.0, 2.0], 0).is_empty());
        assert!(rank_top_k(&[], 3).is_empty());
    }
}
