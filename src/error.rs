//! # Error taxonomy for the vector store
//!
//! Everything below the CLI returns [`StoreError`]. The variants map onto the
//! ways the store can fail:
//!
//! - [`StoreError::ModelUnavailable`]: the embedding backend could not be
//!   loaded or reached. Surfaced to the caller; never replaced by a zero vector.
//! - [`StoreError::Embedding`]: the model loaded but inference failed.
//! - [`StoreError::StorageIo`] / [`StoreError::Snapshot`]: reading or writing
//!   the persisted snapshot failed. Loading degrades to an empty index; saving
//!   surfaces the error because the mutation is not durable.
//! - [`StoreError::DimensionMismatch`]: stored vectors and the current
//!   embedder disagree on dimension. The index must be rebuilt
//!   (`clear` + `add`); it is never padded or truncated.
//! - [`StoreError::ModelMismatch`]: same dimension, but the stored vectors
//!   came from another model. Also fixed only by a rebuild.
//!
//! Searching an empty index is **not** an error; it yields an empty result list.

use thiserror::Error;

/// Convenience alias used throughout the store.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Storage IO error: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Dimension mismatch: index holds {expected}-d vectors, got {found}-d")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Model mismatch: index was built with {stored}, current model is {current}")]
    ModelMismatch { stored: String, current: String },
}

impl StoreError {
    /// `true` when the in-memory state is inconsistent with the embedder and
    /// the only fix is a rebuild.
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            StoreError::DimensionMismatch { .. } | StoreError::ModelMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let err = StoreError::DimensionMismatch {
            expected: 384,
            found: 768,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: index holds 384-d vectors, got 768-d"
        );
        assert!(err.requires_rebuild());
    }

    #[test]
    fn test_model_mismatch_requires_rebuild() {
        let err = StoreError::ModelMismatch {
            stored: "hashing-bow-384".to_string(),
            current: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
        };
        assert!(err.to_string().contains("built with hashing-bow-384"));
        assert!(err.requires_rebuild());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::StorageIo(_)));
        assert!(!err.requires_rebuild());
    }
}
