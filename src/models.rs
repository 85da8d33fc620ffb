//! # Corpus models
//!
//! Plain data structures shared by the fetcher, the vector store and the
//! answer pipeline.
//!
//! - [`Record`]: one news item as supplied by the fetch collaborator.
//! - [`Metadata`]: the fixed four-field description stored next to each vector.
//! - [`Document`]: the text that actually gets embedded (`title` + `"\n"` +
//!   `content`), built from a record only when it is long enough.
//! - [`SearchHit`]: one ranked result handed to the formatting layer.
//!
//! ## Basic usage
//!
//! ```rust
//! use news_copilot::models::{Document, Record};
//!
//! let record = Record::new(
//!     "Fed raises rates",
//!     "The Federal Reserve increased interest rates today.",
//!     "u1",
//!     "Example Wire",
//!     "2024-01-15T10:30:00+00:00",
//! );
//! let doc = Document::from_record(&record, 50).expect("long enough");
//! assert!(doc.text.starts_with("Fed raises rates\n"));
//! assert_eq!(doc.metadata.url, "u1");
//! ```

use serde::{Deserialize, Serialize};

/// Joins a record's title and content into the embedded text.
pub const DOCUMENT_SEPARATOR: &str = "\n";

/// A raw news item.
///
/// `url` is the identity key used for de-duplication upstream; the store
/// itself never de-duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    pub content: String,
    pub url: String,
    pub source: String,
    /// ISO-8601 timestamp.
    pub timestamp: String,
}

impl Record {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            url: url.into(),
            source: source.into(),
            timestamp: timestamp.into(),
        }
    }

    /// The metadata half of this record.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            title: self.title.clone(),
            url: self.url.clone(),
            source: self.source.clone(),
            timestamp: self.timestamp.clone(),
        }
    }

    /// `title` and `content` joined by [`DOCUMENT_SEPARATOR`].
    pub fn document_text(&self) -> String {
        format!("{}{}{}", self.title, DOCUMENT_SEPARATOR, self.content)
    }
}

/// Fixed-shape metadata stored positionally parallel to each embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub url: String,
    pub source: String,
    pub timestamp: String,
}

/// Text accepted for embedding plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    /// Build a document from `record`, or `None` when the trimmed combined
    /// text is empty or shorter than `min_chars` characters.
    pub fn from_record(record: &Record, min_chars: usize) -> Option<Self> {
        let text = record.document_text();
        let trimmed_len = text.trim().chars().count();
        if trimmed_len == 0 || trimmed_len < min_chars {
            return None;
        }
        Some(Self {
            text,
            metadata: record.metadata(),
        })
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// The stored document text.
    pub content: String,
    pub metadata: Metadata,
    /// `1 / (1 + squared_distance)`, always in `(0, 1]`.
    pub score: f32,
}
