//! # VectorStore
//!
//! Persistent, exact k-nearest-neighbor store for news documents.
//!
//! [`VectorIndex`] owns three parallel containers (an [`EmbeddingMatrix`],
//! the document texts and their [`Metadata`]) where position `i` in each one
//! refers to the same entry. It embeds text through a boxed
//! [`Embedder`], searches by squared Euclidean distance over every stored
//! row, and writes a full snapshot after every mutation.
//!
//! ## Responsibilities
//! - **Filtering**: records whose `title\ncontent` is too short are skipped.
//! - **Indexing**: accepted documents are embedded as one batch and appended.
//! - **Search**: exact scan, `score = 1 / (1 + distance)`, ties by insertion order.
//! - **Persistence**: snapshot written after `add`/`clear`, restored on open.
//!
//! ## Serialization layout
//! Under the configured `store_dir`:
//! - `index.bin`: bincode-encoded [`EmbeddingMatrix`] (`dimension`, `rows`, `data`).
//! - `documents.yaml`: `model`, `index_checksum` (blake3 of `index.bin`),
//!   `documents` and `metadata`.
//!
//! Each file is written to a temporary file in the same directory and renamed
//! into place, so a reader never sees a torn file. The checksum ties the two
//! files together: if a crash lands between the two renames the pair no
//! longer matches and the next open starts empty instead of serving
//! mismatched rows.
//!
//! ## Quick Example
//! ```no_run
//! use news_copilot::embeddings::HashingEmbedder;
//! use news_copilot::models::Record;
//! use news_copilot::vector_store::VectorIndex;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut index = VectorIndex::open_with("./vector_store", Box::new(HashingEmbedder::new(384)), 20);
//! index.add(&[Record::new(
//!     "Fed raises rates",
//!     "The Federal Reserve increased interest rates today.",
//!     "u1",
//!     "Example Wire",
//!     "2024-01-15T10:30:00+00:00",
//! )])?;
//! for hit in index.search("interest rate policy", 1)? {
//!     println!("{:.3} {}", hit.score, hit.metadata.title);
//! }
//! # Ok(()) }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::CopilotConfig;
use crate::embeddings::{Embedder, embedder_from_config};
use crate::error::{Result, StoreError};
use crate::matrix::EmbeddingMatrix;
use crate::models::{Document, Metadata, Record, SearchHit};
use crate::similarity::rank_top_k;

/// File holding the embedding matrix.
pub const INDEX_FILE: &str = "index.bin";
/// File holding documents, metadata and the index checksum.
pub const DOCUMENTS_FILE: &str = "documents.yaml";

/// `documents.yaml` as written.
#[derive(Serialize)]
struct DocumentsFileRef<'a> {
    model: &'a str,
    index_checksum: String,
    documents: &'a [String],
    metadata: &'a [Metadata],
}

/// `documents.yaml` as read back.
#[derive(Deserialize)]
struct DocumentsFile {
    model: String,
    index_checksum: String,
    documents: Vec<String>,
    metadata: Vec<Metadata>,
}

/// A fully validated snapshot.
struct Snapshot {
    model: String,
    matrix: EmbeddingMatrix,
    documents: Vec<String>,
    metadata: Vec<Metadata>,
}

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

/// Exact-search vector index with write-through persistence.
///
/// All mutating operations take `&mut self`; share an index between callers
/// by wrapping it in a mutex.
pub struct VectorIndex {
    store_dir: PathBuf,
    embedder: Box<dyn Embedder>,
    min_document_chars: usize,
    /// Model that produced the stored vectors; `None` while empty.
    built_with: Option<String>,
    matrix: EmbeddingMatrix,
    documents: Vec<String>,
    metadata: Vec<Metadata>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("store_dir", &self.store_dir)
            .field("model", &self.embedder.model_id())
            .field("built_with", &self.built_with)
            .field("rows", &self.matrix.rows())
            .field("dimension", &self.matrix.dimension())
            .finish()
    }
}

impl VectorIndex {
    /// Open the index described by `config`, restoring its last snapshot.
    pub fn open(config: &CopilotConfig) -> Self {
        Self::open_with(
            config.store_dir.clone(),
            embedder_from_config(config),
            config.min_document_chars,
        )
    }

    /// Open an index in `store_dir` with an explicit embedder.
    ///
    /// Never fails: a missing, unreadable or inconsistent snapshot is logged
    /// and the index starts empty.
    pub fn open_with(
        store_dir: impl Into<PathBuf>,
        embedder: Box<dyn Embedder>,
        min_document_chars: usize,
    ) -> Self {
        let mut index = Self {
            store_dir: store_dir.into(),
            embedder,
            min_document_chars,
            built_with: None,
            matrix: EmbeddingMatrix::new(),
            documents: Vec::new(),
            metadata: Vec::new(),
        };
        index.load();
        index
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Dimension of the stored vectors; `0` while empty.
    pub fn dimension(&self) -> usize {
        self.matrix.dimension()
    }

    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Documents in insertion order.
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Metadata in insertion order.
    pub fn metadata(&self) -> &[Metadata] {
        &self.metadata
    }

    /// Index `records` and persist the result.
    ///
    /// Records whose combined text is shorter than the configured minimum are
    /// skipped without error. Survivors are embedded as one batch and appended
    /// in input order. When nothing survives this is a no-op and nothing is
    /// written.
    ///
    /// # Returns
    /// The number of documents accepted.
    ///
    /// # Errors
    /// - [`StoreError::ModelUnavailable`] / [`StoreError::Embedding`] from the embedder
    ///   (the index is left unchanged).
    /// - [`StoreError::DimensionMismatch`] if the embedder's output does not
    ///   match the stored dimension (the index is left unchanged).
    /// - [`StoreError::ModelMismatch`] if the stored vectors came from another
    ///   model (the index is left unchanged).
    /// - [`StoreError::StorageIo`] / [`StoreError::Snapshot`] if the snapshot
    ///   write fails. The in-memory index already holds the new rows but the
    ///   mutation is not durable.
    pub fn add(&mut self, records: &[Record]) -> Result<usize> {
        let docs: Vec<Document> = records
            .iter()
            .filter_map(|r| Document::from_record(r, self.min_document_chars))
            .collect();

        if docs.is_empty() {
            debug!("No documents of {} records passed the length filter", records.len());
            return Ok(0);
        }

        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != docs.len() {
            return Err(StoreError::Embedding(format!(
                "expected {} embeddings, got {}",
                docs.len(),
                vectors.len()
            )));
        }

        if vectors
            .first()
            .is_some_and(|v| v.len() == self.matrix.dimension())
        {
            self.check_model()?;
        }
        self.matrix.append(&vectors)?;
        if self.built_with.is_none() {
            self.built_with = Some(self.embedder.model_id().to_string());
        }
        let accepted = docs.len();
        for doc in docs {
            self.documents.push(doc.text);
            self.metadata.push(doc.metadata);
        }

        self.save()?;
        info!(
            "Added {} new documents to vector store ({} total)",
            accepted,
            self.len()
        );
        Ok(accepted)
    }

    /// Return up to `k` stored documents closest to `query`.
    ///
    /// An empty index, a blank query or `k == 0` yields an empty list without
    /// touching the embedder.
    ///
    /// # Errors
    /// - [`StoreError::ModelUnavailable`] / [`StoreError::Embedding`] from the embedder.
    /// - [`StoreError::DimensionMismatch`] if the query embedding's width
    ///   differs from the stored vectors.
    /// - [`StoreError::ModelMismatch`] if the widths agree but the stored
    ///   vectors came from another model.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() || k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query)?;
        if query_vector.len() != self.matrix.dimension() {
            return Err(StoreError::DimensionMismatch {
                expected: self.matrix.dimension(),
                found: query_vector.len(),
            });
        }
        self.check_model()?;
        let distances = self.matrix.squared_distances(&query_vector)?;

        let hits = rank_top_k(&distances, k)
            .into_iter()
            .map(|(i, score)| SearchHit {
                content: self.documents[i].clone(),
                metadata: self.metadata[i].clone(),
                score,
            })
            .collect::<Vec<_>>();
        debug!("Search {:?} returned {} hits", query, hits.len());
        Ok(hits)
    }

    /// Drop every entry and persist the empty snapshot.
    pub fn clear(&mut self) -> Result<()> {
        self.matrix.clear();
        self.built_with = None;
        self.documents.clear();
        self.metadata.clear();
        self.save()?;
        info!("Cleared all documents from vector store");
        Ok(())
    }

    /// Write the full snapshot to `store_dir`.
    ///
    /// `index.bin` is renamed into place first, then `documents.yaml` with
    /// the checksum of the bytes just written.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.store_dir)?;

        let index_bytes = bincode::serde::encode_to_vec(&self.matrix, bincode_config())
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        let documents = DocumentsFileRef {
            model: self
                .built_with
                .as_deref()
                .unwrap_or_else(|| self.embedder.model_id()),
            index_checksum: blake3::hash(&index_bytes).to_hex().to_string(),
            documents: &self.documents,
            metadata: &self.metadata,
        };
        let documents_yaml =
            serde_yaml::to_string(&documents).map_err(|e| StoreError::Snapshot(e.to_string()))?;

        write_atomic(&self.store_dir, INDEX_FILE, &index_bytes)?;
        write_atomic(&self.store_dir, DOCUMENTS_FILE, documents_yaml.as_bytes())?;
        sync_dir(&self.store_dir)?;

        debug!(
            "Saved {} documents to {}",
            self.len(),
            self.store_dir.display()
        );
        Ok(())
    }

    /// Stored vectors are only comparable with queries from the model that
    /// produced them.
    fn check_model(&self) -> Result<()> {
        match &self.built_with {
            Some(stored) if !self.is_empty() && stored != self.embedder.model_id() => {
                Err(StoreError::ModelMismatch {
                    stored: stored.clone(),
                    current: self.embedder.model_id().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn load(&mut self) {
        match read_snapshot(&self.store_dir) {
            Ok(Some(snapshot)) => {
                if !snapshot.documents.is_empty() && snapshot.model != self.embedder.model_id() {
                    warn!(
                        "Snapshot in {} was built with {}, current model is {}; rebuild before searching",
                        self.store_dir.display(),
                        snapshot.model,
                        self.embedder.model_id()
                    );
                }
                self.built_with = (!snapshot.documents.is_empty()).then_some(snapshot.model);
                self.matrix = snapshot.matrix;
                self.documents = snapshot.documents;
                self.metadata = snapshot.metadata;
                info!(
                    "Loaded {} documents from existing index",
                    self.documents.len()
                );
            }
            Ok(None) => {
                info!(
                    "No snapshot in {}; created new index",
                    self.store_dir.display()
                );
            }
            Err(e) => {
                warn!(
                    "Error loading index from {}: {}. Creating new index.",
                    self.store_dir.display(),
                    e
                );
            }
        }
    }
}

/// Write `bytes` to `dir/file_name` via a same-directory temp file and rename.
fn write_atomic(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(file_name)).map_err(|e| e.error)?;
    Ok(())
}

/// Flush directory entries so completed renames survive a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Read and validate the snapshot in `dir`.
///
/// `Ok(None)` when neither file exists; an error for anything partial,
/// unreadable or inconsistent.
fn read_snapshot(dir: &Path) -> Result<Option<Snapshot>> {
    let index_path = dir.join(INDEX_FILE);
    let documents_path = dir.join(DOCUMENTS_FILE);

    match (index_path.exists(), documents_path.exists()) {
        (false, false) => return Ok(None),
        (true, true) => {}
        (has_index, _) => {
            let missing = if has_index { DOCUMENTS_FILE } else { INDEX_FILE };
            return Err(StoreError::Snapshot(format!("incomplete snapshot: {missing} is missing")));
        }
    }

    let index_bytes = fs::read(&index_path)?;
    let documents_yaml = fs::read_to_string(&documents_path)?;

    let documents: DocumentsFile = serde_yaml::from_str(&documents_yaml)
        .map_err(|e| StoreError::Snapshot(format!("{DOCUMENTS_FILE}: {e}")))?;

    let checksum = blake3::hash(&index_bytes).to_hex().to_string();
    if checksum != documents.index_checksum {
        return Err(StoreError::Snapshot(format!(
            "{INDEX_FILE} does not match the checksum recorded in {DOCUMENTS_FILE}"
        )));
    }

    let (matrix, _): (EmbeddingMatrix, usize) =
        bincode::serde::decode_from_slice(&index_bytes, bincode_config())
            .map_err(|e| StoreError::Snapshot(format!("{INDEX_FILE}: {e}")))?;
    if !matrix.is_consistent() {
        return Err(StoreError::Snapshot(format!(
            "{INDEX_FILE} header does not match its payload"
        )));
    }

    if documents.documents.len() != documents.metadata.len()
        || documents.documents.len() != matrix.rows()
    {
        return Err(StoreError::Snapshot(format!(
            "parallel lengths differ: {} vectors, {} documents, {} metadata",
            matrix.rows(),
            documents.documents.len(),
            documents.metadata.len()
        )));
    }

    Ok(Some(Snapshot {
        model: documents.model,
        matrix,
        documents: documents.documents,
        metadata: documents.metadata,
    }))
}
