//! # Embeddings
//!
//! Text → fixed-dimension vector, behind the [`Embedder`] trait.
//!
//! Two backends are provided:
//!
//! - [`SentenceEmbedder`]: a BERT sentence-transformer (default
//!   `sentence-transformers/all-MiniLM-L6-v2`, 384-d) run on the CPU with
//!   Candle. Weights are fetched from the Hugging Face Hub on first use,
//!   token embeddings are mean-pooled over the attention mask and the result
//!   is L2 normalised.
//! - [`HashingEmbedder`]: an offline bag-of-words feature hasher. Useful
//!   without network access and for deterministic tests.
//!
//! ## Contract
//! - `embed` is deterministic for identical input and model.
//! - `embed_batch(texts)[i]` equals `embed(texts[i])` within floating-point
//!   tolerance; batching only changes throughput.
//! - A backend that cannot be loaded yields
//!   [`StoreError::ModelUnavailable`]. No call ever substitutes a zero vector
//!   for a missing model.
//!
//! ## Quick Example
//! ```rust
//! use news_copilot::embeddings::{Embedder, HashingEmbedder};
//!
//! let embedder = HashingEmbedder::new(64);
//! let v = embedder.embed("Rust is great!").unwrap();
//! assert_eq!(v.len(), 64);
//! ```

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use once_cell::sync::OnceCell;
use std::error::Error;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::config::{CopilotConfig, EmbeddingBackend};
use crate::error::{Result, StoreError};

/// Longest input the BERT tokenizer passes to the model.
const MAX_SEQUENCE_TOKENS: usize = 512;

/// A deterministic text embedding function.
pub trait Embedder: Send + Sync {
    /// Identifier of the underlying model, recorded in snapshots.
    fn model_id(&self) -> &str;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts. Must agree element-wise with [`Embedder::embed`].
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Build the embedder selected by `config`.
pub fn embedder_from_config(config: &CopilotConfig) -> Box<dyn Embedder> {
    match config.embedding_backend {
        EmbeddingBackend::Sentence => Box::new(SentenceEmbedder::new(
            config.embedding_model.clone(),
            config.model_revision.clone(),
        )),
        EmbeddingBackend::Hashing => Box::new(HashingEmbedder::new(config.hashing_dimension)),
    }
}

/// A loaded BERT model plus its tokenizer.
struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertEncoder {
    /// Download (or reuse the hub cache for) `config.json`, `tokenizer.json`
    /// and `model.safetensors`, then build the model.
    fn load(model_id: &str, revision: &str) -> std::result::Result<Self, Box<dyn Error + Send + Sync>> {
        let device = Device::Cpu;

        let repo = Repo::with_revision(model_id.to_string(), RepoType::Model, revision.to_string());
        let api = Api::new()?;
        let api_repo = api.repo(repo);

        let config_filename = api_repo.get("config.json")?;
        let tokenizer_filename = api_repo.get("tokenizer.json")?;
        let weights_filename = api_repo.get("model.safetensors")?;

        let config = std::fs::read_to_string(config_filename)?;
        let config: Config = serde_json::from_str(&config)?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_filename)?;
        // Batches are padded to their longest member; the attention mask
        // keeps padding out of both the encoder and the pooling.
        tokenizer.with_padding(Some(PaddingParams::default()));
        tokenizer.with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_TOKENS,
            ..Default::default()
        }))?;

        // SAFETY: the safetensors file lives in the hub cache and is not
        // modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    fn encode_batch(&self, texts: &[&str]) -> std::result::Result<Vec<Vec<f32>>, Box<dyn Error + Send + Sync>> {
        let encodings = self.tokenizer.encode_batch(texts.to_vec(), true)?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut type_ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            ids.push(Tensor::new(encoding.get_ids(), &self.device)?);
            type_ids.push(Tensor::new(encoding.get_type_ids(), &self.device)?);
            masks.push(Tensor::new(encoding.get_attention_mask(), &self.device)?);
        }
        let ids = Tensor::stack(&ids, 0)?; // [batch, seq]
        let type_ids = Tensor::stack(&type_ids, 0)?;
        let mask = Tensor::stack(&masks, 0)?;

        let output = self.model.forward(&ids, &type_ids, Some(&mask))?; // [batch, seq, hidden]

        // Mean pooling over real tokens only.
        let mask = mask.to_dtype(DType::F32)?.unsqueeze(2)?; // [batch, seq, 1]
        let sum = output.broadcast_mul(&mask)?.sum(1)?; // [batch, hidden]
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?; // [batch, 1]
        let mean = sum.broadcast_div(&count)?;

        let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = mean.broadcast_div(&norm)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}

/// Sentence embeddings using Candle (pure Rust).
///
/// The model is loaded lazily on the first embedding call. A failed load is
/// reported as [`StoreError::ModelUnavailable`] and retried on the next call,
/// so an index can be opened and queried while empty without network access.
pub struct SentenceEmbedder {
    model_id: String,
    revision: String,
    encoder: OnceCell<BertEncoder>,
}

impl SentenceEmbedder {
    pub fn new(model_id: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            revision: revision.into(),
            encoder: OnceCell::new(),
        }
    }

    fn encoder(&self) -> Result<&BertEncoder> {
        self.encoder.get_or_try_init(|| {
            info!("Loading embedding model {} ({})", self.model_id, self.revision);
            BertEncoder::load(&self.model_id, &self.revision)
                .map_err(|e| StoreError::ModelUnavailable(format!("{}: {}", self.model_id, e)))
        })
    }
}

impl Embedder for SentenceEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| StoreError::Embedding("model returned no embedding".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encoder = self.encoder()?;
        debug!("Embedding batch of {} texts", texts.len());
        let vectors = encoder
            .encode_batch(texts)
            .map_err(|e| StoreError::Embedding(e.to_string()))?;
        if vectors.len() != texts.len() {
            return Err(StoreError::Embedding(format!(
                "expected {} embeddings, model returned {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

/// Offline bag-of-words embedder.
///
/// Each token is hashed (SHA-256) into one of `dimension` buckets with a
/// hash-derived sign, and the counts are L2 normalised. Tokens are lowercase
/// alphanumeric runs of two or more characters; a trailing plural `s` is
/// dropped so "rates" and "rate" share a bucket.
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model_id: format!("hashing-bow-{dimension}"),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(|w| {
            let w = w.to_lowercase();
            if w.len() > 3 && w.ends_with('s') && !w.ends_with("ss") {
                w[..w.len() - 1].to_string()
            } else {
                w
            }
        })
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimension == 0 {
            return Err(StoreError::ModelUnavailable(
                "hashing embedder configured with zero dimension".to_string(),
            ));
        }
        let buckets = self.dimension as u64;
        let mut vector = vec![0f32; self.dimension];

        for token in tokenize(text) {
            let digest = sha256::digest(token.as_str());
            let Ok(hash) = u64::from_str_radix(&digest[..16], 16) else {
                continue;
            };
            let bucket = (hash % buckets) as usize;
            let sign = if (hash / buckets) % 2 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{x} != {y}");
        }
    }

    #[test]
    fn test_tokenize() {
        let tokens: Vec<String> = tokenize("Fed raises rates; the U.S. class").collect();
        assert_eq!(tokens, vec!["fed", "raise", "rate", "the", "class"]);
    }

    #[test]
    fn test_hashing_is_deterministic_and_normalized() {
        let e = HashingEmbedder::new(128);
        let a = e.embed("Technology shares rose sharply.").unwrap();
        let b = e.embed("Technology shares rose sharply.").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_batch_matches_single() {
        let e = HashingEmbedder::new(384);
        let a = "Fed raises rates";
        let b = "Tech stocks rally";
        let batch = e.embed_batch(&[a, b]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_close(&batch[0], &e.embed(a).unwrap());
        assert_close(&batch[1], &e.embed(b).unwrap());
    }

    #[test]
    fn test_hashing_zero_dimension_is_unavailable() {
        let e = HashingEmbedder::new(0);
        assert!(matches!(
            e.embed("anything"),
            Err(StoreError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_model_id_reflects_dimension() {
        assert_eq!(HashingEmbedder::new(64).model_id(), "hashing-bow-64");
    }

    #[test]
    fn test_factory_selects_backend() {
        let mut config = CopilotConfig::default();
        config.embedding_backend = EmbeddingBackend::Hashing;
        config.hashing_dimension = 32;
        let e = embedder_from_config(&config);
        assert_eq!(e.model_id(), "hashing-bow-32");

        config.embedding_backend = EmbeddingBackend::Sentence;
        let e = embedder_from_config(&config);
        assert_eq!(e.model_id(), config.embedding_model);
    }

    #[test]
    fn test_sentence_embedder_empty_batch_skips_model_load() {
        let e = SentenceEmbedder::new("does-not/exist", "main");
        assert!(e.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    #[ignore = "downloads sentence-transformers/all-MiniLM-L6-v2 from the Hugging Face Hub"]
    fn test_sentence_batch_matches_single() {
        let e = SentenceEmbedder::new("sentence-transformers/all-MiniLM-L6-v2", "main");
        let a = "The Federal Reserve increased interest rates today.";
        let b = "Technology shares rose sharply.";
        let batch = e.embed_batch(&[a, b]).unwrap();
        assert_eq!(batch[0].len(), 384);
        assert_close(&batch[0], &e.embed(a).unwrap());
        assert_close(&batch[1], &e.embed(b).unwrap());
    }

    #[test]
    #[ignore = "needs network access to prove the failure comes from the hub, not the cache"]
    fn test_sentence_missing_model_is_unavailable() {
        let e = SentenceEmbedder::new("news-copilot/definitely-not-a-model", "main");
        assert!(matches!(
            e.embed("hello"),
            Err(StoreError::ModelUnavailable(_))
        ));
    }
}
