//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the [`CopilotConfig`] struct, which holds the configuration parameters,
//! and a [`load_config`] function to load the configuration from a YAML file.
//! Every component (embedder, vector index, fetcher) receives the values it
//! needs from an explicit `CopilotConfig`; there is no global configuration.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use news_copilot::config::{CopilotConfig, load_config};
//!
//! let config_file_path = "/path/to/config.yaml";
//! let config: CopilotConfig = load_config(config_file_path).unwrap();
//! println!("{:?}", config);
//! ```
//!
//! Every field has a default, so a partial file is enough:
//!
//! ```yaml
//! embedding_backend: hashing
//! store_dir: /var/lib/ncp/vector_store
//! max_results: 8
//! fetch:
//!   timeout_secs: 5
//! ```

use serde::{Deserialize, Serialize};
use std::{error::Error, fs, path::Path, path::PathBuf};

use tracing::*;

/// Which [`crate::embeddings::Embedder`] implementation to build.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// BERT sentence-transformer via Candle.
    Sentence,
    /// Offline bag-of-words feature hashing.
    Hashing,
}

/// One RSS/Atom feed polled by the fetcher.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct FeedSource {
    /// Label stored as each record's `source`.
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Settings for the news fetch collaborator.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct FetchConfig {
    /// Feeds polled on every refresh.
    pub feeds: Vec<FeedSource>,

    /// Google News RSS search endpoint. The user's query is appended as `q`.
    /// `None` disables the search source.
    pub google_news_url: Option<String>,

    /// Items kept from each feed.
    pub per_feed_limit: usize,

    /// Records kept after URL de-duplication across all feeds.
    pub max_records: usize,

    /// Per-request timeout.
    pub timeout_secs: u64,

    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            feeds: vec![
                FeedSource::new(
                    "Yahoo Finance",
                    "https://feeds.finance.yahoo.com/rss/2.0/headline?s=&region=US&lang=en-US",
                ),
                FeedSource::new(
                    "Yahoo Finance S&P 500",
                    "https://feeds.finance.yahoo.com/rss/2.0/headline?s=%5EGSPC&region=US&lang=en-US",
                ),
                FeedSource::new("Investing.com", "https://www.investing.com/rss/news_25.rss"),
                FeedSource::new("Investing.com", "https://www.investing.com/rss/news_301.rss"),
            ],
            google_news_url: Some(
                "https://news.google.com/rss/search?hl=en-US&gl=US&ceid=US:en".to_string(),
            ),
            per_feed_limit: 5,
            max_records: 10,
            timeout_secs: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

/// Represents the application's configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct CopilotConfig {
    pub embedding_backend: EmbeddingBackend,

    /// Hugging Face model identifier for the sentence backend.
    pub embedding_model: String,

    /// Hub revision (branch, tag or commit) of `embedding_model`.
    pub model_revision: String,

    /// Output dimension of the hashing backend.
    pub hashing_dimension: usize,

    /// Directory holding `index.bin` and `documents.yaml`.
    pub store_dir: PathBuf,

    /// Default number of results per query. Must be at least 1.
    pub max_results: usize,

    /// Documents whose trimmed `title\ncontent` is shorter than this are not indexed.
    pub min_document_chars: usize,

    pub fetch: FetchConfig,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        let store_dir = crate::config_dir()
            .map(|dir| dir.join("vector_store"))
            .unwrap_or_else(|_| PathBuf::from("vector_store"));

        Self {
            embedding_backend: EmbeddingBackend::Sentence,
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            model_revision: "main".to_string(),
            hashing_dimension: 384,
            store_dir,
            max_results: 5,
            min_document_chars: 50,
            fetch: FetchConfig::default(),
        }
    }
}

impl CopilotConfig {
    /// Reject values the rest of the application cannot work with.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.max_results == 0 {
            return Err("max_results must be at least 1".into());
        }
        match self.embedding_backend {
            EmbeddingBackend::Sentence if self.embedding_model.trim().is_empty() => {
                return Err("embedding_model must not be empty".into());
            }
            EmbeddingBackend::Hashing if self.hashing_dimension == 0 => {
                return Err("hashing_dimension must be at least 1".into());
            }
            _ => {}
        }
        if self.fetch.timeout_secs == 0 {
            return Err("fetch.timeout_secs must be at least 1".into());
        }
        Ok(())
    }

    /// Apply command-line overrides. Naming a model selects the sentence
    /// backend, since the hashing backend has no model to choose.
    pub fn apply_overrides(&mut self, store_dir: Option<PathBuf>, model: Option<String>) {
        if let Some(store_dir) = store_dir {
            self.store_dir = store_dir;
        }
        if let Some(model) = model {
            if self.embedding_backend != EmbeddingBackend::Sentence {
                info!("Model {} given; switching to the sentence backend", model);
                self.embedding_backend = EmbeddingBackend::Sentence;
            }
            self.embedding_model = model;
        }
    }

    /// Write this configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        info!("Wrote configuration to {}", path.display());
        Ok(())
    }
}

/// Loads the application's configuration from a YAML file.
///
/// Missing fields take their defaults; the result is validated.
///
/// # Errors
/// - the file cannot be read,
/// - the YAML is malformed,
/// - a value fails [`CopilotConfig::validate`].
pub fn load_config(file: &str) -> Result<CopilotConfig, Box<dyn Error>> {
    debug!("Loading config: {:?}", file);
    let content = fs::read_to_string(file)?;
    let config: CopilotConfig = serde_yaml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_valid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
embedding_backend: hashing
hashing_dimension: 128
store_dir: "/tmp/ncp-store"
max_results: 3
fetch:
  feeds:
    - name: "Example"
      url: "http://example.com/rss"
  google_news_url: null
  timeout_secs: 2
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());

        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hashing);
        assert_eq!(config.hashing_dimension, 128);
        assert_eq!(config.store_dir, PathBuf::from("/tmp/ncp-store"));
        assert_eq!(config.max_results, 3);
        assert_eq!(config.fetch.feeds, vec![FeedSource::new("Example", "http://example.com/rss")]);
        assert_eq!(config.fetch.google_news_url, None);
        assert_eq!(config.fetch.timeout_secs, 2);
        // Omitted fields fall back to defaults.
        assert_eq!(config.min_document_chars, 50);
        assert_eq!(config.fetch.per_feed_limit, 5);
    }

    #[test]
    fn test_load_config_invalid_file() {
        let config = load_config("non/existent/path");
        assert!(config.is_err());
    }

    #[test]
    fn test_load_config_invalid_format() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"invalid: config: format"#).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());
        assert!(config.is_err());
    }

    #[test]
    fn test_load_config_rejects_zero_max_results() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "max_results: 0").unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());
        assert!(config.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_hashing_dimension() {
        let config = CopilotConfig {
            embedding_backend: EmbeddingBackend::Hashing,
            hashing_dimension: 0,
            ..CopilotConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_override_selects_sentence_backend() {
        let mut config = CopilotConfig {
            embedding_backend: EmbeddingBackend::Hashing,
            ..CopilotConfig::default()
        };
        config.apply_overrides(None, Some("BAAI/bge-small-en-v1.5".to_string()));
        assert_eq!(config.embedding_backend, EmbeddingBackend::Sentence);
        assert_eq!(config.embedding_model, "BAAI/bge-small-en-v1.5");

        let mut config = CopilotConfig {
            embedding_backend: EmbeddingBackend::Hashing,
            ..CopilotConfig::default()
        };
        config.apply_overrides(Some(PathBuf::from("/tmp/ncp-store")), None);
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hashing);
        assert_eq!(config.store_dir, PathBuf::from("/tmp/ncp-store"));
    }

    #[test]
    fn test_default_feeds_include_sp500_headlines() {
        let config = FetchConfig::default();
        assert!(config.feeds.iter().any(|f| f.url.contains("s=%5EGSPC")));
        assert_eq!(config.feeds.len(), 4);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let config = CopilotConfig {
            max_results: 7,
            store_dir: dir.path().join("store"),
            ..CopilotConfig::default()
        };
        config.save(&path).unwrap();

        let loaded = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }
}
