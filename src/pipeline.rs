//! # Retrieval pipeline
//!
//! Glues the [`NewsFetcher`] to the [`VectorIndex`] and turns ranked hits
//! into an [`Answer`] for the console.
//!
//! - **Refresh**: fetch → `clear()` → `add(records)`. Runs before a query
//!   when fresh data is requested.
//! - **Query**: `search(query, max_results)` against whatever is currently
//!   indexed, then assemble the answer text, key points, references and the
//!   list of distinct sources.
//!
//! The answer body is a fixed digest of the retrieved context; no language
//! model is called.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::CopilotConfig;
use crate::error::Result;
use crate::fetcher::{FetchError, NewsFetcher};
use crate::models::{Metadata, Record, SearchHit};
use crate::vector_store::VectorIndex;

/// Characters of retrieved context quoted in the answer body.
pub const CONTEXT_PREVIEW_CHARS: usize = 1500;
/// Cap on key points and references.
pub const MAX_HIGHLIGHTS: usize = 5;
pub const NO_RESULTS_ANSWER: &str = "No relevant news found.";

/// Everything the console layer prints for one question.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    /// Titles of the top hits.
    pub bullet_points: Vec<String>,
    pub references: Vec<Metadata>,
    /// Distinct sources in first-seen order.
    pub sources: Vec<String>,
}

impl Answer {
    fn empty() -> Self {
        Self {
            answer: NO_RESULTS_ANSWER.to_string(),
            bullet_points: Vec::new(),
            references: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Assemble an answer from ranked hits; an empty slice yields the
    /// "no results" answer.
    pub fn from_hits(hits: &[SearchHit]) -> Self {
        if hits.is_empty() {
            return Self::empty();
        }

        let context = build_context(hits);
        let answer = compose_answer(&context);

        let bullet_points = hits
            .iter()
            .take(MAX_HIGHLIGHTS)
            .map(|h| h.metadata.title.clone())
            .collect();
        let references = hits
            .iter()
            .take(MAX_HIGHLIGHTS)
            .map(|h| h.metadata.clone())
            .collect();

        let mut seen = HashSet::new();
        let sources = hits
            .iter()
            .map(|h| h.metadata.source.clone())
            .filter(|s| seen.insert(s.clone()))
            .collect();

        Self {
            answer,
            bullet_points,
            references,
            sources,
        }
    }
}

/// One block per hit: source, title, date and content.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| {
            format!(
                "Source: {}\nTitle: {}\nDate: {}\nContent: {}\n----\n",
                h.metadata.source, h.metadata.title, h.metadata.timestamp, h.content
            )
        })
        .collect()
}

fn compose_answer(context: &str) -> String {
    let preview: String = context.chars().take(CONTEXT_PREVIEW_CHARS).collect();
    format!(
        "Based on the latest retrieved news:\n\n{preview}\n\nSummary:\n\
         • Market sentiment is mixed with sector-specific movements\n\
         • Investors are reacting to macroeconomic and earnings signals\n\
         • Volatility remains due to global factors\n\n\
         ⚠️ This is not financial advice."
    )
}

/// Fetcher + index, driven one question at a time.
#[derive(Debug)]
pub struct Copilot {
    index: VectorIndex,
    fetcher: NewsFetcher,
    max_results: usize,
}

impl Copilot {
    pub fn new(index: VectorIndex, fetcher: NewsFetcher, max_results: usize) -> Self {
        Self {
            index,
            fetcher,
            max_results,
        }
    }

    /// Open the index and build the fetcher described by `config`.
    pub fn from_config(config: &CopilotConfig) -> std::result::Result<Self, FetchError> {
        Ok(Self::new(
            VectorIndex::open(config),
            NewsFetcher::new(&config.fetch)?,
            config.max_results,
        ))
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut VectorIndex {
        &mut self.index
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Replace the indexed corpus with freshly fetched news for `query`.
    ///
    /// Returns the fetched records (before length filtering).
    pub async fn refresh_knowledge(&mut self, query: &str) -> Result<Vec<Record>> {
        let records = self.fetcher.fetch_all(query).await;
        if records.is_empty() {
            warn!("Refresh for {:?} fetched no records; the store will be empty", query);
        }
        self.rebuild(&records)?;
        Ok(records)
    }

    /// `clear()` followed by `add(records)`.
    pub fn rebuild(&mut self, records: &[Record]) -> Result<usize> {
        self.index.clear()?;
        let accepted = self.index.add(records)?;
        info!(
            "Rebuilt store with {} of {} records",
            accepted,
            records.len()
        );
        Ok(accepted)
    }

    /// Ranked hits for `query`; `k` defaults to, and is capped at,
    /// `max_results`.
    pub fn search(&self, query: &str, k: Option<usize>) -> Result<Vec<SearchHit>> {
        let k = k.map_or(self.max_results, |k| k.min(self.max_results));
        self.index.search(query, k)
    }

    /// Answer `query`, refreshing the corpus first when `use_fresh_data`.
    pub async fn query(&mut self, query: &str, use_fresh_data: bool) -> Result<Answer> {
        if use_fresh_data {
            self.refresh_knowledge(query).await?;
        }
        let hits = self.search(query, None)?;
        Ok(Answer::from_hits(&hits))
    }
}
