//! # News fetcher
//!
//! Pulls [`Record`]s from RSS 2.0 and Atom feeds for the vector store.
//!
//! Every configured feed, plus an optional Google News search for the user's
//! query, is requested concurrently. Each source resolves to a
//! [`SourceOutcome`]: a timeout, HTTP error or malformed document becomes
//! [`SourceOutcome::Failure`] and contributes zero records, while the other
//! sources carry on. Surviving records are de-duplicated by URL (first one
//! wins) and capped at `max_records`.
//!
//! ```no_run
//! use news_copilot::config::FetchConfig;
//! use news_copilot::fetcher::NewsFetcher;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = NewsFetcher::new(&FetchConfig::default())?;
//! let records = fetcher.fetch_all("semiconductor earnings").await;
//! println!("fetched {} records", records.len());
//! # Ok(()) }
//! ```

use chrono::{DateTime, Utc};
use futures::future::join_all;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use reqwest::Url;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{FeedSource, FetchConfig};
use crate::models::Record;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Malformed feed: {0}")]
    Parse(String),
}

/// What one source produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    Success { source: String, records: Vec<Record> },
    Failure { source: String, reason: String },
}

impl SourceOutcome {
    pub fn source(&self) -> &str {
        match self {
            SourceOutcome::Success { source, .. } | SourceOutcome::Failure { source, .. } => source,
        }
    }

    /// Records from a successful source; none from a failed one.
    pub fn into_records(self) -> Vec<Record> {
        match self {
            SourceOutcome::Success { records, .. } => records,
            SourceOutcome::Failure { .. } => Vec::new(),
        }
    }
}

/// Concurrent multi-feed fetcher.
#[derive(Debug, Clone)]
pub struct NewsFetcher {
    client: reqwest::Client,
    feeds: Vec<FeedSource>,
    google_news_url: Option<String>,
    per_feed_limit: usize,
    max_records: usize,
}

impl NewsFetcher {
    /// Build a fetcher with a shared HTTP client.
    ///
    /// # Errors
    /// [`FetchError::Http`] if the TLS backend cannot be initialised.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            feeds: config.feeds.clone(),
            google_news_url: config.google_news_url.clone(),
            per_feed_limit: config.per_feed_limit,
            max_records: config.max_records,
        })
    }

    /// Sources polled for `query`: the configured feeds followed by the
    /// Google News search, when enabled.
    pub fn sources_for(&self, query: &str) -> Result<Vec<FeedSource>, FetchError> {
        let mut sources = self.feeds.clone();
        if let Some(base) = &self.google_news_url {
            let url = Url::parse_with_params(base, &[("q", query)])
                .map_err(|e| FetchError::InvalidUrl(format!("{base}: {e}")))?;
            sources.push(FeedSource::new("Google News", url.to_string()));
        }
        Ok(sources)
    }

    /// Fetch every source concurrently, in source order.
    pub async fn fetch_outcomes(&self, query: &str) -> Vec<SourceOutcome> {
        let sources = match self.sources_for(query) {
            Ok(sources) => sources,
            Err(e) => {
                warn!("Skipping search source: {}", e);
                self.feeds.clone()
            }
        };
        join_all(sources.iter().map(|s| self.fetch_source(s))).await
    }

    /// Fetch, merge, de-duplicate and cap.
    pub async fn fetch_all(&self, query: &str) -> Vec<Record> {
        let outcomes = self.fetch_outcomes(query).await;
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, SourceOutcome::Failure { .. }))
            .count();
        let records = merge_outcomes(outcomes, self.max_records);
        info!(
            "Fetched {} unique records ({} sources failed)",
            records.len(),
            failed
        );
        records
    }

    pub async fn fetch_source(&self, source: &FeedSource) -> SourceOutcome {
        match self.fetch_feed(source).await {
            Ok(records) => {
                debug!("{}: {} records", source.name, records.len());
                SourceOutcome::Success {
                    source: source.name.clone(),
                    records,
                }
            }
            Err(e) => {
                warn!("Could not fetch from {} ({}): {}", source.name, source.url, e);
                SourceOutcome::Failure {
                    source: source.name.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn fetch_feed(&self, source: &FeedSource) -> Result<Vec<Record>, FetchError> {
        let body = self
            .client
            .get(&source.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_feed(&body, &source.name, self.per_feed_limit)
    }
}

/// Concatenate successful outcomes in order, drop records without a URL,
/// keep the first record per URL and truncate to `max_records`.
pub fn merge_outcomes(outcomes: Vec<SourceOutcome>, max_records: usize) -> Vec<Record> {
    let mut seen = HashSet::new();
    outcomes
        .into_iter()
        .flat_map(SourceOutcome::into_records)
        .filter(|r| !r.url.is_empty() && seen.insert(r.url.clone()))
        .take(max_records)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ItemField {
    Title,
    Summary,
    Link,
    Published,
}

impl ItemField {
    fn from_tag(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "description" | "summary" | "content" => Some(Self::Summary),
            "link" => Some(Self::Link),
            "pubDate" | "published" | "updated" | "date" => Some(Self::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct PartialItem {
    title: Option<String>,
    summary: Option<String>,
    link: Option<String>,
    published: Option<String>,
}

impl PartialItem {
    fn set(&mut self, field: ItemField, value: String) {
        let slot = match field {
            ItemField::Title => &mut self.title,
            ItemField::Summary => &mut self.summary,
            ItemField::Link => &mut self.link,
            ItemField::Published => &mut self.published,
        };
        // First occurrence wins.
        if slot.is_none() && !value.trim().is_empty() {
            *slot = Some(value);
        }
    }

    fn into_record(self, source: &str) -> Record {
        let title = clean_text(self.title.as_deref().unwrap_or_default());
        let summary = clean_text(self.summary.as_deref().unwrap_or_default());
        // Feeds without a summary fall back to the headline.
        let content = if summary.is_empty() { title.clone() } else { summary };
        Record {
            title,
            content,
            url: self.link.unwrap_or_default().trim().to_string(),
            source: source.to_string(),
            timestamp: normalize_timestamp(self.published.as_deref()),
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn href(e: &BytesStart<'_>) -> Option<String> {
    e.try_get_attribute("href")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Parse an RSS 2.0 or Atom document into at most `limit` records.
///
/// # Errors
/// [`FetchError::Parse`] if the document is not well-formed XML.
pub fn parse_feed(xml: &str, source: &str, limit: usize) -> Result<Vec<Record>, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut item: Option<PartialItem> = None;
    let mut field: Option<ItemField> = None;
    let mut text = String::new();

    loop {
        if records.len() >= limit {
            break;
        }
        let event = reader
            .read_event()
            .map_err(|e| FetchError::Parse(format!("at byte {}: {}", reader.buffer_position(), e)))?;

        match event {
            Event::Start(ref e) => {
                let name = local_name(e);
                if name == "item" || name == "entry" {
                    item = Some(PartialItem::default());
                } else if let Some(current) = item.as_mut() {
                    if field.is_none() {
                        field = ItemField::from_tag(&name);
                        text.clear();
                        if field == Some(ItemField::Link) {
                            if let Some(link) = href(e) {
                                current.set(ItemField::Link, link);
                            }
                        }
                    }
                }
            }
            Event::Empty(ref e) => {
                // Atom: <link href="..."/>
                if let Some(current) = item.as_mut() {
                    if local_name(e) == "link" {
                        if let Some(link) = href(e) {
                            current.set(ItemField::Link, link);
                        }
                    }
                }
            }
            Event::Text(ref e) => {
                if field.is_some() {
                    let unescaped = e
                        .unescape()
                        .map_err(|err| FetchError::Parse(err.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "item" || name == "entry" {
                    if let Some(done) = item.take() {
                        records.push(done.into_record(source));
                    }
                    field = None;
                } else if let (Some(current), Some(active)) = (item.as_mut(), field) {
                    if ItemField::from_tag(&name) == Some(active) {
                        current.set(active, std::mem::take(&mut text));
                        field = None;
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

/// Strip markup from feed text and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let without_tags = HTML_TAG.replace_all(raw, " ");
    WHITESPACE.replace_all(&without_tags, " ").trim().to_string()
}

/// RFC 2822 (RSS) or RFC 3339 (Atom) → RFC 3339 UTC; anything else → now.
fn normalize_timestamp(raw: Option<&str>) -> String {
    raw.map(str::trim)
        .and_then(|s| {
            DateTime::parse_from_rfc2822(s)
                .or_else(|_| DateTime::parse_from_rfc3339(s))
                .ok()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}
