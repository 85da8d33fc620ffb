//! # News Copilot (library root)
//!
//! This crate provides the core plumbing for the **News Copilot** CLI (`ncp`):
//! a persistent, exact nearest-neighbor store over embedded financial news,
//! fed by RSS/Atom sources and queried with natural-language questions.
//!
//! - Embedding backends behind one trait (`embeddings`).
//! - The flat embedding matrix and distance scoring (`matrix`, `similarity`).
//! - The persistent index itself (`vector_store`) and its errors (`error`).
//! - News ingestion (`fetcher`) and the refresh/query pipeline (`pipeline`).
//! - CLI parsing, configuration and console output (`commands`, `config`, `report`).
//!
//! ## Data flow
//!
//! ```text
//! feeds ──fetch──▶ Record ──filter──▶ Document ──embed──▶ EmbeddingMatrix
//!                                                           │
//! question ──embed──▶ query vector ──squared L2──▶ top-k ───┴──▶ SearchHit ──▶ Answer
//! ```
//!
//! ## Quick Example
//! ```no_run
//! use news_copilot::config::CopilotConfig;
//! use news_copilot::pipeline::Copilot;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CopilotConfig::default();
//! let mut copilot = Copilot::from_config(&config)?;
//! let answer = copilot.query("What is happening with interest rates?", true).await?;
//! println!("{}", answer.answer);
//! # Ok(()) }
//! ```
//!
//! ## Modules
//! - [`commands`], [`config`], [`embeddings`], [`error`], [`fetcher`], [`matrix`],
//!   [`models`], [`pipeline`], [`report`], [`similarity`], [`vector_store`]

use directories::ProjectDirs;
use std::error::Error;

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod fetcher;
pub mod matrix;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod similarity;
pub mod vector_store;

pub use error::{Result, StoreError};

/// Return the per-platform configuration directory used by News Copilot.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "awful-sec", "ncp")`, so you get the right place on each OS
/// (e.g., `~/Library/Application Support/com.awful-sec.ncp` on macOS).
///
/// The directory is **not** created by this function; callers that need it should
/// create it with `fs::create_dir_all`.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be determined.
///
/// # Examples
/// ```rust
/// let cfg = news_copilot::config_dir().expect("has a config dir");
/// println!("config at {}", cfg.display());
/// ```
pub fn config_dir() -> std::result::Result<std::path::PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("com", "awful-sec", "ncp")
        .ok_or("Unable to determine config directory")?;
    Ok(proj_dirs.config_dir().to_path_buf())
}
