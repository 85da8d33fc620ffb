//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line arguments,
//! and a `Commands` enum that represents the available subcommands and their
//! options. Global options override the matching configuration fields.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use news_copilot::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Commands::Ask { question, cached } => {
//!         println!("{question:?} (cached: {cached})");
//!     }
//!     _ => {}
//! }
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// Configuration file (defaults to `<config_dir>/config.yaml`).
    #[arg(long, global = true, env = "NCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the persisted vector store.
    #[arg(long, global = true, env = "NCP_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Sentence-transformer model identifier. Selects the sentence backend.
    #[arg(long, global = true, env = "NCP_EMBEDDING_MODEL")]
    pub model: Option<String>,

    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug, PartialEq)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Ask one question about the markets.
    ///
    /// Fresh news is fetched and indexed first unless `--cached` is given.
    #[clap(name = "ask", alias = "a")]
    Ask {
        /// The question to be asked. If not provided, a default question is used.
        question: Option<String>,

        /// Answer from the persisted store without fetching.
        #[arg(long)]
        cached: bool,
    },

    /// Ask questions in a loop until `exit` or `quit`.
    #[clap(name = "interactive", alias = "i")]
    Interactive {
        /// Answer from the persisted store without fetching.
        #[arg(long)]
        cached: bool,
    },

    /// Show ranked documents and scores for a query.
    #[clap(name = "search", alias = "s")]
    Search {
        query: String,

        /// Number of results; defaults to and is capped at `max_results`.
        #[arg(short = 'k', long)]
        k: Option<usize>,
    },

    /// Fetch news and rebuild the store.
    Refresh {
        /// Search terms for the Google News source.
        query: Option<String>,
    },

    /// Remove every document from the store.
    Clear,

    /// Print store location, model, document count and dimension.
    Status,

    /// Write a default configuration file.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_ask_with_cached() {
        let cli = Cli::try_parse_from(["ncp", "ask", "What moved the S&P 500?", "--cached"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Ask {
                question: Some("What moved the S&P 500?".to_string()),
                cached: true,
            }
        );
    }

    #[test]
    fn test_cli_parses_interactive_alias() {
        let cli = Cli::try_parse_from(["ncp", "i"]).unwrap();
        assert_eq!(cli.command, Commands::Interactive { cached: false });
    }

    #[test]
    fn test_cli_parses_search_with_k_and_global_flags() {
        let cli = Cli::try_parse_from([
            "ncp",
            "search",
            "interest rates",
            "-k",
            "3",
            "--store-dir",
            "/tmp/store",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Search {
                query: "interest rates".to_string(),
                k: Some(3),
            }
        );
        assert_eq!(cli.store_dir, Some(PathBuf::from("/tmp/store")));
    }

    #[test]
    fn test_cli_requires_search_query() {
        assert!(Cli::try_parse_from(["ncp", "search"]).is_err());
    }

    #[test]
    fn test_cli_parses_refresh_without_query() {
        let cli = Cli::try_parse_from(["ncp", "refresh"]).unwrap();
        assert_eq!(cli.command, Commands::Refresh { query: None });
    }
}
