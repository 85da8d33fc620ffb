//! Main module for the News Copilot CLI application (ncp).
//!
//! This module provides the main function for the CLI application. It handles
//! command parsing, configuration loading and initialization, then invokes the
//! library functionality matching the command-line arguments.
//!
//! # Examples
//!
//! Asking a question against freshly fetched news:
//!
//! ```sh
//! ncp ask "What is happening with interest rates?"
//! ```
//!
//! Inspecting the persisted store without touching the network:
//!
//! ```sh
//! ncp search "semiconductor earnings" -k 3
//! ncp status
//! ```
//!
//! Writing a default configuration:
//!
//! ```sh
//! ncp init
//! ```

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use news_copilot::commands::{Cli, Commands};
use news_copilot::config::{self, CopilotConfig};
use news_copilot::pipeline::{Answer, Copilot};
use news_copilot::report;
use once_cell::sync::OnceCell;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::{env, error::Error, time::Duration};
use tracing::{debug, info};

static TRACING: OnceCell<()> = OnceCell::new();

const DEFAULT_QUESTION: &str = "What is happening in the stock market today?";

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt().with_writer(io::stderr).init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Parses arguments, loads configuration and executes the requested command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or written, or if
/// the command itself fails (unreachable model, unwritable store).
async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config_path = config_path(cli.config.as_deref())?;

    if cli.command == Commands::Init {
        return init(&config_path);
    }

    let mut copilot_config = if config_path.exists() {
        debug!("Loading config from: {}", config_path.display());
        config::load_config(&config_path.to_string_lossy())?
    } else {
        debug!("No config at {}; using defaults", config_path.display());
        CopilotConfig::default()
    };
    copilot_config.apply_overrides(cli.store_dir, cli.model);
    copilot_config.validate()?;
    debug!("Config loaded: {:?}", copilot_config);

    let mut copilot = Copilot::from_config(&copilot_config)?;
    let mut stdout = io::stdout();

    match cli.command {
        Commands::Ask { question, cached } => {
            let question = question.unwrap_or_else(|| DEFAULT_QUESTION.to_string());
            let answer = ask(&mut copilot, &question, !cached).await?;
            report::render_answer(&mut stdout, &answer)?;
        }
        Commands::Interactive { cached } => {
            interactive(&mut copilot, !cached).await?;
        }
        Commands::Search { query, k } => {
            let hits = copilot.search(&query, k)?;
            report::render_hits(&mut stdout, &query, &hits)?;
        }
        Commands::Refresh { query } => {
            let query = query.unwrap_or_else(|| DEFAULT_QUESTION.to_string());
            let spinner = spinner("Fetching news");
            let records = copilot.refresh_knowledge(&query).await;
            spinner.finish_and_clear();
            let records = records?;
            info!("Fetched {} records", records.len());
            report::render_status(&mut stdout, copilot.index())?;
        }
        Commands::Clear => {
            copilot.index_mut().clear()?;
            report::render_status(&mut stdout, copilot.index())?;
        }
        Commands::Status => {
            report::render_status(&mut stdout, copilot.index())?;
        }
        Commands::Init => init(&config_path)?,
    }

    Ok(())
}

/// `--config`, then the working directory under `IN_TEST_ENVIRONMENT`,
/// then `<config_dir>/config.yaml`.
fn config_path(explicit: Option<&Path>) -> Result<PathBuf, Box<dyn Error>> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if env::var("IN_TEST_ENVIRONMENT").is_ok() {
        Ok(env::current_dir()?.join("config.yaml"))
    } else {
        Ok(news_copilot::config_dir()?.join("config.yaml"))
    }
}

fn spinner(message: &str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

async fn ask(
    copilot: &mut Copilot,
    question: &str,
    use_fresh_data: bool,
) -> Result<Answer, Box<dyn Error>> {
    let spinner = spinner(if use_fresh_data {
        "Fetching news and searching"
    } else {
        "Searching"
    });
    let answer = copilot.query(question, use_fresh_data).await;
    spinner.finish_and_clear();
    Ok(answer?)
}

/// Read questions from stdin until `exit`, `quit` or end of input.
async fn interactive(copilot: &mut Copilot, use_fresh_data: bool) -> Result<(), Box<dyn Error>> {
    let mut stdout = io::stdout();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        write!(stdout, "\nAsk about the markets (exit to quit): ")?;
        stdout.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let question = line?;
        let question = question.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        match ask(copilot, question, use_fresh_data).await {
            Ok(answer) => report::render_answer(&mut stdout, &answer)?,
            Err(err) => writeln!(stdout, "error: {err}")?,
        }
    }

    Ok(())
}

/// Writes a default configuration file, leaving an existing one untouched.
fn init(config_path: &Path) -> Result<(), Box<dyn Error>> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }
    info!("Creating config file: {}", config_path.display());
    CopilotConfig::default().save(config_path)?;
    println!("Wrote default config to {}", config_path.display());
    Ok(())
}
