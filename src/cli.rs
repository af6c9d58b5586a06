//! Command-line interface for the mirror data fetcher
//!
//! Flags select which sources to show, switch between one-shot and watch
//! mode, and expose the cache maintenance operations (clear, sweep,
//! alternate directory, bypass).

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified source name is not recognized
    #[error("Invalid source: '{0}'. Valid sources: transit, weather, calendar, sports, news")]
    InvalidSource(String),
}

/// The data sources the mirror can display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Transit,
    Weather,
    Calendar,
    Sports,
    News,
}

impl Source {
    /// All sources, in display order.
    pub const ALL: [Source; 5] = [
        Source::Transit,
        Source::Weather,
        Source::Calendar,
        Source::Sports,
        Source::News,
    ];

    pub fn from_str(s: &str) -> Option<Source> {
        match s.to_lowercase().as_str() {
            "transit" | "tfl" | "arrivals" => Some(Source::Transit),
            "weather" => Some(Source::Weather),
            "calendar" | "events" => Some(Source::Calendar),
            "sports" | "fixtures" => Some(Source::Sports),
            "news" | "headlines" => Some(Source::News),
            _ => None,
        }
    }
}

/// Magic mirror data fetcher - aggregate transit, weather, calendar, sports
/// and news through a file-backed cache
#[derive(Parser, Debug)]
#[command(name = "magicmirror")]
#[command(about = "Fetch and display magic mirror data sources")]
#[command(version)]
pub struct Cli {
    /// Only fetch the named source; repeatable
    ///
    /// Valid sources: transit, weather, calendar, sports, news
    #[arg(long = "source", value_name = "NAME")]
    pub sources: Vec<String>,

    /// Keep running and reprint as sources refresh in the background
    #[arg(long)]
    pub watch: bool,

    /// Cache directory override (default: XDG cache dir)
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Delete the entire cache and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Before fetching, remove cache entries older than this many hours
    #[arg(long, value_name = "HOURS")]
    pub sweep_hours: Option<u64>,

    /// Bypass the cache entirely for this run
    #[arg(long)]
    pub no_cache: bool,
}

impl Cli {
    /// Resolves the `--source` filters; no filter means every source.
    pub fn selected_sources(&self) -> Result<Vec<Source>, CliError> {
        if self.sources.is_empty() {
            return Ok(Source::ALL.to_vec());
        }
        self.sources
            .iter()
            .map(|s| Source::from_str(s).ok_or_else(|| CliError::InvalidSource(s.clone())))
            .collect()
    }
}
