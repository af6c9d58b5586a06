//! Environment-driven configuration
//!
//! Every data source is configured through `MIRROR_*` environment variables;
//! a missing variable disables its source rather than failing startup, so a
//! mirror with only a weather key still boots and shows weather.
//!
//! Variables:
//! - `MIRROR_TFL_STOPS`: comma-separated StopPoint ids
//! - `MIRROR_TFL_LINES`: comma-separated line ids for status checks
//! - `MIRROR_WEATHER_API_KEY` / `MIRROR_WEATHER_LOCATION`
//! - `MIRROR_CALENDAR_API_KEY` / `MIRROR_CALENDAR_IDS`
//! - `MIRROR_NEWS_FEEDS`: comma-separated `Name|url` pairs; unset falls back
//!   to the built-in feed list

use std::env;

use crate::data::news;

/// Default weather location when only an API key is configured
const DEFAULT_WEATHER_LOCATION: &str = "London";

/// Runtime configuration collected from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub tfl_stops: Vec<String>,
    pub tfl_lines: Vec<String>,
    pub weather_api_key: Option<String>,
    pub weather_location: String,
    pub calendar_api_key: Option<String>,
    pub calendar_ids: Vec<String>,
    pub news_feeds: Vec<(String, String)>,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            tfl_stops: parse_csv(&env_or_empty("MIRROR_TFL_STOPS")),
            tfl_lines: parse_csv(&env_or_empty("MIRROR_TFL_LINES")),
            weather_api_key: env_nonempty("MIRROR_WEATHER_API_KEY"),
            weather_location: env_nonempty("MIRROR_WEATHER_LOCATION")
                .unwrap_or_else(|| DEFAULT_WEATHER_LOCATION.to_string()),
            calendar_api_key: env_nonempty("MIRROR_CALENDAR_API_KEY"),
            calendar_ids: parse_csv(&env_or_empty("MIRROR_CALENDAR_IDS")),
            news_feeds: match env_nonempty("MIRROR_NEWS_FEEDS") {
                Some(raw) => parse_feeds(&raw),
                None => news::default_feeds(),
            },
        }
    }

    /// True when transit has at least one stop to watch.
    pub fn transit_enabled(&self) -> bool {
        !self.tfl_stops.is_empty()
    }

    /// True when weather has an API key.
    pub fn weather_enabled(&self) -> bool {
        self.weather_api_key.is_some()
    }

    /// True when calendar has both a key and at least one calendar id.
    pub fn calendar_enabled(&self) -> bool {
        self.calendar_api_key.is_some() && !self.calendar_ids.is_empty()
    }

    /// True when any news feed is configured (the default list counts).
    pub fn news_enabled(&self) -> bool {
        !self.news_feeds.is_empty()
    }
}

fn env_or_empty(var: &str) -> String {
    env::var(var).unwrap_or_default()
}

fn env_nonempty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Splits a comma-separated list, dropping empty segments.
fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `Name|url` pairs; a bare URL uses its host as the name.
fn parse_feeds(raw: &str) -> Vec<(String, String)> {
    parse_csv(raw)
        .into_iter()
        .map(|entry| match entry.split_once('|') {
            Some((name, url)) => (name.trim().to_string(), url.trim().to_string()),
            None => (feed_name_from_url(&entry), entry),
        })
        .collect()
}

fn feed_name_from_url(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(url)
        .to_string()
}
