//! Televised sports fixtures scraped from wheresthematch.com
//!
//! The cached unit is the raw listing page per sport (six hour window), so
//! parser changes can be iterated on without re-hitting the site. Extraction
//! works on row text: a fixture line contains " v " or " vs ", the
//! competition trails after a run of whitespace, and kickoff looks like
//! "Fri 15th August 2025 08:10".

use chrono::{NaiveDate, Utc};
use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{FileCache, Memoized};

/// Validity window for a fixtures page
const FIXTURES_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Days ahead included in the listing request
const FETCH_RANGE_DAYS: i64 = 31;

/// Browser-like user agent; the site serves trimmed pages to bots
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/122.0 Safari/537.36";

/// Errors that can occur when fetching fixtures
#[derive(Debug, Error)]
pub enum SportsError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// A sport to watch, with the team names that make a fixture interesting
#[derive(Debug, Clone)]
pub struct Sport {
    /// URL fragment, e.g. "rugby-union"
    pub slug: &'static str,
    /// Team name substrings, lower-case matched against home/away
    pub teams: &'static [&'static str],
    /// Friendly name for display
    pub display_name: &'static str,
}

/// The sports and teams shown on the mirror.
pub fn default_sports() -> Vec<Sport> {
    vec![
        Sport {
            slug: "rugby-union",
            teams: &["scotland", "ireland", "munster", "glasgow"],
            display_name: "Rugby",
        },
        Sport {
            slug: "cricket",
            teams: &["england"],
            display_name: "Cricket",
        },
        Sport {
            slug: "football",
            teams: &["everton"],
            display_name: "Football",
        },
    ]
}

/// One televised fixture involving a configured team
#[derive(Debug, Clone)]
pub struct Fixture {
    pub sport: String,
    pub home: String,
    pub away: String,
    pub date: Option<NaiveDate>,
    /// Kickoff time as shown in the listing, e.g. "08:10"
    pub time: String,
    pub competition: String,
    pub channel: String,
}

/// Client for fetching and parsing fixtures
#[derive(Debug, Clone)]
pub struct SportsClient {
    http: Client,
    cache: Option<FileCache>,
}

impl SportsClient {
    pub fn new(cache: Option<FileCache>) -> Self {
        Self {
            http: Client::new(),
            cache,
        }
    }

    /// Fetches the listing page for a sport and extracts matching fixtures.
    pub async fn fixtures(&self, sport: &Sport) -> Result<Vec<Fixture>, SportsError> {
        let html = self.fetch_page(sport.slug).await?;
        Ok(extract_fixtures(&html, sport))
    }

    /// Fetches the raw listing HTML for a sport slug (the cached operation).
    async fn fetch_page(&self, slug: &str) -> Result<String, SportsError> {
        let op = Memoized::new(
            self.cache.clone(),
            "sports.fixtures",
            FIXTURES_TTL,
            |slug: String| {
                let http = self.http.clone();
                async move {
                    let start = Utc::now().date_naive();
                    let end = start + chrono::Duration::days(FETCH_RANGE_DAYS);
                    let url = format!(
                        "https://www.wheresthematch.com/live-{slug}-on-tv/?showdatestart={}&showdateend={}",
                        start.format("%Y%m%d"),
                        end.format("%Y%m%d"),
                    );
                    log::debug!("fetching fixtures page {url}");
                    let body = http
                        .get(&url)
                        .header(reqwest::header::USER_AGENT, USER_AGENT)
                        .timeout(Duration::from_secs(20))
                        .send()
                        .await?
                        .error_for_status()?
                        .text()
                        .await?;
                    Ok::<_, SportsError>(body)
                }
            },
        );
        op.call(slug.to_string()).await
    }
}

/// Extracts fixtures for a sport from the cached listing HTML.
pub fn extract_fixtures(html: &str, sport: &Sport) -> Vec<Fixture> {
    if html.trim().is_empty() {
        return Vec::new();
    }

    let row_re = Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("static regex");
    let tag_re = Regex::new(r"<[^>]*>").expect("static regex");
    let channel_re = Regex::new(
        r#"(?is)class="channel-details".*?<img[^>]*?(?:title|alt)="([^"]*)""#,
    )
    .expect("static regex");

    let mut fixtures = Vec::new();
    for row in row_re.captures_iter(html) {
        let raw_row = &row[1];
        // Each dropped tag leaves a space, so text separated by markup keeps
        // the multi-space gaps the competition split relies on.
        let text = tag_re.replace_all(raw_row, " ");
        let text = text.trim();
        if !text.contains(" v ") && !text.contains(" vs ") {
            continue;
        }

        let Some((home, away)) = extract_teams(text) else {
            continue;
        };
        if !is_team_match(&home, &away, sport.teams) {
            continue;
        }

        let (date, time) = parse_date_time(text);
        let channel = channel_re
            .captures(raw_row)
            .map(|c| c[1].trim_end_matches(" logo").to_string())
            .unwrap_or_default();

        fixtures.push(Fixture {
            sport: sport.display_name.to_string(),
            home,
            away,
            date,
            time,
            competition: extract_competition(text),
            channel,
        });
    }
    fixtures
}

/// Splits a fixture line into home and away team names.
fn extract_teams(line: &str) -> Option<(String, String)> {
    let (home, rest) = if let Some(idx) = line.find(" v ") {
        (&line[..idx], &line[idx + 3..])
    } else if let Some(idx) = line.find(" vs ") {
        (&line[..idx], &line[idx + 4..])
    } else {
        return None;
    };

    // The away team ends at the first multi-space gap; what follows is
    // competition/channel noise.
    let away = split_on_gap(rest).0.trim();
    let home = home.trim();
    // Home names sit at the end of the leading cell text.
    let home = split_on_gap_last(home).trim();
    if home.is_empty() || away.is_empty() {
        return None;
    }
    Some((home.to_string(), away.to_string()))
}

fn is_team_match(home: &str, away: &str, teams: &[&str]) -> bool {
    let home = home.to_lowercase();
    let away = away.to_lowercase();
    teams.iter().any(|t| home == *t || away == *t)
}

/// Everything after the last multi-space gap, minus site boilerplate.
fn extract_competition(line: &str) -> String {
    let parts: Vec<&str> = split_all_on_gaps(line);
    if parts.len() < 2 {
        return String::new();
    }
    let competition = parts[parts.len() - 1].trim();
    let lowered = competition.to_lowercase();
    if matches!(
        lowered.as_str(),
        "log in to view" | "login to view" | "sign in to view"
    ) {
        return String::new();
    }
    competition
        .trim_end_matches(" Hide non-televised fixtures")
        .to_string()
}

/// Parses strings like "Fri 15th August 2025 08:10" into a date and a
/// kickoff time. Either half may be missing.
pub fn parse_date_time(text: &str) -> (Option<NaiveDate>, String) {
    let time_re = Regex::new(r"\b(\d{1,2}:\d{2})\b").expect("static regex");
    let time = time_re
        .captures(text)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let date_re = Regex::new(
        r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})\b",
    )
    .expect("static regex");

    let date = date_re.captures(text).and_then(|c| {
        let day: u32 = c[1].parse().ok()?;
        let month = month_number(&c[2].to_lowercase())?;
        let year: i32 = c[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    });

    (date, time)
}

fn month_number(name: &str) -> Option<u32> {
    let n = match name {
        "january" => 1,
        "february" => 2,
        "march" => 3,
        "april" => 4,
        "may" => 5,
        "june" => 6,
        "july" => 7,
        "august" => 8,
        "september" => 9,
        "october" => 10,
        "november" => 11,
        "december" => 12,
        _ => return None,
    };
    Some(n)
}

fn split_on_gap(s: &str) -> (&str, &str) {
    let gap_re = Regex::new(r"\s{2,}").expect("static regex");
    match gap_re.find(s) {
        Some(m) => (&s[..m.start()], &s[m.end()..]),
        None => (s, ""),
    }
}

fn split_on_gap_last(s: &str) -> &str {
    split_all_on_gaps(s).last().copied().unwrap_or(s)
}

fn split_all_on_gaps(s: &str) -> Vec<&str> {
    let gap_re = Regex::new(r"\s{2,}").expect("static regex");
    gap_re.split(s).filter(|p| !p.trim().is_empty()).collect()
}

/// Sort helper: undated fixtures sink to the end.
pub fn sort_fixtures(fixtures: &mut [Fixture]) {
    fixtures.sort_by_key(|f| (f.date.is_none(), f.date, f.time.clone()));
}
