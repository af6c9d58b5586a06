//! Google Calendar client
//!
//! Fetches upcoming events per calendar through the v3 REST API with an API
//! key (read access to calendars shared with the key's project). Events from
//! all configured calendars are merged and ordered by start time; each
//! calendar's fetch is memoized separately for five minutes.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::cache::{FileCache, Memoized};

/// Base URL for the Google Calendar v3 API
const CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Validity window for calendar events
const EVENTS_TTL: Duration = Duration::from_secs(5 * 60);

/// Upper bound on events requested per calendar
const MAX_RESULTS: u32 = 50;

/// Errors that can occur when fetching calendar events
#[derive(Debug, Error)]
pub enum CalendarError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// A calendar event normalized for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// True for date-only ("all day") events
    pub all_day: bool,
    /// Calendar the event came from
    pub calendar_id: String,
}

// --- Raw Google Calendar response shapes ---

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

#[derive(Debug, Deserialize)]
struct ApiEvent {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    start: ApiEventTime,
    end: ApiEventTime,
}

/// Either a timestamp or a bare date, depending on whether the event is
/// all-day.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<DateTime<Utc>>,
    date: Option<NaiveDate>,
}

impl ApiEventTime {
    fn resolve(&self) -> Option<(DateTime<Utc>, bool)> {
        if let Some(dt) = self.date_time {
            return Some((dt, false));
        }
        let date = self.date?;
        let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
        Some((midnight, true))
    }
}

/// Client for fetching Google Calendar events
#[derive(Debug, Clone)]
pub struct CalendarClient {
    http: Client,
    cache: Option<FileCache>,
    api_key: String,
    base_url: String,
}

impl CalendarClient {
    /// Creates a client with the given API key.
    pub fn new(cache: Option<FileCache>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            cache,
            api_key: api_key.into(),
            base_url: CALENDAR_BASE_URL.to_string(),
        }
    }

    /// Fetches upcoming events for a single calendar.
    pub async fn events_for(&self, calendar_id: &str) -> Result<Vec<CalendarEvent>, CalendarError> {
        let op = Memoized::new(
            self.cache.clone(),
            "calendar.events",
            EVENTS_TTL,
            |cal_id: String| {
                let http = self.http.clone();
                let key = self.api_key.clone();
                let url = format!("{}/calendars/{cal_id}/events", self.base_url);
                async move {
                    let response: EventsResponse = http
                        .get(&url)
                        .query(&[
                            ("key", key.as_str()),
                            ("timeMin", &Utc::now().to_rfc3339()),
                            ("singleEvents", "true"),
                            ("orderBy", "startTime"),
                            ("maxResults", &MAX_RESULTS.to_string()),
                        ])
                        .send()
                        .await?
                        .error_for_status()?
                        .json()
                        .await?;
                    Ok::<_, CalendarError>(normalize_events(response, &cal_id))
                }
            },
        );
        op.call(calendar_id.to_string()).await
    }

    /// Fetches and merges events across all configured calendars, ordered by
    /// start time.
    ///
    /// A calendar that fails to fetch is logged and skipped so one broken
    /// calendar does not blank the whole panel.
    pub async fn events(&self, calendar_ids: &[String]) -> Vec<CalendarEvent> {
        let fetches = calendar_ids.iter().map(|id| self.events_for(id));
        let mut merged = Vec::new();
        for (id, result) in calendar_ids.iter().zip(join_all(fetches).await) {
            match result {
                Ok(events) => merged.extend(events),
                Err(e) => log::warn!("failed to fetch calendar {id}: {e}"),
            }
        }
        merged.sort_by_key(|e| e.start);
        merged
    }
}

fn normalize_events(response: EventsResponse, calendar_id: &str) -> Vec<CalendarEvent> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let (start, all_day) = item.start.resolve()?;
            let (end, _) = item.end.resolve()?;
            Some(CalendarEvent {
                id: item.id,
                summary: item.summary.unwrap_or_else(|| "(untitled)".to_string()),
                start,
                end,
                all_day,
                calendar_id: calendar_id.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "items": [
            {
                "id": "evt-2",
                "summary": "Dentist",
                "start": {"dateTime": "2025-01-16T14:30:00Z"},
                "end": {"dateTime": "2025-01-16T15:00:00Z"}
            },
            {
                "id": "evt-1",
                "start": {"date": "2025-01-15"},
                "end": {"date": "2025-01-16"}
            },
            {
                "id": "evt-broken",
                "summary": "No usable time",
                "start": {},
                "end": {}
            }
        ]
    }"#;

    #[test]
    fn test_normalize_resolves_timed_and_all_day_events() {
        let response: EventsResponse = serde_json::from_str(SAMPLE).unwrap();
        let events = normalize_events(response, "family@group.calendar.google.com");

        assert_eq!(events.len(), 2, "Events without a usable time are dropped");

        let timed = events.iter().find(|e| e.id == "evt-2").unwrap();
        assert!(!timed.all_day);
        assert_eq!(timed.summary, "Dentist");

        let all_day = events.iter().find(|e| e.id == "evt-1").unwrap();
        assert!(all_day.all_day);
        assert_eq!(all_day.summary, "(untitled)");
        assert_eq!(all_day.start, Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap());
        assert_eq!(all_day.calendar_id, "family@group.calendar.google.com");
    }

    #[test]
    fn test_event_survives_cache_round_trip() {
        let response: EventsResponse = serde_json::from_str(SAMPLE).unwrap();
        let events = normalize_events(response, "cal");
        let json = serde_json::to_string(&events).unwrap();
        let back: Vec<CalendarEvent> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), events.len());
        assert_eq!(back[0].start, events[0].start);
    }

    #[test]
    fn test_empty_items_normalizes_to_empty() {
        let response: EventsResponse = serde_json::from_str("{}").unwrap();
        assert!(normalize_events(response, "cal").is_empty());
    }
}
