//! TfL Unified API client for arrivals, line status, and stop disruptions
//!
//! Arrivals are the most volatile source on the mirror, so they carry the
//! shortest validity window (one minute); line status and disruption notices
//! change slowly enough for two.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::cache::{FileCache, Memoized};

/// Base URL for the TfL Unified API
const TFL_BASE_URL: &str = "https://api.tfl.gov.uk";

/// Validity window for arrival predictions
const ARRIVALS_TTL: Duration = Duration::from_secs(60);

/// Validity window for line status and disruption notices
const STATUS_TTL: Duration = Duration::from_secs(120);

/// Errors that can occur when fetching transit data
#[derive(Debug, Error)]
pub enum TransitError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// A single arrival prediction for a stop point
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arrival {
    /// Stop the prediction is for
    #[serde(default)]
    pub naptan_id: String,
    /// Line identifier (e.g. "victoria")
    #[serde(default)]
    pub line_id: String,
    /// Human-readable line name
    #[serde(default)]
    pub line_name: String,
    /// Platform, where the stop has one
    #[serde(default)]
    pub platform_name: String,
    /// Destination shown on the front of the vehicle
    #[serde(default)]
    pub destination_name: String,
    /// Predicted arrival time
    pub expected_arrival: DateTime<Utc>,
    /// Seconds until arrival at prediction time
    #[serde(default)]
    pub time_to_station: i64,
    /// Vehicle identifier, used to match trains across stops
    #[serde(default)]
    pub vehicle_id: String,
}

/// Status of one line, possibly with a disruption reason
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStatus {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub line_statuses: Vec<StatusEntry>,
}

/// One status entry within a line's status report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    /// 10 means "Good Service"; lower is worse
    pub status_severity: i32,
    #[serde(default)]
    pub status_severity_description: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl LineStatus {
    /// True when every status entry reports good service.
    pub fn is_good_service(&self) -> bool {
        self.line_statuses.iter().all(|s| s.status_severity == 10)
    }
}

/// A disruption notice attached to a stop point
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disruption {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub common_name: String,
}

/// Client for the TfL Unified API
#[derive(Debug, Clone)]
pub struct TransitClient {
    http: Client,
    cache: Option<FileCache>,
    base_url: String,
}

impl TransitClient {
    /// Creates a client; `cache: None` disables memoization.
    pub fn new(cache: Option<FileCache>) -> Self {
        Self {
            http: Client::new(),
            cache,
            base_url: TFL_BASE_URL.to_string(),
        }
    }

    /// Creates a client pointed at a custom base URL (for testing).
    #[cfg(test)]
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            http: Client::new(),
            cache: None,
            base_url,
        }
    }

    /// Fetches arrival predictions for a stop, sorted by expected arrival.
    pub async fn arrivals(&self, stop_id: &str) -> Result<Vec<Arrival>, TransitError> {
        let op = Memoized::new(
            self.cache.clone(),
            "tfl.arrivals",
            ARRIVALS_TTL,
            |stop: String| {
                let http = self.http.clone();
                let url = format!("{}/StopPoint/{stop}/Arrivals", self.base_url);
                async move {
                    let mut arrivals: Vec<Arrival> = http
                        .get(&url)
                        .send()
                        .await?
                        .error_for_status()?
                        .json()
                        .await?;
                    arrivals.sort_by_key(|a| a.expected_arrival);
                    Ok::<_, TransitError>(arrivals)
                }
            },
        );
        op.call(stop_id.to_string()).await
    }

    /// Fetches the status of the given lines.
    ///
    /// An empty input yields an empty result without touching network or
    /// cache.
    pub async fn line_status(&self, line_ids: &[String]) -> Result<Vec<LineStatus>, TransitError> {
        if line_ids.is_empty() {
            return Ok(Vec::new());
        }
        let op = Memoized::new(
            self.cache.clone(),
            "tfl.line_status",
            STATUS_TTL,
            |ids: Vec<String>| {
                let http = self.http.clone();
                let url = format!("{}/Line/{}/Status", self.base_url, ids.join(","));
                async move {
                    let statuses: Vec<LineStatus> = http
                        .get(&url)
                        .send()
                        .await?
                        .error_for_status()?
                        .json()
                        .await?;
                    Ok::<_, TransitError>(statuses)
                }
            },
        );
        op.call(line_ids.to_vec()).await
    }

    /// Fetches disruption notices for the given stop points.
    pub async fn disruptions(&self, stop_ids: &[String]) -> Result<Vec<Disruption>, TransitError> {
        if stop_ids.is_empty() {
            return Ok(Vec::new());
        }
        let op = Memoized::new(
            self.cache.clone(),
            "tfl.disruptions",
            STATUS_TTL,
            |ids: Vec<String>| {
                let http = self.http.clone();
                let url = format!("{}/StopPoint/{}/Disruption", self.base_url, ids.join(","));
                async move {
                    let disruptions: Vec<Disruption> = http
                        .get(&url)
                        .send()
                        .await?
                        .error_for_status()?
                        .json()
                        .await?;
                    Ok::<_, TransitError>(disruptions)
                }
            },
        );
        op.call(stop_ids.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrival(minutes: i64, line: &str) -> Arrival {
        Arrival {
            naptan_id: "490008660N".into(),
            line_id: line.into(),
            line_name: line.to_uppercase(),
            platform_name: String::new(),
            destination_name: "Walthamstow Central".into(),
            expected_arrival: Utc::now() + chrono::Duration::minutes(minutes),
            time_to_station: minutes * 60,
            vehicle_id: format!("v-{minutes}"),
        }
    }

    #[test]
    fn test_arrival_deserializes_from_tfl_camel_case() {
        let json = r#"{
            "naptanId": "490008660N",
            "lineId": "victoria",
            "lineName": "Victoria",
            "platformName": "Northbound - Platform 4",
            "destinationName": "Walthamstow Central",
            "expectedArrival": "2025-01-15T09:30:00Z",
            "timeToStation": 120,
            "vehicleId": "203"
        }"#;

        let a: Arrival = serde_json::from_str(json).unwrap();
        assert_eq!(a.line_id, "victoria");
        assert_eq!(a.time_to_station, 120);
        assert_eq!(a.vehicle_id, "203");
    }

    #[test]
    fn test_arrival_tolerates_missing_optional_fields() {
        let json = r#"{"expectedArrival": "2025-01-15T09:30:00Z"}"#;
        let a: Arrival = serde_json::from_str(json).unwrap();
        assert!(a.line_id.is_empty());
        assert_eq!(a.time_to_station, 0);
    }

    #[test]
    fn test_arrival_survives_cache_round_trip() {
        let original = arrival(5, "victoria");
        let json = serde_json::to_string(&original).unwrap();
        let back: Arrival = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expected_arrival, original.expected_arrival);
        assert_eq!(back.vehicle_id, original.vehicle_id);
    }

    #[test]
    fn test_line_status_good_service() {
        let good = LineStatus {
            id: "victoria".into(),
            name: "Victoria".into(),
            line_statuses: vec![StatusEntry {
                status_severity: 10,
                status_severity_description: "Good Service".into(),
                reason: None,
            }],
        };
        let delayed = LineStatus {
            id: "district".into(),
            name: "District".into(),
            line_statuses: vec![StatusEntry {
                status_severity: 6,
                status_severity_description: "Severe Delays".into(),
                reason: Some("signal failure at Earl's Court".into()),
            }],
        };

        assert!(good.is_good_service());
        assert!(!delayed.is_good_service());
    }

    #[tokio::test]
    async fn test_empty_line_ids_short_circuit() {
        // Unroutable base URL: any network attempt would error.
        let client = TransitClient::with_base_url("http://127.0.0.1:1".into());
        let statuses = client.line_status(&[]).await.unwrap();
        assert!(statuses.is_empty());
    }

    #[tokio::test]
    async fn test_empty_stop_ids_short_circuit() {
        let client = TransitClient::with_base_url("http://127.0.0.1:1".into());
        let disruptions = client.disruptions(&[]).await.unwrap();
        assert!(disruptions.is_empty());
    }
}
