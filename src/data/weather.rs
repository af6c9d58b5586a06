//! WeatherAPI.com client
//!
//! One request fetches current conditions plus the multi-day forecast; the
//! parsed report is what lands in the cache, with a 15 minute validity
//! window.

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::cache::{FileCache, Memoized};

/// Base URL for the WeatherAPI.com v1 API
const WEATHER_BASE_URL: &str = "https://api.weatherapi.com/v1";

/// Validity window for the forecast
const FORECAST_TTL: Duration = Duration::from_secs(15 * 60);

/// Forecast days requested from the API
const FORECAST_DAYS: u8 = 3;

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Response was missing the forecast section
    #[error("forecast missing from response")]
    MissingForecast,
}

/// Current conditions at the configured location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Temperature in Celsius, rounded
    pub temperature: i32,
    /// Feels-like temperature in Celsius, rounded
    pub feels_like: i32,
    /// Condition text, e.g. "Partly cloudy"
    pub condition: String,
    /// Absolute URL of the condition icon
    pub icon: String,
    /// Relative humidity percentage
    pub humidity: u8,
}

/// One day of the forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayForecast {
    pub date: NaiveDate,
    /// Daily high in Celsius, rounded
    pub high: i32,
    /// Daily low in Celsius, rounded
    pub low: i32,
    pub description: String,
    /// Chance of rain, 0-100
    pub rain_chance: u8,
    /// Absolute URL of the condition icon
    pub icon: String,
}

/// Parsed weather report: current conditions plus the daily forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub current: CurrentConditions,
    pub days: Vec<DayForecast>,
}

// --- Raw WeatherAPI.com response shapes ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    current: ApiCurrent,
    forecast: Option<ApiForecast>,
}

#[derive(Debug, Deserialize)]
struct ApiCurrent {
    temp_c: f64,
    feelslike_c: f64,
    humidity: f64,
    condition: ApiCondition,
}

#[derive(Debug, Deserialize, Default)]
struct ApiCondition {
    #[serde(default)]
    text: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct ApiForecast {
    forecastday: Vec<ApiForecastDay>,
}

#[derive(Debug, Deserialize)]
struct ApiForecastDay {
    date: NaiveDate,
    day: ApiDay,
}

#[derive(Debug, Deserialize)]
struct ApiDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    #[serde(default)]
    daily_chance_of_rain: f64,
    #[serde(default)]
    condition: ApiCondition,
}

/// Client for fetching weather from WeatherAPI.com
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    cache: Option<FileCache>,
    api_key: String,
    base_url: String,
}

impl WeatherClient {
    /// Creates a client with the given API key.
    pub fn new(cache: Option<FileCache>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            cache,
            api_key: api_key.into(),
            base_url: WEATHER_BASE_URL.to_string(),
        }
    }

    /// Fetches the forecast for a location (postcode or place name).
    ///
    /// The cache key is derived from the location only; the API key is
    /// configuration, not an argument of the logical operation.
    pub async fn forecast(&self, location: &str) -> Result<WeatherReport, WeatherError> {
        let op = Memoized::new(
            self.cache.clone(),
            "weather.forecast",
            FORECAST_TTL,
            |loc: String| {
                let http = self.http.clone();
                let url = format!("{}/forecast.json", self.base_url);
                let key = self.api_key.clone();
                async move {
                    let response: ApiResponse = http
                        .get(&url)
                        .query(&[
                            ("key", key.as_str()),
                            ("q", loc.as_str()),
                            ("days", &FORECAST_DAYS.to_string()),
                            ("aqi", "no"),
                            ("alerts", "no"),
                        ])
                        .send()
                        .await?
                        .error_for_status()?
                        .json()
                        .await?;
                    parse_report(response)
                }
            },
        );
        op.call(location.to_string()).await
    }
}

fn parse_report(response: ApiResponse) -> Result<WeatherReport, WeatherError> {
    let current = CurrentConditions {
        temperature: response.current.temp_c.round() as i32,
        feels_like: response.current.feelslike_c.round() as i32,
        condition: response.current.condition.text.clone(),
        icon: icon_url(&response.current.condition.icon),
        humidity: response.current.humidity.round().clamp(0.0, 100.0) as u8,
    };

    let forecast = response.forecast.ok_or(WeatherError::MissingForecast)?;
    let days = forecast
        .forecastday
        .into_iter()
        .map(|fd| DayForecast {
            date: fd.date,
            high: fd.day.maxtemp_c.round() as i32,
            low: fd.day.mintemp_c.round() as i32,
            description: fd.day.condition.text.clone(),
            rain_chance: fd.day.daily_chance_of_rain.round().clamp(0.0, 100.0) as u8,
            icon: icon_url(&fd.day.condition.icon),
        })
        .collect();

    Ok(WeatherReport { current, days })
}

/// WeatherAPI returns protocol-relative icon URLs (`//cdn...`).
fn icon_url(icon: &str) -> String {
    if let Some(rest) = icon.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        icon.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "current": {
            "temp_c": 11.4,
            "feelslike_c": 9.8,
            "humidity": 82,
            "condition": {
                "text": "Light rain",
                "icon": "//cdn.weatherapi.com/weather/64x64/day/296.png"
            }
        },
        "forecast": {
            "forecastday": [
                {
                    "date": "2025-01-15",
                    "day": {
                        "maxtemp_c": 12.6,
                        "mintemp_c": 6.2,
                        "daily_chance_of_rain": 74,
                        "condition": {
                            "text": "Patchy rain nearby",
                            "icon": "//cdn.weatherapi.com/weather/64x64/day/176.png"
                        }
                    }
                },
                {
                    "date": "2025-01-16",
                    "day": {
                        "maxtemp_c": 9.0,
                        "mintemp_c": 3.4,
                        "daily_chance_of_rain": 10,
                        "condition": {
                            "text": "Sunny",
                            "icon": "//cdn.weatherapi.com/weather/64x64/day/113.png"
                        }
                    }
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_report_extracts_current_and_days() {
        let response: ApiResponse = serde_json::from_str(SAMPLE).unwrap();
        let report = parse_report(response).unwrap();

        assert_eq!(report.current.temperature, 11);
        assert_eq!(report.current.feels_like, 10);
        assert_eq!(report.current.condition, "Light rain");
        assert_eq!(report.current.humidity, 82);
        assert_eq!(report.days.len(), 2);
        assert_eq!(report.days[0].high, 13);
        assert_eq!(report.days[0].low, 6);
        assert_eq!(report.days[0].rain_chance, 74);
        assert_eq!(report.days[1].description, "Sunny");
    }

    #[test]
    fn test_icon_urls_are_absolute() {
        let response: ApiResponse = serde_json::from_str(SAMPLE).unwrap();
        let report = parse_report(response).unwrap();
        assert!(report.current.icon.starts_with("https://cdn.weatherapi.com/"));
        assert!(report.days[0].icon.starts_with("https://"));
    }

    #[test]
    fn test_missing_forecast_is_an_error() {
        let json = r#"{
            "current": {
                "temp_c": 5.0,
                "feelslike_c": 3.0,
                "humidity": 70,
                "condition": {"text": "Overcast", "icon": ""}
            }
        }"#;
        let response: ApiResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(parse_report(response), Err(WeatherError::MissingForecast)));
    }

    #[test]
    fn test_report_survives_cache_round_trip() {
        let response: ApiResponse = serde_json::from_str(SAMPLE).unwrap();
        let report = parse_report(response).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let back: WeatherReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.current.temperature, report.current.temperature);
        assert_eq!(back.days.len(), report.days.len());
    }

    #[test]
    fn test_icon_url_passthrough_for_absolute() {
        assert_eq!(icon_url("https://x/y.png"), "https://x/y.png");
        assert_eq!(icon_url(""), "");
    }
}
