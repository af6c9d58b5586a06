//! Background data refresh
//!
//! Spawns one tokio task per configured source. Each task fetches
//! immediately to warm the display, then re-fetches on its interval and
//! reports over an mpsc channel. Task starts are staggered so a cold start
//! does not fire every source at once. A failed refresh is reported and the
//! loop keeps going; the previous data stays on screen.
//!
//! The fetch path still runs through each client's memoization, so a refresh
//! tick that lands inside a source's validity window is served from disk.

use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::data::{
    Arrival, CalendarClient, CalendarEvent, Fixture, NewsClient, NewsItem, Sport, SportsClient,
    TransitClient, WeatherClient, WeatherReport,
};

/// Messages sent from background refresh tasks to the display loop
#[derive(Debug, Clone)]
pub enum RefreshMessage {
    /// Arrival predictions updated for one stop
    ArrivalsUpdated {
        stop_id: String,
        arrivals: Vec<Arrival>,
    },
    /// Weather forecast updated
    WeatherUpdated(WeatherReport),
    /// Calendar events updated (merged across calendars)
    CalendarUpdated(Vec<CalendarEvent>),
    /// Sports fixtures updated (all configured sports)
    SportsUpdated(Vec<Fixture>),
    /// News headlines updated (all configured feeds)
    NewsUpdated(Vec<NewsItem>),
    /// A refresh attempt failed; previous data remains valid
    RefreshError {
        source: &'static str,
        message: String,
    },
}

/// Per-source refresh intervals
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub transit_interval: Duration,
    pub weather_interval: Duration,
    pub calendar_interval: Duration,
    pub sports_interval: Duration,
    pub news_interval: Duration,
    /// Delay between consecutive task starts on spawn
    pub stagger: Duration,
    /// Whether background refresh runs at all
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            transit_interval: Duration::from_secs(60),
            weather_interval: Duration::from_secs(15 * 60),
            calendar_interval: Duration::from_secs(5 * 60),
            sports_interval: Duration::from_secs(6 * 60 * 60),
            news_interval: Duration::from_secs(60 * 60 * 60),
            stagger: Duration::from_millis(500),
            enabled: true,
        }
    }
}

/// The clients and per-source settings the refresher drives.
///
/// A `None` source is simply not refreshed.
#[derive(Default)]
pub struct SourceSet {
    pub transit: Option<(TransitClient, Vec<String>)>,
    pub weather: Option<(WeatherClient, String)>,
    pub calendar: Option<(CalendarClient, Vec<String>)>,
    pub sports: Option<(SportsClient, Vec<Sport>)>,
    pub news: Option<(NewsClient, Vec<(String, String)>)>,
}

/// Handle for controlling the background refresh tasks
pub struct RefreshHandle {
    /// Channel delivering refresh results
    pub receiver: mpsc::Receiver<RefreshMessage>,
    shutdown_tx: watch::Sender<bool>,
}

impl RefreshHandle {
    /// Spawns the refresh tasks for every configured source.
    pub fn spawn(config: RefreshConfig, sources: SourceSet) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        if config.enabled {
            let mut slot: u32 = 0;
            let delay = |slot: &mut u32| {
                let d = config.stagger * *slot;
                *slot += 1;
                d
            };

            if let Some((client, stops)) = sources.transit {
                spawn_source(
                    "transit",
                    config.transit_interval,
                    delay(&mut slot),
                    msg_tx.clone(),
                    shutdown_rx.clone(),
                    move |tx| {
                        let client = client.clone();
                        let stops = stops.clone();
                        async move {
                            for stop in &stops {
                                match client.arrivals(stop).await {
                                    Ok(arrivals) => {
                                        let _ = tx
                                            .send(RefreshMessage::ArrivalsUpdated {
                                                stop_id: stop.clone(),
                                                arrivals,
                                            })
                                            .await;
                                    }
                                    Err(e) => return Err(e.to_string()),
                                }
                            }
                            Ok(())
                        }
                    },
                );
            }

            if let Some((client, location)) = sources.weather {
                spawn_source(
                    "weather",
                    config.weather_interval,
                    delay(&mut slot),
                    msg_tx.clone(),
                    shutdown_rx.clone(),
                    move |tx| {
                        let client = client.clone();
                        let location = location.clone();
                        async move {
                            let report =
                                client.forecast(&location).await.map_err(|e| e.to_string())?;
                            let _ = tx.send(RefreshMessage::WeatherUpdated(report)).await;
                            Ok(())
                        }
                    },
                );
            }

            if let Some((client, calendar_ids)) = sources.calendar {
                spawn_source(
                    "calendar",
                    config.calendar_interval,
                    delay(&mut slot),
                    msg_tx.clone(),
                    shutdown_rx.clone(),
                    move |tx| {
                        let client = client.clone();
                        let ids = calendar_ids.clone();
                        async move {
                            let events = client.events(&ids).await;
                            let _ = tx.send(RefreshMessage::CalendarUpdated(events)).await;
                            Ok(())
                        }
                    },
                );
            }

            if let Some((client, sports)) = sources.sports {
                spawn_source(
                    "sports",
                    config.sports_interval,
                    delay(&mut slot),
                    msg_tx.clone(),
                    shutdown_rx.clone(),
                    move |tx| {
                        let client = client.clone();
                        let sports = sports.clone();
                        async move {
                            let mut fixtures = Vec::new();
                            for sport in &sports {
                                fixtures.extend(
                                    client.fixtures(sport).await.map_err(|e| e.to_string())?,
                                );
                            }
                            crate::data::sports::sort_fixtures(&mut fixtures);
                            let _ = tx.send(RefreshMessage::SportsUpdated(fixtures)).await;
                            Ok(())
                        }
                    },
                );
            }

            if let Some((client, feeds)) = sources.news {
                spawn_source(
                    "news",
                    config.news_interval,
                    delay(&mut slot),
                    msg_tx.clone(),
                    shutdown_rx.clone(),
                    move |tx| {
                        let client = client.clone();
                        let feeds = feeds.clone();
                        async move {
                            let items = client.headlines(&feeds).await;
                            let _ = tx.send(RefreshMessage::NewsUpdated(items)).await;
                            Ok(())
                        }
                    },
                );
            }
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Signals every refresh task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Spawns one refresh loop: warm fetch on start, then fetch every `interval`
/// until a shutdown signal arrives.
fn spawn_source<F, Fut>(
    source: &'static str,
    interval: Duration,
    start_delay: Duration,
    tx: mpsc::Sender<RefreshMessage>,
    mut shutdown_rx: watch::Receiver<bool>,
    refresh: F,
) where
    F: Fn(mpsc::Sender<RefreshMessage>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<(), String>> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(start_delay).await;
        let mut interval = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(message) = refresh(tx.clone()).await {
                        log::warn!("{source} refresh failed: {message}");
                        let _ = tx
                            .send(RefreshMessage::RefreshError { source, message })
                            .await;
                    }
                }
                changed = shutdown_rx.changed() => {
                    // A dropped sender means the handle is gone; stop too.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_config_defaults_match_source_ttls() {
        let config = RefreshConfig::default();
        assert_eq!(config.transit_interval, Duration::from_secs(60));
        assert_eq!(config.weather_interval, Duration::from_secs(900));
        assert_eq!(config.calendar_interval, Duration::from_secs(300));
        assert_eq!(config.sports_interval, Duration::from_secs(6 * 60 * 60));
        assert_eq!(config.news_interval, Duration::from_secs(60 * 60 * 60));
        assert!(config.enabled);
    }

    #[tokio::test]
    async fn test_spawn_with_no_sources_sends_nothing() {
        let mut handle = RefreshHandle::spawn(RefreshConfig::default(), SourceSet::default());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_spawn_disabled_sends_nothing_even_with_sources() {
        let config = RefreshConfig {
            enabled: false,
            ..Default::default()
        };
        let sources = SourceSet {
            news: Some((NewsClient::new(None), Vec::new())),
            ..Default::default()
        };

        let mut handle = RefreshHandle::spawn(config, sources);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_news_source_with_empty_feed_list_reports_empty_update() {
        let config = RefreshConfig {
            stagger: Duration::ZERO,
            ..Default::default()
        };
        let sources = SourceSet {
            news: Some((NewsClient::new(None), Vec::new())),
            ..Default::default()
        };

        let mut handle = RefreshHandle::spawn(config, sources);

        let msg = tokio::time::timeout(Duration::from_secs(1), handle.receiver.recv())
            .await
            .expect("warm fetch should arrive promptly")
            .expect("channel open");
        match msg {
            RefreshMessage::NewsUpdated(items) => assert!(items.is_empty()),
            other => panic!("unexpected message: {other:?}"),
        }
        handle.shutdown();
    }
}
