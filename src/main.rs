//! Magic mirror data fetcher
//!
//! One-shot mode fetches every selected source concurrently and prints a
//! plain-text dashboard; watch mode keeps background refresh tasks running
//! and reprints sections as updates arrive. All fetches go through the
//! file-backed cache, so rapid re-runs within a source's validity window do
//! not touch the network.

mod cache;
mod cli;
mod config;
mod data;
mod refresh;

use clap::Parser;
use std::time::Duration;

use cache::FileCache;
use cli::{Cli, Source};
use config::Config;
use data::{
    sports, Arrival, CalendarClient, CalendarEvent, Fixture, NewsClient, NewsItem, SportsClient,
    TransitClient, WeatherClient, WeatherReport,
};
use refresh::{RefreshConfig, RefreshHandle, RefreshMessage, SourceSet};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let selected = match cli.selected_sources() {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let cache = if cli.no_cache {
        None
    } else if let Some(dir) = &cli.cache_dir {
        Some(FileCache::with_root(dir.clone()))
    } else {
        FileCache::new()
    };

    if cli.clear_cache {
        if let Some(cache) = &cache {
            cache.clear()?;
            println!("Cache cleared: {}", cache.root().display());
        } else {
            println!("No cache directory to clear");
        }
        return Ok(());
    }

    if let Some(hours) = cli.sweep_hours {
        if let Some(cache) = &cache {
            let cutoff = Duration::from_secs(hours * 60 * 60);
            let mut removed = 0;
            for namespace in data::cache_namespaces() {
                removed += cache.sweep(namespace, cutoff)?;
            }
            println!("Swept {removed} cache entries older than {hours}h");
        }
    }

    let config = Config::from_env();

    if cli.watch {
        run_watch(&selected, &config, cache).await;
    } else {
        run_once(&selected, &config, cache).await;
    }
    Ok(())
}

/// Fetches every selected source concurrently and prints the dashboard.
async fn run_once(selected: &[Source], config: &Config, cache: Option<FileCache>) {
    let include = |s: Source| selected.contains(&s);

    let transit_section = async {
        if !include(Source::Transit) {
            return None;
        }
        if !config.transit_enabled() {
            return Some("Transit: not configured (set MIRROR_TFL_STOPS)".to_string());
        }
        let client = TransitClient::new(cache.clone());
        Some(fetch_transit_section(&client, config).await)
    };

    let weather_section = async {
        if !include(Source::Weather) {
            return None;
        }
        if !config.weather_enabled() {
            return Some("Weather: not configured (set MIRROR_WEATHER_API_KEY)".to_string());
        }
        let key = config.weather_api_key.clone().unwrap_or_default();
        let client = WeatherClient::new(cache.clone(), key);
        Some(match client.forecast(&config.weather_location).await {
            Ok(report) => render_weather(&config.weather_location, &report),
            Err(e) => format!("Weather: fetch failed: {e}"),
        })
    };

    let calendar_section = async {
        if !include(Source::Calendar) {
            return None;
        }
        if !config.calendar_enabled() {
            return Some(
                "Calendar: not configured (set MIRROR_CALENDAR_API_KEY and MIRROR_CALENDAR_IDS)"
                    .to_string(),
            );
        }
        let key = config.calendar_api_key.as_deref().unwrap_or_default();
        let client = CalendarClient::new(cache.clone(), key);
        let events = client.events(&config.calendar_ids).await;
        Some(render_calendar(&events))
    };

    let sports_section = async {
        if !include(Source::Sports) {
            return None;
        }
        let client = SportsClient::new(cache.clone());
        let mut fixtures = Vec::new();
        for sport in sports::default_sports() {
            match client.fixtures(&sport).await {
                Ok(found) => fixtures.extend(found),
                Err(e) => log::warn!("failed to fetch {} fixtures: {e}", sport.slug),
            }
        }
        sports::sort_fixtures(&mut fixtures);
        Some(render_sports(&fixtures))
    };

    let news_section = async {
        if !include(Source::News) {
            return None;
        }
        if !config.news_enabled() {
            return Some("News: not configured".to_string());
        }
        let client = NewsClient::new(cache.clone());
        let items = client.headlines(&config.news_feeds).await;
        Some(render_news(&items))
    };

    let (transit, weather, calendar, sports_out, news) = tokio::join!(
        transit_section,
        weather_section,
        calendar_section,
        sports_section,
        news_section
    );

    for section in [transit, weather, calendar, sports_out, news].into_iter().flatten() {
        println!("{section}");
        println!();
    }
}

/// Runs background refresh and reprints sections as updates arrive.
async fn run_watch(selected: &[Source], config: &Config, cache: Option<FileCache>) {
    let include = |s: Source| selected.contains(&s);

    let sources = SourceSet {
        transit: (include(Source::Transit) && config.transit_enabled()).then(|| {
            (TransitClient::new(cache.clone()), config.tfl_stops.clone())
        }),
        weather: (include(Source::Weather) && config.weather_enabled()).then(|| {
            let key = config.weather_api_key.clone().unwrap_or_default();
            (
                WeatherClient::new(cache.clone(), key),
                config.weather_location.clone(),
            )
        }),
        calendar: (include(Source::Calendar) && config.calendar_enabled()).then(|| {
            let key = config.calendar_api_key.clone().unwrap_or_default();
            (
                CalendarClient::new(cache.clone(), key),
                config.calendar_ids.clone(),
            )
        }),
        sports: include(Source::Sports)
            .then(|| (SportsClient::new(cache.clone()), sports::default_sports())),
        news: (include(Source::News) && config.news_enabled())
            .then(|| (NewsClient::new(cache.clone()), config.news_feeds.clone())),
    };

    let mut handle = RefreshHandle::spawn(RefreshConfig::default(), sources);
    println!("Watching for updates (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            message = handle.receiver.recv() => {
                match message {
                    Some(message) => print_update(message),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.shutdown();
                break;
            }
        }
    }
}

fn print_update(message: RefreshMessage) {
    match message {
        RefreshMessage::ArrivalsUpdated { stop_id, arrivals } => {
            println!("-- Arrivals at {stop_id} --");
            print!("{}", render_arrivals(&arrivals));
        }
        RefreshMessage::WeatherUpdated(report) => {
            println!("{}", render_weather("configured location", &report));
        }
        RefreshMessage::CalendarUpdated(events) => println!("{}", render_calendar(&events)),
        RefreshMessage::SportsUpdated(fixtures) => println!("{}", render_sports(&fixtures)),
        RefreshMessage::NewsUpdated(items) => println!("{}", render_news(&items)),
        RefreshMessage::RefreshError { source, message } => {
            eprintln!("[{source}] refresh failed: {message}");
        }
    }
}

async fn fetch_transit_section(client: &TransitClient, config: &Config) -> String {
    let mut out = String::from("== Transit ==\n");
    for stop in &config.tfl_stops {
        out.push_str(&format!("Stop {stop}:\n"));
        match client.arrivals(stop).await {
            Ok(arrivals) => out.push_str(&render_arrivals(&arrivals)),
            Err(e) => out.push_str(&format!("  fetch failed: {e}\n")),
        }
    }
    if !config.tfl_lines.is_empty() {
        match client.line_status(&config.tfl_lines).await {
            Ok(statuses) => {
                for status in statuses {
                    let summary = status
                        .line_statuses
                        .first()
                        .map(|s| s.status_severity_description.clone())
                        .unwrap_or_else(|| "Unknown".to_string());
                    out.push_str(&format!("{}: {summary}\n", status.name));
                }
            }
            Err(e) => out.push_str(&format!("Line status fetch failed: {e}\n")),
        }
    }
    out.trim_end().to_string()
}

fn render_arrivals(arrivals: &[Arrival]) -> String {
    if arrivals.is_empty() {
        return "  no arrivals predicted\n".to_string();
    }
    let mut out = String::new();
    for arrival in arrivals.iter().take(5) {
        let minutes = arrival.time_to_station / 60;
        out.push_str(&format!(
            "  {} to {} in {} min\n",
            arrival.line_name, arrival.destination_name, minutes
        ));
    }
    out
}

fn render_weather(location: &str, report: &WeatherReport) -> String {
    let mut out = format!(
        "== Weather ({location}) ==\n{}°C (feels {}°C), {}, humidity {}%\n",
        report.current.temperature,
        report.current.feels_like,
        report.current.condition,
        report.current.humidity
    );
    for day in &report.days {
        out.push_str(&format!(
            "{}: {} to {}°C, {} ({}% rain)\n",
            day.date.format("%a %d %b"),
            day.low,
            day.high,
            day.description,
            day.rain_chance
        ));
    }
    out.trim_end().to_string()
}

fn render_calendar(events: &[CalendarEvent]) -> String {
    let mut out = String::from("== Calendar ==\n");
    if events.is_empty() {
        out.push_str("no upcoming events\n");
    }
    for event in events.iter().take(8) {
        let when = if event.all_day {
            event.start.format("%a %d %b (all day)").to_string()
        } else {
            event.start.format("%a %d %b %H:%M").to_string()
        };
        out.push_str(&format!("{when}  {}\n", event.summary));
    }
    out.trim_end().to_string()
}

fn render_sports(fixtures: &[Fixture]) -> String {
    let mut out = String::from("== Fixtures ==\n");
    if fixtures.is_empty() {
        out.push_str("no televised fixtures for configured teams\n");
    }
    for fixture in fixtures.iter().take(10) {
        let date = fixture
            .date
            .map(|d| d.format("%a %d %b").to_string())
            .unwrap_or_else(|| "TBC".to_string());
        out.push_str(&format!(
            "{date} {}  {} v {}",
            fixture.time, fixture.home, fixture.away
        ));
        if !fixture.channel.is_empty() {
            out.push_str(&format!("  [{}]", fixture.channel));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn render_news(items: &[NewsItem]) -> String {
    let mut out = String::from("== News ==\n");
    if items.is_empty() {
        out.push_str("no headlines\n");
    }
    for item in items.iter().take(10) {
        out.push_str(&format!("{}: {}\n", item.source, item.title));
    }
    out.trim_end().to_string()
}
