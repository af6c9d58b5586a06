//! Per-source data clients for the mirror
//!
//! Each client owns an HTTP client plus an optional [`FileCache`] handle and
//! funnels every upstream call through [`Memoized`], so a source is fetched
//! live at most roughly once per validity window regardless of how many
//! refresh triggers fire. The validity windows live next to each client and
//! follow how the source is used, not how the data behaves: arrivals go
//! stale in a minute, a fixtures listing keeps for hours.
//!
//! [`FileCache`]: crate::cache::FileCache
//! [`Memoized`]: crate::cache::Memoized

pub mod calendar;
pub mod news;
pub mod sports;
pub mod transit;
pub mod weather;

/// Storage namespaces used by the data sources, for maintenance sweeps.
pub fn cache_namespaces() -> &'static [&'static str] {
    &[
        "tfl.arrivals",
        "tfl.line_status",
        "tfl.disruptions",
        "weather.forecast",
        "calendar.events",
        "sports.fixtures",
        "news.feed",
    ]
}

pub use calendar::{CalendarClient, CalendarError, CalendarEvent};
pub use news::{NewsClient, NewsError, NewsItem};
pub use sports::{Fixture, Sport, SportsClient, SportsError};
pub use transit::{Arrival, Disruption, LineStatus, TransitClient, TransitError};
pub use weather::{CurrentConditions, DayForecast, WeatherClient, WeatherError, WeatherReport};
