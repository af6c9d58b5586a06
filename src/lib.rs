//! Magic mirror data layer
//!
//! Aggregates transit arrivals, weather, calendar events, sports fixtures,
//! and news headlines, with every upstream call memoized to disk through the
//! [`cache`] module. Exposed as a library so integration tests can drive the
//! cache and clients directly.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod refresh;
