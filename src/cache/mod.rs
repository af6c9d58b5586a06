//! File-backed fetch cache
//!
//! Every data source in this crate talks to its upstream through this module:
//! [`key`] derives a deterministic identifier from an operation's name and
//! arguments, [`store`] keeps one JSON file per entry generation under a
//! per-namespace directory, and [`memo::Memoized`] ties the two together as a
//! reusable "memoize to disk with a time-to-live" wrapper.
//!
//! The layer is intentionally simple: time-based expiry only, no size bound,
//! no locking. See the individual modules for the exact miss/cleanup rules.

pub mod key;
pub mod memo;
pub mod store;

pub use key::CacheKey;
pub use memo::Memoized;
pub use store::{FileCache, StoreError};
