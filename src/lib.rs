//! Cached search over a single Hatena Blog feed.
//!
//! [`HatenaBlogClient`] downloads the blog's RSS/Atom feed, keeps the parsed
//! document in memory for a fixed duration, and normalizes entries into
//! [`Post`](feed::Post)s for keyword search, recent listing and lookup by URL.
//! The [`mcp`] module exposes those operations as JSON-RPC tools.

pub mod client;
pub mod config;
pub mod feed;
pub mod mcp;
pub mod util;

pub use client::{ClientError, HatenaBlogClient, DEFAULT_LIMIT, LOOKBACK_WINDOW};
pub use config::Config;
