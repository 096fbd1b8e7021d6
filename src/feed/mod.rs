//! Feed retrieval and normalization.
//!
//! - **Fetching**: bounded, time-limited HTTP download of the feed XML
//! - **Parsing**: XML folded into an element tree, then resolved once into an
//!   RSS or Atom [`FeedDocument`]
//! - **Caching**: [`FeedCache`] memoizes parsed documents per URL for a fixed
//!   duration
//! - **Normalization**: [`extract_posts`] turns either shape into [`Post`]s
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use hatena_blog_mcp::feed::{build_http_client, extract_posts, FeedCache};
//!
//! let http = build_http_client(Duration::from_secs(30))?;
//! let cache = FeedCache::new(http, Duration::from_secs(300));
//! let document = cache.get("https://example.hatenablog.com/rss").await?;
//! let posts = extract_posts(&document);
//! ```

mod cache;
mod document;
mod fetcher;
mod normalize;
mod xml;

pub use cache::{Clock, FeedCache, ManualClock, SystemClock};
pub use document::FeedDocument;
pub use fetcher::{build_http_client, fetch_feed, FetchError, DEFAULT_REQUEST_TIMEOUT};
pub use normalize::{extract_post, extract_posts, Post, SUMMARY_MAX_CHARS};
pub use xml::{parse_document, XmlElement, XmlError};
