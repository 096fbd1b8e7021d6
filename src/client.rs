use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::Config;
use crate::feed::{build_http_client, extract_posts, Clock, FeedCache, FetchError, Post};

/// Result count used when a caller gives no limit.
pub const DEFAULT_LIMIT: usize = 10;

/// How many recent posts [`HatenaBlogClient::get_by_url`] looks through.
/// Older posts are not reachable by URL.
pub const LOOKBACK_WINDOW: usize = 50;

/// Errors surfaced by [`HatenaBlogClient`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The feed could not be downloaded or parsed. No stale data is returned.
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    /// No post within the lookback window has this link.
    #[error("Post not found: {url}")]
    NotFound { url: String },
    /// The blog identifier does not form a valid feed URL.
    #[error("Invalid blog id {0:?}")]
    InvalidBlogId(String),
    /// The configured feed URL is not a valid URL.
    #[error("Invalid feed URL {url:?}: {source}")]
    InvalidFeedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Builds `https://{blog_id}.hatenablog.com/rss`, rejecting identifiers that
/// would not land on that host.
pub fn feed_url_for(blog_id: &str) -> Result<String, ClientError> {
    let invalid = || ClientError::InvalidBlogId(blog_id.to_string());
    if blog_id.is_empty() {
        return Err(invalid());
    }

    let feed_url = format!("https://{blog_id}.hatenablog.com/rss");
    let parsed = Url::parse(&feed_url).map_err(|_| invalid())?;
    let expected_host = format!("{}.hatenablog.com", blog_id.to_ascii_lowercase());
    if parsed.host_str() != Some(expected_host.as_str()) || parsed.path() != "/rss" {
        return Err(invalid());
    }

    Ok(feed_url)
}

/// Read access to one blog's feed: search, recent posts, lookup by URL.
///
/// The feed URL and cache duration are fixed at construction.
pub struct HatenaBlogClient {
    feed_url: String,
    cache: FeedCache,
}

impl HatenaBlogClient {
    /// Client for `https://{blog_id}.hatenablog.com/rss`, caching the feed for
    /// `cache_duration_secs`.
    pub fn new(blog_id: &str, cache_duration_secs: u64) -> Result<Self, ClientError> {
        let feed_url = feed_url_for(blog_id)?;
        let http = build_http_client(crate::feed::DEFAULT_REQUEST_TIMEOUT)?;
        Ok(Self::with_feed_url(
            http,
            feed_url,
            Duration::from_secs(cache_duration_secs),
        ))
    }

    /// Client for an explicit feed URL.
    pub fn with_feed_url(
        http: reqwest::Client,
        feed_url: impl Into<String>,
        cache_duration: Duration,
    ) -> Self {
        Self {
            feed_url: feed_url.into(),
            cache: FeedCache::new(http, cache_duration),
        }
    }

    /// Client described by `config`. `feed_url` wins over `blog_id` when set.
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        let feed_url = match &config.feed_url {
            Some(url) => {
                Url::parse(url).map_err(|source| ClientError::InvalidFeedUrl {
                    url: url.clone(),
                    source,
                })?;
                url.clone()
            }
            None => feed_url_for(&config.blog_id)?,
        };

        let timeout = config.request_timeout();
        let http = build_http_client(timeout)?;
        let mut client = Self::with_feed_url(http, feed_url, config.cache_duration());
        client.cache = client.cache.with_request_timeout(timeout);
        Ok(client)
    }

    /// Replaces the clock used for cache staleness.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = self.cache.with_clock(clock);
        self
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    pub fn cache_duration(&self) -> Duration {
        self.cache.cache_duration()
    }

    async fn posts(&self) -> Result<Vec<Post>, ClientError> {
        let document = self
            .cache
            .get(&self.feed_url)
            .await
            .map_err(|source| ClientError::Fetch {
                url: self.feed_url.clone(),
                source,
            })?;
        Ok(extract_posts(&document))
    }

    /// Posts whose title, summary or categories contain `keyword`, ignoring
    /// case. At most `limit`, in feed order.
    pub async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<Post>, ClientError> {
        let keyword_lower = keyword.to_lowercase();
        let matches: Vec<Post> = self
            .posts()
            .await?
            .into_iter()
            .filter(|post| post.matches(&keyword_lower))
            .take(limit)
            .collect();

        tracing::debug!(keyword = %keyword, limit = limit, found = matches.len(), "Searched feed");
        Ok(matches)
    }

    /// The first `limit` posts in feed order.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Post>, ClientError> {
        let mut posts = self.posts().await?;
        posts.truncate(limit);
        Ok(posts)
    }

    /// The post whose link is exactly `url`, among the [`LOOKBACK_WINDOW`]
    /// most recent posts.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotFound`] when no such post is in the window.
    pub async fn get_by_url(&self, url: &str) -> Result<Post, ClientError> {
        self.list_recent(LOOKBACK_WINDOW)
            .await?
            .into_iter()
            .find(|post| post.link == url)
            .ok_or_else(|| ClientError::NotFound {
                url: url.to_string(),
            })
    }

    /// Forgets every cached feed; the next operation downloads again.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
