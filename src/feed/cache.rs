use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::document::FeedDocument;
use super::fetcher::{fetch_feed, FetchError, DEFAULT_REQUEST_TIMEOUT};

/// Source of "now" for cache staleness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic process clock.
///
/// Entry age is measured with [`Instant`] rather than wall-clock time, so
/// setting the system clock back or forward neither extends nor cuts short
/// a cached feed's lifetime.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Lets cache expiry be exercised without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|p| p.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|p| p.into_inner());
        self.origin + offset
    }
}

/// A parsed document and when it was stored.
#[derive(Debug, Clone)]
struct CacheEntry {
    document: Arc<FeedDocument>,
    stored_at: Instant,
}

/// Time-bounded, URL-keyed cache of parsed feed documents.
///
/// A fresh entry is served without touching the network. A stale or missing
/// entry triggers one download; on success the entry is replaced wholesale,
/// on failure the old entry is left as it was and the error is returned.
/// Concurrent misses for the same URL are not coalesced: each downloads and
/// the last store wins.
pub struct FeedCache {
    http: reqwest::Client,
    entries: Mutex<HashMap<String, CacheEntry>>,
    cache_duration: Duration,
    request_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl FeedCache {
    pub fn new(http: reqwest::Client, cache_duration: Duration) -> Self {
        Self {
            http,
            entries: Mutex::new(HashMap::new()),
            cache_duration,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for staleness checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the time budget for each download.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn cache_duration(&self) -> Duration {
        self.cache_duration
    }

    /// Returns the parsed document for `url`, downloading it if the cached
    /// copy is missing or older than the cache duration.
    pub async fn get(&self, url: &str) -> Result<Arc<FeedDocument>, FetchError> {
        if let Some(document) = self.lookup(url) {
            tracing::debug!(url = %url, "Feed cache hit");
            return Ok(document);
        }

        tracing::debug!(url = %url, "Feed cache miss, fetching");
        let document = match fetch_feed(&self.http, url, self.request_timeout).await {
            Ok(document) => Arc::new(document),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Feed fetch failed");
                return Err(e);
            }
        };

        self.store(url, Arc::clone(&document));
        Ok(document)
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        tracing::debug!(dropped = dropped, "Feed cache cleared");
    }

    fn lookup(&self, url: &str) -> Option<Arc<FeedDocument>> {
        let now = self.clock.now();
        let entries = self.lock();
        let entry = entries.get(url)?;
        let age = now.saturating_duration_since(entry.stored_at);
        (age < self.cache_duration).then(|| Arc::clone(&entry.document))
    }

    fn store(&self, url: &str, document: Arc<FeedDocument>) {
        let entry = CacheEntry {
            document,
            stored_at: self.clock.now(),
        };
        self.lock().insert(url.to_string(), entry);
        tracing::debug!(url = %url, ttl_secs = self.cache_duration.as_secs(), "Feed cached");
    }

    // The map is never locked across an await point
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::build_http_client;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS_ONE: &str = "<rss><channel><item><title>one</title></item></channel></rss>";
    const RSS_TWO: &str = "<rss><channel><item><title>two</title></item></channel></rss>";

    fn cache(ttl: Duration, clock: Arc<ManualClock>) -> FeedCache {
        FeedCache::new(build_http_client(DEFAULT_REQUEST_TIMEOUT).unwrap(), ttl).with_clock(clock)
    }

    fn first_title(document: &FeedDocument) -> &str {
        document.entries()[0].child("title").unwrap().text()
    }

    #[tokio::test]
    async fn test_fresh_entry_served_without_network() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS_ONE))
            .expect(1)
            .mount(&mock_server)
            .await;

        let clock = Arc::new(ManualClock::new());
        let cache = cache(Duration::from_secs(300), clock.clone());
        let url = format!("{}/rss", mock_server.uri());

        let first = cache.get(&url).await.unwrap();
        clock.advance(Duration::from_secs(299));
        let second = cache.get(&url).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expired_entry_refetched_once_and_replaced() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS_ONE))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS_TWO))
            .expect(1)
            .mount(&mock_server)
            .await;

        let clock = Arc::new(ManualClock::new());
        let cache = cache(Duration::from_secs(300), clock.clone());
        let url = format!("{}/rss", mock_server.uri());

        assert_eq!(first_title(&cache.get(&url).await.unwrap()), "one");

        // Age equal to the duration counts as stale
        clock.advance(Duration::from_secs(300));
        assert_eq!(first_title(&cache.get(&url).await.unwrap()), "two");

        // The refreshed entry is fresh again
        clock.advance(Duration::from_secs(10));
        assert_eq!(first_title(&cache.get(&url).await.unwrap()), "two");
    }

    #[tokio::test]
    async fn test_failed_refresh_does_not_serve_stale_entry() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS_ONE))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let clock = Arc::new(ManualClock::new());
        let cache = cache(Duration::from_secs(60), clock.clone());
        let url = format!("{}/rss", mock_server.uri());

        cache.get(&url).await.unwrap();
        clock.advance(Duration::from_secs(61));

        assert!(matches!(
            cache.get(&url).await,
            Err(FetchError::HttpStatus(503))
        ));
        // Still stale, still failing
        assert!(cache.get(&url).await.is_err());
    }

    #[tokio::test]
    async fn test_entries_are_keyed_by_url() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS_ONE))
            .expect(2)
            .mount(&mock_server)
            .await;

        let cache = cache(Duration::from_secs(300), Arc::new(ManualClock::new()));
        cache.get(&format!("{}/a", mock_server.uri())).await.unwrap();
        cache.get(&format!("{}/b", mock_server.uri())).await.unwrap();
        cache.get(&format!("{}/a", mock_server.uri())).await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS_ONE))
            .expect(2)
            .mount(&mock_server)
            .await;

        let cache = cache(Duration::from_secs(300), Arc::new(ManualClock::new()));
        let url = format!("{}/rss", mock_server.uri());

        cache.get(&url).await.unwrap();
        cache.clear();
        cache.get(&url).await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_duration_never_caches() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS_ONE))
            .expect(2)
            .mount(&mock_server)
            .await;

        let cache = cache(Duration::ZERO, Arc::new(ManualClock::new()));
        let url = format!("{}/rss", mock_server.uri());
        cache.get(&url).await.unwrap();
        cache.get(&url).await.unwrap();
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - start, Duration::from_secs(5));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let earlier = clock.now();
        let later = clock.now();
        assert!(later >= earlier);
        assert!(later.checked_duration_since(earlier).is_some());
    }
}
