//! Movie metadata resolution
//!
//! Resolves parsed titles to TMDB records. Lookups are cached per
//! `(title, year)` for the life of the resolver, retried on transient
//! failures and throttled by a single limiter shared by every caller.
pub mod tmdb;

pub use tmdb::{MovieSearch, SearchHit, TmdbClient};

use crate::config::MetadataConfig;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Normalised movie information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    /// Four-digit release year, or empty when unknown
    pub year: String,
    /// Synopsis, safe to embed in a double-quoted attribute
    pub overview: String,
    pub tmdb_id: Option<u64>,
    pub poster_url: String,
    pub backdrop_url: String,
}

impl MetadataRecord {
    pub fn display_title(&self) -> String {
        if self.year.is_empty() {
            self.title.clone()
        } else {
            format!("{} ({})", self.title, self.year)
        }
    }

    /// Poster, falling back to the backdrop
    pub fn logo_url(&self) -> &str {
        if self.poster_url.is_empty() {
            &self.backdrop_url
        } else {
            &self.poster_url
        }
    }
}

type CacheKey = (String, Option<u16>);
type CacheSlot = Arc<OnceCell<Option<MetadataRecord>>>;

/// Cached, retrying, rate-limited title → metadata resolver
pub struct MetadataResolver {
    search: Arc<dyn MovieSearch>,
    cache: Mutex<HashMap<CacheKey, CacheSlot>>,
    limiter: Option<DefaultDirectRateLimiter>,
    image_base: String,
    max_attempts: u32,
    retry_delay: Duration,
    requests: AtomicUsize,
}

impl MetadataResolver {
    pub fn new(search: Arc<dyn MovieSearch>, config: &MetadataConfig) -> Self {
        let limiter = Quota::with_period(Duration::from_millis(config.rate_limit_ms))
            .map(RateLimiter::direct);

        Self {
            search,
            cache: Mutex::new(HashMap::new()),
            limiter,
            image_base: config.image_base.trim_end_matches('/').to_string(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            requests: AtomicUsize::new(0),
        }
    }

    /// Resolve a parsed title. `None` means no match, including when every
    /// attempt failed; failures are never surfaced to the caller.
    ///
    /// Concurrent calls for the same key share a single lookup.
    pub async fn resolve(&self, title: &str, year: Option<u16>) -> Option<MetadataRecord> {
        let slot = {
            let mut cache = self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            cache.entry((title.to_string(), year)).or_default().clone()
        };

        slot.get_or_init(|| self.lookup(title, year)).await.clone()
    }

    fn resolve_boxed<'a>(
        &'a self,
        title: &'a str,
        year: Option<u16>,
    ) -> Pin<Box<dyn Future<Output = Option<MetadataRecord>> + Send + 'a>> {
        Box::pin(self.resolve(title, year))
    }

    async fn lookup(&self, title: &str, year: Option<u16>) -> Option<MetadataRecord> {
        let hits = self.search_with_retry(title, year).await?;

        match hits.into_iter().next() {
            Some(hit) => Some(self.normalize(hit, title, year)),
            None if year.is_some() => {
                debug!("No TMDB results for {:?} ({:?}), retrying without year", title, year);
                self.resolve_boxed(title, None).await
            }
            None => None,
        }
    }

    async fn search_with_retry(&self, title: &str, year: Option<u16>) -> Option<Vec<SearchHit>> {
        for attempt in 1..=self.max_attempts {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }
            self.requests.fetch_add(1, Ordering::Relaxed);

            match self.search.search_movie(title, year).await {
                Ok(hits) => return Some(hits),
                Err(e) => {
                    warn!("TMDB attempt {}/{} for {:?} failed: {}", attempt, self.max_attempts, title, e);
                    if !e.is_transient() {
                        break;
                    }
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        warn!("Giving up on {:?}, treating as unmatched", title);
        None
    }

    fn normalize(&self, hit: SearchHit, title: &str, year: Option<u16>) -> MetadataRecord {
        let release_year = hit
            .release_date
            .as_deref()
            .filter(|date| !date.is_empty())
            .map(|date| date.chars().take(4).collect::<String>());

        MetadataRecord {
            title: hit
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| title.to_string()),
            year: release_year
                .or_else(|| year.map(|y| y.to_string()))
                .unwrap_or_default(),
            overview: sanitize_overview(hit.overview.as_deref().unwrap_or_default()),
            tmdb_id: hit.id,
            poster_url: self.image_url(hit.poster_path.as_deref()),
            backdrop_url: self.image_url(hit.backdrop_path.as_deref()),
        }
    }

    fn image_url(&self, path: Option<&str>) -> String {
        match path {
            Some(path) if !path.is_empty() => format!("{}{}", self.image_base, path),
            _ => String::new(),
        }
    }

    /// Number of cached `(title, year)` keys
    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Outbound search requests issued so far, retries included
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

/// Single-line synopsis with double quotes turned into single quotes
fn sanitize_overview(overview: &str) -> String {
    overview
        .replace('"', "'")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
