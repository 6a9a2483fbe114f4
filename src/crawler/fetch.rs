use crate::config::CrawlerConfig;
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Source of directory listing pages
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a listing page and return its body
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// Fetches listing pages over HTTP
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(ScraperError::HttpClient)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ScraperError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| ScraperError::Fetch {
            url: url.to_string(),
            source,
        })
    }
}
