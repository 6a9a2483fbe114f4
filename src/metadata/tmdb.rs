use crate::config::MetadataConfig;
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One entry of a movie search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Title search against a movie database
#[async_trait]
pub trait MovieSearch: Send + Sync {
    /// Ranked results for `title`, optionally restricted to a release year
    async fn search_movie(&self, title: &str, year: Option<u16>) -> Result<Vec<SearchHit>>;
}

/// TMDB v3 `/search/movie` client
pub struct TmdbClient {
    client: Client,
    api_key: String,
    search_url: String,
    language: String,
}

impl TmdbClient {
    pub fn new(config: &MetadataConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ScraperError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(ScraperError::HttpClient)?;

        Ok(Self {
            client,
            api_key,
            search_url: format!("{}/search/movie", config.api_base.trim_end_matches('/')),
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl MovieSearch for TmdbClient {
    async fn search_movie(&self, title: &str, year: Option<u16>) -> Result<Vec<SearchHit>> {
        let mut params = vec![
            ("api_key", self.api_key.clone()),
            ("query", title.to_string()),
            ("language", self.language.clone()),
        ];
        if let Some(year) = year {
            params.push(("primary_release_year", year.to_string()));
        }

        debug!("TMDB search: {:?} (year {:?})", title, year);

        let response = self
            .client
            .get(&self.search_url)
            .query(&params)
            .send()
            .await
            .map_err(|source| ScraperError::Fetch {
                url: self.search_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                url: self.search_url.clone(),
                status: status.as_u16(),
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ScraperError::Decode(e.to_string()))?;

        Ok(body.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_decoding() {
        let json = r#"{
            "page": 1,
            "results": [
                {
                    "id": 603,
                    "title": "The Matrix",
                    "release_date": "1999-03-31",
                    "overview": "Set in the 22nd century...",
                    "poster_path": "/f89U3ADr1oiB1s9GkdPOEpXUk5H.jpg",
                    "backdrop_path": null
                },
                { "id": 1 }
            ],
            "total_results": 2
        }"#;

        let response: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].id, Some(603));
        assert_eq!(response.results[0].backdrop_path, None);
        assert_eq!(response.results[1].title, None);
    }

    #[test]
    fn test_missing_results_field() {
        let response: SearchResponse = serde_json::from_str(r#"{"status_code": 7}"#).unwrap();
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = MetadataConfig::default();
        assert!(matches!(TmdbClient::new(&config), Err(ScraperError::MissingApiKey)));
    }
}
