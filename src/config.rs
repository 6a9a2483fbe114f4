use crate::error::{Result, ScraperError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Configuration for the playlist generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory crawling settings
    pub crawler: CrawlerConfig,

    /// TMDB lookup settings
    pub metadata: MetadataConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Root of the open directory, always ends with '/'
    pub base_url: String,

    /// How many folder levels feed the category (1 = top folder only, 2 = top > sub)
    pub max_category_depth: usize,

    /// Recognised video extensions, with leading dot
    pub video_extensions: Vec<String>,

    /// Per-page request timeout (seconds)
    pub request_timeout_seconds: u64,

    /// User-Agent sent to the directory server
    pub user_agent: String,

    /// Maximum listing pages fetched concurrently
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// TMDB v3 API key
    pub api_key: Option<String>,

    /// TMDB API root
    pub api_base: String,

    /// Prefix for poster and backdrop paths
    pub image_base: String,

    /// Language passed to the search endpoint
    pub language: String,

    /// Attempts per search before giving up
    pub max_attempts: u32,

    /// Pause between failed attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// Minimum spacing between outbound API requests (milliseconds)
    pub rate_limit_ms: u64,

    /// Per-request timeout (seconds)
    pub request_timeout_seconds: u64,

    /// Lookups in flight while building the playlist
    pub max_concurrent_lookups: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Destination of the generated playlist
    pub playlist_path: PathBuf,

    /// Default log filter level
    pub log_level: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://ftp.ctgfun.com/".to_string(),
            max_category_depth: 2,
            video_extensions: [".mkv", ".mp4", ".avi", ".mov", ".m4v", ".ts", ".wmv", ".divx", ".flv"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            request_timeout_seconds: 20,
            user_agent: "Mozilla/5.0 (compatible; M3U-Scraper/1.0)".to_string(),
            max_concurrent_requests: num_cpus::get().clamp(2, 8),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.themoviedb.org/3".to_string(),
            image_base: "https://image.tmdb.org/t/p/w500".to_string(),
            language: "en-US".to_string(),
            max_attempts: 3,
            retry_delay_ms: 2000,
            rate_limit_ms: 250,
            request_timeout_seconds: 10,
            max_concurrent_lookups: 4,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            playlist_path: PathBuf::from("output/playlist.m3u"),
            log_level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            metadata: MetadataConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file (explicit or well-known location), then apply env overrides
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_default_locations()?,
        };
        config.apply_env();
        config.crawler.base_url = normalize_base_url(&config.crawler.base_url);
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&config_str).map_err(|source| ScraperError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn from_default_locations() -> Result<Self> {
        let config_paths = ["opendir-m3u.toml", "config/opendir-m3u.toml"];

        for path in &config_paths {
            let path = Path::new(path);
            if path.exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Override settings from environment variables
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("FTP_PUBLIC_URL") {
            self.crawler.base_url = base_url;
        }

        if let Some(api_key) = lookup("TMDB_API_KEY") {
            self.metadata.api_key = Some(api_key);
        }

        if let Some(output) = lookup("OPENDIR_M3U_OUTPUT") {
            self.output.playlist_path = PathBuf::from(output);
        }

        if let Some(log_level) = lookup("OPENDIR_M3U_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        if let Some(workers) = lookup("OPENDIR_M3U_WORKERS") {
            match workers.parse() {
                Ok(workers) => self.crawler.max_concurrent_requests = workers,
                Err(_) => tracing::warn!("Ignoring invalid OPENDIR_M3U_WORKERS value: {}", workers),
            }
        }
    }

    /// Validate configuration; must pass before any network activity
    pub fn validate(&self) -> Result<()> {
        match self.metadata.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ScraperError::MissingApiKey),
        }

        self.base_url()?;

        if self.crawler.max_concurrent_requests == 0 {
            return Err(ScraperError::InvalidConfig(
                "crawler.max_concurrent_requests must be greater than 0".to_string(),
            ));
        }

        if self.metadata.max_concurrent_lookups == 0 {
            return Err(ScraperError::InvalidConfig(
                "metadata.max_concurrent_lookups must be greater than 0".to_string(),
            ));
        }

        if self.metadata.max_attempts == 0 {
            return Err(ScraperError::InvalidConfig(
                "metadata.max_attempts must be greater than 0".to_string(),
            ));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Parsed crawl root
    pub fn base_url(&self) -> Result<Url> {
        let normalized = normalize_base_url(&self.crawler.base_url);
        Url::parse(&normalized).map_err(|source| ScraperError::InvalidBaseUrl {
            url: self.crawler.base_url.clone(),
            source,
        })
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "opendir-m3u configuration:\n\
            - Base URL: {}\n\
            - Category depth: {}\n\
            - Extensions: {}\n\
            - Crawl workers: {}\n\
            - Lookup workers: {}\n\
            - Output: {}",
            self.crawler.base_url,
            self.crawler.max_category_depth,
            self.crawler.video_extensions.join(", "),
            self.crawler.max_concurrent_requests,
            self.metadata.max_concurrent_lookups,
            self.output.playlist_path.display()
        )
    }
}

/// Trim trailing slashes and append exactly one
pub fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.crawler.base_url = normalize_base_url(base_url);
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.metadata.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_category_depth(mut self, depth: usize) -> Self {
        self.config.crawler.max_category_depth = depth;
        self
    }

    pub fn with_crawl_workers(mut self, workers: usize) -> Self {
        self.config.crawler.max_concurrent_requests = workers;
        self
    }

    pub fn with_lookup_workers(mut self, workers: usize) -> Self {
        self.config.metadata.max_concurrent_lookups = workers;
        self
    }

    pub fn with_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.metadata.retry_delay_ms = delay_ms;
        self
    }

    pub fn with_rate_limit_ms(mut self, rate_limit_ms: u64) -> Self {
        self.config.metadata.rate_limit_ms = rate_limit_ms;
        self
    }

    pub fn with_output_path(mut self, path: PathBuf) -> Self {
        self.config.output.playlist_path = path;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// Collects formatted log output in memory
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.crawler.max_category_depth, 2);
        assert_eq!(config.crawler.video_extensions.len(), 9);
        assert_eq!(config.metadata.max_attempts, 3);
        assert!(config.metadata.api_key.is_none());
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ScraperError::MissingApiKey)));

        let blank = ConfigBuilder::new().with_api_key("  ").build();
        assert!(matches!(blank.validate(), Err(ScraperError::MissingApiKey)));
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_base_url("http://media.local//")
            .with_api_key("secret")
            .with_category_depth(1)
            .build();

        assert_eq!(config.crawler.base_url, "http://media.local/");
        assert_eq!(config.crawler.max_category_depth, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ConfigBuilder::new()
            .with_api_key("secret")
            .with_base_url("not a url")
            .build();
        assert!(matches!(config.validate(), Err(ScraperError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FTP_PUBLIC_URL", "http://files.example.org"),
            ("TMDB_API_KEY", "abc123"),
            ("OPENDIR_M3U_WORKERS", "3"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.crawler.base_url, "http://files.example.org");
        assert_eq!(config.metadata.api_key.as_deref(), Some("abc123"));
        assert_eq!(config.crawler.max_concurrent_requests, 3);
        assert_eq!(config.base_url().unwrap().as_str(), "http://files.example.org/");
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [crawler]
            max_category_depth = 1

            [metadata]
            api_key = "from-file"
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.max_category_depth, 1);
        assert_eq!(config.crawler.user_agent, "Mozilla/5.0 (compatible; M3U-Scraper/1.0)");
        assert_eq!(config.metadata.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.output.playlist_path, PathBuf::from("output/playlist.m3u"));
    }

    #[test]
    fn test_invalid_worker_override_is_logged() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let mut config = Config::default();
        let default_workers = config.crawler.max_concurrent_requests;
        tracing::subscriber::with_default(subscriber, || {
            config.apply_overrides(|key| (key == "OPENDIR_M3U_WORKERS").then(|| "abc".to_string()));
        });

        assert_eq!(config.crawler.max_concurrent_requests, default_workers);
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("Ignoring invalid OPENDIR_M3U_WORKERS value: abc"));
    }
}
