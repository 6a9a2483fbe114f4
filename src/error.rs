use thiserror::Error;

/// Errors produced while crawling, resolving or writing a playlist
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("TMDB API key is not configured (set TMDB_API_KEY or metadata.api_key)")]
    MissingApiKey,

    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse config file {path}: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("no video files found under {url}")]
    NoVideosFound { url: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScraperError {
    /// Process exit status for a run that ended with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ScraperError::MissingApiKey
            | ScraperError::InvalidBaseUrl { .. }
            | ScraperError::InvalidConfig(_)
            | ScraperError::ConfigFile { .. } => 2,
            ScraperError::NoVideosFound { .. } => 3,
            _ => 1,
        }
    }

    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScraperError::Fetch { .. } | ScraperError::HttpStatus { .. } | ScraperError::Decode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ScraperError::MissingApiKey.exit_code(), 2);
        assert_eq!(
            ScraperError::NoVideosFound { url: "http://host/".to_string() }.exit_code(),
            3
        );
        assert_eq!(
            ScraperError::HttpStatus { url: "http://host/".to_string(), status: 500 }.exit_code(),
            1
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(ScraperError::Decode("bad json".to_string()).is_transient());
        assert!(!ScraperError::MissingApiKey.is_transient());
    }
}
