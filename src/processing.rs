use crate::config::Config;
use crate::crawler::{DirectoryCrawler, HttpPageFetcher, PageFetcher};
use crate::error::{Result, ScraperError};
use crate::metadata::{MetadataResolver, MovieSearch, TmdbClient};
use crate::playlist::{Playlist, PlaylistBuilder};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub output_path: PathBuf,
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub metadata_requests: usize,
    pub elapsed: Duration,
}

/// Crawl → build → write pipeline
pub struct PlaylistGenerator {
    crawler: DirectoryCrawler,
    resolver: Arc<MetadataResolver>,
    builder: PlaylistBuilder,
    base_url: String,
    output_path: PathBuf,
}

impl PlaylistGenerator {
    /// Generator talking to the real directory server and TMDB.
    /// Fails before any network activity when the configuration is invalid.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let fetcher = Arc::new(HttpPageFetcher::new(&config.crawler)?);
        let search = Arc::new(TmdbClient::new(&config.metadata)?);
        Self::with_services(config, fetcher, search)
    }

    /// Generator with injected page and search services
    pub fn with_services(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        search: Arc<dyn MovieSearch>,
    ) -> Result<Self> {
        let base_url = config.base_url()?;
        let crawler = DirectoryCrawler::new(fetcher, base_url.clone(), &config.crawler);
        let resolver = Arc::new(MetadataResolver::new(search, &config.metadata));
        let builder = PlaylistBuilder::new(resolver.clone(), config.metadata.max_concurrent_lookups);

        Ok(Self {
            crawler,
            resolver,
            builder,
            base_url: base_url.to_string(),
            output_path: config.output.playlist_path.clone(),
        })
    }

    /// Run the whole pipeline. The playlist file is only written when the
    /// crawl found at least one video.
    pub async fn run(&self) -> Result<GenerationReport> {
        let start_time = Instant::now();

        info!("🌐 Crawling: {}", self.base_url);
        let entries = self.crawler.crawl().await;
        info!("🎬 Found {} video file(s)", entries.len());

        if entries.is_empty() {
            error!("❌ No files found. Check the URL or network access.");
            return Err(ScraperError::NoVideosFound {
                url: self.base_url.clone(),
            });
        }

        let playlist = self.builder.build(entries).await;
        write_playlist(&self.output_path, &playlist)?;
        info!("📄 Playlist saved to: {}", self.output_path.display());

        Ok(GenerationReport {
            output_path: self.output_path.clone(),
            total: playlist.total(),
            matched: playlist.matched,
            unmatched: playlist.unmatched,
            metadata_requests: self.resolver.request_count(),
            elapsed: start_time.elapsed(),
        })
    }
}

/// Write the rendered playlist through a temp file in the target directory
/// so a failed write never leaves a partial playlist behind
pub fn write_playlist(path: &Path, playlist: &Playlist) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut file = tempfile::NamedTempFile::new_in(&parent)?;
    file.write_all(playlist.render().as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|e| ScraperError::Io(e.error))?;

    Ok(())
}
