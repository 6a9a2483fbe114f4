/// opendir-m3u
///
/// Crawls an HTTP open directory, guesses a movie title for every video
/// filename, looks it up on TMDB and writes an extended M3U playlist.

pub mod config;
pub mod crawler;
pub mod error;
pub mod metadata;
pub mod playlist;
pub mod processing;
pub mod title;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::crawler::{DirectoryCrawler, DirectoryEntry, HttpPageFetcher, PageFetcher};
pub use crate::error::{Result, ScraperError};
pub use crate::metadata::{MetadataRecord, MetadataResolver, MovieSearch, SearchHit, TmdbClient};
pub use crate::playlist::{Playlist, PlaylistBuilder, PlaylistRecord};
pub use crate::processing::{GenerationReport, PlaylistGenerator};
pub use crate::title::{parse_title, ParsedTitle};
