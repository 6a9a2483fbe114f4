//! Extended M3U playlist assembly
use crate::crawler::DirectoryEntry;
use crate::metadata::{MetadataRecord, MetadataResolver};
use crate::title::{parse_title, ParsedTitle};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const M3U_HEADER: &str = "#EXTM3U";
pub const UNMATCHED_SUFFIX: &str = " [Unmatched]";

/// One playlist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    pub display_title: String,
    pub logo_url: String,
    pub overview: String,
    pub group_title: String,
    pub media_url: String,
    pub matched: bool,
}

impl PlaylistRecord {
    /// Record for an entry with resolved metadata
    pub fn matched(entry: &DirectoryEntry, record: &MetadataRecord) -> Self {
        Self {
            display_title: record.display_title(),
            logo_url: record.logo_url().to_string(),
            overview: record.overview.clone(),
            group_title: entry.category.clone(),
            media_url: entry.url.clone(),
            matched: true,
        }
    }

    /// Fallback record built from the filename alone
    pub fn unmatched(entry: &DirectoryEntry, parsed: &ParsedTitle) -> Self {
        Self {
            display_title: parsed.display(),
            logo_url: String::new(),
            overview: String::new(),
            group_title: format!("{}{}", entry.category, UNMATCHED_SUFFIX),
            media_url: entry.url.clone(),
            matched: false,
        }
    }

    /// `#EXTINF` directive line
    pub fn extinf(&self) -> String {
        format!(
            "#EXTINF:-1 tvg-name=\"{}\" tvg-logo=\"{}\" group-title=\"{}\" tvg-plot=\"{}\",{}",
            attribute(&self.display_title),
            attribute(&self.logo_url),
            attribute(&self.group_title),
            attribute(&self.overview),
            single_line(&self.display_title),
        )
    }
}

/// A finished playlist
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Playlist {
    pub records: Vec<PlaylistRecord>,
    pub matched: usize,
    pub unmatched: usize,
}

impl Playlist {
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Serialize: header, blank line, then directive + URL + blank line per record
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(64 + self.records.len() * 256);
        out.push_str(M3U_HEADER);
        out.push_str("\n\n");

        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&record.extinf());
            out.push('\n');
            out.push_str(&record.media_url);
            out.push('\n');
        }

        out
    }
}

/// Turns crawled entries into a playlist
pub struct PlaylistBuilder {
    resolver: Arc<MetadataResolver>,
    max_concurrent: usize,
}

impl PlaylistBuilder {
    pub fn new(resolver: Arc<MetadataResolver>, max_concurrent: usize) -> Self {
        Self {
            resolver,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Build one record per entry, ordered by (category, filename)
    /// case-insensitively. Lookups overlap but records keep that order.
    pub async fn build(&self, entries: Vec<DirectoryEntry>) -> Playlist {
        let entries = sort_entries(entries);
        let total = entries.len();

        let records: Vec<PlaylistRecord> = stream::iter(entries.into_iter().enumerate())
            .map(|(i, entry)| self.build_record(i + 1, total, entry))
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let matched = records.iter().filter(|r| r.matched).count();
        let playlist = Playlist {
            unmatched: records.len() - matched,
            matched,
            records,
        };

        info!(
            "✅ Matched: {} | ⚠️ Unmatched: {} | Total: {}",
            playlist.matched,
            playlist.unmatched,
            playlist.total()
        );

        playlist
    }

    async fn build_record(&self, index: usize, total: usize, entry: DirectoryEntry) -> PlaylistRecord {
        let parsed = parse_title(&entry.filename);
        info!(
            "[{}/{}] {} | {} ({})",
            index,
            total,
            entry.category,
            parsed.title,
            parsed.year.map(|y| y.to_string()).unwrap_or_else(|| "?".to_string())
        );

        match self.resolver.resolve(&parsed.title, parsed.year).await {
            Some(record) => PlaylistRecord::matched(&entry, &record),
            None => {
                warn!("No TMDB match found for {}", entry.filename);
                PlaylistRecord::unmatched(&entry, &parsed)
            }
        }
    }
}

/// Stable sort by lowercased (category, filename)
pub fn sort_entries(mut entries: Vec<DirectoryEntry>) -> Vec<DirectoryEntry> {
    entries.sort_by_cached_key(|e| (e.category.to_lowercase(), e.filename.to_lowercase()));
    entries
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

fn attribute(value: &str) -> String {
    single_line(value).replace('"', "'")
}
