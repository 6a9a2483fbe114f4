//! Open directory crawling
//!
//! Walks HTML directory listings starting at the configured base URL and
//! collects every video file it finds, grouped by the folders above it.
pub mod fetch;
pub mod listing;

pub use fetch::{HttpPageFetcher, PageFetcher};
pub use listing::{classify_link, extract_hrefs, ListingLink};

use crate::config::CrawlerConfig;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Category used when a file sits directly in the crawl root
pub const DEFAULT_CATEGORY: &str = "Movies";

/// A video file discovered in the listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Absolute URL of the file
    pub url: String,
    /// Percent-decoded filename
    pub filename: String,
    /// Folder path, e.g. "Action > Classics"
    pub category: String,
}

/// One listing page waiting to be visited
#[derive(Debug, Clone)]
struct CrawlTask {
    url: Url,
    depth: usize,
    category: Vec<String>,
    /// Link indices from the root; orders results as a sequential walk would
    position: Vec<usize>,
    /// Folder URLs above this one on the same branch
    ancestors: Vec<String>,
}

#[derive(Default)]
struct PageOutcome {
    files: Vec<(Vec<usize>, DirectoryEntry)>,
    folders: Vec<CrawlTask>,
}

/// Concurrent, order-preserving open directory crawler
#[derive(Clone)]
pub struct DirectoryCrawler {
    fetcher: Arc<dyn PageFetcher>,
    base_url: Url,
    max_category_depth: usize,
    video_extensions: HashSet<String>,
    max_concurrent: usize,
}

impl DirectoryCrawler {
    pub fn new(fetcher: Arc<dyn PageFetcher>, base_url: Url, config: &CrawlerConfig) -> Self {
        let video_extensions = config
            .video_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();

        Self {
            fetcher,
            base_url,
            max_category_depth: config.max_category_depth,
            video_extensions,
            max_concurrent: config.max_concurrent_requests.max(1),
        }
    }

    /// Crawl the whole tree from the base URL
    pub async fn crawl(&self) -> Vec<DirectoryEntry> {
        self.crawl_from(self.base_url.clone(), 0, Vec::new()).await
    }

    /// Crawl the subtree at `url`, starting `depth` levels below the root
    /// with `category` already accumulated.
    ///
    /// Results come back in depth-first link order regardless of which
    /// pages finished first. A page that cannot be fetched contributes
    /// nothing; its siblings are unaffected.
    pub async fn crawl_from(&self, url: Url, depth: usize, category: Vec<String>) -> Vec<DirectoryEntry> {
        let mut queue = VecDeque::from([CrawlTask {
            ancestors: vec![url.to_string()],
            url,
            depth,
            category,
            position: Vec::new(),
        }]);
        let mut in_flight = FuturesUnordered::new();
        let mut found = Vec::new();
        let mut pages = 0usize;

        loop {
            while in_flight.len() < self.max_concurrent {
                match queue.pop_front() {
                    Some(task) => in_flight.push(self.visit(task)),
                    None => break,
                }
            }

            match in_flight.next().await {
                Some(outcome) => {
                    pages += 1;
                    found.extend(outcome.files);
                    queue.extend(outcome.folders);
                }
                None => break,
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        debug!("Visited {} listing pages, found {} videos", pages, found.len());

        found.into_iter().map(|(_, entry)| entry).collect()
    }

    async fn visit(&self, task: CrawlTask) -> PageOutcome {
        let html = match self.fetcher.fetch(&task.url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not fetch {}: {}", task.url, e);
                return PageOutcome::default();
            }
        };

        let mut outcome = PageOutcome::default();

        for (index, href) in extract_hrefs(&html).iter().enumerate() {
            let mut position = task.position.clone();
            position.push(index);

            match classify_link(href, &task.url, &self.base_url) {
                Some(ListingLink::Folder { url, name }) => {
                    if task.ancestors.iter().any(|a| a == url.as_str()) {
                        warn!("Skipping {}: loops back to a parent folder", url);
                        continue;
                    }

                    info!("{}📁 {}", "  ".repeat(task.depth), name);

                    let category = self.child_category(&task.category, task.depth, &name);
                    let mut ancestors = task.ancestors.clone();
                    ancestors.push(url.to_string());

                    outcome.folders.push(CrawlTask {
                        url,
                        depth: task.depth + 1,
                        category,
                        position,
                        ancestors,
                    });
                }
                Some(ListingLink::File { url, name }) => {
                    if !self.is_video(&name) {
                        continue;
                    }

                    debug!("🎬 {}", name);
                    outcome.files.push((
                        position,
                        DirectoryEntry {
                            url: url.to_string(),
                            filename: name,
                            category: join_category(&task.category),
                        },
                    ));
                }
                None => {}
            }
        }

        outcome
    }

    /// Category path for a folder found at `depth`; only the first
    /// `max_category_depth` levels are recorded
    fn child_category(&self, parent: &[String], depth: usize, name: &str) -> Vec<String> {
        let mut category = parent.to_vec();
        if depth < self.max_category_depth {
            category.push(name.to_string());
        }
        category
    }

    fn is_video(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.video_extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

/// "A > B", or the default category when empty
pub fn join_category(parts: &[String]) -> String {
    if parts.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        parts.join(" > ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScraperError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned listing pages; unknown URLs fail with 404
    struct FakeServer {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeServer {
        fn new(pages: Vec<(&str, Vec<&str>)>) -> Self {
            let pages = pages
                .into_iter()
                .map(|(url, hrefs)| {
                    let anchors: String = hrefs
                        .iter()
                        .map(|href| format!("<a href=\"{}\">{}</a>\n", href, href))
                        .collect();
                    (url.to_string(), format!("<html><body><pre>{}</pre></body></html>", anchors))
                })
                .collect();
            Self {
                pages,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for FakeServer {
        async fn fetch(&self, url: &Url) -> Result<String> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages.get(url.as_str()).cloned().ok_or(ScraperError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    const ROOT: &str = "http://files.example.org/";

    fn crawler(server: FakeServer, workers: usize) -> DirectoryCrawler {
        let config = CrawlerConfig {
            max_concurrent_requests: workers,
            ..CrawlerConfig::default()
        };
        DirectoryCrawler::new(Arc::new(server), Url::parse(ROOT).unwrap(), &config)
    }

    fn sample_tree() -> FakeServer {
        FakeServer::new(vec![
            (ROOT, vec!["../", "Action/", "Loose.Movie.2001.mkv", "notes.txt", "Drama/"]),
            ("http://files.example.org/Action/", vec!["../", "Classics/", "Heat.1995.mkv"]),
            ("http://files.example.org/Action/Classics/", vec!["Deeper/", "Bullitt.1968.MP4"]),
            ("http://files.example.org/Action/Classics/Deeper/", vec!["Ronin.1998.avi", "cover.jpg"]),
            ("http://files.example.org/Drama/", vec!["?C=M;O=A", "Amelie%202001.mkv"]),
        ])
    }

    #[tokio::test]
    async fn test_crawl_collects_videos_in_walk_order() {
        for workers in [1, 4] {
            let entries = crawler(sample_tree(), workers).crawl().await;
            let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
            assert_eq!(
                names,
                vec![
                    "Ronin.1998.avi",
                    "Bullitt.1968.MP4",
                    "Heat.1995.mkv",
                    "Loose.Movie.2001.mkv",
                    "Amelie 2001.mkv"
                ],
                "workers = {}",
                workers
            );
        }
    }

    #[tokio::test]
    async fn test_category_depth_is_capped() {
        let entries = crawler(sample_tree(), 2).crawl().await;
        let category_of = |name: &str| {
            entries
                .iter()
                .find(|e| e.filename == name)
                .map(|e| e.category.clone())
                .unwrap()
        };

        assert_eq!(category_of("Heat.1995.mkv"), "Action");
        assert_eq!(category_of("Bullitt.1968.MP4"), "Action > Classics");
        // Two levels below "Action/" still reports the capped path
        assert_eq!(category_of("Ronin.1998.avi"), "Action > Classics");
        assert_eq!(category_of("Loose.Movie.2001.mkv"), "Movies");
        assert_eq!(category_of("Amelie 2001.mkv"), "Drama");
    }

    #[tokio::test]
    async fn test_entry_urls_are_absolute() {
        let entries = crawler(sample_tree(), 2).crawl().await;
        let amelie = entries.iter().find(|e| e.filename == "Amelie 2001.mkv").unwrap();
        assert_eq!(amelie.url, "http://files.example.org/Drama/Amelie%202001.mkv");
    }

    #[tokio::test]
    async fn test_failed_branch_does_not_stop_siblings() {
        let server = FakeServer::new(vec![
            (ROOT, vec!["Broken/", "Fine/"]),
            ("http://files.example.org/Fine/", vec!["Ok.2020.mkv"]),
        ]);
        let entries = crawler(server, 2).crawl().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "Ok.2020.mkv");
        assert_eq!(entries[0].category, "Fine");
    }

    #[tokio::test]
    async fn test_unreachable_root_yields_nothing() {
        let entries = crawler(FakeServer::new(Vec::new()), 2).crawl().await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_loop_back_to_ancestor_is_skipped() {
        let server = FakeServer::new(vec![
            (ROOT, vec!["A/"]),
            ("http://files.example.org/A/", vec!["B/", "a.mkv"]),
            ("http://files.example.org/A/B/", vec!["http://files.example.org/A/", "b.mkv"]),
        ]);
        let server = Arc::new(server);
        let crawler = DirectoryCrawler::new(
            server.clone(),
            Url::parse(ROOT).unwrap(),
            &CrawlerConfig::default(),
        );

        let entries = crawler.crawl().await;
        let names: Vec<&str> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["b.mkv", "a.mkv"]);
        assert_eq!(server.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_crawl_from_subtree_with_existing_category() {
        let crawler = crawler(sample_tree(), 1);
        let entries = crawler
            .crawl_from(
                Url::parse("http://files.example.org/Action/").unwrap(),
                1,
                vec!["Action".to_string()],
            )
            .await;

        let categories: Vec<&str> = entries.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(categories, vec!["Action > Classics", "Action > Classics", "Action"]);
    }

    #[test]
    fn test_join_category() {
        assert_eq!(join_category(&[]), "Movies");
        assert_eq!(
            join_category(&["Action".to_string(), "Classics".to_string()]),
            "Action > Classics"
        );
    }
}
