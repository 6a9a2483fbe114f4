//! Anchor extraction and link classification for directory listing pages
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// Hrefs that only navigate within the listing
const NAVIGATION_HREFS: &[&str] = &["../", "..", "/", ""];

const SKIP_FOLDERS: &[&str] = &["", ".", ".."];

/// A child entry of a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingLink {
    Folder { url: Url, name: String },
    File { url: Url, name: String },
}

/// All anchor hrefs on the page, in document order
pub fn extract_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect()
}

/// Classify a single href found on `page_url`.
///
/// Returns `None` for navigation links, off-site links and folders with no
/// usable name. The name is the percent-decoded last path segment.
pub fn classify_link(href: &str, page_url: &Url, base_url: &Url) -> Option<ListingLink> {
    let href = href.trim();

    if NAVIGATION_HREFS.contains(&href) || href.starts_with('?') || href.starts_with('#') {
        return None;
    }

    // Absolute links must stay under the crawl root
    if Url::parse(href).is_ok() && !href.starts_with(base_url.as_str()) {
        return None;
    }

    let url = page_url.join(href).ok()?;
    if !url.as_str().starts_with(base_url.as_str()) {
        return None;
    }

    let is_folder = href.ends_with('/');
    let trimmed = href.trim_end_matches('/');
    let segment = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let name = urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    if is_folder {
        if SKIP_FOLDERS.contains(&name.as_str()) {
            return None;
        }
        Some(ListingLink::Folder { url, name })
    } else {
        Some(ListingLink::File { url, name })
    }
}
