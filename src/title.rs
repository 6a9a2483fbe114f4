//! Filename → (title, year) heuristics for scene/release style names
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// Release tags that end a title. Order only matters for readability; the
/// leftmost match in the filename wins.
const RELEASE_TAGS: &[&str] = &[
    // resolution
    "1080p", "720p", "480p", "4k", "2160p", "uhd",
    // source
    r"blu[ -]?ray", "bdrip", "brrip", "webrip", r"web[ -]?dl", "web", "hdtv", "hdcam", "cam",
    "hdrip", "dvdrip", "dvdscr",
    // codec / audio
    "x264", "x265", "hevc", "avc", "aac", "dts", "ac3", "h264", "h265",
    // edition
    "extended", "remastered", "theatrical", "proper", r"director'?s cut", "unrated", "retail",
    // release groups
    "yify", "yts", "rarbg",
    // misc
    "10bit", "hdr", "dolby", "atmos",
];

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid year pattern"));

static TAG_TAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)\s+(?:{})\b.*$", RELEASE_TAGS.join("|"));
    Regex::new(&pattern).expect("valid release tag pattern")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Characters that separate words in release names; brackets included so
/// bracketed tags like `[1080p]` stand alone
const SEPARATORS: &[char] = &['.', '_', '[', ']', '(', ')'];
const EDGE_CHARS: &[char] = &[' ', '-'];

/// Title and optional release year guessed from a filename
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedTitle {
    pub title: String,
    pub year: Option<u16>,
}

impl ParsedTitle {
    /// "Title (Year)" or just "Title"
    pub fn display(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => self.title.clone(),
        }
    }
}

/// Extract a clean title and year from a messy scene/release filename.
///
/// Never returns an empty title: when tag stripping eats everything the
/// provisional title is kept, and a leading year token (`1917.mkv`) is
/// treated as part of the title rather than as the release year.
pub fn parse_title(filename: &str) -> ParsedTitle {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let name = stem.replace(SEPARATORS, " ");

    // A year token with no title in front of it is part of the title ("2001 A Space Odyssey")
    let year_token = YEAR_RE
        .find_iter(&name)
        .find(|m| !clean(&name[..m.start()]).is_empty());

    let (provisional, year) = match year_token {
        Some(m) => (name[..m.start()].trim(), m.as_str().parse::<u16>().ok()),
        None => (name.as_str(), None),
    };

    let stripped = TAG_TAIL_RE.replace(provisional, "");
    let mut title = clean(&stripped);

    if title.is_empty() {
        title = clean(provisional);
    }
    if title.is_empty() {
        title = filename.trim().to_string();
    }

    ParsedTitle { title, year }
}

fn clean(raw: &str) -> String {
    WHITESPACE_RE
        .replace_all(raw.trim_matches(EDGE_CHARS), " ")
        .into_owned()
}
