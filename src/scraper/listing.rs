//! Markup-backed chapter discovery shared by every HTML site. Each site contributes a
//! [SiteProfile]; the scanning, numbering, dedup and ordering logic lives here once.

use crate::markup::Page;
use crate::model::{dedup_by_url, sort_by_number, ChapterRecord, Discovery};
use crate::scraper::error::DiscoveryError;
use crate::scraper::numbering::{extract_number, NumberRule, DEFAULT_RULES};
use crate::scraper::{fetch_page, strip_title_site_suffix, ChapterAdapter, PoliteClient};
use reqwest::Url;
use tracing::{debug, info};

/// Longest text accepted as a work title.
const MAX_TITLE_CHARS: usize = 200;
/// Chapter titles taken from link text are cut to this many characters.
const MAX_CHAPTER_TITLE_CHARS: usize = 80;
const UNKNOWN_TITLE: &str = "Unknown";

/// Per-site selectors and markers for a markup-backed site.
#[derive(Debug)]
pub struct SiteProfile {
    pub name: &'static str,
    /// Title candidates, first non-empty match wins.
    pub title_selectors: &'static [&'static str],
    /// Suffixes stripped from the title (mostly for the `<title>` fallback).
    pub title_suffixes: &'static [&'static str],
    /// Containers holding the chapter list; all anchors are scanned when none exists.
    pub anchor_scopes: &'static [&'static str],
    /// Lowercase href substrings that mark a chapter link.
    pub href_markers: &'static [&'static str],
    /// Lowercase text substring that marks a chapter link.
    pub text_marker: &'static str,
    /// Reader containers searched for page images, in preference order.
    pub reader_containers: &'static [&'static str],
}

/// Fallback for unknown sites. Best effort: no accuracy target.
pub static GENERIC_PROFILE: SiteProfile = SiteProfile {
    name: "generic",
    title_selectors: &[".story-info-right h1", ".post-title h1", "h1", "title"],
    title_suffixes: &[],
    anchor_scopes: &[
        ".row-content-chapter",
        ".wp-manga-chapter",
        ".chapter-list",
        "#chapterlist",
    ],
    href_markers: &["/chapter/", "/chapter-", "chapter_", "/ch-"],
    text_marker: "chapter",
    reader_containers: &[
        ".container-chapter-reader",
        "#readerarea",
        ".reading-content",
        ".chapter-content",
        "#chapter-reader",
    ],
};

/// Markup adapter. Holds a reference to the shared polite client.
pub struct MarkupAdapter<'a> {
    client: &'a mut PoliteClient,
    profile: &'static SiteProfile,
    rules: &'a [NumberRule],
}

impl<'a> MarkupAdapter<'a> {
    pub fn new(client: &'a mut PoliteClient, profile: &'static SiteProfile) -> Self {
        Self {
            client,
            profile,
            rules: &DEFAULT_RULES,
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect::<String>().trim().to_string()
}

fn is_chapter_link(profile: &SiteProfile, href: &str, text: &str) -> bool {
    let href = href.to_lowercase();
    profile.href_markers.iter().any(|m| href.contains(m))
        || text.to_lowercase().contains(profile.text_marker)
}

/// Parse a listing page into a discovery result. Zero chapter links is NotFound.
pub fn parse_listing(
    html: &str,
    base: Url,
    profile: &SiteProfile,
    rules: &[NumberRule],
) -> Result<Discovery, DiscoveryError> {
    let page = Page::parse(html, base);
    let title = page
        .first_text(profile.title_selectors, MAX_TITLE_CHARS)
        .map(|t| strip_title_site_suffix(&t, profile.title_suffixes))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let self_url = page.base().as_str().trim_end_matches('/').to_string();
    let records: Vec<ChapterRecord> = page
        .anchors(profile.anchor_scopes)
        .into_iter()
        .filter(|a| a.href.trim_end_matches('/') != self_url)
        .filter(|a| is_chapter_link(profile, &a.href, &a.text))
        .map(|a| {
            let number = extract_number(rules, &a.text, &a.href);
            ChapterRecord::new(
                number,
                truncate_chars(&a.text, MAX_CHAPTER_TITLE_CHARS),
                a.href,
            )
        })
        .collect();
    debug!(
        "{}: {} chapter links before dedup",
        profile.name,
        records.len()
    );

    let mut chapters = dedup_by_url(records);
    if chapters.is_empty() {
        return Err(DiscoveryError::NotFound {
            url: page.base().to_string(),
        });
    }
    sort_by_number(&mut chapters);
    Ok(Discovery { title, chapters })
}

impl ChapterAdapter for MarkupAdapter<'_> {
    fn discover(&mut self, url: &str) -> Result<Discovery, DiscoveryError> {
        let (base, html) = fetch_page(self.client, url)?;
        let discovery = parse_listing(&html, base, self.profile, self.rules)?;
        info!(
            "{}: found {} chapters for {:?}",
            self.profile.name,
            discovery.chapters.len(),
            discovery.title
        );
        Ok(discovery)
    }
}
