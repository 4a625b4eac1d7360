//! Site classification and chapter discovery. Site kinds, adapter trait, shared client, and adapters.

mod client;
mod error;

pub mod asura;
pub mod listing;
pub mod mangadex;
pub mod manganato;
pub mod numbering;

pub use client::{PoliteClient, PoliteClientBuilder};
pub use error::DiscoveryError;

use crate::model::Discovery;
use listing::{MarkupAdapter, SiteProfile};
use mangadex::MangaDexAdapter;
use reqwest::Url;
use std::fmt;

/// Closed set of origins. Decided once per request by [classify] and passed down explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    /// API-backed catalog (api.mangadex.org).
    MangaDex,
    Manganato,
    Asura,
    /// Best-effort markup heuristics for anything else.
    Generic,
}

/// Ordered classifier patterns, matched as lowercase substrings. First match wins.
const SITE_PATTERNS: &[(&str, SiteKind)] = &[
    ("mangadex.org", SiteKind::MangaDex),
    ("asura", SiteKind::Asura),
    ("manganato", SiteKind::Manganato),
    ("natomanga", SiteKind::Manganato),
];

/// Map a URL to its site kind. Pure; no parsing or network access.
pub fn classify(url: &str) -> SiteKind {
    let lower = url.to_lowercase();
    SITE_PATTERNS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, kind)| *kind)
        .unwrap_or(SiteKind::Generic)
}

impl SiteKind {
    /// Markup profile for markup-backed sites; None for the API-backed site.
    pub fn profile(self) -> Option<&'static SiteProfile> {
        match self {
            SiteKind::MangaDex => None,
            SiteKind::Manganato => Some(&manganato::PROFILE),
            SiteKind::Asura => Some(&asura::PROFILE),
            SiteKind::Generic => Some(&listing::GENERIC_PROFILE),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SiteKind::MangaDex => "mangadex",
            SiteKind::Manganato => "manganato",
            SiteKind::Asura => "asura",
            SiteKind::Generic => "generic",
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strip a known site suffix from the end of a page title (e.g. " - Manganato").
pub fn strip_title_site_suffix(s: &str, suffixes: &[&str]) -> String {
    let mut t = s.trim();
    for suffix in suffixes {
        if t.ends_with(suffix) {
            t = t[..t.len() - suffix.len()].trim();
            break;
        }
    }
    t.to_string()
}

/// GET `url` with a single attempt. 404 maps to NotFound, other failures to NetworkFailure.
pub(crate) fn get_checked(
    client: &mut PoliteClient,
    url: &str,
) -> Result<reqwest::blocking::Response, DiscoveryError> {
    let response = client
        .get(url)
        .map_err(|e| DiscoveryError::network(url, e))?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(DiscoveryError::NotFound {
            url: url.to_string(),
        });
    }
    response
        .error_for_status()
        .map_err(|e| DiscoveryError::network(url, e))
}

/// GET a page and return its final URL (after redirects) with its body.
/// Relative links on the page resolve against the returned URL.
pub(crate) fn fetch_page(
    client: &mut PoliteClient,
    url: &str,
) -> Result<(Url, String), DiscoveryError> {
    let response = get_checked(client, url)?;
    let final_url = response.url().clone();
    let body = response
        .text()
        .map_err(|e| DiscoveryError::network(url, e))?;
    Ok((final_url, body))
}

/// Implemented once per site kind. Returns the work title and a deduplicated, ordered chapter list.
pub trait ChapterAdapter {
    fn discover(&mut self, url: &str) -> Result<Discovery, DiscoveryError>;
}

/// Dispatch by site kind: build the matching adapter and run discovery.
pub fn discover(
    site: SiteKind,
    url: &str,
    client: &mut PoliteClient,
    mangadex_api: &str,
) -> Result<Discovery, DiscoveryError> {
    match site.profile() {
        Some(profile) => MarkupAdapter::new(client, profile).discover(url),
        None => MangaDexAdapter::new(client, mangadex_api).discover(url),
    }
}
