//! Library entry points: discover a work's chapters, and acquire selected chapters as one PDF.
//!
//! Chapters are processed strictly one after another (locate, fetch, assemble) so that only
//! one chapter's images are held in memory at a time.

use crate::config::Settings;
use crate::fetch::FetchEngine;
use crate::locate::locate;
use crate::model::{AcquireRequest, Discovery, FetchOutcome};
use crate::pdf::{Assembler, AssemblyError, PageKind};
use crate::scraper::{self, classify, DiscoveryError, PoliteClient, SiteKind};
use reqwest::Url;
use thiserror::Error;
use tracing::info;

/// Most chapters one acquire call accepts.
pub const MAX_CHAPTERS_PER_REQUEST: usize = 5;
const FILE_NAME_CHARS: usize = 50;
const FALLBACK_NAME: &str = "manga";

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Too many chapters selected: {requested} (at most {max} per request).")]
    LimitExceeded { requested: usize, max: usize },

    #[error("No chapters selected.")]
    NoChaptersSelected,

    #[error("Cannot build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

impl AcquireError {
    /// Stable machine-readable kind for error descriptors.
    pub fn kind(&self) -> &'static str {
        match self {
            AcquireError::LimitExceeded { .. } => "limit_exceeded",
            AcquireError::NoChaptersSelected => "no_chapters_selected",
            AcquireError::Client(_) => "client",
            AcquireError::Assembly(_) => "assembly",
        }
    }
}

/// A finished PDF and the name it should be saved under.
#[derive(Debug, Clone)]
pub struct AcquiredDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub pages: Vec<PageKind>,
}

/// `{title}.pdf` with every character that is not an ASCII letter or digit replaced by `_`.
pub fn file_name(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .take(FILE_NAME_CHARS)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if stem.is_empty() {
        format!("{}.pdf", FALLBACK_NAME)
    } else {
        format!("{}.pdf", stem)
    }
}

fn check_url(url: &str) -> Result<(), DiscoveryError> {
    let parsed = Url::parse(url).map_err(|e| DiscoveryError::malformed(url, e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(DiscoveryError::malformed(
            url,
            format!("unsupported scheme {:?}", other),
        )),
    }
}

/// Discover the title and chapter list behind `url`, classifying the site from the URL.
pub fn discover(url: &str, settings: &Settings) -> Result<Discovery, DiscoveryError> {
    discover_as(classify(url), url, settings)
}

/// Discover with an explicit site kind.
pub fn discover_as(
    site: SiteKind,
    url: &str,
    settings: &Settings,
) -> Result<Discovery, DiscoveryError> {
    check_url(url)?;
    let mut client =
        PoliteClient::from_settings(&settings.http).map_err(|e| DiscoveryError::network(url, e))?;
    info!("discovering {} ({})", url, site);
    scraper::discover(site, url, &mut client, &settings.mangadex_api)
}

/// Reject empty and oversized selections before any network work.
pub fn check_selection(request: &AcquireRequest) -> Result<(), AcquireError> {
    match request.chapters.len() {
        0 => Err(AcquireError::NoChaptersSelected),
        n if n > MAX_CHAPTERS_PER_REQUEST => Err(AcquireError::LimitExceeded {
            requested: n,
            max: MAX_CHAPTERS_PER_REQUEST,
        }),
        _ => Ok(()),
    }
}

/// Acquire the requested chapters as one PDF. The site is classified once from the first
/// chapter URL. `progress` is called with (chapters done, total) after each chapter.
pub fn acquire(
    request: &AcquireRequest,
    settings: &Settings,
    progress: Option<&dyn Fn(usize, usize)>,
) -> Result<AcquiredDocument, AcquireError> {
    check_selection(request)?;
    let site = request
        .chapters
        .first()
        .map(|c| classify(&c.url))
        .unwrap_or(SiteKind::Generic);
    acquire_as(site, request, settings, progress)
}

/// Acquire with an explicit site kind.
pub fn acquire_as(
    site: SiteKind,
    request: &AcquireRequest,
    settings: &Settings,
    progress: Option<&dyn Fn(usize, usize)>,
) -> Result<AcquiredDocument, AcquireError> {
    check_selection(request)?;
    let mut client = PoliteClient::from_settings(&settings.http).map_err(AcquireError::Client)?;
    let engine =
        FetchEngine::new(&settings.http, settings.fetch.clone()).map_err(AcquireError::Client)?;

    let title = match request.title.trim() {
        "" => FALLBACK_NAME,
        t => t,
    };
    let total = request.chapters.len();
    let mut assembler = Assembler::new(title, total, settings.assembly.clone());
    for (i, chapter) in request.chapters.iter().enumerate() {
        info!(
            "chapter {} ({}/{}): {}",
            chapter.number,
            i + 1,
            total,
            chapter.url
        );
        let assets = locate(&mut client, &chapter.url, site, &settings.mangadex_api);
        let mut fetched = engine.fetch_all(&assets, &chapter.url, site);
        let outcomes: Vec<FetchOutcome> = assets
            .iter()
            .filter_map(|a| fetched.remove(&a.location))
            .collect();
        let placed = assembler.add_chapter(chapter, &outcomes);
        info!(
            "chapter {}: {} images located, {} fetched, {} placed",
            chapter.number,
            assets.len(),
            outcomes.len(),
            placed
        );
        if let Some(report) = progress {
            report(i + 1, total);
        }
    }

    let doc = assembler.finish()?;
    info!("assembled {} pages for {:?}", doc.pages.len(), title);
    Ok(AcquiredDocument {
        file_name: file_name(title),
        bytes: doc.bytes,
        pages: doc.pages,
    })
}
