//! MangaDex adapter. Uses the public JSON API: manga metadata for the title, the paginated
//! English feed for chapters, and the at-home server for page images.

use crate::model::{dedup_by_url, sort_by_number, ChapterNumber, ChapterRecord, Discovery};
use crate::scraper::error::DiscoveryError;
use crate::scraper::{get_checked, ChapterAdapter, PoliteClient};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, info};

pub const MANGADEX_API: &str = "https://api.mangadex.org";
const CHAPTER_BASE: &str = "https://mangadex.org/chapter";
const FEED_PAGE_SIZE: usize = 100;
const TITLE_LANGUAGES: &[&str] = &["en", "ja-ro", "ja"];
const UNKNOWN_TITLE: &str = "Unknown";

static WORK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"title/([a-f0-9-]+)").expect("work id pattern compiles"));
static CHAPTER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"chapter/([a-f0-9-]+)").expect("chapter id pattern compiles"));

/// `GET /manga/{id}` response (only the fields used).
#[derive(Debug, Deserialize)]
struct MangaResponse {
    data: MangaData,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    attributes: MangaAttributes,
}

#[derive(Debug, Deserialize)]
struct MangaAttributes {
    #[serde(default)]
    title: BTreeMap<String, String>,
    #[serde(rename = "altTitles", default)]
    alt_titles: Vec<BTreeMap<String, String>>,
}

/// One page of `GET /manga/{id}/feed`.
#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    data: Vec<FeedItem>,
    #[serde(default)]
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    id: String,
    attributes: FeedAttributes,
}

#[derive(Debug, Deserialize)]
struct FeedAttributes {
    #[serde(default)]
    chapter: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// `GET /at-home/server/{chapterId}` response.
#[derive(Debug, Deserialize)]
struct AtHomeResponse {
    #[serde(rename = "baseUrl", default)]
    base_url: Option<String>,
    #[serde(default)]
    chapter: Option<AtHomeChapter>,
}

#[derive(Debug, Deserialize)]
struct AtHomeChapter {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    data: Vec<String>,
    #[serde(rename = "dataSaver", default)]
    data_saver: Vec<String>,
}

/// MangaDex adapter. Holds a reference to the shared polite client and the API base URL.
pub struct MangaDexAdapter<'a> {
    client: &'a mut PoliteClient,
    api_base: String,
}

fn get_json<T: DeserializeOwned>(client: &mut PoliteClient, url: &str) -> Result<T, DiscoveryError> {
    get_checked(client, url)?
        .json::<T>()
        .map_err(|e| DiscoveryError::network(url, e))
}

/// Work id from a title URL such as `https://mangadex.org/title/{id}/{slug}`.
pub fn work_id(url: &str) -> Option<&str> {
    WORK_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Chapter id from a chapter URL such as `https://mangadex.org/chapter/{id}`.
pub fn chapter_id(url: &str) -> Option<&str> {
    CHAPTER_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn non_empty(t: &str) -> Option<&str> {
    Some(t.trim()).filter(|t| !t.is_empty())
}

/// First non-empty title in preference order, then the first non-empty one of any language.
fn preferred(titles: &BTreeMap<String, String>) -> Option<&str> {
    TITLE_LANGUAGES
        .iter()
        .find_map(|lang| titles.get(*lang).map(String::as_str).and_then(non_empty))
        .or_else(|| titles.values().map(String::as_str).find_map(non_empty))
}

/// Title by language preference (en, ja-ro, ja, then first), then alt titles, then "Unknown".
fn pick_title(attrs: &MangaAttributes) -> String {
    preferred(&attrs.title)
        .or_else(|| {
            TITLE_LANGUAGES.iter().find_map(|lang| {
                attrs
                    .alt_titles
                    .iter()
                    .filter_map(|t| t.get(*lang))
                    .map(String::as_str)
                    .find_map(non_empty)
            })
        })
        .or_else(|| attrs.alt_titles.iter().find_map(preferred))
        .unwrap_or(UNKNOWN_TITLE)
        .to_string()
}

fn feed_record(item: FeedItem) -> ChapterRecord {
    let number = item
        .attributes
        .chapter
        .as_deref()
        .map(ChapterNumber::parse)
        .unwrap_or(ChapterNumber::Unknown);
    ChapterRecord::new(
        number,
        item.attributes.title.unwrap_or_default(),
        format!("{}/{}", CHAPTER_BASE, item.id),
    )
}

/// Page image URLs from an at-home response. Full quality when listed, else data-saver.
fn page_urls(resp: AtHomeResponse) -> Vec<String> {
    let (base, chapter) = match (resp.base_url, resp.chapter) {
        (Some(b), Some(c)) => (b, c),
        _ => return Vec::new(),
    };
    let hash = match chapter.hash {
        Some(h) if !h.is_empty() => h,
        _ => return Vec::new(),
    };
    let (quality, files) = if !chapter.data.is_empty() {
        ("data", chapter.data)
    } else {
        ("data-saver", chapter.data_saver)
    };
    let base = base.trim_end_matches('/');
    files
        .iter()
        .map(|f| format!("{}/{}/{}/{}", base, quality, hash, f))
        .collect()
}

/// Resolve the page images of a MangaDex chapter through the at-home server.
pub fn chapter_pages(
    client: &mut PoliteClient,
    api_base: &str,
    chapter_url: &str,
) -> Result<Vec<String>, DiscoveryError> {
    let id = chapter_id(chapter_url)
        .ok_or_else(|| DiscoveryError::malformed(chapter_url, "no MangaDex chapter id"))?;
    let url = format!("{}/at-home/server/{}", api_base.trim_end_matches('/'), id);
    let resp: AtHomeResponse = get_json(client, &url)?;
    Ok(page_urls(resp))
}

impl<'a> MangaDexAdapter<'a> {
    pub fn new(client: &'a mut PoliteClient, api_base: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn title(&mut self, id: &str) -> Result<String, DiscoveryError> {
        let url = format!("{}/manga/{}", self.api_base, id);
        let resp: MangaResponse = get_json(self.client, &url)?;
        Ok(pick_title(&resp.data.attributes))
    }

    /// Walk the English feed page by page until a short page or the reported total.
    fn feed(&mut self, id: &str) -> Result<Vec<ChapterRecord>, DiscoveryError> {
        let mut records = Vec::new();
        let mut offset = 0usize;
        loop {
            let url = format!(
                "{}/manga/{}/feed?translatedLanguage[]=en&order[chapter]=asc&limit={}&offset={}",
                self.api_base, id, FEED_PAGE_SIZE, offset
            );
            let page: FeedPage = get_json(self.client, &url)?;
            let count = page.data.len();
            debug!("mangadex feed offset {}: {} items", offset, count);
            records.extend(page.data.into_iter().map(feed_record));
            offset += count;
            let exhausted = page.total.is_some_and(|t| offset >= t);
            if count < FEED_PAGE_SIZE || exhausted {
                break;
            }
        }
        Ok(records)
    }
}

impl ChapterAdapter for MangaDexAdapter<'_> {
    fn discover(&mut self, url: &str) -> Result<Discovery, DiscoveryError> {
        let id = work_id(url)
            .ok_or_else(|| DiscoveryError::malformed(url, "no MangaDex title id"))?
            .to_string();
        let title = self.title(&id)?;
        let mut chapters = dedup_by_url(self.feed(&id)?);
        if chapters.is_empty() {
            return Err(DiscoveryError::NotFound {
                url: url.to_string(),
            });
        }
        sort_by_number(&mut chapters);
        info!("mangadex: found {} chapters for {:?}", chapters.len(), title);
        Ok(Discovery { title, chapters })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_from_urls() {
        assert_eq!(
            work_id("https://mangadex.org/title/a96676e5-8ae2-425e-b549-7f15dd34a6d8/komi-san"),
            Some("a96676e5-8ae2-425e-b549-7f15dd34a6d8")
        );
        assert_eq!(work_id("https://mangadex.org/titles/latest"), None);
        assert_eq!(
            chapter_id("https://mangadex.org/chapter/0b1c2d3e-0000-4000-8000-00000000abcd"),
            Some("0b1c2d3e-0000-4000-8000-00000000abcd")
        );
    }

    #[test]
    fn title_preference_order() -> Result<(), serde_json::Error> {
        let r: MangaResponse = serde_json::from_str(
            r#"{"data":{"attributes":{"title":{"ja":"Komi-san wa","ja-ro":"Komi-san wa, Comyushou desu."}}}}"#,
        )?;
        assert_eq!(pick_title(&r.data.attributes), "Komi-san wa, Comyushou desu.");

        let r: MangaResponse = serde_json::from_str(
            r#"{"data":{"attributes":{"title":{"ko":"코미"},"altTitles":[{"en":"Komi Can't Communicate"}]}}}"#,
        )?;
        assert_eq!(pick_title(&r.data.attributes), "코미");

        let r: MangaResponse = serde_json::from_str(
            r#"{"data":{"attributes":{"title":{},"altTitles":[{"ko":"코미"},{"en":"Komi"}]}}}"#,
        )?;
        assert_eq!(pick_title(&r.data.attributes), "Komi");

        let r: MangaResponse = serde_json::from_str(
            r#"{"data":{"attributes":{"title":{"en":"  ","ja":"Komi-san wa"}}}}"#,
        )?;
        assert_eq!(pick_title(&r.data.attributes), "Komi-san wa");

        let r: MangaResponse = serde_json::from_str(
            r#"{"data":{"attributes":{"title":{"en":""},"altTitles":[{"en":""},{"en":"Komi"}]}}}"#,
        )?;
        assert_eq!(pick_title(&r.data.attributes), "Komi");

        let r: MangaResponse = serde_json::from_str(r#"{"data":{"attributes":{}}}"#)?;
        assert_eq!(pick_title(&r.data.attributes), "Unknown");
        Ok(())
    }

    #[test]
    fn feed_items_become_records() -> Result<(), serde_json::Error> {
        let page: FeedPage = serde_json::from_str(
            r#"{"result":"ok","data":[
                {"id":"aaa-1","type":"chapter","attributes":{"chapter":"1","title":"Beginnings"}},
                {"id":"aaa-2","type":"chapter","attributes":{"chapter":"1.5","title":null}},
                {"id":"aaa-3","type":"chapter","attributes":{"chapter":null,"title":""}}
            ],"limit":100,"offset":0,"total":3}"#,
        )?;
        assert_eq!(page.total, Some(3));
        let records: Vec<ChapterRecord> = page.data.into_iter().map(feed_record).collect();
        assert_eq!(records[0].title, "Beginnings");
        assert_eq!(records[0].url, "https://mangadex.org/chapter/aaa-1");
        assert_eq!(records[1].title, "Chapter 1.5");
        assert_eq!(records[2].number, ChapterNumber::Unknown);
        assert_eq!(records[2].title, "Chapter N/A");
        Ok(())
    }

    #[test]
    fn at_home_prefers_full_quality() -> Result<(), serde_json::Error> {
        let resp: AtHomeResponse = serde_json::from_str(
            r#"{"result":"ok","baseUrl":"https://uploads.mangadex.org/","chapter":{
                "hash":"h4sh","data":["1.png","2.png"],"dataSaver":["1.jpg","2.jpg"]}}"#,
        )?;
        assert_eq!(
            page_urls(resp),
            vec![
                "https://uploads.mangadex.org/data/h4sh/1.png",
                "https://uploads.mangadex.org/data/h4sh/2.png"
            ]
        );
        Ok(())
    }

    #[test]
    fn at_home_falls_back_to_data_saver() -> Result<(), serde_json::Error> {
        let resp: AtHomeResponse = serde_json::from_str(
            r#"{"baseUrl":"https://cdn.example","chapter":{"hash":"h","data":[],"dataSaver":["a.jpg"]}}"#,
        )?;
        assert_eq!(page_urls(resp), vec!["https://cdn.example/data-saver/h/a.jpg"]);
        let resp: AtHomeResponse = serde_json::from_str(r#"{"result":"error"}"#)?;
        assert!(page_urls(resp).is_empty());
        Ok(())
    }
}
