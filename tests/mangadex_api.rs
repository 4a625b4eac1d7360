mod common;

use common::{local_settings, page_png, Reply, TestServer};
use mangapdf::{acquire, discover, PageKind};
use std::collections::HashSet;

const MANGA_ID: &str = "a96676e5-8ae2-425e-b549-7f15dd34a6d8";
const TOTAL: usize = 150;

fn query_value<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let query = url.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn feed_page(offset: usize, limit: usize) -> String {
    let items: Vec<String> = (offset..TOTAL.min(offset + limit))
        .map(|i| {
            let number = i + 1;
            // Every 10th chapter has no title; the last one has no number.
            let title = if number % 10 == 0 {
                "null".to_string()
            } else {
                format!("\"Part {number}\"")
            };
            let chapter = if number == TOTAL {
                "null".to_string()
            } else {
                format!("\"{number}\"")
            };
            format!(
                r#"{{"id":"c{number:04}-0000","type":"chapter","attributes":{{"chapter":{chapter},"title":{title},"translatedLanguage":"en"}}}}"#
            )
        })
        .collect();
    format!(
        r#"{{"result":"ok","response":"collection","data":[{}],"limit":{limit},"offset":{offset},"total":{TOTAL}}}"#,
        items.join(",")
    )
}

fn fake_api() -> TestServer {
    TestServer::spawn(|hit, base| {
        let path = hit.url.split('?').next().unwrap_or(&hit.url).to_string();
        let manga = format!("/manga/{MANGA_ID}");
        let feed = format!("/manga/{MANGA_ID}/feed");
        if path == manga {
            Reply::json(
                r#"{"result":"ok","data":{"id":"x","attributes":{"title":{"ja-ro":"Komi-san wa, Comyushou desu."},"altTitles":[{"en":"Komi Can't Communicate"}]}}}"#,
            )
        } else if path == feed {
            let offset = query_value(&hit.url, "offset")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let limit = query_value(&hit.url, "limit")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10);
            Reply::json(feed_page(offset, limit))
        } else if path == "/at-home/server/c0001-0000" {
            Reply::json(format!(
                r#"{{"result":"ok","baseUrl":"{base}/cdn","chapter":{{"hash":"h4sh","data":["1.png","2.png","3.png"],"dataSaver":[]}}}}"#
            ))
        } else if path == "/at-home/server/c0002-0000" {
            Reply::json(format!(
                r#"{{"result":"ok","baseUrl":"{base}/cdn","chapter":{{"hash":"h4sh","data":[],"dataSaver":["s1.jpg"]}}}}"#
            ))
        } else if let Some(file) = path.strip_prefix("/cdn/data/h4sh/") {
            let seed = file.trim_end_matches(".png").parse().unwrap_or(0);
            Reply::png(page_png(140, 210, seed))
        } else {
            Reply::status(404)
        }
    })
}

#[test]
fn feed_is_paginated_until_total() -> anyhow::Result<()> {
    let server = fake_api();
    let mut settings = local_settings(None);
    settings.mangadex_api = server.base.clone();

    let url = format!("https://mangadex.org/title/{MANGA_ID}/komi-san");
    let d = discover(&url, &settings)?;

    assert_eq!(d.title, "Komi-san wa, Comyushou desu.");
    assert_eq!(d.chapters.len(), TOTAL);
    let unique: HashSet<&str> = d.chapters.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(unique.len(), TOTAL);

    // The chapter without a number sorts first; the rest ascend.
    assert_eq!(d.chapters[0].number.as_str(), "N/A");
    let values: Vec<f64> = d.chapters[1..].iter().filter_map(|c| c.number.value()).collect();
    assert_eq!(values.len(), TOTAL - 1);
    assert!(values.windows(2).all(|w| w[0] <= w[1]));

    let first = &d.chapters[1];
    assert_eq!(first.url, "https://mangadex.org/chapter/c0001-0000");
    assert_eq!(first.title, "Part 1");
    let tenth = d.chapters.iter().find(|c| c.number.as_str() == "10").expect("ch 10");
    assert_eq!(tenth.title, "Chapter 10");

    let feed_hits = server.hits_matching("/feed");
    assert_eq!(feed_hits.len(), 2);
    assert!(feed_hits[0].url.contains("offset=0"));
    assert!(feed_hits[1].url.contains("offset=100"));
    assert!(feed_hits.iter().all(|h| h.url.contains("limit=100")));
    Ok(())
}

#[test]
fn unknown_work_is_not_found() {
    let server = fake_api();
    let mut settings = local_settings(None);
    settings.mangadex_api = server.base.clone();
    let url = "https://mangadex.org/title/00000000-0000-0000-0000-000000000000";
    let err = discover(url, &settings).expect_err("unknown id");
    assert_eq!(err.kind(), "not_found");
}

#[test]
fn acquire_reads_pages_from_at_home_server() -> anyhow::Result<()> {
    let server = fake_api();
    let mut settings = local_settings(None);
    settings.mangadex_api = server.base.clone();

    let url = format!("https://mangadex.org/title/{MANGA_ID}/komi-san");
    let mut request = discover(&url, &settings)?;
    request.chapters.retain(|c| matches!(c.number.as_str(), "1" | "2"));
    assert_eq!(request.chapters.len(), 2);

    let doc = acquire(&request, &settings, None)?;
    // Chapter 1: banner + 3 pages. Chapter 2: its data-saver image is not served.
    assert_eq!(doc.pages.len(), 1 + 4 + 1);
    assert_eq!(
        doc.pages[5],
        PageKind::Placeholder {
            chapter: "2".into()
        }
    );
    assert_eq!(server.hits_matching("/cdn/data/h4sh/").len(), 3);
    assert_eq!(server.hits_matching("/cdn/data-saver/h4sh/s1.jpg").len(), 1);
    assert!(server
        .hits_matching("/cdn/data/h4sh/")
        .iter()
        .all(|h| h.referer == "https://mangadex.org/chapter/c0001-0000"));
    Ok(())
}
