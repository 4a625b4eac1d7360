//! Image locator: chapter URL to ordered page images. Failures are logged and yield an
//! empty list; the assembler turns that into a placeholder page.

use crate::markup::{ImageRef, Page};
use crate::model::ImageAsset;
use crate::scraper::{fetch_page, mangadex, DiscoveryError, PoliteClient, SiteKind};
use reqwest::Url;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Lowercase URL substrings that mark site chrome rather than page content.
const DENY_TOKENS: &[&str] = &[
    "logo",
    "icon",
    "advert",
    "/ads/",
    "banner",
    ".gif",
    "facebook",
    "twitter",
    "discord",
    "instagram",
    "reddit",
    "pinterest",
    "avatar",
];
const RASTER_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];
/// Images whose declared width or height is below this are thumbnails or decorations.
const MIN_HINT_DIMENSION: u32 = 200;

fn has_raster_extension(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(u) => u.path().to_lowercase(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_lowercase(),
    };
    RASTER_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn is_denied(url: &str) -> bool {
    let lower = url.to_lowercase();
    DENY_TOKENS.iter().any(|t| lower.contains(t))
}

fn too_small(img: &ImageRef) -> bool {
    [img.width, img.height]
        .iter()
        .flatten()
        .any(|&d| d < MIN_HINT_DIMENSION)
}

fn usable_source(img: &ImageRef) -> Option<&String> {
    img.sources
        .iter()
        .find(|src| !is_denied(src) && has_raster_extension(src))
}

/// Filter markup candidates and number the survivors in reading order. Each element
/// contributes its first source that is neither chrome nor a non-raster placeholder.
pub fn select_assets(candidates: Vec<ImageRef>) -> Vec<ImageAsset> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter_map(|img| {
            let picked = usable_source(img).filter(|_| !too_small(img));
            if picked.is_none() {
                debug!("skipping image {:?}", img.sources);
            }
            picked
        })
        .filter(|src| seen.insert(src.as_str()))
        .enumerate()
        .map(|(ordinal, src)| ImageAsset {
            location: src.clone(),
            ordinal,
        })
        .collect()
}

/// Locate the page images of one chapter.
pub fn locate(
    client: &mut PoliteClient,
    chapter_url: &str,
    site: SiteKind,
    mangadex_api: &str,
) -> Vec<ImageAsset> {
    let located: Result<Vec<ImageAsset>, DiscoveryError> = match site.profile() {
        None => mangadex::chapter_pages(client, mangadex_api, chapter_url).map(|urls| {
            urls.into_iter()
                .enumerate()
                .map(|(ordinal, location)| ImageAsset { location, ordinal })
                .collect()
        }),
        Some(profile) => fetch_page(client, chapter_url).map(|(base, html)| {
            let page = Page::parse(&html, base);
            select_assets(page.images(profile.reader_containers))
        }),
    };
    match located {
        Ok(assets) => {
            debug!("{}: {} images in {}", site, assets.len(), chapter_url);
            assets
        }
        Err(e) => {
            warn!("could not locate images for {}: {}", chapter_url, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::listing::GENERIC_PROFILE;

    fn img(src: &str) -> ImageRef {
        ImageRef {
            sources: vec![src.to_string()],
            width: None,
            height: None,
        }
    }

    #[test]
    fn logo_and_chrome_never_located() {
        let assets = select_assets(vec![
            img("https://cdn.example.com/site-logo.png"),
            img("https://cdn.example.com/ch1/01.jpg"),
            img("https://cdn.example.com/icons/menu.png"),
            img("https://cdn.example.com/ads/top.jpg"),
            img("https://cdn.example.com/spinner.gif"),
            img("https://cdn.example.com/DISCORD-invite.webp"),
            img("https://cdn.example.com/ch1/02.jpeg"),
        ]);
        let urls: Vec<&str> = assets.iter().map(|a| a.location.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.example.com/ch1/01.jpg",
                "https://cdn.example.com/ch1/02.jpeg"
            ]
        );
        assert!(assets.iter().all(|a| !a.location.contains("logo")));
    }

    #[test]
    fn extension_checked_on_path_not_query() {
        assert!(has_raster_extension("https://x.com/p/01.webp?token=abc"));
        assert!(has_raster_extension("https://x.com/p/01.PNG"));
        assert!(!has_raster_extension("https://x.com/render?file=01.jpg"));
        assert!(!has_raster_extension("https://x.com/p/01.svg"));
    }

    #[test]
    fn small_size_hints_dropped_and_ordinals_contiguous() {
        let mut thumb = img("https://x.com/thumb.jpg");
        thumb.width = Some(150);
        let mut page = img("https://x.com/p2.jpg");
        page.width = Some(800);
        page.height = Some(1200);
        let assets = select_assets(vec![
            img("https://x.com/p1.jpg"),
            thumb,
            page,
            img("https://x.com/p1.jpg"),
            img("https://x.com/p3.png"),
        ]);
        let got: Vec<(usize, &str)> = assets
            .iter()
            .map(|a| (a.ordinal, a.location.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (0, "https://x.com/p1.jpg"),
                (1, "https://x.com/p2.jpg"),
                (2, "https://x.com/p3.png")
            ]
        );
    }

    #[test]
    fn reader_container_from_profile() {
        let html = r#"<header><img src="/header-art.jpg"></header>
            <div class="reading-content">
              <img data-src="/uploads/ch5/001.jpg">
              <img src="/uploads/ch5/002.jpg" width="720">
            </div>"#;
        let page = Page::parse(
            html,
            Url::parse("https://reader.example.org/series/x/chapter-5/").expect("url"),
        );
        let assets = select_assets(page.images(GENERIC_PROFILE.reader_containers));
        assert_eq!(assets.len(), 2);
        assert_eq!(
            assets[0].location,
            "https://reader.example.org/uploads/ch5/001.jpg"
        );
    }

    #[test]
    fn placeholder_source_falls_back_to_lazy_page() {
        let html = r#"<div class="reading-content">
              <img src="/wp-content/themes/madara/images/dflazy.svg" data-src="/uploads/ch5/01.jpg">
              <img src="/wp-content/themes/madara/images/dflazy.svg" data-src="/uploads/ch5/02.jpg">
              <img src="/wp-content/themes/madara/images/dflazy.svg">
            </div>"#;
        let page = Page::parse(
            html,
            Url::parse("https://reader.example.org/series/x/chapter-5/").expect("url"),
        );
        let assets = select_assets(page.images(GENERIC_PROFILE.reader_containers));
        let urls: Vec<&str> = assets.iter().map(|a| a.location.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://reader.example.org/uploads/ch5/01.jpg",
                "https://reader.example.org/uploads/ch5/02.jpg"
            ]
        );

        let logo_first = ImageRef {
            sources: vec![
                "https://x.com/site-logo.png".to_string(),
                "https://x.com/p1.jpg".to_string(),
            ],
            width: None,
            height: None,
        };
        let assets = select_assets(vec![logo_first]);
        assert_eq!(assets[0].location, "https://x.com/p1.jpg");
    }

    #[test]
    fn locate_returns_empty_on_unreachable_chapter() -> Result<(), reqwest::Error> {
        let mut client = PoliteClient::builder()
            .delay(std::time::Duration::ZERO)
            .timeout(std::time::Duration::from_secs(2))
            .build()?;
        let assets = locate(&mut client, "not a url", SiteKind::Generic, mangadex::MANGADEX_API);
        assert!(assets.is_empty());
        let assets = locate(
            &mut client,
            "https://mangadex.org/title/no-chapter-here",
            SiteKind::MangaDex,
            "http://127.0.0.1:9",
        );
        assert!(assets.is_empty());
        Ok(())
    }
}
