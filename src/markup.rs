//! Markup extraction over `scraper::Html`: title lookup, anchors, and image references,
//! with relative links resolved against the page's own URL.

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Source attributes of an image element, lazy-load attributes first: readers often put one
/// shared placeholder in `src` and the real page in `data-src`.
const IMAGE_SOURCE_ATTRS: &[&str] = &["data-src", "data-lazy-src", "data-original", "src"];

/// Anchor with resolved absolute href and collapsed visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

/// Image element with every resolved candidate source (in attribute preference order) and
/// optional size hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub sources: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Parsed document plus the URL it was fetched from.
pub struct Page {
    doc: Html,
    base: Url,
}

/// Parse a CSS selector; invalid selectors are logged and skipped by callers.
fn parse_selector(sel: &str) -> Option<Selector> {
    match Selector::parse(sel) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!("invalid selector {:?}: {}", sel, e);
            None
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: &ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Parse a numeric size hint such as "800" or "800px". Percentages are ignored.
fn size_hint(raw: Option<&str>) -> Option<u32> {
    let t = raw?.trim();
    let t = t.strip_suffix("px").unwrap_or(t);
    t.parse::<u32>().ok()
}

impl Page {
    pub fn parse(html: &str, base: Url) -> Self {
        Self {
            doc: Html::parse_document(html),
            base,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve an href against the page URL. Fragments are dropped; non-http(s) links yield None.
    pub fn resolve(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        let mut url = self.base.join(href).ok()?;
        url.set_fragment(None);
        match url.scheme() {
            "http" | "https" => Some(url),
            _ => None,
        }
    }

    /// First non-empty text matched by the candidate selectors, tried in order.
    /// Text longer than `max_chars` does not count as a match.
    pub fn first_text(&self, selectors: &[&str], max_chars: usize) -> Option<String> {
        selectors
            .iter()
            .filter_map(|s| parse_selector(s))
            .find_map(|sel| {
                self.doc
                    .select(&sel)
                    .map(|e| element_text(&e))
                    .find(|t| !t.is_empty() && t.chars().count() <= max_chars)
            })
    }

    /// Anchors under the first scope selector that matches anything; all anchors if none does.
    pub fn anchors(&self, scopes: &[&str]) -> Vec<Anchor> {
        let a_sel = match parse_selector("a[href]") {
            Some(s) => s,
            None => return Vec::new(),
        };
        let collect = |root: ElementRef<'_>| -> Vec<Anchor> {
            root.select(&a_sel)
                .filter_map(|a| {
                    let href = self.resolve(a.value().attr("href")?)?;
                    Some(Anchor {
                        href: href.to_string(),
                        text: element_text(&a),
                    })
                })
                .collect()
        };
        for scope in scopes.iter().filter_map(|s| parse_selector(s)) {
            let roots: Vec<ElementRef<'_>> = self.doc.select(&scope).collect();
            if !roots.is_empty() {
                return roots.into_iter().flat_map(|r| collect(r)).collect();
            }
        }
        collect(self.doc.root_element())
    }

    /// Image references inside the first container selector that exists, else the whole document.
    pub fn images(&self, containers: &[&str]) -> Vec<ImageRef> {
        let img_sel = match parse_selector("img") {
            Some(s) => s,
            None => return Vec::new(),
        };
        let root = containers
            .iter()
            .filter_map(|s| parse_selector(s))
            .find_map(|sel| self.doc.select(&sel).next())
            .unwrap_or_else(|| self.doc.root_element());
        root.select(&img_sel)
            .filter_map(|img| {
                let el = img.value();
                let mut sources: Vec<String> = Vec::new();
                for raw in IMAGE_SOURCE_ATTRS.iter().filter_map(|a| el.attr(a)) {
                    let raw = raw.trim();
                    if raw.is_empty() || raw.starts_with("data:") {
                        continue;
                    }
                    if let Some(src) = self.resolve(raw).map(|u| u.to_string()) {
                        if !sources.contains(&src) {
                            sources.push(src);
                        }
                    }
                }
                if sources.is_empty() {
                    return None;
                }
                Some(ImageRef {
                    sources,
                    width: size_hint(el.attr("width")),
                    height: size_hint(el.attr("height")),
                })
            })
            .collect()
    }
}
