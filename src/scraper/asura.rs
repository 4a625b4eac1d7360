//! Asura Scans profile. Series pages render the chapter list without a stable container,
//! so every anchor is scanned; reader images sit in `#readerarea`.

use crate::scraper::listing::SiteProfile;

pub static PROFILE: SiteProfile = SiteProfile {
    name: "asura",
    title_selectors: &["span.text-xl.font-bold", "h1", "title"],
    title_suffixes: &[" - Asura Scans", " | Asura Scans"],
    anchor_scopes: &[],
    href_markers: &["/chapter/"],
    text_marker: "chapter",
    reader_containers: &["#readerarea", ".reading-content"],
};
