//! Manganato profile (chapmanganato, natomanga mirrors). Chapter lists live in
//! `.row-content-chapter`; reader pages keep images in `.container-chapter-reader`.

use crate::scraper::listing::SiteProfile;

pub static PROFILE: SiteProfile = SiteProfile {
    name: "manganato",
    title_selectors: &[".story-info-right h1", ".panel-story-info h1", "h1", "title"],
    title_suffixes: &[" - Manganato", " | MangaNato", " - MangaNato", " - Natomanga"],
    anchor_scopes: &[".row-content-chapter", ".chapter-list"],
    href_markers: &["/chapter-", "/chapter/"],
    text_marker: "chapter",
    reader_containers: &[".container-chapter-reader"],
};
