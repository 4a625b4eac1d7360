//! Chapter number extraction from link text and hrefs.
//!
//! Rules are evaluated in order and the first one to match wins. All text rules are
//! tried before any href rule, so "Chapter 12" beats a link like `/chapter-012-v2`.

use crate::model::ChapterNumber;
use regex::Regex;
use std::sync::LazyLock;

/// What a rule is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    Text,
    Href,
}

/// One extraction rule: a case-insensitive pattern whose first capture group is the number.
#[derive(Debug)]
pub struct NumberRule {
    pub name: &'static str,
    pub source: RuleSource,
    pub pattern: Regex,
}

impl NumberRule {
    fn new(name: &'static str, source: RuleSource, pattern: &str) -> Self {
        Self {
            name,
            source,
            pattern: Regex::new(pattern).expect("chapter number pattern compiles"),
        }
    }

    /// The captured number, if this rule matches `input`.
    pub fn apply(&self, input: &str) -> Option<String> {
        self.pattern
            .captures(input)
            .and_then(|c| c.get(1))
            .map(|m| normalize(m.as_str()))
    }
}

/// Strip leading zeros ("007" -> "7", "0.5" stays).
fn normalize(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('0');
    if trimmed.is_empty() || trimmed.starts_with('.') {
        format!("0{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Default rule list, in evaluation order.
pub static DEFAULT_RULES: LazyLock<Vec<NumberRule>> = LazyLock::new(|| {
    vec![
        NumberRule::new(
            "text-chapter",
            RuleSource::Text,
            r"(?i)chapter[:\s\-_]*(\d+(?:\.\d+)?)",
        ),
        NumberRule::new("text-ch", RuleSource::Text, r"(?i)\bch\.?\s*(\d+(?:\.\d+)?)"),
        NumberRule::new(
            "text-episode",
            RuleSource::Text,
            r"(?i)\bep(?:isode)?\.?\s*(\d+(?:\.\d+)?)",
        ),
        NumberRule::new(
            "href-chapter",
            RuleSource::Href,
            r"(?i)chapter[/_\-](\d+(?:\.\d+)?)",
        ),
        NumberRule::new("href-ch", RuleSource::Href, r"(?i)/ch[/_\-](\d+(?:\.\d+)?)"),
    ]
});

/// Run `rules` against text first, then href. Unknown if nothing matches.
pub fn extract_number(rules: &[NumberRule], text: &str, href: &str) -> ChapterNumber {
    let pass = |source: RuleSource, input: &str| {
        rules
            .iter()
            .filter(|r| r.source == source)
            .find_map(|r| r.apply(input))
    };
    pass(RuleSource::Text, text)
        .or_else(|| pass(RuleSource::Href, href))
        .map(ChapterNumber::Known)
        .unwrap_or(ChapterNumber::Unknown)
}
