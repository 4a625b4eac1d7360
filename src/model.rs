//! Canonical data model shared by discovery, acquisition and assembly.
//!
//! Adapters produce [Discovery]; the acquire entry point consumes [AcquireRequest];
//! the fetch engine and assembler pass [ImageAsset] and [FetchOutcome] between them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Text used for a chapter whose number could not be determined.
pub const UNKNOWN_NUMBER: &str = "N/A";

/// Chapter number as published. Kept as text so "12.5" or "3a" survive unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChapterNumber {
    Known(String),
    Unknown,
}

impl ChapterNumber {
    /// Parse raw text. Empty text and "N/A" mean unknown.
    pub fn parse(raw: &str) -> Self {
        let t = raw.trim();
        if t.is_empty() || t.eq_ignore_ascii_case(UNKNOWN_NUMBER) {
            ChapterNumber::Unknown
        } else {
            ChapterNumber::Known(t.to_string())
        }
    }

    /// Numeric value, if the text is a plain decimal number.
    pub fn value(&self) -> Option<f64> {
        match self {
            ChapterNumber::Known(s) => s.parse::<f64>().ok().filter(|v| v.is_finite()),
            ChapterNumber::Unknown => None,
        }
    }

    /// Sort key: numeric value, or 0 when the number is unknown or not numeric.
    pub fn sort_key(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChapterNumber::Known(s) => s,
            ChapterNumber::Unknown => UNKNOWN_NUMBER,
        }
    }
}

impl fmt::Display for ChapterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChapterNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Text(String),
    Int(i64),
    Float(f64),
}

impl<'de> Deserialize<'de> for ChapterNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<RawNumber>::deserialize(deserializer)?;
        Ok(match raw {
            Some(RawNumber::Text(s)) => ChapterNumber::parse(&s),
            Some(RawNumber::Int(i)) => ChapterNumber::Known(i.to_string()),
            Some(RawNumber::Float(f)) => ChapterNumber::Known(f.to_string()),
            None => ChapterNumber::Unknown,
        })
    }
}

/// One chapter of a work. Uniqueness key is `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub number: ChapterNumber,
    pub title: String,
    pub url: String,
}

impl ChapterRecord {
    pub fn new(number: ChapterNumber, title: impl Into<String>, url: impl Into<String>) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            format!("Chapter {}", number)
        } else {
            title.trim().to_string()
        };
        Self {
            number,
            title,
            url: url.into(),
        }
    }
}

/// Result of a discovery call: the work title and its chapters in reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub title: String,
    pub chapters: Vec<ChapterRecord>,
}

/// Input of the acquire entry point. Same shape as [Discovery], usually a subset of it.
pub type AcquireRequest = Discovery;

/// Drop records whose url was already seen. The first occurrence keeps its position;
/// if it has no number and a later duplicate does, the later record replaces it.
pub fn dedup_by_url(records: Vec<ChapterRecord>) -> Vec<ChapterRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<ChapterRecord> = Vec::with_capacity(records.len());
    for r in records {
        match index.get(&r.url) {
            Some(&i) => {
                if out[i].number == ChapterNumber::Unknown && r.number != ChapterNumber::Unknown {
                    out[i] = r;
                }
            }
            None => {
                index.insert(r.url.clone(), out.len());
                out.push(r);
            }
        }
    }
    out
}

/// Stable sort by numeric chapter number; unknown or non-numeric numbers sort as 0.
pub fn sort_by_number(records: &mut [ChapterRecord]) {
    records.sort_by(|a, b| {
        a.number
            .sort_key()
            .partial_cmp(&b.number.sort_key())
            .unwrap_or(Ordering::Equal)
    });
}

/// One page image within a chapter. `ordinal` is the 0-based reading position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub location: String,
    pub ordinal: usize,
}

/// Which fetch approach produced a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Direct request with the browser user agent and chapter referer.
    Direct,
    /// Direct request repeated with the mobile user agent after a 403.
    MobileUserAgent,
    /// Request through a named image proxy.
    Proxy { name: String },
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Direct => f.write_str("direct"),
            Strategy::MobileUserAgent => f.write_str("mobile-user-agent"),
            Strategy::Proxy { name } => write!(f, "proxy:{}", name),
        }
    }
}

/// Successfully acquired bytes for one asset.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub location: String,
    pub payload: Vec<u8>,
    pub strategy: Strategy,
}
