//! Image relay rewrites. Each proxy is addressed with the percent-encoded asset URL as a
//! query parameter; the formats must match what the relays expect byte for byte.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except ASCII alphanumerics and `-._~` is encoded.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A third-party relay: `{prefix}{encoded asset url}{suffix}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRewrite {
    pub name: String,
    pub prefix: String,
    pub suffix: String,
}

impl ProxyRewrite {
    pub fn new(name: &str, prefix: &str, suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    pub fn rewrite(&self, asset_url: &str) -> String {
        format!(
            "{}{}{}",
            self.prefix,
            utf8_percent_encode(asset_url, QUERY_VALUE),
            self.suffix
        )
    }
}

/// Default relays in the order they are tried.
pub fn default_proxies() -> Vec<ProxyRewrite> {
    vec![
        ProxyRewrite::new("wsrv", "https://wsrv.nl/?url=", "&n=-1"),
        ProxyRewrite::new("corsproxy", "https://corsproxy.io/?url=", ""),
    ]
}
