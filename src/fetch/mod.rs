//! Fetch engine: bounded-concurrency image acquisition with a fixed strategy chain per asset
//! (direct, mobile user agent after a 403, then each proxy rewrite).
//!
//! Failures never abort the batch. An asset that no strategy could fetch is simply absent
//! from the returned map.

mod proxy;

pub use proxy::{default_proxies, ProxyRewrite};

use crate::config::HttpSettings;
use crate::model::{FetchOutcome, ImageAsset, Strategy};
use crate::scraper::SiteKind;
use rayon::prelude::*;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use reqwest::{StatusCode, Url};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const IMAGE_ACCEPT: &str = "image/webp,image/apng,image/*,*/*;q=0.8";
const MAX_REDIRECTS: usize = 10;

/// Attempts per individual request for transient failures, with doubling backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    fn delay(&self, retry: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Worker threads per `fetch_all` call.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Payloads at or below this many bytes are treated as error pages.
    pub min_payload_bytes: usize,
    /// Relays tried in order after the direct strategies.
    pub proxies: Vec<ProxyRewrite>,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            concurrency: 6,
            retry: RetryPolicy::default(),
            min_payload_bytes: 500,
            proxies: default_proxies(),
        }
    }
}

/// Result of one strategy's request after retries.
enum Attempt {
    Fetched(Vec<u8>),
    Forbidden,
    Failed(String),
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn header(value: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(value).ok()
}

pub struct FetchEngine {
    client: Client,
    user_agent: String,
    mobile_user_agent: String,
    policy: FetchPolicy,
}

impl FetchEngine {
    pub fn new(http: &HttpSettings, policy: FetchPolicy) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(http.timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self {
            client,
            user_agent: http.user_agent.clone(),
            mobile_user_agent: http.mobile_user_agent.clone(),
            policy,
        })
    }

    /// Fetch every asset on a pool of `concurrency` workers. Blocks until all tasks finish.
    pub fn fetch_all(
        &self,
        assets: &[ImageAsset],
        referer: &str,
        site: SiteKind,
    ) -> HashMap<String, FetchOutcome> {
        let fetch = |asset: &ImageAsset| {
            self.fetch_one(&asset.location, referer, site)
                .map(|o| (o.location.clone(), o))
        };
        let outcomes: HashMap<String, FetchOutcome> = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.policy.concurrency.max(1))
            .build()
        {
            Ok(pool) => pool.install(|| assets.par_iter().filter_map(fetch).collect()),
            Err(e) => {
                warn!("worker pool unavailable ({}), fetching sequentially", e);
                assets.iter().filter_map(fetch).collect()
            }
        };
        debug!(
            "fetched {}/{} images for {}",
            outcomes.len(),
            assets.len(),
            referer
        );
        outcomes
    }

    /// Run the strategy chain for one asset. None when every strategy failed.
    pub fn fetch_one(&self, location: &str, referer: &str, site: SiteKind) -> Option<FetchOutcome> {
        let outcome = |payload, strategy| FetchOutcome {
            location: location.to_string(),
            payload,
            strategy,
        };

        let direct = self.direct_headers(location, referer, site, &self.user_agent);
        match self.request(location, direct) {
            Attempt::Fetched(payload) => return Some(outcome(payload, Strategy::Direct)),
            Attempt::Forbidden => {
                let mobile = self.direct_headers(location, referer, site, &self.mobile_user_agent);
                match self.request(location, mobile) {
                    Attempt::Fetched(payload) => {
                        return Some(outcome(payload, Strategy::MobileUserAgent))
                    }
                    Attempt::Forbidden => debug!("{}: mobile retry forbidden", location),
                    Attempt::Failed(reason) => debug!("{}: mobile retry: {}", location, reason),
                }
            }
            Attempt::Failed(reason) => debug!("{}: direct: {}", location, reason),
        }

        for proxy in &self.policy.proxies {
            let url = proxy.rewrite(location);
            let mut headers = HeaderMap::new();
            if let Some(v) = header(&self.user_agent) {
                headers.insert(USER_AGENT, v);
            }
            headers.insert(ACCEPT, HeaderValue::from_static(IMAGE_ACCEPT));
            match self.request(&url, headers) {
                Attempt::Fetched(payload) => {
                    return Some(outcome(
                        payload,
                        Strategy::Proxy {
                            name: proxy.name.clone(),
                        },
                    ))
                }
                Attempt::Forbidden => debug!("{}: proxy {} forbidden", location, proxy.name),
                Attempt::Failed(reason) => {
                    debug!("{}: proxy {}: {}", location, proxy.name, reason)
                }
            }
        }
        debug!("{}: all strategies failed", location);
        None
    }

    fn direct_headers(&self, location: &str, referer: &str, site: SiteKind, ua: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(v) = header(ua) {
            headers.insert(USER_AGENT, v);
        }
        if let Some(v) = header(referer) {
            headers.insert(REFERER, v);
        }
        headers.insert(ACCEPT, HeaderValue::from_static(IMAGE_ACCEPT));
        if site == SiteKind::Asura {
            if let Some(v) = Url::parse(location)
                .ok()
                .and_then(|u| header(&u.origin().ascii_serialization()))
            {
                headers.insert(ORIGIN, v);
            }
        }
        headers
    }

    /// One logical request under the retry policy.
    fn request(&self, url: &str, headers: HeaderMap) -> Attempt {
        let attempts = self.policy.retry.attempts.max(1);
        let mut last = String::new();
        for attempt in 1..=attempts {
            if attempt > 1 {
                std::thread::sleep(self.policy.retry.delay(attempt - 1));
            }
            let response = match self.client.get(url).headers(headers.clone()).send() {
                Ok(r) => r,
                Err(e) => {
                    last = e.to_string();
                    if e.is_timeout() || e.is_connect() {
                        continue;
                    }
                    return Attempt::Failed(last);
                }
            };
            let status = response.status();
            if status == StatusCode::FORBIDDEN {
                return Attempt::Forbidden;
            }
            if is_transient_status(status) {
                last = format!("HTTP {}", status);
                continue;
            }
            if status != StatusCode::OK {
                return Attempt::Failed(format!("HTTP {}", status));
            }
            return match response.bytes() {
                Ok(body) if body.len() > self.policy.min_payload_bytes => {
                    Attempt::Fetched(body.to_vec())
                }
                Ok(body) => Attempt::Failed(format!("payload too small ({} bytes)", body.len())),
                Err(e) => {
                    last = e.to_string();
                    if e.is_timeout() {
                        continue;
                    }
                    Attempt::Failed(last)
                }
            };
        }
        Attempt::Failed(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles() {
        let r = RetryPolicy {
            attempts: 4,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(r.delay(1), Duration::from_millis(100));
        assert_eq!(r.delay(2), Duration::from_millis(200));
        assert_eq!(r.delay(3), Duration::from_millis(400));
    }

    #[test]
    fn defaults() {
        let p = FetchPolicy::default();
        assert_eq!(p.concurrency, 6);
        assert_eq!(p.min_payload_bytes, 500);
        assert_eq!(p.retry.attempts, 2);
        assert_eq!(p.proxies.len(), 2);
    }

    #[test]
    fn transient_statuses() {
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::FORBIDDEN));
    }

    #[test]
    fn origin_header_only_for_asura() -> Result<(), reqwest::Error> {
        let engine = FetchEngine::new(&HttpSettings::default(), FetchPolicy::default())?;
        let loc = "https://gg.asuracomic.net:8443/storage/media/1/01.webp";
        let h = engine.direct_headers(loc, "https://asuracomic.net/ch/1", SiteKind::Asura, "UA");
        assert_eq!(
            h.get(ORIGIN).and_then(|v| v.to_str().ok()),
            Some("https://gg.asuracomic.net:8443")
        );
        assert_eq!(
            h.get(REFERER).and_then(|v| v.to_str().ok()),
            Some("https://asuracomic.net/ch/1")
        );
        let h = engine.direct_headers(loc, "https://x/ch/1", SiteKind::Generic, "UA");
        assert!(h.get(ORIGIN).is_none());
        Ok(())
    }

    #[test]
    fn unreachable_asset_is_absent() -> Result<(), reqwest::Error> {
        let policy = FetchPolicy {
            retry: RetryPolicy {
                attempts: 1,
                backoff: Duration::ZERO,
            },
            proxies: Vec::new(),
            ..FetchPolicy::default()
        };
        let engine = FetchEngine::new(&HttpSettings::default(), policy)?;
        let assets = vec![ImageAsset {
            location: "http://127.0.0.1:9/01.jpg".to_string(),
            ordinal: 0,
        }];
        let got = engine.fetch_all(&assets, "http://127.0.0.1:9/ch", SiteKind::Generic);
        assert!(got.is_empty());
        Ok(())
    }
}
