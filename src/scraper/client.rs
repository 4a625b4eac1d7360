//! Blocking HTTP client for discovery and image locating, with a politeness delay between requests.

use crate::config::HttpSettings;
use std::time::{Duration, Instant};

const MAX_REDIRECTS: usize = 10;

/// Blocking HTTP client that enforces a delay between requests.
///
/// Used sequentially by adapters and the image locator. One attempt per request;
/// retries belong to the fetch engine.
#[derive(Debug)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
    delay: Duration,
    last_request: Option<Instant>,
}

impl PoliteClient {
    /// Build from resolved runtime settings.
    pub fn from_settings(settings: &HttpSettings) -> Result<Self, reqwest::Error> {
        Self::builder()
            .user_agent(settings.user_agent.clone())
            .delay(settings.request_delay)
            .timeout(settings.timeout)
            .build()
    }

    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    /// Perform a GET request. Sleeps until the configured delay has passed since the last request.
    pub fn get(&mut self, url: &str) -> Result<reqwest::blocking::Response, reqwest::Error> {
        self.wait_delay();
        let result = self.inner.get(url).send();
        self.last_request = Some(Instant::now());
        result
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

/// Builder for PoliteClient with optional User-Agent, delay and timeout.
#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: String,
    delay: Duration,
    timeout: Duration,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        let defaults = HttpSettings::default();
        Self {
            user_agent: defaults.user_agent,
            delay: defaults.request_delay,
            timeout: defaults.timeout,
        }
    }
}

impl PoliteClientBuilder {
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    /// Minimum gap between consecutive requests (default 250 ms).
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Per-request timeout (default 15 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the blocking client and polite wrapper.
    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(PoliteClient {
            inner,
            delay: self.delay,
            last_request: None,
        })
    }
}
