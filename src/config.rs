//! Optional config file loading and resolved runtime settings. Search order: ./mangapdf.toml, then
//! $XDG_CONFIG_HOME/mangapdf/config.toml (or ~/.config/mangapdf/config.toml).

use crate::fetch::FetchPolicy;
use crate::pdf::AssemblyOptions;
use crate::scraper::mangadex::MANGADEX_API;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REQUEST_DELAY_MS: u64 = 250;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Default output directory when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// Desktop browser User-Agent for pages and direct image requests.
    pub user_agent: Option<String>,
    /// User-Agent for the single retry after a 403 on a direct image request.
    pub mobile_user_agent: Option<String>,
    /// Delay in milliseconds between sequential discovery requests (catalog pagination).
    pub request_delay_ms: Option<u64>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Concurrent image downloads per chapter.
    pub concurrency: Option<usize>,
    /// Attempts per image request for transient failures (timeouts, 5xx, 429).
    pub retry_count: Option<u32>,
    /// Backoff in milliseconds before the first retry; doubles afterwards.
    pub retry_backoff_ms: Option<u64>,
    /// Responses at or below this size are treated as error pages.
    pub min_payload_bytes: Option<usize>,
    /// Decoded images narrower or shorter than this are skipped.
    pub min_image_dimension: Option<u32>,
    /// JPEG quality (1-100) used when embedding pages.
    pub jpeg_quality: Option<u8>,
    /// Stamp "{chapter}-{page}" at the bottom of each image page (default: true).
    pub page_footer: Option<bool>,
}

/// Search order: (1) ./mangapdf.toml, (2) $XDG_CONFIG_HOME/mangapdf/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("mangapdf.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("mangapdf").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            return Ok(Some(config));
        }
    }
    Ok(None)
}

/// HTTP identity and timing shared by every stage of one request.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub mobile_user_agent: String,
    pub timeout: Duration,
    pub request_delay: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            mobile_user_agent: DEFAULT_MOBILE_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
        }
    }
}

/// Values given on the command line; each wins over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
}

/// Immutable runtime settings, built once per invocation and passed explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub http: HttpSettings,
    pub fetch: FetchPolicy,
    pub assembly: AssemblyOptions,
    /// Base URL of the MangaDex API.
    pub mangadex_api: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            http: HttpSettings::default(),
            fetch: FetchPolicy::default(),
            assembly: AssemblyOptions::default(),
            mangadex_api: MANGADEX_API.to_string(),
        }
    }
}

impl Settings {
    /// Merge defaults, then the config file, then command-line overrides.
    pub fn resolve(config: Option<&Config>, overrides: &Overrides) -> Self {
        let mut s = Settings::default();
        if let Some(c) = config {
            if let Some(ua) = &c.user_agent {
                s.http.user_agent = ua.clone();
            }
            if let Some(ua) = &c.mobile_user_agent {
                s.http.mobile_user_agent = ua.clone();
            }
            if let Some(ms) = c.request_delay_ms {
                s.http.request_delay = Duration::from_millis(ms);
            }
            if let Some(secs) = c.timeout_secs {
                s.http.timeout = Duration::from_secs(secs);
            }
            if let Some(n) = c.concurrency {
                s.fetch.concurrency = n;
            }
            if let Some(n) = c.retry_count {
                s.fetch.retry.attempts = n;
            }
            if let Some(ms) = c.retry_backoff_ms {
                s.fetch.retry.backoff = Duration::from_millis(ms);
            }
            if let Some(n) = c.min_payload_bytes {
                s.fetch.min_payload_bytes = n;
            }
            if let Some(n) = c.min_image_dimension {
                s.assembly.min_image_dimension = n;
            }
            if let Some(q) = c.jpeg_quality {
                s.assembly.jpeg_quality = q;
            }
            if let Some(f) = c.page_footer {
                s.assembly.footer = f;
            }
        }
        if let Some(ua) = &overrides.user_agent {
            s.http.user_agent = ua.clone();
        }
        if let Some(secs) = overrides.timeout_secs {
            s.http.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = overrides.concurrency {
            s.fetch.concurrency = n;
        }
        s.fetch.concurrency = s.fetch.concurrency.max(1);
        s.fetch.retry.attempts = s.fetch.retry.attempts.max(1);
        s.assembly.jpeg_quality = s.assembly.jpeg_quality.clamp(1, 100);
        s
    }
}
