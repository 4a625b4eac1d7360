#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use mangapdf::{ProxyRewrite, RetryPolicy, Settings};
use std::io::Cursor;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One request seen by the test server.
#[derive(Debug, Clone)]
pub struct Hit {
    pub url: String,
    pub user_agent: String,
    pub referer: String,
}

pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub location: Option<String>,
}

impl Reply {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into().into_bytes(),
            content_type: "text/html; charset=utf-8",
            location: None,
        }
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into().into_bytes(),
            content_type: "application/json",
            location: None,
        }
    }

    pub fn png(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            content_type: "image/png",
            location: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: format!("status {status}").into_bytes(),
            content_type: "text/plain",
            location: None,
        }
    }

    /// 301 to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::status(301)
        }
    }
}

pub struct TestServer {
    pub base: String,
    hits: Arc<Mutex<Vec<Hit>>>,
    shutdown: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `handler(hit, base_url)` on 127.0.0.1 until dropped.
    pub fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&Hit, &str) -> Reply + Send + 'static,
    {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let base = format!("http://{}", server.server_addr());
        let hits = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_base = base.clone();
        let thread_hits = Arc::clone(&hits);
        let handle = thread::spawn(move || loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }
            let request = match server.recv_timeout(Duration::from_millis(50)) {
                Ok(Some(req)) => req,
                Ok(None) => continue,
                Err(_) => break,
            };
            let header = |name: &'static str| {
                request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv(name))
                    .map(|h| h.value.as_str().to_string())
                    .unwrap_or_default()
            };
            let hit = Hit {
                url: request.url().to_string(),
                user_agent: header("User-Agent"),
                referer: header("Referer"),
            };
            thread_hits.lock().expect("hits lock").push(hit.clone());
            let reply = handler(&hit, &thread_base);
            let content_type =
                tiny_http::Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes())
                    .expect("build header");
            let mut response = tiny_http::Response::from_data(reply.body)
                .with_status_code(reply.status)
                .with_header(content_type);
            if let Some(location) = reply.location {
                let header = tiny_http::Header::from_bytes(&b"Location"[..], location.as_bytes())
                    .expect("build header");
                response.add_header(header);
            }
            let _ = request.respond(response);
        });

        Self {
            base,
            hits,
            shutdown: shutdown_tx,
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().expect("hits lock").clone()
    }

    pub fn hits_matching(&self, needle: &str) -> Vec<Hit> {
        self.hits()
            .into_iter()
            .filter(|h| h.url.contains(needle))
            .collect()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Noisy RGB PNG so the payload stays well above the minimum payload size.
pub fn page_png(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let mut v = x
            .wrapping_mul(73_856_093)
            ^ y.wrapping_mul(19_349_663)
            ^ seed.wrapping_mul(83_492_791);
        v ^= v >> 13;
        v = v.wrapping_mul(0x5bd1_e995);
        Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

/// Settings tuned for a local server: no politeness delay, one attempt, local relay only.
pub fn local_settings(relay: Option<ProxyRewrite>) -> Settings {
    let mut settings = Settings::default();
    settings.http.request_delay = Duration::ZERO;
    settings.http.timeout = Duration::from_secs(5);
    settings.fetch.retry = RetryPolicy {
        attempts: 1,
        backoff: Duration::ZERO,
    };
    settings.fetch.concurrency = 4;
    settings.fetch.proxies = relay.into_iter().collect();
    settings
}
