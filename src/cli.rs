//! CLI parsing and orchestration. `discover` prints the chapter list as JSON; `acquire` turns
//! selected chapters into a PDF. Maps errors to exit codes.

use crate::config::{self, Overrides, Settings};
use crate::model::{AcquireRequest, ChapterRecord, Discovery};
use crate::pipeline::{self, AcquireError, AcquiredDocument};
use crate::scraper::{classify, DiscoveryError, SiteKind};
use clap::{Parser, Subcommand};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Discovery(#[from] DiscoveryError),

    #[error("{0}")]
    Acquire(#[from] AcquireError),

    #[error("Cannot write output: {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Discovery(_) => 2,
            CliRunError::Acquire(AcquireError::LimitExceeded { .. }) => 4,
            CliRunError::Acquire(AcquireError::NoChaptersSelected) => 1,
            CliRunError::Acquire(_) | CliRunError::Output { .. } => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "mangapdf")]
#[command(about = "Discover manga chapters and bundle their pages into a PDF")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, mobile_user_agent, request_delay_ms, timeout_secs, concurrency, retry_count, retry_backoff_ms, min_payload_bytes, min_image_dimension, jpeg_quality, page_footer) are read from ./mangapdf.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// HTTP User-Agent for pages and direct image requests (overrides config).
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (overrides config; default 15).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Concurrent image downloads per chapter (overrides config; default 6).
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Only log warnings and errors; no progress bar.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging and the full error chain on failure.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the title and chapter list of a work as JSON.
    Discover {
        /// Series URL (MangaDex title page, Manganato, Asura, or another reader site).
        url: String,

        /// Write the JSON here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override site detection (mangadex, manganato, asura, generic).
        #[arg(long, value_parser = parse_site)]
        site: Option<SiteKind>,
    },

    /// Download chapters and write them as one PDF (at most 5 per run).
    Acquire {
        /// Series URL to discover chapters from. Not needed with --selection.
        #[arg(required_unless_present = "selection")]
        url: Option<String>,

        /// Chapter numbers to fetch, e.g. 1-3, 1,2,12.5 or 4-5,7.
        #[arg(long, value_parser = parse_chapter_selection, required_unless_present = "selection")]
        chapters: Option<ChapterSelection>,

        /// JSON file with {title, chapters} (e.g. edited output of `discover`).
        #[arg(long, conflicts_with_all = ["url", "chapters"])]
        selection: Option<PathBuf>,

        /// Output path. Default: {output_dir}/{sanitized-title}.pdf.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override site detection (mangadex, manganato, asura, generic).
        #[arg(long, value_parser = parse_site)]
        site: Option<SiteKind>,

        /// Resolve the selection and print chapters and output path without downloading.
        #[arg(long)]
        dry_run: bool,
    },
}

/// One item of a chapter selection.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionItem {
    /// Inclusive numeric range.
    Range(f64, f64),
    /// Single chapter number, compared numerically when possible.
    Single(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterSelection(pub Vec<SelectionItem>);

impl ChapterSelection {
    pub fn matches(&self, chapter: &ChapterRecord) -> bool {
        let value = chapter.number.value();
        self.0.iter().any(|item| match item {
            SelectionItem::Range(from, to) => value.is_some_and(|v| v >= *from && v <= *to),
            SelectionItem::Single(s) => match (s.parse::<f64>().ok(), value) {
                (Some(want), Some(v)) => want == v,
                _ => s.eq_ignore_ascii_case(chapter.number.as_str()),
            },
        })
    }

    /// Chapters of `discovery` picked by this selection, in discovery order.
    pub fn apply(&self, discovery: &Discovery) -> AcquireRequest {
        AcquireRequest {
            title: discovery.title.clone(),
            chapters: discovery
                .chapters
                .iter()
                .filter(|c| self.matches(c))
                .cloned()
                .collect(),
        }
    }
}

fn parse_number(s: &str) -> Result<f64, String> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("Invalid --chapters: '{}' is not a chapter number", s.trim()))
}

fn parse_chapter_selection(s: &str) -> Result<ChapterSelection, String> {
    let mut items = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((from, to)) => {
                let (from, to) = (parse_number(from)?, parse_number(to)?);
                if from > to {
                    return Err(format!(
                        "Invalid --chapters: start ({}) must be <= end ({})",
                        from, to
                    ));
                }
                items.push(SelectionItem::Range(from, to));
            }
            None => items.push(SelectionItem::Single(part.to_string())),
        }
    }
    if items.is_empty() {
        return Err(format!(
            "Invalid --chapters: expected numbers or ranges (e.g. 1-3,5), got '{}'",
            s
        ));
    }
    Ok(ChapterSelection(items))
}

fn parse_site(s: &str) -> Result<SiteKind, String> {
    match s.to_lowercase().as_str() {
        "mangadex" | "md" => Ok(SiteKind::MangaDex),
        "manganato" | "nato" => Ok(SiteKind::Manganato),
        "asura" => Ok(SiteKind::Asura),
        "generic" => Ok(SiteKind::Generic),
        _ => Err(format!(
            "Invalid --site value: '{}'. Use mangadex, manganato, asura, or generic.",
            s
        )),
    }
}

/// Ensure output path parent exists.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CliRunError> {
    validate_output_path(path)?;
    std::fs::write(path, bytes).map_err(|e| CliRunError::Output {
        path: path.to_path_buf(),
        source: e,
    })
}

fn load_selection(path: &Path) -> Result<AcquireRequest, CliRunError> {
    let s = std::fs::read_to_string(path).map_err(|e| {
        CliRunError::InvalidInput(format!("Cannot read selection {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&s).map_err(|e| {
        CliRunError::InvalidInput(format!("Invalid selection {}: {}", path.display(), e))
    })
}

fn discover_with(
    site: Option<SiteKind>,
    url: &str,
    settings: &Settings,
) -> Result<Discovery, CliRunError> {
    let site = site.unwrap_or_else(|| classify(url));
    pipeline::discover_as(site, url, settings).map_err(|e| match e {
        DiscoveryError::MalformedUrl { input, reason } => CliRunError::InvalidInput(format!(
            "Expected a series URL. Example: https://mangadex.org/title/<id>/... Invalid: {}: {}",
            input, reason
        )),
        other => CliRunError::Discovery(other),
    })
}

fn run_acquire(
    args: &Args,
    request: &AcquireRequest,
    site: Option<SiteKind>,
    settings: &Settings,
) -> Result<AcquiredDocument, CliRunError> {
    pipeline::check_selection(request)?;

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |done: usize, total: usize| {
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
            {
                bar.set_style(
                    style
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                        .progress_chars("█▉▊▋▌▍▎▏ "),
                );
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_position(done as u64);
        pb.set_message(format!("Acquired chapter {}/{}", done, total));
    };
    let progress: Option<&dyn Fn(usize, usize)> = if args.quiet {
        None
    } else {
        Some(&progress_cb)
    };

    let result = match site {
        Some(site) => pipeline::acquire_as(site, request, settings, progress),
        None => pipeline::acquire(request, settings, progress),
    };
    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }
    Ok(result?)
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let overrides = Overrides {
        user_agent: args.user_agent.clone(),
        timeout_secs: args.timeout,
        concurrency: args.concurrency,
    };
    let settings = Settings::resolve(config.as_ref(), &overrides);
    let output_dir: PathBuf = config
        .as_ref()
        .and_then(|c| c.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    match &args.command {
        Command::Discover { url, output, site } => {
            let discovery = discover_with(*site, url, &settings)?;
            let json = serde_json::to_string_pretty(&discovery).map_err(|e| {
                CliRunError::InvalidInput(format!("Failed to serialize chapters: {}", e))
            })?;
            match output {
                Some(path) => {
                    write_output(path, json.as_bytes())?;
                    if !args.quiet {
                        eprintln!(
                            "Wrote {} ({} chapters)",
                            path.display(),
                            discovery.chapters.len()
                        );
                    }
                }
                None => println!("{}", json),
            }
        }
        Command::Acquire {
            url,
            chapters,
            selection,
            output,
            site,
            dry_run,
        } => {
            let request = match (selection, url, chapters) {
                (Some(path), _, _) => load_selection(path)?,
                (None, Some(url), Some(chapters)) => {
                    let discovery = discover_with(*site, url, &settings)?;
                    let request = chapters.apply(&discovery);
                    if request.chapters.is_empty() {
                        return Err(CliRunError::InvalidInput(format!(
                            "No chapters of {:?} match --chapters ({} available).",
                            discovery.title,
                            discovery.chapters.len()
                        )));
                    }
                    request
                }
                _ => {
                    return Err(CliRunError::InvalidInput(
                        "Give a URL with --chapters, or --selection FILE.".to_string(),
                    ))
                }
            };

            let output_path = output
                .clone()
                .unwrap_or_else(|| output_dir.join(pipeline::file_name(&request.title)));

            if *dry_run {
                pipeline::check_selection(&request)?;
                for c in &request.chapters {
                    eprintln!("Chapter {}: {} ({})", c.number, c.title, c.url);
                }
                eprintln!("Output: {}", output_path.display());
                return Ok(());
            }

            validate_output_path(&output_path)?;
            let doc = run_acquire(args, &request, *site, &settings)?;
            write_output(&output_path, &doc.bytes)?;
            if !args.quiet {
                eprintln!(
                    "Wrote {} ({} pages)",
                    output_path.display(),
                    doc.pages.len()
                );
            }
        }
    }
    Ok(())
}
