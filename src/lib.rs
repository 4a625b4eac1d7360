//! mangapdf: discover manga chapters on MangaDex, Manganato, Asura or generic reader sites and
//! bundle their page images into a single PDF.

pub mod cli;
pub mod config;
pub mod fetch;
pub mod locate;
pub mod logging;
pub mod markup;
pub mod model;
pub mod pdf;
pub mod pipeline;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use config::{Config, Overrides, Settings};
pub use fetch::{FetchEngine, FetchPolicy, ProxyRewrite, RetryPolicy};
pub use model::{
    AcquireRequest, ChapterNumber, ChapterRecord, Discovery, FetchOutcome, ImageAsset, Strategy,
};
pub use pdf::{assemble, AssembledDocument, Assembler, AssemblyError, AssemblyOptions, PageKind};
pub use pipeline::{
    acquire, discover, AcquireError, AcquiredDocument, MAX_CHAPTERS_PER_REQUEST,
};
pub use scraper::{classify, ChapterAdapter, DiscoveryError, PoliteClient, SiteKind};
