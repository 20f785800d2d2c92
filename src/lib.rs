//! # guildboard
//!
//! Scrape a guild leaderboard table, rank and annotate it, and render it as
//! a PNG or as column-aligned text blocks ready to post to a chat channel.
//!
//! ## Pipeline Overview
//!
//! ```text
//! HTML page
//!  │
//!  ├─ 1. Fetch      GET with browser-like headers, linear-backoff retries
//!  ├─ 2. Extract    table selector → rows of trimmed cell text
//!  ├─ 3. Transform  drop inactive rows, prune columns, stable sort, glyphs
//!  ├─ 4. Render     headless Chromium → PNG, or fenced monospace blocks
//!  └─ 5. Cache      one artifact kept for the configured TTL
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guildboard::{BoardConfig, Leaderboard, RenderMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BoardConfig::builder()
//!         .render_mode(RenderMode::Text)
//!         .build()?;
//!     let board = Leaderboard::new(config)?;
//!
//!     let output = board.get_artifact(false).await?;
//!     for block in output.artifact.text_blocks().unwrap_or_default() {
//!         println!("{block}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `guildboard` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! guildboard = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod board;
pub mod cache;
pub mod config;
pub mod error;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use board::Leaderboard;
pub use cache::{age_text, ArtifactCache, CacheEntry};
pub use config::{
    BoardConfig, BoardConfigBuilder, ColumnRemoval, Layout, RenderMode, ReportKind, ReportProfile,
    TextStyle, TransformOptions,
};
pub use error::BoardError;
pub use observer::{NoopObserver, PipelineObserver, Stage};
pub use output::{
    error_notice, format_timestamp, write_artifact, Artifact, ArtifactOutput, ArtifactSummary,
    Renderer,
};
pub use pipeline::extract::{HtmlTableReader, TableReader};
pub use pipeline::fetch::{HttpSource, MarkupSource, RetryPolicy};
pub use pipeline::image::ImageRenderer;
pub use pipeline::text::TextRenderer;
pub use pipeline::transform::transform;
pub use table::Matrix;
