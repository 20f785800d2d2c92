//! Configuration types for the leaderboard pipeline.
//!
//! All pipeline behaviour is controlled through [`BoardConfig`], built via its
//! [`BoardConfigBuilder`]. The column indices encode what we know about the
//! fixed upstream layout, so they live here as configuration rather than in
//! the transformer.
//!
//! # Column indexing
//! The eligibility column is indexed against the table *as scraped*, before
//! any column is removed. The ranking and outlier columns are indexed against
//! the table *after* pruning. The asymmetry mirrors the upstream layout and is
//! kept as-is.

use crate::error::BoardError;
use crate::observer::PipelineObserver;
use crate::output::Renderer;
use crate::pipeline::fetch::MarkupSource;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for fetching, shaping, and rendering the leaderboard.
///
/// Built via [`BoardConfig::builder()`] or using [`BoardConfig::default()`].
///
/// # Example
/// ```rust
/// use guildboard::{BoardConfig, RenderMode};
///
/// let config = BoardConfig::builder()
///     .source_url("https://guildstats.eu/guild=bambiki&op=3")
///     .table_id("myTable2")
///     .render_mode(RenderMode::Text)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BoardConfig {
    /// Page that carries the leaderboard table.
    pub source_url: String,

    /// CSS selector of the table element. Default: `#myTable2`.
    pub table_selector: String,

    /// Referer sent with every request. Default: origin of `source_url`.
    pub referer: Option<String>,

    /// `Accept-Language` sent with every request.
    pub accept_language: String,

    /// Attempts per fetch, including the first one. Default: 3.
    pub fetch_attempts: u32,

    /// Per-attempt HTTP timeout. Default: 25 s.
    pub fetch_timeout: Duration,

    /// Backoff unit; the wait after attempt `n` is `n × unit`. Default: 1 s.
    pub backoff_unit: Duration,

    /// Pre-removal column whose `"0"` / `"-"` marks an inactive row. Default: 13.
    pub eligibility_column: usize,

    /// Column removals applied in order to every row. Default: `(0,1) (2,10) (5,1)`.
    pub column_removals: Vec<ColumnRemoval>,

    /// Ranking profile for the daily report.
    pub daily: ReportProfile,

    /// Ranking profile for the monthly summary.
    pub monthly: ReportProfile,

    /// Maximum age of a cached artifact. Default: 15 min.
    pub cache_ttl: Duration,

    /// How the final table becomes an artifact. Default: image.
    pub render_mode: RenderMode,

    /// Viewport width and device-scale factor for image mode.
    pub layout: Layout,

    /// Chromium executable used by image mode. Default: `/usr/bin/chromium`.
    pub browser_executable: PathBuf,

    /// Maximum characters per text block, fences included. Default: 1900.
    pub max_block_len: usize,

    /// Whether text blocks carry ANSI colour hints. Default: plain.
    pub text_style: TextStyle,

    /// Zone timestamps are shown in; its IANA name is appended to them.
    /// Default: `Europe/Warsaw`.
    pub timezone: Tz,

    /// Text placed before the timestamp in rendered headers. Default: `Data from`.
    pub timestamp_prefix: String,

    /// Pre-constructed markup source. Takes precedence over the HTTP fetcher.
    pub source: Option<Arc<dyn MarkupSource>>,

    /// Pre-constructed renderer. Takes precedence over `render_mode`.
    pub renderer: Option<Arc<dyn Renderer>>,

    /// Stage event callback.
    pub observer: Option<Arc<dyn PipelineObserver>>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            source_url: "https://guildstats.eu/guild=bambiki&op=3".to_string(),
            table_selector: "#myTable2".to_string(),
            referer: None,
            accept_language: "pl-PL,pl;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            fetch_attempts: 3,
            fetch_timeout: Duration::from_secs(25),
            backoff_unit: Duration::from_secs(1),
            eligibility_column: 13,
            column_removals: vec![
                ColumnRemoval::new(0, 1),
                ColumnRemoval::new(2, 10),
                ColumnRemoval::new(5, 1),
            ],
            daily: ReportProfile {
                title: "GuildStats – Bambiki".to_string(),
                ranking_column: 2,
                outlier_column: Some(2),
            },
            monthly: ReportProfile {
                title: "GuildStats – Monthly summary (Exp 30 days)".to_string(),
                ranking_column: 4,
                outlier_column: None,
            },
            cache_ttl: Duration::from_secs(15 * 60),
            render_mode: RenderMode::default(),
            layout: Layout::default(),
            browser_executable: PathBuf::from("/usr/bin/chromium"),
            max_block_len: 1900,
            text_style: TextStyle::default(),
            timezone: chrono_tz::Europe::Warsaw,
            timestamp_prefix: "Data from".to_string(),
            source: None,
            renderer: None,
            observer: None,
        }
    }
}

impl fmt::Debug for BoardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardConfig")
            .field("source_url", &self.source_url)
            .field("table_selector", &self.table_selector)
            .field("fetch_attempts", &self.fetch_attempts)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("eligibility_column", &self.eligibility_column)
            .field("column_removals", &self.column_removals)
            .field("daily", &self.daily)
            .field("monthly", &self.monthly)
            .field("cache_ttl", &self.cache_ttl)
            .field("render_mode", &self.render_mode)
            .field("layout", &self.layout)
            .field("browser_executable", &self.browser_executable)
            .field("max_block_len", &self.max_block_len)
            .field("text_style", &self.text_style)
            .field("timezone", &self.timezone.name())
            .field("timestamp_prefix", &self.timestamp_prefix)
            .field("source", &self.source.as_ref().map(|_| "<dyn MarkupSource>"))
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn Renderer>"))
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl BoardConfig {
    /// Create a new builder for `BoardConfig`.
    pub fn builder() -> BoardConfigBuilder {
        BoardConfigBuilder {
            config: Self::default(),
            timezone_name: None,
        }
    }

    /// Ranking profile for the given report.
    pub fn profile(&self, kind: ReportKind) -> &ReportProfile {
        match kind {
            ReportKind::Daily => &self.daily,
            ReportKind::Monthly => &self.monthly,
        }
    }

    /// Transformer options for the given report.
    pub fn transform_options(&self, kind: ReportKind) -> TransformOptions {
        let profile = self.profile(kind);
        TransformOptions {
            eligibility_column: self.eligibility_column,
            column_removals: self.column_removals.clone(),
            ranking_column: profile.ranking_column,
            outlier_column: profile.outlier_column,
        }
    }
}

/// Builder for [`BoardConfig`].
pub struct BoardConfigBuilder {
    config: BoardConfig,
    /// Zone name as given; resolved against the tz database in `build`.
    timezone_name: Option<String>,
}

impl fmt::Debug for BoardConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardConfigBuilder")
            .field("config", &self.config)
            .field("timezone_name", &self.timezone_name)
            .finish()
    }
}

impl BoardConfigBuilder {
    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.config.source_url = url.into();
        self
    }

    pub fn table_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.table_selector = selector.into();
        self
    }

    /// Shorthand for `table_selector("#<id>")`.
    pub fn table_id(mut self, id: impl AsRef<str>) -> Self {
        self.config.table_selector = format!("#{}", id.as_ref());
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.config.referer = Some(referer.into());
        self
    }

    pub fn accept_language(mut self, value: impl Into<String>) -> Self {
        self.config.accept_language = value.into();
        self
    }

    pub fn fetch_attempts(mut self, n: u32) -> Self {
        self.config.fetch_attempts = n;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.config.backoff_unit = unit;
        self
    }

    pub fn eligibility_column(mut self, idx: usize) -> Self {
        self.config.eligibility_column = idx;
        self
    }

    pub fn column_removals(mut self, removals: Vec<ColumnRemoval>) -> Self {
        self.config.column_removals = removals;
        self
    }

    pub fn daily(mut self, profile: ReportProfile) -> Self {
        self.config.daily = profile;
        self
    }

    pub fn monthly(mut self, profile: ReportProfile) -> Self {
        self.config.monthly = profile;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn render_mode(mut self, mode: RenderMode) -> Self {
        self.config.render_mode = mode;
        self
    }

    pub fn viewport_width(mut self, px: u32) -> Self {
        self.config.layout.width = px;
        self
    }

    pub fn device_scale_factor(mut self, scale: f64) -> Self {
        self.config.layout.device_scale_factor = scale;
        self
    }

    pub fn browser_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.browser_executable = path.into();
        self
    }

    pub fn max_block_len(mut self, n: usize) -> Self {
        self.config.max_block_len = n;
        self
    }

    pub fn text_style(mut self, style: TextStyle) -> Self {
        self.config.text_style = style;
        self
    }

    /// IANA zone name, e.g. `Europe/Warsaw` or `UTC`.
    pub fn timezone(mut self, name: impl Into<String>) -> Self {
        self.timezone_name = Some(name.into());
        self
    }

    pub fn timestamp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.timestamp_prefix = prefix.into();
        self
    }

    pub fn source(mut self, source: Arc<dyn MarkupSource>) -> Self {
        self.config.source = Some(source);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<BoardConfig, BoardError> {
        if let Some(name) = self.timezone_name.take() {
            self.config.timezone = name.parse::<Tz>().map_err(|_| {
                BoardError::InvalidConfig(format!("unknown time zone '{name}'"))
            })?;
        }
        let c = &self.config;
        let url = reqwest::Url::parse(&c.source_url).map_err(|e| {
            BoardError::InvalidConfig(format!("source URL '{}' is invalid: {e}", c.source_url))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(BoardError::InvalidConfig(format!(
                "source URL must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if scraper::Selector::parse(&c.table_selector).is_err() {
            return Err(BoardError::InvalidConfig(format!(
                "table selector '{}' does not parse",
                c.table_selector
            )));
        }
        if c.fetch_attempts == 0 {
            return Err(BoardError::InvalidConfig(
                "fetch attempts must be ≥ 1".into(),
            ));
        }
        if let Some(bad) = c.column_removals.iter().find(|r| r.repeat == 0) {
            return Err(BoardError::InvalidConfig(format!(
                "column removal at index {} has a zero repeat count",
                bad.index
            )));
        }
        for (name, profile) in [("daily", &c.daily), ("monthly", &c.monthly)] {
            if profile.ranking_column == 0 {
                return Err(BoardError::InvalidConfig(format!(
                    "{name} ranking column cannot be the name column"
                )));
            }
            if profile.outlier_column == Some(0) {
                return Err(BoardError::InvalidConfig(format!(
                    "{name} outlier column cannot be the name column"
                )));
            }
        }
        if !(200..=4000).contains(&c.layout.width) {
            return Err(BoardError::InvalidConfig(format!(
                "viewport width must be 200–4000 px, got {}",
                c.layout.width
            )));
        }
        if !(0.5..=4.0).contains(&c.layout.device_scale_factor) {
            return Err(BoardError::InvalidConfig(format!(
                "device scale factor must be 0.5–4.0, got {}",
                c.layout.device_scale_factor
            )));
        }
        let fence_overhead = c.text_style.fence_open().chars().count() + FENCE_CLOSE.len();
        if c.max_block_len <= fence_overhead {
            return Err(BoardError::InvalidConfig(format!(
                "max block length must exceed the fence overhead of {fence_overhead} chars"
            )));
        }
        Ok(self.config)
    }
}

// ── Value types ──────────────────────────────────────────────────────────

/// Closing fence of a text block.
pub const FENCE_CLOSE: &str = "```";

/// Remove the column at `index`, `repeat` times in a row.
///
/// Each removal shifts later columns left, so repeating at the same index
/// deletes a contiguous run starting there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRemoval {
    pub index: usize,
    pub repeat: usize,
}

impl ColumnRemoval {
    pub const fn new(index: usize, repeat: usize) -> Self {
        Self { index, repeat }
    }
}

/// Per-report ranking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProfile {
    /// Title printed above the table.
    pub title: String,
    /// Post-removal column sorted on, descending.
    pub ranking_column: usize,
    /// Post-removal column whose negative value earns the alert glyph.
    /// `None` disables outlier annotation.
    pub outlier_column: Option<usize>,
}

/// Options consumed by [`crate::pipeline::transform::transform`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOptions {
    pub eligibility_column: usize,
    pub column_removals: Vec<ColumnRemoval>,
    pub ranking_column: usize,
    pub outlier_column: Option<usize>,
}

/// Which ranking the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Yesterday's gains; cached, with outlier glyphs. (default)
    #[default]
    Daily,
    /// Thirty-day gains; always fresh, no outlier glyphs.
    Monthly,
}

/// Artifact flavour produced by the built-in renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Screenshot of a laid-out HTML table. (default)
    #[default]
    Image,
    /// Fenced, column-aligned monospace blocks.
    Text,
}

/// Styling of text-mode blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    /// No markup inside the block. (default)
    #[default]
    Plain,
    /// ANSI colour hints: green gains, red losses, bold header.
    Ansi,
}

impl TextStyle {
    /// Opening fence including the trailing newline.
    pub fn fence_open(&self) -> &'static str {
        match self {
            TextStyle::Plain => "```text\n",
            TextStyle::Ansi => "```ansi\n",
        }
    }
}

/// Image geometry in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Viewport width. Default: 980.
    pub width: u32,
    /// Device-scale factor; the PNG is `width × scale` pixels wide. Default: 2.
    pub device_scale_factor: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            width: 980,
            device_scale_factor: 2.0,
        }
    }
}
