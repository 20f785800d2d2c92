//! Pipeline orchestrator: cache-aware "get the current leaderboard".
//!
//! [`Leaderboard`] owns the artifact cache and the three collaborators
//! (markup source, table reader, renderer). A refresh runs
//! fetch → extract → transform → render strictly in sequence and writes the
//! cache only after every stage has succeeded; any failure propagates to the
//! caller with the previous cache entry left exactly as it was.
//!
//! Two concurrent forced refreshes may both do the full work. Rendering is
//! serialised through a gate so at most one browser runs at a time, and the
//! cache keeps whichever refresh *completed* last.

use crate::cache::{ArtifactCache, CacheEntry};
use crate::config::{BoardConfig, RenderMode, ReportKind};
use crate::error::BoardError;
use crate::observer::{NoopObserver, PipelineObserver, Stage};
use crate::output::{format_timestamp, ArtifactOutput, Renderer};
use crate::pipeline::extract::{extract, HtmlTableReader, TableReader};
use crate::pipeline::fetch::{HttpSource, MarkupSource};
use crate::pipeline::image::ImageRenderer;
use crate::pipeline::text::TextRenderer;
use crate::pipeline::transform::transform;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Leaderboard pipeline with its single-slot cache.
pub struct Leaderboard {
    config: BoardConfig,
    cache: ArtifactCache,
    source: Arc<dyn MarkupSource>,
    reader: Arc<dyn TableReader>,
    renderer: Arc<dyn Renderer>,
    observer: Arc<dyn PipelineObserver>,
    render_gate: Mutex<()>,
}

impl Leaderboard {
    /// Wire up the pipeline described by `config`.
    ///
    /// Injected collaborators win; otherwise the HTTP fetcher and the
    /// renderer selected by `render_mode` are built.
    pub fn new(config: BoardConfig) -> Result<Self, BoardError> {
        let source: Arc<dyn MarkupSource> = match &config.source {
            Some(source) => Arc::clone(source),
            None => Arc::new(HttpSource::from_config(&config)?),
        };
        let renderer: Arc<dyn Renderer> = match (&config.renderer, config.render_mode) {
            (Some(renderer), _) => Arc::clone(renderer),
            (None, RenderMode::Image) => Arc::new(ImageRenderer::from_config(&config)),
            (None, RenderMode::Text) => Arc::new(TextRenderer::from_config(&config)),
        };
        let observer: Arc<dyn PipelineObserver> = config
            .observer
            .clone()
            .unwrap_or_else(|| Arc::new(NoopObserver));

        Ok(Self {
            config,
            cache: ArtifactCache::new(),
            source,
            reader: Arc::new(HtmlTableReader),
            renderer,
            observer,
            render_gate: Mutex::new(()),
        })
    }

    /// Replace the table reader (defaults to [`HtmlTableReader`]).
    pub fn with_reader(mut self, reader: Arc<dyn TableReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// The daily leaderboard, from cache when it is still fresh.
    ///
    /// With `force_refresh` the cache is ignored for reading but still
    /// written on success.
    pub async fn get_artifact(&self, force_refresh: bool) -> Result<ArtifactOutput, BoardError> {
        let now = Utc::now();
        if !force_refresh {
            if let Some(entry) = self.cache.get_valid_at(self.config.cache_ttl, now) {
                let age = entry.age_text(now);
                info!("Serving cached leaderboard (age {age})");
                self.observer.on_cache_hit(&age);
                return Ok(cached_output(entry));
            }
        }

        let output = self.run_cycle(ReportKind::Daily).await?;
        self.cache
            .set(Arc::clone(&output.artifact), output.fetched_at);
        self.observer.on_artifact_ready(&output);
        Ok(output)
    }

    /// Render a report fresh.
    ///
    /// A daily report is a forced refresh and updates the cache; a monthly
    /// report never reads or writes it.
    pub async fn report(&self, kind: ReportKind) -> Result<ArtifactOutput, BoardError> {
        match kind {
            ReportKind::Daily => self.get_artifact(true).await,
            ReportKind::Monthly => {
                let output = self.run_cycle(kind).await?;
                self.observer.on_artifact_ready(&output);
                Ok(output)
            }
        }
    }

    async fn run_cycle(&self, kind: ReportKind) -> Result<ArtifactOutput, BoardError> {
        let total_start = Instant::now();
        info!("Refreshing {:?} leaderboard", kind);

        // ── Step 1: Fetch ────────────────────────────────────────────────────
        let start = self.begin(Stage::Fetch);
        let markup = self.source.fetch_markup().await?;
        let fetched_at = Utc::now();
        self.finish(Stage::Fetch, start);
        debug!("Fetched {} bytes of markup", markup.len());

        // ── Step 2: Extract ──────────────────────────────────────────────────
        let start = self.begin(Stage::Extract);
        let raw = extract(self.reader.as_ref(), &markup, &self.config.table_selector)?;
        self.finish(Stage::Extract, start);

        // ── Step 3: Transform ────────────────────────────────────────────────
        let start = self.begin(Stage::Transform);
        let table = transform(raw, &self.config.transform_options(kind));
        self.finish(Stage::Transform, start);
        debug!("Final table: {} rows", table.len());

        // ── Step 4: Render ───────────────────────────────────────────────────
        let title = &self.config.profile(kind).title;
        let timestamp = format!(
            "{}: {}",
            self.config.timestamp_prefix,
            format_timestamp(fetched_at, self.config.timezone)
        );
        let artifact = {
            let _gate = self.render_gate.lock().await;
            let start = self.begin(Stage::Render);
            let artifact = self.renderer.render(&table, title, &timestamp).await?;
            self.finish(Stage::Render, start);
            artifact
        };

        info!(
            "Leaderboard ready: {} bytes in {}ms",
            artifact.byte_len(),
            total_start.elapsed().as_millis()
        );

        Ok(ArtifactOutput {
            artifact: Arc::new(artifact),
            fetched_at,
            was_cached: false,
            kind,
        })
    }

    fn begin(&self, stage: Stage) -> Instant {
        self.observer.on_stage_start(stage);
        Instant::now()
    }

    fn finish(&self, stage: Stage, start: Instant) {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!("Stage {stage} done in {elapsed_ms}ms");
        self.observer.on_stage_complete(stage, elapsed_ms);
    }
}

fn cached_output(entry: CacheEntry) -> ArtifactOutput {
    ArtifactOutput {
        artifact: entry.artifact,
        fetched_at: entry.fetched_at,
        was_cached: true,
        kind: ReportKind::Daily,
    }
}
