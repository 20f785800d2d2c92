//! Artifacts and the helpers a delivery sink needs to ship them.
//!
//! The library stops at "here is a finished artifact". Posting it to a chat
//! channel is the caller's job; the functions here produce the caption, the
//! attachment name, and the bounded error notice that such a caller sends.

use crate::cache::age_text;
use crate::config::ReportKind;
use crate::error::BoardError;
use crate::table::Matrix;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// A rendered leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// Complete PNG image.
    Png(Vec<u8>),
    /// Fenced text blocks, each within the configured length budget.
    Text(Vec<String>),
}

impl Artifact {
    /// Total payload size in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Artifact::Png(bytes) => bytes.len(),
            Artifact::Text(blocks) => blocks.iter().map(String::len).sum(),
        }
    }

    pub fn as_png(&self) -> Option<&[u8]> {
        match self {
            Artifact::Png(bytes) => Some(bytes),
            Artifact::Text(_) => None,
        }
    }

    pub fn text_blocks(&self) -> Option<&[String]> {
        match self {
            Artifact::Text(blocks) => Some(blocks),
            Artifact::Png(_) => None,
        }
    }
}

/// Turns a final table into an artifact.
///
/// Implemented by [`crate::pipeline::text::TextRenderer`] and
/// [`crate::pipeline::image::ImageRenderer`]; a custom one can be injected
/// through [`crate::config::BoardConfigBuilder::renderer`].
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        table: &Matrix,
        title: &str,
        timestamp: &str,
    ) -> Result<Artifact, BoardError>;
}

/// Result of [`crate::board::Leaderboard::get_artifact`] and friends.
#[derive(Debug, Clone)]
pub struct ArtifactOutput {
    pub artifact: Arc<Artifact>,
    /// When the underlying page was fetched.
    pub fetched_at: DateTime<Utc>,
    /// True when served from the cache without any fetch or render.
    pub was_cached: bool,
    pub kind: ReportKind,
}

impl ArtifactOutput {
    /// Chat caption, e.g. `📊 **GuildStats – data from:** 2025-01-31 11:30:00 (Europe/Warsaw) ⚡(cache 42s)`.
    pub fn caption(&self, label: &str, tz: Tz, now: DateTime<Utc>) -> String {
        let icon = match self.kind {
            ReportKind::Daily => "📊",
            ReportKind::Monthly => "🗓️",
        };
        let ts = format_timestamp(self.fetched_at, tz);
        let cached_note = if self.was_cached {
            format!(" ⚡(cache {})", age_text(self.fetched_at, now))
        } else {
            String::new()
        };
        format!("{icon} **{label}:** {ts}{cached_note}")
    }

    /// File name to attach an image artifact under.
    pub fn attachment_name(&self) -> &'static str {
        match self.kind {
            ReportKind::Daily => "guildstats.png",
            ReportKind::Monthly => "guildstats-monthly.png",
        }
    }

    /// Serialisable description without the payload.
    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            kind: self.kind,
            format: match self.artifact.as_ref() {
                Artifact::Png(_) => "png",
                Artifact::Text(_) => "text",
            },
            bytes: self.artifact.byte_len(),
            blocks: self.artifact.text_blocks().map(<[String]>::len),
            fetched_at: self.fetched_at,
            was_cached: self.was_cached,
        }
    }
}

/// JSON-friendly view of an [`ArtifactOutput`].
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub kind: ReportKind,
    pub format: &'static str,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<usize>,
    pub fetched_at: DateTime<Utc>,
    pub was_cached: bool,
}

/// `YYYY-MM-DD HH:MM:SS (<zone>)`, wall-clock time in `tz`.
pub fn format_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    format!(
        "{} ({})",
        at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S"),
        tz.name()
    )
}

/// Message a sink posts when a refresh failed.
pub fn error_notice(err: &BoardError) -> String {
    format!("❌ Error: **{}**", err.user_message())
}

/// Write an artifact to disk atomically (temp file + rename).
///
/// PNGs are written as-is; text blocks are joined with newlines.
pub async fn write_artifact(artifact: &Artifact, path: impl AsRef<Path>) -> Result<(), BoardError> {
    let path = path.as_ref();
    let write_err = |source| BoardError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let bytes = match artifact {
        Artifact::Png(bytes) => bytes.clone(),
        Artifact::Text(blocks) => blocks.join("\n").into_bytes(),
    };

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, &bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
