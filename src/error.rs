//! Error types for the guildboard library.
//!
//! A single pipeline invocation either produces a complete artifact or fails
//! with exactly one [`BoardError`]. The three stage failures map to the three
//! ways a refresh can go wrong:
//!
//! * [`BoardError::Fetch`]: the upstream page stayed unreachable or kept
//!   rejecting us after every attempt in the retry budget.
//! * [`BoardError::Extraction`]: the page arrived but the table selector
//!   matched no rows (layout change or an anti-bot block page).
//! * [`BoardError::Render`]: the rendering engine could not start, load the
//!   document, or capture it.
//!
//! None of them are retried beyond the fetcher's own attempt budget, and none
//! of them touch the artifact cache.

use std::path::PathBuf;
use thiserror::Error;

/// Upper bound on the text handed to a delivery sink.
pub const USER_MESSAGE_LIMIT: usize = 500;

/// All errors returned by the guildboard library.
#[derive(Debug, Error)]
pub enum BoardError {
    // ── Stage errors ──────────────────────────────────────────────────────
    /// Upstream unreachable or persistently rejecting after retries.
    #[error("Failed to fetch '{url}' after {attempts} attempt(s): {reason}")]
    Fetch {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// The table selector matched nothing.
    #[error("Table not found for selector '{selector}' (blocked request or page layout changed)")]
    Extraction { selector: String },

    /// The rendering engine failed to start, load, or capture.
    #[error("Rendering failed: {detail}")]
    Render { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the artifact file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BoardError {
    pub(crate) fn render(detail: impl std::fmt::Display) -> Self {
        BoardError::Render {
            detail: detail.to_string(),
        }
    }

    /// Display text bounded to [`USER_MESSAGE_LIMIT`] characters.
    ///
    /// This is what a delivery sink shows to people; it never carries more
    /// than the error's own message.
    pub fn user_message(&self) -> String {
        truncate_chars(&self.to_string(), USER_MESSAGE_LIMIT)
    }
}

/// Cut `s` to at most `max` characters without splitting a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
