//! Structured-text rendering: aligned monospace lines in fenced blocks.
//!
//! Column widths are measured on what a reader actually sees. ANSI style
//! markers are stripped before measuring and wide glyphs (the medal and
//! skull emoji) count as two cells, so the `|` separators line up in a
//! monospace chat block.
//!
//! Lines are packed into fenced blocks no longer than `max_block_len`
//! characters (fences included) so each block fits a single chat message.

use crate::config::{BoardConfig, TextStyle, FENCE_CLOSE};
use crate::error::BoardError;
use crate::output::{Artifact, Renderer};
use crate::table::{Matrix, Sign, FIRST_DELTA_COLUMN};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use unicode_width::UnicodeWidthStr;

/// Literal placed between cells.
pub const CELL_SEPARATOR: &str = " | ";

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

static RE_ANSI: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

/// Renders the table as one or more fenced text blocks.
#[derive(Debug, Clone, Copy)]
pub struct TextRenderer {
    pub max_block_len: usize,
    pub style: TextStyle,
}

impl TextRenderer {
    pub fn new(max_block_len: usize, style: TextStyle) -> Self {
        Self {
            max_block_len,
            style,
        }
    }

    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(config.max_block_len, config.text_style)
    }

    /// Synchronous core of [`Renderer::render`].
    pub fn render_blocks(&self, table: &Matrix, title: &str, timestamp: &str) -> Vec<String> {
        let mut lines = Vec::with_capacity(table.len() + 1);
        lines.push(format!("{title} | {timestamp}"));
        lines.extend(format_lines(table, self.style));
        let blocks = chunk_blocks(&lines, self.max_block_len, self.style);
        debug!("Text artifact: {} lines in {} block(s)", lines.len(), blocks.len());
        blocks
    }
}

#[async_trait]
impl Renderer for TextRenderer {
    async fn render(
        &self,
        table: &Matrix,
        title: &str,
        timestamp: &str,
    ) -> Result<Artifact, BoardError> {
        Ok(Artifact::Text(self.render_blocks(table, title, timestamp)))
    }
}

/// Display width of `s` with ANSI style markers ignored.
pub fn visible_width(s: &str) -> usize {
    RE_ANSI.replace_all(s, "").width()
}

/// Style one cell. Plain style returns it untouched.
fn style_cell(cell: &str, row_idx: usize, col_idx: usize, style: TextStyle) -> String {
    if style == TextStyle::Plain || cell.is_empty() {
        return cell.to_string();
    }
    if row_idx == 0 {
        return format!("{ANSI_BOLD}{cell}{ANSI_RESET}");
    }
    if col_idx >= FIRST_DELTA_COLUMN {
        match Sign::of(cell) {
            Sign::Positive => return format!("{ANSI_GREEN}{cell}{ANSI_RESET}"),
            Sign::Negative => return format!("{ANSI_RED}{cell}{ANSI_RESET}"),
            Sign::Neutral => {}
        }
    }
    cell.to_string()
}

/// Pad every cell to its column's widest visible value and join with [`CELL_SEPARATOR`].
pub fn format_lines(table: &Matrix, style: TextStyle) -> Vec<String> {
    let styled: Vec<Vec<String>> = table
        .iter()
        .enumerate()
        .map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(|(c, cell)| style_cell(cell, r, c, style))
                .collect()
        })
        .collect();

    let columns = styled.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in &styled {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(visible_width(cell));
        }
    }

    styled
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(i, cell)| {
                    let pad = widths[i].saturating_sub(visible_width(cell));
                    format!("{cell}{}", " ".repeat(pad))
                })
                .collect::<Vec<_>>()
                .join(CELL_SEPARATOR)
        })
        .collect()
}

/// Pack lines into fenced blocks of at most `max_len` characters.
///
/// A new block starts whenever the next line would push the current one over
/// budget. A single line that alone exceeds the budget still gets its own
/// block rather than being cut.
pub fn chunk_blocks(lines: &[String], max_len: usize, style: TextStyle) -> Vec<String> {
    let open = style.fence_open();
    let open_len = open.chars().count();
    let close_len = FENCE_CLOSE.chars().count();

    let mut blocks = Vec::new();
    let mut current = String::from(open);
    let mut current_len = open_len;
    let mut has_lines = false;

    for line in lines {
        let next_len = line.chars().count() + 1;
        if has_lines && current_len + next_len + close_len > max_len {
            current.push_str(FENCE_CLOSE);
            blocks.push(std::mem::replace(&mut current, String::from(open)));
            current_len = open_len;
        }
        if open_len + next_len + close_len > max_len {
            warn!("Line of {} chars exceeds the {}-char block budget", next_len - 1, max_len);
        }
        current.push_str(line);
        current.push('\n');
        current_len += next_len;
        has_lines = true;
    }

    current.push_str(FENCE_CLOSE);
    blocks.push(current);
    blocks
}
