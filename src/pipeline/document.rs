//! Self-contained HTML document for image rendering.
//!
//! The document embeds its stylesheet, loads nothing external, and escapes
//! every piece of scraped or caller-supplied text, so the rendering engine
//! never runs markup that came from upstream.

use crate::table::{is_aggregate_row, Matrix, Sign, FIRST_DELTA_COLUMN};
use std::fmt::Write as _;

const TABLE_CSS: &str = include_str!("../assets/table.css");

/// Escape `&`, `<`, and `>`.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn format_cell(cell: &str, col_idx: usize) -> String {
    let text = cell.trim();
    if col_idx >= FIRST_DELTA_COLUMN {
        match Sign::of(text) {
            Sign::Positive => return format!("<span class=\"pos\">{}</span>", escape_html(text)),
            Sign::Negative => return format!("<span class=\"neg\">{}</span>", escape_html(text)),
            Sign::Neutral => {}
        }
    }
    escape_html(text)
}

/// Build the full HTML page: title, timestamp, then the table.
///
/// Row 0 becomes the header; the aggregate row gets the `total` class and
/// delta cells get `pos` / `neg` by their sign.
pub fn build_document(table: &Matrix, title: &str, timestamp: &str) -> String {
    let (header, body) = match table.split_first() {
        Some((header, body)) => (header.as_slice(), body),
        None => (&[][..], &[][..]),
    };

    let mut header_html = String::new();
    for cell in header {
        let _ = write!(header_html, "<th>{}</th>", escape_html(cell.trim()));
    }

    let mut body_html = String::new();
    for row in body {
        let class = if is_aggregate_row(row) { "total" } else { "" };
        let _ = write!(body_html, "<tr class=\"{class}\">");
        for (i, cell) in row.iter().enumerate() {
            let _ = write!(body_html, "<td>{}</td>", format_cell(cell, i));
        }
        body_html.push_str("</tr>\n");
    }

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8" />
<style>{css}</style>
</head>
<body>
<div class="wrap">
  <div class="card">
    <div class="top">
      <div class="title">{title}</div>
      <div class="ts">{ts}</div>
    </div>
    <table>
      <thead><tr>{header_html}</tr></thead>
      <tbody>
{body_html}      </tbody>
    </table>
  </div>
</div>
</body>
</html>"#,
        css = TABLE_CSS,
        title = escape_html(title),
        ts = escape_html(timestamp),
    )
}
