//! Pipeline stages for turning the upstream page into an artifact.
//!
//! Each submodule implements exactly one step. The network and the browser
//! are confined to [`fetch`] and [`image`]; everything in between is pure
//! and deterministic.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ transform ──▶ text | document ──▶ image
//! (HTTP)    (scraper)   (filter/rank)  (blocks)  (HTML)    (chromium)
//! ```
//!
//! 1. [`fetch`]: GET the page with browser-like headers, retrying with
//!    linear backoff
//! 2. [`extract`]: pull the table rows out of the markup as trimmed text
//! 3. [`transform`]: drop inactive rows, prune columns, sort, and annotate
//!    with place and alert glyphs
//! 4. [`text`]: column-aligned monospace lines packed into fenced blocks
//! 5. [`document`]: escaped, self-contained HTML page for the image renderer
//! 6. [`image`]: lay out the document in headless Chromium and capture
//!    a PNG

pub mod document;
pub mod extract;
pub mod fetch;
pub mod image;
pub mod text;
pub mod transform;
