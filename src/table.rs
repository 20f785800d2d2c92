//! Table data model shared by every pipeline stage.
//!
//! A [`Matrix`] is plain text all the way through: row 0 is the header, the
//! last row may be the aggregate ("Total") row, everything in between is one
//! ranked participant. Column roles are positional once pruning is done:
//! column 0 is the name (glyphs are prepended to it in place), column 1 is a
//! secondary attribute such as level, and columns ≥ 2 hold signed deltas.

/// One ordered row of text cells.
pub type Row = Vec<String>;

/// Ordered rows; row 0 is the header.
pub type Matrix = Vec<Row>;

/// Label that marks the aggregate row (compared trimmed, case-insensitively).
pub const AGGREGATE_LABEL: &str = "total";

/// Place glyphs for the top three entity rows, in order.
pub const RANK_GLYPHS: [&str; 3] = ["🥇", "🥈", "🥉"];

/// Alert glyph for rows whose outlier column is negative.
pub const OUTLIER_GLYPH: &str = "☠️";

/// First column whose values are signed deltas.
pub const FIRST_DELTA_COLUMN: usize = 2;

/// True when the row's first cell reads "Total".
pub fn is_aggregate_row(row: &[String]) -> bool {
    row.first()
        .map(|c| c.trim().eq_ignore_ascii_case(AGGREGATE_LABEL))
        .unwrap_or(false)
}

/// Parse a delta cell like `"+1,200"` or `"-50"` into a number.
///
/// `+` and `,` are stripped before parsing; empty, missing, non-numeric, and
/// non-finite values count as zero.
pub fn numeric_value(cell: Option<&str>) -> f64 {
    let cleaned: String = cell
        .unwrap_or("")
        .chars()
        .filter(|c| *c != '+' && *c != ',')
        .collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Sign of a delta cell judged by its leading character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
    Neutral,
}

impl Sign {
    pub fn of(cell: &str) -> Self {
        match cell.trim().chars().next() {
            Some('+') => Sign::Positive,
            Some('-') => Sign::Negative,
            _ => Sign::Neutral,
        }
    }
}
