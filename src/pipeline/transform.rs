//! Deterministic table shaping: filter, prune, rank, annotate.
//!
//! [`transform`] is a pure function of its inputs. It never fails on data
//! shape (missing cells read as empty text or zero) and relies on
//! [`crate::config::BoardConfigBuilder::build`] to reject nonsensical options.
//!
//! ## Step Order
//!
//! 1. Drop inactive entity rows (eligibility column is `"0"` or `"-"`,
//!    indexed *before* pruning).
//! 2. Apply the `(index, repeat)` column removals to every row.
//! 3. Set the header (first row) and the candidate aggregate (last row) aside.
//! 4. Stable-sort the rest on the ranking column, numerically descending.
//! 5. Reassemble header + sorted rows + aggregate, then pad every row to the
//!    same width.
//! 6. Prepend place glyphs to at most three entity rows.
//! 7. Prepend the alert glyph where the outlier column is negative.

use crate::config::{ColumnRemoval, TransformOptions};
use crate::table::{is_aggregate_row, numeric_value, Matrix, Row, OUTLIER_GLYPH, RANK_GLYPHS};
use std::cmp::Ordering;
use tracing::debug;

/// Values of the eligibility column that mean "no activity".
const INACTIVE_MARKERS: [&str; 2] = ["0", "-"];

/// Run every transformation step in order.
pub fn transform(raw: Matrix, opts: &TransformOptions) -> Matrix {
    let before = raw.len();
    let mut rows = filter_inactive(raw, opts.eligibility_column);
    debug!("Row filter kept {}/{} rows", rows.len(), before);

    remove_columns(&mut rows, &opts.column_removals);

    let mut rows = rank(rows, opts.ranking_column);
    pad_rows(&mut rows);

    annotate_ranks(&mut rows);
    if let Some(col) = opts.outlier_column {
        annotate_outliers(&mut rows, col);
    }
    rows
}

/// Step 1: drop rows whose eligibility cell is exactly `"0"` or `"-"`.
///
/// The header row and the aggregate row are always kept. A row too short to
/// have the column is kept.
pub fn filter_inactive(rows: Matrix, eligibility_column: usize) -> Matrix {
    rows.into_iter()
        .enumerate()
        .filter(|(i, row)| {
            if *i == 0 || is_aggregate_row(row) {
                return true;
            }
            !matches!(
                row.get(eligibility_column).map(String::as_str),
                Some(v) if INACTIVE_MARKERS.contains(&v)
            )
        })
        .map(|(_, row)| row)
        .collect()
}

/// Step 2: apply each removal `repeat` times at its index, on every row.
pub fn remove_columns(rows: &mut Matrix, removals: &[ColumnRemoval]) {
    for removal in removals {
        for _ in 0..removal.repeat {
            for row in rows.iter_mut() {
                if row.len() > removal.index {
                    row.remove(removal.index);
                }
            }
        }
    }
}

/// Steps 3–5: isolate header and last row, sort the middle, reassemble.
pub fn rank(mut rows: Matrix, ranking_column: usize) -> Matrix {
    if rows.is_empty() {
        return rows;
    }
    let header = rows.remove(0);
    let aggregate = rows.pop();

    // `sort_by` is stable: equal keys keep their scraped order.
    rows.sort_by(|a, b| {
        let ka = numeric_value(a.get(ranking_column).map(String::as_str));
        let kb = numeric_value(b.get(ranking_column).map(String::as_str));
        kb.partial_cmp(&ka).unwrap_or(Ordering::Equal)
    });

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(header);
    out.extend(rows);
    out.extend(aggregate);
    out
}

/// Pad short rows with empty cells so every row has the same width.
pub fn pad_rows(rows: &mut Matrix) {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in rows.iter_mut() {
        row.resize(width, String::new());
    }
}

/// Index of the last entity row, if any.
fn last_entity_index(rows: &Matrix) -> Option<usize> {
    match rows.len() {
        0 | 1 => None,
        n if is_aggregate_row(&rows[n - 1]) => (n > 2).then_some(n - 2),
        n => Some(n - 1),
    }
}

/// Step 6: prepend place glyphs to the first three entity rows.
///
/// Never reaches past the last entity row, so the aggregate row is never
/// annotated and a two-player table gets exactly two glyphs.
pub fn annotate_ranks(rows: &mut Matrix) {
    let Some(last) = last_entity_index(rows) else {
        return;
    };
    for (i, glyph) in RANK_GLYPHS.iter().enumerate() {
        let idx = 1 + i;
        if idx > last {
            break;
        }
        prepend_glyph(&mut rows[idx], glyph);
    }
}

/// Step 7: prepend the alert glyph where `outlier_column` is negative.
///
/// Skips the header, the aggregate row, and rows with an empty name.
/// Idempotent: a row that already carries the glyph is left alone.
pub fn annotate_outliers(rows: &mut Matrix, outlier_column: usize) {
    for row in rows.iter_mut().skip(1) {
        let name = row.first().map(|c| c.trim()).unwrap_or("");
        if name.is_empty() || is_aggregate_row(row) || name.contains(OUTLIER_GLYPH) {
            continue;
        }
        if numeric_value(row.get(outlier_column).map(String::as_str)) < 0.0 {
            prepend_glyph(row, OUTLIER_GLYPH);
        }
    }
}

fn prepend_glyph(row: &mut Row, glyph: &str) {
    match row.first_mut() {
        Some(first) => *first = format!("{glyph} {first}"),
        None => row.push(format!("{glyph} ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: &[&[&str]]) -> Matrix {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn names(rows: &Matrix) -> Vec<&str> {
        rows.iter().map(|r| r[0].as_str()).collect()
    }

    #[test]
    fn column_removal_is_order_and_repeat_exact() {
        let header: Row = (0..20).map(|i| format!("c{i}")).collect();
        let mut rows = vec![header.clone(), header];
        let removals = [
            ColumnRemoval::new(0, 1),
            ColumnRemoval::new(2, 10),
            ColumnRemoval::new(5, 1),
        ];

        // Manual stepwise deletion for comparison.
        let mut expected: Row = (0..20).map(|i| format!("c{i}")).collect();
        expected.remove(0);
        for _ in 0..10 {
            expected.remove(2);
        }
        expected.remove(5);

        remove_columns(&mut rows, &removals);
        assert_eq!(rows[0].len(), 20 - 12);
        assert_eq!(rows[0], expected);
        assert_eq!(
            rows[1],
            vec!["c1", "c2", "c13", "c14", "c15", "c17", "c18", "c19"]
        );
    }

    #[test]
    fn removal_skips_rows_that_are_too_short() {
        let mut rows = m(&[&["a", "b", "c"], &["x"]]);
        remove_columns(&mut rows, &[ColumnRemoval::new(1, 5)]);
        assert_eq!(rows, m(&[&["a"], &["x"]]));
    }

    #[test]
    fn filter_keeps_header_and_drops_inactive_rows() {
        let rows = m(&[
            &["Nick", "-"],
            &["A", "5"],
            &["B", "0"],
            &["C", "-"],
            &["D"],
            &["E", "00"],
        ]);
        let kept = filter_inactive(rows, 1);
        assert_eq!(names(&kept), vec!["Nick", "A", "D", "E"]);
    }

    #[test]
    fn filter_never_drops_the_aggregate_row() {
        let rows = m(&[&["Nick", "X"], &["A", "0"], &["Total", "-"]]);
        let kept = filter_inactive(rows, 1);
        assert_eq!(names(&kept), vec!["Nick", "Total"]);
    }

    #[test]
    fn ranking_sort_is_numeric_and_descending() {
        let rows = m(&[
            &["Nick", "Lvl", "Y"],
            &["low", "1", "-10"],
            &["mid", "1", "500"],
            &["high", "1", "+1,200"],
            &["Total", "-", "+1,690"],
        ]);
        let ranked = rank(rows, 2);
        assert_eq!(names(&ranked), vec!["Nick", "high", "mid", "low", "Total"]);
    }

    #[test]
    fn ranking_sort_is_stable_and_treats_garbage_as_zero() {
        let rows = m(&[
            &["Nick", "Lvl", "Y"],
            &["first", "1", "0"],
            &["neg", "1", "-1"],
            &["junk", "1", "n/a"],
            &["short", "1"],
            &["pos", "1", "+1"],
            &["last", "1", "+9"],
        ]);
        let ranked = rank(rows, 2);
        // "last" is the set-aside tail row and stays at the end unsorted.
        assert_eq!(
            names(&ranked),
            vec!["Nick", "pos", "first", "junk", "short", "neg", "last"]
        );
    }

    #[test]
    fn rank_handles_tiny_tables() {
        assert!(rank(Vec::new(), 2).is_empty());
        assert_eq!(rank(m(&[&["Nick"]]), 2), m(&[&["Nick"]]));
        assert_eq!(
            rank(m(&[&["Nick"], &["Total"]]), 2),
            m(&[&["Nick"], &["Total"]])
        );
    }

    #[test]
    fn rank_glyphs_stop_at_entity_rows() {
        let mut rows = m(&[&["Nick"], &["A"], &["B"], &["Total"]]);
        annotate_ranks(&mut rows);
        assert_eq!(names(&rows), vec!["Nick", "🥇 A", "🥈 B", "Total"]);
    }

    #[test]
    fn rank_glyphs_cover_top_three_only() {
        let mut rows = m(&[&["Nick"], &["A"], &["B"], &["C"], &["D"]]);
        annotate_ranks(&mut rows);
        assert_eq!(names(&rows), vec!["Nick", "🥇 A", "🥈 B", "🥉 C", "D"]);
    }

    #[test]
    fn rank_glyphs_skip_header_only_and_total_only_tables() {
        let mut header_only = m(&[&["Nick"]]);
        annotate_ranks(&mut header_only);
        assert_eq!(names(&header_only), vec!["Nick"]);

        let mut total_only = m(&[&["Nick"], &["Total"]]);
        annotate_ranks(&mut total_only);
        assert_eq!(names(&total_only), vec!["Nick", "Total"]);
    }

    #[test]
    fn outlier_annotation_is_idempotent() {
        let mut rows = m(&[
            &["Nick", "Lvl", "Y"],
            &["A", "1", "+5"],
            &["B", "1", "-5"],
            &["", "1", "-5"],
            &["Total", "-", "-1"],
        ]);
        annotate_outliers(&mut rows, 2);
        let once = rows.clone();
        annotate_outliers(&mut rows, 2);
        assert_eq!(rows, once);
        assert_eq!(names(&rows), vec!["Nick", "A", "☠️ B", "", "Total"]);
    }

    #[test]
    fn rows_are_padded_to_a_common_width() {
        let mut rows = m(&[&["Nick", "Lvl", "Y"], &["A"], &["B", "1"]]);
        pad_rows(&mut rows);
        assert!(rows.iter().all(|r| r.len() == 3));
        assert_eq!(rows[1], vec!["A", "", ""]);
    }

    #[test]
    fn end_to_end_scenario() {
        let raw = m(&[
            &["Nick", "Lvl", "Y", "W", "M"],
            &["A", "10", "+100", "+200", "+300"],
            &["B", "9", "-50", "0", "+10"],
            &["Total", "-", "+50", "+200", "+310"],
        ]);
        let opts = TransformOptions {
            eligibility_column: 2,
            column_removals: Vec::new(),
            ranking_column: 2,
            outlier_column: Some(2),
        };
        let out = transform(raw, &opts);
        assert_eq!(names(&out), vec!["Nick", "🥇 A", "☠️ 🥈 B", "Total"]);
        assert_eq!(out[3], vec!["Total", "-", "+50", "+200", "+310"]);
        assert_eq!(out[1][2], "+100");
    }

    #[test]
    fn transform_is_deterministic() {
        let raw = m(&[
            &["Nick", "Lvl", "Y"],
            &["A", "1", "+3"],
            &["B", "1", "+3"],
            &["C", "1", "-3"],
            &["Total", "-", "+3"],
        ]);
        let opts = TransformOptions {
            eligibility_column: 2,
            column_removals: Vec::new(),
            ranking_column: 2,
            outlier_column: Some(2),
        };
        assert_eq!(transform(raw.clone(), &opts), transform(raw, &opts));
    }

    #[test]
    fn disabled_outlier_column_adds_no_alert_glyph() {
        let raw = m(&[&["Nick", "Lvl", "Y"], &["A", "1", "-3"], &["Total", "-", "-3"]]);
        let opts = TransformOptions {
            eligibility_column: 9,
            column_removals: Vec::new(),
            ranking_column: 2,
            outlier_column: None,
        };
        let out = transform(raw, &opts);
        assert_eq!(names(&out), vec!["Nick", "🥇 A", "Total"]);
    }
}
