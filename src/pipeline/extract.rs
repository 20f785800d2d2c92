//! Table extraction: markup + selector → text matrix.
//!
//! Extraction is deliberately dumb. It mirrors source order exactly, trims
//! each cell's text, drops rows that have no cells, and never interprets a
//! value. Every decision about what a column *means* happens later in
//! [`crate::pipeline::transform`].

use crate::error::BoardError;
use crate::table::{Matrix, Row};
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// Capability: given markup and a table selector, return rows of cell text.
pub trait TableReader: Send + Sync {
    fn read_rows(&self, markup: &str, table_selector: &str) -> Result<Matrix, BoardError>;
}

/// [`TableReader`] backed by the `scraper` HTML parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlTableReader;

impl TableReader for HtmlTableReader {
    fn read_rows(&self, markup: &str, table_selector: &str) -> Result<Matrix, BoardError> {
        let table_selector = parse_selector(table_selector)?;
        let row_selector = parse_selector("tr")?;
        let cell_selector = parse_selector("th, td")?;

        let document = Html::parse_document(markup);
        // A selector list may match nested tables; each row is read once.
        let mut seen = HashSet::new();
        let rows: Matrix = document
            .select(&table_selector)
            .flat_map(|table| table.select(&row_selector))
            .filter(|tr| seen.insert(tr.id()))
            .map(|tr| {
                tr.select(&cell_selector)
                    .map(|cell| cell.text().collect::<String>().trim().to_string())
                    .collect::<Row>()
            })
            .filter(|row| !row.is_empty())
            .collect();

        Ok(rows)
    }
}

/// Extract the table matched by `table_selector`.
///
/// Fails with [`BoardError::Extraction`] when zero rows are found. On this
/// upstream that almost always means a block page or a layout change.
pub fn extract(
    reader: &dyn TableReader,
    markup: &str,
    table_selector: &str,
) -> Result<Matrix, BoardError> {
    let rows = reader.read_rows(markup, table_selector)?;

    if rows.is_empty() {
        debug!(
            "No rows for '{}'; selector id present in markup: {}",
            table_selector,
            markup.contains(table_selector.trim_start_matches('#'))
        );
        return Err(BoardError::Extraction {
            selector: table_selector.to_string(),
        });
    }

    debug!(
        "Extracted {} rows, header width {}",
        rows.len(),
        rows[0].len()
    );
    Ok(rows)
}

fn parse_selector(selector: &str) -> Result<Selector, BoardError> {
    Selector::parse(selector)
        .map_err(|e| BoardError::InvalidConfig(format!("selector '{selector}' does not parse: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <table id="other"><tr><td>ignore me</td></tr></table>
          <table id="myTable2">
            <thead><tr><th> Nick </th><th>Lvl</th><th>Exp</th></tr></thead>
            <tbody>
              <tr><td><a href="/p/a">Alice</a></td><td>10</td><td>+1,200</td></tr>
              <tr></tr>
              <tr><td>Bob &amp; Co</td><td>9</td><td>-50</td></tr>
              <tr><td>Total</td><td>-</td><td>+1,150</td></tr>
            </tbody>
          </table>
        </body></html>"#;

    #[test]
    fn reads_rows_in_document_order() {
        let rows = extract(&HtmlTableReader, PAGE, "#myTable2").unwrap();
        assert_eq!(rows.len(), 4, "empty <tr> is dropped");
        assert_eq!(rows[0], vec!["Nick", "Lvl", "Exp"]);
        assert_eq!(rows[1], vec!["Alice", "10", "+1,200"]);
        assert_eq!(rows[2][0], "Bob & Co");
        assert_eq!(rows[3][0], "Total");
    }

    #[test]
    fn missing_table_is_extraction_error() {
        let err = extract(&HtmlTableReader, "<html><p>Just a moment...</p></html>", "#myTable2")
            .unwrap_err();
        match err {
            BoardError::Extraction { selector } => assert_eq!(selector, "#myTable2"),
            other => panic!("expected extraction error, got {other:?}"),
        }
    }

    #[test]
    fn mixed_header_and_data_cells_keep_order() {
        let html = r#"<table id="t"><tr><th>A</th><td>1</td><th>B</th></tr></table>"#;
        let rows = extract(&HtmlTableReader, html, "#t").unwrap();
        assert_eq!(rows, vec![vec!["A", "1", "B"]]);
    }

    #[test]
    fn bad_selector_is_config_error() {
        let err = HtmlTableReader.read_rows(PAGE, "#[").unwrap_err();
        assert!(matches!(err, BoardError::InvalidConfig(_)));
    }

    #[test]
    fn selector_list_reads_rows_of_each_table() {
        let html = r#"
            <table id="a"><tr><td>a1</td></tr><tr><td>a2</td></tr></table>
            <table id="b"><tr><td>b1</td></tr></table>
            <table id="c"><tr><td>c1</td></tr></table>"#;
        let rows = extract(&HtmlTableReader, html, "#a, #b").unwrap();
        assert_eq!(rows, vec![vec!["a1"], vec!["a2"], vec!["b1"]]);
    }

    #[test]
    fn rows_matched_through_two_tables_are_read_once() {
        let html = r#"<table class="board"><tr><td>
              <table class="board"><tr><td>inner</td></tr></table>
            </td></tr></table>"#;
        let rows = extract(&HtmlTableReader, html, ".board").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["inner"]);
    }
}
