//! Detection and re-justification of pipe-delimited markdown tables.

use regex::Regex;
use std::sync::LazyLock;

static TABLE_ROW: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\|.*\|.*\|").ok());

/// True when the trimmed text has at least three lines and every line
/// looks like a table row.
pub fn contains_table(text: &str) -> bool {
    let Some(row) = TABLE_ROW.as_ref() else {
        return false;
    };
    let rows: Vec<&str> = text.trim().split('\n').collect();
    rows.len() >= 3 && rows.iter().all(|line| row.is_match(line))
}

/// Re-render a table with every column centered to a common width.
///
/// Rows are expected to have the same number of non-empty cells, which
/// holds for text accepted by [`contains_table`]. Extra cells in a longer
/// row are sized against their own column.
pub fn justify(text: &str) -> String {
    let table: Vec<Vec<&str>> = text
        .trim()
        .split('\n')
        .map(|row| {
            row.trim_matches('|')
                .split('|')
                .map(str::trim)
                .filter(|cell| !cell.is_empty())
                .collect()
        })
        .collect();

    let columns = table.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|col| {
            table
                .iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    table
        .iter()
        .map(|row| {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(col, cell)| center(cell, widths[col] + 1))
                .collect();
            format!("| {} |", cells.join(" | "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Center `text` in `width` columns; odd padding leans right unless the
/// width is odd.
fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let margin = width - len;
    let left = margin / 2 + (margin & width & 1);
    let right = margin - left;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}
