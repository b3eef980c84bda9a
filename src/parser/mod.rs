//! Parser for the legacy catalog export dialect.
//!
//! The predecessor tool wrote plain comma-separated text, but with two
//! quirks this module has to absorb: re-inserted header rows scattered
//! through the data, and two different multi-value conventions inside a
//! single cell (`:` between credited names, `×` or a space-delimited `x`
//! between collaborating circles).

use crate::constants::REQUIRED_COLUMNS;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One parsed data row of the legacy export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyRecord {
    pub circle: String,
    pub album: String,
    pub title: String,
    pub track_number: i32,
    pub event: String,
    pub vocalists: Vec<String>,
    pub arrangers: Vec<String>,
    pub lyricists: Vec<String>,
    pub original_songs: Vec<String>,
}

/// A row that failed validation. `row` is 1-based with the header as row 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseError {
    pub row: usize,
    pub message: String,
}

/// Outcome of a parse run. `success` is true iff `errors` is empty; a
/// structural failure leaves `records` empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub success: bool,
    pub records: Vec<LegacyRecord>,
    pub errors: Vec<ParseError>,
}

impl ParseOutcome {
    fn structural_failure(message: String) -> Self {
        Self {
            success: false,
            records: Vec::new(),
            errors: vec![ParseError { row: 1, message }],
        }
    }
}

/// Parse legacy CSV text into records, isolating per-row failures.
pub fn parse(text: &str) -> ParseOutcome {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    if lines.len() < 2 {
        return ParseOutcome::structural_failure(
            "CSV must contain a header row and at least one data row".to_string(),
        );
    }

    let header = split_csv_line(lines[0].1);
    let mut columns: HashMap<&str, usize> = HashMap::new();
    for (idx, name) in header.iter().enumerate() {
        columns.entry(name.as_str()).or_insert(idx);
    }
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !columns.contains_key(**col))
        .copied()
        .collect();
    if !missing.is_empty() {
        return ParseOutcome::structural_failure(format!(
            "missing required columns: {}",
            missing.join(", ")
        ));
    }

    let column = |fields: &[String], name: &str| -> String {
        columns
            .get(name)
            .and_then(|idx| fields.get(*idx))
            .cloned()
            .unwrap_or_default()
    };

    let mut records = Vec::new();
    let mut errors = Vec::new();

    for (row, line) in lines.iter().skip(1) {
        let fields = split_csv_line(line);

        // The legacy tool re-emitted its header when appending batches;
        // such lines are an artifact, not data.
        if fields.first().map(String::as_str) == Some("circle")
            && fields.iter().any(|f| f == "track_number")
        {
            debug!(row, "skipping re-inserted header row");
            continue;
        }

        let raw_number = column(&fields, "track_number");
        let track_number = match raw_number.trim().parse::<i32>() {
            Ok(n) => n,
            Err(_) => {
                errors.push(ParseError {
                    row: *row,
                    message: format!("invalid track_number: '{}'", raw_number),
                });
                continue;
            }
        };

        records.push(LegacyRecord {
            circle: column(&fields, "circle").trim().to_string(),
            album: column(&fields, "album").trim().to_string(),
            title: column(&fields, "title").trim().to_string(),
            track_number,
            event: column(&fields, "event").trim().to_string(),
            vocalists: split_multi(&column(&fields, "vocalists")),
            arrangers: split_multi(&column(&fields, "arrangers")),
            lyricists: split_multi(&column(&fields, "lyricists")),
            original_songs: split_multi(&column(&fields, "original_songs")),
        });
    }

    ParseOutcome {
        success: errors.is_empty(),
        records,
        errors,
    }
}

/// Split one comma-delimited line honoring double-quoted fields; a doubled
/// quote inside a quoted field is a literal quote character.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Split a `:`-delimited multi-value cell, dropping empty segments. An
/// empty or whitespace-only cell yields an empty list.
pub fn split_multi(cell: &str) -> Vec<String> {
    cell.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a circle cell into collaborating circle names. Collaborations are
/// written with a fullwidth `×`, or an ASCII `x` only when surrounded by
/// spaces so names that merely contain the letter are left intact.
pub fn split_circles(cell: &str) -> Vec<String> {
    cell.split('×')
        .flat_map(|part| part.split(" x "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
