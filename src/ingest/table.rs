/// Minimal CSV materialization.
///
/// Raw exports are read into a header row plus string cells. Typed
/// conversion happens in the loaders (`wide`, `records`) so that each one
/// can report which source and column failed.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::DefmonError;

/// A materialized CSV table: header names plus raw string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Name used in error messages, usually the file name.
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Builds a table from already-split cells. Used by tests and by callers
    /// that materialize tables without going through CSV text.
    pub fn from_rows(source: &str, headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Table {
            source: source.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    /// Parses CSV text. The first non-empty line is the header.
    ///
    /// Blank lines between data rows are kept as rows of missing cells, so
    /// row ordinals stay meaningful; trailing blank lines are dropped. Rows
    /// shorter than the header are padded with empty (missing) cells; rows
    /// longer than the header are rejected.
    pub fn parse_csv(source: &str, text: &str) -> Result<Self, DefmonError> {
        let lines: Vec<&str> = text.lines().collect();
        let is_blank = |line: &&str| line.trim().is_empty();

        let header_at = lines
            .iter()
            .position(|l| !is_blank(l))
            .ok_or_else(|| DefmonError::malformed(source, "file is empty"))?;
        let last_at = lines.iter().rposition(|l| !is_blank(l)).unwrap_or(header_at);
        let headers: Vec<String> = split_line(lines[header_at].trim_start_matches('\u{feff}'));

        let mut rows = Vec::with_capacity(last_at - header_at);
        for (line_no, line) in lines.iter().enumerate().take(last_at + 1).skip(header_at + 1) {
            if is_blank(line) {
                rows.push(vec![String::new(); headers.len()]);
                continue;
            }
            let mut cells = split_line(line);
            if cells.len() > headers.len() {
                return Err(DefmonError::malformed(
                    source,
                    format!(
                        "line {} has {} cells but the header has {}",
                        line_no + 1,
                        cells.len(),
                        headers.len()
                    ),
                ));
            }
            cells.resize(headers.len(), String::new());
            rows.push(cells);
        }

        Ok(Table {
            source: source.to_string(),
            headers,
            rows,
        })
    }

    /// Reads and parses a CSV file from disk.
    pub fn read_csv_file(path: &Path) -> Result<Self, DefmonError> {
        let text = std::fs::read_to_string(path).map_err(|e| DefmonError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse_csv(&source, &text)
    }

    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of a required column, or `MalformedInput` naming the column.
    pub fn column_index(&self, name: &str) -> Result<usize, DefmonError> {
        self.find_column(name).ok_or_else(|| {
            DefmonError::malformed(&self.source, format!("missing column '{}'", name))
        })
    }

    /// Cell text, or `None` when the cell holds a missing-value marker.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|c| c.trim())
            .filter(|c| !is_missing(c))
    }
}

/// Splits one CSV line, honouring double-quoted fields.
fn split_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    cells.push(current.trim().trim_end_matches('\r').to_string());
    cells
}

// ---------------------------------------------------------------------------
// Cell conversions
// ---------------------------------------------------------------------------

/// Markers treated as a missing value.
pub fn is_missing(cell: &str) -> bool {
    matches!(cell.trim(), "" | "NaN" | "nan" | "NA" | "null" | "None")
}

/// Parses a numeric cell. Missing markers yield `Ok(None)`.
pub fn parse_number(source: &str, column: &str, cell: &str) -> Result<Option<f64>, DefmonError> {
    if is_missing(cell) {
        return Ok(None);
    }
    cell.trim().parse::<f64>().map(Some).map_err(|_| {
        DefmonError::malformed(
            source,
            format!("column '{}' holds non-numeric value '{}'", column, cell),
        )
    })
}

/// Parses a date cell at day granularity; any time of day is dropped.
pub fn parse_date(source: &str, cell: &str) -> Result<NaiveDate, DefmonError> {
    let s = cell.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Ok(d);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    Err(DefmonError::malformed(
        source,
        format!("unparseable date '{}'", cell),
    ))
}

/// Parses an anomaly flag: `1/0`, `1.0/0.0` or `true/false` in any case.
pub fn parse_flag(source: &str, column: &str, cell: &str) -> Result<bool, DefmonError> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Ok(true),
        "0" | "0.0" | "false" | "" => Ok(false),
        other => Err(DefmonError::malformed(
            source,
            format!("column '{}' holds non-boolean value '{}'", column, other),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
