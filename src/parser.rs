//! Board-file parsing.
//!
//! A board file is UTF-8 text: a `<rows>x<cols>` header line followed by one
//! card value per line in row-major order. Lines are whitespace-trimmed and
//! trailing blank lines are ignored, so files written with or without a
//! final newline (and with CRLF endings) parse the same way.

use std::path::Path;

use thiserror::Error;

use crate::card;

/// Reasons a board file or template is rejected.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read board file: {0}")]
    Io(#[from] std::io::Error),

    #[error("board file is not valid UTF-8")]
    NotUtf8,

    #[error("board file is empty")]
    Empty,

    #[error("invalid board header {0:?}, expected ROWSxCOLS")]
    BadHeader(String),

    #[error("board dimensions must be positive, got {rows}x{cols}")]
    BadDimensions { rows: usize, cols: usize },

    #[error("expected {expected} card values, got {got}")]
    CardCount { expected: usize, got: usize },

    #[error("invalid card value {value:?} at index {index}")]
    BadCard { index: usize, value: String },
}

/// A validated initial board: dimensions plus one value per cell, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardTemplate {
    rows: usize,
    cols: usize,
    values: Vec<String>,
}

impl BoardTemplate {
    /// Validates dimensions and card values and builds a template.
    pub fn new(rows: usize, cols: usize, values: Vec<String>) -> Result<BoardTemplate, ParseError> {
        let expected = match rows.checked_mul(cols) {
            Some(n) if rows > 0 && cols > 0 => n,
            _ => return Err(ParseError::BadDimensions { rows, cols }),
        };
        if values.len() != expected {
            return Err(ParseError::CardCount {
                expected,
                got: values.len(),
            });
        }
        for (index, value) in values.iter().enumerate() {
            if !card::is_valid_value(value) {
                return Err(ParseError::BadCard {
                    index,
                    value: value.clone(),
                });
            }
        }
        Ok(BoardTemplate { rows, cols, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub(crate) fn into_values(self) -> Vec<String> {
        self.values
    }
}

/// Parses board-file text into a template.
pub fn parse(input: &str) -> Result<BoardTemplate, ParseError> {
    let mut lines: Vec<&str> = input.lines().map(str::trim).collect();
    while lines.last() == Some(&"") {
        lines.pop();
    }
    let Some((header, values)) = lines.split_first() else {
        return Err(ParseError::Empty);
    };
    let (rows, cols) = parse_header(header)?;
    BoardTemplate::new(rows, cols, values.iter().map(|v| v.to_string()).collect())
}

/// Reads and parses a board file.
pub async fn load(path: impl AsRef<Path>) -> Result<BoardTemplate, ParseError> {
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8(bytes).map_err(|_| ParseError::NotUtf8)?;
    parse(&text)
}

fn parse_header(header: &str) -> Result<(usize, usize), ParseError> {
    let bad = || ParseError::BadHeader(header.to_string());
    let (rows, cols) = header.split_once('x').ok_or_else(bad)?;
    let rows = rows.parse().map_err(|_| bad())?;
    let cols = cols.parse().map_err(|_| bad())?;
    Ok((rows, cols))
}
