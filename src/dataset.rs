//! In-memory dataset: one header plus rows kept aligned to it.
//!
//! The whole file is loaded at once. Rows that are shorter than the header
//! are padded with empty cells and longer rows are truncated, so every row
//! always has exactly one cell per header column.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;
use log::warn;

use crate::{error::TransformError, io_utils};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    crlf: bool,
}

/// Borrowed view of a single row, addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    headers: &'a [String],
    values: &'a [String],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }

    pub fn values(&self) -> &'a [String] {
        self.values
    }
}

impl Dataset {
    /// Builds a dataset from a header and raw rows, evening out ragged rows.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TransformError> {
        if headers.is_empty() {
            return Err(TransformError::EmptyHeader);
        }
        let width = headers.len();
        let mut adjusted = 0usize;
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() != width {
                    adjusted += 1;
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        if adjusted > 0 {
            warn!("Adjusted {adjusted} row(s) whose cell count differed from the {width}-column header");
        }
        Ok(Self {
            headers,
            rows,
            crlf: false,
        })
    }

    pub fn parse(text: &str, delimiter: u8) -> Result<Self> {
        let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter);
        let mut records = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|err| {
                let context = record_context(idx, err.position());
                anyhow::Error::new(err).context(context)
            })?;
            records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }
        let mut records = records.into_iter();
        let headers = records.next().unwrap_or_default();
        let mut dataset = Self::from_rows(headers, records.collect())?;
        dataset.crlf = uses_crlf(text);
        Ok(dataset)
    }

    pub fn load(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let bytes = io_utils::read_input(path)?;
        let text = io_utils::decode_text(&bytes, encoding)
            .with_context(|| format!("Decoding {path:?}"))?;
        Self::parse(&text, delimiter).with_context(|| format!("Parsing {path:?}"))
    }

    pub fn to_text(&self, delimiter: u8) -> Result<String> {
        let mut writer = io_utils::open_csv_writer(Vec::new(), delimiter, self.crlf);
        writer
            .write_record(&self.headers)
            .context("Writing header")?;
        for (idx, row) in self.rows.iter().enumerate() {
            writer
                .write_record(row)
                .with_context(|| format!("Writing row {}", idx + 2))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| anyhow!("Flushing CSV buffer: {}", err.error()))?;
        String::from_utf8(bytes).context("Serialized CSV is not valid UTF-8")
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            headers: &self.headers,
            values,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, TransformError> {
        self.column_index(name)
            .ok_or_else(|| TransformError::MissingColumn(name.to_string()))
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Overwrites a cell and reports whether its content changed.
    pub fn set_cell(&mut self, row: usize, column: usize, value: &str) -> bool {
        match self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            Some(cell) if cell != value => {
                value.clone_into(cell);
                true
            }
            _ => false,
        }
    }

    /// Row indices whose key cell equals `key` once both are trimmed.
    pub fn rows_with_key(&self, key_column: usize, key: &str) -> Vec<usize> {
        let key = key.trim();
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get(key_column).map(|v| v.trim()) == Some(key))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn insert_column(&mut self, at: usize, name: &str, fill: &str) {
        let at = at.min(self.headers.len());
        self.headers.insert(at, name.to_string());
        for row in &mut self.rows {
            row.insert(at, fill.to_string());
        }
    }

    pub fn remove_column(&mut self, at: usize) -> Option<String> {
        if at >= self.headers.len() {
            return None;
        }
        for row in &mut self.rows {
            row.remove(at);
        }
        Some(self.headers.remove(at))
    }
}

/// Records can span several lines, so the line is only reported when the
/// reader knows where the record started.
fn record_context(index: usize, position: Option<&csv::Position>) -> String {
    match position {
        Some(position) => format!("Reading record {} (line {})", index + 1, position.line()),
        None => format!("Reading record {}", index + 1),
    }
}

fn uses_crlf(text: &str) -> bool {
    text.find('\n')
        .is_some_and(|idx| idx > 0 && text.as_bytes()[idx - 1] == b'\r')
}
