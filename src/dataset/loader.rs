//! Delimited-text loading

use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

use polars::prelude::*;
use tracing::{debug, warn};

use super::{Column, Dataset, Value};
use crate::error::{AutoMlError, Result};
use crate::thresholds::WIDE_DATASET_COLUMNS;

const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// A parsed dataset plus the structural warnings raised while loading it
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub warnings: Vec<String>,
}

/// Loader for delimited tabular text with a header row
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    max_bytes: usize,
    delimiter: Option<u8>,
}

impl DatasetLoader {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            delimiter: None,
        }
    }

    /// Force a delimiter instead of sniffing it from the header line
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Load a file, checking its size before reading it
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadedDataset> {
        let size = std::fs::metadata(path.as_ref())?.len() as usize;
        self.check_size(size)?;
        let bytes = std::fs::read(path.as_ref())?;
        self.load_bytes(&bytes)
    }

    /// Parse raw bytes into a dataset. Every cell is read as text; typing happens later.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<LoadedDataset> {
        let start = Instant::now();
        self.check_size(bytes.len())?;

        let text = std::str::from_utf8(bytes)
            .map_err(|e| AutoMlError::InvalidFormat(format!("not UTF-8 text: {e}")))?;
        let header_line = text
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| AutoMlError::InvalidFormat("no header row".to_string()))?;
        let delimiter = self.delimiter.unwrap_or_else(|| sniff_delimiter(header_line));

        // The header is read as an ordinary row so names can be validated here
        // instead of being silently renamed by the CSV reader.
        let parse_opts = CsvParseOptions::default().with_separator(delimiter);
        let df = CsvReadOptions::default()
            .with_has_header(false)
            .with_infer_schema_length(Some(0))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()?;

        let mut raw_columns = Vec::with_capacity(df.width());
        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let values: Vec<Option<String>> = series
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect();
            raw_columns.push(values);
        }

        if raw_columns.is_empty() || df.height() == 0 {
            return Err(AutoMlError::InvalidFormat("no header row".to_string()));
        }

        let headers: Vec<Option<String>> = raw_columns.iter().map(|c| c[0].clone()).collect();
        let (names, mut warnings) = validate_structure(&headers)?;

        let columns: Vec<Column> = names
            .into_iter()
            .zip(raw_columns)
            .map(|(name, raw)| {
                let values = raw
                    .iter()
                    .skip(1)
                    .map(|cell| cell.as_deref().map(Value::from_raw).unwrap_or(Value::Null))
                    .collect();
                Column::new(name, values)
            })
            .collect();

        let dataset = Dataset::new(columns)?;
        if dataset.n_cols() > WIDE_DATASET_COLUMNS {
            warnings.push(format!(
                "Dataset has {} columns; analysis may be slow",
                dataset.n_cols()
            ));
        }
        for warning in &warnings {
            warn!(warning = %warning, "Dataset structure warning");
        }
        debug!(
            rows = dataset.n_rows(),
            columns = dataset.n_cols(),
            delimiter = %(delimiter as char),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Parsed delimited text"
        );

        Ok(LoadedDataset { dataset, warnings })
    }

    fn check_size(&self, size: usize) -> Result<()> {
        if size > self.max_bytes {
            return Err(AutoMlError::FileTooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        if size == 0 {
            return Err(AutoMlError::InvalidFormat("file is empty".to_string()));
        }
        Ok(())
    }
}

/// Pick the candidate delimiter that occurs most often in the header line
fn sniff_delimiter(header: &str) -> u8 {
    CANDIDATE_DELIMITERS
        .iter()
        .copied()
        .max_by_key(|d| {
            let count = header.bytes().filter(|b| b == d).count();
            // Prefer the comma on ties
            (count, *d == b',')
        })
        .unwrap_or(b',')
}

/// Check header names: blanks get a positional name, duplicates are rejected
fn validate_structure(headers: &[Option<String>]) -> Result<(Vec<String>, Vec<String>)> {
    let mut warnings = Vec::new();
    let mut names = Vec::with_capacity(headers.len());
    for (i, header) in headers.iter().enumerate() {
        let trimmed = header.as_deref().map(str::trim).unwrap_or("");
        if trimmed.is_empty() {
            let generated = format!("column_{i}");
            warnings.push(format!("Column {i} has no name; using '{generated}'"));
            names.push(generated);
        } else {
            names.push(trimmed.to_string());
        }
    }

    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort();
    let duplicates: Vec<&str> = sorted
        .windows(2)
        .filter(|w| w[0] == w[1])
        .map(|w| w[0].as_str())
        .collect();
    if !duplicates.is_empty() {
        let mut duplicates = duplicates;
        duplicates.dedup();
        return Err(AutoMlError::InvalidFormat(format!(
            "duplicate column names: {}",
            duplicates.join(", ")
        )));
    }
    Ok((names, warnings))
}
