use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, UTF_8};
use log::debug;
use thiserror::Error;

use crate::{
    io_utils,
    table::{Cell, Table},
    xlsx,
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported file format '{extension}' for {path:?} (expected .csv or .xlsx)")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Failed to load {path:?}: {message}")]
    LoadFailure { path: PathBuf, message: String },
}

impl LoadError {
    fn failure(path: &Path, message: impl Into<String>) -> Self {
        LoadError::LoadFailure {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl TableFormat {
    /// Determines the format from the path extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if extension.eq_ignore_ascii_case("csv") {
            Ok(TableFormat::Csv)
        } else if extension.eq_ignore_ascii_case("xlsx") {
            Ok(TableFormat::Xlsx)
        } else {
            Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            })
        }
    }

    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }
}

/// Reading options that only apply to delimited text input.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
        }
    }
}

/// Loads a whole table from `path`. Nothing is returned on a partial read.
pub fn load(path: &Path, options: &LoadOptions) -> Result<Table, LoadError> {
    let format = TableFormat::from_path(path)?;
    debug!("Loading {path:?} as {format:?}");
    let table = match format {
        TableFormat::Csv => load_csv(path, options)?,
        TableFormat::Xlsx => {
            let (headers, rows) =
                xlsx::read_first_sheet(path).map_err(|err| LoadError::failure(path, err.to_string()))?;
            Table::from_rows(path.display().to_string(), headers, rows)
        }
    };
    debug!(
        "Loaded {} column(s) and {} row(s) from {path:?}",
        table.column_count(),
        table.row_count()
    );
    Ok(table)
}

fn load_csv(path: &Path, options: &LoadOptions) -> Result<Table, LoadError> {
    let mut reader = io_utils::open_csv_reader_from_path(path, options.delimiter)
        .map_err(|err| LoadError::failure(path, err.to_string()))?;
    let header_record = reader
        .byte_headers()
        .map_err(|err| LoadError::failure(path, err.to_string()))?
        .clone();
    if header_record.is_empty() {
        return Err(LoadError::failure(path, "No columns to parse from file"));
    }
    let headers = io_utils::decode_record(&header_record, options.encoding)
        .map_err(|message| LoadError::failure(path, message))?;

    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record =
            record.map_err(|err| LoadError::failure(path, format!("Row {}: {err}", row_idx + 2)))?;
        let decoded = io_utils::decode_record(&record, options.encoding)
            .map_err(|message| LoadError::failure(path, format!("Row {}: {message}", row_idx + 2)))?;
        rows.push(decoded.iter().map(|raw| Cell::parse(raw)).collect());
    }
    Ok(Table::from_rows(path.display().to_string(), headers, rows))
}

/// Resolves file identifiers into tables on behalf of the matching engine.
pub trait TableLoader {
    fn load_table(&self, file_id: &str) -> Result<Table, LoadError>;
}

/// Loads identifiers as file paths, optionally relative to a base directory.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    base_dir: Option<PathBuf>,
    options: LoadOptions,
}

impl FileLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            base_dir: None,
            options,
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn resolve(&self, file_id: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(file_id),
            None => PathBuf::from(file_id),
        }
    }
}

impl TableLoader for FileLoader {
    fn load_table(&self, file_id: &str) -> Result<Table, LoadError> {
        load(&self.resolve(file_id), &self.options)
    }
}
