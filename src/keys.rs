//! Key-column housekeeping around a merge: finding files that lack the key
//! column, and back-filling a key column into a file from another file that
//! shares an identifier column with it.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

use crate::{
    io_utils,
    loader::TableLoader,
    table::{Cell, Column, Table},
};

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Target identifier column '{column}' does not exist in {table}")]
    TargetColumnNotFound { column: String, table: String },

    #[error("Source column '{column}' does not exist in {table}")]
    SourceColumnNotFound { column: String, table: String },
}

#[derive(Debug, Serialize)]
pub struct KeyCoverage {
    /// Files that loaded but have no column with the key's name.
    pub missing: Vec<String>,
    /// Files that could not be loaded, with the reason.
    pub errors: Vec<(String, String)>,
}

impl KeyCoverage {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.errors.is_empty()
    }
}

/// Checks every file for a column named `key_column`.
///
/// Unlike matching, this check is advisory: unreadable files are collected in
/// [`KeyCoverage::errors`] and the remaining files are still examined.
pub fn verify_key_column<L, S>(files: &[S], loader: &L, key_column: &str) -> KeyCoverage
where
    L: TableLoader + ?Sized,
    S: AsRef<str>,
{
    let mut missing = Vec::new();
    let mut errors = Vec::new();
    for file in files.iter().map(AsRef::as_ref) {
        match loader.load_table(file) {
            Ok(table) if table.has_column(key_column) => {
                debug!("{file} has key column '{key_column}'");
            }
            Ok(_) => missing.push(file.to_string()),
            Err(err) => {
                warn!("Error loading {file}: {err}");
                errors.push((file.to_string(), err.to_string()));
            }
        }
    }
    KeyCoverage { missing, errors }
}

/// Returns a copy of `target` with a `key_column` filled in from `source`.
///
/// Source rows with a missing key are ignored; when several source rows share
/// an identifier, the last one wins. Target rows whose identifier has no
/// counterpart get a missing key. An existing `key_column` on the target is
/// replaced in place; otherwise the column is appended.
pub fn add_key_by_matching(
    target: &Table,
    source: &Table,
    target_id_column: &str,
    source_id_column: &str,
    key_column: &str,
) -> Result<Table, KeyError> {
    let target_ids = target
        .column(target_id_column)
        .ok_or_else(|| KeyError::TargetColumnNotFound {
            column: target_id_column.to_string(),
            table: target.source().to_string(),
        })?;
    let source_column = |name: &str| {
        source.column(name).ok_or_else(|| KeyError::SourceColumnNotFound {
            column: name.to_string(),
            table: source.source().to_string(),
        })
    };
    let source_keys = source_column(key_column)?;
    let source_ids = source_column(source_id_column)?;

    let mut mapping: HashMap<String, &Cell> = HashMap::new();
    for (id, key) in source_ids.cells.iter().zip(&source_keys.cells) {
        if key.is_missing() {
            continue;
        }
        if let Some(label) = id.label() {
            mapping.insert(label, key);
        }
    }

    let cells = target_ids
        .cells
        .iter()
        .map(|id| {
            id.label()
                .and_then(|label| mapping.get(&label))
                .map(|cell| (*cell).clone())
                .unwrap_or(Cell::Missing)
        })
        .collect::<Vec<_>>();
    let matched = cells.iter().filter(|cell| !cell.is_missing()).count();
    debug!(
        "Mapped '{key_column}' onto {matched} of {} row(s) via '{target_id_column}'",
        cells.len()
    );

    let mut updated = target.clone();
    updated.upsert_column(Column::new(key_column, cells));
    Ok(updated)
}

/// Writes `table` as CSV to `path`, or stdout for `None`/`-`.
pub fn write_csv(table: &Table, path: Option<&Path>) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER)?;
    writer
        .write_record(table.column_names())
        .context("Writing output headers")?;
    for row_idx in 0..table.row_count() {
        let row = table.row(row_idx).unwrap_or_default();
        writer
            .write_record(row.iter().map(|cell| cell.to_string()))
            .with_context(|| format!("Writing row {}", row_idx + 2))?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}
