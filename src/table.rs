//! In-memory tabular model shared by the loaders and the matching engine.
//!
//! A [`Table`] is an ordered list of uniquely named [`Column`]s whose cells are
//! positionally aligned: row `i` of one column belongs with row `i` of every
//! other column. Tables are built once by a loader and treated as read-only
//! afterwards.

use std::{collections::HashSet, fmt};

/// Cell texts treated as missing. A cell must equal one of them exactly.
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Classifies a raw textual cell the way both loaders do.
    pub fn parse(raw: &str) -> Self {
        if MISSING_TOKENS.contains(&raw) {
            return Cell::Missing;
        }
        match raw.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => Cell::Number(number),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Canonical label used to group equal values, `None` for missing cells.
    pub fn label(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Number(value) => Some(format_number(*value)),
            Cell::Text(text) => Some(text.clone()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => f.write_str(&label),
            None => Ok(()),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    source: String,
    columns: Vec<Column>,
}

impl Table {
    /// Builds a table from raw header names and column-major cells.
    ///
    /// Blank headers become `Unnamed: <index>` and repeated headers receive
    /// `.1`, `.2`, ... suffixes so that every column name is unique. Columns
    /// shorter than the longest one are padded with missing cells.
    pub fn from_columns(source: impl Into<String>, headers: Vec<String>, data: Vec<Vec<Cell>>) -> Self {
        let names = unique_names(headers);
        let row_count = data.iter().map(Vec::len).max().unwrap_or(0);
        let mut data = data.into_iter();
        let columns = names
            .into_iter()
            .map(|name| {
                let mut cells = data.next().unwrap_or_default();
                cells.resize(row_count, Cell::Missing);
                Column { name, cells }
            })
            .collect();
        Self {
            source: source.into(),
            columns,
        }
    }

    /// Builds a table from a header row and row-major records.
    pub fn from_rows(source: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut data = vec![Vec::with_capacity(rows.len()); headers.len()];
        for row in rows {
            let mut row = row.into_iter();
            for column in data.iter_mut() {
                column.push(row.next().unwrap_or(Cell::Missing));
            }
        }
        Self::from_columns(source, headers, data)
    }

    /// Identifier of the file (or other origin) this table was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.cells.len()).unwrap_or(0)
    }

    /// Returns row `index` as a vector of cell references in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Cell>> {
        if index >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.cells[index]).collect())
    }

    /// Replaces the column called `column.name`, or appends it at the end.
    pub(crate) fn upsert_column(&mut self, column: Column) {
        match self.column_index(&column.name) {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
    }
}

fn unique_names(headers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(headers.len());
    for (idx, header) in headers.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {idx}")
        } else {
            header
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while !seen.insert(name.clone()) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        names.push(name);
    }
    names
}
