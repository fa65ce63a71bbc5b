use std::collections::HashMap;

use crate::table::{Cell, Column};

/// Relative frequency of every distinct non-missing value in a column.
///
/// Entries are ordered by descending count, then by label. Frequencies sum to
/// one whenever the column has at least one non-missing value; an all-missing
/// column produces an empty histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueHistogram {
    entries: Vec<(String, f64)>,
    observations: usize,
}

impl ValueHistogram {
    pub fn from_column(column: &Column) -> Self {
        Self::from_cells(&column.cells)
    }

    pub fn from_cells<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut observations = 0usize;
        for label in cells.into_iter().filter_map(Cell::label) {
            *counts.entry(label).or_insert(0) += 1;
            observations += 1;
        }

        let mut items = counts.into_iter().collect::<Vec<_>>();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let entries = items
            .into_iter()
            .map(|(label, count)| (label, count as f64 / observations as f64))
            .collect();
        Self {
            entries,
            observations,
        }
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    /// The frequency values alone, which is all the distance metric looks at.
    pub fn frequencies(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, freq)| *freq).collect()
    }

    pub fn frequency(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == label)
            .map(|(_, freq)| *freq)
    }

    /// Number of non-missing cells the histogram was built from.
    pub fn observations(&self) -> usize {
        self.observations
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
