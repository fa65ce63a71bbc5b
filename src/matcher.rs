//! Column similarity engine.
//!
//! Matching runs in two phases. Phase one loads each candidate file in input
//! order, scores a bounded window of its columns against the reference key
//! column and keeps the best one. Phase two averages the best scores of the
//! whole batch and flags every file whose best score falls below
//! `low_similarity_ratio * average`. Flagging is relative to the batch, so it
//! can only run once every file has been scored.

use std::collections::BTreeSet;

use itertools::Itertools;
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::{
    histogram::ValueHistogram,
    loader::{LoadError, TableLoader},
    similarity,
    table::Table,
};

pub const DEFAULT_HEAD_COLUMNS: usize = 20;
pub const DEFAULT_TAIL_COLUMNS: usize = 5;
pub const DEFAULT_LOW_SIMILARITY_RATIO: f64 = 0.8;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Key column '{column}' not found in {table}")]
    KeyColumnNotFound { column: String, table: String },

    #[error("Unsupported file format '{extension}' for {file}")]
    UnsupportedFormat { file: String, extension: String },

    #[error("Failed to load data from {file}")]
    DataLoadFailure {
        file: String,
        #[source]
        source: LoadError,
    },
}

impl MatchError {
    fn from_load(file: &str, error: LoadError) -> Self {
        match error {
            LoadError::UnsupportedFormat { extension, .. } => MatchError::UnsupportedFormat {
                file: file.to_string(),
                extension,
            },
            other => MatchError::DataLoadFailure {
                file: file.to_string(),
                source: other,
            },
        }
    }

    /// Identifier of the candidate file the error refers to, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            MatchError::KeyColumnNotFound { .. } => None,
            MatchError::UnsupportedFormat { file, .. } | MatchError::DataLoadFailure { file, .. } => {
                Some(file)
            }
        }
    }
}

/// What to do when a candidate file cannot be loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail the whole batch on the first unreadable file.
    #[default]
    Abort,
    /// Record the failure, leave the file out of the results and continue.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub head_columns: usize,
    pub tail_columns: usize,
    pub low_similarity_ratio: f64,
    pub failure_policy: FailurePolicy,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            head_columns: DEFAULT_HEAD_COLUMNS,
            tail_columns: DEFAULT_TAIL_COLUMNS,
            low_similarity_ratio: DEFAULT_LOW_SIMILARITY_RATIO,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnScore {
    pub column: String,
    /// `None` when the column has no non-missing values to compare.
    pub score: Option<f64>,
}

/// Scoring outcome for one candidate file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub file: String,
    pub considered: Vec<ColumnScore>,
    pub best_column: Option<String>,
    /// Zero when no column could be scored.
    pub best_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub candidates: Vec<MatchCandidate>,
    pub low_similarity: BTreeSet<String>,
    pub average_similarity: Option<f64>,
    pub failures: Vec<FileFailure>,
}

impl MatchReport {
    /// `(file, best column)` pairs in input order.
    pub fn matches(&self) -> Vec<(&str, Option<&str>)> {
        self.candidates
            .iter()
            .map(|c| (c.file.as_str(), c.best_column.as_deref()))
            .collect()
    }

    pub fn is_low_similarity(&self, file: &str) -> bool {
        self.low_similarity.contains(file)
    }
}

/// Column positions examined for a table with `column_count` columns.
///
/// The first `head` and the last `tail` columns, in file order and without
/// repeats; narrow tables are examined entirely.
pub fn candidate_window(column_count: usize, head: usize, tail: usize) -> Vec<usize> {
    (0..head.min(column_count))
        .chain(column_count.saturating_sub(tail)..column_count)
        .unique()
        .collect()
}

/// Scores the windowed columns of `table` against `reference`.
///
/// The first column reaching the highest score wins; later ties do not
/// replace it.
pub fn score_table(
    file: &str,
    table: &Table,
    reference: &ValueHistogram,
    options: &MatchOptions,
) -> MatchCandidate {
    let columns = table.columns();
    let mut considered = Vec::new();
    let mut best: Option<(usize, f64)> = None;

    for idx in candidate_window(columns.len(), options.head_columns, options.tail_columns) {
        let column = &columns[idx];
        let histogram = ValueHistogram::from_column(column);
        let score = similarity::similarity(reference, &histogram);
        debug!("{file}: column '{}' scored {score:?}", column.name);
        if let Some(score) = score
            && best.is_none_or(|(_, top)| score > top)
        {
            best = Some((considered.len(), score));
        }
        considered.push(ColumnScore {
            column: column.name.clone(),
            score,
        });
    }

    let (best_column, best_score) = match best {
        Some((pos, score)) => (Some(considered[pos].column.clone()), score),
        None => (None, 0.0),
    };
    MatchCandidate {
        file: file.to_string(),
        considered,
        best_column,
        best_score,
    }
}

/// Flags entries whose score is strictly below `ratio` times the mean score.
///
/// Returns the mean (absent for an empty batch) and the flagged identifiers.
pub fn flag_low_similarity<'a, I>(scores: I, ratio: f64) -> (Option<f64>, BTreeSet<String>)
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let scores = scores.into_iter().collect::<Vec<_>>();
    if scores.is_empty() {
        return (None, BTreeSet::new());
    }
    let average = scores.iter().map(|(_, score)| score).sum::<f64>() / scores.len() as f64;
    let threshold = average * ratio;
    let flagged = scores
        .into_iter()
        .filter(|(_, score)| *score < threshold)
        .map(|(file, _)| file.to_string())
        .collect();
    (Some(average), flagged)
}

/// Suggests, for every candidate file, the column that best matches the
/// reference table's key column.
///
/// The reference key column is resolved before any candidate is loaded. With
/// [`FailurePolicy::Abort`] the first candidate that fails to load ends the run
/// and no partial report is produced.
pub fn find_similar_columns<L, S>(
    candidates: &[S],
    loader: &L,
    reference: &Table,
    key_column: &str,
    options: &MatchOptions,
) -> Result<MatchReport, MatchError>
where
    L: TableLoader + ?Sized,
    S: AsRef<str>,
{
    let key = reference
        .column(key_column)
        .ok_or_else(|| MatchError::KeyColumnNotFound {
            column: key_column.to_string(),
            table: reference.source().to_string(),
        })?;
    let reference_histogram = ValueHistogram::from_column(key);
    debug!(
        "Reference column '{key_column}' has {} distinct value(s) over {} row(s)",
        reference_histogram.len(),
        reference_histogram.observations()
    );

    let mut scored = Vec::with_capacity(candidates.len());
    let mut failures = Vec::new();
    for file in candidates.iter().map(AsRef::as_ref) {
        let table = match loader.load_table(file) {
            Ok(table) => table,
            Err(err) => {
                let err = MatchError::from_load(file, err);
                match options.failure_policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::Skip => {
                        let error = error_chain(&err);
                        warn!("Skipping {file}: {error}");
                        failures.push(FileFailure {
                            file: file.to_string(),
                            error,
                        });
                        continue;
                    }
                }
            }
        };
        let candidate = score_table(file, &table, &reference_histogram, options);
        debug!(
            "{file}: best column {:?} with score {:.4}",
            candidate.best_column, candidate.best_score
        );
        scored.push(candidate);
    }

    let (average_similarity, low_similarity) = flag_low_similarity(
        scored.iter().map(|c| (c.file.as_str(), c.best_score)),
        options.low_similarity_ratio,
    );
    for file in &low_similarity {
        warn!("{file} has a weak best match relative to the batch");
    }
    info!(
        "Scored {} file(s) against '{key_column}' ({} flagged, {} skipped)",
        scored.len(),
        low_similarity.len(),
        failures.len()
    );

    Ok(MatchReport {
        candidates: scored,
        low_similarity,
        average_similarity,
        failures,
    })
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_rows(
            "mem",
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| Cell::parse(v)).collect())
                .collect(),
        )
    }

    #[test]
    fn window_covers_narrow_tables_once() {
        assert_eq!(candidate_window(3, 20, 5), vec![0, 1, 2]);
        assert_eq!(candidate_window(25, 20, 5), (0..25).collect::<Vec<_>>());
        assert!(candidate_window(0, 20, 5).is_empty());
    }

    #[test]
    fn window_skips_middle_of_wide_tables() {
        let window = candidate_window(30, 20, 5);
        let expected = (0..20).chain(25..30).collect::<Vec<_>>();
        assert_eq!(window, expected);
    }

    #[test]
    fn first_column_wins_ties() {
        let reference = ValueHistogram::from_column(
            table(&["k"], &[&["a"], &["b"]]).column("k").unwrap(),
        );
        let candidate = table(&["x", "y"], &[&["1", "p"], &["2", "q"]]);
        let scored = score_table("f", &candidate, &reference, &MatchOptions::default());
        assert_eq!(scored.best_column.as_deref(), Some("x"));
        assert_eq!(scored.best_score, 1.0);
        assert_eq!(scored.considered.len(), 2);
    }

    #[test]
    fn empty_columns_are_not_scored() {
        let reference = ValueHistogram::from_column(
            table(&["k"], &[&["a"], &["b"]]).column("k").unwrap(),
        );
        let candidate = table(&["blank"], &[&[""], &[""]]);
        let scored = score_table("f", &candidate, &reference, &MatchOptions::default());
        assert_eq!(scored.best_column, None);
        assert_eq!(scored.best_score, 0.0);
        assert_eq!(scored.considered[0].score, None);
    }

    #[test]
    fn flagging_is_relative_to_the_batch_mean() {
        let (average, flagged) =
            flag_low_similarity([("a", 0.9), ("b", 0.9), ("c", 0.1)], DEFAULT_LOW_SIMILARITY_RATIO);
        assert!((average.unwrap() - 0.633_333).abs() < 1e-5);
        assert_eq!(flagged.into_iter().collect::<Vec<_>>(), vec!["c".to_string()]);
    }

    #[test]
    fn single_file_batch_is_never_flagged() {
        let (average, flagged) = flag_low_similarity([("only", 0.01)], 0.8);
        assert_eq!(average, Some(0.01));
        assert!(flagged.is_empty());
        let (average, flagged) = flag_low_similarity(std::iter::empty::<(&str, f64)>(), 0.8);
        assert_eq!(average, None);
        assert!(flagged.is_empty());
    }
}
