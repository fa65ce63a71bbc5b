use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::matcher::{DEFAULT_HEAD_COLUMNS, DEFAULT_LOW_SIMILARITY_RATIO, DEFAULT_TAIL_COLUMNS};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Find the shared key column across CSV and XLSX files before merging them",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the column names of a CSV or XLSX file in file order
    Columns(ColumnsArgs),
    /// Preview the first rows of a CSV or XLSX file in a formatted table
    Preview(PreviewArgs),
    /// Suggest which column of each candidate file matches a reference key column
    Match(MatchArgs),
    /// Report which files lack a given key column
    VerifyKey(VerifyKeyArgs),
    /// Add a key column to a file by looking it up in another file through a shared identifier
    AddKey(AddKeyArgs),
}

/// Options that apply when reading delimited text files.
#[derive(Debug, Clone, Args)]
pub struct ReadArgs {
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of CSV input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Input file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub read: ReadArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input file to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display
    #[arg(long, default_value_t = 5)]
    pub rows: usize,
    #[command(flatten)]
    pub read: ReadArgs,
}

#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Reference (master) file holding the key column
    #[arg(short = 'r', long = "reference")]
    pub reference: PathBuf,
    /// Key column in the reference file
    #[arg(short = 'k', long = "key")]
    pub key: String,
    /// Candidate files to match against the reference
    #[arg(short = 'i', long = "input", action = clap::ArgAction::Append)]
    pub inputs: Vec<String>,
    /// Also match every .csv/.xlsx file in this directory, in name order
    #[arg(long = "dir")]
    pub dir: Option<PathBuf>,
    /// Number of leading columns examined per candidate file
    #[arg(long = "head-columns", default_value_t = DEFAULT_HEAD_COLUMNS)]
    pub head_columns: usize,
    /// Number of trailing columns examined per candidate file
    #[arg(long = "tail-columns", default_value_t = DEFAULT_TAIL_COLUMNS)]
    pub tail_columns: usize,
    /// Flag files whose best score is below this fraction of the batch average
    #[arg(long = "low-similarity-ratio", default_value_t = DEFAULT_LOW_SIMILARITY_RATIO)]
    pub low_similarity_ratio: f64,
    /// Skip candidate files that fail to load instead of aborting the batch
    #[arg(long = "skip-unreadable")]
    pub skip_unreadable: bool,
    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,
    #[command(flatten)]
    pub read: ReadArgs,
}

#[derive(Debug, Args)]
pub struct VerifyKeyArgs {
    /// Key column that every file should contain
    #[arg(short = 'k', long = "key")]
    pub key: String,
    /// Files to check
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<String>,
    #[command(flatten)]
    pub read: ReadArgs,
}

#[derive(Debug, Args)]
pub struct AddKeyArgs {
    /// File that receives the key column
    #[arg(long = "target")]
    pub target: PathBuf,
    /// File the key values are looked up in
    #[arg(long = "source")]
    pub source: PathBuf,
    /// Identifier column in the target file
    #[arg(long = "target-id")]
    pub target_id: String,
    /// Identifier column in the source file
    #[arg(long = "source-id")]
    pub source_id: String,
    /// Key column to copy from the source file
    #[arg(short = 'k', long = "key")]
    pub key: String,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub read: ReadArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
