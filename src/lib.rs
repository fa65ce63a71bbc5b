pub mod cli;
pub mod histogram;
pub mod io_utils;
pub mod key_cmd;
pub mod keys;
pub mod loader;
pub mod match_cmd;
pub mod matcher;
pub mod preview;
pub mod render;
pub mod similarity;
pub mod table;
pub mod xlsx;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::{
    cli::{Cli, Commands, ReadArgs},
    loader::LoadOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("key_matcher", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Columns(args) => preview::execute_columns(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Match(args) => match_cmd::execute(&args),
        Commands::VerifyKey(args) => key_cmd::execute_verify(&args),
        Commands::AddKey(args) => key_cmd::execute_add(&args),
    }
}

pub(crate) fn load_options(args: &ReadArgs) -> Result<LoadOptions> {
    Ok(LoadOptions {
        delimiter: args.delimiter.unwrap_or(io_utils::DEFAULT_CSV_DELIMITER),
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    })
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
