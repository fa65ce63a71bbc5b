use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;

use crate::{
    cli::{AddKeyArgs, VerifyKeyArgs},
    keys, load_options,
    loader::{self, FileLoader},
};

pub fn execute_verify(args: &VerifyKeyArgs) -> Result<()> {
    let loader = FileLoader::new(load_options(&args.read)?);
    let coverage = keys::verify_key_column(&args.inputs, &loader, &args.key);

    if coverage.is_complete() {
        println!(
            "All {} file(s) contain key column '{}'",
            args.inputs.len(),
            args.key
        );
    }
    if !coverage.missing.is_empty() {
        println!(
            "Missing key column '{}' in files: {}",
            args.key,
            coverage.missing.iter().join(", ")
        );
    }
    for (file, error) in &coverage.errors {
        println!("Error loading {file}: {error}");
    }
    info!(
        "Checked {} file(s): {} missing '{}', {} unreadable",
        args.inputs.len(),
        coverage.missing.len(),
        args.key,
        coverage.errors.len()
    );
    Ok(())
}

pub fn execute_add(args: &AddKeyArgs) -> Result<()> {
    let options = load_options(&args.read)?;
    let target = loader::load(&args.target, &options)
        .with_context(|| format!("Loading target file {:?}", args.target))?;
    let source = loader::load(&args.source, &options)
        .with_context(|| format!("Loading source file {:?}", args.source))?;

    let updated =
        keys::add_key_by_matching(&target, &source, &args.target_id, &args.source_id, &args.key)?;
    keys::write_csv(&updated, args.output.as_deref())?;

    info!(
        "Key column '{}' added to {:?} through '{}' from {:?}",
        args.key, args.target, args.target_id, args.source
    );
    Ok(())
}
