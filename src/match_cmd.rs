use std::fs;

use anyhow::{Context, Result, bail};
use log::{debug, info};

use crate::{
    cli::MatchArgs,
    load_options,
    loader::{self, FileLoader, TableFormat},
    matcher::{self, FailurePolicy, MatchOptions, MatchReport},
    render,
};

pub fn execute(args: &MatchArgs) -> Result<()> {
    if !args.low_similarity_ratio.is_finite() || args.low_similarity_ratio < 0.0 {
        bail!(
            "--low-similarity-ratio must be a non-negative number, got {}",
            args.low_similarity_ratio
        );
    }
    let read_options = load_options(&args.read)?;
    let reference = loader::load(&args.reference, &read_options)
        .with_context(|| format!("Loading reference file {:?}", args.reference))?;

    let candidates = collect_candidates(args)?;
    if candidates.is_empty() {
        bail!("No candidate files to match; pass --input or --dir");
    }
    let options = MatchOptions {
        head_columns: args.head_columns,
        tail_columns: args.tail_columns,
        low_similarity_ratio: args.low_similarity_ratio,
        failure_policy: if args.skip_unreadable {
            FailurePolicy::Skip
        } else {
            FailurePolicy::Abort
        },
    };
    info!(
        "Matching {} file(s) against '{}' in {:?}",
        candidates.len(),
        args.key,
        args.reference
    );

    let loader = FileLoader::new(read_options);
    let report =
        matcher::find_similar_columns(&candidates, &loader, &reference, &args.key, &options)?;

    if args.json {
        let rendered = serde_json::to_string_pretty(&report).context("Serializing match report")?;
        println!("{rendered}");
    } else {
        print_report(&report);
    }
    if let Some(average) = report.average_similarity {
        info!("Average best similarity {average:.4}");
    }
    Ok(())
}

/// Explicit inputs first, then supported files of `--dir` sorted by name.
fn collect_candidates(args: &MatchArgs) -> Result<Vec<String>> {
    let mut candidates = args.inputs.clone();
    let Some(dir) = &args.dir else {
        return Ok(candidates);
    };
    let reference = fs::canonicalize(&args.reference).ok();
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Listing directory {dir:?}"))? {
        let path = entry
            .with_context(|| format!("Listing directory {dir:?}"))?
            .path();
        if !path.is_file() || !TableFormat::is_supported(&path) {
            continue;
        }
        if reference.is_some() && fs::canonicalize(&path).ok() == reference {
            debug!("Leaving reference file {path:?} out of the candidates");
            continue;
        }
        found.push(path);
    }
    found.sort();
    candidates.extend(found.iter().map(|p| p.display().to_string()));
    Ok(candidates)
}

fn print_report(report: &MatchReport) {
    let headers = ["file", "column", "score", "flag"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = report
        .candidates
        .iter()
        .map(|candidate| {
            vec![
                candidate.file.clone(),
                candidate
                    .best_column
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
                format!("{:.4}", candidate.best_score),
                if report.is_low_similarity(&candidate.file) {
                    "low".to_string()
                } else {
                    String::new()
                },
            ]
        })
        .collect::<Vec<_>>();
    render::print_table(&headers, &rows);

    if !report.failures.is_empty() {
        println!();
        let headers = vec!["skipped".to_string(), "reason".to_string()];
        let rows = report
            .failures
            .iter()
            .map(|failure| vec![failure.file.clone(), failure.error.clone()])
            .collect::<Vec<_>>();
        render::print_table(&headers, &rows);
    }
}
