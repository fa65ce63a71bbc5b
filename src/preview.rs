use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{ColumnsArgs, PreviewArgs},
    load_options, loader, printable_delimiter, render,
};

pub fn execute_columns(args: &ColumnsArgs) -> Result<()> {
    let options = load_options(&args.read)?;
    let table = loader::load(&args.input, &options)
        .with_context(|| format!("Loading {:?}", args.input))?;
    for name in table.column_names() {
        println!("{name}");
    }
    info!("{} column(s) in {:?}", table.column_count(), args.input);
    Ok(())
}

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let options = load_options(&args.read)?;
    info!(
        "Previewing {:?} with delimiter '{}'",
        args.input,
        printable_delimiter(options.delimiter)
    );
    let table = loader::load(&args.input, &options)
        .with_context(|| format!("Loading {:?}", args.input))?;
    let headers = table
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let rows = (0..table.row_count().min(args.rows))
        .filter_map(|idx| table.row(idx))
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect::<Vec<Vec<String>>>();

    render::print_table(&headers, &rows);
    info!(
        "Displayed {} of {} row(s) from {:?}",
        rows.len(),
        table.row_count(),
        args.input
    );
    Ok(())
}
