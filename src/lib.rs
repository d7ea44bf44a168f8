//! Map typed record collections to spreadsheet sheets and back.
//!
//! Record types implement [`SheetRecord`], declaring static columns and at
//! most one dynamic column whose keys are discovered from the data. A
//! [`SheetMapper`] lays batches out on `.xlsx` or `.csv` sheets with
//! deterministic column order and per-cell styles, and rebuilds records from
//! sheets whose columns may be in any order.

pub mod cli;
pub mod config;
pub mod csv_io;
pub mod data;
pub mod error;
pub mod extract;
pub mod grid;
pub mod mapper;
pub mod order;
pub mod reassemble;
pub mod schema;
pub mod sheet_io;
pub mod style;
pub mod table;
pub mod xlsx;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

use crate::cli::{Cli, Commands};

pub use crate::{
    config::{LayoutConfig, ReadOptions, WriteOptions},
    data::{Cell, FromCell, ToCell, Value},
    error::SheetError,
    grid::{GridBuilder, SheetGrid},
    mapper::SheetMapper,
    order::{ColumnLayout, DynamicRanker, Rank, StaticRanker},
    reassemble::{FieldError, FieldValues},
    schema::{
        ColumnType, DynamicColumnSpec, DynamicColumns, FieldDecl, SchemaRegistry, SheetRecord,
        SheetSchema, StaticColumnSpec,
    },
    sheet_io::SheetData,
    style::{CellContext, CellStyle, CellStyler, Colors},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_records", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Headers(args) => handle_headers(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Reorder(args) => handle_reorder(&args),
    }
}

fn load_sheet(path: &Path) -> Result<SheetData> {
    sheet_io::read_sheet(path).with_context(|| format!("Reading sheet {path:?}"))
}

#[derive(Serialize)]
struct HeaderEntry<'a> {
    position: usize,
    header: &'a str,
}

fn handle_headers(args: &cli::HeadersArgs) -> Result<()> {
    let data = load_sheet(&args.input)?;
    if args.json {
        let entries: Vec<_> = data
            .headers
            .iter()
            .map(|(position, header)| HeaderEntry {
                position: *position,
                header,
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("Serialising headers")?
        );
    } else {
        for (position, header) in &data.headers {
            println!("{position}\t{header}");
        }
    }
    info!(
        "Listed {} header(s) from {:?}",
        data.headers.len(),
        args.input
    );
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let data = load_sheet(&args.input)?;
    print!("{}", table::render_sheet(&data, args.limit));
    info!(
        "Displayed {} of {} row(s) from {:?}",
        args.limit.min(data.rows.len()),
        data.rows.len(),
        args.input
    );
    Ok(())
}

fn handle_reorder(args: &cli::ReorderArgs) -> Result<()> {
    let config = LayoutConfig::load(&args.order)
        .with_context(|| format!("Loading layout config {:?}", args.order))?;
    let data = load_sheet(&args.input)?;
    debug!("Column ranks: {:?}", config.column_order);
    let grid = data
        .to_grid(Some(&config.column_order))
        .with_context(|| format!("Reordering columns of {:?}", args.input))?;
    let sheet_name = args
        .sheet_name
        .clone()
        .or_else(|| config.sheet_name.clone())
        .unwrap_or_else(|| xlsx::DEFAULT_SHEET_NAME.to_string());
    sheet_io::write_sheet(&grid, &args.output, &sheet_name)
        .with_context(|| format!("Writing sheet {:?}", args.output))?;
    info!(
        "Wrote {} row(s) with columns {:?} to {:?}",
        grid.row_count(),
        grid.headers(),
        args.output
    );
    Ok(())
}
