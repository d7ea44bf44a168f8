use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect and re-lay spreadsheet sheets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the header row of a sheet with column positions
    Headers(HeadersArgs),
    /// Preview the first rows of a sheet in a formatted table
    Preview(PreviewArgs),
    /// Rewrite a sheet with its columns reordered by a layout config
    Reorder(ReorderArgs),
}

#[derive(Debug, Args)]
pub struct HeadersArgs {
    /// Input sheet (.xlsx, .csv or .tsv)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Emit the header list as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input sheet (.xlsx, .csv or .tsv)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Number of data rows to display
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ReorderArgs {
    /// Input sheet (.xlsx, .csv or .tsv)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Output sheet; its extension picks the format
    #[arg(short, long)]
    pub output: PathBuf,
    /// Layout config (YAML or JSON) whose `column_order` ranks the headers
    #[arg(long = "order")]
    pub order: PathBuf,
    /// Worksheet name for .xlsx output (overrides the config)
    #[arg(long = "sheet-name")]
    pub sheet_name: Option<String>,
}
