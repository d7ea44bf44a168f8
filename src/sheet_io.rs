//! Backend-neutral sheet contents and format dispatch.
//!
//! Readers return [`SheetData`]: headers by 1-based column position plus the
//! non-blank rows, each remembering its sheet row number. The backend is
//! chosen from the file extension:
//!
//! - `.xlsx` → [`crate::xlsx`]
//! - `.csv` → [`crate::csv_io`] with a comma delimiter
//! - `.tsv` → [`crate::csv_io`] with a tab delimiter

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use log::debug;

use crate::{
    csv_io,
    data::Value,
    error::{Result, SheetError},
    grid::{Row, SheetGrid, sheet_row},
    order::{StaticRanker, resolve_layout},
    xlsx,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// One non-blank sheet row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    /// Sheet row number; the header is row 1.
    pub number: u32,
    /// Non-blank cells by 1-based column position.
    pub cells: BTreeMap<usize, Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetData {
    pub headers: BTreeMap<usize, String>,
    pub rows: Vec<RawRow>,
}

impl SheetData {
    /// Header to position. When a header repeats, the leftmost one wins.
    pub fn header_map(&self) -> BTreeMap<String, usize> {
        let mut map = BTreeMap::new();
        for (position, header) in &self.headers {
            map.entry(header.clone()).or_insert(*position);
        }
        map
    }

    /// Headers in sheet order.
    pub fn header_names(&self) -> Vec<String> {
        self.headers.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The grid as a reader would see it after writing: blank cells vanish
    /// and styles and type hints are lost.
    pub fn from_grid(grid: &SheetGrid) -> Self {
        let headers = grid
            .layout
            .columns()
            .iter()
            .map(|c| (c.position, c.header.clone()))
            .collect();
        let rows = grid
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| RawRow {
                number: sheet_row(idx).unwrap_or(u32::MAX),
                cells: grid
                    .layout
                    .columns()
                    .iter()
                    .filter_map(|c| {
                        row.get(&c.header)
                            .and_then(Option::as_ref)
                            .map(|value| (c.position, value.clone()))
                    })
                    .collect(),
            })
            .filter(|row| !row.cells.is_empty())
            .collect();
        Self { headers, rows }
    }

    /// Re-lay the sheet's columns. Unranked columns keep their sheet order.
    pub fn to_grid(&self, ranker: Option<&dyn StaticRanker>) -> Result<SheetGrid> {
        let layout = resolve_layout(&self.header_names(), ranker, &BTreeSet::new(), None)?;
        let unheaded = self
            .rows
            .iter()
            .flat_map(|raw| raw.cells.keys())
            .filter(|position| !self.headers.contains_key(position))
            .count();
        if unheaded > 0 {
            debug!("Dropping {unheaded} cell(s) under columns without a header");
        }
        let rows = self.rows.iter().map(|raw| {
            self.headers
                .iter()
                .map(|(position, header)| (header.clone(), raw.cells.get(position).cloned()))
                .collect::<Row>()
        });
        Ok(SheetGrid::from_parts(layout, rows))
    }
}

/// Sheet file format, chosen from the path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridFormat {
    Xlsx,
    Delimited { delimiter: u8 },
}

impl GridFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => Ok(GridFormat::Xlsx),
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(GridFormat::Delimited {
                delimiter: DEFAULT_CSV_DELIMITER,
            }),
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => Ok(GridFormat::Delimited {
                delimiter: DEFAULT_TSV_DELIMITER,
            }),
            _ => Err(SheetError::usage(format!(
                "Cannot infer a sheet format from {path:?}; expected .xlsx, .csv or .tsv"
            ))),
        }
    }

    pub fn read(&self, path: &Path) -> Result<SheetData> {
        match self {
            GridFormat::Xlsx => xlsx::read_xlsx(path),
            GridFormat::Delimited { delimiter } => csv_io::read_delimited(path, *delimiter),
        }
    }

    pub fn write(&self, grid: &SheetGrid, path: &Path, sheet_name: &str) -> Result<()> {
        match self {
            GridFormat::Xlsx => xlsx::save_xlsx(grid, path, sheet_name),
            GridFormat::Delimited { delimiter } => {
                csv_io::write_delimited(grid, path, *delimiter)
            }
        }
    }
}

pub fn read_sheet(path: &Path) -> Result<SheetData> {
    GridFormat::from_path(path)?.read(path)
}

pub fn write_sheet(grid: &SheetGrid, path: &Path, sheet_name: &str) -> Result<()> {
    GridFormat::from_path(path)?.write(grid, path, sheet_name)
}
