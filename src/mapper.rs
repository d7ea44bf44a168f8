//! One-stop entry point tying schemas, grids and backends together.

use std::{path::Path, sync::Arc};

use log::info;

use crate::{
    config::{ReadOptions, WriteOptions},
    csv_io,
    error::{Result, SheetError},
    grid::SheetGrid,
    reassemble::assemble,
    schema::{SchemaRegistry, SheetRecord, SheetSchema},
    sheet_io::SheetData,
    xlsx,
};

/// Owns the schema cache for a set of record types.
#[derive(Debug, Default)]
pub struct SheetMapper {
    registry: SchemaRegistry,
}

fn require_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(SheetError::usage("A file path is required"));
    }
    Ok(())
}

impl SheetMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema<R: SheetRecord>(&self) -> Result<Arc<SheetSchema>> {
        self.registry.schema_of::<R>()
    }

    pub fn build_grid<R: SheetRecord>(
        &self,
        instances: &[R],
        options: &WriteOptions,
    ) -> Result<SheetGrid> {
        let schema = self.schema::<R>()?;
        options.grid_builder().build(&schema, instances)
    }

    pub fn to_xlsx<R: SheetRecord>(
        &self,
        instances: &[R],
        path: &Path,
        options: &WriteOptions,
    ) -> Result<()> {
        require_path(path)?;
        let grid = self.build_grid(instances, options)?;
        xlsx::save_xlsx(&grid, path, &options.sheet_name)?;
        info!("Wrote {} record(s) to {path:?}", instances.len());
        Ok(())
    }

    pub fn to_xlsx_bytes<R: SheetRecord>(
        &self,
        instances: &[R],
        options: &WriteOptions,
    ) -> Result<Vec<u8>> {
        let grid = self.build_grid(instances, options)?;
        xlsx::xlsx_to_bytes(&grid, &options.sheet_name)
    }

    pub fn to_csv<R: SheetRecord>(
        &self,
        instances: &[R],
        path: &Path,
        options: &WriteOptions,
    ) -> Result<()> {
        require_path(path)?;
        let grid = self.build_grid(instances, options)?;
        csv_io::write_csv(&grid, path)?;
        info!("Wrote {} record(s) to {path:?}", instances.len());
        Ok(())
    }

    pub fn from_xlsx<R: SheetRecord>(&self, path: &Path, options: ReadOptions) -> Result<Vec<R>> {
        require_path(path)?;
        let data = xlsx::read_xlsx(path)?;
        self.from_sheet_data(&data, options)
    }

    pub fn from_xlsx_bytes<R: SheetRecord>(
        &self,
        bytes: &[u8],
        options: ReadOptions,
    ) -> Result<Vec<R>> {
        let data = xlsx::read_xlsx_bytes(bytes)?;
        self.from_sheet_data(&data, options)
    }

    pub fn from_csv<R: SheetRecord>(&self, path: &Path, options: ReadOptions) -> Result<Vec<R>> {
        require_path(path)?;
        let data = csv_io::read_csv(path)?;
        self.from_sheet_data(&data, options)
    }

    pub fn from_sheet_data<R: SheetRecord>(
        &self,
        data: &SheetData,
        options: ReadOptions,
    ) -> Result<Vec<R>> {
        let schema = self.schema::<R>()?;
        assemble(&schema, &data.header_map(), &data.rows, options.dynamic_columns)
    }
}
