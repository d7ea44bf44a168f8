//! Write path: turns a batch of records into a laid-out, styled grid.
//!
//! The grid is backend neutral. Rows are keyed by header, styles are keyed by
//! sheet address (header row is row 1, the first record is row 2) and column
//! type hints are keyed by header. Writers in [`crate::xlsx`] and
//! [`crate::csv_io`] consume it as-is.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::{
    data::{Cell, Value},
    error::{Result, SheetError},
    extract::{collect_dynamic_keys, dynamic_values, static_value},
    order::{ColumnLayout, DynamicRanker, StaticRanker, resolve_layout},
    schema::{ColumnType, SheetRecord, SheetSchema},
    style::{CellContext, CellStyle, CellStyler, resolve_style},
};

/// One record's cells keyed by header. Blank cells are explicit `None`.
pub type Row = BTreeMap<String, Cell>;

pub const HEADER_ROW: u32 = 1;
pub const FIRST_DATA_ROW: u32 = 2;

/// 1-based sheet coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellAddress {
    pub row: u32,
    pub column: usize,
}

impl CellAddress {
    pub fn new(row: u32, column: usize) -> Self {
        Self { row, column }
    }
}

/// Sparse per-cell presentation overrides.
pub type StyleMap = BTreeMap<CellAddress, CellStyle>;

#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    pub layout: ColumnLayout,
    pub rows: Vec<Row>,
    pub styles: StyleMap,
    pub column_types: BTreeMap<String, ColumnType>,
}

impl SheetGrid {
    /// Unstyled, untyped grid over an existing layout. Cells for headers the
    /// layout does not contain are dropped; missing ones become blank.
    pub fn from_parts(layout: ColumnLayout, rows: impl IntoIterator<Item = Row>) -> Self {
        let rows = rows
            .into_iter()
            .map(|mut row| {
                layout
                    .headers()
                    .into_iter()
                    .map(|header| (header.to_string(), row.remove(header).flatten()))
                    .collect()
            })
            .collect();
        Self {
            layout,
            rows,
            styles: StyleMap::new(),
            column_types: BTreeMap::new(),
        }
    }

    pub fn headers(&self) -> Vec<&str> {
        self.layout.headers()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Value at a 0-based record index and header.
    pub fn value(&self, record_index: usize, header: &str) -> Option<&Value> {
        self.rows
            .get(record_index)
            .and_then(|row| row.get(header))
            .and_then(Option::as_ref)
    }

    pub fn style_at(&self, row: u32, column: usize) -> Option<&CellStyle> {
        self.styles.get(&CellAddress::new(row, column))
    }

    pub fn column_type(&self, header: &str) -> Option<ColumnType> {
        self.column_types.get(header).copied()
    }
}

/// Sheet row holding the record at `record_index`.
pub fn sheet_row(record_index: usize) -> Result<u32> {
    u32::try_from(record_index)
        .ok()
        .and_then(|idx| idx.checked_add(FIRST_DATA_ROW))
        .ok_or_else(|| {
            SheetError::usage(format!(
                "Record {record_index} exceeds the sheet row limit"
            ))
        })
}

/// Builds a [`SheetGrid`] from a batch, honouring optional ordering hints.
#[derive(Default, Clone, Copy)]
pub struct GridBuilder<'a> {
    static_order: Option<&'a dyn StaticRanker>,
    dynamic_order: Option<&'a dyn DynamicRanker>,
}

impl<'a> GridBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn static_order(mut self, ranker: &'a dyn StaticRanker) -> Self {
        self.static_order = Some(ranker);
        self
    }

    pub fn dynamic_order(mut self, ranker: &'a dyn DynamicRanker) -> Self {
        self.dynamic_order = Some(ranker);
        self
    }

    pub fn build<R: SheetRecord>(&self, schema: &SheetSchema, instances: &[R]) -> Result<SheetGrid> {
        if instances.is_empty() {
            return Err(SheetError::usage("Cannot build a sheet from an empty batch"));
        }
        if schema.columns.is_empty() {
            return Err(SheetError::usage(format!(
                "{} has no static columns",
                schema.type_name
            )));
        }

        let dynamic_keys = schema
            .dynamic
            .as_ref()
            .map(|spec| collect_dynamic_keys(instances, spec))
            .unwrap_or_default();
        let layout = resolve_layout(
            &schema.static_headers(),
            self.static_order,
            &dynamic_keys,
            self.dynamic_order,
        )?;
        let positions = layout.header_map();

        let mut rows = Vec::with_capacity(instances.len());
        let mut styles = StyleMap::new();
        for (record_index, instance) in instances.iter().enumerate() {
            let mut row = Row::new();
            for column in &schema.columns {
                row.insert(column.header.clone(), static_value(instance, column));
            }
            if let Some(spec) = &schema.dynamic {
                row.extend(dynamic_values(instance, spec, &dynamic_keys));
            }

            let row_number = sheet_row(record_index)?;
            let mut style_cell = |header: &str, styler: Option<&dyn CellStyler>| -> Result<()> {
                let Some(position) = positions.get(header) else {
                    return Ok(());
                };
                let context = CellContext {
                    value: row.get(header).and_then(Option::as_ref),
                    row: &row,
                    header,
                    row_index: record_index,
                };
                if let Some(style) = resolve_style(styler, &context)? {
                    styles.insert(CellAddress::new(row_number, *position), style);
                }
                Ok(())
            };
            for column in &schema.columns {
                if column.styler.is_some() {
                    style_cell(&column.header, column.styler.as_deref())?;
                }
            }
            if let Some(spec) = schema.dynamic.as_ref().filter(|s| s.styler.is_some()) {
                for key in &dynamic_keys {
                    style_cell(key, spec.styler.as_deref())?;
                }
            }
            rows.push(row);
        }

        let column_types = column_types(schema, &dynamic_keys);
        debug!(
            "Built grid for {}: {} row(s) x {} column(s), {} styled cell(s)",
            schema.type_name,
            rows.len(),
            layout.len(),
            styles.len()
        );
        Ok(SheetGrid {
            layout,
            rows,
            styles,
            column_types,
        })
    }
}

fn column_types(schema: &SheetSchema, dynamic_keys: &BTreeSet<String>) -> BTreeMap<String, ColumnType> {
    let statics = schema
        .columns
        .iter()
        .filter_map(|c| c.type_hint.map(|t| (c.header.clone(), t)));
    let dynamics = schema.dynamic.iter().flat_map(|spec| {
        dynamic_keys
            .iter()
            .filter_map(|key| spec.type_of(key).map(|t| (key.clone(), t)))
    });
    statics.chain(dynamics).collect()
}
