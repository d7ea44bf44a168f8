//! Read path: rebuilds typed records from a header map and raw rows.
//!
//! Static columns bind by header. Missing required headers fail before any
//! row is looked at; missing optional ones read as their default. Headers no
//! static column claims are collected into the dynamic field when collection
//! is enabled and the type declares one, otherwise they are dropped.

use std::collections::{BTreeMap, HashSet};

use log::debug;
use thiserror::Error;

use crate::{
    data::{Cell, CellError, FromCell, Value},
    error::{Result, SheetError},
    schema::{DynamicColumnSpec, DynamicColumns, SheetRecord, SheetSchema, StaticColumnSpec},
    sheet_io::RawRow,
};

/// Rejection raised while constructing a record from one row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    fn from_cell(field: &str, err: CellError) -> Self {
        Self::new(field, err.to_string())
    }
}

/// Values read for one row, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct FieldValues {
    row: u32,
    cells: BTreeMap<String, Cell>,
    dynamic: BTreeMap<String, DynamicColumns>,
}

impl FieldValues {
    pub fn new(row: u32) -> Self {
        Self {
            row,
            ..Default::default()
        }
    }

    /// Sheet row the values were read from.
    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn insert(&mut self, field: impl Into<String>, cell: Cell) {
        self.cells.insert(field.into(), cell);
    }

    pub fn set_dynamic(&mut self, field: impl Into<String>, columns: DynamicColumns) {
        self.dynamic.insert(field.into(), columns);
    }

    pub fn cell(&self, field: &str) -> Option<&Value> {
        self.cells.get(field).and_then(Option::as_ref)
    }

    pub fn get<T: FromCell>(&self, field: &str) -> Result<T, FieldError> {
        T::from_cell(self.cell(field)).map_err(|err| FieldError::from_cell(field, err))
    }

    /// Like [`FieldValues::get`], but a blank cell yields `fallback`.
    pub fn get_or<T: FromCell>(&self, field: &str, fallback: T) -> Result<T, FieldError> {
        match self.cell(field) {
            None => Ok(fallback),
            Some(Value::String(s)) if s.is_empty() => Ok(fallback),
            Some(_) => self.get(field),
        }
    }

    /// Collected dynamic columns for `field`; empty when nothing was collected.
    pub fn take_dynamic(&mut self, field: &str) -> DynamicColumns {
        self.dynamic.remove(field).unwrap_or_default()
    }

    /// Run a user validator over a converted value.
    pub fn validate<T, F>(&self, field: &str, value: T, check: F) -> Result<T, FieldError>
    where
        F: FnOnce(&T) -> std::result::Result<(), String>,
    {
        check(&value)
            .map(|()| value)
            .map_err(|message| FieldError::new(field, message))
    }
}

struct Binding<'a> {
    column: &'a StaticColumnSpec,
    position: Option<usize>,
}

/// Rebuild one record per raw row. Any failure aborts the whole read.
pub fn assemble<R: SheetRecord>(
    schema: &SheetSchema,
    header_map: &BTreeMap<String, usize>,
    rows: &[RawRow],
    allow_dynamic: bool,
) -> Result<Vec<R>> {
    let mut bindings = Vec::with_capacity(schema.columns.len());
    for column in &schema.columns {
        let position = header_map.get(&column.header).copied();
        if position.is_none() && column.required {
            return Err(SheetError::ColumnNotFound {
                header: column.header.clone(),
            });
        }
        bindings.push(Binding { column, position });
    }

    let claimed: HashSet<&str> = schema.columns.iter().map(|c| c.header.as_str()).collect();
    let unclaimed: Vec<(&str, usize)> = header_map
        .iter()
        .filter(|(header, _)| !claimed.contains(header.as_str()))
        .map(|(header, position)| (header.as_str(), *position))
        .collect();
    let dynamic = schema.dynamic.as_ref().filter(|_| allow_dynamic);
    if dynamic.is_none() && !unclaimed.is_empty() {
        debug!(
            "Ignoring {} unmapped column(s) for {}: {:?}",
            unclaimed.len(),
            schema.type_name,
            unclaimed.iter().map(|(h, _)| *h).collect::<Vec<_>>()
        );
    }

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let mut values = FieldValues::new(row.number);
        for binding in &bindings {
            values.insert(
                binding.column.field_name.clone(),
                static_cell(binding, row)?,
            );
        }
        if let Some(spec) = dynamic {
            values.set_dynamic(spec.field_name.clone(), dynamic_cells(spec, &unclaimed, row)?);
        }
        let record = R::construct(&mut values).map_err(|err| SheetError::Validation {
            row: row.number,
            field: err.field,
            message: err.message,
        })?;
        records.push(record);
    }
    debug!(
        "Assembled {} {} record(s) from {} column(s)",
        records.len(),
        schema.type_name,
        header_map.len()
    );
    Ok(records)
}

fn static_cell(binding: &Binding<'_>, row: &RawRow) -> Result<Cell> {
    let column = binding.column;
    let raw = binding.position.and_then(|p| row.cells.get(&p));
    let Some(raw) = raw.filter(|v| !is_blank(v)) else {
        return Ok(if column.required {
            None
        } else {
            column.default.clone()
        });
    };
    match column.type_hint {
        Some(column_type) => column_type
            .coerce(raw)
            .map(Some)
            .map_err(|err| validation(row.number, &column.field_name, err)),
        None => Ok(Some(raw.clone())),
    }
}

fn dynamic_cells(
    spec: &DynamicColumnSpec,
    unclaimed: &[(&str, usize)],
    row: &RawRow,
) -> Result<DynamicColumns> {
    let mut collected = DynamicColumns::new();
    for (header, position) in unclaimed {
        let Some(raw) = row.cells.get(position).filter(|v| !is_blank(v)) else {
            continue;
        };
        let value = match spec.type_of(header) {
            Some(column_type) => column_type
                .coerce(raw)
                .map_err(|err| validation(row.number, &spec.field_name, err))?,
            None => raw.clone(),
        };
        collected.insert(*header, value);
    }
    Ok(collected)
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}

fn validation(row: u32, field: &str, err: CellError) -> SheetError {
    SheetError::Validation {
        row,
        field: field.to_string(),
        message: err.to_string(),
    }
}
