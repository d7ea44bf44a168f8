//! Record schemas: column declarations, extraction, and the per-type cache.
//!
//! A record type describes its fields through [`SheetRecord::fields`]. Each
//! field is either a static column (fixed header), the single dynamic column
//! (open key set discovered from the data), or a plain field that never maps
//! to the sheet. [`extract`] validates a declaration into a [`SheetSchema`]
//! and [`SchemaRegistry`] caches the result per type.

use std::{
    any::{TypeId, type_name},
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Cell, CellError, FromCell, Value},
    error::{Result, SheetError},
    reassemble::{FieldError, FieldValues},
    style::CellStyler,
};

/// Type hint attached to a column; drives number formats on write and value
/// coercion on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["string", "integer", "float", "boolean", "date", "datetime"]
    }

    /// Spreadsheet number format for cells of this type.
    pub fn num_format(&self) -> &'static str {
        match self {
            ColumnType::String => "@",
            ColumnType::Integer => "0",
            ColumnType::Float => "0.00",
            ColumnType::Boolean => "General",
            ColumnType::Date => "yyyy-mm-dd",
            ColumnType::DateTime => "yyyy-mm-dd hh:mm:ss",
        }
    }

    /// Convert a raw value read from a sheet into this type.
    pub fn coerce(&self, value: &Value) -> Result<Value, CellError> {
        let cell = Some(value);
        Ok(match self {
            ColumnType::String => Value::String(String::from_cell(cell)?),
            ColumnType::Integer => Value::Integer(i64::from_cell(cell)?),
            ColumnType::Float => Value::Float(f64::from_cell(cell)?),
            ColumnType::Boolean => Value::Boolean(bool::from_cell(cell)?),
            ColumnType::Date => Value::Date(FromCell::from_cell(cell)?),
            ColumnType::DateTime => Value::DateTime(FromCell::from_cell(cell)?),
        })
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = SheetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" | "text" => Ok(ColumnType::String),
            "integer" | "int" => Ok(ColumnType::Integer),
            "float" | "double" | "number" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "datetime" | "date-time" | "timestamp" => Ok(ColumnType::DateTime),
            _ => Err(SheetError::Config(format!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            ))),
        }
    }
}

/// Per-key type lookup for the dynamic column.
pub trait KeyTypeHint: Send + Sync {
    fn type_of(&self, key: &str) -> Option<ColumnType>;
}

impl<F> KeyTypeHint for F
where
    F: Fn(&str) -> Option<ColumnType> + Send + Sync,
{
    fn type_of(&self, key: &str) -> Option<ColumnType> {
        self(key)
    }
}

impl KeyTypeHint for BTreeMap<String, ColumnType> {
    fn type_of(&self, key: &str) -> Option<ColumnType> {
        self.get(key).copied()
    }
}

/// A fixed column bound to one record field.
#[derive(Clone)]
pub struct StaticColumnSpec {
    pub field_name: String,
    pub header: String,
    pub required: bool,
    pub default: Cell,
    pub type_hint: Option<ColumnType>,
    pub styler: Option<Arc<dyn CellStyler>>,
}

impl StaticColumnSpec {
    /// A required column with no type hint or styler.
    pub fn new(field_name: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            header: header.into(),
            required: true,
            default: None,
            type_hint: None,
            styler: None,
        }
    }

    /// The column may be absent from a sheet; its field then reads as blank.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// The column may be absent from a sheet; its field then reads as `value`.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(value.into());
        self
    }

    pub fn with_type(mut self, column_type: ColumnType) -> Self {
        self.type_hint = Some(column_type);
        self
    }

    pub fn with_styler(mut self, styler: impl CellStyler + 'static) -> Self {
        self.styler = Some(Arc::new(styler));
        self
    }
}

impl fmt::Debug for StaticColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticColumnSpec")
            .field("field_name", &self.field_name)
            .field("header", &self.header)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("type_hint", &self.type_hint)
            .field("styled", &self.styler.is_some())
            .finish()
    }
}

/// The open-ended column whose headers are the keys of a [`DynamicColumns`]
/// map.
#[derive(Clone)]
pub struct DynamicColumnSpec {
    pub field_name: String,
    pub key_types: Option<Arc<dyn KeyTypeHint>>,
    pub styler: Option<Arc<dyn CellStyler>>,
}

impl DynamicColumnSpec {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            key_types: None,
            styler: None,
        }
    }

    pub fn with_key_types(mut self, hint: impl KeyTypeHint + 'static) -> Self {
        self.key_types = Some(Arc::new(hint));
        self
    }

    pub fn with_styler(mut self, styler: impl CellStyler + 'static) -> Self {
        self.styler = Some(Arc::new(styler));
        self
    }

    pub fn type_of(&self, key: &str) -> Option<ColumnType> {
        self.key_types.as_ref().and_then(|hint| hint.type_of(key))
    }
}

impl fmt::Debug for DynamicColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicColumnSpec")
            .field("field_name", &self.field_name)
            .field("typed", &self.key_types.is_some())
            .field("styled", &self.styler.is_some())
            .finish()
    }
}

/// Values carried by a record's dynamic column, keyed by header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicColumns(BTreeMap<String, Value>);

impl DynamicColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DynamicColumns {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One declared field of a record type, in declaration order.
#[derive(Debug, Clone)]
pub enum FieldDecl {
    Static(StaticColumnSpec),
    Dynamic(DynamicColumnSpec),
    /// A field with no column marker; never written or read.
    Plain(String),
}

impl FieldDecl {
    pub fn field_name(&self) -> &str {
        match self {
            FieldDecl::Static(column) => &column.field_name,
            FieldDecl::Dynamic(spec) => &spec.field_name,
            FieldDecl::Plain(name) => name,
        }
    }
}

impl From<StaticColumnSpec> for FieldDecl {
    fn from(column: StaticColumnSpec) -> Self {
        FieldDecl::Static(column)
    }
}

impl From<DynamicColumnSpec> for FieldDecl {
    fn from(spec: DynamicColumnSpec) -> Self {
        FieldDecl::Dynamic(spec)
    }
}

/// A record type that can be written to and read from a sheet.
pub trait SheetRecord: Sized + 'static {
    /// Field declarations in declaration order.
    fn fields() -> Vec<FieldDecl>;

    /// Current value of a static column's field.
    fn static_value(&self, field: &str) -> Cell;

    /// Current value of the dynamic column's field, if the type declares one.
    fn dynamic_columns(&self, _field: &str) -> Option<&DynamicColumns> {
        None
    }

    /// Build a record from the values read for one row, or reject them.
    fn construct(values: &mut FieldValues) -> Result<Self, FieldError>;
}

/// Validated column layout of a record type.
#[derive(Debug, Clone)]
pub struct SheetSchema {
    pub type_name: &'static str,
    pub columns: Vec<StaticColumnSpec>,
    pub dynamic: Option<DynamicColumnSpec>,
}

impl SheetSchema {
    pub fn static_headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }

    pub fn column_by_header(&self, header: &str) -> Option<&StaticColumnSpec> {
        self.columns.iter().find(|c| c.header == header)
    }

    pub fn column_by_field(&self, field: &str) -> Option<&StaticColumnSpec> {
        self.columns.iter().find(|c| c.field_name == field)
    }

    pub fn has_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }
}

/// Inspect `R`'s declarations and validate them into a schema.
pub fn extract<R: SheetRecord>() -> Result<SheetSchema> {
    let type_name = type_name::<R>();
    let mut columns = Vec::new();
    let mut dynamic: Option<DynamicColumnSpec> = None;
    let mut seen_fields = HashSet::new();
    let mut seen_headers = HashSet::new();

    for decl in R::fields() {
        if !seen_fields.insert(decl.field_name().to_string()) {
            return Err(SheetError::configuration(format!(
                "Field '{}' is declared more than once on {type_name}",
                decl.field_name()
            )));
        }
        match decl {
            FieldDecl::Static(column) => {
                if !seen_headers.insert(column.header.clone()) {
                    return Err(SheetError::configuration(format!(
                        "Header '{}' is used by more than one column on {type_name}",
                        column.header
                    )));
                }
                columns.push(column);
            }
            FieldDecl::Dynamic(spec) => {
                if let Some(existing) = &dynamic {
                    return Err(SheetError::configuration(format!(
                        "{type_name} declares more than one dynamic column ('{}' and '{}')",
                        existing.field_name, spec.field_name
                    )));
                }
                dynamic = Some(spec);
            }
            FieldDecl::Plain(_) => {}
        }
    }

    if columns.is_empty() {
        return Err(SheetError::configuration(format!(
            "{type_name} must declare at least one static column"
        )));
    }

    debug!(
        "Extracted schema for {type_name}: {} static column(s), dynamic column {:?}",
        columns.len(),
        dynamic.as_ref().map(|d| d.field_name.as_str())
    );
    Ok(SheetSchema {
        type_name,
        columns,
        dynamic,
    })
}

/// Per-type schema cache.
///
/// Population happens while the lock is held, so concurrent first access for
/// the same type extracts once and every caller observes the same `Arc`.
/// `R::fields()` must not call back into the registry that is extracting it.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: Mutex<HashMap<TypeId, Arc<SheetSchema>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_of<R: SheetRecord>(&self) -> Result<Arc<SheetSchema>> {
        let mut schemas = self.schemas.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(schema) = schemas.get(&TypeId::of::<R>()) {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(extract::<R>()?);
        schemas.insert(TypeId::of::<R>(), Arc::clone(&schema));
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.schemas
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
