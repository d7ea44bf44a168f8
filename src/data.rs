use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scalar value stored in a single sheet cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// A cell in a row; `None` is a blank cell.
pub type Cell = Option<Value>;

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used by stylers that compare magnitudes.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let trimmed = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Whole float inside the `i64` range. `i64::MAX as f64` rounds up to 2^63,
/// which is already out of range.
fn whole_float_to_i64(value: f64) -> Option<i64> {
    (value.is_finite()
        && value.fract() == 0.0
        && value >= i64::MIN as f64
        && value < i64::MAX as f64)
        .then_some(value as i64)
}

/// Reason a cell could not be converted into a field's Rust type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    #[error("value is required")]
    Missing,
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: String,
    },
}

fn mismatch(expected: &'static str, value: &Value) -> CellError {
    CellError::Mismatch {
        expected,
        found: format!("{} '{}'", value.type_name(), value.as_display()),
    }
}

/// Lenient conversion from a cell into a record field.
///
/// Numeric text parses into numbers and whole floats into integers, which is
/// what spreadsheet readers hand back for values written as integers.
pub trait FromCell: Sized {
    fn from_cell(cell: Option<&Value>) -> Result<Self, CellError>;
}

/// Conversion from a record field into a cell.
pub trait ToCell {
    fn to_cell(&self) -> Cell;
}

impl FromCell for Value {
    fn from_cell(cell: Option<&Value>) -> Result<Self, CellError> {
        cell.cloned().ok_or(CellError::Missing)
    }
}

impl FromCell for String {
    fn from_cell(cell: Option<&Value>) -> Result<Self, CellError> {
        cell.map(Value::as_display).ok_or(CellError::Missing)
    }
}

impl FromCell for i64 {
    fn from_cell(cell: Option<&Value>) -> Result<Self, CellError> {
        let value = cell.ok_or(CellError::Missing)?;
        match value {
            Value::Integer(i) => Ok(*i),
            Value::Float(f) => whole_float_to_i64(*f).ok_or_else(|| mismatch("integer", value)),
            Value::String(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().and_then(whole_float_to_i64))
                    .ok_or_else(|| mismatch("integer", value))
            }
            _ => Err(mismatch("integer", value)),
        }
    }
}

macro_rules! from_cell_via_i64 {
    ($($ty:ty),*) => {
        $(
            impl FromCell for $ty {
                fn from_cell(cell: Option<&Value>) -> Result<Self, CellError> {
                    let wide = i64::from_cell(cell)?;
                    <$ty>::try_from(wide).map_err(|_| CellError::Mismatch {
                        expected: stringify!($ty),
                        found: wide.to_string(),
                    })
                }
            }
        )*
    };
}

from_cell_via_i64!(i32, u32, u64, usize);

impl FromCell for f64 {
    fn from_cell(cell: Option<&Value>) -> Result<Self, CellError> {
        let value = cell.ok_or(CellError::Missing)?;
        match value {
            Value::Integer(_) | Value::Float(_) | Value::String(_) => {
                value.as_f64().ok_or_else(|| mismatch("float", value))
            }
            _ => Err(mismatch("float", value)),
        }
    }
}

impl FromCell for bool {
    fn from_cell(cell: Option<&Value>) -> Result<Self, CellError> {
        let value = cell.ok_or(CellError::Missing)?;
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            Value::String(s) => parse_boolean(s).ok_or_else(|| mismatch("boolean", value)),
            _ => Err(mismatch("boolean", value)),
        }
    }
}

impl FromCell for NaiveDate {
    fn from_cell(cell: Option<&Value>) -> Result<Self, CellError> {
        let value = cell.ok_or(CellError::Missing)?;
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            Value::String(s) => parse_naive_date(s)
                .or_else(|| parse_naive_datetime(s).map(|dt| dt.date()))
                .ok_or_else(|| mismatch("date", value)),
            _ => Err(mismatch("date", value)),
        }
    }
}

impl FromCell for NaiveDateTime {
    fn from_cell(cell: Option<&Value>) -> Result<Self, CellError> {
        let value = cell.ok_or(CellError::Missing)?;
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            Value::String(s) => parse_naive_datetime(s)
                .or_else(|| parse_naive_date(s).map(|d| d.and_time(NaiveTime::MIN)))
                .ok_or_else(|| mismatch("datetime", value)),
            _ => Err(mismatch("datetime", value)),
        }
    }
}

impl<T: FromCell> FromCell for Option<T> {
    fn from_cell(cell: Option<&Value>) -> Result<Self, CellError> {
        match cell {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(_) => T::from_cell(cell).map(Some),
        }
    }
}

impl ToCell for Value {
    fn to_cell(&self) -> Cell {
        Some(self.clone())
    }
}

impl ToCell for str {
    fn to_cell(&self) -> Cell {
        Some(Value::String(self.to_string()))
    }
}

impl ToCell for String {
    fn to_cell(&self) -> Cell {
        Some(Value::String(self.clone()))
    }
}

impl ToCell for i64 {
    fn to_cell(&self) -> Cell {
        Some(Value::Integer(*self))
    }
}

macro_rules! to_cell_integer {
    ($($ty:ty),*) => {
        $(
            impl ToCell for $ty {
                fn to_cell(&self) -> Cell {
                    Some(Value::Integer(i64::from(*self)))
                }
            }
        )*
    };
}

to_cell_integer!(i32, u32);

impl ToCell for f64 {
    fn to_cell(&self) -> Cell {
        Some(Value::Float(*self))
    }
}

impl ToCell for bool {
    fn to_cell(&self) -> Cell {
        Some(Value::Boolean(*self))
    }
}

impl ToCell for NaiveDate {
    fn to_cell(&self) -> Cell {
        Some(Value::Date(*self))
    }
}

impl ToCell for NaiveDateTime {
    fn to_cell(&self) -> Cell {
        Some(Value::DateTime(*self))
    }
}

impl<T: ToCell> ToCell for Option<T> {
    fn to_cell(&self) -> Cell {
        self.as_ref().and_then(ToCell::to_cell)
    }
}

impl<T: ToCell + ?Sized> ToCell for &T {
    fn to_cell(&self) -> Cell {
        (**self).to_cell()
    }
}
