#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result as AnyResult;
use chrono::{NaiveDate, NaiveDateTime};
use sheet_records::{
    Cell, CellContext, CellStyle, Colors, ColumnType, DynamicColumnSpec, DynamicColumns,
    FieldDecl, FieldError, FieldValues, SheetRecord, StaticColumnSpec, ToCell, Value,
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.file(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

fn highlight_age(cell: &CellContext<'_>) -> AnyResult<Option<CellStyle>> {
    Ok(cell.value.and_then(Value::as_f64).map(|age| {
        if age > 30.0 {
            CellStyle::fill(Colors::WARNING)
        } else {
            CellStyle::fill(Colors::UNCHANGED)
        }
    }))
}

fn highlight_email(cell: &CellContext<'_>) -> AnyResult<Option<CellStyle>> {
    Ok(cell
        .value
        .and_then(Value::as_str)
        .filter(|email| email.contains("example"))
        .map(|_| CellStyle::fill(Colors::INFO).italic()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserModel {
    pub name: String,
    pub age: i64,
    pub email: String,
}

impl UserModel {
    pub fn new(name: &str, age: i64, email: &str) -> Self {
        Self {
            name: name.to_string(),
            age,
            email: email.to_string(),
        }
    }
}

impl SheetRecord for UserModel {
    fn fields() -> Vec<FieldDecl> {
        vec![
            StaticColumnSpec::new("name", "Name").into(),
            StaticColumnSpec::new("age", "Age")
                .with_type(ColumnType::Integer)
                .with_styler(highlight_age)
                .into(),
            StaticColumnSpec::new("email", "Email")
                .with_styler(highlight_email)
                .into(),
        ]
    }

    fn static_value(&self, field: &str) -> Cell {
        match field {
            "name" => self.name.to_cell(),
            "age" => self.age.to_cell(),
            "email" => self.email.to_cell(),
            _ => None,
        }
    }

    fn construct(values: &mut FieldValues) -> Result<Self, FieldError> {
        Ok(Self {
            name: values.get("name")?,
            age: values.get("age")?,
            email: values.get("email")?,
        })
    }
}

pub fn users() -> Vec<UserModel> {
    vec![
        UserModel::new("Alice", 25, "alice@example.com"),
        UserModel::new("Bob", 35, "bob@example.com"),
        UserModel::new("Charlie", 28, "charlie@test.org"),
    ]
}

fn highlight_dynamic(cell: &CellContext<'_>) -> AnyResult<Option<CellStyle>> {
    Ok(match cell.value {
        Some(Value::Integer(n)) if *n > 100 => Some(CellStyle::fill(Colors::CHANGED).bold()),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastModel {
    pub month: String,
    pub manager: String,
    pub characteristics: DynamicColumns,
}

impl ForecastModel {
    pub fn new(month: &str, manager: &str, characteristics: DynamicColumns) -> Self {
        Self {
            month: month.to_string(),
            manager: manager.to_string(),
            characteristics,
        }
    }
}

impl SheetRecord for ForecastModel {
    fn fields() -> Vec<FieldDecl> {
        vec![
            StaticColumnSpec::new("month", "Month").into(),
            StaticColumnSpec::new("manager", "Manager").into(),
            DynamicColumnSpec::new("characteristics")
                .with_key_types(|key: &str| (key == "Sales").then_some(ColumnType::Integer))
                .with_styler(highlight_dynamic)
                .into(),
        ]
    }

    fn static_value(&self, field: &str) -> Cell {
        match field {
            "month" => self.month.to_cell(),
            "manager" => self.manager.to_cell(),
            _ => None,
        }
    }

    fn dynamic_columns(&self, _field: &str) -> Option<&DynamicColumns> {
        Some(&self.characteristics)
    }

    fn construct(values: &mut FieldValues) -> Result<Self, FieldError> {
        Ok(Self {
            month: values.get("month")?,
            manager: values.get("manager")?,
            characteristics: values.take_dynamic("characteristics"),
        })
    }
}

pub fn forecasts() -> Vec<ForecastModel> {
    vec![
        ForecastModel::new(
            "2024-01",
            "Alice",
            [
                ("Sales", Value::Integer(150)),
                ("Priority", Value::from("High")),
            ]
            .into_iter()
            .collect(),
        ),
        ForecastModel::new(
            "2024-02",
            "Bob",
            [
                ("Sales", Value::Integer(80)),
                ("Priority", Value::from("Medium")),
            ]
            .into_iter()
            .collect(),
        ),
    ]
}

/// A model with an optional, defaulted column and a validator.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedModel {
    pub name: String,
    pub age: i64,
}

impl SheetRecord for ValidatedModel {
    fn fields() -> Vec<FieldDecl> {
        vec![
            StaticColumnSpec::new("name", "Name").into(),
            StaticColumnSpec::new("age", "Age").with_default(0i64).into(),
        ]
    }

    fn static_value(&self, field: &str) -> Cell {
        match field {
            "name" => self.name.to_cell(),
            "age" => self.age.to_cell(),
            _ => None,
        }
    }

    fn construct(values: &mut FieldValues) -> Result<Self, FieldError> {
        let age: i64 = values.get("age")?;
        let age = values.validate("age", age, |age| {
            if *age < 0 {
                Err("Age must be positive".to_string())
            } else {
                Ok(())
            }
        })?;
        Ok(Self {
            name: values.get("name")?,
            age,
        })
    }
}

/// Unhinted float, boolean and date kinds in both static and dynamic columns.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementModel {
    pub probe: String,
    pub score: f64,
    pub taken_at: NaiveDateTime,
    pub calibrated: bool,
    pub readings: DynamicColumns,
}

impl SheetRecord for MeasurementModel {
    fn fields() -> Vec<FieldDecl> {
        vec![
            StaticColumnSpec::new("probe", "Probe").into(),
            StaticColumnSpec::new("score", "Score").into(),
            StaticColumnSpec::new("taken_at", "Taken At").into(),
            StaticColumnSpec::new("calibrated", "Calibrated").into(),
            DynamicColumnSpec::new("readings").into(),
        ]
    }

    fn static_value(&self, field: &str) -> Cell {
        match field {
            "probe" => self.probe.to_cell(),
            "score" => self.score.to_cell(),
            "taken_at" => self.taken_at.to_cell(),
            "calibrated" => self.calibrated.to_cell(),
            _ => None,
        }
    }

    fn dynamic_columns(&self, _field: &str) -> Option<&DynamicColumns> {
        Some(&self.readings)
    }

    fn construct(values: &mut FieldValues) -> Result<Self, FieldError> {
        Ok(Self {
            probe: values.get("probe")?,
            score: values.get("score")?,
            taken_at: values.get("taken_at")?,
            calibrated: values.get("calibrated")?,
            readings: values.take_dynamic("readings"),
        })
    }
}

fn day(year: i32, month: u32, date: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, date).expect("valid date")
}

pub fn measurements() -> Vec<MeasurementModel> {
    let midnight = day(2024, 3, 1).and_hms_opt(0, 0, 0).expect("valid time");
    let afternoon = day(2024, 3, 2).and_hms_opt(14, 30, 15).expect("valid time");
    vec![
        MeasurementModel {
            probe: "north".to_string(),
            score: 3.0,
            taken_at: midnight,
            calibrated: true,
            readings: [
                ("Ratio", Value::Float(2.0)),
                ("At", Value::DateTime(midnight)),
                ("Due", Value::Date(day(2024, 4, 1))),
                ("Passed", Value::Boolean(false)),
                ("Count", Value::Integer(12)),
            ]
            .into_iter()
            .collect(),
        },
        MeasurementModel {
            probe: "south".to_string(),
            score: 0.125,
            taken_at: afternoon,
            calibrated: false,
            readings: [
                ("Ratio", Value::Float(-0.5)),
                ("At", Value::DateTime(afternoon)),
                ("Due", Value::Date(day(2024, 12, 31))),
                ("Passed", Value::Boolean(true)),
                ("Count", Value::Integer(-4)),
            ]
            .into_iter()
            .collect(),
        },
    ]
}
