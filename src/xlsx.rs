//! Excel workbook backend.
//!
//! Writing goes through `rust_xlsxwriter`: a bold header row, then one row per
//! record with each cell's number format taken from its style override, its
//! column type hint, or (for dates) a default date format, in that order.
//! Reading goes through `calamine` and only looks at the first worksheet for
//! data.
//!
//! A workbook stores every number as a float and every date as a serial, so a
//! whole float would read back as an integer and a midnight date-time as a
//! date. Cells holding such values are recorded by kind on a hidden sheet
//! ([`KINDS_SHEET_NAME`]) at the same address, and the reader honours it.

use std::{
    collections::BTreeMap,
    io::{Cursor, Read, Seek},
    path::Path,
};

use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use log::debug;
use rust_xlsxwriter::{Format, FormatUnderline, Workbook, Worksheet};

use crate::{
    data::{Value, parse_naive_date, parse_naive_datetime},
    error::{Result, SheetError},
    grid::{HEADER_ROW, SheetGrid, sheet_row},
    schema::ColumnType,
    sheet_io::{RawRow, SheetData},
    style::CellStyle,
};

pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
/// Hidden sheet recording the kind of cells whose stored number is ambiguous.
pub const KINDS_SHEET_NAME: &str = "_cell_kinds";

const SECONDS_PER_DAY: f64 = 86_400.0;
/// Largest magnitude up to which an `f64` holds every integer exactly (2^53).
const MAX_EXACT_INTEGER: i64 = 1 << 53;

/// Kind of a cell that would otherwise read back as a different `Value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoredKind {
    Float,
    DateTime,
}

impl StoredKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) if matches!(normalise_float(*f), Value::Integer(_)) => Some(Self::Float),
            Value::DateTime(dt) if dt.time() == NaiveTime::MIN => Some(Self::DateTime),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::DateTime => "datetime",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "float" => Some(Self::Float),
            "datetime" => Some(Self::DateTime),
            _ => None,
        }
    }
}

/// Stored kinds keyed by 1-based (sheet row, column position).
type KindMap = BTreeMap<(u32, usize), StoredKind>;

/// Lay a grid out on a fresh single-sheet workbook.
pub fn write_workbook(grid: &SheetGrid, sheet_name: &str) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    let header_format = Format::new().set_bold();
    let header_row = HEADER_ROW - 1;
    for column in grid.layout.columns() {
        worksheet.write_string_with_format(
            header_row,
            column_index(column.position)?,
            &column.header,
            &header_format,
        )?;
    }

    let mut kinds = Vec::new();
    for (record_index, row) in grid.rows.iter().enumerate() {
        let row_number = sheet_row(record_index)?;
        for column in grid.layout.columns() {
            let col = column_index(column.position)?;
            let style = grid.style_at(row_number, column.position);
            match row.get(&column.header).and_then(Option::as_ref) {
                Some(value) => {
                    let format = cell_format(value, grid.column_type(&column.header), style);
                    write_value(worksheet, row_number - 1, col, value, &format)?;
                    if let Some(kind) = StoredKind::of(value) {
                        kinds.push((row_number - 1, col, kind));
                    }
                }
                None => {
                    if let Some(style) = style {
                        worksheet.write_blank(row_number - 1, col, &style_format(Format::new(), style))?;
                    }
                }
            }
        }
    }
    worksheet.autofit();

    if !kinds.is_empty() {
        let kinds_sheet = workbook.add_worksheet();
        kinds_sheet.set_name(KINDS_SHEET_NAME)?;
        kinds_sheet.set_hidden(true);
        for (row, col, kind) in &kinds {
            kinds_sheet.write_string(*row, *col, kind.as_str())?;
        }
        debug!("Recorded {} ambiguous cell kind(s)", kinds.len());
    }

    debug!(
        "Laid out sheet '{sheet_name}': {} row(s), {} column(s), {} styled cell(s)",
        grid.rows.len(),
        grid.layout.len(),
        grid.styles.len()
    );
    Ok(workbook)
}

pub fn save_xlsx(grid: &SheetGrid, path: &Path, sheet_name: &str) -> Result<()> {
    let mut workbook = write_workbook(grid, sheet_name)?;
    workbook.save(path)?;
    debug!("Saved workbook to {path:?}");
    Ok(())
}

pub fn xlsx_to_bytes(grid: &SheetGrid, sheet_name: &str) -> Result<Vec<u8>> {
    let mut workbook = write_workbook(grid, sheet_name)?;
    Ok(workbook.save_to_buffer()?)
}

pub fn read_xlsx(path: &Path) -> Result<SheetData> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let data = first_sheet(&mut workbook)?;
    debug!("Read {} row(s) from {path:?}", data.rows.len());
    Ok(data)
}

pub fn read_xlsx_bytes(bytes: &[u8]) -> Result<SheetData> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))?;
    first_sheet(&mut workbook)
}

fn first_sheet<RS: Read + Seek>(workbook: &mut Xlsx<RS>) -> Result<SheetData> {
    let kinds = stored_kinds(workbook)?;
    match workbook.worksheet_range_at(0) {
        Some(range) => Ok(sheet_from_range(&range?, &kinds)),
        None => Err(SheetError::usage("Workbook contains no worksheets")),
    }
}

fn stored_kinds<RS: Read + Seek>(workbook: &mut Xlsx<RS>) -> Result<KindMap> {
    if !workbook.sheet_names().iter().any(|name| name == KINDS_SHEET_NAME) {
        return Ok(KindMap::new());
    }
    let range = workbook.worksheet_range(KINDS_SHEET_NAME)?;
    let (start_row, start_col) = range.start().unwrap_or_default();
    let kinds = range
        .cells()
        .filter_map(|(row, col, cell)| match cell {
            Data::String(s) => StoredKind::parse(s).map(|kind| {
                let address = (start_row + row as u32 + 1, start_col as usize + col + 1);
                (address, kind)
            }),
            _ => None,
        })
        .collect();
    Ok(kinds)
}

fn sheet_from_range(range: &Range<Data>, kinds: &KindMap) -> SheetData {
    let (start_row, start_col) = range.start().unwrap_or_default();
    let first_col = start_col as usize + 1;
    let mut rows = range.rows();
    let Some(header_cells) = rows.next() else {
        return SheetData::default();
    };

    let headers = header_cells
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| {
            let header = cell_value(cell, None)?.as_display().trim().to_string();
            (!header.is_empty()).then_some((first_col + idx, header))
        })
        .collect();

    let rows = rows
        .zip(start_row + 2..)
        .filter_map(|(cells, number)| {
            let cells: BTreeMap<usize, Value> = cells
                .iter()
                .enumerate()
                .filter_map(|(idx, cell)| {
                    let position = first_col + idx;
                    let kind = kinds.get(&(number, position)).copied();
                    cell_value(cell, kind).map(|v| (position, v))
                })
                .collect();
            (!cells.is_empty()).then_some(RawRow { number, cells })
        })
        .collect();

    SheetData { headers, rows }
}

fn cell_value(cell: &Data, kind: Option<StoredKind>) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Float(f) if kind == Some(StoredKind::Float) => Some(Value::Float(*f)),
        Data::Float(f) => Some(normalise_float(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(dt) if kind == Some(StoredKind::DateTime) => Some(
            serial_to_datetime(dt.as_f64()).map_or(Value::Float(dt.as_f64()), Value::DateTime),
        ),
        Data::DateTime(dt) => Some(serial_to_value(dt.as_f64())),
        Data::DateTimeIso(s) => Some(
            parse_naive_datetime(s)
                .map(Value::DateTime)
                .or_else(|| parse_naive_date(s).map(Value::Date))
                .unwrap_or_else(|| Value::String(s.clone())),
        ),
        Data::DurationIso(s) => Some(Value::String(s.clone())),
        Data::Error(err) => Some(Value::String(err.to_string())),
    }
}

fn normalise_float(value: f64) -> Value {
    const LIMIT: f64 = MAX_EXACT_INTEGER as f64;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= LIMIT {
        Value::Integer(value as i64)
    } else {
        Value::Float(value)
    }
}

/// Excel serial (1900 system) to a date, or a date-time when the serial has a
/// time part.
fn serial_to_value(serial: f64) -> Value {
    match serial_to_datetime(serial) {
        Some(dt) if dt.time() == NaiveTime::MIN => Value::Date(dt.date()),
        Some(dt) => Value::DateTime(dt),
        None => Value::Float(serial),
    }
}

fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let days = serial.floor();
    let seconds = ((serial - days) * SECONDS_PER_DAY).round() as i64;
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)
        .zip(TimeDelta::try_days(days as i64))
        .and_then(|(epoch, offset)| epoch.checked_add_signed(offset))?;
    TimeDelta::try_seconds(seconds)
        .and_then(|offset| date.and_time(NaiveTime::MIN).checked_add_signed(offset))
}

fn exact_number(value: i64) -> Result<f64> {
    if (-MAX_EXACT_INTEGER..=MAX_EXACT_INTEGER).contains(&value) {
        Ok(value as f64)
    } else {
        Err(SheetError::usage(format!(
            "Integer {value} cannot be stored exactly in a workbook cell (limit is ±2^53)"
        )))
    }
}

fn column_index(position: usize) -> Result<u16> {
    position
        .checked_sub(1)
        .and_then(|idx| u16::try_from(idx).ok())
        .ok_or_else(|| SheetError::usage(format!("Column position {position} is out of range")))
}

fn default_num_format(value: &Value) -> Option<&'static str> {
    match value {
        Value::Date(_) => Some(ColumnType::Date.num_format()),
        Value::DateTime(_) => Some(ColumnType::DateTime.num_format()),
        _ => None,
    }
}

fn cell_format(value: &Value, column_type: Option<ColumnType>, style: Option<&CellStyle>) -> Format {
    let num_format = column_type
        .map(|t| t.num_format())
        .or_else(|| default_num_format(value));
    let format = match num_format {
        Some(code) => Format::new().set_num_format(code),
        None => Format::new(),
    };
    match style {
        Some(style) => style_format(format, style),
        None => format,
    }
}

fn style_format(mut format: Format, style: &CellStyle) -> Format {
    if let Some(color) = &style.fill_color {
        format = format.set_background_color(color.as_str());
    }
    if let Some(color) = &style.font_color {
        format = format.set_font_color(color.as_str());
    }
    if style.bold == Some(true) {
        format = format.set_bold();
    }
    if style.italic == Some(true) {
        format = format.set_italic();
    }
    if style.underline == Some(true) {
        format = format.set_underline(FormatUnderline::Single);
    }
    if let Some(code) = &style.num_format {
        format = format.set_num_format(code);
    }
    format
}

fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    format: &Format,
) -> Result<()> {
    match value {
        Value::String(s) => worksheet.write_string_with_format(row, col, s, format)?,
        Value::Integer(i) => worksheet.write_number_with_format(row, col, exact_number(*i)?, format)?,
        Value::Float(f) => worksheet.write_number_with_format(row, col, *f, format)?,
        Value::Boolean(b) => worksheet.write_boolean_with_format(row, col, *b, format)?,
        Value::Date(d) => worksheet.write_datetime_with_format(row, col, d, format)?,
        Value::DateTime(dt) => worksheet.write_datetime_with_format(row, col, dt, format)?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grid::{CellAddress, Row, StyleMap},
        order::resolve_layout,
        style::Colors,
    };
    use std::collections::BTreeSet;

    fn grid() -> SheetGrid {
        let headers: Vec<String> = ["Name", "Joined", "Score", "Active"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let layout = resolve_layout(&headers, None, &BTreeSet::new(), None).unwrap();
        let joined = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rows: Vec<Row> = vec![
            [
                ("Name".to_string(), Some(Value::from("Ada"))),
                ("Joined".to_string(), Some(Value::Date(joined))),
                ("Score".to_string(), Some(Value::Float(9.5))),
                ("Active".to_string(), Some(Value::Boolean(true))),
            ]
            .into_iter()
            .collect(),
            [
                ("Name".to_string(), Some(Value::from("Linus"))),
                ("Joined".to_string(), None),
                ("Score".to_string(), Some(Value::Integer(7))),
                ("Active".to_string(), None),
            ]
            .into_iter()
            .collect(),
        ];
        let mut grid = SheetGrid::from_parts(layout, rows);
        grid.styles = StyleMap::from([
            (CellAddress::new(2, 3), CellStyle::fill(Colors::WARNING).bold()),
            (CellAddress::new(3, 2), CellStyle::fill(Colors::NEUTRAL)),
        ]);
        grid.column_types.insert("Score".into(), ColumnType::Float);
        grid
    }

    #[test]
    fn workbook_bytes_read_back_at_layout_positions() {
        let bytes = xlsx_to_bytes(&grid(), "Report").unwrap();
        let data = read_xlsx_bytes(&bytes).unwrap();
        assert_eq!(data.header_names(), vec!["Name", "Joined", "Score", "Active"]);
        assert_eq!(data.header_map().get("Score"), Some(&3));
        assert_eq!(data.rows.len(), 2);

        let first = &data.rows[0];
        assert_eq!(first.number, 2);
        assert_eq!(first.cells.get(&1), Some(&Value::from("Ada")));
        assert_eq!(
            first.cells.get(&2),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
        assert_eq!(first.cells.get(&3), Some(&Value::Float(9.5)));
        assert_eq!(first.cells.get(&4), Some(&Value::Boolean(true)));

        let second = &data.rows[1];
        assert_eq!(second.cells.get(&3), Some(&Value::Integer(7)));
        assert!(!second.cells.contains_key(&2));
        assert!(!second.cells.contains_key(&4));
    }

    #[test]
    fn invalid_sheet_name_is_a_write_error() {
        let err = xlsx_to_bytes(&grid(), "bad[name]").unwrap_err();
        assert!(matches!(err, SheetError::XlsxWrite(_)));
    }

    #[test]
    fn garbage_bytes_are_a_read_error() {
        let err = read_xlsx_bytes(b"not a workbook").unwrap_err();
        assert!(matches!(err, SheetError::XlsxRead(_)));
    }

    #[test]
    fn serials_convert_to_dates_and_datetimes() {
        assert_eq!(
            serial_to_value(45352.0),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        let expected = NaiveDateTime::parse_from_str("2024-03-01 12:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        assert_eq!(serial_to_value(45352.520833333336), Value::DateTime(expected));
    }

    #[test]
    fn whole_floats_become_integers() {
        assert_eq!(normalise_float(42.0), Value::Integer(42));
        assert_eq!(normalise_float(-3.0), Value::Integer(-3));
        assert_eq!(normalise_float(2.5), Value::Float(2.5));
        assert_eq!(normalise_float(1.0e17), Value::Float(1.0e17));
    }

    fn single_column(header: &str, values: Vec<Value>) -> SheetGrid {
        let headers = vec![header.to_string()];
        let layout = resolve_layout(&headers, None, &BTreeSet::new(), None).unwrap();
        let rows: Vec<Row> = values
            .into_iter()
            .map(|value| Row::from([(header.to_string(), Some(value))]))
            .collect();
        SheetGrid::from_parts(layout, rows)
    }

    #[test]
    fn whole_floats_and_midnight_datetimes_keep_their_kind() {
        let midnight = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_time(NaiveTime::MIN);
        let values = vec![
            Value::Float(2.0),
            Value::Integer(2),
            Value::DateTime(midnight),
            Value::Date(midnight.date()),
            Value::Float(0.25),
        ];
        let bytes = xlsx_to_bytes(&single_column("Reading", values.clone()), "Data").unwrap();
        let data = read_xlsx_bytes(&bytes).unwrap();
        assert_eq!(data.header_names(), vec!["Reading"]);
        let read: Vec<Value> = data
            .rows
            .iter()
            .filter_map(|row| row.cells.get(&1).cloned())
            .collect();
        assert_eq!(read, values);
    }

    #[test]
    fn workbooks_without_ambiguous_cells_have_a_single_sheet() {
        let bytes = xlsx_to_bytes(&grid(), "Report").unwrap();
        let workbook = Xlsx::new(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Report".to_string()]);
    }

    #[test]
    fn integers_beyond_exact_float_range_are_rejected() {
        let limit = MAX_EXACT_INTEGER;
        let bytes = xlsx_to_bytes(&single_column("Id", vec![Value::Integer(limit)]), "Ids").unwrap();
        let data = read_xlsx_bytes(&bytes).unwrap();
        assert_eq!(data.rows[0].cells.get(&1), Some(&Value::Integer(limit)));

        let err = xlsx_to_bytes(
            &single_column("Id", vec![Value::Integer(9_007_199_254_740_993)]),
            "Ids",
        )
        .unwrap_err();
        match err {
            SheetError::Usage(message) => assert!(message.contains("9007199254740993")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn column_positions_map_to_zero_based_indices() {
        assert_eq!(column_index(1).unwrap(), 0);
        assert!(column_index(0).is_err());
    }
}
