//! Delimited text backend.
//!
//! CSV has no notion of styles or number formats, so a grid written here
//! keeps only its headers and display values. Everything read back is text;
//! typed columns get their values through column type hints or `FromCell`.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use csv::QuoteStyle;
use log::debug;

use crate::{
    data::Value,
    error::Result,
    grid::{FIRST_DATA_ROW, SheetGrid},
    sheet_io::{DEFAULT_CSV_DELIMITER, RawRow, SheetData},
};

pub fn open_csv_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_writer<W: Write>(writer: W, delimiter: u8) -> csv::Writer<W> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    builder.from_writer(writer)
}

pub fn write_csv(grid: &SheetGrid, path: &Path) -> Result<()> {
    write_delimited(grid, path, DEFAULT_CSV_DELIMITER)
}

pub fn read_csv(path: &Path) -> Result<SheetData> {
    read_delimited(path, DEFAULT_CSV_DELIMITER)
}

pub fn write_delimited(grid: &SheetGrid, path: &Path, delimiter: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = open_csv_writer(BufWriter::new(file), delimiter);
    write_grid(&mut writer, grid)?;
    writer.flush()?;
    debug!("Wrote {} row(s) to {path:?}", grid.rows.len());
    Ok(())
}

/// Serialise a grid into any writer. Styles and type hints are dropped.
pub fn write_grid<W: Write>(writer: &mut csv::Writer<W>, grid: &SheetGrid) -> Result<()> {
    if !grid.styles.is_empty() || !grid.column_types.is_empty() {
        debug!(
            "Dropping {} style override(s) and {} type hint(s): delimited output has no formatting",
            grid.styles.len(),
            grid.column_types.len()
        );
    }
    let headers = grid.headers();
    writer.write_record(&headers)?;
    for row in &grid.rows {
        let record = headers.iter().map(|header| {
            row.get(*header)
                .and_then(Option::as_ref)
                .map(Value::as_display)
                .unwrap_or_default()
        });
        writer.write_record(record)?;
    }
    Ok(())
}

pub fn read_delimited(path: &Path, delimiter: u8) -> Result<SheetData> {
    let file = File::open(path)?;
    let data = read_grid(BufReader::new(file), delimiter)?;
    debug!("Read {} row(s) from {path:?}", data.rows.len());
    Ok(data)
}

/// Parse delimited text whose first record is the header row.
pub fn read_grid<R: Read>(reader: R, delimiter: u8) -> Result<SheetData> {
    let mut reader = open_csv_reader(reader, delimiter);
    let mut records = reader.records();
    let Some(header_record) = records.next().transpose()? else {
        return Ok(SheetData::default());
    };
    let headers = header_record
        .iter()
        .enumerate()
        .filter_map(|(idx, field)| {
            let header = field.trim();
            (!header.is_empty()).then(|| (idx + 1, header.to_string()))
        })
        .collect();

    let mut rows = Vec::new();
    for (record, fallback) in records.zip(FIRST_DATA_ROW..) {
        let record = record?;
        // Empty lines produce no record, so numbering follows the file's lines.
        let number = record
            .position()
            .and_then(|position| u32::try_from(position.line()).ok())
            .unwrap_or(fallback);
        let cells: BTreeMap<usize, Value> = record
            .iter()
            .enumerate()
            .filter(|(_, field)| !field.is_empty())
            .map(|(idx, field)| (idx + 1, Value::String(field.to_string())))
            .collect();
        if !cells.is_empty() {
            rows.push(RawRow { number, cells });
        }
    }
    Ok(SheetData { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grid::{CellAddress, Row},
        order::resolve_layout,
        style::CellStyle,
    };
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn grid() -> SheetGrid {
        let headers = vec!["Name".to_string(), "Note".to_string(), "Age".to_string()];
        let layout = resolve_layout(&headers, None, &BTreeSet::new(), None).unwrap();
        let rows: Vec<Row> = vec![
            [
                ("Name".to_string(), Some(Value::from("Smith, Ada"))),
                ("Note".to_string(), None),
                ("Age".to_string(), Some(Value::Integer(36))),
            ]
            .into_iter()
            .collect(),
            [
                ("Name".to_string(), Some(Value::from("Linus"))),
                ("Note".to_string(), Some(Value::from("said \"hi\""))),
                ("Age".to_string(), Some(Value::Float(28.5))),
            ]
            .into_iter()
            .collect(),
        ];
        let mut grid = SheetGrid::from_parts(layout, rows);
        grid.styles
            .insert(CellAddress::new(2, 1), CellStyle::default().bold());
        grid
    }

    #[test]
    fn writes_display_values_and_reads_them_back_as_text() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("people.csv");
        write_csv(&grid(), &path).expect("write csv");

        let contents = std::fs::read_to_string(&path).expect("read csv");
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("Name,Note,Age"));
        assert_eq!(lines.next(), Some("\"Smith, Ada\",,36"));

        let data = read_csv(&path).expect("read back");
        assert_eq!(data.header_names(), vec!["Name", "Note", "Age"]);
        assert_eq!(data.rows[0].cells.get(&1), Some(&Value::from("Smith, Ada")));
        assert!(!data.rows[0].cells.contains_key(&2));
        assert_eq!(data.rows[1].cells.get(&2), Some(&Value::from("said \"hi\"")));
        assert_eq!(data.rows[1].cells.get(&3), Some(&Value::from("28.5")));
    }

    #[test]
    fn blank_rows_are_skipped_but_numbering_follows_the_file() {
        let text = " Name ,Age\nAda,36\n,\nLinus,28\n";
        let data = read_grid(text.as_bytes(), b',').unwrap();
        assert_eq!(data.header_names(), vec!["Name", "Age"]);
        let numbers: Vec<_> = data.rows.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![2, 4]);
    }

    #[test]
    fn row_numbers_count_empty_lines() {
        let text = "Id\n1\n\nx\n\n\n7\n";
        let data = read_grid(text.as_bytes(), b',').unwrap();
        let numbers: Vec<_> = data.rows.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![2, 4, 7]);
    }

    #[test]
    fn tab_delimited_input() {
        let text = "Name\tAge\nAda\t36\n";
        let data = read_grid(text.as_bytes(), b'\t').unwrap();
        assert_eq!(data.header_map().get("Age"), Some(&2));
        assert_eq!(data.rows[0].cells.get(&2), Some(&Value::from("36")));
    }

    #[test]
    fn empty_input_has_no_headers() {
        let data = read_grid("".as_bytes(), b',').unwrap();
        assert!(data.headers.is_empty());
        assert!(data.is_empty());
    }
}
