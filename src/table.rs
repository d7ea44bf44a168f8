use std::borrow::Cow;
use std::fmt::Write as _;

use crate::sheet_io::SheetData;

/// Render the header row and up to `limit` data rows as an aligned text
/// table. The first column holds the sheet row number.
pub fn render_sheet(data: &SheetData, limit: usize) -> String {
    let mut headers = vec!["#".to_string()];
    headers.extend(data.headers.values().cloned());
    let rows: Vec<Vec<String>> = data
        .rows
        .iter()
        .take(limit)
        .map(|row| {
            std::iter::once(row.number.to_string())
                .chain(data.headers.keys().map(|position| {
                    row.cells
                        .get(position)
                        .map(|value| value.as_display())
                        .unwrap_or_default()
                }))
                .collect()
        })
        .collect();
    render_table(&headers, &rows)
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h).max(1)).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(3))).collect();
    let rule_widths: Vec<usize> = widths.iter().map(|w| (*w).max(3)).collect();
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
