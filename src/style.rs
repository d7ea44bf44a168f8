//! Per-cell presentation overrides.
//!
//! A column may carry a [`CellStyler`]; for every cell in that column the
//! styler sees the raw value, the whole row, the header, and the record index,
//! and may return a [`CellStyle`]. `None` leaves the cell at the writer's
//! default presentation.

use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    error::{Result, SheetError},
    grid::Row,
};

/// Presentation override for a single cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CellStyle {
    /// Background fill as `#RRGGBB`.
    pub fill_color: Option<String>,
    /// Font colour as `#RRGGBB`.
    pub font_color: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    /// Number format code overriding the column type's format.
    pub num_format: Option<String>,
}

impl CellStyle {
    pub fn fill(color: impl Into<String>) -> Self {
        Self {
            fill_color: Some(color.into()),
            ..Default::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = Some(true);
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = Some(true);
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = Some(true);
        self
    }

    pub fn font_color(mut self, color: impl Into<String>) -> Self {
        self.font_color = Some(color.into());
        self
    }

    /// Merge two styles; fields set on `other` win.
    pub fn merge(&self, other: &CellStyle) -> CellStyle {
        CellStyle {
            fill_color: other.fill_color.clone().or_else(|| self.fill_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            underline: other.underline.or(self.underline),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == CellStyle::default()
    }
}

/// Named fill colours for common review states.
pub struct Colors;

impl Colors {
    pub const UNCHANGED: &'static str = "#C6EFCE";
    pub const CHANGED: &'static str = "#FFEB9C";
    pub const WARNING: &'static str = "#F4B084";
    pub const ERROR: &'static str = "#FFC7CE";
    pub const INFO: &'static str = "#BDD7EE";
    pub const NEUTRAL: &'static str = "#EDEDED";
}

/// Everything a styler may look at for one cell.
#[derive(Debug, Clone, Copy)]
pub struct CellContext<'a> {
    pub value: Option<&'a Value>,
    pub row: &'a Row,
    pub header: &'a str,
    /// 0-based index of the record within the batch being written.
    pub row_index: usize,
}

/// Strategy choosing the presentation of a column's cells.
pub trait CellStyler: Send + Sync {
    fn style_of(&self, cell: &CellContext<'_>) -> anyhow::Result<Option<CellStyle>>;
}

impl<F> CellStyler for F
where
    F: Fn(&CellContext<'_>) -> anyhow::Result<Option<CellStyle>> + Send + Sync,
{
    fn style_of(&self, cell: &CellContext<'_>) -> anyhow::Result<Option<CellStyle>> {
        self(cell)
    }
}

/// Resolve the override for one cell. Styler errors are returned unchanged.
pub fn resolve_style(
    styler: Option<&dyn CellStyler>,
    cell: &CellContext<'_>,
) -> Result<Option<CellStyle>> {
    match styler {
        Some(styler) => styler.style_of(cell).map_err(SheetError::Strategy),
        None => Ok(None),
    }
}
