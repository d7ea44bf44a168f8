//! Write/read options and the on-disk layout configuration.
//!
//! A layout config is a small YAML or JSON document:
//!
//! ```yaml
//! sheet_name: Users
//! column_order:
//!   Name: 1
//!   Email: 2
//! dynamic_column_order:
//!   Sales: 10
//! dynamic_columns: true
//! ```
//!
//! The format is picked from the file extension; anything other than `.json`
//! is parsed as YAML.

use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, SheetError},
    grid::GridBuilder,
    order::{DynamicRanker, Rank, StaticRanker},
    xlsx::DEFAULT_SHEET_NAME,
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    /// Static header to rank.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub column_order: BTreeMap<String, Rank>,
    /// Dynamic key to rank; keys absent from a batch are ignored.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dynamic_column_order: BTreeMap<String, Rank>,
    /// Collect unmapped columns into the dynamic field on read.
    pub dynamic_columns: bool,
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl LayoutConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let parsed = if is_json(path) {
            serde_json::from_reader(reader).map_err(|err| err.to_string())
        } else {
            serde_yaml::from_reader(reader).map_err(|err| err.to_string())
        };
        parsed.map_err(|err| SheetError::Config(format!("{path:?}: {err}")))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        if is_json(path) {
            serde_json::to_writer_pretty(&mut writer, self)
                .map_err(|err| SheetError::Config(err.to_string()))?;
        } else {
            serde_yaml::to_writer(&mut writer, self)
                .map_err(|err| SheetError::Config(err.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).map_err(|err| SheetError::Config(err.to_string()))
    }

    pub fn write_options(&self) -> WriteOptions {
        let mut options = WriteOptions::new();
        if let Some(name) = &self.sheet_name {
            options = options.sheet_name(name.clone());
        }
        if !self.column_order.is_empty() {
            options = options.static_order(self.column_order.clone());
        }
        if !self.dynamic_column_order.is_empty() {
            options = options.dynamic_order(self.dynamic_column_order.clone());
        }
        options
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            dynamic_columns: self.dynamic_columns,
        }
    }
}

/// How records are laid out on write.
pub struct WriteOptions {
    pub sheet_name: String,
    pub static_order: Option<Box<dyn StaticRanker>>,
    pub dynamic_order: Option<Box<dyn DynamicRanker>>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            static_order: None,
            dynamic_order: None,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    pub fn static_order(mut self, ranker: impl StaticRanker + 'static) -> Self {
        self.static_order = Some(Box::new(ranker));
        self
    }

    pub fn dynamic_order(mut self, ranker: impl DynamicRanker + 'static) -> Self {
        self.dynamic_order = Some(Box::new(ranker));
        self
    }

    pub fn grid_builder(&self) -> GridBuilder<'_> {
        let mut builder = GridBuilder::new();
        if let Some(ranker) = self.static_order.as_deref() {
            builder = builder.static_order(ranker);
        }
        if let Some(ranker) = self.dynamic_order.as_deref() {
            builder = builder.dynamic_order(ranker);
        }
        builder
    }
}

impl fmt::Debug for WriteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOptions")
            .field("sheet_name", &self.sheet_name)
            .field("static_order", &self.static_order.is_some())
            .field("dynamic_order", &self.dynamic_order.is_some())
            .finish()
    }
}

/// How records are rebuilt on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Collect headers no static column claims into the dynamic field.
    pub dynamic_columns: bool,
}

impl ReadOptions {
    pub fn with_dynamic_columns() -> Self {
        Self {
            dynamic_columns: true,
        }
    }
}
