//! # Table Module
//!
//! Locates tables inside a [`Grid`] and binds their rows to records.
//!
//! A [`TableLayout`] declares how to find the table (an [`AnchorSpec`]), which
//! header columns feed which record fields ([`ColumnSpec`]), optional nested
//! tables, and the [`TableOptions`] governing where the body ends and how
//! rows are added or removed on save. Layouts can be built in code or loaded
//! from YAML:
//!
//! ```yaml
//! name: attendance
//! anchor:
//!   label:
//!     text: Name
//! columns:
//!   - field: name
//!     label: Name
//!   - field: days
//!     map:
//!       previous_column_name: Name
//!       next_column_name: Note
//! options:
//!   terminal: empty
//!   over_policy: insert
//!   remained_policy: delete
//! ```
//!
//! [`resolve_table`] turns a layout into a [`TableHandle`] for one grid, which
//! [`extract_records`] reads and [`write_records`] writes.
use crate::error::BinderError;
use crate::error::ResultMessage;
use crate::grid::workbook::MemoryWorkbook;
use crate::grid::workbook::SheetSelection;
use crate::grid::Coordinate;
use crate::grid::Grid;
use crate::record::TableRecord;
use crate::table::terminal::TerminalCheck;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub mod anchor;
pub mod column;
pub mod extract;
pub mod nested;
pub mod terminal;
pub mod write;

pub use anchor::resolve_anchor;
pub use anchor::AnchorSpec;
pub use anchor::Direction;
pub use anchor::LabelAnchor;
pub use column::resolve_columns;
pub use column::ColumnBinding;
pub use column::ColumnMapping;
pub use column::ColumnSpec;
pub use column::MapColumnSpec;
pub use extract::extract_records;
pub use extract::BindFailure;
pub use extract::ExtractedRecord;
pub use extract::RecordExtractor;
pub use nested::NestedHandle;
pub use nested::NestedLayout;
pub use nested::NestedRelation;
pub use terminal::LabelPattern;
pub use terminal::TableTerminal;
pub use write::write_records;
pub use write::OverRecordPolicy;
pub use write::RemainedRecordPolicy;
pub use write::WriteReport;

/// Errors raised while resolving, reading or writing a table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Invalid table configuration: {0}")]
    Configuration(String),

    #[error("Table anchor {0} not found")]
    AnchorNotFound(String),

    #[error("Header label '{label}' not found in row {row}")]
    LabelNotFound { label: String, row: usize },

    #[error("Table '{table}', record {record}, field '{field}' at {at}: {message}")]
    TypeBinding {
        table: String,
        record: usize,
        field: String,
        at: Coordinate,
        message: String,
    },
}

/// Behavior switches of one table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableOptions {
    /// Where the body ends (default: first blank row)
    pub terminal: TableTerminal,
    /// Records beyond the template rows (default: insert rows)
    pub over_policy: OverRecordPolicy,
    /// Template rows beyond the records (default: clear them)
    pub remained_policy: RemainedRecordPolicy,
    /// Drop records reporting themselves empty (default: true)
    pub ignore_empty_record: bool,
    /// Collect conversion failures instead of stopping at the first one
    pub continue_on_bind_failure: bool,
    /// Merge the cells of multi-row records vertically, and copy row merges onto inserted rows
    pub merge_cell_on_save: bool,
    /// Ignore whitespace when comparing labels (default: true)
    pub normalize_whitespace: bool,
    /// Blank header cells allowed between two labels
    pub header_space_tolerance: usize,
    /// Rows per record (default: 1)
    pub record_height: usize,
    /// Stretch records of a table hosting nested tables over the vertical merges starting on their row
    pub merged_record_height: bool,
    /// Rows between the header origin and the first data row, derived from the header when unset
    pub data_row_offset: Option<usize>,
    /// Template rows on save, derived from the terminal when unset
    pub template_rows: Option<usize>,
    /// Maximum number of records to read
    pub limit: Option<usize>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            terminal: TableTerminal::Empty,
            over_policy: OverRecordPolicy::Insert,
            remained_policy: RemainedRecordPolicy::Clear,
            ignore_empty_record: true,
            continue_on_bind_failure: false,
            merge_cell_on_save: false,
            normalize_whitespace: true,
            header_space_tolerance: 0,
            record_height: 1,
            merged_record_height: false,
            data_row_offset: None,
            template_rows: None,
            limit: None,
        }
    }
}

impl TableOptions {
    pub fn terminal(mut self, terminal: TableTerminal) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn over_policy(mut self, policy: OverRecordPolicy) -> Self {
        self.over_policy = policy;
        self
    }

    pub fn remained_policy(mut self, policy: RemainedRecordPolicy) -> Self {
        self.remained_policy = policy;
        self
    }

    pub fn ignore_empty_record(mut self, ignore: bool) -> Self {
        self.ignore_empty_record = ignore;
        self
    }

    pub fn continue_on_bind_failure(mut self, keep_going: bool) -> Self {
        self.continue_on_bind_failure = keep_going;
        self
    }

    pub fn merge_cell_on_save(mut self, merge: bool) -> Self {
        self.merge_cell_on_save = merge;
        self
    }

    pub fn normalize_whitespace(mut self, normalize: bool) -> Self {
        self.normalize_whitespace = normalize;
        self
    }

    pub fn header_space_tolerance(mut self, tolerance: usize) -> Self {
        self.header_space_tolerance = tolerance;
        self
    }

    pub fn record_height(mut self, height: usize) -> Self {
        self.record_height = height;
        self
    }

    pub fn merged_record_height(mut self, merged: bool) -> Self {
        self.merged_record_height = merged;
        self
    }

    pub fn data_row_offset(mut self, offset: usize) -> Self {
        self.data_row_offset = Some(offset);
        self
    }

    pub fn template_rows(mut self, rows: usize) -> Self {
        self.template_rows = Some(rows);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Declarative description of one table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableLayout {
    /// Used in diagnostics
    pub name: String,
    /// Required for top-level tables; nested tables default to the outer header
    pub anchor: Option<AnchorSpec>,
    pub columns: Vec<ColumnSpec>,
    pub nested: Vec<NestedLayout>,
    pub options: TableOptions,
}

impl TableLayout {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Reads a layout from YAML.
    pub fn from_yaml_reader<R: std::io::Read>(reader: R) -> Result<Self, BinderError> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Reads a layout from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, BinderError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> Result<String, BinderError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn with_anchor(mut self, anchor: AnchorSpec) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_nested(mut self, nested: NestedLayout) -> Self {
        self.nested.push(nested);
        self
    }

    pub fn with_options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }
}

/// A table located in one grid.
#[derive(Clone, Debug)]
pub struct TableHandle {
    pub name: String,
    /// Header origin
    pub origin: Coordinate,
    pub mapping: ColumnMapping,
    pub options: TableOptions,
    pub nested: Vec<NestedHandle>,
    pub(crate) terminal: TerminalCheck,
}

impl TableHandle {
    pub fn first_data_row(&self) -> usize {
        self.mapping.first_data_row
    }

    pub fn bindings(&self) -> &[ColumnBinding] {
        &self.mapping.bindings
    }

    /// Every column the table reads or writes, nested tables included.
    pub fn columns(&self) -> Vec<usize> {
        let mut columns = self.mapping.columns();
        for nested in &self.nested {
            columns.extend(nested.handle.columns());
        }
        columns
    }
}

fn build_handle(grid: &dyn Grid, name: &str, origin: Coordinate, layout: &TableLayout) -> Result<TableHandle, BinderError> {
    let options = &layout.options;
    if options.record_height == 0 {
        return Err(TableError::Configuration(format!("record height of table '{}' must be at least 1", name)).into());
    }
    if options.data_row_offset == Some(0) {
        return Err(TableError::Configuration(format!("data rows of table '{}' must start below its header", name)).into());
    }
    let mapping = resolve_columns(grid, origin, &layout.columns, options)?;
    let nested = layout
        .nested
        .iter()
        .filter_map(|nested| resolve_nested(grid, name, origin, nested).transpose())
        .collect::<Result<Vec<NestedHandle>, BinderError>>()?;
    let terminal = TerminalCheck::new(
        &options.terminal,
        mapping.columns(),
        (origin.column, mapping.last_header.column),
        options.normalize_whitespace,
    )?;
    log::debug!(
        "Table '{}' at {}: {} binding(s), data from row {}",
        name,
        origin,
        mapping.bindings.len(),
        mapping.first_data_row + 1
    );
    Ok(TableHandle {
        name: name.to_owned(),
        origin,
        mapping,
        options: options.clone(),
        nested,
        terminal,
    })
}

/// Resolves a nested table, `Ok(None)` when its optional anchor is not found.
fn resolve_nested(
    grid: &dyn Grid,
    outer: &str,
    origin: Coordinate,
    nested: &NestedLayout,
) -> Result<Option<NestedHandle>, BinderError> {
    let inner = &nested.table;
    let origin = match &inner.anchor {
        Some(anchor) => match resolve_anchor(grid, anchor, inner.options.normalize_whitespace)? {
            Some(origin) => origin,
            None => {
                log::debug!("Nested field '{}' of table '{}' is absent", nested.field, outer);
                return Ok(None);
            }
        },
        None => origin,
    };
    let name = if inner.name.is_empty() {
        format!("{}.{}", outer, nested.field)
    } else {
        inner.name.to_owned()
    };
    Ok(Some(NestedHandle {
        field: nested.field.to_owned(),
        relation: nested.relation,
        handle: build_handle(grid, &name, origin, inner)?,
    }))
}

/// Locates a table. Returns `Ok(None)` when an optional anchor is not found.
pub fn resolve_table(grid: &dyn Grid, layout: &TableLayout) -> Result<Option<TableHandle>, BinderError> {
    let anchor = layout
        .anchor
        .as_ref()
        .ok_or_else(|| TableError::Configuration(format!("table '{}' has no anchor", layout.name)))?;
    match resolve_anchor(grid, anchor, layout.options.normalize_whitespace)? {
        Some(origin) => Ok(Some(build_handle(grid, &layout.name, origin, layout)?)),
        None => Ok(None),
    }
}

/// Records of one table with their diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct TableLoad<T> {
    pub records: Vec<ExtractedRecord<T>>,
    /// Binding failures of every record
    pub failures: Vec<BindFailure>,
}

impl<T> TableLoad<T> {
    pub fn values(self) -> Vec<T> {
        self.records.into_iter().map(|record| record.value).collect()
    }
}

/// Resolves a table and reads all of its records.
pub fn load_table<T: TableRecord>(grid: &dyn Grid, layout: &TableLayout) -> Result<Option<TableLoad<T>>, BinderError> {
    let Some(handle) = resolve_table(grid, layout)? else {
        return Ok(None);
    };
    let records = extract_records::<T>(grid, &handle).collect::<Result<Vec<ExtractedRecord<T>>, BinderError>>()?;
    let failures = records
        .iter()
        .flat_map(|record| record.failures.iter().cloned())
        .collect();
    Ok(Some(TableLoad { records, failures }))
}

/// Resolves a table and writes records into it.
pub fn save_table<T: TableRecord>(
    grid: &mut dyn Grid,
    layout: &TableLayout,
    records: &[T],
) -> Result<Option<WriteReport>, BinderError> {
    let Some(handle) = resolve_table(grid, layout)? else {
        return Ok(None);
    };
    write_records(grid, &handle, records).map(Some)
}

/// Loads the same table from every selected sheet, skipping sheets without it.
pub fn load_sheets<T: TableRecord>(
    workbook: &MemoryWorkbook,
    selection: &SheetSelection,
    layout: &TableLayout,
) -> Result<Vec<(String, TableLoad<T>)>, BinderError> {
    let mut loads = Vec::new();
    for sheet in workbook.select(selection) {
        if let Some(load) = load_table::<T>(sheet, layout).with_prefix(sheet.name())? {
            loads.push((sheet.name().to_owned(), load));
        }
    }
    Ok(loads)
}
