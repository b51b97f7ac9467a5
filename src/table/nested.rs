use crate::error::BinderError;
use crate::grid::Grid;
use crate::record::TableRecord;
use crate::table::extract::RecordExtractor;
use crate::table::write::write_span;
use crate::table::write::WriteReport;
use crate::table::TableError;
use crate::table::TableHandle;
use crate::table::TableLayout;
use serde::Deserialize;
use serde::Serialize;
use std::ops::Range;

/// How many inner records belong to one outer record.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NestedRelation {
    /// Zero or more
    #[default]
    List,
    /// Zero or one
    Singleton,
}

/// A table held by one field of each outer record.
///
/// Inner columns sit in the outer header row unless the inner layout has its
/// own anchor. Each outer record confines its inner records to its own rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NestedLayout {
    pub field: String,
    #[serde(default)]
    pub relation: NestedRelation,
    pub table: TableLayout,
}

impl NestedLayout {
    pub fn list(field: &str, table: TableLayout) -> Self {
        Self {
            field: field.to_owned(),
            relation: NestedRelation::List,
            table,
        }
    }

    pub fn singleton(field: &str, table: TableLayout) -> Self {
        Self {
            field: field.to_owned(),
            relation: NestedRelation::Singleton,
            table,
        }
    }
}

/// A resolved nested table.
#[derive(Clone, Debug)]
pub struct NestedHandle {
    pub field: String,
    pub relation: NestedRelation,
    pub handle: TableHandle,
}

/// Inner rows of one outer record, handed to [`TableRecord::load_nested`].
pub struct NestedRows<'a> {
    grid: &'a dyn Grid,
    nested: &'a NestedHandle,
    rows: Range<usize>,
}

impl<'a> NestedRows<'a> {
    pub(crate) fn new(grid: &'a dyn Grid, nested: &'a NestedHandle, rows: Range<usize>) -> Self {
        Self { grid, nested, rows }
    }

    pub fn relation(&self) -> NestedRelation {
        self.nested.relation
    }

    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    /// Reads the inner records, skipping blank rows.
    pub fn extract<U: TableRecord>(&self) -> RecordExtractor<'a, U> {
        RecordExtractor::new(self.grid, &self.nested.handle, Some(self.rows.clone()))
    }

    pub fn records<U: TableRecord>(&self) -> Result<Vec<U>, BinderError> {
        let limit = match self.nested.relation {
            NestedRelation::List => usize::MAX,
            NestedRelation::Singleton => 1,
        };
        self.extract()
            .take(limit)
            .map(|record| record.map(|record| record.value))
            .collect()
    }

    /// The first inner record, for singleton relations.
    pub fn single<U: TableRecord>(&self) -> Result<Option<U>, BinderError> {
        self.extract().next().transpose().map(|record| record.map(|record| record.value))
    }
}

/// Inner rows of one outer record, handed to [`TableRecord::save_nested`].
pub struct NestedWriter<'a> {
    pub(crate) grid: &'a mut dyn Grid,
    pub(crate) nested: &'a NestedHandle,
    pub(crate) rows: Range<usize>,
    pub(crate) report: &'a mut WriteReport,
}

impl NestedWriter<'_> {
    pub fn relation(&self) -> NestedRelation {
        self.nested.relation
    }

    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    /// Writes inner records on consecutive rows of the outer record and
    /// blanks the inner cells of rows left over.
    pub fn write<U: TableRecord>(&mut self, records: &[U]) -> Result<(), BinderError> {
        if self.nested.relation == NestedRelation::Singleton && records.len() > 1 {
            return Err(TableError::Configuration(format!(
                "nested field '{}' holds at most one record, got {}",
                self.nested.field,
                records.len()
            ))
            .into());
        }
        write_span(self.grid, &self.nested.handle, records, self.rows.clone(), self.report)
    }

    pub fn write_single<U: TableRecord>(&mut self, record: Option<&U>) -> Result<(), BinderError> {
        match record {
            Some(record) => self.write(std::slice::from_ref(record)),
            None => self.write::<U>(&[]),
        }
    }
}
