use crate::error::BinderError;
use crate::grid::CellValue;
use crate::grid::Coordinate;
use crate::table::nested::NestedRows;
use crate::table::nested::NestedWriter;

/// Field access implemented by every type bound to a table.
///
/// The engine never inspects a record; it hands raw cells to these hooks by
/// field name and reads cells back through them. Conversion errors are
/// reported with any error type and turn into binding failures.
///
/// ```ignore
/// impl TableRecord for Person {
///     fn set_field(&mut self, field: &str, value: &CellValue) -> anyhow::Result<()> {
///         match field {
///             "name" => self.name = String::from_cell(value)?,
///             "age" => self.age = Option::<i64>::from_cell(value)?,
///             _ => {}
///         }
///         Ok(())
///     }
///
///     fn field(&self, field: &str) -> anyhow::Result<CellValue> {
///         Ok(match field {
///             "name" => self.name.into_cell(),
///             "age" => self.age.into_cell(),
///             _ => CellValue::Empty,
///         })
///     }
/// }
/// ```
pub trait TableRecord: Default {
    fn set_field(&mut self, field: &str, value: &CellValue) -> anyhow::Result<()>;

    fn field(&self, field: &str) -> anyhow::Result<CellValue>;

    /// Stores one dynamic column of a map field.
    fn set_map_entry(&mut self, _field: &str, _key: &str, _value: &CellValue) -> anyhow::Result<()> {
        Ok(())
    }

    /// Entries of a map field, written under the header with the same key.
    fn map_entries(&self, _field: &str) -> anyhow::Result<Vec<(String, CellValue)>> {
        Ok(Vec::new())
    }

    /// Empty records are dropped on load when `ignore_empty_record` is set.
    fn is_empty_record(&self) -> bool {
        false
    }

    /// Formula text to write at `at` instead of the field value.
    fn formula(&self, _field: &str, _at: Coordinate) -> Option<String> {
        None
    }

    /// Receives the rows of a nested table spanned by this record.
    fn load_nested(&mut self, _field: &str, _rows: NestedRows<'_>) -> Result<(), BinderError> {
        Ok(())
    }

    /// Number of inner records of a nested field, used to size the record on save.
    fn nested_len(&self, _field: &str) -> usize {
        0
    }

    fn save_nested(&self, _field: &str, _writer: &mut NestedWriter<'_>) -> Result<(), BinderError> {
        Ok(())
    }
}
