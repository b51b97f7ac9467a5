use crate::error::BinderError;
use crate::grid::Coordinate;
use crate::grid::Grid;
use crate::record::TableRecord;
use crate::table::nested::NestedRows;
use crate::table::TableError;
use crate::table::TableHandle;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::Range;

/// A field that could not be bound.
#[derive(Clone, Debug, PartialEq)]
pub struct BindFailure {
    /// Index of the record within its table
    pub record: usize,
    pub field: String,
    pub at: Coordinate,
    /// Header label of the field's column
    pub label: String,
    pub message: String,
}

impl BindFailure {
    pub(crate) fn into_error(self, table: &str) -> TableError {
        TableError::TypeBinding {
            table: table.to_owned(),
            record: self.record,
            field: self.field,
            at: self.at,
            message: self.message,
        }
    }
}

/// A record read from one table row, with where each of its fields came from.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedRecord<T> {
    pub value: T,
    /// Position among the records yielded by the table
    pub index: usize,
    /// First grid row of the record
    pub row: usize,
    /// Rows covered by the record
    pub height: usize,
    pub field_positions: BTreeMap<String, Coordinate>,
    pub field_labels: BTreeMap<String, String>,
    pub map_entry_positions: BTreeMap<String, Coordinate>,
    /// Fields that failed to bind, when failures do not stop the table
    pub failures: Vec<BindFailure>,
}

/// Lazy, single-pass reader of the records of one table.
///
/// Reading never touches the grid, so the iterator can be dropped at any
/// point. Without `continue_on_bind_failure` the first failing field is
/// yielded as an error and ends the iteration.
pub struct RecordExtractor<'a, T> {
    grid: &'a dyn Grid,
    handle: &'a TableHandle,
    /// Rows of an outer record confining a nested table
    span: Option<Range<usize>>,
    row: usize,
    scanned: usize,
    emitted: usize,
    finished: bool,
    _record: PhantomData<T>,
}

/// Reads the records of a resolved table.
pub fn extract_records<'a, T: TableRecord>(grid: &'a dyn Grid, handle: &'a TableHandle) -> RecordExtractor<'a, T> {
    RecordExtractor::new(grid, handle, None)
}

impl<'a, T: TableRecord> RecordExtractor<'a, T> {
    pub(crate) fn new(grid: &'a dyn Grid, handle: &'a TableHandle, span: Option<Range<usize>>) -> Self {
        let row = span
            .as_ref()
            .map_or(handle.mapping.first_data_row, |span| span.start);
        Self {
            grid,
            handle,
            span,
            row,
            scanned: 0,
            emitted: 0,
            finished: false,
            _record: PhantomData,
        }
    }

    fn is_past_end(&self, row: usize) -> bool {
        match &self.span {
            Some(span) => row >= span.end,
            None => self.handle.terminal.stops_at(self.grid, row, self.scanned),
        }
    }

    /// Rows taken by the record starting at `row`.
    ///
    /// Records step by `record_height`. Tables hosting nested tables may opt
    /// into `merged_record_height`, stretching each outer record over the
    /// vertical merges starting on its row.
    fn record_height(&self, row: usize) -> usize {
        let options = &self.handle.options;
        let height = if options.merged_record_height && !self.handle.nested.is_empty() {
            self.handle
                .mapping
                .columns()
                .into_iter()
                .filter_map(|column| self.grid.find_merged_region(Coordinate::new(column, row)))
                .filter(|region| region.top() == row)
                .map(|region| region.height())
                .fold(options.record_height, usize::max)
        } else {
            options.record_height
        };
        match &self.span {
            Some(span) => height.min(span.end - row),
            None => height,
        }
    }

    fn bind_row(&self, row: usize, height: usize) -> Result<ExtractedRecord<T>, BinderError> {
        let mut record = ExtractedRecord {
            value: T::default(),
            index: self.emitted,
            row,
            height,
            field_positions: BTreeMap::new(),
            field_labels: BTreeMap::new(),
            map_entry_positions: BTreeMap::new(),
            failures: Vec::new(),
        };
        for binding in &self.handle.mapping.bindings {
            if binding.is_map_range {
                for key in &binding.map_keys {
                    let at = Coordinate::new(key.column, row);
                    let value = self.grid.merged_value(at);
                    if let Err(e) = record.value.set_map_entry(&binding.field, &key.key, &value) {
                        record.failures.push(BindFailure {
                            record: self.emitted,
                            field: format!("{}[{}]", binding.field, key.key),
                            at,
                            label: key.key.to_owned(),
                            message: e.to_string(),
                        });
                    }
                    record.map_entry_positions.insert(key.key.to_owned(), at);
                }
            } else {
                let at = Coordinate::new(binding.column(), row);
                let value = self.grid.merged_value(at);
                if let Err(e) = record.value.set_field(&binding.field, &value) {
                    record.failures.push(BindFailure {
                        record: self.emitted,
                        field: binding.field.to_owned(),
                        at,
                        label: binding.label.to_owned(),
                        message: e.to_string(),
                    });
                }
                record.field_positions.insert(binding.field.to_owned(), at);
                record.field_labels.insert(binding.field.to_owned(), binding.label.to_owned());
            }
        }
        for nested in &self.handle.nested {
            let rows = NestedRows::new(self.grid, nested, row..row + height);
            record.value.load_nested(&nested.field, rows)?;
        }
        Ok(record)
    }
}

impl<T: TableRecord> Iterator for RecordExtractor<'_, T> {
    type Item = Result<ExtractedRecord<T>, BinderError>;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.handle;
        let options = &handle.options;
        while !self.finished {
            if options.limit.is_some_and(|limit| self.emitted >= limit) || self.is_past_end(self.row) {
                self.finished = true;
                break;
            }
            let row = self.row;
            let height = self.record_height(row);
            self.row += height;
            self.scanned += height;
            // Blank rows inside an outer record are padding
            if self.span.is_some() && handle.terminal.is_blank_row(self.grid, row) {
                continue;
            }
            let mut record = match self.bind_row(row, height) {
                Ok(record) => record,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };
            if !options.continue_on_bind_failure && !record.failures.is_empty() {
                self.finished = true;
                let failure = record.failures.remove(0);
                return Some(Err(failure.into_error(&handle.name).into()));
            }
            if options.ignore_empty_record && record.value.is_empty_record() {
                log::debug!("Skip empty record at row {}", row + 1);
                continue;
            }
            self.emitted += 1;
            return Some(Ok(record));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::FromCell;
    use crate::convert::IntoCell;
    use crate::grid::memory::MemorySheet;
    use crate::grid::CellValue;
    use crate::table::resolve_table;
    use crate::table::AnchorSpec;
    use crate::table::ColumnSpec;
    use crate::table::LabelAnchor;
    use crate::table::LabelPattern;
    use crate::table::TableLayout;
    use crate::table::TableOptions;
    use crate::table::TableTerminal;
    use pretty_assertions::assert_eq;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Person {
        name: String,
        age: Option<i64>,
    }

    impl TableRecord for Person {
        fn set_field(&mut self, field: &str, value: &CellValue) -> anyhow::Result<()> {
            match field {
                "name" => self.name = String::from_cell(value)?,
                "age" => self.age = Option::<i64>::from_cell(value)?,
                _ => {}
            }
            Ok(())
        }

        fn field(&self, field: &str) -> anyhow::Result<CellValue> {
            Ok(match field {
                "name" => self.name.into_cell(),
                "age" => self.age.into_cell(),
                _ => CellValue::Empty,
            })
        }

        fn is_empty_record(&self) -> bool {
            self.name.is_empty() && self.age.is_none()
        }
    }

    fn person(name: &str, age: Option<i64>) -> Person {
        Person {
            name: name.to_owned(),
            age,
        }
    }

    fn layout(options: TableOptions) -> TableLayout {
        TableLayout::new("people")
            .with_anchor(AnchorSpec::label(LabelAnchor::new("Name")))
            .with_column(ColumnSpec::new("name", "Name"))
            .with_column(ColumnSpec::new("age", "Age").optional())
            .with_options(options)
    }

    fn read(sheet: &MemorySheet, options: TableOptions) -> Vec<Person> {
        let handle = resolve_table(sheet, &layout(options)).unwrap().unwrap();
        extract_records::<Person>(sheet, &handle)
            .map(|record| record.unwrap().value)
            .collect()
    }

    #[test]
    fn scenario_names_until_blank_row() {
        let mut sheet = MemorySheet::new("");
        sheet.set("B3", "Name").set("B4", "Alice").set("B5", "Bob");
        let names: Vec<String> = read(&sheet, TableOptions::default())
            .into_iter()
            .map(|person| person.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn blank_row_ends_table() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "Age"]);
        sheet.set_row("A2", &["Alice", "30"]);
        sheet.set_row("A4", &["Carol", "41"]);
        assert_eq!(read(&sheet, TableOptions::default()), vec![person("Alice", Some(30))]);
    }

    #[test]
    fn merged_cells_propagate() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "Age"]);
        sheet.set_row("A2", &["Alice", "30"]);
        sheet.set("B3", 31.0).set("B4", 32.0);
        sheet.merge_region("A2:A4".parse().unwrap()).unwrap();
        for row in 1..4 {
            assert_eq!(sheet.merged_value(Coordinate::new(0, row)), CellValue::text("Alice"));
        }
        let handle = resolve_table(&sheet, &layout(TableOptions::default())).unwrap().unwrap();
        let records: Vec<ExtractedRecord<Person>> = extract_records(&sheet, &handle)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|record| record.height == 1));
        assert_eq!(
            records.into_iter().map(|record| record.value).collect::<Vec<Person>>(),
            vec![
                person("Alice", Some(30)),
                person("Alice", Some(31)),
                person("Alice", Some(32)),
            ]
        );
    }

    #[test]
    fn merged_record_height_needs_nested_tables() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "Age"]);
        sheet.set_row("A2", &["Alice", "30"]);
        sheet.set("B3", 31.0).set("B4", 32.0);
        sheet.merge_region("A2:A4".parse().unwrap()).unwrap();
        let ages: Vec<Option<i64>> = read(&sheet, TableOptions::default().merged_record_height(true))
            .into_iter()
            .map(|person| person.age)
            .collect();
        assert_eq!(ages, vec![Some(30), Some(31), Some(32)]);
    }

    #[test]
    fn merged_cells_repeat_with_record_height_one() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Age", "Name"]);
        sheet.set("A2", 30.0).set("B2", "Alice").set("B3", "Bob");
        sheet.merge_region("A2:A3".parse().unwrap()).unwrap();
        let layout = TableLayout::new("people")
            .with_anchor(AnchorSpec::address("A1"))
            .with_column(ColumnSpec::new("name", "Name"));
        let handle = resolve_table(&sheet, &layout).unwrap().unwrap();
        let names: Vec<String> = extract_records::<Person>(&sheet, &handle)
            .map(|record| record.unwrap().value.name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn positions_and_labels() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("C5", &["Name", "Age"]);
        sheet.set_row("C6", &["Alice", "30"]);
        let handle = resolve_table(&sheet, &layout(TableOptions::default())).unwrap().unwrap();
        let record = extract_records::<Person>(&sheet, &handle).next().unwrap().unwrap();
        assert_eq!(record.index, 0);
        assert_eq!(record.row, 5);
        assert_eq!(record.field_positions["age"], Coordinate::new(3, 5));
        assert_eq!(record.field_labels["name"], "Name");
    }

    #[test]
    fn empty_records() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "Age", "Note"]);
        sheet.set_row("A2", &["Alice", "30"]);
        sheet.set("C3", "no name");
        sheet.set_row("A4", &["Bob"]);
        let options = TableOptions::default().terminal(TableTerminal::FixedRange(3));
        assert_eq!(
            read(&sheet, options.clone()),
            vec![person("Alice", Some(30)), person("Bob", None)]
        );
        assert_eq!(read(&sheet, options.ignore_empty_record(false)).len(), 3);
    }

    #[test]
    fn label_terminal_and_limit() {
        let mut sheet = MemorySheet::new("");
        sheet.set("A1", "Name");
        for (row, name) in ["a", "b", "c", "Total", "d"].iter().enumerate() {
            sheet.set(&format!("A{}", row + 2), *name);
        }
        let options = TableOptions::default().terminal(TableTerminal::LabelMatch(LabelPattern::text("Total")));
        assert_eq!(read(&sheet, options.clone()).len(), 3);
        assert_eq!(read(&sheet, options.limit(2)).len(), 2);
    }

    #[test]
    fn fail_fast_on_bind_failure() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "Age"]);
        sheet.set_row("A2", &["Alice", "thirty"]);
        sheet.set_row("A3", &["Bob", "40"]);
        let handle = resolve_table(&sheet, &layout(TableOptions::default())).unwrap().unwrap();
        let mut records = extract_records::<Person>(&sheet, &handle);
        match records.next() {
            Some(Err(BinderError::TableError(TableError::TypeBinding { table, record, field, at, .. }))) => {
                assert_eq!((table.as_str(), record, field.as_str()), ("people", 0, "age"));
                assert_eq!(at, Coordinate::new(1, 1));
            }
            other => panic!("unexpected {:?}", other.map(|record| record.map(|record| record.value))),
        }
        assert!(records.next().is_none());
    }

    #[test]
    fn continue_on_bind_failure() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "Age"]);
        sheet.set_row("A2", &["Alice", "thirty"]);
        sheet.set_row("A3", &["Bob", "40"]);
        let handle = resolve_table(&sheet, &layout(TableOptions::default().continue_on_bind_failure(true)))
            .unwrap()
            .unwrap();
        let records: Vec<ExtractedRecord<Person>> = extract_records(&sheet, &handle)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].failures.len(), 1);
        assert_eq!(records[0].failures[0].label, "Age");
        assert_eq!(records[0].value, person("Alice", None));
        assert_eq!(records[1].value, person("Bob", Some(40)));
    }

    #[test]
    fn header_limit_terminal() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "Age", "Remark"]);
        sheet.set_row("A2", &["Alice", "30", "ok"]);
        sheet.set_row("A3", &["Bob", "40"]);
        sheet.set("C4", "outside the table");
        sheet.set_row("A5", &["Carol", "50"]);
        let options = TableOptions::default().terminal(TableTerminal::HeaderLimit(2));
        let handle = resolve_table(&sheet, &layout(options.clone())).unwrap().unwrap();
        assert_eq!(handle.mapping.last_header, Coordinate::new(1, 0));
        assert_eq!(read(&sheet, options), vec![person("Alice", Some(30)), person("Bob", Some(40))]);
    }

    #[test]
    fn terminal_evaluation_order() {
        let mut sheet = MemorySheet::new("");
        sheet.set("A1", "Name");
        for (row, name) in ["a", "b", "Total", "c"].iter().enumerate() {
            sheet.set(&format!("A{}", row + 2), *name);
        }
        let names = |options: TableOptions| -> Vec<String> {
            read(&sheet, options).into_iter().map(|person| person.name).collect()
        };
        let total = TableTerminal::LabelMatch(LabelPattern::text("Total"));
        // The label ends the body before the counters run out
        assert_eq!(names(TableOptions::default().terminal(total.clone()).limit(10)), vec!["a", "b"]);
        assert_eq!(names(TableOptions::default().terminal(total).limit(1)), vec!["a"]);
        // Fixed ranges count rows whatever they hold
        assert_eq!(
            names(TableOptions::default().terminal(TableTerminal::FixedRange(4))),
            vec!["a", "b", "Total", "c"]
        );
        assert_eq!(
            names(TableOptions::default().terminal(TableTerminal::FixedRange(4)).limit(2)),
            vec!["a", "b"]
        );
    }

    #[test]
    fn border_terminal() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "Age"]);
        sheet.set_row("A2", &["Alice", "30"]);
        sheet.set_row("A3", &["Bob", "40"]);
        sheet.set_row("A4", &["Notes below"]);
        sheet.set_border("A2:B3".parse().unwrap());
        let options = TableOptions::default().terminal(TableTerminal::Border);
        assert_eq!(read(&sheet, options).len(), 2);
    }
}
