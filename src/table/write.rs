use crate::error::BinderError;
use crate::grid::shift::apply_row_edit;
use crate::grid::shift::RowEdit;
use crate::grid::shift::ShiftPlan;
use crate::grid::CellValue;
use crate::grid::Coordinate;
use crate::grid::Grid;
use crate::grid::Region;
use crate::record::TableRecord;
use crate::table::column::render_formula;
use crate::table::column::ColumnBinding;
use crate::table::column::MapKey;
use crate::table::extract::BindFailure;
use crate::table::nested::NestedWriter;
use crate::table::TableHandle;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::ops::Range;

/// What to do with records that do not fit into the template rows.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverRecordPolicy {
    /// Drop the records that do not fit
    Break,
    /// Insert rows below the template, shifting everything underneath
    #[default]
    Insert,
    /// Style the rows below the template like its last row, without shifting
    Copy,
}

/// What to do with template rows left over after the last record.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainedRecordPolicy {
    None,
    /// Blank the mapped cells, keeping styles and merges
    #[default]
    Clear,
    /// Delete the rows, shifting everything underneath up
    Delete,
}

/// Summary of one write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteReport {
    pub first_data_row: usize,
    /// Rows the table had before the write
    pub template_rows: usize,
    pub written: usize,
    /// Records left out by `OverRecordPolicy::Break` or a full nested span
    pub dropped: usize,
    pub inserted_rows: usize,
    pub deleted_rows: usize,
    pub cleared_rows: usize,
    /// Map keys added as new header columns
    pub appended_keys: Vec<String>,
    /// Fields that failed to convert, when failures do not stop the table
    pub failures: Vec<BindFailure>,
    pub shifts: Vec<ShiftPlan>,
}

/// Dynamic columns of every map binding, growing as unknown keys get appended.
struct MapColumns {
    keys: Vec<Vec<MapKey>>,
    next_column: usize,
}

impl MapColumns {
    fn new(handle: &TableHandle) -> Self {
        Self {
            keys: handle
                .mapping
                .bindings
                .iter()
                .map(|binding| binding.map_keys.clone())
                .collect(),
            next_column: handle.mapping.last_header.column + 1,
        }
    }
}

/// Rows needed by a record: its own height, or more for its nested records.
fn save_height<T: TableRecord>(handle: &TableHandle, record: &T) -> usize {
    handle
        .nested
        .iter()
        .map(|nested| record.nested_len(&nested.field) * nested.handle.options.record_height)
        .fold(handle.options.record_height, usize::max)
}

/// Rows the table currently occupies, zero for a body-less table.
pub(crate) fn template_rows(grid: &dyn Grid, handle: &TableHandle) -> usize {
    handle.options.template_rows.unwrap_or_else(|| {
        let first = handle.mapping.first_data_row;
        let mut rows = 0;
        while !handle.terminal.stops_at(grid, first + rows, rows) {
            rows += 1;
        }
        rows
    })
}

fn fail(handle: &TableHandle, report: &mut WriteReport, failure: BindFailure) -> Result<(), BinderError> {
    if handle.options.continue_on_bind_failure {
        report.failures.push(failure);
        Ok(())
    } else {
        Err(failure.into_error(&handle.name).into())
    }
}

fn clear_row(grid: &mut dyn Grid, handle: &TableHandle, row: usize) -> Result<(), BinderError> {
    for column in handle.columns() {
        grid.set_cell_value(Coordinate::new(column, row), CellValue::Empty)?;
    }
    Ok(())
}

/// Repeats the single-row merges of `src_row` on `dst_row`.
fn copy_row_merges(grid: &mut dyn Grid, src_row: usize, dst_row: usize) -> Result<(), BinderError> {
    let merged = grid.merged_regions();
    for region in merged.iter().filter(|region| region.top() == src_row && region.bottom() == src_row) {
        let target = region.with_rows(dst_row, dst_row);
        if !merged.iter().any(|existing| existing.intersects(&target)) {
            grid.merge_region(target)?;
        }
    }
    Ok(())
}

fn merge_down(grid: &mut dyn Grid, region: Region) -> Result<(), BinderError> {
    let merged = grid.merged_regions();
    if merged.iter().any(|existing| existing.intersects(&region)) {
        log::debug!("Keep existing merges around {}", region);
        return Ok(());
    }
    grid.merge_region(region)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_map<T: TableRecord>(
    grid: &mut dyn Grid,
    handle: &TableHandle,
    position: usize,
    record: &T,
    index: usize,
    row: usize,
    maps: &mut MapColumns,
    report: &mut WriteReport,
) -> Result<(), BinderError> {
    let binding = &handle.mapping.bindings[position];
    let entries = match record.map_entries(&binding.field) {
        Ok(entries) => entries,
        Err(e) => {
            let failure = BindFailure {
                record: index,
                field: binding.field.to_owned(),
                at: binding.header.with_row(row),
                label: binding.label.to_owned(),
                message: e.to_string(),
            };
            return fail(handle, report, failure);
        }
    };
    let MapColumns { keys, next_column } = maps;
    let keys = &mut keys[position];
    let mut written = BTreeSet::new();
    for (key, value) in entries {
        let column = match keys.iter().find(|known| known.key == key) {
            Some(known) => known.column,
            None if binding.unbounded => {
                let column = *next_column;
                *next_column += 1;
                grid.set_cell_value(Coordinate::new(column, handle.origin.row), CellValue::text(key.as_str()))?;
                keys.push(MapKey {
                    key: key.to_owned(),
                    column,
                });
                report.appended_keys.push(key);
                column
            }
            None => {
                log::warn!(
                    "Table '{}': map key '{}' of field '{}' has no column",
                    handle.name,
                    key,
                    binding.field
                );
                continue;
            }
        };
        grid.set_cell_value(Coordinate::new(column, row), value)?;
        written.insert(column);
    }
    for key in keys.iter().filter(|key| !written.contains(&key.column)) {
        grid.set_cell_value(Coordinate::new(key.column, row), CellValue::Empty)?;
    }
    Ok(())
}

fn write_field<T: TableRecord>(
    grid: &mut dyn Grid,
    handle: &TableHandle,
    binding: &ColumnBinding,
    record: &T,
    index: usize,
    at: Coordinate,
    report: &mut WriteReport,
) -> Result<(), BinderError> {
    let formula = match &binding.formula {
        Some(template) => Some(render_formula(template, at)),
        None => record.formula(&binding.field, at),
    };
    if let Some(formula) = formula {
        grid.set_cell_value(at, CellValue::Empty)?;
        grid.set_cell_formula(at, &formula)?;
        return Ok(());
    }
    match record.field(&binding.field) {
        Ok(value) => grid.set_cell_value(at, value)?,
        Err(e) => {
            let failure = BindFailure {
                record: index,
                field: binding.field.to_owned(),
                at,
                label: binding.label.to_owned(),
                message: e.to_string(),
            };
            fail(handle, report, failure)?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn write_record<T: TableRecord>(
    grid: &mut dyn Grid,
    handle: &TableHandle,
    record: &T,
    index: usize,
    row: usize,
    height: usize,
    maps: &mut MapColumns,
    report: &mut WriteReport,
) -> Result<(), BinderError> {
    for (position, binding) in handle.mapping.bindings.iter().enumerate() {
        if binding.is_map_range {
            write_map(grid, handle, position, record, index, row, maps, report)?;
            continue;
        }
        let at = Coordinate::new(binding.column(), row);
        write_field(grid, handle, binding, record, index, at, report)?;
        if handle.options.merge_cell_on_save && height > 1 {
            merge_down(grid, Region::new(at, at.down(height - 1)))?;
        }
    }
    for nested in &handle.nested {
        let mut writer = NestedWriter {
            grid: &mut *grid,
            nested,
            rows: row..row + height,
            report: &mut *report,
        };
        record.save_nested(&nested.field, &mut writer)?;
    }
    Ok(())
}

/// Writes records on consecutive rows of a fixed span and blanks the rest of it.
pub(crate) fn write_span<T: TableRecord>(
    grid: &mut dyn Grid,
    handle: &TableHandle,
    records: &[T],
    rows: Range<usize>,
    report: &mut WriteReport,
) -> Result<(), BinderError> {
    let mut maps = MapColumns::new(handle);
    let mut row = rows.start;
    for (index, record) in records.iter().enumerate() {
        let height = save_height(handle, record);
        if row + height > rows.end {
            log::warn!(
                "Table '{}': {} record(s) do not fit in rows {}..{}",
                handle.name,
                records.len() - index,
                rows.start + 1,
                rows.end
            );
            report.dropped += records.len() - index;
            break;
        }
        write_record(grid, handle, record, index, row, height, &mut maps, report)?;
        row += height;
    }
    for row in row..rows.end {
        clear_row(grid, handle, row)?;
    }
    Ok(())
}

/// Writes records into the template rows of a resolved table.
///
/// Rows are inserted or deleted first according to the over and remained
/// policies, cascading into merges, names, validations and formulas. Values
/// and formulas are written afterwards, so formula rows refer to final positions.
pub fn write_records<T: TableRecord>(
    grid: &mut dyn Grid,
    handle: &TableHandle,
    records: &[T],
) -> Result<WriteReport, BinderError> {
    let options = &handle.options;
    let first = handle.mapping.first_data_row;
    let template = template_rows(grid, handle);
    let mut heights: Vec<usize> = records.iter().map(|record| save_height(handle, record)).collect();
    let needed: usize = heights.iter().sum();
    let mut report = WriteReport {
        first_data_row: first,
        template_rows: template,
        ..WriteReport::default()
    };

    if needed > template {
        let extra = needed - template;
        match options.over_policy {
            OverRecordPolicy::Break => {
                let mut total = 0;
                let fit = heights
                    .iter()
                    .take_while(|height| {
                        total += **height;
                        total <= template
                    })
                    .count();
                report.dropped = records.len() - fit;
                heights.truncate(fit);
                log::warn!(
                    "Table '{}': {} record(s) do not fit in {} template row(s) and are dropped",
                    handle.name,
                    report.dropped,
                    template
                );
            }
            OverRecordPolicy::Insert if template == 0 => {
                let plan = apply_row_edit(
                    grid,
                    RowEdit::InsertBefore {
                        before_row: first,
                        count: extra,
                    },
                )?;
                report.inserted_rows = extra;
                report.shifts.push(plan);
            }
            OverRecordPolicy::Insert => {
                let last_template = first + template - 1;
                let plan = apply_row_edit(
                    grid,
                    RowEdit::Insert {
                        after_row: last_template,
                        count: extra,
                    },
                )?;
                for row in last_template + 1..=last_template + extra {
                    grid.copy_row_style(last_template, row)?;
                    if options.merge_cell_on_save {
                        copy_row_merges(grid, last_template, row)?;
                    }
                }
                report.inserted_rows = extra;
                report.shifts.push(plan);
            }
            // No template row to copy from
            OverRecordPolicy::Copy if template == 0 => {}
            OverRecordPolicy::Copy => {
                let last_template = first + template - 1;
                for row in last_template + 1..=last_template + extra {
                    grid.copy_row_style(last_template, row)?;
                    copy_row_merges(grid, last_template, row)?;
                }
            }
        }
    }

    // Break may leave template rows over as well
    let used: usize = heights.iter().sum();
    if used < template {
        let surplus = template - used;
        let from_row = first + used;
        match options.remained_policy {
            RemainedRecordPolicy::None => {}
            RemainedRecordPolicy::Clear => {
                for row in from_row..from_row + surplus {
                    clear_row(grid, handle, row)?;
                }
                report.cleared_rows = surplus;
            }
            RemainedRecordPolicy::Delete => {
                let plan = apply_row_edit(
                    grid,
                    RowEdit::Delete {
                        from_row,
                        count: surplus,
                    },
                )?;
                report.deleted_rows = surplus;
                report.shifts.push(plan);
            }
        }
    }

    let mut maps = MapColumns::new(handle);
    let mut row = first;
    for (index, (record, height)) in records.iter().zip(&heights).enumerate() {
        write_record(grid, handle, record, index, row, *height, &mut maps, &mut report)?;
        row += height;
    }
    report.written = heights.len();
    log::debug!(
        "Table '{}': {} record(s) written from row {}, {} inserted, {} deleted",
        handle.name,
        report.written,
        first + 1,
        report.inserted_rows,
        report.deleted_rows
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::FromCell;
    use crate::convert::IntoCell;
    use crate::grid::memory::MemorySheet;
    use crate::table::extract_records;
    use crate::table::resolve_table;
    use crate::table::AnchorSpec;
    use crate::table::ColumnSpec;
    use crate::table::LabelAnchor;
    use crate::table::LabelPattern;
    use crate::table::TableLayout;
    use crate::table::TableOptions;
    use crate::table::TableTerminal;
    use anyhow::bail;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Item {
        name: String,
        qty: i64,
        days: BTreeMap<String, String>,
    }

    impl TableRecord for Item {
        fn set_field(&mut self, field: &str, value: &CellValue) -> anyhow::Result<()> {
            match field {
                "name" => self.name = String::from_cell(value)?,
                "qty" => self.qty = i64::from_cell(value)?,
                _ => {}
            }
            Ok(())
        }

        fn field(&self, field: &str) -> anyhow::Result<CellValue> {
            match field {
                "name" => Ok(self.name.into_cell()),
                "qty" if self.qty < 0 => bail!("negative quantity {}", self.qty),
                "qty" => Ok(self.qty.into_cell()),
                _ => Ok(CellValue::Empty),
            }
        }

        fn set_map_entry(&mut self, _field: &str, key: &str, value: &CellValue) -> anyhow::Result<()> {
            if !value.is_blank() {
                self.days.insert(key.to_owned(), value.to_string());
            }
            Ok(())
        }

        fn map_entries(&self, _field: &str) -> anyhow::Result<Vec<(String, CellValue)>> {
            Ok(self
                .days
                .iter()
                .map(|(key, value)| (key.to_owned(), CellValue::text(value.as_str())))
                .collect())
        }

        fn is_empty_record(&self) -> bool {
            self.name.is_empty()
        }
    }

    fn region(value: &str) -> Region {
        value.parse().unwrap()
    }

    fn item(name: &str, qty: i64) -> Item {
        Item {
            name: name.to_owned(),
            qty,
            ..Item::default()
        }
    }

    fn items(count: usize) -> Vec<Item> {
        (0..count).map(|index| item(&format!("item{}", index + 1), index as i64 + 1)).collect()
    }

    /// Header in row 1, two template rows, a total row below.
    fn template() -> MemorySheet {
        let mut sheet = MemorySheet::new("Order");
        sheet.set_row("A1", &["Name", "Qty"]);
        sheet.set_row("A2", &["old1", "9"]);
        sheet.set_row("A3", &["old2", "9"]);
        sheet.set("A5", "Total");
        sheet.set_cell_formula("B5".parse().unwrap(), "=SUM(B2:B3)").unwrap();
        sheet.add_named_range("Quantities", "B2:B3".parse().unwrap());
        sheet.add_validation("1-100", "B2:B3".parse().unwrap());
        sheet.merge_region("C5:D5".parse().unwrap()).unwrap();
        sheet.set_border("A3:B3".parse().unwrap());
        sheet
    }

    fn layout(options: TableOptions) -> TableLayout {
        TableLayout::new("order")
            .with_anchor(AnchorSpec::label(LabelAnchor::new("Name")))
            .with_column(ColumnSpec::new("name", "Name"))
            .with_column(ColumnSpec::new("qty", "Qty"))
            .with_options(options)
    }

    fn save(sheet: &mut MemorySheet, options: TableOptions, records: &[Item]) -> WriteReport {
        let handle = resolve_table(sheet, &layout(options)).unwrap().unwrap();
        write_records(sheet, &handle, records).unwrap()
    }

    fn load(sheet: &MemorySheet, options: TableOptions) -> Vec<Item> {
        let handle = resolve_table(sheet, &layout(options)).unwrap().unwrap();
        extract_records::<Item>(sheet, &handle)
            .map(|record| record.unwrap().value)
            .collect()
    }

    #[test]
    fn round_trip_when_counts_match() {
        let mut sheet = template();
        let report = save(&mut sheet, TableOptions::default(), &items(2));
        assert_eq!(report.template_rows, 2);
        assert!(report.shifts.is_empty());
        assert_eq!(load(&sheet, TableOptions::default()), items(2));
    }

    #[test]
    fn insert_cascades_into_ranges() {
        let mut sheet = template();
        let report = save(&mut sheet, TableOptions::default(), &items(4));
        assert_eq!(report.inserted_rows, 2);
        assert_eq!(report.written, 4);
        assert_eq!(sheet.named_range("Quantities"), Some(region("B2:B5")));
        assert_eq!(sheet.validations()[0].range, region("B2:B5"));
        assert_eq!(sheet.get("A7"), CellValue::text("Total"));
        assert_eq!(sheet.cell_formula("B7".parse().unwrap()), Some("=SUM(B2:B5)".to_owned()));
        assert_eq!(sheet.merged_regions(), vec![region("C7:D7")]);
        // New rows carry the style of the last template row
        assert!(sheet.has_bottom_border("A5".parse().unwrap()));
        assert_eq!(load(&sheet, TableOptions::default()), items(4));
        // Occupied rows end at first data row + n
        assert_eq!(sheet.get("A6"), CellValue::Empty);
    }

    #[test]
    fn break_drops_extra_records() {
        let mut sheet = template();
        let report = save(&mut sheet, TableOptions::default().over_policy(OverRecordPolicy::Break), &items(3));
        assert_eq!((report.written, report.dropped), (2, 1));
        assert_eq!(load(&sheet, TableOptions::default()), items(2));
        assert_eq!(sheet.get("A5"), CellValue::text("Total"));
    }

    #[test]
    fn break_applies_remained_policy_to_unused_rows() {
        let mut sheet = template();
        sheet.set_row("A4", &["old3", "9"]);
        let options = TableOptions::default()
            .record_height(2)
            .template_rows(3)
            .over_policy(OverRecordPolicy::Break);
        let report = save(&mut sheet, options, &items(2));
        assert_eq!((report.written, report.dropped, report.cleared_rows), (1, 1, 1));
        assert_eq!(sheet.get("A2"), CellValue::text("item1"));
        assert_eq!(sheet.get("A4"), CellValue::Empty);
        assert_eq!(sheet.get("B4"), CellValue::Empty);
        assert_eq!(sheet.get("A5"), CellValue::text("Total"));
    }

    #[test]
    fn body_less_table_keeps_terminal_row() {
        let totals = || {
            let mut sheet = MemorySheet::new("");
            sheet.set_row("A1", &["Name", "Qty"]);
            sheet.set("A2", "Total");
            sheet.add_named_range("Header", "A1:B1".parse().unwrap());
            sheet
        };
        let options = TableOptions::default()
            .terminal(TableTerminal::LabelMatch(LabelPattern::text("Total")))
            .remained_policy(RemainedRecordPolicy::Delete);

        let mut sheet = totals();
        let report = save(&mut sheet, options.clone(), &[]);
        assert_eq!((report.template_rows, report.deleted_rows, report.cleared_rows), (0, 0, 0));
        assert_eq!(sheet.get("A2"), CellValue::text("Total"));

        let mut sheet = totals();
        let report = save(&mut sheet, options.clone(), &items(1));
        assert_eq!(report.inserted_rows, 1);
        assert_eq!(sheet.get("A2"), CellValue::text("item1"));
        assert_eq!(sheet.get("A3"), CellValue::text("Total"));
        assert_eq!(sheet.named_range("Header"), Some(region("A1:B1")));
        assert_eq!(load(&sheet, options), items(1));
    }

    #[test]
    fn copy_styles_rows_without_shifting() {
        let mut sheet = template();
        sheet.merge_region("C3:D3".parse().unwrap()).unwrap();
        sheet.unmerge_region("C5:D5".parse().unwrap()).unwrap();
        let report = save(&mut sheet, TableOptions::default().over_policy(OverRecordPolicy::Copy), &items(3));
        assert_eq!(report.inserted_rows, 0);
        assert!(sheet.has_bottom_border("B4".parse().unwrap()));
        assert!(sheet.merged_regions().contains(&region("C4:D4")));
        assert_eq!(sheet.named_range("Quantities"), Some(region("B2:B3")));
        assert_eq!(sheet.get("A5"), CellValue::text("Total"));
    }

    #[test]
    fn clear_surplus_rows() {
        let mut sheet = template();
        let report = save(&mut sheet, TableOptions::default(), &items(1));
        assert_eq!(report.cleared_rows, 1);
        assert_eq!(sheet.get("A3"), CellValue::Empty);
        assert!(sheet.has_bottom_border("A3".parse().unwrap()));
        assert_eq!(load(&sheet, TableOptions::default()), items(1));
    }

    #[test]
    fn keep_surplus_rows() {
        let mut sheet = template();
        save(&mut sheet, TableOptions::default().remained_policy(RemainedRecordPolicy::None), &items(1));
        assert_eq!(sheet.get("A3"), CellValue::text("old2"));
    }

    #[test]
    fn delete_surplus_rows() {
        let mut sheet = template();
        let report = save(&mut sheet, TableOptions::default().remained_policy(RemainedRecordPolicy::Delete), &items(1));
        assert_eq!(report.deleted_rows, 1);
        assert_eq!(sheet.get("A4"), CellValue::text("Total"));
        assert_eq!(sheet.cell_formula("B4".parse().unwrap()), Some("=SUM(B2:B2)".to_owned()));
        assert_eq!(sheet.named_range("Quantities"), Some(region("B2")));
        assert_eq!(sheet.merged_regions(), vec![region("C4:D4")]);
        assert_eq!(sheet.used_bounds().map(|bounds| bounds.bottom()), Some(3));
    }

    #[test]
    fn fail_fast_and_continue() {
        let mut sheet = template();
        let records = vec![item("a", 1), item("b", -1)];
        let handle = resolve_table(&sheet, &layout(TableOptions::default())).unwrap().unwrap();
        match write_records(&mut sheet, &handle, &records) {
            Err(BinderError::TableError(crate::table::TableError::TypeBinding { record, field, at, .. })) => {
                assert_eq!((record, field.as_str()), (1, "qty"));
                assert_eq!(at, Coordinate::new(1, 2));
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut sheet = template();
        let report = save(&mut sheet, TableOptions::default().continue_on_bind_failure(true), &records);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].message, "negative quantity -1");
        assert_eq!(sheet.get("A3"), CellValue::text("b"));
    }

    #[test]
    fn formula_columns_use_final_rows() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Qty", "Double"]);
        let layout = TableLayout::new("calc")
            .with_anchor(AnchorSpec::address("A1"))
            .with_column(ColumnSpec::new("qty", "Qty"))
            .with_column(ColumnSpec::new("double", "Double").with_formula("=A{row}*2"));
        let handle = resolve_table(&sheet, &layout).unwrap().unwrap();
        write_records(&mut sheet, &handle, &items(3)).unwrap();
        assert_eq!(sheet.cell_formula("B4".parse().unwrap()), Some("=A4*2".to_owned()));
        assert_eq!(sheet.get("A4"), CellValue::Number(3.0));
    }

    #[test]
    fn map_columns_on_save() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "4/1", "4/2", "Note"]);
        let bounded = TableLayout::new("days")
            .with_anchor(AnchorSpec::address("A1"))
            .with_column(ColumnSpec::new("name", "Name"))
            .with_column(ColumnSpec::map("days", Some("Name"), Some("Note")));
        let mut record = item("a", 0);
        record.days.insert("4/2".to_owned(), "B".to_owned());
        record.days.insert("4/3".to_owned(), "C".to_owned());
        let handle = resolve_table(&sheet, &bounded).unwrap().unwrap();
        let report = write_records(&mut sheet, &handle, &[record.clone()]).unwrap();
        assert_eq!(report.appended_keys, Vec::<String>::new());
        assert_eq!(sheet.get("C2"), CellValue::text("B"));
        assert_eq!(sheet.get("D2"), CellValue::Empty);

        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "4/1", "4/2"]);
        let unbounded = TableLayout::new("days")
            .with_anchor(AnchorSpec::address("A1"))
            .with_column(ColumnSpec::new("name", "Name"))
            .with_column(ColumnSpec::map("days", Some("Name"), None));
        let handle = resolve_table(&sheet, &unbounded).unwrap().unwrap();
        let report = write_records(&mut sheet, &handle, &[record.clone()]).unwrap();
        assert_eq!(report.appended_keys, vec!["4/3".to_owned()]);
        assert_eq!(sheet.get("D1"), CellValue::text("4/3"));
        assert_eq!(sheet.get("D2"), CellValue::text("C"));

        let handle = resolve_table(&sheet, &unbounded).unwrap().unwrap();
        let loaded: Vec<Item> = extract_records::<Item>(&sheet, &handle)
            .map(|record| record.unwrap().value)
            .collect();
        assert_eq!(loaded[0].days, record.days);
    }

    #[test]
    fn multi_row_records_merge_on_save() {
        let mut sheet = MemorySheet::new("");
        sheet.set_row("A1", &["Name", "Qty"]);
        let options = TableOptions::default().record_height(2).merge_cell_on_save(true);
        let handle = resolve_table(&sheet, &layout(options.clone())).unwrap().unwrap();
        let report = write_records(&mut sheet, &handle, &items(2)).unwrap();
        assert_eq!((report.template_rows, report.inserted_rows), (0, 4));
        assert_eq!(
            sheet.merged_regions(),
            vec![region("A2:A3"), region("B2:B3"), region("A4:A5"), region("B4:B5")]
        );
        let handle = resolve_table(&sheet, &layout(options)).unwrap().unwrap();
        let rows: Vec<(usize, usize)> = extract_records::<Item>(&sheet, &handle)
            .map(|record| record.map(|record| (record.row, record.height)).unwrap())
            .collect();
        assert_eq!(rows, vec![(1, 2), (3, 2)]);
    }
}
