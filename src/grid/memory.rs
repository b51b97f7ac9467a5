use crate::grid::CellStyle;
use crate::grid::CellValue;
use crate::grid::Coordinate;
use crate::grid::Grid;
use crate::grid::GridError;
use crate::grid::Region;
use std::collections::BTreeMap;

/// A data validation rule and the range it covers.
#[derive(Clone, Debug, PartialEq)]
pub struct Validation {
    /// Rule text, e.g. a list source such as `"Yes,No"`
    pub rule: String,
    pub range: Region,
}

/// In-memory sheet implementing [`Grid`].
#[derive(Clone, Debug, Default)]
pub struct MemorySheet {
    /// Sheet name
    pub(crate) name: String,
    cells: BTreeMap<Coordinate, CellValue>,
    formulas: BTreeMap<Coordinate, String>,
    styles: BTreeMap<Coordinate, CellStyle>,
    merged: Vec<Region>,
    named_ranges: BTreeMap<String, Region>,
    validations: Vec<Validation>,
}

impl MemorySheet {
    /// Number of rows a sheet can hold.
    pub const MAX_ROWS: usize = 1_048_576;

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets a value by A1 address, panicking on malformed addresses. Meant for building fixtures.
    pub fn set(&mut self, address: &str, value: impl Into<CellValue>) -> &mut Self {
        let at = address.parse().expect("Valid cell address");
        self.cells.insert(at, value.into());
        self
    }

    /// Fills consecutive cells of one row starting at `address`.
    pub fn set_row(&mut self, address: &str, values: &[&str]) -> &mut Self {
        let start: Coordinate = address.parse().expect("Valid cell address");
        for (offset, value) in values.iter().enumerate() {
            if !value.is_empty() {
                self.cells.insert(start.right(offset), CellValue::text(*value));
            }
        }
        self
    }

    pub fn get(&self, address: &str) -> CellValue {
        address
            .parse()
            .map(|at| self.cell_value(at))
            .unwrap_or_default()
    }

    pub fn set_style(&mut self, at: Coordinate, style: CellStyle) {
        self.styles.insert(at, style);
    }

    pub fn style(&self, at: Coordinate) -> Option<CellStyle> {
        self.styles.get(&at).copied()
    }

    /// Draws a bottom border under every cell of the region.
    pub fn set_border(&mut self, region: Region) {
        for row in region.top()..=region.bottom() {
            for column in region.left()..=region.right() {
                self.styles
                    .entry(Coordinate::new(column, row))
                    .or_default()
                    .bottom_border = true;
            }
        }
    }

    pub fn add_named_range(&mut self, name: &str, region: Region) {
        self.named_ranges.insert(name.to_owned(), region);
    }

    pub fn named_range(&self, name: &str) -> Option<Region> {
        self.named_ranges.get(name).copied()
    }

    pub fn add_validation(&mut self, rule: &str, range: Region) -> usize {
        self.validations.push(Validation {
            rule: rule.to_owned(),
            range,
        });
        self.validations.len() - 1
    }

    pub fn validations(&self) -> &[Validation] {
        &self.validations
    }

    /// Re-keys every entry through `edit`, dropping entries whose row was deleted.
    fn shift_keys<V>(map: &mut BTreeMap<Coordinate, V>, mut edit: impl FnMut(usize) -> Option<usize>) {
        let entries = std::mem::take(map);
        for (at, value) in entries {
            if let Some(row) = edit(at.row) {
                map.insert(at.with_row(row), value);
            }
        }
    }

    fn check_row(&self, row: usize) -> Result<(), GridError> {
        if row < Self::MAX_ROWS {
            Ok(())
        } else {
            Err(GridError::RowOutOfBounds {
                row,
                limit: Self::MAX_ROWS - 1,
            })
        }
    }
}

impl Grid for MemorySheet {
    fn cell_value(&self, at: Coordinate) -> CellValue {
        self.cells.get(&at).cloned().unwrap_or_default()
    }

    fn set_cell_value(&mut self, at: Coordinate, value: CellValue) -> Result<(), GridError> {
        self.check_row(at.row)?;
        self.formulas.remove(&at);
        if value == CellValue::Empty {
            self.cells.remove(&at);
        } else {
            self.cells.insert(at, value);
        }
        Ok(())
    }

    fn cell_formula(&self, at: Coordinate) -> Option<String> {
        self.formulas.get(&at).cloned()
    }

    fn set_cell_formula(&mut self, at: Coordinate, formula: &str) -> Result<(), GridError> {
        self.check_row(at.row)?;
        self.formulas.insert(at, formula.to_owned());
        Ok(())
    }

    fn formula_cells(&self) -> Vec<(Coordinate, String)> {
        self.formulas
            .iter()
            .map(|(at, formula)| (*at, formula.to_owned()))
            .collect()
    }

    fn used_bounds(&self) -> Option<Region> {
        let mut bounds: Option<Region> = None;
        let used = self
            .cells
            .keys()
            .chain(self.formulas.keys())
            .chain(self.styles.keys());
        for at in used {
            bounds = Some(match bounds {
                None => Region::cell(*at),
                Some(region) => Region::new(
                    Coordinate::new(region.left().min(at.column), region.top().min(at.row)),
                    Coordinate::new(region.right().max(at.column), region.bottom().max(at.row)),
                ),
            });
        }
        bounds
    }

    fn merged_regions(&self) -> Vec<Region> {
        self.merged.clone()
    }

    fn merge_region(&mut self, region: Region) -> Result<(), GridError> {
        self.check_row(region.bottom())?;
        if let Some(existing) = self.merged.iter().find(|merged| merged.intersects(&region)) {
            return Err(GridError::MergeConflict {
                region,
                existing: *existing,
            });
        }
        self.merged.push(region);
        Ok(())
    }

    fn unmerge_region(&mut self, region: Region) -> Result<(), GridError> {
        let index = self
            .merged
            .iter()
            .position(|merged| *merged == region)
            .ok_or(GridError::NotMerged(region))?;
        self.merged.remove(index);
        Ok(())
    }

    fn named_ranges(&self) -> Vec<(String, Region)> {
        self.named_ranges
            .iter()
            .map(|(name, region)| (name.to_owned(), *region))
            .collect()
    }

    fn set_named_range(&mut self, name: &str, region: Option<Region>) -> Result<(), GridError> {
        match region {
            Some(region) => self.named_ranges.insert(name.to_owned(), region),
            None => self.named_ranges.remove(name),
        };
        Ok(())
    }

    fn validation_ranges(&self) -> Vec<(usize, Region)> {
        self.validations
            .iter()
            .enumerate()
            .map(|(index, validation)| (index, validation.range))
            .collect()
    }

    fn set_validation_range(&mut self, index: usize, region: Option<Region>) -> Result<(), GridError> {
        if index >= self.validations.len() {
            return Err(GridError::MissingValidation(index));
        }
        match region {
            Some(region) => self.validations[index].range = region,
            None => {
                self.validations.remove(index);
            }
        }
        Ok(())
    }

    fn insert_rows(&mut self, after_row: usize, count: usize) -> Result<(), GridError> {
        if let Some(bounds) = self.used_bounds() {
            if bounds.bottom() > after_row {
                self.check_row(bounds.bottom() + count)?;
            }
        }
        self.check_row(after_row + count)?;
        let edit = |row: usize| Some(if row > after_row { row + count } else { row });
        Self::shift_keys(&mut self.cells, edit);
        Self::shift_keys(&mut self.formulas, edit);
        Self::shift_keys(&mut self.styles, edit);
        Ok(())
    }

    fn delete_rows(&mut self, from_row: usize, count: usize) -> Result<(), GridError> {
        let end = from_row + count;
        let edit = |row: usize| {
            if row >= end {
                Some(row - count)
            } else if row >= from_row {
                None
            } else {
                Some(row)
            }
        };
        Self::shift_keys(&mut self.cells, edit);
        Self::shift_keys(&mut self.formulas, edit);
        Self::shift_keys(&mut self.styles, edit);
        Ok(())
    }

    fn copy_row_style(&mut self, src_row: usize, dst_row: usize) -> Result<(), GridError> {
        self.check_row(dst_row)?;
        let styles: Vec<(usize, CellStyle)> = self
            .styles
            .range(Coordinate::new(0, src_row)..=Coordinate::new(usize::MAX, src_row))
            .map(|(at, style)| (at.column, *style))
            .collect();
        for (column, style) in styles {
            self.styles.insert(Coordinate::new(column, dst_row), style);
        }
        Ok(())
    }

    fn has_bottom_border(&self, at: Coordinate) -> bool {
        self.styles
            .get(&at)
            .map(|style| style.bottom_border)
            .unwrap_or(false)
    }
}
