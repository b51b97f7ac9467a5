//! # Grid Module
//!
//! The two-dimensional cell surface the table engine works on. The engine only
//! talks to a grid through the [`Grid`] trait, so any workbook backend can be
//! plugged in; [`memory::MemorySheet`] is the in-memory implementation used by
//! callers that assemble grids themselves and by the tests.
use thiserror::Error;

pub mod cell;
pub mod memory;
pub mod reference;
pub mod shift;
pub mod workbook;

pub use cell::CellStyle;
pub use cell::CellValue;
pub use reference::Coordinate;
pub use reference::Region;

/// Structural failures reported by a grid backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Row {row} is beyond the last row {limit} of the sheet")]
    RowOutOfBounds { row: usize, limit: usize },

    #[error("Region {region} overlaps merged region {existing}")]
    MergeConflict { region: Region, existing: Region },

    #[error("Region {0} is not merged")]
    NotMerged(Region),

    #[error("No validation at index {0}")]
    MissingValidation(usize),

    #[error("Grid rejected the edit: {0}")]
    Rejected(String),
}

/// Cell storage consumed by the table engine.
///
/// Row insertion and deletion only move cell contents (values, formulas and
/// styles). Merged regions, named ranges, validation ranges and the text of
/// formulas are corrected afterwards by a [`shift::ShiftPlan`] built from the
/// listings below.
pub trait Grid {
    /// Returns the raw value of a cell, `CellValue::Empty` when unset.
    fn cell_value(&self, at: Coordinate) -> CellValue;

    /// Returns the displayed text of a cell.
    fn cell_text(&self, at: Coordinate) -> String {
        self.cell_value(at).to_string()
    }

    fn set_cell_value(&mut self, at: Coordinate, value: CellValue) -> Result<(), GridError>;

    fn cell_formula(&self, at: Coordinate) -> Option<String>;

    /// Stores formula text (without evaluating it).
    fn set_cell_formula(&mut self, at: Coordinate, formula: &str) -> Result<(), GridError>;

    /// Every formula cell with its text.
    fn formula_cells(&self) -> Vec<(Coordinate, String)>;

    /// Smallest region covering every used cell, `None` for an empty grid.
    fn used_bounds(&self) -> Option<Region>;

    fn merged_regions(&self) -> Vec<Region>;

    /// Returns the merged region containing `at`, if any.
    fn find_merged_region(&self, at: Coordinate) -> Option<Region> {
        self.merged_regions()
            .into_iter()
            .find(|region| region.contains(at))
    }

    /// Returns the value shown at `at`: the top-left value when the cell is merged.
    fn merged_value(&self, at: Coordinate) -> CellValue {
        match self.find_merged_region(at) {
            Some(region) => self.cell_value(region.top_left),
            None => self.cell_value(at),
        }
    }

    fn merge_region(&mut self, region: Region) -> Result<(), GridError>;

    fn unmerge_region(&mut self, region: Region) -> Result<(), GridError>;

    fn named_ranges(&self) -> Vec<(String, Region)>;

    /// Re-targets a named range, `None` removes it.
    fn set_named_range(&mut self, name: &str, region: Option<Region>) -> Result<(), GridError>;

    /// Ranges covered by data validation rules, keyed by rule index.
    fn validation_ranges(&self) -> Vec<(usize, Region)>;

    /// Re-targets a validation rule, `None` removes it.
    fn set_validation_range(&mut self, index: usize, region: Option<Region>) -> Result<(), GridError>;

    /// Inserts `count` blank rows right below `after_row`.
    fn insert_rows(&mut self, after_row: usize, count: usize) -> Result<(), GridError>;

    /// Removes `count` rows starting at `from_row`, moving later rows up.
    fn delete_rows(&mut self, from_row: usize, count: usize) -> Result<(), GridError>;

    /// Copies the style of every cell of `src_row` onto `dst_row`.
    fn copy_row_style(&mut self, src_row: usize, dst_row: usize) -> Result<(), GridError>;

    /// Returns true if a border is rendered below the cell.
    fn has_bottom_border(&self, at: Coordinate) -> bool;
}
