//! Cascading corrections for row insertion and deletion.
//!
//! A [`ShiftPlan`] describes how every merged region, named range, validation
//! range and formula reference moves for one [`RowEdit`]. It is computed from
//! plain listings before the edit, then applied to the grid once its rows have
//! physically moved.
use crate::grid::reference::col_to_index;
use crate::grid::reference::row_to_index;
use crate::grid::Coordinate;
use crate::grid::Grid;
use crate::grid::GridError;
use crate::grid::Region;
use regex::Captures;
use regex::Regex;
use std::sync::LazyLock;

/// A1 cell or area reference, with optional `$` markers.
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\$?)([A-Za-z]{1,3})(\$?)(\d+)(?::(\$?)([A-Za-z]{1,3})(\$?)(\d+))?").expect("Hardcode regex pattern")
});

/// A structural row edit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RowEdit {
    /// `count` rows inserted right below `after_row`
    Insert { after_row: usize, count: usize },
    /// `count` rows inserted at `before_row`, which moves down; ranges ending
    /// right above it never grow
    InsertBefore { before_row: usize, count: usize },
    /// `count` rows removed starting at `from_row`
    Delete { from_row: usize, count: usize },
}

impl RowEdit {
    /// Where a row ends up after the edit, `None` when the row is deleted.
    pub fn map_row(&self, row: usize) -> Option<usize> {
        match *self {
            RowEdit::Insert { after_row, count } if row > after_row => Some(row + count),
            RowEdit::Insert { .. } => Some(row),
            RowEdit::InsertBefore { before_row, count } if row >= before_row => Some(row + count),
            RowEdit::InsertBefore { .. } => Some(row),
            RowEdit::Delete { from_row, count } if row >= from_row + count => Some(row - count),
            RowEdit::Delete { from_row, .. } if row >= from_row => None,
            RowEdit::Delete { .. } => Some(row),
        }
    }

    /// Where a region ends up after the edit, `None` when all its rows are deleted.
    ///
    /// Regions the insertion point falls into grow. With `grow_at_edge` a region
    /// whose last row is the row above the insertion grows as well.
    pub fn map_region(&self, region: &Region, grow_at_edge: bool) -> Option<Region> {
        let (top, bottom) = (region.top(), region.bottom());
        match *self {
            RowEdit::Insert { after_row, count } => {
                if top > after_row {
                    Some(region.with_rows(top + count, bottom + count))
                } else if after_row < bottom || (grow_at_edge && after_row == bottom) {
                    Some(region.with_rows(top, bottom + count))
                } else {
                    Some(*region)
                }
            }
            RowEdit::InsertBefore { before_row, count } => {
                if top >= before_row {
                    Some(region.with_rows(top + count, bottom + count))
                } else if bottom >= before_row {
                    Some(region.with_rows(top, bottom + count))
                } else {
                    Some(*region)
                }
            }
            RowEdit::Delete { from_row, count } => {
                let end = from_row + count;
                if top >= from_row && bottom < end {
                    return None;
                }
                let new_top = if top >= end {
                    top - count
                } else if top >= from_row {
                    from_row
                } else {
                    top
                };
                let new_bottom = if bottom >= end {
                    bottom - count
                } else if bottom >= from_row {
                    from_row - 1
                } else {
                    bottom
                };
                Some(region.with_rows(new_top, new_bottom))
            }
        }
    }
}

/// A merged region before and after the edit.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionMove {
    pub from: Region,
    /// `None` when the merge disappears
    pub to: Option<Region>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NamedRangeMove {
    pub name: String,
    pub from: Region,
    pub to: Option<Region>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidationMove {
    pub index: usize,
    pub from: Region,
    pub to: Option<Region>,
}

/// Formula text to store at a post-edit coordinate.
#[derive(Clone, Debug, PartialEq)]
pub struct FormulaRewrite {
    pub at: Coordinate,
    pub formula: String,
}

/// Every range correction caused by one row edit. Unchanged ranges are omitted.
#[derive(Clone, Debug, PartialEq)]
pub struct ShiftPlan {
    pub edit: RowEdit,
    pub merged_regions: Vec<RegionMove>,
    pub named_ranges: Vec<NamedRangeMove>,
    pub validations: Vec<ValidationMove>,
    pub formulas: Vec<FormulaRewrite>,
}

impl ShiftPlan {
    /// Computes the plan from pre-edit listings.
    pub fn new(
        edit: RowEdit,
        merged_regions: &[Region],
        named_ranges: &[(String, Region)],
        validations: &[(usize, Region)],
        formulas: &[(Coordinate, String)],
    ) -> Self {
        let merged_regions = merged_regions
            .iter()
            .filter_map(|region| {
                // A merge shrunk to a single cell is no merge at all
                let to = edit
                    .map_region(region, false)
                    .filter(|moved| !moved.is_single_cell());
                (to != Some(*region)).then_some(RegionMove { from: *region, to })
            })
            .collect();
        let named_ranges = named_ranges
            .iter()
            .filter_map(|(name, region)| {
                let to = edit.map_region(region, true);
                (to != Some(*region)).then(|| NamedRangeMove {
                    name: name.to_owned(),
                    from: *region,
                    to,
                })
            })
            .collect();
        let validations = validations
            .iter()
            .filter_map(|(index, region)| {
                let to = edit.map_region(region, true);
                (to != Some(*region)).then_some(ValidationMove {
                    index: *index,
                    from: *region,
                    to,
                })
            })
            .collect();
        let formulas = formulas
            .iter()
            .filter_map(|(at, formula)| {
                let row = edit.map_row(at.row)?;
                let shifted = shift_formula(formula, &edit);
                (row != at.row || shifted != *formula).then(|| FormulaRewrite {
                    at: at.with_row(row),
                    formula: shifted,
                })
            })
            .collect();
        Self {
            edit,
            merged_regions,
            named_ranges,
            validations,
            formulas,
        }
    }

    /// Computes the plan from the grid's current listings.
    pub fn from_grid(grid: &dyn Grid, edit: RowEdit) -> Self {
        Self::new(
            edit,
            &grid.merged_regions(),
            &grid.named_ranges(),
            &grid.validation_ranges(),
            &grid.formula_cells(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.merged_regions.is_empty()
            && self.named_ranges.is_empty()
            && self.validations.is_empty()
            && self.formulas.is_empty()
    }

    /// Applies the corrections to a grid whose rows were already moved.
    pub fn apply(&self, grid: &mut dyn Grid) -> Result<(), GridError> {
        for moved in &self.merged_regions {
            grid.unmerge_region(moved.from)?;
        }
        for region in self.merged_regions.iter().filter_map(|moved| moved.to) {
            grid.merge_region(region)?;
        }
        for moved in &self.named_ranges {
            grid.set_named_range(&moved.name, moved.to)?;
        }
        // Removals last and from the back so that rule indexes stay valid
        for moved in self.validations.iter().filter(|moved| moved.to.is_some()) {
            grid.set_validation_range(moved.index, moved.to)?;
        }
        let mut removed: Vec<usize> = self
            .validations
            .iter()
            .filter(|moved| moved.to.is_none())
            .map(|moved| moved.index)
            .collect();
        removed.sort_unstable_by(|a, b| b.cmp(a));
        for index in removed {
            grid.set_validation_range(index, None)?;
        }
        for rewrite in &self.formulas {
            grid.set_cell_formula(rewrite.at, &rewrite.formula)?;
        }
        Ok(())
    }
}

/// Performs a row edit on the grid and cascades it into every dependent range.
pub fn apply_row_edit(grid: &mut dyn Grid, edit: RowEdit) -> Result<ShiftPlan, GridError> {
    let plan = ShiftPlan::from_grid(grid, edit);
    match edit {
        RowEdit::Insert { after_row, count } => grid.insert_rows(after_row, count)?,
        RowEdit::InsertBefore { before_row, count } => {
            let after_row = before_row
                .checked_sub(1)
                .ok_or_else(|| GridError::Rejected("no row can be inserted above the first row".to_owned()))?;
            grid.insert_rows(after_row, count)?
        }
        RowEdit::Delete { from_row, count } => grid.delete_rows(from_row, count)?,
    }
    plan.apply(grid)?;
    log::debug!(
        "{:?}: {} merges, {} names, {} validations, {} formulas corrected",
        edit,
        plan.merged_regions.len(),
        plan.named_ranges.len(),
        plan.validations.len(),
        plan.formulas.len()
    );
    Ok(plan)
}

fn is_identifier_char(char: char) -> bool {
    char.is_ascii_alphanumeric() || char == '_' || char == '.'
}

/// Rewrites the row numbers of A1 references in formula text for a row edit.
///
/// Cell and area references outside string literals are shifted, keeping their
/// `$` markers. References qualified with a sheet name are left untouched.
/// References to deleted rows become `#REF!`.
pub fn shift_formula(formula: &str, edit: &RowEdit) -> String {
    formula
        .split('"')
        .enumerate()
        .map(|(index, segment)| {
            if index % 2 == 1 {
                // Inside a string literal
                segment.to_owned()
            } else {
                shift_segment(&REFERENCE_PATTERN, segment, edit)
            }
        })
        .collect::<Vec<String>>()
        .join("\"")
}

fn shift_segment(pattern: &Regex, segment: &str, edit: &RowEdit) -> String {
    let mut result = String::with_capacity(segment.len());
    let mut last = 0;
    for captures in pattern.captures_iter(segment) {
        let matched = captures.get(0).expect("Whole match");
        let before = segment[..matched.start()].chars().next_back();
        let after = segment[matched.end()..].chars().next();
        let is_reference = !before.is_some_and(|char| is_identifier_char(char) || char == '!')
            && !after.is_some_and(|char| is_identifier_char(char) || char == '(');
        result.push_str(&segment[last..matched.start()]);
        if is_reference {
            result.push_str(&shift_reference(&captures, edit).unwrap_or_else(|| matched.as_str().to_owned()));
        } else {
            result.push_str(matched.as_str());
        }
        last = matched.end();
    }
    result.push_str(&segment[last..]);
    result
}

/// Returns the rewritten reference, `None` when the text is not a valid reference.
fn shift_reference(captures: &Captures, edit: &RowEdit) -> Option<String> {
    let part = |index: usize| captures.get(index).map(|m| m.as_str()).unwrap_or("");
    let first_col = col_to_index(part(2))?;
    let first_row = row_to_index(part(4))?;
    if captures.get(6).is_none() {
        return Some(match edit.map_row(first_row) {
            Some(row) => format!("{}{}{}{}", part(1), part(2), part(3), row + 1),
            None => "#REF!".to_owned(),
        });
    }
    let second_col = col_to_index(part(6))?;
    let second_row = row_to_index(part(8))?;
    let area = Region::new(
        Coordinate::new(first_col, first_row),
        Coordinate::new(second_col, second_row),
    );
    Some(match edit.map_region(&area, true) {
        Some(moved) => {
            let (top, bottom) = if first_row <= second_row {
                (moved.top(), moved.bottom())
            } else {
                (moved.bottom(), moved.top())
            };
            format!(
                "{}{}{}{}:{}{}{}{}",
                part(1),
                part(2),
                part(3),
                top + 1,
                part(5),
                part(6),
                part(7),
                bottom + 1
            )
        }
        None => "#REF!".to_owned(),
    })
}
