use crate::grid::reference::index_to_col;
use crate::grid::Coordinate;
use crate::grid::Grid;
use crate::grid::Region;
use crate::table::terminal::LabelMatcher;
use crate::table::terminal::TableTerminal;
use crate::table::TableError;
use crate::table::TableOptions;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::sync::LazyLock;

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]*)\}").expect("Hardcode regex pattern"));

/// Bounds of a map column, given by the labels around it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapColumnSpec {
    pub previous_column_name: Option<String>,
    pub next_column_name: Option<String>,
}

/// Declares how one record field finds its column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSpec {
    pub field: String,
    /// Header text, or a pattern when `regex` is set
    pub label: Option<String>,
    pub regex: bool,
    /// Selects a physical column beneath a merged header
    pub header_merged: Option<usize>,
    pub optional: bool,
    /// Collects a run of header columns into a key/value map
    pub map: Option<MapColumnSpec>,
    /// Formula written instead of the value, with `{row}`, `{column}` and `{cell}` placeholders
    pub formula: Option<String>,
}

impl ColumnSpec {
    pub fn new(field: &str, label: &str) -> Self {
        Self {
            field: field.to_owned(),
            label: Some(label.to_owned()),
            ..Self::default()
        }
    }

    pub fn map(field: &str, previous_column_name: Option<&str>, next_column_name: Option<&str>) -> Self {
        Self {
            field: field.to_owned(),
            map: Some(MapColumnSpec {
                previous_column_name: previous_column_name.map(str::to_owned),
                next_column_name: next_column_name.map(str::to_owned),
            }),
            ..Self::default()
        }
    }

    /// Binds the `depth`-th column under a merged header. Without a label the
    /// merged header of the previous column is reused.
    pub fn merged(field: &str, label: Option<&str>, depth: usize) -> Self {
        Self {
            field: field.to_owned(),
            label: label.map(str::to_owned),
            header_merged: Some(depth),
            ..Self::default()
        }
    }

    pub fn regex(mut self) -> Self {
        self.regex = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_formula(mut self, formula: &str) -> Self {
        self.formula = Some(formula.to_owned());
        self
    }
}

/// One dynamic column of a map binding.
#[derive(Clone, Debug, PartialEq)]
pub struct MapKey {
    pub key: String,
    pub column: usize,
}

/// A field bound to a header column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnBinding {
    pub field: String,
    /// Header cell of the bound column
    pub header: Coordinate,
    /// Full header cell, wider than one column when merged
    pub header_region: Region,
    pub label: String,
    pub is_map_range: bool,
    /// Last dynamic column of a map binding
    pub map_range_end: Option<Coordinate>,
    pub map_keys: Vec<MapKey>,
    /// The map runs to the end of the header and may grow on save
    pub unbounded: bool,
    pub merged: bool,
    pub optional: bool,
    pub formula: Option<String>,
}

impl ColumnBinding {
    pub fn column(&self) -> usize {
        self.header.column
    }

    /// Every column read or written for this binding.
    pub fn columns(&self) -> Vec<usize> {
        if self.is_map_range {
            self.map_keys.iter().map(|key| key.column).collect()
        } else {
            vec![self.header.column]
        }
    }
}

/// Bindings of one table header.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnMapping {
    pub bindings: Vec<ColumnBinding>,
    /// Rightmost header cell
    pub last_header: Coordinate,
    pub first_data_row: usize,
}

impl ColumnMapping {
    /// Every mapped column, in binding order.
    pub fn columns(&self) -> Vec<usize> {
        self.bindings.iter().flat_map(ColumnBinding::columns).collect()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct HeaderCell {
    pub(crate) region: Region,
    pub(crate) text: String,
}

/// Reads header cells rightwards from `origin`, merged cells counting once.
pub(crate) fn scan_header(grid: &dyn Grid, origin: Coordinate, options: &TableOptions) -> Vec<HeaderCell> {
    let limit = match options.terminal {
        TableTerminal::HeaderLimit(count) => Some(count),
        _ => None,
    };
    let right = match grid.used_bounds() {
        Some(bounds) => bounds.right(),
        None => return Vec::new(),
    };
    let mut cells = Vec::new();
    let mut blanks = 0;
    let mut column = origin.column;
    while column <= right && limit.map_or(true, |limit| cells.len() < limit) {
        let at = Coordinate::new(column, origin.row);
        let region = grid.find_merged_region(at).unwrap_or(Region::cell(at));
        let text = grid.cell_text(region.top_left).trim().to_owned();
        column = region.right() + 1;
        if text.is_empty() {
            blanks += 1;
            if blanks > options.header_space_tolerance {
                break;
            }
            continue;
        }
        blanks = 0;
        cells.push(HeaderCell { region, text });
    }
    cells
}

fn find_label(cells: &[HeaderCell], from: usize, matcher: &LabelMatcher) -> Option<usize> {
    (from..cells.len()).find(|index| matcher.matches(&cells[*index].text))
}

fn check_formula(spec: &ColumnSpec) -> Result<(), TableError> {
    let Some(formula) = &spec.formula else {
        return Ok(());
    };
    for captures in PLACEHOLDER_PATTERN.captures_iter(formula) {
        let name = captures.get(1).map(|m| m.as_str()).unwrap_or("");
        if !matches!(name, "row" | "column" | "cell") {
            return Err(TableError::Configuration(format!(
                "unknown placeholder '{{{}}}' in formula of field '{}'",
                name, spec.field
            )));
        }
    }
    Ok(())
}

/// Fills the placeholders of a formula template for one target cell.
pub(crate) fn render_formula(template: &str, at: Coordinate) -> String {
    template
        .replace("{row}", &(at.row + 1).to_string())
        .replace("{column}", &index_to_col(at.column))
        .replace("{cell}", &at.reference())
}

fn binding(spec: &ColumnSpec, header: Coordinate, cell: &HeaderCell) -> ColumnBinding {
    ColumnBinding {
        field: spec.field.to_owned(),
        header,
        header_region: cell.region,
        label: cell.text.to_owned(),
        is_map_range: false,
        map_range_end: None,
        map_keys: Vec::new(),
        unbounded: false,
        merged: !cell.region.is_single_cell(),
        optional: spec.optional,
        formula: spec.formula.to_owned(),
    }
}

/// Binds column specs to the header row starting at `origin`.
///
/// Specs are matched in declared order, each one to the right of the previous
/// match, so unrelated header cells between them are skipped.
pub fn resolve_columns(
    grid: &dyn Grid,
    origin: Coordinate,
    specs: &[ColumnSpec],
    options: &TableOptions,
) -> Result<ColumnMapping, TableError> {
    let cells = scan_header(grid, origin, options);
    let normalize = options.normalize_whitespace;
    let not_found = |label: &str| TableError::LabelNotFound {
        label: label.to_owned(),
        row: origin.row + 1,
    };
    let mut bindings: Vec<ColumnBinding> = Vec::new();
    let mut cursor = 0;
    for spec in specs {
        check_formula(spec)?;
        if let Some(map) = &spec.map {
            let mut start = cursor;
            if let Some(previous) = &map.previous_column_name {
                let matcher = LabelMatcher::new(previous, spec.regex, normalize)?;
                match find_label(&cells, 0, &matcher) {
                    Some(index) => start = start.max(index + 1),
                    None if spec.optional => continue,
                    None => return Err(not_found(previous)),
                }
            }
            let end = match &map.next_column_name {
                Some(next) => {
                    let matcher = LabelMatcher::new(next, spec.regex, normalize)?;
                    match find_label(&cells, start, &matcher) {
                        Some(index) => index,
                        None if spec.optional => continue,
                        None => return Err(not_found(next)),
                    }
                }
                None => cells.len(),
            };
            let keys: Vec<MapKey> = cells[start.min(end)..end]
                .iter()
                .map(|cell| MapKey {
                    key: cell.text.to_owned(),
                    column: cell.region.left(),
                })
                .collect();
            let first = match cells.get(start) {
                Some(cell) => cell.region.top_left,
                None => Coordinate::new(
                    cells.last().map_or(origin.column, |cell| cell.region.right() + 1),
                    origin.row,
                ),
            };
            bindings.push(ColumnBinding {
                field: spec.field.to_owned(),
                header: first,
                header_region: Region::cell(first),
                label: map.previous_column_name.to_owned().unwrap_or_default(),
                is_map_range: true,
                map_range_end: keys.last().map(|key| Coordinate::new(key.column, origin.row)),
                map_keys: keys,
                unbounded: map.next_column_name.is_none(),
                merged: false,
                optional: spec.optional,
                formula: None,
            });
            cursor = end;
        } else if let Some(depth) = spec.header_merged {
            let (cell, advance) = match &spec.label {
                Some(label) => {
                    let matcher = LabelMatcher::new(label, spec.regex, normalize)?;
                    match find_label(&cells, cursor, &matcher) {
                        Some(index) => (cells[index].clone(), Some(index + 1)),
                        None if spec.optional => continue,
                        None => return Err(not_found(label)),
                    }
                }
                None => match bindings.last() {
                    Some(previous) if previous.merged => (
                        HeaderCell {
                            region: previous.header_region,
                            text: previous.label.to_owned(),
                        },
                        None,
                    ),
                    _ => {
                        return Err(TableError::Configuration(format!(
                            "field '{}' continues a merged header, but the previous column is not merged",
                            spec.field
                        )))
                    }
                },
            };
            if cell.region.width() < 2 || depth >= cell.region.width() {
                return Err(TableError::Configuration(format!(
                    "header '{}' spans {} column(s), depth {} of field '{}' is outside it",
                    cell.text,
                    cell.region.width(),
                    depth,
                    spec.field
                )));
            }
            let header = Coordinate::new(cell.region.left() + depth, origin.row);
            bindings.push(binding(spec, header, &cell));
            if let Some(advance) = advance {
                cursor = advance;
            }
        } else {
            let Some(label) = &spec.label else {
                return Err(TableError::Configuration(format!(
                    "field '{}' needs a label",
                    spec.field
                )));
            };
            let matcher = LabelMatcher::new(label, spec.regex, normalize)?;
            match find_label(&cells, cursor, &matcher) {
                Some(index) => {
                    let cell = &cells[index];
                    bindings.push(binding(spec, cell.region.top_left, cell));
                    cursor = index + 1;
                }
                None if spec.optional => log::debug!("Optional column '{}' not found", label),
                None => return Err(not_found(label)),
            }
        }
    }
    let last_header = cells
        .last()
        .map_or(origin, |cell| Coordinate::new(cell.region.right(), origin.row));
    let header_height = cells
        .iter()
        .map(|cell| cell.region.bottom() + 1 - origin.row)
        .max()
        .unwrap_or(1);
    let first_data_row = origin.row + options.data_row_offset.unwrap_or(header_height);
    Ok(ColumnMapping {
        bindings,
        last_header,
        first_data_row,
    })
}
