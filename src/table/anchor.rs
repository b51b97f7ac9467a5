use crate::error::ResultOptionChain;
use crate::grid::Coordinate;
use crate::grid::Grid;
use crate::grid::Region;
use crate::table::terminal::LabelMatcher;
use crate::table::TableError;
use serde::Deserialize;
use serde::Serialize;

/// Where the header origin lies relative to an anchor label.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Right,
    Down,
}

/// Label searched for in the grid to locate a table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelAnchor {
    pub text: String,
    /// Treat `text` as a regular expression
    pub regex: bool,
    /// Cells between the label and the header origin
    pub offset: usize,
    pub direction: Direction,
    /// Address range restricting the search, e.g. `"A1:F20"`
    pub search_area: Option<String>,
}

impl LabelAnchor {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            ..Self::default()
        }
    }

    pub fn regex(mut self) -> Self {
        self.regex = true;
        self
    }

    pub fn offset(mut self, offset: usize, direction: Direction) -> Self {
        self.offset = offset;
        self.direction = direction;
        self
    }

    pub fn search_area(mut self, area: &str) -> Self {
        self.search_area = Some(area.to_owned());
        self
    }
}

/// How to find the header origin of a table.
///
/// Any combination of kinds may be given; the address wins over explicit
/// coordinates, which win over the label. Coordinates are signed because
/// they come straight from configuration and are validated on resolution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorSpec {
    pub address: Option<String>,
    pub column: Option<i64>,
    pub row: Option<i64>,
    pub label: Option<LabelAnchor>,
    /// Report a missing table as absent instead of failing
    pub optional: bool,
}

impl AnchorSpec {
    pub fn address(address: &str) -> Self {
        Self {
            address: Some(address.to_owned()),
            ..Self::default()
        }
    }

    pub fn at(column: i64, row: i64) -> Self {
        Self {
            column: Some(column),
            row: Some(row),
            ..Self::default()
        }
    }

    pub fn label(label: LabelAnchor) -> Self {
        Self {
            label: Some(label),
            ..Self::default()
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    fn describe(&self) -> String {
        match (&self.address, &self.label) {
            (Some(address), _) => format!("at '{}'", address),
            (None, Some(label)) => format!("labeled '{}'", label.text),
            (None, None) => format!("at ({:?}, {:?})", self.column, self.row),
        }
    }
}

fn address_coordinate(spec: &AnchorSpec) -> Result<Option<Coordinate>, TableError> {
    match &spec.address {
        Some(address) => address
            .parse::<Coordinate>()
            .map(Some)
            .map_err(|e| TableError::Configuration(e.to_string())),
        None => Ok(None),
    }
}

fn index_coordinate(spec: &AnchorSpec) -> Result<Option<Coordinate>, TableError> {
    match (spec.column, spec.row) {
        (None, None) => Ok(None),
        (Some(column), Some(row)) if column >= 0 && row >= 0 => {
            Ok(Some(Coordinate::new(column as usize, row as usize)))
        }
        (Some(column), Some(row)) => Err(TableError::Configuration(format!(
            "anchor coordinates ({}, {}) must not be negative",
            column, row
        ))),
        _ => Err(TableError::Configuration(
            "anchor needs both a column and a row".to_owned(),
        )),
    }
}

fn label_coordinate(grid: &dyn Grid, spec: &AnchorSpec, normalize: bool) -> Result<Option<Coordinate>, TableError> {
    let Some(label) = &spec.label else {
        return Ok(None);
    };
    let matcher = LabelMatcher::new(&label.text, label.regex, normalize)?;
    let area = match &label.search_area {
        Some(area) => Some(
            area.parse::<Region>()
                .map_err(|e| TableError::Configuration(e.to_string()))?,
        ),
        None => None,
    };
    let Some(bounds) = grid.used_bounds() else {
        return Ok(None);
    };
    let bounds = match area {
        Some(area) if !area.intersects(&bounds) => return Ok(None),
        Some(area) => Region::new(
            Coordinate::new(area.left().max(bounds.left()), area.top().max(bounds.top())),
            Coordinate::new(area.right().min(bounds.right()), area.bottom().min(bounds.bottom())),
        ),
        None => bounds,
    };
    for row in bounds.top()..=bounds.bottom() {
        for column in bounds.left()..=bounds.right() {
            let at = Coordinate::new(column, row);
            if matcher.matches(&grid.cell_text(at)) {
                return Ok(Some(move_from_label(grid, at, label)));
            }
        }
    }
    Ok(None)
}

/// Offsets are counted from the far edge of a merged label.
fn move_from_label(grid: &dyn Grid, at: Coordinate, label: &LabelAnchor) -> Coordinate {
    if label.offset == 0 {
        return at;
    }
    let region = grid.find_merged_region(at).unwrap_or(Region::cell(at));
    match label.direction {
        Direction::Right => Coordinate::new(region.right() + label.offset, at.row),
        Direction::Down => Coordinate::new(at.column, region.bottom() + label.offset),
    }
}

/// Resolves the header origin of a table.
///
/// Returns `Ok(None)` when an optional anchor is not found.
pub fn resolve_anchor(grid: &dyn Grid, spec: &AnchorSpec, normalize: bool) -> Result<Option<Coordinate>, TableError> {
    if spec.address.is_none() && spec.column.is_none() && spec.row.is_none() && spec.label.is_none() {
        return Err(TableError::Configuration(
            "anchor names no address, coordinates or label".to_owned(),
        ));
    }
    let by_address = address_coordinate(spec)?;
    let by_index = index_coordinate(spec)?;
    if let (Some(address), Some(index)) = (by_address, by_index) {
        if address != index {
            log::debug!("Anchor address {} overrides coordinates {}", address, index);
        }
    }
    let found = Ok::<_, TableError>(by_address)
        .ok_none_else(|| Ok(by_index))
        .ok_none_else(|| label_coordinate(grid, spec, normalize))?;
    match found {
        Some(origin) => Ok(Some(origin)),
        None if spec.optional => {
            log::debug!("Optional anchor {} not found", spec.describe());
            Ok(None)
        }
        None => Err(TableError::AnchorNotFound(spec.describe())),
    }
}
