use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Errors related to A1-style address parsing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    #[error("Invalid address format '{0}'")]
    FormatError(String),
}

/// Converts column letters to a 0-based column index: A = 0, Z = 25, AA = 26.
pub fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|char| char.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .to_ascii_uppercase()
        .chars()
        .map(|char| char as usize - 'A' as usize + 1)
        .reduce(|index, digit| index * 26 + digit)
        .map(|col| col - 1)
}

/// Converts a 1-based row number string to a 0-based row index.
pub fn row_to_index(number: &str) -> Option<usize> {
    number
        .parse::<usize>()
        .ok()
        .filter(|row| *row > 0)
        .map(|row| row - 1)
}

/// Converts a 0-based column index to column letters.
pub fn index_to_col(col: usize) -> String {
    let mut col = col + 1;
    let mut letters = String::new();
    while col > 0 {
        col -= 1;
        letters.insert(0, (b'A' + (col % 26) as u8) as char);
        col /= 26;
    }
    letters
}

/// Converts 0-based row & column indexes to an A1-style reference.
pub fn index_to_reference(row: usize, col: usize) -> String {
    format!("{}{}", index_to_col(col), row + 1)
}

static CELL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?(\d+)$").expect("Hardcode regex pattern"));

/// Converts an A1-style reference (absolute markers allowed) to 0-based (row, col) indexes.
pub fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let captures = CELL_PATTERN.captures(reference.trim())?;
    let col = col_to_index(captures.get(1)?.as_str())?;
    let row = row_to_index(captures.get(2)?.as_str())?;
    Some((row, col))
}

/// Zero-based grid position. Ordered by row first, then column, which is the scan order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub column: usize,
    pub row: usize,
}

impl Coordinate {
    pub const fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }

    /// Returns the A1-style address of this coordinate.
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.column)
    }

    pub const fn right(&self, count: usize) -> Self {
        Self::new(self.column + count, self.row)
    }

    pub const fn down(&self, count: usize) -> Self {
        Self::new(self.column, self.row + count)
    }

    pub const fn with_row(&self, row: usize) -> Self {
        Self::new(self.column, row)
    }
}

impl Ord for Coordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.row, self.column).cmp(&(other.row, other.column))
    }
}

impl PartialOrd for Coordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reference())
    }
}

impl FromStr for Coordinate {
    type Err = ReferenceError;

    /// Parses an A1-style address such as "B9" or "$B$9".
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        reference_to_index(value)
            .map(|(row, column)| Coordinate::new(column, row))
            .ok_or_else(|| ReferenceError::FormatError(value.to_owned()))
    }
}

/// Rectangular block of cells, used for merged cells and table areas.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub top_left: Coordinate,
    pub bottom_right: Coordinate,
}

impl Region {
    /// Creates a region from any two opposite corners.
    pub fn new(first: Coordinate, second: Coordinate) -> Self {
        Self {
            top_left: Coordinate::new(first.column.min(second.column), first.row.min(second.row)),
            bottom_right: Coordinate::new(first.column.max(second.column), first.row.max(second.row)),
        }
    }

    pub fn cell(at: Coordinate) -> Self {
        Self { top_left: at, bottom_right: at }
    }

    pub fn top(&self) -> usize {
        self.top_left.row
    }

    pub fn bottom(&self) -> usize {
        self.bottom_right.row
    }

    pub fn left(&self) -> usize {
        self.top_left.column
    }

    pub fn right(&self) -> usize {
        self.bottom_right.column
    }

    pub fn width(&self) -> usize {
        self.right() - self.left() + 1
    }

    pub fn height(&self) -> usize {
        self.bottom() - self.top() + 1
    }

    pub fn is_single_cell(&self) -> bool {
        self.top_left == self.bottom_right
    }

    pub fn contains(&self, at: Coordinate) -> bool {
        self.left() <= at.column
            && at.column <= self.right()
            && self.top() <= at.row
            && at.row <= self.bottom()
    }

    pub fn intersects(&self, other: &Region) -> bool {
        self.left() <= other.right()
            && other.left() <= self.right()
            && self.top() <= other.bottom()
            && other.top() <= self.bottom()
    }

    /// Returns the same region with its rows replaced.
    pub fn with_rows(&self, top: usize, bottom: usize) -> Self {
        Region::new(
            Coordinate::new(self.left(), top),
            Coordinate::new(self.right(), bottom),
        )
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.top_left)
        } else {
            write!(f, "{}:{}", self.top_left, self.bottom_right)
        }
    }
}

impl FromStr for Region {
    type Err = ReferenceError;

    /// Parses "A1:C3" or a single cell "B2".
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let error = || ReferenceError::FormatError(value.to_owned());
        match value.split_once(':') {
            Some((first, second)) => {
                let first = first.parse::<Coordinate>().map_err(|_| error())?;
                let second = second.parse::<Coordinate>().map_err(|_| error())?;
                Ok(Region::new(first, second))
            }
            None => value.parse::<Coordinate>().map(Region::cell).map_err(|_| error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(col_to_index("A"), Some(0));
        assert_eq!(col_to_index("z"), Some(25));
        assert_eq!(col_to_index("AA"), Some(26));
        assert_eq!(col_to_index("XFD"), Some(16_383));
        assert_eq!(col_to_index(""), None);
        assert_eq!(col_to_index("A1"), None);

        assert_eq!(index_to_col(0), "A");
        assert_eq!(index_to_col(25), "Z");
        assert_eq!(index_to_col(26), "AA");
        assert_eq!(index_to_col(16_383), "XFD");
    }

    #[test]
    fn coordinate_address() {
        let at: Coordinate = "B9".parse().unwrap();
        assert_eq!(at, Coordinate::new(1, 8));
        assert_eq!(at.to_string(), "B9");
        assert_eq!("$c$3".parse::<Coordinate>().unwrap(), Coordinate::new(2, 2));
        assert!("B0".parse::<Coordinate>().is_err());
        assert!("9B".parse::<Coordinate>().is_err());
        assert!("".parse::<Coordinate>().is_err());
    }

    #[test]
    fn coordinate_scan_order() {
        let mut coordinates = vec![
            Coordinate::new(3, 1),
            Coordinate::new(0, 2),
            Coordinate::new(1, 1),
        ];
        coordinates.sort();
        assert_eq!(
            coordinates,
            vec![Coordinate::new(1, 1), Coordinate::new(3, 1), Coordinate::new(0, 2)]
        );
    }

    #[test]
    fn region_parse_and_bounds() {
        let region: Region = "C3:A1".parse().unwrap();
        assert_eq!(region.top_left, Coordinate::new(0, 0));
        assert_eq!(region.bottom_right, Coordinate::new(2, 2));
        assert_eq!(region.to_string(), "A1:C3");
        assert_eq!(region.width(), 3);
        assert_eq!(region.height(), 3);
        assert!(region.contains(Coordinate::new(1, 1)));
        assert!(!region.contains(Coordinate::new(3, 1)));

        let cell: Region = "D4".parse().unwrap();
        assert!(cell.is_single_cell());
        assert_eq!(cell.to_string(), "D4");
        assert!("A1:".parse::<Region>().is_err());
    }

    #[test]
    fn region_intersection() {
        let region: Region = "B2:C3".parse().unwrap();
        assert!(region.intersects(&"C3:D4".parse().unwrap()));
        assert!(!region.intersects(&"D1:D9".parse().unwrap()));
    }
}
