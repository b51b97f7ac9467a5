use crate::grid::Coordinate;
use crate::grid::Grid;
use crate::table::TableError;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::borrow::Cow;

/// Label text, or a regular expression when `regex` is set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelPattern {
    pub text: String,
    #[serde(default)]
    pub regex: bool,
}

impl LabelPattern {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            regex: false,
        }
    }

    pub fn regex(pattern: &str) -> Self {
        Self {
            text: pattern.to_owned(),
            regex: true,
        }
    }
}

/// Rule deciding where the body of a table ends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableTerminal {
    /// Ends before the first row blank in every mapped column
    #[default]
    Empty,
    /// Ends before the first row without a bottom border under any mapped cell
    Border,
    /// Ends before the row holding a matching label
    LabelMatch(LabelPattern),
    /// Reads only the first `n` non-empty header cells, the body ends like `Empty`
    HeaderLimit(usize),
    /// Exactly `n` rows
    FixedRange(usize),
}

/// Removes every whitespace character, including ideographic and no-break spaces.
pub(crate) fn normalize(text: &str, enabled: bool) -> Cow<'_, str> {
    if enabled && text.chars().any(char::is_whitespace) {
        Cow::Owned(text.chars().filter(|char| !char.is_whitespace()).collect())
    } else {
        Cow::Borrowed(text)
    }
}

/// Compiled label comparison shared by anchors, headers and terminals.
#[derive(Clone, Debug)]
pub(crate) enum LabelMatcher {
    Exact { text: String, normalize: bool },
    Pattern { regex: Regex, normalize: bool },
}

impl LabelMatcher {
    pub(crate) fn new(text: &str, regex: bool, normalize: bool) -> Result<Self, TableError> {
        if regex {
            let regex = Regex::new(text)
                .map_err(|e| TableError::Configuration(format!("invalid label pattern '{}': {}", text, e)))?;
            Ok(LabelMatcher::Pattern { regex, normalize })
        } else {
            Ok(LabelMatcher::Exact {
                text: self::normalize(text, normalize).into_owned(),
                normalize,
            })
        }
    }

    pub(crate) fn from_pattern(pattern: &LabelPattern, normalize: bool) -> Result<Self, TableError> {
        Self::new(&pattern.text, pattern.regex, normalize)
    }

    pub(crate) fn matches(&self, text: &str) -> bool {
        match self {
            LabelMatcher::Exact { text: label, normalize } => {
                !label.is_empty() && self::normalize(text, *normalize) == label.as_str()
            }
            LabelMatcher::Pattern { regex, normalize } => {
                let text = self::normalize(text, *normalize);
                !text.is_empty() && regex.is_match(&text)
            }
        }
    }
}

/// Terminal condition bound to the columns of one resolved table.
#[derive(Clone, Debug)]
pub(crate) struct TerminalCheck {
    kind: TerminalKind,
    /// Columns read by the blank and border checks
    columns: Vec<usize>,
    /// Leftmost and rightmost header columns, searched for terminal labels
    span: (usize, usize),
}

#[derive(Clone, Debug)]
enum TerminalKind {
    Empty,
    Border,
    Label(LabelMatcher),
    Fixed(usize),
}

impl TerminalCheck {
    pub(crate) fn new(
        terminal: &TableTerminal,
        columns: Vec<usize>,
        span: (usize, usize),
        normalize: bool,
    ) -> Result<Self, TableError> {
        let kind = match terminal {
            TableTerminal::Empty | TableTerminal::HeaderLimit(_) => TerminalKind::Empty,
            TableTerminal::Border => TerminalKind::Border,
            TableTerminal::LabelMatch(pattern) => TerminalKind::Label(LabelMatcher::from_pattern(pattern, normalize)?),
            TableTerminal::FixedRange(count) => TerminalKind::Fixed(*count),
        };
        Ok(Self { kind, columns, span })
    }

    /// Returns true when `row` is no longer part of the body. `seen` counts the
    /// body rows already consumed.
    pub(crate) fn stops_at(&self, grid: &dyn Grid, row: usize, seen: usize) -> bool {
        if let TerminalKind::Label(matcher) = &self.kind {
            let (left, right) = self.span;
            if (left..=right).any(|column| matcher.matches(&grid.cell_text(Coordinate::new(column, row)))) {
                return true;
            }
        }
        if let TerminalKind::Fixed(count) = self.kind {
            return seen >= count;
        }
        let past_end = grid.used_bounds().map_or(true, |bounds| row > bounds.bottom());
        if past_end {
            return true;
        }
        match self.kind {
            TerminalKind::Empty => self.is_blank_row(grid, row),
            TerminalKind::Border => !self
                .columns
                .iter()
                .any(|column| grid.has_bottom_border(Coordinate::new(*column, row))),
            _ => false,
        }
    }

    pub(crate) fn is_blank_row(&self, grid: &dyn Grid, row: usize) -> bool {
        self.columns
            .iter()
            .all(|column| grid.merged_value(Coordinate::new(*column, row)).is_blank())
    }
}
