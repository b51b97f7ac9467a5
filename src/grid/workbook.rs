use crate::error::BinderError;
use crate::grid::memory::MemorySheet;
use glob::Pattern;

/// Criteria for choosing which sheets of a workbook to bind.
#[derive(Clone, Debug, Default)]
pub struct SheetSelection {
    /// Sheet name patterns, None accepts every sheet
    pub(crate) patterns: Option<Vec<Pattern>>,
    /// Maximum number of sheets to select
    pub(crate) limit: Option<usize>,
}

impl SheetSelection {
    /// Builds a selection from glob patterns such as `"2024-*"`.
    pub fn new(patterns: &[&str]) -> Result<Self, BinderError> {
        let patterns = patterns
            .iter()
            .map(|pattern| Pattern::new(pattern))
            .collect::<Result<Vec<Pattern>, glob::PatternError>>()?;
        Ok(Self {
            patterns: Some(patterns),
            limit: None,
        })
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if no patterns are specified or if the name matches any pattern.
    pub fn accept(&self, sheet_name: &str) -> bool {
        match &self.patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(sheet_name)),
            None => true,
        }
    }
}

/// Ordered collection of named in-memory sheets.
#[derive(Clone, Debug, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<MemorySheet>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an empty sheet, or returns the existing sheet with that name.
    pub fn add_sheet(&mut self, name: &str) -> &mut MemorySheet {
        let index = match self.sheets.iter().position(|sheet| sheet.name == name) {
            Some(index) => index,
            None => {
                self.sheets.push(MemorySheet::new(name));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index]
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|sheet| sheet.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&MemorySheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut MemorySheet> {
        self.sheets.iter_mut().find(|sheet| sheet.name == name)
    }

    /// Sheets accepted by the selection, in workbook order.
    pub fn select(&self, selection: &SheetSelection) -> Vec<&MemorySheet> {
        self.sheets
            .iter()
            .filter(|sheet| selection.accept(&sheet.name))
            .take(selection.limit.unwrap_or(usize::MAX))
            .collect()
    }
}
