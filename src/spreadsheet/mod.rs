//! # Spreadsheet Grid Module
//!
//! A loaded workbook seen as named two-dimensional grids of typed cell values,
//! each annotated with its merged ranges. The extraction engine only talks to
//! the [`Grid`] trait; [`Workbook`] is the provider that answers sheet lookups
//! and existence checks, and [`xlsx`] fills a workbook from an `.xlsx` package.
pub mod cell;
pub mod reference;
pub mod sheet;
pub mod xlsx;

pub use cell::CellValue;
pub use sheet::Sheet;

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading workbooks or accessing their sheets.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Requested worksheet is not part of the workbook
    #[error("Sheet '{0}' not found")]
    SheetNotFoundError(String),

    /// A required part of the workbook package is missing
    #[error("Missing '{1}' in workbook '{0}'")]
    FileError(String, String),

    /// Workbook package declares no worksheets
    #[error("Workbook '{0}' contains no sheets")]
    SpreadsheetEmptyError(String),

    /// File extension is not a supported workbook format
    #[error("Cannot detect file format for '{0}'")]
    InvalidFileFormatError(String),
}

/// Rectangular merged cell range, 1-based and inclusive on both ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergedRange {
    pub first_row: usize,
    pub last_row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

/// Read-only access to a single worksheet.
///
/// Rows and columns are 1-based, matching the labels a person sees in a
/// spreadsheet application. Out-of-range positions read as empty.
pub trait Grid {
    /// Worksheet name
    fn name(&self) -> &str;

    /// Value at (row, col); empty when nothing is stored there
    fn cell_value(&self, row: usize, col: usize) -> &CellValue;

    /// Column spans `(start_col, end_col)` of the merged ranges whose top row is `row`
    fn merged_ranges_in_row(&self, row: usize) -> Vec<(usize, usize)>;

    /// Highest used row
    fn max_row(&self) -> usize;

    /// Highest used column
    fn max_column(&self) -> usize;

    /// Non-blank cells of `row` from column 1 through [`Grid::max_column`].
    fn row_values(&self, row: usize) -> Vec<(usize, &CellValue)> {
        (1..=self.max_column())
            .map(|col| (col, self.cell_value(row, col)))
            .filter(|(_, value)| !value.is_blank())
            .collect()
    }
}

/// Loaded workbook: an ordered collection of worksheets.
#[derive(Clone, Debug, Default)]
pub struct Workbook {
    /// Source name (usually the file name)
    pub(crate) name: String,
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Creates an empty workbook.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            sheets: Vec::new(),
        }
    }

    /// Opens a workbook file, choosing the reader from the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not supported or the package is
    /// missing, unreadable, or declares no worksheets.
    pub fn open<P>(path: P) -> Result<Workbook, crate::error::ReportError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let name = path.to_string_lossy().to_string();
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_ascii_lowercase());
        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") => xlsx::open(path),
            _ => Err(SpreadsheetError::InvalidFileFormatError(name))?,
        }
    }

    /// Loads an `.xlsx` package from any seekable reader, e.g. an uploaded buffer.
    pub fn from_reader<RS>(name: &str, reader: RS) -> Result<Workbook, crate::error::ReportError>
    where
        RS: std::io::Read + std::io::Seek,
    {
        xlsx::read(name, reader)
    }

    /// Adds a worksheet, replacing any existing sheet with the same name.
    pub fn push(&mut self, sheet: Sheet) -> &mut Self {
        match self.sheets.iter_mut().find(|existing| existing.name == sheet.name) {
            Some(existing) => *existing = sheet,
            None => self.sheets.push(sheet),
        }
        self
    }

    /// Workbook name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of all worksheets in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.to_owned()).collect()
    }

    /// Returns true if a worksheet with this exact name exists.
    pub fn contains_sheet(&self, name: &str) -> bool {
        self.sheets.iter().any(|sheet| sheet.name == name)
    }

    /// Looks a worksheet up by exact name.
    ///
    /// # Errors
    ///
    /// Returns [`SpreadsheetError::SheetNotFoundError`] if no such sheet exists.
    pub fn sheet(&self, name: &str) -> Result<&Sheet, SpreadsheetError> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name == name)
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(name.to_owned()))
    }

    /// Number of worksheets.
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    /// Returns true if the workbook has no worksheets.
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workbook_sheet_lookup() {
        let mut workbook = Workbook::new("report.xlsx");
        workbook.push(Sheet::new("PT ABC")).push(Sheet::new("PT XYZ"));

        assert_eq!(workbook.len(), 2);
        assert_eq!(workbook.sheet_names(), vec!["PT ABC", "PT XYZ"]);
        assert!(workbook.contains_sheet("PT XYZ"));
        assert!(!workbook.contains_sheet("pt xyz"));
        assert_eq!(workbook.sheet("PT ABC").map(|sheet| sheet.name()).ok(), Some("PT ABC"));
        assert!(matches!(
            workbook.sheet("PT QRS"),
            Err(SpreadsheetError::SheetNotFoundError(name)) if name == "PT QRS"
        ));
    }

    #[test]
    fn workbook_push_replaces_same_name() {
        let mut replacement = Sheet::new("PT ABC");
        replacement.set(1, 1, "new");
        let mut workbook = Workbook::new("report.xlsx");
        workbook.push(Sheet::new("PT ABC")).push(replacement);

        assert_eq!(workbook.len(), 1);
        assert_eq!(workbook.sheet("PT ABC").map(|sheet| sheet.len()).ok(), Some(1));
    }

    #[test]
    fn workbook_open_rejects_unknown_extension() {
        let result = Workbook::open("report.csv");
        assert!(matches!(
            result,
            Err(crate::error::ReportError::SpreadsheetError(SpreadsheetError::InvalidFileFormatError(_)))
        ));
    }
}
