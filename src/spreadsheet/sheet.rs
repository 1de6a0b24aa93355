use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::Grid;
use crate::spreadsheet::MergedRange;
use std::collections::HashMap;

/// In-memory worksheet: sparse cell values plus merged-range annotations.
///
/// Rows and columns are 1-based. Cells that were never set read as
/// [`CellValue::Empty`].
#[derive(Clone, Debug, Default)]
pub struct Sheet {
    /// Sheet name as shown on the workbook tab
    pub(crate) name: String,
    /// Non-empty cells keyed by (row, col)
    cells: HashMap<(usize, usize), CellValue>,
    /// Merged ranges in declaration order
    merged: Vec<MergedRange>,
    /// Highest row holding a value or a merged range
    max_row: usize,
    /// Highest column holding a value or a merged range
    max_col: usize,
}

impl Sheet {
    /// Creates an empty sheet.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Stores a value at (row, col). Empty values clear the cell.
    /// Positions with a zero row or column are ignored.
    pub fn set(&mut self, row: usize, col: usize, value: impl Into<CellValue>) -> &mut Self {
        if row == 0 || col == 0 {
            return self;
        }
        let value = value.into();
        if value == CellValue::Empty {
            self.cells.remove(&(row, col));
        } else {
            self.update_bound(row, col);
            self.cells.insert((row, col), value);
        }
        self
    }

    /// Declares a merged range. Corners are normalised so that the first
    /// position is the top-left one. Ranges touching row or column zero are ignored.
    pub fn merge(&mut self, first: (usize, usize), last: (usize, usize)) -> &mut Self {
        let range = MergedRange {
            first_row: first.0.min(last.0),
            last_row: first.0.max(last.0),
            first_col: first.1.min(last.1),
            last_col: first.1.max(last.1),
        };
        if range.first_row == 0 || range.first_col == 0 {
            return self;
        }
        self.update_bound(range.last_row, range.last_col);
        self.merged.push(range);
        self
    }

    /// Shorthand for a merged range spanning columns on one row.
    pub fn merge_row(&mut self, row: usize, first_col: usize, last_col: usize) -> &mut Self {
        self.merge((row, first_col), (row, last_col))
    }

    /// Number of non-empty cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the sheet holds no values.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All merged ranges in declaration order.
    pub fn merged_ranges(&self) -> &[MergedRange] {
        &self.merged
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
    }
}

impl Grid for Sheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn cell_value(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells.get(&(row, col)).unwrap_or(&EMPTY)
    }

    fn merged_ranges_in_row(&self, row: usize) -> Vec<(usize, usize)> {
        self.merged
            .iter()
            .filter(|range| range.first_row == row)
            .map(|range| (range.first_col, range.last_col))
            .collect()
    }

    fn max_row(&self) -> usize {
        self.max_row
    }

    fn max_column(&self) -> usize {
        self.max_col
    }
}
