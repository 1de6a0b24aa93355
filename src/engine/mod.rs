//! # Period Extraction Engine
//!
//! Locates the four data columns of a requested reporting period on a
//! loosely-structured worksheet and reads a declared list of rows from them.
//!
//! The pipeline for one worksheet is:
//!
//! 1. [`header`] turns the period header row into [`header::PeriodDescriptor`]s
//!    and the value-type row into a [`header::ValueTypeMap`].
//! 2. [`period`] picks the month and cumulative descriptors for the target period.
//! 3. [`column`] intersects them with the value-type map, falling back to a
//!    forward scan when the cumulative header is missing.
//! 4. [`extract`] reads the declared rows through the resulting mapping.
//!
//! [`batch`] runs that pipeline across every configured unit of a workbook
//! and [`coverage`] decides whether enough units made it into the batch.
pub mod batch;
pub mod column;
pub mod coverage;
pub mod extract;
pub mod header;
pub mod period;
pub mod quality;

use crate::engine::period::Period;
use crate::spreadsheet::SpreadsheetError;
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

/// Per-worksheet failures. Each one is fatal for its worksheet only.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Worksheet or cell range is not available in the grid
    #[error("{0}")]
    GridAccessError(#[from] SpreadsheetError),

    /// Header row carries no recognizable period or value-type labels
    #[error("Parse header of sheet '{sheet}' at row {row} failed: {message}")]
    HeaderParseError { sheet: String, row: usize, message: String },

    /// Requested period has no month header on the worksheet
    #[error(
        "Period {requested} not found in sheet '{sheet}', available: {}",
        join(.available)
    )]
    PeriodNotFoundError {
        sheet: String,
        requested: Period,
        available: Vec<Period>,
    },

    /// Required logical columns remain unresolved
    #[error("Detect columns of sheet '{sheet}' failed, missing: {}", join(.missing))]
    ColumnMappingError {
        sheet: String,
        missing: Vec<LogicalColumn>,
    },
}

impl EngineError {
    /// Category of the failure, for reporting without the error value.
    pub fn kind(&self) -> FailureKind {
        match self {
            EngineError::GridAccessError(_) => FailureKind::GridAccess,
            EngineError::HeaderParseError { .. } => FailureKind::HeaderParse,
            EngineError::PeriodNotFoundError { .. } => FailureKind::PeriodNotFound,
            EngineError::ColumnMappingError { .. } => FailureKind::ColumnMapping,
        }
    }
}

/// Serializable category of an [`EngineError`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    GridAccess,
    HeaderParse,
    PeriodNotFound,
    ColumnMapping,
}

/// The four data columns every worksheet must resolve.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalColumn {
    ActualMonth,
    BudgetMonth,
    ActualCumulative,
    BudgetCumulative,
}

impl LogicalColumn {
    /// All logical columns in reporting order.
    pub const ALL: [LogicalColumn; 4] = [
        LogicalColumn::ActualMonth,
        LogicalColumn::BudgetMonth,
        LogicalColumn::ActualCumulative,
        LogicalColumn::BudgetCumulative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalColumn::ActualMonth => "actual_month",
            LogicalColumn::BudgetMonth => "budget_month",
            LogicalColumn::ActualCumulative => "actual_cumulative",
            LogicalColumn::BudgetCumulative => "budget_cumulative",
        }
    }
}

impl Display for LogicalColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn join<T: Display>(items: &[T]) -> String {
    if items.is_empty() {
        return "none".to_owned();
    }
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_not_found_lists_available_periods() {
        let error = EngineError::PeriodNotFoundError {
            sheet: "PT ABC".to_owned(),
            requested: Period::new(2024, 11).unwrap(),
            available: vec![Period::new(2024, 12).unwrap(), Period::new(2025, 1).unwrap()],
        };
        assert_eq!(
            error.to_string(),
            "Period 2024-11 not found in sheet 'PT ABC', available: 2024-12, 2025-01"
        );
        assert_eq!(error.kind(), FailureKind::PeriodNotFound);
    }

    #[test]
    fn column_mapping_names_missing_columns() {
        let error = EngineError::ColumnMappingError {
            sheet: "PT ABC".to_owned(),
            missing: vec![LogicalColumn::ActualCumulative, LogicalColumn::BudgetCumulative],
        };
        assert_eq!(
            error.to_string(),
            "Detect columns of sheet 'PT ABC' failed, missing: actual_cumulative, budget_cumulative"
        );
        assert_eq!(error.kind(), FailureKind::ColumnMapping);
    }

    #[test]
    fn grid_access_wraps_missing_sheet() {
        let error: EngineError = SpreadsheetError::SheetNotFoundError("PT QRS".to_owned()).into();
        assert_eq!(error.to_string(), "Sheet 'PT QRS' not found");
        assert_eq!(error.kind(), FailureKind::GridAccess);
    }
}
