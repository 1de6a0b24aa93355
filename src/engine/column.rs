use crate::engine::header::PeriodDescriptor;
use crate::engine::header::ValueType;
use crate::engine::header::ValueTypeMap;
use crate::engine::period::PeriodMatch;
use crate::engine::EngineError;
use crate::engine::LogicalColumn;
use crate::spreadsheet::reference::index_to_letter;
use crate::spreadsheet::Grid;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

/// Data columns of the target period. Every column is 1-based.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub actual_month: Option<usize>,
    pub budget_month: Option<usize>,
    pub actual_cumulative: Option<usize>,
    pub budget_cumulative: Option<usize>,
}

/// Location and header text of one mapped column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub column: LogicalColumn,
    pub index: usize,
    pub letter: String,
    pub header: String,
}

impl ColumnMapping {
    pub fn get(&self, column: LogicalColumn) -> Option<usize> {
        match column {
            LogicalColumn::ActualMonth => self.actual_month,
            LogicalColumn::BudgetMonth => self.budget_month,
            LogicalColumn::ActualCumulative => self.actual_cumulative,
            LogicalColumn::BudgetCumulative => self.budget_cumulative,
        }
    }

    /// Logical columns still unresolved, in reporting order.
    pub fn missing(&self) -> Vec<LogicalColumn> {
        LogicalColumn::ALL
            .into_iter()
            .filter(|column| self.get(*column).is_none())
            .collect()
    }

    /// All four columns, or [`EngineError::ColumnMappingError`] naming the unresolved ones.
    pub fn require(&self, sheet: &str) -> Result<[usize; 4], EngineError> {
        match (self.actual_month, self.budget_month, self.actual_cumulative, self.budget_cumulative) {
            (Some(actual_month), Some(budget_month), Some(actual_cumulative), Some(budget_cumulative)) => {
                Ok([actual_month, budget_month, actual_cumulative, budget_cumulative])
            }
            _ => Err(EngineError::ColumnMappingError {
                sheet: sheet.to_owned(),
                missing: self.missing(),
            }),
        }
    }

    /// Index, letter and value-type header text of every resolved column.
    pub fn describe<G: Grid + ?Sized>(&self, grid: &G, value_type_row: usize) -> Vec<ColumnInfo> {
        LogicalColumn::ALL
            .into_iter()
            .filter_map(|column| {
                self.get(column).map(|index| ColumnInfo {
                    column,
                    index,
                    letter: index_to_letter(index),
                    header: grid.cell_value(value_type_row, index).text(),
                })
            })
            .collect()
    }
}

/// Actual and budget column inside the descriptor's range. A later column of
/// the same type replaces an earlier one, so "REAL 2023 | REAL 2024 | RKAP 2024"
/// maps the 2024 actual.
fn columns_in_range(descriptor: &PeriodDescriptor, value_types: &ValueTypeMap) -> (Option<usize>, Option<usize>) {
    if descriptor.end_column < descriptor.start_column {
        return (None, None);
    }
    let mut actual = None;
    let mut budget = None;
    for (col, value_type) in value_types.range(descriptor.start_column..=descriptor.end_column) {
        match value_type {
            ValueType::Actual => actual = Some(*col),
            ValueType::Budget => budget = Some(*col),
        }
    }
    (actual, budget)
}

fn first_of_each<'a, I>(columns: I) -> (Option<usize>, Option<usize>)
where
    I: Iterator<Item = (&'a usize, &'a ValueType)>,
{
    let mut actual = None;
    let mut budget = None;
    for (col, value_type) in columns {
        match value_type {
            ValueType::Actual if actual.is_none() => actual = Some(*col),
            ValueType::Budget if budget.is_none() => budget = Some(*col),
            _ => (),
        }
        if actual.is_some() && budget.is_some() {
            break;
        }
    }
    (actual, budget)
}

/// Resolves the four data columns of a matched period.
///
/// Month columns come from the month descriptor's range, cumulative columns
/// from the cumulative descriptor's range. Without a cumulative descriptor the
/// first actual and first budget columns after the month range are used.
///
/// # Errors
///
/// Returns [`EngineError::ColumnMappingError`] naming every logical column
/// that neither the primary nor the fallback strategy resolved.
pub fn map_columns(
    sheet: &str,
    matched: &PeriodMatch,
    value_types: &ValueTypeMap,
) -> Result<ColumnMapping, EngineError> {
    let (actual_month, budget_month) = columns_in_range(matched.month, value_types);
    debug!(
        "Sheet '{}': month columns actual={:?} budget={:?}",
        sheet, actual_month, budget_month
    );

    let (actual_cumulative, budget_cumulative) = match matched.cumulative {
        Some(cumulative) => columns_in_range(cumulative, value_types),
        None => {
            let fallback = first_of_each(value_types.range(matched.month.end_column + 1..));
            warn!(
                "Sheet '{}': no cumulative header for {}, using next columns after {}: actual={:?} budget={:?}",
                sheet,
                matched.month.period,
                index_to_letter(matched.month.end_column),
                fallback.0.map(index_to_letter),
                fallback.1.map(index_to_letter)
            );
            fallback
        }
    };

    let mapping = ColumnMapping {
        actual_month,
        budget_month,
        actual_cumulative,
        budget_cumulative,
    };
    mapping.require(sheet)?;
    Ok(mapping)
}
