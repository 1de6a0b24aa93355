use crate::config::Unit;
use crate::engine::column::ColumnMapping;
use crate::engine::period::TargetPeriod;
use crate::engine::EngineError;
use crate::engine::LogicalColumn;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::Grid;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

/// A declared row to read: its 1-based row number and the metadata attached
/// to every value extracted from it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RowEntry {
    pub row: usize,
    pub category: String,
    #[serde(default)]
    pub tag: String,
}

/// One normalized fact row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExtractedRow {
    pub unit_code: String,
    pub holding: String,
    pub period: NaiveDate,
    pub period_label: String,
    pub row: usize,
    pub category: String,
    pub tag: String,
    pub actual_month: Decimal,
    pub budget_month: Decimal,
    pub actual_cumulative: Decimal,
    pub budget_cumulative: Decimal,
}

impl ExtractedRow {
    pub fn amounts(&self) -> [Decimal; 4] {
        [
            self.actual_month,
            self.budget_month,
            self.actual_cumulative,
            self.budget_cumulative,
        ]
    }
}

/// A cell that could not be read as an amount and was taken as zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CellWarning {
    pub sheet: String,
    pub reference: String,
    pub column: LogicalColumn,
    pub value: String,
    pub message: String,
}

/// Rows and cell warnings extracted from one worksheet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetExtraction {
    pub sheet: String,
    pub unit_code: String,
    pub mapping: ColumnMapping,
    pub rows: Vec<ExtractedRow>,
    pub warnings: Vec<CellWarning>,
}

/// Reads every declared row through the resolved column mapping.
///
/// Unreadable cells never fail the worksheet: they become zero and are
/// reported as [`CellWarning`]s.
///
/// # Arguments
///
/// * `grid` - Worksheet to read
/// * `mapping` - Resolved data columns of the target period
/// * `entries` - Declared rows in output order
/// * `unit` - Organizational unit reported by the worksheet
/// * `target` - Requested period, stamped onto every row
///
/// # Errors
///
/// Returns [`EngineError::ColumnMappingError`] if `mapping` is incomplete.
pub fn extract_rows<G: Grid + ?Sized>(
    grid: &G,
    mapping: &ColumnMapping,
    entries: &[RowEntry],
    unit: &Unit,
    target: &TargetPeriod,
) -> Result<SheetExtraction, EngineError> {
    let columns = mapping.require(grid.name())?;
    let mut rows = Vec::with_capacity(entries.len());
    let mut warnings = Vec::new();

    for entry in entries {
        let mut amounts = [Decimal::ZERO; 4];
        for ((amount, column), logical) in amounts.iter_mut().zip(columns).zip(LogicalColumn::ALL) {
            let cell = grid.cell_value(entry.row, column);
            *amount = match cell.to_amount() {
                Ok(value) => value,
                Err(message) => {
                    let reference = index_to_reference(entry.row, column);
                    warn!("Sheet '{}' cell {}: {}, using 0", grid.name(), reference, message);
                    warnings.push(CellWarning {
                        sheet: grid.name().to_owned(),
                        reference,
                        column: logical,
                        value: cell.to_string(),
                        message,
                    });
                    Decimal::ZERO
                }
            };
        }
        let [actual_month, budget_month, actual_cumulative, budget_cumulative] = amounts;
        debug!(
            "Sheet '{}' row {} '{}': actual={} budget={}",
            grid.name(),
            entry.row,
            entry.category,
            actual_month,
            budget_month
        );
        rows.push(ExtractedRow {
            unit_code: unit.code.to_owned(),
            holding: unit.holding.to_owned(),
            period: target.date,
            period_label: target.label.to_owned(),
            row: entry.row,
            category: entry.category.to_owned(),
            tag: entry.tag.to_owned(),
            actual_month,
            budget_month,
            actual_cumulative,
            budget_cumulative,
        });
    }

    Ok(SheetExtraction {
        sheet: grid.name().to_owned(),
        unit_code: unit.code.to_owned(),
        mapping: *mapping,
        rows,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::period::Period;
    use crate::spreadsheet::Sheet;
    use rust_decimal_macros::dec;

    fn unit() -> Unit {
        Unit {
            key: "abc".to_owned(),
            code: "ABC".to_owned(),
            name: "PT ABC".to_owned(),
            sheet_name: "PT ABC".to_owned(),
            holding: "Holding A".to_owned(),
        }
    }

    fn entry(row: usize, category: &str) -> RowEntry {
        RowEntry {
            row,
            category: category.to_owned(),
            tag: "CASH".to_owned(),
        }
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping {
            actual_month: Some(5),
            budget_month: Some(6),
            actual_cumulative: Some(9),
            budget_cumulative: Some(10),
        }
    }

    #[test]
    fn extract_coerces_cells() {
        let mut sheet = Sheet::new("PT ABC");
        sheet
            .set(12, 5, dec!(1500))
            .set(12, 6, "1,234.50")
            .set(12, 9, " - ")
            .set(12, 10, "")
            .set(13, 5, "abc")
            .set(13, 6, dec!(-20.5))
            .set(13, 9, " 3 000 ");
        let target = TargetPeriod::new(Period::new(2024, 12).unwrap());

        let extraction = extract_rows(&sheet, &mapping(), &[entry(12, "Gaji"), entry(13, "Tunjangan")], &unit(), &target).unwrap();

        assert_eq!(extraction.sheet, "PT ABC");
        assert_eq!(extraction.rows.len(), 2);
        let first = &extraction.rows[0];
        assert_eq!(first.unit_code, "ABC");
        assert_eq!(first.holding, "Holding A");
        assert_eq!(first.period, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(first.period_label, "Dec-24");
        assert_eq!(first.category, "Gaji");
        assert_eq!(first.tag, "CASH");
        assert_eq!(first.amounts(), [dec!(1500), dec!(1234.50), dec!(0), dec!(0)]);

        let second = &extraction.rows[1];
        assert_eq!(second.amounts(), [dec!(0), dec!(-20.5), dec!(3000), dec!(0)]);

        assert_eq!(
            extraction.warnings,
            vec![CellWarning {
                sheet: "PT ABC".to_owned(),
                reference: "E13".to_owned(),
                column: LogicalColumn::ActualMonth,
                value: "abc".to_owned(),
                message: "parse 'abc' to amount failed".to_owned(),
            }]
        );
    }

    #[test]
    fn extract_rows_beyond_data_are_zero() {
        let sheet = Sheet::new("PT ABC");
        let target = TargetPeriod::new(Period::new(2024, 12).unwrap());

        let extraction = extract_rows(&sheet, &mapping(), &[entry(500, "Lain-lain")], &unit(), &target).unwrap();
        assert_eq!(extraction.rows[0].amounts(), [Decimal::ZERO; 4]);
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn extract_requires_complete_mapping() {
        let sheet = Sheet::new("PT ABC");
        let target = TargetPeriod::new(Period::new(2024, 12).unwrap());
        let incomplete = ColumnMapping {
            budget_cumulative: None,
            ..mapping()
        };

        let result = extract_rows(&sheet, &incomplete, &[entry(12, "Gaji")], &unit(), &target);
        assert!(matches!(result, Err(EngineError::ColumnMappingError { .. })));
    }
}
