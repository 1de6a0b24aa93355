use crate::engine::extract::ExtractedRow;
use rust_decimal::Decimal;
use serde::Serialize;

/// Data-quality counters of an extracted batch. Informational only; the
/// coverage verdict is the sole acceptance gate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub total_rows: usize,
    /// Rows lacking unit code, holding, category or tag
    pub missing_values: usize,
    /// Rows with at least one negative amount
    pub negative_values: usize,
    /// Rows whose four amounts are all zero
    pub zero_rows: usize,
    pub is_valid: bool,
}

pub fn inspect_rows(rows: &[ExtractedRow]) -> QualityReport {
    let mut report = QualityReport {
        total_rows: rows.len(),
        ..Default::default()
    };
    for row in rows {
        let metadata = [&row.unit_code, &row.holding, &row.category, &row.tag];
        if metadata.iter().any(|value| value.trim().is_empty()) {
            report.missing_values += 1;
        }
        let amounts = row.amounts();
        if amounts.iter().any(|amount| *amount < Decimal::ZERO) {
            report.negative_values += 1;
        }
        if amounts.iter().all(|amount| amount.is_zero()) {
            report.zero_rows += 1;
        }
    }
    report.is_valid = report.missing_values == 0 && report.negative_values == 0;
    report
}
