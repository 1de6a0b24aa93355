use crate::engine::extract::ExtractedRow;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;
use tracing::warn;

/// Coverage below this percentage rejects the batch.
const REJECT_BELOW: Decimal = Decimal::from_parts(90, 0, 0, false, 0);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    /// Every expected unit is present
    Accepted,
    /// At least 90% but not all expected units are present
    Degraded,
    /// Fewer than 90% of the expected units are present
    Rejected,
}

impl CoverageStatus {
    pub fn from_percent(percent: Decimal) -> Self {
        if percent < REJECT_BELOW {
            CoverageStatus::Rejected
        } else if percent < Decimal::ONE_HUNDRED {
            CoverageStatus::Degraded
        } else {
            CoverageStatus::Accepted
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CoverageResult {
    pub expected_count: usize,
    pub matched_count: usize,
    /// Expected codes absent from the batch, sorted
    pub missing_unit_codes: Vec<String>,
    /// Codes present in the batch but not expected, sorted
    pub unknown_unit_codes: Vec<String>,
    /// Matched share of the expected units, rounded to two decimals
    pub coverage_percent: Decimal,
    pub status: CoverageStatus,
}

/// Compares the unit codes present in `rows` with the expected codes.
///
/// The status is derived from the unrounded percentage. An empty expected
/// set yields 0% and therefore [`CoverageStatus::Rejected`].
pub fn validate_coverage(rows: &[ExtractedRow], expected: &BTreeSet<String>) -> CoverageResult {
    let present: BTreeSet<&str> = rows.iter().map(|row| row.unit_code.as_str()).collect();

    let matched_count = expected.iter().filter(|code| present.contains(code.as_str())).count();
    let missing_unit_codes: Vec<String> = expected
        .iter()
        .filter(|code| !present.contains(code.as_str()))
        .cloned()
        .collect();
    let unknown_unit_codes: Vec<String> = present
        .iter()
        .filter(|code| !expected.contains(**code))
        .map(|code| code.to_string())
        .collect();

    let percent = if expected.is_empty() {
        Decimal::ZERO
    } else {
        Decimal::from(matched_count) * Decimal::ONE_HUNDRED / Decimal::from(expected.len())
    };
    let status = CoverageStatus::from_percent(percent);

    for code in &unknown_unit_codes {
        warn!("Unknown unit code '{}' in batch", code);
    }
    if !missing_unit_codes.is_empty() {
        warn!("Missing {} units: {}", missing_unit_codes.len(), missing_unit_codes.join(", "));
    }
    info!(
        "Coverage {}% ({}/{} units), status {:?}",
        percent.round_dp(1),
        matched_count,
        expected.len(),
        status
    );

    CoverageResult {
        expected_count: expected.len(),
        matched_count,
        missing_unit_codes,
        unknown_unit_codes,
        coverage_percent: percent.round_dp(2),
        status,
    }
}
