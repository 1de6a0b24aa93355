use crate::config::ConfigError;
use crate::config::ReportConfig;
use crate::config::Unit;
use crate::engine::column::map_columns;
use crate::engine::column::ColumnInfo;
use crate::engine::coverage::validate_coverage;
use crate::engine::coverage::CoverageResult;
use crate::engine::extract::extract_rows;
use crate::engine::extract::CellWarning;
use crate::engine::extract::ExtractedRow;
use crate::engine::extract::SheetExtraction;
use crate::engine::header::HeaderParser;
use crate::engine::period::resolve_period;
use crate::engine::period::TargetPeriod;
use crate::engine::quality::inspect_rows;
use crate::engine::quality::QualityReport;
use crate::engine::EngineError;
use crate::engine::FailureKind;
use crate::error::ReportError;
use crate::spreadsheet::Grid;
use crate::spreadsheet::Workbook;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;
use tracing::info;
use tracing::warn;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    /// Process worksheets on the rayon thread pool
    pub parallel: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The workbook has no sheet for the unit
    MissingSheet,
    /// The sheet exists but could not be processed
    Failed(FailureKind),
}

/// A unit whose worksheet contributed no rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedSheet {
    pub unit_key: String,
    pub unit_code: String,
    pub sheet: String,
    pub reason: SkipReason,
    pub message: String,
}

/// Columns used for one processed worksheet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SheetReport {
    pub sheet: String,
    pub unit_code: String,
    pub rows: usize,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub processed: usize,
    pub missing: usize,
    pub failed: usize,
    pub rows_by_holding: BTreeMap<String, usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchResult {
    pub target: TargetPeriod,
    pub rows: Vec<ExtractedRow>,
    pub sheets: Vec<SheetReport>,
    pub warnings: Vec<CellWarning>,
    pub skipped: Vec<SkippedSheet>,
    pub stats: BatchStats,
    pub coverage: CoverageResult,
    pub quality: QualityReport,
}

enum UnitOutcome {
    Extracted(SheetExtraction, Vec<ColumnInfo>),
    Missing,
    Failed(EngineError),
}

/// Runs the extraction pipeline for the units of a configuration.
pub struct BatchProcessor<'a> {
    config: &'a ReportConfig,
    parser: HeaderParser,
    options: BatchOptions,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(config: &'a ReportConfig, options: BatchOptions) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            parser: config.header_parser()?,
            options,
        })
    }

    /// Header parsing, period resolution, column mapping and row extraction
    /// for a single worksheet.
    pub fn process_sheet<G: Grid + ?Sized>(
        &self,
        grid: &G,
        unit: &Unit,
        target: &TargetPeriod,
    ) -> Result<SheetExtraction, EngineError> {
        let header = self.config.header;
        let descriptors = self.parser.parse_period_header(grid, header.period_row)?;
        let value_types = self.parser.parse_value_type_header(grid, header.value_type_row)?;
        let matched = resolve_period(grid.name(), &descriptors, target.period)?;
        let mapping = map_columns(grid.name(), &matched, &value_types)?;
        extract_rows(grid, &mapping, &self.config.rows, unit, target)
    }

    /// Extracts the rows of one configured unit on demand.
    ///
    /// # Errors
    ///
    /// Fails if the unit is not configured, its sheet is missing, or the
    /// sheet cannot be processed.
    pub fn extract_unit(
        &self,
        workbook: &Workbook,
        unit_key: &str,
        target: &TargetPeriod,
    ) -> Result<SheetExtraction, ReportError> {
        let unit = self.config.unit(unit_key)?;
        let sheet = workbook.sheet(&unit.sheet_name).map_err(EngineError::from)?;
        Ok(self.process_sheet(sheet, unit, target)?)
    }

    fn process_unit(&self, workbook: &Workbook, unit: &Unit, target: &TargetPeriod) -> UnitOutcome {
        let Ok(sheet) = workbook.sheet(&unit.sheet_name) else {
            return UnitOutcome::Missing;
        };
        match self.process_sheet(sheet, unit, target) {
            Ok(extraction) => {
                let columns = extraction
                    .mapping
                    .describe(sheet, self.config.header.value_type_row);
                UnitOutcome::Extracted(extraction, columns)
            }
            Err(error) => UnitOutcome::Failed(error),
        }
    }

    /// Processes every configured unit and validates coverage of the result.
    ///
    /// Worksheet failures are recorded as skipped sheets and never abort the
    /// batch. Rows keep the configured unit order whether or not the sheets
    /// were processed in parallel.
    pub fn process_workbook(&self, workbook: &Workbook, target: &TargetPeriod) -> BatchResult {
        let units = &self.config.units;
        info!(
            "Processing {} units of '{}' for period {}",
            units.len(),
            workbook.name(),
            target.period
        );
        let outcomes: Vec<UnitOutcome> = if self.options.parallel {
            units
                .par_iter()
                .map(|unit| self.process_unit(workbook, unit, target))
                .collect()
        } else {
            units
                .iter()
                .map(|unit| self.process_unit(workbook, unit, target))
                .collect()
        };

        let mut rows = Vec::new();
        let mut sheets = Vec::new();
        let mut warnings = Vec::new();
        let mut skipped = Vec::new();
        let mut stats = BatchStats::default();
        for (unit, outcome) in units.iter().zip(outcomes) {
            match outcome {
                UnitOutcome::Extracted(extraction, columns) => {
                    info!("Sheet '{}': extracted {} rows", unit.sheet_name, extraction.rows.len());
                    stats.processed += 1;
                    sheets.push(SheetReport {
                        sheet: extraction.sheet,
                        unit_code: extraction.unit_code,
                        rows: extraction.rows.len(),
                        columns,
                    });
                    rows.extend(extraction.rows);
                    warnings.extend(extraction.warnings);
                }
                UnitOutcome::Missing => {
                    warn!("Sheet '{}' not found, skipping unit '{}'", unit.sheet_name, unit.key);
                    stats.missing += 1;
                    skipped.push(SkippedSheet {
                        unit_key: unit.key.to_owned(),
                        unit_code: unit.code.to_owned(),
                        sheet: unit.sheet_name.to_owned(),
                        reason: SkipReason::MissingSheet,
                        message: format!("Sheet '{}' not found", unit.sheet_name),
                    });
                }
                UnitOutcome::Failed(failure) => {
                    error!("Process sheet '{}' failed: {}", unit.sheet_name, failure);
                    stats.failed += 1;
                    skipped.push(SkippedSheet {
                        unit_key: unit.key.to_owned(),
                        unit_code: unit.code.to_owned(),
                        sheet: unit.sheet_name.to_owned(),
                        reason: SkipReason::Failed(failure.kind()),
                        message: failure.to_string(),
                    });
                }
            }
        }
        for row in &rows {
            *stats.rows_by_holding.entry(row.holding.to_owned()).or_insert(0) += 1;
        }

        let coverage = validate_coverage(&rows, &self.config.expected_codes());
        let quality = inspect_rows(&rows);
        info!(
            "Processed {} sheets, {} missing, {} failed, {} rows",
            stats.processed,
            stats.missing,
            stats.failed,
            rows.len()
        );

        BatchResult {
            target: target.clone(),
            rows,
            sheets,
            warnings,
            skipped,
            stats,
            coverage,
            quality,
        }
    }
}

/// Validates `config` and processes every configured unit of `workbook`.
pub fn process_workbook(
    workbook: &Workbook,
    config: &ReportConfig,
    target: &TargetPeriod,
    options: BatchOptions,
) -> Result<BatchResult, ReportError> {
    let processor = BatchProcessor::new(config, options)?;
    Ok(processor.process_workbook(workbook, target))
}
