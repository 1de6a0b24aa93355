//! # Rusty Report
//!
//! Extracts normalized figures for one reporting period from loosely-structured
//! spreadsheet reports, one worksheet per organizational unit, and decides
//! whether enough units were covered for the batch to be trusted.
//!
//! ## Features
//!
//! - **No fixed column positions**: period headers are found on merged ranges
//!   of a header row and value-type labels on the row below, so sheets may
//!   add or move unrelated columns freely
//! - **Flexible labels**: Indonesian and English month names, "s.d." / "up to"
//!   cumulative phrasings and REAL/RKAP or ACTUAL/BUDGET value types out of
//!   the box, overridable from configuration
//! - **Fallback column detection**: when the cumulative header is missing, the
//!   next actual and budget columns after the month range are used
//! - **Forgiving cell coercion**: thousands separators, blanks and dashes are
//!   handled; unreadable cells become zero and are reported as warnings
//! - **Coverage gate**: accepted, degraded or rejected depending on the share of
//!   expected units present in the batch
//! - **Parallel processing**: worksheets are processed on the rayon thread pool
//!   with results assembled in configuration order
//! - **XLSX loading**: workbooks are read with `zip` and `quick-xml`, using the
//!   cached values of formula cells
//!
//! ## Example
//!
//! ```no_run
//! use rusty_report::config::ReportConfig;
//! use rusty_report::engine::batch::{process_workbook, BatchOptions};
//! use rusty_report::engine::period::{Period, TargetPeriod};
//! use rusty_report::spreadsheet::Workbook;
//!
//! # fn main() -> Result<(), rusty_report::error::ReportError> {
//! let config = ReportConfig::load("config/cost.json")?;
//! let workbook = Workbook::open("data/cost_2024_12.xlsx")?;
//! let target = TargetPeriod::new(Period::parse("2024-12")?);
//! let result = process_workbook(&workbook, &config, &target, BatchOptions::default())?;
//! println!("{:?}: {} rows", result.coverage.status, result.rows.len());
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod engine;
pub mod error;
mod helpers;
pub mod spreadsheet;
