use crate::engine::header::PeriodDescriptor;
use crate::engine::header::PeriodKind;
use crate::engine::EngineError;
use chrono::Datelike;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde::Serializer;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

static PERIOD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{4})-(\d{1,2})\s*$").expect("valid period pattern"));

#[derive(Error, Debug, PartialEq)]
pub enum PeriodError {
    #[error("Invalid period format '{0}', expected 'YYYY-MM' (e.g. '2024-12')")]
    InvalidFormatError(String),

    #[error("Month {1} of period {0} is out of range 1..=12")]
    MonthOutOfRangeError(i32, u32),

    #[error("Date {0} is outside period {1}")]
    DateOutsidePeriodError(NaiveDate, Period),
}

/// A calendar (year, month) pair, the normalized form of a reporting period.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if (1..=12).contains(&month) {
            Ok(Self { year, month })
        } else {
            Err(PeriodError::MonthOutOfRangeError(year, month))
        }
    }

    /// Parses the `YYYY-MM` form; single digit months are accepted.
    pub fn parse(text: &str) -> Result<Self, PeriodError> {
        let invalid = || PeriodError::InvalidFormatError(text.to_owned());
        let captures = PERIOD_PATTERN.captures(text).ok_or_else(invalid)?;
        let year = captures[1].parse::<i32>().map_err(|_| invalid())?;
        let month = captures[2].parse::<u32>().map_err(|_| invalid())?;
        Period::new(year, month)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn last_day(&self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|date| date.pred_opt())
            .unwrap_or_default()
    }

    /// Short display form such as `Dec-24`.
    pub fn label(&self) -> String {
        self.first_day().format("%b-%y").to_string()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Period::parse(text)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The period requested by a caller, in machine and display form, plus the
/// date stamped onto every extracted row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TargetPeriod {
    pub period: Period,
    pub date: NaiveDate,
    pub label: String,
}

impl TargetPeriod {
    /// Target period dated on the last day of the month.
    pub fn new(period: Period) -> Self {
        Self {
            period,
            date: period.last_day(),
            label: period.label(),
        }
    }

    /// Target period with an explicit row date, which must fall inside the period.
    pub fn with_date(period: Period, date: NaiveDate) -> Result<Self, PeriodError> {
        if !period.contains(date) {
            return Err(PeriodError::DateOutsidePeriodError(date, period));
        }
        Ok(Self {
            period,
            date,
            label: period.label(),
        })
    }
}

/// Header descriptors selected for a target period.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodMatch<'a> {
    pub month: &'a PeriodDescriptor,
    pub cumulative: Option<&'a PeriodDescriptor>,
}

/// Selects the first month and first cumulative descriptor matching `target`.
///
/// # Arguments
///
/// * `sheet` - Worksheet name, used in diagnostics
/// * `descriptors` - Every period descriptor parsed from the worksheet
/// * `target` - Requested period
///
/// # Returns
///
/// The matched descriptors, or [`EngineError::PeriodNotFoundError`] listing
/// the month periods the worksheet does carry. Near matches are never used.
pub fn resolve_period<'a>(
    sheet: &str,
    descriptors: &'a [PeriodDescriptor],
    target: Period,
) -> Result<PeriodMatch<'a>, EngineError> {
    let find = |kind: PeriodKind| {
        descriptors
            .iter()
            .find(|descriptor| descriptor.kind == kind && descriptor.period == target)
    };

    let Some(month) = find(PeriodKind::Month) else {
        let mut available: Vec<Period> = Vec::new();
        for descriptor in descriptors.iter().filter(|it| it.kind == PeriodKind::Month) {
            if !available.contains(&descriptor.period) {
                available.push(descriptor.period);
            }
        }
        return Err(EngineError::PeriodNotFoundError {
            sheet: sheet.to_owned(),
            requested: target,
            available,
        });
    };
    let cumulative = find(PeriodKind::Cumulative);

    debug!(
        "Sheet '{}': period {} month header '{}' at columns {}-{}, cumulative header {}",
        sheet,
        target,
        month.raw_label,
        month.start_column,
        month.end_column,
        cumulative
            .map(|it| format!("'{}' at columns {}-{}", it.raw_label, it.start_column, it.end_column))
            .unwrap_or_else(|| "absent".to_owned())
    );
    Ok(PeriodMatch { month, cumulative })
}
