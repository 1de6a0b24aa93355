use crate::engine::period::Period;
use crate::engine::EngineError;
use crate::spreadsheet::reference::index_to_letter;
use crate::spreadsheet::Grid;
use aho_corasick::AhoCorasick;
use aho_corasick::BuildError;
use aho_corasick::MatchKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;
use tracing::info;

static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"20\d{2}").expect("valid year pattern"));

static DEFAULT_PARSER: Lazy<HeaderParser> =
    Lazy::new(|| HeaderParser::new(&HeaderVocabulary::default()).expect("valid default vocabulary"));

/// Month tokens of the default vocabulary, Indonesian and English.
const MONTH_TOKENS: &[(&str, u32)] = &[
    ("jan", 1), ("januari", 1), ("january", 1),
    ("feb", 2), ("februari", 2), ("february", 2), ("pebruari", 2),
    ("mar", 3), ("maret", 3), ("march", 3),
    ("apr", 4), ("april", 4),
    ("mei", 5), ("may", 5),
    ("jun", 6), ("juni", 6), ("june", 6),
    ("jul", 7), ("juli", 7), ("july", 7),
    ("agt", 8), ("agst", 8), ("agus", 8), ("agustus", 8), ("aug", 8), ("august", 8),
    ("sep", 9), ("sept", 9), ("september", 9),
    ("okt", 10), ("oktober", 10), ("oct", 10), ("october", 10),
    ("nov", 11), ("nopember", 11), ("november", 11),
    ("des", 12), ("desember", 12), ("dec", 12), ("december", 12),
];

/// Phrasings that mark a period header as cumulative ("up to date").
const CUMULATIVE_TOKENS: &[&str] = &[
    "s.d.", "s.d ", "s/d", "sd.", "sampai dengan", "sampai",
    "up to", "ytd", "year to date", "to date", "cumulative",
];

const ACTUAL_TOKENS: &[&str] = &["REAL", "ACTUAL"];
const BUDGET_TOKENS: &[&str] = &["RKAP", "BUDGET"];

/// Rows holding the two header lines.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderRows {
    /// Row with the merged period labels, e.g. `Desember 2024 | s.d. Desember 2024`
    pub period_row: usize,
    /// Row with the value-type labels, e.g. `REAL 2024 | RKAP 2024`
    pub value_type_row: usize,
}

impl Default for HeaderRows {
    fn default() -> Self {
        Self {
            period_row: 7,
            value_type_row: 8,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Month,
    Cumulative,
}

/// A period label found on the period header row and the columns it spans.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PeriodDescriptor {
    pub kind: PeriodKind,
    pub period: Period,
    pub start_column: usize,
    pub end_column: usize,
    pub raw_label: String,
}

impl PeriodDescriptor {
    pub fn year(&self) -> i32 {
        self.period.year()
    }

    pub fn month(&self) -> u32 {
        self.period.month()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Actual,
    Budget,
}

/// Column index to value type. Columns without a recognized label are absent.
pub type ValueTypeMap = BTreeMap<usize, ValueType>;

/// Words used to recognize header labels.
///
/// Month and cumulative tokens match case-insensitively anywhere in the label;
/// actual and budget tokens match against the upper-cased label.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderVocabulary {
    pub months: BTreeMap<String, u32>,
    pub cumulative: Vec<String>,
    pub actual: Vec<String>,
    pub budget: Vec<String>,
}

impl Default for HeaderVocabulary {
    fn default() -> Self {
        Self {
            months: MONTH_TOKENS
                .iter()
                .map(|(token, month)| (token.to_string(), *month))
                .collect(),
            cumulative: CUMULATIVE_TOKENS.iter().map(|token| token.to_string()).collect(),
            actual: ACTUAL_TOKENS.iter().map(|token| token.to_string()).collect(),
            budget: BUDGET_TOKENS.iter().map(|token| token.to_string()).collect(),
        }
    }
}

/// Compiled header vocabulary.
#[derive(Clone, Debug)]
pub struct HeaderParser {
    months: AhoCorasick,
    month_numbers: Vec<u32>,
    cumulative: AhoCorasick,
    actual: Vec<String>,
    budget: Vec<String>,
}

impl HeaderParser {
    pub fn new(vocabulary: &HeaderVocabulary) -> Result<Self, BuildError> {
        let months = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(vocabulary.months.keys())?;
        let cumulative = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&vocabulary.cumulative)?;
        Ok(Self {
            months,
            month_numbers: vocabulary.months.values().copied().collect(),
            cumulative,
            actual: vocabulary.actual.iter().map(|token| token.to_uppercase()).collect(),
            budget: vocabulary.budget.iter().map(|token| token.to_uppercase()).collect(),
        })
    }

    /// Parser for the built-in vocabulary.
    pub fn standard() -> &'static HeaderParser {
        &DEFAULT_PARSER
    }

    /// Month of the earliest month token in `text`; the longest token wins
    /// among those starting at the same position.
    ///
    /// A token only counts as a whole word: it must not be preceded or
    /// followed by an ASCII letter, so "Summary" or "Decrease" carry no month.
    pub fn extract_month(&self, text: &str) -> Option<u32> {
        let bytes = text.as_bytes();
        let is_letter = |index: Option<usize>| {
            index
                .and_then(|index| bytes.get(index))
                .is_some_and(u8::is_ascii_alphabetic)
        };
        self.months
            .find_iter(text)
            .find(|found| !is_letter(found.start().checked_sub(1)) && !is_letter(Some(found.end())))
            .and_then(|found| self.month_numbers.get(found.pattern().as_usize()).copied())
    }

    /// First `20xx` year in `text`.
    pub fn extract_year(&self, text: &str) -> Option<i32> {
        YEAR_PATTERN
            .find(text)
            .and_then(|found| found.as_str().parse::<i32>().ok())
    }

    pub fn is_cumulative(&self, text: &str) -> bool {
        self.cumulative.is_match(text)
    }

    /// Classifies a value-type label; actual tokens are checked first.
    pub fn classify_value_type(&self, text: &str) -> Option<ValueType> {
        let text = text.to_uppercase();
        if self.actual.iter().any(|token| text.contains(token.as_str())) {
            Some(ValueType::Actual)
        } else if self.budget.iter().any(|token| text.contains(token.as_str())) {
            Some(ValueType::Budget)
        } else {
            None
        }
    }

    /// Reads every merged range starting on `row` as a period label.
    ///
    /// Ranges whose label lacks a month or a year are skipped. Descriptors are
    /// returned sorted by start column.
    pub fn parse_period_header<G: Grid + ?Sized>(
        &self,
        grid: &G,
        row: usize,
    ) -> Result<Vec<PeriodDescriptor>, EngineError> {
        let mut descriptors = Vec::new();
        for (start_column, end_column) in grid.merged_ranges_in_row(row) {
            let label = grid.cell_value(row, start_column).text();
            if label.is_empty() {
                continue;
            }
            let period = self
                .extract_month(&label)
                .zip(self.extract_year(&label))
                .and_then(|(month, year)| Period::new(year, month).ok());
            let Some(period) = period else {
                debug!("Sheet '{}': skip period label '{}' without month or year", grid.name(), label);
                continue;
            };
            let kind = if self.is_cumulative(&label) {
                PeriodKind::Cumulative
            } else {
                PeriodKind::Month
            };
            debug!(
                "Sheet '{}': found {:?} period {} '{}' at columns {}-{}",
                grid.name(),
                kind,
                period,
                label,
                index_to_letter(start_column),
                index_to_letter(end_column)
            );
            descriptors.push(PeriodDescriptor {
                kind,
                period,
                start_column,
                end_column,
                raw_label: label,
            });
        }

        if descriptors.is_empty() {
            Err(EngineError::HeaderParseError {
                sheet: grid.name().to_owned(),
                row,
                message: "no period headers found".to_owned(),
            })?
        }
        descriptors.sort_by_key(|descriptor| descriptor.start_column);
        info!("Sheet '{}': found {} period headers at row {}", grid.name(), descriptors.len(), row);
        Ok(descriptors)
    }

    /// Classifies every column of `row` as actual or budget.
    pub fn parse_value_type_header<G: Grid + ?Sized>(
        &self,
        grid: &G,
        row: usize,
    ) -> Result<ValueTypeMap, EngineError> {
        let mut value_types = ValueTypeMap::new();
        for (col, value) in grid.row_values(row) {
            if let Some(value_type) = self.classify_value_type(&value.text()) {
                debug!("Sheet '{}': column {} is {:?}", grid.name(), index_to_letter(col), value_type);
                value_types.insert(col, value_type);
            }
        }

        if value_types.is_empty() {
            Err(EngineError::HeaderParseError {
                sheet: grid.name().to_owned(),
                row,
                message: "no actual or budget headers found".to_owned(),
            })?
        }
        Ok(value_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::Sheet;

    fn header_sheet() -> Sheet {
        let mut sheet = Sheet::new("PT ABC");
        sheet
            .set(7, 1, "URAIAN")
            .set(7, 3, "s.d. Desember 2024")
            .set(7, 5, "Desember 2024")
            .set(7, 9, "November 2024")
            .set(7, 11, "Catatan")
            .merge_row(7, 5, 6)
            .merge_row(7, 3, 4)
            .merge_row(7, 9, 10)
            .merge_row(7, 11, 12)
            .merge_row(7, 13, 14)
            .set(8, 3, "REAL 2024")
            .set(8, 4, "RKAP 2024")
            .set(8, 5, "Realisasi")
            .set(8, 6, "rkap")
            .set(8, 7, "%")
            .set(8, 9, "ACTUAL")
            .set(8, 10, "Budget");
        sheet
    }

    #[test]
    fn extract_month_prefers_earliest_token() {
        let parser = HeaderParser::standard();
        assert_eq!(parser.extract_month("Desember 2024"), Some(12));
        assert_eq!(parser.extract_month("December 2024"), Some(12));
        assert_eq!(parser.extract_month("s.d. JUNI 2024"), Some(6));
        assert_eq!(parser.extract_month("Agst 2023"), Some(8));
        assert_eq!(parser.extract_month("Bulan Okt - Nov 2024"), Some(10));
        assert_eq!(parser.extract_month("Nov / Des 2024"), Some(11));
        assert_eq!(parser.extract_month("Tahun 2024"), None);
    }

    #[test]
    fn extract_month_matches_whole_words() {
        let parser = HeaderParser::standard();
        assert_eq!(parser.extract_month("Summary Desember 2024"), Some(12));
        assert_eq!(parser.extract_month("Decrease 2024"), None);
        assert_eq!(parser.extract_month("Mayoritas Okt 2024"), Some(10));
        assert_eq!(parser.extract_month("JUNI2024"), Some(6));
        assert_eq!(parser.extract_month("Des-24"), Some(12));
    }

    #[test]
    fn extract_year_requires_20xx() {
        let parser = HeaderParser::standard();
        assert_eq!(parser.extract_year("Desember 2024"), Some(2024));
        assert_eq!(parser.extract_year("Des-2025 (2024 restated)"), Some(2025));
        assert_eq!(parser.extract_year("Desember 1999"), None);
        assert_eq!(parser.extract_year("Desember 24"), None);
    }

    #[test]
    fn cumulative_phrasings() {
        let parser = HeaderParser::standard();
        assert!(parser.is_cumulative("s.d. Desember 2024"));
        assert!(parser.is_cumulative("S/D Desember 2024"));
        assert!(parser.is_cumulative("Sampai Dengan Desember 2024"));
        assert!(parser.is_cumulative("Up to December 2024"));
        assert!(parser.is_cumulative("YTD Dec 2024"));
        assert!(!parser.is_cumulative("Desember 2024"));
        assert!(!parser.is_cumulative("December 2024"));
    }

    #[test]
    fn classify_value_types() {
        let parser = HeaderParser::standard();
        assert_eq!(parser.classify_value_type("REAL 2024"), Some(ValueType::Actual));
        assert_eq!(parser.classify_value_type("realisasi"), Some(ValueType::Actual));
        assert_eq!(parser.classify_value_type("Actual"), Some(ValueType::Actual));
        assert_eq!(parser.classify_value_type("RKAP 2024"), Some(ValueType::Budget));
        assert_eq!(parser.classify_value_type("budget"), Some(ValueType::Budget));
        assert_eq!(parser.classify_value_type("REAL vs RKAP"), Some(ValueType::Actual));
        assert_eq!(parser.classify_value_type("%"), None);
    }

    #[test]
    fn parse_period_header_sorted_by_column() {
        let sheet = header_sheet();
        let descriptors = HeaderParser::standard().parse_period_header(&sheet, 7).unwrap();

        assert_eq!(
            descriptors,
            vec![
                PeriodDescriptor {
                    kind: PeriodKind::Cumulative,
                    period: Period::new(2024, 12).unwrap(),
                    start_column: 3,
                    end_column: 4,
                    raw_label: "s.d. Desember 2024".to_owned(),
                },
                PeriodDescriptor {
                    kind: PeriodKind::Month,
                    period: Period::new(2024, 12).unwrap(),
                    start_column: 5,
                    end_column: 6,
                    raw_label: "Desember 2024".to_owned(),
                },
                PeriodDescriptor {
                    kind: PeriodKind::Month,
                    period: Period::new(2024, 11).unwrap(),
                    start_column: 9,
                    end_column: 10,
                    raw_label: "November 2024".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn parse_period_header_without_labels() {
        let mut sheet = Sheet::new("PT ABC");
        sheet.set(7, 5, "Desember 2024").set(7, 7, "Keterangan").merge_row(7, 7, 8);

        let result = HeaderParser::standard().parse_period_header(&sheet, 7);
        assert!(matches!(
            result,
            Err(EngineError::HeaderParseError { sheet, row: 7, .. }) if sheet == "PT ABC"
        ));
    }

    #[test]
    fn parse_value_type_header() {
        let sheet = header_sheet();
        let value_types = HeaderParser::standard().parse_value_type_header(&sheet, 8).unwrap();

        assert_eq!(
            value_types,
            ValueTypeMap::from([
                (3, ValueType::Actual),
                (4, ValueType::Budget),
                (5, ValueType::Actual),
                (6, ValueType::Budget),
                (9, ValueType::Actual),
                (10, ValueType::Budget),
            ])
        );
    }

    #[test]
    fn parse_value_type_header_without_labels() {
        let mut sheet = Sheet::new("PT ABC");
        sheet.set(8, 5, "%").set(8, 6, "Keterangan");

        let result = HeaderParser::standard().parse_value_type_header(&sheet, 8);
        assert!(matches!(result, Err(EngineError::HeaderParseError { row: 8, .. })));
    }

    #[test]
    fn custom_vocabulary() {
        let vocabulary = HeaderVocabulary {
            months: BTreeMap::from([("dezember".to_owned(), 12)]),
            cumulative: vec!["kumuliert".to_owned()],
            actual: vec!["ist".to_owned()],
            budget: vec!["plan".to_owned()],
        };
        let parser = HeaderParser::new(&vocabulary).unwrap();
        assert_eq!(parser.extract_month("Dezember 2024"), Some(12));
        assert_eq!(parser.extract_month("Desember 2024"), None);
        assert!(parser.is_cumulative("Dezember 2024 kumuliert"));
        assert_eq!(parser.classify_value_type("IST"), Some(ValueType::Actual));
        assert_eq!(parser.classify_value_type("Plan"), Some(ValueType::Budget));
    }
}
