use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

/// Value of a single worksheet cell.
///
/// Numbers, text and blanks flow through one explicit union so amount coercion
/// can match every case.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    #[default]
    Empty,
    /// Numeric values (formula cells contribute their cached result)
    Number(Decimal),
    /// Any text, including error literals such as `#DIV/0!`
    Text(String),
}

impl CellValue {
    /// Returns true for blank cells and for text that is only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Number(_) => false,
            CellValue::Text(text) => text.trim().is_empty(),
        }
    }

    /// Returns the trimmed text of the cell; numbers are rendered, blanks are empty.
    pub fn text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(number) => number.normalize().to_string(),
            CellValue::Text(text) => text.trim().to_owned(),
        }
    }

    /// Converts the cell to an amount.
    ///
    /// Blank cells are zero and numbers pass through. Text has thousands
    /// separators and whitespace removed; an empty remainder or a lone `-`
    /// is zero, anything else must parse as a decimal.
    pub fn to_amount(&self) -> Result<Decimal, String> {
        match self {
            CellValue::Empty => Ok(Decimal::ZERO),
            CellValue::Number(number) => Ok(*number),
            CellValue::Text(text) => {
                let cleaned: String = text
                    .chars()
                    .filter(|character| *character != ',' && !character.is_whitespace())
                    .collect();
                if cleaned.is_empty() || cleaned == "-" {
                    Ok(Decimal::ZERO)
                } else {
                    parse_decimal(&cleaned).ok_or_else(|| format!("parse '{}' to amount failed", text))
                }
            }
        }
    }

    /// Builds a cell from the raw text of a numeric XLSX value.
    /// Values that do not parse as numbers are kept as text.
    pub(crate) fn from_number_text(raw: &str) -> Self {
        match parse_decimal(raw.trim()) {
            Some(number) => CellValue::Number(number),
            None => CellValue::Text(raw.to_owned()),
        }
    }
}

/// Parses plain or scientific notation, falling back to a float conversion
/// for values outside the plain decimal grammar.
fn parse_decimal(value: &str) -> Option<Decimal> {
    if let Ok(number) = Decimal::from_str(value) {
        return Some(number);
    }
    if value.contains(['e', 'E']) {
        if let Ok(number) = Decimal::from_scientific(value) {
            return Some(number);
        }
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .and_then(Decimal::from_f64)
}

impl From<Decimal> for CellValue {
    fn from(value: Decimal) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(number) => write!(f, "{}", number.normalize()),
            CellValue::Text(text) => write!(f, "{}", text),
        }
    }
}
