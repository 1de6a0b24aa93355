use thiserror::Error;

/// Main error type for the Rusty Report crate.
/// Aggregates errors from the standard library, dependencies, and internal modules.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Engine module errors
    #[error("{0}")]
    EngineError(#[from] crate::engine::EngineError),

    #[error("{0}")]
    PeriodError(#[from] crate::engine::period::PeriodError),

    // Configuration errors
    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

pub trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, ReportError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| ReportError::WithContextError(format!("{}: {}", message, e)))
    }
}
