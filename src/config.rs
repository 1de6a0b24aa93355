//! Run configuration: header rows, label vocabulary, organizational units and
//! the declared rows to extract.
//!
//! A [`ReportConfig`] is immutable once loaded. Long-running callers keep it in
//! a [`ConfigStore`], which swaps in a freshly loaded configuration when the
//! file on disk changes.

use crate::engine::extract::RowEntry;
use crate::engine::header::HeaderParser;
use crate::engine::header::HeaderRows;
use crate::engine::header::HeaderVocabulary;
use crate::error::ReportError;
use parking_lot::RwLock;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::info;
use tracing::warn;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("No units configured")]
    NoUnitsError,

    #[error("Duplicate unit {0} '{1}'")]
    DuplicateUnitError(&'static str, String),

    #[error("Unit '{0}' has an empty {1}")]
    EmptyUnitFieldError(String, &'static str),

    #[error("No rows configured")]
    NoRowsError,

    #[error("Row number of '{0}' must be at least 1")]
    InvalidRowError(String),

    #[error("Row {0} is configured more than once")]
    DuplicateRowError(usize),

    #[error("Tag '{1}' of row {0} is not one of: {2}")]
    UnknownTagError(usize, String, String),

    #[error("Header rows must be distinct and at least 1, got period row {0} and value type row {1}")]
    InvalidHeaderRowsError(usize, usize),

    #[error("Invalid vocabulary: {0}")]
    VocabularyError(String),

    #[error("Unit '{0}' not found")]
    UnitNotFoundError(String),
}

/// An organizational unit and the worksheet that reports it.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Unit {
    /// Configuration key, unique within the configuration
    pub key: String,
    /// Code stamped onto extracted rows and used for coverage
    pub code: String,
    #[serde(default)]
    pub name: String,
    pub sheet_name: String,
    #[serde(default)]
    pub holding: String,
}

impl Unit {
    /// Display name, falling back to the key.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.key
        } else {
            &self.name
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub header: HeaderRows,
    #[serde(default)]
    pub vocabulary: HeaderVocabulary,
    pub units: Vec<Unit>,
    pub rows: Vec<RowEntry>,
    #[serde(default)]
    pub allowed_tags: Option<BTreeSet<String>>,
}

/// Counts describing a configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigSummary {
    pub units: usize,
    pub rows: usize,
    pub rows_by_tag: BTreeMap<String, usize>,
    pub units_by_holding: BTreeMap<String, usize>,
}

impl ReportConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ReportConfig, ReportError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = ReportConfig::from_json(&content)?;
        info!(
            "Loaded config '{}': {} units, {} rows",
            path.display(),
            config.units.len(),
            config.rows.len()
        );
        Ok(config)
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(content: &str) -> Result<ReportConfig, ReportError> {
        let config: ReportConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let HeaderRows {
            period_row,
            value_type_row,
        } = self.header;
        if period_row == 0 || value_type_row == 0 || period_row == value_type_row {
            return Err(ConfigError::InvalidHeaderRowsError(period_row, value_type_row));
        }

        if self.units.is_empty() {
            return Err(ConfigError::NoUnitsError);
        }
        let mut keys = HashSet::new();
        let mut codes = HashSet::new();
        let mut sheets = HashSet::new();
        for unit in &self.units {
            if unit.code.trim().is_empty() {
                return Err(ConfigError::EmptyUnitFieldError(unit.key.to_owned(), "code"));
            }
            if unit.sheet_name.trim().is_empty() {
                return Err(ConfigError::EmptyUnitFieldError(unit.key.to_owned(), "sheet name"));
            }
            if !keys.insert(unit.key.as_str()) {
                return Err(ConfigError::DuplicateUnitError("key", unit.key.to_owned()));
            }
            if !codes.insert(unit.code.as_str()) {
                return Err(ConfigError::DuplicateUnitError("code", unit.code.to_owned()));
            }
            if !sheets.insert(unit.sheet_name.as_str()) {
                return Err(ConfigError::DuplicateUnitError("sheet name", unit.sheet_name.to_owned()));
            }
        }

        if self.rows.is_empty() {
            return Err(ConfigError::NoRowsError);
        }
        let mut rows = HashSet::new();
        for entry in &self.rows {
            if entry.row == 0 {
                return Err(ConfigError::InvalidRowError(entry.category.to_owned()));
            }
            if !rows.insert(entry.row) {
                return Err(ConfigError::DuplicateRowError(entry.row));
            }
            if let Some(allowed) = &self.allowed_tags {
                if !allowed.contains(&entry.tag) {
                    let expected = allowed.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
                    return Err(ConfigError::UnknownTagError(entry.row, entry.tag.to_owned(), expected));
                }
            }
        }

        self.validate_vocabulary()
    }

    fn validate_vocabulary(&self) -> Result<(), ConfigError> {
        let vocabulary = &self.vocabulary;
        if vocabulary.months.is_empty() {
            return Err(ConfigError::VocabularyError("no month tokens".to_owned()));
        }
        if let Some((token, month)) = vocabulary.months.iter().find(|(_, month)| !(1..=12).contains(*month)) {
            return Err(ConfigError::VocabularyError(format!("month {} of token '{}' is out of range", month, token)));
        }
        if vocabulary.months.keys().any(|token| token.trim().is_empty()) {
            return Err(ConfigError::VocabularyError("month tokens must not be blank".to_owned()));
        }
        if vocabulary.cumulative.iter().any(|token| token.trim().is_empty()) {
            return Err(ConfigError::VocabularyError("cumulative tokens must not be blank".to_owned()));
        }
        let blank = |tokens: &[String]| tokens.is_empty() || tokens.iter().any(|token| token.trim().is_empty());
        if blank(&vocabulary.actual) || blank(&vocabulary.budget) {
            return Err(ConfigError::VocabularyError("actual and budget tokens must not be blank".to_owned()));
        }
        Ok(())
    }

    /// Compiles the header vocabulary.
    pub fn header_parser(&self) -> Result<HeaderParser, ConfigError> {
        HeaderParser::new(&self.vocabulary).map_err(|error| ConfigError::VocabularyError(error.to_string()))
    }

    /// Codes of every configured unit, the expected set for coverage.
    pub fn expected_codes(&self) -> BTreeSet<String> {
        self.units.iter().map(|unit| unit.code.to_owned()).collect()
    }

    pub fn unit(&self, key: &str) -> Result<&Unit, ConfigError> {
        self.units
            .iter()
            .find(|unit| unit.key == key)
            .ok_or_else(|| ConfigError::UnitNotFoundError(key.to_owned()))
    }

    pub fn unit_by_code(&self, code: &str) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.code == code)
    }

    /// `name (code)` of the unit with `code`, or the bare code when no unit has it.
    pub fn unit_label(&self, code: &str) -> String {
        match self.unit_by_code(code) {
            Some(unit) => format!("{} ({})", unit.display_name(), code),
            None => code.to_owned(),
        }
    }

    pub fn summary(&self) -> ConfigSummary {
        let mut rows_by_tag = BTreeMap::new();
        for entry in &self.rows {
            *rows_by_tag.entry(entry.tag.to_owned()).or_insert(0) += 1;
        }
        let mut units_by_holding = BTreeMap::new();
        for unit in &self.units {
            *units_by_holding.entry(unit.holding.to_owned()).or_insert(0) += 1;
        }
        ConfigSummary {
            units: self.units.len(),
            rows: self.rows.len(),
            rows_by_tag,
            units_by_holding,
        }
    }
}

struct Loaded {
    config: Arc<ReportConfig>,
    modified: Option<SystemTime>,
}

/// Shared handle to the current configuration.
///
/// Readers take an [`Arc`] snapshot; replacing the configuration never
/// disturbs a batch that is already running with the previous one.
pub struct ConfigStore {
    path: Option<PathBuf>,
    loaded: RwLock<Loaded>,
}

impl ConfigStore {
    /// Loads the configuration file and remembers its modification time.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ConfigStore, ReportError> {
        let path = path.as_ref().to_path_buf();
        let modified = modified_time(&path)?;
        let config = ReportConfig::load(&path)?;
        Ok(ConfigStore {
            path: Some(path),
            loaded: RwLock::new(Loaded {
                config: Arc::new(config),
                modified: Some(modified),
            }),
        })
    }

    /// Store for an in-memory configuration that has no backing file.
    pub fn from_config(config: ReportConfig) -> Result<ConfigStore, ConfigError> {
        config.validate()?;
        Ok(ConfigStore {
            path: None,
            loaded: RwLock::new(Loaded {
                config: Arc::new(config),
                modified: None,
            }),
        })
    }

    pub fn current(&self) -> Arc<ReportConfig> {
        self.loaded.read().config.clone()
    }

    /// Validates `config` and swaps it in.
    pub fn replace(&self, config: ReportConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.loaded.write().config = Arc::new(config);
        Ok(())
    }

    /// Reloads the file if its modification time moved since the last load.
    ///
    /// Returns `Ok(true)` when a new configuration was swapped in. A file that
    /// fails to load leaves the current configuration in place.
    pub fn reload_if_changed(&self) -> Result<bool, ReportError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let modified = modified_time(path)?;
        if self.loaded.read().modified == Some(modified) {
            return Ok(false);
        }

        match ReportConfig::load(path) {
            Ok(config) => {
                let mut loaded = self.loaded.write();
                loaded.config = Arc::new(config);
                loaded.modified = Some(modified);
                info!("Reloaded config '{}'", path.display());
                Ok(true)
            }
            Err(error) => {
                warn!("Reload config '{}' failed, keeping current config: {}", path.display(), error);
                Err(error)
            }
        }
    }
}

fn modified_time(path: &Path) -> Result<SystemTime, ReportError> {
    Ok(fs::metadata(path)?.modified()?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    pub(crate) const CONFIG: &str = r#"{
        "units": [
            {"key": "abc", "code": "ABC", "name": "PT ABC", "sheet_name": "PT ABC", "holding": "Holding A"},
            {"key": "xyz", "code": "XYZ", "name": "PT XYZ", "sheet_name": "PT XYZ", "holding": "Holding A"},
            {"key": "qrs", "code": "QRS", "sheet_name": "PT QRS", "holding": "Holding B"}
        ],
        "rows": [
            {"row": 12, "category": "Gaji", "tag": "CASH"},
            {"row": 13, "category": "Tunjangan", "tag": "CASH"},
            {"row": 20, "category": "Penyusutan", "tag": "NON CASH"}
        ],
        "allowed_tags": ["CASH", "NON CASH"]
    }"#;

    fn config() -> ReportConfig {
        ReportConfig::from_json(CONFIG).unwrap()
    }

    #[test]
    fn load_with_defaults() {
        let config = config();
        assert_eq!(config.header, HeaderRows { period_row: 7, value_type_row: 8 });
        assert_eq!(config.vocabulary, HeaderVocabulary::default());
        assert_eq!(config.units.len(), 3);
        assert_eq!(config.units[2].display_name(), "qrs");
        assert_eq!(config.rows[2].tag, "NON CASH");
        assert_eq!(
            config.expected_codes(),
            BTreeSet::from(["ABC".to_owned(), "QRS".to_owned(), "XYZ".to_owned()])
        );
        assert_eq!(config.unit("xyz").map(|unit| unit.code.as_str()), Ok("XYZ"));
        assert_eq!(config.unit("nope"), Err(ConfigError::UnitNotFoundError("nope".to_owned())));
        assert_eq!(config.unit_by_code("QRS").map(|unit| unit.key.as_str()), Some("qrs"));
    }

    #[test]
    fn unit_label_prefers_name() {
        let config = config();
        assert_eq!(config.unit_label("ABC"), "PT ABC (ABC)");
        assert_eq!(config.unit_label("QRS"), "qrs (QRS)");
        assert_eq!(config.unit_label("ZZZ"), "ZZZ");
    }

    #[test]
    fn load_custom_header_and_vocabulary() {
        let json = r#"{
            "header": {"period_row": 4, "value_type_row": 5},
            "vocabulary": {"actual": ["IST"], "budget": ["PLAN"]},
            "units": [{"key": "a", "code": "A", "sheet_name": "A"}],
            "rows": [{"row": 6, "category": "Umsatz", "tag": ""}]
        }"#;
        let config = ReportConfig::from_json(json).unwrap();
        assert_eq!(config.header, HeaderRows { period_row: 4, value_type_row: 5 });
        assert_eq!(config.vocabulary.actual, vec!["IST"]);
        assert_eq!(config.vocabulary.months, HeaderVocabulary::default().months);
        assert!(config.header_parser().is_ok());
    }

    fn check(update: impl Fn(&mut ReportConfig), expected: ConfigError) {
        let mut config = config();
        update(&mut config);
        assert_eq!(config.validate(), Err(expected));
    }

    #[test]
    fn validate_rejects_invalid_configs() {
        check(|config| config.units.clear(), ConfigError::NoUnitsError);
        check(|config| config.rows.clear(), ConfigError::NoRowsError);
        check(
            |config| config.units[1].key = "abc".to_owned(),
            ConfigError::DuplicateUnitError("key", "abc".to_owned()),
        );
        check(
            |config| config.units[1].code = "ABC".to_owned(),
            ConfigError::DuplicateUnitError("code", "ABC".to_owned()),
        );
        check(
            |config| config.units[2].sheet_name = "PT ABC".to_owned(),
            ConfigError::DuplicateUnitError("sheet name", "PT ABC".to_owned()),
        );
        check(
            |config| config.units[0].code = " ".to_owned(),
            ConfigError::EmptyUnitFieldError("abc".to_owned(), "code"),
        );
        check(
            |config| config.units[0].sheet_name.clear(),
            ConfigError::EmptyUnitFieldError("abc".to_owned(), "sheet name"),
        );
        check(|config| config.rows[0].row = 0, ConfigError::InvalidRowError("Gaji".to_owned()));
        check(|config| config.rows[1].row = 12, ConfigError::DuplicateRowError(12));
        check(
            |config| config.rows[1].tag = "KAS".to_owned(),
            ConfigError::UnknownTagError(13, "KAS".to_owned(), "CASH, NON CASH".to_owned()),
        );
        check(
            |config| config.header.value_type_row = 7,
            ConfigError::InvalidHeaderRowsError(7, 7),
        );
        check(
            |config| {
                config.vocabulary.months.insert("trece".to_owned(), 13);
            },
            ConfigError::VocabularyError("month 13 of token 'trece' is out of range".to_owned()),
        );
        check(
            |config| {
                config.vocabulary.months.insert(" ".to_owned(), 1);
            },
            ConfigError::VocabularyError("month tokens must not be blank".to_owned()),
        );
        check(
            |config| config.vocabulary.cumulative.push(String::new()),
            ConfigError::VocabularyError("cumulative tokens must not be blank".to_owned()),
        );
        check(
            |config| config.vocabulary.budget.clear(),
            ConfigError::VocabularyError("actual and budget tokens must not be blank".to_owned()),
        );
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        assert!(matches!(ReportConfig::from_json("{"), Err(ReportError::JsonError(_))));
        assert!(matches!(
            ReportConfig::from_json(r#"{"units": [], "rows": []}"#),
            Err(ReportError::ConfigError(ConfigError::NoUnitsError))
        ));
    }

    #[test]
    fn summary_counts() {
        let summary = config().summary();
        assert_eq!(summary.units, 3);
        assert_eq!(summary.rows, 3);
        assert_eq!(
            summary.rows_by_tag,
            BTreeMap::from([("CASH".to_owned(), 2), ("NON CASH".to_owned(), 1)])
        );
        assert_eq!(
            summary.units_by_holding,
            BTreeMap::from([("Holding A".to_owned(), 2), ("Holding B".to_owned(), 1)])
        );
    }

    #[test]
    fn store_replace_keeps_previous_snapshots() {
        let store = ConfigStore::from_config(config()).unwrap();
        let before = store.current();

        let mut next = config();
        next.units.truncate(1);
        store.replace(next).unwrap();

        assert_eq!(before.units.len(), 3);
        assert_eq!(store.current().units.len(), 1);
        assert!(!store.reload_if_changed().unwrap());

        let mut invalid = config();
        invalid.rows.clear();
        assert_eq!(store.replace(invalid), Err(ConfigError::NoRowsError));
        assert_eq!(store.current().units.len(), 1);
    }

    #[test]
    fn store_reloads_changed_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        file.flush().unwrap();

        let store = ConfigStore::open(file.path()).unwrap();
        assert!(!store.reload_if_changed().unwrap());
        assert_eq!(store.current().units.len(), 3);

        let trimmed = CONFIG.replace(
            r#"{"key": "qrs", "code": "QRS", "sheet_name": "PT QRS", "holding": "Holding B"}"#,
            r#"{"key": "def", "code": "DEF", "sheet_name": "PT DEF", "holding": "Holding B"}"#,
        );
        fs::write(file.path(), trimmed).unwrap();
        bump_modified(file.path(), 60);
        assert!(store.reload_if_changed().unwrap());
        assert_eq!(store.current().units[2].code, "DEF");

        fs::write(file.path(), "{ broken").unwrap();
        bump_modified(file.path(), 120);
        assert!(store.reload_if_changed().is_err());
        assert_eq!(store.current().units[2].code, "DEF");
    }

    fn bump_modified(path: &Path, seconds: u64) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        let modified = file.metadata().unwrap().modified().unwrap();
        file.set_modified(modified + Duration::from_secs(seconds)).unwrap();
    }
}
