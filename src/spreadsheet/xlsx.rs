use crate::error::ReportError;
use crate::error::ResultMessage;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::range_to_index;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::Workbook;
use quick_xml::events::Event;
use quick_xml::name::QName;
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use tracing::debug;
use zip::read::ZipFile;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_RELATIONSHIP: &[u8] = b"Relationship";           // Package relationship
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");         // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");             // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t");                        // Text content within strings
const TAG_SHEET: QName = QName(b"sheet");                   // Worksheet definition
const TAG_ROW: QName = QName(b"row");                       // Row in worksheet
const TAG_CELL: QName = QName(b"c");                        // Cell in worksheet
const TAG_INLINE_STRING: QName = QName(b"is");              // Inline string value
const TAG_VALUE: QName = QName(b"v");                       // Cell value content
const TAG_MERGE_CELL: QName = QName(b"mergeCell");          // Merged range declaration

/// How the raw text of a `<c>` element is interpreted, from its `t` attribute.
#[derive(Copy, Clone, Debug, PartialEq)]
enum ValueKind {
    Number,
    SharedString,
    InlineString,
    Boolean,
    Error,
}

/// Opens an XLSX file from disk and loads every worksheet.
pub(crate) fn open(path: &Path) -> Result<Workbook, ReportError> {
    let file = File::open(path)?;
    read(&path.to_string_lossy(), BufReader::new(file))
}

/// Loads every worksheet of an XLSX package read from `reader`.
///
/// Cell values are taken as stored (formula cells contribute their cached
/// result) and `<mergeCell>` declarations become merged ranges.
///
/// # Errors
///
/// Returns an error if the package is not a ZIP archive, lacks the workbook
/// parts, declares no worksheets, or contains malformed XML.
pub fn read<RS: Read + Seek>(name: &str, reader: RS) -> Result<Workbook, ReportError> {
    let mut zip = ZipArchive::new(reader)?;
    let sheets = load_workbook(name, &mut zip)?;
    if sheets.is_empty() {
        Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
    }
    let shared_strings = load_shared_strings(&mut zip)?;

    let mut workbook = Workbook::new(name);
    for (sheet_name, zip_path) in &sheets {
        let sheet = read_sheet(name, &mut zip, sheet_name, zip_path, &shared_strings)
            .with_prefix(&format!("Read sheet '{}'", sheet_name))?;
        debug!(
            "Loaded sheet '{}' with {} cells and {} merged ranges",
            sheet_name,
            sheet.len(),
            sheet.merged_ranges().len()
        );
        workbook.push(sheet);
    }
    Ok(workbook)
}

/// Parses one worksheet part into a [`Sheet`].
fn read_sheet<RS: Read + Seek>(
    workbook_name: &str,
    zip: &mut ZipArchive<RS>,
    sheet_name: &str,
    zip_path: &str,
    shared_strings: &[String],
) -> Result<Sheet, ReportError> {
    let mut sheet = Sheet::new(sheet_name);
    let mut reader = zip
        .xml_reader(zip_path)?
        .ok_or_else(|| SpreadsheetError::FileError(workbook_name.to_owned(), zip_path.to_owned()))?;
    let mut row = 0usize;
    let mut col = 0usize;
    let mut kind = ValueKind::Number;
    let mut value = String::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_ROW => {
            row = match event.get_attribute_value("r")? {
                Some(number) => number.parse::<usize>()?,
                None => row + 1,
            };
            col = 0;
        }
        Event::Start(event) if event.name() == TAG_CELL => {
            (row, col) = event.get_attribute_value("r")?
                .and_then(|reference| reference_to_index(&reference))
                .unwrap_or((row, col + 1));
            kind = event.get_attribute_value("t")?.map(|t| {
                match &*t {
                    "s" => ValueKind::SharedString,
                    "inlineStr" | "str" | "d" => ValueKind::InlineString,
                    "b" => ValueKind::Boolean,
                    "e" => ValueKind::Error,
                    _ => ValueKind::Number,
                }
            }).unwrap_or(ValueKind::Number);
            value.clear();
        }
        Event::Start(event) if event.name() == TAG_INLINE_STRING => {
            value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
        }
        Event::Start(event) if event.name() == TAG_VALUE => {
            value = read_string_value(&mut reader, TAG_VALUE, true)?;
        }
        Event::End(event) if event.name() == TAG_CELL => {
            if !value.is_empty() {
                sheet.set(row, col, to_cell_value(kind, &value, shared_strings)?);
                value.clear();
            }
        }
        Event::Start(event) if event.name() == TAG_MERGE_CELL => {
            if let Some((first, last)) = event.get_attribute_value("ref")?
                .and_then(|range| range_to_index(&range))
            {
                sheet.merge(first, last);
            }
        }
    });
    Ok(sheet)
}

/// Converts the raw text of a cell according to its declared kind.
fn to_cell_value(kind: ValueKind, value: &str, shared_strings: &[String]) -> Result<CellValue, ReportError> {
    let cell = match kind {
        ValueKind::Number => CellValue::from_number_text(value),
        ValueKind::SharedString => {
            let index = value.trim().parse::<usize>()?;
            shared_strings
                .get(index)
                .map(|text| CellValue::Text(text.to_owned()))
                .unwrap_or_default()
        }
        ValueKind::InlineString | ValueKind::Error => CellValue::Text(value.to_owned()),
        ValueKind::Boolean => CellValue::Number(if value.trim() == "1" { Decimal::ONE } else { Decimal::ZERO }),
    };
    Ok(cell)
}

/// Loads the worksheet list from `xl/workbook.xml`, resolving each sheet to
/// its package path through the workbook relationships.
fn load_workbook<RS: Read + Seek>(name: &str, zip: &mut ZipArchive<RS>) -> Result<Vec<(String, String)>, ReportError> {
    let relationships = load_relationships(name, zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError(name.to_owned(), "xl/workbook.xml".to_owned()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut sheet_name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    sheet_name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((sheet_name, id)) = sheet_name.zip(id) {
                if let Some(path) = relationships.get(&*id) {
                    sheets.push((sheet_name.to_string(), path.to_owned()));
                }
            }
        }
    });
    Ok(sheets)
}

/// Loads worksheet relationships, mapping relationship ids to package paths.
fn load_relationships<RS: Read + Seek>(
    name: &str,
    zip: &mut ZipArchive<RS>,
    path: &str,
) -> Result<HashMap<String, String>, ReportError> {
    let mut reader = zip
        .xml_reader(path)?
        .ok_or_else(|| SpreadsheetError::FileError(name.to_owned(), path.to_owned()))?;
    let mut relationships: HashMap<String, String> = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?;
            let target = event.get_attribute_value("Target")?;
            // Only worksheet relationships matter
            if kind.map(|it| it.ends_with("/worksheet")).unwrap_or(true) {
                if let Some((id, target)) = id.zip(target) {
                    relationships.insert(id.to_string(), to_zip_path(&target));
                }
            }
        }
    });
    Ok(relationships)
}

/// Loads the shared string table; a package without one has no shared strings.
fn load_shared_strings<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Vec<String>, ReportError> {
    let mut shared_strings = Vec::<String>::new();
    let mut reader = match zip.xml_reader("xl/sharedStrings.xml")? {
        Some(reader) => reader,
        None => return Ok(shared_strings),
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
            shared_strings.push(string);
        }
    });
    Ok(shared_strings)
}

/// Normalizes a relationship target to a path inside the package.
fn to_zip_path(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix('/') {
        stripped.to_owned()
    } else if path.starts_with("xl/") {
        path.to_owned()
    } else {
        format!("xl/{path}")
    }
}

/// Reads string content up to `end_tag`, skipping phonetic annotations and
/// concatenating rich-text runs.
fn read_string_value<RS: Read>(
    reader: &mut XmlReader<BufReader<ZipFile<'_, RS>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, ReportError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
