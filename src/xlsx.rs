//! Minimal reader for the first worksheet of an Office Open XML workbook.
//!
//! Only what a header-plus-rows table needs is interpreted: the workbook sheet
//! list, its relationships, the shared string table and cell values. Styles are
//! ignored, so date cells surface as their serial numbers.

use std::{
    borrow::Cow,
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use quick_xml::{
    Reader,
    escape::resolve_xml_entity,
    events::{BytesRef, BytesStart, Event},
};
use thiserror::Error;
use zip::{ZipArchive, result::ZipError};

use crate::table::Cell;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const DEFAULT_SHEET_PART: &str = "xl/worksheets/sheet1.xml";
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

#[derive(Error, Debug)]
pub enum XlsxError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Zip(#[from] ZipError),

    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    XmlEncoding(#[from] quick_xml::encoding::EncodingError),

    #[error("Workbook part '{0}' is missing")]
    MissingPart(String),

    #[error("Workbook contains no worksheets")]
    NoSheets,

    #[error("Unknown XML entity '{0}'")]
    Entity(String),

    #[error("Invalid shared string index '{0}'")]
    SharedStringIndex(String),

    #[error("Cell reference '{0}' is outside the worksheet limits")]
    CellOutOfRange(String),
}

/// Reads the first worksheet into a header row and the data rows below it.
///
/// The header is the first row holding any cell; a sheet with no cells yields
/// no headers and no rows. Columns that hold data below a blank header cell
/// are kept with an empty header name.
pub fn read_first_sheet(path: &Path) -> Result<(Vec<String>, Vec<Vec<Cell>>), XlsxError> {
    let file = File::open(path)?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;

    let sheet_part = first_sheet_part(&mut zip)?;
    let shared_strings = match read_part(&mut zip, SHARED_STRINGS_PART)? {
        Some(bytes) => parse_shared_strings(&bytes)?,
        None => Vec::new(),
    };
    let sheet = read_part(&mut zip, &sheet_part)?
        .ok_or_else(|| XlsxError::MissingPart(sheet_part.clone()))?;
    let grid = parse_sheet(&sheet, &shared_strings)?;

    let mut rows = grid.into_iter().skip_while(|row| row.is_empty());
    let mut headers = match rows.next() {
        Some(header) => header
            .iter()
            .map(|cell| cell.label().unwrap_or_default())
            .collect::<Vec<_>>(),
        None => return Ok((Vec::new(), Vec::new())),
    };
    let rows = rows.collect::<Vec<_>>();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if headers.len() < width {
        headers.resize(width, String::new());
    }
    Ok((headers, rows))
}

/// Reads an archive entry, matching its name case-insensitively.
fn read_part<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, XlsxError> {
    let pattern = name.replace('\\', "/");
    let found = zip
        .file_names()
        .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
        .map(str::to_owned);
    let Some(found) = found else {
        return Ok(None);
    };
    let mut entry = match zip.by_name(&found) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn xml_reader(bytes: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(bytes);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.expand_empty_elements = true;
    config.trim_text(false);
    reader
}

fn attribute(event: &BytesStart<'_>, local_name: &[u8]) -> Result<Option<String>, XlsxError> {
    for attr in event.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn push_entity(text: &mut String, reference: &BytesRef<'_>) -> Result<(), XlsxError> {
    let raw = reference.xml_content()?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => number.parse::<u32>(),
        }
        .map_err(|_| XlsxError::Entity(raw.to_string()))?;
        if let Some(ch) = char::from_u32(code) {
            text.push(ch);
        }
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        text.push_str(entity);
    } else {
        return Err(XlsxError::Entity(raw.to_string()));
    }
    Ok(())
}

fn to_zip_path(target: Cow<'_, str>) -> String {
    if let Some(stripped) = target.strip_prefix('/') {
        stripped.to_string()
    } else if target.starts_with("xl/") {
        target.into_owned()
    } else {
        format!("xl/{target}")
    }
}

/// Finds the archive path of the first sheet declared in the workbook.
fn first_sheet_part<R: Read + Seek>(zip: &mut ZipArchive<R>) -> Result<String, XlsxError> {
    let workbook = read_part(zip, WORKBOOK_PART)?
        .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.to_string()))?;
    let mut reader = xml_reader(&workbook);
    let mut relationship_id = None;
    let mut saw_sheet = false;
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(event) if event.local_name().as_ref() == b"sheet" => {
                saw_sheet = true;
                relationship_id = attribute(&event, b"id")?;
                break;
            }
            _ => {}
        }
    }
    if !saw_sheet {
        return Err(XlsxError::NoSheets);
    }

    let Some(relationship_id) = relationship_id else {
        return Ok(DEFAULT_SHEET_PART.to_string());
    };
    let Some(rels) = read_part(zip, WORKBOOK_RELS_PART)? else {
        return Ok(DEFAULT_SHEET_PART.to_string());
    };
    let mut reader = xml_reader(&rels);
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(event) if event.local_name().as_ref() == b"Relationship" => {
                if attribute(&event, b"Id")?.as_deref() == Some(relationship_id.as_str()) {
                    if let Some(target) = attribute(&event, b"Target")? {
                        return Ok(to_zip_path(Cow::Owned(target)));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(DEFAULT_SHEET_PART.to_string())
}

fn parse_shared_strings(bytes: &[u8]) -> Result<Vec<String>, XlsxError> {
    let mut reader = xml_reader(bytes);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(event) => match event.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_item && !in_phonetic => in_text = true,
                _ => {}
            },
            Event::End(event) => match event.local_name().as_ref() {
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(text) if in_text => current.push_str(&text.xml_content()?),
            Event::CData(data) if in_text => current.push_str(&data.xml_content()?),
            Event::GeneralRef(reference) if in_text => push_entity(&mut current, &reference)?,
            _ => {}
        }
    }
    Ok(strings)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Number,
    SharedString,
    InlineString,
    Boolean,
    Error,
}

impl CellKind {
    fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some("s") => CellKind::SharedString,
            Some("inlineStr") | Some("str") | Some("d") => CellKind::InlineString,
            Some("b") => CellKind::Boolean,
            Some("e") => CellKind::Error,
            _ => CellKind::Number,
        }
    }
}

fn convert_cell(kind: CellKind, raw: &str, shared_strings: &[String]) -> Result<Cell, XlsxError> {
    if raw.is_empty() {
        return Ok(Cell::Missing);
    }
    let cell = match kind {
        CellKind::SharedString => {
            let index = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| XlsxError::SharedStringIndex(raw.to_string()))?;
            let text = shared_strings
                .get(index)
                .ok_or_else(|| XlsxError::SharedStringIndex(raw.to_string()))?;
            Cell::parse(text)
        }
        CellKind::Boolean => match raw.trim() {
            "1" | "true" => Cell::Text("True".to_string()),
            _ => Cell::Text("False".to_string()),
        },
        CellKind::Error => Cell::Missing,
        CellKind::Number | CellKind::InlineString => Cell::parse(raw),
    };
    Ok(cell)
}

/// Converts the column letters of an `A1` reference into a zero-based index.
fn column_from_reference(reference: &str) -> Option<usize> {
    let letters = reference
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>();
    if letters.is_empty() {
        return None;
    }
    letters
        .chars()
        .try_fold(0usize, |acc, c| {
            let digit = (c.to_ascii_uppercase() as u8).checked_sub(b'A')? as usize + 1;
            acc.checked_mul(26)?.checked_add(digit)
        })
        .map(|value| value - 1)
}

/// Zero-based row index of the digits in an `A1` reference or a row's `r`.
fn row_from_number(digits: &str) -> Option<usize> {
    digits
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|r| r.checked_sub(1))
        .filter(|r| *r < MAX_ROWS)
}

fn set_cell(grid: &mut Vec<Vec<Cell>>, row: usize, col: usize, cell: Cell) {
    if grid.len() <= row {
        grid.resize_with(row + 1, Vec::new);
    }
    let cells = &mut grid[row];
    if cells.len() <= col {
        cells.resize(col + 1, Cell::Missing);
    }
    cells[col] = cell;
}

/// Parses worksheet XML into a dense row-major grid.
fn parse_sheet(bytes: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<Cell>>, XlsxError> {
    let mut reader = xml_reader(bytes);
    let mut grid: Vec<Vec<Cell>> = Vec::new();
    let mut row = 0usize;
    let mut next_row = 0usize;
    let mut col = 0usize;
    let mut next_col = 0usize;
    let mut kind = CellKind::Number;
    let mut value = String::new();
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(event) => match event.local_name().as_ref() {
                b"row" => {
                    row = match attribute(&event, b"r")? {
                        Some(r) => row_from_number(&r).ok_or(XlsxError::CellOutOfRange(r))?,
                        None => next_row,
                    };
                    if row >= MAX_ROWS {
                        return Err(XlsxError::CellOutOfRange(format!("row {}", row + 1)));
                    }
                    next_row = row + 1;
                    next_col = 0;
                }
                b"c" => {
                    match attribute(&event, b"r")? {
                        Some(reference) => {
                            let digits =
                                reference.trim_start_matches(|c: char| c.is_ascii_alphabetic());
                            let cell_row = if digits.is_empty() {
                                Some(row)
                            } else {
                                row_from_number(digits)
                            };
                            let cell_col =
                                column_from_reference(&reference).filter(|c| *c < MAX_COLUMNS);
                            let (Some(r), Some(c)) = (cell_row, cell_col) else {
                                return Err(XlsxError::CellOutOfRange(reference));
                            };
                            row = r;
                            col = c;
                        }
                        None if next_col >= MAX_COLUMNS => {
                            return Err(XlsxError::CellOutOfRange(format!("column {}", next_col + 1)));
                        }
                        None => col = next_col,
                    }
                    next_col = col + 1;
                    kind = CellKind::from_attribute(attribute(&event, b"t")?.as_deref());
                    value.clear();
                }
                b"v" => in_value = true,
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => in_inline_text = true,
                _ => {}
            },
            Event::End(event) => match event.local_name().as_ref() {
                b"c" => {
                    let cell = convert_cell(kind, &value, shared_strings)?;
                    if !cell.is_missing() {
                        set_cell(&mut grid, row, col, cell);
                    }
                    value.clear();
                }
                b"v" => in_value = false,
                b"rPh" => in_phonetic = false,
                b"t" => in_inline_text = false,
                _ => {}
            },
            Event::Text(text) if in_value || in_inline_text => {
                value.push_str(&text.xml_content()?)
            }
            Event::CData(data) if in_value || in_inline_text => {
                value.push_str(&data.xml_content()?)
            }
            Event::GeneralRef(reference) if in_value || in_inline_text => {
                push_entity(&mut value, &reference)?
            }
            _ => {}
        }
    }
    Ok(grid)
}
