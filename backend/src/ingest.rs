//! Turns uploaded contact files into a [`Dataset`].
//!
//! Delimited text (`.csv`, `.tsv`, `.txt`) keeps every cell as text so phone
//! numbers with leading zeros survive. Workbooks (`.xlsx`, `.xls`) are read
//! from their first sheet; numeric cells become numbers.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use common::model::dataset::{CellValue, Dataset, Row};
use csv::{ReaderBuilder, StringRecord};
use log::debug;
use std::io::Cursor;
use std::path::Path;

use crate::error::IngestionError;

const DELIMITED_EXTENSIONS: [&str; 3] = ["csv", "tsv", "txt"];
const SPREADSHEET_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];
const BOM: char = '\u{feff}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Delimited,
    Spreadsheet,
}

/// Parses an uploaded file with a header row into a dataset.
///
/// `file_name` only selects the format. Blank rows are skipped and short rows
/// are padded with empty cells. A file without at least one data row is
/// rejected with [`IngestionError::NotEnoughRows`].
pub fn parse_to_dataset(file_name: &str, bytes: &[u8]) -> Result<Dataset, IngestionError> {
    match format_of(file_name)? {
        Format::Delimited => parse_delimited(file_name, bytes),
        Format::Spreadsheet => parse_spreadsheet(file_name, bytes),
    }
}

fn format_of(file_name: &str) -> Result<Format, IngestionError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if DELIMITED_EXTENSIONS.contains(&ext.as_str()) => Ok(Format::Delimited),
        Some(ext) if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) => Ok(Format::Spreadsheet),
        _ => Err(IngestionError::UnsupportedFormat {
            file_name: file_name.to_string(),
        }),
    }
}

fn parse_delimited(file_name: &str, bytes: &[u8]) -> Result<Dataset, IngestionError> {
    let text = std::str::from_utf8(bytes).map_err(|_| IngestionError::InvalidEncoding)?;
    let text = text.strip_prefix(BOM).unwrap_or(text);

    let header_line = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or(IngestionError::NotEnoughRows)?;
    let delimiter = detect_delimiter(header_line);
    debug!(
        "Parsing '{}' with delimiter {:?}",
        file_name, delimiter as char
    );

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader
        .records()
        .filter(|record| record.as_ref().map_or(true, |r| !is_blank(r)));

    let headers: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(normalize_cell).collect(),
        None => return Err(IngestionError::NotEnoughRows),
    };

    let mut rows = Vec::new();
    for record in records {
        rows.push(to_row(&headers, &record?));
    }
    build(headers, rows)
}

fn parse_spreadsheet(file_name: &str, bytes: &[u8]) -> Result<Dataset, IngestionError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Err(IngestionError::NotEnoughRows),
    };
    debug!(
        "Parsing first sheet of '{}' ({} rows)",
        file_name,
        range.height()
    );

    let mut sheet_rows = range
        .rows()
        .filter(|cells| !cells.iter().all(is_blank_cell));

    let headers: Vec<String> = match sheet_rows.next() {
        Some(cells) => cells
            .iter()
            .map(|cell| normalize_cell(&cell.to_string()))
            .collect(),
        None => return Err(IngestionError::NotEnoughRows),
    };

    let rows: Vec<Row> = sheet_rows
        .map(|cells| {
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.clone(), cells.get(i).map_or(CellValue::Empty, to_cell)))
                .collect::<Row>()
        })
        .collect();
    build(headers, rows)
}

fn build(headers: Vec<String>, rows: Vec<Row>) -> Result<Dataset, IngestionError> {
    if rows.is_empty() {
        return Err(IngestionError::NotEnoughRows);
    }
    Ok(Dataset::new(headers, rows)?)
}

/// The candidate occurring most often in the header line, `,` on a tie.
fn detect_delimiter(header_line: &str) -> u8 {
    DELIMITERS
        .iter()
        .copied()
        .rev()
        .max_by_key(|&d| header_line.bytes().filter(|&b| b == d).count())
        .filter(|&d| header_line.as_bytes().contains(&d))
        .unwrap_or(b',')
}

fn normalize_cell(cell: &str) -> String {
    cell.replace('\u{00A0}', " ").trim().to_string()
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

fn is_blank_cell(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Empty => CellValue::Empty,
        other => match normalize_cell(&other.to_string()) {
            text if text.is_empty() => CellValue::Empty,
            text => CellValue::Text(text),
        },
    }
}

fn to_row(headers: &[String], record: &StringRecord) -> Row {
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let value = match record.get(i).map(normalize_cell) {
                Some(cell) if !cell.is_empty() => CellValue::Text(cell),
                _ => CellValue::Empty,
            };
            (header.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::dataset::DatasetError;
    use rust_xlsxwriter::Workbook;

    /// Builds an `.xlsx` in memory. Numbers in `rows` are written as numeric
    /// cells, everything else as strings; `""` leaves the cell unwritten.
    fn workbook(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                if value.is_empty() {
                    continue;
                }
                match value.parse::<f64>() {
                    Ok(n) => sheet.write_number(r, c, n).unwrap(),
                    Err(_) => sheet.write_string(r, c, *value).unwrap(),
                };
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn parses_headers_and_rows_in_order() {
        let csv = b"name,phone\nAna,5512345678\nLuis,5512345679\n";
        let ds = parse_to_dataset("contacts.csv", csv).unwrap();
        assert_eq!(ds.headers(), ["name", "phone"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows()[1]["name"], CellValue::from("Luis"));
    }

    #[test]
    fn leading_zeros_survive() {
        let ds = parse_to_dataset("c.csv", b"phone\n0044123456789\n").unwrap();
        assert_eq!(ds.rows()[0]["phone"].as_text(), "0044123456789");
    }

    #[test]
    fn detects_semicolon_and_tab_delimiters() {
        let ds = parse_to_dataset("c.csv", b"name;phone\nAna;55 1234, 5678\n").unwrap();
        assert_eq!(ds.rows()[0]["phone"].as_text(), "55 1234, 5678");

        let ds = parse_to_dataset("c.tsv", b"name\tphone\nAna\t5512345678\n").unwrap();
        assert_eq!(ds.headers(), ["name", "phone"]);
    }

    #[test]
    fn single_column_file_uses_comma() {
        assert_eq!(detect_delimiter("phone"), b',');
        assert_eq!(detect_delimiter("a|b|c"), b'|');
    }

    #[test]
    fn bom_quotes_and_whitespace_are_cleaned() {
        let bytes = "\u{feff} name ,\"phone\"\r\n\"Ana, la jefa\",\u{00A0}5512345678 \r\n";
        let ds = parse_to_dataset("c.csv", bytes.as_bytes()).unwrap();
        assert_eq!(ds.headers(), ["name", "phone"]);
        assert_eq!(ds.rows()[0]["name"].as_text(), "Ana, la jefa");
        assert_eq!(ds.rows()[0]["phone"].as_text(), "5512345678");
    }

    #[test]
    fn blank_lines_are_skipped_and_short_records_padded() {
        let ds = parse_to_dataset("c.csv", b"\nname,phone,city\n\nAna,5512345678\n,,\n").unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.rows()[0]["city"], CellValue::Empty);
    }

    #[test]
    fn header_only_file_is_rejected() {
        for bytes in [&b""[..], b"name,phone\n", b"name,phone\n\n\n"] {
            assert!(matches!(
                parse_to_dataset("c.csv", bytes),
                Err(IngestionError::NotEnoughRows)
            ));
        }
    }

    #[test]
    fn workbook_first_sheet_becomes_the_dataset() {
        let bytes = workbook(&[
            &["name", "phone", "city"],
            &["Ana", "5512345678", "CDMX"],
            &["", "", ""],
            &["Luis", "5512345679", ""],
        ]);
        let ds = parse_to_dataset("Contacts.XLSX", &bytes).unwrap();

        assert_eq!(ds.headers(), ["name", "phone", "city"]);
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows()[0]["phone"], CellValue::Number(5512345678.0));
        assert_eq!(ds.rows()[0]["phone"].as_text(), "5512345678");
        assert_eq!(ds.rows()[0]["name"], CellValue::from("Ana"));
        assert_eq!(ds.rows()[1]["city"], CellValue::Empty);
    }

    #[test]
    fn header_only_workbook_is_rejected() {
        let bytes = workbook(&[&["name", "phone"]]);
        assert!(matches!(
            parse_to_dataset("book.xlsx", &bytes),
            Err(IngestionError::NotEnoughRows)
        ));
    }

    #[test]
    fn corrupt_workbook_is_a_spreadsheet_error() {
        let err = parse_to_dataset("book.xls", b"name,phone\nAna,1\n").unwrap_err();
        assert!(matches!(err, IngestionError::Spreadsheet(_)), "{err}");
    }

    #[test]
    fn unknown_files_are_rejected() {
        for name in ["notes", "image.png", "book.ods"] {
            let err = parse_to_dataset(name, b"a\n1\n").unwrap_err();
            assert!(matches!(err, IngestionError::UnsupportedFormat { .. }), "{name}");
        }
        assert!(parse_to_dataset("LIST.CSV", b"a\n1\n").is_ok());
    }

    #[test]
    fn invalid_headers_are_rejected() {
        assert!(matches!(
            parse_to_dataset("c.csv", b"name,,phone\na,b,c\n"),
            Err(IngestionError::Header(DatasetError::EmptyHeader(2)))
        ));
        assert!(matches!(
            parse_to_dataset("c.csv", b"phone,phone\n1,2\n"),
            Err(IngestionError::Header(DatasetError::DuplicateHeader(_)))
        ));
    }

    #[test]
    fn non_utf8_bytes_are_rejected() {
        assert!(matches!(
            parse_to_dataset("c.csv", &[0x6e, 0xff, 0x0a, 0x31]),
            Err(IngestionError::InvalidEncoding)
        ));
    }
}
