use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

/// A single cell of an ingested table.
///
/// Serialized untagged so that a row reads as plain JSON: `"Ana"`, `5512345678`
/// or `null` for an absent value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    /// String form used when the value is substituted into a message or
    /// inspected as a phone number. Absent values render as the empty string.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Text(s) => Cow::Borrowed(s.as_str()),
            CellValue::Number(n) => Cow::Owned(n.to_string()),
            CellValue::Empty => Cow::Borrowed(""),
        }
    }

    /// True for an absent value or an empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// One record of the table, keyed by header.
pub type Row = BTreeMap<String, CellValue>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    #[error("header {0} is empty")]
    EmptyHeader(usize),
    #[error("header '{0}' appears more than once")]
    DuplicateHeader(String),
}

/// Raw shape accepted on the wire before the table invariants are enforced.
#[derive(Deserialize)]
struct DatasetParts {
    headers: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
}

/// Header/row table produced by ingestion.
///
/// Headers are unique and ordered. Every row carries a value (possibly
/// [`CellValue::Empty`]) for every header and nothing else. A dataset is never
/// mutated after construction; a new upload replaces it as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetParts")]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Result<Self, DatasetError> {
        let mut seen = HashSet::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            if header.trim().is_empty() {
                return Err(DatasetError::EmptyHeader(idx + 1));
            }
            if !seen.insert(header.as_str()) {
                return Err(DatasetError::DuplicateHeader(header.clone()));
            }
        }

        let rows = rows
            .into_iter()
            .map(|mut row| {
                headers
                    .iter()
                    .map(|h| (h.clone(), row.remove(h).unwrap_or_default()))
                    .collect()
            })
            .collect();

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// The row used for previews.
    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn has_header(&self, header: &str) -> bool {
        self.headers.iter().any(|h| h == header)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// A dataset without headers or without data rows cannot be dispatched.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() || self.rows.is_empty()
    }
}

impl TryFrom<DatasetParts> for Dataset {
    type Error = DatasetError;

    fn try_from(parts: DatasetParts) -> Result<Self, Self::Error> {
        Dataset::new(parts.headers, parts.rows)
    }
}
