use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::utils::error::{EtlError, Result};

/// Kind of an entry in a remote directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// One entry of a non-recursive remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
}

impl FileEntry {
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}

/// Role of a listed file inside an application pair, decided by its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRole {
    Image(String),
    Data(String),
}

/// An image and a data file sharing the same identifier, before the data is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationPair {
    pub application_id: String,
    pub image_path: String,
    pub data_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationData {
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application_id: String,
    pub application_data: ApplicationData,
    /// URL of the image file.
    pub image_path: String,
}

/// Field name to path expression, in patterns-file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternTable(pub IndexMap<String, String>);

impl PatternTable {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PatternTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// One record per application: identifiers plus every pattern field (null when unmatched).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub application_id: String,
    pub image_path: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ExtractedRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub extracted: Vec<ExtractedRecord>,
    pub report: ReportTable,
}

/// A table of JSON rows. Column order is the first-seen order of keys across rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportTable {
    rows: Vec<Map<String, Value>>,
}

impl ReportTable {
    pub fn new(rows: Vec<Map<String, Value>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Map<String, Value>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.rows.iter().any(|row| row.contains_key(column))
    }

    /// Removes the given columns from every row.
    ///
    /// Fails without touching the table when any column is absent from all rows.
    pub fn drop_columns(&mut self, columns: &[&str]) -> Result<()> {
        let mut missing: Vec<String> = columns
            .iter()
            .filter(|c| !self.has_column(c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            return Err(EtlError::MissingColumnsError { columns: missing });
        }

        for row in &mut self.rows {
            for column in columns {
                row.shift_remove(*column);
            }
        }
        Ok(())
    }
}
