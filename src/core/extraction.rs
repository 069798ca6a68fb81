use crate::core::json_path;
use crate::domain::model::{ApplicationRecord, ExtractedRecord, PatternTable};
use crate::utils::error::{EtlError, Result};
use serde_json::Map;
use std::path::Path;

const RESERVED_FIELDS: [&str; 2] = ["application_id", "image_path"];

impl PatternTable {
    /// Loads a `{"field": "$.path"}` table and checks every expression up front.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| EtlError::ConfigError {
            message: format!("Cannot read patterns file {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let table: PatternTable =
            serde_json::from_str(content).map_err(|e| EtlError::ConfigError {
                message: format!("Patterns must be a JSON object of strings: {}", e),
            })?;
        table.check()?;
        Ok(table)
    }

    pub fn check(&self) -> Result<()> {
        for (field, expression) in self.iter() {
            if RESERVED_FIELDS.contains(&field.as_str()) {
                return Err(EtlError::ConfigValidationError {
                    field: field.clone(),
                    message: "pattern field collides with a record identifier".to_string(),
                });
            }
            json_path::compile_check(expression)?;
        }
        Ok(())
    }
}

/// Applies every pattern to one record's data document.
pub fn extract_record(
    application: &ApplicationRecord,
    patterns: &PatternTable,
) -> Result<ExtractedRecord> {
    let document = &application.application_data.data;
    let mut fields = Map::new();
    for (field, expression) in patterns.iter() {
        let value = json_path::match_path(document, expression, true)?;
        fields.insert(field.clone(), value);
    }

    Ok(ExtractedRecord {
        application_id: application.application_id.clone(),
        image_path: application.image_path.clone(),
        fields,
    })
}

/// Extracts every record; the first failure aborts the whole batch.
pub fn extract_fields(
    applications: &[ApplicationRecord],
    patterns: &PatternTable,
) -> Result<Vec<ExtractedRecord>> {
    applications
        .iter()
        .map(|application| extract_record(application, patterns))
        .collect()
}
