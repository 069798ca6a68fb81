//! Report shaping: serialized `extracted_data` / `eval_data` columns are parsed,
//! flattened into `extracted_*` / `eval_*` columns and written out as a wide table.

use crate::domain::model::{ExtractedRecord, ReportTable};
use crate::domain::ports::{Evaluator, Storage};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::str::FromStr;

pub const EXTRACTED_COLUMN: &str = "extracted_data";
pub const EVAL_COLUMN: &str = "eval_data";

const SOURCES: [(&str, &str, &str); 2] = [
    (EXTRACTED_COLUMN, "extracted_data_parsed", "extracted"),
    (EVAL_COLUMN, "eval_data_parsed", "eval"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Jsonl,
    Csv,
}

impl ReportFormat {
    pub const ALL: [&'static str; 2] = ["jsonl", "csv"];

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Jsonl => "jsonl",
            ReportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jsonl" => Ok(ReportFormat::Jsonl),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(EtlError::InvalidConfigValueError {
                field: "load.output_formats".to_string(),
                value: other.to_string(),
                reason: format!("Unsupported format. Valid formats: {}", Self::ALL.join(", ")),
            }),
        }
    }
}

/// Parses serialized structure text. Anything that is not a string starting with
/// `{` or `[`, or that fails to parse, becomes null.
pub fn parse_structure(value: &Value) -> Value {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                serde_json::from_str(trimmed).unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
        _ => Value::Null,
    }
}

fn flatten_into(path: String, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_into(child_path, child, out);
            }
        }
        leaf => out.push((path, leaf.clone())),
    }
}

/// Flattens a parsed structure into `<prefix>_<dotted.path>` columns.
///
/// Arrays below the top level are kept whole; a top-level array is keyed by index.
/// When two paths flatten to the same column (`{"a": {"b": 1}, "a.b": 2}`), the first wins.
pub fn flatten(prefix: &str, structure: &Value) -> Vec<(String, Value)> {
    let mut flat = Vec::new();
    match structure {
        Value::Object(_) => flatten_into(String::new(), structure, &mut flat),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(index.to_string(), item, &mut flat);
            }
        }
        _ => {}
    }

    let mut columns: Vec<(String, Value)> = Vec::with_capacity(flat.len());
    for (path, value) in flat {
        let column = format!("{}_{}", prefix, path);
        if columns.iter().any(|(existing, _)| *existing == column) {
            tracing::warn!("Duplicate column '{}' after flattening; keeping the first value", column);
            continue;
        }
        columns.push((column, value));
    }
    columns
}

fn push_unique(columns: &mut Vec<String>, column: &str) {
    if !columns.iter().any(|c| c == column) {
        columns.push(column.to_string());
    }
}

/// Replaces the serialized columns with their flattened contents.
///
/// Fails when the table lacks either serialized column.
pub fn shape(table: ReportTable) -> Result<ReportTable> {
    if table.is_empty() {
        return Ok(table);
    }

    let mut rows = table.into_rows();
    let mut flattened: Vec<Vec<(String, Value)>> = Vec::with_capacity(rows.len());
    let mut prefixed_columns: [Vec<String>; 2] = [Vec::new(), Vec::new()];

    for row in &mut rows {
        let mut row_columns = Vec::new();
        for (slot, (source, parsed_column, prefix)) in SOURCES.iter().enumerate() {
            let parsed = row.get(*source).map(parse_structure).unwrap_or(Value::Null);
            let flat = flatten(prefix, &parsed);
            for (column, _) in &flat {
                push_unique(&mut prefixed_columns[slot], column);
            }
            row_columns.extend(flat);
            row.insert(parsed_column.to_string(), parsed);
        }
        flattened.push(row_columns);
    }

    let mut table = ReportTable::new(rows);
    let dropped: Vec<&str> = SOURCES
        .iter()
        .flat_map(|(source, parsed, _)| [*source, *parsed])
        .collect();
    table.drop_columns(&dropped)?;

    let mut columns = table.columns();
    for column in prefixed_columns.iter().flatten() {
        push_unique(&mut columns, column);
    }

    let rows = table
        .into_rows()
        .into_iter()
        .zip(flattened)
        .map(|(mut base, flat)| {
            base.extend(flat);
            let mut wide = Map::with_capacity(columns.len());
            for column in &columns {
                wide.insert(column.clone(), base.remove(column).unwrap_or(Value::Null));
            }
            wide
        })
        .collect();

    Ok(ReportTable::new(rows))
}

/// One raw report row per extracted record, with the pattern fields and the evaluation
/// serialized into the `extracted_data` / `eval_data` columns.
pub fn build_rows(records: &[ExtractedRecord], evaluator: &dyn Evaluator) -> Result<ReportTable> {
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut row = Map::new();
        row.insert(
            "application_id".to_string(),
            Value::String(record.application_id.clone()),
        );
        row.insert(
            "image_path".to_string(),
            Value::String(record.image_path.clone()),
        );
        row.insert(
            EXTRACTED_COLUMN.to_string(),
            Value::String(serde_json::to_string(&record.fields)?),
        );
        let eval = match evaluator.evaluate(record) {
            Some(eval) => Value::String(serde_json::to_string(&eval)?),
            None => Value::Null,
        };
        row.insert(EVAL_COLUMN.to_string(), eval);
        rows.push(row);
    }
    Ok(ReportTable::new(rows))
}

pub fn to_jsonl(table: &ReportTable) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for row in table.rows() {
        serde_json::to_writer(&mut out, row)?;
        out.push(b'\n');
    }
    Ok(out)
}

pub fn from_jsonl(bytes: &[u8]) -> Result<ReportTable> {
    let text = std::str::from_utf8(bytes).map_err(|e| EtlError::ParseError {
        source_name: "jsonl input".to_string(),
        message: e.to_string(),
    })?;

    let mut rows = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: Map<String, Value> =
            serde_json::from_str(line).map_err(|e| EtlError::ParseError {
                source_name: format!("jsonl line {}", index + 1),
                message: e.to_string(),
            })?;
        rows.push(row);
    }
    Ok(ReportTable::new(rows))
}

pub fn to_csv(table: &ReportTable) -> Result<Vec<u8>> {
    let columns = table.columns();
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns)?;

    for row in table.rows() {
        let record: Vec<String> = columns
            .iter()
            .map(|column| match row.get(column) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("Failed to finish CSV output: {}", e),
    })
}

pub fn report_file_name(generated_at: DateTime<Local>, format: ReportFormat) -> String {
    format!(
        "dataset_{}.{}",
        generated_at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Writes the table once per format, all files sharing one timestamp.
pub async fn write_report<S: Storage>(
    storage: &S,
    table: &ReportTable,
    formats: &[ReportFormat],
) -> Result<Vec<String>> {
    let generated_at = Local::now();
    let mut written = Vec::with_capacity(formats.len());

    for format in formats {
        let data = match format {
            ReportFormat::Jsonl => to_jsonl(table)?,
            ReportFormat::Csv => to_csv(table)?,
        };
        let name = report_file_name(generated_at, *format);
        storage.write_file(&name, &data).await?;

        let location = storage.location(&name);
        tracing::info!("Wrote {} rows to {}", table.len(), location);
        written.push(location);
    }
    Ok(written)
}
