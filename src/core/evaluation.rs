use crate::domain::model::ExtractedRecord;
use crate::domain::ports::Evaluator;
use crate::utils::error::Result;
use crate::utils::validation::validate_non_empty_list;
use serde_json::{json, Value};

/// Leaves `eval_data` empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvaluation;

impl Evaluator for NoEvaluation {
    fn evaluate(&self, _record: &ExtractedRecord) -> Option<Value> {
        None
    }
}

/// Scores an extracted record by which required fields came back non-null.
#[derive(Debug, Clone)]
pub struct RequiredFieldsEvaluator {
    required_fields: Vec<String>,
}

impl RequiredFieldsEvaluator {
    pub fn new(required_fields: Vec<String>) -> Result<Self> {
        validate_non_empty_list("evaluation.required_fields", &required_fields)?;
        Ok(Self { required_fields })
    }
}

impl Evaluator for RequiredFieldsEvaluator {
    fn evaluate(&self, record: &ExtractedRecord) -> Option<Value> {
        let missing: Vec<&str> = self
            .required_fields
            .iter()
            .filter(|field| record.get(field).map_or(true, Value::is_null))
            .map(String::as_str)
            .collect();

        Some(json!({
            "complete": missing.is_empty(),
            "missing_fields": missing,
            "present_fields": self.required_fields.len() - missing.len(),
            "total_fields": self.required_fields.len(),
        }))
    }
}
