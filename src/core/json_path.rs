//! JSONPath evaluation over `serde_json::Value` documents.

use crate::utils::error::{EtlError, Result};
use serde_json::{json, Value};

fn select<'a>(content: &'a Value, expression: &str) -> Result<Vec<&'a Value>> {
    jsonpath_lib::select(content, expression).map_err(|e| EtlError::PathExpressionError {
        expression: expression.to_string(),
        message: format!("{:?}", e),
    })
}

/// Checks that `expression` parses, independent of any document.
pub fn compile_check(expression: &str) -> Result<()> {
    if expression.trim().is_empty() {
        return Err(EtlError::PathExpressionError {
            expression: expression.to_string(),
            message: "expression is empty".to_string(),
        });
    }
    select(&json!({}), expression).map(|_| ())
}

/// All matches of `expression` in document order. Empty when nothing matches.
pub fn all_matches(content: &Value, expression: &str) -> Result<Vec<Value>> {
    Ok(select(content, expression)?.into_iter().cloned().collect())
}

/// The first match of `expression`, or `None` when nothing matches.
pub fn first_match(content: &Value, expression: &str) -> Result<Option<Value>> {
    Ok(select(content, expression)?.into_iter().next().cloned())
}

/// Single-entry form: `null` for no match in first-match mode, an array of matches otherwise.
pub fn match_path(content: &Value, expression: &str, first: bool) -> Result<Value> {
    if first {
        Ok(first_match(content, expression)?.unwrap_or(Value::Null))
    } else {
        Ok(Value::Array(all_matches(content, expression)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> Value {
        json!({
            "fields": {
                "name": "Jane Doe",
                "address": {"city": "Springfield", "zip": "12345"}
            },
            "licenses": [
                {"class": "B", "expires": "2030-01-01"},
                {"class": "M", "expires": "2028-06-30"}
            ]
        })
    }

    #[test]
    fn test_first_match_returns_single_value() {
        let value = first_match(&document(), "$.fields.name").unwrap();
        assert_eq!(value, Some(json!("Jane Doe")));
    }

    #[test]
    fn test_all_matches_in_document_order() {
        let values = all_matches(&document(), "$.licenses[*].class").unwrap();
        assert_eq!(values, vec![json!("B"), json!("M")]);
    }

    #[test]
    fn test_recursive_descent() {
        let values = all_matches(&document(), "$..city").unwrap();
        assert_eq!(values, vec![json!("Springfield")]);
    }

    #[test]
    fn test_no_match_is_null_in_first_mode_and_empty_otherwise() {
        let doc = document();
        assert_eq!(match_path(&doc, "$.fields.birth_date", true).unwrap(), Value::Null);
        assert_eq!(match_path(&doc, "$.fields.birth_date", false).unwrap(), json!([]));
    }

    #[test]
    fn test_first_match_of_many() {
        let value = match_path(&document(), "$.licenses[*].expires", true).unwrap();
        assert_eq!(value, json!("2030-01-01"));
    }

    #[test]
    fn test_malformed_expression_fails() {
        let result = first_match(&document(), "$.fields[");
        assert!(matches!(result, Err(EtlError::PathExpressionError { .. })));
        assert!(compile_check("$.fields[").is_err());
        assert!(compile_check("").is_err());
        assert!(compile_check("$.fields.name").is_ok());
    }
}
