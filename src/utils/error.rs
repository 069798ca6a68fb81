use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Base64 decoding error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("Failed to fetch {source_name}: {message}")]
    FetchError { source_name: String, message: String },

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatusError { url: String, status: u16 },

    #[error("Failed to parse {source_name}: {message}")]
    ParseError { source_name: String, message: String },

    #[error("Invalid path expression '{expression}': {message}")]
    PathExpressionError { expression: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Columns {columns:?} not in the dataset")]
    MissingColumnsError { columns: Vec<String> },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) | EtlError::FetchError { .. } | EtlError::HttpStatusError { .. } => {
                ErrorCategory::Network
            }
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::DecodeError(_)
            | EtlError::ParseError { .. }
            | EtlError::MissingColumnsError { .. }
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::PathExpressionError { .. }
            | EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::HttpStatusError { status: 401, .. }
            | EtlError::HttpStatusError { status: 403, .. } => {
                "Check that GIT_TOKEN (or GITHUB_TOKEN) holds a token with read access to the repository"
            }
            EtlError::HttpStatusError { status: 404, .. } => {
                "Check the repository name, folder path and branch"
            }
            EtlError::ApiError(_) | EtlError::FetchError { .. } | EtlError::HttpStatusError { .. } => {
                "Check network connectivity and retry the run"
            }
            EtlError::PathExpressionError { .. } => {
                "Fix the path expression in the patterns file"
            }
            EtlError::MissingColumnsError { .. } => {
                "Make sure the input rows carry extracted_data and eval_data columns"
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. } => "Review the pipeline configuration file",
            EtlError::IoError(_) => "Check file permissions and available disk space",
            _ => "Inspect the input data; run with --verbose for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the remote source: {}", self),
            ErrorCategory::Data => format!("The data could not be processed: {}", self),
            ErrorCategory::Configuration => format!("The configuration is invalid: {}", self),
            ErrorCategory::System => format!("A system error occurred: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_category() {
        let err = EtlError::HttpStatusError {
            url: "https://api.github.com".to_string(),
            status: 500,
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);

        let err = EtlError::PathExpressionError {
            expression: "$.[".to_string(),
            message: "unexpected end".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_auth_failures_point_at_token() {
        let err = EtlError::HttpStatusError {
            url: "https://api.github.com/repos/o/r/contents/x".to_string(),
            status: 401,
        };
        assert!(err.recovery_suggestion().contains("GIT_TOKEN"));
    }

    #[test]
    fn test_missing_columns_message_lists_columns() {
        let err = EtlError::MissingColumnsError {
            columns: vec!["eval_data".to_string()],
        };
        assert!(err.to_string().contains("eval_data"));
        assert!(err.user_friendly_message().starts_with("The data"));
    }
}
