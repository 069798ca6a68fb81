use crate::adapters::github::{RepoRef, DEFAULT_API_BASE_URL, DEFAULT_RAW_BASE_URL, TOKEN_ENV};
use crate::core::report::ReportFormat;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_BRANCH: &str = "main";
const DEFAULT_CONCURRENT_REQUESTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineInfo,
    pub source: SourceConfig,
    pub extract: ExtractConfig,
    pub evaluation: Option<EvaluationConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// `owner/name` or a repository URL.
    pub repository: String,
    pub folder: String,
    pub branch: Option<String>,
    pub api_base_url: Option<String>,
    pub raw_base_url: Option<String>,
    /// Environment variable holding the API token.
    pub token_env: Option<String>,
    pub timeout_seconds: Option<u64>,
    /// When set, listed files are also downloaded here.
    pub download_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub patterns_file: String,
    pub concurrent_requests: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub required_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

fn default_output_formats() -> Vec<String> {
    vec!["jsonl".to_string()]
}

fn env_var_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"\$\{([^}]+)\}").expect("environment placeholder pattern is valid")
    })
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are left as written.
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        RepoRef::parse(&self.source.repository)?;
        validation::validate_url("source.api_base_url", self.api_base_url())?;
        validation::validate_url("source.raw_base_url", self.raw_base_url())?;
        validation::validate_non_empty_string("source.branch", self.branch())?;
        if let Some(dir) = &self.source.download_dir {
            validation::validate_path("source.download_dir", dir)?;
        }
        validation::validate_path("extract.patterns_file", &self.extract.patterns_file)?;
        validation::validate_positive_number(
            "extract.concurrent_requests",
            self.concurrent_requests(),
            1,
        )?;
        if let Some(evaluation) = &self.evaluation {
            validation::validate_non_empty_list(
                "evaluation.required_fields",
                &evaluation.required_fields,
            )?;
        }
        validation::validate_path("load.output_path", &self.load.output_path)?;
        self.report_formats()?;
        Ok(())
    }

    pub fn branch(&self) -> &str {
        self.source.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }

    pub fn api_base_url(&self) -> &str {
        self.source
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn raw_base_url(&self) -> &str {
        self.source
            .raw_base_url
            .as_deref()
            .unwrap_or(DEFAULT_RAW_BASE_URL)
    }

    pub fn token_env(&self) -> &str {
        self.source.token_env.as_deref().unwrap_or(TOKEN_ENV)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.source.timeout_seconds.map(Duration::from_secs)
    }

    pub fn concurrent_requests(&self) -> usize {
        self.extract
            .concurrent_requests
            .unwrap_or(DEFAULT_CONCURRENT_REQUESTS)
    }

    pub fn required_fields(&self) -> Option<&[String]> {
        self.evaluation.as_ref().map(|e| e.required_fields.as_slice())
    }

    pub fn report_formats(&self) -> Result<Vec<ReportFormat>> {
        if self.load.output_formats.is_empty() {
            return Err(EtlError::ConfigValidationError {
                field: "load.output_formats".to_string(),
                message: "At least one output format is required".to_string(),
            });
        }
        self.load.output_formats.iter().map(|f| f.parse()).collect()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn folder_path(&self) -> &str {
        &self.source.folder
    }

    fn branch(&self) -> &str {
        self.branch()
    }

    fn patterns_file(&self) -> &str {
        &self.extract.patterns_file
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn download_dir(&self) -> Option<&str> {
        self.source.download_dir.as_deref()
    }

    fn concurrent_requests(&self) -> usize {
        self.concurrent_requests()
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[pipeline]
name = "license-validation"

[source]
repository = "acme/licenses"
folder = "applications"

[extract]
patterns_file = "patterns.json"

[load]
output_path = "./output"
"#;

    #[test]
    fn test_parse_minimal_config_with_defaults() {
        let config = TomlConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.pipeline.name, "license-validation");
        assert_eq!(config.branch(), "main");
        assert_eq!(config.api_base_url(), "https://api.github.com");
        assert_eq!(config.token_env(), "GIT_TOKEN");
        assert_eq!(config.concurrent_requests(), 5);
        assert_eq!(config.report_formats().unwrap(), vec![ReportFormat::Jsonl]);
        assert!(config.timeout().is_none());
        assert!(config.required_fields().is_none());
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[pipeline]
name = "license-validation"
description = "Pair license images with application data"
version = "1.0"

[source]
repository = "https://github.com/acme/licenses"
folder = "applications/2024"
branch = "release"
timeout_seconds = 10
download_dir = "./downloads"

[extract]
patterns_file = "patterns.json"
concurrent_requests = 2

[evaluation]
required_fields = ["name", "license_number"]

[load]
output_path = "./output"
output_formats = ["jsonl", "csv"]

[monitoring]
enabled = true
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(ConfigProvider::branch(&config), "release");
        assert_eq!(config.download_dir(), Some("./downloads"));
        assert_eq!(config.timeout(), Some(Duration::from_secs(10)));
        assert_eq!(
            config.report_formats().unwrap(),
            vec![ReportFormat::Jsonl, ReportFormat::Csv]
        );
        assert_eq!(config.required_fields().unwrap().len(), 2);
        assert!(config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("APPLICATION_ETL_TEST_BRANCH", "feature-x");

        let toml_content = MINIMAL.replace(
            "folder = \"applications\"",
            "folder = \"applications\"\nbranch = \"${APPLICATION_ETL_TEST_BRANCH}\"",
        );
        let config = TomlConfig::from_toml_str(&toml_content).unwrap();
        assert_eq!(config.branch(), "feature-x");

        std::env::remove_var("APPLICATION_ETL_TEST_BRANCH");
    }

    #[test]
    fn test_config_validation() {
        let bad_repo = MINIMAL.replace("acme/licenses", "licenses");
        assert!(TomlConfig::from_toml_str(&bad_repo).unwrap().validate().is_err());

        let bad_formats = MINIMAL.replace(
            "output_path = \"./output\"",
            "output_path = \"./output\"\noutput_formats = [\"zip\"]",
        );
        assert!(TomlConfig::from_toml_str(&bad_formats).unwrap().validate().is_err());

        let empty_required = format!("{}\n[evaluation]\nrequired_fields = []\n", MINIMAL);
        assert!(matches!(
            TomlConfig::from_toml_str(&empty_required).unwrap().validate(),
            Err(EtlError::ConfigValidationError { .. })
        ));

        let zero_concurrency = MINIMAL.replace(
            "patterns_file = \"patterns.json\"",
            "patterns_file = \"patterns.json\"\nconcurrent_requests = 0",
        );
        assert!(TomlConfig::from_toml_str(&zero_concurrency).unwrap().validate().is_err());
    }

    #[test]
    fn test_missing_section_is_a_parse_error() {
        let result = TomlConfig::from_toml_str("[pipeline]\nname = \"x\"\n");
        assert!(matches!(result, Err(EtlError::ConfigValidationError { .. })));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.source.folder, "applications");
    }
}
