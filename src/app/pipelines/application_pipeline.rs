use crate::core::evaluation::NoEvaluation;
use crate::core::extraction::extract_fields;
use crate::core::json_source::JsonSourceReader;
use crate::core::pairing::pair_files;
use crate::core::remote::RemoteFileLister;
use crate::core::report::{build_rows, shape, write_report, ReportFormat};
use crate::domain::model::{
    ApplicationData, ApplicationPair, ApplicationRecord, PatternTable, TransformResult,
};
use crate::domain::ports::{ConfigProvider, Evaluator, Pipeline, RepositorySource, Storage};
use crate::utils::error::{EtlError, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;

/// Lists a repository folder, pairs images with their JSON application data, extracts the
/// configured fields and writes the shaped report.
pub struct ApplicationPipeline<S: Storage, R: RepositorySource, C: ConfigProvider> {
    storage: S,
    repository: R,
    config: C,
    patterns: PatternTable,
    reader: JsonSourceReader,
    evaluator: Box<dyn Evaluator>,
}

impl<S: Storage, R: RepositorySource, C: ConfigProvider> ApplicationPipeline<S, R, C> {
    /// Loads and checks the patterns file, so a bad expression fails before any request.
    pub fn new(storage: S, repository: R, config: C) -> Result<Self> {
        let patterns = PatternTable::from_file(config.patterns_file())?;
        Ok(Self {
            storage,
            repository,
            config,
            patterns,
            reader: JsonSourceReader::default(),
            evaluator: Box::new(NoEvaluation),
        })
    }

    pub fn with_reader(mut self, reader: JsonSourceReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Future resolving one pair into a record; it owns everything it needs.
    fn fetch_application(
        &self,
        lister: &RemoteFileLister<'_, R>,
        pair: ApplicationPair,
    ) -> impl Future<Output = ApplicationRecord> + Send + 'static {
        let branch = self.config.branch();
        let data_url = lister.raw_url(branch, &pair.data_path);
        let image_path = lister.raw_url(branch, &pair.image_path);
        let reader = self.reader.clone();

        async move {
            let data = reader.read(&data_url).await;
            ApplicationRecord {
                application_id: pair.application_id,
                application_data: ApplicationData { data },
                image_path,
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, R: RepositorySource, C: ConfigProvider> Pipeline for ApplicationPipeline<S, R, C> {
    async fn extract(&self) -> Result<Vec<ApplicationRecord>> {
        let folder = self.config.folder_path();
        let branch = self.config.branch();
        tracing::info!("📂 Listing '{}' at branch '{}'", folder, branch);

        let lister = RemoteFileLister::new(&self.repository);
        let entries = lister
            .list_files(folder, branch, self.config.download_dir())
            .await;
        let paths: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.is_file())
            .map(|entry| entry.path)
            .collect();

        let outcome = pair_files(&paths);
        tracing::info!(
            "🔗 Paired {} applications from {} files ({} groups discarded)",
            outcome.pairs.len(),
            paths.len(),
            outcome.discarded_groups
        );

        let records: Vec<ApplicationRecord> = stream::iter(outcome.pairs)
            .map(|pair| self.fetch_application(&lister, pair))
            .buffered(self.config.concurrent_requests().max(1))
            .collect()
            .await;

        tracing::info!("📊 Fetched data for {} applications", records.len());
        Ok(records)
    }

    async fn transform(&self, data: Vec<ApplicationRecord>) -> Result<TransformResult> {
        tracing::info!(
            "🔧 Extracting {} fields from {} applications",
            self.patterns.len(),
            data.len()
        );

        let extracted = extract_fields(&data, &self.patterns)?;
        let report = shape(build_rows(&extracted, self.evaluator.as_ref())?)?;

        tracing::debug!("Report columns: {:?}", report.columns());
        Ok(TransformResult { extracted, report })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let formats = self
            .config
            .output_formats()
            .iter()
            .map(|f| f.parse())
            .collect::<Result<Vec<ReportFormat>>>()?;

        tracing::info!(
            "💾 Writing {} report rows to {}",
            result.report.len(),
            self.config.output_path()
        );
        let written = write_report(&self.storage, &result.report, &formats).await?;

        written
            .into_iter()
            .next()
            .ok_or_else(|| EtlError::ConfigValidationError {
                field: "load.output_formats".to_string(),
                message: "No output format configured".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::evaluation::RequiredFieldsEvaluator;
    use crate::domain::model::{FileEntry, FileKind};
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn only_file(&self) -> (String, Vec<u8>) {
            let files = self.files.lock().await;
            assert_eq!(files.len(), 1);
            let (name, data) = files.iter().next().unwrap();
            (name.clone(), data.clone())
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        fn location(&self, path: &str) -> String {
            format!("mock://{}", path)
        }
    }

    /// Serves a fixed listing; raw files come from `raw_base`.
    struct MockRepository {
        entries: Vec<FileEntry>,
        raw_base: String,
    }

    #[async_trait]
    impl RepositorySource for MockRepository {
        async fn list_directory(&self, _folder_path: &str, _branch: &str) -> Result<Vec<FileEntry>> {
            Ok(self.entries.clone())
        }

        async fn fetch_file(&self, path: &str, _branch: &str) -> Result<Vec<u8>> {
            Err(EtlError::ProcessingError {
                message: format!("not served: {}", path),
            })
        }

        fn raw_base_url(&self, branch: &str) -> String {
            format!("{}/acme/licenses/refs/heads/{}", self.raw_base, branch)
        }
    }

    struct MockConfig {
        patterns_file: String,
        output_formats: Vec<String>,
    }

    impl ConfigProvider for MockConfig {
        fn folder_path(&self) -> &str {
            "apps"
        }

        fn branch(&self) -> &str {
            "main"
        }

        fn patterns_file(&self) -> &str {
            &self.patterns_file
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn download_dir(&self) -> Option<&str> {
            None
        }

        fn concurrent_requests(&self) -> usize {
            2
        }
    }

    fn file(path: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap().to_string(),
            kind: FileKind::File,
        }
    }

    fn patterns_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn pipeline(
        server: &MockServer,
        entries: Vec<FileEntry>,
        patterns: &NamedTempFile,
    ) -> ApplicationPipeline<MockStorage, MockRepository, MockConfig> {
        ApplicationPipeline::new(
            MockStorage::new(),
            MockRepository {
                entries,
                raw_base: server.base_url(),
            },
            MockConfig {
                patterns_file: patterns.path().to_str().unwrap().to_string(),
                output_formats: vec!["jsonl".to_string()],
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_extract_pairs_and_fetches_data() {
        let server = MockServer::start();
        let data_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/acme/licenses/refs/heads/main/apps/app1.json");
            then.status(200).body(r#"{"name":"X"}"#);
        });
        let patterns = patterns_file(r#"{"name": "$.name"}"#);

        let entries = vec![
            file("apps/app1.jpeg"),
            file("apps/app1.json"),
            file("apps/stray.json"),
            FileEntry {
                path: "apps/archive".to_string(),
                name: "archive".to_string(),
                kind: FileKind::Dir,
            },
        ];
        let records = pipeline(&server, entries, &patterns).extract().await.unwrap();

        data_mock.assert();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].application_id, "app1");
        assert_eq!(records[0].application_data.data, json!({"name": "X"}));
        assert_eq!(
            records[0].image_path,
            server.url("/acme/licenses/refs/heads/main/apps/app1.jpeg")
        );
    }

    #[tokio::test]
    async fn test_failed_data_fetch_degrades_to_null_fields() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/acme/licenses/refs/heads/main/apps/1.json");
            then.status(500);
        });
        let patterns = patterns_file(r#"{"name": "$.name"}"#);

        let pipeline = pipeline(&server, vec![file("apps/1.jpeg"), file("apps/1.json")], &patterns);
        let records = pipeline.extract().await.unwrap();
        assert_eq!(records[0].application_data.data, json!({}));

        let result = pipeline.transform(records).await.unwrap();
        assert_eq!(result.extracted[0].get("name"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_transform_and_load_write_flattened_report() {
        let server = MockServer::start();
        let patterns = patterns_file(r#"{"name": "$.name", "class": "$.license.class"}"#);
        let pipeline = pipeline(&server, Vec::new(), &patterns).with_evaluator(Box::new(
            RequiredFieldsEvaluator::new(vec!["name".to_string(), "class".to_string()]).unwrap(),
        ));

        let records = vec![ApplicationRecord {
            application_id: "app1".to_string(),
            application_data: ApplicationData {
                data: json!({"name": "X"}),
            },
            image_path: "https://raw.example.com/app1.jpeg".to_string(),
        }];

        let result = pipeline.transform(records).await.unwrap();
        assert_eq!(result.extracted[0].get("name"), Some(&json!("X")));

        let output = pipeline.load(result).await.unwrap();
        assert!(output.starts_with("mock://dataset_"));
        assert!(output.ends_with(".jsonl"));

        let (_, data) = pipeline.storage.only_file().await;
        let row: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(
            row,
            json!({
                "application_id": "app1",
                "image_path": "https://raw.example.com/app1.jpeg",
                "extracted_class": null,
                "extracted_name": "X",
                "eval_complete": false,
                "eval_missing_fields": ["class"],
                "eval_present_fields": 1,
                "eval_total_fields": 2
            })
        );
    }

    fn pipeline_with_patterns_file(
        patterns_file: &str,
    ) -> Result<ApplicationPipeline<MockStorage, MockRepository, MockConfig>> {
        ApplicationPipeline::new(
            MockStorage::new(),
            MockRepository {
                entries: Vec::new(),
                raw_base: "https://raw.example.com".to_string(),
            },
            MockConfig {
                patterns_file: patterns_file.to_string(),
                output_formats: vec!["jsonl".to_string()],
            },
        )
    }

    #[test]
    fn test_missing_patterns_file_fails_construction() {
        assert!(matches!(
            pipeline_with_patterns_file("/no/such/patterns.json"),
            Err(EtlError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_malformed_pattern_fails_construction() {
        let patterns = patterns_file(r#"{"name": "$.name["}"#);
        assert!(matches!(
            pipeline_with_patterns_file(patterns.path().to_str().unwrap()),
            Err(EtlError::PathExpressionError { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_listing_yields_no_records() {
        let server = MockServer::start();
        let patterns = patterns_file(r#"{"name": "$.name"}"#);
        let records = pipeline(&server, Vec::new(), &patterns).extract().await.unwrap();
        assert!(records.is_empty());
    }
}
