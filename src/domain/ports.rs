use crate::domain::model::{ApplicationRecord, ExtractedRecord, FileEntry, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Location a relative path resolves to, for reporting.
    fn location(&self, path: &str) -> String;
}

/// Read-only access to one repository on a source-hosting service.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Immediate (non-recursive) contents of `folder_path` at `branch`.
    async fn list_directory(&self, folder_path: &str, branch: &str) -> Result<Vec<FileEntry>>;

    /// Raw bytes of the file at `path` on `branch`.
    async fn fetch_file(&self, path: &str, branch: &str) -> Result<Vec<u8>>;

    /// Base URL under which `{base}/{path}` serves the raw file content of `branch`.
    fn raw_base_url(&self, branch: &str) -> String;
}

pub trait ConfigProvider: Send + Sync {
    fn folder_path(&self) -> &str;
    fn branch(&self) -> &str;
    fn patterns_file(&self) -> &str;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn download_dir(&self) -> Option<&str>;
    fn concurrent_requests(&self) -> usize;
}

/// Produces the evaluation attached to an extracted record, if any.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, record: &ExtractedRecord) -> Option<Value>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<ApplicationRecord>>;
    async fn transform(&self, data: Vec<ApplicationRecord>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
