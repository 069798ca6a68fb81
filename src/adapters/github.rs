use crate::domain::model::FileEntry;
use crate::domain::ports::RepositorySource;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_RAW_BASE_URL: &str = "https://raw.githubusercontent.com";
pub const TOKEN_ENV: &str = "GIT_TOKEN";
pub const LEGACY_TOKEN_ENV: &str = "GITHUB_TOKEN";

const USER_AGENT: &str = concat!("application-etl/", env!("CARGO_PKG_VERSION"));

/// `owner/name` reference to a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Accepts `owner/name` or a repository URL such as `https://github.com/owner/name.git`.
    pub fn parse(identifier: &str) -> Result<Self> {
        let trimmed = identifier.trim().trim_end_matches('/');
        let path = match url::Url::parse(trimmed) {
            Ok(url) => url.path().trim_matches('/').to_string(),
            Err(_) => trimmed.to_string(),
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(EtlError::InvalidConfigValueError {
                field: "source.repository".to_string(),
                value: identifier.to_string(),
                reason: "Expected 'owner/name' or a repository URL".to_string(),
            });
        }

        let owner = segments[segments.len() - 2];
        let name = segments[segments.len() - 1].trim_end_matches(".git");
        if name.is_empty() {
            return Err(EtlError::InvalidConfigValueError {
                field: "source.repository".to_string(),
                value: identifier.to_string(),
                reason: "Repository name is empty".to_string(),
            });
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Response shape of the contents endpoint for a single file.
#[derive(Debug, Deserialize)]
struct FileContents {
    content: Option<String>,
    encoding: Option<String>,
    download_url: Option<String>,
}

/// First non-blank token among `token_env`, `GIT_TOKEN` and `GITHUB_TOKEN`.
pub fn resolve_token<F>(token_env: Option<&str>, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    token_env
        .into_iter()
        .chain([TOKEN_ENV, LEGACY_TOKEN_ENV])
        .find_map(|var| lookup(var).filter(|t| !t.trim().is_empty()))
}

/// Repository access through the GitHub REST contents API.
#[derive(Debug, Clone)]
pub struct GitHubRepository {
    client: Client,
    repo: RepoRef,
    api_base_url: String,
    raw_base_url: String,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl GitHubRepository {
    pub fn new(repo: RepoRef) -> Self {
        Self {
            client: Client::new(),
            repo,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            raw_base_url: DEFAULT_RAW_BASE_URL.to_string(),
            token: None,
            timeout: None,
        }
    }

    /// Builds a client for `identifier`, taking the token from `token_env`,
    /// then `GIT_TOKEN`, then `GITHUB_TOKEN`.
    pub fn from_env(identifier: &str, token_env: Option<&str>) -> Result<Self> {
        let repo = RepoRef::parse(identifier)?;
        let token = resolve_token(token_env, |var| std::env::var(var).ok());

        if token.is_none() {
            tracing::warn!(
                "No {} set; requests to {} will be unauthenticated",
                TOKEN_ENV,
                repo.full_name()
            );
        }

        Ok(Self::new(repo).with_token(token))
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_raw_base_url(mut self, url: impl Into<String>) -> Self {
        self.raw_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base_url,
            self.repo.owner,
            self.repo.name,
            path.trim_matches('/')
        )
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        request
    }

    async fn get_contents(&self, path: &str, branch: &str) -> Result<Value> {
        let url = self.contents_url(path);
        tracing::debug!("GET {} (ref={})", url, branch);

        let response = self
            .request(&url)
            .query(&[("ref", branch)])
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::HttpStatusError {
                url,
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    async fn get_raw(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!("GET {} (raw)", url);

        let response = self.request(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::HttpStatusError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl RepositorySource for GitHubRepository {
    async fn list_directory(&self, folder_path: &str, branch: &str) -> Result<Vec<FileEntry>> {
        let contents = self.get_contents(folder_path, branch).await?;

        // A file path answers with a single object instead of an array.
        let entries = match contents {
            Value::Array(_) => serde_json::from_value::<Vec<FileEntry>>(contents)?,
            Value::Object(_) => vec![serde_json::from_value::<FileEntry>(contents)?],
            other => {
                return Err(EtlError::ParseError {
                    source_name: self.contents_url(folder_path),
                    message: format!("unexpected listing payload: {}", other),
                })
            }
        };

        tracing::debug!(
            "Listed {} entries under {}:{}",
            entries.len(),
            self.repo.full_name(),
            folder_path
        );
        Ok(entries)
    }

    async fn fetch_file(&self, path: &str, branch: &str) -> Result<Vec<u8>> {
        let contents: FileContents = serde_json::from_value(self.get_contents(path, branch).await?)?;

        let content = contents.content.filter(|c| !c.trim().is_empty());

        match (content, contents.encoding.as_deref()) {
            (Some(content), Some("base64") | None) => {
                let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
                Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
            }
            // Files over 1 MB come back with encoding "none" and no inline content.
            (None, Some("base64") | Some("none") | None) => {
                let url = contents.download_url.unwrap_or_else(|| {
                    format!("{}/{}", self.raw_base_url(branch), path.trim_matches('/'))
                });
                self.get_raw(&url).await
            }
            (_, Some(encoding)) => Err(EtlError::ProcessingError {
                message: format!("Unsupported content encoding '{}' for {}", encoding, path),
            }),
        }
    }

    fn raw_base_url(&self, branch: &str) -> String {
        format!(
            "{}/{}/{}/refs/heads/{}",
            self.raw_base_url, self.repo.owner, self.repo.name, branch
        )
    }
}
