use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;

/// Loads JSON documents from local paths or http(s) URLs.
///
/// `read` never fails: problems are logged and the caller gets an empty object.
#[derive(Debug, Clone)]
pub struct JsonSourceReader {
    client: Client,
    timeout: Option<Duration>,
}

impl Default for JsonSourceReader {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl JsonSourceReader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn read(&self, source: &str) -> Value {
        match self.try_read(source).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Could not load JSON from {}: {}", source, e);
                Value::Object(Map::new())
            }
        }
    }

    pub async fn try_read(&self, source: &str) -> Result<Value> {
        if is_remote(source) {
            self.read_url(source).await
        } else {
            read_file(source).await
        }
    }

    async fn read_url(&self, url: &str) -> Result<Value> {
        tracing::debug!("Fetching JSON from {}", url);
        let mut request = self.client.get(url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| EtlError::FetchError {
            source_name: url.to_string(),
            message: e.to_string(),
        })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(EtlError::HttpStatusError {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| EtlError::FetchError {
            source_name: url.to_string(),
            message: e.to_string(),
        })?;
        parse(url, &body)
    }
}

fn is_remote(source: &str) -> bool {
    url::Url::parse(source)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

async fn read_file(path: &str) -> Result<Value> {
    let bytes = tokio::fs::read(path).await?;
    parse(path, &bytes)
}

fn parse(source_name: &str, bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).map_err(|e| EtlError::ParseError {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}
