use crate::config::types::CollectorConfig;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REPORT_ID_HEADER: &str = "X-HsReport-Id";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("error communicating to collector: {0}")]
    Http(#[from] reqwest::Error),

    #[error("error communicating to collector: {0}")]
    Transport(String),

    #[error("error decoding collector JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed collector response: {0}")]
    Malformed(String),

    #[error("collector error: {0}")]
    Server(String),
}

impl UploadError {
    /// Whether the exchange failed before a response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, UploadError::Http(_) | UploadError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;

/// Logging configuration requested by the collector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(rename = "Categories")]
    pub categories: Vec<String>,
    #[serde(rename = "ExistingData", default)]
    pub existing_data_requested: bool,
}

#[derive(Debug, Deserialize)]
struct ConfigResponse {
    #[serde(rename = "Categories")]
    categories: Option<Vec<String>>,
    #[serde(rename = "ExistingData", default)]
    existing_data: bool,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

/// Decode the GET response body.
pub fn parse_server_config(body: &[u8]) -> Result<ServerConfig> {
    let response: ConfigResponse = serde_json::from_slice(body)?;

    if let Some(error) = response.error.filter(|e| !e.is_empty()) {
        return Err(UploadError::Server(error));
    }
    let categories = response
        .categories
        .ok_or_else(|| UploadError::Malformed("missing Categories".to_string()))?;

    Ok(ServerConfig {
        categories,
        existing_data_requested: response.existing_data,
    })
}

/// The two collector exchanges. `report_id` is the `X-HsReport-Id` value.
#[async_trait]
pub trait CollectorTransport: Send + Sync {
    /// GET the configuration and return the raw body.
    async fn get_config(&self, report_id: &str) -> Result<Vec<u8>>;

    /// POST one batch of concatenated records.
    async fn post_batch(&self, report_id: &str, body: Vec<u8>) -> Result<()>;
}

/// HTTP client for the collector endpoint
#[derive(Debug)]
pub struct HttpCollector {
    url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl HttpCollector {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            url: config.url.clone(),
            auth_header: format!("Token {}", config.token),
            client: builder.build()?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CollectorTransport for HttpCollector {
    async fn get_config(&self, report_id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(REPORT_ID_HEADER, report_id)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                "Collector config request returned error status"
            );
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn post_batch(&self, report_id: &str, body: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(REPORT_ID_HEADER, report_id)
            .body(body)
            .send()
            .await?;

        // Any completed exchange counts as delivered.
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Collector rejected batch");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_server_config() {
        let config =
            parse_server_config(br#"{"Categories": ["Power", "Zone"], "ExistingData": true}"#)
                .unwrap();
        assert_eq!(config.categories, vec!["Power", "Zone"]);
        assert!(config.existing_data_requested);
    }

    #[test]
    fn test_parse_server_config_defaults_existing_data() {
        let config = parse_server_config(br#"{"Categories": [], "Error": ""}"#).unwrap();
        assert!(config.categories.is_empty());
        assert!(!config.existing_data_requested);
    }

    #[test]
    fn test_parse_server_config_reports_server_error() {
        let err = parse_server_config(br#"{"Categories": [], "Error": "bad token"}"#).unwrap_err();
        assert!(matches!(err, UploadError::Server(ref m) if m == "bad token"));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_parse_server_config_rejects_malformed() {
        assert!(matches!(
            parse_server_config(b"<html>"),
            Err(UploadError::Json(_))
        ));
        assert!(matches!(
            parse_server_config(br#"{"Error": ""}"#),
            Err(UploadError::Malformed(_))
        ));
    }

    #[test]
    fn test_client_keeps_url_and_token() {
        let config = CollectorConfig {
            url: "http://localhost:7105/hsreporter.json".to_string(),
            token: "secret".to_string(),
            retry_attempts: 3,
            retry_interval: Duration::from_secs(1),
            timeout: Some(Duration::from_secs(30)),
        };

        let client = HttpCollector::new(&config).unwrap();
        assert_eq!(client.url(), "http://localhost:7105/hsreporter.json");
        assert_eq!(client.auth_header, "Token secret");
    }
}
