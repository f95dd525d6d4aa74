pub(crate) mod endpoints;

use http::StatusCode;
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info};

pub const BASE_URL: &str = "https://integra.ons.org.br/api/energiaagora/Get";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("rate limited by the ONS API")]
    RateLimited,
    #[error("endpoint not found: {0}")]
    NotFound(String),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

/// Anything that can hand back the raw records of an endpoint
pub trait PayloadSource {
    fn fetch(&self, endpoint: &str) -> impl Future<Output = Result<Vec<Value>, FetchError>> + Send;
}

pub struct OnsClient {
    client: Client,
    base_url: String,
}

impl OnsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_and_parse(&self, endpoint: &str) -> Result<Vec<Value>, FetchError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        info!("Requesting ONS data from: {}", url);

        let response = self
            .client
            .get(&url)
            .header(http::header::ACCEPT, "application/json")
            .send()
            .await?;

        if let Some(err) = classify_status(response.status(), endpoint) {
            return Err(err);
        }

        let body = response.text().await?;
        let records = records_from_json(&body)?;
        debug!("{} returned {} records", endpoint, records.len());

        Ok(records)
    }
}

impl PayloadSource for OnsClient {
    async fn fetch(&self, endpoint: &str) -> Result<Vec<Value>, FetchError> {
        self.fetch_and_parse(endpoint).await
    }
}

/// Map a non-success status onto the transport error taxonomy
fn classify_status(status: StatusCode, endpoint: &str) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    Some(match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        StatusCode::NOT_FOUND => FetchError::NotFound(endpoint.to_string()),
        other => FetchError::Status(other),
    })
}

/// Some endpoints answer with a single object instead of a list
fn records_from_json(body: &str) -> Result<Vec<Value>, FetchError> {
    Ok(match serde_json::from_str::<Value>(body)? {
        Value::Array(records) => records,
        Value::Null => Vec::new(),
        single => vec![single],
    })
}
