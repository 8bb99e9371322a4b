use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::poller::SnapshotSource;
use crate::types::{Snapshot, TeamLine};
use crate::CIX_API_PATH;

/// Message used when the API answers with something that is not an envelope.
pub const DECODE_ERROR: &str = "could not decode response";

/// Message used when the API reports failure without saying why.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// A failed market-data request. Transient: the poll loop logs it and
/// tries again next cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The response body was not a decodable envelope.
    #[error("could not decode response")]
    Decode,
    /// The API answered `success: false`.
    #[error("{}", .0.join("; "))]
    Api(Vec<String>),
    /// The request never produced a response body.
    #[error("request failed: {0}")]
    Transport(String),
}

impl FetchError {
    /// Human-readable error strings; never empty.
    pub fn messages(&self) -> Vec<String> {
        match self {
            FetchError::Decode => vec![DECODE_ERROR.to_string()],
            FetchError::Api(errors) => errors.clone(),
            FetchError::Transport(msg) => vec![msg.clone()],
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    errors: Value,
}

/// Unwrap a `{success, result, errors}` envelope into its `result`.
pub fn decode_envelope(body: &str) -> Result<Value, FetchError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|_| FetchError::Decode)?;

    if !envelope.success {
        let mut errors: Vec<String> = match envelope.errors {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Value::String(s) => vec![s],
            _ => Vec::new(),
        };
        if errors.is_empty() {
            errors.push(UNKNOWN_ERROR.to_string());
        }
        return Err(FetchError::Api(errors));
    }

    Ok(envelope.result)
}

/// Decode the `result` of a `market_data` call into a snapshot.
pub fn decode_market_data(result: Value) -> Result<Snapshot, FetchError> {
    let lines: HashMap<String, TeamLine> =
        serde_json::from_value(result).map_err(|_| FetchError::Decode)?;
    Ok(Snapshot::new(lines))
}

/// Client for the CIX NCAA API. Every call is a form POST carrying the
/// account's `apid`.
pub struct CixClient {
    http: reqwest::Client,
    root: Url,
    apid: String,
}

impl CixClient {
    pub fn new(host: &Url, apid: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let root = host.join(&format!("{CIX_API_PATH}/"))?;
        Ok(Self {
            http,
            root,
            apid: apid.into(),
        })
    }

    async fn call(&self, path: &str, params: &[(&str, String)]) -> Result<Value, FetchError> {
        let url = self
            .root
            .join(path)
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let mut form: Vec<(&str, String)> = params.to_vec();
        form.push(("apid", self.apid.clone()));

        let response = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        decode_envelope(&body)
    }

    /// Current bid/ask lines for every team.
    pub async fn all_market_data(&self) -> Result<Snapshot, FetchError> {
        let result = self.call("market_data", &[]).await?;
        let snapshot = decode_market_data(result)?;
        debug!("Fetched market data for {} teams", snapshot.len());
        Ok(snapshot)
    }

    /// Order book for one team, returned as the raw `result` payload.
    pub async fn get_book(&self, team: &str, depth: Option<u32>) -> Result<Value, FetchError> {
        let mut params = vec![("team", team.to_string())];
        if let Some(depth) = depth {
            params.push(("depth", depth.to_string()));
        }
        self.call("get_book", &params).await
    }
}

#[async_trait]
impl SnapshotSource for CixClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError> {
        self.all_market_data().await
    }
}
