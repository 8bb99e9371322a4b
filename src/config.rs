use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::CIX_HOST;

/// Default polling interval in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Default ceiling for the fetch-failure backoff, in seconds.
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 600;

/// Startup configuration errors. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("no {field} configured")]
    MissingField { field: &'static str },

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// The config file as written. Every field is optional here so missing
/// keys can be reported by name.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    webhook_url: Option<String>,
    apid: Option<String>,
    #[serde(default)]
    game_id: Value,
    #[serde(default)]
    refresh_interval: Value,
    host: Option<String>,
    #[serde(default)]
    max_backoff: Value,
}

/// Validated, immutable application config.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat webhook that receives `{"text": ...}` posts.
    pub webhook_url: Url,
    /// Opaque account identifier sent with every API call.
    pub apid: String,
    /// Game whose team pages notifications link to.
    pub game_id: String,
    pub refresh_interval: Duration,
    /// API and team-page host.
    pub host: Url,
    /// Upper bound for the sleep after repeated fetch failures.
    pub max_backoff: Duration,
}

impl Config {
    /// Load and validate config from the given JSON file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Validate config from JSON text.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(contents).map_err(ConfigError::Parse)?;

        let webhook_url = raw
            .webhook_url
            .ok_or(ConfigError::MissingField { field: "webhook url" })
            .and_then(|url| parse_url("webhook url", &url))?;
        let apid = raw.apid.ok_or(ConfigError::MissingField { field: "apid" })?;
        let game_id = match raw.game_id {
            Value::Null => return Err(ConfigError::MissingField { field: "game id" }),
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "game id",
                    reason: format!("expected string, got {other}"),
                });
            }
        };
        let refresh_interval = positive_secs(
            "refresh interval",
            &raw.refresh_interval,
            DEFAULT_REFRESH_INTERVAL_SECS,
        )?;
        let max_backoff = positive_secs("max backoff", &raw.max_backoff, DEFAULT_MAX_BACKOFF_SECS)?;
        let host = parse_url("host", raw.host.as_deref().unwrap_or(CIX_HOST))?;

        Ok(Self {
            webhook_url,
            apid,
            game_id,
            refresh_interval: Duration::from_secs(refresh_interval),
            host,
            max_backoff: Duration::from_secs(max_backoff),
        })
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: format!("{value:?}: {e}"),
    })
}

/// Whole seconds, given as an integer or a string holding one. Absent or
/// `null` takes the default.
fn positive_secs(field: &'static str, value: &Value, default: u64) -> Result<u64, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue { field, reason };

    let secs: i64 = match value {
        Value::Null => return Ok(default),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| invalid(format!("{n} is not an integer")))?,
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| invalid(format!("{s:?} is not an integer")))?,
        other => return Err(invalid(format!("{other} is not an integer"))),
    };

    if secs <= 0 {
        return Err(invalid(format!("{secs} is not positive")));
    }
    Ok(secs as u64)
}
