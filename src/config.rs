//! Client configuration, from serde or the `VDB_*` environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::Ceilings;
use crate::enrich::MergeStrategy;
use crate::error::{Error, Result};
use crate::types::ReadConsistency;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address, e.g. "http://10.0.0.1:80"
    pub url: String,
    /// Account name sent in the authorization header
    pub username: String,
    /// API key sent in the authorization header
    pub api_key: Option<String>,
    /// Timeout applied to each transport call, not to a whole split sequence
    pub timeout_secs: u64,
    /// Read consistency for queries and searches
    pub read_consistency: ReadConsistency,
    /// Encode/decode limit for one gRPC message
    pub max_message_bytes: usize,
    /// How slim-pass scores are paired with rehydrated records
    pub merge_strategy: MergeStrategy,
    /// Default split ceilings used before anything is learned
    pub ceilings: Ceilings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:80".to_string(),
            username: "root".to_string(),
            api_key: None,
            timeout_secs: 10,
            read_consistency: ReadConsistency::default(),
            max_message_bytes: 100 * 1024 * 1024,
            merge_strategy: MergeStrategy::default(),
            ceilings: Ceilings::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("VDB_URL") {
            config.url = url;
        }
        if let Ok(user) = std::env::var("VDB_USERNAME") {
            config.username = user;
        }
        if let Ok(key) = std::env::var("VDB_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("VDB_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("VDB_READ_CONSISTENCY") {
            if let Some(rc) = ReadConsistency::parse(&val) {
                config.read_consistency = rc;
            }
        }
        if let Ok(val) = std::env::var("VDB_MAX_MESSAGE_BYTES") {
            if let Ok(v) = val.parse() {
                config.max_message_bytes = v;
            }
        }
        if let Ok(val) = std::env::var("VDB_MERGE_STRATEGY") {
            match val.as_str() {
                "positional" => config.merge_strategy = MergeStrategy::Positional,
                "by_id" => config.merge_strategy = MergeStrategy::ById,
                _ => {}
            }
        }

        config
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Endpoint URI with an explicit port and scheme.
    pub fn endpoint(&self) -> Result<String> {
        let (scheme, rest) = match self.url.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => ("http", self.url.as_str()),
        };
        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            return Err(Error::Config(format!("invalid url: {:?}", self.url)));
        }
        if rest.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok()) {
            Ok(format!("{scheme}://{rest}"))
        } else {
            Ok(format!("{scheme}://{rest}:80"))
        }
    }

    /// Value of the `authorization` metadata entry.
    pub fn authorization(&self) -> Result<String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("api key is not set".to_string()))?;
        Ok(format!("Bearer account={}&api_key={}", self.username, key))
    }
}
