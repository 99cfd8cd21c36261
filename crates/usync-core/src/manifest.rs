use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the execution identifier of one logical sync attempt.
pub const HEADER_EXECUTION_ID: &str = "X-Execution-Id";

/// Opaque descriptor of the remote store's current state.
///
/// Fetched once per sync attempt and passed through unchanged to each
/// synchronizer; its absence at the call sites means "no remote data yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Remote session identifier
    pub session: String,
    /// Latest revision per resource wire name, when the store reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<HashMap<String, String>>,
}

/// Request metadata attached to every remote call of one logical attempt.
///
/// Always carries the execution id so retries and error telemetry can be
/// correlated across a single operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncHeaders {
    entries: HashMap<String, String>,
}

impl SyncHeaders {
    /// Create empty headers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create headers carrying the given execution id
    pub fn for_execution(execution_id: &str) -> Self {
        let mut headers = Self::new();
        headers.insert(HEADER_EXECUTION_ID, execution_id);
        headers
    }

    /// Mint a fresh execution id and the headers carrying it
    pub fn fresh() -> (String, Self) {
        let execution_id = Uuid::new_v4().to_string();
        let headers = Self::for_execution(&execution_id);
        (execution_id, headers)
    }

    /// The execution id these headers carry, if any
    pub fn execution_id(&self) -> Option<&str> {
        self.get(HEADER_EXECUTION_ID)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
