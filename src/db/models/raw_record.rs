use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Processing status of an archived raw response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawStatus {
    Pending,
    Success,
    Error,
    Skipped,
}

impl RawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawStatus::Pending => "pending",
            RawStatus::Success => "success",
            RawStatus::Error => "error",
            RawStatus::Skipped => "skipped",
        }
    }
}

/// Verbatim archive of one API response, written before any transformation.
///
/// Retained indefinitely for audit and replay (the daily cleanup job trims
/// by age). The content hash deduplicates identical response bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRawRecord {
    pub endpoint: String,
    pub query_params: Value,
    pub response_body: Value,
    pub status_code: i32,
    pub requested_at: DateTime<Utc>,
    pub year: Option<i32>,
    pub content_hash: String,
}

impl NewRawRecord {
    pub fn new(
        endpoint: &str,
        query_params: Value,
        response_body: Value,
        year: Option<i32>,
        requested_at: DateTime<Utc>,
    ) -> Self {
        let content_hash = content_hash(&response_body);
        Self {
            endpoint: endpoint.to_string(),
            query_params,
            response_body,
            status_code: 200,
            requested_at,
            year,
            content_hash,
        }
    }
}

/// SHA-256 hex digest of a JSON body's canonical serialization.
pub fn content_hash(body: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
