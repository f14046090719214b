use thiserror::Error;

/// Typed error taxonomy for the Goszakup client.
///
/// Callers (the sync orchestrator, the health probe) branch on these kinds:
/// `Auth` and `Validation` are deterministic and never retried, `RateLimit`
/// may be reattempted by a later task run, `CircuitOpen` means back off
/// entirely instead of retrying immediately.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid or expired API token")]
    Auth,

    #[error("rate limit exceeded after {attempts} attempts (retry after {retry_after_secs}s)")]
    RateLimit { attempts: u32, retry_after_secs: u64 },

    #[error("request timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("server error {status} after {attempts} attempts: {body}")]
    Server {
        status: u16,
        attempts: u32,
        body: String,
    },

    #[error("graphql validation failed: {0}")]
    Validation(String),

    #[error("circuit breaker is open, requests blocked")]
    CircuitOpen,

    #[error("unexpected HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error after {attempts} attempts: {message}")]
    Transport { attempts: u32, message: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Whether this terminal failure counts against the circuit breaker.
    ///
    /// Only exhausted-transient conditions do: persistent 5xx, timeouts and
    /// transport faults. Auth, validation and plain 4xx responses mean the
    /// upstream is alive and answering.
    pub fn is_breaker_failure(&self) -> bool {
        matches!(
            self,
            ClientError::Timeout { .. }
                | ClientError::Server { .. }
                | ClientError::Transport { .. }
        )
    }
}
