//! HTTP request engine: the single funnel every upstream call goes through.
//!
//! Order of gates per request: circuit breaker → response cache → rate
//! limiter → bounded retry loop. Terminal failures always surface as a typed
//! [`ClientError`], never as a silently swallowed condition.

use std::hash::{Hash, Hasher};
use std::time::Duration;

use log::{debug, warn};
use moka::future::Cache;
use once_cell::sync::OnceCell;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use rustc_hash::FxHasher;
use serde_json::Value;
use url::Url;

use crate::config::GoszakupSettings;

use super::circuit_breaker::CircuitBreaker;
use super::error::ClientError;
use super::rate_limiter::RateLimiter;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Signature of (method, URL, query pairs) used as the cache key.
fn request_signature(method: &Method, url: &Url, query: &[(String, String)]) -> u64 {
    let mut hasher = FxHasher::default();
    method.as_str().hash(&mut hasher);
    url.as_str().hash(&mut hasher);
    for (key, value) in query {
        key.hash(&mut hasher);
        value.hash(&mut hasher);
    }
    hasher.finish()
}

/// Rate-limited, circuit-broken, caching request engine.
///
/// The reqwest connection pool is acquired lazily on first use and shared by
/// all requests; dropping the engine releases it on every exit path.
pub struct RequestEngine {
    settings: GoszakupSettings,
    http: OnceCell<reqwest::Client>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    cache: Option<Cache<u64, Value>>,
}

impl RequestEngine {
    pub fn new(settings: GoszakupSettings) -> Self {
        let cache = (settings.cache_ttl_secs > 0).then(|| {
            Cache::builder()
                .max_capacity(1024)
                .time_to_live(Duration::from_secs(settings.cache_ttl_secs))
                .build()
        });

        Self {
            limiter: RateLimiter::new(settings.rate_limit),
            breaker: CircuitBreaker::new(
                settings.breaker_threshold,
                Duration::from_secs(settings.breaker_cooldown_secs),
            ),
            http: OnceCell::new(),
            cache,
            settings,
        }
    }

    fn http(&self) -> Result<&reqwest::Client, ClientError> {
        self.http.get_or_try_init(|| {
            let mut headers = HeaderMap::new();
            let bearer = HeaderValue::from_str(&format!("Bearer {}", self.settings.token))
                .map_err(|_| ClientError::Auth)?;
            headers.insert(AUTHORIZATION, bearer);
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
            headers.insert(
                USER_AGENT,
                HeaderValue::from_static(concat!("scanzakup/", env!("CARGO_PKG_VERSION"))),
            );

            reqwest::Client::builder()
                .timeout(Duration::from_secs(self.settings.timeout_secs))
                .default_headers(headers)
                .build()
                .map_err(ClientError::from)
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.settings.backoff_base_ms.saturating_mul(1 << attempt))
    }

    /// Issue one request with retries, returning the parsed JSON payload.
    ///
    /// Responses are cached only for GET; mutations always hit the network.
    pub async fn request(
        &self,
        method: Method,
        url: Url,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        self.breaker.check()?;

        let cacheable = method == Method::GET;
        let cache_key = request_signature(&method, &url, query);
        if cacheable {
            if let Some(cache) = &self.cache {
                if let Some(hit) = cache.get(&cache_key).await {
                    debug!("Cache hit for {}", url);
                    return Ok(hit);
                }
            }
        }

        self.limiter.acquire().await;

        let max_retries = self.settings.max_retries;
        let mut last_err = ClientError::Timeout { attempts: 0 };

        for attempt in 0..=max_retries {
            let mut request = self.http()?.request(method.clone(), url.clone());
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = if e.is_timeout() {
                        ClientError::Timeout {
                            attempts: attempt + 1,
                        }
                    } else {
                        ClientError::Transport {
                            attempts: attempt + 1,
                            message: e.to_string(),
                        }
                    };
                    if attempt < max_retries {
                        let wait = self.backoff(attempt);
                        warn!("Request to {} failed ({}), retrying in {:?}", url, e, wait);
                        tokio::time::sleep(wait).await;
                    }
                    continue;
                },
                Err(e) => {
                    self.breaker.record_failure();
                    return Err(e.into());
                },
            };

            let status = response.status();

            if status.is_success() {
                let payload = response.json::<Value>().await?;
                if cacheable {
                    if let Some(cache) = &self.cache {
                        cache.insert(cache_key, payload.clone()).await;
                    }
                }
                self.breaker.record_success();
                return Ok(payload);
            }

            if status == StatusCode::UNAUTHORIZED {
                return Err(ClientError::Auth);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                last_err = ClientError::RateLimit {
                    attempts: attempt + 1,
                    retry_after_secs: retry_after,
                };
                if attempt < max_retries {
                    warn!(
                        "Rate limited by {}, waiting {}s before retry",
                        url, retry_after
                    );
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                }
                continue;
            }

            if status.is_server_error() {
                let body_text = response.text().await.unwrap_or_default();
                last_err = ClientError::Server {
                    status: status.as_u16(),
                    attempts: attempt + 1,
                    body: body_text,
                };
                if attempt < max_retries {
                    let wait = self.backoff(attempt);
                    warn!(
                        "Server error {} from {}, retrying in {:?}",
                        status, url, wait
                    );
                    tokio::time::sleep(wait).await;
                }
                continue;
            }

            // Remaining 4xx responses are deterministic, fail fast.
            let body_text = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        if last_err.is_breaker_failure() {
            self.breaker.record_failure();
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method as http_method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_settings(max_retries: u32) -> GoszakupSettings {
        GoszakupSettings {
            token: "test-token".to_string(),
            base_url: "http://localhost".to_string(),
            graphql_url: "http://localhost/graphql".to_string(),
            rate_limit: 1000,
            timeout_secs: 5,
            max_retries,
            cache_ttl_secs: 0,
            breaker_threshold: 5,
            breaker_cooldown_secs: 60,
            backoff_base_ms: 5,
        }
    }

    fn url(server: &MockServer, endpoint: &str) -> Url {
        Url::parse(&format!("{}/{}", server.uri(), endpoint)).unwrap()
    }

    #[tokio::test]
    async fn retries_503_then_returns_payload() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [], "total": 0})))
            .mount(&server)
            .await;

        let engine = RequestEngine::new(test_settings(3));
        let payload = engine
            .request(Method::GET, url(&server, "trd_buy"), &[], None)
            .await
            .unwrap();

        assert_eq!(payload["total"], json!(0));
    }

    #[tokio::test]
    async fn raises_server_error_after_exhaustion() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .respond_with(ResponseTemplate::new(503).set_body_string("still down"))
            .expect(2)
            .mount(&server)
            .await;

        let engine = RequestEngine::new(test_settings(1));
        let err = engine
            .request(Method::GET, url(&server, "trd_buy"), &[], None)
            .await
            .unwrap_err();

        match err {
            ClientError::Server {
                status, attempts, ..
            } => {
                assert_eq!(status, 503);
                assert_eq!(attempts, 2);
            },
            other => panic!("expected Server, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn auth_error_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .expect(1)
            .mount(&server)
            .await;

        let engine = RequestEngine::new(test_settings(3));
        let err = engine
            .request(Method::GET, url(&server, "trd_buy"), &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Auth));
    }

    #[tokio::test]
    async fn honors_retry_after_on_429() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "0")
                    .set_body_string("slow down"),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let engine = RequestEngine::new(test_settings(2));
        let payload = engine
            .request(Method::GET, url(&server, "trd_buy"), &[], None)
            .await
            .unwrap();

        assert_eq!(payload["ok"], json!(true));
    }

    #[tokio::test]
    async fn rate_limit_error_after_exhaustion() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let engine = RequestEngine::new(test_settings(1));
        let err = engine
            .request(Method::GET, url(&server, "trd_buy"), &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::RateLimit { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn unexpected_4xx_fails_fast() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;

        let engine = RequestEngine::new(test_settings(3));
        let err = engine
            .request(Method::GET, url(&server, "nope"), &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Http { status: 404, .. }));
    }

    #[tokio::test]
    async fn cache_hit_skips_network() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1, 2], "total": 2})))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = test_settings(0);
        settings.cache_ttl_secs = 60;
        let engine = RequestEngine::new(settings);

        let first = engine
            .request(Method::GET, url(&server, "trd_buy"), &[], None)
            .await
            .unwrap();
        let second = engine
            .request(Method::GET, url(&server, "trd_buy"), &[], None)
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn different_queries_do_not_share_cache_entries() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 1})))
            .expect(2)
            .mount(&server)
            .await;

        let mut settings = test_settings(0);
        settings.cache_ttl_secs = 60;
        let engine = RequestEngine::new(settings);

        let q1 = vec![("year".to_string(), "2023".to_string())];
        let q2 = vec![("year".to_string(), "2024".to_string())];
        engine
            .request(Method::GET, url(&server, "trd_buy"), &q1, None)
            .await
            .unwrap();
        engine
            .request(Method::GET, url(&server, "trd_buy"), &q2, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn circuit_opens_after_repeated_failures() {
        let server = MockServer::start().await;

        // With max_retries = 0 every request is one terminal failure.
        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let mut settings = test_settings(0);
        settings.breaker_threshold = 3;
        let engine = RequestEngine::new(settings);

        for _ in 0..3 {
            let err = engine
                .request(Method::GET, url(&server, "trd_buy"), &[], None)
                .await
                .unwrap_err();
            assert!(matches!(err, ClientError::Server { .. }));
        }

        // Fourth call fails fast without reaching the server (expect(3)).
        let err = engine
            .request(Method::GET, url(&server, "trd_buy"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::CircuitOpen));
    }
}
