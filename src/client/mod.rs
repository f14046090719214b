//! Typed Goszakup API client.
//!
//! Exposes entity-specific fetchers over the paginated REST v2 endpoints and
//! a GraphQL v3 passthrough, all funneled through the shared
//! [`RequestEngine`] (rate limiter, circuit breaker, cache, retries).

mod circuit_breaker;
mod error;
mod filters;
mod http;
mod rate_limiter;

use chrono::Utc;
use log::info;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

use crate::config::GoszakupSettings;

pub use error::ClientError;
pub use filters::{ContractFilter, LotFilter, ParticipantFilter, TrdBuyFilter};
pub use http::RequestEngine;

/// Maximum page size allowed by the upstream API.
pub const PAGE_LIMIT: usize = 100;

/// API health probe result, consumed by the (out-of-scope) health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApiHealth {
    pub accessible: bool,
    pub total_records: u64,
    pub error: Option<String>,
    pub checked_at: chrono::DateTime<Utc>,
}

/// Client façade over the Goszakup procurement API.
///
/// Construct once per process and share: the connection pool, response
/// cache, rate limiter and circuit breaker all live inside this instance,
/// so every concurrent sync run contends for the same budget.
pub struct GoszakupClient {
    engine: RequestEngine,
    settings: GoszakupSettings,
}

impl GoszakupClient {
    pub fn new(settings: GoszakupSettings) -> Self {
        Self {
            engine: RequestEngine::new(settings.clone()),
            settings,
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, ClientError> {
        let mut base = self.settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Url::parse(&base)?.join(endpoint)?)
    }

    /// Drain a paginated collection endpoint into a complete list.
    ///
    /// Pages from 1 with the maximum limit; stops on an empty page, when the
    /// accumulated count reaches the server-reported total, or on a short
    /// page. The accumulated-count check keeps this resilient to total-count
    /// drift between pages.
    pub async fn fetch_all(
        &self,
        endpoint: &str,
        filters: Vec<(String, String)>,
    ) -> Result<Vec<Value>, ClientError> {
        let url = self.endpoint_url(endpoint)?;
        let mut all_items: Vec<Value> = Vec::new();
        let mut page: u64 = 1;

        loop {
            let mut query = filters.clone();
            query.push(("page".to_string(), page.to_string()));
            query.push(("limit".to_string(), PAGE_LIMIT.to_string()));

            let response = self
                .engine
                .request(Method::GET, url.clone(), &query, None)
                .await?;

            let items = response
                .get("items")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if items.is_empty() {
                break;
            }

            let page_len = items.len();
            all_items.extend(items);

            let total = response.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;
            if all_items.len() >= total || page_len < PAGE_LIMIT {
                break;
            }

            page += 1;
        }

        info!(
            "Fetched {} items from {} across {} page(s)",
            all_items.len(),
            endpoint,
            page
        );
        Ok(all_items)
    }

    /// Procurement announcements.
    pub async fn trd_buy(&self, filter: &TrdBuyFilter) -> Result<Vec<Value>, ClientError> {
        self.fetch_all("trd_buy", filter.to_query()).await
    }

    /// Lots, optionally scoped to a parent announcement.
    pub async fn lots(&self, filter: &LotFilter) -> Result<Vec<Value>, ClientError> {
        self.fetch_all("lot", filter.to_query()).await
    }

    pub async fn contracts(&self, filter: &ContractFilter) -> Result<Vec<Value>, ClientError> {
        self.fetch_all("contract", filter.to_query()).await
    }

    pub async fn participants(&self, filter: &ParticipantFilter) -> Result<Vec<Value>, ClientError> {
        self.fetch_all("participant", filter.to_query()).await
    }

    /// Execute a GraphQL query against the v3 endpoint.
    ///
    /// A response carrying an `errors` array is converted into a
    /// [`ClientError::Validation`] with all messages joined.
    pub async fn graphql(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<Value, ClientError> {
        let mut body = json!({ "query": query });
        if let Some(vars) = variables {
            body["variables"] = vars;
        }

        let url = Url::parse(&self.settings.graphql_url)?;
        let response = self.engine.request(Method::POST, url, &[], Some(&body)).await?;

        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .collect();
            return Err(ClientError::Validation(messages.join(", ")));
        }

        Ok(response.get("data").cloned().unwrap_or(Value::Null))
    }

    /// Probe the API with a one-item announcement request.
    pub async fn health_check(&self) -> ApiHealth {
        let probe = async {
            let url = self.endpoint_url("trd_buy")?;
            let query = vec![
                ("page".to_string(), "1".to_string()),
                ("limit".to_string(), "1".to_string()),
            ];
            self.engine.request(Method::GET, url, &query, None).await
        };

        match probe.await {
            Ok(response) => ApiHealth {
                accessible: true,
                total_records: response.get("total").and_then(Value::as_u64).unwrap_or(0),
                error: None,
                checked_at: Utc::now(),
            },
            Err(e) => ApiHealth {
                accessible: false,
                total_records: 0,
                error: Some(e.to_string()),
                checked_at: Utc::now(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method as http_method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> GoszakupClient {
        GoszakupClient::new(GoszakupSettings {
            token: "test-token".to_string(),
            base_url: server.uri(),
            graphql_url: format!("{}/graphql", server.uri()),
            rate_limit: 1000,
            timeout_secs: 5,
            max_retries: 0,
            cache_ttl_secs: 0,
            breaker_threshold: 5,
            breaker_cooldown_secs: 60,
            backoff_base_ms: 5,
        })
    }

    fn items(count: usize, offset: usize) -> Vec<Value> {
        (0..count)
            .map(|i| json!({"id": i + offset, "name_ru": format!("item {}", i + offset)}))
            .collect()
    }

    #[tokio::test]
    async fn fetch_all_drains_250_items_in_three_pages() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"items": items(100, 0), "total": 250})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"items": items(100, 100), "total": 250})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .and(query_param("page", "3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"items": items(50, 200), "total": 250})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let result = client.trd_buy(&TrdBuyFilter::default()).await.unwrap();

        assert_eq!(result.len(), 250);
        assert_eq!(result[0]["id"], json!(0));
        assert_eq!(result[249]["id"], json!(249));
        // No fourth page call: the page-3 mock is the last one registered
        // and each mock's expect(1) is verified on drop.
    }

    #[tokio::test]
    async fn fetch_all_stops_on_empty_first_page() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/participant"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [], "total": 0})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let result = client
            .participants(&ParticipantFilter::default())
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn fetch_all_survives_total_drift() {
        let server = MockServer::start().await;

        // Server reports total=500 but only ever has 80 items: the short
        // page must terminate the loop regardless of the reported total.
        Mock::given(http_method("GET"))
            .and(path("/lot"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"items": items(80, 0), "total": 500})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let result = client.lots(&LotFilter::default()).await.unwrap();
        assert_eq!(result.len(), 80);
    }

    #[tokio::test]
    async fn fetch_all_passes_entity_filters() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/contract"))
            .and(query_param("year", "2024"))
            .and(query_param("limit", "100"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"items": items(1, 0), "total": 1})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let result = client.contracts(&ContractFilter::for_year(2024)).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn graphql_returns_data_field() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({"query": "{ TrdBuy { id } }"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"TrdBuy": [{"id": 7}]}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let data = client.graphql("{ TrdBuy { id } }", None).await.unwrap();
        assert_eq!(data["TrdBuy"][0]["id"], json!(7));
    }

    #[tokio::test]
    async fn graphql_errors_become_validation_error() {
        let server = MockServer::start().await;

        Mock::given(http_method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [
                    {"message": "unknown field 'bogus'"},
                    {"message": "year must be an integer"}
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.graphql("{ bogus }", None).await.unwrap_err();

        match err {
            ClientError::Validation(msg) => {
                assert!(msg.contains("unknown field 'bogus'"));
                assert!(msg.contains("year must be an integer"));
            },
            other => panic!("expected Validation, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn health_check_reports_total() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .and(path("/trd_buy"))
            .and(query_param("limit", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"items": items(1, 0), "total": 12345})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let health = client.health_check().await;
        assert!(health.accessible);
        assert_eq!(health.total_records, 12345);
    }

    #[tokio::test]
    async fn health_check_survives_outage() {
        let server = MockServer::start().await;

        Mock::given(http_method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let health = client.health_check().await;
        assert!(!health.accessible);
        assert!(health.error.is_some());
    }
}
