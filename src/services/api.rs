use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::chat::{ChatRequest, ChatResponsePayload};
use crate::models::config::{ApiConfig, RequestTimeouts};
use crate::models::domains::{
    ActiveDatabase, BlockingSnapshot, ConfigSnapshot, CpuMetrics, DatabaseList, DatabasesSnapshot,
    DomainEnvelope, IndexSnapshot, IoSnapshot, MemoryMetrics, QuerySnapshot, QueryStoreSnapshot,
    SessionSummary, WaitStatsSnapshot,
};
use crate::models::metrics::{Anomaly, HealthCheck, MetricSnapshot};
use crate::models::recommendation::{Recommendation, TriggerAnalysisResponse};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API Error: {status} - {body}")]
    Http { status: u16, body: String },
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid payload from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    fn transport(endpoint: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ApiError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            ApiError::Transport {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }
}

/// Request/response contract of the monitoring backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn health(&self) -> Result<HealthCheck, ApiError>;
    async fn metrics_current(&self) -> Result<MetricSnapshot, ApiError>;
    async fn metrics_history(&self, count: u32) -> Result<Vec<MetricSnapshot>, ApiError>;
    async fn anomalies(&self) -> Result<Vec<Anomaly>, ApiError>;
    async fn latest_recommendation(&self) -> Result<Option<Recommendation>, ApiError>;
    async fn recommendation_history(&self, limit: u32) -> Result<Vec<Recommendation>, ApiError>;

    async fn cpu(&self) -> Result<DomainEnvelope<CpuMetrics>, ApiError>;
    async fn memory(&self) -> Result<DomainEnvelope<MemoryMetrics>, ApiError>;
    async fn waits(&self) -> Result<DomainEnvelope<WaitStatsSnapshot>, ApiError>;
    async fn sessions(&self) -> Result<DomainEnvelope<SessionSummary>, ApiError>;
    async fn blocking(&self) -> Result<DomainEnvelope<BlockingSnapshot>, ApiError>;
    async fn queries(&self) -> Result<DomainEnvelope<QuerySnapshot>, ApiError>;
    async fn io(&self) -> Result<DomainEnvelope<IoSnapshot>, ApiError>;
    async fn indexes(&self) -> Result<DomainEnvelope<IndexSnapshot>, ApiError>;
    async fn query_store(&self) -> Result<DomainEnvelope<QueryStoreSnapshot>, ApiError>;
    async fn databases(&self) -> Result<DomainEnvelope<DatabasesSnapshot>, ApiError>;
    async fn configuration(&self) -> Result<DomainEnvelope<ConfigSnapshot>, ApiError>;
    async fn active_database(&self) -> Result<ActiveDatabase, ApiError>;
    async fn database_list(&self) -> Result<DatabaseList, ApiError>;

    async fn trigger_analysis(&self) -> Result<TriggerAnalysisResponse, ApiError>;
    async fn refresh_all(&self) -> Result<(), ApiError>;
    async fn switch_database(&self, database: &str) -> Result<(), ApiError>;
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponsePayload, ApiError>;
    async fn clear_chat(&self, session_id: &str) -> Result<(), ApiError>;
}

/// `DashboardApi` over HTTP with a bounded timeout per request class.
pub struct HttpDashboardApi {
    client: Client,
    base_url: String,
    timeouts: RequestTimeouts,
}

impl HttpDashboardApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|source| ApiError::transport("client", source))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeouts: config.timeouts.clone(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn hot(&self) -> Duration {
        Duration::from_secs(self.timeouts.hot_read)
    }

    fn warm(&self) -> Duration {
        Duration::from_secs(self.timeouts.warm_read)
    }

    fn cold(&self) -> Duration {
        Duration::from_secs(self.timeouts.cold_read)
    }

    fn action(&self) -> Duration {
        Duration::from_secs(self.timeouts.action)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, timeout: Duration) -> Result<T, ApiError> {
        let request = self.client.get(self.url(endpoint));
        self.execute(request, endpoint, timeout).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let body = self.execute_raw(request, endpoint, timeout).await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    async fn execute_raw(
        &self,
        request: RequestBuilder,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<String, ApiError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| ApiError::transport(endpoint, source))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::transport(endpoint, source))?;

        if !status.is_success() {
            debug!(endpoint, status = status.as_u16(), "backend returned non-success status");
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn health(&self) -> Result<HealthCheck, ApiError> {
        self.get("/health", self.hot()).await
    }

    async fn metrics_current(&self) -> Result<MetricSnapshot, ApiError> {
        self.get("/metrics/current", self.hot()).await
    }

    async fn metrics_history(&self, count: u32) -> Result<Vec<MetricSnapshot>, ApiError> {
        let endpoint = "/metrics/history";
        let request = self
            .client
            .get(self.url(endpoint))
            .query(&[("count", count)]);
        self.execute(request, endpoint, self.warm()).await
    }

    async fn anomalies(&self) -> Result<Vec<Anomaly>, ApiError> {
        self.get("/anomalies", self.hot()).await
    }

    async fn latest_recommendation(&self) -> Result<Option<Recommendation>, ApiError> {
        self.get("/recommendations", self.warm()).await
    }

    async fn recommendation_history(&self, limit: u32) -> Result<Vec<Recommendation>, ApiError> {
        let endpoint = "/recommendations/history";
        let request = self
            .client
            .get(self.url(endpoint))
            .query(&[("limit", limit)]);
        self.execute(request, endpoint, self.warm()).await
    }

    async fn cpu(&self) -> Result<DomainEnvelope<CpuMetrics>, ApiError> {
        self.get("/server/cpu", self.hot()).await
    }

    async fn memory(&self) -> Result<DomainEnvelope<MemoryMetrics>, ApiError> {
        self.get("/server/memory", self.warm()).await
    }

    async fn waits(&self) -> Result<DomainEnvelope<WaitStatsSnapshot>, ApiError> {
        self.get("/server/waits", self.hot()).await
    }

    async fn sessions(&self) -> Result<DomainEnvelope<SessionSummary>, ApiError> {
        self.get("/workload/sessions", self.hot()).await
    }

    async fn blocking(&self) -> Result<DomainEnvelope<BlockingSnapshot>, ApiError> {
        self.get("/workload/blocking", self.hot()).await
    }

    async fn queries(&self) -> Result<DomainEnvelope<QuerySnapshot>, ApiError> {
        self.get("/workload/queries", self.hot()).await
    }

    async fn io(&self) -> Result<DomainEnvelope<IoSnapshot>, ApiError> {
        self.get("/io/files", self.warm()).await
    }

    async fn indexes(&self) -> Result<DomainEnvelope<IndexSnapshot>, ApiError> {
        self.get("/indexes/health", self.cold()).await
    }

    async fn query_store(&self) -> Result<DomainEnvelope<QueryStoreSnapshot>, ApiError> {
        self.get("/query-store/overview", self.cold()).await
    }

    async fn databases(&self) -> Result<DomainEnvelope<DatabasesSnapshot>, ApiError> {
        self.get("/databases/summary", self.cold()).await
    }

    async fn configuration(&self) -> Result<DomainEnvelope<ConfigSnapshot>, ApiError> {
        self.get("/configuration/audit", self.cold()).await
    }

    async fn active_database(&self) -> Result<ActiveDatabase, ApiError> {
        self.get("/admin/active-db", self.cold()).await
    }

    async fn database_list(&self) -> Result<DatabaseList, ApiError> {
        self.get("/admin/databases", self.cold()).await
    }

    async fn trigger_analysis(&self) -> Result<TriggerAnalysisResponse, ApiError> {
        let endpoint = "/trigger-analysis";
        let request = self.client.post(self.url(endpoint));
        self.execute(request, endpoint, self.action()).await
    }

    async fn refresh_all(&self) -> Result<(), ApiError> {
        let endpoint = "/admin/refresh-all";
        let request = self
            .client
            .post(self.url(endpoint))
            .json(&serde_json::json!({}));
        self.execute_raw(request, endpoint, self.action()).await.map(drop)
    }

    async fn switch_database(&self, database: &str) -> Result<(), ApiError> {
        let endpoint = "/admin/switch-db";
        let request = self
            .client
            .post(self.url(endpoint))
            .json(&serde_json::json!({ "database": database }));
        self.execute_raw(request, endpoint, self.action()).await.map(drop)
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponsePayload, ApiError> {
        let endpoint = "/chat/message";
        let builder = self.client.post(self.url(endpoint)).json(request);
        self.execute(builder, endpoint, Duration::from_secs(self.timeouts.chat))
            .await
    }

    async fn clear_chat(&self, session_id: &str) -> Result<(), ApiError> {
        let endpoint = "/chat/history";
        let request = self
            .client
            .delete(self.url(endpoint))
            .query(&[("session_id", session_id)]);
        self.execute_raw(request, endpoint, self.warm()).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn serve(router: Router) -> HttpDashboardApi {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = ApiConfig {
            base_url: format!("http://{addr}/"),
            ..ApiConfig::default()
        };
        HttpDashboardApi::new(&config).unwrap()
    }

    #[tokio::test]
    async fn decodes_domain_envelope() {
        let router = Router::new().route(
            "/server/cpu",
            get(|| async {
                Json(json!({
                    "current": {"timestamp": "2024-05-01T10:00:05Z", "sql_cpu_percent": 42.5},
                    "history": [
                        {"timestamp": "2024-05-01T10:00:00Z", "sql_cpu_percent": 40.0},
                        {"timestamp": "2024-05-01T10:00:05Z", "sql_cpu_percent": 42.5}
                    ]
                }))
            }),
        );
        let api = serve(router).await;

        let envelope = api.cpu().await.unwrap();
        assert_eq!(envelope.current.unwrap().sql_cpu_percent, 42.5);
        assert_eq!(envelope.history.len(), 2);
    }

    #[tokio::test]
    async fn non_success_status_carries_body_text() {
        let router = Router::new().route(
            "/anomalies",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "collector offline") }),
        );
        let api = serve(router).await;

        match api.anomalies().await {
            Err(ApiError::Http { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "collector offline");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_payload_is_a_decode_error() {
        let router = Router::new().route("/health", get(|| async { "not json" }));
        let api = serve(router).await;

        assert!(matches!(api.health().await, Err(ApiError::Decode { .. })));
    }

    #[tokio::test]
    async fn switch_database_posts_name() {
        let router = Router::new().route(
            "/admin/switch-db",
            post(|Json(body): Json<Value>| async move {
                if body["database"] == "AdventureWorks2025" {
                    (StatusCode::OK, Json(json!({"status": "ok"})))
                } else {
                    (StatusCode::BAD_REQUEST, Json(json!({"detail": "unknown"})))
                }
            }),
        );
        let api = serve(router).await;

        api.switch_database("AdventureWorks2025").await.unwrap();
        assert!(api.switch_database("missing").await.is_err());
    }

    #[tokio::test]
    async fn clear_chat_sends_session_query() {
        let router = Router::new().route(
            "/chat/history",
            delete(|Query(params): Query<HashMap<String, String>>| async move {
                if params.get("session_id").map(String::as_str) == Some("tab-7") {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                }
            }),
        );
        let api = serve(router).await;

        api.clear_chat("tab-7").await.unwrap();
        assert!(matches!(
            api.clear_chat("other").await,
            Err(ApiError::Http { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let config = ApiConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..ApiConfig::default()
        };
        let api = HttpDashboardApi::new(&config).unwrap();

        assert!(matches!(
            api.health().await,
            Err(ApiError::Transport { .. } | ApiError::Timeout { .. })
        ));
    }
}
