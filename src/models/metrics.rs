use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Backend health as reported by `/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    #[serde(default)]
    pub poller_running: bool,
}

/// Point-in-time overview of the monitored instance, keyed by `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub active_sessions_count: u32,
    #[serde(default)]
    pub blocking_chains: Vec<BlockingSession>,
    #[serde(default)]
    pub top_wait_stats: Vec<WaitStatSummary>,
    #[serde(default)]
    pub expensive_queries: Vec<QueryStat>,
    #[serde(default)]
    pub index_health: Vec<IndexHealth>,
    #[serde(default)]
    pub missing_indexes: Vec<MissingIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingSession {
    pub session_id: i64,
    pub blocking_session_id: i64,
    pub wait_type: Option<String>,
    #[serde(default)]
    pub wait_time_ms: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub command: String,
    pub sql_text: Option<String>,
    pub database_name: Option<String>,
    pub host_name: Option<String>,
    pub program_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitStatSummary {
    pub wait_type: String,
    #[serde(default)]
    pub waiting_tasks_count: i64,
    #[serde(default)]
    pub wait_time_ms: i64,
    #[serde(default)]
    pub max_wait_time_ms: i64,
    #[serde(default)]
    pub signal_wait_time_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStat {
    pub query_hash: String,
    #[serde(default)]
    pub execution_count: i64,
    #[serde(default)]
    pub total_worker_time: i64,
    #[serde(default)]
    pub total_logical_reads: i64,
    #[serde(default)]
    pub total_elapsed_time: i64,
    #[serde(default)]
    pub sql_text: String,
    pub database_name: Option<String>,
    pub query_plan: Option<String>,
    #[serde(default)]
    pub has_table_scan: bool,
    #[serde(default)]
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHealth {
    pub database_name: Option<String>,
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
    pub index_name: Option<String>,
    #[serde(default)]
    pub avg_fragmentation_percent: f64,
    #[serde(default)]
    pub page_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingIndex {
    pub database_name: Option<String>,
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
    pub equality_columns: Option<String>,
    pub inequality_columns: Option<String>,
    pub included_columns: Option<String>,
    #[serde(default)]
    pub user_seeks: i64,
    #[serde(default)]
    pub user_scans: i64,
    #[serde(default)]
    pub avg_total_user_cost: f64,
    #[serde(default)]
    pub avg_user_impact: f64,
}

/// Anomaly emitted by the backend detector. Never mutated client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnomalyType,
    pub severity: AnomalySeverity,
    pub root_resource: String,
    #[serde(default)]
    pub context_data: HashMap<String, serde_json::Value>,
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    Blocking,
    HighCpu,
    HighMemory,
    MissingIndex,
    LongRunningQuery,
    HighWaits,
    IndexFragmentation,
    ParameterSniffing,
    PredictedRegression,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalySeverity {
    Info,
    Warning,
    Critical,
}

impl AnomalySeverity {
    /// Sort weight: CRITICAL=3, WARNING=2, INFO=1.
    pub fn weight(self) -> u8 {
        match self {
            AnomalySeverity::Info => 1,
            AnomalySeverity::Warning => 2,
            AnomalySeverity::Critical => 3,
        }
    }
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalySeverity::Info => write!(f, "INFO"),
            AnomalySeverity::Warning => write!(f, "WARNING"),
            AnomalySeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
