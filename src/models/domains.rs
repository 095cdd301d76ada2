//! Per-domain snapshots served by the observability endpoints. Every
//! snapshot carries the collector `timestamp` used as its identity key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{current, history}` shape shared by the domain endpoints. A missing
/// `current` means the collector has not produced a sample yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEnvelope<T> {
    #[serde(default = "Option::default")]
    pub current: Option<T>,
    #[serde(default = "Vec::new")]
    pub history: Vec<T>,
}

impl<T> DomainEnvelope<T> {
    pub fn new(current: Option<T>, history: Vec<T>) -> Self {
        Self { current, history }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sql_cpu_percent: f64,
    #[serde(default)]
    pub system_idle_percent: f64,
    #[serde(default)]
    pub other_process_cpu_percent: f64,
    #[serde(default)]
    pub scheduler_count: i64,
    #[serde(default)]
    pub runnable_tasks_count: i64,
    #[serde(default)]
    pub current_workers_count: i64,
    #[serde(default)]
    pub max_workers_count: i64,
    #[serde(default)]
    pub signal_wait_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub total_server_memory_mb: f64,
    #[serde(default)]
    pub target_server_memory_mb: f64,
    #[serde(default)]
    pub page_life_expectancy: i64,
    #[serde(default)]
    pub buffer_cache_hit_ratio: f64,
    #[serde(default)]
    pub memory_grants_pending: i64,
    #[serde(default)]
    pub memory_grants_outstanding: i64,
    #[serde(default)]
    pub stolen_server_memory_kb: i64,
    #[serde(default)]
    pub free_memory_kb: i64,
    #[serde(default)]
    pub total_physical_memory_mb: f64,
    #[serde(default)]
    pub available_physical_memory_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitStatDelta {
    pub wait_type: String,
    #[serde(default)]
    pub wait_time_delta_ms: f64,
    #[serde(default)]
    pub waiting_tasks_delta: i64,
    #[serde(default)]
    pub signal_wait_delta_ms: f64,
    #[serde(default)]
    pub wait_rate_ms_per_sec: f64,
    #[serde(default)]
    pub dominance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitStatsSnapshot {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub elapsed_seconds: f64,
    #[serde(default)]
    pub total_delta_ms: f64,
    #[serde(default)]
    pub waits: Vec<WaitStatDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub total_sessions: i64,
    #[serde(default)]
    pub active_sessions: i64,
    #[serde(default)]
    pub sleeping_sessions: i64,
    #[serde(default)]
    pub blocked_sessions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingNode {
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
    #[serde(default)]
    pub is_head_blocker: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingSnapshot {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub chains: Vec<BlockingNode>,
    #[serde(default)]
    pub head_blocker_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopQuery {
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
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub top_by_cpu: Vec<TopQuery>,
    #[serde(default)]
    pub top_by_reads: Vec<TopQuery>,
    #[serde(default)]
    pub top_by_duration: Vec<TopQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileIoMetric {
    pub database_name: String,
    pub file_name: String,
    /// `ROWS` or `LOG`.
    pub file_type: String,
    #[serde(default)]
    pub read_latency_ms: f64,
    #[serde(default)]
    pub write_latency_ms: f64,
    #[serde(default)]
    pub read_iops: f64,
    #[serde(default)]
    pub write_iops: f64,
    #[serde(default)]
    pub size_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoSnapshot {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<FileIoMetric>,
    #[serde(default)]
    pub tempdb_used_mb: f64,
    #[serde(default)]
    pub tempdb_free_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentedIndex {
    pub database_name: Option<String>,
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
    pub index_name: Option<String>,
    #[serde(default)]
    pub avg_fragmentation_percent: f64,
    #[serde(default)]
    pub page_count: i64,
    #[serde(default)]
    pub user_seeks: i64,
    #[serde(default)]
    pub user_scans: i64,
    #[serde(default)]
    pub user_lookups: i64,
    #[serde(default)]
    pub user_updates: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingIndexDetail {
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
    #[serde(default)]
    pub impact_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub fragmented: Vec<FragmentedIndex>,
    #[serde(default)]
    pub missing: Vec<MissingIndexDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressedQuery {
    #[serde(default)]
    pub query_id: i64,
    #[serde(default)]
    pub query_text: String,
    #[serde(default)]
    pub recent_avg_duration_us: f64,
    #[serde(default)]
    pub historical_avg_duration_us: f64,
    #[serde(default)]
    pub regression_pct: f64,
    #[serde(default)]
    pub execution_count: i64,
    #[serde(default)]
    pub plan_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SniffingCandidate {
    pub query_id: i64,
    #[serde(default)]
    pub query_text: String,
    #[serde(default)]
    pub plan_count: i64,
    #[serde(default)]
    pub variance_ratio: f64,
    #[serde(default)]
    pub suspected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStoreSnapshot {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub regressed_queries: Vec<RegressedQuery>,
    #[serde(default)]
    pub parameter_sniffing_candidates: Vec<SniffingCandidate>,
    #[serde(default)]
    pub forced_plan_count: i64,
    #[serde(default)]
    pub total_plans_tracked: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub db_name: String,
    #[serde(default)]
    pub state_desc: String,
    #[serde(default)]
    pub recovery_model: String,
    #[serde(default)]
    pub compatibility_level: i64,
    #[serde(default)]
    pub size_mb: f64,
    #[serde(default)]
    pub free_space_mb: f64,
    #[serde(default)]
    pub log_space_used_pct: f64,
    #[serde(default, with = "crate::models::timestamp::option")]
    pub last_full_backup: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::models::timestamp::option")]
    pub last_log_backup: Option<DateTime<Utc>>,
    #[serde(default)]
    pub log_reuse_wait_desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabasesSnapshot {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub databases: Vec<DatabaseInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSetting {
    pub name: String,
    pub value: serde_json::Value,
    pub recommended: Option<String>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub settings: Vec<ConfigSetting>,
    #[serde(default)]
    pub trace_flags: Vec<i64>,
    #[serde(default)]
    pub tempdb_file_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDatabase {
    #[serde(alias = "active_database")]
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseList {
    #[serde(default)]
    pub databases: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_without_current_is_initializing() {
        let envelope: DomainEnvelope<CpuMetrics> =
            serde_json::from_str(r#"{"current": null, "history": []}"#).unwrap();
        assert!(envelope.current.is_none());

        let bare: DomainEnvelope<BlockingSnapshot> = serde_json::from_str("{}").unwrap();
        assert!(bare.current.is_none());
        assert!(bare.history.is_empty());
    }

    #[test]
    fn database_backup_fields_are_nullable() {
        let raw = serde_json::json!({
            "timestamp": "2024-05-01T10:00:00+00:00",
            "databases": [
                {"db_name": "Sales", "last_full_backup": null},
                {"db_name": "HR", "last_full_backup": "2024-04-30T09:00:00"}
            ]
        });
        let snapshot: DatabasesSnapshot = serde_json::from_value(raw).unwrap();
        assert!(snapshot.databases[0].last_full_backup.is_none());
        assert!(snapshot.databases[1].last_full_backup.is_some());
    }
}
