//! Pure transformations consumed by rendering.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::domains::DatabaseInfo;
use crate::models::metrics::{Anomaly, AnomalySeverity, HealthCheck, MetricSnapshot};
use crate::services::reconciler::{trend, Polarity, Trend};

/// Visual category a renderer maps to a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Critical,
    Warning,
    Info,
}

const BACKUP_MAX_AGE_HOURS: i64 = 24;

/// Anomalies ordered by descending severity; equal severities keep their
/// original relative order.
pub fn rank_anomalies(anomalies: &[Anomaly]) -> Vec<&Anomaly> {
    let mut ranked: Vec<&Anomaly> = anomalies.iter().collect();
    ranked.sort_by(|a, b| b.severity.weight().cmp(&a.severity.weight()));
    ranked
}

pub fn risk_category(risk_level: &str) -> Category {
    match risk_level {
        "HIGH" => Category::Critical,
        "MEDIUM" => Category::Warning,
        _ => Category::Info,
    }
}

pub fn severity_category(severity: AnomalySeverity) -> Category {
    match severity {
        AnomalySeverity::Critical => Category::Critical,
        AnomalySeverity::Warning => Category::Warning,
        AnomalySeverity::Info => Category::Info,
    }
}

pub fn cpu_pressure(percent: f64) -> Category {
    if percent > 80.0 {
        Category::Critical
    } else if percent > 50.0 {
        Category::Warning
    } else {
        Category::Info
    }
}

/// A database never backed up is always stale.
pub fn backup_is_stale(last_backup: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_backup {
        Some(at) => now - at > Duration::hours(BACKUP_MAX_AGE_HOURS),
        None => true,
    }
}

pub fn stale_backups(databases: &[DatabaseInfo], now: DateTime<Utc>) -> Vec<&str> {
    databases
        .iter()
        .filter(|db| backup_is_stale(db.last_full_backup, now))
        .map(|db| db.db_name.as_str())
        .collect()
}

/// Both conditions are required: the API answers `ok` and its poller runs.
pub fn is_system_healthy(health: Option<&HealthCheck>) -> bool {
    health.is_some_and(|h| h.status == "ok" && h.poller_running)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub label: &'static str,
    pub value: f64,
    pub trend: Trend,
}

/// Overview cards, each compared against the superseded snapshot.
pub fn metric_cards(current: &MetricSnapshot, previous: Option<&MetricSnapshot>) -> Vec<MetricCard> {
    let readings: [(&'static str, fn(&MetricSnapshot) -> f64); 4] = [
        ("Active Sessions", |s| f64::from(s.active_sessions_count)),
        ("Blocking Sessions", |s| s.blocking_chains.len() as f64),
        ("Top Wait Time (ms)", |s| {
            s.top_wait_stats
                .first()
                .map_or(0.0, |w| w.wait_time_ms as f64)
        }),
        ("Expensive Queries", |s| s.expensive_queries.len() as f64),
    ];

    readings
        .into_iter()
        .map(|(label, read)| {
            let value = read(current);
            MetricCard {
                label,
                value,
                trend: trend(value, previous.map(read), Polarity::HigherIsWorse),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metrics::AnomalyType;
    use crate::services::reconciler::{TrendDirection, TrendQuality};
    use chrono::TimeZone;
    use serde_json::json;

    fn anomaly(id: &str, severity: AnomalySeverity) -> Anomaly {
        Anomaly {
            id: id.to_string(),
            kind: AnomalyType::HighWaits,
            severity,
            root_resource: "PAGEIOLATCH_SH".to_string(),
            context_data: Default::default(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn ranking_is_stable_and_descending() {
        let anomalies = vec![
            anomaly("0", AnomalySeverity::Info),
            anomaly("1", AnomalySeverity::Critical),
            anomaly("2", AnomalySeverity::Warning),
            anomaly("3", AnomalySeverity::Critical),
        ];

        let order: Vec<&str> = rank_anomalies(&anomalies)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(order, vec!["1", "3", "2", "0"]);
    }

    #[test]
    fn risk_levels_map_to_categories() {
        assert_eq!(risk_category("HIGH"), Category::Critical);
        assert_eq!(risk_category("MEDIUM"), Category::Warning);
        assert_eq!(risk_category("LOW"), Category::Info);
        assert_eq!(risk_category("high"), Category::Info);
        assert_eq!(severity_category(AnomalySeverity::Warning), Category::Warning);
    }

    #[test]
    fn backup_staleness_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        assert!(backup_is_stale(None, now));
        assert!(!backup_is_stale(Some(now - Duration::hours(23)), now));
        assert!(backup_is_stale(Some(now - Duration::hours(25)), now));
        assert!(!backup_is_stale(Some(now - Duration::hours(24)), now));
    }

    #[test]
    fn stale_backups_lists_names() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let databases: Vec<DatabaseInfo> = serde_json::from_value(json!([
            {"db_name": "master", "last_full_backup": "2024-05-02T06:00:00"},
            {"db_name": "AdventureWorks2025", "last_full_backup": null},
            {"db_name": "Sales", "last_full_backup": "2024-04-30T06:00:00Z"}
        ]))
        .unwrap();

        assert_eq!(stale_backups(&databases, now), vec!["AdventureWorks2025", "Sales"]);
    }

    #[test]
    fn health_needs_status_and_poller() {
        let ok = HealthCheck {
            status: "ok".to_string(),
            poller_running: true,
        };
        let idle = HealthCheck {
            poller_running: false,
            ..ok.clone()
        };
        let degraded = HealthCheck {
            status: "degraded".to_string(),
            ..ok.clone()
        };

        assert!(is_system_healthy(Some(&ok)));
        assert!(!is_system_healthy(Some(&idle)));
        assert!(!is_system_healthy(Some(&degraded)));
        assert!(!is_system_healthy(None));
    }

    #[test]
    fn cpu_thresholds() {
        assert_eq!(cpu_pressure(81.0), Category::Critical);
        assert_eq!(cpu_pressure(80.0), Category::Warning);
        assert_eq!(cpu_pressure(50.0), Category::Info);
    }

    #[test]
    fn cards_compare_against_previous_snapshot() {
        let previous: MetricSnapshot = serde_json::from_value(json!({
            "timestamp": "2024-05-01T10:00:00",
            "active_sessions_count": 12,
            "top_wait_stats": [{"wait_type": "CXPACKET", "wait_time_ms": 900}]
        }))
        .unwrap();
        let current: MetricSnapshot = serde_json::from_value(json!({
            "timestamp": "2024-05-01T10:00:05",
            "active_sessions_count": 15,
            "top_wait_stats": [{"wait_type": "CXPACKET", "wait_time_ms": 400}]
        }))
        .unwrap();

        let cards = metric_cards(&current, Some(&previous));
        assert_eq!(cards.len(), 4);
        assert_eq!(cards[0].value, 15.0);
        assert_eq!(cards[0].trend.direction, TrendDirection::Up);
        assert_eq!(cards[0].trend.quality, Some(TrendQuality::Bad));
        assert_eq!(cards[1].trend.direction, TrendDirection::Flat);
        assert_eq!(cards[2].trend.quality, Some(TrendQuality::Good));

        let first = metric_cards(&current, None);
        assert!(first.iter().all(|c| c.trend.direction == TrendDirection::Flat));
    }
}
