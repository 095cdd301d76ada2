use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One suggested remediation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationAction {
    pub action_type: String,
    pub description: String,
    pub sql_statement: Option<String>,
}

/// AI recommendation. `timestamp` identifies it within the history list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub issue_summary: String,
    pub technical_diagnosis: String,
    #[serde(default)]
    pub recommended_actions: Vec<RecommendationAction>,
    pub risk_level: String,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(with = "crate::models::timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerAnalysisResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub anomalies_detected: u32,
    pub recommendations: Option<Recommendation>,
}

impl TriggerAnalysisResponse {
    /// `status == "error"` is an in-band outcome, not a transport failure.
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}
