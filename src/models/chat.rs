use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PreviewRow = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    #[default]
    #[serde(other)]
    None,
}

/// Body of `POST /chat/message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_message: String,
    pub session_id: String,
}

/// Backend reply. `error_message` is an in-band rejection (e.g. a blocked
/// destructive statement), not a transport failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponsePayload {
    pub generated_sql: Option<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub execution_time_ms: f64,
    #[serde(default)]
    pub query_results_preview: Vec<PreviewRow>,
    pub error_message: Option<String>,
    #[serde(default)]
    pub suggested_chart_type: ChartType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub content: String,
    pub sql_executed: Option<String>,
    pub execution_time_ms: f64,
    pub results_preview: Vec<PreviewRow>,
    pub chart_type: ChartType,
    pub confidence: f64,
}

/// The rendered shape of a turn. Each variant renders on its own; `Failed`
/// always carries empty content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    Prompt {
        content: String,
    },
    Answer(Answer),
    Rejected {
        content: String,
        sql_executed: Option<String>,
        error: String,
    },
    Failed {
        content: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl ChatMessage {
    pub fn prompt(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: ChatRole::User,
            body: MessageBody::Prompt {
                content: content.into(),
            },
        }
    }

    pub fn reply(payload: ChatResponsePayload) -> Self {
        let sql_executed = non_empty(payload.generated_sql);
        let body = match non_empty(payload.error_message) {
            Some(error) => MessageBody::Rejected {
                content: payload.explanation,
                sql_executed,
                error,
            },
            None => MessageBody::Answer(Answer {
                content: payload.explanation,
                sql_executed,
                execution_time_ms: payload.execution_time_ms,
                results_preview: payload.query_results_preview,
                chart_type: payload.suggested_chart_type,
                confidence: payload.confidence,
            }),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            role: ChatRole::Assistant,
            body,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: ChatRole::Assistant,
            body: MessageBody::Failed {
                content: String::new(),
                error: error.into(),
            },
        }
    }

    pub fn content(&self) -> &str {
        match &self.body {
            MessageBody::Prompt { content } => content,
            MessageBody::Answer(answer) => &answer.content,
            MessageBody::Rejected { content, .. } | MessageBody::Failed { content, .. } => content,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Rejected { error, .. } | MessageBody::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn sql_executed(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Answer(answer) => answer.sql_executed.as_deref(),
            MessageBody::Rejected { sql_executed, .. } => sql_executed.as_deref(),
            _ => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(error: Option<&str>) -> ChatResponsePayload {
        ChatResponsePayload {
            generated_sql: Some("SELECT COUNT(*) FROM Sales.Customer".into()),
            explanation: "There are 19,820 customers.".into(),
            confidence: 0.92,
            execution_time_ms: 41.0,
            query_results_preview: Vec::new(),
            error_message: error.map(str::to_string),
            suggested_chart_type: ChartType::None,
        }
    }

    #[test]
    fn in_band_error_becomes_rejected_turn() {
        let message = ChatMessage::reply(payload(Some("DROP statements are not allowed")));
        assert!(matches!(message.body, MessageBody::Rejected { .. }));
        assert_eq!(message.error(), Some("DROP statements are not allowed"));
    }

    #[test]
    fn blank_error_message_is_an_answer() {
        let message = ChatMessage::reply(payload(Some("")));
        assert!(matches!(message.body, MessageBody::Answer(_)));
        assert!(message.error().is_none());
    }

    #[test]
    fn failed_turn_serializes_empty_content() {
        let message = ChatMessage::failed("connection refused");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["kind"], "failed");
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["error"], "connection refused");
        assert_eq!(json["content"], "");
    }

    #[test]
    fn unknown_chart_hint_falls_back_to_none() {
        let raw = serde_json::json!({
            "explanation": "ok",
            "suggested_chart_type": "scatter"
        });
        let payload: ChatResponsePayload = serde_json::from_value(raw).unwrap();
        assert_eq!(payload.suggested_chart_type, ChartType::None);
    }
}
