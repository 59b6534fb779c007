use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope for a log event forwarded to the external queue.
///
/// Notes:
/// - `pattern` is the routing key consumers match on (e.g. `user.created`).
/// - `payload` is free-form JSON and must never contain secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    id: Uuid,
    pattern: String,
    payload: serde_json::Value,
    occurred_at: DateTime<Utc>,
}

impl LogEvent {
    pub fn new(pattern: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::with_time(pattern, payload, Utc::now())
    }

    pub fn with_time(
        pattern: impl Into<String>,
        payload: serde_json::Value,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            pattern: pattern.into(),
            payload,
            occurred_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
