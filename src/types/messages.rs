//! NATS message types

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Attach structured details (e.g. the offending CSV line)
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_payload_roundtrip_uses_camel_case() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-000000000001",
            "timestamp": "2025-01-01T00:00:00Z",
            "payload": {"locationId": "loc-1"}
        }"#;
        let request: Request<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert_eq!(request.payload["locationId"], "loc-1");
    }

    #[test]
    fn test_error_response_skips_empty_details() {
        let error = ErrorResponse::new(Uuid::nil(), "NO_CREDENTIALS", "missing");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("NO_CREDENTIALS"));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_error_response_with_details() {
        let error = ErrorResponse::new(Uuid::nil(), "PARSE_ERROR", "bad row")
            .with_details(serde_json::json!({"line": 3}));
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"line\":3"));
    }
}
