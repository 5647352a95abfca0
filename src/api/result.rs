//! Tool-facing result envelope
//!
//! Serializes as `{ok: true, data, source?}` or `{ok: false, error}`, the
//! shape every tool handler consumes.

use serde::Serialize;
use serde_json::Value;

use super::error::ApiError;
use super::models::ApiResponse;

/// Where a successful payload came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub endpoint: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl ToolResult {
    pub fn success(data: Value, source: Option<SourceInfo>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            source,
            error: None,
        }
    }

    pub fn failure(error: ApiError) -> Self {
        Self {
            ok: false,
            data: None,
            source: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.ok
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "ok": false,
                "error": {"status": 0, "label": "UNKNOWN_ERROR", "detail": e.to_string()}
            })
        })
    }
}

impl From<ApiResponse> for ToolResult {
    fn from(response: ApiResponse) -> Self {
        let source = SourceInfo {
            endpoint: response.endpoint,
            duration_ms: response.duration.as_millis() as u64,
        };
        Self::success(response.data, Some(source))
    }
}

impl From<ApiError> for ToolResult {
    fn from(error: ApiError) -> Self {
        Self::failure(error)
    }
}

impl From<Result<ApiResponse, ApiError>> for ToolResult {
    fn from(result: Result<ApiResponse, ApiError>) -> Self {
        match result {
            Ok(response) => response.into(),
            Err(error) => error.into(),
        }
    }
}
