use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single content element of a tool response. This server only ever emits
/// text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Uniform wrapper returned by every tool operation.
///
/// `content` always holds exactly one text element. Its `text` is either a
/// plain human-readable message (errors, confirmations) or one
/// JSON-serialized payload object (structured results) — never both, so
/// callers JSON-parse only when they expect structured data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResponse {
    /// Success envelope carrying a plain message.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                kind: "text".to_string(),
                text: message.into(),
            }],
            is_error: None,
        }
    }

    /// Success envelope carrying a JSON payload.
    pub fn json(payload: &Value) -> Self {
        let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| "null".to_string());
        Self::text(text)
    }

    /// Error envelope with a human-readable message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent {
                kind: "text".to_string(),
                text: message.into(),
            }],
            is_error: Some(true),
        }
    }

    pub fn failed(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Text of the single content element.
    pub fn message(&self) -> &str {
        self.content.first().map(|c| c.text.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_is_error() {
        let value = serde_json::to_value(ToolResponse::text("done")).unwrap();
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "done");
        assert!(value.get("isError").is_none());
    }

    #[test]
    fn error_envelope_sets_is_error() {
        let value = serde_json::to_value(ToolResponse::error("boom")).unwrap();
        assert_eq!(value["isError"], true);
    }

    #[test]
    fn json_envelope_round_trips() {
        let payload = serde_json::json!({"id": "abc", "count": 3});
        let response = ToolResponse::json(&payload);
        let parsed: Value = serde_json::from_str(response.message()).unwrap();
        assert_eq!(parsed, payload);
    }
}
