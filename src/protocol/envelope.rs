//! The three-kind response envelope wrapping every daemon reply.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::operation::Operation;

/// The kind of a daemon response envelope.
///
/// Modelled as an explicit sum type so every call site handles all three
/// kinds exhaustively; no guessing which envelope fields are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// The request completed synchronously; `metadata` holds the result.
    Sync,
    /// The daemon started a background operation; `metadata` holds its
    /// descriptor and `operation` its canonical URL.
    Async,
    /// The daemon reports a logical error via `error_code` and `error`.
    Error,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sync => "sync",
            Self::Async => "async",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// A decoded daemon response envelope.
///
/// The `type` field is absent for a subset of error bodies, which is why it
/// is optional here; the parser treats a missing kind as an error envelope.
/// `status_code` is the daemon's domain status and is distinct from the
/// HTTP status of the exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct LxdResponse<T> {
    /// The envelope kind, when the daemon included one.
    #[serde(rename = "type", default)]
    pub response_type: Option<ResponseType>,
    /// Human-readable domain status, for example `"Success"`.
    #[serde(default)]
    pub status: Option<String>,
    /// Numeric domain status, distinct from the HTTP status code.
    #[serde(default)]
    pub status_code: Option<i64>,
    /// Canonical URL of the background operation, for async envelopes.
    #[serde(default)]
    pub operation: Option<String>,
    /// Daemon-level error code, independent of the HTTP status.
    #[serde(default)]
    pub error_code: Option<i64>,
    /// Human-readable daemon error message.
    #[serde(default)]
    pub error: Option<String>,
    /// The caller-typed payload, or the operation descriptor for async
    /// envelopes.
    pub metadata: Option<T>,
}

impl<T> LxdResponse<T> {
    /// Consumes the envelope, yielding its payload if one was present.
    pub fn into_metadata(self) -> Option<T> {
        self.metadata
    }
}

impl LxdResponse<Operation> {
    /// The URL to poll for this envelope's operation.
    ///
    /// Prefers the envelope's `operation` field and falls back to the URL
    /// derived from the embedded descriptor's identifier.
    #[must_use]
    pub fn operation_url(&self) -> Option<String> {
        if let Some(url) = self.operation.as_deref().filter(|url| !url.is_empty()) {
            return Some(url.to_owned());
        }
        self.metadata
            .as_ref()
            .filter(|op| !op.id.is_empty())
            .map(|op| format!("/1.0/operations/{}", op.id))
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used, reason = "panics are acceptable in tests")]

    use super::*;
    use crate::protocol::operation::OperationStatus;
    use rstest::rstest;

    #[rstest]
    #[case(r#""sync""#, ResponseType::Sync)]
    #[case(r#""async""#, ResponseType::Async)]
    #[case(r#""error""#, ResponseType::Error)]
    fn response_type_decodes_lowercase_tags(#[case] json: &str, #[case] expected: ResponseType) {
        let decoded: ResponseType = serde_json::from_str(json).unwrap();
        assert_eq!(decoded, expected);
    }

    #[rstest]
    fn sync_envelope_decodes_payload() {
        let body = r#"{
            "type": "sync",
            "status": "Success",
            "status_code": 200,
            "metadata": ["/1.0/containers/web"]
        }"#;
        let envelope: LxdResponse<Vec<String>> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.response_type, Some(ResponseType::Sync));
        assert_eq!(envelope.status_code, Some(200));
        assert_eq!(
            envelope.into_metadata(),
            Some(vec![String::from("/1.0/containers/web")])
        );
    }

    #[rstest]
    fn error_envelope_without_type_field_decodes() {
        let body = r#"{"error_code": 404, "error": "not found"}"#;
        let envelope: LxdResponse<serde_json::Value> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.response_type, None);
        assert_eq!(envelope.error_code, Some(404));
        assert_eq!(envelope.error.as_deref(), Some("not found"));
    }

    #[rstest]
    fn operation_url_prefers_envelope_field() {
        let body = r#"{
            "type": "async",
            "status_code": 100,
            "operation": "/1.0/operations/abc",
            "metadata": {"id": "abc", "status": "Running", "status_code": 103}
        }"#;
        let envelope: LxdResponse<Operation> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.operation_url().as_deref(), Some("/1.0/operations/abc"));
        let op = envelope.metadata.as_ref().unwrap();
        assert_eq!(op.status_code, OperationStatus::Running);
    }

    #[rstest]
    fn operation_url_falls_back_to_descriptor_id() {
        let body = r#"{
            "type": "async",
            "status_code": 100,
            "metadata": {"id": "abc", "status_code": 103}
        }"#;
        let envelope: LxdResponse<Operation> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.operation_url().as_deref(), Some("/1.0/operations/abc"));
    }

    #[rstest]
    fn operation_url_absent_when_envelope_is_bare() {
        let body = r#"{"type": "async", "status_code": 100}"#;
        let envelope: LxdResponse<Operation> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.operation_url(), None);
    }
}
