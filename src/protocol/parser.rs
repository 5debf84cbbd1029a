//! Classification of raw daemon responses into typed envelopes.
//!
//! The daemon has two independent failure channels: the HTTP status line
//! and the `type=error` envelope inside a well-formed body. It may report
//! HTTP 200 with an error envelope, or an HTTP error status with a
//! perfectly decodable body. The parser checks both channels, in that
//! order, and additionally rejects envelopes of the wrong kind.

use hyper::Method;
use serde::de::DeserializeOwned;

use crate::error::{LxdError, Result, UNREADABLE_BODY};
use crate::protocol::envelope::{LxdResponse, ResponseType};
use crate::protocol::operation::Operation;
use crate::transport::RawResponse;

/// Decodes one raw response against the caller's expectations.
///
/// `accepted` carries the HTTP status codes the caller explicitly accepts.
/// An empty set defers entirely to the daemon's own envelope
/// interpretation. The same set doubles as the accepted daemon error codes:
/// an error envelope whose `error_code` is in the set (for example a
/// 404-equivalent on a lookup) is an expected condition and yields an
/// absent result instead of an error.
#[derive(Debug)]
pub struct ResponseParser {
    method: Method,
    response: RawResponse,
    accepted: Vec<u16>,
}

impl ResponseParser {
    /// Wraps a raw response for classification.
    #[must_use]
    pub fn new(method: Method, response: RawResponse, accepted: Vec<u16>) -> Self {
        Self {
            method,
            response,
            accepted,
        }
    }

    /// The URL the response was received from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.response.url
    }

    /// Decodes the body as an envelope of the expected kind.
    ///
    /// Returns `Ok(None)` when the daemon reported an error the caller
    /// listed as acceptable.
    ///
    /// # Errors
    ///
    /// - [`LxdError::Status`] when the HTTP status is outside a non-empty
    ///   accepted set; the body is not decoded in that case.
    /// - [`LxdError::Decode`] when the body is not a valid envelope; the
    ///   literal body is preserved since crashing daemons return non-JSON
    ///   text.
    /// - [`LxdError::Daemon`] for error envelopes with a non-accepted code.
    /// - [`LxdError::ResponseTypeMismatch`] when the envelope kind differs
    ///   from `expected`.
    pub fn parse<T: DeserializeOwned>(
        &self,
        expected: ResponseType,
    ) -> Result<Option<LxdResponse<T>>> {
        self.check_http_status()?;

        let envelope: LxdResponse<T> =
            serde_json::from_slice(&self.response.body).map_err(|error| LxdError::Decode {
                method: self.method.clone(),
                url: self.response.url.clone(),
                message: error.to_string(),
                body: self.body_text(),
            })?;

        match envelope.response_type {
            // A missing kind only happens on a subset of error bodies.
            None | Some(ResponseType::Error) => {
                let error_code = envelope.error_code.unwrap_or_default();
                if self
                    .accepted
                    .iter()
                    .any(|&code| i64::from(code) == error_code)
                {
                    return Ok(None);
                }
                Err(LxdError::Daemon {
                    method: self.method.clone(),
                    url: self.response.url.clone(),
                    error_code,
                    message: envelope.error.unwrap_or_default(),
                })
            }
            Some(actual) if actual != expected => Err(LxdError::ResponseTypeMismatch {
                method: self.method.clone(),
                url: self.response.url.clone(),
                expected,
                actual,
            }),
            Some(_) => Ok(Some(envelope)),
        }
    }

    /// Decodes a sync envelope and yields its payload.
    ///
    /// `Ok(None)` covers both an accepted daemon error and a sync envelope
    /// with no payload.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ResponseParser::parse`].
    pub fn parse_sync<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        Ok(self
            .parse::<T>(ResponseType::Sync)?
            .and_then(LxdResponse::into_metadata))
    }

    /// Decodes a sync envelope whose payload must be present.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ResponseParser::parse`], plus
    /// [`LxdError::Decode`] when the envelope carries no payload.
    pub fn parse_sync_required<T: DeserializeOwned>(&self) -> Result<T> {
        self.parse_sync()?.ok_or_else(|| LxdError::Decode {
            method: self.method.clone(),
            url: self.response.url.clone(),
            message: String::from("response metadata missing"),
            body: self.body_text(),
        })
    }

    /// Decodes an async envelope carrying an operation descriptor.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ResponseParser::parse`].
    pub fn parse_async(&self) -> Result<Option<LxdResponse<Operation>>> {
        self.parse(ResponseType::Async)
    }

    /// Fails when the HTTP status is outside a non-empty accepted set.
    fn check_http_status(&self) -> Result<()> {
        if self.accepted.is_empty() || self.accepted.contains(&self.response.status) {
            return Ok(());
        }
        Err(LxdError::Status {
            method: self.method.clone(),
            url: self.response.url.clone(),
            status: self.response.status,
            body: self.body_text(),
        })
    }

    /// The body as text, or the unreadable marker.
    fn body_text(&self) -> String {
        std::str::from_utf8(&self.response.body)
            .map_or_else(|_| String::from(UNREADABLE_BODY), str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used, reason = "panics are acceptable in tests")]

    use super::*;
    use bytes::Bytes;
    use rstest::rstest;
    use serde_json::Value;

    fn raw(status: u16, body: &[u8]) -> RawResponse {
        RawResponse {
            url: String::from("http://localhost/1.0/containers"),
            status,
            body: Bytes::copy_from_slice(body),
        }
    }

    fn parser(status: u16, body: &[u8], accepted: &[u16]) -> ResponseParser {
        ResponseParser::new(Method::GET, raw(status, body), accepted.to_vec())
    }

    #[rstest]
    fn sync_envelope_parsed_as_async_is_a_mismatch() {
        let body = br#"{"type": "sync", "status_code": 200, "metadata": null}"#;
        let error = parser(200, body, &[200])
            .parse::<Value>(ResponseType::Async)
            .unwrap_err();
        match error {
            LxdError::ResponseTypeMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, ResponseType::Async);
                assert_eq!(actual, ResponseType::Sync);
            }
            other => panic!("expected a response type mismatch, got {other}"),
        }
    }

    #[rstest]
    fn accepted_error_code_yields_absent_result() {
        let body = br#"{"type": "error", "error_code": 404, "error": "not found"}"#;
        let parsed = parser(404, body, &[200, 404]).parse_sync::<Value>().unwrap();
        assert!(parsed.is_none());
    }

    #[rstest]
    fn non_accepted_error_code_carries_code_and_message() {
        let body = br#"{"type": "error", "error_code": 403, "error": "forbidden"}"#;
        let error = parser(200, body, &[200]).parse_sync::<Value>().unwrap_err();
        match error {
            LxdError::Daemon {
                error_code,
                message,
                ..
            } => {
                assert_eq!(error_code, 403);
                assert_eq!(message, "forbidden");
            }
            other => panic!("expected a daemon error, got {other}"),
        }
    }

    #[rstest]
    fn missing_type_field_is_treated_as_an_error_envelope() {
        let body = br#"{"error_code": 500, "error": "internal"}"#;
        let error = parser(200, body, &[200]).parse_sync::<Value>().unwrap_err();
        assert!(matches!(error, LxdError::Daemon { error_code: 500, .. }));
    }

    #[rstest]
    fn rejected_status_with_unreadable_body_is_marked_explicitly() {
        let error = parser(500, &[0xff, 0xfe, 0xfd], &[200])
            .parse_sync::<Value>()
            .unwrap_err();
        match error {
            LxdError::Status { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, UNREADABLE_BODY);
            }
            other => panic!("expected an HTTP status error, got {other}"),
        }
    }

    #[rstest]
    fn non_json_crash_body_is_a_decode_error_carrying_the_body() {
        let error = parser(500, b"runtime: out of memory", &[])
            .parse_sync::<Value>()
            .unwrap_err();
        match error {
            LxdError::Decode { body, .. } => assert_eq!(body, "runtime: out of memory"),
            other => panic!("expected a decode error, got {other}"),
        }
    }

    #[rstest]
    fn rejected_status_is_reported_before_the_body_is_decoded() {
        // The body is a valid error envelope, but the status check fires
        // first when the accepted set is non-empty.
        let body = br#"{"type": "error", "error_code": 400, "error": "bad request"}"#;
        let error = parser(400, body, &[202]).parse_async().unwrap_err();
        assert!(matches!(error, LxdError::Status { status: 400, .. }));
    }

    #[rstest]
    fn sync_payload_is_returned() {
        let body = br#"{"type": "sync", "status_code": 200, "metadata": ["a", "b"]}"#;
        let parsed: Vec<String> = parser(200, body, &[200]).parse_sync_required().unwrap();
        assert_eq!(parsed, vec![String::from("a"), String::from("b")]);
    }

    #[rstest]
    fn required_payload_missing_is_a_decode_error() {
        let body = br#"{"type": "sync", "status_code": 200, "metadata": null}"#;
        let error = parser(200, body, &[200])
            .parse_sync_required::<Value>()
            .unwrap_err();
        assert!(matches!(error, LxdError::Decode { .. }));
    }

    #[rstest]
    fn empty_accepted_set_defers_to_the_daemon_interpretation() {
        let body = br#"{"type": "sync", "status_code": 200, "metadata": 7}"#;
        let parsed: i64 = parser(599, body, &[]).parse_sync_required().unwrap();
        assert_eq!(parsed, 7);
    }
}
