//! Uniform error taxonomy for the LXD client.
//!
//! Every failure mode collapses to a single [`LxdError`] at the API
//! boundary. The daemon exposes two independent failure channels — the HTTP
//! status line and the `type=error` envelope inside a well-formed body — and
//! both are represented here as distinct variants so callers can tell them
//! apart by inspecting the carried fields rather than by catching different
//! types. Each variant carries the request method and URL so a failure can
//! be diagnosed without re-running the call.

use hyper::Method;
use thiserror::Error;

use crate::protocol::envelope::ResponseType;

/// Marker substituted for a response body that cannot be rendered as text.
pub const UNREADABLE_BODY: &str = "<unreadable>";

/// Errors produced by any stage of an LXD API call.
#[derive(Debug, Error)]
pub enum LxdError {
    /// The HTTP exchange itself failed: connection refused, TLS handshake
    /// failure, timeout, or an I/O error while reading the body.
    #[error("transport failure executing {method} at {url}: {message}")]
    Transport {
        /// The HTTP method of the failed request.
        method: Method,
        /// The URL of the failed request.
        url: String,
        /// A description of the underlying transport failure.
        message: String,
    },

    /// The daemon answered with an HTTP status the caller did not accept.
    ///
    /// The body is attached best-effort; a body that cannot be rendered as
    /// text is recorded as [`UNREADABLE_BODY`] rather than causing a
    /// secondary failure.
    #[error("unexpected HTTP status executing {method} at {url}: status {status}, body: {body}")]
    Status {
        /// The HTTP method of the request.
        method: Method,
        /// The URL of the request.
        url: String,
        /// The HTTP status code the daemon returned.
        status: u16,
        /// The response body, or [`UNREADABLE_BODY`].
        body: String,
    },

    /// A request body or header could not be encoded for the wire.
    #[error("failed to encode request executing {method} at {url}: {message}")]
    Encode {
        /// The HTTP method of the request.
        method: Method,
        /// The URL or path of the request.
        url: String,
        /// A description of the encoding failure.
        message: String,
    },

    /// The response body could not be decoded as an LXD envelope.
    ///
    /// Daemons sometimes return non-JSON text when they crash, so the
    /// literal body is preserved for diagnosis. This is distinct from
    /// [`LxdError::Transport`]: the exchange succeeded but the payload was
    /// malformed.
    #[error("failed to decode response executing {method} at {url}: {message}, body: {body}")]
    Decode {
        /// The HTTP method of the request.
        method: Method,
        /// The URL of the request.
        url: String,
        /// A description of the decode failure.
        message: String,
        /// The literal response body, or [`UNREADABLE_BODY`].
        body: String,
    },

    /// The daemon reported a logical error through a `type=error` envelope.
    ///
    /// The error code is daemon-level and independent of the HTTP status;
    /// the daemon may report HTTP 200 with an error envelope or an HTTP
    /// error status with a well-formed body.
    #[error("daemon error executing {method} at {url}: code {error_code}, message: {message}")]
    Daemon {
        /// The HTTP method of the request.
        method: Method,
        /// The URL of the request.
        url: String,
        /// The daemon-level error code.
        error_code: i64,
        /// The human-readable error message from the daemon.
        message: String,
    },

    /// The envelope decoded cleanly but carried the wrong response kind.
    #[error(
        "bad response type executing {method} at {url}: expected {expected}, got {actual}"
    )]
    ResponseTypeMismatch {
        /// The HTTP method of the request.
        method: Method,
        /// The URL of the request.
        url: String,
        /// The envelope kind the caller expected.
        expected: ResponseType,
        /// The envelope kind the daemon actually returned.
        actual: ResponseType,
    },

    /// A background operation reached a terminal state other than success.
    #[error("operation '{id}' failed with status {status} (code {status_code})")]
    OperationFailed {
        /// The daemon-assigned operation identifier.
        id: String,
        /// The terminal lifecycle status code reported by the daemon.
        status_code: i64,
        /// The terminal lifecycle status name.
        status: String,
    },

    /// The caller aborted a poll loop before the operation resolved.
    ///
    /// Distinct from the daemon-reported `Cancelled` lifecycle status, which
    /// surfaces as [`LxdError::OperationFailed`].
    #[error("wait for operation '{id}' cancelled by caller")]
    Cancelled {
        /// The daemon-assigned operation identifier.
        id: String,
    },

    /// The client configuration could not be turned into a working
    /// transport, for example unusable TLS identity material.
    #[error("invalid client configuration: {message}")]
    Config {
        /// A description of the configuration problem.
        message: String,
    },
}

/// A specialised `Result` type for LXD client operations.
pub type Result<T> = std::result::Result<T, LxdError>;
