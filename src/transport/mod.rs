//! HTTP execution over the configured daemon channel.
//!
//! A transport performs exactly one HTTP exchange per call and returns the
//! raw status code and body bytes; it never retries and never interprets
//! the payload. Local daemons are reached with `hyper` over a Unix domain
//! socket, remote daemons with `reqwest` over TLS. Both channels share a
//! read timeout sized to outlast the daemon's bounded long-poll wait.

mod tls;
mod unix;

#[cfg(test)]
pub(crate) mod scripted;

use std::future::Future;

use bytes::Bytes;
use hyper::Method;
use hyper::header::{HeaderName, HeaderValue};

use crate::config::{Config, Endpoint};
use crate::error::Result;

pub use tls::TlsTransport;
pub use unix::UnixTransport;

/// Read timeout for a single HTTP exchange, in seconds.
///
/// Must exceed the daemon's maximum server-side wait on the operation wait
/// endpoint (5 seconds) with generous margin for one slow round trip.
/// Callers needing longer waits re-issue poll calls rather than relying on
/// an oversized timeout.
pub const READ_TIMEOUT_SECS: u64 = 35;

/// One HTTP request to be executed against the daemon.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the API root, for example `1.0/containers`.
    pub path: String,
    /// Request body bytes, if any.
    pub body: Option<Bytes>,
    /// Content type of the body.
    pub content_type: Option<HeaderValue>,
    /// Additional request headers.
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl RequestSpec {
    /// A request with no body and no extra headers.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            content_type: None,
            headers: Vec::new(),
        }
    }

    /// A bodyless GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// The request path with exactly one leading slash.
    ///
    /// Resource paths are built without a leading slash while operation
    /// URLs come back from the daemon with one; both shapes are accepted.
    #[must_use]
    pub fn normalized_path(&self) -> String {
        format!("/{}", self.path.trim_start_matches('/'))
    }
}

/// The raw outcome of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// The full URL the request was sent to, for diagnostics.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Bytes,
}

/// Issues one HTTP request over a configured connection.
///
/// The client core is generic over this trait so the protocol engine can be
/// exercised against scripted responses in tests.
pub trait Executor: Send + Sync {
    /// Performs exactly one HTTP exchange for `spec`.
    ///
    /// Returns the raw response, or a transport error when the exchange
    /// itself fails (connection refused, TLS handshake failure, timeout,
    /// I/O error during the body read).
    fn execute(&self, spec: RequestSpec) -> impl Future<Output = Result<RawResponse>> + Send;
}

/// The production transport: Unix socket or TLS, per the configuration.
#[derive(Debug)]
pub enum Transport {
    /// Local daemon over the Unix socket.
    Unix(UnixTransport),
    /// Remote daemon over TLS.
    Tls(TlsTransport),
}

impl Transport {
    /// Builds the transport matching the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LxdError::Config`] when the TLS identity
    /// material cannot be assembled into a working client.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.endpoint() {
            Endpoint::UnixSocket { path } => Ok(Self::Unix(UnixTransport::new(path.clone()))),
            Endpoint::Https { base_url, identity } => Ok(Self::Tls(TlsTransport::new(
                base_url.clone(),
                identity.as_ref(),
            )?)),
        }
    }

    /// Releases pooled connections and refuses new work.
    ///
    /// Requests already in flight run to completion or fail visibly; they
    /// are not silently aborted.
    pub fn shutdown(&self) {
        match self {
            Self::Unix(transport) => transport.shutdown(),
            Self::Tls(transport) => transport.shutdown(),
        }
    }
}

impl Executor for Transport {
    async fn execute(&self, spec: RequestSpec) -> Result<RawResponse> {
        match self {
            Self::Unix(transport) => transport.execute(spec).await,
            Self::Tls(transport) => transport.execute(spec).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.0/containers", "/1.0/containers")]
    #[case("/1.0/operations/abc/wait?timeout=5", "/1.0/operations/abc/wait?timeout=5")]
    #[case("//1.0", "/1.0")]
    fn paths_normalize_to_one_leading_slash(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(RequestSpec::get(path).normalized_path(), expected);
    }
}
