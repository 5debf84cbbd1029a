//! HTTPS transport for remote daemons.
//!
//! Remote LXD daemons terminate TLS themselves with a self-signed server
//! certificate and authenticate clients by certificate rather than by a CA
//! chain, so server verification is disabled and the configured client
//! identity is presented instead.

use std::time::Duration;

use tracing::debug;
use url::Url;

use super::{READ_TIMEOUT_SECS, RawResponse, RequestSpec};
use crate::config::ClientIdentity;
use crate::error::{LxdError, Result};

/// Transport for a remote daemon reached over TLS.
#[derive(Debug)]
pub struct TlsTransport {
    client: reqwest::Client,
    base_url: String,
}

impl TlsTransport {
    /// Builds the TLS client for `base_url`, presenting `identity` when the
    /// daemon requires client-certificate authentication.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError::Config`] when the base URL does not parse or the
    /// identity material cannot be loaded.
    pub fn new(base_url: String, identity: Option<&ClientIdentity>) -> Result<Self> {
        let parsed = Url::parse(&base_url).map_err(|error| LxdError::Config {
            message: format!("invalid base URL '{base_url}': {error}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LxdError::Config {
                message: format!("unsupported base URL scheme '{}'", parsed.scheme()),
            });
        }

        let mut builder = reqwest::Client::builder()
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(identity) = identity {
            if identity.key_passphrase.is_some() {
                return Err(LxdError::Config {
                    message: String::from(
                        "passphrase-protected client keys are not supported; \
                         decrypt the key before constructing the client",
                    ),
                });
            }
            let pem = format!(
                "{}\n{}\n",
                identity.cert_pem.trim_end(),
                identity.key_pem.trim_end()
            );
            let identity =
                reqwest::Identity::from_pem(pem.as_bytes()).map_err(|error| LxdError::Config {
                    message: format!("failed to load client identity: {error}"),
                })?;
            builder = builder.identity(identity);
        }

        let client = builder.build().map_err(|error| LxdError::Config {
            message: format!("failed to build TLS client: {error}"),
        })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Performs one HTTP exchange against the remote daemon.
    pub(crate) async fn execute(&self, spec: RequestSpec) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, spec.normalized_path());
        debug!(method = %spec.method, %url, "dispatching request over TLS");

        let mut request = self.client.request(spec.method.clone(), url.as_str());
        if let Some(content_type) = &spec.content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type.clone());
        }
        for (name, value) in &spec.headers {
            request = request.header(name.clone(), value.clone());
        }
        if let Some(body) = &spec.body {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(|error| LxdError::Transport {
            method: spec.method.clone(),
            url: url.clone(),
            message: error.to_string(),
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|error| LxdError::Transport {
            method: spec.method.clone(),
            url: url.clone(),
            message: format!("failed to read response body: {error}"),
        })?;
        Ok(RawResponse { url, status, body })
    }

    /// Refuses no further work; the underlying pool is evicted when the
    /// client is dropped, and in-flight requests run to completion.
    pub fn shutdown(&self) {}
}
