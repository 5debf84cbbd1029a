//! HTTP/1.1 over the daemon's Unix domain socket.
//!
//! Keeps a small pool of idle keep-alive connections. A connection is
//! checked out for exclusive use for the duration of one exchange and
//! returned afterwards if it is still usable, so concurrent request chains
//! never share a connection mid-request.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, SendRequest};
use hyper::{Method, Request, header};
use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tracing::{debug, warn};

use super::{READ_TIMEOUT_SECS, RawResponse, RequestSpec};
use crate::error::{LxdError, Result};

type Sender = SendRequest<Full<Bytes>>;

/// Transport for a local daemon reached over a Unix socket.
pub struct UnixTransport {
    socket_path: PathBuf,
    idle: Mutex<Vec<Sender>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for UnixTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixTransport")
            .field("socket_path", &self.socket_path)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl UnixTransport {
    /// Creates a transport dialling the daemon socket at `socket_path`.
    #[must_use]
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Performs one HTTP exchange over the socket.
    pub(crate) async fn execute(&self, spec: RequestSpec) -> Result<RawResponse> {
        let path = spec.normalized_path();
        let url = format!("http://localhost{path}");
        if self.closed.load(Ordering::SeqCst) {
            return Err(LxdError::Transport {
                method: spec.method.clone(),
                url,
                message: String::from("transport has been shut down"),
            });
        }

        let mut sender = self.checkout(&spec.method, &url).await?;
        let request = build_request(&spec, &path, &url)?;
        debug!(method = %spec.method, %path, "dispatching request over unix socket");

        let exchange = async {
            let response = sender.send_request(request).await?;
            let status = response.status().as_u16();
            let body = response.into_body().collect().await?.to_bytes();
            Ok::<_, hyper::Error>((status, body))
        };
        let (status, body) = tokio::time::timeout(Duration::from_secs(READ_TIMEOUT_SECS), exchange)
            .await
            .map_err(|_| LxdError::Transport {
                method: spec.method.clone(),
                url: url.clone(),
                message: format!("read timed out after {READ_TIMEOUT_SECS}s"),
            })?
            .map_err(|error| LxdError::Transport {
                method: spec.method.clone(),
                url: url.clone(),
                message: error.to_string(),
            })?;

        self.check_in(sender);
        Ok(RawResponse { url, status, body })
    }

    /// Stops accepting work and drops all idle connections.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Takes a ready pooled connection, or dials a fresh one.
    async fn checkout(&self, method: &Method, url: &str) -> Result<Sender> {
        loop {
            let candidate = self
                .idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop();
            match candidate {
                Some(sender) if sender.is_ready() => return Ok(sender),
                // Stale keep-alive connection; drop it and keep looking.
                Some(_) => {}
                None => break,
            }
        }
        self.connect(method, url).await
    }

    /// Returns a connection to the pool if it is still usable.
    fn check_in(&self, sender: Sender) {
        if self.closed.load(Ordering::SeqCst) || !sender.is_ready() {
            return;
        }
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
    }

    /// Dials the socket and performs the HTTP/1.1 handshake.
    async fn connect(&self, method: &Method, url: &str) -> Result<Sender> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|error| LxdError::Transport {
                method: method.clone(),
                url: url.to_owned(),
                message: format!(
                    "failed to connect to {}: {error}",
                    self.socket_path.display()
                ),
            })?;
        let io = TokioIo::new(stream);
        let (sender, connection) = http1::handshake::<_, Full<Bytes>>(io)
            .await
            .map_err(|error| LxdError::Transport {
                method: method.clone(),
                url: url.to_owned(),
                message: format!("HTTP handshake failed: {error}"),
            })?;

        // Drive the connection until it closes.
        tokio::spawn(async move {
            if let Err(error) = connection.await {
                warn!(%error, "unix socket connection error");
            }
        });

        Ok(sender)
    }
}

fn build_request(spec: &RequestSpec, path: &str, url: &str) -> Result<Request<Full<Bytes>>> {
    let mut builder = Request::builder()
        .method(spec.method.clone())
        .uri(path)
        .header(header::HOST, "localhost");
    if let Some(content_type) = &spec.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type.clone());
    }
    for (name, value) in &spec.headers {
        builder = builder.header(name.clone(), value.clone());
    }
    builder
        .body(Full::new(spec.body.clone().unwrap_or_default()))
        .map_err(|error| LxdError::Transport {
            method: spec.method.clone(),
            url: url.to_owned(),
            message: format!("failed to build request: {error}"),
        })
}
