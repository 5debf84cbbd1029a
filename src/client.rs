//! High-level client for the LXD daemon.
//!
//! [`LxdClient`] owns the transport and exposes one method per documented
//! API call. Per-resource handles ([`ContainerHandle`], [`ImageHandle`]) are
//! lightweight values carrying the resource name and a reference to the
//! client; they are constructed on demand and hold no state of their own.
//!
//! Calls answered with an async envelope drive the operation poller to a
//! terminal state before returning, so a resolved call means the daemon
//! finished the work, not merely accepted it.

use std::collections::BTreeMap;

use bytes::Bytes;
use hyper::Method;
use hyper::header::{HeaderName, HeaderValue};
use serde::Serialize;
use tokio::sync::watch;
use url::form_urlencoded;

use crate::api::{
    ContainerAction, ContainerInfo, ContainerState, Device, ImageAliasesEntry, ImageInfo, Network,
    ServerState,
};
use crate::config::Config;
use crate::error::{LxdError, Result};
use crate::protocol::envelope::{LxdResponse, ResponseType};
use crate::protocol::operation::Operation;
use crate::protocol::parser::ResponseParser;
use crate::protocol::poller;
use crate::transport::{Executor, RequestSpec, Transport};

/// Query suffix requesting fully expanded objects from list endpoints.
const RECURSION_SUFFIX: &str = "?recursion=1";

const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Asynchronous LXD client.
///
/// Generic over the [`Executor`] so the protocol engine can be exercised
/// against scripted responses; production code uses the default transport.
#[derive(Debug)]
pub struct LxdClient<E = Transport> {
    executor: E,
    config: Config,
}

impl LxdClient {
    /// Builds a client for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError::Config`] when the configuration cannot be turned
    /// into a working transport.
    pub fn new(config: Config) -> Result<Self> {
        let executor = Transport::from_config(&config)?;
        Ok(Self { executor, config })
    }

    /// Builds a client for the local daemon at the default socket path.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError::Config`] when the transport cannot be built.
    pub fn local() -> Result<Self> {
        Self::new(Config::local())
    }

    /// Releases pooled connections and refuses new work.
    ///
    /// Requests already in flight complete or fail visibly.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }
}

impl<E: Executor> LxdClient<E> {
    /// Builds a client around an explicit executor.
    ///
    /// Intended for tests and embedders supplying their own transport.
    pub const fn with_executor(executor: E, config: Config) -> Self {
        Self { executor, config }
    }

    /// The configuration this client was built from.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Server configuration and environment information.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, or daemon failure.
    pub async fn server_state(&self) -> Result<ServerState> {
        self.request(Method::GET, "1.0")
            .send()
            .await?
            .parse_sync_required()
    }

    /// Lists existing containers as full objects.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, or daemon failure.
    pub async fn containers(&self) -> Result<Vec<ContainerInfo>> {
        self.request(Method::GET, format!("1.0/containers{RECURSION_SUFFIX}"))
            .send()
            .await?
            .parse_sync_required()
    }

    /// Lists existing images as full objects.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, or daemon failure.
    pub async fn images(&self) -> Result<Vec<ImageInfo>> {
        self.request(Method::GET, format!("1.0/images{RECURSION_SUFFIX}"))
            .send()
            .await?
            .parse_sync_required()
    }

    /// Lists networks known to the daemon as full objects.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, or daemon failure.
    pub async fn networks(&self) -> Result<Vec<Network>> {
        self.request(Method::GET, format!("1.0/networks{RECURSION_SUFFIX}"))
            .send()
            .await?
            .parse_sync_required()
    }

    /// Resolves an image alias, or `None` when the alias does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, or daemon failure
    /// other than the tolerated not-found condition.
    pub async fn image_alias(&self, name: &str) -> Result<Option<ImageAliasesEntry>> {
        self.request(Method::GET, format!("1.0/images/aliases/{name}"))
            .expect(&[200, 404])
            .send()
            .await?
            .parse_sync()
    }

    /// A handle on the container named `name`.
    ///
    /// The name should be at most 64 ASCII characters without slash, colon
    /// or comma; the daemon rejects anything else.
    pub fn container(&self, name: impl Into<String>) -> ContainerHandle<'_, E> {
        ContainerHandle {
            client: self,
            name: name.into(),
        }
    }

    /// A handle on the image with the given fingerprint.
    pub fn image(&self, fingerprint: impl Into<String>) -> ImageHandle<'_, E> {
        ImageHandle {
            client: self,
            fingerprint: fingerprint.into(),
        }
    }

    /// Polls the daemon until the operation in `envelope` is terminal.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError::OperationFailed`] for a terminal state other
    /// than success, or any transport/protocol failure of a wait call.
    pub async fn wait_for_operation(&self, envelope: &LxdResponse<Operation>) -> Result<()> {
        poller::wait_for_completion(&self.executor, envelope).await
    }

    /// Like [`LxdClient::wait_for_operation`], but stops polling at the
    /// next iteration boundary once `cancel` carries `true`.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError::Cancelled`] on caller cancellation, otherwise
    /// the same failures as [`LxdClient::wait_for_operation`].
    pub async fn wait_for_operation_cancellable(
        &self,
        envelope: &LxdResponse<Operation>,
        cancel: watch::Receiver<bool>,
    ) -> Result<()> {
        poller::wait_for_completion_cancellable(&self.executor, envelope, cancel).await
    }

    fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder<'_, E> {
        RequestBuilder {
            client: self,
            spec: RequestSpec::new(method, path),
            accepted: Vec::new(),
        }
    }

    /// Resolves an async-enveloped response by polling to completion.
    ///
    /// An absent envelope means the daemon reported an accepted error code
    /// (for example a tolerated not-found), which resolves as a no-op.
    async fn finish_async(
        &self,
        parser: &ResponseParser,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<()> {
        match parser.parse_async()? {
            Some(envelope) => match cancel {
                Some(receiver) => {
                    poller::wait_for_completion_cancellable(&self.executor, &envelope, receiver)
                        .await
                }
                None => poller::wait_for_completion(&self.executor, &envelope).await,
            },
            None => Ok(()),
        }
    }
}

/// Internal builder mirroring one API request and its expectations.
struct RequestBuilder<'a, E> {
    client: &'a LxdClient<E>,
    spec: RequestSpec,
    accepted: Vec<u16>,
}

impl<'a, E: Executor> RequestBuilder<'a, E> {
    fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body).map_err(|error| LxdError::Encode {
            method: self.spec.method.clone(),
            url: self.spec.path.clone(),
            message: error.to_string(),
        })?;
        self.spec.body = Some(Bytes::from(bytes));
        self.spec.content_type = Some(HeaderValue::from_static(CONTENT_TYPE_JSON));
        Ok(self)
    }

    fn raw_body(mut self, body: Bytes, content_type: &'static str) -> Self {
        self.spec.body = Some(body);
        self.spec.content_type = Some(HeaderValue::from_static(content_type));
        self
    }

    fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.spec.headers.push((name, value));
        self
    }

    fn expect(mut self, codes: &[u16]) -> Self {
        self.accepted = codes.to_vec();
        self
    }

    async fn send(self) -> Result<ResponseParser> {
        let method = self.spec.method.clone();
        let raw = self.client.executor.execute(self.spec).await?;
        Ok(ResponseParser::new(method, raw, self.accepted))
    }
}

/// Parameters for creating a container from a remote image source.
#[derive(Debug, Clone)]
pub struct ContainerCreateRequest {
    /// Name of the remote image source in the configuration's remotes
    /// table.
    pub remote: String,
    /// Image fingerprint on the remote.
    pub image: String,
    /// Profiles to apply, in order.
    pub profiles: Vec<String>,
    /// Configuration overrides.
    pub config: BTreeMap<String, String>,
    /// Devices the container should have.
    pub devices: BTreeMap<String, Device>,
    /// Whether to destroy the container on shutdown.
    pub ephemeral: bool,
}

impl ContainerCreateRequest {
    /// A minimal request pulling `image` from the named remote.
    #[must_use]
    pub fn from_remote(remote: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
            image: image.into(),
            profiles: Vec::new(),
            config: BTreeMap::new(),
            devices: BTreeMap::new(),
            ephemeral: false,
        }
    }

    /// Appends a profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    /// Sets a configuration override.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Attaches a device under the given name.
    #[must_use]
    pub fn with_device(mut self, name: impl Into<String>, device: Device) -> Self {
        self.devices.insert(name.into(), device);
        self
    }

    /// Marks the container as ephemeral.
    #[must_use]
    pub const fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

#[derive(Serialize)]
struct CreateSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    server: &'a str,
    protocol: &'static str,
    fingerprint: &'a str,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    name: &'a str,
    source: CreateSource<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    profiles: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    config: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    devices: BTreeMap<String, Device>,
    #[serde(skip_serializing_if = "is_false")]
    ephemeral: bool,
}

#[derive(Serialize)]
struct StateChangeBody {
    action: &'static str,
    timeout: i64,
    force: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stateful: Option<bool>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A value handle on one container.
#[derive(Debug)]
pub struct ContainerHandle<'a, E = Transport> {
    client: &'a LxdClient<E>,
    name: String,
}

impl<E: Executor> ContainerHandle<'_, E> {
    /// The container name this handle addresses.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full description of the container, or `None` when it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, or daemon failure
    /// other than the tolerated not-found condition.
    pub async fn info(&self) -> Result<Option<ContainerInfo>> {
        self.client
            .request(Method::GET, format!("1.0/containers/{}", self.name))
            .expect(&[200, 404])
            .send()
            .await?
            .parse_sync()
    }

    /// Runtime state of the container, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, or daemon failure
    /// other than the tolerated not-found condition.
    pub async fn state(&self) -> Result<Option<ContainerState>> {
        self.client
            .request(Method::GET, format!("1.0/containers/{}/state", self.name))
            .expect(&[200, 404])
            .send()
            .await?
            .parse_sync()
    }

    /// Creates the container from a remote image source and waits for the
    /// daemon to finish.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError::Config`] when the named remote is unknown, and
    /// [`LxdError`] for any transport, protocol, daemon, or operation
    /// failure.
    pub async fn create(&self, request: &ContainerCreateRequest) -> Result<()> {
        let server = self
            .client
            .config
            .remote_url(&request.remote)
            .ok_or_else(|| LxdError::Config {
                message: format!("unknown remote image source '{}'", request.remote),
            })?;
        let body = CreateBody {
            name: &self.name,
            source: CreateSource {
                kind: "image",
                server,
                protocol: "simplestreams",
                fingerprint: &request.image,
            },
            profiles: request.profiles.clone(),
            config: request.config.clone(),
            devices: request.devices.clone(),
            ephemeral: request.ephemeral,
        };
        let parser = self
            .client
            .request(Method::POST, "1.0/containers")
            .json(&body)?
            .expect(&[202])
            .send()
            .await?;
        self.client.finish_async(&parser, None).await
    }

    /// Changes the container state and waits for the daemon to finish.
    ///
    /// `timeout` is the daemon-side bound in seconds after which the state
    /// change is considered failed; `force` currently only applies to stop
    /// and restart, where it kills the container. The `stateful` flag is
    /// sent only for start and stop, the actions that can store or restore
    /// runtime state.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, daemon, or
    /// operation failure.
    pub async fn action(
        &self,
        action: ContainerAction,
        timeout: i64,
        force: bool,
        stateful: bool,
    ) -> Result<()> {
        self.change_state(action, timeout, force, stateful, None)
            .await
    }

    /// Like [`ContainerHandle::action`], but abandons the wait at the next
    /// poll boundary once `cancel` carries `true`.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError::Cancelled`] on caller cancellation, otherwise
    /// the same failures as [`ContainerHandle::action`].
    pub async fn action_cancellable(
        &self,
        action: ContainerAction,
        timeout: i64,
        force: bool,
        stateful: bool,
        cancel: watch::Receiver<bool>,
    ) -> Result<()> {
        self.change_state(action, timeout, force, stateful, Some(cancel))
            .await
    }

    /// Starts the container.
    ///
    /// # Errors
    ///
    /// Same failures as [`ContainerHandle::action`].
    pub async fn start(&self) -> Result<()> {
        self.action(ContainerAction::Start, 0, false, false).await
    }

    /// Stops the container.
    ///
    /// # Errors
    ///
    /// Same failures as [`ContainerHandle::action`].
    pub async fn stop(&self, timeout: i64, force: bool, stateful: bool) -> Result<()> {
        self.action(ContainerAction::Stop, timeout, force, stateful)
            .await
    }

    /// Deletes the container and waits for the daemon to finish.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, daemon, or
    /// operation failure.
    pub async fn delete(&self) -> Result<()> {
        let parser = self
            .client
            .request(Method::DELETE, format!("1.0/containers/{}", self.name))
            .expect(&[202])
            .send()
            .await?;
        self.client.finish_async(&parser, None).await
    }

    /// Deletes one snapshot of the container and waits for the daemon to
    /// finish.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, daemon, or
    /// operation failure.
    pub async fn delete_snapshot(&self, snapshot: &str) -> Result<()> {
        let parser = self
            .client
            .request(
                Method::DELETE,
                format!("1.0/containers/{}/snapshots/{snapshot}", self.name),
            )
            .expect(&[202])
            .send()
            .await?;
        self.client.finish_async(&parser, None).await
    }

    /// Writes `content` to `target_path` inside the container.
    ///
    /// `mode` is the octal permission string (for example `"0644"`); `uid`
    /// and `gid` set the owner inside the container.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, or daemon
    /// failure.
    pub async fn push_file(
        &self,
        target_path: &str,
        uid: i64,
        gid: i64,
        mode: &str,
        content: Bytes,
    ) -> Result<()> {
        let encoded: String = form_urlencoded::byte_serialize(target_path.as_bytes()).collect();
        let path = format!("1.0/containers/{}/files?path={encoded}", self.name);
        let mode_value = HeaderValue::from_str(mode).map_err(|error| LxdError::Encode {
            method: Method::POST,
            url: path.clone(),
            message: format!("invalid file mode '{mode}': {error}"),
        })?;
        let parser = self
            .client
            .request(Method::POST, path)
            .raw_body(content, CONTENT_TYPE_OCTET_STREAM)
            .header(
                HeaderName::from_static("x-lxd-type"),
                HeaderValue::from_static("file"),
            )
            .header(HeaderName::from_static("x-lxd-mode"), mode_value)
            .header(HeaderName::from_static("x-lxd-uid"), int_header(uid))
            .header(HeaderName::from_static("x-lxd-gid"), int_header(gid))
            .expect(&[200])
            .send()
            .await?;
        // Sync envelope with an empty payload; only the classification
        // matters.
        parser.parse::<serde_json::Value>(ResponseType::Sync)?;
        Ok(())
    }

    async fn change_state(
        &self,
        action: ContainerAction,
        timeout: i64,
        force: bool,
        stateful: bool,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<()> {
        let body = StateChangeBody {
            action: action.as_str(),
            timeout,
            force,
            stateful: action.supports_stateful().then_some(stateful),
        };
        let parser = self
            .client
            .request(Method::PUT, format!("1.0/containers/{}/state", self.name))
            .json(&body)?
            .expect(&[202])
            .send()
            .await?;
        self.client.finish_async(&parser, cancel).await
    }
}

/// A value handle on one image.
#[derive(Debug)]
pub struct ImageHandle<'a, E = Transport> {
    client: &'a LxdClient<E>,
    fingerprint: String,
}

impl<E: Executor> ImageHandle<'_, E> {
    /// The fingerprint this handle addresses.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Full description of the image, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, or daemon failure
    /// other than the tolerated not-found condition.
    pub async fn info(&self) -> Result<Option<ImageInfo>> {
        self.client
            .request(Method::GET, format!("1.0/images/{}", self.fingerprint))
            .expect(&[200, 404])
            .send()
            .await?
            .parse_sync()
    }

    /// Deletes the image and waits for the daemon to finish.
    ///
    /// # Errors
    ///
    /// Returns [`LxdError`] for any transport, protocol, daemon, or
    /// operation failure.
    pub async fn delete(&self) -> Result<()> {
        let parser = self
            .client
            .request(Method::DELETE, format!("1.0/images/{}", self.fingerprint))
            .expect(&[202])
            .send()
            .await?;
        self.client.finish_async(&parser, None).await
    }
}

fn int_header(value: i64) -> HeaderValue {
    // Decimal integers are always valid header values.
    HeaderValue::from_str(&value.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("0"))
}
