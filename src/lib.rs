//! Asynchronous client for the LXD container daemon REST API.
//!
//! `lxd-client` talks to an LXD daemon over its documented HTTP protocol,
//! either through the local Unix socket or over TLS for remote daemons.
//! Callers issue container and image lifecycle requests (create, start,
//! stop, delete, push file) and are notified once the daemon has finished
//! processing them.
//!
//! # Architecture
//!
//! Every API call flows through the same pipeline: a [`transport`] executor
//! performs exactly one HTTP exchange, the [`protocol`] layer classifies the
//! daemon's JSON envelope as sync, async, or error, and — for operations the
//! daemon executes in the background — an operation poller re-queries the
//! operation's wait endpoint until it reaches a terminal state. The daemon
//! purges operation records a few seconds after completion, so the poller
//! stops at the first terminal observation.
//!
//! # Modules
//!
//! - [`config`]: Immutable client configuration (endpoint, TLS identity, remotes)
//! - [`transport`]: HTTP execution over a Unix socket or TLS connection
//! - [`protocol`]: Envelope model, response classification, operation polling
//! - [`api`]: Resource data-transfer objects for containers, images, and networks
//! - [`client`]: High-level client and per-resource handles
//! - [`error`]: Uniform error taxonomy for all failure channels
//!
//! # Example
//!
//! ```no_run
//! use lxd_client::{Config, LxdClient};
//!
//! # async fn demo() -> lxd_client::Result<()> {
//! let client = LxdClient::new(Config::local())?;
//! for container in client.containers().await? {
//!     println!("{} ({})", container.name, container.status);
//! }
//! client.container("web").stop(30, false, false).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{ContainerCreateRequest, ContainerHandle, ImageHandle, LxdClient};
pub use config::{ClientIdentity, Config, Endpoint};
pub use error::{LxdError, Result};
