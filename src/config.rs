//! Client configuration for the LXD daemon connection.
//!
//! A [`Config`] names the endpoint (local Unix socket or remote TLS base
//! URL), the optional client TLS identity, and the fixed table of named
//! remote image sources. Configuration is immutable once the client has
//! been constructed from it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default path of the local LXD daemon socket.
pub const DEFAULT_UNIX_SOCKET: &str = "/var/lib/lxd/unix.socket";

/// PEM material identifying this client to a remote daemon.
///
/// LXD authenticates remote clients by certificate, so the identity consists
/// of the client certificate and its private key. The key may be either
/// PKCS#8 or PKCS#1 encoded.
#[derive(Clone)]
pub struct ClientIdentity {
    /// PEM-encoded client certificate.
    pub cert_pem: String,
    /// PEM-encoded private key associated with the certificate.
    pub key_pem: String,
    /// Passphrase protecting the private key, if any.
    pub key_passphrase: Option<String>,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("ClientIdentity")
            .field("cert_pem", &self.cert_pem)
            .field("key_pem", &"<redacted>")
            .field(
                "key_passphrase",
                &self.key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Where and how the daemon is reached.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// Local daemon over a Unix domain socket.
    UnixSocket {
        /// Filesystem path of the daemon socket.
        path: PathBuf,
    },
    /// Remote daemon over TLS.
    Https {
        /// Base URL of the daemon, for example `https://lxd.example.org:8443`.
        base_url: String,
        /// Client certificate identity, if the daemon requires one.
        identity: Option<ClientIdentity>,
    },
}

/// Immutable client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    endpoint: Endpoint,
    remotes: BTreeMap<String, String>,
}

impl Config {
    /// Configuration for the local daemon at the default socket path.
    #[must_use]
    pub fn local() -> Self {
        Self::local_at(DEFAULT_UNIX_SOCKET)
    }

    /// Configuration for a local daemon at a custom socket path.
    #[must_use]
    pub fn local_at(path: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: Endpoint::UnixSocket { path: path.into() },
            remotes: default_remotes(),
        }
    }

    /// Configuration for a remote daemon without client authentication.
    #[must_use]
    pub fn remote(base_url: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::Https {
                base_url: base_url.into(),
                identity: None,
            },
            remotes: default_remotes(),
        }
    }

    /// Configuration for a remote daemon authenticating with a client
    /// certificate.
    #[must_use]
    pub fn remote_with_identity(base_url: impl Into<String>, identity: ClientIdentity) -> Self {
        Self {
            endpoint: Endpoint::Https {
                base_url: base_url.into(),
                identity: Some(identity),
            },
            remotes: default_remotes(),
        }
    }

    /// Adds or replaces a named remote image source.
    #[must_use]
    pub fn with_remote(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.remotes.insert(name.into(), url.into());
        self
    }

    /// The configured endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether the client talks to the daemon over the Unix socket.
    #[must_use]
    pub const fn uses_unix_transport(&self) -> bool {
        matches!(self.endpoint, Endpoint::UnixSocket { .. })
    }

    /// The socket path, when the endpoint is a Unix socket.
    #[must_use]
    pub fn unix_socket_path(&self) -> Option<&Path> {
        match &self.endpoint {
            Endpoint::UnixSocket { path } => Some(path),
            Endpoint::Https { .. } => None,
        }
    }

    /// Resolves a named remote image source to its URL.
    #[must_use]
    pub fn remote_url(&self, name: &str) -> Option<&str> {
        self.remotes.get(name).map(String::as_str)
    }
}

/// The remote image sources every configuration starts with.
///
/// Mirrors the well-known defaults shipped with the `lxc` command-line
/// client.
fn default_remotes() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            String::from("images"),
            String::from("https://images.linuxcontainers.org"),
        ),
        (
            String::from("ubuntu"),
            String::from("https://cloud-images.ubuntu.com/releases"),
        ),
        (
            String::from("ubuntu-daily"),
            String::from("https://cloud-images.ubuntu.com/daily"),
        ),
    ])
}
