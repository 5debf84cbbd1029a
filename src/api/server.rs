//! Server and network resource descriptions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Daemon configuration and environment, from `GET 1.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerState {
    /// Stability of the exposed API, for example `"stable"`.
    #[serde(default)]
    pub api_status: String,
    /// API version string, for example `"1.0"`.
    #[serde(default)]
    pub api_version: String,
    /// How the caller is authenticated: `"trusted"` or `"untrusted"`.
    #[serde(default)]
    pub auth: String,
    /// Server configuration entries.
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    /// Server environment description (kernel, storage backend, ...).
    #[serde(default)]
    pub environment: Option<serde_json::Value>,
}

/// Description of a network known to the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network name, for example `"lxdbr0"`.
    #[serde(default)]
    pub name: String,
    /// Network type, for example `"bridge"`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Whether the daemon manages this network.
    #[serde(default)]
    pub managed: bool,
    /// Resources currently using the network.
    #[serde(default)]
    pub used_by: Vec<String>,
}
