//! Container resource descriptions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A state-change action for a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAction {
    /// Start the container.
    Start,
    /// Stop the container.
    Stop,
    /// Restart the container.
    Restart,
    /// Freeze (suspend) the container.
    Freeze,
    /// Unfreeze (resume) the container.
    Unfreeze,
}

impl ContainerAction {
    /// The wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Freeze => "freeze",
            Self::Unfreeze => "unfreeze",
        }
    }

    /// Whether the daemon accepts a `stateful` flag for this action.
    ///
    /// Only start and stop can store or restore runtime state.
    #[must_use]
    pub const fn supports_stateful(self) -> bool {
        matches!(self, Self::Start | Self::Stop)
    }
}

/// A device attached to a container.
///
/// Devices are open-ended maps of string properties on the wire; only the
/// mandatory `type` discriminator is modelled as a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// The device type, for example `"disk"` or `"nic"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Remaining device properties.
    #[serde(flatten)]
    pub properties: BTreeMap<String, String>,
}

/// Description of a container as returned by the containers endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// The container name.
    #[serde(default)]
    pub name: String,
    /// CPU architecture the container runs on.
    #[serde(default)]
    pub architecture: Option<String>,
    /// Container configuration entries.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Devices attached to the container.
    #[serde(default)]
    pub devices: BTreeMap<String, Device>,
    /// Whether the container is destroyed on shutdown.
    #[serde(default)]
    pub ephemeral: bool,
    /// Profiles applied to the container, in order.
    #[serde(default)]
    pub profiles: Vec<String>,
    /// Display form of the container status.
    #[serde(default)]
    pub status: String,
    /// Numeric form of the container status.
    #[serde(default)]
    pub status_code: i64,
    /// Creation timestamp as reported by the daemon.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Runtime state of a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerState {
    /// Display form of the state.
    #[serde(default)]
    pub status: String,
    /// Numeric form of the state.
    #[serde(default)]
    pub status_code: i64,
    /// PID of the container's init process, when running.
    #[serde(default)]
    pub pid: i64,
    /// Number of processes in the container.
    #[serde(default)]
    pub processes: i64,
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used, reason = "panics are acceptable in tests")]

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ContainerAction::Start, "start", true)]
    #[case(ContainerAction::Stop, "stop", true)]
    #[case(ContainerAction::Restart, "restart", false)]
    #[case(ContainerAction::Freeze, "freeze", false)]
    #[case(ContainerAction::Unfreeze, "unfreeze", false)]
    fn actions_know_their_wire_name_and_statefulness(
        #[case] action: ContainerAction,
        #[case] name: &str,
        #[case] stateful: bool,
    ) {
        assert_eq!(action.as_str(), name);
        assert_eq!(action.supports_stateful(), stateful);
    }

    #[rstest]
    fn container_info_decodes_daemon_shape() {
        let body = r#"{
            "name": "web",
            "architecture": "x86_64",
            "config": {"limits.cpu": "2"},
            "devices": {"root": {"type": "disk", "path": "/", "pool": "default"}},
            "ephemeral": false,
            "profiles": ["default"],
            "status": "Running",
            "status_code": 103,
            "created_at": "2016-02-16T01:05:05Z",
            "expanded_config": {"ignored": "field"}
        }"#;
        let info: ContainerInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.name, "web");
        assert_eq!(info.profiles, vec![String::from("default")]);
        assert_eq!(info.devices["root"].kind, "disk");
        assert_eq!(info.devices["root"].properties["path"], "/");
        assert_eq!(info.status_code, 103);
    }

    #[rstest]
    fn container_state_decodes_with_missing_fields() {
        let state: ContainerState =
            serde_json::from_str(r#"{"status": "Stopped", "status_code": 102}"#).unwrap();
        assert_eq!(state.status, "Stopped");
        assert_eq!(state.pid, 0);
    }
}
