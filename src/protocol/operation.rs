//! Background operation descriptors and their lifecycle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a daemon-side background operation.
///
/// The daemon reports the status as a numeric code alongside a display
/// string; the code is authoritative. `Pending` and `Running` are the only
/// non-terminal states. Codes this client does not model are carried
/// verbatim as [`OperationStatus::Other`] and treated as terminal, matching
/// the daemon's contract that an operation never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum OperationStatus {
    /// The operation is queued but has not started.
    Pending,
    /// The operation is executing.
    Running,
    /// The operation completed successfully.
    Success,
    /// The operation completed with an error.
    Failure,
    /// The daemon cancelled the operation.
    Cancelled,
    /// A status code this client does not model.
    Other(i64),
}

impl OperationStatus {
    /// The daemon's numeric code for this status.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Pending => 105,
            Self::Running => 103,
            Self::Success => 200,
            Self::Failure => 400,
            Self::Cancelled => 401,
            Self::Other(code) => code,
        }
    }

    /// Whether the operation has reached a terminal state.
    ///
    /// Terminal operations are immutable and their records are purged by
    /// the daemon a few seconds after completion, so observing a terminal
    /// status must end any poll loop.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl From<i64> for OperationStatus {
    fn from(code: i64) -> Self {
        match code {
            105 => Self::Pending,
            103 => Self::Running,
            200 => Self::Success,
            400 => Self::Failure,
            401 => Self::Cancelled,
            other => Self::Other(other),
        }
    }
}

impl From<OperationStatus> for i64 {
    fn from(status: OperationStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Running => f.write_str("Running"),
            Self::Success => f.write_str("Success"),
            Self::Failure => f.write_str("Failure"),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Other(code) => write!(f, "Unknown({code})"),
        }
    }
}

/// A daemon-tracked background job produced by an async envelope.
///
/// The descriptor is owned transiently by the poll loop for the duration of
/// the wait and discarded once the operation resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Daemon-assigned operation identifier.
    #[serde(default)]
    pub id: String,
    /// Operation class reported by the daemon, for example `"task"`.
    #[serde(default)]
    pub class: Option<String>,
    /// Display form of the lifecycle status.
    #[serde(default)]
    pub status: Option<String>,
    /// Authoritative lifecycle status.
    pub status_code: OperationStatus,
    /// Whether the daemon allows cancelling this operation.
    #[serde(default)]
    pub may_cancel: bool,
    /// Failure detail for operations that ended in error.
    #[serde(default)]
    pub err: Option<String>,
}

impl Operation {
    /// Display form of the status, falling back to the code's name.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.status
            .clone()
            .unwrap_or_else(|| self.status_code.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used, reason = "panics are acceptable in tests")]

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(105, OperationStatus::Pending, false)]
    #[case(103, OperationStatus::Running, false)]
    #[case(200, OperationStatus::Success, true)]
    #[case(400, OperationStatus::Failure, true)]
    #[case(401, OperationStatus::Cancelled, true)]
    #[case(102, OperationStatus::Other(102), true)]
    fn status_codes_map_to_lifecycle_states(
        #[case] code: i64,
        #[case] expected: OperationStatus,
        #[case] terminal: bool,
    ) {
        let status = OperationStatus::from(code);
        assert_eq!(status, expected);
        assert_eq!(status.is_terminal(), terminal);
        assert_eq!(status.code(), code);
    }

    #[rstest]
    fn operation_round_trip_preserves_id_and_status() {
        let body = r#"{
            "id": "1663d78c-326a-43f7-a15d-0cebd4a9b26f",
            "class": "task",
            "status": "Running",
            "status_code": 103,
            "may_cancel": false
        }"#;
        let decoded: Operation = serde_json::from_str(body).unwrap();
        let reencoded = serde_json::to_string(&decoded).unwrap();
        let round_tripped: Operation = serde_json::from_str(&reencoded).unwrap();
        assert_eq!(round_tripped.id, "1663d78c-326a-43f7-a15d-0cebd4a9b26f");
        assert_eq!(round_tripped.status_code, OperationStatus::Running);
        assert_eq!(round_tripped, decoded);
    }

    #[rstest]
    fn status_text_prefers_daemon_display_string() {
        let operation = Operation {
            id: String::from("abc"),
            class: None,
            status: Some(String::from("Failure")),
            status_code: OperationStatus::Failure,
            may_cancel: false,
            err: Some(String::from("exit status 1")),
        };
        assert_eq!(operation.status_text(), "Failure");
    }

    #[rstest]
    fn status_text_falls_back_to_code_name() {
        let operation = Operation {
            id: String::from("abc"),
            class: None,
            status: None,
            status_code: OperationStatus::Other(108),
            may_cancel: false,
            err: None,
        };
        assert_eq!(operation.status_text(), "Unknown(108)");
    }
}
