//! Poll loop resolving a background operation to its terminal outcome.
//!
//! The daemon's wait endpoint blocks server-side for up to a bounded
//! timeout before returning the current state, so the loop re-issues wait
//! calls back to back without client-side pacing. The first wait response
//! may already be terminal — operations can finish between the triggering
//! call and the first wait — and is handled like any later one. Once a
//! terminal status has been observed no further wait call is issued: the
//! daemon purges operation records seconds after completion and a vanished
//! operation must not be re-polled.

use hyper::Method;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::{LxdError, Result};
use crate::protocol::envelope::LxdResponse;
use crate::protocol::operation::{Operation, OperationStatus};
use crate::protocol::parser::ResponseParser;
use crate::transport::{Executor, RequestSpec};

/// Server-side wait bound passed to the operation wait endpoint, in
/// seconds.
pub const WAIT_TIMEOUT_SECS: u64 = 5;

/// Drives the operation in `envelope` to a terminal state.
pub(crate) async fn wait_for_completion<E: Executor>(
    executor: &E,
    envelope: &LxdResponse<Operation>,
) -> Result<()> {
    poll(executor, envelope, None).await
}

/// Like [`wait_for_completion`], but stops at the next iteration boundary
/// once `cancel` carries `true`.
///
/// Caller cancellation resolves as [`LxdError::Cancelled`], never as
/// success or failure, and is distinct from the daemon-reported `Cancelled`
/// lifecycle status.
pub(crate) async fn wait_for_completion_cancellable<E: Executor>(
    executor: &E,
    envelope: &LxdResponse<Operation>,
    cancel: watch::Receiver<bool>,
) -> Result<()> {
    poll(executor, envelope, Some(cancel)).await
}

async fn poll<E: Executor>(
    executor: &E,
    envelope: &LxdResponse<Operation>,
    cancel: Option<watch::Receiver<bool>>,
) -> Result<()> {
    let Some(operation_url) = envelope.operation_url() else {
        return Err(LxdError::Decode {
            method: Method::GET,
            url: envelope.operation.clone().unwrap_or_default(),
            message: String::from("async envelope carries no operation URL"),
            body: String::new(),
        });
    };
    let wait_path = format!("{operation_url}/wait?timeout={WAIT_TIMEOUT_SECS}");

    loop {
        if let Some(receiver) = &cancel
            && *receiver.borrow()
        {
            return Err(LxdError::Cancelled {
                id: operation_id(envelope, &operation_url),
            });
        }

        // A failed wait call is a hard failure, not retried: the loop is
        // the mechanism for observing state change, not a retry policy.
        let raw = executor.execute(RequestSpec::get(&wait_path)).await?;
        let parser = ResponseParser::new(Method::GET, raw, vec![200]);
        let operation: Operation = parser.parse_sync_required()?;

        if !operation.status_code.is_terminal() {
            trace!(id = %operation.id, status = %operation.status_code, "operation still in progress");
            continue;
        }

        debug!(id = %operation.id, status = %operation.status_code, "operation reached terminal state");
        return match operation.status_code {
            OperationStatus::Success => Ok(()),
            status => Err(LxdError::OperationFailed {
                id: if operation.id.is_empty() {
                    operation_id(envelope, &operation_url)
                } else {
                    operation.id.clone()
                },
                status_code: status.code(),
                status: operation.status_text(),
            }),
        };
    }
}

/// Best-effort operation identifier for error reporting.
fn operation_id(envelope: &LxdResponse<Operation>, operation_url: &str) -> String {
    envelope
        .metadata
        .as_ref()
        .filter(|op| !op.id.is_empty())
        .map_or_else(
            || {
                operation_url
                    .rsplit('/')
                    .next()
                    .map_or_else(|| operation_url.to_owned(), str::to_owned)
            },
            |op| op.id.clone(),
        )
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used, reason = "panics are acceptable in tests")]

    use super::*;
    use crate::transport::scripted::ScriptedExecutor;
    use rstest::rstest;
    use serde_json::json;

    const OP_ID: &str = "1663d78c-326a-43f7-a15d-0cebd4a9b26f";

    fn async_envelope() -> LxdResponse<Operation> {
        serde_json::from_value(json!({
            "type": "async",
            "status": "Operation created",
            "status_code": 100,
            "operation": format!("/1.0/operations/{OP_ID}"),
            "metadata": {"id": OP_ID, "status": "Running", "status_code": 103}
        }))
        .unwrap()
    }

    fn wait_response(status_code: i64) -> (u16, String) {
        (
            200,
            json!({
                "type": "sync",
                "status": "Success",
                "status_code": 200,
                "metadata": {"id": OP_ID, "status_code": status_code}
            })
            .to_string(),
        )
    }

    #[tokio::test]
    async fn resolves_after_two_running_observations_and_a_success() {
        let executor = ScriptedExecutor::new([
            wait_response(103),
            wait_response(103),
            wait_response(200),
            // Extra scripted response that a correct poller never requests.
            wait_response(200),
        ]);
        wait_for_completion(&executor, &async_envelope())
            .await
            .unwrap();
        assert_eq!(executor.call_count(), 3);
    }

    #[tokio::test]
    async fn wait_calls_target_the_bounded_wait_endpoint() {
        let executor = ScriptedExecutor::new([wait_response(200)]);
        wait_for_completion(&executor, &async_envelope())
            .await
            .unwrap();
        let calls = executor.recorded_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].normalized_path(),
            format!("/1.0/operations/{OP_ID}/wait?timeout=5")
        );
    }

    #[tokio::test]
    async fn failure_resolves_as_operation_failure_naming_the_id() {
        let executor = ScriptedExecutor::new([wait_response(103), wait_response(400)]);
        let error = wait_for_completion(&executor, &async_envelope())
            .await
            .unwrap_err();
        assert_eq!(executor.call_count(), 2);
        match error {
            LxdError::OperationFailed {
                id, status_code, ..
            } => {
                assert_eq!(id, OP_ID);
                assert_eq!(status_code, 400);
            }
            other => panic!("expected an operation failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn terminal_first_response_needs_no_special_path() {
        let executor = ScriptedExecutor::new([wait_response(200)]);
        wait_for_completion(&executor, &async_envelope())
            .await
            .unwrap();
        assert_eq!(executor.call_count(), 1);
    }

    #[tokio::test]
    async fn daemon_cancelled_status_is_an_operation_failure() {
        let executor = ScriptedExecutor::new([wait_response(401)]);
        let error = wait_for_completion(&executor, &async_envelope())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            LxdError::OperationFailed {
                status_code: 401,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn failed_wait_call_is_a_hard_failure() {
        // Empty script: the very first wait call fails at the transport.
        let executor = ScriptedExecutor::new([]);
        let error = wait_for_completion(&executor, &async_envelope())
            .await
            .unwrap_err();
        assert!(matches!(error, LxdError::Transport { .. }));
    }

    #[tokio::test]
    async fn pre_cancelled_loop_issues_no_wait_calls() {
        let executor = ScriptedExecutor::new([wait_response(200)]);
        let (sender, receiver) = watch::channel(true);
        let error = wait_for_completion_cancellable(&executor, &async_envelope(), receiver)
            .await
            .unwrap_err();
        drop(sender);
        assert_eq!(executor.call_count(), 0);
        assert!(matches!(error, LxdError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn cancellation_takes_effect_at_the_next_iteration_boundary() {
        let (sender, receiver) = watch::channel(false);
        let executor =
            ScriptedExecutor::new([wait_response(103), wait_response(103)]).cancel_after(1, sender);
        let error = wait_for_completion_cancellable(&executor, &async_envelope(), receiver)
            .await
            .unwrap_err();
        assert_eq!(executor.call_count(), 1);
        match error {
            LxdError::Cancelled { id } => assert_eq!(id, OP_ID),
            other => panic!("expected caller cancellation, got {other}"),
        }
    }

    #[tokio::test]
    async fn envelope_without_operation_url_cannot_be_polled() {
        let envelope: LxdResponse<Operation> =
            serde_json::from_value(json!({"type": "async", "status_code": 100})).unwrap();
        let executor = ScriptedExecutor::new([]);
        let error = wait_for_completion(&executor, &envelope).await.unwrap_err();
        assert!(matches!(error, LxdError::Decode { .. }));
        assert_eq!(executor.call_count(), 0);
    }
}
