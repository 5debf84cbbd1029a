//! Scripted executor used by protocol and client unit tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::watch;

use super::{Executor, RawResponse, RequestSpec};
use crate::error::{LxdError, Result};

/// Serves a fixed sequence of responses and records every request it sees.
///
/// Exhausting the script is a test bug and surfaces as a transport error so
/// an over-eager caller (for example a poll loop that does not stop on a
/// terminal status) fails loudly instead of hanging.
pub(crate) struct ScriptedExecutor {
    responses: Mutex<VecDeque<(u16, String)>>,
    calls: Mutex<Vec<RequestSpec>>,
    cancel_after: Option<(usize, watch::Sender<bool>)>,
}

impl ScriptedExecutor {
    pub(crate) fn new(responses: impl IntoIterator<Item = (u16, String)>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    /// Raises the cancellation flag once `count` requests have been served.
    pub(crate) fn cancel_after(mut self, count: usize, sender: watch::Sender<bool>) -> Self {
        self.cancel_after = Some((count, sender));
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub(crate) fn recorded_calls(&self) -> Vec<RequestSpec> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Executor for ScriptedExecutor {
    async fn execute(&self, spec: RequestSpec) -> Result<RawResponse> {
        let url = format!("http://localhost{}", spec.normalized_path());
        let served = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            calls.push(spec.clone());
            calls.len()
        };
        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some((status, body)) = next else {
            return Err(LxdError::Transport {
                method: spec.method,
                url,
                message: String::from("scripted responses exhausted"),
            });
        };
        if let Some((count, sender)) = &self.cancel_after
            && served >= *count
        {
            let _ = sender.send(true);
        }
        Ok(RawResponse {
            url,
            status,
            body: Bytes::from(body),
        })
    }
}
