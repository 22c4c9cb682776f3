use futures::FutureExt;
use serde_json::{Value, json};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::mpsc;

use super::tools::{ToolCall, ToolRegistry};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Progress of one tool call, reported back to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// The invocation finished; `output` is the JSON text to send back.
    Output {
        generation: u64,
        call_id: String,
        output: String,
    },
    /// The settle delay after `Output` has passed; time to ask for a response.
    SettleElapsed { generation: u64, call_id: String },
}

/// Runs tool calls off the session loop, one task per call.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    settle_delay: Duration,
    reports: mpsc::UnboundedSender<DispatchEvent>,
}

impl ToolDispatcher {
    #[must_use]
    pub const fn new(settle_delay: Duration, reports: mpsc::UnboundedSender<DispatchEvent>) -> Self {
        Self { settle_delay, reports }
    }

    /// Invoke `call` against a snapshot of `tools` and report the result,
    /// then report again once the settle delay has passed. Reports stop once
    /// the receiving side is gone.
    pub fn handle(&self, generation: u64, call: ToolCall, tools: &ToolRegistry) {
        let tools = tools.clone();
        let reports = self.reports.clone();
        let settle_delay = self.settle_delay;
        tokio::spawn(async move {
            let output = Self::invoke(&tools, &call).await;
            let call_id = call.call_id;
            if reports
                .send(DispatchEvent::Output { generation, call_id: call_id.clone(), output })
                .is_err()
            {
                return;
            }
            tokio::time::sleep(settle_delay).await;
            let _ = reports.send(DispatchEvent::SettleElapsed { generation, call_id });
        });
    }

    /// Run one call to completion. Never fails: argument errors, handler
    /// errors and panics are all folded into an `{"error": ...}` payload.
    /// Calls naming an unregistered tool succeed with `{"success": true}`.
    pub async fn invoke(tools: &ToolRegistry, call: &ToolCall) -> String {
        let args: Value = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(err) => {
                tracing::warn!(tool = %call.name, call_id = %call.call_id, %err, "invalid tool arguments");
                return error_output(&format!("invalid arguments: {err}"));
            }
        };

        let Some(handler) = tools.handler(&call.name) else {
            tracing::debug!(tool = %call.name, "no handler registered; reporting success");
            return json!({ "success": true }).to_string();
        };

        let outcome = AssertUnwindSafe(async move { handler(args).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => serde_json::to_string(&value)
                .unwrap_or_else(|err| error_output(&err.to_string())),
            Ok(Err(err)) => {
                tracing::warn!(tool = %call.name, call_id = %call.call_id, %err, "tool failed");
                error_output(&err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(tool = %call.name, call_id = %call.call_id, %message, "tool panicked");
                error_output(&message)
            }
        }
    }
}

fn error_output(message: &str) -> String {
    json!({ "error": message }).to_string()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "tool handler panicked".to_string())
}
