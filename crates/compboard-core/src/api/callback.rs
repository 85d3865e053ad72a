//! Callback-style request plumbing.
//!
//! The remote script answers a request by emitting `name({...})`, where
//! `name` is the callback token sent with the request. The registry maps
//! live tokens to one-shot senders; a response for a token that is no longer
//! registered (timed out, or already answered) finds no listener and is
//! dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use super::ApiError;
use crate::models::RawRecord;

/// What a callback invocation delivers to the waiting caller.
pub type CallbackResult = Result<CallbackPayload, ApiError>;

/// Body of a callback invocation: `{ success, data?, error? }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallbackPayload {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CallbackPayload {
    /// Unwrap a successful payload into its records.
    ///
    /// `success: false` becomes `Remote`; a missing or null `data` is an empty
    /// list; any other non-array `data` is `InvalidFormat`. Array elements that
    /// are not objects are skipped.
    pub fn into_records(self) -> Result<Vec<RawRecord>, ApiError> {
        if !self.success {
            return Err(ApiError::from_payload(self.error.as_deref()));
        }
        match self.data {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(RawRecord::from(map)),
                    other => {
                        debug!(value = %other, "Skipping non-object record");
                        None
                    }
                })
                .collect()),
            Some(other) => Err(ApiError::InvalidFormat(format!(
                "expected an array of records, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Live callback tokens awaiting a response.
/// Clone is cheap - clones share the same table.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<CallbackResult>>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<CallbackResult>>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `token` and return the receiving half of its one-shot channel.
    pub fn register(&self, token: &str) -> oneshot::Receiver<CallbackResult> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(token.to_string(), tx);
        rx
    }

    /// Remove `token`. Returns whether it was still registered.
    pub fn deregister(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    /// Deliver `result` to `token`'s listener, consuming the registration.
    /// Returns false when nobody is listening.
    pub fn dispatch(&self, token: &str, result: CallbackResult) -> bool {
        let sender = self.lock().remove(token);
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    pub fn is_registered(&self, token: &str) -> bool {
        self.lock().contains_key(token)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

/// Scoped ownership of one in-flight request: its callback registration and
/// the transport task performing it. Dropping the guard, on any exit path,
/// deregisters the token and aborts the task.
pub(crate) struct PendingRequest {
    token: String,
    registry: CallbackRegistry,
    artifact: Option<JoinHandle<()>>,
}

impl PendingRequest {
    pub(crate) fn new(token: String, registry: CallbackRegistry, artifact: JoinHandle<()>) -> Self {
        Self {
            token,
            registry,
            artifact: Some(artifact),
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if self.registry.deregister(&self.token) {
            debug!(callback = %self.token, "Deregistered unanswered callback");
        }
        if let Some(artifact) = self.artifact.take() {
            artifact.abort();
        }
    }
}

/// Split a callback-invocation body `name(args);` into `name` and `args`.
///
/// Tolerates the `/**/` prefix some script hosts emit and a trailing
/// semicolon. Returns `None` when the body does not invoke a callback.
pub fn parse_invocation(body: &str) -> Option<(&str, &str)> {
    let trimmed = body.trim();
    let trimmed = trimmed.strip_prefix("/**/").unwrap_or(trimmed).trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

    let open = trimmed.find('(')?;
    if !trimmed.ends_with(')') {
        return None;
    }
    let name = trimmed[..open].trim();
    let is_identifier = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
    if !is_identifier {
        return None;
    }
    Some((name, &trimmed[open + 1..trimmed.len() - 1]))
}
