//! Inbound command routing.
//!
//! The router runs on the network loop for every inbound message. It parses
//! the control topic, decodes the payload, asks the entity's [`Category`] for
//! an [`Action`] and queues the result. A separate worker task drains the
//! queue into the [`ActionInvoker`], so a slow host never stalls the loop.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use entity_bridge_common::{EntityId, TopicBuilder};
use entity_bridge_framework::{BridgeError, MessageHandler, Result};

use crate::category::{Action, Category};
use crate::host::ActionInvoker;

/// Decoded inbound command payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandPayload {
    /// A JSON object, e.g. `{"state": "on", "brightness": 80}`.
    Structured(Map<String, Value>),
    /// Anything not starting with `{`, taken as the requested state.
    Bare(String),
}

impl CommandPayload {
    /// Decode a raw payload.
    ///
    /// Payloads starting with `{` must be a JSON object. Everything else is
    /// a bare state string with surrounding whitespace removed.
    pub fn decode(raw: &[u8]) -> std::result::Result<Self, String> {
        let text = std::str::from_utf8(raw).map_err(|e| format!("payload is not UTF-8: {}", e))?;
        // Whitespace is trimmed before the '{' check, so an indented or
        // newline-terminated JSON object still decodes as structured
        let trimmed = text.trim();

        if trimmed.starts_with('{') {
            serde_json::from_str::<Map<String, Value>>(trimmed)
                .map(CommandPayload::Structured)
                .map_err(|e| e.to_string())
        } else {
            Ok(CommandPayload::Bare(trimmed.to_string()))
        }
    }

    /// The requested primary state, if the payload carries one.
    pub fn state(&self) -> Option<&str> {
        match self {
            CommandPayload::Structured(map) => map.get("state").and_then(Value::as_str),
            CommandPayload::Bare(state) => Some(state.as_str()),
        }
    }
}

impl Category {
    /// Translate a command into an action, or `None` for categories that
    /// do not handle commands.
    pub fn translate(&self, payload: &CommandPayload) -> Option<Action> {
        match self {
            Category::Light | Category::Switch => Some(on_off(payload)),
            Category::Climate
            | Category::Lock
            | Category::Sensor
            | Category::Cover
            | Category::Other(_) => None,
        }
    }
}

fn on_off(payload: &CommandPayload) -> Action {
    match payload.state() {
        Some("on") => Action::TurnOn,
        _ => Action::TurnOff,
    }
}

/// A command ready for the host platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub category: Category,
    pub action: Action,
    pub entity_id: EntityId,
    /// Command verb from the topic (`set`).
    pub command: String,
}

/// What the router did with one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Queued for the worker.
    Dispatched(ActionRequest),
    /// Not a control topic (request namespace, foreign or malformed topic).
    Ignored,
    /// The category has no command translator.
    Unsupported(EntityId),
    /// The payload could not be decoded.
    Malformed,
    /// The command queue was full or closed.
    QueueFull,
}

/// Routes inbound control messages into the command queue.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    topics: TopicBuilder,
    queue: mpsc::Sender<ActionRequest>,
}

impl CommandRouter {
    pub fn new(topics: TopicBuilder, queue: mpsc::Sender<ActionRequest>) -> Self {
        Self { topics, queue }
    }

    /// Route one inbound message. Never blocks.
    pub fn route(&self, topic: &str, payload: &[u8]) -> RouteOutcome {
        let Some(control) = self.topics.parse_control_topic(topic) else {
            tracing::trace!(topic = %topic, "Ignoring non-control message");
            return RouteOutcome::Ignored;
        };

        let payload = match CommandPayload::decode(payload) {
            Ok(payload) => payload,
            Err(message) => {
                let err = BridgeError::MalformedCommandPayload {
                    topic: topic.to_string(),
                    message,
                };
                tracing::warn!(error = %err, "Dropping command");
                return RouteOutcome::Malformed;
            }
        };

        let category = Category::from(&control.entity_id);
        let Some(action) = category.translate(&payload) else {
            tracing::debug!(
                entity_id = %control.entity_id,
                command = %control.command,
                "No command handling for category"
            );
            return RouteOutcome::Unsupported(control.entity_id);
        };

        let request = ActionRequest {
            category,
            action,
            entity_id: control.entity_id,
            command: control.command.to_string(),
        };

        match self.queue.try_send(request.clone()) {
            Ok(()) => {
                tracing::debug!(entity_id = %request.entity_id, action = %request.action, "Command queued");
                RouteOutcome::Dispatched(request)
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(entity_id = %request.entity_id, action = %request.action, "Command queue full, dropping command");
                RouteOutcome::QueueFull
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(entity_id = %request.entity_id, "Command worker stopped, dropping command");
                RouteOutcome::QueueFull
            }
        }
    }
}

impl MessageHandler for CommandRouter {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        self.route(topic, payload);
    }
}

/// Spawn the worker that hands queued commands to the host.
///
/// Runs until the queue's senders are dropped or the task is aborted.
pub fn spawn_command_worker(
    mut queue: mpsc::Receiver<ActionRequest>,
    invoker: Arc<dyn ActionInvoker>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = queue.recv().await {
            if let Err(e) = invoke(invoker.as_ref(), &request).await {
                tracing::warn!(entity_id = %request.entity_id, action = %request.action, error = %e, "Action failed");
            }
        }
        tracing::debug!("Command worker stopped");
    })
}

async fn invoke(invoker: &dyn ActionInvoker, request: &ActionRequest) -> Result<()> {
    let entity_id = request.entity_id.to_string();
    invoker
        .invoke_action(request.category.as_str(), request.action, &entity_id)
        .await?;
    tracing::info!(entity_id = %entity_id, action = %request.action, "Action invoked");
    Ok(())
}
