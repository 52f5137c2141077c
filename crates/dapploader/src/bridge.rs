//! Message bridge between the host and an embedded application document.
//!
//! Protocol (JSON, tagged by `type`):
//! - `request-user-context` (inbound): the frame asks for the session payload
//! - `ready` (inbound): the frame finished mounting
//! - `user-context` (outbound): the session payload
//!
//! The payload is delivered at most once per frame and only to an origin on
//! the allow-list. Messages from other origins are dropped and never answered.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::capability::{FrameChannel, InboundMessage, OutboundMessage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FrameMessage {
    RequestUserContext,
    Ready,
    UserContext { context: Value },
}

/// Origins an embedded document may receive the user context on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginAllowList {
    origins: Vec<String>,
}

impl OriginAllowList {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            origins: origins
                .into_iter()
                .map(|o| normalize_origin(o.as_ref()))
                .filter(|o| !o.is_empty() && o != "*")
                .collect(),
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        let origin = normalize_origin(origin);
        self.origins.iter().any(|o| *o == origin)
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// State of the bridge for one frame.
#[derive(Debug)]
pub struct FrameBridge {
    allow: OriginAllowList,
    context: Value,
    delivered: bool,
    ready: bool,
}

impl FrameBridge {
    pub fn new(allow: OriginAllowList, context: Value) -> Self {
        Self {
            allow,
            context,
            delivered: false,
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn context_delivered(&self) -> bool {
        self.delivered
    }

    /// Handle one inbound message, returning the reply to post, if any.
    pub fn handle(&mut self, message: &InboundMessage) -> Option<OutboundMessage> {
        if !self.allow.allows(&message.origin) {
            warn!(origin = %message.origin, "dropping frame message from origin outside the allow-list");
            return None;
        }

        let parsed = match serde_json::from_str::<FrameMessage>(&message.payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(origin = %message.origin, error = %e, "ignoring unrecognized frame message");
                return None;
            }
        };

        match parsed {
            FrameMessage::RequestUserContext if !self.delivered => {
                self.delivered = true;
                Some(OutboundMessage {
                    target_origin: normalize_origin(&message.origin),
                    message: FrameMessage::UserContext {
                        context: self.context.clone(),
                    },
                })
            }
            FrameMessage::RequestUserContext => {
                debug!(origin = %message.origin, "user context already delivered");
                None
            }
            FrameMessage::Ready => {
                self.ready = true;
                None
            }
            FrameMessage::UserContext { .. } => None,
        }
    }

    /// Serve a frame channel until it closes. `ready` fires on the first
    /// readiness signal.
    pub async fn run(mut self, mut channel: FrameChannel, ready: oneshot::Sender<()>) {
        let mut ready = Some(ready);
        while let Some(message) = channel.inbound.recv().await {
            if let Some(reply) = self.handle(&message) {
                if channel.outbound.send(reply).is_err() {
                    debug!(node = %channel.node_id, "frame went away before the user context was posted");
                }
            }
            if self.ready {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(());
                }
            }
        }
        debug!(node = %channel.node_id, "frame channel closed");
    }
}
