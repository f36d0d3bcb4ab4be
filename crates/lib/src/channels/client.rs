//! Channel client seam: outbound payloads, lifecycle events, and the trait
//! implemented by the live bridge transport and the offline stand-in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One outbound payload. Exactly one variant per send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text {
        body: String,
    },
    /// Image file on local disk plus a caption shown under it.
    Image {
        path: String,
        caption: String,
    },
    /// Document file on local disk, delivered under the given filename.
    Document {
        path: String,
        filename: String,
    },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// Short form for log lines ("text", "image", "document").
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Document { .. } => "document",
        }
    }
}

/// Lifecycle event emitted by a channel client while connecting and after.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The transport needs the operator to pair the device; `token` is shown to them.
    PairingRequired { token: String },
    Ready,
    Disconnected { reason: String },
    /// Credentials rejected. The process falls back to offline simulation for its lifetime.
    AuthFailure { reason: String },
}

/// Snapshot of the transport's health, as reported by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub connected: bool,
    /// Channel-side identity of this bot account (e.g. the linked number).
    #[serde(default)]
    pub identity: String,
    /// Device battery or link health percentage, when the transport reports one.
    #[serde(default)]
    pub battery: Option<u8>,
}

/// A single send failed at the transport level. Never retried here.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("send request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel rejected send: {0}")]
    Rejected(String),
}

/// Handle to a channel transport (live or offline stand-in).
///
/// The live connection is owned exclusively by the mode controller; everything
/// else reaches a `ChannelClient` only through the dispatch controller.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Channel id (e.g. "bridge", "offline").
    fn id(&self) -> &str;

    /// Stop background loops. Idempotent.
    fn stop(&self);

    /// Deliver one message to a contact. Best effort: no retry, no queueing.
    async fn send(&self, contact_id: &str, message: &OutboundMessage) -> Result<(), SendError>;

    /// Current transport health.
    async fn status(&self) -> ChannelStatus;
}
