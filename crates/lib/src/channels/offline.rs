//! Offline stand-in: sends are no-ops that log what would have gone out.
//!
//! Selected by the mode controller when the bridge cannot be reached or
//! rejects our credentials. The dialog engine and state store keep working
//! against this client, which is also what keeps tests deterministic.

use crate::channels::client::{ChannelClient, ChannelStatus, OutboundMessage, SendError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Channel client that records sends instead of delivering them.
#[derive(Default)]
pub struct OfflineChannel {
    sent: AtomicU64,
}

impl OfflineChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sends absorbed since startup.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChannelClient for OfflineChannel {
    fn id(&self) -> &str {
        "offline"
    }

    fn stop(&self) {}

    async fn send(&self, contact_id: &str, message: &OutboundMessage) -> Result<(), SendError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        match message {
            OutboundMessage::Text { body } => {
                log::info!("offline: would send text to {}: {}", contact_id, body);
            }
            OutboundMessage::Image { path, caption } => {
                log::info!(
                    "offline: would send image to {}: {} ({})",
                    contact_id,
                    path,
                    caption
                );
            }
            OutboundMessage::Document { path, filename } => {
                log::info!(
                    "offline: would send document to {}: {} as {}",
                    contact_id,
                    path,
                    filename
                );
            }
        }
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        ChannelStatus {
            connected: false,
            identity: "offline".to_string(),
            battery: None,
        }
    }
}
