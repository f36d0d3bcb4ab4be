//! Outbound dispatch: single sends and rate-limited broadcasts.
//!
//! Every send is best effort and retry-free: a failure is logged with the
//! recipient and surfaced as an error value, never a crash. Broadcasts walk
//! their recipient list serially with a fixed gap between sends so the
//! channel's anti-abuse throttling is never tripped.

use crate::channels::{OutboundMessage, SendError};
use crate::mode::ModeController;
use crate::throttle::SendPacer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The link is neither ready nor in offline simulation; the send was
    /// refused, not queued.
    #[error("channel not ready; send refused")]
    ChannelUnavailable,
    #[error("send failed: {0}")]
    Send(#[from] SendError),
}

/// One broadcast recipient, optionally with its own message text.
#[derive(Debug, Clone)]
pub struct BroadcastTarget {
    pub contact_id: String,
    /// Overrides the job's base message for this recipient when set.
    pub message: Option<String>,
}

/// An ordered broadcast: recipients, base message, inter-message delay.
#[derive(Debug, Clone)]
pub struct BroadcastJob {
    pub id: String,
    pub base_message: String,
    pub targets: Vec<BroadcastTarget>,
    pub delay: Duration,
}

impl BroadcastJob {
    pub fn new(base_message: impl Into<String>, targets: Vec<BroadcastTarget>, delay: Duration) -> Self {
        Self {
            id: format!("bcast-{}", uuid::Uuid::new_v4()),
            base_message: base_message.into(),
            targets,
            delay,
        }
    }
}

/// Per-recipient outcome counts for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Cooperative cancellation handle shared between the runtime and in-flight
/// broadcasts. A cancelled broadcast stops before its next recipient;
/// partial completion is expected, not an error.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Turns outbound actions into channel-client calls through the mode
/// controller's current client.
pub struct DispatchController {
    mode: Arc<ModeController>,
}

impl DispatchController {
    pub fn new(mode: Arc<ModeController>) -> Self {
        Self { mode }
    }

    /// Deliver one message. In offline simulation this logs and succeeds;
    /// with a live link that is not ready it refuses with
    /// `ChannelUnavailable`.
    pub async fn send(
        &self,
        contact_id: &str,
        message: &OutboundMessage,
    ) -> Result<(), DispatchError> {
        if !self.mode.is_offline() && !self.mode.is_ready().await {
            log::warn!(
                "refusing {} send to {}: link is {}",
                message.kind(),
                contact_id,
                self.mode.link_state().await.as_str()
            );
            return Err(DispatchError::ChannelUnavailable);
        }
        let client = self.mode.client();
        if let Err(e) = client.send(contact_id, message).await {
            log::warn!("{} send to {} failed: {}", message.kind(), contact_id, e);
            return Err(DispatchError::Send(e));
        }
        Ok(())
    }

    pub async fn send_text(&self, contact_id: &str, body: &str) -> Result<(), DispatchError> {
        self.send(contact_id, &OutboundMessage::text(body)).await
    }

    pub async fn send_image(
        &self,
        contact_id: &str,
        path: &str,
        caption: &str,
    ) -> Result<(), DispatchError> {
        self.send(
            contact_id,
            &OutboundMessage::Image {
                path: path.to_string(),
                caption: caption.to_string(),
            },
        )
        .await
    }

    pub async fn send_document(
        &self,
        contact_id: &str,
        path: &str,
        filename: &str,
    ) -> Result<(), DispatchError> {
        self.send(
            contact_id,
            &OutboundMessage::Document {
                path: path.to_string(),
                filename: filename.to_string(),
            },
        )
        .await
    }

    /// Walk the job's recipients serially, paced by the job's delay. A
    /// per-recipient failure is logged and the loop continues; the report
    /// carries exact counts for the caller.
    pub async fn broadcast(&self, job: &BroadcastJob, cancel: &CancelFlag) -> BroadcastReport {
        log::info!(
            "broadcast {}: {} recipient(s), {:?} between sends",
            job.id,
            job.targets.len(),
            job.delay
        );
        let mut pacer = SendPacer::new(job.delay);
        let mut report = BroadcastReport::default();
        for target in &job.targets {
            if cancel.is_cancelled() {
                log::warn!(
                    "broadcast {}: cancelled after {} of {} recipient(s)",
                    job.id,
                    report.attempted,
                    job.targets.len()
                );
                break;
            }
            pacer.pace().await;
            if cancel.is_cancelled() {
                log::warn!(
                    "broadcast {}: cancelled after {} of {} recipient(s)",
                    job.id,
                    report.attempted,
                    job.targets.len()
                );
                break;
            }
            let body = target.message.as_deref().unwrap_or(&job.base_message);
            report.attempted += 1;
            match self.send_text(&target.contact_id, body).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    log::warn!(
                        "broadcast {}: send to {} failed: {}",
                        job.id,
                        target.contact_id,
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        log::info!(
            "broadcast {}: {} sent, {} failed, {} attempted",
            job.id,
            report.sent,
            report.failed,
            report.attempted
        );
        report
    }
}
