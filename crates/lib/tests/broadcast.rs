//! Broadcast and dispatch behavior against fake channel clients: failure
//! isolation, cancellation, offline no-ops, and the not-ready refusal.

use async_trait::async_trait;
use lib::channels::{ChannelClient, ChannelEvent, ChannelStatus, OutboundMessage, SendError};
use lib::dispatch::{BroadcastJob, BroadcastTarget, CancelFlag, DispatchController};
use lib::mode::ModeController;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Channel double that records every send and fails for one contact.
struct FlakyChannel {
    fail_for: String,
    sent: Mutex<Vec<(String, OutboundMessage)>>,
}

impl FlakyChannel {
    fn new(fail_for: impl Into<String>) -> Self {
        Self {
            fail_for: fail_for.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    async fn sent(&self) -> Vec<(String, OutboundMessage)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl ChannelClient for FlakyChannel {
    fn id(&self) -> &str {
        "flaky"
    }

    fn stop(&self) {}

    async fn send(&self, contact_id: &str, message: &OutboundMessage) -> Result<(), SendError> {
        if contact_id == self.fail_for {
            return Err(SendError::Rejected("simulated transport failure".to_string()));
        }
        self.sent
            .lock()
            .await
            .push((contact_id.to_string(), message.clone()));
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        ChannelStatus {
            connected: true,
            identity: "flaky".to_string(),
            battery: None,
        }
    }
}

/// Bring a mode controller with the given live client to ready.
async fn ready_mode(client: Arc<dyn ChannelClient>) -> Arc<ModeController> {
    let mode = Arc::new(ModeController::new(client));
    let (tx, mut rx) = mpsc::channel(4);
    tx.send(ChannelEvent::Ready).await.unwrap();
    mode.establish(&mut rx, Duration::from_secs(1)).await;
    assert!(mode.is_ready().await);
    mode
}

fn three_recipients() -> Vec<BroadcastTarget> {
    ["a", "b", "c"]
        .into_iter()
        .map(|id| BroadcastTarget {
            contact_id: id.to_string(),
            message: None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn broadcast_isolates_per_recipient_failures() {
    let channel = Arc::new(FlakyChannel::new("b"));
    let mode = ready_mode(channel.clone()).await;
    let dispatch = DispatchController::new(mode);

    let job = BroadcastJob::new("promo time!", three_recipients(), Duration::from_secs(4));
    let report = dispatch.broadcast(&job, &CancelFlag::new()).await;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);
    let delivered = channel.sent().await;
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].0, "a");
    assert_eq!(delivered[1].0, "c");
}

#[tokio::test(start_paused = true)]
async fn broadcast_uses_per_recipient_override() {
    let channel = Arc::new(FlakyChannel::new("nobody"));
    let mode = ready_mode(channel.clone()).await;
    let dispatch = DispatchController::new(mode);

    let targets = vec![
        BroadcastTarget {
            contact_id: "a".to_string(),
            message: None,
        },
        BroadcastTarget {
            contact_id: "b".to_string(),
            message: Some("b, this one is just for you".to_string()),
        },
    ];
    let job = BroadcastJob::new("base offer", targets, Duration::from_secs(4));
    let report = dispatch.broadcast(&job, &CancelFlag::new()).await;

    assert_eq!(report.sent, 2);
    let delivered = channel.sent().await;
    assert_eq!(
        delivered[0].1,
        OutboundMessage::text("base offer")
    );
    assert_eq!(
        delivered[1].1,
        OutboundMessage::text("b, this one is just for you")
    );
}

#[tokio::test(start_paused = true)]
async fn cancelled_broadcast_stops_before_next_recipient() {
    let channel = Arc::new(FlakyChannel::new("nobody"));
    let mode = ready_mode(channel.clone()).await;
    let dispatch = DispatchController::new(mode);

    let cancel = CancelFlag::new();
    cancel.cancel();
    let job = BroadcastJob::new("never goes out", three_recipients(), Duration::from_secs(4));
    let report = dispatch.broadcast(&job, &cancel).await;

    assert_eq!(report.attempted, 0);
    assert!(channel.sent().await.is_empty());
}

#[tokio::test]
async fn offline_send_is_a_noop_that_succeeds() {
    let mode = Arc::new(ModeController::offline());
    let dispatch = DispatchController::new(mode.clone());

    dispatch
        .send_text("someone", "hello from the void")
        .await
        .expect("offline send succeeds");
    assert_eq!(mode.simulated().sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn offline_broadcast_reports_all_sent() {
    let mode = Arc::new(ModeController::offline());
    let dispatch = DispatchController::new(mode.clone());

    let job = BroadcastJob::new("simulated promo", three_recipients(), Duration::from_secs(4));
    let report = dispatch.broadcast(&job, &CancelFlag::new()).await;

    assert_eq!(report.sent, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(mode.simulated().sent_count(), 3);
}

#[tokio::test]
async fn send_refused_while_link_not_ready() {
    // Live mode, but the link never became ready.
    let channel = Arc::new(FlakyChannel::new("nobody"));
    let mode = Arc::new(ModeController::new(channel.clone()));
    let dispatch = DispatchController::new(mode);

    let err = dispatch
        .send_text("a", "too early")
        .await
        .expect_err("send must be refused");
    assert!(matches!(err, lib::dispatch::DispatchError::ChannelUnavailable));
    assert!(channel.sent().await.is_empty());
}
