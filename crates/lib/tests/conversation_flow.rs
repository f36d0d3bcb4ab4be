//! End-to-end dialog turns through the engine: a recording channel stands in
//! for the transport and fake collaborators answer order/loyalty lookups.

use async_trait::async_trait;
use lib::channels::{
    ChannelClient, ChannelEvent, ChannelStatus, InboundMessage, OutboundMessage, SendError,
};
use lib::config::MediaConfig;
use lib::dialog::ConvState;
use lib::dispatch::DispatchController;
use lib::engine::{Engine, Handoff};
use lib::loyalty::{LoyaltyProfile, LoyaltyService};
use lib::mode::ModeController;
use lib::orders::{LookupError, OrderInfo, OrderLookup};
use lib::store::ConversationStateStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

struct RecordingChannel {
    sent: Mutex<Vec<(String, OutboundMessage)>>,
}

impl RecordingChannel {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    async fn sent(&self) -> Vec<(String, OutboundMessage)> {
        self.sent.lock().await.clone()
    }

    async fn last_text(&self) -> String {
        self.sent()
            .await
            .iter()
            .rev()
            .find_map(|(_, m)| match m {
                OutboundMessage::Text { body } => Some(body.clone()),
                _ => None,
            })
            .expect("a text message was sent")
    }
}

#[async_trait]
impl ChannelClient for RecordingChannel {
    fn id(&self) -> &str {
        "recording"
    }

    fn stop(&self) {}

    async fn send(&self, contact_id: &str, message: &OutboundMessage) -> Result<(), SendError> {
        self.sent
            .lock()
            .await
            .push((contact_id.to_string(), message.clone()));
        Ok(())
    }

    async fn status(&self) -> ChannelStatus {
        ChannelStatus {
            connected: true,
            identity: "recording".to_string(),
            battery: None,
        }
    }
}

struct FakeOrders {
    calls: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl OrderLookup for FakeOrders {
    async fn lookup(&self, order_number: &str) -> Result<Option<OrderInfo>, LookupError> {
        self.calls.lock().await.push(order_number.to_string());
        if self.fail {
            return Err(LookupError::Api("503 service unavailable".to_string()));
        }
        if order_number == "4521" {
            Ok(Some(OrderInfo {
                status: "shipped".to_string(),
                eta: Some("friday".to_string()),
                address: Some("123 main st".to_string()),
                items: vec!["blue t-shirt".to_string(), "sneakers".to_string()],
                total: "199.90".to_string(),
            }))
        } else {
            Ok(None)
        }
    }
}

struct FakeLoyalty {
    known_contact: String,
}

#[async_trait]
impl LoyaltyService for FakeLoyalty {
    async fn profile(&self, contact_id: &str) -> Result<Option<LoyaltyProfile>, LookupError> {
        if contact_id == self.known_contact {
            Ok(Some(LoyaltyProfile {
                points: 320,
                level_name: "gold".to_string(),
                discount_percent: 10,
            }))
        } else {
            Ok(None)
        }
    }
}

struct Harness {
    engine: Engine,
    channel: Arc<RecordingChannel>,
    store: Arc<ConversationStateStore>,
    orders: Arc<FakeOrders>,
    handoff_rx: mpsc::UnboundedReceiver<Handoff>,
}

fn temp_state_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("atende-flow-test-{}", uuid::Uuid::new_v4()))
        .join("state.json")
}

async fn ready_mode(client: Arc<dyn ChannelClient>) -> Arc<ModeController> {
    let mode = Arc::new(ModeController::new(client));
    let (tx, mut rx) = mpsc::channel(4);
    tx.send(ChannelEvent::Ready).await.unwrap();
    mode.establish(&mut rx, Duration::from_secs(1)).await;
    mode
}

async fn harness_with(state_path: &PathBuf, media: MediaConfig, orders_fail: bool) -> Harness {
    let channel = Arc::new(RecordingChannel::new());
    let mode = ready_mode(channel.clone()).await;
    let dispatch = Arc::new(DispatchController::new(mode));
    let store = Arc::new(ConversationStateStore::load(state_path).await);
    let orders = Arc::new(FakeOrders {
        calls: Mutex::new(Vec::new()),
        fail: orders_fail,
    });
    let loyalty = Arc::new(FakeLoyalty {
        known_contact: "5511999990000".to_string(),
    });
    let (handoff_tx, handoff_rx) = mpsc::unbounded_channel();
    let engine = Engine::new(
        store.clone(),
        dispatch,
        orders.clone(),
        loyalty,
        media,
        handoff_tx,
    );
    Harness {
        engine,
        channel,
        store,
        orders,
        handoff_rx,
    }
}

async fn harness(state_path: &PathBuf) -> Harness {
    harness_with(state_path, MediaConfig::default(), false).await
}

fn inbound(text: &str) -> InboundMessage {
    InboundMessage {
        contact_id: "5511999990000".to_string(),
        display_name: "Marina".to_string(),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn greeting_gets_welcome_and_menu() {
    let path = temp_state_path();
    let mut h = harness(&path).await;
    h.engine.handle_inbound(&inbound("oi")).await;

    let text = h.channel.last_text().await;
    assert!(text.contains("Marina"));
    assert!(text.contains("3 - track an order"));
    assert_eq!(h.store.get("5511999990000").await, ConvState::MainMenu);
    assert!(path.exists(), "state file is written through");
    assert!(h.handoff_rx.try_recv().is_err());
}

#[tokio::test]
async fn order_flow_prompt_invalid_then_lookup() {
    let path = temp_state_path();
    let h = harness(&path).await;

    h.engine.handle_inbound(&inbound("3")).await;
    assert_eq!(
        h.store.get("5511999990000").await,
        ConvState::AwaitingOrderNumber
    );
    assert!(h.channel.last_text().await.contains("order number"));

    // Too few digits: re-prompt, stay in the flow.
    h.engine.handle_inbound(&inbound("ab12")).await;
    assert_eq!(
        h.store.get("5511999990000").await,
        ConvState::AwaitingOrderNumber
    );
    assert!(h.channel.last_text().await.contains("at least 3 digits"));
    assert!(h.orders.calls.lock().await.is_empty());

    // Digits are stripped out of the surrounding noise.
    h.engine.handle_inbound(&inbound("#4521")).await;
    assert_eq!(h.orders.calls.lock().await.clone(), vec!["4521".to_string()]);
    let text = h.channel.last_text().await;
    assert!(text.contains("order 4521"));
    assert!(text.contains("shipped"));
    assert!(text.contains("199.90"));
    assert_eq!(h.store.get("5511999990000").await, ConvState::MainMenu);
}

#[tokio::test]
async fn unknown_order_number_gets_not_found_reply() {
    let path = temp_state_path();
    let h = harness(&path).await;
    h.engine.handle_inbound(&inbound("3")).await;
    h.engine.handle_inbound(&inbound("999")).await;
    assert!(h.channel.last_text().await.contains("could not find an order"));
    assert_eq!(h.store.get("5511999990000").await, ConvState::MainMenu);
}

#[tokio::test]
async fn order_service_failure_degrades_gracefully() {
    let path = temp_state_path();
    let h = harness_with(&path, MediaConfig::default(), true).await;
    h.engine.handle_inbound(&inbound("3")).await;
    h.engine.handle_inbound(&inbound("4521")).await;
    assert!(h
        .channel
        .last_text()
        .await
        .contains("could not fetch your order status"));
    // The failed lookup still finishes the flow.
    assert_eq!(h.store.get("5511999990000").await, ConvState::MainMenu);
}

#[tokio::test]
async fn loyalty_summary_uses_profile() {
    let path = temp_state_path();
    let h = harness(&path).await;
    h.engine.handle_inbound(&inbound("2")).await;
    let text = h.channel.last_text().await;
    assert!(text.contains("320"));
    assert!(text.contains("gold"));
}

#[tokio::test]
async fn human_handoff_raises_signal() {
    let path = temp_state_path();
    let mut h = harness(&path).await;
    h.engine.handle_inbound(&inbound("5")).await;
    assert!(h.channel.last_text().await.contains("flagged your conversation"));
    let handoff = h.handoff_rx.try_recv().expect("handoff signal raised");
    assert_eq!(handoff.contact_id, "5511999990000");
}

#[tokio::test]
async fn catalog_attaches_configured_document() {
    let path = temp_state_path();
    let media = MediaConfig {
        catalog_document: Some(PathBuf::from("/srv/atende/media/catalog.pdf")),
        promo_image: None,
    };
    let h = harness_with(&path, media, false).await;
    h.engine.handle_inbound(&inbound("1")).await;

    let sent = h.channel.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(matches!(sent[0].1, OutboundMessage::Text { .. }));
    match &sent[1].1 {
        OutboundMessage::Document { path, filename } => {
            assert!(path.ends_with("catalog.pdf"));
            assert_eq!(filename, "catalog.pdf");
        }
        other => panic!("expected a document, got {:?}", other),
    }
}

#[tokio::test]
async fn restart_resumes_persisted_state() {
    let path = temp_state_path();
    {
        let h = harness(&path).await;
        h.engine.handle_inbound(&inbound("8")).await;
        assert_eq!(
            h.store.get("5511999990000").await,
            ConvState::AwaitingEmail
        );
    }

    // New process: a fresh store and engine over the same state file.
    let h = harness(&path).await;
    assert_eq!(h.store.get("5511999990000").await, ConvState::AwaitingEmail);
    h.engine.handle_inbound(&inbound("ana@example.com")).await;
    assert!(h.channel.last_text().await.contains("ana@example.com"));
    assert_eq!(h.store.get("5511999990000").await, ConvState::MainMenu);
}

#[tokio::test]
async fn same_contact_turns_apply_in_order() {
    let path = temp_state_path();
    let h = harness(&path).await;
    // Menu -> order flow -> invalid -> valid; interleaving a second contact
    // must not disturb the first contact's flow.
    h.engine.handle_inbound(&inbound("3")).await;
    h.engine
        .handle_inbound(&InboundMessage {
            contact_id: "other".to_string(),
            display_name: String::new(),
            text: "oi".to_string(),
        })
        .await;
    h.engine.handle_inbound(&inbound("12")).await;
    h.engine.handle_inbound(&inbound("4521")).await;

    assert_eq!(h.store.get("5511999990000").await, ConvState::MainMenu);
    assert_eq!(h.store.get("other").await, ConvState::MainMenu);
    assert_eq!(h.orders.calls.lock().await.len(), 1);
}
