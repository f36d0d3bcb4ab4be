//! Live channel: long-poll the messaging bridge daemon for events and send
//! outbound payloads via its HTTP API.
//!
//! The bridge owns the actual connection to the messaging network; this client
//! only speaks plain HTTP to it on localhost.

use crate::channels::client::{
    ChannelClient, ChannelEvent, ChannelStatus, OutboundMessage, SendError,
};
use crate::channels::inbound::InboundMessage;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8930";
const LONG_POLL_TIMEOUT: u64 = 25;

#[derive(Debug, Deserialize)]
struct EventsResponse {
    ok: bool,
    #[serde(default)]
    events: Vec<BridgeEvent>,
    #[serde(default)]
    cursor: Option<i64>,
}

/// One event from the bridge's `/events` feed (lifecycle or inbound message).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum BridgeEvent {
    Ready,
    Pairing {
        token: String,
    },
    Disconnected {
        #[serde(default)]
        reason: String,
    },
    AuthFailure {
        #[serde(default)]
        reason: String,
    },
    Message {
        contact: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        text: Option<String>,
    },
}

/// Live transport: long-polls the bridge for events and sends via its REST API.
pub struct BridgeChannel {
    id: String,
    base_url: String,
    auth_token: Option<String>,
    running: AtomicBool,
    client: reqwest::Client,
}

impl BridgeChannel {
    pub fn new(base_url: Option<String>, auth_token: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            id: "bridge".to_string(),
            base_url,
            auth_token,
            running: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Start the long-poll loop. Lifecycle events go to `event_tx`, inbound
    /// messages to `inbound_tx`. Returns a handle to await on shutdown.
    pub fn start_inbound(
        self: Arc<Self>,
        event_tx: mpsc::Sender<ChannelEvent>,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("bridge channel: starting event long-poll loop");
        tokio::spawn(async move {
            run_event_loop(self, event_tx, inbound_tx).await;
        })
    }

    /// Call the bridge `/events` long poll. Returns (events, next cursor).
    async fn poll_events(
        &self,
        cursor: Option<i64>,
    ) -> Result<(Vec<BridgeEvent>, Option<i64>), String> {
        let mut url = format!(
            "{}/events?timeout={}",
            self.base_url, LONG_POLL_TIMEOUT
        );
        if let Some(c) = cursor {
            url = format!("{}&cursor={}", url, c);
        }
        let res = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("events poll failed: {} {}", status, body));
        }
        let data: EventsResponse = res.json().await.map_err(|e| e.to_string())?;
        if !data.ok {
            return Err("events poll returned ok: false".to_string());
        }
        Ok((data.events, data.cursor))
    }

    async fn post_send(&self, endpoint: &str, body: serde_json::Value) -> Result<(), SendError> {
        let url = format!("{}/send/{}", self.base_url, endpoint);
        let res = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SendError::Rejected(format!("{} {}", status, body)));
        }
        Ok(())
    }
}

async fn run_event_loop(
    channel: Arc<BridgeChannel>,
    event_tx: mpsc::Sender<ChannelEvent>,
    inbound_tx: mpsc::Sender<InboundMessage>,
) {
    let mut cursor: Option<i64> = None;
    while channel.running() {
        match channel.poll_events(cursor).await {
            Ok((events, next)) => {
                cursor = next.or(cursor);
                for ev in events {
                    let lifecycle = match ev {
                        BridgeEvent::Ready => Some(ChannelEvent::Ready),
                        BridgeEvent::Pairing { token } => {
                            Some(ChannelEvent::PairingRequired { token })
                        }
                        BridgeEvent::Disconnected { reason } => {
                            Some(ChannelEvent::Disconnected { reason })
                        }
                        BridgeEvent::AuthFailure { reason } => {
                            Some(ChannelEvent::AuthFailure { reason })
                        }
                        BridgeEvent::Message {
                            contact,
                            name,
                            text,
                        } => {
                            // Non-text payloads (stickers, audio) are skipped.
                            if let Some(text) = text {
                                let inbound = InboundMessage {
                                    contact_id: contact,
                                    display_name: name,
                                    text,
                                };
                                if inbound_tx.send(inbound).await.is_err() {
                                    log::debug!("bridge: inbound channel closed, stopping loop");
                                    return;
                                }
                            }
                            None
                        }
                    };
                    if let Some(ev) = lifecycle {
                        if event_tx.send(ev).await.is_err() {
                            log::debug!("bridge: event channel closed, stopping loop");
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                log::debug!("bridge events poll error: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
            }
        }
    }
    log::info!("bridge channel: event loop stopped");
}

#[async_trait]
impl ChannelClient for BridgeChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn send(&self, contact_id: &str, message: &OutboundMessage) -> Result<(), SendError> {
        match message {
            OutboundMessage::Text { body } => {
                self.post_send(
                    "text",
                    serde_json::json!({ "to": contact_id, "body": body }),
                )
                .await
            }
            OutboundMessage::Image { path, caption } => {
                self.post_send(
                    "image",
                    serde_json::json!({ "to": contact_id, "path": path, "caption": caption }),
                )
                .await
            }
            OutboundMessage::Document { path, filename } => {
                self.post_send(
                    "document",
                    serde_json::json!({ "to": contact_id, "path": path, "filename": filename }),
                )
                .await
            }
        }
    }

    async fn status(&self) -> ChannelStatus {
        let url = format!("{}/status", self.base_url);
        let res = match self.authorized(self.client.get(&url)).send().await {
            Ok(res) if res.status().is_success() => res,
            Ok(res) => {
                log::debug!("bridge status returned {}", res.status());
                return ChannelStatus {
                    connected: false,
                    identity: String::new(),
                    battery: None,
                };
            }
            Err(e) => {
                log::debug!("bridge status request failed: {}", e);
                return ChannelStatus {
                    connected: false,
                    identity: String::new(),
                    battery: None,
                };
            }
        };
        res.json().await.unwrap_or(ChannelStatus {
            connected: false,
            identity: String::new(),
            battery: None,
        })
    }
}
