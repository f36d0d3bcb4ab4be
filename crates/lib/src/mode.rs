//! Channel lifecycle: drive the live client to readiness, or fall back to
//! offline simulation for the rest of the process lifetime.
//!
//! The live connection is owned here and nowhere else; every other component
//! reaches the channel through `DispatchController`, which asks this
//! controller for the current client. Offline fallback swaps the client once
//! instead of branching on a flag inside every send path.

use crate::channels::{ChannelClient, ChannelEvent, OfflineChannel};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

/// Extra time allowed once the transport asks for pairing: a person has to
/// type the token on the linked device.
const PAIRING_GRACE: Duration = Duration::from_secs(120);

/// Lifecycle of the link to the messaging network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Initializing,
    AwaitingPairing,
    Ready,
    Disconnected,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::AwaitingPairing => "awaiting-pairing",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Owns the channel clients and decides which one the process talks through.
pub struct ModeController {
    live: Arc<dyn ChannelClient>,
    simulated: Arc<OfflineChannel>,
    link: RwLock<LinkState>,
    offline: AtomicBool,
}

impl ModeController {
    /// Start in live mode with the given transport, not yet ready.
    pub fn new(live: Arc<dyn ChannelClient>) -> Self {
        Self {
            live,
            simulated: Arc::new(OfflineChannel::new()),
            link: RwLock::new(LinkState::Initializing),
            offline: AtomicBool::new(false),
        }
    }

    /// Start permanently in offline simulation (e.g. `--offline`).
    pub fn offline() -> Self {
        let simulated = Arc::new(OfflineChannel::new());
        Self {
            live: simulated.clone(),
            simulated,
            link: RwLock::new(LinkState::Ready),
            offline: AtomicBool::new(true),
        }
    }

    /// The client every send goes through right now.
    pub fn client(&self) -> Arc<dyn ChannelClient> {
        if self.is_offline() {
            self.simulated.clone()
        } else {
            self.live.clone()
        }
    }

    /// The offline stand-in (for inspection; counts absorbed sends).
    pub fn simulated(&self) -> Arc<OfflineChannel> {
        self.simulated.clone()
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Stop the transport's background loops. Idempotent.
    pub fn stop(&self) {
        self.live.stop();
    }

    pub async fn link_state(&self) -> LinkState {
        *self.link.read().await
    }

    pub async fn is_ready(&self) -> bool {
        *self.link.read().await == LinkState::Ready
    }

    /// Switch to offline simulation for the rest of the process lifetime and
    /// stop the live transport's loops. Irreversible.
    pub async fn force_offline(&self, reason: &str) {
        if self.offline.swap(true, Ordering::SeqCst) {
            return;
        }
        log::warn!("switching to offline simulation mode: {}", reason);
        self.live.stop();
        *self.link.write().await = LinkState::Ready;
    }

    /// Drive lifecycle events until the channel is ready or initialization
    /// fails. On timeout, stream end, disconnect, or auth failure the process
    /// falls back to offline simulation.
    pub async fn establish(
        &self,
        events: &mut mpsc::Receiver<ChannelEvent>,
        init_timeout: Duration,
    ) {
        if self.is_offline() {
            return;
        }
        let mut deadline = tokio::time::Instant::now() + init_timeout;
        loop {
            let event = match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) => {
                    self.force_offline("channel did not become ready within the initialization timeout")
                        .await;
                    return;
                }
                Ok(None) => {
                    self.force_offline("channel event stream closed during initialization")
                        .await;
                    return;
                }
                Ok(Some(event)) => event,
            };
            match event {
                ChannelEvent::PairingRequired { token } => {
                    log::info!("pairing required; enter this token on the linked device: {}", token);
                    *self.link.write().await = LinkState::AwaitingPairing;
                    deadline = tokio::time::Instant::now() + PAIRING_GRACE;
                }
                ChannelEvent::Ready => {
                    log::info!("channel ready");
                    *self.link.write().await = LinkState::Ready;
                    return;
                }
                ChannelEvent::Disconnected { reason } => {
                    self.force_offline(&format!("channel disconnected during initialization: {}", reason))
                        .await;
                    return;
                }
                ChannelEvent::AuthFailure { reason } => {
                    log::error!("channel rejected credentials: {}", reason);
                    self.force_offline("authentication failure").await;
                    return;
                }
            }
        }
    }

    /// Handle a lifecycle event after initialization. Disconnects park the
    /// link (no automatic reconnect; restarting is operational); an auth
    /// failure still forces offline simulation at any time.
    pub async fn on_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Ready => {
                *self.link.write().await = LinkState::Ready;
            }
            ChannelEvent::PairingRequired { token } => {
                log::info!("pairing required; enter this token on the linked device: {}", token);
                *self.link.write().await = LinkState::AwaitingPairing;
            }
            ChannelEvent::Disconnected { reason } => {
                log::warn!("channel disconnected: {}; sends will be refused until restart", reason);
                *self.link.write().await = LinkState::Disconnected;
            }
            ChannelEvent::AuthFailure { reason } => {
                log::error!("channel rejected credentials: {}", reason);
                self.force_offline("authentication failure").await;
            }
        }
    }
}
