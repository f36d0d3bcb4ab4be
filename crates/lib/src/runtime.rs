//! Process wiring: channel startup, inbound fan-out, broadcast entry point,
//! and graceful shutdown.
//!
//! Inbound messages are fanned out to one worker queue per contact, so turns
//! for the same contact run in arrival order while different contacts never
//! wait on each other (and never on a running broadcast).

use crate::channels::{
    BridgeChannel, ChannelClient, ChannelEvent, ChannelStatus, InboundMessage,
};
use crate::config::{self, Config};
use crate::dispatch::{BroadcastJob, BroadcastReport, CancelFlag, DispatchController};
use crate::engine::{Engine, Handoff};
use crate::init;
use crate::loyalty::HttpLoyaltyService;
use crate::mode::ModeController;
use crate::orders::HttpOrderLookup;
use crate::store::ConversationStateStore;
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Per-contact queue capacity. A contact this far behind is typing faster
/// than we can answer; backpressure on the router is fine then.
const WORKER_QUEUE: usize = 32;

/// Fans inbound messages out to a single-consumer queue per contact.
pub struct ContactRouter {
    engine: Arc<Engine>,
    workers: tokio::sync::Mutex<HashMap<String, mpsc::Sender<InboundMessage>>>,
}

impl ContactRouter {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            workers: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Enqueue a message on its contact's worker, spawning the worker on the
    /// contact's first message.
    pub async fn route(&self, msg: InboundMessage) {
        let tx = {
            let mut workers = self.workers.lock().await;
            match workers.get(&msg.contact_id) {
                Some(tx) if !tx.is_closed() => tx.clone(),
                _ => {
                    let (tx, mut rx) = mpsc::channel::<InboundMessage>(WORKER_QUEUE);
                    let engine = self.engine.clone();
                    let contact_id = msg.contact_id.clone();
                    tokio::spawn(async move {
                        while let Some(m) = rx.recv().await {
                            engine.handle_inbound(&m).await;
                        }
                        log::debug!("worker for contact {} stopped", contact_id);
                    });
                    workers.insert(msg.contact_id.clone(), tx.clone());
                    tx
                }
            }
        };
        if tx.send(msg).await.is_err() {
            log::warn!("inbound: worker queue closed, message dropped");
        }
    }
}

/// Build the mode controller: live bridge with bounded initialization, or
/// offline simulation when requested. Returns the controller plus the
/// channel's background task handles.
async fn establish_mode(
    config: &Config,
    force_offline: bool,
    event_tx: mpsc::Sender<ChannelEvent>,
    inbound_tx: mpsc::Sender<InboundMessage>,
    event_rx: &mut mpsc::Receiver<ChannelEvent>,
) -> (Arc<ModeController>, Vec<JoinHandle<()>>) {
    if force_offline || config.channel.offline {
        log::info!("starting in offline simulation mode");
        return (Arc::new(ModeController::offline()), Vec::new());
    }
    let live = Arc::new(BridgeChannel::new(
        Some(config.channel.bridge_url.clone()),
        config::resolve_bridge_token(config),
    ));
    let task = live.clone().start_inbound(event_tx, inbound_tx);
    let mode = Arc::new(ModeController::new(live));
    mode.establish(event_rx, config::init_timeout(config)).await;
    (mode, vec![task])
}

/// Run the conversational engine until SIGINT/SIGTERM.
///
/// Requires the configuration directory to be initialized (`atende init`).
pub async fn run(config: Config, config_path: PathBuf, force_offline: bool) -> Result<()> {
    init::require_initialized(&config_path)?;
    let state_path = config::resolve_state_path(&config, &config_path);
    let store = Arc::new(ConversationStateStore::load(&state_path).await);

    let (event_tx, mut event_rx) = mpsc::channel::<ChannelEvent>(16);
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<InboundMessage>(64);
    let (mode, channel_tasks) = establish_mode(
        &config,
        force_offline,
        event_tx.clone(),
        inbound_tx.clone(),
        &mut event_rx,
    )
    .await;

    // Lifecycle events after initialization (disconnects, auth failures).
    {
        let mode = mode.clone();
        tokio::spawn(async move {
            while let Some(ev) = event_rx.recv().await {
                mode.on_event(ev).await;
            }
        });
    }

    let dispatch = Arc::new(DispatchController::new(mode.clone()));
    let (handoff_tx, mut handoff_rx) = mpsc::unbounded_channel::<Handoff>();
    tokio::spawn(async move {
        while let Some(h) = handoff_rx.recv().await {
            log::warn!(
                "handoff: contact {} ({}) is waiting for a person{}",
                h.contact_id,
                h.display_name,
                h.note.map(|n| format!(" - {}", n)).unwrap_or_default()
            );
        }
    });

    let orders = Arc::new(HttpOrderLookup::new(config.orders.base_url.clone()));
    let loyalty = Arc::new(HttpLoyaltyService::new(config.loyalty.base_url.clone()));
    let media = config::resolve_media(&config, &config_path);
    let engine = Arc::new(Engine::new(
        store.clone(),
        dispatch,
        orders,
        loyalty,
        media,
        handoff_tx,
    ));
    let router = ContactRouter::new(engine);

    log::info!(
        "atende running in {} mode, state file {}",
        if mode.is_offline() { "offline" } else { "live" },
        state_path.display()
    );
    loop {
        tokio::select! {
            _ = shutdown_signal() => break,
            msg = inbound_rx.recv() => match msg {
                Some(msg) => router.route(msg).await,
                None => break,
            }
        }
    }

    log::info!("shutting down: stopping channel and persisting state");
    mode.stop();
    if let Err(e) = store.persist().await {
        log::error!("final state persist failed: {}", e);
    }
    for h in channel_tasks {
        let _ = h.await;
    }
    log::info!("stopped");
    Ok(())
}

/// Run one broadcast job and return its per-recipient report. This is the
/// entry point the surrounding admin tooling consumes.
///
/// The job is cancelled cooperatively on SIGINT/SIGTERM: the loop stops
/// before the next recipient and the partial report is returned.
pub async fn run_broadcast(
    config: &Config,
    job: BroadcastJob,
    force_offline: bool,
) -> Result<BroadcastReport> {
    let (event_tx, mut event_rx) = mpsc::channel::<ChannelEvent>(16);
    // Inbound messages are not processed during a one-shot broadcast; the
    // receiver is kept alive so the bridge loop does not stop early.
    let (inbound_tx, _inbound_rx) = mpsc::channel::<InboundMessage>(64);
    let (mode, channel_tasks) = establish_mode(
        config,
        force_offline,
        event_tx.clone(),
        inbound_tx.clone(),
        &mut event_rx,
    )
    .await;
    if !mode.is_offline() && !mode.is_ready().await {
        anyhow::bail!(
            "channel is not ready (link is {}); cannot broadcast",
            mode.link_state().await.as_str()
        );
    }

    let dispatch = DispatchController::new(mode.clone());
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancel.cancel();
        });
    }

    let report = dispatch.broadcast(&job, &cancel).await;
    mode.stop();
    for h in channel_tasks {
        let _ = h.await;
    }
    Ok(report)
}

/// Query the bridge for its current status (for the `status` subcommand).
pub async fn channel_status(config: &Config) -> ChannelStatus {
    let bridge = BridgeChannel::new(
        Some(config.channel.bridge_url.clone()),
        config::resolve_bridge_token(config),
    );
    bridge.status().await
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}
