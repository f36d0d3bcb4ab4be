//! Messaging channel layer (live bridge transport and offline stand-in).
//!
//! `ChannelClient` is the one seam the rest of the engine talks through.
//! Lifecycle events and inbound messages arrive on mpsc streams owned by the
//! caller, so the dispatch loop controls backpressure and shutdown.

mod bridge;
mod client;
mod inbound;
mod offline;

pub use bridge::BridgeChannel;
pub use client::{ChannelClient, ChannelEvent, ChannelStatus, OutboundMessage, SendError};
pub use inbound::InboundMessage;
pub use offline::OfflineChannel;
