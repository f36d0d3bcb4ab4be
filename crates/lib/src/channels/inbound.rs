//! Inbound message from the channel: delivered to the engine for a dialog turn.

/// A text message from a contact, normalized to what the dialog engine needs.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Opaque channel-scoped contact identifier.
    pub contact_id: String,
    /// Display name as reported by the channel; may be empty.
    pub display_name: String,
    pub text: String,
}
