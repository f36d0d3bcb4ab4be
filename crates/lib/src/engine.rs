//! Per-turn orchestration: load state, run the pure transition, persist,
//! execute actions.
//!
//! Failures inside one contact's turn never escalate: collaborator errors
//! degrade into fallback replies and persistence errors leave the in-memory
//! map authoritative. The contact always gets a reply.

use crate::channels::InboundMessage;
use crate::config::MediaConfig;
use crate::dialog::{self, Action, Contact};
use crate::dispatch::DispatchController;
use crate::loyalty::LoyaltyService;
use crate::orders::OrderLookup;
use crate::store::ConversationStateStore;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Internal needs-human signal raised by menu option 5 and signup flows.
#[derive(Debug, Clone)]
pub struct Handoff {
    pub contact_id: String,
    pub display_name: String,
    /// Extra context (e.g. the captured signup name), when there is any.
    pub note: Option<String>,
}

/// The dialog engine runtime: one instance serves every contact.
pub struct Engine {
    store: Arc<ConversationStateStore>,
    dispatch: Arc<DispatchController>,
    orders: Arc<dyn OrderLookup>,
    loyalty: Arc<dyn LoyaltyService>,
    media: MediaConfig,
    handoff_tx: mpsc::UnboundedSender<Handoff>,
}

impl Engine {
    pub fn new(
        store: Arc<ConversationStateStore>,
        dispatch: Arc<DispatchController>,
        orders: Arc<dyn OrderLookup>,
        loyalty: Arc<dyn LoyaltyService>,
        media: MediaConfig,
        handoff_tx: mpsc::UnboundedSender<Handoff>,
    ) -> Self {
        Self {
            store,
            dispatch,
            orders,
            loyalty,
            media,
            handoff_tx,
        }
    }

    /// Process one inbound message: transition the contact's state, persist
    /// it (write-through), then run the resulting actions in order.
    pub async fn handle_inbound(&self, msg: &InboundMessage) {
        let contact = Contact {
            id: msg.contact_id.clone(),
            display_name: msg.display_name.clone(),
        };
        let state = self.store.get(&contact.id).await;
        let step = dialog::transition(&state, &msg.text, &contact);
        log::debug!(
            "contact {}: {} -> {}",
            contact.id,
            state.as_name(),
            step.next.as_name()
        );
        self.store.set(&contact.id, step.next).await;
        if let Err(e) = self.store.persist().await {
            // In-memory state stays authoritative; at risk of loss until the
            // next successful persist.
            log::error!("persisting conversation state failed: {}", e);
        }
        for action in step.actions {
            self.run_action(&contact, action).await;
        }
    }

    async fn run_action(&self, contact: &Contact, action: Action) {
        match action {
            Action::Reply(message) => {
                let _ = self.dispatch.send(&contact.id, &message).await;
            }
            Action::Catalog => self.send_catalog(contact).await,
            Action::Promotions => self.send_promotions(contact).await,
            Action::LoyaltySummary => self.send_loyalty_summary(contact).await,
            Action::LookupOrder { digits } => self.send_order_status(contact, &digits).await,
            Action::NotifyHuman { note } => {
                log::warn!(
                    "needs human: contact {} ({}){}",
                    contact.id,
                    contact.display_name,
                    note.as_deref()
                        .map(|n| format!(" - {}", n))
                        .unwrap_or_default()
                );
                let _ = self.handoff_tx.send(Handoff {
                    contact_id: contact.id.clone(),
                    display_name: contact.display_name.clone(),
                    note,
                });
            }
        }
    }

    async fn send_catalog(&self, contact: &Contact) {
        let _ = self
            .dispatch
            .send_text(&contact.id, dialog::replies::CATALOG_SUMMARY)
            .await;
        if let Some(ref path) = self.media.catalog_document {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "catalog.pdf".to_string());
            let _ = self
                .dispatch
                .send_document(&contact.id, &path.to_string_lossy(), &filename)
                .await;
        }
    }

    async fn send_promotions(&self, contact: &Contact) {
        let _ = self
            .dispatch
            .send_text(&contact.id, dialog::replies::PROMOTIONS)
            .await;
        if let Some(ref path) = self.media.promo_image {
            let _ = self
                .dispatch
                .send_image(
                    &contact.id,
                    &path.to_string_lossy(),
                    "this week's promotions",
                )
                .await;
        }
    }

    async fn send_loyalty_summary(&self, contact: &Contact) {
        let reply = match self.loyalty.profile(&contact.id).await {
            Ok(Some(profile)) => dialog::replies::loyalty_summary(&profile),
            Ok(None) => dialog::replies::LOYALTY_FALLBACK.to_string(),
            Err(e) => {
                log::warn!("loyalty profile for {} failed: {}", contact.id, e);
                dialog::replies::LOYALTY_FALLBACK.to_string()
            }
        };
        let _ = self.dispatch.send_text(&contact.id, &reply).await;
    }

    async fn send_order_status(&self, contact: &Contact, digits: &str) {
        let reply = match self.orders.lookup(digits).await {
            Ok(Some(info)) => dialog::replies::order_status(digits, &info),
            Ok(None) => dialog::replies::order_not_found(digits),
            Err(e) => {
                log::warn!("order lookup {} for {} failed: {}", digits, contact.id, e);
                dialog::replies::ORDER_LOOKUP_FAILED.to_string()
            }
        };
        let _ = self.dispatch.send_text(&contact.id, &reply).await;
    }
}
