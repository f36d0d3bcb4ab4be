//! Per-contact dialog state machine.
//!
//! `transition` is a pure function from (state, input, contact) to the next
//! state plus a list of actions; all I/O (collaborator lookups, sends) happens
//! in the engine that executes the actions. Every (state, input) pair has a
//! defined outcome, so a contact can never get stuck without a reply.

pub mod replies;
mod state;
mod transition;

pub use state::ConvState;
pub use transition::{normalize, transition, Action, Contact, Step};
