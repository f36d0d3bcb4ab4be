//! Pure state transition function.
//!
//! Given the current state, the raw inbound text, and the contact, produce
//! the next state and the actions to perform. No I/O happens here; actions
//! that need a collaborator (order lookup, loyalty profile) are returned as
//! data and executed by the engine.

use super::replies;
use super::state::ConvState;
use crate::channels::OutboundMessage;

/// The remote participant of one conversation.
#[derive(Debug, Clone)]
pub struct Contact {
    pub id: String,
    pub display_name: String,
}

/// One thing the engine must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a canned outbound message as-is.
    Reply(OutboundMessage),
    /// Resolve the order through the lookup collaborator and send the result.
    LookupOrder { digits: String },
    /// Resolve the contact's loyalty profile and send a summary (or the
    /// generic explanation when no account is found).
    LoyaltySummary,
    /// Send the catalog summary, attaching the catalog file when configured.
    Catalog,
    /// Send current promotions, attaching the promo image when configured.
    Promotions,
    /// Raise the internal needs-human signal.
    NotifyHuman { note: Option<String> },
}

/// Result of one transition: next state plus the actions to run, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub next: ConvState,
    pub actions: Vec<Action>,
}

impl Step {
    fn stay(state: ConvState) -> Self {
        Self {
            next: state,
            actions: vec![],
        }
    }

    fn to_menu() -> Self {
        Self::stay(ConvState::MainMenu)
    }

    fn with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    fn reply(self, body: impl Into<String>) -> Self {
        self.with(Action::Reply(OutboundMessage::text(body)))
    }
}

/// Trim and lowercase, the only normalization applied before matching.
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "oi",
    "ola",
    "olá",
    "good morning",
    "good afternoon",
    "good evening",
    "bom dia",
    "boa tarde",
    "boa noite",
];

fn is_greeting(normalized: &str) -> bool {
    GREETINGS.contains(&normalized)
}

/// Keep only ASCII digits, the order-number validation rule.
fn digits_of(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// At least two characters and at least one letter.
fn plausible_name(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.chars().count() >= 2 && trimmed.chars().any(|c| c.is_alphabetic())
}

/// Minimal shape check: one `@` with a non-empty local part and a dotted domain.
fn plausible_email(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.contains(char::is_whitespace) {
        return false;
    }
    match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// The transition function. Total: every (state, input) pair has an outcome,
/// and it never fails — collaborator errors are the executing engine's
/// problem and degrade into fallback replies there.
pub fn transition(state: &ConvState, input: &str, contact: &Contact) -> Step {
    let normalized = normalize(input);
    match state {
        ConvState::MainMenu => main_menu(&normalized, contact),
        ConvState::AwaitingOrderNumber => awaiting_order_number(input),
        ConvState::AwaitingName => awaiting_name(input),
        ConvState::AwaitingEmail => awaiting_email(input),
    }
}

fn main_menu(normalized: &str, contact: &Contact) -> Step {
    match normalized {
        "1" => Step::to_menu().with(Action::Catalog),
        "2" => Step::to_menu().with(Action::LoyaltySummary),
        "3" => Step::stay(ConvState::AwaitingOrderNumber).reply(replies::ORDER_PROMPT),
        "4" => Step::to_menu().reply(replies::STORE_LOCATIONS),
        "5" => Step::to_menu()
            .reply(replies::HANDOFF_NOTICE)
            .with(Action::NotifyHuman { note: None }),
        "6" => Step::to_menu().with(Action::Promotions),
        "7" => Step::stay(ConvState::AwaitingName).reply(replies::ASK_NAME),
        "8" => Step::stay(ConvState::AwaitingEmail).reply(replies::ASK_EMAIL),
        g if is_greeting(g) => Step::to_menu().reply(replies::welcome(&contact.display_name)),
        _ => Step::to_menu().reply(replies::fallback_menu()),
    }
}

fn awaiting_order_number(input: &str) -> Step {
    let digits = digits_of(input);
    if digits.len() >= 3 {
        Step::to_menu().with(Action::LookupOrder { digits })
    } else {
        Step::stay(ConvState::AwaitingOrderNumber).reply(replies::INVALID_ORDER)
    }
}

fn awaiting_name(input: &str) -> Step {
    if plausible_name(input) {
        let name = input.trim().to_string();
        Step::to_menu()
            .reply(replies::signup_confirmed(&name))
            .with(Action::NotifyHuman {
                note: Some(format!("promo-list signup: {}", name)),
            })
    } else {
        Step::stay(ConvState::AwaitingName).reply(replies::INVALID_NAME)
    }
}

fn awaiting_email(input: &str) -> Step {
    if plausible_email(input) {
        let email = input.trim().to_string();
        Step::to_menu()
            .reply(replies::enrollment_received(&email))
            .with(Action::NotifyHuman {
                note: Some(format!("loyalty enrollment: {}", email)),
            })
    } else {
        Step::stay(ConvState::AwaitingEmail).reply(replies::INVALID_EMAIL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> Contact {
        Contact {
            id: "5511999990000".to_string(),
            display_name: "Marina".to_string(),
        }
    }

    fn first_text(step: &Step) -> &str {
        step.actions
            .iter()
            .find_map(|a| match a {
                Action::Reply(OutboundMessage::Text { body }) => Some(body.as_str()),
                _ => None,
            })
            .expect("step has a text reply")
    }

    #[test]
    fn greeting_gets_personalized_welcome() {
        let step = transition(&ConvState::MainMenu, "oi", &contact());
        assert_eq!(step.next, ConvState::MainMenu);
        let text = first_text(&step);
        assert!(text.contains("Marina"));
        assert!(text.contains("1 - see our catalog"));
    }

    #[test]
    fn greeting_without_display_name_still_welcomes() {
        let anon = Contact {
            id: "x".to_string(),
            display_name: String::new(),
        };
        let step = transition(&ConvState::MainMenu, "  HELLO  ", &anon);
        assert!(first_text(&step).starts_with("hello!"));
    }

    #[test]
    fn option_three_enters_order_flow() {
        let step = transition(&ConvState::MainMenu, "3", &contact());
        assert_eq!(step.next, ConvState::AwaitingOrderNumber);
        assert_eq!(first_text(&step), replies::ORDER_PROMPT);
    }

    #[test]
    fn option_five_raises_needs_human() {
        let step = transition(&ConvState::MainMenu, "5", &contact());
        assert_eq!(step.next, ConvState::MainMenu);
        assert!(step
            .actions
            .contains(&Action::NotifyHuman { note: None }));
    }

    #[test]
    fn unrecognized_input_resends_menu() {
        for input in ["", "   ", "?!?", "quero comprar", "99"] {
            let step = transition(&ConvState::MainMenu, input, &contact());
            assert_eq!(step.next, ConvState::MainMenu, "input {:?}", input);
            assert!(!step.actions.is_empty(), "input {:?}", input);
        }
    }

    #[test]
    fn short_digit_string_stays_in_order_flow() {
        let step = transition(&ConvState::AwaitingOrderNumber, "ab12", &contact());
        assert_eq!(step.next, ConvState::AwaitingOrderNumber);
        assert_eq!(first_text(&step), replies::INVALID_ORDER);
    }

    #[test]
    fn order_number_digits_are_extracted() {
        let step = transition(&ConvState::AwaitingOrderNumber, "#4521", &contact());
        assert_eq!(step.next, ConvState::MainMenu);
        assert_eq!(
            step.actions,
            vec![Action::LookupOrder {
                digits: "4521".to_string()
            }]
        );
    }

    #[test]
    fn valid_name_confirms_and_returns_to_menu() {
        let step = transition(&ConvState::AwaitingName, "  João Silva ", &contact());
        assert_eq!(step.next, ConvState::MainMenu);
        assert!(first_text(&step).contains("João Silva"));
    }

    #[test]
    fn invalid_name_reprompts() {
        for input in ["", "7", "!"] {
            let step = transition(&ConvState::AwaitingName, input, &contact());
            assert_eq!(step.next, ConvState::AwaitingName, "input {:?}", input);
        }
    }

    #[test]
    fn email_validation() {
        assert!(plausible_email("ana@example.com"));
        assert!(!plausible_email("ana@example"));
        assert!(!plausible_email("@example.com"));
        assert!(!plausible_email("ana example@x.com"));
        assert!(!plausible_email("no-at-sign"));
    }

    #[test]
    fn valid_email_returns_to_menu() {
        let step = transition(&ConvState::AwaitingEmail, "ana@example.com", &contact());
        assert_eq!(step.next, ConvState::MainMenu);
        assert!(first_text(&step).contains("ana@example.com"));
    }

    #[test]
    fn transition_is_deterministic() {
        let states = [
            ConvState::MainMenu,
            ConvState::AwaitingName,
            ConvState::AwaitingEmail,
            ConvState::AwaitingOrderNumber,
        ];
        let inputs = ["oi", "3", "#4521", "", "xyz", "ana@example.com"];
        for state in &states {
            for input in &inputs {
                let a = transition(state, input, &contact());
                let b = transition(state, input, &contact());
                assert_eq!(a, b, "state {:?} input {:?}", state, input);
            }
        }
    }

    #[test]
    fn transition_is_total() {
        // Every state handles empty, punctuation-only, and unknown tokens
        // with a non-empty action list: the bot always replies with something.
        let states = [
            ConvState::MainMenu,
            ConvState::AwaitingName,
            ConvState::AwaitingEmail,
            ConvState::AwaitingOrderNumber,
        ];
        let inputs = ["", "   ", "...", "!!!", "unknown token", "0", "🤖"];
        for state in &states {
            for input in &inputs {
                let step = transition(state, input, &contact());
                assert!(
                    !step.actions.is_empty(),
                    "state {:?} input {:?} produced no actions",
                    state,
                    input
                );
            }
        }
    }
}
