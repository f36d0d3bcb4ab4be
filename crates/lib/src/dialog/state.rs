//! Conversation states and their persisted names.

/// Where one contact's conversation currently is.
///
/// `MainMenu` is both the initial state and the return point of every flow;
/// the `Awaiting*` leaf states re-prompt on invalid input and stay put.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConvState {
    #[default]
    MainMenu,
    AwaitingName,
    AwaitingEmail,
    AwaitingOrderNumber,
}

impl ConvState {
    /// Name used in the persisted state file.
    pub fn as_name(&self) -> &'static str {
        match self {
            Self::MainMenu => "MAIN_MENU",
            Self::AwaitingName => "AWAITING_NAME",
            Self::AwaitingEmail => "AWAITING_EMAIL",
            Self::AwaitingOrderNumber => "AWAITING_ORDER_NUMBER",
        }
    }

    /// Parse a persisted name. Unrecognized values heal to `MainMenu` so a
    /// hand-edited or stale file can never wedge a contact.
    pub fn from_name(name: &str) -> Self {
        match name {
            "AWAITING_NAME" => Self::AwaitingName,
            "AWAITING_EMAIL" => Self::AwaitingEmail,
            "AWAITING_ORDER_NUMBER" => Self::AwaitingOrderNumber,
            "MAIN_MENU" => Self::MainMenu,
            other => {
                log::warn!("unknown conversation state {:?}, defaulting to MAIN_MENU", other);
                Self::MainMenu
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for state in [
            ConvState::MainMenu,
            ConvState::AwaitingName,
            ConvState::AwaitingEmail,
            ConvState::AwaitingOrderNumber,
        ] {
            assert_eq!(ConvState::from_name(state.as_name()), state);
        }
    }

    #[test]
    fn unknown_name_heals_to_main_menu() {
        assert_eq!(ConvState::from_name("AWAITING_CPF"), ConvState::MainMenu);
        assert_eq!(ConvState::from_name(""), ConvState::MainMenu);
    }
}
