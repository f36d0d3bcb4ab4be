//! Canned reply texts for the dialog engine.
//!
//! Kept in one place so the wording can be tuned without touching the state
//! machine. The engine fills in collaborator data (order status, loyalty
//! points) through the formatting helpers here.

use crate::loyalty::LoyaltyProfile;
use crate::orders::OrderInfo;

pub const MENU: &str = "\
how can i help you today?\n\
1 - see our catalog\n\
2 - loyalty program and your points\n\
3 - track an order\n\
4 - store locations and hours\n\
5 - talk to a person\n\
6 - current promotions\n\
7 - join our promo list\n\
8 - enroll in the loyalty program\n\
\n\
reply with the number of an option.";

pub const CATALOG_SUMMARY: &str = "\
our catalog covers clothing, footwear and accessories, with new arrivals \
every week. the full catalog with prices is on its way as a file; if it \
does not arrive, ask any of our attendants in store.";

pub const STORE_LOCATIONS: &str = "\
you can find us at:\n\
- downtown: 123 main st, mon-sat 9am-7pm\n\
- north mall: av. central 456, every day 10am-10pm\n\
- online: orders placed before 3pm ship the same day.";

pub const PROMOTIONS: &str = "\
this week's promotions:\n\
- 20% off the winter collection\n\
- buy 2 t-shirts, get a 3rd free\n\
- free shipping on orders over 199.";

pub const ORDER_PROMPT: &str =
    "sure! send me your order number (the digits on your receipt or confirmation email).";

pub const INVALID_ORDER: &str =
    "that does not look like an order number. send at least 3 digits, please.";

pub const ORDER_LOOKUP_FAILED: &str =
    "i could not fetch your order status right now. please try again in a few minutes.";

pub const HANDOFF_NOTICE: &str = "\
no problem! i've flagged your conversation for our team and someone will \
reply here as soon as possible.";

pub const ASK_NAME: &str =
    "great! what name should we use for the promo list? (reply with just your name)";

pub const INVALID_NAME: &str =
    "i didn't catch that. reply with just your name, please (at least 2 letters).";

pub const ASK_EMAIL: &str =
    "to enroll in the loyalty program, reply with your email address.";

pub const INVALID_EMAIL: &str =
    "that does not look like an email address. try again, like name@example.com.";

pub const LOYALTY_FALLBACK: &str = "\
our loyalty program gives you 1 point per unit of currency spent; points turn \
into discounts at checkout. i could not find an account for this number - \
reply 8 to enroll.";

pub fn welcome(display_name: &str) -> String {
    let name = display_name.trim();
    if name.is_empty() {
        format!("hello! welcome to our store.\n\n{}", MENU)
    } else {
        format!("hello, {}! welcome to our store.\n\n{}", name, MENU)
    }
}

pub fn fallback_menu() -> String {
    format!("sorry, i didn't understand that.\n\n{}", MENU)
}

pub fn signup_confirmed(name: &str) -> String {
    format!(
        "thanks, {}! you're on our promo list and will hear about new offers here.",
        name
    )
}

pub fn enrollment_received(email: &str) -> String {
    format!(
        "got it! we'll finish your loyalty enrollment with {} and confirm here shortly.",
        email
    )
}

pub fn order_not_found(digits: &str) -> String {
    format!(
        "i could not find an order with number {}. double-check the digits or reply 5 to talk to a person.",
        digits
    )
}

pub fn order_status(digits: &str, info: &OrderInfo) -> String {
    let mut out = format!("order {}: {}\n", digits, info.status);
    if let Some(ref eta) = info.eta {
        out.push_str(&format!("estimated delivery: {}\n", eta));
    }
    if let Some(ref address) = info.address {
        out.push_str(&format!("shipping to: {}\n", address));
    }
    if !info.items.is_empty() {
        out.push_str("items:\n");
        for item in &info.items {
            out.push_str(&format!("- {}\n", item));
        }
    }
    out.push_str(&format!("total: {}", info.total));
    out
}

pub fn loyalty_summary(profile: &LoyaltyProfile) -> String {
    format!(
        "you have {} points ({} tier) - that's {}% off your next purchase. points turn into discounts automatically at checkout.",
        profile.points, profile.level_name, profile.discount_percent
    )
}
