//! User-facing gate: check the subscription, hand out the access links.

use std::sync::Arc;

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
};
use tracing::{error, info};

use crate::callback::CallbackCommand;
use crate::subscription::{SubscriptionChecker, SubscriptionVerdict};
use crate::traits::LinkStore;
use crate::types::Reply;
use crate::utils::html_escape;

/// Reply-keyboard label for the user-side re-check. Part of the protocol:
/// incoming text is matched against it verbatim.
pub const CHECK_LABEL: &str = "Check subscription";

/// What a `CHECK_SUBSCRIPTION` button press turns into: an in-place edit of
/// the originating message plus the callback-query answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub edit: Reply,
    pub notice: String,
    pub show_alert: bool,
}

pub struct GateEngine {
    links: Arc<dyn LinkStore>,
    checker: SubscriptionChecker,
}

impl GateEngine {
    pub fn new(links: Arc<dyn LinkStore>, checker: SubscriptionChecker) -> Self {
        Self { links, checker }
    }

    /// `/start` for an admin: the command overview plus the persistent
    /// admin keyboard.
    pub fn admin_help(&self) -> Reply {
        let text = "<b>Available commands:</b>\n\n\
             <b>Channel management:</b>\n\
             • /admin_add_channel — add a required channel\n\
             • /admin_list_channels — show all channels\n\
             • /admin_remove_channel — remove a channel\n\n\
             <b>Access link management:</b>\n\
             • /admin_add_link — add an access link\n\
             • /admin_list_links — show all links\n\
             • /admin_remove_link — remove a link";

        let keyboard = KeyboardMarkup::new(vec![
            vec![
                KeyboardButton::new("Add channel"),
                KeyboardButton::new("List channels"),
            ],
            vec![KeyboardButton::new("Remove channel")],
            vec![
                KeyboardButton::new("Add link"),
                KeyboardButton::new("List links"),
            ],
            vec![KeyboardButton::new("Remove link")],
        ])
        .resize_keyboard();

        Reply::with_markup(text, keyboard)
    }

    /// `/start` (or the "Check subscription" label) for an ordinary user.
    pub async fn check_for(&self, user_id: u64) -> Reply {
        let verdict = self.checker.check(user_id).await;
        let keyboard =
            KeyboardMarkup::new(vec![vec![KeyboardButton::new(CHECK_LABEL)]]).resize_keyboard();

        if verdict.ok {
            info!(user_id, "Subscription check passed");
            Reply::with_markup(self.success_text().await, keyboard)
        } else {
            info!(
                user_id,
                failed = verdict.failed_channels.len(),
                "Subscription check failed"
            );
            Reply::with_markup(required_text(&verdict), keyboard)
        }
    }

    /// The `CHECK_SUBSCRIPTION` button: re-check and rewrite the message the
    /// button lives on.
    pub async fn handle_check_callback(&self, user_id: u64) -> CheckOutcome {
        let verdict = self.checker.check(user_id).await;

        if verdict.ok {
            info!(user_id, "Subscription re-check passed");
            CheckOutcome {
                edit: Reply::text(self.success_text().await),
                notice: "✅ Access granted!".to_string(),
                show_alert: false,
            }
        } else {
            CheckOutcome {
                edit: Reply::with_markup(required_text(&verdict), check_button()),
                notice: "❌ You are not subscribed to all channels.".to_string(),
                show_alert: true,
            }
        }
    }

    async fn success_text(&self) -> String {
        format!(
            "✅ Great! You are subscribed to all required channels.\n\n{}",
            self.access_message().await
        )
    }

    async fn access_message(&self) -> String {
        let links = match self.links.list_links().await {
            Ok(links) => links,
            Err(e) => {
                error!("Failed to load access links: {e:#}");
                return "🔗 Could not load the access links. Please try again later.".to_string();
            }
        };
        if links.is_empty() {
            return "🔗 The access link is not set yet. Contact an administrator.".to_string();
        }

        let mut message = "<b>You now have exclusive access:</b>\n\n".to_string();
        for (index, link) in links.iter().enumerate() {
            message.push_str(&format!("{}. {}\n", index + 1, html_escape(&link.url)));
        }
        message
    }
}

fn check_button() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        CHECK_LABEL,
        CallbackCommand::CheckSubscription.encode(),
    )]])
}

fn required_text(verdict: &SubscriptionVerdict) -> String {
    // A load failure produces no channel rows; showing an empty "required"
    // list would read as "subscribe to nothing".
    if verdict.failed_channels.is_empty() {
        return "❌ Could not check your subscription. Please try again later.".to_string();
    }

    let mut message = "❌ You are not subscribed to all required channels.\n\n\
         📋 <b>Required channels:</b>\n"
        .to_string();
    for channel in &verdict.failed_channels {
        message.push_str(&format!("• {}\n", format_channel_link(channel)));
    }
    message.push_str("\n👇 Subscribe to every channel and press the button below to re-check.");
    message
}

/// Render a channel identity as something tappable: usernames become t.me
/// links, numeric ids stay as plain code (there is nothing to link to).
fn format_channel_link(channel: &str) -> String {
    if let Some(name) = channel.strip_prefix('@') {
        format!(
            "<a href=\"https://t.me/{}\">{}</a>",
            html_escape(name),
            html_escape(channel)
        )
    } else {
        format!("<code>Channel {}</code>", html_escape(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_become_links() {
        assert_eq!(
            format_channel_link("@news"),
            "<a href=\"https://t.me/news\">@news</a>"
        );
    }

    #[test]
    fn numeric_ids_stay_plain() {
        assert_eq!(
            format_channel_link("-1001234"),
            "<code>Channel -1001234</code>"
        );
    }

    #[test]
    fn required_text_lists_failed_channels_in_order() {
        let verdict = SubscriptionVerdict {
            ok: false,
            failed_channels: vec!["@a".to_string(), "-100".to_string()],
            errors: Vec::new(),
        };
        let text = required_text(&verdict);
        let a = text.find("@a").unwrap();
        let b = text.find("-100").unwrap();
        assert!(a < b);
        assert!(text.contains("Required channels"));
    }

    #[test]
    fn system_failure_renders_generic_error() {
        let verdict = SubscriptionVerdict {
            ok: false,
            failed_channels: Vec::new(),
            errors: Vec::new(),
        };
        assert!(required_text(&verdict).contains("Could not check"));
    }
}
