//! Telegram transport: dispatcher wiring and the membership probe.
//!
//! Everything here is glue. Inbound updates are decoded and routed into the
//! admin engine or the gate; whatever they return is sent back out. No
//! business rules live in this module.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, MaybeInaccessibleMessage, ParseMode, Recipient, UserId};
use tracing::{debug, error, info, warn};

use crate::admin::{AdminCommand, AdminEngine};
use crate::callback::CallbackCommand;
use crate::gate::{GateEngine, CHECK_LABEL};
use crate::traits::{MemberStatus, MembershipProbe};
use crate::types::Reply;

/// Membership lookups through the Bot API. Errors keep teloxide's error
/// text intact; the checker's classifier works on that text.
pub struct TelegramProbe {
    bot: Bot,
}

impl TelegramProbe {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MembershipProbe for TelegramProbe {
    async fn member_status(&self, channel_id: &str, user_id: u64) -> anyhow::Result<MemberStatus> {
        let member = self
            .bot
            .get_chat_member(recipient_for(channel_id), UserId(user_id))
            .await?;
        Ok(match member.kind {
            ChatMemberKind::Owner(_) => MemberStatus::Creator,
            ChatMemberKind::Administrator(_) => MemberStatus::Administrator,
            ChatMemberKind::Member => MemberStatus::Member,
            ChatMemberKind::Restricted(_) => MemberStatus::Restricted,
            ChatMemberKind::Left => MemberStatus::Left,
            ChatMemberKind::Banned(_) => MemberStatus::Kicked,
        })
    }
}

/// Normalized identities are either `@username` or a numeric chat id; both
/// map directly onto a Bot API recipient.
fn recipient_for(channel_id: &str) -> Recipient {
    match channel_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(channel_id.to_string()),
    }
}

pub struct TelegramGateway {
    bot: Bot,
    admin: AdminEngine,
    gate: GateEngine,
}

impl TelegramGateway {
    pub fn new(bot: Bot, admin: AdminEngine, gate: GateEngine) -> Self {
        Self { bot, admin, gate }
    }

    /// Run the dispatcher with automatic restart on crash.
    /// Exponential backoff 5s → 60s cap, reset after a stable run (60s+).
    pub async fn start_with_retry(self: Arc<Self>) {
        let initial_backoff = Duration::from_secs(5);
        let max_backoff = Duration::from_secs(60);
        let stable_threshold = Duration::from_secs(60);
        let mut backoff = initial_backoff;

        loop {
            info!("Starting Telegram dispatcher");
            let started = tokio::time::Instant::now();
            self.clone().start().await;
            let ran_for = started.elapsed();

            if ran_for >= stable_threshold {
                backoff = initial_backoff;
            }

            warn!(
                backoff_secs = backoff.as_secs(),
                ran_for_secs = ran_for.as_secs(),
                "Telegram dispatcher stopped, restarting"
            );
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, max_backoff);
        }
    }

    pub async fn start(self: Arc<Self>) {
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint({
                let gateway = Arc::clone(&self);
                move |msg: Message, bot: Bot| {
                    let gateway = Arc::clone(&gateway);
                    async move {
                        gateway.handle_message(msg, bot).await;
                        respond(())
                    }
                }
            }))
            .branch(Update::filter_callback_query().endpoint({
                let gateway = Arc::clone(&self);
                move |q: CallbackQuery, bot: Bot| {
                    let gateway = Arc::clone(&gateway);
                    async move {
                        gateway.handle_callback(q, bot).await;
                        respond(())
                    }
                }
            }));

        Dispatcher::builder(self.bot.clone(), handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_message(&self, msg: Message, bot: Bot) {
        let Some(user_id) = msg.from.as_ref().map(|u| u.id.0) else {
            return;
        };
        let Some(text) = msg.text() else {
            // Stickers, photos and the like carry no gate-relevant input.
            return;
        };
        let chat_id = msg.chat.id;

        if text.starts_with('/') {
            self.handle_command(text, chat_id, user_id, &bot).await;
            return;
        }

        let text = text.trim();

        if self.admin.is_admin(user_id) {
            // Reply-keyboard labels act as command aliases.
            if let Some(command) = AdminCommand::from_label(text) {
                let reply = self.admin.handle_command(user_id, command).await;
                self.send(&bot, chat_id, reply).await;
                return;
            }
            if let Some(reply) = self.admin.handle_text(user_id, text).await {
                self.send(&bot, chat_id, reply).await;
            }
            return;
        }

        if text == CHECK_LABEL {
            let reply = self.gate.check_for(user_id).await;
            self.send(&bot, chat_id, reply).await;
        }
        // Anything else from ordinary users is ignored.
    }

    async fn handle_command(&self, text: &str, chat_id: ChatId, user_id: u64, bot: &Bot) {
        // "/cmd@botname arg" -> "/cmd"
        let command = text
            .split_whitespace()
            .next()
            .map(|c| c.split('@').next().unwrap_or(c))
            .unwrap_or(text);

        if command == "/start" {
            let reply = if self.admin.is_admin(user_id) {
                self.gate.admin_help()
            } else {
                self.gate.check_for(user_id).await
            };
            self.send(bot, chat_id, reply).await;
            return;
        }

        if let Some(admin_command) = AdminCommand::parse(command) {
            let reply = self.admin.handle_command(user_id, admin_command).await;
            self.send(bot, chat_id, reply).await;
            return;
        }

        debug!(command, "Ignoring unknown command");
    }

    async fn handle_callback(&self, q: CallbackQuery, bot: Bot) {
        let user_id = q.from.id.0;
        let Some(data) = q.data.as_deref() else {
            let _ = bot.answer_callback_query(q.id).await;
            return;
        };

        let Some(command) = CallbackCommand::parse(data) else {
            warn!(data, "Unrecognized callback payload");
            let _ = bot.answer_callback_query(q.id).await;
            return;
        };

        let message = match q.message {
            Some(MaybeInaccessibleMessage::Regular(ref m)) => Some((m.chat.id, m.id)),
            _ => None,
        };

        if command == CallbackCommand::CheckSubscription {
            let outcome = self.gate.handle_check_callback(user_id).await;

            if let Some((chat_id, message_id)) = message {
                // Rewrite the message the button lives on; fall back to a
                // fresh send when the edit is rejected (message too old,
                // content unchanged).
                let mut edit = bot
                    .edit_message_text(chat_id, message_id, outcome.edit.text.clone())
                    .parse_mode(ParseMode::Html);
                if let Some(teloxide::types::ReplyMarkup::InlineKeyboard(markup)) =
                    outcome.edit.markup.clone()
                {
                    edit = edit.reply_markup(markup);
                }
                if let Err(e) = edit.await {
                    debug!("Edit failed, sending a new message: {e}");
                    self.send(&bot, chat_id, outcome.edit).await;
                }
            }

            let mut answer = bot.answer_callback_query(q.id).text(outcome.notice);
            if outcome.show_alert {
                answer = answer.show_alert(true);
            }
            if let Err(e) = answer.await {
                warn!("Failed to answer callback query: {e}");
            }
            return;
        }

        let reaction = self.admin.handle_callback(user_id, command).await;

        if let (Some((chat_id, _)), Some(reply)) = (message, reaction.message) {
            self.send(&bot, chat_id, reply).await;
        }

        let mut answer = bot.answer_callback_query(q.id);
        if let Some(notice) = reaction.notice {
            answer = answer.text(notice);
        }
        if reaction.show_alert {
            answer = answer.show_alert(true);
        }
        if let Err(e) = answer.await {
            warn!("Failed to answer callback query: {e}");
        }
    }

    async fn send(&self, bot: &Bot, chat_id: ChatId, reply: Reply) {
        let mut request = bot
            .send_message(chat_id, reply.text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = reply.markup {
            request = request.reply_markup(markup);
        }
        if let Err(e) = request.await {
            error!(chat_id = chat_id.0, "Failed to send message: {e}");
        }
    }
}
