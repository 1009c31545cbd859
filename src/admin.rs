//! Multi-step admin flows: add/remove required channels and access links.
//!
//! Each flow is one prompt and one terminal input (typed text or a button
//! tap). State between the two lives in the [`SessionStore`]; the terminal
//! input consumes it no matter how the step ends.

use std::sync::Arc;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{error, info, warn};

use crate::callback::CallbackCommand;
use crate::normalize::normalize_channel;
use crate::pagination::{paginate, Page, PAGE_SIZE};
use crate::session::SessionStore;
use crate::subscription::classify_membership_error;
use crate::traits::{AccessLink, Channel, ChannelStore, LinkStore, MembershipProbe};
use crate::types::{AdminAction, CallbackReply, ConversationState, FlowStep, Reply};
use crate::utils::{html_escape, truncate_str};

/// Fixed denial shown to non-admins invoking the admin surface.
pub const ACCESS_DENIED: &str = "❌ You do not have permission to run this command.";
/// Alert shown when a button refers to a flow that no longer exists.
pub const SESSION_EXPIRED: &str = "Session expired";

/// An admin surface entry point: slash command or reply-keyboard label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    AddChannel,
    RemoveChannel,
    ListChannels,
    AddLink,
    ListLinks,
    RemoveLink,
}

impl AdminCommand {
    pub fn parse(command: &str) -> Option<Self> {
        match command {
            "/admin_add_channel" => Some(Self::AddChannel),
            "/admin_remove_channel" => Some(Self::RemoveChannel),
            "/admin_list_channels" => Some(Self::ListChannels),
            "/admin_add_link" => Some(Self::AddLink),
            "/admin_list_links" => Some(Self::ListLinks),
            "/admin_remove_link" => Some(Self::RemoveLink),
            _ => None,
        }
    }

    /// Reply-keyboard labels double as command aliases. Exact match: the
    /// labels are part of the protocol.
    pub fn from_label(text: &str) -> Option<Self> {
        match text {
            "Add channel" => Some(Self::AddChannel),
            "Remove channel" => Some(Self::RemoveChannel),
            "List channels" => Some(Self::ListChannels),
            "Add link" => Some(Self::AddLink),
            "List links" => Some(Self::ListLinks),
            "Remove link" => Some(Self::RemoveLink),
            _ => None,
        }
    }
}

pub struct AdminEngine {
    channels: Arc<dyn ChannelStore>,
    links: Arc<dyn LinkStore>,
    probe: Arc<dyn MembershipProbe>,
    pub(crate) sessions: SessionStore,
    admin_ids: Vec<u64>,
    /// The bot's own user id, used to probe its access to a channel before
    /// that channel is persisted.
    bot_user_id: u64,
}

impl AdminEngine {
    pub fn new(
        channels: Arc<dyn ChannelStore>,
        links: Arc<dyn LinkStore>,
        probe: Arc<dyn MembershipProbe>,
        sessions: SessionStore,
        admin_ids: Vec<u64>,
        bot_user_id: u64,
    ) -> Self {
        Self {
            channels,
            links,
            probe,
            sessions,
            admin_ids,
            bot_user_id,
        }
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Entry point for the six admin commands (and their label aliases).
    pub async fn handle_command(&self, user_id: u64, command: AdminCommand) -> Reply {
        if !self.is_admin(user_id) {
            return Reply::text(ACCESS_DENIED);
        }

        match command {
            AdminCommand::AddChannel => {
                self.sessions
                    .set(user_id, ConversationState::waiting_input(AdminAction::AddChannel))
                    .await;
                Reply::text(
                    "Enter the channel to add:\n\nExamples:\n• @mychannel\n• https://t.me/mychannel",
                )
            }
            AdminCommand::AddLink => {
                self.sessions
                    .set(user_id, ConversationState::waiting_input(AdminAction::AddLink))
                    .await;
                Reply::text(
                    "Enter the access link to add:\n\nExamples:\n• https://example.com/access\n• https://t.me/+mylink",
                )
            }
            AdminCommand::ListChannels => self.render_channel_list(0).await,
            AdminCommand::ListLinks => self.render_link_list(0).await,
            AdminCommand::RemoveChannel => {
                self.start_removal(user_id, AdminAction::RemoveChannel).await
            }
            AdminCommand::RemoveLink => self.start_removal(user_id, AdminAction::RemoveLink).await,
        }
    }

    /// Free-text input from an admin. Returns `None` when no flow is waiting
    /// for input (the message is unrelated chatter).
    ///
    /// The session is consumed before the step runs: a flow is one input
    /// attempt, cleanup cannot be skipped by an error path, and a rapid
    /// second message for the same user finds no session instead of
    /// re-running the flow.
    pub async fn handle_text(&self, user_id: u64, text: &str) -> Option<Reply> {
        if !self.is_admin(user_id) {
            return None;
        }
        let state = self
            .sessions
            .take_if(user_id, |s| s.step == FlowStep::WaitingInput)
            .await?;

        let text = text.trim();
        let reply = match state.action {
            AdminAction::AddChannel => self.add_channel(user_id, text).await,
            AdminAction::RemoveChannel => self.remove_channel_by_text(text).await,
            AdminAction::AddLink => self.add_link(user_id, text).await,
            AdminAction::RemoveLink => self.remove_link_by_text(text).await,
        };
        Some(reply)
    }

    /// Inline-button interactions on the admin surface.
    pub async fn handle_callback(&self, user_id: u64, command: CallbackCommand) -> CallbackReply {
        match command {
            CallbackCommand::ListChannelsPage(page) => {
                CallbackReply::message(self.render_channel_list(page).await)
            }
            CallbackCommand::ListLinksPage(page) => {
                CallbackReply::message(self.render_link_list(page).await)
            }
            CallbackCommand::NextPageRemoveChannel => {
                self.turn_removal_page(user_id, AdminAction::RemoveChannel, 1).await
            }
            CallbackCommand::PrevPageRemoveChannel => {
                self.turn_removal_page(user_id, AdminAction::RemoveChannel, -1).await
            }
            CallbackCommand::NextPageRemoveLink => {
                self.turn_removal_page(user_id, AdminAction::RemoveLink, 1).await
            }
            CallbackCommand::PrevPageRemoveLink => {
                self.turn_removal_page(user_id, AdminAction::RemoveLink, -1).await
            }
            CallbackCommand::SelectRemoveChannel(id) => {
                self.select_removal(user_id, AdminAction::RemoveChannel, &id).await
            }
            CallbackCommand::SelectRemoveLink(id) => {
                self.select_removal(user_id, AdminAction::RemoveLink, &id).await
            }
            // Routed to the gate by the transport; acknowledged here so the
            // match stays exhaustive.
            CallbackCommand::CheckSubscription => CallbackReply::ack(),
        }
    }

    // ---------------------------------------------------------------------
    // Add flows
    // ---------------------------------------------------------------------

    async fn add_channel(&self, user_id: u64, input: &str) -> Reply {
        let identity = normalize_channel(input);
        match self.try_add_channel(user_id, &identity).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(channel = %identity, "Failed to add channel: {e:#}");
                Reply::text("❌ Failed to add the channel. Check the input and try again.")
            }
        }
    }

    async fn try_add_channel(&self, user_id: u64, identity: &str) -> anyhow::Result<Reply> {
        let display = html_escape(identity);

        if self.channels.find_channel(identity).await?.is_some() {
            return Ok(Reply::text(format!("⚠️ Channel {display} is already added.")));
        }

        // The bot can only verify subscriptions for channels it can see, so
        // probe its own membership before persisting anything.
        match self.probe.member_status(identity, self.bot_user_id).await {
            Ok(status) if status.is_subscribed() => {}
            Ok(_) => {
                return Ok(Reply::text(format!(
                    "⚠️ The bot is not in channel {display}. \
                     Add the bot to the channel and try again."
                )));
            }
            Err(e) => {
                let raw = format!("{e:#}");
                warn!(channel = %identity, error = %raw, "Channel access check failed");
                return Ok(Reply::text(format!(
                    "⚠️ Could not verify access to channel {display}.\n\n{}",
                    classify_membership_error(&raw, &display)
                )));
            }
        }

        let channel = self.channels.create_channel(identity, user_id).await?;
        info!(channel = %channel.channel_id, added_by = user_id, "Channel added");
        Ok(Reply::text(format!(
            "✅ Channel {} was added to the required list.",
            html_escape(&channel.channel_id)
        )))
    }

    async fn add_link(&self, user_id: u64, url: &str) -> Reply {
        match self.try_add_link(user_id, url).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Failed to add link: {e:#}");
                Reply::text("❌ Failed to add the link.")
            }
        }
    }

    async fn try_add_link(&self, user_id: u64, url: &str) -> anyhow::Result<Reply> {
        if self.links.find_link(url).await?.is_some() {
            return Ok(Reply::text(format!(
                "⚠️ This link is already added:\n{}",
                html_escape(url)
            )));
        }

        let link = self.links.create_link(url, user_id).await?;
        info!(url = %link.url, updated_by = user_id, "Access link added");
        Ok(Reply::text(format!("✅ Link added:\n{}", html_escape(&link.url))))
    }

    // ---------------------------------------------------------------------
    // Remove flows
    // ---------------------------------------------------------------------

    /// Open a removal flow: render page 0 of the selection list, then accept
    /// either a button tap or typed text as the terminal input.
    async fn start_removal(&self, user_id: u64, action: AdminAction) -> Reply {
        self.sessions
            .set(user_id, ConversationState::waiting_selection(action))
            .await;

        match self.removal_page(action, 0).await {
            Ok(Some((reply, _))) => {
                // List shown: open the step to manual input as well.
                self.sessions
                    .update(user_id, |s| s.step = FlowStep::WaitingInput)
                    .await;
                reply
            }
            Ok(None) => {
                self.sessions.delete(user_id).await;
                Reply::text(match action {
                    AdminAction::RemoveLink => "There are no links to remove.",
                    _ => "There are no channels to remove.",
                })
            }
            Err(e) => {
                error!("Failed to load removal list: {e:#}");
                self.sessions.delete(user_id).await;
                Reply::text(match action {
                    AdminAction::RemoveLink => "❌ Failed to load the link list.",
                    _ => "❌ Failed to load the channel list.",
                })
            }
        }
    }

    async fn remove_channel_by_text(&self, input: &str) -> Reply {
        let identity = normalize_channel(input);
        match self.try_remove_channel_by_text(input, &identity).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(channel = %identity, "Failed to remove channel: {e:#}");
                Reply::text("❌ Failed to remove the channel.")
            }
        }
    }

    async fn try_remove_channel_by_text(&self, raw: &str, identity: &str) -> anyhow::Result<Reply> {
        let channels = self.channels.list_channels().await?;

        // Normalized equality first; raw containment tolerates partial or
        // URL-decorated input.
        let matched = channels.iter().find(|c| {
            normalize_channel(&c.channel_id) == identity
                || (!raw.is_empty()
                    && (c.channel_id.contains(raw) || raw.contains(c.channel_id.as_str())))
        });

        match matched {
            Some(channel) => self.delete_channel_by_id(&channel.id).await,
            None => Ok(Reply::text(format!(
                "⚠️ Channel {} is not in the list.",
                html_escape(identity)
            ))),
        }
    }

    async fn remove_link_by_text(&self, input: &str) -> Reply {
        match self.try_remove_link_by_text(input).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Failed to remove link: {e:#}");
                Reply::text("❌ Failed to remove the link.")
            }
        }
    }

    async fn try_remove_link_by_text(&self, raw: &str) -> anyhow::Result<Reply> {
        let links = self.links.list_links().await?;

        let matched = links.iter().find(|l| {
            l.url == raw
                || (!raw.is_empty() && (l.url.contains(raw) || raw.contains(l.url.as_str())))
        });

        match matched {
            Some(link) => self.delete_link_by_id(&link.id).await,
            None => Ok(Reply::text("⚠️ This link is not in the list.")),
        }
    }

    /// Terminal input delivered as a button tap. Valid only while the
    /// matching flow is live; a stale button gets an alert and nothing else.
    async fn select_removal(&self, user_id: u64, action: AdminAction, id: &str) -> CallbackReply {
        if self.session_for(user_id, action).await.is_none() {
            return CallbackReply::alert(SESSION_EXPIRED);
        }
        self.sessions.delete(user_id).await;

        let result = match action {
            AdminAction::RemoveLink => self.delete_link_by_id(id).await,
            _ => self.delete_channel_by_id(id).await,
        };
        match result {
            Ok(reply) => CallbackReply::message(reply),
            Err(e) => {
                error!("Failed to remove selected entity: {e:#}");
                CallbackReply::message(Reply::text(match action {
                    AdminAction::RemoveLink => "❌ Failed to remove the link.",
                    _ => "❌ Failed to remove the channel.",
                }))
            }
        }
    }

    /// Removal-list navigation. Does not consume the flow; updates the page
    /// in place.
    async fn turn_removal_page(
        &self,
        user_id: u64,
        action: AdminAction,
        delta: i32,
    ) -> CallbackReply {
        let Some(state) = self.session_for(user_id, action).await else {
            return CallbackReply::alert(SESSION_EXPIRED);
        };

        let requested = if delta < 0 {
            state.page.saturating_sub(1)
        } else {
            state.page.saturating_add(1)
        };

        match self.removal_page(action, requested).await {
            Ok(Some((reply, index))) => {
                self.sessions.update(user_id, |s| s.page = index).await;
                CallbackReply::message(reply)
            }
            Ok(None) => {
                // The list emptied under the flow; nothing left to select.
                self.sessions.delete(user_id).await;
                CallbackReply::message(Reply::text(match action {
                    AdminAction::RemoveLink => "There are no links to remove.",
                    _ => "There are no channels to remove.",
                }))
            }
            Err(e) => {
                error!("Failed to render removal page: {e:#}");
                self.sessions.delete(user_id).await;
                CallbackReply::alert(match action {
                    AdminAction::RemoveLink => "❌ Failed to load the link list.",
                    _ => "❌ Failed to load the channel list.",
                })
            }
        }
    }

    async fn delete_channel_by_id(&self, id: &str) -> anyhow::Result<Reply> {
        let Some(channel) = self.channels.get_channel(id).await? else {
            return Ok(Reply::text("❌ Channel not found."));
        };
        self.channels.delete_channel(id).await?;
        info!(channel = %channel.channel_id, "Channel removed");
        Ok(Reply::text(format!(
            "✅ Channel {} was removed from the required list.",
            html_escape(&channel.channel_id)
        )))
    }

    async fn delete_link_by_id(&self, id: &str) -> anyhow::Result<Reply> {
        let Some(link) = self.links.get_link(id).await? else {
            return Ok(Reply::text("❌ Link not found."));
        };
        self.links.delete_link(id).await?;
        info!(url = %link.url, "Access link removed");
        Ok(Reply::text("✅ The link was removed."))
    }

    async fn session_for(&self, user_id: u64, action: AdminAction) -> Option<ConversationState> {
        self.sessions
            .get(user_id)
            .await
            .filter(|s| s.action == action)
    }

    // ---------------------------------------------------------------------
    // List rendering
    // ---------------------------------------------------------------------

    /// Stateless paginated channel list (`/admin_list_channels` and the
    /// `list_channels_page_<n>` buttons).
    async fn render_channel_list(&self, requested: usize) -> Reply {
        match self.channels.list_channels().await {
            Err(e) => {
                error!("Failed to load channel list: {e:#}");
                Reply::text("❌ Failed to load the channel list.")
            }
            Ok(channels) if channels.is_empty() => {
                Reply::text("The required channel list is empty.")
            }
            Ok(channels) => {
                let page = paginate(channels.len(), requested, PAGE_SIZE);
                let mut text = format!(
                    "<b>Required channels (page {}/{}):</b>\n\n",
                    page.index + 1,
                    page.total_pages
                );
                for (offset, channel) in page.slice(&channels).iter().enumerate() {
                    text.push_str(&format!(
                        "{}. <code>{}</code>\n",
                        page.first_row() + offset,
                        html_escape(&channel.channel_id)
                    ));
                }
                match browse_nav_row(&page, |p| CallbackCommand::ListChannelsPage(p)) {
                    Some(markup) => Reply::with_markup(text, markup),
                    None => Reply::text(text),
                }
            }
        }
    }

    /// Stateless paginated link list.
    async fn render_link_list(&self, requested: usize) -> Reply {
        match self.links.list_links().await {
            Err(e) => {
                error!("Failed to load link list: {e:#}");
                Reply::text("❌ Failed to load the link list.")
            }
            Ok(links) if links.is_empty() => Reply::text("The access link list is empty."),
            Ok(links) => {
                let page = paginate(links.len(), requested, PAGE_SIZE);
                let mut text = format!(
                    "<b>Access links (page {}/{}):</b>\n\n",
                    page.index + 1,
                    page.total_pages
                );
                for (offset, link) in page.slice(&links).iter().enumerate() {
                    text.push_str(&format!(
                        "{}. {}\n",
                        page.first_row() + offset,
                        html_escape(&link.url)
                    ));
                }
                match browse_nav_row(&page, |p| CallbackCommand::ListLinksPage(p)) {
                    Some(markup) => Reply::with_markup(text, markup),
                    None => Reply::text(text),
                }
            }
        }
    }

    /// Load and render one page of a removal list. `Ok(None)` means the list
    /// is empty. Also returns the effective (clamped) page index.
    async fn removal_page(
        &self,
        action: AdminAction,
        requested: usize,
    ) -> anyhow::Result<Option<(Reply, usize)>> {
        match action {
            AdminAction::RemoveLink => {
                let links = self.links.list_links().await?;
                if links.is_empty() {
                    return Ok(None);
                }
                let page = paginate(links.len(), requested, PAGE_SIZE);
                Ok(Some((render_remove_link_page(&links, &page), page.index)))
            }
            _ => {
                let channels = self.channels.list_channels().await?;
                if channels.is_empty() {
                    return Ok(None);
                }
                let page = paginate(channels.len(), requested, PAGE_SIZE);
                Ok(Some((render_remove_channel_page(&channels, &page), page.index)))
            }
        }
    }
}

/// Navigation row for the stateless browse lists; the page index travels in
/// the callback payload.
fn browse_nav_row(
    page: &Page,
    command_for: impl Fn(usize) -> CallbackCommand,
) -> Option<InlineKeyboardMarkup> {
    let mut row = Vec::new();
    if page.has_prev {
        row.push(InlineKeyboardButton::callback(
            "⬅️ Previous",
            command_for(page.index - 1).encode(),
        ));
    }
    if page.has_next {
        row.push(InlineKeyboardButton::callback(
            "Next ➡️",
            command_for(page.index + 1).encode(),
        ));
    }
    if row.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(vec![row]))
    }
}

fn render_remove_channel_page(channels: &[Channel], page: &Page) -> Reply {
    let mut text = format!(
        "<b>Select a channel to remove (page {}/{}):</b>\n\n",
        page.index + 1,
        page.total_pages
    );
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    for (offset, channel) in page.slice(channels).iter().enumerate() {
        let row_number = page.first_row() + offset;
        let display = channel.channel_id.trim_start_matches('@');
        text.push_str(&format!("{row_number}. <code>{}</code>\n", html_escape(display)));
        keyboard.push(vec![InlineKeyboardButton::callback(
            format!("{row_number}. {display}"),
            CallbackCommand::SelectRemoveChannel(channel.id.clone()).encode(),
        )]);
    }

    push_removal_nav(&mut keyboard, page, AdminAction::RemoveChannel);
    text.push_str("\nOr type the channel name manually.");
    Reply::with_markup(text, InlineKeyboardMarkup::new(keyboard))
}

fn render_remove_link_page(links: &[AccessLink], page: &Page) -> Reply {
    let mut text = format!(
        "<b>Select a link to remove (page {}/{}):</b>\n\n",
        page.index + 1,
        page.total_pages
    );
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    for (offset, link) in page.slice(links).iter().enumerate() {
        let row_number = page.first_row() + offset;
        text.push_str(&format!("{row_number}. <code>{}</code>\n", html_escape(&link.url)));
        keyboard.push(vec![InlineKeyboardButton::callback(
            format!("{row_number}. {}", truncate_str(&link.url, 30)),
            CallbackCommand::SelectRemoveLink(link.id.clone()).encode(),
        )]);
    }

    push_removal_nav(&mut keyboard, page, AdminAction::RemoveLink);
    text.push_str("\nOr type the link manually.");
    Reply::with_markup(text, InlineKeyboardMarkup::new(keyboard))
}

/// Navigation row for in-flow removal lists; the page lives in the session,
/// so the payloads are the four literal tokens.
fn push_removal_nav(keyboard: &mut Vec<Vec<InlineKeyboardButton>>, page: &Page, action: AdminAction) {
    let mut nav = Vec::new();
    if page.has_prev {
        nav.push(InlineKeyboardButton::callback(
            "⬅️ Previous",
            CallbackCommand::prev_page_for(action).encode(),
        ));
    }
    if page.has_next {
        nav.push(InlineKeyboardButton::callback(
            "Next ➡️",
            CallbackCommand::next_page_for(action).encode(),
        ));
    }
    if !nav.is_empty() {
        keyboard.push(nav);
    }
}
