//! Inline-button callback protocol.
//!
//! Callback payloads are a flat string namespace kept short on purpose
//! (Telegram caps callback data at 64 bytes). The wire strings are the
//! protocol: a replacement transport must reproduce them bit-exact.

use crate::types::AdminAction;

/// Every inline-button command the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackCommand {
    /// Stateless list browsing, page index in the payload.
    ListChannelsPage(usize),
    ListLinksPage(usize),
    /// Pick one entity out of a removal list, entity id in the payload.
    SelectRemoveChannel(String),
    SelectRemoveLink(String),
    /// In-flow removal-list navigation; the page lives in the session.
    NextPageRemoveChannel,
    PrevPageRemoveChannel,
    NextPageRemoveLink,
    PrevPageRemoveLink,
    /// User-side re-check button.
    CheckSubscription,
}

const LIST_CHANNELS_PAGE: &str = "list_channels_page_";
const LIST_LINKS_PAGE: &str = "list_links_page_";
const SELECT_REMOVE_CHANNEL: &str = "select_remove_channel_";
const SELECT_REMOVE_LINK: &str = "select_remove_link_";

impl CallbackCommand {
    /// Decode a raw callback payload. Returns `None` for foreign or
    /// malformed data (unknown prefix, non-numeric page, empty id).
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "next_page_remove_channel" => return Some(Self::NextPageRemoveChannel),
            "prev_page_remove_channel" => return Some(Self::PrevPageRemoveChannel),
            "next_page_remove_link" => return Some(Self::NextPageRemoveLink),
            "prev_page_remove_link" => return Some(Self::PrevPageRemoveLink),
            "CHECK_SUBSCRIPTION" => return Some(Self::CheckSubscription),
            _ => {}
        }

        if let Some(rest) = data.strip_prefix(LIST_CHANNELS_PAGE) {
            return rest.parse().ok().map(Self::ListChannelsPage);
        }
        if let Some(rest) = data.strip_prefix(LIST_LINKS_PAGE) {
            return rest.parse().ok().map(Self::ListLinksPage);
        }
        if let Some(rest) = data.strip_prefix(SELECT_REMOVE_CHANNEL) {
            if !rest.is_empty() {
                return Some(Self::SelectRemoveChannel(rest.to_string()));
            }
        }
        if let Some(rest) = data.strip_prefix(SELECT_REMOVE_LINK) {
            if !rest.is_empty() {
                return Some(Self::SelectRemoveLink(rest.to_string()));
            }
        }
        None
    }

    /// Encode back to the wire string. Exact inverse of [`parse`].
    ///
    /// [`parse`]: CallbackCommand::parse
    pub fn encode(&self) -> String {
        match self {
            Self::ListChannelsPage(page) => format!("{LIST_CHANNELS_PAGE}{page}"),
            Self::ListLinksPage(page) => format!("{LIST_LINKS_PAGE}{page}"),
            Self::SelectRemoveChannel(id) => format!("{SELECT_REMOVE_CHANNEL}{id}"),
            Self::SelectRemoveLink(id) => format!("{SELECT_REMOVE_LINK}{id}"),
            Self::NextPageRemoveChannel => "next_page_remove_channel".to_string(),
            Self::PrevPageRemoveChannel => "prev_page_remove_channel".to_string(),
            Self::NextPageRemoveLink => "next_page_remove_link".to_string(),
            Self::PrevPageRemoveLink => "prev_page_remove_link".to_string(),
            Self::CheckSubscription => "CHECK_SUBSCRIPTION".to_string(),
        }
    }

    /// Next-page token for an in-flow removal list.
    pub fn next_page_for(action: AdminAction) -> Self {
        match action {
            AdminAction::RemoveLink => Self::NextPageRemoveLink,
            _ => Self::NextPageRemoveChannel,
        }
    }

    /// Previous-page token for an in-flow removal list.
    pub fn prev_page_for(action: AdminAction) -> Self {
        match action {
            AdminAction::RemoveLink => Self::PrevPageRemoveLink,
            _ => Self::PrevPageRemoveChannel,
        }
    }
}
