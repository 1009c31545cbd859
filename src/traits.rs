//! Collaborator interfaces the engines are written against.
//!
//! Persistence and the Telegram membership API sit behind these traits so
//! the conversational core can be exercised with in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A channel the user must be subscribed to. `channel_id` is the normalized
/// identity (`@name` or numeric chat id) and is unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub channel_id: String,
    pub added_by: u64,
    pub created_at: DateTime<Utc>,
}

/// A link handed out once the subscription check passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLink {
    pub id: String,
    pub url: String,
    pub updated_by: u64,
    pub created_at: DateTime<Utc>,
}

/// Membership status of a user in a channel, as reported by Telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    /// Only full members count as subscribed; restricted, left and kicked
    /// users all fail the gate.
    pub fn is_subscribed(self) -> bool {
        matches!(
            self,
            MemberStatus::Creator | MemberStatus::Administrator | MemberStatus::Member
        )
    }
}

/// Required-channel persistence. `list_channels` returns insertion order,
/// which fixes the display order and the order of verdict aggregation.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn list_channels(&self) -> anyhow::Result<Vec<Channel>>;

    /// Look up by normalized identity.
    async fn find_channel(&self, channel_id: &str) -> anyhow::Result<Option<Channel>>;

    /// Look up by opaque entity id.
    async fn get_channel(&self, id: &str) -> anyhow::Result<Option<Channel>>;

    async fn create_channel(&self, channel_id: &str, added_by: u64) -> anyhow::Result<Channel>;

    /// Returns false when no row with that id existed.
    async fn delete_channel(&self, id: &str) -> anyhow::Result<bool>;
}

/// Access-link persistence.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn list_links(&self) -> anyhow::Result<Vec<AccessLink>>;

    async fn find_link(&self, url: &str) -> anyhow::Result<Option<AccessLink>>;

    async fn get_link(&self, id: &str) -> anyhow::Result<Option<AccessLink>>;

    async fn create_link(&self, url: &str, updated_by: u64) -> anyhow::Result<AccessLink>;

    async fn delete_link(&self, id: &str) -> anyhow::Result<bool>;
}

/// Read-only membership lookup against the messaging platform.
///
/// Errors carry the transport's raw error text; the subscription checker
/// classifies it by substring (see `subscription::classify_membership_error`).
#[async_trait]
pub trait MembershipProbe: Send + Sync {
    async fn member_status(&self, channel_id: &str, user_id: u64) -> anyhow::Result<MemberStatus>;
}
