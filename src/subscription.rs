//! Subscription verification across all required channels.

use std::sync::Arc;

use tracing::{error, warn};

use crate::traits::{ChannelStore, MembershipProbe};

/// One classified membership-query failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelError {
    pub channel: String,
    pub message: String,
}

/// Outcome of checking one user against every required channel. Built fresh
/// per check, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionVerdict {
    pub ok: bool,
    pub failed_channels: Vec<String>,
    pub errors: Vec<ChannelError>,
}

pub struct SubscriptionChecker {
    channels: Arc<dyn ChannelStore>,
    probe: Arc<dyn MembershipProbe>,
}

impl SubscriptionChecker {
    pub fn new(channels: Arc<dyn ChannelStore>, probe: Arc<dyn MembershipProbe>) -> Self {
        Self { channels, probe }
    }

    /// Check `user_id` against every required channel, in configured order.
    ///
    /// Channels are queried sequentially so `failed_channels` and `errors`
    /// come out in a stable order. A failed membership query counts as "not
    /// subscribed" and additionally records a classified error; it never
    /// aborts the remaining checks. An empty channel set is trivially
    /// satisfied.
    pub async fn check(&self, user_id: u64) -> SubscriptionVerdict {
        let channels = match self.channels.list_channels().await {
            Ok(channels) => channels,
            Err(e) => {
                error!("Failed to load the channel list: {e:#}");
                return SubscriptionVerdict {
                    ok: false,
                    failed_channels: Vec::new(),
                    errors: vec![ChannelError {
                        channel: "system".to_string(),
                        message: "Could not load the channel list.".to_string(),
                    }],
                };
            }
        };

        let mut verdict = SubscriptionVerdict {
            ok: true,
            failed_channels: Vec::new(),
            errors: Vec::new(),
        };

        for channel in &channels {
            match self
                .probe
                .member_status(&channel.channel_id, user_id)
                .await
            {
                Ok(status) if status.is_subscribed() => {}
                Ok(_) => {
                    verdict.failed_channels.push(channel.channel_id.clone());
                    verdict.ok = false;
                }
                Err(e) => {
                    let raw = format!("{e:#}");
                    warn!(channel = %channel.channel_id, error = %raw, "Membership query failed");
                    verdict.failed_channels.push(channel.channel_id.clone());
                    verdict.errors.push(ChannelError {
                        channel: channel.channel_id.clone(),
                        message: classify_membership_error(&raw, &channel.channel_id),
                    });
                    verdict.ok = false;
                }
            }
        }

        verdict
    }
}

/// Map a raw membership-query error to a user-facing explanation.
///
/// Pure substring matching over the transport's error text, first match
/// wins. Brittle by nature, but the error vocabulary it covers is the one
/// the Bot API actually emits today.
pub fn classify_membership_error(raw: &str, channel: &str) -> String {
    if raw.contains("not found") {
        format!("Channel {channel} was not found. Check the channel name or id.")
    } else if raw.contains("user not a member") {
        format!("The bot is not a member of {channel}.")
    } else if raw.contains("member list is inaccessible") {
        format!(
            "The bot cannot read the member list of {channel}. \
             Add the bot to the channel as an administrator."
        )
    } else if raw.contains("forbidden") {
        format!("The bot has no access to {channel} (permission problem).")
    } else if raw.contains("private") {
        format!("Channel {channel} is private and inaccessible.")
    } else {
        format!("Could not verify the subscription to {channel}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, MockProbe};
    use crate::traits::MemberStatus;

    fn checker(store: Arc<MemoryStore>, probe: Arc<MockProbe>) -> SubscriptionChecker {
        SubscriptionChecker::new(store, probe)
    }

    #[tokio::test]
    async fn empty_channel_set_is_trivially_satisfied() {
        let store = Arc::new(MemoryStore::new());
        let probe = Arc::new(MockProbe::new());
        let verdict = checker(store, probe).check(1).await;

        assert!(verdict.ok);
        assert!(verdict.failed_channels.is_empty());
        assert!(verdict.errors.is_empty());
    }

    #[tokio::test]
    async fn all_subscribed_passes() {
        let store = Arc::new(MemoryStore::new());
        store.seed_channel("@a").await;
        store.seed_channel("@b").await;
        let probe = Arc::new(MockProbe::new());
        probe.set_status("@a", MemberStatus::Member);
        probe.set_status("@b", MemberStatus::Administrator);

        let verdict = checker(store, probe).check(1).await;
        assert!(verdict.ok);
        assert!(verdict.failed_channels.is_empty());
    }

    #[tokio::test]
    async fn single_unsubscribed_channel_fails_alone() {
        let store = Arc::new(MemoryStore::new());
        store.seed_channel("@a").await;
        store.seed_channel("@b").await;
        store.seed_channel("@c").await;
        let probe = Arc::new(MockProbe::new());
        probe.set_status("@a", MemberStatus::Member);
        probe.set_status("@b", MemberStatus::Left);
        probe.set_status("@c", MemberStatus::Creator);

        let verdict = checker(store, probe).check(1).await;
        assert!(!verdict.ok);
        assert_eq!(verdict.failed_channels, vec!["@b"]);
        assert!(verdict.errors.is_empty());
    }

    #[tokio::test]
    async fn restricted_and_kicked_count_as_unsubscribed() {
        let store = Arc::new(MemoryStore::new());
        store.seed_channel("@a").await;
        store.seed_channel("@b").await;
        let probe = Arc::new(MockProbe::new());
        probe.set_status("@a", MemberStatus::Restricted);
        probe.set_status("@b", MemberStatus::Kicked);

        let verdict = checker(store, probe).check(1).await;
        assert_eq!(verdict.failed_channels, vec!["@a", "@b"]);
    }

    #[tokio::test]
    async fn query_error_classifies_and_continues() {
        let store = Arc::new(MemoryStore::new());
        store.seed_channel("@gone").await;
        store.seed_channel("@ok").await;
        let probe = Arc::new(MockProbe::new());
        probe.set_error("@gone", "Bad Request: chat not found");
        probe.set_status("@ok", MemberStatus::Member);

        let verdict = checker(store, probe).check(1).await;
        assert!(!verdict.ok);
        assert_eq!(verdict.failed_channels, vec!["@gone"]);
        assert_eq!(verdict.errors.len(), 1);
        assert_eq!(verdict.errors[0].channel, "@gone");
        assert!(verdict.errors[0].message.contains("not found"));
    }

    #[tokio::test]
    async fn failed_channels_preserve_configured_order() {
        let store = Arc::new(MemoryStore::new());
        for name in ["@one", "@two", "@three", "@four"] {
            store.seed_channel(name).await;
        }
        let probe = Arc::new(MockProbe::new());
        probe.set_status("@one", MemberStatus::Left);
        probe.set_status("@two", MemberStatus::Member);
        probe.set_status("@three", MemberStatus::Left);
        probe.set_status("@four", MemberStatus::Left);

        let verdict = checker(store, probe).check(1).await;
        assert_eq!(verdict.failed_channels, vec!["@one", "@three", "@four"]);
    }

    #[tokio::test]
    async fn store_failure_yields_system_verdict() {
        let store = Arc::new(MemoryStore::new());
        store.seed_channel("@a").await;
        store.fail_channel_reads();
        let probe = Arc::new(MockProbe::new());

        let verdict = checker(store, probe).check(1).await;
        assert!(!verdict.ok);
        assert!(verdict.failed_channels.is_empty());
        assert_eq!(verdict.errors.len(), 1);
        assert_eq!(verdict.errors[0].channel, "system");
    }

    #[test]
    fn classification_is_deterministic_and_ordered() {
        let cases = [
            ("Bad Request: chat not found", "was not found"),
            ("user not a member", "not a member of"),
            ("member list is inaccessible", "cannot read the member list"),
            ("request forbidden by server", "permission problem"),
            ("this channel is private", "private and inaccessible"),
            ("something else entirely", "Could not verify"),
        ];
        for (raw, expected) in cases {
            let first = classify_membership_error(raw, "@x");
            let second = classify_membership_error(raw, "@x");
            assert_eq!(first, second);
            assert!(first.contains(expected), "raw {raw:?} -> {first:?}");
        }
    }

    #[test]
    fn not_found_takes_precedence_over_private() {
        // "not found" sits first in the match order.
        let message = classify_membership_error("private chat not found", "@x");
        assert!(message.contains("was not found"));
    }
}
