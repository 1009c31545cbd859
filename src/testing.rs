//! Test infrastructure: in-memory stores, a scripted membership probe, and
//! a fully wired engine harness.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::admin::AdminEngine;
use crate::gate::GateEngine;
use crate::session::SessionStore;
use crate::subscription::SubscriptionChecker;
use crate::traits::{
    AccessLink, Channel, ChannelStore, LinkStore, MemberStatus, MembershipProbe,
};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory entity store with switchable failure injection.
pub struct MemoryStore {
    channels: Mutex<Vec<Channel>>,
    links: Mutex<Vec<AccessLink>>,
    next_id: AtomicU64,
    fail_channels: AtomicBool,
    fail_links: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(Vec::new()),
            links: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            fail_channels: AtomicBool::new(false),
            fail_links: AtomicBool::new(false),
        }
    }

    fn id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Insert a channel directly, bypassing the add flow.
    pub async fn seed_channel(&self, channel_id: &str) -> Channel {
        let channel = Channel {
            id: self.id("channel"),
            channel_id: channel_id.to_string(),
            added_by: 0,
            created_at: Utc::now(),
        };
        self.channels.lock().unwrap().push(channel.clone());
        channel
    }

    pub async fn seed_link(&self, url: &str) -> AccessLink {
        let link = AccessLink {
            id: self.id("link"),
            url: url.to_string(),
            updated_by: 0,
            created_at: Utc::now(),
        };
        self.links.lock().unwrap().push(link.clone());
        link
    }

    /// Make every channel operation fail from now on.
    pub fn fail_channel_reads(&self) {
        self.fail_channels.store(true, Ordering::SeqCst);
    }

    pub fn fail_link_reads(&self) {
        self.fail_links.store(true, Ordering::SeqCst);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap().len()
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    fn check_channels(&self) -> anyhow::Result<()> {
        if self.fail_channels.load(Ordering::SeqCst) {
            anyhow::bail!("simulated channel store failure");
        }
        Ok(())
    }

    fn check_links(&self) -> anyhow::Result<()> {
        if self.fail_links.load(Ordering::SeqCst) {
            anyhow::bail!("simulated link store failure");
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn list_channels(&self) -> anyhow::Result<Vec<Channel>> {
        self.check_channels()?;
        Ok(self.channels.lock().unwrap().clone())
    }

    async fn find_channel(&self, channel_id: &str) -> anyhow::Result<Option<Channel>> {
        self.check_channels()?;
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.channel_id == channel_id)
            .cloned())
    }

    async fn get_channel(&self, id: &str) -> anyhow::Result<Option<Channel>> {
        self.check_channels()?;
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn create_channel(&self, channel_id: &str, added_by: u64) -> anyhow::Result<Channel> {
        self.check_channels()?;
        let channel = Channel {
            id: self.id("channel"),
            channel_id: channel_id.to_string(),
            added_by,
            created_at: Utc::now(),
        };
        self.channels.lock().unwrap().push(channel.clone());
        Ok(channel)
    }

    async fn delete_channel(&self, id: &str) -> anyhow::Result<bool> {
        self.check_channels()?;
        let mut channels = self.channels.lock().unwrap();
        let before = channels.len();
        channels.retain(|c| c.id != id);
        Ok(channels.len() < before)
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn list_links(&self) -> anyhow::Result<Vec<AccessLink>> {
        self.check_links()?;
        Ok(self.links.lock().unwrap().clone())
    }

    async fn find_link(&self, url: &str) -> anyhow::Result<Option<AccessLink>> {
        self.check_links()?;
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.url == url)
            .cloned())
    }

    async fn get_link(&self, id: &str) -> anyhow::Result<Option<AccessLink>> {
        self.check_links()?;
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id == id)
            .cloned())
    }

    async fn create_link(&self, url: &str, updated_by: u64) -> anyhow::Result<AccessLink> {
        self.check_links()?;
        let link = AccessLink {
            id: self.id("link"),
            url: url.to_string(),
            updated_by,
            created_at: Utc::now(),
        };
        self.links.lock().unwrap().push(link.clone());
        Ok(link)
    }

    async fn delete_link(&self, id: &str) -> anyhow::Result<bool> {
        self.check_links()?;
        let mut links = self.links.lock().unwrap();
        let before = links.len();
        links.retain(|l| l.id != id);
        Ok(links.len() < before)
    }
}

// ---------------------------------------------------------------------------
// MockProbe
// ---------------------------------------------------------------------------

/// Scripted membership probe. Unconfigured channels report `Left`.
pub struct MockProbe {
    statuses: Mutex<HashMap<String, MemberStatus>>,
    errors: Mutex<HashMap<String, String>>,
    /// Every query in call order, for ordering assertions.
    pub queries: Mutex<Vec<(String, u64)>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            errors: Mutex::new(HashMap::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, channel_id: &str, status: MemberStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), status);
    }

    /// Make queries for `channel_id` fail with `message` as the raw error
    /// text (what the classifier sees).
    pub fn set_error(&self, channel_id: &str, message: &str) {
        self.errors
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), message.to_string());
    }
}

#[async_trait]
impl MembershipProbe for MockProbe {
    async fn member_status(&self, channel_id: &str, user_id: u64) -> anyhow::Result<MemberStatus> {
        self.queries
            .lock()
            .unwrap()
            .push((channel_id.to_string(), user_id));

        if let Some(message) = self.errors.lock().unwrap().get(channel_id) {
            anyhow::bail!("{message}");
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(channel_id)
            .copied()
            .unwrap_or(MemberStatus::Left))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub const ADMIN_ID: u64 = 1000;
pub const USER_ID: u64 = 2000;
pub const BOT_ID: u64 = 7777;

/// Fully wired engines over in-memory collaborators.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub probe: Arc<MockProbe>,
    pub admin: AdminEngine,
    pub gate: GateEngine,
}

pub fn harness() -> TestHarness {
    harness_with_ttl(Duration::from_secs(600))
}

pub fn harness_with_ttl(ttl: Duration) -> TestHarness {
    let store = Arc::new(MemoryStore::new());
    let probe = Arc::new(MockProbe::new());
    let sessions = SessionStore::new(ttl);

    let admin = AdminEngine::new(
        store.clone(),
        store.clone(),
        probe.clone(),
        sessions,
        vec![ADMIN_ID],
        BOT_ID,
    );
    let checker = SubscriptionChecker::new(store.clone(), probe.clone());
    let gate = GateEngine::new(store.clone(), checker);

    TestHarness {
        store,
        probe,
        admin,
        gate,
    }
}
