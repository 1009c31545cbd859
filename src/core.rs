use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use teloxide::prelude::*;
use tracing::info;

use crate::admin::AdminEngine;
use crate::config::AppConfig;
use crate::gate::GateEngine;
use crate::session::SessionStore;
use crate::state::SqliteStore;
use crate::subscription::SubscriptionChecker;
use crate::telegram::{TelegramGateway, TelegramProbe};
use crate::traits::{ChannelStore, LinkStore, MembershipProbe};

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    // 1. Entity store
    let store = Arc::new(SqliteStore::connect(&config.state.db_path).await?);
    info!("Entity store initialized ({})", config.state.db_path);

    // 2. Bot identity — also needed by the add-channel access precheck
    let bot = Bot::new(&config.telegram.bot_token);
    let me = bot
        .get_me()
        .await
        .context("Failed to reach Telegram. Check the bot token and network.")?;
    info!(username = me.username(), "Bot identity confirmed");

    // 3. Engines
    let probe: Arc<dyn MembershipProbe> = Arc::new(TelegramProbe::new(bot.clone()));
    let sessions = SessionStore::new(Duration::from_secs(config.session.ttl_secs));
    let admin = AdminEngine::new(
        Arc::clone(&store) as Arc<dyn ChannelStore>,
        Arc::clone(&store) as Arc<dyn LinkStore>,
        Arc::clone(&probe),
        sessions,
        config.telegram.admin_user_ids.clone(),
        me.id.0,
    );
    let checker = SubscriptionChecker::new(Arc::clone(&store) as Arc<dyn ChannelStore>, probe);
    let gate = GateEngine::new(Arc::clone(&store) as Arc<dyn LinkStore>, checker);

    // 4. Dispatcher with auto-retry (blocks)
    let gateway = Arc::new(TelegramGateway::new(bot, admin, gate));
    gateway.start_with_retry().await;

    Ok(())
}
