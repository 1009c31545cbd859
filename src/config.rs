use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// User ids allowed to manage channels and links. Everyone else only
    /// gets the subscription-check surface.
    #[serde(default)]
    pub admin_user_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "subgate.db".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Seconds before an abandoned admin flow is dropped.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_session_ttl_secs() -> u64 {
    600
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: AppConfig =
            toml::from_str(&content).with_context(|| format!("Invalid {}", path.display()))?;

        // The token may live in the environment (or .env) instead of the
        // config file.
        if let Ok(token) = std::env::var("BOT_TOKEN") {
            if !token.trim().is_empty() {
                config.telegram.bot_token = token;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "telegram.bot_token is not set. Put it in config.toml or export BOT_TOKEN."
            );
        }
        if self.telegram.admin_user_ids.is_empty() {
            tracing::warn!(
                "No admin_user_ids configured — every admin command will be rejected"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let config: AppConfig = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"
            admin_user_ids = [42, 43]
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.admin_user_ids, vec![42, 43]);
        assert_eq!(config.state.db_path, "subgate.db");
        assert_eq!(config.session.ttl_secs, 600);
    }

    #[test]
    fn explicit_sections_override_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [telegram]
            bot_token = "123:abc"

            [state]
            db_path = "/var/lib/subgate/state.db"

            [session]
            ttl_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.state.db_path, "/var/lib/subgate/state.db");
        assert_eq!(config.session.ttl_secs, 120);
    }

    #[test]
    fn missing_token_fails_validation() {
        let config: AppConfig = toml::from_str(
            r#"
            [telegram]
            admin_user_ids = [1]
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
