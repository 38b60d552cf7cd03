// Bot configuration read from the environment (and `.env`, loaded in main).

use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    /// 0 when no bot owner is configured
    pub owner_id: u64,
    pub default_prefix: String,
    pub data_dir: PathBuf,
    pub store: StoreKind,
    pub banned_words: PathBuf,
    pub spam_model: PathBuf,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = var("DISCORD_TOKEN").context(
            "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
        )?;

        let owner_id = match var("NANO_OWNER_ID") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("NANO_OWNER_ID is not a user id: {}", raw))?,
            None => 0,
        };

        let store = match var("NANO_STORE").as_deref().map(str::trim) {
            None | Some("sqlite") => StoreKind::Sqlite,
            Some("memory") => StoreKind::Memory,
            Some(other) => anyhow::bail!("Unknown NANO_STORE `{}` (use sqlite or memory)", other),
        };

        let data_dir = PathBuf::from(var("NANO_DATA_DIR").unwrap_or_else(|| "data".to_string()));
        let banned_words = var("NANO_BANNED_WORDS")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("banned_words.txt"));
        let spam_model = var("NANO_SPAM_MODEL")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("spam_model.json"));

        Ok(Self {
            token,
            owner_id,
            default_prefix: var("NANO_DEFAULT_PREFIX").unwrap_or_else(|| "!".to_string()),
            data_dir,
            store,
            banned_words,
            spam_model,
        })
    }

    /// SQLite file of the durable store.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("nano.db")
    }
}
