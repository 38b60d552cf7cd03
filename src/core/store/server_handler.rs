// Server handler - per-guild state on top of the key-value port.
//
// Key layout:
// - server:<guild>     hash of settings (prefix, filters, messages, ...)
// - commands:<guild>   hash trigger -> response
// - mutes:<guild>      set of muted user ids
// - blacklist:<guild>  set of channel ids where the bot ignores everything
// - sr:<guild>         set of self-assignable role names

use super::kv_store::{validate_input, KvStore, StoreError};
use super::plugin_data::PluginDataManager;
use super::server_models::*;
use std::collections::HashMap;
use std::sync::Arc;

fn server_key(guild_id: u64) -> String {
    format!("server:{}", guild_id)
}

fn commands_key(guild_id: u64) -> String {
    format!("commands:{}", guild_id)
}

fn mutes_key(guild_id: u64) -> String {
    format!("mutes:{}", guild_id)
}

fn blacklist_key(guild_id: u64) -> String {
    format!("blacklist:{}", guild_id)
}

fn selfroles_key(guild_id: u64) -> String {
    format!("sr:{}", guild_id)
}

fn parse_ids<I: IntoIterator<Item = String>>(values: I) -> Vec<u64> {
    let mut ids: Vec<u64> = values
        .into_iter()
        .filter_map(|v| v.parse::<u64>().ok())
        .collect();
    ids.sort_unstable();
    ids
}

pub struct ServerHandler {
    store: Arc<dyn KvStore>,
    /// Bot owner user id (0 when not configured)
    owner_id: u64,
    default_prefix: String,
}

impl ServerHandler {
    pub fn new(store: Arc<dyn KvStore>, owner_id: u64, default_prefix: impl Into<String>) -> Self {
        Self {
            store,
            owner_id,
            default_prefix: default_prefix.into(),
        }
    }

    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    // ------------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------------

    pub fn is_bot_owner(&self, user_id: u64) -> bool {
        self.owner_id != 0 && user_id == self.owner_id
    }

    pub fn is_server_owner(user_id: u64, guild: &GuildInfo) -> bool {
        user_id == guild.owner_id
    }

    pub fn has_role(roles: &[String], role_name: &str) -> bool {
        roles.iter().any(|r| r == role_name)
    }

    pub fn is_admin(roles: &[String]) -> bool {
        Self::has_role(roles, ADMIN_ROLE)
    }

    pub fn can_use_admin_commands(&self, user_id: u64, roles: &[String], guild: &GuildInfo) -> bool {
        self.is_bot_owner(user_id) || Self::is_server_owner(user_id, guild) || Self::is_admin(roles)
    }

    /// Mods are everyone with admin rights plus holders of the mod role.
    pub fn is_mod(&self, user_id: u64, roles: &[String], guild: &GuildInfo) -> bool {
        self.can_use_admin_commands(user_id, roles, guild) || Self::has_role(roles, MOD_ROLE)
    }

    // ------------------------------------------------------------------------
    // Server records
    // ------------------------------------------------------------------------

    /// Write (or overwrite) a server's settings with the defaults.
    pub async fn server_setup(&self, guild: &GuildInfo) -> Result<(), StoreError> {
        let key = server_key(guild.id);
        self.store.delete(&key).await?;
        self.store
            .hmset(&key, &server_defaults(guild, &self.default_prefix))
            .await?;

        tracing::info!(guild_id = guild.id, name = %guild.name, "New server");
        Ok(())
    }

    pub async fn server_exists(&self, guild_id: u64) -> Result<bool, StoreError> {
        self.store.exists(&server_key(guild_id)).await
    }

    /// Set up the server if it has no record yet. Returns `true` when it was created.
    pub async fn check_server(&self, guild: &GuildInfo) -> Result<bool, StoreError> {
        if self.server_exists(guild.id).await? {
            return Ok(false);
        }
        self.server_setup(guild).await?;
        Ok(true)
    }

    /// Keep the stored owner and name in sync with the platform.
    pub async fn check_server_vars(&self, guild: &GuildInfo) -> Result<(), StoreError> {
        let key = server_key(guild.id);
        let owner = guild.owner_id.to_string();

        if self.store.hget(&key, FIELD_OWNER).await?.as_deref() != Some(owner.as_str()) {
            self.store.hset(&key, FIELD_OWNER, &owner).await?;
        }
        if self.store.hget(&key, FIELD_NAME).await?.as_deref() != Some(guild.name.as_str()) {
            self.store.hset(&key, FIELD_NAME, &guild.name).await?;
        }
        Ok(())
    }

    pub async fn get_server_data(&self, guild_id: u64) -> Result<ServerData, StoreError> {
        let fields = self.store.hgetall(&server_key(guild_id)).await?;

        Ok(ServerData {
            settings: ServerSettings::from_fields(&fields, &self.default_prefix),
            commands: self.get_custom_commands(guild_id).await?,
            blacklist: self.get_blacklists(guild_id).await?,
            mutes: self.get_mute_list(guild_id).await?,
        })
    }

    pub async fn get_settings(&self, guild_id: u64) -> Result<ServerSettings, StoreError> {
        let fields = self.store.hgetall(&server_key(guild_id)).await?;
        Ok(ServerSettings::from_fields(&fields, &self.default_prefix))
    }

    pub async fn get_var(&self, guild_id: u64, field: &str) -> Result<Option<String>, StoreError> {
        self.store.hget(&server_key(guild_id), field).await
    }

    pub async fn update_var(&self, guild_id: u64, field: &str, value: &str) -> Result<(), StoreError> {
        validate_input(&[field, value])?;
        self.store.hset(&server_key(guild_id), field, value).await?;
        Ok(())
    }

    pub async fn remove_var(&self, guild_id: u64, field: &str) -> Result<bool, StoreError> {
        self.store.hdel(&server_key(guild_id), field).await
    }

    /// Toggle a moderation filter by any of its aliases.
    ///
    /// Returns the resolved setting, or `None` when the alias is unknown.
    pub async fn update_moderation_settings(
        &self,
        guild_id: u64,
        alias: &str,
        enabled: bool,
    ) -> Result<Option<ModSetting>, StoreError> {
        validate_input(&[alias])?;

        let Some(setting) = ModSetting::from_alias(alias) else {
            return Ok(None);
        };

        self.store
            .hset(&server_key(guild_id), setting.field(), &encode_bool(enabled))
            .await?;
        Ok(Some(setting))
    }

    /// Drop every stored server the bot is no longer part of.
    pub async fn delete_server_by_list(&self, current_guilds: &[u64]) -> Result<usize, StoreError> {
        let stored = self.store.scan("server:*").await?;

        let stale: Vec<u64> = stored
            .iter()
            .filter_map(|key| key.strip_prefix("server:"))
            .filter_map(|id| id.parse::<u64>().ok())
            .filter(|id| !current_guilds.contains(id))
            .collect();

        for guild_id in &stale {
            self.delete_server(*guild_id).await?;
        }

        if !stale.is_empty() {
            tracing::info!("Removed {} old servers.", stale.len());
        }
        Ok(stale.len())
    }

    /// Remove all data stored for a server. Returns whether the settings hash existed.
    pub async fn delete_server(&self, guild_id: u64) -> Result<bool, StoreError> {
        self.store.delete(&commands_key(guild_id)).await?;
        self.store.delete(&blacklist_key(guild_id)).await?;
        self.store.delete(&mutes_key(guild_id)).await?;
        self.store.delete(&selfroles_key(guild_id)).await?;
        self.store.delete(&server_key(guild_id)).await
    }

    // ------------------------------------------------------------------------
    // Custom commands
    // ------------------------------------------------------------------------

    /// Register a custom command. Returns `false` when the trigger is too long.
    pub async fn set_command(
        &self,
        guild_id: u64,
        trigger: &str,
        response: &str,
    ) -> Result<bool, StoreError> {
        validate_input(&[trigger, response])?;

        if trigger.chars().count() > MAX_TRIGGER_LENGTH {
            return Ok(false);
        }

        self.store
            .hset(&commands_key(guild_id), trigger, response)
            .await?;
        Ok(true)
    }

    pub async fn remove_command(&self, guild_id: u64, trigger: &str) -> Result<bool, StoreError> {
        self.store.hdel(&commands_key(guild_id), trigger).await
    }

    pub async fn get_custom_commands(
        &self,
        guild_id: u64,
    ) -> Result<HashMap<String, String>, StoreError> {
        self.store.hgetall(&commands_key(guild_id)).await
    }

    pub async fn get_command_amount(&self, guild_id: u64) -> Result<usize, StoreError> {
        self.store.hlen(&commands_key(guild_id)).await
    }

    pub async fn custom_command_exists(&self, guild_id: u64, trigger: &str) -> Result<bool, StoreError> {
        self.store.hexists(&commands_key(guild_id), trigger).await
    }

    // ------------------------------------------------------------------------
    // Channel blacklist
    // ------------------------------------------------------------------------

    pub async fn add_channel_blacklist(&self, guild_id: u64, channel_id: u64) -> Result<bool, StoreError> {
        self.store
            .sadd(&blacklist_key(guild_id), &channel_id.to_string())
            .await
    }

    pub async fn remove_channel_blacklist(
        &self,
        guild_id: u64,
        channel_id: u64,
    ) -> Result<bool, StoreError> {
        self.store
            .srem(&blacklist_key(guild_id), &channel_id.to_string())
            .await
    }

    pub async fn is_blacklisted(&self, guild_id: u64, channel_id: u64) -> Result<bool, StoreError> {
        self.store
            .sismember(&blacklist_key(guild_id), &channel_id.to_string())
            .await
    }

    pub async fn get_blacklists(&self, guild_id: u64) -> Result<Vec<u64>, StoreError> {
        Ok(parse_ids(self.store.smembers(&blacklist_key(guild_id)).await?))
    }

    // ------------------------------------------------------------------------
    // Simple settings
    // ------------------------------------------------------------------------

    pub async fn get_prefix(&self, guild_id: u64) -> Result<String, StoreError> {
        Ok(self
            .get_var(guild_id, FIELD_PREFIX)
            .await?
            .unwrap_or_else(|| self.default_prefix.clone()))
    }

    pub async fn change_prefix(&self, guild_id: u64, prefix: &str) -> Result<(), StoreError> {
        self.update_var(guild_id, FIELD_PREFIX, prefix).await
    }

    async fn get_flag(&self, guild_id: u64, field: &str) -> Result<bool, StoreError> {
        Ok(self
            .get_var(guild_id, field)
            .await?
            .map(|v| parse_bool(&v))
            .unwrap_or(false))
    }

    pub async fn has_spam_filter(&self, guild_id: u64) -> Result<bool, StoreError> {
        self.get_flag(guild_id, ModSetting::SpamFilter.field()).await
    }

    pub async fn has_word_filter(&self, guild_id: u64) -> Result<bool, StoreError> {
        self.get_flag(guild_id, ModSetting::WordFilter.field()).await
    }

    pub async fn has_invite_filter(&self, guild_id: u64) -> Result<bool, StoreError> {
        self.get_flag(guild_id, ModSetting::InviteFilter.field()).await
    }

    pub async fn get_log_channel(&self, guild_id: u64) -> Result<Option<u64>, StoreError> {
        Ok(self
            .get_var(guild_id, FIELD_LOG_CHANNEL)
            .await?
            .and_then(|v| v.parse::<u64>().ok()))
    }

    pub async fn set_log_channel(&self, guild_id: u64, channel_id: Option<u64>) -> Result<(), StoreError> {
        match channel_id {
            Some(id) => self.update_var(guild_id, FIELD_LOG_CHANNEL, &id.to_string()).await,
            None => self.remove_var(guild_id, FIELD_LOG_CHANNEL).await.map(|_| ()),
        }
    }

    pub async fn is_sleeping(&self, guild_id: u64) -> Result<bool, StoreError> {
        self.get_flag(guild_id, FIELD_SLEEPING).await
    }

    pub async fn set_sleeping(&self, guild_id: u64, sleeping: bool) -> Result<(), StoreError> {
        self.update_var(guild_id, FIELD_SLEEPING, &encode_bool(sleeping))
            .await
    }

    pub async fn get_default_channel(&self, guild_id: u64) -> Result<Option<u64>, StoreError> {
        Ok(self
            .get_var(guild_id, FIELD_DEFAULT_CHANNEL)
            .await?
            .and_then(|v| v.parse::<u64>().ok()))
    }

    pub async fn set_default_channel(&self, guild_id: u64, channel_id: u64) -> Result<(), StoreError> {
        self.update_var(guild_id, FIELD_DEFAULT_CHANNEL, &channel_id.to_string())
            .await
    }

    pub async fn get_lang(&self, guild_id: u64) -> Result<String, StoreError> {
        Ok(self
            .get_var(guild_id, FIELD_LANG)
            .await?
            .unwrap_or_else(|| DEFAULT_LANG.to_string()))
    }

    pub async fn set_lang(&self, guild_id: u64, lang: &str) -> Result<(), StoreError> {
        self.update_var(guild_id, FIELD_LANG, lang).await
    }

    // ------------------------------------------------------------------------
    // Mutes
    // ------------------------------------------------------------------------

    pub async fn mute(&self, guild_id: u64, user_id: u64) -> Result<bool, StoreError> {
        self.store
            .sadd(&mutes_key(guild_id), &user_id.to_string())
            .await
    }

    pub async fn unmute(&self, guild_id: u64, user_id: u64) -> Result<bool, StoreError> {
        self.store
            .srem(&mutes_key(guild_id), &user_id.to_string())
            .await
    }

    pub async fn is_muted(&self, guild_id: u64, user_id: u64) -> Result<bool, StoreError> {
        self.store
            .sismember(&mutes_key(guild_id), &user_id.to_string())
            .await
    }

    pub async fn get_mute_list(&self, guild_id: u64) -> Result<Vec<u64>, StoreError> {
        Ok(parse_ids(self.store.smembers(&mutes_key(guild_id)).await?))
    }

    // ------------------------------------------------------------------------
    // Self-roles
    // ------------------------------------------------------------------------

    pub async fn get_selfroles(&self, guild_id: u64) -> Result<Vec<String>, StoreError> {
        let mut roles: Vec<String> = self
            .store
            .smembers(&selfroles_key(guild_id))
            .await?
            .into_iter()
            .collect();
        roles.sort();
        Ok(roles)
    }

    pub async fn add_selfrole(&self, guild_id: u64, role_name: &str) -> Result<bool, StoreError> {
        validate_input(&[role_name])?;
        self.store.sadd(&selfroles_key(guild_id), role_name).await
    }

    pub async fn remove_selfrole(&self, guild_id: u64, role_name: &str) -> Result<bool, StoreError> {
        validate_input(&[role_name])?;
        self.store.srem(&selfroles_key(guild_id), role_name).await
    }

    pub async fn is_selfrole(&self, guild_id: u64, role_name: &str) -> Result<bool, StoreError> {
        self.store.sismember(&selfroles_key(guild_id), role_name).await
    }

    // ------------------------------------------------------------------------
    // Misc
    // ------------------------------------------------------------------------

    pub async fn db_size(&self) -> Result<usize, StoreError> {
        self.store.size().await
    }

    /// Namespaced storage for a plugin.
    pub fn plugin_data(&self, namespace: &str) -> PluginDataManager {
        PluginDataManager::new(Arc::clone(&self.store), namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::store::InMemoryKvStore;

    fn guild(id: u64) -> GuildInfo {
        GuildInfo {
            id,
            name: format!("Guild {}", id),
            owner_id: 900,
        }
    }

    fn handler() -> ServerHandler {
        ServerHandler::new(Arc::new(InMemoryKvStore::new()), 7, "!")
    }

    #[tokio::test]
    async fn test_check_server_creates_defaults_once() {
        let handler = handler();

        assert!(handler.check_server(&guild(1)).await.unwrap());
        handler.change_prefix(1, "?").await.unwrap();

        // Second check must not reset the prefix
        assert!(!handler.check_server(&guild(1)).await.unwrap());
        assert_eq!(handler.get_prefix(1).await.unwrap(), "?");

        let data = handler.get_server_data(1).await.unwrap();
        assert_eq!(data.settings.name, "Guild 1");
        assert!(data.commands.is_empty());
        assert!(data.mutes.is_empty());
    }

    #[tokio::test]
    async fn test_prefix_falls_back_to_default() {
        let handler = handler();
        assert_eq!(handler.get_prefix(55).await.unwrap(), "!");
    }

    #[tokio::test]
    async fn test_moderation_settings() {
        let handler = handler();
        handler.check_server(&guild(1)).await.unwrap();

        let setting = handler
            .update_moderation_settings(1, "spam filter", true)
            .await
            .unwrap();
        assert_eq!(setting, Some(ModSetting::SpamFilter));
        assert!(handler.has_spam_filter(1).await.unwrap());
        assert!(!handler.has_word_filter(1).await.unwrap());

        let unknown = handler
            .update_moderation_settings(1, "volume", true)
            .await
            .unwrap();
        assert_eq!(unknown, None);
    }

    #[tokio::test]
    async fn test_custom_commands() {
        let handler = handler();

        assert!(handler.set_command(1, "!hi", "hello there").await.unwrap());
        assert!(!handler
            .set_command(1, &"x".repeat(MAX_TRIGGER_LENGTH + 1), "nope")
            .await
            .unwrap());

        assert_eq!(handler.get_command_amount(1).await.unwrap(), 1);
        assert!(handler.custom_command_exists(1, "!hi").await.unwrap());
        assert!(handler.remove_command(1, "!hi").await.unwrap());
        assert!(!handler.remove_command(1, "!hi").await.unwrap());
    }

    #[tokio::test]
    async fn test_mutes_and_blacklist() {
        let handler = handler();

        assert!(handler.mute(1, 10).await.unwrap());
        assert!(!handler.mute(1, 10).await.unwrap());
        assert!(handler.is_muted(1, 10).await.unwrap());
        assert!(!handler.is_muted(2, 10).await.unwrap());
        assert_eq!(handler.get_mute_list(1).await.unwrap(), vec![10]);
        assert!(handler.unmute(1, 10).await.unwrap());
        assert!(!handler.is_muted(1, 10).await.unwrap());

        handler.add_channel_blacklist(1, 300).await.unwrap();
        assert!(handler.is_blacklisted(1, 300).await.unwrap());
        handler.remove_channel_blacklist(1, 300).await.unwrap();
        assert!(handler.get_blacklists(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_input_too_long_is_rejected() {
        let handler = handler();
        let long = "a".repeat(801);

        let result = handler.update_var(1, FIELD_WELCOME_MSG, &long).await;
        assert!(matches!(result, Err(StoreError::InputTooLong)));
    }

    #[tokio::test]
    async fn test_delete_server_by_list() {
        let handler = handler();
        for id in [1, 2, 3] {
            handler.check_server(&guild(id)).await.unwrap();
        }
        handler.mute(2, 10).await.unwrap();

        let removed = handler.delete_server_by_list(&[1, 3]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!handler.server_exists(2).await.unwrap());
        assert!(handler.get_mute_list(2).await.unwrap().is_empty());
        assert!(handler.server_exists(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_server_vars_refreshes_owner() {
        let handler = handler();
        handler.check_server(&guild(1)).await.unwrap();

        let renamed = GuildInfo {
            id: 1,
            name: "Renamed".to_string(),
            owner_id: 901,
        };
        handler.check_server_vars(&renamed).await.unwrap();

        let settings = handler.get_settings(1).await.unwrap();
        assert_eq!(settings.name, "Renamed");
        assert_eq!(settings.owner_id, Some(901));
    }

    #[tokio::test]
    async fn test_log_channel_and_sleep() {
        let handler = handler();

        handler.set_log_channel(1, Some(77)).await.unwrap();
        assert_eq!(handler.get_log_channel(1).await.unwrap(), Some(77));
        handler.set_log_channel(1, None).await.unwrap();
        assert_eq!(handler.get_log_channel(1).await.unwrap(), None);

        handler.set_sleeping(1, true).await.unwrap();
        assert!(handler.is_sleeping(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_selfroles() {
        let handler = handler();

        assert!(handler.add_selfrole(1, "Gamer").await.unwrap());
        assert!(handler.add_selfrole(1, "Artist").await.unwrap());
        assert!(handler.is_selfrole(1, "Gamer").await.unwrap());
        assert_eq!(
            handler.get_selfroles(1).await.unwrap(),
            vec!["Artist".to_string(), "Gamer".to_string()]
        );
        assert!(handler.remove_selfrole(1, "Gamer").await.unwrap());
        assert!(!handler.is_selfrole(1, "Gamer").await.unwrap());

        let long_name = "x".repeat(801);
        assert!(matches!(
            handler.add_selfrole(1, &long_name).await,
            Err(StoreError::InputTooLong)
        ));
        assert!(matches!(
            handler.remove_selfrole(1, &long_name).await,
            Err(StoreError::InputTooLong)
        ));
    }

    #[test]
    fn test_permissions() {
        let handler = handler();
        let g = guild(1);
        let none: Vec<String> = vec![];
        let admin = vec![ADMIN_ROLE.to_string()];
        let moderator = vec![MOD_ROLE.to_string()];

        assert!(handler.can_use_admin_commands(7, &none, &g)); // bot owner
        assert!(handler.can_use_admin_commands(900, &none, &g)); // server owner
        assert!(handler.can_use_admin_commands(1, &admin, &g));
        assert!(!handler.can_use_admin_commands(1, &moderator, &g));

        assert!(handler.is_mod(1, &moderator, &g));
        assert!(handler.is_mod(1, &admin, &g));
        assert!(!handler.is_mod(1, &none, &g));
    }

    #[tokio::test]
    async fn test_plugin_data_namespacing() {
        let handler = handler();
        let data = handler.plugin_data("reminder");

        data.hset("1:2", "raw", "stretch").await.unwrap();
        assert!(data.exists("1:2").await.unwrap());

        let keys = data.scan("1:*", true).await.unwrap();
        assert_eq!(keys, vec!["reminder:1:2".to_string()]);
        assert_eq!(
            data.hgetall_raw(&keys[0]).await.unwrap().get("raw").map(String::as_str),
            Some("stretch")
        );

        assert!(data.delete("1:2").await.unwrap());
        assert!(!data.exists("1:2").await.unwrap());
    }
}
