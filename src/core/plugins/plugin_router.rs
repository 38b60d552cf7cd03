// Plugin router - runs every registered plugin over an incoming message.

use super::plugin_models::*;
use crate::core::store::{ServerHandler, StoreError, DEFAULT_LANG};
use std::sync::Arc;

/// Literal command that still works while the bot sleeps in a guild.
pub const WAKE_COMMAND: &str = "nano.wake";

/// Command tables of every plugin, used for "is this a command" checks and help.
#[derive(Debug, Clone, Default)]
pub struct CommandCatalog {
    groups: Vec<(&'static str, &'static [CommandSpec])>,
}

impl CommandCatalog {
    pub fn new(groups: Vec<(&'static str, &'static [CommandSpec])>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[(&'static str, &'static [CommandSpec])] {
        &self.groups
    }

    pub fn all(&self) -> impl Iterator<Item = &CommandSpec> {
        self.groups.iter().flat_map(|(_, specs)| specs.iter())
    }

    pub fn is_known_command(&self, content: &str, prefix: &str) -> bool {
        is_valid_command(content, self.all().map(|c| c.trigger), prefix)
    }

    /// Look up a command by what a user typed: `remind list`, `!remind list` or `nano.info`.
    pub fn find(&self, query: &str, prefix: &str) -> Option<&CommandSpec> {
        let query = query.trim();
        let relative = match query.strip_prefix(prefix) {
            Some(rest) if !prefix.is_empty() => format!("_{}", rest),
            _ => format!("_{}", query),
        };
        self.all()
            .find(|c| c.trigger == query)
            .or_else(|| self.all().find(|c| c.trigger == relative))
    }
}

pub struct PluginRouter {
    handler: Arc<ServerHandler>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRouter {
    pub fn new(handler: Arc<ServerHandler>) -> Self {
        Self {
            handler,
            plugins: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        tracing::info!(plugin = plugin.name(), priority = plugin.priority(), "Registered plugin");
        self.plugins.push(plugin);
        self.plugins.sort_by_key(|p| p.priority());
    }

    pub fn plugin_names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Run the plugins over a message and collect what they want done.
    pub async fn dispatch(&self, event: &MessageEvent) -> Result<Vec<Action>, StoreError> {
        let mut out = Outbox::new(event.channel_id);
        if event.author.bot {
            return Ok(out.into_actions());
        }

        let (prefix, lang) = match &event.guild {
            Some(guild) => {
                let guild_id = guild.id();
                self.handler.check_server(&guild.info).await?;

                if self.handler.is_sleeping(guild_id).await?
                    && !event.content.starts_with(WAKE_COMMAND)
                {
                    return Ok(out.into_actions());
                }

                (
                    self.handler.get_prefix(guild_id).await?,
                    self.handler.get_lang(guild_id).await?,
                )
            }
            None => (
                self.handler.default_prefix().to_string(),
                DEFAULT_LANG.to_string(),
            ),
        };

        let ctx = PluginContext {
            event,
            prefix: &prefix,
            lang: &lang,
        };

        for plugin in &self.plugins {
            match plugin.on_message(&ctx, &mut out).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(PluginError::GuildOnly) => {
                    out.say("This command only works in servers.");
                    break;
                }
                Err(e) => {
                    tracing::error!(plugin = plugin.name(), "Plugin failed: {}", e);
                }
            }
        }

        Ok(out.into_actions())
    }
}
