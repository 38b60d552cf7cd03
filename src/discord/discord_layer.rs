// Discord layer - slash commands, message routing and gateway events.

#[path = "commands/command_catalog.rs"]
pub mod commands;
#[path = "lifecycle/mod.rs"]
pub mod lifecycle;
#[path = "messages/mod.rs"]
pub mod messages;

use crate::core::lookups::XkcdService;
use crate::core::plugins::PluginRouter;
use crate::core::reminders::ReminderService;
use crate::core::softbans::SoftBanScheduler;
use crate::core::stats::BotStats;
use crate::core::store::ServerHandler;
use poise::serenity_prelude as serenity;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Shared state handed to every command and event handler.
pub struct Data {
    pub handler: Arc<ServerHandler>,
    pub router: Arc<PluginRouter>,
    pub reminders: Arc<ReminderService>,
    pub softbans: Arc<SoftBanScheduler>,
    pub xkcd: Arc<XkcdService>,
    pub stats: Arc<BotStats>,
    pub shard_manager: Arc<serenity::ShardManager>,
    /// Set before shutting down when a fresh process should take over
    pub restart: Arc<AtomicBool>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
