// This is the entry point of Nano.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic): store, plugins, services
// - `infra/` = Implementations of core traits (SQLite, HTTP lookups, filter files)
// - `discord/` = Discord-specific adapters (slash commands, message routing, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands, event handlers and background pollers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::{BotConfig, StoreKind};
use crate::core::lookups::XkcdService;
use crate::core::moderation::ModerationService;
use crate::core::plugins::{build_router, PluginServices};
use crate::core::reminders::ReminderService;
use crate::core::softbans::SoftBanScheduler;
use crate::core::stats::BotStats;
use crate::core::store::{KvStore, ServerHandler};
use crate::core::voting::VoteService;
use crate::discord::commands::presence;
use crate::discord::lifecycle::{guild_events, pollers};
use crate::discord::messages;
use crate::discord::{Data, Error};
use crate::infra::lookups::{ChuckNorrisClient, WikipediaClient, XkcdClient};
use crate::infra::moderation::{load_spam_model, load_word_filter};
use crate::infra::store::{InMemoryKvStore, SqliteKvStore};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Event handler for non-command Discord events.
/// Prefix commands and the filters run through the plugin router from here.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = messages::handle_message(ctx, data, new_message).await {
                tracing::error!("Error handling message: {}", e);
            }
        }
        serenity::FullEvent::Ready { data_about_bot } => {
            if let Err(e) = guild_events::handle_ready(data, data_about_bot).await {
                tracing::error!("Error cleaning up stored servers: {}", e);
            }
        }
        serenity::FullEvent::GuildCreate { guild, is_new } => {
            if let Err(e) =
                guild_events::handle_guild_create(ctx, data, guild, is_new.unwrap_or(false)).await
            {
                tracing::error!("Error setting up server {}: {}", guild.id, e);
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            if let Err(e) = guild_events::handle_guild_delete(data, incomplete).await {
                tracing::error!("Error removing server {}: {}", incomplete.id, e);
            }
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = guild_events::handle_member_join(ctx, data, new_member).await {
                tracing::error!("Error handling member join: {}", e);
            }
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            if let Err(e) = guild_events::handle_member_remove(ctx, data, *guild_id, user).await {
                tracing::error!("Error handling member remove: {}", e);
            }
        }
        serenity::FullEvent::GuildBanAddition {
            guild_id,
            banned_user,
        } => {
            if let Err(e) =
                guild_events::handle_member_ban(ctx, data, *guild_id, banned_user).await
            {
                tracing::error!("Error handling member ban: {}", e);
            }
        }

        _ => {}
    }

    Ok(())
}

fn gateway_intents() -> serenity::GatewayIntents {
    serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_PRESENCES // Online counts in user and server info
        | serenity::GatewayIntents::GUILD_MODERATION
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;

    // Keep runtime data in a dedicated folder so the repo root stays tidy.
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.data_dir.display()
        )
    })?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let store: Arc<dyn KvStore> = match config.store {
        StoreKind::Sqlite => {
            let path = config.database_path();
            tracing::info!(path = %path.display(), "Using SQLite store");
            Arc::new(SqliteKvStore::new(&path.to_string_lossy()).await?)
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store, settings are lost on restart");
            Arc::new(InMemoryKvStore::new())
        }
    };

    let handler = Arc::new(ServerHandler::new(
        store,
        config.owner_id,
        config.default_prefix.clone(),
    ));

    let moderation = Arc::new(ModerationService::new(
        load_word_filter(&config.banned_words).await?,
        load_spam_model(&config.spam_model).await?,
    ));

    let reminders = Arc::new(ReminderService::new(handler.plugin_data("reminder")));
    let softbans = Arc::new(SoftBanScheduler::new());
    let xkcd = Arc::new(XkcdService::new(Arc::new(XkcdClient::new()?)));
    let stats = Arc::new(BotStats::new());

    let router = Arc::new(build_router(PluginServices {
        handler: Arc::clone(&handler),
        moderation,
        reminders: Arc::clone(&reminders),
        votes: Arc::new(VoteService::new()),
        softbans: Arc::clone(&softbans),
        xkcd: Arc::clone(&xkcd),
        jokes: Arc::new(ChuckNorrisClient::new()?),
        wiki: Arc::new(WikipediaClient::new()?),
        stats: Arc::clone(&stats),
        version: env!("CARGO_PKG_VERSION"),
    }));
    tracing::info!(plugins = ?router.plugin_names(), "Plugins loaded");

    let restart = Arc::new(AtomicBool::new(false));
    let restart_flag = Arc::clone(&restart);

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Bot is starting up...");

                // Create the data structure that will be shared across all commands
                let data = Data {
                    handler,
                    router,
                    reminders,
                    softbans,
                    xkcd,
                    stats,
                    shard_manager: Arc::clone(framework.shard_manager()),
                    restart: restart_flag,
                };

                // Register slash commands globally (can take up to an hour to propagate)
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                pollers::spawn_reminders(ctx.clone(), Arc::clone(&data.reminders));
                pollers::spawn_softbans(ctx.clone(), Arc::clone(&data.softbans));
                pollers::spawn_xkcd_refresh(Arc::clone(&data.xkcd));
                presence::spawn_rotation(ctx.clone());

                tracing::info!("Bot is ready!");
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.token, gateway_intents())
        .framework(framework)
        .await
        .context("Error creating client")?;

    client.start().await.context("Error running bot")?;

    if restart.load(Ordering::SeqCst) {
        let exe = std::env::current_exe().context("Could not locate the bot executable")?;
        tracing::info!(exe = %exe.display(), "Starting a new instance");
        std::process::Command::new(exe)
            .args(std::env::args_os().skip(1))
            .spawn()
            .context("Failed to restart")?;
    }
    tracing::info!("Shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intents_cover_member_events_and_presences() {
        let intents = gateway_intents();
        assert!(intents.contains(serenity::GatewayIntents::GUILD_PRESENCES));
        assert!(intents.contains(serenity::GatewayIntents::GUILD_MEMBERS));
        assert!(intents.contains(serenity::GatewayIntents::MESSAGE_CONTENT));
    }
}
