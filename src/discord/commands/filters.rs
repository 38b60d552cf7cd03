// Slash commands for the moderation filters and the log channel.

use crate::core::store::ModSetting;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum FilterChoice {
    #[name = "Word filter"]
    Words,
    #[name = "Spam filter"]
    Spam,
    #[name = "Invite filter"]
    Invites,
}

impl From<FilterChoice> for ModSetting {
    fn from(choice: FilterChoice) -> Self {
        match choice {
            FilterChoice::Words => ModSetting::WordFilter,
            FilterChoice::Spam => ModSetting::SpamFilter,
            FilterChoice::Invites => ModSetting::InviteFilter,
        }
    }
}

/// Manage the moderation filters.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    subcommands("status", "set", "logchannel")
)]
pub async fn filters(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show which filters are on and where deletions are logged.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let settings = ctx.data().handler.get_settings(guild_id).await?;

    let on_off = |enabled: bool| if enabled { "On" } else { "Off" };
    let log_channel = settings
        .log_channel
        .map(|id| format!("<#{}>", id))
        .unwrap_or_else(|| "Not set".to_string());

    let embed = serenity::CreateEmbed::default()
        .title("Moderation Filters")
        .color(serenity::Color::BLURPLE)
        .field("Word filter", on_off(settings.word_filter), true)
        .field("Spam filter", on_off(settings.spam_filter), true)
        .field("Invite filter", on_off(settings.invite_filter), true)
        .field("Log Channel", log_channel, false)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Prefix: {}",
            settings.prefix
        )))
        .timestamp(serenity::Timestamp::now());

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Turn a filter on or off.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn set(
    ctx: Context<'_>,
    #[description = "Which filter"] filter: FilterChoice,
    #[description = "On or off"] enabled: bool,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let setting = ModSetting::from(filter);

    ctx.data()
        .handler
        .update_moderation_settings(guild_id, setting.field(), enabled)
        .await?;

    let state = if enabled { "enabled" } else { "disabled" };
    ctx.say(format!("✅ {} {}.", setting.label(), state)).await?;
    Ok(())
}

/// Select the channel deletions are logged to, or clear it.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn logchannel(
    ctx: Context<'_>,
    #[description = "Channel to log to (leave empty to disable)"] channel: Option<
        serenity::Channel,
    >,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let channel_id = channel.map(|c| c.id().get());

    ctx.data()
        .handler
        .set_log_channel(guild_id, channel_id)
        .await?;

    match channel_id {
        Some(id) => ctx.say(format!("✅ Log channel set to <#{}>.", id)).await?,
        None => ctx.say("🛑 Log channel disabled.").await?,
    };
    Ok(())
}
