// Guild and member gateway events: server records, welcome/leave/ban
// messages and the join/leave log.

use crate::core::util::fill_placeholders;
use crate::discord::messages::snapshot::guild_info;
use crate::discord::{Data, Error};
use poise::serenity_prelude::{self as serenity, Mentionable};

const LOG_EMBED_COLOR: u32 = 0x2E75CC;
const FALLBACK_CHANNEL: &str = "general";

/// Where welcome, leave and ban messages go: the configured channel when it
/// still exists, else `#general`, else the top-most text channel.
///
/// `channels` holds text channels in display order.
pub fn pick_default_channel(stored: Option<u64>, channels: &[(u64, String)]) -> Option<u64> {
    if let Some(id) = stored {
        if channels.iter().any(|(c, _)| *c == id) {
            return Some(id);
        }
        tracing::debug!(channel_id = id, "Configured default channel is gone");
    }

    channels
        .iter()
        .find(|(_, name)| name == FALLBACK_CHANNEL)
        .or_else(|| channels.first())
        .map(|(id, _)| *id)
}

pub fn text_channels(ctx: &serenity::Context, guild_id: serenity::GuildId) -> Vec<(u64, String)> {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return Vec::new();
    };
    let mut channels: Vec<&serenity::GuildChannel> = guild
        .channels
        .values()
        .filter(|c| c.kind == serenity::ChannelType::Text)
        .collect();
    channels.sort_by_key(|c| (c.position, c.id));
    channels
        .into_iter()
        .map(|c| (c.id.get(), c.name.clone()))
        .collect()
}

fn guild_name(ctx: &serenity::Context, guild_id: serenity::GuildId) -> String {
    ctx.cache
        .guild(guild_id)
        .map(|g| g.name.clone())
        .unwrap_or_default()
}

/// Public ban message, or `None` when disabled or when the ban is a soft ban.
pub fn ban_message(
    softbanned: bool,
    template: Option<&str>,
    user_name: &str,
    server: &str,
) -> Option<String> {
    if softbanned {
        return None;
    }
    template.map(|template| fill_placeholders(template, user_name, server))
}

fn log_embed(user: &serenity::User, action: &str) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .description(format!("ID: {}", user.id))
        .colour(LOG_EMBED_COLOR)
        .author(
            serenity::CreateEmbedAuthor::new(format!("{} {}", user.name, action))
                .icon_url(user.face()),
        )
        .timestamp(serenity::Timestamp::now())
}

/// Post the log embed (when a log channel is set) and the member message
/// (unless disabled) of one member event.
async fn announce(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    user: &serenity::User,
    action: &str,
    message: Option<String>,
) -> Result<(), Error> {
    let settings = data.handler.get_settings(guild_id.get()).await?;

    if let Some(log_channel) = settings.log_channel {
        if let Err(e) = serenity::ChannelId::new(log_channel)
            .send_message(
                &ctx.http,
                serenity::CreateMessage::new().embed(log_embed(user, action)),
            )
            .await
        {
            tracing::warn!(log_channel, "Failed to write member log: {}", e);
        }
    }

    let Some(message) = message else {
        return Ok(());
    };
    let channels = text_channels(ctx, guild_id);
    match pick_default_channel(settings.default_channel, &channels) {
        Some(channel) => {
            serenity::ChannelId::new(channel)
                .say(&ctx.http, message)
                .await?;
        }
        None => tracing::warn!(guild_id = guild_id.get(), "No channel to announce in"),
    }
    Ok(())
}

pub async fn handle_ready(data: &Data, ready: &serenity::Ready) -> Result<(), Error> {
    tracing::info!("{} is connected!", ready.user.name);

    let current: Vec<u64> = ready.guilds.iter().map(|g| g.id.get()).collect();
    let removed = data.handler.delete_server_by_list(&current).await?;
    if removed > 0 {
        tracing::info!(removed, "Removed data of servers the bot left");
    }
    Ok(())
}

pub async fn handle_guild_create(
    ctx: &serenity::Context,
    data: &Data,
    guild: &serenity::Guild,
    is_new: bool,
) -> Result<(), Error> {
    let info = guild_info(guild);
    let created = data.handler.check_server(&info).await?;
    data.handler.check_server_vars(&info).await?;

    if created && is_new {
        tracing::info!(guild_id = info.id, name = %info.name, "Joined a new server");
        let channels = text_channels(ctx, guild.id);
        if let Some(channel) = pick_default_channel(None, &channels) {
            let prefix = data.handler.get_prefix(info.id).await?;
            serenity::ChannelId::new(channel)
                .say(
                    &ctx.http,
                    format!(
                        "Hi! I'm Nano. Type `{}help` to see what I can do :wave:",
                        prefix
                    ),
                )
                .await?;
        }
    }
    Ok(())
}

pub async fn handle_guild_delete(
    data: &Data,
    incomplete: &serenity::UnavailableGuild,
) -> Result<(), Error> {
    // Outages also produce GuildDelete; only a real removal drops the data.
    if incomplete.unavailable {
        return Ok(());
    }
    if data.handler.delete_server(incomplete.id.get()).await? {
        tracing::info!(guild_id = incomplete.id.get(), "Removed from server");
    }
    Ok(())
}

pub async fn handle_member_join(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
) -> Result<(), Error> {
    let guild_id = member.guild_id;
    let settings = data.handler.get_settings(guild_id.get()).await?;
    let message = settings.welcome_msg.map(|template| {
        fill_placeholders(
            &template,
            &member.mention().to_string(),
            &guild_name(ctx, guild_id),
        )
    });

    announce(ctx, data, guild_id, &member.user, "joined the server", message).await
}

pub async fn handle_member_remove(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    user: &serenity::User,
) -> Result<(), Error> {
    let noted = data.softbans.take_ban_note(guild_id.get(), user.id.get());
    if noted || data.softbans.get_ban(guild_id.get(), user.id.get()).is_some() {
        return Ok(());
    }

    let settings = data.handler.get_settings(guild_id.get()).await?;
    let message = settings
        .leave_msg
        .map(|template| fill_placeholders(&template, &user.name, &guild_name(ctx, guild_id)));

    announce(ctx, data, guild_id, user, "left the server", message).await
}

pub async fn handle_member_ban(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    user: &serenity::User,
) -> Result<(), Error> {
    data.softbans.note_ban(guild_id.get(), user.id.get());
    let softbanned = data
        .softbans
        .get_ban(guild_id.get(), user.id.get())
        .is_some();

    let settings = data.handler.get_settings(guild_id.get()).await?;
    let message = ban_message(
        softbanned,
        settings.ban_msg.as_deref(),
        &user.name,
        &guild_name(ctx, guild_id),
    );

    announce(ctx, data, guild_id, user, "was banned", message).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> Vec<(u64, String)> {
        vec![
            (5, "rules".to_string()),
            (6, "general".to_string()),
            (7, "memes".to_string()),
        ]
    }

    #[test]
    fn test_configured_channel_wins() {
        assert_eq!(pick_default_channel(Some(7), &channels()), Some(7));
    }

    #[test]
    fn test_falls_back_to_general() {
        assert_eq!(pick_default_channel(None, &channels()), Some(6));
        // Stale configured channel
        assert_eq!(pick_default_channel(Some(99), &channels()), Some(6));
    }

    #[test]
    fn test_soft_bans_stay_quiet() {
        assert_eq!(
            ban_message(false, Some(":user was banned from :server"), "bob", "Test Server"),
            Some("bob was banned from Test Server".to_string())
        );
        assert_eq!(ban_message(true, Some(":user was banned"), "bob", "Test Server"), None);
        assert_eq!(ban_message(false, None, "bob", "Test Server"), None);
    }

    #[test]
    fn test_falls_back_to_top_channel() {
        let channels = vec![(5, "rules".to_string()), (7, "memes".to_string())];
        assert_eq!(pick_default_channel(None, &channels), Some(5));
        assert_eq!(pick_default_channel(None, &[]), None);
    }
}
