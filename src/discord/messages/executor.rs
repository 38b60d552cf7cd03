// Carry out the actions plugins asked for.

use super::snapshot::message_event;
use crate::core::plugins::{Action, EmbedSpec, RoleOp};
use crate::core::stats::Stat;
use crate::core::store::StoreError;
use crate::core::util::make_dots;
use crate::discord::commands::presence;
use crate::discord::lifecycle::guild_events::{pick_default_channel, text_channels};
use crate::discord::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::atomic::Ordering;
use std::time::Duration;
use thiserror::Error;

/// Discord caps bulk fetches and bulk deletes at 100 messages.
const PURGE_BATCH: u64 = 100;
const PURGE_NOTICE: Duration = Duration::from_millis(1500);
const SERVER_INFO_COLOR: u32 = 0x3F51B5;

#[derive(Debug, Error)]
enum ActionError {
    #[error(transparent)]
    Discord(#[from] serenity::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No such role: '{0}'")]
    UnknownRole(String),

    #[error(":warning: You are not allowed to mess with this role (you are lower in the \"hierarchy\"). ¯\\_(ツ)_/¯")]
    Hierarchy,

    #[error(":warning: Could not unban: user with such name does not exist.")]
    NotBanned,

    #[error("Server is not cached yet, try again in a moment.")]
    GuildUnavailable,
}

impl ActionError {
    fn user_message(&self) -> String {
        match self {
            ActionError::Discord(_) => {
                ":warning: Could not do that, I am probably missing permissions.".to_string()
            }
            ActionError::Store(_) => ":warning: Could not read stored data.".to_string(),
            other => other.to_string(),
        }
    }
}

pub fn embed_from_spec(spec: EmbedSpec) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(spec.title)
        .colour(spec.color);

    if let Some(description) = spec.description {
        embed = embed.description(description);
    }
    if let Some((name, icon_url)) = spec.author {
        let mut author = serenity::CreateEmbedAuthor::new(name);
        if let Some(url) = icon_url {
            author = author.icon_url(url);
        }
        embed = embed.author(author);
    }
    for (name, value, inline) in spec.fields {
        embed = embed.field(name, value, inline);
    }
    if let Some(url) = spec.thumbnail {
        embed = embed.thumbnail(url);
    }
    if let Some(url) = spec.image {
        embed = embed.image(url);
    }
    if let Some(text) = spec.footer {
        embed = embed.footer(serenity::CreateEmbedFooter::new(text));
    }
    embed
}

/// Snapshot a message, route it through the plugins and execute the result.
pub async fn handle_message(
    ctx: &serenity::Context,
    data: &Data,
    msg: &serenity::Message,
) -> Result<(), Error> {
    if msg.author.bot {
        return Ok(());
    }

    let event = message_event(ctx, msg);
    let actions = data.router.dispatch(&event).await?;
    execute(ctx, data, msg.channel_id, actions).await;
    Ok(())
}

/// Run actions in order. A failed member action (kick, ban, roles...) is
/// reported in `reply_to` and drops everything after it.
pub async fn execute(
    ctx: &serenity::Context,
    data: &Data,
    reply_to: serenity::ChannelId,
    actions: Vec<Action>,
) {
    for action in actions {
        let member_action = action.is_member_action();

        match run(ctx, data, action).await {
            Ok(()) => {}
            Err(e) if member_action => {
                tracing::warn!("Member action failed: {}", e);
                if let Err(e) = reply_to.say(&ctx.http, e.user_message()).await {
                    tracing::warn!("Failed to report action failure: {}", e);
                }
                break;
            }
            Err(e) => tracing::warn!("Action failed: {}", e),
        }
    }
}

async fn run(ctx: &serenity::Context, data: &Data, action: Action) -> Result<(), ActionError> {
    match action {
        Action::Send {
            channel_id,
            content,
        } => {
            serenity::ChannelId::new(channel_id)
                .say(&ctx.http, content)
                .await?;
        }
        Action::SendEmbed { channel_id, embed } => {
            serenity::ChannelId::new(channel_id)
                .send_message(
                    &ctx.http,
                    serenity::CreateMessage::new().embed(embed_from_spec(embed)),
                )
                .await?;
        }
        Action::SendTemporary {
            channel_id,
            content,
            delete_after,
        } => {
            send_temporary(ctx, serenity::ChannelId::new(channel_id), content, delete_after)
                .await?;
        }
        Action::DirectMessage { user_id, content } => {
            serenity::UserId::new(user_id)
                .direct_message(ctx, serenity::CreateMessage::new().content(content))
                .await?;
        }
        Action::DeleteMessage {
            channel_id,
            message_id,
        } => {
            serenity::ChannelId::new(channel_id)
                .delete_message(&ctx.http, serenity::MessageId::new(message_id))
                .await?;
        }
        Action::Purge {
            channel_id,
            amount,
            author,
            notice,
        } => {
            let channel = serenity::ChannelId::new(channel_id);
            let deleted = purge(ctx, channel, amount, author).await?;
            if let Some(template) = notice {
                let content = template.replace(":count", &deleted.to_string());
                send_temporary(ctx, channel, content, PURGE_NOTICE).await?;
            }
        }
        Action::Kick { guild_id, user_id } => {
            serenity::GuildId::new(guild_id)
                .kick(&ctx.http, serenity::UserId::new(user_id))
                .await?;
        }
        Action::Ban { guild_id, user_id } => {
            serenity::GuildId::new(guild_id)
                .ban(&ctx.http, serenity::UserId::new(user_id), 0)
                .await?;
        }
        Action::Unban { guild_id, user_id } => {
            serenity::GuildId::new(guild_id)
                .unban(&ctx.http, serenity::UserId::new(user_id))
                .await?;
        }
        Action::UnbanByName {
            guild_id,
            channel_id,
            name,
        } => {
            let guild_id = serenity::GuildId::new(guild_id);
            let bans = guild_id.bans(&ctx.http, None, None).await?;
            let user = bans
                .into_iter()
                .map(|ban| ban.user)
                .find(|user| user.name == name)
                .ok_or(ActionError::NotBanned)?;

            guild_id.unban(&ctx.http, user.id).await?;
            serenity::ChannelId::new(channel_id)
                .say(&ctx.http, format!("**{}** has been unbanned.", user.name))
                .await?;
        }
        Action::ModifyRole {
            guild_id,
            actor_id,
            user_id,
            role_name,
            op,
            ..
        } => modify_role(ctx, guild_id, actor_id, user_id, &role_name, op).await?,
        Action::ShowUserInfo {
            channel_id,
            guild_id,
            user_id,
        } => {
            let embed = user_info(ctx, guild_id, user_id).await?;
            serenity::ChannelId::new(channel_id)
                .send_message(
                    &ctx.http,
                    serenity::CreateMessage::new()
                        .content("**User info:**")
                        .embed(embed),
                )
                .await?;
        }
        Action::ShowStatus { channel_id } => {
            serenity::ChannelId::new(channel_id)
                .send_message(
                    &ctx.http,
                    serenity::CreateMessage::new()
                        .content("**Stats**")
                        .embed(status_embed(ctx, data)),
                )
                .await?;
        }
        Action::ShowServerInfo {
            channel_id,
            guild_id,
        } => {
            let embed = server_info(ctx, guild_id)?;
            serenity::ChannelId::new(channel_id)
                .send_message(
                    &ctx.http,
                    serenity::CreateMessage::new()
                        .content("**Server info:**")
                        .embed(embed),
                )
                .await?;
        }
        Action::ShowGuildReport {
            channel_id,
            guild_id,
        } => {
            let report = guild_report(ctx, data, guild_id).await?;
            serenity::ChannelId::new(channel_id)
                .say(&ctx.http, report)
                .await?;
        }
        Action::LeaveGuild {
            channel_id,
            guild_id,
        } => {
            serenity::GuildId::new(guild_id).leave(&ctx.http).await?;
            serenity::ChannelId::new(channel_id)
                .say(&ctx.http, format!("Left {}", guild_id))
                .await?;
        }
        Action::TidyServers { channel_id } => {
            let current: Vec<u64> = ctx.cache.guilds().iter().map(|g| g.get()).collect();
            let removed = data.handler.delete_server_by_list(&current).await?;
            serenity::ChannelId::new(channel_id)
                .say(
                    &ctx.http,
                    format!("Removed data of {} servers :ok_hand:", removed),
                )
                .await?;
        }
        Action::Announce {
            channel_id,
            content,
        } => {
            let sent = announce(ctx, data, &content).await;
            serenity::ChannelId::new(channel_id)
                .say(&ctx.http, format!("Sent to {} servers", sent))
                .await?;
        }
        Action::SetPlaying { status } => presence::set_status(ctx, &status),
        Action::Shutdown { restart } => {
            data.restart.store(restart, Ordering::SeqCst);
            tracing::info!(restart, "Shutting down all shards");
            data.shard_manager.shutdown_all().await;
        }
    }
    Ok(())
}

fn server_info(ctx: &serenity::Context, guild_id: u64) -> Result<serenity::CreateEmbed, ActionError> {
    let guild = ctx
        .cache
        .guild(serenity::GuildId::new(guild_id))
        .ok_or(ActionError::GuildUnavailable)?;

    let online = guild
        .presences
        .values()
        .filter(|p| p.status == serenity::OnlineStatus::Online)
        .count();
    let count_kind = |kind: serenity::ChannelType| {
        guild.channels.values().filter(|c| c.kind == kind).count()
    };
    let text = count_kind(serenity::ChannelType::Text);
    let voice = count_kind(serenity::ChannelType::Voice);
    let verification = match guild.verification_level {
        serenity::VerificationLevel::None => "None",
        serenity::VerificationLevel::Low => "Low",
        serenity::VerificationLevel::Medium => "Medium",
        _ => "High",
    };
    let owner = guild
        .members
        .get(&guild.owner_id)
        .map(|m| m.user.name.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let mut author = serenity::CreateEmbedAuthor::new(&guild.name);
    let mut embed = serenity::CreateEmbed::new()
        .colour(SERVER_INFO_COLOR)
        .description(format!("ID: {}", guild.id));
    if let Some(icon) = guild.icon_url() {
        author = author.icon_url(&icon);
        embed = embed.thumbnail(icon);
    }

    Ok(embed
        .author(author)
        .field(
            format!("Members ({})", guild.member_count),
            format!("{} online", online),
            true,
        )
        .field(
            format!("Channels ({})", text + voice),
            format!("{} voice, {} text", voice, text),
            true,
        )
        .field("Verification Level", verification, true)
        // @everyone is not counted
        .field("Roles", guild.roles.len().saturating_sub(1).to_string(), true)
        .field("Owner", format!("{} (ID: {})", owner, guild.owner_id), true)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Created on {}",
            guild.id.created_at().format("%Y-%m-%d %H:%M:%S")
        ))))
}

/// Cached details and stored settings of a guild, for the bot owner.
async fn guild_report(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: u64,
) -> Result<String, ActionError> {
    let cached = ctx.cache.guild(serenity::GuildId::new(guild_id)).map(|g| {
        let channels: Vec<String> = g.channels.values().map(|c| c.name.clone()).collect();
        let owner = g
            .members
            .get(&g.owner_id)
            .map(|m| m.user.name.clone())
            .unwrap_or_else(|| g.owner_id.to_string());
        (g.name.clone(), g.member_count, channels.join(","), owner)
    });
    let Some((name, members, channels, owner)) = cached else {
        return Ok("No such guild. :x:".to_string());
    };

    let stored = data.handler.get_server_data(guild_id).await?;
    let settings = &stored.settings;
    Ok(format!(
        "{}\n```css\nMember count: {}\nChannels: {}\nOwner: {}```\n\
         *Settings*: ```prefix: {}\nword filter: {}\nspam filter: {}\ninvite filter: {}\n\
         log channel: {:?}\nsleeping: {}\ncustom commands: {}\nblacklisted channels: {}\nmuted: {}```",
        name,
        members,
        make_dots(&channels, 500),
        owner,
        settings.prefix,
        settings.word_filter,
        settings.spam_filter,
        settings.invite_filter,
        settings.log_channel,
        settings.sleeping,
        stored.commands.len(),
        stored.blacklist.len(),
        stored.mutes.len(),
    ))
}

/// Post to the default channel of every cached guild. Returns how many got it.
async fn announce(ctx: &serenity::Context, data: &Data, content: &str) -> usize {
    let mut sent = 0;
    for guild_id in ctx.cache.guilds() {
        let stored = match data.handler.get_default_channel(guild_id.get()).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(guild_id = guild_id.get(), "Failed to read default channel: {}", e);
                None
            }
        };
        let Some(channel) = pick_default_channel(stored, &text_channels(ctx, guild_id)) else {
            continue;
        };

        match serenity::ChannelId::new(channel).say(&ctx.http, content).await {
            Ok(_) => {
                tracing::info!(guild_id = guild_id.get(), "Sent announcement");
                sent += 1;
            }
            Err(e) => tracing::warn!(guild_id = guild_id.get(), "Announcement failed: {}", e),
        }
    }
    sent
}

async fn send_temporary(
    ctx: &serenity::Context,
    channel: serenity::ChannelId,
    content: String,
    delete_after: Duration,
) -> Result<(), serenity::Error> {
    let sent = channel.say(&ctx.http, content).await?;
    let http = ctx.http.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delete_after).await;
        if let Err(e) = channel.delete_message(&http, sent.id).await {
            tracing::debug!("Temporary message already gone: {}", e);
        }
    });
    Ok(())
}

/// Delete up to one batch of recent messages and return how many went.
async fn purge(
    ctx: &serenity::Context,
    channel: serenity::ChannelId,
    amount: u64,
    author: Option<u64>,
) -> Result<usize, serenity::Error> {
    let fetch = if author.is_some() {
        PURGE_BATCH
    } else {
        amount.min(PURGE_BATCH)
    };

    let ids: Vec<serenity::MessageId> = channel
        .messages(&ctx.http, serenity::GetMessages::new().limit(fetch as u8))
        .await?
        .into_iter()
        .filter(|m| author.map_or(true, |id| m.author.id.get() == id))
        .take(amount as usize)
        .map(|m| m.id)
        .collect();

    match ids.as_slice() {
        [] => {}
        [single] => channel.delete_message(&ctx.http, *single).await?,
        _ => channel.delete_messages(&ctx.http, &ids).await?,
    }
    Ok(ids.len())
}

async fn modify_role(
    ctx: &serenity::Context,
    guild_id: u64,
    actor_id: Option<u64>,
    user_id: u64,
    role_name: &str,
    op: RoleOp,
) -> Result<(), ActionError> {
    let guild_id = serenity::GuildId::new(guild_id);
    let user_id = serenity::UserId::new(user_id);

    let role_id = {
        let guild = ctx
            .cache
            .guild(guild_id)
            .ok_or(ActionError::GuildUnavailable)?;
        let role = guild
            .roles
            .values()
            .find(|r| r.name == role_name)
            .ok_or_else(|| ActionError::UnknownRole(role_name.to_string()))?;

        if let Some(actor) = actor_id.map(serenity::UserId::new) {
            let top_position = guild
                .members
                .get(&actor)
                .map(|m| {
                    m.roles
                        .iter()
                        .filter_map(|id| guild.roles.get(id))
                        .map(|r| r.position)
                        .max()
                        .unwrap_or(0)
                })
                .unwrap_or(0);

            if actor != guild.owner_id && top_position < role.position {
                return Err(ActionError::Hierarchy);
            }
        }
        role.id
    };

    match op {
        RoleOp::Add => {
            ctx.http
                .add_member_role(guild_id, user_id, role_id, None)
                .await?
        }
        RoleOp::Remove => {
            ctx.http
                .remove_member_role(guild_id, user_id, role_id, None)
                .await?
        }
        RoleOp::ReplaceAll => {
            guild_id
                .edit_member(
                    &ctx.http,
                    user_id,
                    serenity::EditMember::new().roles(vec![role_id]),
                )
                .await?;
        }
    }
    Ok(())
}

async fn user_info(
    ctx: &serenity::Context,
    guild_id: u64,
    user_id: u64,
) -> Result<serenity::CreateEmbed, ActionError> {
    let guild_id = serenity::GuildId::new(guild_id);
    let user_id = serenity::UserId::new(user_id);
    let member = guild_id.member(ctx, user_id).await?;

    let (top_role, status) = match ctx.cache.guild(guild_id) {
        Some(guild) => {
            let top_role = member
                .roles
                .iter()
                .filter_map(|id| guild.roles.get(id))
                .max_by_key(|r| r.position)
                .map(|r| r.name.clone())
                .unwrap_or_else(|| "everyone".to_string());
            let status = guild.presences.get(&user_id).map(|p| p.status);
            (top_role, status)
        }
        None => ("everyone".to_string(), None),
    };

    let (status_text, colour) = match status {
        Some(serenity::OnlineStatus::Online) => ("Online", serenity::Colour::DARK_GREEN),
        Some(serenity::OnlineStatus::Idle) => ("Idle", serenity::Colour::GOLD),
        Some(serenity::OnlineStatus::DoNotDisturb) => ("Do not disturb", serenity::Colour::RED),
        Some(_) | None => ("Offline", serenity::Colour::DARKER_GREY),
    };

    let user = &member.user;
    Ok(serenity::CreateEmbed::new()
        .colour(colour)
        .author(serenity::CreateEmbedAuthor::new(&user.name).icon_url(user.face()))
        .field("Status", status_text, true)
        .field("Mention", format!("<@{}>", user.id), true)
        .field("Id", user.id.to_string(), true)
        .field(
            "Account Type",
            if user.bot { ":robot:" } else { ":cowboy:" },
            true,
        )
        .field("Top Role", top_role, true)
        .field(
            "Account Creation Date",
            user.created_at().format("%Y-%m-%d %H:%M:%S").to_string(),
            true,
        )
        .image(user.face())
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Data got at {} UTC",
            chrono::Utc::now().format("%a, %d %B %Y")
        ))))
}

fn status_embed(ctx: &serenity::Context, data: &Data) -> serenity::CreateEmbed {
    let mut servers = 0;
    let mut members = 0;
    let mut channels = 0;

    for guild_id in ctx.cache.guilds() {
        if let Some(guild) = ctx.cache.guild(guild_id) {
            servers += 1;
            members += guild.member_count;
            channels += guild.channels.len();
        }
    }

    serenity::CreateEmbed::new()
        .colour(serenity::Colour::DARK_BLUE)
        .field("Servers", format!("{} servers", servers), true)
        .field("Users", format!("{} users", members), true)
        .field("Channels", format!("{} channels", channels), true)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "{} messages handled",
            data.stats.get(Stat::Message)
        )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_discord_errors() {
        let err = ActionError::Discord(serenity::Error::Other("403"));
        assert!(err.user_message().contains("missing permissions"));
        assert_eq!(
            ActionError::UnknownRole("gamer".to_string()).user_message(),
            "No such role: 'gamer'"
        );
    }

    #[test]
    fn test_embed_from_spec() {
        let spec = EmbedSpec::new("Message deleted (spam)")
            .description("buy now")
            .field("Channel", "<#100>", true)
            .color(0xFF0000)
            .footer("logged");
        let json = serde_json::to_value(embed_from_spec(spec)).unwrap();

        assert_eq!(json["title"], "Message deleted (spam)");
        assert_eq!(json["description"], "buy now");
        assert_eq!(json["color"], 0xFF0000);
        assert_eq!(json["fields"][0]["name"], "Channel");
        assert_eq!(json["footer"]["text"], "logged");
    }
}
