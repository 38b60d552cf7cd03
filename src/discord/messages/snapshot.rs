// Build the platform-neutral `MessageEvent` the plugins work on.
//
// Everything is read from the cache synchronously; cache references must not
// live across an await.

use crate::core::plugins::{ChannelView, GuildView, MemberView, MessageEvent};
use crate::core::store::GuildInfo;
use poise::serenity_prelude as serenity;
use std::collections::HashMap;

fn user_view(user: &serenity::User) -> MemberView {
    MemberView {
        id: user.id.get(),
        name: user.name.clone(),
        nick: None,
        bot: user.bot,
        avatar_url: Some(user.face()),
        roles: Vec::new(),
    }
}

fn role_names(
    ids: &[serenity::RoleId],
    roles: &HashMap<serenity::RoleId, serenity::Role>,
) -> Vec<String> {
    ids.iter()
        .filter_map(|id| roles.get(id).map(|r| r.name.clone()))
        .collect()
}

fn member_view(member: &serenity::Member, guild: &serenity::Guild) -> MemberView {
    MemberView {
        nick: member.nick.clone(),
        roles: role_names(&member.roles, &guild.roles),
        ..user_view(&member.user)
    }
}

/// Guild metadata used by the store (server records key on it).
pub fn guild_info(guild: &serenity::Guild) -> GuildInfo {
    GuildInfo {
        id: guild.id.get(),
        name: guild.name.clone(),
        owner_id: guild.owner_id.get(),
    }
}

pub fn guild_view(guild: &serenity::Guild) -> GuildView {
    let mut text_channels: Vec<&serenity::GuildChannel> = guild
        .channels
        .values()
        .filter(|c| c.kind == serenity::ChannelType::Text)
        .collect();
    text_channels.sort_by_key(|c| (c.position, c.id));

    GuildView {
        info: guild_info(guild),
        channels: text_channels
            .into_iter()
            .map(|c| ChannelView {
                id: c.id.get(),
                name: c.name.clone(),
            })
            .collect(),
        members: guild
            .members
            .values()
            .map(|m| member_view(m, guild))
            .collect(),
        roles: guild.roles.values().map(|r| r.name.clone()).collect(),
    }
}

/// Channel ids mentioned as `<#id>` in the text.
pub fn channel_mentions(content: &str) -> Vec<u64> {
    content
        .split("<#")
        .skip(1)
        .filter_map(|rest| rest.split_once('>'))
        .filter_map(|(id, _)| id.parse().ok())
        .collect()
}

pub fn message_event(ctx: &serenity::Context, msg: &serenity::Message) -> MessageEvent {
    let mut author = user_view(&msg.author);
    let mut channel_name = String::new();
    let mut can_mention_everyone = msg.guild_id.is_none();
    let mut mentions: Vec<MemberView> = msg.mentions.iter().map(user_view).collect();

    let guild = msg.guild_id.and_then(|guild_id| {
        let guild = ctx.cache.guild(guild_id)?;

        if let Some(member) = guild.members.get(&msg.author.id) {
            author = member_view(member, &guild);
            if let Some(channel) = guild.channels.get(&msg.channel_id) {
                can_mention_everyone = guild
                    .user_permissions_in(channel, member)
                    .mention_everyone();
            }
        } else if let Some(partial) = &msg.member {
            author.nick = partial.nick.clone();
            author.roles = role_names(&partial.roles, &guild.roles);
        }

        if let Some(channel) = guild.channels.get(&msg.channel_id) {
            channel_name = channel.name.clone();
        }

        for mentioned in mentions.iter_mut() {
            if let Some(member) = guild.members.get(&serenity::UserId::new(mentioned.id)) {
                *mentioned = member_view(member, &guild);
            }
        }

        Some(guild_view(&guild))
    });

    MessageEvent {
        message_id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        channel_name,
        guild,
        author,
        author_can_mention_everyone: can_mention_everyone,
        content: msg.content.clone(),
        mentions,
        channel_mentions: channel_mentions(&msg.content),
        sent_at: msg.timestamp.timestamp_millis(),
    }
}
