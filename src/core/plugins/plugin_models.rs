// Plugin domain models.
//
// Plugins never talk to Discord directly. They get a snapshot of the message
// (`MessageEvent`) and answer with a list of `Action`s which the Discord layer
// executes in order.

use crate::core::lookups::LookupError;
use crate::core::store::{GuildInfo, StoreError};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("This command only works in servers")]
    GuildOnly,
}

// ============================================================================
// MESSAGE SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberView {
    pub id: u64,
    pub name: String,
    pub nick: Option<String>,
    pub bot: bool,
    pub avatar_url: Option<String>,
    /// Role names, not ids
    pub roles: Vec<String>,
}

impl MemberView {
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelView {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuildView {
    pub info: GuildInfo,
    /// Text channels in display order
    pub channels: Vec<ChannelView>,
    pub members: Vec<MemberView>,
    pub roles: Vec<String>,
}

/// Parse `<@123>`, `<@!123>` or a bare id.
fn parse_user_ref(query: &str) -> Option<u64> {
    let trimmed = query
        .trim()
        .trim_start_matches("<@")
        .trim_start_matches('!')
        .trim_end_matches('>');
    trimmed.parse().ok()
}

impl GuildView {
    pub fn id(&self) -> u64 {
        self.info.id
    }

    /// Find a member by mention, id, name or nickname.
    pub fn find_member(&self, query: &str) -> Option<&MemberView> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        if let Some(id) = parse_user_ref(query) {
            if let Some(member) = self.members.iter().find(|m| m.id == id) {
                return Some(member);
            }
        }

        self.members
            .iter()
            .find(|m| m.name == query || m.nick.as_deref() == Some(query))
            .or_else(|| {
                let lowered = query.to_lowercase();
                self.members.iter().find(|m| m.name.to_lowercase() == lowered)
            })
    }

    /// Find a text channel by mention (`<#123>`) or name (with or without `#`).
    pub fn find_channel(&self, query: &str) -> Option<&ChannelView> {
        let query = query.trim();
        if let Some(raw_id) = query.strip_prefix("<#") {
            let id = raw_id.trim_end_matches('>').parse::<u64>().ok()?;
            return self.channels.iter().find(|c| c.id == id);
        }
        let name = query.trim_start_matches('#');
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn has_role(&self, role_name: &str) -> bool {
        self.roles.iter().any(|r| r == role_name)
    }
}

/// Everything a plugin may look at when a message arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub message_id: u64,
    pub channel_id: u64,
    pub channel_name: String,
    /// `None` for direct messages
    pub guild: Option<GuildView>,
    pub author: MemberView,
    pub author_can_mention_everyone: bool,
    pub content: String,
    pub mentions: Vec<MemberView>,
    pub channel_mentions: Vec<u64>,
    /// Unix time in milliseconds
    pub sent_at: i64,
}

// ============================================================================
// ACTIONS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbedSpec {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<(String, Option<String>)>,
    pub fields: Vec<(String, String, bool)>,
    pub color: u32,
    pub thumbnail: Option<String>,
    pub image: Option<String>,
    pub footer: Option<String>,
}

impl EmbedSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn author(mut self, name: impl Into<String>, icon_url: Option<String>) -> Self {
        self.author = Some((name.into(), icon_url));
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push((name.into(), value.into(), inline));
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image = Some(url.into());
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleOp {
    Add,
    Remove,
    /// Drop every other role first
    ReplaceAll,
}

/// Something the Discord layer should do on behalf of a plugin.
///
/// Member actions (kick, ban, unban, roles) abort the rest of the outbox
/// when they fail, so follow-up announcements are only sent on success.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send {
        channel_id: u64,
        content: String,
    },
    SendEmbed {
        channel_id: u64,
        embed: EmbedSpec,
    },
    SendTemporary {
        channel_id: u64,
        content: String,
        delete_after: Duration,
    },
    DirectMessage {
        user_id: u64,
        content: String,
    },
    DeleteMessage {
        channel_id: u64,
        message_id: u64,
    },
    /// Delete the last `amount` messages, only those of `author` when set.
    /// `notice` is posted briefly afterwards with `:count` replaced by the
    /// number of messages actually deleted.
    Purge {
        channel_id: u64,
        amount: u64,
        author: Option<u64>,
        notice: Option<String>,
    },
    Kick {
        guild_id: u64,
        user_id: u64,
    },
    Ban {
        guild_id: u64,
        user_id: u64,
    },
    Unban {
        guild_id: u64,
        user_id: u64,
    },
    UnbanByName {
        guild_id: u64,
        channel_id: u64,
        name: String,
    },
    /// `actor_id` is checked against the role hierarchy; self-roles pass `None`
    ModifyRole {
        guild_id: u64,
        channel_id: u64,
        actor_id: Option<u64>,
        user_id: u64,
        role_name: String,
        op: RoleOp,
    },
    ShowUserInfo {
        channel_id: u64,
        guild_id: u64,
        user_id: u64,
    },
    ShowStatus {
        channel_id: u64,
    },
    ShowServerInfo {
        channel_id: u64,
        guild_id: u64,
    },
    /// Stored settings plus cached details of any guild the bot is in
    ShowGuildReport {
        channel_id: u64,
        guild_id: u64,
    },
    LeaveGuild {
        channel_id: u64,
        guild_id: u64,
    },
    /// Drop stored data of guilds the bot is no longer in
    TidyServers {
        channel_id: u64,
    },
    /// Post `content` to the default channel of every guild
    Announce {
        channel_id: u64,
        content: String,
    },
    SetPlaying {
        status: String,
    },
    /// Disconnect every shard; with `restart` a fresh process is started first
    Shutdown {
        restart: bool,
    },
}

impl Action {
    pub fn is_member_action(&self) -> bool {
        matches!(
            self,
            Action::Kick { .. }
                | Action::Ban { .. }
                | Action::Unban { .. }
                | Action::UnbanByName { .. }
                | Action::ModifyRole { .. }
        )
    }
}

/// Actions collected while handling one message.
#[derive(Debug, Clone)]
pub struct Outbox {
    channel_id: u64,
    actions: Vec<Action>,
}

impl Outbox {
    pub fn new(channel_id: u64) -> Self {
        Self {
            channel_id,
            actions: Vec::new(),
        }
    }

    /// Reply in the channel the message came from.
    pub fn say(&mut self, content: impl Into<String>) {
        self.actions.push(Action::Send {
            channel_id: self.channel_id,
            content: content.into(),
        });
    }

    pub fn embed(&mut self, embed: EmbedSpec) {
        self.actions.push(Action::SendEmbed {
            channel_id: self.channel_id,
            embed,
        });
    }

    pub fn say_temporary(&mut self, content: impl Into<String>, delete_after: Duration) {
        self.actions.push(Action::SendTemporary {
            channel_id: self.channel_id,
            content: content.into(),
            delete_after,
        });
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

/// One entry of a plugin's command table.
///
/// A trigger starting with `_` is relative to the guild prefix (`_help` is
/// `!help` with prefix `!`); anything else is matched literally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub trigger: &'static str,
    pub description: &'static str,
    pub usage: Option<&'static str>,
    pub alias: Option<&'static str>,
}

impl CommandSpec {
    pub const fn new(trigger: &'static str, description: &'static str) -> Self {
        Self {
            trigger,
            description,
            usage: None,
            alias: None,
        }
    }

    pub const fn usage(mut self, usage: &'static str) -> Self {
        self.usage = Some(usage);
        self
    }

    pub const fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }
}

/// Substitute the guild prefix into a prefix-relative trigger.
pub fn expand_trigger(trigger: &str, prefix: &str) -> String {
    match trigger.strip_prefix('_') {
        Some(rest) => format!("{}{}", prefix, rest),
        None => trigger.to_string(),
    }
}

/// True when `content` starts with any of the triggers.
pub fn is_valid_command<'a, I>(content: &str, triggers: I, prefix: &str) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    triggers
        .into_iter()
        .any(|t| content.starts_with(&expand_trigger(t, prefix)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// No plugin after this one sees the message
    Stop,
}

/// What a plugin sees for one message.
pub struct PluginContext<'a> {
    pub event: &'a MessageEvent,
    pub prefix: &'a str,
    pub lang: &'a str,
}

impl<'a> PluginContext<'a> {
    pub fn content(&self) -> &'a str {
        &self.event.content
    }

    pub fn starts_with(&self, trigger: &str) -> bool {
        self.event
            .content
            .starts_with(&expand_trigger(trigger, self.prefix))
    }

    pub fn starts_with_any(&self, triggers: &[&str]) -> bool {
        triggers.iter().any(|t| self.starts_with(t))
    }

    /// Text after the trigger, trimmed. Empty when the message does not start with it.
    pub fn args(&self, trigger: &str) -> &'a str {
        let expanded = expand_trigger(trigger, self.prefix);
        self.event
            .content
            .strip_prefix(expanded.as_str())
            .map(str::trim)
            .unwrap_or("")
    }

    pub fn guild(&self) -> Result<&'a GuildView, PluginError> {
        self.event.guild.as_ref().ok_or(PluginError::GuildOnly)
    }

    pub fn channel_id(&self) -> u64 {
        self.event.channel_id
    }

    pub fn author(&self) -> &'a MemberView {
        &self.event.author
    }

    /// First mentioned member, else a member found by name in `query`.
    pub fn resolve_member(&self, query: &str) -> Option<&'a MemberView> {
        if let Some(mentioned) = self.event.mentions.first() {
            return Some(mentioned);
        }
        self.event.guild.as_ref()?.find_member(query)
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower runs first.
    fn priority(&self) -> u8 {
        10
    }

    fn commands(&self) -> &'static [CommandSpec];

    async fn on_message(
        &self,
        ctx: &PluginContext<'_>,
        out: &mut Outbox,
    ) -> Result<Flow, PluginError>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const GUILD_ID: u64 = 10;
    pub(crate) const OWNER_ID: u64 = 1;
    pub(crate) const CHANNEL_ID: u64 = 100;

    pub(crate) fn member(id: u64, name: &str, roles: &[&str]) -> MemberView {
        MemberView {
            id,
            name: name.to_string(),
            nick: None,
            bot: false,
            avatar_url: Some(format!("https://cdn.example/{}.png", id)),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub(crate) fn guild() -> GuildView {
        GuildView {
            info: GuildInfo {
                id: GUILD_ID,
                name: "Test Server".to_string(),
                owner_id: OWNER_ID,
            },
            channels: vec![
                ChannelView {
                    id: CHANNEL_ID,
                    name: "general".to_string(),
                },
                ChannelView {
                    id: 101,
                    name: "logs".to_string(),
                },
            ],
            members: vec![
                member(OWNER_ID, "owner", &[]),
                member(2, "alice", &["Nano Admin"]),
                member(3, "bob", &[]),
                member(4, "carol", &["Nano Mod"]),
            ],
            roles: vec![
                "Nano Admin".to_string(),
                "Nano Mod".to_string(),
                "gamer".to_string(),
            ],
        }
    }

    /// A guild message from `author` with the given content.
    pub(crate) fn event(author: MemberView, content: &str) -> MessageEvent {
        MessageEvent {
            message_id: 555,
            channel_id: CHANNEL_ID,
            channel_name: "general".to_string(),
            guild: Some(guild()),
            author,
            author_can_mention_everyone: false,
            content: content.to_string(),
            mentions: Vec::new(),
            channel_mentions: Vec::new(),
            sent_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Texts of every `Send` action, in order.
    pub(crate) fn sent(out: &Outbox) -> Vec<String> {
        out.actions()
            .iter()
            .filter_map(|a| match a {
                Action::Send { content, .. } | Action::SendTemporary { content, .. } => {
                    Some(content.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_expand_trigger() {
        assert_eq!(expand_trigger("_help", "!"), "!help");
        assert_eq!(expand_trigger("_help", "nano "), "nano help");
        assert_eq!(expand_trigger("nano.settings", "!"), "nano.settings");
    }

    #[test]
    fn test_is_valid_command() {
        let triggers = ["_ping", "nano.info"];
        assert!(is_valid_command("!ping", triggers, "!"));
        assert!(is_valid_command("nano.info please", triggers, "!"));
        assert!(!is_valid_command("ping", triggers, "!"));
        assert!(!is_valid_command("?ping", triggers, "!"));
    }

    #[test]
    fn test_context_args() {
        let event = event(member(3, "bob", &[]), "!remind me in 5m: tea");
        let ctx = PluginContext {
            event: &event,
            prefix: "!",
            lang: "en",
        };

        assert!(ctx.starts_with("_remind me in"));
        assert_eq!(ctx.args("_remind me in"), "5m: tea");
        assert_eq!(ctx.args("_nope"), "");
    }

    #[test]
    fn test_find_member_and_channel() {
        let guild = guild();

        assert_eq!(guild.find_member("<@!3>").map(|m| m.id), Some(3));
        assert_eq!(guild.find_member("ALICE").map(|m| m.id), Some(2));
        assert!(guild.find_member("nobody").is_none());

        assert_eq!(guild.find_channel("<#101>").map(|c| c.id), Some(101));
        assert_eq!(guild.find_channel("#general").map(|c| c.id), Some(100));
        assert!(guild.find_channel("<#abc>").is_none());
    }
}
