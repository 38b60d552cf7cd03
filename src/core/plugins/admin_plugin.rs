// Admin plugin - moderation, server settings, custom commands and self-roles.
//
// Mod commands need the mod role (or admin rights), everything else in here
// needs admin rights, except `_iam`/`_iamnot`. Destructive commands (ban,
// server reset) wait for the author to answer CONFIRM in the same channel.

use super::plugin_models::*;
use crate::core::softbans::SoftBanScheduler;
use crate::core::stats::{BotStats, Stat};
use crate::core::store::{
    ServerHandler, StoreError, FIELD_BAN_MSG, FIELD_KICK_MSG, FIELD_LEAVE_MSG, FIELD_WELCOME_MSG,
    MAX_INPUT_LENGTH, MAX_TRIGGER_LENGTH, is_enabled_word,
};
use crate::core::util::{convert_to_seconds, fill_placeholders, resolve_time};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

static COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("_nuke", "Deletes the last n messages in this channel.")
        .usage("[command] [amount]"),
    CommandSpec::new("_purge", "Deletes the last n messages of one member.")
        .usage("[command] [amount] [@mention or name]"),
    CommandSpec::new("_kick", "Kicks a member.").usage("[command] [@mention or name]"),
    CommandSpec::new("_ban", "Bans a member (asks for confirmation).")
        .usage("[command] [@mention or name]"),
    CommandSpec::new("_unban", "Unbans a member by name.").usage("[command] [name]"),
    CommandSpec::new("_softban", "Bans a member for some time.")
        .usage("[command] [time] @mention"),
    CommandSpec::new("_mute", "Deletes every message of a member until unmuted.")
        .usage("[command] @mention"),
    CommandSpec::new("_unmute", "Lets a muted member speak again.").usage("[command] @mention"),
    CommandSpec::new("_muted", "Lists muted members.").alias("_mute list"),
    CommandSpec::new("_mute list", "Lists muted members.").alias("_muted"),
    CommandSpec::new("_welcomemsg", "Sets the welcome message (`none` disables it).")
        .usage("[command] [message] (:user and :server get replaced)"),
    CommandSpec::new("_banmsg", "Sets the ban message (`none` disables it).")
        .usage("[command] [message] (:user gets replaced)"),
    CommandSpec::new("_kickmsg", "Sets the kick message (`none` disables it).")
        .usage("[command] [message] (:user gets replaced)"),
    CommandSpec::new("_leavemsg", "Sets the leave message (`none` disables it).")
        .usage("[command] [message] (:user gets replaced)"),
    CommandSpec::new("_user", "Shows info about a member.").usage("[command] [@mention or name]"),
    CommandSpec::new("_role add", "Gives a role to a member.").usage("[command] [role] @mention"),
    CommandSpec::new("_role remove", "Takes a role away from a member.")
        .usage("[command] [role] @mention"),
    CommandSpec::new("_role replaceall", "Replaces every role of a member with one role.")
        .usage("[command] [role] @mention"),
    CommandSpec::new("_cmd add", "Adds a custom command.").usage("[command] trigger|response"),
    CommandSpec::new("_cmd remove", "Removes a custom command.").usage("[command] [trigger]"),
    CommandSpec::new("_cmd list", "Lists the custom commands of this server."),
    CommandSpec::new("_cmd status", "Shows how many custom commands are left."),
    CommandSpec::new("nano.settings", "Turns a filter on or off, or sets the log channel.")
        .usage("[command] [wordfilter/spamfilter/invitefilter] [on/off] or [command] logchannel [#channel/none]"),
    CommandSpec::new("nano.displaysettings", "Shows the settings of this server."),
    CommandSpec::new("nano.changeprefix", "Changes the command prefix of this server.")
        .usage("[command] [prefix]"),
    CommandSpec::new("nano.blacklist add", "Ignores commands in a channel.")
        .usage("[command] [#channel or name]"),
    CommandSpec::new("nano.blacklist remove", "Stops ignoring a channel.")
        .usage("[command] [#channel or name]"),
    CommandSpec::new("nano.serverreset", "Resets every setting of this server (asks for confirmation)."),
    CommandSpec::new("nano.sleep", "Puts the bot to sleep on this server."),
    CommandSpec::new("nano.wake", "Wakes the bot up."),
    CommandSpec::new("_selfrole add", "Makes a role self-assignable.").usage("[command] [role]"),
    CommandSpec::new("_selfrole remove", "Makes a role no longer self-assignable.")
        .usage("[command] [role]"),
    CommandSpec::new("_selfrole list", "Lists self-assignable roles."),
    CommandSpec::new("_iam", "Gives you a self-assignable role.").usage("[command] [role]"),
    CommandSpec::new("_iamnot", "Removes a self-assignable role from you.")
        .usage("[command] [role]"),
];

/// Triggers handled with mod rights; `_banmsg` and `_kickmsg` are admin commands.
const MOD_TRIGGERS: [&str; 9] = [
    "_nuke", "_purge", "_kick", "_ban", "_unban", "_softban", "_mute", "_muted", "_unmute",
];

/// (trigger, field, label) of the member messages an admin can change.
const MESSAGE_SETTINGS: [(&str, &str, &str); 4] = [
    ("_welcomemsg", FIELD_WELCOME_MSG, "Welcome message"),
    ("_banmsg", FIELD_BAN_MSG, "Ban message"),
    ("_kickmsg", FIELD_KICK_MSG, "Kick message"),
    ("_leavemsg", FIELD_LEAVE_MSG, "Leave message"),
];

/// Custom commands per server.
pub const CMD_LIMIT: usize = 40;

const CONFIRM_WORD: &str = "CONFIRM";
const CONFIRM_WINDOW: Duration = Duration::from_secs(15);
/// One bulk fetch covers at most this many messages.
const MAX_PURGE: u64 = 100;
const PURGE_RANGE_HINT: &str = "Must be a number between 1 and 100.";
const MAX_PREFIX_LENGTH: usize = 50;
const MESSAGE_LIMIT: usize = 2000;

const NOT_MOD: &str =
    ":warning: You do not have the correct permissions to use this command (must be a mod).";
const NOT_ADMIN: &str =
    ":warning: You do not have the correct permissions to use this command (must be an admin).";
const CHANNEL_NOT_FOUND: &str = "Channel could not be found.";

#[derive(Debug, Clone, PartialEq)]
enum PendingAction {
    Ban { user_id: u64, name: String },
    ServerReset,
}

#[derive(Debug, Clone)]
struct Pending {
    action: PendingAction,
    channel_id: u64,
    asked_at: Instant,
}

/// Drop `<@id>` tokens from the arguments.
fn strip_mentions(raw: &str) -> String {
    raw.split_whitespace()
        .filter(|word| !(word.starts_with("<@") && word.ends_with('>')))
        .collect::<Vec<_>>()
        .join(" ")
}

fn purge_amount(raw: &str) -> Option<u64> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|amount| (1..=MAX_PURGE).contains(amount))
}

fn on_off(value: bool) -> &'static str {
    if value {
        "On"
    } else {
        "Off"
    }
}

/// Channel mention first, else a channel name from the query.
fn resolve_channel<'g>(
    ctx: &PluginContext<'_>,
    guild: &'g GuildView,
    query: &str,
) -> Option<&'g ChannelView> {
    ctx.event
        .channel_mentions
        .first()
        .and_then(|id| guild.channels.iter().find(|c| c.id == *id))
        .or_else(|| guild.find_channel(query))
}

/// Refuse actions against the server owner and against yourself.
fn protected_target(
    guild: &GuildView,
    author: &MemberView,
    target: &MemberView,
    verb: &str,
) -> Option<String> {
    if target.id == guild.info.owner_id {
        Some(format!(":warning: You cannot {} the owner of the server.", verb))
    } else if target.id == author.id {
        Some(format!("Trying to {} yourself? Not gonna work :rofl:", verb))
    } else {
        None
    }
}

pub struct AdminPlugin {
    handler: Arc<ServerHandler>,
    softbans: Arc<SoftBanScheduler>,
    stats: Arc<BotStats>,
    /// Keyed by (guild, author)
    pending: DashMap<(u64, u64), Pending>,
    confirm_window: Duration,
}

impl AdminPlugin {
    pub fn new(
        handler: Arc<ServerHandler>,
        softbans: Arc<SoftBanScheduler>,
        stats: Arc<BotStats>,
    ) -> Self {
        Self {
            handler,
            softbans,
            stats,
            pending: DashMap::new(),
            confirm_window: CONFIRM_WINDOW,
        }
    }

    #[cfg(test)]
    fn with_confirm_window(mut self, window: Duration) -> Self {
        self.confirm_window = window;
        self
    }

    fn ask_confirmation(
        &self,
        ctx: &PluginContext<'_>,
        guild: &GuildView,
        action: PendingAction,
        out: &mut Outbox,
        question: String,
    ) {
        // Unanswered questions from anyone are dropped here; late answers to
        // them are ignored.
        let window = self.confirm_window;
        self.pending.retain(|_, p| p.asked_at.elapsed() <= window);

        self.pending.insert(
            (guild.id(), ctx.author().id),
            Pending {
                action,
                channel_id: ctx.channel_id(),
                asked_at: Instant::now(),
            },
        );
        out.say(format!(
            "{} Confirm by replying '{}'.",
            question, CONFIRM_WORD
        ));
    }

    /// Resolve a pending confirmation. Returns `false` when nothing was waiting.
    async fn confirm(
        &self,
        ctx: &PluginContext<'_>,
        guild: &GuildView,
        out: &mut Outbox,
    ) -> Result<bool, PluginError> {
        let channel_id = ctx.channel_id();
        let Some((_, pending)) = self
            .pending
            .remove_if(&(guild.id(), ctx.author().id), |_, p| p.channel_id == channel_id)
        else {
            return Ok(false);
        };
        let expired = pending.asked_at.elapsed() > self.confirm_window;

        match pending.action {
            PendingAction::Ban { user_id, name } => {
                if expired {
                    out.say("Confirmation not received, NOT banning :upside_down:");
                    return Ok(true);
                }
                tracing::info!(guild_id = guild.id(), user_id, "Banning {}", name);
                self.softbans.note_ban(guild.id(), user_id);
                out.push(Action::Ban {
                    guild_id: guild.id(),
                    user_id,
                });
            }
            PendingAction::ServerReset => {
                if expired {
                    out.say("Confirmation not received, NOT resetting :upside_down:");
                    return Ok(true);
                }
                tracing::info!(guild_id = guild.id(), "Resetting server settings");
                self.handler.delete_server(guild.id()).await?;
                self.handler.server_setup(&guild.info).await?;
                out.say("Server settings have been reset :ok_hand:");
            }
        }
        Ok(true)
    }

    fn is_mod_command(ctx: &PluginContext<'_>) -> bool {
        MOD_TRIGGERS.iter().any(|t| ctx.starts_with(t))
            && !ctx.starts_with_any(&["_banmsg", "_kickmsg"])
    }

    // ------------------------------------------------------------------------
    // Mod commands
    // ------------------------------------------------------------------------

    async fn moderate(
        &self,
        ctx: &PluginContext<'_>,
        guild: &GuildView,
        out: &mut Outbox,
    ) -> Result<(), PluginError> {
        let author = ctx.author();
        let guild_id = guild.id();

        if ctx.starts_with("_nuke") {
            let Some(amount) = purge_amount(ctx.args("_nuke")) else {
                out.say(PURGE_RANGE_HINT);
                self.stats.add(Stat::WrongArg);
                return Ok(());
            };
            out.push(Action::DeleteMessage {
                channel_id: ctx.channel_id(),
                message_id: ctx.event.message_id,
            });
            out.push(Action::Purge {
                channel_id: ctx.channel_id(),
                amount,
                author: None,
                notice: Some("Purged :count messages :ok_hand:".to_string()),
            });
        } else if ctx.starts_with("_purge") {
            let args = ctx.args("_purge");
            let (amount, rest) = args.split_once(' ').unwrap_or((args, ""));
            let Some(amount) = purge_amount(amount) else {
                out.say(PURGE_RANGE_HINT);
                self.stats.add(Stat::WrongArg);
                return Ok(());
            };
            let Some(user) = ctx.resolve_member(rest) else {
                out.say(":warning: User does not exist.");
                return Ok(());
            };
            out.push(Action::DeleteMessage {
                channel_id: ctx.channel_id(),
                message_id: ctx.event.message_id,
            });
            out.push(Action::Purge {
                channel_id: ctx.channel_id(),
                amount,
                author: Some(user.id),
                notice: Some(format!("Purged :count messages of **{}** :ok_hand:", user.name)),
            });
        } else if ctx.starts_with("_kick") {
            let Some(user) = ctx.resolve_member(ctx.args("_kick")) else {
                out.say(":warning: User does not exist.");
                return Ok(());
            };
            if let Some(refusal) = protected_target(guild, author, user, "kick") {
                out.say(refusal);
                return Ok(());
            }

            out.push(Action::Kick {
                guild_id,
                user_id: user.id,
            });
            if let Some(template) = self.handler.get_var(guild_id, FIELD_KICK_MSG).await? {
                out.say(fill_placeholders(&template, &user.name, &guild.info.name));
            }
        } else if ctx.starts_with("_unban") {
            let name = ctx.args("_unban");
            if name.is_empty() {
                out.say("Please give me the name of the user to unban.");
                self.stats.add(Stat::WrongArg);
                return Ok(());
            }
            out.push(Action::UnbanByName {
                guild_id,
                channel_id: ctx.channel_id(),
                name: name.to_string(),
            });
        } else if ctx.starts_with("_ban") {
            let Some(user) = ctx.resolve_member(ctx.args("_ban")) else {
                out.say(":warning: User does not exist.");
                return Ok(());
            };
            if let Some(refusal) = protected_target(guild, author, user, "ban") {
                out.say(refusal);
                return Ok(());
            }

            let question = format!("Are you sure you want to ban {}?", user.name);
            let action = PendingAction::Ban {
                user_id: user.id,
                name: user.name.clone(),
            };
            self.ask_confirmation(ctx, guild, action, out, question);
        } else if ctx.starts_with("_softban") {
            self.softban(ctx, guild, out);
        } else if ctx.starts_with_any(&["_muted", "_mute list"]) {
            let mutes = self.handler.get_mute_list(guild_id).await?;
            let names: Vec<String> = mutes
                .iter()
                .filter_map(|id| guild.members.iter().find(|m| m.id == *id))
                .map(|m| format!("➤ {}", m.name))
                .collect();

            if names.is_empty() {
                out.say("No members are muted on this server.");
            } else {
                out.say(format!("Muted members:\n{}", names.join("\n")));
            }
        } else if ctx.starts_with("_mute") {
            let Some(user) = ctx.event.mentions.first() else {
                out.say("Please mention the member you want to mute.");
                return Ok(());
            };
            if let Some(refusal) = protected_target(guild, author, user, "mute") {
                out.say(refusal);
                return Ok(());
            }

            if self.handler.mute(guild_id, user.id).await? {
                out.say(format!("**{}** can now not speak here. :zipper_mouth:", user.name));
            } else {
                out.say(format!("**{}** is already muted.", user.name));
            }
        } else if ctx.starts_with("_unmute") {
            let Some(user) = ctx.event.mentions.first() else {
                out.say("Please mention the member you want to unmute.");
                return Ok(());
            };

            if self.handler.unmute(guild_id, user.id).await? {
                out.say(format!("**{}** can now speak here again :slight_smile:", user.name));
            } else {
                out.say(format!("**{}** is not muted.", user.name));
            }
        }

        Ok(())
    }

    fn softban(&self, ctx: &PluginContext<'_>, guild: &GuildView, out: &mut Outbox) {
        let Some(user) = ctx.event.mentions.first() else {
            out.say("Please mention the member you want to softban.");
            return;
        };
        if let Some(refusal) = protected_target(guild, ctx.author(), user, "softban") {
            out.say(refusal);
            return;
        }

        let seconds = match convert_to_seconds(&strip_mentions(ctx.args("_softban"))) {
            Ok(seconds) => seconds,
            Err(_) => {
                out.say("Invalid time format, use something like `1h 30min`.");
                self.stats.add(Stat::WrongArg);
                return;
            }
        };

        match self
            .softbans
            .set_softban(guild.id(), user.id, &user.name, seconds)
        {
            Ok(_) => {
                out.push(Action::Ban {
                    guild_id: guild.id(),
                    user_id: user.id,
                });
                out.say(format!(
                    "{} has been softbanned for {}.",
                    user.name,
                    resolve_time(seconds)
                ));
            }
            Err(e) => out.say(format!("{}.", e)),
        }
    }

    // ------------------------------------------------------------------------
    // Admin commands
    // ------------------------------------------------------------------------

    async fn administrate(
        &self,
        ctx: &PluginContext<'_>,
        guild: &GuildView,
        out: &mut Outbox,
    ) -> Result<(), PluginError> {
        if let Some((trigger, field, label)) =
            MESSAGE_SETTINGS.iter().find(|(t, _, _)| ctx.starts_with(t))
        {
            self.set_message(ctx, guild, out, trigger, field, label).await?;
        } else if ctx.starts_with("_user") {
            let query = ctx.args("_user");
            let member = if query.is_empty() && ctx.event.mentions.is_empty() {
                Some(ctx.author())
            } else {
                ctx.resolve_member(query)
            };

            match member {
                Some(member) => out.push(Action::ShowUserInfo {
                    channel_id: ctx.channel_id(),
                    guild_id: guild.id(),
                    user_id: member.id,
                }),
                None => out.say("Member does not exist."),
            }
        } else if ctx.starts_with("_role") {
            self.role(ctx, guild, out);
        } else if ctx.starts_with("_cmd") {
            self.custom_commands(ctx, guild, out).await?;
        } else if ctx.starts_with("nano.settings") {
            self.settings(ctx, guild, out).await?;
        } else if ctx.starts_with("nano.displaysettings") {
            out.say(self.display_settings(guild).await?);
        } else if ctx.starts_with("nano.changeprefix") {
            let prefix = ctx.args("nano.changeprefix");
            if prefix.is_empty() {
                out.say("Please give me the new prefix.");
                self.stats.add(Stat::WrongArg);
            } else if prefix.chars().count() > MAX_PREFIX_LENGTH {
                out.say(format!(
                    "That prefix is too long (max {} characters).",
                    MAX_PREFIX_LENGTH
                ));
            } else {
                self.handler.change_prefix(guild.id(), prefix).await?;
                out.say(format!("Prefix has been changed to `{}` :ok_hand:", prefix));
            }
        } else if ctx.starts_with("nano.blacklist") {
            self.blacklist(ctx, guild, out).await?;
        } else if ctx.starts_with("nano.serverreset") {
            let question =
                "Are you sure you want to reset all settings of this server?".to_string();
            self.ask_confirmation(ctx, guild, PendingAction::ServerReset, out, question);
        } else if ctx.starts_with("nano.sleep") {
            self.handler.set_sleeping(guild.id(), true).await?;
            out.say("Going to sleep... :zzz:\nUse `nano.wake` to wake me up.");
        } else if ctx.starts_with("nano.wake") {
            self.handler.set_sleeping(guild.id(), false).await?;
            out.say("I'm awake! :sunny:");
        } else if ctx.starts_with("_selfrole") {
            self.selfroles(ctx, guild, out).await?;
        }

        Ok(())
    }

    async fn set_message(
        &self,
        ctx: &PluginContext<'_>,
        guild: &GuildView,
        out: &mut Outbox,
        trigger: &str,
        field: &str,
        label: &str,
    ) -> Result<(), PluginError> {
        let value = ctx.args(trigger);
        if value.is_empty() {
            out.say(format!(
                "Please write the new message, or `none` to disable it.\nExample: `{} Hi :user!`",
                expand_trigger(trigger, ctx.prefix)
            ));
            self.stats.add(Stat::WrongArg);
            return Ok(());
        }

        if value.eq_ignore_ascii_case("none") {
            self.handler.remove_var(guild.id(), field).await?;
            out.say(format!("{} has been disabled.", label));
            return Ok(());
        }

        match self.handler.update_var(guild.id(), field, value).await {
            Ok(()) => out.say(format!("{} has been updated :smile:", label)),
            Err(StoreError::InputTooLong) => out.say(format!(
                "That message is too long (max {} characters).",
                MAX_INPUT_LENGTH
            )),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn role(&self, ctx: &PluginContext<'_>, guild: &GuildView, out: &mut Outbox) {
        let (op, trigger) = if ctx.starts_with("_role add") {
            (RoleOp::Add, "_role add")
        } else if ctx.starts_with("_role remove") {
            (RoleOp::Remove, "_role remove")
        } else if ctx.starts_with("_role replaceall") {
            (RoleOp::ReplaceAll, "_role replaceall")
        } else {
            out.say(format!(
                "Use `{}role add|remove|replaceall [role] @mention`.",
                ctx.prefix
            ));
            self.stats.add(Stat::WrongArg);
            return;
        };

        let user = match ctx.event.mentions.as_slice() {
            [] => {
                out.say("Please mention someone.");
                return;
            }
            [user] => user,
            _ => {
                out.say("Please mention only one person at a time.");
                return;
            }
        };

        let role_name = ctx.args(trigger).split('<').next().unwrap_or("").trim();
        if !guild.has_role(role_name) {
            out.say(format!("No such role: '{}'", role_name));
            self.stats.add(Stat::WrongArg);
            return;
        }

        out.push(Action::ModifyRole {
            guild_id: guild.id(),
            channel_id: ctx.channel_id(),
            actor_id: Some(ctx.author().id),
            user_id: user.id,
            role_name: role_name.to_string(),
            op,
        });
        out.say("Done :ok_hand:");
    }

    async fn custom_commands(
        &self,
        ctx: &PluginContext<'_>,
        guild: &GuildView,
        out: &mut Outbox,
    ) -> Result<(), PluginError> {
        let guild_id = guild.id();

        if ctx.starts_with("_cmd add") {
            let parts: Vec<&str> = ctx.args("_cmd add").split('|').map(str::trim).collect();
            let [trigger, response] = parts.as_slice() else {
                out.say(format!(
                    "Incorrect parameters.\n`{}cmd add trigger|response`",
                    ctx.prefix
                ));
                self.stats.add(Stat::WrongArg);
                return Ok(());
            };
            if trigger.is_empty() || response.is_empty() {
                out.say(format!(
                    "Incorrect parameters.\n`{}cmd add trigger|response`",
                    ctx.prefix
                ));
                self.stats.add(Stat::WrongArg);
                return Ok(());
            }

            let replacing = self.handler.custom_command_exists(guild_id, trigger).await?;
            if !replacing && self.handler.get_command_amount(guild_id).await? >= CMD_LIMIT {
                out.say(format!(
                    ":warning: You have reached the maximum limit of custom commands ({}).",
                    CMD_LIMIT
                ));
                return Ok(());
            }

            match self.handler.set_command(guild_id, trigger, response).await {
                Ok(true) => out.say(format!("Command '{}' added.", trigger)),
                Ok(false) => out.say(format!(
                    "Trigger is too long (max {} characters).",
                    MAX_TRIGGER_LENGTH
                )),
                Err(StoreError::InputTooLong) => out.say(format!(
                    "That command is too long (max {} characters).",
                    MAX_INPUT_LENGTH
                )),
                Err(e) => return Err(e.into()),
            }
        } else if ctx.starts_with("_cmd remove") {
            if self
                .handler
                .remove_command(guild_id, ctx.args("_cmd remove"))
                .await?
            {
                out.say("Ok :ok_hand:");
            } else {
                out.say("Failed to remove command (does not exist) :warning:");
            }
        } else if ctx.starts_with("_cmd list") {
            let mut commands: Vec<(String, String)> = self
                .handler
                .get_custom_commands(guild_id)
                .await?
                .into_iter()
                .collect();
            if commands.is_empty() {
                out.say(format!(
                    "No custom commands on this server. Add one with `{}cmd add trigger|response`!",
                    ctx.prefix
                ));
                return Ok(());
            }
            commands.sort();

            let lines: Vec<String> = commands
                .iter()
                .map(|(trigger, response)| format!("{} : {}", trigger, response))
                .collect();
            let text = format!("*Custom commands:*\n```{}```", lines.join("\n"));

            if text.chars().count() > MESSAGE_LIMIT {
                out.say(
                    "Your commands are too long to display. Consider cleaning some of them up.",
                );
            } else {
                out.say(text);
            }
        } else if ctx.starts_with("_cmd status") {
            let amount = self.handler.get_command_amount(guild_id).await?;
            out.say(format!(
                "You have **{}** out of *{}* custom commands (*{}%*)",
                amount,
                CMD_LIMIT,
                amount * 100 / CMD_LIMIT
            ));
        }

        Ok(())
    }

    async fn settings(
        &self,
        ctx: &PluginContext<'_>,
        guild: &GuildView,
        out: &mut Outbox,
    ) -> Result<(), PluginError> {
        let Some((setting, value)) = ctx.args("nano.settings").rsplit_once(' ') else {
            out.say("Use `nano.settings [setting] [on/off]`.");
            self.stats.add(Stat::WrongArg);
            return Ok(());
        };
        let setting = setting.trim();

        if matches!(
            setting.to_lowercase().as_str(),
            "logchannel" | "log channel" | "logging channel"
        ) {
            if value.eq_ignore_ascii_case("none") {
                self.handler.set_log_channel(guild.id(), None).await?;
                out.say("Log channel disabled :ok_hand:");
                return Ok(());
            }

            match resolve_channel(ctx, guild, value) {
                Some(channel) => {
                    self.handler
                        .set_log_channel(guild.id(), Some(channel.id))
                        .await?;
                    out.say(format!("Log channel set to #{} :ok_hand:", channel.name));
                }
                None => out.say(CHANNEL_NOT_FOUND),
            }
            return Ok(());
        }

        let enabled = is_enabled_word(value);
        match self
            .handler
            .update_moderation_settings(guild.id(), setting, enabled)
            .await?
        {
            Some(setting) => out.say(format!(
                "{} {}",
                setting.label(),
                if enabled {
                    ":white_check_mark:"
                } else {
                    ":negative_squared_cross_mark:"
                }
            )),
            None => {
                out.say("Not a setting. (wordfilter/spamfilter/invitefilter)");
                self.stats.add(Stat::WrongArg);
            }
        }
        Ok(())
    }

    async fn display_settings(&self, guild: &GuildView) -> Result<String, PluginError> {
        let data = self.handler.get_server_data(guild.id()).await?;

        let mut blacklisted = Vec::new();
        for channel_id in &data.blacklist {
            match guild.channels.iter().find(|c| c.id == *channel_id) {
                Some(channel) => blacklisted.push(channel.name.clone()),
                // Channel was deleted
                None => {
                    self.handler
                        .remove_channel_blacklist(guild.id(), *channel_id)
                        .await?;
                }
            }
        }
        let blacklisted = if blacklisted.is_empty() {
            "No blacklists".to_string()
        } else {
            blacklisted.join(", ")
        };

        let settings = &data.settings;
        let log_channel = match settings.log_channel {
            Some(id) => guild
                .channels
                .iter()
                .find(|c| c.id == id)
                .map(|c| format!("#{}", c.name))
                .unwrap_or_else(|| id.to_string()),
            None => "None".to_string(),
        };
        let message = |msg: &Option<String>| msg.clone().unwrap_or_else(|| "None".to_string());

        Ok(format!(
            "**Settings for current server:**```\n\
             Blacklisted channels: {}\n\
             Spam filter: {}\n\
             Word filter: {}\n\
             Invite removal: {}\n\
             Log channel: {}\n\
             Prefix: {}```\n\
             Messages:\n\
             ➤ Join: `{}`\n\
             ➤ Leave: `{}`\n\
             ➤ Ban: `{}`\n\
             ➤ Kick: `{}`",
            blacklisted,
            on_off(settings.spam_filter),
            on_off(settings.word_filter),
            on_off(settings.invite_filter),
            log_channel,
            settings.prefix,
            message(&settings.welcome_msg),
            message(&settings.leave_msg),
            message(&settings.ban_msg),
            message(&settings.kick_msg),
        ))
    }

    async fn blacklist(
        &self,
        ctx: &PluginContext<'_>,
        guild: &GuildView,
        out: &mut Outbox,
    ) -> Result<(), PluginError> {
        let (adding, trigger) = if ctx.starts_with("nano.blacklist add") {
            (true, "nano.blacklist add")
        } else if ctx.starts_with("nano.blacklist remove") {
            (false, "nano.blacklist remove")
        } else {
            out.say("Use `nano.blacklist add|remove [#channel]`.");
            self.stats.add(Stat::WrongArg);
            return Ok(());
        };

        let Some(channel) = resolve_channel(ctx, guild, ctx.args(trigger)) else {
            out.say(CHANNEL_NOT_FOUND);
            return Ok(());
        };

        let reply = if adding {
            if self.handler.add_channel_blacklist(guild.id(), channel.id).await? {
                format!("**#{}** has been blacklisted.", channel.name)
            } else {
                format!("**#{}** is already blacklisted.", channel.name)
            }
        } else if self
            .handler
            .remove_channel_blacklist(guild.id(), channel.id)
            .await?
        {
            format!("**#{}** has been removed from the blacklist.", channel.name)
        } else {
            format!("**#{}** is not blacklisted.", channel.name)
        };
        out.say(reply);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Self-roles
    // ------------------------------------------------------------------------

    async fn selfroles(
        &self,
        ctx: &PluginContext<'_>,
        guild: &GuildView,
        out: &mut Outbox,
    ) -> Result<(), PluginError> {
        if ctx.starts_with("_selfrole list") {
            let roles = self.handler.get_selfroles(guild.id()).await?;
            if roles.is_empty() {
                out.say("No self-assignable roles on this server.");
            } else {
                let lines: Vec<String> = roles.iter().map(|r| format!("➤ {}", r)).collect();
                out.say(format!("Self-assignable roles:\n{}", lines.join("\n")));
            }
        } else if ctx.starts_with("_selfrole add") {
            let role = ctx.args("_selfrole add");
            if !guild.has_role(role) {
                out.say(format!("No such role: '{}'", role));
                self.stats.add(Stat::WrongArg);
            } else if self.handler.add_selfrole(guild.id(), role).await? {
                out.say(format!("**{}** is now a self-assignable role.", role));
            } else {
                out.say(format!("**{}** is already self-assignable.", role));
            }
        } else if ctx.starts_with("_selfrole remove") {
            let role = ctx.args("_selfrole remove");
            if self.handler.remove_selfrole(guild.id(), role).await? {
                out.say(format!("**{}** is no longer self-assignable.", role));
            } else {
                out.say(format!("**{}** is not a self-assignable role.", role));
            }
        } else {
            out.say(format!(
                "Use `{}selfrole add|remove [role]` or `{}selfrole list`.",
                ctx.prefix, ctx.prefix
            ));
            self.stats.add(Stat::WrongArg);
        }
        Ok(())
    }

    async fn self_assign(
        &self,
        ctx: &PluginContext<'_>,
        guild: &GuildView,
        out: &mut Outbox,
    ) -> Result<(), PluginError> {
        let (op, trigger) = if ctx.starts_with("_iamnot") {
            (RoleOp::Remove, "_iamnot")
        } else {
            (RoleOp::Add, "_iam")
        };

        let role = ctx.args(trigger);
        if role.is_empty() {
            out.say(format!(
                "Use `{} [role]`.",
                expand_trigger(trigger, ctx.prefix)
            ));
            self.stats.add(Stat::WrongArg);
            return Ok(());
        }
        if !self.handler.is_selfrole(guild.id(), role).await? {
            out.say(format!("**{}** is not a self-assignable role.", role));
            return Ok(());
        }

        out.push(Action::ModifyRole {
            guild_id: guild.id(),
            channel_id: ctx.channel_id(),
            actor_id: None,
            user_id: ctx.author().id,
            role_name: role.to_string(),
            op,
        });
        out.say("Done :ok_hand:");
        Ok(())
    }
}

#[async_trait]
impl Plugin for AdminPlugin {
    fn name(&self) -> &'static str {
        "admin"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    async fn on_message(
        &self,
        ctx: &PluginContext<'_>,
        out: &mut Outbox,
    ) -> Result<Flow, PluginError> {
        if ctx.content() == CONFIRM_WORD {
            if let Some(guild) = ctx.event.guild.as_ref() {
                if self.confirm(ctx, guild, out).await? {
                    return Ok(Flow::Stop);
                }
            }
            return Ok(Flow::Continue);
        }

        if !is_valid_command(ctx.content(), COMMANDS.iter().map(|c| c.trigger), ctx.prefix) {
            return Ok(Flow::Continue);
        }
        self.stats.add(Stat::Message);

        let guild = ctx.guild()?;
        let author = ctx.author();

        if ctx.starts_with_any(&["_iamnot", "_iam"]) {
            self.self_assign(ctx, guild, out).await?;
        } else if Self::is_mod_command(ctx) {
            if !self.handler.is_mod(author.id, &author.roles, &guild.info) {
                out.say(NOT_MOD);
                return Ok(Flow::Continue);
            }
            self.moderate(ctx, guild, out).await?;
        } else {
            if !self
                .handler
                .can_use_admin_commands(author.id, &author.roles, &guild.info)
            {
                out.say(NOT_ADMIN);
                return Ok(Flow::Continue);
            }
            self.administrate(ctx, guild, out).await?;
        }

        Ok(Flow::Continue)
    }
}
