// Server plugin - member list, server info, prefix lookup and debug info.

use super::plugin_models::*;
use crate::core::reminders::ReminderService;
use crate::core::stats::{BotStats, Stat};
use crate::core::store::ServerHandler;
use crate::core::util::resolve_time;
use crate::core::voting::VoteService;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

static COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("_members", "Lists all members on the server."),
    CommandSpec::new("_server", "Shows info about the current server."),
    CommandSpec::new("_prefix", "No use whatsoever, but here you have it."),
    CommandSpec::new("nano.prefix", "Helps you figure out the prefix."),
    CommandSpec::new("_debug", "Displays even more stats about Nano."),
];

/// Anyone but the bot owner gets debug info at most this often.
const DEBUG_COOLDOWN: Duration = Duration::from_secs(360);
const MESSAGE_LIMIT: usize = 2000;
const DEBUG_COLOR: u32 = 0x2ECC71;

/// Member list message, or just the count when the list would not fit.
pub fn member_list(names: &[&str]) -> String {
    let listed = names
        .iter()
        .map(|name| format!("`{}`", name))
        .collect::<Vec<_>>()
        .join(", ");
    let full = format!(
        "**Members:**\n{}\n\nTotal: **{}** members",
        listed,
        names.len()
    );

    if full.chars().count() > MESSAGE_LIMIT {
        format!("This server has **{}** members.", names.len())
    } else {
        full
    }
}

pub struct ServerPlugin {
    handler: Arc<ServerHandler>,
    reminders: Arc<ReminderService>,
    votes: Arc<VoteService>,
    stats: Arc<BotStats>,
    version: &'static str,
    started: Instant,
    last_debug: Mutex<Option<Instant>>,
}

impl ServerPlugin {
    pub fn new(
        handler: Arc<ServerHandler>,
        reminders: Arc<ReminderService>,
        votes: Arc<VoteService>,
        stats: Arc<BotStats>,
        version: &'static str,
    ) -> Self {
        Self {
            handler,
            reminders,
            votes,
            stats,
            version,
            started: Instant::now(),
            last_debug: Mutex::new(None),
        }
    }

    /// Claim the debug cooldown. The bot owner always gets through.
    fn debug_allowed(&self, user_id: u64) -> bool {
        let mut last = match self.last_debug.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let owner = self.handler.is_bot_owner(user_id);
        if !owner && last.is_some_and(|at| at.elapsed() < DEBUG_COOLDOWN) {
            return false;
        }
        *last = Some(Instant::now());
        true
    }

    async fn debug(&self, ctx: &PluginContext<'_>, out: &mut Outbox) -> Result<(), PluginError> {
        if !self.debug_allowed(ctx.author().id) {
            tracing::debug!(user_id = ctx.author().id, "Debug info on cooldown");
            return Ok(());
        }

        let embed = EmbedSpec::new("Debug info")
            .color(DEBUG_COLOR)
            .field("Version", self.version, true)
            .field(
                "Reminders",
                self.reminders.get_reminder_amount().await?.to_string(),
                true,
            )
            .field("Votes", self.votes.get_vote_amount().to_string(), true)
            .field("Stored keys", self.handler.db_size().await?.to_string(), true)
            .field("Uptime", resolve_time(self.started.elapsed().as_secs()), false);
        out.embed(embed);
        Ok(())
    }
}

#[async_trait]
impl Plugin for ServerPlugin {
    fn name(&self) -> &'static str {
        "server"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    async fn on_message(
        &self,
        ctx: &PluginContext<'_>,
        out: &mut Outbox,
    ) -> Result<Flow, PluginError> {
        if !is_valid_command(ctx.content(), COMMANDS.iter().map(|c| c.trigger), ctx.prefix) {
            return Ok(Flow::Continue);
        }
        self.stats.add(Stat::Message);

        if ctx.starts_with("_debug") {
            self.debug(ctx, out).await?;
        } else if ctx.starts_with("nano.prefix") {
            out.say(format!("The prefix on this server is **{}**", ctx.prefix));
        } else if ctx.starts_with("_prefix") {
            out.say("You know it already, don't you? :smirk:");
        } else if ctx.starts_with("_members") {
            let guild = ctx.guild()?;
            let names: Vec<&str> = guild.members.iter().map(|m| m.name.as_str()).collect();
            out.say(member_list(&names));
        } else if ctx.starts_with("_server") {
            let guild = ctx.guild()?;
            out.push(Action::ShowServerInfo {
                channel_id: ctx.channel_id(),
                guild_id: guild.id(),
            });
        }

        Ok(Flow::Continue)
    }
}
