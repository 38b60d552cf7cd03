// Voting commands on top of the vote service.

use super::plugin_models::*;
use crate::core::stats::{BotStats, Stat};
use crate::core::store::ServerHandler;
use crate::core::voting::{VoteError, VoteService};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

static COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("_vote start", "Starts a vote on the server.")
        .usage("[command] \"question\" choice1|choice2|..."),
    CommandSpec::new("_vote end", "Simply ends the current vote on the server."),
    CommandSpec::new("_vote", "One up for your choice, if there's a vote running.")
        .usage("[command] [choice number]"),
];

const CHEATER_DELAY: Duration = Duration::from_secs(2);

pub struct VotingPlugin {
    handler: Arc<ServerHandler>,
    votes: Arc<VoteService>,
    stats: Arc<BotStats>,
}

impl VotingPlugin {
    pub fn new(handler: Arc<ServerHandler>, votes: Arc<VoteService>, stats: Arc<BotStats>) -> Self {
        Self {
            handler,
            votes,
            stats,
        }
    }
}

#[async_trait]
impl Plugin for VotingPlugin {
    fn name(&self) -> &'static str {
        "voting"
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

        let guild = ctx.guild()?;
        let author = ctx.author();
        let is_admin = self
            .handler
            .can_use_admin_commands(author.id, &author.roles, &guild.info);

        if ctx.starts_with("_vote start") {
            if !is_admin {
                out.say("You are not permitted to use this command.");
                return Ok(Flow::Continue);
            }

            match self
                .votes
                .start_vote(guild.id(), &author.name, ctx.args("_vote start"))
            {
                Ok(vote) => {
                    let options: Vec<String> = vote
                        .options
                        .iter()
                        .enumerate()
                        .map(|(i, option)| format!("{}. {}", i + 1, option))
                        .collect();
                    out.say(format!("**{}**\n```{}```", vote.title, options.join("\n")));
                }
                Err(e) => {
                    if e == VoteError::InvalidFormat {
                        self.stats.add(Stat::WrongArg);
                    }
                    out.say(e.to_string());
                }
            }
        } else if ctx.starts_with("_vote end") {
            if !is_admin {
                out.say("You are not permitted to use this command.");
                return Ok(Flow::Continue);
            }

            match self.votes.end_vote(guild.id()) {
                Ok(results) => out.say(results.render()),
                Err(e) => out.say(e.to_string()),
            }
        } else if ctx.starts_with("_vote") {
            let choice = ctx.args("_vote");
            if choice.is_empty() || !self.votes.in_progress(guild.id()) {
                return Ok(Flow::Continue);
            }

            match self.votes.plus_one(guild.id(), choice, author.id) {
                Ok(()) => self.stats.add(Stat::Vote),
                Err(VoteError::AlreadyVoted) => {
                    out.say_temporary("Cheater :smile:", CHEATER_DELAY);
                }
                Err(e) => out.say(e.to_string()),
            }
        }

        Ok(Flow::Continue)
    }
}
