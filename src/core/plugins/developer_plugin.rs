// Developer plugin - owner-only maintenance commands.

use super::plugin_models::*;
use crate::core::stats::{BotStats, Stat};
use crate::core::store::ServerHandler;
use async_trait::async_trait;
use std::sync::Arc;

static COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("nano.dev.server_info", "Restricted to owner, shows data of any server.")
        .usage("[command] [server id]"),
    CommandSpec::new("nano.dev.leave_server", "Restricted to owner, leaves a server.")
        .usage("[command] [server id]"),
    CommandSpec::new("nano.dev.servers.tidy", "Restricted to owner, drops data of servers the bot left."),
    CommandSpec::new("nano.dev.announce", "Restricted to owner, sends a message to every server.")
        .usage("[command] [message]"),
    CommandSpec::new("nano.dev.embed_test", "Restricted to owner, sends a sample embed."),
    CommandSpec::new("nano.playing", "Restricted to owner, changes the 'playing' status.")
        .usage("[command] [status]"),
    CommandSpec::new("nano.restart", "Restricted to owner, restarts the bot."),
    CommandSpec::new("nano.kill", "Restricted to owner, shuts down the bot."),
];

const NOT_OWNER: &str = ":warning: This command is restricted to the bot owner.";

pub struct DeveloperPlugin {
    handler: Arc<ServerHandler>,
    stats: Arc<BotStats>,
}

impl DeveloperPlugin {
    pub fn new(handler: Arc<ServerHandler>, stats: Arc<BotStats>) -> Self {
        Self { handler, stats }
    }

    fn guild_arg(&self, raw: &str, out: &mut Outbox) -> Option<u64> {
        match raw.trim().parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                out.say("Not a number.");
                self.stats.add(Stat::WrongArg);
                None
            }
        }
    }
}

#[async_trait]
impl Plugin for DeveloperPlugin {
    fn name(&self) -> &'static str {
        "developer"
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

        let author = ctx.author();
        if !self.handler.is_bot_owner(author.id) {
            out.say(NOT_OWNER);
            return Ok(Flow::Continue);
        }

        let channel_id = ctx.channel_id();
        if ctx.starts_with("nano.dev.server_info") {
            if let Some(guild_id) = self.guild_arg(ctx.args("nano.dev.server_info"), out) {
                out.push(Action::ShowGuildReport {
                    channel_id,
                    guild_id,
                });
            }
        } else if ctx.starts_with("nano.dev.leave_server") {
            if let Some(guild_id) = self.guild_arg(ctx.args("nano.dev.leave_server"), out) {
                tracing::info!(guild_id, "Leaving server on owner request");
                out.push(Action::LeaveGuild {
                    channel_id,
                    guild_id,
                });
            }
        } else if ctx.starts_with("nano.dev.servers.tidy") {
            out.push(Action::TidyServers { channel_id });
        } else if ctx.starts_with("nano.dev.announce") {
            let content = ctx.args("nano.dev.announce");
            if content.is_empty() {
                out.say("Nothing to announce.");
                self.stats.add(Stat::WrongArg);
                return Ok(Flow::Continue);
            }
            out.say("Sending... ");
            out.push(Action::Announce {
                channel_id,
                content: content.to_string(),
            });
        } else if ctx.starts_with("nano.dev.embed_test") {
            out.embed(
                EmbedSpec::new("Stats")
                    .color(0x546E7A)
                    .field("Messages Sent", "sample messages", true),
            );
        } else if ctx.starts_with("nano.playing") {
            out.push(Action::SetPlaying {
                status: ctx.args("nano.playing").to_string(),
            });
            out.say("Status changed :thumbsup:");
        } else if ctx.starts_with("nano.restart") {
            tracing::info!("Restart requested by the owner");
            out.say("**DED, but gonna come back**");
            out.push(Action::Shutdown { restart: true });
            return Ok(Flow::Stop);
        } else if ctx.starts_with("nano.kill") {
            tracing::info!("Shutdown requested by the owner");
            out.say("**DED**");
            out.push(Action::Shutdown { restart: false });
            return Ok(Flow::Stop);
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plugins::plugin_models::tests::{event, member, sent, OWNER_ID};
    use crate::infra::store::InMemoryKvStore;

    fn plugin() -> DeveloperPlugin {
        let store = Arc::new(InMemoryKvStore::new());
        DeveloperPlugin::new(
            Arc::new(ServerHandler::new(store, OWNER_ID, "!")),
            Arc::new(BotStats::new()),
        )
    }

    async fn run(plugin: &DeveloperPlugin, author: MemberView, content: &str) -> (Flow, Outbox) {
        let event = event(author, content);
        let ctx = PluginContext {
            event: &event,
            prefix: "!",
            lang: "en",
        };
        let mut out = Outbox::new(event.channel_id);
        let flow = plugin.on_message(&ctx, &mut out).await.unwrap();
        (flow, out)
    }

    fn owner() -> MemberView {
        member(OWNER_ID, "owner", &[])
    }

    #[tokio::test]
    async fn test_owner_only() {
        let plugin = plugin();

        let (_, out) = run(&plugin, member(2, "alice", &["Nano Admin"]), "nano.kill").await;
        assert_eq!(sent(&out), vec![NOT_OWNER]);
        assert_eq!(out.actions().len(), 1);
    }

    #[tokio::test]
    async fn test_kill_and_restart_stop_the_chain() {
        let plugin = plugin();

        let (flow, out) = run(&plugin, owner(), "nano.kill").await;
        assert_eq!(flow, Flow::Stop);
        assert_eq!(sent(&out), vec!["**DED**"]);
        assert_eq!(out.actions()[1], Action::Shutdown { restart: false });

        let (_, out) = run(&plugin, owner(), "nano.restart").await;
        assert_eq!(out.actions()[1], Action::Shutdown { restart: true });
    }

    #[tokio::test]
    async fn test_server_commands_need_an_id() {
        let plugin = plugin();

        let (_, out) = run(&plugin, owner(), "nano.dev.server_info abc").await;
        assert_eq!(sent(&out), vec!["Not a number."]);

        let (_, out) = run(&plugin, owner(), "nano.dev.leave_server 42").await;
        assert_eq!(
            out.actions(),
            &[Action::LeaveGuild {
                channel_id: 100,
                guild_id: 42
            }]
        );
    }

    #[tokio::test]
    async fn test_playing_and_announce() {
        let plugin = plugin();

        let (_, out) = run(&plugin, owner(), "nano.playing with fire").await;
        assert_eq!(
            out.actions()[0],
            Action::SetPlaying {
                status: "with fire".to_string()
            }
        );

        let (_, out) = run(&plugin, owner(), "nano.dev.announce").await;
        assert_eq!(sent(&out), vec!["Nothing to announce."]);

        let (_, out) = run(&plugin, owner(), "nano.dev.announce New version out!").await;
        assert_eq!(
            out.actions()[1],
            Action::Announce {
                channel_id: 100,
                content: "New version out!".to_string()
            }
        );
    }
}
