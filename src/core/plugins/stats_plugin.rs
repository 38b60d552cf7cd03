// Bot statistics and status.

use super::plugin_models::*;
use crate::core::stats::{BotStats, Stat};
use async_trait::async_trait;
use std::sync::Arc;

static COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("_stats", "Some stats like message count and stuff like that.")
        .alias("nano.stats"),
    CommandSpec::new("nano.stats", "Some stats like message count and stuff like that.")
        .alias("_stats"),
    CommandSpec::new("_status", "Displays current status: server, user and channel count.")
        .alias("nano.status"),
    CommandSpec::new("nano.status", "Displays current status: server, user and channel count.")
        .alias("_status"),
];

pub struct StatsPlugin {
    stats: Arc<BotStats>,
}

impl StatsPlugin {
    pub fn new(stats: Arc<BotStats>) -> Self {
        Self { stats }
    }

    fn render(&self) -> String {
        let s = self.stats.snapshot();
        format!(
            "**Stats**\n\
             Messages handled: `{}`\n\
             Wrong arguments: `{}`\n\
             Messages suppressed: `{}`\n\
             Pings: `{}`\n\
             Help requests: `{}`\n\
             Votes: `{}`\n\
             Prayers: `{}`",
            s.messages, s.wrong_args, s.suppressed, s.pings, s.helps, s.votes, s.prayers
        )
    }
}

#[async_trait]
impl Plugin for StatsPlugin {
    fn name(&self) -> &'static str {
        "stats"
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

        if ctx.starts_with_any(&["_status", "nano.status"]) {
            out.push(Action::ShowStatus {
                channel_id: ctx.channel_id(),
            });
        } else {
            out.say(self.render());
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plugins::plugin_models::tests::{event, member, sent};

    async fn run(plugin: &StatsPlugin, content: &str) -> Outbox {
        let event = event(member(3, "bob", &[]), content);
        let ctx = PluginContext {
            event: &event,
            prefix: "!",
            lang: "en",
        };
        let mut out = Outbox::new(event.channel_id);
        plugin.on_message(&ctx, &mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_stats_and_status() {
        let stats = Arc::new(BotStats::new());
        stats.add(Stat::Ping);
        let plugin = StatsPlugin::new(stats);

        let text = sent(&run(&plugin, "!stats").await).remove(0);
        assert!(text.contains("Pings: `1`"));
        assert!(text.contains("Messages handled: `1`"));

        let out = run(&plugin, "nano.status").await;
        assert_eq!(out.actions(), &[Action::ShowStatus { channel_id: 100 }]);
    }
}
