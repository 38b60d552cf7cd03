// Fun plugin - kappa, rip and a couple of meme replies.

use super::plugin_models::*;
use crate::core::stats::{BotStats, Stat};
use crate::core::util::at_everyone_filter;
use async_trait::async_trait;
use std::sync::Arc;

static COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("_kappa", "I couldn't resist it."),
    CommandSpec::new("_rip", "Rest in peperoni, man.").usage("[command] [mention or text]"),
    CommandSpec::new("ayy lmao", "Yes, it's the ayy lmao meme."),
];

/// Literal triggers answered with a fixed line.
const MEME_REPLIES: [(&str, &str); 2] = [
    ("ayy lmao", "My inspiration in the world of memes."),
    ("( ͡° ͜ʖ ͡°)", "¯\\_(ツ)_/¯ indeed"),
];

const KAPPA_URL: &str = "https://static-cdn.jtvnw.net/emoticons/v1/25/3.0";

pub struct FunPlugin {
    stats: Arc<BotStats>,
}

impl FunPlugin {
    pub fn new(stats: Arc<BotStats>) -> Self {
        Self { stats }
    }

    fn rip(&self, ctx: &PluginContext<'_>, out: &mut Outbox) {
        let who = match ctx.event.mentions.as_slice() {
            [one] => one.mention(),
            [] => ctx.args("_rip").to_string(),
            _ => String::new(),
        };
        let who = at_everyone_filter(&who, ctx.event.author_can_mention_everyone);

        let prayers = self.stats.get(Stat::Prayer);
        let separator = if who.is_empty() { "" } else { ", " };
        out.say(format!(
            "Rest in pepperoni{}{}.\n`{}` *prayers said so far*...",
            separator, who, prayers
        ));
        self.stats.add(Stat::Prayer);
    }
}

#[async_trait]
impl Plugin for FunPlugin {
    fn name(&self) -> &'static str {
        "fun"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    async fn on_message(
        &self,
        ctx: &PluginContext<'_>,
        out: &mut Outbox,
    ) -> Result<Flow, PluginError> {
        if let Some((_, reply)) = MEME_REPLIES.iter().find(|(t, _)| ctx.starts_with(t)) {
            out.say(*reply);
            self.stats.add(Stat::Message);
            return Ok(Flow::Continue);
        }

        if !is_valid_command(ctx.content(), COMMANDS.iter().map(|c| c.trigger), ctx.prefix) {
            return Ok(Flow::Continue);
        }
        self.stats.add(Stat::Message);

        if ctx.starts_with("_kappa") {
            out.embed(EmbedSpec::new("Kappa").image(KAPPA_URL));
        } else if ctx.starts_with("_rip") {
            self.rip(ctx, out);
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plugins::plugin_models::tests::{event, member, sent};

    async fn run(plugin: &FunPlugin, content: &str, mentions: Vec<MemberView>) -> Outbox {
        let mut event = event(member(3, "bob", &[]), content);
        event.mentions = mentions;
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
    async fn test_rip_counts_prayers() {
        let plugin = FunPlugin::new(Arc::new(BotStats::new()));

        let out = run(&plugin, "!rip", Vec::new()).await;
        assert_eq!(
            sent(&out),
            vec!["Rest in pepperoni.\n`0` *prayers said so far*..."]
        );

        let out = run(&plugin, "!rip <@2>", vec![member(2, "alice", &[])]).await;
        assert_eq!(
            sent(&out),
            vec!["Rest in pepperoni, <@2>.\n`1` *prayers said so far*..."]
        );
    }

    #[tokio::test]
    async fn test_rip_filters_everyone() {
        let plugin = FunPlugin::new(Arc::new(BotStats::new()));

        let out = run(&plugin, "!rip @everyone", Vec::new()).await;
        assert!(!sent(&out)[0].contains("@everyone"));
    }

    #[tokio::test]
    async fn test_kappa_and_memes() {
        let plugin = FunPlugin::new(Arc::new(BotStats::new()));

        let out = run(&plugin, "!kappa", Vec::new()).await;
        match &out.actions()[0] {
            Action::SendEmbed { embed, .. } => assert_eq!(embed.image.as_deref(), Some(KAPPA_URL)),
            other => panic!("unexpected action {:?}", other),
        }

        let out = run(&plugin, "ayy lmao", Vec::new()).await;
        assert_eq!(sent(&out), vec!["My inspiration in the world of memes."]);
    }
}
