// Third-party lookups: xkcd, jokes and Wikipedia.

use super::plugin_models::*;
use crate::core::lookups::{Comic, JokeProvider, LookupError, WikiAnswer, WikiProvider, XkcdService};
use crate::core::stats::{BotStats, Stat};
use crate::core::util::make_dots;
use async_trait::async_trait;
use std::sync::Arc;

static COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("_xkcd", "Sends the latest, a random or a specific xkcd comic.")
        .usage("[command] (number or random)"),
    CommandSpec::new("_joke", "Tells you a Chuck Norris joke."),
    CommandSpec::new("_wiki", "Gives you the definition of a word from Wikipedia.")
        .usage("[command] [word]")
        .alias("_define"),
    CommandSpec::new("_define", "Gives you the definition of a word from Wikipedia.")
        .usage("[command] [word]")
        .alias("_wiki"),
];

const WIKI_MAX_LENGTH: usize = 1500;
const XKCD_COLOR: u32 = 0x96A8C8;

fn comic_embed(comic: &Comic) -> EmbedSpec {
    EmbedSpec::new(format!("#{} {}", comic.num, comic.title))
        .description(comic.link())
        .image(comic.img.clone())
        .footer(comic.alt.clone())
        .color(XKCD_COLOR)
}

pub struct LookupsPlugin {
    xkcd: Arc<XkcdService>,
    jokes: Arc<dyn JokeProvider>,
    wiki: Arc<dyn WikiProvider>,
    stats: Arc<BotStats>,
}

impl LookupsPlugin {
    pub fn new(
        xkcd: Arc<XkcdService>,
        jokes: Arc<dyn JokeProvider>,
        wiki: Arc<dyn WikiProvider>,
        stats: Arc<BotStats>,
    ) -> Self {
        Self {
            xkcd,
            jokes,
            wiki,
            stats,
        }
    }

    async fn xkcd(&self, ctx: &PluginContext<'_>, out: &mut Outbox) {
        let arg = ctx.args("_xkcd");
        let result = match arg {
            "" => self.xkcd.get_latest().await,
            "random" => self.xkcd.get_random().await,
            number => match number.parse::<u32>() {
                Ok(num) => self.xkcd.get_by_number(num).await,
                Err(_) => {
                    out.say("Please give me a comic number or `random`.");
                    self.stats.add(Stat::WrongArg);
                    return;
                }
            },
        };

        match result {
            Ok(comic) => out.embed(comic_embed(&comic)),
            Err(LookupError::NotFound) => out.say("No such comic."),
            Err(e) => {
                tracing::warn!("xkcd lookup failed: {}", e);
                out.say("Could not reach xkcd, try again later.");
            }
        }
    }

    async fn wiki(&self, ctx: &PluginContext<'_>, out: &mut Outbox) {
        let term = if ctx.starts_with("_wiki") {
            ctx.args("_wiki")
        } else {
            ctx.args("_define")
        };
        if term.is_empty() {
            out.say("What should I look up?");
            self.stats.add(Stat::WrongArg);
            return;
        }

        match self.wiki.summary(term).await {
            Ok(WikiAnswer::Summary { title, extract }) => {
                out.say(format!("**{}**\n{}", title, make_dots(&extract, WIKI_MAX_LENGTH)));
            }
            Ok(WikiAnswer::Ambiguous) => {
                out.say("That term has several meanings, please be more specific.");
            }
            Ok(WikiAnswer::NotFound) | Err(LookupError::NotFound) => {
                out.say("No definitions found.");
            }
            Err(e) => {
                tracing::warn!("Wikipedia lookup failed: {}", e);
                out.say("Could not reach Wikipedia, try again later.");
            }
        }
    }
}

#[async_trait]
impl Plugin for LookupsPlugin {
    fn name(&self) -> &'static str {
        "lookups"
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

        if ctx.starts_with("_xkcd") {
            self.xkcd(ctx, out).await;
        } else if ctx.starts_with("_joke") {
            match self.jokes.random_joke().await {
                Ok(joke) => out.say(joke),
                Err(e) => {
                    tracing::warn!("Joke lookup failed: {}", e);
                    out.say("No jokes right now, try again later.");
                }
            }
        } else if ctx.starts_with_any(&["_wiki", "_define"]) {
            self.wiki(ctx, out).await;
        }

        Ok(Flow::Continue)
    }
}
