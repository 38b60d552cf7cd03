// Commons plugin - custom commands and the small everyday commands.

use super::plugin_models::*;
use crate::core::stats::{BotStats, Stat};
use crate::core::store::ServerHandler;
use crate::core::util::{at_everyone_filter, make_dots, resolve_time};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;

pub const GITHUB_URL: &str = "https://github.com/DefaltSimon/Nano";
pub const INVITE_URL: &str = "http://invite.nanobot.pw";

/// Dice terms may roll at most this many dice.
const MAX_DICE: u32 = 100;
const MAX_SIDES: u64 = 1_000_000;

static COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("_hello", "Welcomes a **mentioned** person, or if no mentions are present, you.")
        .usage("[command] [mention]"),
    CommandSpec::new("_uptime", "Tells you for how long I have been running."),
    CommandSpec::new("_github", "Link to my project on GitHub."),
    CommandSpec::new("_ping", "Just to check if I'm alive. fyi: I love ping-pong."),
    CommandSpec::new("_roll", "Replies with a random number in range from 0 to your number.")
        .usage("[command] [number]")
        .alias("_rng"),
    CommandSpec::new("_rng", "Replies with a random number in range from 0 to your number.")
        .usage("[command] [number]")
        .alias("_roll"),
    CommandSpec::new(
        "_dice",
        "Rolls the dice\nDice expression example: `5d6` - rolls five dice with six sides, `1d9` - rolls one die with nine sides",
    )
    .usage("[command] [dice expression]"),
    CommandSpec::new("_decide", "Decides between different choices so you don't have to.")
        .usage("[command] word1|word2|word3|..."),
    CommandSpec::new("_8ball", "Answers your questions. 8ball style.").usage("[command] [question]"),
    CommandSpec::new("_quote", "Brightens your day with a random quote."),
    CommandSpec::new("_invite", "Gives you a link to invite Nano to another (your) server.")
        .alias("nano.invite"),
    CommandSpec::new("nano.invite", "Gives you a link to invite Nano to another (your) server.")
        .alias("_invite"),
    CommandSpec::new("_avatar", "Gives you the avatar url of a mentioned person")
        .usage("[command] [mention or name]"),
    CommandSpec::new("_say", "Says something (#channel is optional)")
        .usage("[command] (#channel) [message]"),
    CommandSpec::new("nano.info", "A little info about me.").alias("_nano"),
    CommandSpec::new("_nano", "A little info about me.").alias("nano.info"),
];

const EIGHT_BALL: [&str; 12] = [
    "It is certain",
    "It is decidedly so",
    "Without a doubt",
    "Yes, definitely",
    "Most likely",
    "Outlook good",
    "Reply hazy, try again",
    "Ask again later",
    "Cannot predict now",
    "Don't count on it",
    "My sources say no",
    "Very doubtful",
];

const QUOTES: [&str; 12] = [
    "You miss 100% of the shots you don't take. –Wayne Gretzky",
    "The most difficult thing is the decision to act, the rest is merely tenacity. –Amelia Earhart",
    "Eighty percent of success is showing up. –Woody Allen",
    "The best time to plant a tree was 20 years ago. The second best time is now. –Chinese Proverb",
    "Everything you've ever wanted is on the other side of fear. –George Addair",
    "I didn't fail the test. I just found 100 ways to do it wrong. –Benjamin Franklin",
    "A person who never made a mistake never tried anything new. –Albert Einstein",
    "It does not matter how slowly you go as long as you do not stop. –Confucius",
    "You can't use up creativity. The more you use, the more you have. –Maya Angelou",
    "Do what you can, where you are, with what you have. –Teddy Roosevelt",
    "The human race has one really effective weapon, and that is laughter. –Mark Twain",
    "The secret of happiness is something to do. –John Burroughs",
];

#[derive(Debug, Clone, PartialEq)]
pub struct DiceRoll {
    pub expression: String,
    pub total: u64,
}

/// Roll a dice expression such as `2d6 + 1d20`. `None` on malformed terms.
pub fn roll_dice(expression: &str) -> Option<Vec<DiceRoll>> {
    let expression = if expression.trim().is_empty() {
        "1d6"
    } else {
        expression
    };

    let mut rng = rand::thread_rng();
    let mut rolls = Vec::new();
    for term in expression.split('+').map(str::trim) {
        let (times, sides) = term.split_once('d')?;
        let times: u32 = times.trim().parse().ok()?;
        let sides: u64 = sides.trim().parse().ok()?;
        if times == 0 || times > MAX_DICE || !(1..=MAX_SIDES).contains(&sides) {
            return None;
        }

        let total = (0..times).try_fold(0u64, |acc, _| acc.checked_add(rng.gen_range(1..=sides)))?;
        rolls.push(DiceRoll {
            expression: term.to_string(),
            total,
        });
    }
    Some(rolls)
}

/// Split a quote into text and author at the last dash.
fn split_quote(quote: &str) -> (&str, &str) {
    match quote.rsplit_once('–') {
        Some((text, author)) => (text.trim(), author.trim()),
        None => (quote, "Unknown"),
    }
}

pub struct CommonsPlugin {
    handler: Arc<ServerHandler>,
    stats: Arc<BotStats>,
    started: Instant,
    version: &'static str,
}

impl CommonsPlugin {
    pub fn new(handler: Arc<ServerHandler>, stats: Arc<BotStats>, version: &'static str) -> Self {
        Self {
            handler,
            stats,
            started: Instant::now(),
            version,
        }
    }

    /// Exact-match custom commands of the guild. Returns `true` when one answered.
    async fn custom_command(
        &self,
        ctx: &PluginContext<'_>,
        out: &mut Outbox,
    ) -> Result<bool, PluginError> {
        let Some(guild) = &ctx.event.guild else {
            return Ok(false);
        };
        let commands = self.handler.get_custom_commands(guild.id()).await?;
        match commands.get(ctx.content()) {
            Some(response) => {
                out.say(response.clone());
                self.stats.add(Stat::Message);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn roll(&self, ctx: &PluginContext<'_>, out: &mut Outbox) {
        let raw = if ctx.starts_with("_roll") {
            ctx.args("_roll")
        } else {
            ctx.args("_rng")
        };

        let Ok(max) = raw.parse::<u64>() else {
            out.say("Not a number.");
            self.stats.add(Stat::WrongArg);
            return;
        };

        let rolled = rand::thread_rng().gen_range(0..=max);
        let gg = if rolled == max { " **GG**" } else { "" };
        out.say(format!("{} rolled **{}**.{}", ctx.author().mention(), rolled, gg));
    }

    fn dice(&self, ctx: &PluginContext<'_>, out: &mut Outbox) {
        let rolled = roll_dice(ctx.args("_dice")).and_then(|rolls| {
            let total = rolls.iter().try_fold(0u64, |acc, r| acc.checked_add(r.total))?;
            Some((rolls, total))
        });
        let Some((rolls, total)) = rolled else {
            out.say(format!(
                "Invalid dice expression. Example: `5d6 + 1d20` (at most {} dice with {} sides per term)",
                MAX_DICE, MAX_SIDES
            ));
            self.stats.add(Stat::WrongArg);
            return;
        };

        let lines: Vec<String> = rolls
            .iter()
            .map(|r| format!("`{}`: **{}**", r.expression, r.total))
            .collect();
        out.say(format!(
            "{} rolled:\n{}\n\nTotal: **{}**",
            ctx.author().mention(),
            lines.join("\n"),
            total
        ));
    }

    fn decide(&self, ctx: &PluginContext<'_>, out: &mut Outbox) {
        let raw = ctx.args("_decide");
        if raw.is_empty() {
            out.say("Give me some options to decide between, separated by `|`.");
            self.stats.add(Stat::WrongArg);
            return;
        }

        let options: Vec<&str> = raw.split('|').map(str::trim).filter(|o| !o.is_empty()).collect();
        match options.as_slice() {
            [] => out.say("Give me some options to decide between, separated by `|`."),
            [only] => out.say(format!("Guess what? It's **{}**. **ba dum tss**", only)),
            _ => {
                let chosen = options.choose(&mut rand::thread_rng()).copied().unwrap_or_default();
                out.say(format!("I choose **{}**", chosen));
            }
        }
    }

    fn avatar(&self, ctx: &PluginContext<'_>, out: &mut Outbox) {
        let query = ctx.args("_avatar");
        let member = if query.is_empty() {
            Some(ctx.author())
        } else {
            ctx.resolve_member(query)
        };

        match member {
            None => {
                out.say("User not found.");
                self.stats.add(Stat::WrongArg);
            }
            Some(member) => match &member.avatar_url {
                Some(url) => out.say(format!("**{}**'s avatar: {}", member.name, url)),
                None => out.say(format!("**{}** does not have an avatar.", member.name)),
            },
        }
    }

    async fn say(&self, ctx: &PluginContext<'_>, out: &mut Outbox) -> Result<(), PluginError> {
        let guild = ctx.guild()?;
        let author = ctx.author();
        if !self.handler.is_mod(author.id, &author.roles, &guild.info) {
            out.say("You are not permitted to use this command.");
            return Ok(());
        }

        let mut content = ctx.args("_say").to_string();
        if content.is_empty() {
            out.say("Invalid command arguments.");
            self.stats.add(Stat::WrongArg);
            return Ok(());
        }

        let channel_id = match ctx.event.channel_mentions.first() {
            Some(id) => {
                content = content.replace(&format!("<#{}>", id), "").trim().to_string();
                *id
            }
            None => ctx.channel_id(),
        };
        let content = at_everyone_filter(&content, ctx.event.author_can_mention_everyone);

        out.push(Action::Send {
            channel_id,
            content: content.clone(),
        });

        if let Some(log_channel) = self.handler.get_log_channel(guild.id()).await? {
            out.push(Action::SendEmbed {
                channel_id: log_channel,
                embed: EmbedSpec::new(format!("{}say was used", ctx.prefix))
                    .description(make_dots(&content, 350))
                    .author(format!("{} ({})", author.name, author.id), author.avatar_url.clone())
                    .field("Channel", format!("<#{}>", channel_id), true),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for CommonsPlugin {
    fn name(&self) -> &'static str {
        "commons"
    }

    fn commands(&self) -> &'static [CommandSpec] {
        COMMANDS
    }

    async fn on_message(
        &self,
        ctx: &PluginContext<'_>,
        out: &mut Outbox,
    ) -> Result<Flow, PluginError> {
        if self.custom_command(ctx, out).await? {
            return Ok(Flow::Stop);
        }

        if !is_valid_command(ctx.content(), COMMANDS.iter().map(|c| c.trigger), ctx.prefix) {
            return Ok(Flow::Continue);
        }
        self.stats.add(Stat::Message);

        if ctx.starts_with("_hello") {
            let target = ctx.event.mentions.first().unwrap_or(ctx.author());
            out.say(format!("Hi {}", target.mention()));
        } else if ctx.starts_with("_uptime") {
            out.say(format!(
                "I have been running for **{}**.",
                resolve_time(self.started.elapsed().as_secs())
            ));
        } else if ctx.starts_with_any(&["nano.info", "_nano"]) {
            out.say(format!(
                "**Nano {}**\nA moderation and fun bot with reminders, votes and more.\nSource: <{}>",
                self.version, GITHUB_URL
            ));
        } else if ctx.starts_with("_github") {
            out.say(format!("My code lives here: <{}>", GITHUB_URL));
        } else if ctx.starts_with_any(&["_roll", "_rng"]) {
            self.roll(ctx, out);
        } else if ctx.starts_with("_dice") {
            self.dice(ctx, out);
        } else if ctx.starts_with("_ping") {
            let latency = chrono::Utc::now().timestamp_millis() - ctx.event.sent_at;
            out.say(format!(":ping_pong: Pong! `{} ms`", latency.max(0)));
            self.stats.add(Stat::Ping);
        } else if ctx.starts_with("_decide") {
            self.decide(ctx, out);
        } else if ctx.starts_with("_8ball") {
            let answer = EIGHT_BALL.choose(&mut rand::thread_rng()).copied().unwrap_or_default();
            out.say(format!(":8ball: {}", answer));
        } else if ctx.starts_with("_quote") {
            let quote = QUOTES.choose(&mut rand::thread_rng()).copied().unwrap_or_default();
            let (text, author) = split_quote(quote);
            out.say(format!("{}\n- __{}__", text, author));
        } else if ctx.starts_with_any(&["_invite", "nano.invite"]) {
            out.say(format!("Invite me to your server: <{}>", INVITE_URL));
        } else if ctx.starts_with("_avatar") {
            self.avatar(ctx, out);
        } else if ctx.starts_with("_say") {
            self.say(ctx, out).await?;
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plugins::plugin_models::tests::{event, guild, member, sent, GUILD_ID};
    use crate::infra::store::InMemoryKvStore;

    async fn plugin() -> (Arc<ServerHandler>, CommonsPlugin) {
        let handler = Arc::new(ServerHandler::new(
            Arc::new(InMemoryKvStore::new()),
            0,
            "!",
        ));
        handler.server_setup(&guild().info).await.unwrap();
        let plugin = CommonsPlugin::new(handler.clone(), Arc::new(BotStats::new()), "0.3.0");
        (handler, plugin)
    }

    async fn run(plugin: &CommonsPlugin, event: &MessageEvent) -> (Flow, Outbox) {
        let ctx = PluginContext {
            event,
            prefix: "!",
            lang: "en",
        };
        let mut out = Outbox::new(event.channel_id);
        let flow = plugin.on_message(&ctx, &mut out).await.unwrap();
        (flow, out)
    }

    #[test]
    fn test_roll_dice() {
        let rolls = roll_dice("2d6 + 1d1").unwrap();
        assert_eq!(rolls.len(), 2);
        assert!((2..=12).contains(&rolls[0].total));
        assert_eq!(rolls[1].total, 1);

        assert_eq!(roll_dice("").unwrap()[0].expression, "1d6");
        assert!(roll_dice("101d6").is_none());
        assert!(roll_dice("1d0").is_none());
        assert!(roll_dice("abc").is_none());
    }

    #[test]
    fn test_roll_dice_rejects_huge_sides() {
        assert!(roll_dice("100d18446744073709551615").is_none());
        assert!(roll_dice("1d1000001").is_none());

        let rolls = roll_dice("100d1000000").unwrap();
        assert!((100..=100_000_000).contains(&rolls[0].total));
    }

    #[test]
    fn test_split_quote() {
        assert_eq!(
            split_quote("Eighty percent of success is showing up. –Woody Allen"),
            ("Eighty percent of success is showing up.", "Woody Allen")
        );
    }

    #[tokio::test]
    async fn test_custom_commands_match_exactly() {
        let (handler, plugin) = plugin().await;
        handler.set_command(GUILD_ID, "!rules", "Be nice").await.unwrap();

        let (flow, out) = run(&plugin, &event(member(3, "bob", &[]), "!rules")).await;
        assert_eq!(flow, Flow::Stop);
        assert_eq!(sent(&out), vec!["Be nice"]);

        let (_, out) = run(&plugin, &event(member(3, "bob", &[]), "!rules please")).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_hello_uses_mention() {
        let (_, plugin) = plugin().await;
        let mut message = event(member(3, "bob", &[]), "!hello");
        let (_, out) = run(&plugin, &message).await;
        assert_eq!(sent(&out), vec!["Hi <@3>"]);

        message.mentions.push(member(2, "alice", &[]));
        let (_, out) = run(&plugin, &message).await;
        assert_eq!(sent(&out), vec!["Hi <@2>"]);
    }

    #[tokio::test]
    async fn test_roll_rejects_non_numbers() {
        let (_, plugin) = plugin().await;
        let (_, out) = run(&plugin, &event(member(3, "bob", &[]), "!roll abc")).await;
        assert_eq!(sent(&out), vec!["Not a number."]);

        let (_, out) = run(&plugin, &event(member(3, "bob", &[]), "!roll 0")).await;
        assert_eq!(sent(&out), vec!["<@3> rolled **0**. **GG**"]);
    }

    #[tokio::test]
    async fn test_decide_single_option() {
        let (_, plugin) = plugin().await;
        let (_, out) = run(&plugin, &event(member(3, "bob", &[]), "!decide pizza")).await;
        assert_eq!(sent(&out), vec!["Guess what? It's **pizza**. **ba dum tss**"]);
    }

    #[tokio::test]
    async fn test_say_requires_mod_and_filters_everyone() {
        let (handler, plugin) = plugin().await;
        handler.set_log_channel(GUILD_ID, Some(101)).await.unwrap();

        let (_, out) = run(&plugin, &event(member(3, "bob", &[]), "!say hi")).await;
        assert_eq!(sent(&out), vec!["You are not permitted to use this command."]);

        let mut message = event(member(4, "carol", &["Nano Mod"]), "!say <#101> hello @everyone");
        message.channel_mentions.push(101);
        let (_, out) = run(&plugin, &message).await;

        assert_eq!(
            out.actions()[0],
            Action::Send {
                channel_id: 101,
                content: "hello ".to_string()
            }
        );
        assert!(matches!(out.actions()[1], Action::SendEmbed { channel_id: 101, .. }));
    }

    #[tokio::test]
    async fn test_avatar_by_name() {
        let (_, plugin) = plugin().await;
        let (_, out) = run(&plugin, &event(member(3, "bob", &[]), "!avatar alice")).await;
        assert_eq!(sent(&out), vec!["**alice**'s avatar: https://cdn.example/2.png"]);

        let (_, out) = run(&plugin, &event(member(3, "bob", &[]), "!avatar ghost")).await;
        assert_eq!(sent(&out), vec!["User not found."]);
    }
}
