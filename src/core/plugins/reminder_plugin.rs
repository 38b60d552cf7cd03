// Reminder commands. Delivery happens in the Discord layer's poller.

use super::plugin_models::*;
use crate::core::reminders::{ReminderError, ReminderService, ReminderTarget, REM_MAX_CONTENT};
use crate::core::stats::{BotStats, Stat};
use crate::core::util::{at_everyone_filter, convert_to_seconds, resolve_time, TimeParseError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

static COMMANDS: &[CommandSpec] = &[
    CommandSpec::new(
        "_remind",
        "General module for timers\nSubcommands: remind me in, remind here in, remind list, remind remove",
    ),
    CommandSpec::new("_remind me in", "Adds a reminder (reminds you in dm)")
        .usage("[command] [time (ex: 3h 5min)] : [message]"),
    CommandSpec::new("_remind here in", "Adds a reminder (reminds everybody in current channel)")
        .usage("[command] [time (ex: 3h 5min)] : [message]"),
    CommandSpec::new("_remind list", "Displays all ongoing timers.").alias("_reminder list"),
    CommandSpec::new("_reminder list", "Displays all ongoing timers.").alias("_remind list"),
    CommandSpec::new(
        "_remind remove",
        "Removes a timer with supplied description (or all timers with 'all')",
    )
    .usage("[command] [timer description or all]"),
    CommandSpec::new("_remind help", "Shows how reminders work."),
];

const REMINDER_HELP: &str = "**Reminder help**\n\
`_remind me in [time]: [text]` - reminds you in a direct message\n\
`_remind here in [time]: [text]` - reminds everybody in this channel\n\
`_remind list` - lists your reminders\n\
`_remind remove [text or all]` - removes reminders\n\
Time examples: `90`, `5min`, `3h 5min`, `1 day 2 hours`. You can also write `[time] to [text]`.";

#[derive(Debug, PartialEq)]
enum ParamError {
    WrongUsage,
    Time(TimeParseError),
    TooLong,
}

/// Split `5min: tea` or `5min to tea` into seconds and text.
fn parse_parameters(raw: &str) -> Result<(u64, String), ParamError> {
    let (time, text) = raw
        .split_once(':')
        .or_else(|| raw.split_once(" to "))
        .ok_or(ParamError::WrongUsage)?;

    let text = text.trim();
    if text.is_empty() {
        return Err(ParamError::WrongUsage);
    }
    if text.chars().count() > REM_MAX_CONTENT {
        return Err(ParamError::TooLong);
    }

    let seconds = convert_to_seconds(time).map_err(ParamError::Time)?;
    Ok((seconds, text.to_string()))
}

pub struct ReminderPlugin {
    reminders: Arc<ReminderService>,
    stats: Arc<BotStats>,
}

impl ReminderPlugin {
    pub fn new(reminders: Arc<ReminderService>, stats: Arc<BotStats>) -> Self {
        Self { reminders, stats }
    }

    async fn create(
        &self,
        ctx: &PluginContext<'_>,
        out: &mut Outbox,
        trigger: &str,
        target: ReminderTarget,
    ) -> Result<(), PluginError> {
        let (seconds, text) = match parse_parameters(ctx.args(trigger)) {
            Ok(parsed) => parsed,
            Err(e) => {
                out.say(match e {
                    ParamError::WrongUsage => format!(
                        "Wrong usage, try `{}: text`.",
                        expand_trigger(trigger, ctx.prefix)
                    ),
                    ParamError::Time(TimeParseError::Brackets) => {
                        "Don't use brackets in the time, just write `1h 32min`.".to_string()
                    }
                    ParamError::Time(_) => {
                        "Invalid time format, use something like `3h 5min`.".to_string()
                    }
                    ParamError::TooLong => format!(
                        "Reminder text is too long (max {} characters).",
                        REM_MAX_CONTENT
                    ),
                });
                self.stats.add(Stat::WrongArg);
                return Ok(());
            }
        };

        match self
            .reminders
            .set_reminder(target, ctx.author().id, &text, seconds, ctx.lang)
            .await
        {
            Ok(_) => out.say(format!(
                "Reminder set :ok_hand: (in {})",
                resolve_time(seconds)
            )),
            Err(ReminderError::Store(e)) => return Err(e.into()),
            Err(e) => out.say(format!("{}.", e)),
        }
        Ok(())
    }

    async fn list(&self, ctx: &PluginContext<'_>, out: &mut Outbox) -> Result<(), PluginError> {
        let reminders = self.reminders.get_reminders(ctx.author().id).await?;
        if reminders.is_empty() {
            out.say("You don't have any reminders.");
            return Ok(());
        }

        let now = Utc::now().timestamp();
        let entries: Vec<String> = reminders
            .iter()
            .map(|r| {
                let when = r
                    .remaining(now)
                    .map(resolve_time)
                    .unwrap_or_else(|| "soon".to_string());
                let text = at_everyone_filter(&r.raw, ctx.event.author_can_mention_everyone);
                format!("➤ {}\n   in **{}**", text, when)
            })
            .collect();

        out.say(format!("Your reminders:\n{}", entries.join("\n\n")));
        Ok(())
    }

    async fn remove(&self, ctx: &PluginContext<'_>, out: &mut Outbox) -> Result<(), PluginError> {
        let user_id = ctx.author().id;
        let query = ctx.args("_remind remove");
        if query.is_empty() {
            out.say("Invalid command arguments.");
            self.stats.add(Stat::WrongArg);
            return Ok(());
        }

        if query == "all" {
            let removed = self.reminders.remove_all_reminders(user_id).await?;
            out.say(format!("Removed all your reminders ({}).", removed));
            return Ok(());
        }

        match self.reminders.find_id_from_content(user_id, query).await? {
            Some(id) => {
                self.reminders.remove_reminder(user_id, id).await?;
                out.say("Reminder removed.");
            }
            None => out.say("No reminder with such content."),
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for ReminderPlugin {
    fn name(&self) -> &'static str {
        "reminder"
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

        if ctx.starts_with("_remind me in") {
            self.create(ctx, out, "_remind me in", ReminderTarget::Personal)
                .await?;
        } else if ctx.starts_with("_remind here in") {
            let target = ReminderTarget::Channel {
                channel_id: ctx.channel_id(),
                guild_id: ctx.guild()?.id(),
            };
            self.create(ctx, out, "_remind here in", target).await?;
        } else if ctx.starts_with_any(&["_remind list", "_reminder list"]) {
            self.list(ctx, out).await?;
        } else if ctx.starts_with("_remind remove") {
            self.remove(ctx, out).await?;
        } else if ctx.starts_with("_remind") {
            out.say(REMINDER_HELP.replace('_', ctx.prefix));
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plugins::plugin_models::tests::{event, member, sent};
    use crate::core::store::PluginDataManager;
    use crate::infra::store::InMemoryKvStore;

    fn plugin() -> (Arc<ReminderService>, ReminderPlugin) {
        let data = PluginDataManager::new(Arc::new(InMemoryKvStore::new()), "reminder");
        let service = Arc::new(ReminderService::new(data));
        let plugin = ReminderPlugin::new(service.clone(), Arc::new(BotStats::new()));
        (service, plugin)
    }

    async fn run(plugin: &ReminderPlugin, content: &str) -> Outbox {
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

    #[test]
    fn test_parse_parameters() {
        assert_eq!(parse_parameters("5min: tea"), Ok((300, "tea".to_string())));
        assert_eq!(
            parse_parameters("1h to call mom"),
            Ok((3600, "call mom".to_string()))
        );
        assert_eq!(parse_parameters("5min tea"), Err(ParamError::WrongUsage));
        assert_eq!(
            parse_parameters("[5min]: tea"),
            Err(ParamError::Time(TimeParseError::Brackets))
        );
        let long = format!("10: {}", "a".repeat(REM_MAX_CONTENT + 1));
        assert_eq!(parse_parameters(&long), Err(ParamError::TooLong));
    }

    #[tokio::test]
    async fn test_remind_me_and_list() {
        let (service, plugin) = plugin();

        let out = run(&plugin, "!remind me in 2 hours: stretch").await;
        assert_eq!(sent(&out), vec!["Reminder set :ok_hand: (in 2 hours)"]);

        let stored = service.get_reminders(3).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].target, ReminderTarget::Personal);

        let out = run(&plugin, "!reminder list").await;
        assert!(sent(&out)[0].contains("stretch"));
    }

    #[tokio::test]
    async fn test_remind_here_targets_channel() {
        let (service, plugin) = plugin();
        run(&plugin, "!remind here in 60 to standup").await;

        let stored = service.get_reminders(3).await.unwrap();
        assert_eq!(
            stored[0].target,
            ReminderTarget::Channel {
                channel_id: 100,
                guild_id: 10
            }
        );
    }

    #[tokio::test]
    async fn test_out_of_range_is_reported() {
        let (service, plugin) = plugin();
        let out = run(&plugin, "!remind me in 2: too soon").await;

        assert!(sent(&out)[0].starts_with("Reminders must be between"));
        assert_eq!(service.get_reminder_amount().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_by_content_and_all() {
        let (service, plugin) = plugin();
        run(&plugin, "!remind me in 60: one").await;
        run(&plugin, "!remind me in 60: two").await;

        let out = run(&plugin, "!remind remove one").await;
        assert_eq!(sent(&out), vec!["Reminder removed."]);

        let out = run(&plugin, "!remind remove all").await;
        assert_eq!(sent(&out), vec!["Removed all your reminders (1)."]);
        assert_eq!(service.get_reminder_amount().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bare_remind_shows_help() {
        let (_, plugin) = plugin();
        let out = run(&plugin, "!remind").await;
        assert!(sent(&out)[0].starts_with("**Reminder help**"));
    }
}
