// Help plugin - general help, per-command help and the command list.

use super::plugin_models::*;
use super::plugin_router::CommandCatalog;
use crate::core::stats::{BotStats, Stat};
use async_trait::async_trait;
use std::sync::Arc;

static COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("_help", "Shows general help, or help for a command.")
        .usage("[command] (simple or command name)"),
    CommandSpec::new("_cmds", "Lists every command.").alias("_commands"),
    CommandSpec::new("_commands", "Lists every command.").alias("_cmds"),
];

const HELP_GENERAL: &str = "**Hey, I'm Nano!**\n\n\
To get familiar with simple commands, type `_help simple`.\n\
If you want specific info about a command, do `_help command`.\n\
For a list of every command, use `_cmds`.";

const HELP_SIMPLE: &str = "`_hello` - Welcomes you or the mentioned person.\n\
`_roll number` - rolls a random number\n\
`_dice 2d6` - rolls the dice\n\
`_wiki term` - gives you a description of a term from Wikipedia\n\
`_decide option|option...` - decides between your options so you don't have to\n\
`_remind me in 1h: text` - reminds you of something\n\
`_xkcd` - the latest xkcd comic\n\n\
These are just a few of the simpler commands. For more info about each command, use `_help command` or type `_cmds`.";

/// Render the help text of one command with the guild prefix filled in.
pub fn render_command_help(spec: &CommandSpec, prefix: &str) -> String {
    let mut text = format!(
        "**{}**\n{}",
        expand_trigger(spec.trigger, prefix),
        spec.description
    );
    if let Some(usage) = spec.usage {
        let usage = usage.replace("[command]", &expand_trigger(spec.trigger, prefix));
        text.push_str(&format!("\nUse: `{}`", usage));
    }
    if let Some(alias) = spec.alias {
        text.push_str(&format!("\nAlias: `{}`", expand_trigger(alias, prefix)));
    }
    text
}

pub struct HelpPlugin {
    catalog: Arc<CommandCatalog>,
    stats: Arc<BotStats>,
}

impl HelpPlugin {
    pub fn new(catalog: Arc<CommandCatalog>, stats: Arc<BotStats>) -> Self {
        Self { catalog, stats }
    }

    pub fn commands_table() -> &'static [CommandSpec] {
        COMMANDS
    }

    fn command_list(&self, prefix: &str) -> String {
        let groups: Vec<String> = self
            .catalog
            .groups()
            .iter()
            .filter(|(_, specs)| !specs.is_empty())
            .map(|(name, specs)| {
                let triggers: Vec<String> = specs
                    .iter()
                    .map(|s| format!("`{}`", expand_trigger(s.trigger, prefix)))
                    .collect();
                format!("**{}**\n{}", name, triggers.join(", "))
            })
            .collect();
        groups.join("\n\n")
    }
}

#[async_trait]
impl Plugin for HelpPlugin {
    fn name(&self) -> &'static str {
        "help"
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

        if ctx.starts_with("_help") {
            self.stats.add(Stat::Help);
            match ctx.args("_help") {
                "" => out.say(HELP_GENERAL.replace('_', ctx.prefix)),
                "simple" => out.say(HELP_SIMPLE.replace('_', ctx.prefix)),
                query => match self.catalog.find(query, ctx.prefix) {
                    Some(spec) => out.say(render_command_help(spec, ctx.prefix)),
                    None => {
                        out.say("That command does not exist.");
                        self.stats.add(Stat::WrongArg);
                    }
                },
            }
        } else if ctx.starts_with_any(&["_cmds", "_commands"]) {
            out.say(format!("**All commands**\n\n{}", self.command_list(ctx.prefix)));
        }

        Ok(Flow::Continue)
    }
}
