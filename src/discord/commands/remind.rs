// Slash command for reminders. Same rules as `!remind me in` / `!remind here in`;
// delivery is done by the reminder poller.

use crate::core::reminders::{ReminderError, ReminderTarget};
use crate::core::store::DEFAULT_LANG;
use crate::core::util::{convert_to_seconds, resolve_time, TimeParseError};
use crate::discord::{Context, Error};

/// Set a reminder. The bot reminds you in a DM, or in this channel with `here`.
///
/// **Examples:**
/// - `/remind time:"30min" message:"Take a break"`
/// - `/remind time:"1h 30min" message:"Check the oven" here:true`
#[poise::command(slash_command)]
pub async fn remind(
    ctx: Context<'_>,
    #[description = "When to remind you (e.g. '90', '5min', '2 hours', '1 day 3h')"] time: String,
    #[description = "What to remind you about"] message: String,
    #[description = "Remind everybody in this channel instead of a DM"] here: Option<bool>,
) -> Result<(), Error> {
    let seconds = match convert_to_seconds(&time) {
        Ok(seconds) => seconds,
        Err(TimeParseError::Brackets) => {
            ctx.say("Don't use brackets in the time, just write `1h 32min`.")
                .await?;
            return Ok(());
        }
        Err(_) => {
            ctx.say(
                "Invalid time format. Use formats like:\n\
                - `30` (seconds)\n\
                - `5min` or `5 minutes`\n\
                - `2h 30min`\n\
                - `1 day`",
            )
            .await?;
            return Ok(());
        }
    };

    let target = if here.unwrap_or(false) {
        let Some(guild_id) = ctx.guild_id() else {
            ctx.say("Channel reminders only work in servers.").await?;
            return Ok(());
        };
        ReminderTarget::Channel {
            channel_id: ctx.channel_id().get(),
            guild_id: guild_id.get(),
        }
    } else {
        ReminderTarget::Personal
    };

    let lang = match ctx.guild_id() {
        Some(guild_id) => ctx.data().handler.get_lang(guild_id.get()).await?,
        None => DEFAULT_LANG.to_string(),
    };

    match ctx
        .data()
        .reminders
        .set_reminder(target, ctx.author().id.get(), message.trim(), seconds, &lang)
        .await
    {
        Ok(_) => {
            ctx.say(format!(
                "Reminder set :ok_hand: (in {})",
                resolve_time(seconds)
            ))
            .await?;
        }
        Err(ReminderError::Store(e)) => return Err(e.into()),
        Err(e) => {
            ctx.say(format!("{}.", e)).await?;
        }
    }

    Ok(())
}
