// Background loops started once the bot is ready: reminder delivery,
// soft-ban expiry and the xkcd refresh.

use crate::core::lookups::{XkcdService, XKCD_REFRESH_INTERVAL};
use crate::core::reminders::{Reminder, ReminderService, ReminderTarget};
use crate::core::softbans::SoftBanScheduler;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Instant;

/// Text of a delivered reminder.
pub fn reminder_text(reminder: &Reminder) -> String {
    match reminder.target {
        ReminderTarget::Personal => format!(":alarm_clock: Reminder: {}", reminder.raw),
        ReminderTarget::Channel { .. } => format!(
            ":alarm_clock: Reminder from <@{}>: {}",
            reminder.author, reminder.raw
        ),
    }
}

async fn deliver(ctx: &serenity::Context, reminder: &Reminder) -> Result<(), serenity::Error> {
    let content = reminder_text(reminder);
    match reminder.target {
        ReminderTarget::Personal => {
            tracing::info!(user_id = reminder.receiver, "Dispatching personal reminder");
            serenity::UserId::new(reminder.receiver)
                .direct_message(ctx, serenity::CreateMessage::new().content(content))
                .await?;
        }
        ReminderTarget::Channel { channel_id, .. } => {
            tracing::info!(channel_id, author = reminder.author, "Dispatching channel reminder");
            serenity::ChannelId::new(channel_id)
                .send_message(
                    &ctx.http,
                    serenity::CreateMessage::new().content(content).allowed_mentions(
                        serenity::CreateAllowedMentions::new()
                            .users(vec![serenity::UserId::new(reminder.author)]),
                    ),
                )
                .await?;
        }
    }
    Ok(())
}

/// Deliver due reminders every tick. A reminder is dropped even when its
/// delivery fails.
pub fn spawn_reminders(ctx: serenity::Context, reminders: Arc<ReminderService>) {
    tokio::spawn(async move {
        let mut last = Instant::now();
        loop {
            last = ReminderService::tick(last).await;

            let due = match reminders.take_due(chrono::Utc::now().timestamp()).await {
                Ok(due) => due,
                Err(e) => {
                    tracing::error!("Failed to read reminders: {}", e);
                    continue;
                }
            };

            for reminder in &due {
                if let Err(e) = deliver(&ctx, reminder).await {
                    tracing::warn!(id = reminder.id, "Reminder could not be delivered: {}", e);
                }
            }
        }
    });
}

/// Lift soft bans once they run out.
pub fn spawn_softbans(ctx: serenity::Context, softbans: Arc<SoftBanScheduler>) {
    tokio::spawn(async move {
        let mut last = Instant::now();
        loop {
            last = SoftBanScheduler::tick(last).await;

            for ban in softbans.take_due(chrono::Utc::now().timestamp()) {
                let result = serenity::GuildId::new(ban.guild_id)
                    .unban(&ctx.http, serenity::UserId::new(ban.user_id))
                    .await;
                match result {
                    Ok(()) => tracing::info!(
                        guild_id = ban.guild_id,
                        user = %ban.user_name,
                        "Soft ban expired"
                    ),
                    Err(e) => tracing::warn!(
                        guild_id = ban.guild_id,
                        user_id = ban.user_id,
                        "Failed to lift soft ban: {}",
                        e
                    ),
                }
            }
        }
    });
}

/// Keep the latest xkcd number fresh for `random` and `latest` lookups.
pub fn spawn_xkcd_refresh(xkcd: Arc<XkcdService>) {
    tokio::spawn(async move {
        loop {
            match xkcd.refresh_latest().await {
                Ok(num) => tracing::debug!(num, "Refreshed latest xkcd"),
                Err(e) => tracing::warn!("Failed to refresh xkcd: {}", e),
            }
            tokio::time::sleep(XKCD_REFRESH_INTERVAL).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reminder(target: ReminderTarget) -> Reminder {
        Reminder {
            id: 123456789012,
            author: 7,
            receiver: 7,
            server: None,
            lang: "en".to_string(),
            time_created: 0,
            time_target: 60,
            raw: "feed the cat".to_string(),
            target,
        }
    }

    #[test]
    fn test_reminder_text() {
        assert_eq!(
            reminder_text(&reminder(ReminderTarget::Personal)),
            ":alarm_clock: Reminder: feed the cat"
        );
        assert_eq!(
            reminder_text(&reminder(ReminderTarget::Channel {
                channel_id: 100,
                guild_id: 10,
            })),
            ":alarm_clock: Reminder from <@7>: feed the cat"
        );
    }
}
