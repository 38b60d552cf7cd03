// Bot presence: a shuffled list of "playing" statuses, rotated every hour.

use poise::serenity_prelude as serenity;
use rand::seq::SliceRandom;
use std::time::Duration;

pub const PRESENCE_INTERVAL: Duration = Duration::from_secs(60 * 60);

const STATUSES: &[&str] = &[
    "HI MOM!",
    "@Nano",
    "fun games",
    "with serenity",
    "with Discord",
    "with Rust",
    "get a 'nano.invite'",
    "type !help",
];

/// Every status once, in random order.
pub fn shuffled_statuses() -> Vec<&'static str> {
    let mut statuses = STATUSES.to_vec();
    statuses.shuffle(&mut rand::thread_rng());
    statuses
}

pub fn set_status(ctx: &serenity::Context, status: &str) {
    let activity = serenity::ActivityData::playing(status);
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

/// Walk through the shuffled list forever, reshuffling after each round.
pub fn spawn_rotation(ctx: serenity::Context) {
    tokio::spawn(async move {
        loop {
            for status in shuffled_statuses() {
                tracing::debug!(status, "Changing presence");
                set_status(&ctx, status);
                tokio::time::sleep(PRESENCE_INTERVAL).await;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shuffle_keeps_every_status() {
        let mut shuffled = shuffled_statuses();
        shuffled.sort();
        let mut expected = STATUSES.to_vec();
        expected.sort();
        assert_eq!(shuffled, expected);
    }
}
