// Soft-ban scheduler.
//
// A soft ban is a normal ban plus a timer: once it runs out the poller unbans
// the member. Bans are kept in memory only, so a restart forgets pending
// unbans (the members stay banned).

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often the poller looks for expired bans.
pub const SOFTBAN_TICK: Duration = Duration::from_secs(1);

/// Soft bans must be longer than this many seconds.
pub const SOFTBAN_MIN_DURATION: u64 = 5;

/// Soft bans must be shorter than this many seconds.
pub const SOFTBAN_MAX_DURATION: u64 = 172_800;

#[derive(Debug, Error, PartialEq)]
pub enum SoftBanError {
    #[error("Soft bans must last between {} seconds and {} days", SOFTBAN_MIN_DURATION, SOFTBAN_MAX_DURATION / 86400)]
    InvalidRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoftBan {
    pub guild_id: u64,
    pub user_id: u64,
    pub user_name: String,
    pub time_target: i64,
}

pub struct SoftBanScheduler {
    bans: DashMap<(u64, u64), SoftBan>,
    /// Members banned through a command whose removal event has not arrived yet
    recent_bans: DashSet<(u64, u64)>,
}

impl SoftBanScheduler {
    pub fn new() -> Self {
        Self {
            bans: DashMap::new(),
            recent_bans: DashSet::new(),
        }
    }

    /// Check the duration of a soft ban before anything is banned.
    pub fn validate(seconds: u64) -> Result<(), SoftBanError> {
        if seconds > SOFTBAN_MIN_DURATION && seconds < SOFTBAN_MAX_DURATION {
            Ok(())
        } else {
            Err(SoftBanError::InvalidRange)
        }
    }

    pub fn set_softban(
        &self,
        guild_id: u64,
        user_id: u64,
        user_name: &str,
        seconds: u64,
    ) -> Result<SoftBan, SoftBanError> {
        Self::validate(seconds)?;

        let ban = SoftBan {
            guild_id,
            user_id,
            user_name: user_name.to_string(),
            time_target: Utc::now().timestamp() + seconds as i64,
        };
        self.bans.insert((guild_id, user_id), ban.clone());
        self.note_ban(guild_id, user_id);

        tracing::info!(guild_id, user_id, seconds, "Soft ban set");
        Ok(ban)
    }

    pub fn get_ban(&self, guild_id: u64, user_id: u64) -> Option<SoftBan> {
        self.bans.get(&(guild_id, user_id)).map(|b| b.clone())
    }

    pub fn remove_ban(&self, guild_id: u64, user_id: u64) -> Option<SoftBan> {
        self.bans.remove(&(guild_id, user_id)).map(|(_, ban)| ban)
    }

    pub fn len(&self) -> usize {
        self.bans.len()
    }

    /// Remove and return every ban that has run out.
    pub fn take_due(&self, now: i64) -> Vec<SoftBan> {
        let due: Vec<(u64, u64)> = self
            .bans
            .iter()
            .filter(|entry| entry.time_target <= now)
            .map(|entry| *entry.key())
            .collect();

        due.into_iter()
            .filter_map(|key| self.bans.remove(&key).map(|(_, ban)| ban))
            .collect()
    }

    /// Remember a ban so the following member-removal event stays quiet.
    pub fn note_ban(&self, guild_id: u64, user_id: u64) {
        self.recent_bans.insert((guild_id, user_id));
    }

    /// True (once) when the member was just banned by the bot.
    pub fn take_ban_note(&self, guild_id: u64, user_id: u64) -> bool {
        self.recent_bans.remove(&(guild_id, user_id)).is_some()
    }

    pub async fn tick(last: Instant) -> Instant {
        let elapsed = last.elapsed();
        if elapsed < SOFTBAN_TICK {
            tokio::time::sleep(SOFTBAN_TICK - elapsed).await;
        }
        Instant::now()
    }
}

impl Default for SoftBanScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_exclusive() {
        assert_eq!(SoftBanScheduler::validate(5), Err(SoftBanError::InvalidRange));
        assert!(SoftBanScheduler::validate(6).is_ok());
        assert!(SoftBanScheduler::validate(172_799).is_ok());
        assert_eq!(
            SoftBanScheduler::validate(172_800),
            Err(SoftBanError::InvalidRange)
        );
    }

    #[test]
    fn test_invalid_softban_is_not_stored() {
        let scheduler = SoftBanScheduler::new();
        assert!(scheduler.set_softban(1, 2, "bob", 1).is_err());
        assert_eq!(scheduler.len(), 0);
        assert!(!scheduler.take_ban_note(1, 2));
    }

    #[test]
    fn test_take_due() {
        let scheduler = SoftBanScheduler::new();
        let short = scheduler.set_softban(1, 2, "bob", 10).unwrap();
        scheduler.set_softban(1, 3, "alice", 1000).unwrap();

        assert!(scheduler.take_due(short.time_target - 1).is_empty());

        let due = scheduler.take_due(short.time_target);
        assert_eq!(due, vec![short]);
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.get_ban(1, 3).is_some());
    }

    #[test]
    fn test_ban_notes_are_consumed_once() {
        let scheduler = SoftBanScheduler::new();
        scheduler.note_ban(1, 2);

        assert!(scheduler.take_ban_note(1, 2));
        assert!(!scheduler.take_ban_note(1, 2));
    }

    #[test]
    fn test_remove_ban() {
        let scheduler = SoftBanScheduler::new();
        scheduler.set_softban(4, 5, "carl", 60).unwrap();

        assert_eq!(scheduler.remove_ban(4, 5).map(|b| b.user_name), Some("carl".to_string()));
        assert!(scheduler.get_ban(4, 5).is_none());
    }
}
