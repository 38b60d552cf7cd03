// Reminder service - creating, listing and expiring reminders.
//
// Reminders live in the `reminder` plugin namespace as one hash per
// reminder: `reminder:<author>:<id>`.

use super::reminder_models::*;
use crate::core::store::{PluginDataManager, StoreError};
use crate::core::util::gen_id;
use chrono::Utc;
use std::time::Instant;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("You can only have {} reminders at once", REMINDER_LIMIT)]
    LimitExceeded,

    #[error("Reminders must be between {} seconds and {} days", REM_MIN_DURATION, REM_MAX_DURATION / 86400)]
    InvalidRange,

    #[error("Reminder text can be at most {} characters", REM_MAX_CONTENT)]
    ContentTooLong,

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ReminderService {
    data: PluginDataManager,
}

impl ReminderService {
    pub fn new(data: PluginDataManager) -> Self {
        Self { data }
    }

    /// `<author>:<id>` -> (author, id) from a full `reminder:<author>:<id>` key.
    fn parse_key(key: &str) -> Option<(u64, u64)> {
        let mut parts = key.rsplitn(3, ':');
        let id = parts.next()?.parse().ok()?;
        let author = parts.next()?.parse().ok()?;
        Some((author, id))
    }

    async fn load_keys(&self, keys: Vec<String>) -> Result<Vec<Reminder>, StoreError> {
        let mut reminders = Vec::with_capacity(keys.len());
        for key in keys {
            let Some((_, id)) = Self::parse_key(&key) else {
                tracing::warn!(key = %key, "Skipping reminder with malformed key");
                continue;
            };

            let fields = self.data.hgetall_raw(&key).await?;
            match Reminder::from_fields(id, &fields) {
                Some(reminder) => reminders.push(reminder),
                None => tracing::warn!(key = %key, "Skipping broken reminder record"),
            }
        }
        reminders.sort_by_key(|r| r.time_target);
        Ok(reminders)
    }

    pub async fn get_reminders(&self, user_id: u64) -> Result<Vec<Reminder>, StoreError> {
        let keys = self.data.scan(&format!("{}:*", user_id), true).await?;
        self.load_keys(keys).await
    }

    pub async fn get_all_reminders(&self) -> Result<Vec<Reminder>, StoreError> {
        let keys = self.data.scan("*", true).await?;
        self.load_keys(keys).await
    }

    pub async fn get_reminder_amount(&self) -> Result<usize, StoreError> {
        Ok(self.data.scan("*", true).await?.len())
    }

    /// Validate and store a new reminder. Returns its id.
    pub async fn set_reminder(
        &self,
        target: ReminderTarget,
        author: u64,
        content: &str,
        seconds: u64,
        lang: &str,
    ) -> Result<u64, ReminderError> {
        if self.get_reminders(author).await?.len() >= REMINDER_LIMIT {
            return Err(ReminderError::LimitExceeded);
        }
        if !(REM_MIN_DURATION..REM_MAX_DURATION).contains(&seconds) {
            return Err(ReminderError::InvalidRange);
        }
        if content.chars().count() > REM_MAX_CONTENT {
            return Err(ReminderError::ContentTooLong);
        }

        let now = Utc::now().timestamp();
        let receiver = match target {
            ReminderTarget::Personal => author,
            ReminderTarget::Channel { channel_id, .. } => channel_id,
        };

        let reminder = Reminder {
            id: gen_id(REMINDER_ID_DIGITS),
            author,
            receiver,
            server: match target {
                ReminderTarget::Channel { guild_id, .. } => Some(guild_id),
                ReminderTarget::Personal => None,
            },
            lang: lang.to_string(),
            time_created: now,
            time_target: now + seconds as i64,
            raw: content.to_string(),
            target,
        };

        self.data
            .hmset(&format!("{}:{}", author, reminder.id), &reminder.to_fields())
            .await?;

        tracing::info!(author, id = reminder.id, "New reminder");
        Ok(reminder.id)
    }

    pub async fn find_id_from_content(
        &self,
        user_id: u64,
        content: &str,
    ) -> Result<Option<u64>, StoreError> {
        Ok(self
            .get_reminders(user_id)
            .await?
            .into_iter()
            .find(|r| r.raw == content)
            .map(|r| r.id))
    }

    pub async fn remove_reminder(&self, user_id: u64, id: u64) -> Result<bool, StoreError> {
        self.data.delete(&format!("{}:{}", user_id, id)).await
    }

    /// Remove every reminder of a user. Returns how many were removed.
    pub async fn remove_all_reminders(&self, user_id: u64) -> Result<usize, StoreError> {
        let keys = self.data.scan(&format!("{}:*", user_id), true).await?;
        let mut removed = 0;
        for key in keys {
            if self.data.delete_raw(&key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove and return every reminder whose target time has passed.
    pub async fn take_due(&self, now: i64) -> Result<Vec<Reminder>, StoreError> {
        let due: Vec<Reminder> = self
            .get_all_reminders()
            .await?
            .into_iter()
            .filter(|r| r.is_due(now))
            .collect();

        for reminder in &due {
            self.remove_reminder(reminder.author, reminder.id).await?;
        }
        Ok(due)
    }

    /// Self-correcting tick: sleeps for what is left of the tick, or returns
    /// right away when the previous pass took longer than a tick.
    pub async fn tick(last: Instant) -> Instant {
        let elapsed = last.elapsed();
        if elapsed < TICK_DURATION {
            tokio::time::sleep(TICK_DURATION - elapsed).await;
        }
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::KvStore;
    use crate::infra::store::InMemoryKvStore;
    use std::sync::Arc;

    fn service() -> (Arc<InMemoryKvStore>, ReminderService) {
        let store = Arc::new(InMemoryKvStore::new());
        let data = PluginDataManager::new(store.clone(), "reminder");
        (store, ReminderService::new(data))
    }

    #[tokio::test]
    async fn test_set_and_list() {
        let (store, service) = service();

        let id = service
            .set_reminder(ReminderTarget::Personal, 42, "drink water", 60, "en")
            .await
            .unwrap();
        assert_eq!(id.to_string().len(), 12);
        assert!(store.exists(&format!("reminder:42:{}", id)).await.unwrap());

        let reminders = service.get_reminders(42).await.unwrap();
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].raw, "drink water");
        assert_eq!(reminders[0].receiver, 42);
        assert_eq!(reminders[0].time_target - reminders[0].time_created, 60);

        assert!(service.get_reminders(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_channel_reminder() {
        let (_store, service) = service();
        let target = ReminderTarget::Channel {
            channel_id: 77,
            guild_id: 5,
        };

        service.set_reminder(target, 1, "standup", 300, "en").await.unwrap();

        let reminders = service.get_all_reminders().await.unwrap();
        assert_eq!(reminders[0].target, target);
        assert_eq!(reminders[0].server, Some(5));
    }

    #[tokio::test]
    async fn test_validation() {
        let (_store, service) = service();

        assert!(matches!(
            service
                .set_reminder(ReminderTarget::Personal, 1, "x", 4, "en")
                .await,
            Err(ReminderError::InvalidRange)
        ));
        assert!(matches!(
            service
                .set_reminder(ReminderTarget::Personal, 1, "x", REM_MAX_DURATION, "en")
                .await,
            Err(ReminderError::InvalidRange)
        ));
        assert!(service
            .set_reminder(ReminderTarget::Personal, 1, "x", REM_MIN_DURATION, "en")
            .await
            .is_ok());

        let long = "a".repeat(REM_MAX_CONTENT + 1);
        assert!(matches!(
            service
                .set_reminder(ReminderTarget::Personal, 1, &long, 60, "en")
                .await,
            Err(ReminderError::ContentTooLong)
        ));
    }

    #[tokio::test]
    async fn test_limit() {
        let (_store, service) = service();

        for i in 0..REMINDER_LIMIT {
            service
                .set_reminder(ReminderTarget::Personal, 9, &format!("r{}", i), 60, "en")
                .await
                .unwrap();
        }

        assert!(matches!(
            service
                .set_reminder(ReminderTarget::Personal, 9, "one more", 60, "en")
                .await,
            Err(ReminderError::LimitExceeded)
        ));
        // Other users are unaffected
        assert!(service
            .set_reminder(ReminderTarget::Personal, 10, "mine", 60, "en")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_remove_by_content_and_all() {
        let (_store, service) = service();

        service
            .set_reminder(ReminderTarget::Personal, 3, "first", 60, "en")
            .await
            .unwrap();
        service
            .set_reminder(ReminderTarget::Personal, 3, "second", 60, "en")
            .await
            .unwrap();
        service
            .set_reminder(ReminderTarget::Personal, 4, "other", 60, "en")
            .await
            .unwrap();

        let id = service.find_id_from_content(3, "first").await.unwrap().unwrap();
        assert!(service.remove_reminder(3, id).await.unwrap());
        assert_eq!(service.find_id_from_content(3, "first").await.unwrap(), None);

        assert_eq!(service.remove_all_reminders(3).await.unwrap(), 1);
        assert!(service.get_reminders(3).await.unwrap().is_empty());
        assert_eq!(service.get_reminder_amount().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_take_due() {
        let (_store, service) = service();

        service
            .set_reminder(ReminderTarget::Personal, 1, "soon", 10, "en")
            .await
            .unwrap();
        service
            .set_reminder(ReminderTarget::Personal, 1, "later", 1000, "en")
            .await
            .unwrap();

        let now = Utc::now().timestamp();
        assert!(service.take_due(now).await.unwrap().is_empty());

        let due = service.take_due(now + 20).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].raw, "soon");

        // Taken reminders are gone
        assert!(service.take_due(now + 20).await.unwrap().is_empty());
        assert_eq!(service.get_reminder_amount().await.unwrap(), 1);
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(
            ReminderService::parse_key("reminder:42:123456789012"),
            Some((42, 123456789012))
        );
        assert_eq!(ReminderService::parse_key("reminder:bad"), None);
    }
}
