// Reminder domain models.

use std::collections::HashMap;
use std::time::Duration;

/// How often the poller looks for due reminders.
pub const TICK_DURATION: Duration = Duration::from_secs(15);

/// Shortest allowed reminder, in seconds (inclusive).
pub const REM_MIN_DURATION: u64 = 5;

/// Longest allowed reminder, in seconds (exclusive).
pub const REM_MAX_DURATION: u64 = 172_800;

pub const REM_MAX_CONTENT: usize = 800;

/// How many reminders one user may hold at once.
pub const REMINDER_LIMIT: usize = 3;

pub const REMINDER_ID_DIGITS: u32 = 12;

const TYPE_PERSONAL: &str = "personal";
const TYPE_CHANNEL: &str = "channel";

/// Where a reminder is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderTarget {
    /// Direct message to the author
    Personal,
    /// Posted in a guild channel
    Channel { channel_id: u64, guild_id: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: u64,
    pub author: u64,
    /// User id for personal reminders, channel id otherwise
    pub receiver: u64,
    pub server: Option<u64>,
    pub lang: String,
    pub time_created: i64,
    pub time_target: i64,
    pub raw: String,
    pub target: ReminderTarget,
}

impl Reminder {
    pub fn is_due(&self, now: i64) -> bool {
        self.time_target <= now
    }

    /// Seconds left, or `None` when the reminder is already due.
    pub fn remaining(&self, now: i64) -> Option<u64> {
        let left = self.time_target - now;
        (left > 0).then_some(left as u64)
    }

    pub fn to_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        fields.insert("receiver".to_string(), self.receiver.to_string());
        fields.insert("author".to_string(), self.author.to_string());
        fields.insert("lang".to_string(), self.lang.clone());
        fields.insert("time_created".to_string(), self.time_created.to_string());
        fields.insert("time_target".to_string(), self.time_target.to_string());
        fields.insert("raw".to_string(), self.raw.clone());

        let kind = match self.target {
            ReminderTarget::Personal => TYPE_PERSONAL,
            ReminderTarget::Channel { guild_id, .. } => {
                fields.insert("server".to_string(), guild_id.to_string());
                TYPE_CHANNEL
            }
        };
        fields.insert("type".to_string(), kind.to_string());
        fields
    }

    /// Rebuild a reminder from its stored hash. Returns `None` for broken records.
    pub fn from_fields(id: u64, fields: &HashMap<String, String>) -> Option<Self> {
        let number = |name: &str| fields.get(name)?.parse::<i64>().ok();
        let id_field = |name: &str| fields.get(name)?.parse::<u64>().ok();

        let receiver = id_field("receiver")?;
        let server = id_field("server");

        let target = match fields.get("type").map(String::as_str) {
            Some(TYPE_CHANNEL) => ReminderTarget::Channel {
                channel_id: receiver,
                guild_id: server?,
            },
            _ => ReminderTarget::Personal,
        };

        Some(Self {
            id,
            author: id_field("author")?,
            receiver,
            server,
            lang: fields.get("lang").cloned().unwrap_or_else(|| "en".to_string()),
            time_created: number("time_created")?,
            time_target: number("time_target")?,
            raw: fields.get("raw").cloned().unwrap_or_default(),
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_roundtrip_channel() {
        let reminder = Reminder {
            id: 123456789012,
            author: 1,
            receiver: 50,
            server: Some(9),
            lang: "en".to_string(),
            time_created: 1000,
            time_target: 1060,
            raw: "stand up".to_string(),
            target: ReminderTarget::Channel {
                channel_id: 50,
                guild_id: 9,
            },
        };

        let fields = reminder.to_fields();
        assert_eq!(fields.get("type").map(String::as_str), Some("channel"));
        assert_eq!(Reminder::from_fields(reminder.id, &fields), Some(reminder));
    }

    #[test]
    fn test_broken_record_is_skipped() {
        let mut fields = HashMap::new();
        fields.insert("raw".to_string(), "no times".to_string());
        assert_eq!(Reminder::from_fields(1, &fields), None);
    }

    #[test]
    fn test_remaining() {
        let mut fields = HashMap::new();
        for (k, v) in [
            ("receiver", "1"),
            ("author", "1"),
            ("time_created", "0"),
            ("time_target", "100"),
            ("type", "personal"),
        ] {
            fields.insert(k.to_string(), v.to_string());
        }
        let reminder = Reminder::from_fields(7, &fields).unwrap();

        assert_eq!(reminder.remaining(40), Some(60));
        assert_eq!(reminder.remaining(100), None);
        assert!(reminder.is_due(100));
        assert_eq!(reminder.target, ReminderTarget::Personal);
    }
}
