// Server domain models - typed views over the flat `server:<id>` hash.

use std::collections::HashMap;

/// Longest trigger a custom command may have.
pub const MAX_TRIGGER_LENGTH: usize = 80;

pub const ADMIN_ROLE: &str = "Nano Admin";
pub const MOD_ROLE: &str = "Nano Mod";

// Field names inside `server:<id>`
pub const FIELD_NAME: &str = "name";
pub const FIELD_OWNER: &str = "owner";
pub const FIELD_SLEEPING: &str = "sleeping";
pub const FIELD_WELCOME_MSG: &str = "welcomemsg";
pub const FIELD_KICK_MSG: &str = "kickmsg";
pub const FIELD_BAN_MSG: &str = "banmsg";
pub const FIELD_LEAVE_MSG: &str = "leavemsg";
pub const FIELD_LOG_CHANNEL: &str = "logchannel";
pub const FIELD_PREFIX: &str = "prefix";
pub const FIELD_DEFAULT_CHANNEL: &str = "dchan";
pub const FIELD_LANG: &str = "lang";

pub const DEFAULT_WELCOME_MSG: &str = "Welcome to :server, :user!";
pub const DEFAULT_KICK_MSG: &str = "**:user** has been kicked.";
pub const DEFAULT_BAN_MSG: &str = "**:user** has been banned.";
pub const DEFAULT_LEAVE_MSG: &str = "**:user** has left the server :cry:";
pub const DEFAULT_LANG: &str = "en";

/// The bits of a guild the store cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct GuildInfo {
    pub id: u64,
    pub name: String,
    pub owner_id: u64,
}

/// Moderation toggles stored in the server hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModSetting {
    WordFilter,
    SpamFilter,
    InviteFilter,
}

impl ModSetting {
    pub const ALL: [ModSetting; 3] = [
        ModSetting::WordFilter,
        ModSetting::SpamFilter,
        ModSetting::InviteFilter,
    ];

    /// Field name inside `server:<id>`.
    pub fn field(&self) -> &'static str {
        match self {
            ModSetting::WordFilter => "wordfilter",
            ModSetting::SpamFilter => "spamfilter",
            ModSetting::InviteFilter => "invitefilter",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModSetting::WordFilter => "Word filter",
            ModSetting::SpamFilter => "Spam filter",
            ModSetting::InviteFilter => "Invite filter",
        }
    }

    /// Resolve the spellings users type in `nano.settings`.
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias.trim().to_lowercase().as_str() {
            "word filter" | "filter words" | "wordfilter" | "filterwords" => {
                Some(ModSetting::WordFilter)
            }
            "spam filter" | "filter spam" | "spamfilter" | "filterspam" => {
                Some(ModSetting::SpamFilter)
            }
            "invite filter" | "filterinvite" | "filterinvites" | "invitefilter"
            | "invite removal" => Some(ModSetting::InviteFilter),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Typed snapshot of a server's settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub name: String,
    pub owner_id: Option<u64>,
    pub word_filter: bool,
    pub spam_filter: bool,
    pub invite_filter: bool,
    pub sleeping: bool,
    pub welcome_msg: Option<String>,
    pub kick_msg: Option<String>,
    pub ban_msg: Option<String>,
    pub leave_msg: Option<String>,
    pub log_channel: Option<u64>,
    pub prefix: String,
    pub default_channel: Option<u64>,
    pub lang: String,
}

impl ServerSettings {
    pub fn from_fields(fields: &HashMap<String, String>, default_prefix: &str) -> Self {
        let text = |field: &str| fields.get(field).cloned();
        let flag = |field: &str| fields.get(field).map(|v| parse_bool(v)).unwrap_or(false);
        let id = |field: &str| fields.get(field).and_then(|v| v.parse::<u64>().ok());

        Self {
            name: text(FIELD_NAME).unwrap_or_default(),
            owner_id: id(FIELD_OWNER),
            word_filter: flag(ModSetting::WordFilter.field()),
            spam_filter: flag(ModSetting::SpamFilter.field()),
            invite_filter: flag(ModSetting::InviteFilter.field()),
            sleeping: flag(FIELD_SLEEPING),
            welcome_msg: text(FIELD_WELCOME_MSG),
            kick_msg: text(FIELD_KICK_MSG),
            ban_msg: text(FIELD_BAN_MSG),
            leave_msg: text(FIELD_LEAVE_MSG),
            log_channel: id(FIELD_LOG_CHANNEL),
            prefix: text(FIELD_PREFIX).unwrap_or_else(|| default_prefix.to_string()),
            default_channel: id(FIELD_DEFAULT_CHANNEL),
            lang: text(FIELD_LANG).unwrap_or_else(|| DEFAULT_LANG.to_string()),
        }
    }
}

/// Everything stored for one server.
#[derive(Debug, Clone)]
pub struct ServerData {
    pub settings: ServerSettings,
    pub commands: HashMap<String, String>,
    pub blacklist: Vec<u64>,
    pub mutes: Vec<u64>,
}

/// Default contents of a fresh `server:<id>` hash.
pub fn server_defaults(guild: &GuildInfo, prefix: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    fields.insert(FIELD_NAME.to_string(), guild.name.clone());
    fields.insert(FIELD_OWNER.to_string(), guild.owner_id.to_string());
    for setting in ModSetting::ALL {
        fields.insert(setting.field().to_string(), encode_bool(false));
    }
    fields.insert(FIELD_SLEEPING.to_string(), encode_bool(false));
    fields.insert(FIELD_WELCOME_MSG.to_string(), DEFAULT_WELCOME_MSG.to_string());
    fields.insert(FIELD_KICK_MSG.to_string(), DEFAULT_KICK_MSG.to_string());
    fields.insert(FIELD_BAN_MSG.to_string(), DEFAULT_BAN_MSG.to_string());
    fields.insert(FIELD_LEAVE_MSG.to_string(), DEFAULT_LEAVE_MSG.to_string());
    fields.insert(FIELD_PREFIX.to_string(), prefix.to_string());
    fields.insert(FIELD_LANG.to_string(), DEFAULT_LANG.to_string());
    fields
}

pub fn encode_bool(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Lenient boolean decoding; also accepts values written by older tooling.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "on" | "yes" | "enabled"
    )
}

/// Words that switch a setting on.
const ENABLE_WORDS: [&str; 5] = ["on", "enabled", "enable", "turn on", "true"];

/// Words that switch a setting (or a message) off.
const DISABLE_WORDS: [&str; 5] = ["none", "false", "off", "disabled", "default"];

/// Interprets user answers such as "on", "enable" or "true".
pub fn is_enabled_word(input: &str) -> bool {
    let lowered = input.trim().to_lowercase();
    ENABLE_WORDS.iter().any(|w| lowered.starts_with(w)) || lowered == "yes"
}

/// Interprets user answers such as "none", "off" or "disabled".
pub fn is_disabled_word(input: Option<&str>) -> bool {
    match input {
        None => true,
        Some(value) => {
            let lowered = value.trim().to_lowercase();
            lowered.is_empty() || DISABLE_WORDS.iter().any(|w| lowered.starts_with(w))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_setting_aliases() {
        assert_eq!(
            ModSetting::from_alias("Word Filter"),
            Some(ModSetting::WordFilter)
        );
        assert_eq!(
            ModSetting::from_alias("filter spam"),
            Some(ModSetting::SpamFilter)
        );
        assert_eq!(
            ModSetting::from_alias("filterinvites"),
            Some(ModSetting::InviteFilter)
        );
        assert_eq!(ModSetting::from_alias("logchannel"), None);
    }

    #[test]
    fn test_settings_from_defaults() {
        let guild = GuildInfo {
            id: 1,
            name: "Rustaceans".to_string(),
            owner_id: 42,
        };
        let settings = ServerSettings::from_fields(&server_defaults(&guild, "?"), "!");

        assert_eq!(settings.name, "Rustaceans");
        assert_eq!(settings.owner_id, Some(42));
        assert_eq!(settings.prefix, "?");
        assert!(!settings.word_filter && !settings.spam_filter && !settings.invite_filter);
        assert_eq!(settings.log_channel, None);
        assert_eq!(settings.welcome_msg.as_deref(), Some(DEFAULT_WELCOME_MSG));
    }

    #[test]
    fn test_enable_disable_words() {
        assert!(is_enabled_word("on"));
        assert!(is_enabled_word("Enable please"));
        assert!(!is_enabled_word("off"));

        assert!(is_disabled_word(None));
        assert!(is_disabled_word(Some("None")));
        assert!(is_disabled_word(Some("  off")));
        assert!(!is_disabled_word(Some("#general")));
    }

    #[test]
    fn test_parse_bool_accepts_legacy_values() {
        assert!(parse_bool("True"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("False"));
        assert!(!parse_bool("garbage"));
    }
}
