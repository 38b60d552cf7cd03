// Key-value port - the storage contract every Nano feature is built on.
//
// The store knows three kinds of values under a string key: plain strings,
// hashes (field -> value) and sets. It is deliberately small; the server
// handler and the plugin data manager add meaning on top of it.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Longest string accepted by any write that originates from user input.
pub const MAX_INPUT_LENGTH: usize = 800;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Key `{0}` holds a different kind of value")]
    WrongType(String),

    #[error("Input is longer than {} characters", MAX_INPUT_LENGTH)]
    InputTooLong,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for the keyed backing store.
///
/// Missing keys read as empty. Removing the last field of a hash or the last
/// member of a set removes the key itself. Touching a key with an operation
/// for another kind of value is a `StoreError::WrongType`.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Set a hash field. Returns `true` when the field did not exist before.
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError>;

    async fn hmset(&self, key: &str, fields: &HashMap<String, String>) -> Result<(), StoreError>;

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Remove a hash field. Returns `true` when it existed.
    async fn hdel(&self, key: &str, field: &str) -> Result<bool, StoreError>;

    async fn hlen(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self.hgetall(key).await?.len())
    }

    async fn hexists(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        Ok(self.hget(key, field).await?.is_some())
    }

    /// Add a set member. Returns `true` when it was not a member yet.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Remove a set member. Returns `true` when it was a member.
    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn smembers(&self, key: &str) -> Result<HashSet<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove a key of any kind. Returns `true` when something was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// All keys matching a glob pattern (`*` and `?` wildcards).
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Number of keys in the store.
    async fn size(&self) -> Result<usize, StoreError>;
}

/// Reject user-provided values that are too long to store.
pub fn validate_input(values: &[&str]) -> Result<(), StoreError> {
    if values
        .iter()
        .any(|value| value.chars().count() > MAX_INPUT_LENGTH)
    {
        return Err(StoreError::InputTooLong);
    }
    Ok(())
}

/// Glob matching used by `scan` implementations.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text index it is currently absorbing up to
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("server:*", "server:123"));
        assert!(glob_match("server:*", "server:"));
        assert!(!glob_match("server:*", "commands:123"));
        assert!(glob_match("reminder:42:*", "reminder:42:900"));
        assert!(!glob_match("reminder:42:*", "reminder:421:900"));
        assert!(glob_match("sr:?", "sr:1"));
        assert!(!glob_match("sr:?", "sr:12"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("a*b*c", "a-b--b-c"));
    }

    #[test]
    fn test_validate_input() {
        assert!(validate_input(&["short", "also short"]).is_ok());

        let long = "x".repeat(MAX_INPUT_LENGTH + 1);
        assert!(matches!(
            validate_input(&["ok", &long]),
            Err(StoreError::InputTooLong)
        ));
    }
}
