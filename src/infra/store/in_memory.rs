// In-memory implementation of KvStore.
//
// Used for tests and for running the bot without a database file
// (`NANO_STORE=memory`). Everything is lost on restart.

use crate::core::store::kv_store::{glob_match, KvStore, StoreError};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
enum StoredValue {
    Str(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
}

impl StoredValue {
    fn is_empty(&self) -> bool {
        match self {
            StoredValue::Str(_) => false,
            StoredValue::Hash(map) => map.is_empty(),
            StoredValue::Set(set) => set.is_empty(),
        }
    }
}

/// DashMap-backed store. Safe to share between tasks without a Mutex.
pub struct InMemoryKvStore {
    data: DashMap<String, StoredValue>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::WrongType(key.to_string())
    }

    /// Drop a hash or set that just lost its last element.
    fn remove_if_empty(&self, key: &str) {
        self.data.remove_if(key, |_, value| value.is_empty());
    }

    fn with_hash_mut<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, String>) -> R,
    ) -> Result<R, StoreError> {
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| StoredValue::Hash(HashMap::new()));
        match entry.value_mut() {
            StoredValue::Hash(map) => Ok(f(map)),
            _ => Err(Self::wrong_type(key)),
        }
    }

    fn with_set_mut<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashSet<String>) -> R,
    ) -> Result<R, StoreError> {
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| StoredValue::Set(HashSet::new()));
        match entry.value_mut() {
            StoredValue::Set(set) => Ok(f(set)),
            _ => Err(Self::wrong_type(key)),
        }
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.data.get(key).as_deref() {
            None => Ok(None),
            Some(StoredValue::Str(value)) => Ok(Some(value.clone())),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut entry) => match entry.get_mut() {
                StoredValue::Str(current) => {
                    *current = value.to_string();
                    Ok(())
                }
                _ => Err(Self::wrong_type(key)),
            },
            Entry::Vacant(entry) => {
                entry.insert(StoredValue::Str(value.to_string()));
                Ok(())
            }
        }
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        match self.data.get(key).as_deref() {
            None => Ok(None),
            Some(StoredValue::Hash(map)) => Ok(map.get(field).cloned()),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        self.with_hash_mut(key, |map| {
            map.insert(field.to_string(), value.to_string()).is_none()
        })
    }

    async fn hmset(&self, key: &str, fields: &HashMap<String, String>) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        self.with_hash_mut(key, |map| {
            for (field, value) in fields {
                map.insert(field.clone(), value.clone());
            }
        })
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        match self.data.get(key).as_deref() {
            None => Ok(HashMap::new()),
            Some(StoredValue::Hash(map)) => Ok(map.clone()),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        let removed = match self.data.get_mut(key) {
            None => return Ok(false),
            Some(mut entry) => match entry.value_mut() {
                StoredValue::Hash(map) => map.remove(field).is_some(),
                _ => return Err(Self::wrong_type(key)),
            },
        };
        // The RefMut is dropped above; removing while holding it would deadlock the shard
        self.remove_if_empty(key);
        Ok(removed)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.with_set_mut(key, |set| set.insert(member.to_string()))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let removed = match self.data.get_mut(key) {
            None => return Ok(false),
            Some(mut entry) => match entry.value_mut() {
                StoredValue::Set(set) => set.remove(member),
                _ => return Err(Self::wrong_type(key)),
            },
        };
        self.remove_if_empty(key);
        Ok(removed)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        match self.data.get(key).as_deref() {
            None => Ok(false),
            Some(StoredValue::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn smembers(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        match self.data.get(key).as_deref() {
            None => Ok(HashSet::new()),
            Some(StoredValue::Set(set)) => Ok(set.clone()),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.remove(key).is_some())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|entry| glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn size(&self) -> Result<usize, StoreError> {
        Ok(self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_strings() {
        let store = InMemoryKvStore::new();

        assert_eq!(store.get("greeting").await.unwrap(), None);
        store.set("greeting", "hi").await.unwrap();
        store.set("greeting", "hello").await.unwrap();
        assert_eq!(store.get("greeting").await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_hash_last_field_removes_key() {
        let store = InMemoryKvStore::new();

        assert!(store.hset("h", "a", "1").await.unwrap());
        assert!(!store.hset("h", "a", "2").await.unwrap());
        assert_eq!(store.hlen("h").await.unwrap(), 1);
        assert_eq!(store.hget("h", "a").await.unwrap().as_deref(), Some("2"));

        assert!(store.hdel("h", "a").await.unwrap());
        assert!(!store.exists("h").await.unwrap());
        assert!(!store.hdel("h", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_sets() {
        let store = InMemoryKvStore::new();

        assert!(store.sadd("s", "1").await.unwrap());
        assert!(!store.sadd("s", "1").await.unwrap());
        assert!(store.sismember("s", "1").await.unwrap());
        assert!(store.srem("s", "1").await.unwrap());
        assert!(!store.exists("s").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = InMemoryKvStore::new();
        store.set("k", "v").await.unwrap();

        assert!(matches!(
            store.hset("k", "f", "v").await,
            Err(StoreError::WrongType(_))
        ));
        assert!(matches!(store.sadd("k", "m").await, Err(StoreError::WrongType(_))));

        store.sadd("set", "m").await.unwrap();
        assert!(matches!(store.get("set").await, Err(StoreError::WrongType(_))));
    }

    #[tokio::test]
    async fn test_scan_and_size() {
        let store = InMemoryKvStore::new();
        store.hset("server:1", "name", "a").await.unwrap();
        store.hset("server:2", "name", "b").await.unwrap();
        store.sadd("mutes:1", "5").await.unwrap();

        assert_eq!(
            store.scan("server:*").await.unwrap(),
            vec!["server:1".to_string(), "server:2".to_string()]
        );
        assert_eq!(store.size().await.unwrap(), 3);
        assert!(store.delete("server:1").await.unwrap());
        assert_eq!(store.size().await.unwrap(), 2);
    }
}
