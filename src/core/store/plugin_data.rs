// Namespaced access to the key-value store for individual plugins.

use super::kv_store::{KvStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;

/// A view of the store where every key is prefixed with `<namespace>:`.
#[derive(Clone)]
pub struct PluginDataManager {
    namespace: String,
    store: Arc<dyn KvStore>,
}

impl PluginDataManager {
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        tracing::info!(namespace = %namespace, "New plugin namespace registered");
        Self { namespace, store }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn make_key(&self, name: &str) -> String {
        format!("{}:{}", self.namespace, name)
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.set(&self.make_key(key), value).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store.get(&self.make_key(key)).await
    }

    pub async fn hget(&self, name: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.store.hget(&self.make_key(name), field).await
    }

    pub async fn hgetall(&self, name: &str) -> Result<HashMap<String, String>, StoreError> {
        self.store.hgetall(&self.make_key(name)).await
    }

    /// `hgetall` on a full key, e.g. one returned by `scan`.
    pub async fn hgetall_raw(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.store.hgetall(key).await
    }

    pub async fn hdel(&self, name: &str, field: &str) -> Result<bool, StoreError> {
        self.store.hdel(&self.make_key(name), field).await
    }

    pub async fn hmset(
        &self,
        name: &str,
        payload: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        self.store.hmset(&self.make_key(name), payload).await
    }

    pub async fn hset(&self, name: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        self.store.hset(&self.make_key(name), field, value).await
    }

    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        self.store.exists(&self.make_key(name)).await
    }

    pub async fn delete(&self, name: &str) -> Result<bool, StoreError> {
        self.store.delete(&self.make_key(name)).await
    }

    pub async fn delete_raw(&self, key: &str) -> Result<bool, StoreError> {
        self.store.delete(key).await
    }

    /// Keys matching `pattern`; full keys are returned either way.
    pub async fn scan(&self, pattern: &str, use_namespace: bool) -> Result<Vec<String>, StoreError> {
        let pattern = if use_namespace {
            self.make_key(pattern)
        } else {
            pattern.to_string()
        };
        self.store.scan(&pattern).await
    }
}
