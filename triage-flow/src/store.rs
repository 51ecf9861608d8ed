use dashmap::DashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{FlowError, Result};

/// Tab-scoped string store shared by the steps of one session.
///
/// Values are flat strings, like a browser's session storage. Structured data
/// goes through [`SessionStore::set_json`] / [`SessionStore::get_json`], which
/// keep the JSON text under a single key.
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    data: Arc<DashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).map(|v| v.clone())
    }

    /// Serialize `value` to JSON text and store it under `key`.
    pub fn set_json<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.data.insert(key.into(), text);
        Ok(())
    }

    /// Parse the JSON text stored under `key`.
    ///
    /// `Ok(None)` when the key is absent; an error when the text is not valid
    /// for `T`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| FlowError::StoreError(format!("key '{key}': {e}"))),
            None => Ok(None),
        }
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn clear(&self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Ordered copy of every entry.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl Serialize for SessionStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SessionStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = BTreeMap::<String, String>::deserialize(deserializer)?;
        let store = SessionStore::new();
        for (key, value) in entries {
            store.set(key, value);
        }
        Ok(store)
    }
}
