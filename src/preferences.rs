//! Persisted user preferences.
//!
//! Storage itself is pluggable through [`PreferenceStore`] (browser local
//! storage, a file, memory); [`Preferences`] layers typed values on top.

use log::warn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::identity::TelegramUser;
use crate::stations::MarkerFilter;

const USER_KEY: &str = "telegramUser";
const MARKER_FILTER_KEY: &str = "markerFilters";

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("preference storage failed: {0}")]
    Storage(String),
    #[error("could not encode preference: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key/value storage backing [`Preferences`].
pub trait PreferenceStore: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
    fn remove(&self, key: &str) -> Result<(), PreferenceError>;
}

/// In-process store, for tests and headless use.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self, key: &str) -> Option<String> {
        self.values().get(key).cloned()
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        self.values().remove(key);
        Ok(())
    }
}

/// Typed access to the values the app remembers between visits.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Preferences backed by a fresh [`MemoryPreferences`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryPreferences::new()))
    }

    /// Last signed-in user. Corrupt entries read as signed out.
    pub fn cached_user(&self) -> Option<TelegramUser> {
        let raw = self.store.load(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!("[Preferences] ignoring unreadable cached user: {}", err);
                None
            }
        }
    }

    pub fn save_user(&self, user: &TelegramUser) -> Result<(), PreferenceError> {
        self.store.save(USER_KEY, &serde_json::to_string(user)?)
    }

    pub fn clear_user(&self) -> Result<(), PreferenceError> {
        self.store.remove(USER_KEY)
    }

    /// Marker filter, all types shown when nothing usable is stored.
    pub fn marker_filter(&self) -> MarkerFilter {
        self.store
            .load(MARKER_FILTER_KEY)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(filter) => Some(filter),
                Err(err) => {
                    warn!("[Preferences] ignoring unreadable marker filter: {}", err);
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn save_marker_filter(&self, filter: &MarkerFilter) -> Result<(), PreferenceError> {
        self.store.save(MARKER_FILTER_KEY, &serde_json::to_string(filter)?)
    }
}
