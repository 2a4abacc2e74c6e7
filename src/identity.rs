//! Telegram sign-in.
//!
//! The login widget and the Telegram WebApp both hand over a user object.
//! [`AuthCallbacks`] receives it, remembers it through [`Preferences`] and
//! notifies whoever registered interest. Registrations are explicit handles
//! that deregister when dropped, so a torn-down view stops receiving
//! sign-ins.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};

use crate::error::{ApiError, ApiResult};
use crate::preferences::{PreferenceError, Preferences};

/// A Telegram account as sent by the login widget or the WebApp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl TelegramUser {
    /// `@username`, else the full name, else the numeric id.
    pub fn display_name(&self) -> String {
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{}", username);
        }
        let full: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if full.is_empty() {
            self.id.to_string()
        } else {
            full.join(" ")
        }
    }
}

#[derive(Debug, Deserialize)]
struct InitData {
    #[serde(default)]
    user: Option<TelegramUser>,
}

/// Extract the user from a Telegram WebApp `initDataUnsafe` JSON object.
///
/// Returns `Ok(None)` when the app was opened without a user.
///
/// ```
/// use route_viewer::identity::parse_init_data;
///
/// let user = parse_init_data(r#"{"user":{"id":7,"first_name":"Ann"},"auth_date":1}"#)
///     .unwrap()
///     .unwrap();
/// assert_eq!(user.display_name(), "Ann");
/// ```
pub fn parse_init_data(json: &str) -> ApiResult<Option<TelegramUser>> {
    let data: InitData = serde_json::from_str(json)?;
    Ok(data.user)
}

/// Settings handed to the auth collaborator at startup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthConfig {
    /// Bot the login widget signs in through
    pub bot_name: String,
    /// Users allowed to see admin-only periods and delete markers
    pub admin_ids: Vec<i64>,
}

impl AuthConfig {
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

type AuthCallback = Arc<dyn Fn(&TelegramUser) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: Vec<(u64, AuthCallback)>,
}

fn lock(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle for one registered sign-in callback. Dropping it deregisters.
pub struct Registration {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Registration {
    /// Deregister now.
    pub fn unregister(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).callbacks.retain(|(id, _)| *id != self.id);
            debug!("[AuthCallbacks] callback #{} deregistered", self.id);
        }
    }
}

/// Receives sign-ins and fans them out to registered callbacks.
pub struct AuthCallbacks {
    config: AuthConfig,
    preferences: Preferences,
    registry: Arc<Mutex<Registry>>,
}

impl AuthCallbacks {
    pub fn new(config: AuthConfig, preferences: Preferences) -> Self {
        Self {
            config,
            preferences,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Call `callback` on every future sign-in until the handle is dropped.
    pub fn register(&self, callback: impl Fn(&TelegramUser) + Send + Sync + 'static) -> Registration {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.callbacks.push((id, Arc::new(callback)));
        Registration {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of live registrations.
    pub fn listener_count(&self) -> usize {
        lock(&self.registry).callbacks.len()
    }

    /// Accept a signed-in user: remember it, then notify callbacks.
    ///
    /// Returns how many callbacks ran.
    pub fn dispatch(&self, user: TelegramUser) -> Result<usize, PreferenceError> {
        self.preferences.save_user(&user)?;
        info!("[AuthCallbacks] signed in user {}", user.id);

        // Snapshot so callbacks may register or drop handles themselves
        let callbacks: Vec<AuthCallback> = lock(&self.registry)
            .callbacks
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in &callbacks {
            callback(&user);
        }
        Ok(callbacks.len())
    }

    /// Accept the raw JSON user object posted by the login widget.
    pub fn dispatch_payload(&self, json: &str) -> ApiResult<TelegramUser> {
        let user: TelegramUser = serde_json::from_str(json)?;
        self.dispatch(user.clone())
            .map_err(|err| ApiError::InvalidInput(err.to_string()))?;
        Ok(user)
    }

    /// User remembered from an earlier visit.
    pub fn current_user(&self) -> Option<TelegramUser> {
        self.preferences.cached_user()
    }

    pub fn sign_out(&self) -> Result<(), PreferenceError> {
        self.preferences.clear_user()
    }

    pub fn is_admin(&self, user: &TelegramUser) -> bool {
        self.config.is_admin(user.id)
    }
}
