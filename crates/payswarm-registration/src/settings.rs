//! Site Settings
//!
//! Key-value settings repository injected by the host, plus a typed
//! facade so the rest of the crate never deals in raw option names.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use url::Url;

use crate::error::{RegistrationError, Result};
use crate::pricing;

/// Prefix shared by every persisted setting
const PREFIX: &str = "payswarm_";

/// A named site setting
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    PrivateKey,
    PublicKey,
    PublicKeyUrl,
    /// URL of a named authority endpoint (`payswarm_<name>_url`)
    Endpoint(String),
    DefaultPrice,
    DefaultAuthRate,
    KeyOverwrite,
    /// Nonce of the handshake currently awaiting its callback
    ResponseNonce,
    RegistrationUrl,
    DestinationAccount,
    License,
    LicenseHash,
    RegisteredAt,
}

impl SettingKey {
    /// Keys with a fixed option name
    const FIXED: [SettingKey; 12] = [
        SettingKey::PrivateKey,
        SettingKey::PublicKey,
        SettingKey::PublicKeyUrl,
        SettingKey::DefaultPrice,
        SettingKey::DefaultAuthRate,
        SettingKey::KeyOverwrite,
        SettingKey::ResponseNonce,
        SettingKey::RegistrationUrl,
        SettingKey::DestinationAccount,
        SettingKey::License,
        SettingKey::LicenseHash,
        SettingKey::RegisteredAt,
    ];

    /// Whether an endpoint called `name` would be stored under the option
    /// name of a fixed setting, e.g. `registration` or `public_key`
    pub fn endpoint_shadows_fixed(name: &str) -> bool {
        let candidate = SettingKey::Endpoint(name.to_string()).name();
        Self::FIXED.iter().any(|key| key.name() == candidate)
    }

    /// Persisted option name
    pub fn name(&self) -> String {
        match self {
            SettingKey::Endpoint(endpoint) => format!("{PREFIX}{endpoint}_url"),
            other => format!("{PREFIX}{}", other.suffix()),
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            SettingKey::PrivateKey => "private_key",
            SettingKey::PublicKey => "public_key",
            SettingKey::PublicKeyUrl => "public_key_url",
            SettingKey::Endpoint(_) => "endpoint",
            SettingKey::DefaultPrice => "default_price",
            SettingKey::DefaultAuthRate => "default_auth_rate",
            SettingKey::KeyOverwrite => "key_overwrite",
            SettingKey::ResponseNonce => "response_nonce",
            SettingKey::RegistrationUrl => "registration_url",
            SettingKey::DestinationAccount => "destination_account",
            SettingKey::License => "license",
            SettingKey::LicenseHash => "license_hash",
            SettingKey::RegisteredAt => "registered_at",
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One staged change in a grouped write
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingUpdate {
    Set(SettingKey, String),
    Remove(SettingKey),
}

/// Settings storage trait
///
/// `set_many` must apply every update or none of them; `take` must remove
/// and return a value atomically.
pub trait SettingsStore: Send + Sync {
    /// Get a setting, `None` when it was never saved
    fn get(&self, key: &SettingKey) -> Result<Option<String>>;

    /// Apply a group of updates as one unit
    fn set_many(&self, updates: Vec<SettingUpdate>) -> Result<()>;

    /// Remove a setting and return its previous value
    fn take(&self, key: &SettingKey) -> Result<Option<String>>;

    /// Save a single setting
    fn set(&self, key: SettingKey, value: String) -> Result<()> {
        self.set_many(vec![SettingUpdate::Set(key, value)])
    }
}

pub(crate) fn apply_updates(map: &mut HashMap<String, String>, updates: Vec<SettingUpdate>) {
    for update in updates {
        match update {
            SettingUpdate::Set(key, value) => {
                map.insert(key.name(), value);
            }
            SettingUpdate::Remove(key) => {
                map.remove(&key.name());
            }
        }
    }
}

pub(crate) fn poisoned<T>(_: T) -> RegistrationError {
    RegistrationError::Storage("settings lock poisoned".into())
}

/// In-memory settings store (for development and tests)
pub struct MemorySettingsStore {
    values: RwLock<HashMap<String, String>>,
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Copy of every stored option, sorted by name
    pub fn snapshot(&self) -> Result<BTreeMap<String, String>> {
        let values = self.values.read().map_err(poisoned)?;
        Ok(values.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &SettingKey) -> Result<Option<String>> {
        let values = self.values.read().map_err(poisoned)?;
        Ok(values.get(&key.name()).cloned())
    }

    fn set_many(&self, updates: Vec<SettingUpdate>) -> Result<()> {
        let mut values = self.values.write().map_err(poisoned)?;
        apply_updates(&mut values, updates);
        Ok(())
    }

    fn take(&self, key: &SettingKey) -> Result<Option<String>> {
        let mut values = self.values.write().map_err(poisoned)?;
        Ok(values.remove(&key.name()))
    }
}

/// Typed accessors over a [`SettingsStore`]
pub struct Settings<S: SettingsStore + ?Sized> {
    store: Arc<S>,
}

impl<S: SettingsStore + ?Sized> Clone for Settings<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SettingsStore + ?Sized> Settings<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get the underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn private_key(&self) -> Result<Option<String>> {
        self.non_empty(&SettingKey::PrivateKey)
    }

    pub fn public_key(&self) -> Result<Option<String>> {
        self.non_empty(&SettingKey::PublicKey)
    }

    pub fn public_key_url(&self) -> Result<Option<String>> {
        self.non_empty(&SettingKey::PublicKeyUrl)
    }

    /// URL of a named authority endpoint
    pub fn endpoint(&self, name: &str) -> Result<Option<Url>> {
        self.url(&SettingKey::Endpoint(name.to_string()))
    }

    /// Stored default price, `None` when unset or not numeric
    pub fn default_price(&self) -> Result<Option<Decimal>> {
        Ok(self
            .store
            .get(&SettingKey::DefaultPrice)?
            .and_then(|raw| pricing::parse_decimal(&raw)))
    }

    /// Stored default authorization rate, `None` when unset or not numeric
    pub fn default_auth_rate(&self) -> Result<Option<Decimal>> {
        Ok(self
            .store
            .get(&SettingKey::DefaultAuthRate)?
            .and_then(|raw| pricing::parse_decimal(&raw)))
    }

    /// Whether every handshake should generate a new key pair
    pub fn key_overwrite(&self) -> Result<bool> {
        Ok(self
            .store
            .get(&SettingKey::KeyOverwrite)?
            .is_some_and(|raw| raw.trim() == "true"))
    }

    pub fn set_key_overwrite(&self, overwrite: bool) -> Result<()> {
        self.store
            .set(SettingKey::KeyOverwrite, overwrite.to_string())
    }

    /// Authority registration URL chosen by the admin
    pub fn registration_url(&self) -> Result<Option<Url>> {
        self.url(&SettingKey::RegistrationUrl)
    }

    pub fn set_registration_url(&self, url: &Url) -> Result<()> {
        self.store
            .set(SettingKey::RegistrationUrl, url.to_string())
    }

    pub fn destination_account(&self) -> Result<Option<String>> {
        self.non_empty(&SettingKey::DestinationAccount)
    }

    pub fn license(&self) -> Result<Option<String>> {
        self.non_empty(&SettingKey::License)
    }

    pub fn license_hash(&self) -> Result<Option<String>> {
        self.non_empty(&SettingKey::LicenseHash)
    }

    /// When the last handshake was applied
    pub fn registered_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .get(&SettingKey::RegisteredAt)?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|at| at.with_timezone(&Utc)))
    }

    fn non_empty(&self, key: &SettingKey) -> Result<Option<String>> {
        Ok(self.store.get(key)?.filter(|value| !value.is_empty()))
    }

    fn url(&self, key: &SettingKey) -> Result<Option<Url>> {
        match self.non_empty(key)? {
            Some(raw) => Url::parse(&raw).map(Some).map_err(|e| {
                RegistrationError::Storage(format!("{key} holds an invalid URL: {e}"))
            }),
            None => Ok(None),
        }
    }
}
