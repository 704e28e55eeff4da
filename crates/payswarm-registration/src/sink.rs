//! Configuration Sink
//!
//! Applies a validated preferences message to the site settings. All
//! validation happens before the first write and the result is committed
//! with a single grouped update, so a rejected message leaves every
//! setting as it was.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::{RegistrationError, Result};
use crate::message::{KeyRegistration, KeyRegistrationStatus, Preferences};
use crate::pricing::Pricing;
use crate::settings::{SettingKey, SettingUpdate, Settings, SettingsStore};

/// Endpoints every preferences message must carry
pub const REQUIRED_ENDPOINTS: &[&str] = &["contracts", "keys", "preferences"];

/// What a successful handshake changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedConfiguration {
    pub endpoints: BTreeMap<String, Url>,
    pub key_status: Option<KeyRegistrationStatus>,
    pub public_key_url: Option<String>,
    pub pricing: Pricing,
    pub registered_at: DateTime<Utc>,
}

/// Writes authority preferences into the site settings
pub struct ConfigurationSink<S: SettingsStore + ?Sized> {
    settings: Settings<S>,
}

impl<S: SettingsStore + ?Sized> ConfigurationSink<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            settings: Settings::new(store),
        }
    }

    /// Validate and commit a preferences message
    pub fn apply_preferences(&self, preferences: &Preferences) -> Result<AppliedConfiguration> {
        let endpoints = validate_endpoints(&preferences.endpoints)?;
        let public_key_url = match &preferences.key_registration {
            Some(registration) => self.check_key_registration(registration)?,
            None => None,
        };
        let pricing = Pricing::seeded(
            self.settings.default_price()?,
            self.settings.default_auth_rate()?,
        );
        let registered_at = Utc::now();

        let mut updates: Vec<SettingUpdate> = endpoints
            .iter()
            .map(|(name, url)| SettingUpdate::Set(SettingKey::Endpoint(name.clone()), url.to_string()))
            .collect();

        if let Some(url) = &public_key_url {
            updates.push(SettingUpdate::Set(SettingKey::PublicKeyUrl, url.clone()));
        }
        let optional = [
            (SettingKey::DestinationAccount, &preferences.destination),
            (SettingKey::License, &preferences.license),
            (SettingKey::LicenseHash, &preferences.license_hash),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                updates.push(SettingUpdate::Set(key, value.clone()));
            }
        }
        updates.push(SettingUpdate::Set(SettingKey::DefaultPrice, pricing.price_string()));
        updates.push(SettingUpdate::Set(SettingKey::DefaultAuthRate, pricing.auth_rate_string()));
        updates.push(SettingUpdate::Set(SettingKey::RegisteredAt, registered_at.to_rfc3339()));

        self.settings.store().set_many(updates)?;

        tracing::info!(
            endpoints = endpoints.len(),
            public_key_url = ?public_key_url,
            price = %pricing.price_string(),
            auth_rate = %pricing.auth_rate_string(),
            "Applied PaySwarm preferences"
        );

        Ok(AppliedConfiguration {
            endpoints,
            key_status: preferences.key_registration.as_ref().map(|r| r.status),
            public_key_url,
            pricing,
            registered_at,
        })
    }

    /// Admin override of the default price and authorization rate
    pub fn set_default_pricing(&self, pricing: Pricing) -> Result<()> {
        self.settings.store().set_many(vec![
            SettingUpdate::Set(SettingKey::DefaultPrice, pricing.price_string()),
            SettingUpdate::Set(SettingKey::DefaultAuthRate, pricing.auth_rate_string()),
        ])?;

        tracing::info!(
            price = %pricing.price_string(),
            auth_rate = %pricing.auth_rate_string(),
            "Updated default pricing"
        );
        Ok(())
    }

    fn check_key_registration(&self, registration: &KeyRegistration) -> Result<Option<String>> {
        if let Some(pem) = &registration.public_key_pem {
            let ours = self.settings.public_key()?.ok_or_else(|| {
                RegistrationError::Configuration("authority acknowledged a key but the site has none".into())
            })?;
            if pem_body(pem) != pem_body(&ours) {
                return Err(RegistrationError::Configuration(
                    "authority acknowledged a different public key".into(),
                ));
            }
        }

        if let Some(id) = &registration.id {
            Url::parse(id).map_err(|e| {
                RegistrationError::Configuration(format!("public key URL {id:?} is invalid: {e}"))
            })?;
        }

        match registration.status {
            KeyRegistrationStatus::Registered => {
                tracing::debug!(key_url = ?registration.id, "Authority registered site key");
            }
            KeyRegistrationStatus::AlreadyRegistered => {
                tracing::info!(key_url = ?registration.id, "Site key was already registered");
            }
        }

        Ok(registration.id.clone())
    }
}

fn validate_endpoints(raw: &BTreeMap<String, String>) -> Result<BTreeMap<String, Url>> {
    if let Some(missing) = REQUIRED_ENDPOINTS.iter().find(|name| !raw.contains_key(**name)) {
        return Err(RegistrationError::Configuration(format!(
            "missing required endpoint {missing:?}"
        )));
    }

    raw.iter()
        .map(|(name, value)| {
            if !valid_endpoint_name(name) {
                return Err(RegistrationError::Configuration(format!(
                    "invalid endpoint name {name:?}"
                )));
            }
            if SettingKey::endpoint_shadows_fixed(name) {
                return Err(RegistrationError::Configuration(format!(
                    "endpoint name {name:?} is reserved"
                )));
            }
            let url = Url::parse(value).map_err(|e| {
                RegistrationError::Configuration(format!("endpoint {name:?} is not a URL: {e}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(RegistrationError::Configuration(format!(
                    "endpoint {name:?} must be http(s), got {}",
                    url.scheme()
                )));
            }
            Ok((name.clone(), url))
        })
        .collect()
}

fn valid_endpoint_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// PEM contents with line breaks and padding whitespace removed
fn pem_body(pem: &str) -> String {
    pem.chars().filter(|c| !c.is_whitespace()).collect()
}
