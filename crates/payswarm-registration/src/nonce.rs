//! Registration Nonces
//!
//! One nonce is expected per site at a time. It lives in the settings store
//! so the callback may land on a different process than the redirect.

use std::sync::Arc;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::settings::{SettingKey, SettingsStore};

/// Random bytes per nonce (hex-encoded to twice as many characters)
pub const NONCE_BYTES: usize = 32;

/// Opaque single-use token binding a redirect to its callback
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationNonce(String);

impl RegistrationNonce {
    /// Generate a new random nonce
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap a nonce received from elsewhere
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare without short-circuiting on the first differing byte
    pub fn matches(&self, other: &str) -> bool {
        let ours = self.0.as_bytes();
        let theirs = other.as_bytes();
        if ours.len() != theirs.len() {
            return false;
        }
        ours.iter()
            .zip(theirs)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Display for RegistrationNonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues and consumes the expected nonce
pub struct NonceIssuer<S: SettingsStore + ?Sized> {
    store: Arc<S>,
}

impl<S: SettingsStore + ?Sized> NonceIssuer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a nonce and record it as the expected one, replacing any
    /// handshake still in flight
    pub fn create(&self) -> Result<RegistrationNonce> {
        let nonce = RegistrationNonce::generate();
        let replaced = self.expected()?.is_some();
        self.store
            .set(SettingKey::ResponseNonce, nonce.as_str().to_string())?;

        if replaced {
            tracing::debug!("Superseded an unfinished registration handshake");
        }

        Ok(nonce)
    }

    /// Nonce currently awaiting its callback
    pub fn expected(&self) -> Result<Option<RegistrationNonce>> {
        Ok(self
            .store
            .get(&SettingKey::ResponseNonce)?
            .filter(|raw| !raw.is_empty())
            .map(RegistrationNonce))
    }

    /// Remove and return the expected nonce
    pub fn take(&self) -> Result<Option<RegistrationNonce>> {
        Ok(self
            .store
            .take(&SettingKey::ResponseNonce)?
            .filter(|raw| !raw.is_empty())
            .map(RegistrationNonce))
    }
}
