//! Site Key Pair
//!
//! Generates, persists and loads the RSA key pair the site registers with
//! the authority. The authority encrypts its callback messages to the
//! public half.

use std::sync::Arc;

use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{RegistrationError, Result};
use crate::settings::{SettingKey, SettingUpdate, Settings, SettingsStore};

/// Default RSA modulus size
pub const DEFAULT_KEY_BITS: usize = 2048;

/// PEM-encoded key pair plus the URL the authority published it under
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// PKCS#8 private key; legacy PKCS#1 keys load as well
    pub private_key: String,

    /// SubjectPublicKeyInfo public key
    pub public_key: String,

    /// Set once a registration recorded where the authority exposes this key
    pub public_key_url: Option<String>,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"[redacted]")
            .field("public_key", &self.public_key)
            .field("public_key_url", &self.public_key_url)
            .finish()
    }
}

impl KeyPair {
    /// Generate a fresh RSA key pair
    pub fn generate(bits: usize) -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| RegistrationError::KeyGenerationFailed(e.to_string()))?;
        let public = RsaPublicKey::from(&private);

        let private_key = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| RegistrationError::KeyGenerationFailed(e.to_string()))?
            .to_string();
        let public_key = public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| RegistrationError::KeyGenerationFailed(e.to_string()))?;

        Ok(Self {
            private_key,
            public_key,
            public_key_url: None,
        })
    }

    /// Load the private half for decryption
    pub fn decryption_key(&self) -> Result<RsaPrivateKey> {
        load_private_key(&self.private_key)
    }
}

/// Parse a private key stored as PKCS#8 or legacy PKCS#1 PEM
pub fn load_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| RegistrationError::MalformedMessage(format!("unusable private key: {e}")))
}

/// Key pair persistence on top of the site settings
pub struct KeyStore<S: SettingsStore + ?Sized> {
    settings: Settings<S>,
    key_bits: usize,
}

impl<S: SettingsStore + ?Sized> KeyStore<S> {
    pub fn new(store: Arc<S>, key_bits: usize) -> Self {
        Self {
            settings: Settings::new(store),
            key_bits,
        }
    }

    /// Stored key pair, if both halves are present
    pub fn current(&self) -> Result<Option<KeyPair>> {
        let private_key = self.settings.private_key()?;
        let public_key = self.settings.public_key()?;

        match (private_key, public_key) {
            (Some(private_key), Some(public_key)) => Ok(Some(KeyPair {
                private_key,
                public_key,
                public_key_url: self.settings.public_key_url()?,
            })),
            _ => Ok(None),
        }
    }

    /// Return the stored key pair, generating one when absent or when
    /// `overwrite` is requested
    pub fn get_or_create(&self, overwrite: bool) -> Result<KeyPair> {
        if !overwrite {
            if let Some(existing) = self.current()? {
                return Ok(existing);
            }
        }

        let keys = KeyPair::generate(self.key_bits)?;

        // A new key has never been registered, so any old URL goes too.
        self.settings.store().set_many(vec![
            SettingUpdate::Set(SettingKey::PrivateKey, keys.private_key.clone()),
            SettingUpdate::Set(SettingKey::PublicKey, keys.public_key.clone()),
            SettingUpdate::Remove(SettingKey::PublicKeyUrl),
        ])?;

        tracing::info!(bits = self.key_bits, overwrite, "Generated new site key pair");

        Ok(keys)
    }
}
