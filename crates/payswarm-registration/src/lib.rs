//! # payswarm-registration
//!
//! Registers a website with a PaySwarm Authority so it can charge
//! micropayments for content.
//!
//! ## Handshake
//!
//! ```text
//! ┌─────────────┐  303 See Other  ┌─────────────────┐  POST callback  ┌─────────────┐
//! │  Your Site  │────────────────▶│    PaySwarm     │────────────────▶│  Your Site  │
//! │  (admin)    │ nonce + pub key │    Authority    │ encrypted prefs │ (callback)  │
//! └─────────────┘                 └─────────────────┘                 └─────────────┘
//! ```
//!
//! 1. [`Registrar::begin_registration`] makes sure the site has a key pair,
//!    records a fresh nonce and returns the authority URL to redirect to.
//! 2. The authority posts an `encrypted-message` back;
//!    [`Registrar::handle_callback`] decrypts it with the site's private key,
//!    checks the echoed nonce and commits endpoints, key registration and
//!    pricing in one grouped write.
//!
//! All state lives behind the [`SettingsStore`] trait, so the two halves may
//! run in different processes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use payswarm_registration::{MemorySettingsStore, Registrar, RegistrarConfig};
//!
//! let registrar = Registrar::new(RegistrarConfig::from_env()?, Arc::new(MemorySettingsStore::new()));
//!
//! // Admin clicked "register": answer with 303 to this URL
//! let redirect = registrar.start_or_resume_registration()?;
//!
//! // Later, the authority posts back
//! let outcome = registrar.handle_callback(encrypted_message.as_bytes());
//! ```

mod config;
mod envelope;
mod error;
mod file_store;
mod keys;
mod message;
mod nonce;
mod pricing;
mod registration;
mod settings;
mod sink;

pub use config::RegistrarConfig;
pub use envelope::{CIPHER_ALGORITHM, ENCRYPTED_MESSAGE_TYPE, EncryptedMessage};
pub use error::{INVALID_RESPONSE_MESSAGE, RegistrationError, Result};
pub use file_store::FileSettingsStore;
pub use keys::{DEFAULT_KEY_BITS, KeyPair, KeyStore};
pub use message::{
    AuthorityError, AuthorityMessage, KeyRegistration, KeyRegistrationStatus, Preferences,
    decode_message, seal_message, seal_value,
};
pub use nonce::{NonceIssuer, RegistrationNonce};
pub use pricing::{DEFAULT_AUTH_RATE, DEFAULT_PRICE, Pricing};
pub use registration::{
    CallbackOutcome, ENCRYPTED_MESSAGE_FIELD, PUBLIC_KEY_PARAM, REGISTRATION_CALLBACK_PARAM,
    RESPONSE_NONCE_PARAM, RedirectInstruction, Registrar, RegistrationState, RegistrationStatus,
};
pub use settings::{MemorySettingsStore, SettingKey, SettingUpdate, Settings, SettingsStore};
pub use sink::{AppliedConfiguration, ConfigurationSink, REQUIRED_ENDPOINTS};
