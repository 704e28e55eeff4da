//! Authority Messages
//!
//! Typed view of what the authority posts back to the registration
//! callback, and the decoder that gets us there from the raw form value.

use std::collections::BTreeMap;

use rsa::RsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::{self, EncryptedMessage};
use crate::error::{RegistrationError, Result};
use crate::keys::KeyPair;

/// `@type` of a preferences message
pub const PREFERENCES_TYPE: &str = "ps:Preferences";

/// `@type` of an authority error
pub const ERROR_TYPE: &str = "err:Error";

/// Decoded callback payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum AuthorityMessage {
    #[serde(rename = "ps:Preferences")]
    Preferences(Preferences),

    #[serde(rename = "err:Error")]
    Error(AuthorityError),
}

impl AuthorityMessage {
    /// The `@type` discriminant
    pub fn type_name(&self) -> &'static str {
        match self {
            AuthorityMessage::Preferences(_) => PREFERENCES_TYPE,
            AuthorityMessage::Error(_) => ERROR_TYPE,
        }
    }
}

/// Endpoints, key acknowledgment and preferences issued for this site
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Echo of the `response-nonce` the handshake started with
    #[serde(rename = "sec:nonce", default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Authority endpoints by name
    #[serde(rename = "ps:endpoints", default)]
    pub endpoints: BTreeMap<String, String>,

    #[serde(rename = "ps:keyRegistration", default, skip_serializing_if = "Option::is_none")]
    pub key_registration: Option<KeyRegistration>,

    /// Account that receives payments
    #[serde(rename = "com:destination", default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    #[serde(rename = "ps:license", default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(rename = "ps:licenseHash", default, skip_serializing_if = "Option::is_none")]
    pub license_hash: Option<String>,
}

/// Authority acknowledgment of the site's public key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRegistration {
    #[serde(rename = "ps:status")]
    pub status: KeyRegistrationStatus,

    /// Where the authority publishes the key
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The key the authority registered
    #[serde(rename = "sec:publicKeyPem", default, skip_serializing_if = "Option::is_none")]
    pub public_key_pem: Option<String>,
}

/// Outcome of the authority's key registration
///
/// Registering a key that is already on file is not an error; repeated
/// handshakes with the same key land here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyRegistrationStatus {
    #[serde(rename = "ps:Registered")]
    Registered,

    #[serde(rename = "ps:AlreadyRegistered")]
    AlreadyRegistered,
}

/// Error reported by the authority
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityError {
    #[serde(rename = "err:message", default)]
    pub message: String,
}

/// Decode a raw callback message
///
/// Encrypted envelopes are opened with the site's private key first.
pub fn decode_message(raw: &str, keys: Option<&KeyPair>) -> Result<AuthorityMessage> {
    let mut value: Value = serde_json::from_str(raw.trim())?;

    if envelope::is_encrypted(&value) {
        let keys = keys.ok_or_else(|| {
            RegistrationError::MalformedMessage("encrypted message but no site key pair".into())
        })?;
        let sealed: EncryptedMessage = serde_json::from_value(value)?;
        let plaintext = sealed.open(&keys.decryption_key()?)?;
        value = serde_json::from_str(&plaintext)?;
    }

    let type_name = value
        .get("@type")
        .and_then(Value::as_str)
        .ok_or_else(|| RegistrationError::MalformedMessage("message has no @type".into()))?;

    match type_name {
        PREFERENCES_TYPE | ERROR_TYPE => Ok(serde_json::from_value(value)?),
        other => Err(RegistrationError::UnknownMessageType(other.to_string())),
    }
}

/// Serialize and encrypt a message to a site's public key, producing the
/// string an authority posts as `encrypted-message`
pub fn seal_message(
    message: &AuthorityMessage,
    public_key_pem: &str,
    public_key_url: Option<&str>,
) -> Result<String> {
    seal_value(&serde_json::to_value(message)?, public_key_pem, public_key_url)
}

/// Like [`seal_message`] for arbitrary JSON documents
pub fn seal_value(document: &Value, public_key_pem: &str, public_key_url: Option<&str>) -> Result<String> {
    let recipient = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| RegistrationError::MalformedMessage(format!("unusable public key: {e}")))?;
    let sealed = EncryptedMessage::seal(&document.to_string(), &recipient, public_key_url)?;
    Ok(serde_json::to_string(&sealed)?)
}
