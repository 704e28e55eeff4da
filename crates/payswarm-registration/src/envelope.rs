//! Encrypted Message Envelope
//!
//! The authority encrypts callback messages with a one-time AES-128-CBC
//! key. Key and IV are each wrapped with RSA-OAEP under the site's public
//! key and everything is base64 encoded:
//!
//! ```text
//! {
//!   "@type": "sec:EncryptedMessage",
//!   "sec:cipherAlgorithm": "rsa-sha256-aes-128-cbc",
//!   "sec:cipherKey": "<wrapped key>",
//!   "sec:initializationVector": "<wrapped iv>",
//!   "sec:cipherData": "<ciphertext>"
//! }
//! ```

use aes::Aes128;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::Sha1;

use crate::error::{RegistrationError, Result};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// `@type` of an encrypted envelope
pub const ENCRYPTED_MESSAGE_TYPE: &str = "sec:EncryptedMessage";

/// The only cipher suite authorities use
pub const CIPHER_ALGORITHM: &str = "rsa-sha256-aes-128-cbc";

const AES_KEY_LEN: usize = 16;
const AES_IV_LEN: usize = 16;

/// Encrypted authority message as it travels in the callback
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    #[serde(rename = "@type", default = "encrypted_message_type")]
    pub message_type: String,

    #[serde(rename = "sec:cipherAlgorithm")]
    pub cipher_algorithm: String,

    #[serde(rename = "sec:cipherKey")]
    pub cipher_key: String,

    #[serde(rename = "sec:initializationVector")]
    pub initialization_vector: String,

    #[serde(rename = "sec:cipherData")]
    pub cipher_data: String,

    /// URL of the public key the message was encrypted to
    #[serde(rename = "sec:publicKey", default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

fn encrypted_message_type() -> String {
    ENCRYPTED_MESSAGE_TYPE.to_string()
}

/// Whether a parsed JSON object has the envelope shape
pub fn is_encrypted(value: &Value) -> bool {
    value.get("@type").and_then(Value::as_str) == Some(ENCRYPTED_MESSAGE_TYPE)
        || value.get("sec:cipherData").is_some()
}

impl EncryptedMessage {
    /// Decrypt to the plaintext JSON document
    pub fn open(&self, key: &RsaPrivateKey) -> Result<String> {
        if self.cipher_algorithm != CIPHER_ALGORITHM {
            return Err(RegistrationError::MalformedMessage(format!(
                "unsupported cipher algorithm {:?}",
                self.cipher_algorithm
            )));
        }

        let aes_key = unwrap_secret(key, "sec:cipherKey", &self.cipher_key, AES_KEY_LEN)?;
        let iv = unwrap_secret(
            key,
            "sec:initializationVector",
            &self.initialization_vector,
            AES_IV_LEN,
        )?;
        let data = decode_base64("sec:cipherData", &self.cipher_data)?;

        let plaintext = Aes128CbcDec::new_from_slices(&aes_key, &iv)
            .map_err(|e| RegistrationError::MalformedMessage(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(&data)
            .map_err(|_| RegistrationError::MalformedMessage("cipher data did not decrypt".into()))?;

        String::from_utf8(plaintext).map_err(|_| {
            RegistrationError::MalformedMessage("decrypted message is not UTF-8".into())
        })
    }

    /// Encrypt a plaintext document the way an authority does
    pub fn seal(plaintext: &str, recipient: &RsaPublicKey, public_key_url: Option<&str>) -> Result<Self> {
        let mut aes_key = [0u8; AES_KEY_LEN];
        let mut iv = [0u8; AES_IV_LEN];
        OsRng.fill_bytes(&mut aes_key);
        OsRng.fill_bytes(&mut iv);

        let data = Aes128CbcEnc::new(&aes_key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let wrapped_key = recipient
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), &aes_key)
            .map_err(|e| RegistrationError::MalformedMessage(format!("cannot wrap key: {e}")))?;
        let wrapped_iv = recipient
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), &iv)
            .map_err(|e| RegistrationError::MalformedMessage(format!("cannot wrap iv: {e}")))?;

        Ok(Self {
            message_type: encrypted_message_type(),
            cipher_algorithm: CIPHER_ALGORITHM.to_string(),
            cipher_key: STANDARD.encode(wrapped_key),
            initialization_vector: STANDARD.encode(wrapped_iv),
            cipher_data: STANDARD.encode(data),
            public_key: public_key_url.map(str::to_string),
        })
    }
}

fn decode_base64(field: &str, encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| RegistrationError::MalformedMessage(format!("{field} is not base64: {e}")))
}

fn unwrap_secret(key: &RsaPrivateKey, field: &str, encoded: &str, len: usize) -> Result<Vec<u8>> {
    let wrapped = decode_base64(field, encoded)?;
    let secret = key
        .decrypt(Oaep::new::<Sha1>(), &wrapped)
        .map_err(|e| RegistrationError::MalformedMessage(format!("cannot unwrap {field}: {e}")))?;

    if secret.len() != len {
        return Err(RegistrationError::MalformedMessage(format!(
            "{field} has length {}, expected {len}",
            secret.len()
        )));
    }
    Ok(secret)
}
