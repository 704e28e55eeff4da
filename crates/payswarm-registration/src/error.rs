//! Registration Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Generic text shown when the authority sent something we cannot use
pub const INVALID_RESPONSE_MESSAGE: &str =
    "Invalid registration response from PaySwarm Authority.";

/// Registration-related errors
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Key pair generation or PEM export failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Callback body could not be parsed or decrypted
    #[error("Malformed authority message: {0}")]
    MalformedMessage(String),

    /// Decoded message carries a type we do not understand
    #[error("Unknown authority message type: {0}")]
    UnknownMessageType(String),

    /// The authority itself reported an error
    #[error("Authority reported error: {0}")]
    AuthorityReported(String),

    /// Callback nonce missing, replayed, or superseded by a newer handshake
    #[error("Stale registration nonce: {0}")]
    StaleNonce(String),

    /// Preferences could not be applied to the site configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Price or authorization rate is not a usable decimal
    #[error("Invalid pricing: {0}")]
    InvalidPricing(String),

    /// URL could not be parsed or built
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Runtime configuration (environment) error
    #[error("Config error: {0}")]
    Config(String),

    /// Settings store error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl RegistrationError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistrationError::Storage(_))
    }

    /// Check if the handshake should simply be started again
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            RegistrationError::MalformedMessage(_)
                | RegistrationError::UnknownMessageType(_)
                | RegistrationError::AuthorityReported(_)
                | RegistrationError::StaleNonce(_)
                | RegistrationError::Configuration(_)
        )
    }

    /// Get user-friendly message
    ///
    /// Authority errors are passed through verbatim so the admin sees
    /// exactly what the authority said.
    pub fn user_message(&self) -> String {
        match self {
            RegistrationError::AuthorityReported(msg) => msg.clone(),
            RegistrationError::MalformedMessage(_) | RegistrationError::UnknownMessageType(_) => {
                INVALID_RESPONSE_MESSAGE.into()
            }
            RegistrationError::StaleNonce(_) => {
                "This registration response has expired. Please register again.".into()
            }
            RegistrationError::Configuration(msg) => {
                format!("Failed to apply PaySwarm configuration: {msg}")
            }
            RegistrationError::KeyGenerationFailed(_) => {
                "Could not generate a key pair for this site.".into()
            }
            RegistrationError::InvalidPricing(msg) => format!("Invalid pricing: {msg}"),
            RegistrationError::Config(_) => "Service configuration error.".into(),
            _ => "An error occurred processing the registration.".into(),
        }
    }
}

impl From<serde_json::Error> for RegistrationError {
    fn from(err: serde_json::Error) -> Self {
        RegistrationError::MalformedMessage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_message_passed_through() {
        let err = RegistrationError::AuthorityReported("token expired".into());
        assert_eq!(err.user_message(), "token expired");
        assert!(err.is_rejection());
    }

    #[test]
    fn test_decode_errors_are_generic() {
        let err = RegistrationError::UnknownMessageType("ps:Receipt".into());
        assert_eq!(err.user_message(), INVALID_RESPONSE_MESSAGE);
        assert!(!err.is_retryable());
    }
}
