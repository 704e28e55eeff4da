//! Registrar Configuration
//!
//! Loaded from `PAYSWARM_*` environment variables by the host.

use url::Url;

use crate::error::{RegistrationError, Result};
use crate::keys::DEFAULT_KEY_BITS;

/// Path of the registration endpoint on the site
pub const DEFAULT_CALLBACK_PATH: &str = "/payswarm/register";

/// Path the admin is sent back to after registering
pub const DEFAULT_ADMIN_PATH: &str = "/payswarm/admin";

/// Smallest RSA modulus we will generate
pub const MIN_KEY_BITS: usize = 2048;

/// Site-level registration settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrarConfig {
    /// Absolute base URL of this site
    pub site_url: Url,

    /// Authority registration URL used when the admin has not stored one
    pub registration_url: Option<Url>,

    /// Absolute URL the authority posts the callback to
    pub callback_url: Url,

    /// Where to send the admin after a successful registration
    pub admin_url: Url,

    /// RSA modulus size for new key pairs
    pub key_bits: usize,

    /// Require the callback to echo the expected nonce
    pub verify_nonce: bool,
}

impl RegistrarConfig {
    /// Build with defaults derived from the site URL
    pub fn new(site_url: Url) -> Result<Self> {
        let callback_url = site_url.join(DEFAULT_CALLBACK_PATH)?;
        let admin_url = site_url.join(DEFAULT_ADMIN_PATH)?;
        Ok(Self {
            site_url,
            registration_url: None,
            callback_url,
            admin_url,
            key_bits: DEFAULT_KEY_BITS,
            verify_nonce: true,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let site_url = lookup("PAYSWARM_SITE_URL")
            .ok_or_else(|| RegistrationError::Config("PAYSWARM_SITE_URL not set".into()))?;
        let site_url = parse_url("PAYSWARM_SITE_URL", &site_url)?;
        let mut config = Self::new(site_url)?;

        if let Some(raw) = lookup("PAYSWARM_REGISTRATION_URL") {
            config.registration_url = Some(parse_url("PAYSWARM_REGISTRATION_URL", &raw)?);
        }
        if let Some(path) = lookup("PAYSWARM_CALLBACK_PATH") {
            config.callback_url = config.site_url.join(&path)?;
        }
        if let Some(raw) = lookup("PAYSWARM_ADMIN_URL") {
            config.admin_url = config.site_url.join(&raw)?;
        }
        if let Some(raw) = lookup("PAYSWARM_KEY_BITS") {
            let bits: usize = raw.trim().parse().map_err(|_| {
                RegistrationError::Config(format!("PAYSWARM_KEY_BITS is not a number: {raw:?}"))
            })?;
            if bits < MIN_KEY_BITS {
                return Err(RegistrationError::Config(format!(
                    "PAYSWARM_KEY_BITS must be at least {MIN_KEY_BITS}"
                )));
            }
            config.key_bits = bits;
        }
        if let Some(raw) = lookup("PAYSWARM_VERIFY_NONCE") {
            config.verify_nonce = match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(RegistrationError::Config(format!(
                        "PAYSWARM_VERIFY_NONCE must be a boolean, got {raw:?}"
                    )));
                }
            };
        }

        Ok(config)
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url> {
    Url::parse(raw.trim())
        .map_err(|e| RegistrationError::Config(format!("{name} is not a valid URL: {e}")))
}
