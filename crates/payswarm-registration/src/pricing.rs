//! Default Pricing
//!
//! Default price and authorization rate are stored as fixed-point strings
//! with seven fractional digits, e.g. `0.0500000`.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{RegistrationError, Result};

/// Price seeded when the site has none
pub const DEFAULT_PRICE: Decimal = dec!(0.05);

/// Authorization rate seeded when the site has none
pub const DEFAULT_AUTH_RATE: Decimal = dec!(10);

/// Fractional digits kept in stored values
pub const PRICE_SCALE: u32 = 7;

/// Default price and authorization rate, always handled together
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pricing {
    pub price: Decimal,
    pub auth_rate: Decimal,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            price: DEFAULT_PRICE,
            auth_rate: DEFAULT_AUTH_RATE,
        }
    }
}

impl Pricing {
    /// Validate admin-supplied values
    pub fn new(price: Decimal, auth_rate: Decimal) -> Result<Self> {
        if price.is_sign_negative() {
            return Err(RegistrationError::InvalidPricing(format!(
                "price must not be negative, got {price}"
            )));
        }
        if auth_rate.is_sign_negative() {
            return Err(RegistrationError::InvalidPricing(format!(
                "authorization rate must not be negative, got {auth_rate}"
            )));
        }
        if !fits_fixed_point(price) {
            return Err(RegistrationError::InvalidPricing(format!(
                "price {price} cannot be stored with {PRICE_SCALE} decimals"
            )));
        }
        if !fits_fixed_point(auth_rate) {
            return Err(RegistrationError::InvalidPricing(format!(
                "authorization rate {auth_rate} cannot be stored with {PRICE_SCALE} decimals"
            )));
        }
        Ok(Self { price, auth_rate })
    }

    /// Parse admin-supplied strings
    pub fn parse(price: &str, auth_rate: &str) -> Result<Self> {
        let parsed_price = parse_decimal(price).ok_or_else(|| {
            RegistrationError::InvalidPricing(format!("price is not a number: {price:?}"))
        })?;
        let parsed_rate = parse_decimal(auth_rate).ok_or_else(|| {
            RegistrationError::InvalidPricing(format!(
                "authorization rate is not a number: {auth_rate:?}"
            ))
        })?;
        Self::new(parsed_price, parsed_rate)
    }

    /// Keep stored values when numeric, seed the rest
    pub fn seeded(price: Option<Decimal>, auth_rate: Option<Decimal>) -> Self {
        Self {
            price: price.filter(|v| fits_fixed_point(*v)).unwrap_or(DEFAULT_PRICE),
            auth_rate: auth_rate
                .filter(|v| fits_fixed_point(*v))
                .unwrap_or(DEFAULT_AUTH_RATE),
        }
    }

    pub fn price_string(&self) -> String {
        normalize(self.price)
    }

    pub fn auth_rate_string(&self) -> String {
        normalize(self.auth_rate)
    }
}

/// Parse a numeric setting; plain and scientific notation are accepted
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// `value` rounded and rescaled to exactly [`PRICE_SCALE`] digits, or
/// `None` when the integer part leaves no room for them
fn to_fixed_point(value: Decimal) -> Option<Decimal> {
    let mut scaled = value.round_dp(PRICE_SCALE);
    // rescale caps the scale silently when the mantissa overflows
    scaled.rescale(PRICE_SCALE);
    (scaled.scale() == PRICE_SCALE).then_some(scaled)
}

/// Whether `value` can be stored in the fixed-point format
pub fn fits_fixed_point(value: Decimal) -> bool {
    to_fixed_point(value).is_some()
}

/// Render with exactly [`PRICE_SCALE`] fractional digits
///
/// Values that do not fit are rendered as given; [`Pricing::new`] keeps
/// them out of the settings.
pub fn normalize(value: Decimal) -> String {
    to_fixed_point(value).unwrap_or(value).to_string()
}
