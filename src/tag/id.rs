//! Tag identity selection
//!
//! A tag either transmits a literal 32-bit identifier or a 20-bit value
//! expanded through the encoding table. The choice is made once at start-up.

use crate::config::tag;
use crate::tag::encoder::{encode_id, MAX_ENCODED_ID};

const _: () = assert!(
    tag::DEFAULT_ENCODED_ID <= MAX_ENCODED_ID,
    "DEFAULT_ENCODED_ID must fit in 20 bits"
);

/// Errors resolving the tag identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Both a literal and an encoded identifier were supplied
    ConflictingIds,
    /// Value is not a hexadecimal number that fits in 32 bits
    InvalidHex,
    /// Encoded identifier does not fit in 20 bits
    EncodedIdOutOfRange,
}

/// Configured tag identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagId {
    /// Literal identifier, transmitted as-is
    Fixed(u32),
    /// 20-bit identifier, transmitted through the encoding table
    Encoded(u32),
}

impl TagId {
    /// Resolve the identity from optional hexadecimal overrides
    ///
    /// At most one of `fixed` and `encoded` may be given. With neither, the
    /// build defaults from [`crate::config::tag`] apply.
    pub fn resolve(fixed: Option<&str>, encoded: Option<&str>) -> Result<Self, ConfigError> {
        match (fixed, encoded) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingIds),
            (Some(text), None) => Ok(Self::Fixed(parse_hex(text)?)),
            (None, Some(text)) => Self::encoded(parse_hex(text)?),
            (None, None) => Ok(Self::default()),
        }
    }

    /// Build an encoded identity, checking the 20-bit range
    pub fn encoded(val20: u32) -> Result<Self, ConfigError> {
        if val20 > MAX_ENCODED_ID {
            return Err(ConfigError::EncodedIdOutOfRange);
        }
        Ok(Self::Encoded(val20))
    }

    /// Pick the default identity: the literal id if one is set, otherwise the encoded one
    ///
    /// `default_encoded` is range-checked at compile time for the build defaults.
    const fn fallback(default_id: Option<u32>, default_encoded: u32) -> Self {
        match default_id {
            Some(id) => Self::Fixed(id),
            None => Self::Encoded(default_encoded),
        }
    }

    /// The 32-bit identifier that goes on air
    pub fn on_air_id(&self) -> u32 {
        match *self {
            Self::Fixed(id) => id,
            Self::Encoded(val20) => encode_id(val20),
        }
    }
}

impl Default for TagId {
    fn default() -> Self {
        Self::fallback(tag::DEFAULT_ID, tag::DEFAULT_ENCODED_ID)
    }
}

/// Parse a hexadecimal value with an optional `0x` prefix and `_` separators
fn parse_hex(text: &str) -> Result<u32, ConfigError> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let mut value: u32 = 0;
    let mut seen_digit = false;

    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let digit = c.to_digit(16).ok_or(ConfigError::InvalidHex)?;
        value = value
            .checked_mul(16)
            .and_then(|v| v.checked_add(digit))
            .ok_or(ConfigError::InvalidHex)?;
        seen_digit = true;
    }

    if !seen_digit {
        return Err(ConfigError::InvalidHex);
    }

    Ok(value)
}
