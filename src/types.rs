// Core data structures for the price index
// One persisted entity (PriceRecord) plus the transient event candidate shape

use crate::error::PriceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token addresses that mean "no token" in the upstream event feed.
/// Events referencing these are never priced.
pub const NULL_TOKENS: &[&str] = &[
    "0x0000000000000000000000000000000000000000",
    "0x000000000000000000000000000000000000eeee",
];

/// Identity of one priceable point: (token, chainId, timestamp).
/// Token is always stored lowercase so lookups are case-insensitive
/// on the hex-address text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceKey {
    pub token: String,
    pub chain_id: i64,
    pub timestamp: i64,
}

impl PriceKey {
    /// Build a key, lowercasing the token address.
    pub fn new(token: &str, chain_id: i64, timestamp: i64) -> Self {
        Self {
            token: token.to_lowercase(),
            chain_id,
            timestamp,
        }
    }
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.token, self.chain_id, self.timestamp)
    }
}

/// The sole persisted entity. `price_usd = None` means "not yet resolved".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceRecord {
    pub token: String,
    pub chain_id: i64,
    pub timestamp: i64,
    pub price_usd: Option<f64>,
}

impl PriceRecord {
    /// A placeholder row awaiting backfill.
    pub fn placeholder(key: &PriceKey) -> Self {
        Self {
            token: key.token.clone(),
            chain_id: key.chain_id,
            timestamp: key.timestamp,
            price_usd: None,
        }
    }

    /// A fully resolved row.
    pub fn priced(key: &PriceKey, price_usd: f64) -> Self {
        Self {
            token: key.token.clone(),
            chain_id: key.chain_id,
            timestamp: key.timestamp,
            price_usd: Some(price_usd),
        }
    }

    pub fn key(&self) -> PriceKey {
        PriceKey {
            token: self.token.clone(),
            chain_id: self.chain_id,
            timestamp: self.timestamp,
        }
    }
}

/// A (token, chainId, timestamp) triple extracted from one upstream
/// activity event. Not persisted as-is; seeded into the price table
/// as a placeholder row by the backfill pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCandidate {
    pub token: String,
    pub chain_id: i64,
    pub timestamp: i64,
}

impl EventCandidate {
    pub fn key(&self) -> PriceKey {
        PriceKey::new(&self.token, self.chain_id, self.timestamp)
    }
}

/// True for the well-known sentinel "null token" addresses.
pub fn is_null_token(token: &str) -> bool {
    let token = token.to_lowercase();
    NULL_TOKENS.contains(&token.as_str())
}

/// Check the `0x` + 40 hex chars address format.
pub fn is_valid_token(token: &str) -> bool {
    let Some(hex) = token.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Storage-boundary format check. Rows that would violate the table's
/// address format constraint are rejected before touching the database.
pub fn validate_token_format(token: &str) -> Result<(), PriceError> {
    if is_valid_token(token) {
        Ok(())
    } else {
        Err(PriceError::InvalidRequest(format!(
            "malformed token address: '{}'",
            token
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

    #[test]
    fn test_key_lowercases_token() {
        let key = PriceKey::new(WETH, 1, 1_700_000_000);
        assert_eq!(key.token, WETH.to_lowercase());
    }

    #[test]
    fn test_mixed_case_keys_are_equal() {
        let a = PriceKey::new(WETH, 1, 1_700_000_000);
        let b = PriceKey::new(&WETH.to_lowercase(), 1, 1_700_000_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_null_token_detection() {
        assert!(is_null_token("0x0000000000000000000000000000000000000000"));
        assert!(is_null_token("0x000000000000000000000000000000000000eeee"));
        // Case-insensitive
        assert!(is_null_token("0x000000000000000000000000000000000000EEEE"));
        assert!(!is_null_token(WETH));
    }

    #[test]
    fn test_token_format_validation() {
        assert!(is_valid_token(WETH));
        assert!(is_valid_token(&WETH.to_lowercase()));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2")); // no 0x
        assert!(!is_valid_token("0x1234")); // too short
        assert!(!is_valid_token("0xzz2aaa39b223fe8d0a0e5c4f27ead9083c756cc2")); // non-hex

        assert!(validate_token_format(WETH).is_ok());
        assert!(matches!(
            validate_token_format("not-an-address"),
            Err(PriceError::InvalidRequest(_))
        ));
    }
}
