//! Collateral token address → type discriminant mapping.

use std::collections::HashMap;

use alloy::primitives::Address;

use crate::error::AppError;

/// Configured mapping from collateral token address to its integer type.
///
/// Parsed once from a JSON object such as
/// `{"0x4200…0006": 0, "0x8335…2913": 1}`. Keys are parsed as addresses, so
/// lookups ignore hex letter case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTypeMap {
    types: HashMap<Address, i32>,
}

impl TokenTypeMap {
    /// Type returned for addresses missing from the map.
    pub const UNKNOWN: i32 = 0;

    /// Parses the JSON mapping.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the JSON is malformed or a key is not
    /// a 20-byte hex address.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let entries: HashMap<String, i32> = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("invalid token address map: {e}")))?;

        let mut types = HashMap::with_capacity(entries.len());
        for (key, kind) in entries {
            let address: Address = key
                .parse()
                .map_err(|e| AppError::Config(format!("invalid token address {key}: {e}")))?;
            types.insert(address, kind);
        }
        Ok(Self { types })
    }

    /// Resolves the type for `address`, falling back to [`Self::UNKNOWN`].
    #[must_use]
    pub fn resolve(&self, address: &Address) -> i32 {
        self.types.get(address).copied().unwrap_or(Self::UNKNOWN)
    }

    /// Number of configured tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no token is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    const TOSHI: Address = address!("0xac1bd2486aaf3b5c0fc3fd868558b082a531b2b4");

    #[test]
    fn resolves_regardless_of_case() {
        let map = TokenTypeMap::from_json(
            r#"{
                "0xAC1Bd2486aAf3B5C0fc3Fd868558b082a531B2B4": 0,
                "0x4ed4e862860bed51a9570b96d89af5e1b0efefed": 1
            }"#,
        );
        let Ok(map) = map else {
            panic!("valid map");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve(&TOSHI), 0);
        assert_eq!(
            map.resolve(&address!("0x4ed4e862860bed51a9570b96d89af5e1b0efefed")),
            1
        );
    }

    #[test]
    fn unknown_address_is_type_zero() {
        let map = TokenTypeMap::default();
        assert!(map.is_empty());
        assert_eq!(map.resolve(&Address::repeat_byte(0x11)), TokenTypeMap::UNKNOWN);
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(matches!(
            TokenTypeMap::from_json("not json"),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            TokenTypeMap::from_json(r#"{"0x1234": 1}"#),
            Err(AppError::Config(_))
        ));
    }
}
