//! Bech32 account addresses and the prefix-independent account identifier.

use bech32::{FromBase32, ToBase32, Variant};
use std::fmt;
use thiserror::Error;

/// Address decoding/encoding failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid bech32 address '{address}': {reason}")]
    Malformed { address: String, reason: String },

    #[error("address '{0}' uses the bech32m checksum")]
    UnexpectedVariant(String),

    #[error("address '{0}' carries no account bytes")]
    Empty(String),

    #[error("cannot encode address with prefix '{prefix}': {reason}")]
    Encode { prefix: String, reason: String },
}

/// Raw account bytes behind a bech32 address. This is the ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountId(Vec<u8>);

impl AccountId {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode under the given human-readable prefix
    pub fn to_bech32(&self, prefix: &str) -> Result<String, AddressError> {
        bech32::encode(prefix, self.0.to_base32(), Variant::Bech32).map_err(|e| {
            AddressError::Encode {
                prefix: prefix.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// A decoded bech32 address: prefix plus account bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bech32Address {
    prefix: String,
    account: AccountId,
}

impl Bech32Address {
    /// Decode and validate a bech32 address string
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let address = address.trim();
        let (prefix, data, variant) =
            bech32::decode(address).map_err(|e| AddressError::Malformed {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        if variant != Variant::Bech32 {
            return Err(AddressError::UnexpectedVariant(address.to_string()));
        }

        let bytes = Vec::<u8>::from_base32(&data).map_err(|e| AddressError::Malformed {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

        if bytes.is_empty() {
            return Err(AddressError::Empty(address.to_string()));
        }

        Ok(Self {
            prefix,
            account: AccountId::new(bytes),
        })
    }

    pub fn from_account(prefix: impl Into<String>, account: AccountId) -> Self {
        Self {
            prefix: prefix.into(),
            account,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Canonical (lowercase) encoding under the address's own prefix
    pub fn encode(&self) -> Result<String, AddressError> {
        self.account.to_bech32(&self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: [u8; 20] = [
        0x1a, 0x2b, 0x3c, 0x4d, 0x5e, 0x6f, 0x70, 0x81, 0x92, 0xa3, 0xb4, 0xc5, 0xd6, 0xe7, 0xf8,
        0x09, 0x10, 0x21, 0x32, 0x43,
    ];

    #[test]
    fn test_parse_and_reencode() {
        let encoded = AccountId::new(ACCOUNT.to_vec()).to_bech32("terra").unwrap();
        assert!(encoded.starts_with("terra1"));

        let parsed = Bech32Address::parse(&encoded).unwrap();
        assert_eq!(parsed.prefix(), "terra");
        assert_eq!(parsed.account().as_bytes(), &ACCOUNT);
        assert_eq!(parsed.encode().unwrap(), encoded);
    }

    #[test]
    fn test_prefix_does_not_change_ledger_key() {
        let account = AccountId::new(ACCOUNT.to_vec());
        let terra = Bech32Address::parse(&account.to_bech32("terra").unwrap()).unwrap();
        let cosmos = Bech32Address::parse(&account.to_bech32("cosmos").unwrap()).unwrap();

        assert_ne!(terra.prefix(), cosmos.prefix());
        assert_eq!(terra.account(), cosmos.account());
        assert_eq!(terra.account().as_bytes(), cosmos.account().as_bytes());
    }

    #[test]
    fn test_uppercase_address_normalizes() {
        let encoded = AccountId::new(ACCOUNT.to_vec()).to_bech32("terra").unwrap();
        let parsed = Bech32Address::parse(&encoded.to_uppercase()).unwrap();
        assert_eq!(parsed.encode().unwrap(), encoded);
    }

    #[test]
    fn test_invalid_addresses() {
        let encoded = AccountId::new(ACCOUNT.to_vec()).to_bech32("terra").unwrap();
        let mut corrupted = encoded.clone();
        let last = corrupted.pop().unwrap();
        corrupted.push(if last == 'q' { 'p' } else { 'q' });

        for addr in ["", "terra", "not-an-address", corrupted.as_str()] {
            assert!(Bech32Address::parse(addr).is_err(), "accepted {:?}", addr);
        }
    }

    #[test]
    fn test_bech32m_rejected() {
        let encoded = bech32::encode("terra", ACCOUNT.to_base32(), Variant::Bech32m).unwrap();
        assert_eq!(
            Bech32Address::parse(&encoded),
            Err(AddressError::UnexpectedVariant(encoded.clone()))
        );
    }
}
