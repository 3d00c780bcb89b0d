//! Account identifier, a 20-byte address written as `0x`-prefixed hex.

use crate::error::CrowdsaleError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A participant address.
///
/// The all-zero address stands for "no account": a purchase naming it as the
/// referrer is treated as unreferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId([u8; 20]);

impl AccountId {
    /// The standard prefix for textual addresses.
    pub const PREFIX: &'static str = "0x";

    /// The null address.
    pub const ZERO: Self = Self([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build an address whose low 8 bytes hold `n` (big-endian).
    ///
    /// Handy for tests and scripted simulations: `from_low_u64(1)` is `0x00…01`.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = CrowdsaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| CrowdsaleError::InvalidAddress(s.to_string()))?;
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| CrowdsaleError::InvalidAddress(format!("{s}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            struct AddressVisitor;

            impl<'de> Visitor<'de> for AddressVisitor {
                type Value = AccountId;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("a 0x-prefixed 20-byte hex address")
                }

                fn visit_str<E: de::Error>(self, v: &str) -> Result<AccountId, E> {
                    v.parse().map_err(E::custom)
                }
            }

            deserializer.deserialize_str(AddressVisitor)
        } else {
            <[u8; 20]>::deserialize(deserializer).map(Self)
        }
    }
}
