//! Wei and token amount types.
//!
//! Amounts are represented as fixed-point integers (u128) to avoid floating-point errors.
//! Both wei and tokens carry 18 decimals: `1 ether` of either is `10^18` raw units.
//!
//! Human-readable formats (TOML, JSON) carry amounts as decimal strings so values
//! beyond `i64` survive, and accept a unit suffix: `"1.5 ether"`, `"200 tokens"`.
//! Binary formats carry the raw integer.

use crate::error::CrowdsaleError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Raw wei in one ether.
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Raw token units in one whole token.
pub const TOKEN_UNIT: u128 = WEI_PER_ETHER;

const DECIMALS: usize = 18;

/// Parse an amount string into raw units.
///
/// A bare integer is taken as raw units. A number followed by `ether` or
/// `tokens` is taken in whole units and may carry up to 18 fractional digits.
pub fn parse_units(input: &str) -> Result<u128, CrowdsaleError> {
    let invalid = || CrowdsaleError::InvalidAmount(input.to_string());
    let trimmed = input.trim();

    let (number, scaled) = match trimmed
        .strip_suffix("ether")
        .or_else(|| trimmed.strip_suffix("tokens"))
    {
        Some(rest) => (rest.trim_end(), true),
        None => (trimmed, false),
    };

    let (whole, frac) = match number.split_once('.') {
        Some((whole, frac)) if scaled => (whole, frac),
        Some(_) => return Err(invalid()),
        None => (number, ""),
    };

    if whole.is_empty() || frac.len() > DECIMALS {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    // All digits by now, so a parse failure can only mean overflow.
    let whole: u128 = whole.parse().map_err(|_| CrowdsaleError::AmountOverflow)?;
    if !scaled {
        return Ok(whole);
    }

    let frac_raw: u128 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<width$}", width = DECIMALS)
            .parse()
            .map_err(|_| invalid())?
    };

    whole
        .checked_mul(WEI_PER_ETHER)
        .and_then(|w| w.checked_add(frac_raw))
        .ok_or(CrowdsaleError::AmountOverflow)
}

struct RawVisitor;

impl<'de> Visitor<'de> for RawVisitor {
    type Value = u128;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or an amount string such as \"1.5 ether\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
        parse_units(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
        Ok(u128::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
        u128::try_from(v).map_err(|_| E::custom("amount must not be negative"))
    }
}

macro_rules! raw_amount {
    ($(#[$meta:meta])* $name:ident, $unit:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u128);

        impl $name {
            pub const ZERO: Self = Self(0);

            pub const fn new(raw: u128) -> Self {
                Self(raw)
            }

            /// Whole units (10^18 raw each), `None` on overflow.
            pub fn from_whole(whole: u128) -> Option<Self> {
                whole.checked_mul(WEI_PER_ETHER).map(Self)
            }

            pub fn raw(&self) -> u128 {
                self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == 0
            }

            pub fn checked_add(self, other: Self) -> Option<Self> {
                self.0.checked_add(other.0).map(Self)
            }

            pub fn checked_sub(self, other: Self) -> Option<Self> {
                self.0.checked_sub(other.0).map(Self)
            }

            pub fn saturating_sub(self, other: Self) -> Self {
                Self(self.0.saturating_sub(other.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", self.0, $unit)
            }
        }

        impl FromStr for $name {
            type Err = CrowdsaleError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_units(s).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.collect_str(&self.0)
                } else {
                    serializer.serialize_u128(self.0)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    deserializer.deserialize_any(RawVisitor).map(Self)
                } else {
                    u128::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

raw_amount!(
    /// Wei: the contributed currency, in raw units.
    Wei,
    "wei"
);

raw_amount!(
    /// Token amount: the issued sale token, in raw units.
    TokenAmount,
    "tokens"
);

impl Wei {
    /// Tokens issued for this much wei at `rate` tokens per wei.
    pub fn to_tokens(self, rate: u128) -> Option<TokenAmount> {
        self.0.checked_mul(rate).map(TokenAmount)
    }
}

impl TokenAmount {
    /// `floor(self × pct / 100)`.
    pub fn percent(self, pct: u128) -> Option<TokenAmount> {
        self.0.checked_mul(pct).map(|v| TokenAmount(v / 100))
    }
}
