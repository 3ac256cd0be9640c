// 1.0: all the primitives live here. nothing in the exchange works without these types.
// identities, unit ids, trade direction, fee rates, timestamps. each is a newtype so the
// compiler catches mixups between a supply count and a base-asset amount.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fee rates are expressed in parts per 1e9.
pub const RATE_DENOMINATOR: u64 = 1_000_000_000;

/// Decimal places of the base asset (9, one whole unit = 1e9 atomic units).
pub const BASE_DECIMALS: u32 = 9;

pub const IDENTITY_LEN: usize = 32;

/// Opaque fixed-length account identifier. Subjects, traders, and the
/// protocol fee destination are all identities.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    pub const ZERO: Identity = Identity([0u8; IDENTITY_LEN]);

    pub const fn new(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Big-endian placement in the low bytes, so ordering follows `n`.
    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; IDENTITY_LEN];
        bytes[IDENTITY_LEN - 8..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Last four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        format!("0x..{}", hex::encode(&self.0[IDENTITY_LEN - 4..]))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdentityParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

impl FromStr for Identity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(digits)?;
        let bytes: [u8; IDENTITY_LEN] = raw
            .as_slice()
            .try_into()
            .map_err(|_| IdentityParseError::Length(raw.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 1.1: id of a discrete funding unit (a coin object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// 1.2: trade direction. Issue is a buy of one's own line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Buy,
    Sell,
    Issue,
}

impl Direction {
    /// Buy and Issue pay the curve; Sell is paid by it.
    pub fn is_buy(&self) -> bool {
        matches!(self, Direction::Buy | Direction::Issue)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
            Direction::Issue => write!(f, "issue"),
        }
    }
}

/// 1.3: fee rate in parts per 1e9. 30_000_000 = 3%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeRate(u64);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(0);

    pub const fn from_ppb(ppb: u64) -> Self {
        Self(ppb)
    }

    /// Exact conversion from a fraction such as `0.03`. Rejects negative
    /// values and fractions finer than one part per 1e9.
    #[must_use]
    pub fn from_fraction(fraction: Decimal) -> Option<Self> {
        if fraction.is_sign_negative() {
            return None;
        }
        let scaled = fraction.checked_mul(Decimal::from(RATE_DENOMINATOR))?;
        if !scaled.fract().is_zero() {
            return None;
        }
        scaled.to_u64().map(Self)
    }

    pub fn ppb(&self) -> u64 {
        self.0
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::from_i128_with_scale(self.0 as i128, BASE_DECIMALS).normalize()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.as_fraction() * Decimal::ONE_HUNDRED).normalize())
    }
}

/// Atomic base-asset amount as a whole-unit decimal (400_000_000 -> 0.4).
pub fn amount_to_decimal(amount: u64) -> Decimal {
    Decimal::from_i128_with_scale(amount as i128, BASE_DECIMALS).normalize()
}

/// 1.4: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}
