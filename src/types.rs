// src/types.rs
//! Core identifiers and the per-call context threaded through every
//! mutating ledger operation.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Value in base units (10^18 base units per coin)
pub type Value = u128;

/// Base units per whole coin
pub const COIN_UNIT: Value = 1_000_000_000_000_000_000;

/// Per-opener channel sequence number
pub type ChannelId = u64;

/// Fixed-size byte identifiers rendered as `0x`-prefixed hex.
macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let arr: [u8; $len] = bytes.try_into().ok()?;
                Some(Self(arr))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let stripped = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(stripped)
                    .map_err(|e| format!("invalid hex for {}: {}", stringify!($name), e))?;
                Self::from_slice(&bytes).ok_or_else(|| {
                    format!(
                        "invalid length for {}: expected {} bytes, got {}",
                        stringify!($name),
                        $len,
                        bytes.len()
                    )
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// 20-byte account address
    Address,
    20
);

hex_id!(
    /// 32-byte relayer identifier derived from its domain string
    RelayerKey,
    32
);

/// Globally unique handle of a channel: ids are scoped per opener
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub opener: Address,
    pub id: ChannelId,
}

impl ChannelRef {
    pub fn new(opener: Address, id: ChannelId) -> Self {
        Self { opener, id }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.opener, self.id)
    }
}

/// Authenticated caller, attached value and block time of a single call.
///
/// The hosting runtime authenticates `caller` and binds `attached_value`
/// before the call reaches the ledger; the ledger never infers either from
/// call parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub attached_value: Value,
    /// Block timestamp in unix seconds
    pub timestamp: u64,
}

impl CallContext {
    /// Call without attached value
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self {
            caller,
            attached_value: 0,
            timestamp,
        }
    }

    pub fn with_value(caller: Address, attached_value: Value, timestamp: u64) -> Self {
        Self {
            caller,
            attached_value,
            timestamp,
        }
    }
}

/// Parse a decimal coin amount such as `"0.0001"` into base units.
///
/// Integer-only; rejects more than 18 fractional digits and overflow.
pub fn parse_coins(s: &str) -> Option<Value> {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    let digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if frac.len() > 18 || !digits(whole) || !digits(frac) {
        return None;
    }
    let whole: Value = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_units: Value = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<18}", frac);
        padded.parse().ok()?
    };
    whole.checked_mul(COIN_UNIT)?.checked_add(frac_units)
}
