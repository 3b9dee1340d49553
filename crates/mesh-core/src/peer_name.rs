//! Peer identifiers.
//!
//! A peer name is 48 bits, written as six colon-separated hex octets:
//!   00:00:00:00:00:01
//!
//! The all-zero name is reserved as the "no next hop" sentinel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const NAME_BYTES: usize = 6;
const NAME_MASK: u64 = (1 << (NAME_BYTES * 8)) - 1;

/// Opaque, totally ordered identifier of a mesh peer.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerName(u64);

impl PeerName {
    /// Sentinel meaning "no next hop". The local peer's own unicast entry
    /// always maps to this.
    pub const UNKNOWN: PeerName = PeerName(0);

    /// Build a name from its numeric form. Bits above 48 are discarded.
    pub const fn from_u64(value: u64) -> Self {
        Self(value & NAME_MASK)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }

    /// Accept either a literal name (`aa:bb:cc:dd:ee:ff`) or any other
    /// string, which is hashed down to a name with BLAKE3.
    pub fn from_user_input(input: &str) -> Self {
        if let Ok(name) = input.parse() {
            return name;
        }
        let digest = blake3::hash(input.as_bytes());
        let mut bytes = [0u8; 8];
        bytes[2..].copy_from_slice(&digest.as_bytes()[..NAME_BYTES]);
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        let octets = &bytes[8 - NAME_BYTES..];
        for (i, octet) in octets.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{octet:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerNameError {
    #[error("peer name {0:?} must be six colon-separated hex octets")]
    Malformed(String),
}

impl FromStr for PeerName {
    type Err = PeerNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PeerNameError::Malformed(s.to_string());

        let mut value = 0u64;
        let mut count = 0;
        for part in s.split(':') {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) || count == NAME_BYTES {
                return Err(malformed());
            }
            let octet = u8::from_str_radix(part, 16).map_err(|_| malformed())?;
            value = (value << 8) | u64::from(octet);
            count += 1;
        }
        if count != NAME_BYTES {
            return Err(malformed());
        }
        Ok(Self(value))
    }
}

impl TryFrom<String> for PeerName {
    type Error = PeerNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeerName> for String {
    fn from(name: PeerName) -> Self {
        name.to_string()
    }
}
