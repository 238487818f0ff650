use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const COUNTER_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

macro_rules! store_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Compose from a 16-bit replica id and a 48-bit global counter.
            pub const fn from_parts(replica: u16, counter: u64) -> Self {
                Self(((counter & COUNTER_MASK) << 16) | replica as u64)
            }

            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn as_u64(self) -> u64 {
                self.0
            }

            pub const fn replica(self) -> u16 {
                (self.0 & 0xFFFF) as u16
            }

            pub const fn counter(self) -> u64 {
                self.0 >> 16
            }

            /// Little-endian wire bytes.
            pub fn to_bytes(self) -> [u8; 8] {
                self.0.to_le_bytes()
            }

            pub fn to_hex(self) -> String {
                hex::encode(self.0.to_be_bytes())
            }

            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                let s = s.strip_prefix(concat!($prefix, ":")).unwrap_or(s);
                let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
                let arr: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| TypeError::InvalidHex(s.to_string()))?;
                Ok(Self(u64::from_be_bytes(arr)))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({}-{})"), self.replica(), self.counter())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.to_hex())
            }
        }
    };
}

store_id!(
    /// Identifier of a message, unique within its store.
    MessageId,
    "mid"
);

store_id!(
    /// Identifier of a folder.
    FolderId,
    "fid"
);

/// A session-scoped reference to a server object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(u32);

impl HandleId {
    /// The reserved "no object" handle value.
    pub const INVALID: Self = Self(0xFFFF_FFFF);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleId({})", self.0)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}
