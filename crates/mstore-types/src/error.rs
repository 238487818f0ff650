use thiserror::Error;

use crate::property::{PropertyTag, PropertyType};

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown property type: 0x{0:04X}")]
    UnknownPropertyType(u16),

    #[error("type mismatch for {tag}: value is {actual:?}")]
    TypeMismatch {
        tag: PropertyTag,
        actual: PropertyType,
    },

    #[error("invalid property tag: {0}")]
    InvalidTag(String),

    #[error("unknown open mode: 0x{0:02X}")]
    UnknownOpenMode(u8),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}
