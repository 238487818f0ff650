use std::fmt;

use serde::{Deserialize, Serialize};

/// A 32-bit status code as returned to protocol clients.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(u32);

impl ErrorCode {
    pub const SUCCESS: Self = Self(0x0000_0000);
    pub const GENERAL_FAILURE: Self = Self(0x8000_4005);
    pub const NOT_SUPPORTED: Self = Self(0x8004_0102);
    pub const NULL_OBJECT: Self = Self(0x0000_04B9);
    pub const NOT_FOUND: Self = Self(0x8004_010F);
    pub const ACCESS_DENIED: Self = Self(0x8007_0005);
    pub const NO_CREATE_RIGHT: Self = Self(0x0000_04FF);
    pub const UNKNOWN_CODE_PAGE: Self = Self(0x0000_03EF);
    pub const OBJECT_MODIFIED: Self = Self(0x8004_0109);
    pub const INVALID_PARAMETER: Self = Self(0x8007_0057);
    pub const PARTIAL_COMPLETION: Self = Self(0x0004_0680);

    const NAMES: &'static [(Self, &'static str)] = &[
        (Self::SUCCESS, "Success"),
        (Self::GENERAL_FAILURE, "ecError"),
        (Self::NOT_SUPPORTED, "ecNotSupported"),
        (Self::NULL_OBJECT, "ecNullObject"),
        (Self::NOT_FOUND, "ecNotFound"),
        (Self::ACCESS_DENIED, "ecAccessDenied"),
        (Self::NO_CREATE_RIGHT, "ecNoCreateRight"),
        (Self::UNKNOWN_CODE_PAGE, "ecUnknownCodepage"),
        (Self::OBJECT_MODIFIED, "ecObjectModified"),
        (Self::INVALID_PARAMETER, "ecInvalidParam"),
        (Self::PARTIAL_COMPLETION, "ecPartialCompletion"),
    ];

    pub const fn from_u32(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Symbolic name, if this is a code the store produces.
    pub fn name(self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .find(|(code, _)| *code == self)
            .map(|(_, name)| *name)
    }

    /// Look up by symbolic name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(code, _)| *code)
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorCode(0x{:08X})", self.0)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:08X})", self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        assert_eq!(ErrorCode::from_name("ecobjectmodified"), Some(ErrorCode::OBJECT_MODIFIED));
        assert_eq!(ErrorCode::NOT_SUPPORTED.name(), Some("ecNotSupported"));
        assert_eq!(ErrorCode::from_u32(0x1234).name(), None);
    }

    #[test]
    fn display_includes_hex() {
        assert_eq!(ErrorCode::GENERAL_FAILURE.to_string(), "ecError (0x80004005)");
        assert!(ErrorCode::SUCCESS.is_success());
    }
}
