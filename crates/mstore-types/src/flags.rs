//! Protocol flag words and enumerations.
//!
//! Flag words are built from their wire integers with `from_bits_retain`, so
//! unknown bits survive a round trip through the store untouched.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

bitflags! {
    /// The `SaveFlags` byte of a save request.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SaveFlags: u8 {
        const KEEP_OPEN_READ_ONLY = 0x01;
        const KEEP_OPEN_READ_WRITE = 0x02;
        const FORCE_SAVE = 0x04;
        /// May accompany exactly one base directive.
        const DELAYED_COMMIT = 0x08;
    }
}

/// The single commit directive a valid [`SaveFlags`] value names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaveMode {
    /// Commit, then demote the handle to read-only.
    KeepOpenReadOnly,
    /// Commit, handle stays writable.
    KeepOpenReadWrite,
    /// Commit regardless of concurrent changes, handle stays writable.
    ForceSave,
}

impl SaveFlags {
    /// Resolve to a single directive. Returns `None` when no base bit, or
    /// more than one base bit, is present.
    pub fn mode(self) -> Option<SaveMode> {
        match self.difference(Self::DELAYED_COMMIT).bits() {
            0x01 => Some(SaveMode::KeepOpenReadOnly),
            0x02 => Some(SaveMode::KeepOpenReadWrite),
            0x04 => Some(SaveMode::ForceSave),
            _ => None,
        }
    }

    pub fn is_delayed(self) -> bool {
        self.contains(Self::DELAYED_COMMIT)
    }
}

impl From<SaveMode> for SaveFlags {
    fn from(mode: SaveMode) -> Self {
        match mode {
            SaveMode::KeepOpenReadOnly => Self::KEEP_OPEN_READ_ONLY,
            SaveMode::KeepOpenReadWrite => Self::KEEP_OPEN_READ_WRITE,
            SaveMode::ForceSave => Self::FORCE_SAVE,
        }
    }
}

bitflags! {
    /// `PidTagMessageFlags` bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MessageFlags: u32 {
        const READ = 0x0000_0001;
        const UNMODIFIED = 0x0000_0002;
        const SUBMITTED = 0x0000_0004;
        const UNSENT = 0x0000_0008;
        const HAS_ATTACH = 0x0000_0010;
        const FROM_ME = 0x0000_0020;
        const FAI = 0x0000_0040;
        const RESEND = 0x0000_0080;
        const NOTIFY_READ = 0x0000_0100;
        const NOTIFY_UNREAD = 0x0000_0200;
        const EVER_READ = 0x0000_0400;
        const INTERNET = 0x0000_2000;
        const UNTRUSTED = 0x0000_8000;
    }
}

impl Default for MessageFlags {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// `PidTagMessageStatus` bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MessageStatus: u32 {
        const HIGHLIGHTED = 0x0000_0001;
        const TAGGED = 0x0000_0002;
        const HIDDEN = 0x0000_0004;
        const DEL_MARKED = 0x0000_0008;
        const DRAFT = 0x0000_0100;
        const ANSWERED = 0x0000_0200;
        const IN_CONFLICT = 0x0000_0800;
        const REMOTE_DOWNLOAD = 0x0000_1000;
        const REMOTE_DELETE = 0x0000_2000;
    }
}

impl MessageStatus {
    /// Bits selected by `mask` take their value from `status`; all others
    /// keep their current value, unknown bits included.
    pub const fn apply(self, status: Self, mask: Self) -> Self {
        Self::from_bits_retain((self.bits() & !mask.bits()) | (status.bits() & mask.bits()))
    }
}

bitflags! {
    /// Read-state directives of a set-read-flag request.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ReadFlags: u8 {
        const SUPPRESS_RECEIPT = 0x01;
        const CLEAR_READ_FLAG = 0x04;
        const GENERATE_RECEIPT_ONLY = 0x10;
        const CLEAR_NOTIFY_READ = 0x20;
        const CLEAR_NOTIFY_UNREAD = 0x40;
    }
}

impl ReadFlags {
    /// Compute the message flags that result from applying these directives.
    ///
    /// `GENERATE_RECEIPT_ONLY` leaves the read state alone and only clears
    /// pending notification requests.
    pub fn apply_to(self, flags: MessageFlags) -> MessageFlags {
        let mut out = flags;
        if !self.contains(Self::GENERATE_RECEIPT_ONLY) {
            if self.contains(Self::CLEAR_READ_FLAG) {
                out.remove(MessageFlags::READ);
            } else {
                out.insert(MessageFlags::READ | MessageFlags::EVER_READ);
            }
        }
        if self.intersects(Self::GENERATE_RECEIPT_ONLY | Self::CLEAR_NOTIFY_READ) {
            out.remove(MessageFlags::NOTIFY_READ);
        }
        if self.intersects(Self::CLEAR_NOTIFY_UNREAD | Self::SUPPRESS_RECEIPT) {
            out.remove(MessageFlags::NOTIFY_UNREAD);
        }
        out
    }
}

/// Per-handle access level, also exposed as `PidTagAccessLevel`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    ReadOnly = 0,
    Modify = 1,
}

impl AccessLevel {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub const fn can_modify(self) -> bool {
        matches!(self, Self::Modify)
    }
}

/// Open mode for an existing top-level message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageOpenMode {
    ReadOnly,
    ReadWrite,
    /// Read/write when the caller may modify, read-only otherwise.
    BestAccess,
}

impl MessageOpenMode {
    /// Decode the open-mode byte. Bits outside the recognized values are
    /// ignored rather than rejected.
    pub fn from_code(code: u8) -> Self {
        match code & 0x03 {
            0x01 => Self::ReadWrite,
            0x03 => Self::BestAccess,
            _ => Self::ReadOnly,
        }
    }
}

/// Open mode for an attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentOpenMode {
    ReadOnly,
    ReadWrite,
    BestAccess,
}

impl AttachmentOpenMode {
    pub fn from_code(code: u8) -> Result<Self, TypeError> {
        match code {
            0x00 => Ok(Self::ReadOnly),
            0x01 => Ok(Self::ReadWrite),
            0x03 => Ok(Self::BestAccess),
            other => Err(TypeError::UnknownOpenMode(other)),
        }
    }
}

/// Open mode for the message embedded in an attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddedOpenMode {
    ReadOnly,
    ReadWrite,
    /// Open the existing embedded message, or create one if absent.
    Create,
}

impl EmbeddedOpenMode {
    pub fn from_code(code: u8) -> Result<Self, TypeError> {
        match code {
            0x00 => Ok(Self::ReadOnly),
            0x01 => Ok(Self::ReadWrite),
            0x02 => Ok(Self::Create),
            other => Err(TypeError::UnknownOpenMode(other)),
        }
    }
}

/// A code page identifier supplied when creating or opening a message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodePage(u16);

impl CodePage {
    /// Use the code page of the logon.
    pub const USE_LOGON: Self = Self(0x0FFF);
    pub const UTF8: Self = Self(65001);
    pub const WINDOWS_1252: Self = Self(1252);

    const KNOWN: &'static [u16] = &[
        437, 850, 852, 866, 874, 932, 936, 949, 950, 1200, 1250, 1251, 1252, 1253, 1254, 1255,
        1256, 1257, 1258, 20127, 20866, 28591, 28592, 28595, 28597, 50220, 50221, 50222, 51932,
        51949, 52936, 54936, 65000, 65001,
    ];

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub fn is_known(self) -> bool {
        self == Self::USE_LOGON || Self::KNOWN.contains(&self.0)
    }

    /// Replace [`CodePage::USE_LOGON`] with the logon's code page.
    pub fn resolve(self, logon: CodePage) -> CodePage {
        if self == Self::USE_LOGON {
            logon
        } else {
            self
        }
    }
}

impl fmt::Debug for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodePage({})", self.0)
    }
}

/// `PidTagAttachMethod` values.
pub struct AttachMethod;

impl AttachMethod {
    pub const NONE: i32 = 0;
    pub const BY_VALUE: i32 = 1;
    pub const BY_REFERENCE: i32 = 2;
    pub const BY_REFERENCE_ONLY: i32 = 4;
    pub const EMBEDDED_MESSAGE: i32 = 5;
    pub const OLE: i32 = 6;
}

/// `PidTagObjectType` values.
pub struct ObjectType;

impl ObjectType {
    pub const FOLDER: i32 = 3;
    pub const MESSAGE: i32 = 5;
    pub const ATTACHMENT: i32 = 7;
}
