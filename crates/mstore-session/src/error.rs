//! Error types for the session crate.

use mstore_store::StoreError;
use mstore_types::{ErrorCode, FolderId, HandleId, MessageId, PropertyTag};

use crate::handle::ReferentKind;
use crate::policy::ObjectKind;

/// Errors returned by session operations.
///
/// Every failing save leaves the durable state, the staged buffer, and the
/// handle's access level exactly as they were before the call.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Save flags name no single supported directive.
    #[error("save flags not supported: 0x{0:02X}")]
    InvalidFlags(u8),

    /// The staged buffer writes a property the server owns.
    #[error("write to read-only property {tag:?} on {kind}")]
    ReadOnlyViolation { kind: ObjectKind, tag: PropertyTag },

    /// Save attempted through a handle that is read-only.
    #[error("{0} is open read-only")]
    ReadOnlyState(HandleId),

    /// The handle is stale or bound to a different kind of object.
    #[error("{handle} does not refer to a {expected}")]
    WrongReferentKind {
        handle: HandleId,
        expected: ReferentKind,
    },

    /// The folder does not exist.
    #[error("folder not found: {0}")]
    FolderNotFound(FolderId),

    /// The folder holds no such message.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// The message holds no such attachment (or it was deleted).
    #[error("attachment {0} not found")]
    AttachmentNotFound(u32),

    /// The attachment has no committed embedded message.
    #[error("attachment {0} has no embedded message")]
    EmbeddedMessageNotFound(u32),

    /// The property is not set on the object.
    #[error("property {0:?} not found")]
    PropertyNotFound(PropertyTag),

    /// The caller lacks the right to create messages in the folder.
    #[error("no create right on folder {0}")]
    NoCreateRight(FolderId),

    /// The caller lacks the right to modify the object.
    #[error("access denied: {0}")]
    PermissionDenied(String),

    #[error("unknown code page: 0x{0:04X}")]
    UnknownCodePage(u16),

    /// Another handle committed the object since this handle last saw it.
    #[error("{0} was modified by another handle")]
    ObjectModified(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// The status code a client receives for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidFlags(_) => ErrorCode::NOT_SUPPORTED,
            Self::ReadOnlyViolation { .. } | Self::ReadOnlyState(_) => ErrorCode::GENERAL_FAILURE,
            Self::WrongReferentKind { .. } => ErrorCode::NULL_OBJECT,
            Self::FolderNotFound(_)
            | Self::MessageNotFound(_)
            | Self::AttachmentNotFound(_)
            | Self::EmbeddedMessageNotFound(_)
            | Self::PropertyNotFound(_) => ErrorCode::NOT_FOUND,
            Self::NoCreateRight(_) => ErrorCode::NO_CREATE_RIGHT,
            Self::PermissionDenied(_) => ErrorCode::ACCESS_DENIED,
            Self::UnknownCodePage(_) => ErrorCode::UNKNOWN_CODE_PAGE,
            Self::ObjectModified(_) => ErrorCode::OBJECT_MODIFIED,
            Self::InvalidParameter(_) => ErrorCode::INVALID_PARAMETER,
            Self::Config(_) => ErrorCode::GENERAL_FAILURE,
            Self::Store(e) => match e {
                StoreError::FolderNotFound(_) | StoreError::MessageNotFound { .. } => {
                    ErrorCode::NOT_FOUND
                }
                StoreError::Conflict { .. } => ErrorCode::OBJECT_MODIFIED,
                _ => ErrorCode::GENERAL_FAILURE,
            },
        }
    }
}

/// Convenience alias for session results.
pub type SessionResult<T> = Result<T, SessionError>;
