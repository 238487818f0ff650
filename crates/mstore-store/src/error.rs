use mstore_types::{FolderId, MessageId};

/// Errors from message store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested folder does not exist.
    #[error("folder not found: {0}")]
    FolderNotFound(FolderId),

    /// The requested message does not exist in the folder.
    #[error("message not found: {message} in {folder}")]
    MessageNotFound { folder: FolderId, message: MessageId },

    /// A conditional write found a different generation than expected.
    #[error("write conflict on {message}: expected {expected:?}, found {found:?}")]
    Conflict {
        message: MessageId,
        expected: Option<u64>,
        found: Option<u64>,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
