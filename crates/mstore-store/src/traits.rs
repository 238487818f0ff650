use mstore_types::{FolderId, MessageFlags, MessageId, MessageStatus};

use crate::error::StoreResult;
use crate::record::{FlagsUpdate, FolderRecord, FolderRights, MessageRecord, MessageWrite};

/// Durable backend for folders and top-level messages.
///
/// All implementations must satisfy these invariants:
/// - A message record is replaced whole by [`write_message`]; readers never
///   observe half of a write.
/// - Every successful write of a message increments its generation.
/// - The [`WriteCondition`](crate::WriteCondition) of a write is evaluated
///   atomically with the write itself.
/// - Message ids are never reused, including after deletion.
///
/// [`write_message`]: MessageStore::write_message
pub trait MessageStore: Send + Sync {
    /// Create a folder and return its id.
    fn create_folder(&self, name: &str, rights: FolderRights) -> StoreResult<FolderId>;

    /// Read a folder record.
    ///
    /// Returns `Ok(None)` if the folder does not exist.
    fn folder(&self, id: FolderId) -> StoreResult<Option<FolderRecord>>;

    /// Replace the rights the current user holds on a folder.
    fn set_folder_rights(&self, id: FolderId, rights: FolderRights) -> StoreResult<()>;

    /// Reserve a fresh message id.
    fn allocate_message_id(&self) -> StoreResult<MessageId>;

    /// Read a committed message.
    ///
    /// Returns `Ok(None)` if the message does not exist in the folder.
    fn read_message(&self, folder: FolderId, id: MessageId) -> StoreResult<Option<MessageRecord>>;

    /// Write a whole message record and return its new generation.
    fn write_message(&self, write: MessageWrite) -> StoreResult<u64>;

    /// Delete a message. Returns `true` if the message existed.
    fn delete_message(&self, folder: FolderId, id: MessageId) -> StoreResult<bool>;

    /// Ids of the messages in a folder's normal or associated contents.
    fn list_messages(&self, folder: FolderId, associated: bool) -> StoreResult<Vec<MessageId>>;

    /// Update the status bits selected by `mask` and return the previous
    /// status. Commits immediately.
    fn set_message_status(
        &self,
        folder: FolderId,
        id: MessageId,
        status: MessageStatus,
        mask: MessageStatus,
    ) -> StoreResult<MessageStatus>;

    /// Rewrite a message's flags in place. Commits immediately; the
    /// generation only moves when the flags actually change.
    fn update_flags(
        &self,
        folder: FolderId,
        id: MessageId,
        update: &dyn Fn(MessageFlags) -> MessageFlags,
    ) -> StoreResult<FlagsUpdate>;

    /// Number of messages in a folder's normal or associated contents.
    ///
    /// Default implementation counts [`list_messages`](MessageStore::list_messages).
    fn message_count(&self, folder: FolderId, associated: bool) -> StoreResult<usize> {
        Ok(self.list_messages(folder, associated)?.len())
    }

    /// Delete several messages. Returns how many existed.
    ///
    /// Default implementation calls `delete_message()` for each id.
    fn delete_messages(&self, folder: FolderId, ids: &[MessageId]) -> StoreResult<usize> {
        let mut deleted = 0;
        for id in ids {
            if self.delete_message(folder, *id)? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}
