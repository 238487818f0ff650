//! The session: a handle table bound to a shared backing store.
//!
//! A [`Session`] is the unit a client talks to. Any number of sessions may
//! share one [`MessageStore`]; each keeps its own handles and staged state.
//! Message and attachment operations live in [`crate::message`] and
//! [`crate::attachment`].

use std::sync::Arc;

use mstore_store::{MessageStore, StoreError};
use mstore_types::{
    CodePage, FolderId, HandleId, MessageId, MessageStatus, PropertyBag, PropertyTag,
    PropertyValue, ReadFlags, SaveFlags,
};
use tracing::debug;

use crate::commit::SaveOutcome;
use crate::config::StoreConfig;
use crate::error::{SessionError, SessionResult};
use crate::handle::{HandleTable, ReferentKind, ServerObject};
use crate::object::{AttachmentObject, CommitState, FolderObject, MessageObject};

pub struct Session {
    pub(crate) store: Arc<dyn MessageStore>,
    pub(crate) config: StoreConfig,
    pub(crate) handles: HandleTable,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("handles", &self.handles.len())
            .field("behavior", &self.config.behavior)
            .finish()
    }
}

impl Session {
    pub fn new(store: Arc<dyn MessageStore>, config: StoreConfig) -> Self {
        Self {
            store,
            config,
            handles: HandleTable::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Number of live handles.
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Kind of object `handle` refers to, or `None` if it is not live.
    pub fn referent_kind(&self, handle: HandleId) -> Option<ReferentKind> {
        self.handles.kind(handle)
    }

    // ---------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------

    fn wrong_kind(handle: HandleId, expected: ReferentKind) -> SessionError {
        SessionError::WrongReferentKind { handle, expected }
    }

    pub(crate) fn folder_object(&self, handle: HandleId) -> SessionResult<&FolderObject> {
        match self.handles.get(handle).map(|e| &e.object) {
            Some(ServerObject::Folder(f)) => Ok(f),
            _ => Err(Self::wrong_kind(handle, ReferentKind::Folder)),
        }
    }

    pub(crate) fn message_object(&self, handle: HandleId) -> SessionResult<&MessageObject> {
        match self.handles.get(handle).map(|e| &e.object) {
            Some(ServerObject::Message(m)) => Ok(m),
            _ => Err(Self::wrong_kind(handle, ReferentKind::Message)),
        }
    }

    pub(crate) fn message_object_mut(
        &mut self,
        handle: HandleId,
    ) -> SessionResult<&mut MessageObject> {
        match self.handles.get_mut(handle).map(|e| &mut e.object) {
            Some(ServerObject::Message(m)) => Ok(m),
            _ => Err(Self::wrong_kind(handle, ReferentKind::Message)),
        }
    }

    pub(crate) fn attachment_object(&self, handle: HandleId) -> SessionResult<&AttachmentObject> {
        match self.handles.get(handle).map(|e| &e.object) {
            Some(ServerObject::Attachment(a)) => Ok(a),
            _ => Err(Self::wrong_kind(handle, ReferentKind::Attachment)),
        }
    }

    pub(crate) fn attachment_object_mut(
        &mut self,
        handle: HandleId,
    ) -> SessionResult<&mut AttachmentObject> {
        match self.handles.get_mut(handle).map(|e| &mut e.object) {
            Some(ServerObject::Attachment(a)) => Ok(a),
            _ => Err(Self::wrong_kind(handle, ReferentKind::Attachment)),
        }
    }

    /// Validate a requested code page and resolve "use logon".
    pub(crate) fn check_code_page(&self, code_page: CodePage) -> SessionResult<CodePage> {
        if !code_page.is_known() {
            return Err(SessionError::UnknownCodePage(code_page.as_u16()));
        }
        Ok(code_page.resolve(self.config.logon.code_page))
    }

    // ---------------------------------------------------------------
    // Handles
    // ---------------------------------------------------------------

    /// Release a handle and every handle opened through it. Staged changes
    /// that were never saved are dropped. Releasing a handle that is not
    /// live does nothing.
    pub fn release(&mut self, handle: HandleId) {
        for released in self.handles.release(handle) {
            debug!(handle = %released, "handle released");
        }
    }

    /// Save whatever `handle` refers to.
    pub fn save(&mut self, handle: HandleId, flags: SaveFlags) -> SessionResult<SaveOutcome> {
        match self.handles.kind(handle) {
            Some(ReferentKind::Attachment) => {
                self.save_attachment(handle, flags).map(SaveOutcome::Attachment)
            }
            _ => self.save_message(handle, flags).map(SaveOutcome::Message),
        }
    }

    /// Commit state of a message or attachment handle.
    pub fn commit_state(&self, handle: HandleId) -> SessionResult<CommitState> {
        match self.handles.get(handle).map(|e| &e.object) {
            Some(ServerObject::Message(m)) => Ok(m.state),
            Some(ServerObject::Attachment(a)) => Ok(a.state),
            _ => Err(Self::wrong_kind(handle, ReferentKind::Message)),
        }
    }

    // ---------------------------------------------------------------
    // Folders
    // ---------------------------------------------------------------

    /// Open a folder the logon layer has already resolved.
    pub fn open_folder(&mut self, folder: FolderId) -> SessionResult<HandleId> {
        if self.store.folder(folder)?.is_none() {
            return Err(SessionError::FolderNotFound(folder));
        }
        let handle = self
            .handles
            .allocate(None, ServerObject::Folder(FolderObject { id: folder }));
        debug!(%handle, %folder, "folder opened");
        Ok(handle)
    }

    /// Committed messages in a folder's normal or associated contents.
    pub fn contents(&self, folder: HandleId, associated: bool) -> SessionResult<Vec<MessageId>> {
        let folder = self.folder_object(folder)?.id;
        Ok(self.store.list_messages(folder, associated)?)
    }

    pub fn row_count(&self, folder: HandleId, associated: bool) -> SessionResult<usize> {
        let folder = self.folder_object(folder)?.id;
        Ok(self.store.message_count(folder, associated)?)
    }

    /// Delete messages from a folder. Commits immediately; returns how many
    /// existed.
    pub fn delete_messages(&mut self, folder: HandleId, ids: &[MessageId]) -> SessionResult<usize> {
        let folder = self.folder_object(folder)?.id;
        let deleted = self.store.delete_messages(folder, ids)?;
        debug!(%folder, requested = ids.len(), deleted, "messages deleted");
        Ok(deleted)
    }

    /// Update the status bits selected by `mask`, returning the previous
    /// status. Commits immediately; no message handle is needed.
    pub fn set_message_status(
        &mut self,
        folder: HandleId,
        message: MessageId,
        status: MessageStatus,
        mask: MessageStatus,
    ) -> SessionResult<MessageStatus> {
        let folder = self.folder_object(folder)?.id;
        self.store
            .set_message_status(folder, message, status, mask)
            .map_err(|e| not_found_as_message(e, message))
    }

    pub fn get_message_status(
        &self,
        folder: HandleId,
        message: MessageId,
    ) -> SessionResult<MessageStatus> {
        let folder = self.folder_object(folder)?.id;
        let record = self
            .store
            .read_message(folder, message)?
            .ok_or(SessionError::MessageNotFound(message))?;
        let bits = record
            .content
            .properties
            .i32(mstore_types::tags::MESSAGE_STATUS)
            .unwrap_or(0);
        Ok(MessageStatus::from_bits_retain(bits as u32))
    }

    /// Apply read-state directives to several messages. Commits
    /// immediately. Returns `true` (partial completion) if any message
    /// could not be found.
    pub fn set_read_flags(
        &mut self,
        folder: HandleId,
        messages: &[MessageId],
        flags: ReadFlags,
    ) -> SessionResult<bool> {
        let folder = self.folder_object(folder)?.id;
        let mut partial = false;
        for id in messages {
            match self.store.update_flags(folder, *id, &|f| flags.apply_to(f)) {
                Ok(_) => {}
                Err(StoreError::MessageNotFound { .. }) => partial = true,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(partial)
    }

    // ---------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------

    /// Properties of a message or attachment as seen through `handle`,
    /// staged changes included.
    pub fn get_all_properties(&self, handle: HandleId) -> SessionResult<PropertyBag> {
        match self.handles.get(handle).map(|e| &e.object) {
            Some(ServerObject::Message(m)) => Ok(m.view()),
            Some(ServerObject::Attachment(a)) => Ok(a.view()),
            _ => Err(Self::wrong_kind(handle, ReferentKind::Message)),
        }
    }

    fn lookup(&self, handle: HandleId, tag: PropertyTag) -> SessionResult<Option<PropertyValue>> {
        match self.handles.get(handle).map(|e| &e.object) {
            Some(ServerObject::Message(m)) => Ok(m.lookup(tag)),
            Some(ServerObject::Attachment(a)) => Ok(a.lookup(tag)),
            _ => Err(Self::wrong_kind(handle, ReferentKind::Message)),
        }
    }

    pub fn get_property(&self, handle: HandleId, tag: PropertyTag) -> SessionResult<PropertyValue> {
        self.lookup(handle, tag)?
            .ok_or(SessionError::PropertyNotFound(tag))
    }

    /// Values for several tags; `None` where a tag is not set.
    pub fn get_properties(
        &self,
        handle: HandleId,
        tags: &[PropertyTag],
    ) -> SessionResult<Vec<Option<PropertyValue>>> {
        tags.iter().map(|t| self.lookup(handle, *t)).collect()
    }

    /// Stage a property write. Read-only properties are accepted here and
    /// judged when the object is saved.
    pub fn set_property(
        &mut self,
        handle: HandleId,
        tag: PropertyTag,
        value: PropertyValue,
    ) -> SessionResult<()> {
        let staged = match self.handles.get_mut(handle).map(|e| &mut e.object) {
            Some(ServerObject::Message(m)) => &mut m.staged,
            Some(ServerObject::Attachment(a)) => &mut a.staged,
            _ => return Err(Self::wrong_kind(handle, ReferentKind::Message)),
        };
        staged
            .set(tag, value)
            .map_err(|e| SessionError::InvalidParameter(e.to_string()))?;
        debug!(%handle, ?tag, "property staged");
        Ok(())
    }

    /// Stage several writes. Either all are staged or none are.
    pub fn set_properties(
        &mut self,
        handle: HandleId,
        values: Vec<(PropertyTag, PropertyValue)>,
    ) -> SessionResult<()> {
        if let Some((tag, value)) = values.iter().find(|(t, v)| v.prop_type() != t.prop_type) {
            return Err(SessionError::InvalidParameter(format!(
                "{tag:?} cannot hold a {:?} value",
                value.prop_type()
            )));
        }
        for (tag, value) in values {
            self.set_property(handle, tag, value)?;
        }
        Ok(())
    }

    /// Stage removal of a property.
    pub fn delete_property(&mut self, handle: HandleId, tag: PropertyTag) -> SessionResult<()> {
        if self.lookup(handle, tag)?.is_none() {
            return Err(SessionError::PropertyNotFound(tag));
        }
        let staged = match self.handles.get_mut(handle).map(|e| &mut e.object) {
            Some(ServerObject::Message(m)) => &mut m.staged,
            Some(ServerObject::Attachment(a)) => &mut a.staged,
            _ => return Err(Self::wrong_kind(handle, ReferentKind::Message)),
        };
        staged.remove(tag);
        debug!(%handle, ?tag, "property removal staged");
        Ok(())
    }
}

pub(crate) fn not_found_as_message(err: StoreError, message: MessageId) -> SessionError {
    match err {
        StoreError::MessageNotFound { .. } => SessionError::MessageNotFound(message),
        other => other.into(),
    }
}
