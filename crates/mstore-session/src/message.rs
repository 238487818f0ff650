//! Message lifecycle: create, open, save, read state.

use mstore_store::{EmbeddedMessage, MessageContent, MessageWrite, StoreError, WriteCondition};
use mstore_types::{
    tags, AccessLevel, CodePage, FileTime, FolderId, HandleId, MessageFlags, MessageId,
    MessageOpenMode, PropertyValue, ReadFlags, SaveFlags, SaveMode,
};
use tracing::{debug, info, warn};

use crate::commit::{
    access_after_save, conflict_blocks, resolve_mode, screen_read_only, stamp_message, Durability,
    MessageSaveOutcome,
};
use crate::config::{ConcurrentSavePolicy, ProductBehavior};
use crate::error::{SessionError, SessionResult};
use crate::handle::ServerObject;
use crate::object::{initial_message_properties, CommitState, MessageObject, MessageOrigin};
use crate::policy::ObjectKind;
use crate::session::{not_found_as_message, Session};

/// Write precondition for a top-level save.
fn write_condition(
    base: Option<u64>,
    mode: SaveMode,
    behavior: &ProductBehavior,
) -> WriteCondition {
    match base {
        None => WriteCondition::Create,
        Some(generation)
            if mode != SaveMode::ForceSave
                && behavior.concurrent_save == ConcurrentSavePolicy::Reject =>
        {
            WriteCondition::Generation(generation)
        }
        Some(_) => WriteCondition::Unconditional,
    }
}

/// Handle state after a successful save.
struct Committed {
    id: MessageId,
    content: MessageContent,
    revision: u64,
    access: AccessLevel,
}

impl Session {
    /// Create a new message in a folder. Nothing is written until the
    /// message is saved; releasing the handle first discards it.
    pub fn create_message(
        &mut self,
        folder: HandleId,
        code_page: CodePage,
        associated: bool,
    ) -> SessionResult<HandleId> {
        let folder = self.folder_object(folder)?.id;
        let code_page = self.check_code_page(code_page)?;
        let record = self
            .store
            .folder(folder)?
            .ok_or(SessionError::FolderNotFound(folder))?;
        if !record.rights.create {
            return Err(SessionError::NoCreateRight(folder));
        }

        let properties =
            initial_message_properties(associated, code_page, &self.config, FileTime::now());
        let object = MessageObject::created(
            MessageOrigin::Folder { folder, associated },
            properties,
            code_page,
        );
        let handle = self.handles.allocate(None, ServerObject::Message(object));
        debug!(%handle, %folder, associated, "message created");
        Ok(handle)
    }

    /// Open a committed message. The handle sees the message as it was
    /// when opened; later commits by other handles are not merged in.
    pub fn open_message(
        &mut self,
        folder: HandleId,
        id: MessageId,
        code_page: CodePage,
        mode: MessageOpenMode,
    ) -> SessionResult<HandleId> {
        let folder = self.folder_object(folder)?.id;
        let code_page = self.check_code_page(code_page)?;
        let rights = self
            .store
            .folder(folder)?
            .ok_or(SessionError::FolderNotFound(folder))?
            .rights;
        let record = self
            .store
            .read_message(folder, id)?
            .ok_or(SessionError::MessageNotFound(id))?;

        let access = match mode {
            MessageOpenMode::ReadOnly => AccessLevel::ReadOnly,
            MessageOpenMode::ReadWrite if rights.modify => AccessLevel::Modify,
            MessageOpenMode::ReadWrite => {
                return Err(SessionError::PermissionDenied(format!(
                    "cannot open {id} for writing"
                )))
            }
            MessageOpenMode::BestAccess if rights.modify => AccessLevel::Modify,
            MessageOpenMode::BestAccess => AccessLevel::ReadOnly,
        };

        let object = MessageObject::opened(
            MessageOrigin::Folder {
                folder,
                associated: record.associated,
            },
            id,
            record.content,
            record.generation,
            access,
            code_page,
        );
        let handle = self.handles.allocate(None, ServerObject::Message(object));
        debug!(%handle, message = %id, ?access, "message opened");
        Ok(handle)
    }

    /// Commit a message's staged changes.
    ///
    /// A top-level message is written to the store together with every
    /// attachment saved through this handle. An embedded message is merged
    /// into the attachment it was opened through and becomes durable only
    /// when that attachment and its owning message are saved in turn.
    ///
    /// On failure nothing changes: the staged buffer, the handle's access
    /// level and the durable state are as they were before the call.
    pub fn save_message(
        &mut self,
        handle: HandleId,
        flags: SaveFlags,
    ) -> SessionResult<MessageSaveOutcome> {
        let result = self.commit_message(handle, flags);
        if let Err(e) = &result {
            warn!(%handle, flags = flags.bits(), code = %e.code(), error = %e, "message save failed");
        }
        result
    }

    fn commit_message(
        &mut self,
        handle: HandleId,
        flags: SaveFlags,
    ) -> SessionResult<MessageSaveOutcome> {
        let msg = self.message_object(handle)?;
        let mode = resolve_mode(flags)?;
        let delayed = flags.is_delayed();
        if !msg.access.can_modify() {
            return Err(SessionError::ReadOnlyState(handle));
        }
        let behavior = &self.config.behavior;
        let access = access_after_save(mode, behavior);

        match msg.origin {
            MessageOrigin::Folder { folder, associated } => {
                let current = match msg.id {
                    Some(id) => self.store.read_message(folder, id)?.map(|r| r.generation),
                    None => None,
                };
                if conflict_blocks(msg.base_revision, current, mode, behavior) {
                    return Err(modified(msg.id));
                }
                let staged = screen_read_only(
                    ObjectKind::Message,
                    &msg.staged,
                    msg.has_durable_version(),
                    behavior.read_only_writes,
                )?;

                let id = match msg.id {
                    Some(id) => id,
                    None => self.store.allocate_message_id()?,
                };
                let mut content = msg.content.clone();
                staged.apply_to(&mut content.properties);
                let flags = content.message_flags();
                content.set_message_flags(flags);
                stamp_message(&mut content, id, &self.config.logon, FileTime::now());

                let condition = write_condition(msg.base_revision, mode, behavior);
                let generation = self
                    .store
                    .write_message(MessageWrite {
                        folder,
                        id,
                        associated,
                        content: content.clone(),
                        condition,
                    })
                    .map_err(|e| match e {
                        StoreError::Conflict { .. } => modified(Some(id)),
                        other => other.into(),
                    })?;

                self.mark_committed(
                    handle,
                    Committed {
                        id,
                        content,
                        revision: generation,
                        access,
                    },
                )?;
                info!(%handle, message = %id, %folder, generation, ?mode, delayed, "message saved");
                Ok(MessageSaveOutcome {
                    message_id: id,
                    access_level: access,
                    durability: Durability::Durable { folder, generation },
                })
            }
            MessageOrigin::Embedded { attachment } => {
                let owner = self.attachment_object(attachment)?;
                let current = owner.embedded.as_ref().map(|e| e.revision);
                if conflict_blocks(msg.base_revision, current, mode, behavior) {
                    return Err(modified(msg.id));
                }
                let staged = screen_read_only(
                    ObjectKind::Message,
                    &msg.staged,
                    msg.has_durable_version(),
                    behavior.read_only_writes,
                )?;

                let id = match msg.id {
                    Some(id) => id,
                    None => self.store.allocate_message_id()?,
                };
                let mut content = msg.content.clone();
                staged.apply_to(&mut content.properties);
                let flags = content.message_flags();
                content.set_message_flags(flags);
                stamp_message(&mut content, id, &self.config.logon, FileTime::now());
                let revision = current.unwrap_or(0) + 1;

                self.attachment_object_mut(attachment)?.embedded = Some(EmbeddedMessage {
                    id,
                    revision,
                    content: content.clone(),
                });
                self.mark_committed(
                    handle,
                    Committed {
                        id,
                        content,
                        revision,
                        access,
                    },
                )?;
                info!(
                    %handle,
                    message = %id,
                    %attachment,
                    revision,
                    ?mode,
                    delayed,
                    "embedded message saved"
                );
                Ok(MessageSaveOutcome {
                    message_id: id,
                    access_level: access,
                    durability: Durability::StagedForParent { attachment },
                })
            }
        }
    }

    fn mark_committed(&mut self, handle: HandleId, committed: Committed) -> SessionResult<()> {
        let msg = self.message_object_mut(handle)?;
        msg.id = Some(committed.id);
        msg.content = committed.content;
        msg.staged.clear();
        msg.base_revision = Some(committed.revision);
        msg.access = committed.access;
        msg.state = CommitState::Committed;
        Ok(())
    }

    /// Id of the message behind `handle`; `None` until its first save.
    pub fn message_id(&self, handle: HandleId) -> SessionResult<Option<MessageId>> {
        Ok(self.message_object(handle)?.id)
    }

    /// Folder a top-level message belongs to; `None` for embedded messages.
    pub fn message_folder(&self, handle: HandleId) -> SessionResult<Option<FolderId>> {
        Ok(match self.message_object(handle)?.origin {
            MessageOrigin::Folder { folder, .. } => Some(folder),
            MessageOrigin::Embedded { .. } => None,
        })
    }

    /// Current access level of a message or attachment handle.
    pub fn access_level(&self, handle: HandleId) -> SessionResult<AccessLevel> {
        match self.handles.get(handle).map(|e| &e.object) {
            Some(ServerObject::Attachment(a)) => Ok(a.access),
            _ => Ok(self.message_object(handle)?.access),
        }
    }

    /// Apply read-state directives to the message behind `handle`.
    ///
    /// For a committed top-level message the change is written through to
    /// the store at once, without a save. Returns `true` if the read state
    /// changed.
    pub fn set_message_read_flag(
        &mut self,
        handle: HandleId,
        flags: ReadFlags,
    ) -> SessionResult<bool> {
        let msg = self.message_object(handle)?;
        if let (MessageOrigin::Folder { folder, .. }, Some(id), Some(_)) =
            (msg.origin, msg.id, msg.base_revision)
        {
            let update = self
                .store
                .update_flags(folder, id, &|f| flags.apply_to(f))
                .map_err(|e| not_found_as_message(e, id))?;
            let msg = self.message_object_mut(handle)?;
            msg.content.set_message_flags(update.after);
            // our own write should not look like a concurrent one
            if msg.base_revision == Some(update.previous_generation) {
                msg.base_revision = Some(update.generation);
            }
            debug!(%handle, message = %id, changed = update.changed(), "read flag updated");
            return Ok(update.before.contains(MessageFlags::READ)
                != update.after.contains(MessageFlags::READ));
        }

        let msg = self.message_object_mut(handle)?;
        let before = msg
            .lookup(tags::MESSAGE_FLAGS)
            .and_then(|v| v.as_i32())
            .map(|bits| MessageFlags::from_bits_retain(bits as u32))
            .unwrap_or_default();
        let after = flags.apply_to(before);
        msg.content.set_message_flags(after);
        if msg.staged.get(tags::MESSAGE_FLAGS).is_some() {
            msg.staged
                .set(tags::MESSAGE_FLAGS, PropertyValue::Integer32(after.bits() as i32))
                .map_err(|e| SessionError::InvalidParameter(e.to_string()))?;
        }
        Ok(before.contains(MessageFlags::READ) != after.contains(MessageFlags::READ))
    }
}

fn modified(id: Option<MessageId>) -> SessionError {
    match id {
        Some(id) => SessionError::ObjectModified(id.to_string()),
        None => SessionError::ObjectModified("message".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProductBehavior, StoreConfig};
    use crate::testing::Fixture;
    use mstore_store::{ChangeKind, FolderRights, MessageStore};
    use mstore_types::{EmbeddedOpenMode, ErrorCode};
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Create and open
    // -----------------------------------------------------------------------

    #[test]
    fn created_message_is_invisible_until_saved() {
        let mut fx = Fixture::strict();
        let msg = fx.create_message();
        fx.session
            .set_property(msg, tags::SUBJECT, PropertyValue::String("draft".into()))
            .unwrap();
        assert_eq!(fx.row_count(), 0);
        assert_eq!(fx.session.message_id(msg).unwrap(), None);
        assert_eq!(
            fx.session.commit_state(msg).unwrap(),
            CommitState::Uncommitted
        );

        fx.session.release(msg);
        assert_eq!(fx.row_count(), 0);
        assert!(fx.store.is_empty());
    }

    #[test]
    fn create_requires_create_right() {
        let mut fx = Fixture::strict();
        fx.store
            .set_folder_rights(fx.folder, FolderRights::read_only())
            .unwrap();
        let err = fx
            .session
            .create_message(fx.folder_handle, CodePage::USE_LOGON, false)
            .unwrap_err();
        assert!(matches!(err, SessionError::NoCreateRight(_)));
        assert_eq!(err.code(), ErrorCode::NO_CREATE_RIGHT);
    }

    #[test]
    fn create_with_unknown_code_page_fails() {
        let mut fx = Fixture::strict();
        let err = fx
            .session
            .create_message(fx.folder_handle, CodePage::new(0x000F), false)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UNKNOWN_CODE_PAGE);
        assert_eq!(fx.session.handle_count(), 1);
    }

    #[test]
    fn open_missing_message_fails() {
        let mut fx = Fixture::strict();
        let err = fx
            .session
            .open_message(
                fx.folder_handle,
                MessageId::from_parts(1, 404),
                CodePage::USE_LOGON,
                MessageOpenMode::ReadOnly,
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NOT_FOUND);
    }

    #[test]
    fn open_mode_follows_folder_rights() {
        let mut fx = Fixture::strict();
        let (mid, _) = fx.committed_message("rights");
        fx.store
            .set_folder_rights(fx.folder, FolderRights::read_only())
            .unwrap();

        let err = fx
            .session
            .open_message(fx.folder_handle, mid, CodePage::USE_LOGON, MessageOpenMode::ReadWrite)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ACCESS_DENIED);

        let h = fx
            .session
            .open_message(fx.folder_handle, mid, CodePage::USE_LOGON, MessageOpenMode::BestAccess)
            .unwrap();
        assert_eq!(fx.session.access_level(h).unwrap(), AccessLevel::ReadOnly);
        assert_eq!(
            fx.session.get_property(h, tags::ACCESS_LEVEL).unwrap(),
            PropertyValue::Integer32(0)
        );
    }

    // -----------------------------------------------------------------------
    // Save flags
    // -----------------------------------------------------------------------

    #[test]
    fn combined_save_flags_are_not_supported() {
        let mut fx = Fixture::strict();
        let msg = fx.create_message();
        for bits in [0x00u8, 0x03, 0x05, 0x06, 0x07, 0x0F] {
            let err = fx
                .session
                .save_message(msg, SaveFlags::from_bits_retain(bits))
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::NOT_SUPPORTED, "flags 0x{bits:02X}");
        }
        assert_eq!(fx.row_count(), 0);
        assert_eq!(fx.session.access_level(msg).unwrap(), AccessLevel::Modify);
    }

    #[test]
    fn delayed_commit_combines_with_one_mode() {
        let mut fx = Fixture::strict();
        let msg = fx.create_message();
        let out = fx
            .session
            .save_message(msg, SaveFlags::FORCE_SAVE | SaveFlags::DELAYED_COMMIT)
            .unwrap();
        assert!(matches!(out.durability, Durability::Durable { .. }));
        assert_eq!(fx.row_count(), 1);
    }

    #[test]
    fn keep_open_read_only_downgrades_handle() {
        let mut fx = Fixture::strict();
        let msg = fx.create_message();
        let out = fx
            .session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_ONLY)
            .unwrap();
        assert_eq!(out.access_level, AccessLevel::ReadOnly);

        fx.session
            .set_property(msg, tags::SUBJECT, PropertyValue::String("later".into()))
            .unwrap();
        let err = fx
            .session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap_err();
        assert!(matches!(err, SessionError::ReadOnlyState(_)));
        assert_eq!(err.code(), ErrorCode::GENERAL_FAILURE);
    }

    #[test]
    fn legacy_keep_open_read_only_keeps_modify() {
        let mut fx = Fixture::legacy();
        let msg = fx.create_message();
        let out = fx
            .session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_ONLY)
            .unwrap();
        assert_eq!(out.access_level, AccessLevel::Modify);
        fx.session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
    }

    #[test]
    fn read_only_open_cannot_save() {
        let mut fx = Fixture::strict();
        let (mid, _) = fx.committed_message("ro");
        let h = fx
            .session
            .open_message(fx.folder_handle, mid, CodePage::USE_LOGON, MessageOpenMode::ReadOnly)
            .unwrap();
        let err = fx
            .session
            .save_message(h, SaveFlags::FORCE_SAVE)
            .unwrap_err();
        assert!(matches!(err, SessionError::ReadOnlyState(_)));
    }

    // -----------------------------------------------------------------------
    // Commit semantics
    // -----------------------------------------------------------------------

    #[test]
    fn save_is_visible_to_other_handles_only_afterwards() {
        let mut fx = Fixture::strict();
        let (mid, writer) = fx.committed_message("v1");
        fx.session
            .set_property(writer, tags::SUBJECT, PropertyValue::String("v2".into()))
            .unwrap();

        let reader = fx.open(mid);
        assert_eq!(fx.subject(reader), "v1");

        fx.session
            .save_message(writer, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        // a handle opened before the commit keeps its snapshot
        assert_eq!(fx.subject(reader), "v1");
        let fresh = fx.open(mid);
        assert_eq!(fx.subject(fresh), "v2");
    }

    #[test]
    fn other_session_sees_commits_not_staging() {
        let mut fx = Fixture::strict();
        let (mid, writer) = fx.committed_message("shared");
        let mut other = fx.second_session();
        let folder = other.open_folder(fx.folder).unwrap();

        fx.session
            .set_property(writer, tags::BODY, PropertyValue::String("staged".into()))
            .unwrap();
        let h = other
            .open_message(folder, mid, CodePage::USE_LOGON, MessageOpenMode::ReadOnly)
            .unwrap();
        assert!(other.get_property(h, tags::BODY).is_err());

        fx.session
            .save_message(writer, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        let h = other
            .open_message(folder, mid, CodePage::USE_LOGON, MessageOpenMode::ReadOnly)
            .unwrap();
        assert_eq!(
            other.get_property(h, tags::BODY).unwrap(),
            PropertyValue::String("staged".into())
        );
    }

    #[test]
    fn read_only_write_rejects_whole_save() {
        let mut fx = Fixture::strict();
        let (mid, msg) = fx.committed_message("keep");
        let generation = fx.stored(mid).generation;
        fx.session
            .set_property(msg, tags::SUBJECT, PropertyValue::String("lost".into()))
            .unwrap();
        fx.session
            .set_property(msg, tags::MESSAGE_SIZE, PropertyValue::Integer32(1))
            .unwrap();

        let err = fx
            .session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_ONLY)
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::ReadOnlyViolation { kind: ObjectKind::Message, tag } if tag == tags::MESSAGE_SIZE
        ));
        let stored = fx.stored(mid);
        assert_eq!(stored.generation, generation);
        assert_eq!(stored.content.properties.str(tags::SUBJECT), Some("keep"));
        // staged state and access survive the failure
        assert_eq!(fx.subject(msg), "lost");
        assert_eq!(fx.session.access_level(msg).unwrap(), AccessLevel::Modify);
    }

    #[test]
    fn legacy_drops_read_only_writes() {
        let mut fx = Fixture::legacy();
        let (mid, msg) = fx.committed_message("before");
        fx.session
            .set_property(msg, tags::SUBJECT, PropertyValue::String("after".into()))
            .unwrap();
        fx.session
            .set_property(msg, tags::MESSAGE_SIZE, PropertyValue::Integer32(1))
            .unwrap();
        fx.session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();

        let stored = fx.stored(mid);
        assert_eq!(stored.content.properties.str(tags::SUBJECT), Some("after"));
        assert_ne!(stored.content.properties.i32(tags::MESSAGE_SIZE), Some(1));
    }

    #[test]
    fn message_flags_writable_only_before_first_save() {
        let mut fx = Fixture::strict();
        let msg = fx.create_message();
        let unread = MessageFlags::UNSENT.bits() as i32;
        fx.session
            .set_property(msg, tags::MESSAGE_FLAGS, PropertyValue::Integer32(unread))
            .unwrap();
        let out = fx
            .session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        let stored = fx.stored(out.message_id);
        assert!(!stored.content.message_flags().contains(MessageFlags::READ));
        assert_eq!(stored.content.properties.bool(tags::READ), Some(false));

        fx.session
            .set_property(msg, tags::MESSAGE_FLAGS, PropertyValue::Integer32(0))
            .unwrap();
        let err = fx
            .session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap_err();
        assert!(matches!(err, SessionError::ReadOnlyViolation { .. }));
    }

    #[test]
    fn force_save_creates_exactly_one_row() {
        let mut fx = Fixture::strict();
        fx.committed_message("existing");
        let before = fx.row_count();
        let msg = fx.create_message();
        fx.session.save_message(msg, SaveFlags::FORCE_SAVE).unwrap();
        assert_eq!(fx.row_count(), before + 1);
        fx.session.save_message(msg, SaveFlags::FORCE_SAVE).unwrap();
        assert_eq!(fx.row_count(), before + 1);
    }

    #[test]
    fn associated_messages_land_in_associated_contents() {
        let mut fx = Fixture::strict();
        let msg = fx
            .session
            .create_message(fx.folder_handle, CodePage::USE_LOGON, true)
            .unwrap();
        let out = fx
            .session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        assert_eq!(fx.row_count(), 0);
        assert_eq!(
            fx.session.contents(fx.folder_handle, true).unwrap(),
            vec![out.message_id]
        );
        assert!(fx
            .stored(out.message_id)
            .content
            .message_flags()
            .contains(MessageFlags::FAI));
    }

    #[test]
    fn save_stamps_server_properties() {
        let mut fx = Fixture::strict();
        let (mid, _) = fx.committed_message("stamped");
        let props = fx.stored(mid).content.properties;
        assert_eq!(
            props.get(tags::MID),
            Some(&PropertyValue::Integer64(mid.as_u64() as i64))
        );
        assert!(props.get(tags::CHANGE_KEY).is_some());
        assert!(props.i32(tags::MESSAGE_SIZE).unwrap_or(0) > 0);
        assert_eq!(props.str(tags::LAST_MODIFIER_NAME), Some("Administrator"));
    }

    // -----------------------------------------------------------------------
    // Concurrent handles
    // -----------------------------------------------------------------------

    #[test]
    fn second_writer_gets_object_modified_then_force_wins() {
        let mut fx = Fixture::strict();
        let (mid, _) = fx.committed_message("base");
        let a = fx.open(mid);
        let b = fx.open(mid);

        fx.session
            .set_property(a, tags::SUBJECT, PropertyValue::String("from a".into()))
            .unwrap();
        fx.session
            .save_message(a, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();

        fx.session
            .set_property(b, tags::SUBJECT, PropertyValue::String("from b".into()))
            .unwrap();
        let err = fx
            .session
            .save_message(b, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OBJECT_MODIFIED);
        assert_eq!(fx.stored(mid).content.properties.str(tags::SUBJECT), Some("from a"));

        fx.session.save_message(b, SaveFlags::FORCE_SAVE).unwrap();
        assert_eq!(fx.stored(mid).content.properties.str(tags::SUBJECT), Some("from b"));
    }

    #[test]
    fn last_writer_wins_policy_overwrites() {
        let config = StoreConfig {
            behavior: ProductBehavior {
                concurrent_save: ConcurrentSavePolicy::LastWriterWins,
                ..ProductBehavior::strict()
            },
            ..Default::default()
        };
        let mut fx = Fixture::with_config(config);
        let (mid, _) = fx.committed_message("base");
        let a = fx.open(mid);
        let b = fx.open(mid);
        fx.session
            .save_message(a, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        fx.session
            .set_property(b, tags::SUBJECT, PropertyValue::String("b".into()))
            .unwrap();
        fx.session
            .save_message(b, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        assert_eq!(fx.stored(mid).content.properties.str(tags::SUBJECT), Some("b"));
    }

    #[test]
    fn deleted_message_cannot_be_saved_without_force() {
        let mut fx = Fixture::strict();
        let (mid, msg) = fx.committed_message("gone");
        fx.session.delete_messages(fx.folder_handle, &[mid]).unwrap();
        let err = fx
            .session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OBJECT_MODIFIED);
    }

    // -----------------------------------------------------------------------
    // Read flag
    // -----------------------------------------------------------------------

    #[test]
    fn read_flag_writes_through_without_save() {
        let mut fx = Fixture::strict();
        let (mid, msg) = fx.committed_message("unread me");
        let changed = fx
            .session
            .set_message_read_flag(msg, ReadFlags::CLEAR_READ_FLAG)
            .unwrap();
        assert!(changed);
        assert!(!fx.stored_flags(mid).contains(MessageFlags::READ));
        assert_eq!(
            fx.session.get_property(msg, tags::READ).unwrap(),
            PropertyValue::Boolean(false)
        );

        // our own flag write is not a conflict
        fx.session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        assert!(!fx
            .session
            .set_message_read_flag(msg, ReadFlags::CLEAR_READ_FLAG)
            .unwrap());
    }

    #[test]
    fn read_flag_on_unsaved_message_stays_local() {
        let mut fx = Fixture::strict();
        let msg = fx.create_message();
        assert!(fx
            .session
            .set_message_read_flag(msg, ReadFlags::CLEAR_READ_FLAG)
            .unwrap());
        assert_eq!(fx.row_count(), 0);
        let out = fx
            .session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        assert!(!fx.stored_flags(out.message_id).contains(MessageFlags::READ));
    }

    // -----------------------------------------------------------------------
    // Embedded messages
    // -----------------------------------------------------------------------

    #[test]
    fn embedded_save_reports_parent_staging() {
        let mut fx = Fixture::strict();
        let msg = fx.create_message();
        let (att, _) = fx.session.create_attachment(msg).unwrap();
        let emb = fx
            .session
            .open_embedded_message(att, CodePage::USE_LOGON, EmbeddedOpenMode::Create)
            .unwrap();
        let out = fx
            .session
            .save_message(emb, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        assert_eq!(out.durability, Durability::StagedForParent { attachment: att });
        assert_eq!(fx.session.message_folder(emb).unwrap(), None);
        assert!(fx.store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Change events
    // -----------------------------------------------------------------------

    #[test]
    fn only_durable_commits_emit_events() {
        let mut fx = Fixture::strict();
        let msg = fx.create_message();
        fx.session
            .set_property(msg, tags::SUBJECT, PropertyValue::String("e".into()))
            .unwrap();
        assert!(fx.sink.events().is_empty());

        fx.session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        fx.session
            .save_message(msg, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        let kinds: Vec<_> = fx.sink.take().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Created, ChangeKind::Modified]);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn failed_save_changes_nothing(subject in "[a-z]{1,12}", size in any::<i32>()) {
            let mut fx = Fixture::strict();
            let (mid, msg) = fx.committed_message("stable");
            let before = fx.stored(mid);
            fx.session
                .set_property(msg, tags::SUBJECT, PropertyValue::String(subject.clone()))
                .unwrap();
            fx.session
                .set_property(msg, tags::MESSAGE_SIZE, PropertyValue::Integer32(size))
                .unwrap();
            prop_assert!(fx.session.save_message(msg, SaveFlags::FORCE_SAVE).is_err());
            prop_assert_eq!(fx.stored(mid), before);
            prop_assert_eq!(fx.subject(msg), subject);
        }
    }
}
