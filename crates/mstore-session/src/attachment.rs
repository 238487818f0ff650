//! Attachments and embedded messages.
//!
//! An attachment save merges the attachment into the working copy of the
//! message handle it was opened through. It reaches the store only when
//! that message is saved, and is lost if the message handle is released
//! first. Embedded messages nest one level further: they merge into their
//! attachment handle.

use mstore_store::AttachmentRecord;
use mstore_types::{
    tags, AccessLevel, AttachMethod, AttachmentOpenMode, CodePage, EmbeddedOpenMode, FileTime,
    HandleId, PropertyValue, SaveFlags,
};
use tracing::{debug, info, warn};

use crate::commit::{
    access_after_save, conflict_blocks, resolve_mode, screen_read_only, stamp_attachment,
    AttachmentSaveOutcome,
};
use crate::config::EmbeddedReadOnlyPolicy;
use crate::error::{SessionError, SessionResult};
use crate::handle::ServerObject;
use crate::object::{
    initial_attachment_properties, initial_message_properties, AttachmentObject, AttachmentRow,
    CommitState, MessageObject, MessageOrigin,
};
use crate::policy::ObjectKind;
use crate::session::Session;

impl Session {
    /// Create an attachment on the message behind `message`. Returns the
    /// new handle and the attachment number, which is never reused within
    /// the message.
    pub fn create_attachment(&mut self, message: HandleId) -> SessionResult<(HandleId, u32)> {
        let msg = self.message_object_mut(message)?;
        if !msg.access.can_modify() {
            return Err(SessionError::PermissionDenied(format!(
                "{message} is open read-only"
            )));
        }
        let number = msg.content.allocate_attachment_number();
        let properties = initial_attachment_properties(number, &self.config, FileTime::now());
        let object = AttachmentObject::created(message, number, properties);
        let handle = self
            .handles
            .allocate(Some(message), ServerObject::Attachment(object));
        debug!(%handle, %message, number, "attachment created");
        Ok((handle, number))
    }

    /// Open an attachment as the message handle currently sees it.
    pub fn open_attachment(
        &mut self,
        message: HandleId,
        number: u32,
        mode: AttachmentOpenMode,
    ) -> SessionResult<HandleId> {
        let msg = self.message_object(message)?;
        let record = msg
            .content
            .attachments
            .get(&number)
            .cloned()
            .ok_or(SessionError::AttachmentNotFound(number))?;
        let access = match mode {
            AttachmentOpenMode::ReadOnly => AccessLevel::ReadOnly,
            AttachmentOpenMode::ReadWrite if msg.access.can_modify() => AccessLevel::Modify,
            AttachmentOpenMode::ReadWrite => {
                return Err(SessionError::PermissionDenied(format!(
                    "cannot open attachment {number} for writing"
                )))
            }
            AttachmentOpenMode::BestAccess => msg.access,
        };
        let object = AttachmentObject::opened(message, record, access);
        let handle = self
            .handles
            .allocate(Some(message), ServerObject::Attachment(object));
        debug!(%handle, %message, number, ?access, "attachment opened");
        Ok(handle)
    }

    /// Remove an attachment from the message's working copy. Takes effect
    /// in the store when the message is saved.
    pub fn delete_attachment(&mut self, message: HandleId, number: u32) -> SessionResult<()> {
        let msg = self.message_object_mut(message)?;
        if !msg.access.can_modify() {
            return Err(SessionError::PermissionDenied(format!(
                "{message} is open read-only"
            )));
        }
        if msg.content.attachments.remove(&number).is_none() {
            return Err(SessionError::AttachmentNotFound(number));
        }
        msg.content.refresh_attachment_presence();
        debug!(%message, number, "attachment deleted");
        Ok(())
    }

    /// Rows of the message's attachment table, as the handle sees it.
    pub fn attachment_table(&self, message: HandleId) -> SessionResult<Vec<AttachmentRow>> {
        let msg = self.message_object(message)?;
        Ok(msg
            .content
            .attachments
            .values()
            .map(AttachmentRow::from_record)
            .collect())
    }

    /// Commit an attachment's staged changes into its owning message
    /// handle.
    pub fn save_attachment(
        &mut self,
        handle: HandleId,
        flags: SaveFlags,
    ) -> SessionResult<AttachmentSaveOutcome> {
        let result = self.commit_attachment(handle, flags);
        if let Err(e) = &result {
            warn!(%handle, flags = flags.bits(), code = %e.code(), error = %e, "attachment save failed");
        }
        result
    }

    fn commit_attachment(
        &mut self,
        handle: HandleId,
        flags: SaveFlags,
    ) -> SessionResult<AttachmentSaveOutcome> {
        let att = self.attachment_object(handle)?;
        let mode = resolve_mode(flags)?;
        if !att.access.can_modify() {
            return Err(SessionError::ReadOnlyState(handle));
        }
        let behavior = &self.config.behavior;
        let access = access_after_save(mode, behavior);
        let (message, number) = (att.message, att.number);

        let owner = self.message_object(message)?;
        let current = owner.content.attachments.get(&number).map(|r| r.revision);
        if att.base_revision.is_some() && current.is_none() {
            return Err(SessionError::AttachmentNotFound(number));
        }
        if conflict_blocks(att.base_revision, current, mode, behavior) {
            return Err(SessionError::ObjectModified(format!("attachment {number}")));
        }
        let staged = screen_read_only(
            ObjectKind::Attachment,
            &att.staged,
            att.base_revision.is_some(),
            behavior.read_only_writes,
        )?;

        let mut properties = att.properties.clone();
        staged.apply_to(&mut properties);
        let revision = current.unwrap_or(0) + 1;
        let mut record = AttachmentRecord {
            number,
            revision,
            properties,
            embedded: att.embedded.clone(),
        };
        stamp_attachment(&mut record, FileTime::now());

        let owner = self.message_object_mut(message)?;
        owner.content.attachments.insert(number, record.clone());
        owner.content.refresh_attachment_presence();

        let att = self.attachment_object_mut(handle)?;
        att.properties = record.properties;
        att.staged.clear();
        att.base_revision = Some(revision);
        att.access = access;
        att.state = CommitState::Committed;

        info!(%handle, %message, number, revision, ?mode, "attachment saved");
        Ok(AttachmentSaveOutcome {
            message,
            attachment_number: number,
            revision,
            access_level: access,
        })
    }

    /// Open, or with [`EmbeddedOpenMode::Create`] create, the message
    /// embedded in an attachment.
    pub fn open_embedded_message(
        &mut self,
        attachment: HandleId,
        code_page: CodePage,
        mode: EmbeddedOpenMode,
    ) -> SessionResult<HandleId> {
        let att = self.attachment_object(attachment)?;
        let code_page = self.check_code_page(code_page)?;
        let number = att.number;
        let writable = att.access.can_modify();
        let denied = || {
            SessionError::PermissionDenied(format!(
                "attachment {number} is open read-only"
            ))
        };

        let object = match (mode, att.embedded.as_ref()) {
            (EmbeddedOpenMode::ReadOnly | EmbeddedOpenMode::ReadWrite, None) => {
                return Err(SessionError::EmbeddedMessageNotFound(number))
            }
            (EmbeddedOpenMode::ReadWrite | EmbeddedOpenMode::Create, _) if !writable => {
                return Err(denied())
            }
            (EmbeddedOpenMode::Create, None) => {
                let properties =
                    initial_message_properties(false, code_page, &self.config, FileTime::now());
                MessageObject::created(MessageOrigin::Embedded { attachment }, properties, code_page)
            }
            (_, Some(embedded)) => {
                let access = match (mode, self.config.behavior.embedded_read_only_open) {
                    (EmbeddedOpenMode::ReadOnly, EmbeddedReadOnlyPolicy::Honor) => {
                        AccessLevel::ReadOnly
                    }
                    _ => AccessLevel::Modify,
                };
                MessageObject::opened(
                    MessageOrigin::Embedded { attachment },
                    embedded.id,
                    embedded.content.clone(),
                    embedded.revision,
                    access,
                    code_page,
                )
            }
        };

        let created = object.state == CommitState::Uncommitted;
        if created {
            let att = self.attachment_object_mut(attachment)?;
            let method = att.lookup(tags::ATTACH_METHOD).and_then(|v| v.as_i32());
            if method != Some(AttachMethod::EMBEDDED_MESSAGE) {
                att.staged
                    .set(
                        tags::ATTACH_METHOD,
                        PropertyValue::Integer32(AttachMethod::EMBEDDED_MESSAGE),
                    )
                    .map_err(|e| SessionError::InvalidParameter(e.to_string()))?;
            }
        }
        let handle = self
            .handles
            .allocate(Some(attachment), ServerObject::Message(object));
        debug!(%handle, %attachment, ?mode, created, "embedded message opened");
        Ok(handle)
    }
}
