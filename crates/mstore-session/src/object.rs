//! Working objects held by handles.
//!
//! Each handle owns a private copy of the state it opened plus its own
//! staged buffer. Nothing here is shared between handles.

use mstore_store::{AttachmentRecord, EmbeddedMessage, MessageContent};
use mstore_types::{
    tags, AccessLevel, AttachMethod, CodePage, FileTime, FolderId, HandleId, MessageFlags,
    MessageId, ObjectType, PropertyBag, PropertyTag, PropertyValue,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::staged::StagedChanges;

/// Whether a handle's object has a durable version yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitState {
    Uncommitted,
    Committed,
}

pub(crate) struct FolderObject {
    pub id: FolderId,
}

/// Where a message commits to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MessageOrigin {
    /// A top-level message; saves write the backing store.
    Folder { folder: FolderId, associated: bool },
    /// A message embedded in the attachment open on this handle; saves
    /// merge into that attachment handle.
    Embedded { attachment: HandleId },
}

pub(crate) struct MessageObject {
    pub origin: MessageOrigin,
    pub id: Option<MessageId>,
    /// The committed state as this handle last saw it, with attachment
    /// saves and deletions made through this handle already applied.
    pub content: MessageContent,
    pub staged: StagedChanges,
    /// Generation (top-level) or revision (embedded) this handle is based
    /// on. `None` until the first save.
    pub base_revision: Option<u64>,
    pub access: AccessLevel,
    pub state: CommitState,
    pub code_page: CodePage,
}

impl MessageObject {
    pub(crate) fn created(origin: MessageOrigin, properties: PropertyBag, code_page: CodePage) -> Self {
        Self {
            origin,
            id: None,
            content: MessageContent::new(properties),
            staged: StagedChanges::new(),
            base_revision: None,
            access: AccessLevel::Modify,
            state: CommitState::Uncommitted,
            code_page,
        }
    }

    pub(crate) fn opened(
        origin: MessageOrigin,
        id: MessageId,
        content: MessageContent,
        revision: u64,
        access: AccessLevel,
        code_page: CodePage,
    ) -> Self {
        Self {
            origin,
            id: Some(id),
            content,
            staged: StagedChanges::new(),
            base_revision: Some(revision),
            access,
            state: CommitState::Committed,
            code_page,
        }
    }

    pub(crate) fn has_durable_version(&self) -> bool {
        self.base_revision.is_some()
    }

    /// Properties as seen through this handle. The access level reflects
    /// the handle, not the stored value.
    pub(crate) fn view(&self) -> PropertyBag {
        let mut view = self.staged.overlay(&self.content.properties);
        view.set_known(tags::ACCESS_LEVEL, PropertyValue::Integer32(self.access.code()));
        view
    }

    pub(crate) fn lookup(&self, tag: PropertyTag) -> Option<PropertyValue> {
        if tag == tags::ACCESS_LEVEL {
            return Some(PropertyValue::Integer32(self.access.code()));
        }
        self.staged.lookup(&self.content.properties, tag).cloned()
    }
}

pub(crate) struct AttachmentObject {
    /// Handle of the owning message.
    pub message: HandleId,
    pub number: u32,
    pub properties: PropertyBag,
    /// Working copy of the embedded message; embedded saves land here.
    pub embedded: Option<EmbeddedMessage>,
    pub staged: StagedChanges,
    /// Revision within the owner this handle is based on.
    pub base_revision: Option<u64>,
    pub access: AccessLevel,
    pub state: CommitState,
}

impl AttachmentObject {
    pub(crate) fn created(message: HandleId, number: u32, properties: PropertyBag) -> Self {
        Self {
            message,
            number,
            properties,
            embedded: None,
            staged: StagedChanges::new(),
            base_revision: None,
            access: AccessLevel::Modify,
            state: CommitState::Uncommitted,
        }
    }

    pub(crate) fn opened(message: HandleId, record: AttachmentRecord, access: AccessLevel) -> Self {
        Self {
            message,
            number: record.number,
            properties: record.properties,
            embedded: record.embedded,
            staged: StagedChanges::new(),
            base_revision: Some(record.revision),
            access,
            state: CommitState::Committed,
        }
    }

    pub(crate) fn view(&self) -> PropertyBag {
        self.staged.overlay(&self.properties)
    }

    pub(crate) fn lookup(&self, tag: PropertyTag) -> Option<PropertyValue> {
        self.staged.lookup(&self.properties, tag).cloned()
    }
}

/// A row of a message's attachment table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRow {
    pub number: u32,
    pub method: i32,
    pub size: i32,
    pub rendering_position: i32,
    pub long_filename: Option<String>,
}

impl AttachmentRow {
    pub(crate) fn from_record(record: &AttachmentRecord) -> Self {
        let props = &record.properties;
        Self {
            number: record.number,
            method: props.i32(tags::ATTACH_METHOD).unwrap_or(AttachMethod::NONE),
            size: props.i32(tags::ATTACH_SIZE).unwrap_or(0),
            rendering_position: props.i32(tags::RENDERING_POSITION).unwrap_or(-1),
            long_filename: props.str(tags::ATTACH_LONG_FILENAME).map(str::to_string),
        }
    }
}

fn server_key() -> PropertyValue {
    PropertyValue::Binary(Uuid::now_v7().as_bytes().to_vec())
}

/// Properties of a freshly created message.
pub(crate) fn initial_message_properties(
    associated: bool,
    code_page: CodePage,
    config: &StoreConfig,
    now: FileTime,
) -> PropertyBag {
    let logon = &config.logon;
    let mut flags = config.behavior.initial_message_flags;
    if associated {
        flags.insert(MessageFlags::FAI);
    }
    let mut bag: PropertyBag = [
        (tags::IMPORTANCE, PropertyValue::Integer32(1)),
        (tags::SENSITIVITY, PropertyValue::Integer32(0)),
        (tags::MESSAGE_CLASS, PropertyValue::String("IPM.Note".into())),
        (tags::DISPLAY_TO, PropertyValue::String(String::new())),
        (tags::DISPLAY_CC, PropertyValue::String(String::new())),
        (tags::DISPLAY_BCC, PropertyValue::String(String::new())),
        (tags::HAS_ATTACHMENTS, PropertyValue::Boolean(false)),
        (tags::HAS_NAMED_PROPERTIES, PropertyValue::Boolean(false)),
        (tags::TRUST_SENDER, PropertyValue::Integer32(1)),
        (tags::ACCESS, PropertyValue::Integer32(3)),
        (tags::ACCESS_LEVEL, PropertyValue::Integer32(AccessLevel::Modify.code())),
        (tags::OBJECT_TYPE, PropertyValue::Integer32(ObjectType::MESSAGE)),
        (tags::CREATOR_NAME, PropertyValue::String(logon.user_name.clone())),
        (tags::LAST_MODIFIER_NAME, PropertyValue::String(logon.user_name.clone())),
        (tags::CREATION_TIME, PropertyValue::Time(now)),
        (tags::LAST_MODIFICATION_TIME, PropertyValue::Time(now)),
        (tags::SEARCH_KEY, server_key()),
        (tags::RECORD_KEY, server_key()),
        (tags::MESSAGE_LOCALE_ID, PropertyValue::Integer32(logon.locale_id)),
        (tags::LOCALE_ID, PropertyValue::Integer32(logon.locale_id)),
        (
            tags::MESSAGE_CODEPAGE,
            PropertyValue::Integer32(i32::from(code_page.as_u16())),
        ),
        (tags::MESSAGE_FLAGS, PropertyValue::Integer32(flags.bits() as i32)),
        (tags::READ, PropertyValue::Boolean(flags.contains(MessageFlags::READ))),
    ]
    .into_iter()
    .collect();
    if !logon.user_entry_id.is_empty() {
        let entry_id = PropertyValue::Binary(logon.user_entry_id.clone());
        bag.set_known(tags::CREATOR_ENTRY_ID, entry_id.clone());
        bag.set_known(tags::LAST_MODIFIER_ENTRY_ID, entry_id);
    }
    let size = bag.encoded_size(&[]) as i32 + 4;
    bag.set_known(tags::MESSAGE_SIZE, PropertyValue::Integer32(size));
    bag
}

/// Properties of a freshly created attachment.
pub(crate) fn initial_attachment_properties(
    number: u32,
    config: &StoreConfig,
    now: FileTime,
) -> PropertyBag {
    let behavior = &config.behavior;
    [
        (tags::ATTACH_NUMBER, PropertyValue::Integer32(number as i32)),
        (tags::RENDERING_POSITION, PropertyValue::Integer32(-1)),
        (tags::ATTACH_METHOD, PropertyValue::Integer32(AttachMethod::NONE)),
        (tags::ATTACH_SIZE, PropertyValue::Integer32(behavior.initial_attach_size)),
        (
            tags::ACCESS_LEVEL,
            PropertyValue::Integer32(behavior.initial_attach_access_level.code()),
        ),
        (tags::OBJECT_TYPE, PropertyValue::Integer32(ObjectType::ATTACHMENT)),
        (tags::CREATION_TIME, PropertyValue::Time(now)),
        (tags::LAST_MODIFICATION_TIME, PropertyValue::Time(now)),
        (tags::RECORD_KEY, server_key()),
    ]
    .into_iter()
    .collect()
}
