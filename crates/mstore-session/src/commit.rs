//! Commit engine: the validation and merge steps every save runs through.
//!
//! A save is resolved, validated and prepared entirely on copies; the only
//! mutation happens after every check has passed. A failing save therefore
//! leaves the handle and the durable state untouched.

use mstore_store::{AttachmentRecord, MessageContent};
use mstore_types::{
    tags, AccessLevel, FileTime, FolderId, HandleId, MessageId, PropertyValue, SaveFlags,
    SaveMode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{
    ConcurrentSavePolicy, KeepOpenReadOnlyPolicy, LogonContext, ProductBehavior,
    ReadOnlyWritePolicy,
};
use crate::error::{SessionError, SessionResult};
use crate::policy::{is_read_only, ObjectKind};
use crate::staged::StagedChanges;

/// Where a successful message save landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Durability {
    /// Written to the backing store.
    Durable { folder: FolderId, generation: u64 },
    /// Merged into the owning attachment; durable once the top-level
    /// message above it is saved.
    StagedForParent { attachment: HandleId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSaveOutcome {
    pub message_id: MessageId,
    pub access_level: AccessLevel,
    pub durability: Durability,
}

/// A saved attachment. Always staged for its owning message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSaveOutcome {
    pub message: HandleId,
    pub attachment_number: u32,
    pub revision: u64,
    pub access_level: AccessLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveOutcome {
    Message(MessageSaveOutcome),
    Attachment(AttachmentSaveOutcome),
}

impl SaveOutcome {
    pub fn access_level(&self) -> AccessLevel {
        match self {
            Self::Message(m) => m.access_level,
            Self::Attachment(a) => a.access_level,
        }
    }
}

/// Resolve save flags to a single directive.
pub fn resolve_mode(flags: SaveFlags) -> SessionResult<SaveMode> {
    flags
        .mode()
        .ok_or(SessionError::InvalidFlags(flags.bits()))
}

/// Access level of the handle after a successful save.
pub fn access_after_save(mode: SaveMode, behavior: &ProductBehavior) -> AccessLevel {
    match (mode, behavior.keep_open_read_only) {
        (SaveMode::KeepOpenReadOnly, KeepOpenReadOnlyPolicy::Honor) => AccessLevel::ReadOnly,
        _ => AccessLevel::Modify,
    }
}

/// Whether a save must be refused because the committed revision moved
/// since the handle last saw it.
pub(crate) fn conflict_blocks(
    base: Option<u64>,
    current: Option<u64>,
    mode: SaveMode,
    behavior: &ProductBehavior,
) -> bool {
    match base {
        None => false,
        Some(_) if base == current => false,
        Some(_) => {
            mode != SaveMode::ForceSave && behavior.concurrent_save == ConcurrentSavePolicy::Reject
        }
    }
}

/// Check staged writes against the read-only set of `kind`.
///
/// Under [`ReadOnlyWritePolicy::Reject`] the first offending tag fails the
/// save; under [`ReadOnlyWritePolicy::Ignore`] offending writes are left out
/// of the returned changes.
pub(crate) fn screen_read_only(
    kind: ObjectKind,
    staged: &StagedChanges,
    saved: bool,
    policy: ReadOnlyWritePolicy,
) -> SessionResult<StagedChanges> {
    match policy {
        ReadOnlyWritePolicy::Reject => {
            if let Some(tag) = staged.tags().find(|t| is_read_only(kind, *t, saved)) {
                return Err(SessionError::ReadOnlyViolation { kind, tag });
            }
            Ok(staged.clone())
        }
        ReadOnlyWritePolicy::Ignore => Ok(staged.without(|t| is_read_only(kind, t, saved))),
    }
}

fn saturating_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Recompute server-owned message properties after staged changes are
/// merged.
pub(crate) fn stamp_message(
    content: &mut MessageContent,
    id: MessageId,
    logon: &LogonContext,
    now: FileTime,
) {
    content.refresh_attachment_presence();
    let props = &mut content.properties;
    props.set_known(tags::MID, PropertyValue::Integer64(id.as_u64() as i64));
    props.set_known(tags::LAST_MODIFICATION_TIME, PropertyValue::Time(now));
    props.set_known(tags::LOCAL_COMMIT_TIME, PropertyValue::Time(now));
    props.set_known(
        tags::LAST_MODIFIER_NAME,
        PropertyValue::String(logon.user_name.clone()),
    );
    if !logon.user_entry_id.is_empty() {
        props.set_known(
            tags::LAST_MODIFIER_ENTRY_ID,
            PropertyValue::Binary(logon.user_entry_id.clone()),
        );
    }
    props.set_known(
        tags::CHANGE_KEY,
        PropertyValue::Binary(Uuid::now_v7().as_bytes().to_vec()),
    );
    let size = saturating_i32(content.encoded_size() + 4);
    content
        .properties
        .set_known(tags::MESSAGE_SIZE, PropertyValue::Integer32(size));
}

/// Recompute server-owned attachment properties.
pub(crate) fn stamp_attachment(record: &mut AttachmentRecord, now: FileTime) {
    record
        .properties
        .set_known(tags::LAST_MODIFICATION_TIME, PropertyValue::Time(now));
    let size = saturating_i32(record.encoded_size());
    record
        .properties
        .set_known(tags::ATTACH_SIZE, PropertyValue::Integer32(size));
}
