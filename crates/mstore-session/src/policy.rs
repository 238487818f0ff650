//! Read-only property policy.
//!
//! Which properties a client may not write is a pure function of the object
//! kind and the property id. The commit engine consults it when a save runs;
//! property writes themselves are never refused.

use std::fmt;

use mstore_types::{tags, PropertyTag};
use serde::{Deserialize, Serialize};

/// The kind of object whose properties are being committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Message,
    Attachment,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::Attachment => write!(f, "attachment"),
        }
    }
}

const MESSAGE_READ_ONLY: &[PropertyTag] = &[
    tags::ACCESS,
    tags::CHANGE_KEY,
    tags::CREATION_TIME,
    tags::LAST_MODIFICATION_TIME,
    tags::LAST_MODIFIER_NAME,
    tags::OBJECT_TYPE,
    tags::RECORD_KEY,
    tags::SEARCH_KEY,
    tags::ACCESS_LEVEL,
    tags::MESSAGE_SIZE,
    tags::MESSAGE_STATUS,
    tags::HAS_ATTACHMENTS,
];

const ATTACHMENT_READ_ONLY: &[PropertyTag] = &[tags::ATTACH_SIZE, tags::ACCESS_LEVEL, tags::OBJECT_TYPE];

/// The fixed read-only set of an object kind.
///
/// Message flags are not listed: they become read-only only once the
/// message has been saved, see [`is_read_only`].
pub fn read_only_tags(kind: ObjectKind) -> &'static [PropertyTag] {
    match kind {
        ObjectKind::Message => MESSAGE_READ_ONLY,
        ObjectKind::Attachment => ATTACHMENT_READ_ONLY,
    }
}

/// Whether a client write to `tag` on an object of `kind` is a read-only
/// violation. Matching is by property id; the declared type is irrelevant.
///
/// `saved` is true once the object has a durable version.
pub fn is_read_only(kind: ObjectKind, tag: PropertyTag, saved: bool) -> bool {
    if kind == ObjectKind::Message && saved && tag.id == tags::MESSAGE_FLAGS.id {
        return true;
    }
    read_only_tags(kind).iter().any(|t| t.id == tag.id)
}
