use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mstore_types::{tags, FolderId, MessageFlags, MessageId, PropertyBag, PropertyValue};

/// The durable content of a message: its properties and its attachments.
///
/// The same shape backs top-level messages and messages embedded in an
/// attachment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub properties: PropertyBag,
    pub attachments: BTreeMap<u32, AttachmentRecord>,
    /// Next attachment number to hand out. Only ever increases, so numbers
    /// of deleted attachments are never reused.
    pub next_attachment_number: u32,
}

impl MessageContent {
    pub fn new(properties: PropertyBag) -> Self {
        Self {
            properties,
            attachments: BTreeMap::new(),
            next_attachment_number: 0,
        }
    }

    /// Reserve the next attachment number.
    pub fn allocate_attachment_number(&mut self) -> u32 {
        let n = self.next_attachment_number;
        self.next_attachment_number += 1;
        n
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    pub fn message_flags(&self) -> MessageFlags {
        MessageFlags::from_bits_retain(self.properties.i32(tags::MESSAGE_FLAGS).unwrap_or(0) as u32)
    }

    /// Replace the message flags, keeping `PidTagRead` in step with the
    /// read bit.
    pub fn set_message_flags(&mut self, flags: MessageFlags) {
        self.properties
            .set_known(tags::MESSAGE_FLAGS, PropertyValue::Integer32(flags.bits() as i32));
        self.properties
            .set_known(tags::READ, PropertyValue::Boolean(flags.contains(MessageFlags::READ)));
    }

    /// Bring `PidTagHasAttachments` and the has-attach message flag in line
    /// with the attachment table.
    pub fn refresh_attachment_presence(&mut self) {
        let present = self.has_attachments();
        self.properties
            .set_known(tags::HAS_ATTACHMENTS, PropertyValue::Boolean(present));
        let mut flags = self.message_flags();
        flags.set(MessageFlags::HAS_ATTACH, present);
        self.set_message_flags(flags);
    }

    /// Total encoded size of the message, attachments included.
    pub fn encoded_size(&self) -> usize {
        self.properties.encoded_size(&[tags::MESSAGE_SIZE])
            + self
                .attachments
                .values()
                .map(AttachmentRecord::encoded_size)
                .sum::<usize>()
    }
}

/// An attachment as committed into its owning message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub number: u32,
    /// Bumped each time the attachment is saved into its owner.
    pub revision: u64,
    pub properties: PropertyBag,
    pub embedded: Option<EmbeddedMessage>,
}

impl AttachmentRecord {
    /// Size of the attachment's own properties plus any embedded message.
    pub fn encoded_size(&self) -> usize {
        self.properties.encoded_size(&[tags::ATTACH_SIZE])
            + self
                .embedded
                .as_ref()
                .map(|e| e.content.encoded_size())
                .unwrap_or(0)
    }
}

/// A message owned by an attachment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedMessage {
    pub id: MessageId,
    /// Bumped each time the embedded message is saved into its attachment.
    pub revision: u64,
    pub content: MessageContent,
}

/// A committed top-level message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub folder: FolderId,
    /// Folder-associated information (hidden) message.
    pub associated: bool,
    /// Starts at 1 on creation and increases with every write.
    pub generation: u64,
    pub content: MessageContent,
}

/// Rights the current user holds on a folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRights {
    /// May create messages in the folder.
    pub create: bool,
    /// May open existing messages for writing.
    pub modify: bool,
}

impl FolderRights {
    pub const fn full() -> Self {
        Self {
            create: true,
            modify: true,
        }
    }

    pub const fn read_only() -> Self {
        Self {
            create: false,
            modify: false,
        }
    }
}

impl Default for FolderRights {
    fn default() -> Self {
        Self::full()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: FolderId,
    pub name: String,
    pub rights: FolderRights,
}

/// Precondition a [`MessageWrite`] checks against the stored generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteCondition {
    /// The message must not exist yet.
    Create,
    /// The stored generation must equal this value.
    Generation(u64),
    /// Overwrite whatever is there, creating the message if absent.
    Unconditional,
}

/// A whole-record write of one top-level message.
#[derive(Clone, Debug)]
pub struct MessageWrite {
    pub folder: FolderId,
    pub id: MessageId,
    pub associated: bool,
    pub content: MessageContent,
    pub condition: WriteCondition,
}

/// Result of an in-place message flag update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagsUpdate {
    pub before: MessageFlags,
    pub after: MessageFlags,
    pub previous_generation: u64,
    pub generation: u64,
}

impl FlagsUpdate {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}
