//! The per-session handle table.

use std::collections::HashMap;
use std::fmt;

use mstore_types::HandleId;
use serde::{Deserialize, Serialize};

use crate::object::{AttachmentObject, FolderObject, MessageObject};

/// The kind of object a handle refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferentKind {
    Folder,
    /// A top-level or embedded message.
    Message,
    Attachment,
}

impl fmt::Display for ReferentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Folder => write!(f, "folder"),
            Self::Message => write!(f, "message"),
            Self::Attachment => write!(f, "attachment"),
        }
    }
}

pub(crate) enum ServerObject {
    Folder(FolderObject),
    Message(MessageObject),
    Attachment(AttachmentObject),
}

impl ServerObject {
    pub(crate) fn kind(&self) -> ReferentKind {
        match self {
            Self::Folder(_) => ReferentKind::Folder,
            Self::Message(_) => ReferentKind::Message,
            Self::Attachment(_) => ReferentKind::Attachment,
        }
    }
}

pub(crate) struct HandleEntry {
    /// The handle this one was opened through; released along with it.
    pub parent: Option<HandleId>,
    pub object: ServerObject,
}

/// Maps handles to the live objects they refer to.
///
/// Releasing a handle releases every handle opened through it, dropping
/// any staged state those handles held.
pub(crate) struct HandleTable {
    entries: HashMap<HandleId, HandleEntry>,
    next: u32,
}

impl HandleTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next: 1,
        }
    }

    pub(crate) fn allocate(&mut self, parent: Option<HandleId>, object: ServerObject) -> HandleId {
        let mut id = HandleId::new(self.next);
        while !id.is_valid() || self.entries.contains_key(&id) {
            self.next = self.next.wrapping_add(1);
            id = HandleId::new(self.next);
        }
        self.next = self.next.wrapping_add(1);
        self.entries.insert(id, HandleEntry { parent, object });
        id
    }

    pub(crate) fn get(&self, id: HandleId) -> Option<&HandleEntry> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: HandleId) -> Option<&mut HandleEntry> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn kind(&self, id: HandleId) -> Option<ReferentKind> {
        self.entries.get(&id).map(|e| e.object.kind())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Handles opened directly through `id`.
    pub(crate) fn children(&self, id: HandleId) -> Vec<HandleId> {
        let mut out: Vec<HandleId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.parent == Some(id))
            .map(|(h, _)| *h)
            .collect();
        out.sort();
        out
    }

    /// Release `id` and everything opened through it. Returns the released
    /// handles; empty if `id` was not live.
    pub(crate) fn release(&mut self, id: HandleId) -> Vec<HandleId> {
        if !self.entries.contains_key(&id) {
            return Vec::new();
        }
        let mut released = vec![id];
        let mut cursor = 0;
        while cursor < released.len() {
            let children = self.children(released[cursor]);
            released.extend(children);
            cursor += 1;
        }
        for h in &released {
            self.entries.remove(h);
        }
        released
    }
}
