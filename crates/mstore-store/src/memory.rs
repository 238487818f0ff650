use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mstore_types::{tags, FolderId, MessageFlags, MessageId, MessageStatus, PropertyValue};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::events::{ChangeEvent, ChangeKind, ChangeSink, NullSink};
use crate::record::{
    FlagsUpdate, FolderRecord, FolderRights, MessageRecord, MessageWrite, WriteCondition,
};
use crate::traits::MessageStore;

const DEFAULT_REPLICA: u16 = 1;

struct FolderState {
    record: FolderRecord,
    messages: BTreeMap<MessageId, MessageRecord>,
}

#[derive(Default)]
struct StoreState {
    folders: BTreeMap<FolderId, FolderState>,
    next_folder: u64,
}

impl StoreState {
    fn folder_mut(&mut self, id: FolderId) -> StoreResult<&mut FolderState> {
        self.folders.get_mut(&id).ok_or(StoreError::FolderNotFound(id))
    }

    fn message_mut(&mut self, folder: FolderId, id: MessageId) -> StoreResult<&mut MessageRecord> {
        self.folder_mut(folder)?
            .messages
            .get_mut(&id)
            .ok_or(StoreError::MessageNotFound {
                folder,
                message: id,
            })
    }
}

/// In-memory message store.
///
/// Intended for tests and embedding. All state is held behind a single
/// `RwLock`, so writes to any message are serialized against each other
/// while reads proceed in parallel. Records are cloned on read and write.
pub struct InMemoryMessageStore {
    replica: u16,
    state: RwLock<StoreState>,
    next_message: AtomicU64,
    sink: Arc<dyn ChangeSink>,
}

impl InMemoryMessageStore {
    /// Create a new empty store that discards change events.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(NullSink))
    }

    /// Create a new empty store reporting durable changes to `sink`.
    pub fn with_sink(sink: Arc<dyn ChangeSink>) -> Self {
        Self {
            replica: DEFAULT_REPLICA,
            state: RwLock::new(StoreState::default()),
            next_message: AtomicU64::new(1),
            sink,
        }
    }

    /// Total number of messages across all folders.
    pub fn len(&self) -> usize {
        self.read_state()
            .map(|s| s.folders.values().map(|f| f.messages.len()).sum())
            .unwrap_or(0)
    }

    /// Returns `true` if no folder holds a message.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_state(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_state(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn emit(&self, kind: ChangeKind, record: &MessageRecord) {
        self.sink.notify(&ChangeEvent {
            kind,
            folder: record.folder,
            message: record.id,
            associated: record.associated,
            generation: record.generation,
        });
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore for InMemoryMessageStore {
    fn create_folder(&self, name: &str, rights: FolderRights) -> StoreResult<FolderId> {
        let mut state = self.write_state()?;
        state.next_folder += 1;
        let id = FolderId::from_parts(self.replica, state.next_folder);
        state.folders.insert(
            id,
            FolderState {
                record: FolderRecord {
                    id,
                    name: name.to_string(),
                    rights,
                },
                messages: BTreeMap::new(),
            },
        );
        debug!(folder = %id, name, "folder created");
        Ok(id)
    }

    fn folder(&self, id: FolderId) -> StoreResult<Option<FolderRecord>> {
        let state = self.read_state()?;
        Ok(state.folders.get(&id).map(|f| f.record.clone()))
    }

    fn set_folder_rights(&self, id: FolderId, rights: FolderRights) -> StoreResult<()> {
        let mut state = self.write_state()?;
        state.folder_mut(id)?.record.rights = rights;
        Ok(())
    }

    fn allocate_message_id(&self) -> StoreResult<MessageId> {
        let counter = self.next_message.fetch_add(1, Ordering::Relaxed);
        Ok(MessageId::from_parts(self.replica, counter))
    }

    fn read_message(&self, folder: FolderId, id: MessageId) -> StoreResult<Option<MessageRecord>> {
        let state = self.read_state()?;
        let folder = state
            .folders
            .get(&folder)
            .ok_or(StoreError::FolderNotFound(folder))?;
        Ok(folder.messages.get(&id).cloned())
    }

    fn write_message(&self, write: MessageWrite) -> StoreResult<u64> {
        let (kind, record) = {
            let mut state = self.write_state()?;
            let folder = state.folder_mut(write.folder)?;
            let found = folder.messages.get(&write.id).map(|r| r.generation);
            let accepted = match write.condition {
                WriteCondition::Create => found.is_none(),
                WriteCondition::Generation(g) => found == Some(g),
                WriteCondition::Unconditional => true,
            };
            if !accepted {
                let expected = match write.condition {
                    WriteCondition::Generation(g) => Some(g),
                    _ => None,
                };
                return Err(StoreError::Conflict {
                    message: write.id,
                    expected,
                    found,
                });
            }

            let record = MessageRecord {
                id: write.id,
                folder: write.folder,
                associated: write.associated,
                generation: found.unwrap_or(0) + 1,
                content: write.content,
            };
            folder.messages.insert(write.id, record.clone());
            let kind = if found.is_some() {
                ChangeKind::Modified
            } else {
                ChangeKind::Created
            };
            (kind, record)
        };
        debug!(message = %record.id, generation = record.generation, ?kind, "message written");
        self.emit(kind, &record);
        Ok(record.generation)
    }

    fn delete_message(&self, folder: FolderId, id: MessageId) -> StoreResult<bool> {
        let removed = {
            let mut state = self.write_state()?;
            state.folder_mut(folder)?.messages.remove(&id)
        };
        match removed {
            Some(record) => {
                debug!(message = %id, "message deleted");
                self.emit(ChangeKind::Deleted, &record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_messages(&self, folder: FolderId, associated: bool) -> StoreResult<Vec<MessageId>> {
        let state = self.read_state()?;
        let folder = state
            .folders
            .get(&folder)
            .ok_or(StoreError::FolderNotFound(folder))?;
        Ok(folder
            .messages
            .values()
            .filter(|r| r.associated == associated)
            .map(|r| r.id)
            .collect())
    }

    fn set_message_status(
        &self,
        folder: FolderId,
        id: MessageId,
        status: MessageStatus,
        mask: MessageStatus,
    ) -> StoreResult<MessageStatus> {
        let (previous, changed) = {
            let mut state = self.write_state()?;
            let record = state.message_mut(folder, id)?;
            let props = &mut record.content.properties;
            let previous =
                MessageStatus::from_bits_retain(props.i32(tags::MESSAGE_STATUS).unwrap_or(0) as u32);
            let next = previous.apply(status, mask);
            if next != previous || !props.contains(tags::MESSAGE_STATUS) {
                props
                    .set(
                        tags::MESSAGE_STATUS,
                        PropertyValue::Integer32(next.bits() as i32),
                    )
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                record.generation += 1;
                (previous, Some(record.clone()))
            } else {
                (previous, None)
            }
        };
        if let Some(record) = changed {
            self.emit(ChangeKind::Modified, &record);
        }
        Ok(previous)
    }

    fn update_flags(
        &self,
        folder: FolderId,
        id: MessageId,
        update: &dyn Fn(MessageFlags) -> MessageFlags,
    ) -> StoreResult<FlagsUpdate> {
        let (result, changed) = {
            let mut state = self.write_state()?;
            let record = state.message_mut(folder, id)?;
            let before = record.content.message_flags();
            let after = update(before);
            let previous_generation = record.generation;
            let changed = if after != before {
                record.content.set_message_flags(after);
                record.generation += 1;
                Some(record.clone())
            } else {
                None
            };
            let result = FlagsUpdate {
                before,
                after,
                previous_generation,
                generation: record.generation,
            };
            (result, changed)
        };
        if let Some(record) = changed {
            self.emit(ChangeKind::Modified, &record);
        }
        Ok(result)
    }
}

impl std::fmt::Debug for InMemoryMessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let folders = self.read_state().map(|s| s.folders.len()).unwrap_or(0);
        f.debug_struct("InMemoryMessageStore")
            .field("replica", &self.replica)
            .field("folder_count", &folders)
            .field("message_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::record::MessageContent;
    use mstore_types::PropertyBag;
    use std::sync::Barrier;
    use std::thread;

    fn content(subject: &str) -> MessageContent {
        let mut properties = PropertyBag::new();
        properties
            .set(tags::SUBJECT, PropertyValue::String(subject.into()))
            .unwrap();
        MessageContent::new(properties)
    }

    fn create(store: &InMemoryMessageStore, folder: FolderId, subject: &str) -> MessageId {
        let id = store.allocate_message_id().unwrap();
        store
            .write_message(MessageWrite {
                folder,
                id,
                associated: false,
                content: content(subject),
                condition: WriteCondition::Create,
            })
            .unwrap();
        id
    }

    // -----------------------------------------------------------------------
    // Folders and ids
    // -----------------------------------------------------------------------

    #[test]
    fn folders_are_distinct_and_readable() {
        let store = InMemoryMessageStore::new();
        let a = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let b = store.create_folder("Drafts", FolderRights::read_only()).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.folder(a).unwrap().unwrap().name, "Inbox");
        assert!(!store.folder(b).unwrap().unwrap().rights.create);

        store.set_folder_rights(b, FolderRights::full()).unwrap();
        assert!(store.folder(b).unwrap().unwrap().rights.create);
    }

    #[test]
    fn message_ids_are_never_reused() {
        let store = InMemoryMessageStore::new();
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let first = create(&store, folder, "a");
        store.delete_message(folder, first).unwrap();
        let second = store.allocate_message_id().unwrap();
        assert_ne!(first, second);
        assert!(second.counter() > first.counter());
    }

    // -----------------------------------------------------------------------
    // Conditional writes
    // -----------------------------------------------------------------------

    #[test]
    fn write_and_read_back() {
        let store = InMemoryMessageStore::new();
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let id = create(&store, folder, "hello");

        let record = store.read_message(folder, id).unwrap().expect("should exist");
        assert_eq!(record.generation, 1);
        assert_eq!(record.content.properties.str(tags::SUBJECT), Some("hello"));
    }

    #[test]
    fn generation_condition_detects_conflict() {
        let store = InMemoryMessageStore::new();
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let id = create(&store, folder, "v1");

        let g2 = store
            .write_message(MessageWrite {
                folder,
                id,
                associated: false,
                content: content("v2"),
                condition: WriteCondition::Generation(1),
            })
            .unwrap();
        assert_eq!(g2, 2);

        let err = store
            .write_message(MessageWrite {
                folder,
                id,
                associated: false,
                content: content("stale"),
                condition: WriteCondition::Generation(1),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: Some(1),
                found: Some(2),
                ..
            }
        ));
        let record = store.read_message(folder, id).unwrap().unwrap();
        assert_eq!(record.content.properties.str(tags::SUBJECT), Some("v2"));
    }

    #[test]
    fn create_condition_rejects_existing() {
        let store = InMemoryMessageStore::new();
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let id = create(&store, folder, "v1");
        let err = store
            .write_message(MessageWrite {
                folder,
                id,
                associated: false,
                content: content("again"),
                condition: WriteCondition::Create,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn unconditional_write_overwrites() {
        let store = InMemoryMessageStore::new();
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let id = create(&store, folder, "v1");
        let g = store
            .write_message(MessageWrite {
                folder,
                id,
                associated: false,
                content: content("forced"),
                condition: WriteCondition::Unconditional,
            })
            .unwrap();
        assert_eq!(g, 2);
    }

    #[test]
    fn racing_generation_writes_admit_one() {
        let store = InMemoryMessageStore::new();
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let id = create(&store, folder, "v1");
        let barrier = Barrier::new(2);

        let results: Vec<_> = thread::scope(|s| {
            let writers: Vec<_> = ["left", "right"]
                .into_iter()
                .map(|subject| {
                    let (store, barrier) = (&store, &barrier);
                    s.spawn(move || {
                        barrier.wait();
                        store.write_message(MessageWrite {
                            folder,
                            id,
                            associated: false,
                            content: content(subject),
                            condition: WriteCondition::Generation(1),
                        })
                    })
                })
                .collect();
            writers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let won: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(won, vec![&2u64]);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(StoreError::Conflict {
                expected: Some(1),
                found: Some(2),
                ..
            })
        )));
        let record = store.read_message(folder, id).unwrap().unwrap();
        assert_eq!(record.generation, 2);
    }

    #[test]
    fn write_to_missing_folder_fails() {
        let store = InMemoryMessageStore::new();
        let err = store
            .write_message(MessageWrite {
                folder: FolderId::from_parts(1, 99),
                id: MessageId::from_parts(1, 1),
                associated: false,
                content: content("x"),
                condition: WriteCondition::Create,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::FolderNotFound(_)));
    }

    // -----------------------------------------------------------------------
    // Listing and deletion
    // -----------------------------------------------------------------------

    #[test]
    fn list_separates_associated_contents() {
        let store = InMemoryMessageStore::new();
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let normal = create(&store, folder, "normal");
        let fai = store.allocate_message_id().unwrap();
        store
            .write_message(MessageWrite {
                folder,
                id: fai,
                associated: true,
                content: content("fai"),
                condition: WriteCondition::Create,
            })
            .unwrap();

        assert_eq!(store.list_messages(folder, false).unwrap(), vec![normal]);
        assert_eq!(store.list_messages(folder, true).unwrap(), vec![fai]);
        assert_eq!(store.message_count(folder, false).unwrap(), 1);
    }

    #[test]
    fn delete_messages_counts_existing() {
        let store = InMemoryMessageStore::new();
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let a = create(&store, folder, "a");
        let b = create(&store, folder, "b");
        let deleted = store
            .delete_messages(folder, &[a, b, MessageId::from_parts(1, 999)])
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Immediate updates
    // -----------------------------------------------------------------------

    #[test]
    fn status_update_returns_previous() {
        let store = InMemoryMessageStore::new();
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let id = create(&store, folder, "s");

        let old = store
            .set_message_status(
                folder,
                id,
                MessageStatus::IN_CONFLICT,
                MessageStatus::IN_CONFLICT,
            )
            .unwrap();
        assert_eq!(old, MessageStatus::empty());

        let old = store
            .set_message_status(
                folder,
                id,
                MessageStatus::empty(),
                MessageStatus::REMOTE_DOWNLOAD,
            )
            .unwrap();
        assert_eq!(old, MessageStatus::IN_CONFLICT);

        let record = store.read_message(folder, id).unwrap().unwrap();
        assert_eq!(
            record.content.properties.i32(tags::MESSAGE_STATUS),
            Some(MessageStatus::IN_CONFLICT.bits() as i32)
        );
    }

    #[test]
    fn flag_update_bumps_generation_only_on_change() {
        let store = InMemoryMessageStore::new();
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let id = create(&store, folder, "f");

        let update = store
            .update_flags(folder, id, &|f| f | MessageFlags::READ)
            .unwrap();
        assert!(update.changed());
        assert_eq!(update.previous_generation, 1);
        assert_eq!(update.generation, 2);

        let again = store
            .update_flags(folder, id, &|f| f | MessageFlags::READ)
            .unwrap();
        assert!(!again.changed());
        assert_eq!(again.generation, 2);

        let record = store.read_message(folder, id).unwrap().unwrap();
        assert_eq!(record.content.properties.bool(tags::READ), Some(true));
    }

    // -----------------------------------------------------------------------
    // Change events
    // -----------------------------------------------------------------------

    #[test]
    fn sink_sees_create_modify_delete() {
        let sink = Arc::new(RecordingSink::new());
        let store = InMemoryMessageStore::with_sink(sink.clone());
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let id = create(&store, folder, "e");
        store
            .write_message(MessageWrite {
                folder,
                id,
                associated: false,
                content: content("e2"),
                condition: WriteCondition::Generation(1),
            })
            .unwrap();
        store.delete_message(folder, id).unwrap();

        let events = sink.events();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Created, ChangeKind::Modified, ChangeKind::Deleted]
        );
        assert_eq!(events[1].generation, 2);
        assert_eq!(events[2].generation, 2);
    }

    #[test]
    fn failed_write_emits_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let store = InMemoryMessageStore::with_sink(sink.clone());
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let id = create(&store, folder, "e");
        sink.take();
        let _ = store.write_message(MessageWrite {
            folder,
            id,
            associated: false,
            content: content("stale"),
            condition: WriteCondition::Generation(7),
        });
        assert!(sink.events().is_empty());
    }
}
