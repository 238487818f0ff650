//! Shared setup for session tests.

use std::sync::Arc;

use mstore_store::{FolderRights, InMemoryMessageStore, MessageRecord, MessageStore, RecordingSink};
use mstore_types::{
    tags, CodePage, FolderId, HandleId, MessageFlags, MessageId, MessageOpenMode, PropertyValue,
    SaveFlags,
};

use crate::config::{ProductBehavior, StoreConfig};
use crate::session::Session;

/// A store with one "Inbox" folder and a session that has it open.
pub(crate) struct Fixture {
    pub store: Arc<InMemoryMessageStore>,
    pub sink: Arc<RecordingSink>,
    pub session: Session,
    pub folder: FolderId,
    pub folder_handle: HandleId,
}

impl Fixture {
    pub fn strict() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn legacy() -> Self {
        Self::with_config(StoreConfig {
            behavior: ProductBehavior::legacy(),
            ..Default::default()
        })
    }

    pub fn with_config(config: StoreConfig) -> Self {
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(InMemoryMessageStore::with_sink(sink.clone()));
        let folder = store.create_folder("Inbox", FolderRights::full()).unwrap();
        let mut session = Session::new(store.clone(), config);
        let folder_handle = session.open_folder(folder).unwrap();
        Self {
            store,
            sink,
            session,
            folder,
            folder_handle,
        }
    }

    /// Another session over the same store.
    pub fn second_session(&self) -> Session {
        Session::new(self.store.clone(), self.session.config().clone())
    }

    pub fn create_message(&mut self) -> HandleId {
        self.session
            .create_message(self.folder_handle, CodePage::USE_LOGON, false)
            .unwrap()
    }

    /// Create and save a message with `subject`, keeping the handle open
    /// read/write.
    pub fn committed_message(&mut self, subject: &str) -> (MessageId, HandleId) {
        let handle = self.create_message();
        self.session
            .set_property(handle, tags::SUBJECT, PropertyValue::String(subject.into()))
            .unwrap();
        let out = self
            .session
            .save_message(handle, SaveFlags::KEEP_OPEN_READ_WRITE)
            .unwrap();
        (out.message_id, handle)
    }

    pub fn open(&mut self, id: MessageId) -> HandleId {
        self.session
            .open_message(
                self.folder_handle,
                id,
                CodePage::USE_LOGON,
                MessageOpenMode::ReadWrite,
            )
            .unwrap()
    }

    pub fn subject(&self, handle: HandleId) -> String {
        match self.session.get_property(handle, tags::SUBJECT) {
            Ok(PropertyValue::String(s)) => s,
            other => panic!("no subject on {handle}: {other:?}"),
        }
    }

    pub fn stored(&self, id: MessageId) -> MessageRecord {
        self.store.read_message(self.folder, id).unwrap().unwrap()
    }

    pub fn stored_flags(&self, id: MessageId) -> MessageFlags {
        self.stored(id).content.message_flags()
    }

    pub fn row_count(&self) -> usize {
        self.session.row_count(self.folder_handle, false).unwrap()
    }
}
