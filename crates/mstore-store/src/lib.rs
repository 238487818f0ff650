//! Durable storage for messages and their attachments.
//!
//! This crate holds the committed side of the message store: the records a
//! top-level save writes, and the backend that keeps them. Nothing in here
//! knows about handles or staged changes; those live one layer up.
//!
//! # Records
//!
//! - [`MessageRecord`] -- a committed top-level message and its generation
//! - [`MessageContent`] -- properties plus the attachment table
//! - [`AttachmentRecord`] -- one attachment, optionally owning an
//!   [`EmbeddedMessage`]
//!
//! # Storage Backends
//!
//! All backends implement the [`MessageStore`] trait:
//!
//! - [`InMemoryMessageStore`] -- `BTreeMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. A message record is replaced whole; there are no partial writes.
//! 2. Every successful write bumps the record's generation by one.
//! 3. Conditional writes compare generations under the store's write lock,
//!    so two writers racing on one message are serialized.
//! 4. Every durable change is reported to the attached [`ChangeSink`] after
//!    the lock is released.

pub mod error;
pub mod events;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use events::{ChangeEvent, ChangeKind, ChangeSink, NullSink, RecordingSink};
pub use memory::InMemoryMessageStore;
pub use record::{
    AttachmentRecord, EmbeddedMessage, FlagsUpdate, FolderRecord, FolderRights, MessageContent,
    MessageRecord, MessageWrite, WriteCondition,
};
pub use traits::MessageStore;
