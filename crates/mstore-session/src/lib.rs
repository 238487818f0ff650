//! Handle-scoped transactions over messages and attachments.
//!
//! A [`Session`] hands out handles to folders, messages, attachments and
//! embedded messages. Property writes made through a handle are staged on
//! that handle alone and become visible to anyone else only when the
//! handle is saved.
//!
//! # Commit Layers
//!
//! - A top-level message save writes the whole message, attachments
//!   included, to the [`MessageStore`](mstore_store::MessageStore).
//! - An attachment save merges into the working copy of its message
//!   handle.
//! - An embedded message save merges into its attachment handle.
//!
//! # Design Rules
//!
//! 1. A failed save changes nothing: not the store, not the staged buffer,
//!    not the handle's access level.
//! 2. Read-only properties are accepted when staged and judged at save
//!    time, according to the configured [`ProductBehavior`].
//! 3. Releasing a handle drops its staged state and every handle opened
//!    through it.
//! 4. Attachment numbers are never reused within a message.

pub mod attachment;
pub mod commit;
pub mod config;
pub mod error;
pub mod handle;
pub mod message;
pub mod object;
pub mod policy;
pub mod session;
pub mod staged;

#[cfg(test)]
mod testing;

pub use commit::{
    access_after_save, resolve_mode, AttachmentSaveOutcome, Durability, MessageSaveOutcome,
    SaveOutcome,
};
pub use config::{
    ConcurrentSavePolicy, EmbeddedReadOnlyPolicy, KeepOpenReadOnlyPolicy, LogonContext,
    ProductBehavior, ReadOnlyWritePolicy, StoreConfig,
};
pub use error::{SessionError, SessionResult};
pub use handle::ReferentKind;
pub use object::{AttachmentRow, CommitState};
pub use policy::{is_read_only, read_only_tags, ObjectKind};
pub use session::Session;
pub use staged::{StagedChanges, StagedOp};
