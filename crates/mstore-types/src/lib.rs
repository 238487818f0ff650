//! Foundation types for the message store.
//!
//! This crate provides the property model and the protocol-level flag words
//! shared by every other `mstore` crate.
//!
//! # Key Types
//!
//! - [`PropertyTag`] -- 16-bit property id paired with a [`PropertyType`]
//! - [`PropertyValue`] -- Typed property payload
//! - [`PropertyBag`] -- Ordered tag → value map with type checking
//! - [`MessageId`] / [`FolderId`] -- Replica-qualified store identifiers
//! - [`HandleId`] -- Session-scoped reference to a server object
//! - [`SaveFlags`] -- Commit directive carried by a save request
//! - [`ErrorCode`] -- Wire-level status code returned to clients

pub mod bag;
pub mod codes;
pub mod error;
pub mod flags;
pub mod ids;
pub mod property;
pub mod tags;
pub mod time;

pub use bag::{PropertyBag, PropertyEntry};
pub use codes::ErrorCode;
pub use error::TypeError;
pub use flags::{
    AccessLevel, AttachMethod, AttachmentOpenMode, CodePage, EmbeddedOpenMode, MessageFlags,
    MessageOpenMode, MessageStatus, ObjectType, ReadFlags, SaveFlags, SaveMode,
};
pub use ids::{FolderId, HandleId, MessageId};
pub use property::{PropertyTag, PropertyType, PropertyValue};
pub use time::FileTime;
