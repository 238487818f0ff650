use std::path::Path;

use mstore_types::{AccessLevel, CodePage, MessageFlags};
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// What a save does when the staged buffer writes a read-only property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadOnlyWritePolicy {
    /// Fail the save with a general failure; nothing changes.
    Reject,
    /// Drop the offending writes and commit the rest.
    Ignore,
}

/// What `KeepOpenReadOnly` does to the handle after a successful save.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeepOpenReadOnlyPolicy {
    /// The handle becomes read-only.
    Honor,
    /// The flag is treated like `KeepOpenReadWrite`.
    GrantModify,
}

/// How a non-forced save resolves a commit made by another handle since
/// this handle opened the object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConcurrentSavePolicy {
    /// Fail with `ObjectModified`.
    Reject,
    /// Overwrite with this handle's state.
    LastWriterWins,
}

/// Access granted when an embedded message is opened with `ReadOnly`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddedReadOnlyPolicy {
    Honor,
    GrantReadWrite,
}

/// Product-behaviour variant selected when the store is constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductBehavior {
    pub read_only_writes: ReadOnlyWritePolicy,
    pub keep_open_read_only: KeepOpenReadOnlyPolicy,
    pub concurrent_save: ConcurrentSavePolicy,
    pub embedded_read_only_open: EmbeddedReadOnlyPolicy,
    /// Message flags of a freshly created (non-associated) message.
    pub initial_message_flags: MessageFlags,
    /// `PidTagAttachSize` of a freshly created attachment.
    pub initial_attach_size: i32,
    /// `PidTagAccessLevel` of a freshly created attachment.
    pub initial_attach_access_level: AccessLevel,
}

impl ProductBehavior {
    /// Current server behaviour: read-only writes fail the save,
    /// `KeepOpenReadOnly` is honoured, conflicting saves are rejected.
    pub fn strict() -> Self {
        Self {
            read_only_writes: ReadOnlyWritePolicy::Reject,
            keep_open_read_only: KeepOpenReadOnlyPolicy::Honor,
            concurrent_save: ConcurrentSavePolicy::Reject,
            embedded_read_only_open: EmbeddedReadOnlyPolicy::GrantReadWrite,
            initial_message_flags: MessageFlags::UNSENT
                | MessageFlags::READ
                | MessageFlags::EVER_READ,
            initial_attach_size: 0,
            initial_attach_access_level: AccessLevel::ReadOnly,
        }
    }

    /// Older server behaviour: read-only writes are silently dropped,
    /// `KeepOpenReadOnly` still grants modify, embedded messages opened
    /// read-only stay read-only.
    pub fn legacy() -> Self {
        Self {
            read_only_writes: ReadOnlyWritePolicy::Ignore,
            keep_open_read_only: KeepOpenReadOnlyPolicy::GrantModify,
            concurrent_save: ConcurrentSavePolicy::Reject,
            embedded_read_only_open: EmbeddedReadOnlyPolicy::Honor,
            initial_message_flags: MessageFlags::UNSENT | MessageFlags::READ,
            initial_attach_size: 0x40,
            initial_attach_access_level: AccessLevel::Modify,
        }
    }

    /// Look up a preset by name (`strict` or `legacy`).
    pub fn preset(name: &str) -> SessionResult<Self> {
        match name {
            "strict" => Ok(Self::strict()),
            "legacy" => Ok(Self::legacy()),
            other => Err(SessionError::Config(format!("unknown profile: {other}"))),
        }
    }
}

impl Default for ProductBehavior {
    fn default() -> Self {
        Self::strict()
    }
}

/// Identity and defaults of the logged-on user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogonContext {
    pub user_name: String,
    pub user_entry_id: Vec<u8>,
    /// Code page used when a request passes "use logon code page".
    pub code_page: CodePage,
    pub locale_id: i32,
}

impl Default for LogonContext {
    fn default() -> Self {
        Self {
            user_name: "Administrator".to_string(),
            user_entry_id: Vec::new(),
            code_page: CodePage::WINDOWS_1252,
            locale_id: 0x0409,
        }
    }
}

/// Top-level store configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub behavior: ProductBehavior,
    pub logon: LogonContext,
}

impl StoreConfig {
    /// Default logon with the named behaviour preset.
    pub fn with_profile(name: &str) -> SessionResult<Self> {
        Ok(Self {
            behavior: ProductBehavior::preset(name)?,
            logon: LogonContext::default(),
        })
    }

    /// Parse from TOML text. Missing sections and fields take their defaults.
    pub fn from_toml_str(text: &str) -> SessionResult<Self> {
        toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SessionResult<String> {
        toml::to_string_pretty(self).map_err(|e| SessionError::Config(e.to_string()))
    }
}
