//! JSON scenario scripts.
//!
//! A script is a list of steps run in order against one session over a
//! fresh in-memory store. Steps that open or create something may bind the
//! resulting handle (or, for saves, the message id) to a name with `as`;
//! later steps refer to it by that name. Each step expects success unless
//! it names a status in `expect`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Utc};
use mstore_session::{
    AttachmentRow, Durability, SaveOutcome, Session, SessionError, SessionResult, StoreConfig,
};
use mstore_store::{FolderRights, InMemoryMessageStore, MessageStore};
use mstore_types::{
    AccessLevel, AttachmentOpenMode, CodePage, EmbeddedOpenMode, ErrorCode, FileTime, FolderId,
    HandleId, MessageId, MessageOpenMode, MessageStatus, PropertyTag, PropertyType,
    PropertyValue, ReadFlags, SaveFlags,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub name: Option<String>,
    /// Behaviour preset; a `--profile` on the command line wins.
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_folders")]
    pub folders: Vec<FolderSpec>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct FolderSpec {
    pub name: String,
    #[serde(default = "granted")]
    pub create: bool,
    #[serde(default = "granted")]
    pub modify: bool,
}

fn granted() -> bool {
    true
}

fn default_folders() -> Vec<FolderSpec> {
    vec![FolderSpec {
        name: "Inbox".to_string(),
        create: true,
        modify: true,
    }]
}

#[derive(Debug, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    #[serde(default, rename = "as")]
    pub bind: Option<String>,
    /// Status name such as `ecNotSupported`; success when absent.
    #[serde(default)]
    pub expect: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    OpenFolder {
        folder: String,
    },
    CreateMessage {
        folder: String,
        #[serde(default)]
        associated: bool,
        #[serde(default)]
        code_page: Option<u16>,
    },
    OpenMessage {
        folder: String,
        message: String,
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        code_page: Option<u16>,
    },
    #[serde(rename = "set")]
    SetProperty {
        handle: String,
        tag: String,
        value: Value,
    },
    #[serde(rename = "delete")]
    DeleteProperty {
        handle: String,
        tag: String,
    },
    #[serde(rename = "get")]
    GetProperty {
        handle: String,
        tag: String,
        #[serde(default)]
        equals: Option<Value>,
    },
    Save {
        handle: String,
        flags: Value,
    },
    Release {
        handle: String,
    },
    CreateAttachment {
        message: String,
    },
    OpenAttachment {
        message: String,
        number: u32,
        #[serde(default)]
        mode: Option<String>,
    },
    DeleteAttachment {
        message: String,
        number: u32,
    },
    OpenEmbedded {
        attachment: String,
        mode: String,
        #[serde(default)]
        code_page: Option<u16>,
    },
    SetReadFlag {
        handle: String,
        #[serde(default)]
        flags: u8,
    },
    SetMessageStatus {
        folder: String,
        message: String,
        status: u32,
        mask: u32,
    },
    DeleteMessages {
        folder: String,
        messages: Vec<String>,
    },
    ExpectRows {
        folder: String,
        #[serde(default)]
        associated: bool,
        count: usize,
    },
    ExpectAttachments {
        message: String,
        count: usize,
    },
    ExpectAccess {
        handle: String,
        level: String,
    },
}

impl Action {
    pub fn op(&self) -> &'static str {
        match self {
            Self::OpenFolder { .. } => "open_folder",
            Self::CreateMessage { .. } => "create_message",
            Self::OpenMessage { .. } => "open_message",
            Self::SetProperty { .. } => "set",
            Self::DeleteProperty { .. } => "delete",
            Self::GetProperty { .. } => "get",
            Self::Save { .. } => "save",
            Self::Release { .. } => "release",
            Self::CreateAttachment { .. } => "create_attachment",
            Self::OpenAttachment { .. } => "open_attachment",
            Self::DeleteAttachment { .. } => "delete_attachment",
            Self::OpenEmbedded { .. } => "open_embedded",
            Self::SetReadFlag { .. } => "set_read_flag",
            Self::SetMessageStatus { .. } => "set_message_status",
            Self::DeleteMessages { .. } => "delete_messages",
            Self::ExpectRows { .. } => "expect_rows",
            Self::ExpectAttachments { .. } => "expect_attachments",
            Self::ExpectAccess { .. } => "expect_access",
        }
    }
}

/// What a step did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Ok { detail: String },
    Error { code: u32, name: String, message: String },
    /// The operation succeeded but observed state differs from the script.
    Mismatch { detail: String },
}

impl From<SessionError> for Outcome {
    fn from(err: SessionError) -> Self {
        let code = err.code();
        Outcome::Error {
            code: code.as_u32(),
            name: code.name().unwrap_or("unknown").to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub expected: String,
    pub outcome: Outcome,
    pub passed: bool,
}

/// Executes scripts against one session.
pub struct Runner {
    session: Session,
    folders: HashMap<String, FolderId>,
    handles: HashMap<String, HandleId>,
    messages: HashMap<String, MessageId>,
}

impl Runner {
    /// A fresh in-memory store holding `folders`, and a session over it.
    pub fn new(config: StoreConfig, folders: &[FolderSpec]) -> anyhow::Result<Self> {
        let store = Arc::new(InMemoryMessageStore::new());
        let mut ids = HashMap::new();
        for spec in folders {
            let rights = FolderRights {
                create: spec.create,
                modify: spec.modify,
            };
            ids.insert(spec.name.clone(), store.create_folder(&spec.name, rights)?);
        }
        Ok(Self {
            session: Session::new(store, config),
            folders: ids,
            handles: HashMap::new(),
            messages: HashMap::new(),
        })
    }

    pub fn run(&mut self, steps: &[Step]) -> anyhow::Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            let index = i + 1;
            let op = step.action.op();
            let expected = match &step.expect {
                Some(name) => ErrorCode::from_name(name)
                    .ok_or_else(|| anyhow!("step {index}: unknown status name {name:?}"))?,
                None => ErrorCode::SUCCESS,
            };
            let outcome = self
                .execute(&step.action, step.bind.as_deref())
                .with_context(|| format!("step {index} ({op})"))?;
            let passed = match &outcome {
                Outcome::Ok { .. } => expected.is_success(),
                Outcome::Error { code, .. } => *code == expected.as_u32(),
                Outcome::Mismatch { .. } => false,
            };
            debug!(index, op, passed, "step finished");
            reports.push(StepReport {
                index,
                op,
                expected: expected.name().unwrap_or("unknown").to_string(),
                outcome,
                passed,
            });
        }
        Ok(reports)
    }

    fn folder(&self, name: &str) -> anyhow::Result<FolderId> {
        self.folders
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("no folder named {name:?}"))
    }

    fn handle(&self, name: &str) -> anyhow::Result<HandleId> {
        self.handles
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("no handle named {name:?}"))
    }

    fn message(&self, name: &str) -> anyhow::Result<MessageId> {
        self.messages
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("no message named {name:?}"))
    }

    fn bind_handle(&mut self, bind: Option<&str>, handle: HandleId) -> String {
        if let Some(name) = bind {
            self.handles.insert(name.to_string(), handle);
        }
        handle.to_string()
    }

    fn execute(&mut self, action: &Action, bind: Option<&str>) -> anyhow::Result<Outcome> {
        let result: SessionResult<String> = match action {
            Action::OpenFolder { folder } => {
                let id = self.folder(folder)?;
                self.session
                    .open_folder(id)
                    .map(|h| self.bind_handle(bind, h))
            }
            Action::CreateMessage {
                folder,
                associated,
                code_page,
            } => {
                let folder = self.handle(folder)?;
                self.session
                    .create_message(folder, code_page_arg(*code_page), *associated)
                    .map(|h| self.bind_handle(bind, h))
            }
            Action::OpenMessage {
                folder,
                message,
                mode,
                code_page,
            } => {
                let folder = self.handle(folder)?;
                let id = self.message(message)?;
                let mode = message_mode(mode.as_deref())?;
                self.session
                    .open_message(folder, id, code_page_arg(*code_page), mode)
                    .map(|h| self.bind_handle(bind, h))
            }
            Action::SetProperty { handle, tag, value } => {
                let handle = self.handle(handle)?;
                let tag = parse_tag(tag)?;
                let value = to_property_value(tag, value)?;
                self.session
                    .set_property(handle, tag, value)
                    .map(|()| format!("{tag:?} staged"))
            }
            Action::DeleteProperty { handle, tag } => {
                let handle = self.handle(handle)?;
                let tag = parse_tag(tag)?;
                self.session
                    .delete_property(handle, tag)
                    .map(|()| format!("{tag:?} removal staged"))
            }
            Action::GetProperty {
                handle,
                tag,
                equals,
            } => {
                let handle = self.handle(handle)?;
                let tag = parse_tag(tag)?;
                let wanted = equals
                    .as_ref()
                    .map(|v| to_property_value(tag, v))
                    .transpose()?;
                match self.session.get_property(handle, tag) {
                    Ok(actual) => match wanted {
                        Some(wanted) if !actual.matches(tag, &wanted) => {
                            return Ok(Outcome::Mismatch {
                                detail: format!("{tag:?} is {actual}, expected {wanted}"),
                            })
                        }
                        _ => Ok(format!("{tag:?} = {actual}")),
                    },
                    Err(e) => Err(e),
                }
            }
            Action::Save { handle, flags } => {
                let handle = self.handle(handle)?;
                let flags = parse_save_flags(flags)?;
                match self.session.save(handle, flags) {
                    Ok(outcome) => Ok(self.describe_save(bind, outcome)),
                    Err(e) => Err(e),
                }
            }
            Action::Release { handle } => {
                let handle = self.handle(handle)?;
                self.session.release(handle);
                Ok(format!("{handle} released"))
            }
            Action::CreateAttachment { message } => {
                let message = self.handle(message)?;
                self.session
                    .create_attachment(message)
                    .map(|(h, number)| format!("{} (attachment {number})", self.bind_handle(bind, h)))
            }
            Action::OpenAttachment {
                message,
                number,
                mode,
            } => {
                let message = self.handle(message)?;
                let mode = attachment_mode(mode.as_deref())?;
                self.session
                    .open_attachment(message, *number, mode)
                    .map(|h| self.bind_handle(bind, h))
            }
            Action::DeleteAttachment { message, number } => {
                let message = self.handle(message)?;
                self.session
                    .delete_attachment(message, *number)
                    .map(|()| format!("attachment {number} deleted"))
            }
            Action::OpenEmbedded {
                attachment,
                mode,
                code_page,
            } => {
                let attachment = self.handle(attachment)?;
                let mode = embedded_mode(mode)?;
                self.session
                    .open_embedded_message(attachment, code_page_arg(*code_page), mode)
                    .map(|h| self.bind_handle(bind, h))
            }
            Action::SetReadFlag { handle, flags } => {
                let handle = self.handle(handle)?;
                self.session
                    .set_message_read_flag(handle, ReadFlags::from_bits_retain(*flags))
                    .map(|changed| format!("read state changed: {changed}"))
            }
            Action::SetMessageStatus {
                folder,
                message,
                status,
                mask,
            } => {
                let folder = self.handle(folder)?;
                let id = self.message(message)?;
                self.session
                    .set_message_status(
                        folder,
                        id,
                        MessageStatus::from_bits_retain(*status),
                        MessageStatus::from_bits_retain(*mask),
                    )
                    .map(|old| format!("previous status {old:?}"))
            }
            Action::DeleteMessages { folder, messages } => {
                let folder = self.handle(folder)?;
                let ids = messages
                    .iter()
                    .map(|m| self.message(m))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                self.session
                    .delete_messages(folder, &ids)
                    .map(|n| format!("{n} deleted"))
            }
            Action::ExpectRows {
                folder,
                associated,
                count,
            } => {
                let folder = self.handle(folder)?;
                match self.session.row_count(folder, *associated) {
                    Ok(n) if n == *count => Ok(format!("{n} rows")),
                    Ok(n) => {
                        return Ok(Outcome::Mismatch {
                            detail: format!("{n} rows, expected {count}"),
                        })
                    }
                    Err(e) => Err(e),
                }
            }
            Action::ExpectAttachments { message, count } => {
                let message = self.handle(message)?;
                match self.session.attachment_table(message) {
                    Ok(rows) if rows.len() == *count => Ok(describe_rows(&rows)),
                    Ok(rows) => {
                        return Ok(Outcome::Mismatch {
                            detail: format!("{} attachments, expected {count}", rows.len()),
                        })
                    }
                    Err(e) => Err(e),
                }
            }
            Action::ExpectAccess { handle, level } => {
                let handle = self.handle(handle)?;
                let wanted = access_level(level)?;
                match self.session.access_level(handle) {
                    Ok(actual) if actual == wanted => Ok(format!("{actual:?}")),
                    Ok(actual) => {
                        return Ok(Outcome::Mismatch {
                            detail: format!("access {actual:?}, expected {wanted:?}"),
                        })
                    }
                    Err(e) => Err(e),
                }
            }
        };
        Ok(match result {
            Ok(detail) => Outcome::Ok { detail },
            Err(e) => e.into(),
        })
    }

    fn describe_save(&mut self, bind: Option<&str>, outcome: SaveOutcome) -> String {
        match outcome {
            SaveOutcome::Message(m) => {
                if let Some(name) = bind {
                    self.messages.insert(name.to_string(), m.message_id);
                }
                match m.durability {
                    Durability::Durable { generation, .. } => {
                        format!("{} generation {generation}", m.message_id)
                    }
                    Durability::StagedForParent { attachment } => {
                        format!("{} staged into {attachment}", m.message_id)
                    }
                }
            }
            SaveOutcome::Attachment(a) => format!(
                "attachment {} revision {} staged into {}",
                a.attachment_number, a.revision, a.message
            ),
        }
    }
}

/// Run a whole script under `config`.
pub fn run(script: &Script, config: StoreConfig) -> anyhow::Result<Vec<StepReport>> {
    let mut runner = Runner::new(config, &script.folders)?;
    runner.run(&script.steps)
}

fn describe_rows(rows: &[AttachmentRow]) -> String {
    let numbers: Vec<String> = rows.iter().map(|r| r.number.to_string()).collect();
    format!("attachments [{}]", numbers.join(", "))
}

fn code_page_arg(raw: Option<u16>) -> CodePage {
    raw.map(CodePage::new).unwrap_or(CodePage::USE_LOGON)
}

fn parse_tag(raw: &str) -> anyhow::Result<PropertyTag> {
    raw.parse::<PropertyTag>()
        .with_context(|| format!("unknown property tag {raw:?}"))
}

fn message_mode(raw: Option<&str>) -> anyhow::Result<MessageOpenMode> {
    Ok(match raw.unwrap_or("read_only") {
        "read_only" => MessageOpenMode::ReadOnly,
        "read_write" => MessageOpenMode::ReadWrite,
        "best_access" => MessageOpenMode::BestAccess,
        other => bail!("unknown message open mode {other:?}"),
    })
}

fn attachment_mode(raw: Option<&str>) -> anyhow::Result<AttachmentOpenMode> {
    Ok(match raw.unwrap_or("read_only") {
        "read_only" => AttachmentOpenMode::ReadOnly,
        "read_write" => AttachmentOpenMode::ReadWrite,
        "best_access" => AttachmentOpenMode::BestAccess,
        other => bail!("unknown attachment open mode {other:?}"),
    })
}

fn embedded_mode(raw: &str) -> anyhow::Result<EmbeddedOpenMode> {
    Ok(match raw {
        "read_only" => EmbeddedOpenMode::ReadOnly,
        "read_write" => EmbeddedOpenMode::ReadWrite,
        "create" => EmbeddedOpenMode::Create,
        other => bail!("unknown embedded open mode {other:?}"),
    })
}

fn access_level(raw: &str) -> anyhow::Result<AccessLevel> {
    Ok(match raw {
        "read_only" => AccessLevel::ReadOnly,
        "modify" => AccessLevel::Modify,
        other => bail!("unknown access level {other:?}"),
    })
}

/// Save flags as a raw byte or `|`-separated names.
fn parse_save_flags(raw: &Value) -> anyhow::Result<SaveFlags> {
    match raw {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .map(SaveFlags::from_bits_retain)
            .ok_or_else(|| anyhow!("save flags out of range: {n}")),
        Value::String(s) => s.split('|').map(str::trim).try_fold(
            SaveFlags::empty(),
            |acc, name| -> anyhow::Result<SaveFlags> {
                let flag = match name {
                    "keep_open_read_only" => SaveFlags::KEEP_OPEN_READ_ONLY,
                    "keep_open_read_write" => SaveFlags::KEEP_OPEN_READ_WRITE,
                    "force_save" => SaveFlags::FORCE_SAVE,
                    "delayed_commit" => SaveFlags::DELAYED_COMMIT,
                    other => bail!("unknown save flag {other:?}"),
                };
                Ok(acc | flag)
            },
        ),
        other => bail!("save flags must be a number or names, got {other}"),
    }
}

fn int_in<T: TryFrom<i64>>(raw: &Value) -> Option<T> {
    raw.as_i64().and_then(|v| T::try_from(v).ok())
}

/// 32-bit values may be written signed or as unsigned bit patterns.
fn int32(raw: &Value) -> Option<i32> {
    int_in::<i32>(raw).or_else(|| int_in::<u32>(raw).map(|v| v as i32))
}

fn hex_bytes(raw: &Value) -> Option<Vec<u8>> {
    raw.as_str().and_then(|s| hex::decode(s).ok())
}

/// Convert a JSON value to the property type `tag` declares.
fn to_property_value(tag: PropertyTag, raw: &Value) -> anyhow::Result<PropertyValue> {
    let value = match tag.prop_type {
        PropertyType::Integer16 => int_in::<i16>(raw).map(PropertyValue::Integer16),
        PropertyType::Integer32 => int32(raw).map(PropertyValue::Integer32),
        PropertyType::Boolean => raw.as_bool().map(PropertyValue::Boolean),
        PropertyType::Integer64 => raw.as_i64().map(PropertyValue::Integer64),
        PropertyType::String8 => raw.as_str().map(|s| PropertyValue::String8(s.to_string())),
        PropertyType::String => raw.as_str().map(|s| PropertyValue::String(s.to_string())),
        PropertyType::Time => match raw {
            Value::Number(n) => n.as_u64().map(|t| PropertyValue::Time(FileTime::from_ticks(t))),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| PropertyValue::Time(FileTime::from_datetime(dt.with_timezone(&Utc)))),
            _ => None,
        },
        PropertyType::Guid => hex_bytes(raw)
            .and_then(|b| <[u8; 16]>::try_from(b).ok())
            .map(PropertyValue::Guid),
        PropertyType::Binary => hex_bytes(raw).map(PropertyValue::Binary),
        PropertyType::MultiInteger32 => raw
            .as_array()
            .and_then(|items| items.iter().map(int32).collect::<Option<Vec<_>>>())
            .map(PropertyValue::MultiInteger32),
        PropertyType::MultiString => raw
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .map(PropertyValue::MultiString),
    };
    value.ok_or_else(|| anyhow!("{raw} is not a valid {:?} value for {tag:?}", tag.prop_type))
}
