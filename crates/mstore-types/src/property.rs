use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::time::FileTime;

/// Wire type of a property value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum PropertyType {
    Integer16 = 0x0002,
    Integer32 = 0x0003,
    Boolean = 0x000B,
    Integer64 = 0x0014,
    String8 = 0x001E,
    String = 0x001F,
    Time = 0x0040,
    Guid = 0x0048,
    Binary = 0x0102,
    MultiInteger32 = 0x1003,
    MultiString = 0x101F,
}

impl PropertyType {
    /// The 16-bit wire code.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Decode a wire code.
    pub fn from_code(code: u16) -> Result<Self, TypeError> {
        Ok(match code {
            0x0002 => Self::Integer16,
            0x0003 => Self::Integer32,
            0x000B => Self::Boolean,
            0x0014 => Self::Integer64,
            0x001E => Self::String8,
            0x001F => Self::String,
            0x0040 => Self::Time,
            0x0048 => Self::Guid,
            0x0102 => Self::Binary,
            0x1003 => Self::MultiInteger32,
            0x101F => Self::MultiString,
            other => return Err(TypeError::UnknownPropertyType(other)),
        })
    }
}

/// A property identifier paired with its value type.
///
/// Ordering is by id first, then type, so a [`PropertyBag`](crate::PropertyBag)
/// iterates in the same order a client enumerating tags would see.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyTag {
    pub id: u16,
    pub prop_type: PropertyType,
}

impl PropertyTag {
    pub const fn new(id: u16, prop_type: PropertyType) -> Self {
        Self { id, prop_type }
    }

    /// The packed 32-bit form (`id << 16 | type`).
    pub const fn to_u32(self) -> u32 {
        ((self.id as u32) << 16) | self.prop_type.code() as u32
    }

    pub fn from_u32(raw: u32) -> Result<Self, TypeError> {
        let prop_type = PropertyType::from_code((raw & 0xFFFF) as u16)?;
        Ok(Self::new((raw >> 16) as u16, prop_type))
    }

    /// Whether values under this tag name a class (message class and the
    /// like), which compare without regard to ASCII case.
    pub fn is_class_identifier(self) -> bool {
        self.id == crate::tags::MESSAGE_CLASS.id
    }
}

impl fmt::Debug for PropertyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::tags::name_of(*self) {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "PropertyTag(0x{:08X})", self.to_u32()),
        }
    }
}

impl fmt::Display for PropertyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.to_u32())
    }
}

impl FromStr for PropertyTag {
    type Err = TypeError;

    /// Accepts a well-known name (`PidTagSubject`) or a packed hex tag
    /// (`0x0037001F`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(tag) = crate::tags::by_name(s) {
            return Ok(tag);
        }
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| TypeError::InvalidTag(s.to_string()))?;
        let raw = u32::from_str_radix(hex, 16).map_err(|_| TypeError::InvalidTag(s.to_string()))?;
        Self::from_u32(raw)
    }
}

/// A typed property payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    Integer16(i16),
    Integer32(i32),
    Boolean(bool),
    Integer64(i64),
    String8(String),
    String(String),
    Time(FileTime),
    Guid([u8; 16]),
    Binary(Vec<u8>),
    MultiInteger32(Vec<i32>),
    MultiString(Vec<String>),
}

impl PropertyValue {
    /// The wire type this value encodes as.
    pub fn prop_type(&self) -> PropertyType {
        match self {
            Self::Integer16(_) => PropertyType::Integer16,
            Self::Integer32(_) => PropertyType::Integer32,
            Self::Boolean(_) => PropertyType::Boolean,
            Self::Integer64(_) => PropertyType::Integer64,
            Self::String8(_) => PropertyType::String8,
            Self::String(_) => PropertyType::String,
            Self::Time(_) => PropertyType::Time,
            Self::Guid(_) => PropertyType::Guid,
            Self::Binary(_) => PropertyType::Binary,
            Self::MultiInteger32(_) => PropertyType::MultiInteger32,
            Self::MultiString(_) => PropertyType::MultiString,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer32(v) => Some(*v),
            Self::Integer16(v) => Some(i32::from(*v)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::String8(s) => Some(s),
            _ => None,
        }
    }

    /// Compare against `other` the way values stored under `tag` match.
    pub fn matches(&self, tag: PropertyTag, other: &PropertyValue) -> bool {
        if tag.is_class_identifier() && self.prop_type() == other.prop_type() {
            if let (Some(a), Some(b)) = (self.as_str(), other.as_str()) {
                return a.eq_ignore_ascii_case(b);
            }
        }
        self == other
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<FileTime> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Encoded size in bytes, as counted toward message and attachment sizes.
    ///
    /// Unicode strings count as UTF-16 with a terminator; 8-bit strings
    /// count one byte per character plus a terminator.
    pub fn encoded_size(&self) -> usize {
        match self {
            Self::Integer16(_) => 2,
            Self::Integer32(_) => 4,
            Self::Boolean(_) => 2,
            Self::Integer64(_) | Self::Time(_) => 8,
            Self::String8(s) => s.len() + 1,
            Self::String(s) => (s.encode_utf16().count() + 1) * 2,
            Self::Guid(_) => 16,
            Self::Binary(b) => b.len(),
            Self::MultiInteger32(v) => 4 + v.len() * 4,
            Self::MultiString(v) => {
                4 + v
                    .iter()
                    .map(|s| (s.encode_utf16().count() + 1) * 2)
                    .sum::<usize>()
            }
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer16(v) => write!(f, "{v}"),
            Self::Integer32(v) => write!(f, "{v} (0x{v:08X})"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer64(v) => write!(f, "{v}"),
            Self::String8(s) | Self::String(s) => write!(f, "{s:?}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::Guid(g) => write!(f, "{{{}}}", hex::encode(g)),
            Self::Binary(b) => write!(f, "[{} bytes] {}", b.len(), hex::encode(b)),
            Self::MultiInteger32(v) => write!(f, "{v:?}"),
            Self::MultiString(v) => write!(f, "{v:?}"),
        }
    }
}
