use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::property::{PropertyTag, PropertyValue};
use crate::time::FileTime;

/// An ordered map from property tag to value.
///
/// Every value stored under a tag has that tag's declared type; [`set`]
/// refuses anything else. Serialized as a list of `{ tag, value }` entries
/// so that it can travel through formats without structured map keys.
///
/// [`set`]: PropertyBag::set
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<PropertyEntry>", try_from = "Vec<PropertyEntry>")]
pub struct PropertyBag {
    values: BTreeMap<PropertyTag, PropertyValue>,
}

/// Serialized form of one bag entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEntry {
    pub tag: PropertyTag,
    pub value: PropertyValue,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `tag`, returning the previous value.
    pub fn set(
        &mut self,
        tag: PropertyTag,
        value: PropertyValue,
    ) -> Result<Option<PropertyValue>, TypeError> {
        if value.prop_type() != tag.prop_type {
            return Err(TypeError::TypeMismatch {
                tag,
                actual: value.prop_type(),
            });
        }
        Ok(self.values.insert(tag, value))
    }

    /// Store a value the store computes itself, whose type is fixed by
    /// the tag. A mismatch is a caller bug and fails a debug assertion; in
    /// release builds the value is dropped and the bag is left unchanged.
    pub fn set_known(&mut self, tag: PropertyTag, value: PropertyValue) {
        let result = self.set(tag, value);
        debug_assert!(result.is_ok(), "{result:?}");
    }

    pub fn get(&self, tag: PropertyTag) -> Option<&PropertyValue> {
        self.values.get(&tag)
    }

    pub fn remove(&mut self, tag: PropertyTag) -> Option<PropertyValue> {
        self.values.remove(&tag)
    }

    pub fn contains(&self, tag: PropertyTag) -> bool {
        self.values.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropertyTag, &PropertyValue)> {
        self.values.iter().map(|(t, v)| (*t, v))
    }

    pub fn tags(&self) -> impl Iterator<Item = PropertyTag> + '_ {
        self.values.keys().copied()
    }

    pub fn i32(&self, tag: PropertyTag) -> Option<i32> {
        self.get(tag).and_then(PropertyValue::as_i32)
    }

    pub fn bool(&self, tag: PropertyTag) -> Option<bool> {
        self.get(tag).and_then(PropertyValue::as_bool)
    }

    pub fn str(&self, tag: PropertyTag) -> Option<&str> {
        self.get(tag).and_then(PropertyValue::as_str)
    }

    pub fn time(&self, tag: PropertyTag) -> Option<FileTime> {
        self.get(tag).and_then(PropertyValue::as_time)
    }

    /// Sum of the encoded sizes of every value, skipping `exclude`.
    pub fn encoded_size(&self, exclude: &[PropertyTag]) -> usize {
        self.values
            .iter()
            .filter(|(tag, _)| !exclude.contains(tag))
            .map(|(_, v)| v.encoded_size())
            .sum()
    }

    /// Write every entry of `other` over this bag.
    pub fn extend_from(&mut self, other: &PropertyBag) {
        for (tag, value) in other.iter() {
            self.values.insert(tag, value.clone());
        }
    }
}

impl fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}

impl From<PropertyBag> for Vec<PropertyEntry> {
    fn from(bag: PropertyBag) -> Self {
        bag.values
            .into_iter()
            .map(|(tag, value)| PropertyEntry { tag, value })
            .collect()
    }
}

impl TryFrom<Vec<PropertyEntry>> for PropertyBag {
    type Error = TypeError;

    fn try_from(entries: Vec<PropertyEntry>) -> Result<Self, Self::Error> {
        let mut bag = PropertyBag::new();
        for entry in entries {
            bag.set(entry.tag, entry.value)?;
        }
        Ok(bag)
    }
}

impl FromIterator<(PropertyTag, PropertyValue)> for PropertyBag {
    /// Collects entries with [`PropertyBag::set_known`]: a value that does
    /// not match its tag type fails a debug assertion. Use
    /// `PropertyBag::try_from` for untrusted entries.
    fn from_iter<I: IntoIterator<Item = (PropertyTag, PropertyValue)>>(iter: I) -> Self {
        let mut bag = PropertyBag::new();
        for (tag, value) in iter {
            bag.set_known(tag, value);
        }
        bag
    }
}
