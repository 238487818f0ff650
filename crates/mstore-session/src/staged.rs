//! The per-handle staged change buffer.
//!
//! A [`StagedChanges`] records pending property writes and removals against
//! a base [`PropertyBag`]. It is owned by exactly one handle and touches the
//! base only when the commit engine applies it.

use std::collections::BTreeMap;

use mstore_types::{PropertyBag, PropertyTag, PropertyValue, TypeError};

/// One pending mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StagedOp {
    Set(PropertyValue),
    Remove,
}

/// Pending mutations keyed by tag. A later write to the same tag replaces
/// the earlier one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedChanges {
    ops: BTreeMap<PropertyTag, StagedOp>,
}

impl StagedChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Stage a write. Only the value's type is checked here.
    pub fn set(&mut self, tag: PropertyTag, value: PropertyValue) -> Result<(), TypeError> {
        if value.prop_type() != tag.prop_type {
            return Err(TypeError::TypeMismatch {
                tag,
                actual: value.prop_type(),
            });
        }
        self.ops.insert(tag, StagedOp::Set(value));
        Ok(())
    }

    pub fn remove(&mut self, tag: PropertyTag) {
        self.ops.insert(tag, StagedOp::Remove);
    }

    pub fn get(&self, tag: PropertyTag) -> Option<&StagedOp> {
        self.ops.get(&tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = PropertyTag> + '_ {
        self.ops.keys().copied()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// The value a reader of this handle sees for `tag`.
    pub fn lookup<'a>(&'a self, base: &'a PropertyBag, tag: PropertyTag) -> Option<&'a PropertyValue> {
        match self.ops.get(&tag) {
            Some(StagedOp::Set(v)) => Some(v),
            Some(StagedOp::Remove) => None,
            None => base.get(tag),
        }
    }

    /// `base` with every pending mutation applied.
    pub fn overlay(&self, base: &PropertyBag) -> PropertyBag {
        let mut view = base.clone();
        self.apply_to(&mut view);
        view
    }

    /// Apply every pending mutation to `bag`.
    pub fn apply_to(&self, bag: &mut PropertyBag) {
        for (tag, op) in &self.ops {
            match op {
                StagedOp::Set(value) => {
                    // types were checked when the write was staged
                    bag.set_known(*tag, value.clone());
                }
                StagedOp::Remove => {
                    bag.remove(*tag);
                }
            }
        }
    }

    /// A copy with every mutation whose tag matches `drop` left out.
    pub fn without(&self, drop: impl Fn(PropertyTag) -> bool) -> StagedChanges {
        StagedChanges {
            ops: self
                .ops
                .iter()
                .filter(|(tag, _)| !drop(**tag))
                .map(|(tag, op)| (*tag, op.clone()))
                .collect(),
        }
    }
}
