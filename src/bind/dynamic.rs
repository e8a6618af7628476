// Map-backed destination object.
//
// For callers that do not want to hand-write a destination type per mapping
// class: members live in an ordered name/slot list. Register it under any
// mapping-class name the schema uses.

use std::any::Any;

use crate::bind::access::{JsonObject, MemberRef, MemberValue};
use crate::bind::value::Value;
use crate::internal::error::Result;

enum Slot {
    Scalar(Value),
    Object(Box<dyn JsonObject>),
    Objects(Vec<Box<dyn JsonObject>>),
}

/// A generic destination object holding members by name, in insertion
/// order.
#[derive(Default)]
pub struct DynamicObject {
    members: Vec<(String, Slot)>,
}

impl DynamicObject {
    /// Creates an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a scalar member, if present.
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.members.iter().find(|(n, _)| n == name).and_then(|(_, slot)| match slot {
            Slot::Scalar(value) => Some(value),
            _ => None,
        })
    }

    /// Writes a scalar member, replacing any previous slot.
    pub fn set_scalar(&mut self, name: &str, value: impl Into<Value>) {
        self.upsert(name, Slot::Scalar(value.into()));
    }

    /// Writes a nested object member.
    pub fn set_object(&mut self, name: &str, object: Box<dyn JsonObject>) {
        self.upsert(name, Slot::Object(object));
    }

    /// Writes an object-collection member.
    pub fn set_objects(&mut self, name: &str, objects: Vec<Box<dyn JsonObject>>) {
        self.upsert(name, Slot::Objects(objects));
    }

    /// Member names in insertion order.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(n, _)| n.as_str())
    }

    fn upsert(&mut self, name: &str, slot: Slot) {
        match self.members.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = slot,
            None => self.members.push((name.to_string(), slot)),
        }
    }
}

impl JsonObject for DynamicObject {
    fn type_name(&self) -> &str {
        "DynamicObject"
    }

    fn get_member(&self, name: &str) -> Result<MemberRef<'_>> {
        match self.members.iter().find(|(n, _)| n == name) {
            Some((_, Slot::Scalar(value))) => Ok(MemberRef::Scalar(value.clone())),
            Some((_, Slot::Object(object))) => Ok(MemberRef::Object(object.as_ref())),
            Some((_, Slot::Objects(objects))) => Ok(MemberRef::Objects(
                objects.iter().map(|o| o.as_ref()).collect(),
            )),
            None => Ok(MemberRef::Absent),
        }
    }

    fn set_member(&mut self, name: &str, value: MemberValue) -> Result<()> {
        match value {
            MemberValue::Absent => self.members.retain(|(n, _)| n != name),
            MemberValue::Scalar(v) => self.upsert(name, Slot::Scalar(v)),
            MemberValue::Object(o) => self.upsert(name, Slot::Object(o)),
            MemberValue::Objects(os) => self.upsert(name, Slot::Objects(os)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
