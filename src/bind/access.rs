// Member accessor seam.
//
// One pluggable capability: read or write a named member of a destination
// object. Whether an implementation goes through direct fields, accessor
// methods or an internal map is its own business; the engines consume this
// trait uniformly and never branch on the access mode.

use std::any::Any;

use crate::bind::value::Value;
use crate::internal::error::Result;

/// Borrowed view of one member, as read during encoding.
pub enum MemberRef<'a> {
    /// The member is missing or unset.
    Absent,
    /// A scalar member, or a flat collection of scalars as `Value::List`.
    Scalar(Value),
    /// A nested destination object.
    Object(&'a dyn JsonObject),
    /// An ordered collection of destination objects.
    Objects(Vec<&'a dyn JsonObject>),
}

/// Owned value written into a member during decoding.
pub enum MemberValue {
    /// Clears the member.
    Absent,
    /// A scalar member, or a flat collection of scalars as `Value::List`.
    Scalar(Value),
    /// A nested destination object.
    Object(Box<dyn JsonObject>),
    /// An ordered collection of destination objects.
    Objects(Vec<Box<dyn JsonObject>>),
}

/// A destination object the codec can encode from and decode into.
///
/// Implementations are registered with a [`TypeRegistry`] under their
/// mapping-class name so the decode engine can construct fresh instances.
///
/// [`TypeRegistry`]: crate::bind::registry::TypeRegistry
pub trait JsonObject: Any {
    /// Logical type name, matching the schema's `mappingClass`.
    fn type_name(&self) -> &str;

    /// Reads the member called `name`.
    fn get_member(&self, name: &str) -> Result<MemberRef<'_>>;

    /// Writes the member called `name`.
    fn set_member(&mut self, name: &str, value: MemberValue) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Surrenders the boxed instance for by-value downcasting, which typed
    /// implementations need when a decoded child object is written into one
    /// of their members.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl std::fmt::Debug for dyn JsonObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonObject")
            .field("type_name", &self.type_name())
            .finish()
    }
}

impl dyn JsonObject {
    /// Downcasts to a concrete destination type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcasts mutably to a concrete destination type.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
