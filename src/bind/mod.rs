// Binding layer between the codec engines and destination object graphs.
//
// 1. Tagged Value variant carrying erased scalars
// 2. Type coercion table (fixed-precision numerics, ISO-8601 dates)
// 3. JsonObject member-access trait consumed by all three engines
// 4. Type factory registry keyed by mapping-class name

pub use self::access::{JsonObject, MemberRef, MemberValue};
pub use self::dynamic::DynamicObject;
pub use self::registry::TypeRegistry;
pub use self::value::Value;

pub mod access;
pub mod coerce;
pub mod dynamic;
pub mod registry;
pub mod value;
