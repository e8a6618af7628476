// Schema module.
//
// Compiles JSON-Schema-like documents into immutable schema trees and
// checks restrictions against literal values. The compiled tree drives all
// three codec engines.

pub use self::compiler::{compile, compile_text};
pub use self::types::{PatternRestriction, Restriction, SchemaNode, SchemaType};

pub mod compiler;
pub mod restriction;
pub mod types;
