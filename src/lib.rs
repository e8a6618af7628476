// Fulmen library entry point.
//
// A schema-driven JSON codec: a JSON-Schema-like document is compiled once
// into an immutable schema tree, which then drives three symmetric
// operations over typed object graphs: encode, decode and validate. The
// tokenizer and parser are hand-written; no external JSON library is
// involved.

pub mod bind;
pub mod codec;
pub mod internal;
pub mod schema;

pub use crate::bind::{DynamicObject, JsonObject, MemberRef, MemberValue, TypeRegistry, Value};
pub use crate::codec::{CodecConfig, JsonCodec};
pub use crate::internal::{DocumentStore, Error, FileStore, Result};
pub use crate::schema::{Restriction, SchemaNode, SchemaType};
