use thiserror::Error;
use std::io;

/// Unified error type for the Fulmen library.
#[derive(Error, Debug)]
pub enum Error {
    /// Tokenizer or grammar violation in a JSON document. Carries a bounded
    /// context window around the offending position, never the whole text.
    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    /// Error raised while compiling a schema document: missing type, missing
    /// mapping, dangling `$ref`, conflicting object/array markers, unresolved
    /// required name.
    #[error("Schema Error: {0}")]
    SchemaError(String),

    /// A member marked `required` was missing, null or empty.
    #[error("Required Value Error: {0}")]
    RequiredValue(String),

    /// A restriction attached to a schema node rejected a value.
    #[error("Restriction Error: {0}")]
    Restriction(String),

    /// The inferred type of a data value does not satisfy the schema type.
    #[error("Type Mismatch: {0}")]
    TypeMismatch(String),

    /// Error raised by the member accessor or the type registry.
    #[error("Binding Error: {0}")]
    BindingError(String),

    /// Error converting a scalar value to or from its JSON literal text.
    #[error("Conversion Error: {0}")]
    ConversionError(String),

    /// Error reading or replacing a whole document.
    #[error("Document Error: {0}")]
    DocumentError(String),
}

/// A specialized `Result` type for Fulmen operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::DocumentError(format!("IO Error during document operation: {}", err))
    }
}
