// Codec module: JSON tokenizer, generic parser and the three engines,
// tied together by the JsonCodec entry type.

use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::bind::access::JsonObject;
use crate::bind::registry::TypeRegistry;
use crate::internal::error::Result;
use crate::internal::io::DocumentStore;
use crate::schema;
use crate::schema::types::SchemaNode;

pub mod decode;
pub mod encode;
pub mod parser;
pub mod scanner;
pub mod types;
pub mod validate;

pub use self::types::{JsonType, TreeNode};

/// Configuration for a codec instance.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Line-break string emitted between members in pretty output. An empty
    /// string produces single-line output.
    pub line_break: String,

    /// Indentation unit, repeated per nesting level. Ignored when
    /// `line_break` is empty.
    pub indent: String,

    /// Strip line breaks and non-quoted whitespace from encoded output.
    pub compact: bool,

    /// Maximum nesting depth accepted by the parser and the engines.
    pub max_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            line_break: "\n".to_string(),
            indent: "  ".to_string(),
            compact: false,
            max_depth: 64,
        }
    }
}

/// Schema-driven JSON codec.
///
/// The schema tree is compiled once per instance and reused across calls;
/// the data tree is rebuilt on every decode/validate call. All recursion
/// scratch lives in per-call contexts, so one instance can serve concurrent
/// reads.
pub struct JsonCodec {
    schema: Arc<SchemaNode>,
    registry: TypeRegistry,
    config: CodecConfig,
}

impl JsonCodec {
    /// Compiles a schema document and builds a codec with the default
    /// configuration.
    pub fn new(schema_text: &str, registry: TypeRegistry) -> Result<Self> {
        Self::with_config(schema_text, registry, CodecConfig::default())
    }

    /// Compiles a schema document and builds a codec with a custom
    /// configuration.
    pub fn with_config(
        schema_text: &str,
        registry: TypeRegistry,
        config: CodecConfig,
    ) -> Result<Self> {
        let schema = schema::compile_text(schema_text, config.max_depth)?;
        Ok(Self {
            schema,
            registry,
            config,
        })
    }

    /// Builds a codec around an already compiled schema tree.
    pub fn from_tree(schema: Arc<SchemaNode>, registry: TypeRegistry, config: CodecConfig) -> Self {
        Self {
            schema,
            registry,
            config,
        }
    }

    /// Reads a schema document from a store and compiles it.
    pub fn from_store(
        store: &dyn DocumentStore,
        path: &Path,
        registry: TypeRegistry,
    ) -> Result<Self> {
        let text = store.read_document(path)?;
        debug!("compiling schema from '{}'", path.display());
        Self::new(&text, registry)
    }

    /// The compiled schema tree.
    pub fn schema(&self) -> &Arc<SchemaNode> {
        &self.schema
    }

    /// The active configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// The destination type registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Encodes an object graph into JSON text.
    pub fn encode(&self, source: &dyn JsonObject) -> Result<String> {
        encode::encode(&self.schema, source, &self.config)
    }

    /// Decodes JSON text into a freshly constructed object graph. The root
    /// schema must name a `mappingClass`; use
    /// [`decode_into`](Self::decode_into) otherwise.
    pub fn decode(&self, text: &str) -> Result<Box<dyn JsonObject>> {
        let data = parser::parse(text, self.config.max_depth)?;
        decode::decode(&self.schema, &data, &self.registry)
    }

    /// Decodes JSON text into a caller-provided root object.
    pub fn decode_into(&self, text: &str, target: &mut dyn JsonObject) -> Result<()> {
        let data = parser::parse(text, self.config.max_depth)?;
        decode::decode_into(&self.schema, &data, &self.registry, target)
    }

    /// Validates JSON text against the schema without materializing
    /// objects. Fails fast with the first violation.
    pub fn validate(&self, text: &str) -> Result<()> {
        let data = parser::parse(text, self.config.max_depth)?;
        validate::validate(&self.schema, &data)
    }

    /// Boolean form of [`validate`](Self::validate).
    pub fn is_valid(&self, text: &str) -> bool {
        self.validate(text).is_ok()
    }

    /// Encodes an object graph and atomically replaces the document at
    /// `path`.
    pub fn encode_to_store(
        &self,
        store: &dyn DocumentStore,
        path: &Path,
        source: &dyn JsonObject,
    ) -> Result<()> {
        let text = self.encode(source)?;
        store.write_document(path, &text)
    }

    /// Reads the document at `path` and decodes it.
    pub fn decode_from_store(
        &self,
        store: &dyn DocumentStore,
        path: &Path,
    ) -> Result<Box<dyn JsonObject>> {
        let text = store.read_document(path)?;
        self.decode(&text)
    }
}
