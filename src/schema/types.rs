// Schema type system.
//
// This module defines the compiled schema tree: type kinds, restriction
// values and the node shape produced by the compiler. A compiled tree is
// immutable, Arc-shared and safe for concurrent reads across any number of
// encode/decode/validate calls.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::codec::types::JsonType;

/// The seven type kinds a schema node may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Object,
    Array,
}

impl SchemaType {
    /// Parses one of the seven allowed type names. The `[]` primitive-array
    /// suffix must already be stripped by the caller.
    pub fn parse(name: &str) -> Option<SchemaType> {
        match name {
            "null" => Some(SchemaType::Null),
            "boolean" => Some(SchemaType::Boolean),
            "integer" => Some(SchemaType::Integer),
            "number" => Some(SchemaType::Number),
            "string" => Some(SchemaType::String),
            "object" => Some(SchemaType::Object),
            "array" => Some(SchemaType::Array),
            _ => None,
        }
    }

    /// Returns the schema-document spelling of the type.
    pub fn name(&self) -> &'static str {
        match self {
            SchemaType::Null => "null",
            SchemaType::Boolean => "boolean",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::String => "string",
            SchemaType::Object => "object",
            SchemaType::Array => "array",
        }
    }

    /// Returns true for non-container kinds.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, SchemaType::Object | SchemaType::Array)
    }

    /// Checks whether a classified data value satisfies this schema kind.
    /// An integer literal satisfies a `number` slot; every other mismatch
    /// fails.
    pub fn accepts(&self, inferred: JsonType) -> bool {
        match (self, inferred) {
            (SchemaType::Null, JsonType::Null) => true,
            (SchemaType::Boolean, JsonType::Boolean) => true,
            (SchemaType::Integer, JsonType::Integer) => true,
            (SchemaType::Number, JsonType::Integer) => true,
            (SchemaType::Number, JsonType::Decimal) => true,
            (SchemaType::String, JsonType::String) => true,
            (SchemaType::Object, JsonType::Object) => true,
            (SchemaType::Array, JsonType::Array) => true,
            // Absent optional values arrive as Null regardless of kind.
            (_, JsonType::Null) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A `pattern` restriction: the schema-document source plus the regex
/// compiled from it at schema-compile time.
#[derive(Debug, Clone)]
pub struct PatternRestriction {
    pub source: String,
    pub regex: Regex,
}

/// A named, schema-attached constraint checked against a literal value or an
/// item count. A tagged value: each kind carries its own payload.
#[derive(Debug, Clone)]
pub enum Restriction {
    Minimum(i64),
    Maximum(i64),
    ExclusiveMinimum(i64),
    ExclusiveMaximum(i64),
    MinLength(usize),
    MaxLength(usize),
    Pattern(PatternRestriction),
    MinItems(usize),
    MaxItems(usize),
}

impl Restriction {
    /// Returns the schema-document keyword of the restriction.
    pub fn keyword(&self) -> &'static str {
        match self {
            Restriction::Minimum(_) => "minimum",
            Restriction::Maximum(_) => "maximum",
            Restriction::ExclusiveMinimum(_) => "exclusiveMinimum",
            Restriction::ExclusiveMaximum(_) => "exclusiveMaximum",
            Restriction::MinLength(_) => "minLength",
            Restriction::MaxLength(_) => "maxLength",
            Restriction::Pattern(_) => "pattern",
            Restriction::MinItems(_) => "minItems",
            Restriction::MaxItems(_) => "maxItems",
        }
    }

    /// True for the item-count kinds, which apply to collections rather than
    /// to one literal.
    pub fn is_count(&self) -> bool {
        matches!(self, Restriction::MinItems(_) | Restriction::MaxItems(_))
    }
}

/// One compiled schema node.
///
/// The same tree shape as a data node, decorated with type, binding and
/// restriction metadata. References alias other nodes by shared ownership,
/// never by copy; a chain of references always terminates in a node carrying
/// a type (the compiler enforces this).
#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    /// JSON-side member name.
    pub name: String,
    /// Declared type kind; `None` for purely referencing nodes.
    pub kind: Option<SchemaType>,
    /// Destination member name. Overrides `mapping_class` for member lookup.
    pub mapping: Option<String>,
    /// Destination type name, used by the type registry when decoding.
    pub mapping_class: Option<String>,
    /// Set when the node's name appears in its parent's `required` list.
    pub required: bool,
    /// Set by the `type: "x[]"` marker: array elements are scalars stored as
    /// a flat collection.
    pub primitive_array: bool,
    /// Schema metadata, not used at runtime.
    pub description: Option<String>,
    /// Schema metadata, not used at runtime.
    pub default: Option<String>,
    /// Restrictions in declaration order.
    pub restrictions: Vec<Restriction>,
    /// Aliased schema node, resolved from `$ref` at compile time.
    pub reference: Option<Arc<SchemaNode>>,
    /// Compiled property children (objects) or the single `items` child
    /// (arrays).
    pub children: Vec<Arc<SchemaNode>>,
}

impl SchemaNode {
    /// Follows the reference chain until a node carrying a type. Compilation
    /// guarantees termination.
    pub fn resolve(&self) -> &SchemaNode {
        let mut node = self;
        while node.kind.is_none() {
            match &node.reference {
                Some(next) => node = next.as_ref(),
                None => break,
            }
        }
        node
    }

    /// Destination member name: `mapping`, then `mapping_class`, searched
    /// through the reference chain, then the node's own name.
    pub fn member_name(&self) -> &str {
        let mut node = self;
        loop {
            if let Some(member) = node.mapping.as_deref().or(node.mapping_class.as_deref()) {
                return member;
            }
            match &node.reference {
                Some(next) => node = next.as_ref(),
                None => return &self.name,
            }
        }
    }

    /// Destination type name for instantiation, searched through the
    /// reference chain.
    pub fn class_name(&self) -> Option<&str> {
        let mut node = self;
        loop {
            if let Some(class) = node.mapping_class.as_deref() {
                return Some(class);
            }
            match &node.reference {
                Some(next) => node = next.as_ref(),
                None => return None,
            }
        }
    }

    /// Property children of an object node, following the reference when the
    /// node has none of its own.
    pub fn properties(&self) -> &[Arc<SchemaNode>] {
        let mut node = self;
        while node.children.is_empty() {
            match &node.reference {
                Some(next) => node = next.as_ref(),
                None => break,
            }
        }
        &node.children
    }

    /// The `items` child of an array node, following the reference when
    /// needed.
    pub fn items(&self) -> Option<&Arc<SchemaNode>> {
        let mut node = self;
        loop {
            if let Some(items) = node.children.iter().find(|c| c.name == "items") {
                return Some(items);
            }
            match &node.reference {
                Some(next) => node = next.as_ref(),
                None => return None,
            }
        }
    }

    /// Finds a property child by JSON-side name.
    pub fn find_property(&self, name: &str) -> Option<&Arc<SchemaNode>> {
        self.properties().iter().find(|c| c.name == name)
    }

    /// Restrictions of this node and, for referencing nodes, of the resolved
    /// target. The node's own restrictions come first.
    pub fn all_restrictions(&self) -> Vec<&Restriction> {
        let mut out: Vec<&Restriction> = self.restrictions.iter().collect();
        let resolved = self.resolve();
        if !std::ptr::eq(self, resolved) {
            out.extend(resolved.restrictions.iter());
        }
        out
    }
}
