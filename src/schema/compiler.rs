// Schema compiler.
//
// Walks a schema-shaped data tree (produced by the generic parser) and
// compiles it into an immutable, Arc-shared schema tree. The compiler
// classifies each node's children into type/properties/items markers,
// enforces the marker exclusivity rules, resolves `$ref` against the
// definitions table and propagates `required` flags onto property children.
//
// Definitions compile on demand: a `$ref` to a definition that has not been
// compiled yet triggers its compilation, so forward references work and a
// reference cycle is reported as an error instead of recursing forever.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, trace};
use regex::Regex;

use crate::bind::coerce;
use crate::codec::parser;
use crate::codec::scanner;
use crate::codec::types::TreeNode;
use crate::internal::error::{Error, Result};
use crate::schema::types::{PatternRestriction, Restriction, SchemaNode, SchemaType};

/// Where a node sits in the schema document. Scalar schemas are only legal
/// under `definitions` or `properties`; `$id`/`$schema`/`definitions` only
/// at the document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Root,
    Definition,
    Property,
    Items,
}

/// Parses schema text and compiles it into a schema tree.
pub fn compile_text(text: &str, max_depth: usize) -> Result<Arc<SchemaNode>> {
    let tree = parser::parse(text, max_depth)?;
    compile(&tree)
}

/// Compiles an already parsed schema document.
pub fn compile(tree: &TreeNode) -> Result<Arc<SchemaNode>> {
    let mut compiler = Compiler::new(tree)?;
    compiler.compile_document(tree)
}

struct Compiler<'a> {
    raw: HashMap<String, &'a TreeNode>,
    order: Vec<String>,
    compiled: HashMap<String, Arc<SchemaNode>>,
    in_progress: HashSet<String>,
}

impl<'a> Compiler<'a> {
    /// Registers every raw `definitions` subtree before compiling anything,
    /// so references do not depend on declaration order.
    fn new(tree: &'a TreeNode) -> Result<Self> {
        let mut raw = HashMap::new();
        let mut order = Vec::new();
        if let Some(definitions) = tree.find_child("definitions") {
            for entry in &definitions.children {
                if entry.name.is_empty() {
                    return Err(Error::SchemaError(
                        "Definitions entries must be named".to_string(),
                    ));
                }
                if raw.insert(entry.name.clone(), entry).is_some() {
                    return Err(Error::SchemaError(format!(
                        "Duplicate definition '{}'",
                        entry.name
                    )));
                }
                order.push(entry.name.clone());
            }
        }
        Ok(Self {
            raw,
            order,
            compiled: HashMap::new(),
            in_progress: HashSet::new(),
        })
    }

    fn compile_document(&mut self, tree: &'a TreeNode) -> Result<Arc<SchemaNode>> {
        // Definitions compile eagerly in declaration order; on-demand
        // resolution fills in whatever a forward reference already pulled in.
        for name in self.order.clone() {
            if !self.compiled.contains_key(&name) {
                self.compile_definition(&name)?;
            }
        }
        let root = self.compile_node(tree, Placement::Root)?;
        debug!(
            "compiled schema: {} properties, {} definitions",
            root.children.len(),
            self.compiled.len()
        );
        Ok(Arc::new(root))
    }

    fn compile_definition(&mut self, name: &str) -> Result<Arc<SchemaNode>> {
        let tree = match self.raw.get(name) {
            Some(tree) => *tree,
            None => {
                return Err(Error::SchemaError(format!(
                    "Dangling $ref to unknown definition '{}'",
                    name
                )))
            }
        };
        self.in_progress.insert(name.to_string());
        let node = self.compile_node(tree, Placement::Definition)?;
        self.in_progress.remove(name);
        let arc = Arc::new(node);
        self.compiled.insert(name.to_string(), arc.clone());
        trace!("compiled definition '{}'", name);
        Ok(arc)
    }

    fn compile_node(&mut self, tree: &'a TreeNode, placement: Placement) -> Result<SchemaNode> {
        let mut node = SchemaNode {
            name: tree.name.clone(),
            ..Default::default()
        };
        let mut required_names: Vec<String> = Vec::new();
        let mut properties_tree: Option<&'a TreeNode> = None;
        let mut items_tree: Option<&'a TreeNode> = None;

        for child in &tree.children {
            match child.name.as_str() {
                "$id" | "$schema" => {
                    if placement != Placement::Root {
                        return Err(Error::SchemaError(format!(
                            "'{}' is only accepted at the document root",
                            child.name
                        )));
                    }
                }
                "definitions" => {
                    if placement != Placement::Root {
                        return Err(Error::SchemaError(
                            "'definitions' is only accepted at the document root".to_string(),
                        ));
                    }
                    // Already registered by Compiler::new.
                }
                "type" => {
                    let raw = string_keyword(child)?;
                    let type_name = match raw.strip_suffix("[]") {
                        Some(element) => {
                            node.primitive_array = true;
                            element
                        }
                        None => raw.as_str(),
                    };
                    node.kind = Some(SchemaType::parse(type_name).ok_or_else(|| {
                        Error::SchemaError(format!("Unknown type '{}'", raw))
                    })?);
                }
                "properties" => properties_tree = Some(child),
                "items" => items_tree = Some(child),
                "required" => required_names = parse_required(child)?,
                "$ref" => {
                    let target = string_keyword(child)?;
                    node.reference = Some(self.resolve_ref(&target)?);
                }
                "mapping" => node.mapping = Some(string_keyword(child)?),
                "mappingClass" => node.mapping_class = Some(string_keyword(child)?),
                "description" => node.description = Some(string_keyword(child)?),
                "default" => node.default = Some(child.literal().to_string()),
                "minimum" => node.restrictions.push(Restriction::Minimum(int_keyword(child)?)),
                "maximum" => node.restrictions.push(Restriction::Maximum(int_keyword(child)?)),
                "exclusiveMinimum" => node
                    .restrictions
                    .push(Restriction::ExclusiveMinimum(int_keyword(child)?)),
                "exclusiveMaximum" => node
                    .restrictions
                    .push(Restriction::ExclusiveMaximum(int_keyword(child)?)),
                "minLength" => node.restrictions.push(Restriction::MinLength(count_keyword(child)?)),
                "maxLength" => node.restrictions.push(Restriction::MaxLength(count_keyword(child)?)),
                "minItems" => node.restrictions.push(Restriction::MinItems(count_keyword(child)?)),
                "maxItems" => node.restrictions.push(Restriction::MaxItems(count_keyword(child)?)),
                "pattern" => {
                    let source = string_keyword(child)?;
                    let regex = Regex::new(&source).map_err(|e| {
                        Error::SchemaError(format!("Invalid pattern '{}': {}", source, e))
                    })?;
                    node.restrictions
                        .push(Restriction::Pattern(PatternRestriction { source, regex }));
                }
                other => {
                    trace!("ignoring unrecognized schema keyword '{}'", other);
                }
            }
        }

        let mut children: Vec<SchemaNode> = Vec::new();

        if let Some(props) = properties_tree {
            if let Some(target) = bare_reference(props) {
                // `properties` that is itself a single `$ref` aliases the
                // referenced object instead of hoisting children.
                node.reference = Some(self.resolve_ref(target)?);
            } else {
                for prop in &props.children {
                    if prop.name.is_empty() {
                        return Err(Error::SchemaError(
                            "Properties entries must be named".to_string(),
                        ));
                    }
                    children.push(self.compile_node(prop, Placement::Property)?);
                }
            }
        }

        if let Some(items) = items_tree {
            children.push(self.compile_node(items, Placement::Items)?);
        }

        // A node carrying properties or items without a declared type is an
        // object or array respectively.
        if node.kind.is_none() && !node.primitive_array {
            if properties_tree.is_some() && node.reference.is_none() {
                node.kind = Some(SchemaType::Object);
            } else if items_tree.is_some() {
                node.kind = Some(SchemaType::Array);
            }
        }

        self.enforce_markers(&node, placement, properties_tree.is_some(), items_tree.is_some())?;

        for name in &required_names {
            match children.iter_mut().find(|c| c.name == *name) {
                Some(child) => child.required = true,
                None => {
                    return Err(Error::SchemaError(format!(
                        "Required name '{}' does not match any property",
                        name
                    )))
                }
            }
        }

        node.children = children.into_iter().map(Arc::new).collect();
        Ok(node)
    }

    /// Marker exclusivity and completeness rules.
    fn enforce_markers(
        &self,
        node: &SchemaNode,
        placement: Placement,
        has_properties: bool,
        has_items: bool,
    ) -> Result<()> {
        match node.kind {
            Some(SchemaType::Array) if !node.primitive_array => {
                if has_properties {
                    return Err(Error::SchemaError(format!(
                        "Array schema '{}' cannot carry 'properties'",
                        node.name
                    )));
                }
                if !has_items && node.reference.is_none() {
                    return Err(Error::SchemaError(format!(
                        "Array schema '{}' must specify 'items'",
                        node.name
                    )));
                }
            }
            Some(SchemaType::Object) => {
                if has_items {
                    return Err(Error::SchemaError(format!(
                        "Object schema '{}' cannot carry 'items'",
                        node.name
                    )));
                }
                if node.children.is_empty() && !has_properties && node.reference.is_none() {
                    return Err(Error::SchemaError(format!(
                        "Object schema '{}' must specify 'properties'",
                        node.name
                    )));
                }
            }
            Some(_) => {
                if placement == Placement::Root && !node.primitive_array {
                    return Err(Error::SchemaError(
                        "Document root must be an object or array schema".to_string(),
                    ));
                }
            }
            None => {
                if node.mapping_class.is_none() && node.reference.is_none() {
                    return Err(Error::SchemaError(format!(
                        "Schema node '{}' has no type, no mappingClass and no reference",
                        node.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn resolve_ref(&mut self, target: &str) -> Result<Arc<SchemaNode>> {
        let name = target.strip_prefix("#/definitions/").ok_or_else(|| {
            Error::SchemaError(format!(
                "Unsupported $ref '{}': only '#/definitions/<name>' is supported",
                target
            ))
        })?;
        if let Some(done) = self.compiled.get(name) {
            return Ok(done.clone());
        }
        if self.in_progress.contains(name) {
            return Err(Error::SchemaError(format!(
                "Reference cycle involving definition '{}'",
                name
            )));
        }
        self.compile_definition(name)
    }
}

/// Returns the `$ref` target when a container holds nothing but one
/// `"$ref"` leaf.
fn bare_reference(tree: &TreeNode) -> Option<&str> {
    if tree.children.len() == 1 && tree.children[0].name == "$ref" {
        let literal = tree.children[0].literal();
        if literal.len() >= 2 && literal.starts_with('"') && literal.ends_with('"') {
            return Some(&literal[1..literal.len() - 1]);
        }
    }
    None
}

/// Unwraps and unescapes a string-valued schema keyword.
fn string_keyword(node: &TreeNode) -> Result<String> {
    let literal = node.literal();
    if literal.len() >= 2 && literal.starts_with('"') && literal.ends_with('"') {
        coerce::unescape(&literal[1..literal.len() - 1])
    } else {
        Err(Error::SchemaError(format!(
            "Schema keyword '{}' must be a string",
            node.name
        )))
    }
}

/// Parses an integer-valued restriction keyword.
fn int_keyword(node: &TreeNode) -> Result<i64> {
    node.literal().parse::<i64>().map_err(|_| {
        Error::SchemaError(format!(
            "Schema keyword '{}' must be an integer, got '{}'",
            node.name,
            node.literal()
        ))
    })
}

/// Parses a non-negative count keyword.
fn count_keyword(node: &TreeNode) -> Result<usize> {
    node.literal().parse::<usize>().map_err(|_| {
        Error::SchemaError(format!(
            "Schema keyword '{}' must be a non-negative integer, got '{}'",
            node.name,
            node.literal()
        ))
    })
}

/// Parses the `required` keyword: a flat array of property names.
fn parse_required(node: &TreeNode) -> Result<Vec<String>> {
    let literal = node.literal();
    if !literal.starts_with('[') || !literal.ends_with(']') {
        return Err(Error::SchemaError(
            "'required' must be an array of property names".to_string(),
        ));
    }
    let body = &literal[1..literal.len() - 1];
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for segment in scanner::split_top_level(body)? {
        if segment.len() >= 2 && segment.starts_with('"') && segment.ends_with('"') {
            names.push(coerce::unescape(&segment[1..segment.len() - 1])?);
        } else {
            return Err(Error::SchemaError(format!(
                "'required' entries must be strings, got '{}'",
                segment
            )));
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTH: usize = 64;

    #[test]
    fn test_compile_flat_object_schema() {
        let schema = compile_text(
            "{\"properties\": {\"name\": {\"type\": \"string\", \"mapping\": \"Name\"}, \
             \"age\": {\"type\": \"integer\", \"mapping\": \"Age\"}}}",
            DEPTH,
        )
        .unwrap();
        assert_eq!(schema.kind, Some(SchemaType::Object));
        assert_eq!(schema.children.len(), 2);
        let name = schema.find_property("name").unwrap();
        assert_eq!(name.kind, Some(SchemaType::String));
        assert_eq!(name.member_name(), "Name");
    }

    #[test]
    fn test_required_marks_children() {
        let schema = compile_text(
            "{\"required\": [\"name\"], \"properties\": {\"name\": {\"type\": \"string\"}, \
             \"age\": {\"type\": \"integer\"}}}",
            DEPTH,
        )
        .unwrap();
        assert!(schema.find_property("name").unwrap().required);
        assert!(!schema.find_property("age").unwrap().required);
    }

    #[test]
    fn test_required_with_unmatched_name_fails() {
        let result = compile_text(
            "{\"required\": [\"missing\"], \"properties\": {\"name\": {\"type\": \"string\"}}}",
            DEPTH,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_ref_resolves_to_shared_definition() {
        let schema = compile_text(
            "{\"definitions\": {\"addr\": {\"type\": \"object\", \"mappingClass\": \"Address\", \
             \"properties\": {\"city\": {\"type\": \"string\"}}}}, \
             \"properties\": {\"home\": {\"$ref\": \"#/definitions/addr\"}, \
             \"work\": {\"$ref\": \"#/definitions/addr\"}}}",
            DEPTH,
        )
        .unwrap();
        let home = schema.find_property("home").unwrap();
        let work = schema.find_property("work").unwrap();
        // Ownership is shared, not copied.
        assert!(Arc::ptr_eq(
            home.reference.as_ref().unwrap(),
            work.reference.as_ref().unwrap()
        ));
        assert_eq!(home.resolve().kind, Some(SchemaType::Object));
        assert_eq!(home.class_name(), Some("Address"));
    }

    #[test]
    fn test_forward_reference_is_supported() {
        // "first" refers to "second", declared later.
        let schema = compile_text(
            "{\"definitions\": {\"first\": {\"$ref\": \"#/definitions/second\"}, \
             \"second\": {\"type\": \"object\", \"mappingClass\": \"Leaf\", \
             \"properties\": {\"v\": {\"type\": \"integer\"}}}}, \
             \"properties\": {\"x\": {\"$ref\": \"#/definitions/first\"}}}",
            DEPTH,
        )
        .unwrap();
        let x = schema.find_property("x").unwrap();
        assert_eq!(x.resolve().kind, Some(SchemaType::Object));
    }

    #[test]
    fn test_reference_cycle_fails() {
        let result = compile_text(
            "{\"definitions\": {\"a\": {\"$ref\": \"#/definitions/b\"}, \
             \"b\": {\"$ref\": \"#/definitions/a\"}}, \
             \"properties\": {\"x\": {\"$ref\": \"#/definitions/a\"}}}",
            DEPTH,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_dangling_ref_fails() {
        let result = compile_text(
            "{\"properties\": {\"x\": {\"$ref\": \"#/definitions/nowhere\"}}}",
            DEPTH,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_array_requires_items() {
        assert!(compile_text("{\"properties\": {\"xs\": {\"type\": \"array\"}}}", DEPTH).is_err());
        let schema = compile_text(
            "{\"properties\": {\"xs\": {\"type\": \"array\", \"items\": {\"type\": \"string\"}}}}",
            DEPTH,
        )
        .unwrap();
        let xs = schema.find_property("xs").unwrap();
        assert_eq!(xs.items().unwrap().kind, Some(SchemaType::String));
    }

    #[test]
    fn test_object_and_items_conflict() {
        let result = compile_text(
            "{\"properties\": {\"o\": {\"type\": \"object\", \
             \"properties\": {\"a\": {\"type\": \"string\"}}, \
             \"items\": {\"type\": \"string\"}}}}",
            DEPTH,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_primitive_array_marker() {
        let schema = compile_text(
            "{\"properties\": {\"scores\": {\"type\": \"integer[]\", \"minItems\": 1}}}",
            DEPTH,
        )
        .unwrap();
        let scores = schema.find_property("scores").unwrap();
        assert!(scores.primitive_array);
        assert_eq!(scores.kind, Some(SchemaType::Integer));
    }

    #[test]
    fn test_unknown_type_name_fails() {
        assert!(compile_text("{\"properties\": {\"x\": {\"type\": \"float\"}}}", DEPTH).is_err());
    }

    #[test]
    fn test_id_and_schema_only_at_root() {
        assert!(compile_text(
            "{\"$id\": \"doc\", \"$schema\": \"draft\", \
             \"properties\": {\"x\": {\"type\": \"string\"}}}",
            DEPTH
        )
        .is_ok());
        assert!(compile_text(
            "{\"properties\": {\"x\": {\"$id\": \"nested\", \"type\": \"string\"}}}",
            DEPTH
        )
        .is_err());
    }

    #[test]
    fn test_node_without_type_mapping_or_reference_fails() {
        assert!(compile_text("{\"properties\": {\"x\": {\"description\": \"?\"}}}", DEPTH).is_err());
    }

    #[test]
    fn test_restrictions_compiled_in_order() {
        let schema = compile_text(
            "{\"properties\": {\"code\": {\"type\": \"string\", \"minLength\": 2, \
             \"maxLength\": 5, \"pattern\": \"^[A-Z]+$\"}}}",
            DEPTH,
        )
        .unwrap();
        let code = schema.find_property("code").unwrap();
        assert_eq!(code.restrictions.len(), 3);
        assert_eq!(code.restrictions[0].keyword(), "minLength");
        assert_eq!(code.restrictions[2].keyword(), "pattern");
    }

    #[test]
    fn test_invalid_pattern_fails_compilation() {
        assert!(compile_text(
            "{\"properties\": {\"x\": {\"type\": \"string\", \"pattern\": \"[\"}}}",
            DEPTH
        )
        .is_err());
    }

    #[test]
    fn test_properties_as_bare_ref_sets_root_reference() {
        let schema = compile_text(
            "{\"definitions\": {\"body\": {\"type\": \"object\", \"mappingClass\": \"Body\", \
             \"properties\": {\"v\": {\"type\": \"integer\"}}}}, \
             \"properties\": {\"$ref\": \"#/definitions/body\"}}",
            DEPTH,
        )
        .unwrap();
        assert!(schema.reference.is_some());
        assert_eq!(schema.resolve().kind, Some(SchemaType::Object));
    }

    #[test]
    fn test_scalar_document_root_fails() {
        assert!(compile_text("{\"type\": \"string\"}", DEPTH).is_err());
    }
}
