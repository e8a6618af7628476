// Validate engine.
//
// Same traversal shape as decode, but never constructs destination objects.
// Checks three things per node: the classifier's inferred type against the
// schema kind, `required` emptiness, and every attached restriction. Fails
// fast on the first violation; success means the whole tree was consumed.

use std::collections::HashSet;

use crate::codec::scanner;
use crate::codec::types::{JsonType, TreeNode};
use crate::internal::error::{Error, Result};
use crate::schema::restriction;
use crate::schema::types::{SchemaNode, SchemaType};

/// Validates a data tree against the schema tree.
pub fn validate(schema: &SchemaNode, data: &TreeNode) -> Result<()> {
    let root = schema.resolve();
    if root.primitive_array || root.kind == Some(SchemaType::Array) {
        validate_root_array(schema, root, data)
    } else {
        validate_object(schema, data)
    }
}

fn validate_object(node: &SchemaNode, data: &TreeNode) -> Result<()> {
    let mut matched: HashSet<&str> = HashSet::new();

    for child in node.properties() {
        let resolved = child.resolve();
        let data_child = data.find_child(&child.name);
        if data_child.is_some() {
            matched.insert(child.name.as_str());
        }

        if child.primitive_array || resolved.primitive_array {
            validate_primitive_array(child, resolved, data_child)?;
            continue;
        }
        match resolved.kind {
            Some(SchemaType::Array) => validate_array(child, data_child)?,
            Some(SchemaType::Object) | None => validate_nested_object(child, data_child)?,
            Some(kind) => validate_scalar(child, kind, data_child)?,
        }
    }

    // Success requires the whole tree to be consumed: a data member no
    // schema child matched fails validation.
    for data_child in &data.children {
        if !data_child.name.is_empty() && !matched.contains(data_child.name.as_str()) {
            return Err(Error::TypeMismatch(format!(
                "Unexpected member '{}' not defined in the schema",
                data_child.name
            )));
        }
    }
    Ok(())
}

fn validate_scalar(
    child: &SchemaNode,
    kind: SchemaType,
    data_child: Option<&TreeNode>,
) -> Result<()> {
    let literal = match data_child {
        Some(node) if node.is_leaf() => node.literal(),
        Some(_) => {
            return Err(Error::TypeMismatch(format!(
                "Member '{}' expected a scalar value, got a container",
                child.name
            )))
        }
        None => "",
    };

    let inferred = scanner::classify(literal)?;
    if !kind.accepts(inferred) {
        return Err(Error::TypeMismatch(format!(
            "Member '{}' expected {}, got {}",
            child.name,
            kind,
            inferred.name()
        )));
    }

    if inferred == JsonType::Null || literal == "\"\"" {
        if child.required {
            return Err(Error::RequiredValue(format!(
                "Required member '{}' is missing or empty",
                child.name
            )));
        }
        return Ok(());
    }

    for restriction in child.all_restrictions() {
        if !restriction.is_count() {
            restriction::check_value(&child.name, restriction, literal)?;
        }
    }
    Ok(())
}

fn validate_nested_object(child: &SchemaNode, data_child: Option<&TreeNode>) -> Result<()> {
    match data_child {
        Some(node) if !node.is_leaf() => validate_object(child, node),
        Some(node) => {
            if scanner::classify(node.literal())? != JsonType::Null {
                return Err(Error::TypeMismatch(format!(
                    "Member '{}' expected an object",
                    child.name
                )));
            }
            absent(child)
        }
        None => absent(child),
    }
}

fn validate_primitive_array(
    child: &SchemaNode,
    resolved: &SchemaNode,
    data_child: Option<&TreeNode>,
) -> Result<()> {
    let node = match data_child {
        Some(node) => node,
        None => return absent(child),
    };
    let element_kind = resolved.kind.unwrap_or(SchemaType::String);

    if node.is_leaf() {
        let literal = node.literal();
        if scanner::classify(literal)? == JsonType::Null {
            return absent(child);
        }
        validate_flat_elements(child, element_kind, literal)
    } else {
        // Anonymous leaf elements, as a root-level array parses.
        check_counts(child, node.children.len())?;
        for element in &node.children {
            validate_element(child, element_kind, element)?;
        }
        Ok(())
    }
}

fn validate_array(child: &SchemaNode, data_child: Option<&TreeNode>) -> Result<()> {
    let items = child.items().ok_or_else(|| {
        Error::SchemaError(format!("Array schema '{}' has no items", child.name))
    })?;
    let items_resolved = items.resolve();
    let scalar_items = items_resolved
        .kind
        .map(|k| k.is_scalar())
        .unwrap_or(false);

    let node = match data_child {
        Some(node) => node,
        None => return absent(child),
    };

    if node.is_leaf() {
        let literal = node.literal();
        if scanner::classify(literal)? == JsonType::Null {
            return absent(child);
        }
        if literal == "[]" {
            return check_counts(child, 0);
        }
        if scalar_items {
            let kind = items_resolved.kind.unwrap_or(SchemaType::String);
            return validate_flat_elements(child, kind, literal);
        }
        return Err(Error::TypeMismatch(format!(
            "Member '{}' expected an array of objects",
            child.name
        )));
    }

    check_counts(child, node.children.len())?;
    for element in &node.children {
        if scalar_items {
            let kind = items_resolved.kind.unwrap_or(SchemaType::String);
            validate_element(items, kind, element)?;
        } else {
            if element.is_leaf() {
                return Err(Error::TypeMismatch(format!(
                    "Member '{}' expected object elements",
                    child.name
                )));
            }
            validate_object(items, element)?;
        }
    }
    Ok(())
}

fn validate_root_array(schema: &SchemaNode, root: &SchemaNode, data: &TreeNode) -> Result<()> {
    if root.primitive_array {
        let element_kind = root.kind.unwrap_or(SchemaType::String);
        check_counts(schema, data.children.len())?;
        for element in &data.children {
            validate_element(schema, element_kind, element)?;
        }
        return Ok(());
    }

    let items = schema.items().ok_or_else(|| {
        Error::SchemaError("Root array schema has no items".to_string())
    })?;
    let items_resolved = items.resolve();
    let scalar_items = items_resolved
        .kind
        .map(|k| k.is_scalar())
        .unwrap_or(false);

    check_counts(schema, data.children.len())?;
    for element in &data.children {
        if scalar_items {
            let kind = items_resolved.kind.unwrap_or(SchemaType::String);
            validate_element(items, kind, element)?;
        } else {
            if element.is_leaf() {
                return Err(Error::TypeMismatch(
                    "Root array expected object elements".to_string(),
                ));
            }
            validate_object(items, element)?;
        }
    }
    Ok(())
}

/// Validates one leaf element of an array against the element kind and the
/// carrier node's scalar restrictions.
fn validate_element(carrier: &SchemaNode, kind: SchemaType, element: &TreeNode) -> Result<()> {
    if !element.is_leaf() {
        return Err(Error::TypeMismatch(format!(
            "Member '{}' expected scalar elements",
            carrier.name
        )));
    }
    let literal = element.literal();
    let inferred = scanner::classify(literal)?;
    if !kind.accepts(inferred) {
        return Err(Error::TypeMismatch(format!(
            "Member '{}' element expected {}, got {}",
            carrier.name,
            kind,
            inferred.name()
        )));
    }
    for restriction in carrier.all_restrictions() {
        if !restriction.is_count() {
            restriction::check_value(&carrier.name, restriction, literal)?;
        }
    }
    Ok(())
}

/// Splits and checks a flat `[...]` literal.
fn validate_flat_elements(child: &SchemaNode, kind: SchemaType, literal: &str) -> Result<()> {
    if !literal.starts_with('[') || !literal.ends_with(']') {
        return Err(Error::TypeMismatch(format!(
            "Member '{}' expected an array literal",
            child.name
        )));
    }
    let body = &literal[1..literal.len() - 1];
    let segments = if body.is_empty() {
        Vec::new()
    } else {
        scanner::split_top_level(body)?
    };

    check_counts(child, segments.len())?;
    for segment in segments {
        let inferred = scanner::classify(segment)?;
        if !kind.accepts(inferred) {
            return Err(Error::TypeMismatch(format!(
                "Member '{}' element expected {}, got {}",
                child.name,
                kind,
                inferred.name()
            )));
        }
        for restriction in child.all_restrictions() {
            if !restriction.is_count() {
                restriction::check_value(&child.name, restriction, segment)?;
            }
        }
    }
    Ok(())
}

fn absent(child: &SchemaNode) -> Result<()> {
    if child.required {
        return Err(Error::RequiredValue(format!(
            "Required member '{}' is missing",
            child.name
        )));
    }
    Ok(())
}

fn check_counts(child: &SchemaNode, count: usize) -> Result<()> {
    for restriction in child.all_restrictions() {
        if restriction.is_count() {
            restriction::check_count(&child.name, restriction, count)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parser;
    use crate::schema;

    const DEPTH: usize = 64;

    fn check(schema_text: &str, data_text: &str) -> Result<()> {
        let schema = schema::compile_text(schema_text, DEPTH).unwrap();
        let data = parser::parse(data_text, DEPTH).unwrap();
        validate(&schema, &data)
    }

    const PERSON: &str = "{\"required\": [\"name\"], \
         \"properties\": {\"name\": {\"type\": \"string\"}, \
         \"age\": {\"type\": \"number\"}}}";

    #[test]
    fn test_validate_accepts_conformant_document() {
        assert!(check(PERSON, "{\"name\": \"Alice\", \"age\": 30.5}").is_ok());
    }

    #[test]
    fn test_integer_literal_satisfies_number_slot() {
        assert!(check(PERSON, "{\"name\": \"Alice\", \"age\": 30}").is_ok());
    }

    #[test]
    fn test_missing_required_fails() {
        let err = check(PERSON, "{\"age\": 30}").unwrap_err();
        assert!(matches!(err, Error::RequiredValue(_)));
    }

    #[test]
    fn test_empty_string_fails_required() {
        let err = check(PERSON, "{\"name\": \"\", \"age\": 30}").unwrap_err();
        assert!(matches!(err, Error::RequiredValue(_)));
    }

    #[test]
    fn test_type_mismatch_fails() {
        let err = check(PERSON, "{\"name\": \"Alice\", \"age\": \"old\"}").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_decimal_literal_fails_integer_slot() {
        let err = check(
            "{\"properties\": {\"age\": {\"type\": \"integer\"}}}",
            "{\"age\": 1.5}",
        )
        .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_unknown_member_fails() {
        let err = check(PERSON, "{\"name\": \"Alice\", \"extra\": 1}").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_pattern_restriction() {
        let schema = "{\"properties\": {\"code\": {\"type\": \"string\", \"pattern\": \"^[A-Z]+$\"}}}";
        assert!(check(schema, "{\"code\": \"ABC\"}").is_ok());
        let err = check(schema, "{\"code\": \"abc\"}").unwrap_err();
        assert!(matches!(err, Error::Restriction(_)));
    }

    #[test]
    fn test_min_items_restriction() {
        let schema = "{\"properties\": {\"xs\": {\"type\": \"integer[]\", \"minItems\": 2}}}";
        assert!(check(schema, "{\"xs\": [1, 2]}").is_ok());
        let err = check(schema, "{\"xs\": [1]}").unwrap_err();
        assert!(matches!(err, Error::Restriction(_)));
    }

    #[test]
    fn test_range_restrictions() {
        let schema = "{\"properties\": {\"n\": {\"type\": \"integer\", \
             \"minimum\": 0, \"exclusiveMaximum\": 10}}}";
        assert!(check(schema, "{\"n\": 0}").is_ok());
        assert!(check(schema, "{\"n\": 9}").is_ok());
        assert!(check(schema, "{\"n\": -1}").is_err());
        assert!(check(schema, "{\"n\": 10}").is_err());
    }

    #[test]
    fn test_nested_object_and_array_of_objects() {
        let schema = "{\"definitions\": {\"item\": {\"type\": \"object\", \
             \"properties\": {\"v\": {\"type\": \"integer\"}}}}, \
             \"properties\": {\"items\": {\"type\": \"array\", \
             \"items\": {\"$ref\": \"#/definitions/item\"}}}}";
        assert!(check(schema, "{\"items\": [{\"v\": 1}, {\"v\": 2}]}").is_ok());
        assert!(check(schema, "{\"items\": [{\"v\": \"x\"}]}").is_err());
    }

    #[test]
    fn test_validate_root_array_of_objects() {
        let schema = "{\"type\": \"array\", \"items\": {\"type\": \"object\", \
             \"properties\": {\"v\": {\"type\": \"integer\"}}}}";
        assert!(check(schema, "[{\"v\": 1}, {\"v\": 2}]").is_ok());
        assert!(check(schema, "[{\"v\": \"x\"}]").is_err());
    }

    #[test]
    fn test_optional_null_members_pass() {
        assert!(check(PERSON, "{\"name\": \"Alice\", \"age\": null}").is_ok());
    }
}
