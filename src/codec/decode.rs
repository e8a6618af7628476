// Decode engine.
//
// Mirrors the encode walk but is driven by the paired data tree: schema
// children are walked in order and matched by name against data children.
// Object nodes instantiate their destination through the type registry;
// scalar values pass through the coercion layer; restrictions and required
// flags are enforced fail-fast in tree order.

use log::debug;

use crate::bind::access::{JsonObject, MemberValue};
use crate::bind::coerce;
use crate::bind::registry::TypeRegistry;
use crate::bind::value::Value;
use crate::codec::scanner;
use crate::codec::types::{JsonType, TreeNode};
use crate::internal::error::{Error, Result};
use crate::schema::restriction;
use crate::schema::types::{SchemaNode, SchemaType};

/// Decodes a data tree into a freshly constructed object graph.
pub fn decode(
    schema: &SchemaNode,
    data: &TreeNode,
    registry: &TypeRegistry,
) -> Result<Box<dyn JsonObject>> {
    let class = schema.class_name().ok_or_else(|| {
        Error::BindingError("Root schema has no mappingClass to instantiate".to_string())
    })?;
    let mut instance = registry.instantiate(class)?;
    populate_object(schema, data, instance.as_mut(), registry)?;
    debug!("decoded document into '{}'", instance.type_name());
    Ok(instance)
}

/// Decodes a data tree into a caller-provided root object, for schemas
/// whose root carries no `mappingClass`.
pub fn decode_into(
    schema: &SchemaNode,
    data: &TreeNode,
    registry: &TypeRegistry,
    target: &mut dyn JsonObject,
) -> Result<()> {
    populate_object(schema, data, target, registry)
}

/// Populates one destination object from one data container, schema child
/// by schema child.
fn populate_object(
    node: &SchemaNode,
    data: &TreeNode,
    target: &mut dyn JsonObject,
    registry: &TypeRegistry,
) -> Result<()> {
    for child in node.properties() {
        let resolved = child.resolve();
        let data_child = data.find_child(&child.name);

        if child.primitive_array || resolved.primitive_array {
            decode_primitive_array(child, resolved, data_child, target)?;
            continue;
        }
        match resolved.kind {
            Some(SchemaType::Array) => decode_array(child, data_child, target, registry)?,
            Some(SchemaType::Object) | None => decode_object(child, data_child, target, registry)?,
            Some(kind) => decode_scalar(child, kind, data_child, target)?,
        }
    }
    Ok(())
}

fn decode_scalar(
    child: &SchemaNode,
    kind: SchemaType,
    data_child: Option<&TreeNode>,
    target: &mut dyn JsonObject,
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

    let value = coerce::from_literal(literal, kind)?;
    if value.is_empty() {
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
    target.set_member(child.member_name(), MemberValue::Scalar(value))
}

fn decode_object(
    child: &SchemaNode,
    data_child: Option<&TreeNode>,
    target: &mut dyn JsonObject,
    registry: &TypeRegistry,
) -> Result<()> {
    match data_child {
        Some(node) if !node.is_leaf() => {
            let class = child.class_name().ok_or_else(|| {
                Error::BindingError(format!(
                    "Object member '{}' has no mappingClass",
                    child.name
                ))
            })?;
            let mut inner = registry.instantiate(class)?;
            populate_object(child, node, inner.as_mut(), registry)?;
            target.set_member(child.member_name(), MemberValue::Object(inner))
        }
        Some(node) => {
            // A scalar in an object slot is only acceptable as null.
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

fn decode_primitive_array(
    child: &SchemaNode,
    resolved: &SchemaNode,
    data_child: Option<&TreeNode>,
    target: &mut dyn JsonObject,
) -> Result<()> {
    let node = match data_child {
        Some(node) => node,
        None => return absent(child),
    };
    if !node.is_leaf() {
        return Err(Error::TypeMismatch(format!(
            "Member '{}' expected a flat scalar array",
            child.name
        )));
    }
    let literal = node.literal();
    if scanner::classify(literal)? == JsonType::Null {
        return absent(child);
    }

    let element_kind = resolved.kind.unwrap_or(SchemaType::String);
    let values = decode_flat_elements(child, element_kind, literal)?;
    target.set_member(child.member_name(), MemberValue::Scalar(Value::List(values)))
}

fn decode_array(
    child: &SchemaNode,
    data_child: Option<&TreeNode>,
    target: &mut dyn JsonObject,
    registry: &TypeRegistry,
) -> Result<()> {
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
            check_counts(child, 0)?;
            return if scalar_items {
                target.set_member(child.member_name(), MemberValue::Scalar(Value::List(Vec::new())))
            } else {
                target.set_member(child.member_name(), MemberValue::Objects(Vec::new()))
            };
        }
        if scalar_items {
            let kind = items_resolved.kind.unwrap_or(SchemaType::String);
            let values = decode_flat_elements(child, kind, literal)?;
            return target.set_member(child.member_name(), MemberValue::Scalar(Value::List(values)));
        }
        return Err(Error::TypeMismatch(format!(
            "Member '{}' expected an array of objects",
            child.name
        )));
    }

    check_counts(child, node.children.len())?;
    if scalar_items {
        let kind = items_resolved.kind.unwrap_or(SchemaType::String);
        let mut values = Vec::with_capacity(node.children.len());
        for element in &node.children {
            if !element.is_leaf() {
                return Err(Error::TypeMismatch(format!(
                    "Member '{}' expected scalar elements",
                    child.name
                )));
            }
            values.push(coerce::from_literal(element.literal(), kind)?);
        }
        return target.set_member(child.member_name(), MemberValue::Scalar(Value::List(values)));
    }

    let class = items.class_name().ok_or_else(|| {
        Error::BindingError(format!(
            "Array member '{}' items have no mappingClass",
            child.name
        ))
    })?;
    // Elements accumulate into a temporary ordered collection and are
    // written through the accessor in one piece.
    let mut elements: Vec<Box<dyn JsonObject>> = Vec::with_capacity(node.children.len());
    for element in &node.children {
        let mut inner = registry.instantiate(class)?;
        populate_object(items, element, inner.as_mut(), registry)?;
        elements.push(inner);
    }
    target.set_member(child.member_name(), MemberValue::Objects(elements))
}

/// Splits a flat `[...]` literal on top-level commas and coerces each
/// element, applying count restrictions first and scalar restrictions per
/// element.
fn decode_flat_elements(
    child: &SchemaNode,
    element_kind: SchemaType,
    literal: &str,
) -> Result<Vec<Value>> {
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
    let mut values = Vec::with_capacity(segments.len());
    for segment in segments {
        let inferred = scanner::classify(segment)?;
        if !element_kind.accepts(inferred) {
            return Err(Error::TypeMismatch(format!(
                "Member '{}' element expected {}, got {}",
                child.name,
                element_kind,
                inferred.name()
            )));
        }
        for restriction in child.all_restrictions() {
            if !restriction.is_count() {
                restriction::check_value(&child.name, restriction, segment)?;
            }
        }
        values.push(coerce::from_literal(segment, element_kind)?);
    }
    Ok(values)
}

/// An absent member stays unset unless the schema marks it required.
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
    use crate::bind::access::MemberRef;
    use crate::bind::dynamic::DynamicObject;
    use crate::codec::parser;
    use crate::schema;

    const DEPTH: usize = 64;

    fn codec_parts(schema_text: &str) -> (std::sync::Arc<SchemaNode>, TypeRegistry) {
        let schema = schema::compile_text(schema_text, DEPTH).unwrap();
        let mut registry = TypeRegistry::new();
        registry.register::<DynamicObject>("Person");
        registry.register::<DynamicObject>("Address");
        registry.register::<DynamicObject>("Item");
        (schema, registry)
    }

    #[test]
    fn test_decode_flat_object_into_target() {
        let (schema, registry) = codec_parts(
            "{\"properties\": {\"name\": {\"type\": \"string\", \"mapping\": \"Name\"}, \
             \"age\": {\"type\": \"integer\", \"mapping\": \"Age\"}}}",
        );
        let data = parser::parse("{\"name\": \"Alice\",\"age\": 30}", DEPTH).unwrap();
        let mut person = DynamicObject::new();
        decode_into(&schema, &data, &registry, &mut person).unwrap();
        assert_eq!(person.scalar("Name"), Some(&Value::Str("Alice".to_string())));
        assert_eq!(person.scalar("Age"), Some(&Value::Int(30)));
    }

    #[test]
    fn test_decode_instantiates_root_by_mapping_class() {
        let (schema, registry) = codec_parts(
            "{\"mappingClass\": \"Person\", \"type\": \"object\", \
             \"properties\": {\"name\": {\"type\": \"string\", \"mapping\": \"Name\"}}}",
        );
        let data = parser::parse("{\"name\": \"Bob\"}", DEPTH).unwrap();
        let person = decode(&schema, &data, &registry).unwrap();
        let person = person.downcast_ref::<DynamicObject>().unwrap();
        assert_eq!(person.scalar("Name"), Some(&Value::Str("Bob".to_string())));
    }

    #[test]
    fn test_decode_missing_required_fails() {
        let (schema, registry) = codec_parts(
            "{\"required\": [\"name\"], \"properties\": {\"name\": {\"type\": \"string\", \
             \"mapping\": \"Name\"}, \"age\": {\"type\": \"integer\", \"mapping\": \"Age\"}}}",
        );
        let data = parser::parse("{\"age\": 30}", DEPTH).unwrap();
        let mut person = DynamicObject::new();
        let err = decode_into(&schema, &data, &registry, &mut person).unwrap_err();
        assert!(matches!(err, Error::RequiredValue(_)));
    }

    #[test]
    fn test_decode_optional_missing_member_stays_unset() {
        let (schema, registry) = codec_parts(
            "{\"properties\": {\"name\": {\"type\": \"string\", \"mapping\": \"Name\"}, \
             \"age\": {\"type\": \"integer\", \"mapping\": \"Age\"}}}",
        );
        let data = parser::parse("{\"age\": 30}", DEPTH).unwrap();
        let mut person = DynamicObject::new();
        decode_into(&schema, &data, &registry, &mut person).unwrap();
        assert_eq!(person.scalar("Name"), None);
    }

    #[test]
    fn test_decode_type_mismatch_fails() {
        let (schema, registry) = codec_parts(
            "{\"properties\": {\"age\": {\"type\": \"integer\", \"mapping\": \"Age\"}}}",
        );
        let data = parser::parse("{\"age\": \"thirty\"}", DEPTH).unwrap();
        let mut person = DynamicObject::new();
        let err = decode_into(&schema, &data, &registry, &mut person).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_decode_nested_object_via_ref() {
        let (schema, registry) = codec_parts(
            "{\"definitions\": {\"addr\": {\"type\": \"object\", \"mappingClass\": \"Address\", \
             \"properties\": {\"city\": {\"type\": \"string\", \"mapping\": \"City\"}}}}, \
             \"properties\": {\"home\": {\"$ref\": \"#/definitions/addr\", \"mapping\": \"Home\"}, \
             \"work\": {\"$ref\": \"#/definitions/addr\", \"mapping\": \"Work\"}}}",
        );
        let data = parser::parse(
            "{\"home\": {\"city\": \"Oslo\"}, \"work\": {\"city\": \"Bergen\"}}",
            DEPTH,
        )
        .unwrap();
        let mut person = DynamicObject::new();
        decode_into(&schema, &data, &registry, &mut person).unwrap();

        for (member, city) in [("Home", "Oslo"), ("Work", "Bergen")] {
            match person.get_member(member).unwrap() {
                MemberRef::Object(addr) => {
                    let addr = addr.downcast_ref::<DynamicObject>().unwrap();
                    assert_eq!(addr.scalar("City"), Some(&Value::Str(city.to_string())));
                }
                _ => panic!("expected object member '{}'", member),
            }
        }
    }

    #[test]
    fn test_decode_primitive_array() {
        let (schema, registry) = codec_parts(
            "{\"properties\": {\"scores\": {\"type\": \"integer[]\", \"mapping\": \"Scores\"}}}",
        );
        let data = parser::parse("{\"scores\": [1, 2, 3]}", DEPTH).unwrap();
        let mut person = DynamicObject::new();
        decode_into(&schema, &data, &registry, &mut person).unwrap();
        assert_eq!(
            person.scalar("Scores"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
    }

    #[test]
    fn test_decode_min_items_violation() {
        let (schema, registry) = codec_parts(
            "{\"properties\": {\"scores\": {\"type\": \"integer[]\", \"mapping\": \"Scores\", \
             \"minItems\": 2}}}",
        );
        let data = parser::parse("{\"scores\": [1]}", DEPTH).unwrap();
        let mut person = DynamicObject::new();
        let err = decode_into(&schema, &data, &registry, &mut person).unwrap_err();
        assert!(matches!(err, Error::Restriction(_)));
    }

    #[test]
    fn test_decode_array_of_objects() {
        let (schema, registry) = codec_parts(
            "{\"definitions\": {\"item\": {\"type\": \"object\", \"mappingClass\": \"Item\", \
             \"properties\": {\"v\": {\"type\": \"integer\", \"mapping\": \"V\"}}}}, \
             \"properties\": {\"items\": {\"type\": \"array\", \"mapping\": \"Items\", \
             \"items\": {\"$ref\": \"#/definitions/item\"}}}}",
        );
        let data = parser::parse("{\"items\": [{\"v\": 1}, {\"v\": 2}]}", DEPTH).unwrap();
        let mut holder = DynamicObject::new();
        decode_into(&schema, &data, &registry, &mut holder).unwrap();
        match holder.get_member("Items").unwrap() {
            MemberRef::Objects(items) => {
                assert_eq!(items.len(), 2);
                let second = items[1].downcast_ref::<DynamicObject>().unwrap();
                assert_eq!(second.scalar("V"), Some(&Value::Int(2)));
            }
            _ => panic!("expected an object collection"),
        }
    }

    #[test]
    fn test_decode_unregistered_class_fails() {
        let schema = schema::compile_text(
            "{\"properties\": {\"home\": {\"type\": \"object\", \"mapping\": \"Home\", \
             \"mappingClass\": \"Unknown\", \
             \"properties\": {\"city\": {\"type\": \"string\"}}}}}",
            DEPTH,
        )
        .unwrap();
        let registry = TypeRegistry::new();
        let data = parser::parse("{\"home\": {\"city\": \"X\"}}", DEPTH).unwrap();
        let mut holder = DynamicObject::new();
        let err = decode_into(&schema, &data, &registry, &mut holder).unwrap_err();
        assert!(matches!(err, Error::BindingError(_)));
    }

    #[test]
    fn test_decode_null_object_member_stays_unset() {
        let (schema, registry) = codec_parts(
            "{\"properties\": {\"home\": {\"type\": \"object\", \"mapping\": \"Home\", \
             \"mappingClass\": \"Address\", \
             \"properties\": {\"city\": {\"type\": \"string\"}}}}}",
        );
        let data = parser::parse("{\"home\": null}", DEPTH).unwrap();
        let mut holder = DynamicObject::new();
        decode_into(&schema, &data, &registry, &mut holder).unwrap();
        assert!(matches!(holder.get_member("Home").unwrap(), MemberRef::Absent));
    }
}
