// Encode engine.
//
// Recursive walk over (schema node, source object). The schema tree decides
// the shape of the output; the member accessor supplies the values. Output
// is built pretty with a level-driven indent; compact output is the same
// text run through the scanner's whitespace strip afterwards.

use log::debug;

use crate::bind::access::{JsonObject, MemberRef};
use crate::bind::coerce;
use crate::bind::value::Value;
use crate::codec::scanner;
use crate::codec::CodecConfig;
use crate::internal::error::{Error, Result};
use crate::schema::restriction;
use crate::schema::types::{SchemaNode, SchemaType};

/// Encodes a source object graph into JSON text driven by the schema tree.
pub fn encode(schema: &SchemaNode, source: &dyn JsonObject, config: &CodecConfig) -> Result<String> {
    let root = schema.resolve();
    if !matches!(root.kind, Some(SchemaType::Object) | None) {
        return Err(Error::SchemaError(
            "Document root must resolve to an object schema to encode".to_string(),
        ));
    }

    let mut writer = Writer::new(config);
    write_object_body(schema, source, 0, &mut writer, config.max_depth)?;
    debug!("encoded '{}' into {} bytes", source.type_name(), writer.out.len());

    if config.compact {
        Ok(scanner::strip_whitespace(&writer.out))
    } else {
        Ok(writer.out)
    }
}

/// Output buffer plus the indentation scheme. Lives on the call, never on
/// the codec instance, so one compiled schema can serve concurrent calls.
struct Writer<'a> {
    out: String,
    line_break: &'a str,
    indent: &'a str,
}

impl<'a> Writer<'a> {
    fn new(config: &'a CodecConfig) -> Self {
        Self {
            out: String::new(),
            line_break: &config.line_break,
            indent: &config.indent,
        }
    }

    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn newline(&mut self, level: usize) {
        self.out.push_str(self.line_break);
        if !self.line_break.is_empty() {
            for _ in 0..level {
                self.out.push_str(self.indent);
            }
        }
    }

    /// Separators are written after every element and the trailing one is
    /// trimmed when the scope closes.
    fn trim_separator(&mut self) {
        if self.out.ends_with(',') {
            self.out.pop();
        }
    }
}

fn write_object_body(
    node: &SchemaNode,
    source: &dyn JsonObject,
    level: usize,
    writer: &mut Writer<'_>,
    max_depth: usize,
) -> Result<()> {
    if level > max_depth {
        return Err(Error::BindingError(format!(
            "Maximum nesting depth ({}) exceeded while encoding",
            max_depth
        )));
    }

    writer.push("{");
    let mark = writer.out.len();
    for child in node.properties() {
        let before = writer.out.len();
        writer.newline(level + 1);
        if write_property(child, source, level + 1, writer, max_depth)? {
            writer.push(",");
        } else {
            writer.out.truncate(before);
        }
    }
    if writer.out.len() == mark {
        writer.push("}");
    } else {
        writer.trim_separator();
        writer.newline(level);
        writer.push("}");
    }
    Ok(())
}

/// Writes one `"name": value` member. Returns false when the member is
/// skipped (optional and absent).
fn write_property(
    child: &SchemaNode,
    source: &dyn JsonObject,
    level: usize,
    writer: &mut Writer<'_>,
    max_depth: usize,
) -> Result<bool> {
    let resolved = child.resolve();
    if child.primitive_array || resolved.primitive_array {
        return write_primitive_array(child, source, writer);
    }
    match resolved.kind {
        Some(SchemaType::Array) => write_array(child, source, level, writer, max_depth),
        Some(SchemaType::Object) | None => write_nested_object(child, source, level, writer, max_depth),
        Some(_) => write_scalar(child, source, writer),
    }
}

fn write_scalar(child: &SchemaNode, source: &dyn JsonObject, writer: &mut Writer<'_>) -> Result<bool> {
    let member = child.member_name();
    let value = match source.get_member(member)? {
        MemberRef::Scalar(value) => value,
        MemberRef::Absent => Value::Null,
        _ => {
            return Err(Error::BindingError(format!(
                "Member '{}' is not a scalar",
                member
            )))
        }
    };

    if value.is_empty() {
        if child.required {
            return Err(Error::RequiredValue(format!(
                "Required member '{}' ('{}') is missing or empty",
                child.name, member
            )));
        }
        return Ok(false);
    }

    let literal = coerce::to_literal(&value)?;
    for restriction in child.all_restrictions() {
        if !restriction.is_count() {
            restriction::check_value(&child.name, restriction, &literal)?;
        }
    }
    writer.push(&format!("\"{}\": {}", child.name, literal));
    Ok(true)
}

fn write_nested_object(
    child: &SchemaNode,
    source: &dyn JsonObject,
    level: usize,
    writer: &mut Writer<'_>,
    max_depth: usize,
) -> Result<bool> {
    let member = child.member_name();
    match source.get_member(member)? {
        MemberRef::Object(nested) => {
            writer.push(&format!("\"{}\": ", child.name));
            write_object_body(child, nested, level, writer, max_depth)?;
            Ok(true)
        }
        MemberRef::Absent | MemberRef::Scalar(Value::Null) => {
            if child.required {
                return Err(Error::RequiredValue(format!(
                    "Required member '{}' ('{}') is missing",
                    child.name, member
                )));
            }
            // A null nested value is emitted as JSON null.
            writer.push(&format!("\"{}\": null", child.name));
            Ok(true)
        }
        _ => Err(Error::BindingError(format!(
            "Member '{}' is not an object",
            member
        ))),
    }
}

fn write_primitive_array(
    child: &SchemaNode,
    source: &dyn JsonObject,
    writer: &mut Writer<'_>,
) -> Result<bool> {
    let member = child.member_name();
    let values = match source.get_member(member)? {
        MemberRef::Scalar(Value::List(values)) => values,
        MemberRef::Absent | MemberRef::Scalar(Value::Null) => {
            if child.required {
                return Err(Error::RequiredValue(format!(
                    "Required member '{}' ('{}') is missing",
                    child.name, member
                )));
            }
            return Ok(false);
        }
        _ => {
            return Err(Error::BindingError(format!(
                "Member '{}' is not a scalar collection",
                member
            )))
        }
    };

    check_counts(child, values.len())?;
    let mut parts = Vec::with_capacity(values.len());
    for value in &values {
        let literal = coerce::to_literal(value)?;
        for restriction in child.all_restrictions() {
            if !restriction.is_count() {
                restriction::check_value(&child.name, restriction, &literal)?;
            }
        }
        parts.push(literal);
    }
    writer.push(&format!("\"{}\": [{}]", child.name, parts.join(",")));
    Ok(true)
}

fn write_array(
    child: &SchemaNode,
    source: &dyn JsonObject,
    level: usize,
    writer: &mut Writer<'_>,
    max_depth: usize,
) -> Result<bool> {
    let member = child.member_name();
    let items = child.items().ok_or_else(|| {
        Error::SchemaError(format!("Array schema '{}' has no items", child.name))
    })?;

    match source.get_member(member)? {
        MemberRef::Objects(elements) => {
            check_counts(child, elements.len())?;
            writer.push(&format!("\"{}\": ", child.name));
            if elements.is_empty() {
                writer.push("[]");
                return Ok(true);
            }
            writer.push("[");
            for element in elements {
                writer.newline(level + 1);
                write_object_body(items, element, level + 1, writer, max_depth)?;
                writer.push(",");
            }
            writer.trim_separator();
            writer.newline(level);
            writer.push("]");
            Ok(true)
        }
        MemberRef::Scalar(Value::List(values)) => {
            // Scalar elements without the primitive-array marker.
            check_counts(child, values.len())?;
            let mut parts = Vec::with_capacity(values.len());
            for value in &values {
                parts.push(coerce::to_literal(value)?);
            }
            writer.push(&format!("\"{}\": [{}]", child.name, parts.join(",")));
            Ok(true)
        }
        MemberRef::Absent | MemberRef::Scalar(Value::Null) => {
            if child.required {
                return Err(Error::RequiredValue(format!(
                    "Required member '{}' ('{}') is missing",
                    child.name, member
                )));
            }
            Ok(false)
        }
        _ => Err(Error::BindingError(format!(
            "Member '{}' is not a collection",
            member
        ))),
    }
}

fn check_counts(child: &SchemaNode, count: usize) -> Result<()> {
    for restriction in child.all_restrictions() {
        if restriction.is_count() {
            restriction::check_count(&child.name, restriction, count)?;
        }
    }
    Ok(())
}
