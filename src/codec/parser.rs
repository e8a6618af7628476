// Generic recursive-descent parser.
//
// Builds an unannotated data tree out of normalized JSON text. The same
// parser feeds both the schema compiler (schema documents) and the decode
// and validate engines (data documents). The tree is rebuilt on every call
// and discarded afterwards.

use log::trace;

use crate::codec::scanner;
use crate::codec::types::TreeNode;
use crate::internal::error::{Error, Result};

/// Parses raw JSON text into a data tree.
///
/// The text is whitespace-stripped and grammar-checked first; the top level
/// must open with `{` or `[`. Recursion depth is bounded by `max_depth`
/// rather than by the call stack.
pub fn parse(text: &str, max_depth: usize) -> Result<TreeNode> {
    let stripped = scanner::strip_whitespace(text);
    scanner::check_grammar(&stripped)?;

    match stripped.chars().next() {
        Some('{') | Some('[') => {}
        _ => {
            return Err(Error::MalformedJson(
                "Document must open with '{' or '['".to_string(),
            ))
        }
    }

    let root = parse_container("", &stripped, 0, max_depth)?;
    trace!("parsed document into {} top-level members", root.children.len());
    Ok(root)
}

/// Parses one object or array literal into a container node.
fn parse_container(name: &str, text: &str, level: usize, max_depth: usize) -> Result<TreeNode> {
    if level > max_depth {
        return Err(Error::MalformedJson(format!(
            "Maximum nesting depth ({}) exceeded",
            max_depth
        )));
    }

    let body = container_body(text)?;
    let mut node = TreeNode::container(name, level);
    if body.is_empty() {
        return Ok(node);
    }

    for segment in scanner::split_top_level(body)? {
        if segment.is_empty() {
            continue;
        }
        if segment.starts_with('{') || segment.starts_with('[') {
            // Bare object/array element: an anonymous container node.
            node.children.push(parse_container("", segment, level + 1, max_depth)?);
            continue;
        }
        match find_pair_colon(segment) {
            Some(colon) => {
                let member = member_name(&segment[..colon])?;
                let value = &segment[colon + 1..];
                node.children.push(parse_member(member, value, level + 1, max_depth)?);
            }
            None => {
                // Scalar array element.
                scanner::classify(segment)?;
                node.children.push(TreeNode::leaf("", level + 1, segment));
            }
        }
    }
    Ok(node)
}

/// Parses one `"name":value` pair into a child node.
fn parse_member(name: &str, value: &str, level: usize, max_depth: usize) -> Result<TreeNode> {
    if value.starts_with('{') {
        return parse_container(name, value, level, max_depth);
    }
    if value.starts_with('[') {
        return parse_array_member(name, value, level, max_depth);
    }
    scanner::classify(value)?;
    Ok(TreeNode::leaf(name, level, value))
}

/// Parses an array-valued member. Arrays of objects become containers with
/// anonymous children; flat arrays of scalars are kept as a leaf holding the
/// whole `[...]` literal, split later by whichever engine consumes it.
fn parse_array_member(name: &str, value: &str, level: usize, max_depth: usize) -> Result<TreeNode> {
    let body = container_body(value)?;
    if body.is_empty() {
        return Ok(TreeNode::leaf(name, level, "[]"));
    }

    let segments = scanner::split_top_level(body)?;
    let object_elements = segments
        .first()
        .map(|s| s.starts_with('{') || s.starts_with('['))
        .unwrap_or(false);

    if object_elements {
        let mut node = TreeNode::container(name, level);
        for segment in segments {
            node.children.push(parse_container("", segment, level + 1, max_depth)?);
        }
        Ok(node)
    } else {
        for segment in &segments {
            scanner::classify(segment)?;
        }
        Ok(TreeNode::leaf(name, level, value))
    }
}

/// Strips the outer brackets of a container literal.
fn container_body(text: &str) -> Result<&str> {
    let closer = match text.chars().next() {
        Some('{') => '}',
        Some('[') => ']',
        _ => {
            return Err(Error::MalformedJson(format!(
                "Expected container literal, got '{}'",
                bounded(text)
            )))
        }
    };
    if !text.ends_with(closer) || text.len() < 2 {
        return Err(Error::MalformedJson(format!(
            "Unterminated container literal '{}'",
            bounded(text)
        )));
    }
    Ok(&text[1..text.len() - 1])
}

/// Finds the first `:` outside quotes, the name/value split of a pair.
fn find_pair_colon(segment: &str) -> Option<usize> {
    let mut in_quotes = false;
    let mut prev: Option<char> = None;
    for (idx, c) in segment.char_indices() {
        if c == '"' && prev != Some('\\') {
            in_quotes = !in_quotes;
        } else if c == ':' && !in_quotes {
            return Some(idx);
        }
        prev = Some(c);
    }
    None
}

/// Unwraps a quoted member name.
fn member_name(raw: &str) -> Result<&str> {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        Ok(&raw[1..raw.len() - 1])
    } else {
        Err(Error::MalformedJson(format!(
            "Member name must be quoted, got '{}'",
            bounded(raw)
        )))
    }
}

/// Truncates arbitrary text for error messages.
fn bounded(text: &str) -> String {
    let chars: Vec<char> = text.chars().take(9).collect();
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTH: usize = 64;

    #[test]
    fn test_parse_flat_object() {
        let tree = parse("{\"name\": \"Alice\", \"age\": 30}", DEPTH).unwrap();
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].name, "name");
        assert_eq!(tree.children[0].value.as_deref(), Some("\"Alice\""));
        assert_eq!(tree.children[1].name, "age");
        assert_eq!(tree.children[1].value.as_deref(), Some("30"));
        assert_eq!(tree.children[1].level, 1);
    }

    #[test]
    fn test_parse_nested_object() {
        let tree = parse(
            "{\"person\": {\"name\": \"Bob\", \"address\": {\"city\": \"Oslo\"}}}",
            DEPTH,
        )
        .unwrap();
        let person = tree.find_child("person").unwrap();
        assert!(!person.is_leaf());
        let address = person.find_child("address").unwrap();
        assert_eq!(
            address.find_child("city").unwrap().value.as_deref(),
            Some("\"Oslo\"")
        );
        assert_eq!(address.level, 2);
    }

    #[test]
    fn test_parse_array_of_objects_is_anonymous_containers() {
        let tree = parse("{\"items\": [{\"id\": 1}, {\"id\": 2}]}", DEPTH).unwrap();
        let items = tree.find_child("items").unwrap();
        assert_eq!(items.children.len(), 2);
        assert_eq!(items.children[0].name, "");
        assert_eq!(
            items.children[1].find_child("id").unwrap().value.as_deref(),
            Some("2")
        );
    }

    #[test]
    fn test_parse_flat_scalar_array_kept_as_leaf() {
        let tree = parse("{\"tags\": [\"a\", \"b\", \"c\"]}", DEPTH).unwrap();
        let tags = tree.find_child("tags").unwrap();
        assert!(tags.is_leaf());
        assert_eq!(tags.value.as_deref(), Some("[\"a\",\"b\",\"c\"]"));
    }

    #[test]
    fn test_parse_empty_array_kept_as_leaf() {
        let tree = parse("{\"tags\": []}", DEPTH).unwrap();
        assert_eq!(tree.find_child("tags").unwrap().value.as_deref(), Some("[]"));
    }

    #[test]
    fn test_parse_top_level_array() {
        let tree = parse("[{\"id\": 1}, {\"id\": 2}]", DEPTH).unwrap();
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].name, "");
    }

    #[test]
    fn test_parse_rejects_scalar_document() {
        assert!(parse("\"just a string\"", DEPTH).is_err());
        assert!(parse("42", DEPTH).is_err());
    }

    #[test]
    fn test_parse_bounds_depth() {
        let mut doc = String::new();
        for _ in 0..20 {
            doc.push_str("{\"a\":");
        }
        doc.push('1');
        for _ in 0..20 {
            doc.push('}');
        }
        assert!(parse(&doc, 8).is_err());
        assert!(parse(&doc, 64).is_ok());
    }

    #[test]
    fn test_parse_value_with_escaped_quote() {
        let tree = parse("{\"say\": \"a \\\"b\\\" c\"}", DEPTH).unwrap();
        assert_eq!(
            tree.find_child("say").unwrap().value.as_deref(),
            Some("\"a \\\"b\\\" c\"")
        );
    }
}
