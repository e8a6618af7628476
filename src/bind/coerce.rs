// Type coercion layer.
//
// Bidirectional scalar <-> JSON literal text conversion. Numeric formatting
// is locale-independent and uses fixed fractional-digit counts so encoded
// text round-trips byte for byte. Date/time values travel as ISO-8601 UTC
// strings; a time-only value is anchored to the epoch date before
// formatting and parsed back by discarding the anchored date.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};

use crate::bind::value::Value;
use crate::internal::error::{Error, Result};
use crate::schema::types::SchemaType;

/// Fractional digits emitted for single-precision values.
pub const SINGLE_FRACTION_DIGITS: usize = 9;
/// Fractional digits emitted for double-precision values.
pub const DOUBLE_FRACTION_DIGITS: usize = 17;
/// Fractional digits emitted for extended/decimal-precision values.
pub const DECIMAL_FRACTION_DIGITS: usize = 29;

/// Date a time-only value is anchored to for ISO-8601 formatting.
pub fn time_anchor() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

/// Converts a scalar value into its JSON literal text.
pub fn to_literal(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(v) => Ok(if *v { "true" } else { "false" }.to_string()),
        Value::Int(v) => Ok(v.to_string()),
        Value::UInt(v) => Ok(v.to_string()),
        Value::Single(v) => Ok(format!("{:.*}", SINGLE_FRACTION_DIGITS, v)),
        Value::Double(v) => Ok(format!("{:.*}", DOUBLE_FRACTION_DIGITS, v)),
        Value::Decimal(v) => Ok(format!("{:.*}", DECIMAL_FRACTION_DIGITS, v)),
        Value::Str(v) => Ok(format!("\"{}\"", escape(v))),
        Value::DateTime(v) => Ok(format!("\"{}\"", format_datetime(v))),
        Value::Time(v) => Ok(format!("\"{}\"", format_time(v))),
        Value::List(_) | Value::Map(_) => Err(Error::ConversionError(format!(
            "Cannot convert {} value to a scalar literal",
            value.kind_name()
        ))),
    }
}

/// Converts a JSON literal into a value of the given schema kind.
pub fn from_literal(literal: &str, kind: SchemaType) -> Result<Value> {
    if literal.is_empty() || literal.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    match kind {
        SchemaType::Null => Ok(Value::Null),
        SchemaType::Boolean => {
            if literal.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if literal.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(Error::ConversionError(format!(
                    "Cannot convert '{}' to boolean",
                    literal
                )))
            }
        }
        SchemaType::Integer => {
            if let Ok(v) = literal.parse::<i64>() {
                Ok(Value::Int(v))
            } else if let Ok(v) = literal.parse::<u64>() {
                Ok(Value::UInt(v))
            } else {
                Err(Error::ConversionError(format!(
                    "Cannot convert '{}' to integer",
                    literal
                )))
            }
        }
        SchemaType::Number => literal
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| Error::ConversionError(format!("Cannot convert '{}' to number", literal))),
        SchemaType::String => {
            if literal.len() >= 2 && literal.starts_with('"') && literal.ends_with('"') {
                Ok(Value::Str(unescape(&literal[1..literal.len() - 1])?))
            } else {
                Err(Error::ConversionError(format!(
                    "Cannot convert '{}' to string",
                    literal
                )))
            }
        }
        SchemaType::Object | SchemaType::Array => Err(Error::ConversionError(format!(
            "Cannot convert a literal to {} kind",
            kind
        ))),
    }
}

/// Formats a date/time value as an ISO-8601 UTC string. Sub-second digits
/// are emitted in the shortest lossless group, so round trips never drop
/// precision.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses an ISO-8601 string into a UTC date/time.
pub fn parse_datetime(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::ConversionError(format!("Invalid ISO-8601 value '{}': {}", text, e)))
}

/// Formats a time-only value by anchoring it to the fixed epoch date.
pub fn format_time(value: &NaiveTime) -> String {
    let anchored = NaiveDateTime::new(time_anchor(), *value);
    format_datetime(&DateTime::<Utc>::from_naive_utc_and_offset(anchored, Utc))
}

/// Parses a time-only value, discarding the anchored date. Bare
/// `HH:MM:SS` text is accepted as well.
pub fn parse_time(text: &str) -> Result<NaiveTime> {
    if let Ok(dt) = parse_datetime(text) {
        return Ok(dt.time());
    }
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .map_err(|e| Error::ConversionError(format!("Invalid time value '{}': {}", text, e)))
}

/// Escapes text for embedding in a JSON string literal.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Reverses JSON string escaping.
pub fn unescape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                if code.len() != 4 {
                    return Err(Error::ConversionError(format!(
                        "Truncated unicode escape in '{}'",
                        text
                    )));
                }
                let point = u32::from_str_radix(&code, 16).map_err(|_| {
                    Error::ConversionError(format!("Invalid unicode escape '\\u{}'", code))
                })?;
                match char::from_u32(point) {
                    Some(c) => out.push(c),
                    None => {
                        return Err(Error::ConversionError(format!(
                            "Invalid unicode code point '\\u{}'",
                            code
                        )))
                    }
                }
            }
            Some(other) => {
                return Err(Error::ConversionError(format!(
                    "Unknown escape sequence '\\{}'",
                    other
                )))
            }
            None => {
                return Err(Error::ConversionError(format!(
                    "Dangling escape at end of '{}'",
                    text
                )))
            }
        }
    }
    Ok(out)
}
