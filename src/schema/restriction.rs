// Restriction checker.
//
// Evaluates one named restriction against one literal value or one item
// count. Every rejection names the member, the offending value and the
// violated bound.

use crate::internal::error::{Error, Result};
use crate::schema::types::Restriction;

/// Checks a scalar restriction against the raw literal of one value.
/// Item-count restrictions are ignored here; the engines check those with
/// [`check_count`] against the collection length.
pub fn check_value(member: &str, restriction: &Restriction, literal: &str) -> Result<()> {
    match restriction {
        Restriction::Minimum(min) => {
            let value = numeric(member, literal)?;
            if value < *min as f64 {
                return Err(Error::Restriction(format!(
                    "Field '{}' value {} is less than minimum {}",
                    member, literal, min
                )));
            }
        }
        Restriction::Maximum(max) => {
            let value = numeric(member, literal)?;
            if value > *max as f64 {
                return Err(Error::Restriction(format!(
                    "Field '{}' value {} is greater than maximum {}",
                    member, literal, max
                )));
            }
        }
        Restriction::ExclusiveMinimum(min) => {
            let value = numeric(member, literal)?;
            if value <= *min as f64 {
                return Err(Error::Restriction(format!(
                    "Field '{}' value {} is not greater than exclusive minimum {}",
                    member, literal, min
                )));
            }
        }
        Restriction::ExclusiveMaximum(max) => {
            let value = numeric(member, literal)?;
            if value >= *max as f64 {
                return Err(Error::Restriction(format!(
                    "Field '{}' value {} is not less than exclusive maximum {}",
                    member, literal, max
                )));
            }
        }
        Restriction::MinLength(min) => {
            let text = unquoted(literal);
            let length = text.chars().count();
            if length < *min {
                return Err(Error::Restriction(format!(
                    "Field '{}' length {} is less than minLength {}",
                    member, length, min
                )));
            }
        }
        Restriction::MaxLength(max) => {
            let text = unquoted(literal);
            let length = text.chars().count();
            if length > *max {
                return Err(Error::Restriction(format!(
                    "Field '{}' length {} is greater than maxLength {}",
                    member, length, max
                )));
            }
        }
        Restriction::Pattern(pattern) => {
            let text = unquoted(literal);
            if !pattern.regex.is_match(text) {
                return Err(Error::Restriction(format!(
                    "Field '{}' value '{}' does not match pattern '{}'",
                    member, text, pattern.source
                )));
            }
        }
        Restriction::MinItems(_) | Restriction::MaxItems(_) => {}
    }
    Ok(())
}

/// Checks an item-count restriction against a collection length.
/// Scalar restrictions are ignored here.
pub fn check_count(member: &str, restriction: &Restriction, count: usize) -> Result<()> {
    match restriction {
        Restriction::MinItems(min) => {
            if count < *min {
                return Err(Error::Restriction(format!(
                    "Field '{}' has {} items, less than minItems {}",
                    member, count, min
                )));
            }
        }
        Restriction::MaxItems(max) => {
            if count > *max {
                return Err(Error::Restriction(format!(
                    "Field '{}' has {} items, greater than maxItems {}",
                    member, count, max
                )));
            }
        }
        _ => {}
    }
    Ok(())
}

fn numeric(member: &str, literal: &str) -> Result<f64> {
    literal.parse::<f64>().map_err(|_| {
        Error::Restriction(format!(
            "Field '{}' value '{}' is not numeric",
            member, literal
        ))
    })
}

/// Strips the surrounding quotes of a string literal; other literals pass
/// through untouched.
fn unquoted(literal: &str) -> &str {
    if literal.len() >= 2 && literal.starts_with('"') && literal.ends_with('"') {
        &literal[1..literal.len() - 1]
    } else {
        literal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::PatternRestriction;
    use regex::Regex;

    fn pattern(source: &str) -> Restriction {
        Restriction::Pattern(PatternRestriction {
            source: source.to_string(),
            regex: Regex::new(source).unwrap(),
        })
    }

    #[test]
    fn test_minimum_maximum() {
        assert!(check_value("age", &Restriction::Minimum(18), "30").is_ok());
        assert!(check_value("age", &Restriction::Minimum(18), "12").is_err());
        assert!(check_value("age", &Restriction::Maximum(99), "30").is_ok());
        assert!(check_value("age", &Restriction::Maximum(99), "120").is_err());
    }

    #[test]
    fn test_exclusive_bounds_reject_equality() {
        assert!(check_value("n", &Restriction::ExclusiveMinimum(10), "10").is_err());
        assert!(check_value("n", &Restriction::ExclusiveMinimum(10), "11").is_ok());
        assert!(check_value("n", &Restriction::ExclusiveMaximum(10), "10").is_err());
        assert!(check_value("n", &Restriction::ExclusiveMaximum(10), "9.5").is_ok());
    }

    #[test]
    fn test_length_bounds_on_unquoted_text() {
        assert!(check_value("code", &Restriction::MinLength(3), "\"abc\"").is_ok());
        assert!(check_value("code", &Restriction::MinLength(4), "\"abc\"").is_err());
        assert!(check_value("code", &Restriction::MaxLength(3), "\"abc\"").is_ok());
        assert!(check_value("code", &Restriction::MaxLength(2), "\"abc\"").is_err());
    }

    #[test]
    fn test_pattern() {
        let upper = pattern("^[A-Z]+$");
        assert!(check_value("code", &upper, "\"ABC\"").is_ok());
        assert!(check_value("code", &upper, "\"abc\"").is_err());
    }

    #[test]
    fn test_item_counts() {
        assert!(check_count("tags", &Restriction::MinItems(2), 2).is_ok());
        assert!(check_count("tags", &Restriction::MinItems(2), 1).is_err());
        assert!(check_count("tags", &Restriction::MaxItems(2), 3).is_err());
    }

    #[test]
    fn test_non_numeric_value_rejected_by_range() {
        assert!(check_value("age", &Restriction::Minimum(1), "\"abc\"").is_err());
    }

    #[test]
    fn test_error_message_names_value_and_bound() {
        let err = check_value("age", &Restriction::Minimum(18), "12").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("12") && message.contains("18"));
    }
}
