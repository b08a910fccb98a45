//! Casting of raw metric strings into typed report values.
//!
//! The Data API returns every metric as a string together with a type tag on
//! its header. Tags may arrive in their short form (`INTEGER`) or with the
//! wire prefix (`TYPE_INTEGER`); both are accepted.

use crate::error::TypeCastError;
use crate::report::ReportValue;

/// Casts `value` according to the metric `type_tag`.
///
/// # Errors
/// Returns `TypeCastError` when a numeric tag is paired with a string that is
/// not a number. Unknown tags never fail; the raw string is returned.
pub fn cast_value(value: &str, type_tag: &str) -> Result<ReportValue, TypeCastError> {
    let tag = type_tag.strip_prefix("TYPE_").unwrap_or(type_tag);

    match tag {
        "INTEGER" => value
            .trim()
            .parse::<i64>()
            .map(ReportValue::Integer)
            .map_err(|_| cast_error(value, type_tag)),
        "FLOAT" | "PERCENT" | "TIME" | "CURRENCY" | "SECONDS" | "MILLISECONDS" | "MINUTES"
        | "HOURS" | "STANDARD" => parse_float(value, type_tag),
        "METRIC_CURRENCY" => {
            let digits: String = value
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            parse_float(&digits, type_tag).map_err(|_| cast_error(value, type_tag))
        }
        _ => Ok(ReportValue::Text(value.to_string())),
    }
}

fn parse_float(value: &str, type_tag: &str) -> Result<ReportValue, TypeCastError> {
    value
        .trim()
        .parse::<f64>()
        .map(ReportValue::Float)
        .map_err(|_| cast_error(value, type_tag))
}

fn cast_error(value: &str, type_tag: &str) -> TypeCastError {
    TypeCastError {
        value: value.to_string(),
        type_tag: type_tag.to_string(),
    }
}
