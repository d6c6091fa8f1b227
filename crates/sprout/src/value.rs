//! Conversions from payload values to what the output tree needs:
//! truthiness for conditionals, text for interpolation, and snapshots for
//! loop change detection.

use serde_json::{Number, Value};

/// Whether a value counts as true in a conditional directive.
///
/// Absent, `null`, `false`, `0` and `""` are false. Arrays and objects are
/// true even when empty.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Textual form of a value for text nodes and attributes.
///
/// Absent and `null` become the empty string.
pub fn to_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => number_text(n),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| to_text(Some(item)))
            .collect::<Vec<_>>()
            .join(","),
        Some(object @ Value::Object(_)) => object.to_string(),
    }
}

/// Format a number without a trailing `.0` for integral floats.
pub fn number_text(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 1e21 {
                return format!("{}", f as i128);
            }
        }
    }
    n.to_string()
}

/// Structural snapshot of a loop item, compared to decide whether its
/// subtree must be rebuilt.
pub fn snapshot(value: &Value) -> String {
    value.to_string()
}
