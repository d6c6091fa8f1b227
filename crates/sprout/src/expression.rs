//! Path expression evaluation
//!
//! Expressions are dotted paths, optionally wrapped in one pair of braces:
//! `{user.address.city}`, `items.0.name`, `{_}`. There are no operators,
//! literals or calls. A path that cannot be followed resolves to `None`
//! rather than an error, so templates render best-effort against partial
//! data.

use serde_json::Value;

use crate::environment::{Environment, CURRENT};

/// Opening interpolation delimiter
pub const OPEN: char = '{';

/// Closing interpolation delimiter
pub const CLOSE: char = '}';

/// Remove one surrounding pair of delimiters (and surrounding whitespace).
pub fn strip_delimiters(expr: &str) -> &str {
    let trimmed = expr.trim();
    match interpolation(trimmed) {
        Some(inner) => inner,
        None => trimmed,
    }
}

/// Return the inner expression when the trimmed text is exactly one
/// delimited expression.
///
/// Only a whole-content match counts: `"Hello {name}"` is literal text.
pub fn interpolation(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.len() >= 2 && trimmed.starts_with(OPEN) && trimmed.ends_with(CLOSE) {
        Some(trimmed[1..trimmed.len() - 1].trim())
    } else {
        None
    }
}

/// Evaluate an expression against an environment.
///
/// The empty expression and `_` both resolve to the current value. Any
/// other expression is walked segment by segment; the first segment is
/// resolved through [`Environment::resolve`].
pub fn evaluate<'e>(expr: &str, env: &'e Environment) -> Option<&'e Value> {
    let path = strip_delimiters(expr);
    if path.is_empty() || path == CURRENT {
        return env.current();
    }

    let mut segments = path.split('.');
    let first = segments.next()?;
    let root = if first == CURRENT {
        env.current()
    } else {
        env.resolve(first)
    };
    segments.try_fold(root?, |acc, segment| member(acc, segment))
}

/// Look up one path segment on a value.
pub fn member<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Evaluate an expression that may produce a computed value.
///
/// Extends [`evaluate`] with the `length` pseudo-field on arrays and
/// strings, which has no stored value to borrow.
pub fn evaluate_owned(expr: &str, env: &Environment) -> Option<Value> {
    if let Some(found) = evaluate(expr, env) {
        return Some(found.clone());
    }

    let path = strip_delimiters(expr);
    let (base, last) = path.rsplit_once('.')?;
    if last != "length" {
        return None;
    }
    match evaluate(base, env)? {
        Value::Array(items) => Some(Value::from(items.len())),
        Value::String(s) => Some(Value::from(s.chars().count())),
        _ => None,
    }
}
