//! Typed extraction of loosely-typed tool arguments.
//!
//! Arguments arrive as a JSON object from the remote caller and values are
//! frequently sent with the "wrong" JSON type (numbers as strings, flags as
//! `"yes"`). Every provider goes through these helpers so defaults and
//! coercions behave the same everywhere.

use serde_json::Value;

use crate::Arguments;

/// Fallback upper bound used by [`clamp`] when `max` is not positive.
pub const DEFAULT_MAX: i64 = 200;

/// Non-empty string argument.
#[must_use]
pub fn get_string(args: &Arguments, key: &str) -> Option<String> {
    match args.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// String argument with a default.
#[must_use]
pub fn get_string_or(args: &Arguments, key: &str, default: &str) -> String {
    get_string(args, key).unwrap_or_else(|| default.to_string())
}

/// Integer argument with a default.
///
/// Accepts JSON integers, floats (truncated toward zero) and decimal
/// strings. Anything else yields `default`.
#[must_use]
pub fn get_int(args: &Arguments, key: &str, default: i64) -> i64 {
    match args.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(float_to_i64))
            .unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Boolean argument with a default.
///
/// Accepts JSON booleans and the strings `true/1/yes/y` and
/// `false/0/no/n` (case-insensitive).
#[must_use]
pub fn get_bool(args: &Arguments, key: &str, default: bool) -> bool {
    match args.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => true,
            "false" | "0" | "no" | "n" => false,
            _ => default,
        },
        _ => default,
    }
}

/// Clamp `value` into `[min, max]`; a non-positive `max` means [`DEFAULT_MAX`].
#[must_use]
pub fn clamp(value: i64, min: i64, max: i64) -> i64 {
    let max = if max <= 0 { DEFAULT_MAX } else { max };
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Clamp and convert to `usize` for use as a count.
#[must_use]
pub fn clamp_count(value: i64, min: i64, max: i64) -> usize {
    usize::try_from(clamp(value, min, max)).unwrap_or(0)
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_i64(f: f64) -> i64 {
    // Saturating cast; NaN maps to 0.
    f.trunc() as i64
}
