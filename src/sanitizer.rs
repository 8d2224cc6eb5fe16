// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Request field checks and output sanitization for `POST /security`.

use crate::error::GuardError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};
use tracing::debug;

/// Fields every security request must carry.
pub const REQUIRED_FIELDS: [&str; 3] = ["userId", "input", "category"];

// `[^\r\n\x{2028}\x{2029}]` is any character short of a line terminator.
static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)<script[^\r\n\x{2028}\x{2029}]*?>[^\r\n\x{2028}\x{2029}]*?</script>",
    )
    .expect("script pattern is valid")
});

/// Remove `<script>` blocks from `text`.
///
/// Matching is case-insensitive and does not span line terminators
/// (`\n`, `\r`, U+2028, U+2029).
pub fn sanitize(text: &str) -> String {
    SCRIPT_BLOCK.replace_all(text, "").into_owned()
}

/// Check the required fields, then sanitize `input`.
pub fn process(body: &Value) -> Result<String, GuardError> {
    check_required_fields(body)?;
    Ok(sanitize(&input_text(&body["input"])))
}

/// A field counts as present when it holds a truthy value.
pub fn check_required_fields(body: &Value) -> Result<(), GuardError> {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !body.get(*field).is_some_and(is_truthy))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        debug!(?missing, "Missing required fields");
        Err(GuardError::MissingFields)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Text form of `input`, following JavaScript's `String(value)`.
///
/// Arrays join their elements with `,` (nulls become empty) and objects
/// become `[object Object]`.
fn input_text(input: &Value) -> String {
    match input {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => input_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// Integral floats print without a fraction (`1.0` -> `1`).
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f == 0.0 => "0".to_string(),
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        _ => n.to_string(),
    }
}
