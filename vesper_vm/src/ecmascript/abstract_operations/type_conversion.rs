// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type Conversion abstract operations: ToBoolean, ToNumber, ToString,
//! ToPrimitive, ToPropertyKey.

use super::operations_on_objects::{call_function, get_value};
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::object::PropertyKey;
use crate::ecmascript::types::string::StringHeapData;
use crate::ecmascript::types::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    Number,
    String,
}

/// ToBoolean: falsy values are undefined, null, false, ±0, NaN, and the
/// empty string.
pub fn to_boolean(agent: &Agent, value: Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Boolean(b) => b,
        Value::Integer(i) => i != 0,
        Value::Float(f) => !(f == 0.0 || f.is_nan()),
        Value::String(s) => !agent.heap[s].is_empty(),
        _ => true,
    }
}

/// ToNumber. Coercion does not fail for strings (NaN instead); symbols are
/// a TypeError.
pub fn to_number(agent: &mut Agent, value: Value) -> JsResult<f64> {
    match value {
        Value::Undefined => Ok(f64::NAN),
        Value::Null => Ok(0.0),
        Value::Boolean(b) => Ok(if b { 1.0 } else { 0.0 }),
        Value::Integer(i) => Ok(f64::from(i)),
        Value::Float(f) => Ok(f),
        Value::String(s) => {
            let text = agent.heap[s].to_string_lossy();
            Ok(string_to_number(&text))
        }
        Value::Symbol(_) => {
            Err(agent.throw_exception(ExceptionType::TypeError, "Cannot convert a Symbol to a number"))
        }
        _ => {
            let primitive = to_primitive(agent, value, PreferredType::Number)?;
            to_number(agent, primitive)
        }
    }
}

/// StringToNumber: numeric literal syntax with optional radix prefixes;
/// anything else is NaN.
pub fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim_matches(|ch: char| ch.is_whitespace() || ch == '\u{FEFF}');
    if trimmed.is_empty() {
        return 0.0;
    }

    let (sign, body) = match trimmed.as_bytes()[0] {
        b'+' => (1.0, &trimmed[1..]),
        b'-' => (-1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    if body == "Infinity" {
        return sign * f64::INFINITY;
    }

    // Radix-prefixed integers do not take a sign.
    if sign == 1.0 && body == trimmed {
        let radix = match body.get(..2) {
            Some("0x" | "0X") => Some(16),
            Some("0o" | "0O") => Some(8),
            Some("0b" | "0B") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            let digits = &body[2..];
            if digits.is_empty() {
                return f64::NAN;
            }
            let mut value = 0.0f64;
            for ch in digits.chars() {
                match ch.to_digit(radix) {
                    Some(digit) => value = value * f64::from(radix) + f64::from(digit),
                    None => return f64::NAN,
                }
            }
            return value;
        }
    }

    // Validate the decimal-literal shape before handing to the float parser,
    // which is more permissive than the language grammar.
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(index) => (&body[..index], Some(&body[index + 1..])),
        None => (body, None),
    };
    let mut digits_seen = false;
    let mut dot_seen = false;
    for ch in mantissa.chars() {
        match ch {
            '0'..='9' => digits_seen = true,
            '.' if !dot_seen => dot_seen = true,
            _ => return f64::NAN,
        }
    }
    if !digits_seen {
        return f64::NAN;
    }
    if let Some(exponent) = exponent {
        let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return f64::NAN;
        }
    }
    match fast_float::parse::<f64, _>(body) {
        Ok(value) => sign * value,
        Err(_) => f64::NAN,
    }
}

/// Number-to-string with the shortest round-trip representation.
pub fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let mut buffer = ryu_js::Buffer::new();
    buffer.format(value).to_string()
}

/// ToString returning a heap string value.
pub fn to_string_value(agent: &mut Agent, value: Value) -> JsResult<Value> {
    match value {
        Value::String(_) => Ok(value),
        Value::Undefined => Ok(agent.create_string("undefined")),
        Value::Null => Ok(agent.create_string("null")),
        Value::Boolean(b) => Ok(agent.create_string(if b { "true" } else { "false" })),
        Value::Integer(i) => {
            let text = i.to_string();
            Ok(agent.create_string(&text))
        }
        Value::Float(f) => {
            let text = number_to_string(f);
            Ok(agent.create_string(&text))
        }
        Value::Symbol(_) => {
            Err(agent.throw_exception(ExceptionType::TypeError, "Cannot convert a Symbol to a string"))
        }
        _ => {
            let primitive = to_primitive(agent, value, PreferredType::String)?;
            to_string_value(agent, primitive)
        }
    }
}

/// ToString returning a Rust string (lossy for ill-formed heap strings).
pub fn to_string_lossy(agent: &mut Agent, value: Value) -> JsResult<String> {
    let string = to_string_value(agent, value)?;
    let Value::String(s) = string else {
        unreachable!()
    };
    Ok(agent.heap[s].to_string_lossy())
}

/// ToPrimitive for objects: tries `valueOf` then `toString` for the number
/// hint, the reverse for the string hint.
pub fn to_primitive(agent: &mut Agent, value: Value, preferred: PreferredType) -> JsResult<Value> {
    if !value.is_object() {
        return Ok(value);
    }
    let methods: [&str; 2] = match preferred {
        PreferredType::Number => ["valueOf", "toString"],
        PreferredType::String => ["toString", "valueOf"],
    };
    for name in methods {
        let method = get_value(agent, value, &PropertyKey::from_str(name))?;
        if let Some(function) = method.into_function() {
            let result = call_function(agent, function, value, &[])?;
            if !result.is_object() {
                return Ok(result);
            }
        }
    }
    Err(agent.throw_exception(ExceptionType::TypeError, "Cannot convert object to primitive value"))
}

/// ToPropertyKey; canonical numeric strings become integer keys.
pub fn to_property_key(agent: &mut Agent, value: Value) -> JsResult<PropertyKey> {
    match value {
        Value::Integer(i) if i >= 0 => Ok(PropertyKey::Integer(i as u32)),
        Value::Symbol(symbol) => Ok(PropertyKey::Symbol(symbol)),
        Value::String(s) => {
            let text = agent.heap[s].to_string_lossy();
            Ok(PropertyKey::from_str(&text))
        }
        _ => {
            let text = to_string_lossy(agent, value)?;
            Ok(PropertyKey::from_str(&text))
        }
    }
}

/// ToIntegerOrInfinity.
pub fn to_integer_or_infinity(agent: &mut Agent, value: Value) -> JsResult<f64> {
    let number = to_number(agent, value)?;
    if number.is_nan() {
        return Ok(0.0);
    }
    if number.is_infinite() {
        return Ok(number);
    }
    Ok(number.trunc())
}

/// Non-throwing, non-calling rendition for host-side display (REPL echo,
/// diagnostics).
pub fn to_display_string(agent: &Agent, value: Value) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => number_to_string(f),
        Value::String(s) => agent.heap[s].to_string_lossy(),
        Value::Symbol(symbol) => format!("Symbol({})", symbol.description()),
        Value::Array(array) => {
            let data = &agent.heap[array];
            let parts: Vec<String> = data
                .elements
                .iter()
                .map(|element| to_display_string(agent, *element))
                .collect();
            format!("[ {} ]", parts.join(", "))
        }
        Value::Error(error) => {
            let data = &agent.heap[error];
            format!("{}: {}", data.kind.as_str(), data.message)
        }
        Value::Promise(_) => "[object Promise]".to_string(),
        Value::Generator(_) => "[object Generator]".to_string(),
        Value::BuiltinFunction(f) => {
            format!("function {}() {{ [native code] }}", agent.heap[f].name)
        }
        Value::ScriptFunction(f) => {
            format!("function {}() {{ … }}", agent.heap[f].template.name)
        }
        Value::ResolvingFunction(_)
        | Value::FinallyFunction(_)
        | Value::CollectorFunction(_) => "function () { [native code] }".to_string(),
        Value::Object(_) | Value::ArrayIterator(_) => "[object Object]".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn string_to_number_literals() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  42  "), 42.0);
        assert_eq!(string_to_number("-1.5e2"), -150.0);
        assert_eq!(string_to_number(".5"), 0.5);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number("0b101"), 5.0);
        assert_eq!(string_to_number("Infinity"), f64::INFINITY);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("1e").is_nan());
        assert!(string_to_number("--1").is_nan());
    }

    #[test]
    fn number_to_string_shortest() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1), "0.1");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
    }
}
