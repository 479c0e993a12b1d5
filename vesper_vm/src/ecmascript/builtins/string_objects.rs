// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::abstract_operations::type_conversion::{
    to_integer_or_infinity, to_string_value,
};
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::string::StringHeapData;
use crate::ecmascript::types::value::Value;
use crate::heap::HeapString;

fn require_string(agent: &mut Agent, this: Value, method: &str) -> JsResult<HeapString> {
    match this {
        Value::String(string) => Ok(string),
        _ => Err(agent.throw_exception(
            ExceptionType::TypeError,
            format!("String.prototype.{method} called on a non-string"),
        )),
    }
}

/// `charAt` is bounds-checked: out of range yields the empty string.
pub(crate) fn string_proto_char_at(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let string = require_string(agent, this, "charAt")?;
    let index = to_integer_or_infinity(agent, args.first().copied().unwrap_or(Value::Undefined))?;
    let unit = if index < 0.0 {
        StringHeapData::from_units(Vec::new())
    } else {
        agent.heap[string].char_at(index as usize)
    };
    Ok(agent.create_string_value(unit))
}

pub(crate) fn string_proto_at(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let string = require_string(agent, this, "at")?;
    let relative = to_integer_or_infinity(agent, args.first().copied().unwrap_or(Value::Undefined))?;
    let length = agent.heap[string].len() as f64;
    let index = if relative < 0.0 { length + relative } else { relative };
    if index < 0.0 || index >= length {
        return Ok(Value::Undefined);
    }
    let unit = agent.heap[string].char_at(index as usize);
    Ok(agent.create_string_value(unit))
}

pub(crate) fn string_proto_char_code_at(
    agent: &mut Agent,
    this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let string = require_string(agent, this, "charCodeAt")?;
    let index = to_integer_or_infinity(agent, args.first().copied().unwrap_or(Value::Undefined))?;
    if index < 0.0 {
        return Ok(Value::Float(f64::NAN));
    }
    match agent.heap[string].code_unit_at(index as usize) {
        Some(unit) => Ok(Value::Integer(i32::from(unit))),
        None => Ok(Value::Float(f64::NAN)),
    }
}

pub(crate) fn string_proto_index_of(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let string = require_string(agent, this, "indexOf")?;
    let needle = to_string_value(agent, args.first().copied().unwrap_or(Value::Undefined))?;
    let Value::String(needle) = needle else {
        unreachable!()
    };
    let needle = agent.heap[needle].clone();
    match agent.heap[string].find(&needle) {
        Some(index) => Ok(Value::Integer(index as i32)),
        None => Ok(Value::Integer(-1)),
    }
}

pub(crate) fn string_proto_includes(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let result = string_proto_index_of(agent, this, args)?;
    Ok(Value::Boolean(result != Value::Integer(-1)))
}

pub(crate) fn string_proto_slice(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let string = require_string(agent, this, "slice")?;
    let length = agent.heap[string].len() as f64;
    let clamp = |relative: f64| -> usize {
        let index = if relative < 0.0 {
            (length + relative).max(0.0)
        } else {
            relative.min(length)
        };
        index as usize
    };
    let start = match args.first() {
        None | Some(Value::Undefined) => 0,
        Some(value) => clamp(to_integer_or_infinity(agent, *value)?),
    };
    let end = match args.get(1) {
        None | Some(Value::Undefined) => length as usize,
        Some(value) => clamp(to_integer_or_infinity(agent, *value)?),
    };
    let sliced = agent.heap[string].slice(start, end);
    Ok(agent.create_string_value(sliced))
}

/// All surrogates paired?
pub(crate) fn string_proto_is_well_formed(
    agent: &mut Agent,
    this: Value,
    _args: &[Value],
) -> JsResult<Value> {
    let string = require_string(agent, this, "isWellFormed")?;
    Ok(Value::Boolean(agent.heap[string].is_well_formed()))
}

/// Replace unpaired surrogates with U+FFFD, returning a new string.
pub(crate) fn string_proto_to_well_formed(
    agent: &mut Agent,
    this: Value,
    _args: &[Value],
) -> JsResult<Value> {
    let string = require_string(agent, this, "toWellFormed")?;
    let fixed = agent.heap[string].to_well_formed();
    Ok(agent.create_string_value(fixed))
}
