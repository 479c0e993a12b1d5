// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod data;

use super::array_iterator::create_array_iterator;
use crate::ecmascript::abstract_operations::operations_on_objects::call_value;
use crate::ecmascript::abstract_operations::testing_and_comparison::is_strictly_equal;
use crate::ecmascript::abstract_operations::type_conversion::{
    to_integer_or_infinity, to_number, to_string_lossy,
};
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::value::Value;
use crate::heap::{Array, CreateHeapData};
use data::ArrayHeapData;

pub fn create_array(agent: &mut Agent, elements: Vec<Value>) -> Value {
    Value::Array(agent.heap.create(ArrayHeapData::from_elements(elements)))
}

fn require_array(agent: &mut Agent, this: Value, method: &str) -> JsResult<Array> {
    match this {
        Value::Array(array) => Ok(array),
        _ => Err(agent.throw_exception(
            ExceptionType::TypeError,
            format!("Array.prototype.{method} called on a non-array"),
        )),
    }
}

/// Relative index per `at`/`slice` semantics: negative counts from the end.
fn relative_index(index: f64, length: usize) -> Option<usize> {
    let length = length as f64;
    let index = if index < 0.0 { length + index } else { index };
    if index < 0.0 || index >= length {
        None
    } else {
        Some(index as usize)
    }
}

fn clamp_range(index: f64, length: usize) -> usize {
    let length = length as f64;
    let index = if index < 0.0 {
        (length + index).max(0.0)
    } else {
        index.min(length)
    };
    index as usize
}

pub(crate) fn array_constructor(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    // A single numeric argument is a length; anything else is an element
    // list.
    if args.len() == 1 && args[0].is_number() {
        let length = to_number(agent, args[0])?;
        if length < 0.0 || length.trunc() != length || length > f64::from(u32::MAX) {
            return Err(agent.throw_exception(ExceptionType::RangeError, "Invalid array length"));
        }
        return Ok(create_array(agent, vec![Value::Undefined; length as usize]));
    }
    Ok(create_array(agent, args.to_vec()))
}

pub(crate) fn array_is_array(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let _ = agent;
    Ok(Value::Boolean(matches!(args.first(), Some(Value::Array(_)))))
}

pub(crate) fn array_proto_push(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "push")?;
    let elements = &mut agent.heap[array].elements;
    elements.extend_from_slice(args);
    Ok(Value::from_f64(elements.len() as f64))
}

pub(crate) fn array_proto_pop(agent: &mut Agent, this: Value, _args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "pop")?;
    Ok(agent.heap[array].elements.pop().unwrap_or(Value::Undefined))
}

pub(crate) fn array_proto_at(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "at")?;
    let index = to_integer_or_infinity(agent, args.first().copied().unwrap_or(Value::Undefined))?;
    let elements = &agent.heap[array].elements;
    Ok(relative_index(index, elements.len())
        .map(|i| elements[i])
        .unwrap_or(Value::Undefined))
}

pub(crate) fn array_proto_index_of(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "indexOf")?;
    let needle = args.first().copied().unwrap_or(Value::Undefined);
    let length = agent.heap[array].elements.len();
    for index in 0..length {
        let element = agent.heap[array].elements[index];
        if is_strictly_equal(agent, element, needle) {
            return Ok(Value::Integer(index as i32));
        }
    }
    Ok(Value::Integer(-1))
}

pub(crate) fn array_proto_includes(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "includes")?;
    let needle = args.first().copied().unwrap_or(Value::Undefined);
    let needle_is_nan = matches!(needle, Value::Float(f) if f.is_nan());
    let length = agent.heap[array].elements.len();
    for index in 0..length {
        let element = agent.heap[array].elements[index];
        // SameValueZero: NaN is found, ±0 are equal.
        let found = is_strictly_equal(agent, element, needle)
            || (needle_is_nan && matches!(element, Value::Float(f) if f.is_nan()));
        if found {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

fn join_with(agent: &mut Agent, array: Array, separator: &str) -> JsResult<String> {
    let length = agent.heap[array].elements.len();
    let mut parts = Vec::with_capacity(length);
    for index in 0..length {
        let element = agent.heap[array].elements[index];
        if element.is_undefined() || element.is_null() {
            parts.push(String::new());
        } else {
            parts.push(to_string_lossy(agent, element)?);
        }
    }
    Ok(parts.join(separator))
}

pub(crate) fn array_proto_join(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "join")?;
    let separator = match args.first() {
        None | Some(Value::Undefined) => ",".to_string(),
        Some(value) => to_string_lossy(agent, *value)?,
    };
    let joined = join_with(agent, array, &separator)?;
    Ok(agent.create_string(&joined))
}

pub(crate) fn array_proto_to_string(agent: &mut Agent, this: Value, _args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "toString")?;
    let joined = join_with(agent, array, ",")?;
    Ok(agent.create_string(&joined))
}

pub(crate) fn array_proto_slice(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "slice")?;
    let length = agent.heap[array].elements.len();
    let start = match args.first() {
        None | Some(Value::Undefined) => 0,
        Some(value) => clamp_range(to_integer_or_infinity(agent, *value)?, length),
    };
    let end = match args.get(1) {
        None | Some(Value::Undefined) => length,
        Some(value) => clamp_range(to_integer_or_infinity(agent, *value)?, length),
    };
    let elements = if start < end {
        agent.heap[array].elements[start..end].to_vec()
    } else {
        Vec::new()
    };
    Ok(create_array(agent, elements))
}

fn find_last_impl(
    agent: &mut Agent,
    this: Value,
    args: &[Value],
    want_index: bool,
) -> JsResult<Value> {
    let array = require_array(agent, this, "findLast")?;
    let callback = args.first().copied().unwrap_or(Value::Undefined);
    let length = agent.heap[array].elements.len();
    // Iterate descending from length - 1.
    for index in (0..length).rev() {
        let element = agent.heap[array].elements[index];
        let verdict = call_value(
            agent,
            callback,
            Value::Undefined,
            &[element, Value::Integer(index as i32), this],
        )?;
        if crate::ecmascript::abstract_operations::type_conversion::to_boolean(agent, verdict) {
            return Ok(if want_index {
                Value::Integer(index as i32)
            } else {
                element
            });
        }
    }
    Ok(if want_index {
        Value::Integer(-1)
    } else {
        Value::Undefined
    })
}

pub(crate) fn array_proto_find_last(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    find_last_impl(agent, this, args, false)
}

pub(crate) fn array_proto_find_last_index(
    agent: &mut Agent,
    this: Value,
    args: &[Value],
) -> JsResult<Value> {
    find_last_impl(agent, this, args, true)
}

// The ES2024 change-by-copy family. None of these touch the source array.

pub(crate) fn array_proto_to_reversed(agent: &mut Agent, this: Value, _args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "toReversed")?;
    let mut elements = agent.heap[array].elements.clone();
    elements.reverse();
    Ok(create_array(agent, elements))
}

pub(crate) fn array_proto_to_sorted(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "toSorted")?;
    let comparator = args.first().copied().unwrap_or(Value::Undefined);
    if !comparator.is_undefined() && !comparator.is_function() {
        return Err(agent.throw_exception(ExceptionType::TypeError, "comparator is not a function"));
    }
    let elements = agent.heap[array].elements.clone();

    // Undefined elements sort to the end regardless of the comparator.
    let mut rest: Vec<Value> = Vec::with_capacity(elements.len());
    let mut undefined_count = 0usize;
    for element in elements {
        if element.is_undefined() {
            undefined_count += 1;
        } else {
            rest.push(element);
        }
    }

    let mut sorted: Vec<Value> = Vec::with_capacity(rest.len());
    if comparator.is_undefined() {
        // Default sort order is by code units of the string conversions.
        let mut keyed: Vec<(Vec<u16>, Value)> = Vec::with_capacity(rest.len());
        for element in rest {
            let key = to_string_lossy(agent, element)?.encode_utf16().collect();
            keyed.push((key, element));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        sorted.extend(keyed.into_iter().map(|(_, element)| element));
    } else {
        // Insertion sort so comparator errors can propagate.
        for element in rest {
            let mut insert_at = sorted.len();
            for (index, existing) in sorted.iter().enumerate() {
                let verdict = call_value(agent, comparator, Value::Undefined, &[element, *existing])?;
                let ordering = to_number(agent, verdict)?;
                if ordering < 0.0 {
                    insert_at = index;
                    break;
                }
            }
            sorted.insert(insert_at, element);
        }
    }

    sorted.extend(std::iter::repeat_n(Value::Undefined, undefined_count));
    Ok(create_array(agent, sorted))
}

pub(crate) fn array_proto_to_spliced(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "toSpliced")?;
    let length = agent.heap[array].elements.len();
    let start = match args.first() {
        None | Some(Value::Undefined) => 0,
        Some(value) => clamp_range(to_integer_or_infinity(agent, *value)?, length),
    };
    let delete_count = match args.get(1) {
        None if args.is_empty() => 0,
        None => length - start,
        Some(value) => {
            let count = to_integer_or_infinity(agent, *value)?;
            count.clamp(0.0, (length - start) as f64) as usize
        }
    };
    let items = args.get(2..).unwrap_or(&[]);

    let source = agent.heap[array].elements.clone();
    let mut elements = Vec::with_capacity(length - delete_count + items.len());
    elements.extend_from_slice(&source[..start]);
    elements.extend_from_slice(items);
    elements.extend_from_slice(&source[start + delete_count..]);
    Ok(create_array(agent, elements))
}

pub(crate) fn array_proto_with(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "with")?;
    let length = agent.heap[array].elements.len();
    let index = to_integer_or_infinity(agent, args.first().copied().unwrap_or(Value::Undefined))?;
    let Some(index) = relative_index(index, length) else {
        return Err(agent.throw_exception(ExceptionType::RangeError, "Invalid index"));
    };
    let value = args.get(1).copied().unwrap_or(Value::Undefined);
    let mut elements = agent.heap[array].elements.clone();
    elements[index] = value;
    Ok(create_array(agent, elements))
}

pub(crate) fn array_proto_values(agent: &mut Agent, this: Value, _args: &[Value]) -> JsResult<Value> {
    let array = require_array(agent, this, "values")?;
    Ok(create_array_iterator(agent, array))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ecmascript::execution::agent::RuntimeOptions;

    fn sample(agent: &mut Agent) -> Value {
        create_array(
            agent,
            vec![Value::Integer(3), Value::Integer(1), Value::Integer(2)],
        )
    }

    #[test]
    fn push_and_pop_adjust_length() {
        let mut agent = Agent::new(RuntimeOptions::default());
        let array = sample(&mut agent);
        let length = array_proto_push(&mut agent, array, &[Value::Integer(9)]).unwrap();
        assert_eq!(length, Value::Integer(4));
        let popped = array_proto_pop(&mut agent, array, &[]).unwrap();
        assert_eq!(popped, Value::Integer(9));
    }

    #[test]
    fn copy_methods_do_not_mutate_the_source() {
        let mut agent = Agent::new(RuntimeOptions::default());
        let array = sample(&mut agent);
        let Value::Array(handle) = array else { unreachable!() };

        let sorted = array_proto_to_sorted(&mut agent, array, &[]).unwrap();
        let reversed = array_proto_to_reversed(&mut agent, array, &[]).unwrap();
        let spliced =
            array_proto_to_spliced(&mut agent, array, &[Value::Integer(1), Value::Integer(1)])
                .unwrap();
        let with = array_proto_with(&mut agent, array, &[Value::Integer(0), Value::Integer(7)])
            .unwrap();

        assert_eq!(
            agent.heap[handle].elements,
            vec![Value::Integer(3), Value::Integer(1), Value::Integer(2)]
        );
        let Value::Array(sorted) = sorted else { unreachable!() };
        assert_eq!(
            agent.heap[sorted].elements,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
        let Value::Array(reversed) = reversed else { unreachable!() };
        assert_eq!(
            agent.heap[reversed].elements,
            vec![Value::Integer(2), Value::Integer(1), Value::Integer(3)]
        );
        let Value::Array(spliced) = spliced else { unreachable!() };
        assert_eq!(
            agent.heap[spliced].elements,
            vec![Value::Integer(3), Value::Integer(2)]
        );
        let Value::Array(with) = with else { unreachable!() };
        assert_eq!(
            agent.heap[with].elements,
            vec![Value::Integer(7), Value::Integer(1), Value::Integer(2)]
        );
    }

    #[test]
    fn find_last_iterates_descending() {
        let mut agent = Agent::new(RuntimeOptions::default());
        // findLast with an always-true native callback returns the last
        // element.
        fn always_true(
            _agent: &mut Agent,
            _this: Value,
            _args: &[Value],
        ) -> crate::ecmascript::execution::agent::JsResult<Value> {
            Ok(Value::Boolean(true))
        }
        let callback = super::super::builtin_function::create_builtin_function(
            &mut agent,
            always_true,
            "alwaysTrue",
            1,
        );
        let array = sample(&mut agent);
        let found =
            array_proto_find_last(&mut agent, array, &[Value::BuiltinFunction(callback)]).unwrap();
        assert_eq!(found, Value::Integer(2));
        let index = array_proto_find_last_index(
            &mut agent,
            array,
            &[Value::BuiltinFunction(callback)],
        )
        .unwrap();
        assert_eq!(index, Value::Integer(2));
    }
}
