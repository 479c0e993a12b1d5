// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-facing global functions: printing, microtask/macrotask scheduling,
//! and the primitive conversion functions.

use crate::ecmascript::abstract_operations::type_conversion::{
    to_boolean, to_number, to_string_lossy,
};
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::value::Value;

fn join_arguments(agent: &mut Agent, args: &[Value]) -> JsResult<String> {
    let mut parts = Vec::with_capacity(args.len());
    for argument in args {
        parts.push(to_string_lossy(agent, *argument)?);
    }
    Ok(parts.join(" "))
}

pub(crate) fn global_print(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let line = join_arguments(agent, args)?;
    println!("{line}");
    Ok(Value::Undefined)
}

/// `queueMicrotask(callback)`.
pub(crate) fn global_queue_microtask(
    agent: &mut Agent,
    _this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let Some(callback) = args.first().copied().and_then(Value::into_function) else {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "queueMicrotask requires a callable argument",
        ));
    };
    agent.enqueue_microtask_callback(callback);
    Ok(Value::Undefined)
}

/// `setTimeout(callback, delay)`: a macrotask. There is no timer wheel; the
/// delay is accepted and ignored, ordering is FIFO.
pub(crate) fn global_set_timeout(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let Some(callback) = args.first().copied().and_then(Value::into_function) else {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "setTimeout requires a callable argument",
        ));
    };
    agent.enqueue_macrotask_callback(callback);
    Ok(Value::Integer(0))
}

pub(crate) fn global_string(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    match args.first() {
        None => Ok(agent.create_string("")),
        Some(value) => {
            let text = to_string_lossy(agent, *value)?;
            Ok(agent.create_string(&text))
        }
    }
}

pub(crate) fn global_number(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    match args.first() {
        None => Ok(Value::Integer(0)),
        Some(value) => {
            let number = to_number(agent, *value)?;
            Ok(Value::from_f64(number))
        }
    }
}

pub(crate) fn global_boolean(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let value = args.first().copied().unwrap_or(Value::Undefined);
    Ok(Value::Boolean(to_boolean(agent, value)))
}

/// `@@iterator` of the iterator prototypes: an iterator is its own
/// iterable.
pub(crate) fn return_this(_agent: &mut Agent, this: Value, _args: &[Value]) -> JsResult<Value> {
    Ok(this)
}
