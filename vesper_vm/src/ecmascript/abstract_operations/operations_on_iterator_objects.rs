// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operations on Iterator Objects: GetIterator, stepping, result
//! unpacking, and the `return()` cleanup contract.

use super::operations_on_objects::{call_function, create_data_property, get_method, get_value};
use super::type_conversion::to_boolean;
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::object::{ObjectHeapData, PropertyKey};
use crate::ecmascript::types::value::{Symbol, Value};
use crate::heap::CreateHeapData;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};

/// A sync-iterator record: the iterator object and its cached `next`.
#[derive(Debug, Clone, Copy)]
pub struct IteratorRecord {
    pub iterator: Value,
    pub next_method: Value,
}

impl HeapMarkAndSweep for IteratorRecord {
    fn mark_values(&self, queues: &mut WorkQueues) {
        self.iterator.mark_values(queues);
        self.next_method.mark_values(queues);
    }
}

/// GetIterator: calls `@@iterator` (or `@@asyncIterator` first in async
/// mode, falling back to the sync protocol).
pub fn get_iterator(agent: &mut Agent, value: Value, is_async: bool) -> JsResult<IteratorRecord> {
    let mut method = None;
    if is_async {
        method = get_method(agent, value, &PropertyKey::Symbol(Symbol::AsyncIterator))?;
    }
    if method.is_none() {
        method = get_method(agent, value, &PropertyKey::Symbol(Symbol::Iterator))?;
    }
    let Some(method) = method else {
        return Err(agent.throw_exception(ExceptionType::TypeError, "value is not iterable"));
    };
    let iterator = call_function(agent, method, value, &[])?;
    if !iterator.is_object() {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "iterator method did not return an object",
        ));
    }
    let next_method = get_value(agent, iterator, &PropertyKey::from_str("next"))?;
    Ok(IteratorRecord {
        iterator,
        next_method,
    })
}

/// Calls `next()` and returns the raw iterator result value.
pub fn iterator_next(agent: &mut Agent, record: &IteratorRecord) -> JsResult<Value> {
    let Some(next) = record.next_method.into_function() else {
        return Err(agent.throw_exception(ExceptionType::TypeError, "iterator has no next method"));
    };
    call_function(agent, next, record.iterator, &[])
}

/// Reads `{value, done}` out of an iterator result object.
pub fn unpack_iterator_result(agent: &mut Agent, result: Value) -> JsResult<(Value, bool)> {
    if !result.is_object() {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "iterator result is not an object",
        ));
    }
    let done = get_value(agent, result, &PropertyKey::from_str("done"))?;
    let done = to_boolean(agent, done);
    let value = if done {
        Value::Undefined
    } else {
        get_value(agent, result, &PropertyKey::from_str("value"))?
    };
    Ok((value, done))
}

/// IteratorClose: the cleanup contract for early exits (`break`, `throw`).
/// When `swallow` is set (exception unwind), secondary errors from
/// `return()` are suppressed so the original exception wins.
pub fn iterator_close(agent: &mut Agent, record: &IteratorRecord, swallow: bool) -> JsResult<()> {
    let return_method = match get_method(agent, record.iterator, &PropertyKey::from_str("return")) {
        Ok(method) => method,
        Err(error) => return if swallow { Ok(()) } else { Err(error) },
    };
    if let Some(method) = return_method {
        match call_function(agent, method, record.iterator, &[]) {
            Ok(_) => {}
            Err(error) => {
                if !swallow {
                    return Err(error);
                }
            }
        }
    }
    Ok(())
}

/// CreateIterResultObject: `{ value, done }`.
pub fn create_iter_result_object(agent: &mut Agent, value: Value, done: bool) -> Value {
    let prototype = Some(Value::Object(agent.intrinsics().object_prototype));
    let object = Value::Object(agent.heap.create(ObjectHeapData::new(prototype)));
    create_data_property(agent, object, PropertyKey::from_str("value"), value);
    create_data_property(agent, object, PropertyKey::from_str("done"), Value::Boolean(done));
    object
}
