// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::abstract_operations::operations_on_iterator_objects::create_iter_result_object;
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::value::Value;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use crate::heap::{Array, CreateHeapData, HeapSize, OrdinaryObject};

/// The iterator produced by `Array.prototype.values` / `@@iterator`.
#[derive(Debug)]
pub struct ArrayIteratorHeapData {
    pub(crate) array: Array,
    pub(crate) index: u32,
    pub(crate) done: bool,
    pub(crate) object_index: Option<OrdinaryObject>,
}

impl HeapSize for ArrayIteratorHeapData {}

impl HeapMarkAndSweep for ArrayIteratorHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            array,
            index: _,
            done: _,
            object_index,
        } = self;
        array.mark_values(queues);
        object_index.mark_values(queues);
    }
}

pub(crate) fn create_array_iterator(agent: &mut Agent, array: Array) -> Value {
    Value::ArrayIterator(agent.heap.create(ArrayIteratorHeapData {
        array,
        index: 0,
        done: false,
        object_index: None,
    }))
}

pub(crate) fn array_iterator_proto_next(
    agent: &mut Agent,
    this: Value,
    _args: &[Value],
) -> JsResult<Value> {
    let Value::ArrayIterator(iterator) = this else {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "next called on a non-array-iterator",
        ));
    };
    let data = &agent.heap[iterator];
    let array = data.array;
    let index = data.index as usize;
    if data.done || index >= agent.heap[array].elements.len() {
        agent.heap[iterator].done = true;
        return Ok(create_iter_result_object(agent, Value::Undefined, true));
    }
    let value = agent.heap[array].elements[index];
    agent.heap[iterator].index += 1;
    Ok(create_iter_result_object(agent, value, false))
}
