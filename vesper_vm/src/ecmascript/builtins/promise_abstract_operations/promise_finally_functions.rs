// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::abstract_operations::operations_on_objects::call_function;
use crate::ecmascript::execution::agent::{Agent, JsError, JsResult};
use crate::ecmascript::types::function::Function;
use crate::ecmascript::types::value::Value;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use crate::heap::{FinallyFunction, HeapSize};

use super::promise_reaction_records::PromiseReactionType;

/// The pass-through wrappers `finally` registers on both settlement paths:
/// run the callback, then propagate the original settlement unchanged
/// unless the callback itself throws.
#[derive(Debug)]
pub struct FinallyFunctionHeapData {
    pub(crate) callback: Function,
    pub(crate) reaction_type: PromiseReactionType,
}

impl HeapSize for FinallyFunctionHeapData {}

impl HeapMarkAndSweep for FinallyFunctionHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            callback,
            reaction_type: _,
        } = self;
        callback.mark_values(queues);
    }
}

pub(crate) fn call(
    agent: &mut Agent,
    function: FinallyFunction,
    args: &[Value],
) -> JsResult<Value> {
    let data = &agent[function];
    let callback = data.callback;
    let reaction_type = data.reaction_type;
    let argument = args.first().copied().unwrap_or(Value::Undefined);
    call_function(agent, callback, Value::Undefined, &[])?;
    match reaction_type {
        PromiseReactionType::Fulfill => Ok(argument),
        PromiseReactionType::Reject => Err(JsError::new(argument)),
    }
}
