// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generator objects. A generator body is compiled like an async body but
//! suspends synchronously through `Yield`; `next()` drives the suspended
//! frame on the caller's stack, no event loop involved.

use crate::ecmascript::abstract_operations::operations_on_iterator_objects::create_iter_result_object;
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::value::Value;
use crate::engine::vm::{self, ExecutionResult, SuspendedVm};
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use crate::heap::{CreateHeapData, Generator, HeapSize, OrdinaryObject, ScriptFunction};

#[derive(Debug, Default)]
pub(crate) enum GeneratorState {
    #[default]
    Completed,
    SuspendedStart(SuspendedVm),
    SuspendedYield(SuspendedVm),
    Executing,
}

#[derive(Debug)]
pub struct GeneratorHeapData {
    pub(crate) state: GeneratorState,
    pub(crate) object_index: Option<OrdinaryObject>,
}

impl HeapSize for GeneratorHeapData {}

impl HeapMarkAndSweep for GeneratorHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            state,
            object_index,
        } = self;
        match state {
            GeneratorState::SuspendedStart(vm) | GeneratorState::SuspendedYield(vm) => {
                vm.mark_values(queues)
            }
            GeneratorState::Completed | GeneratorState::Executing => {}
        }
        object_index.mark_values(queues);
    }
}

/// Calling a generator function builds the frame but runs nothing.
pub(crate) fn generator_function_call(
    agent: &mut Agent,
    function: ScriptFunction,
    this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let frame = vm::build_frame(agent, function, this, args);
    let generator = agent.heap.create(GeneratorHeapData {
        state: GeneratorState::SuspendedStart(SuspendedVm::from_start(frame)),
        object_index: None,
    });
    Ok(Value::Generator(generator))
}

fn require_generator(agent: &mut Agent, this: Value, method: &str) -> JsResult<Generator> {
    match this {
        Value::Generator(generator) => Ok(generator),
        _ => Err(agent.throw_exception(
            ExceptionType::TypeError,
            format!("Generator.prototype.{method} called on a non-generator"),
        )),
    }
}

/// `next(value)`: resume until the next `yield`, `return`, or throw.
pub(crate) fn generator_proto_next(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let generator = require_generator(agent, this, "next")?;
    let sent = args.first().copied().unwrap_or(Value::Undefined);
    let state = std::mem::replace(&mut agent[generator].state, GeneratorState::Executing);
    let result = match state {
        GeneratorState::Completed => {
            agent[generator].state = GeneratorState::Completed;
            return Ok(create_iter_result_object(agent, Value::Undefined, true));
        }
        GeneratorState::Executing => {
            agent[generator].state = GeneratorState::Executing;
            return Err(agent.throw_exception(
                ExceptionType::TypeError,
                "Generator is already running",
            ));
        }
        GeneratorState::SuspendedStart(vm) => vm.start(agent),
        GeneratorState::SuspendedYield(vm) => vm.resume(agent, sent),
    };
    match result {
        ExecutionResult::Return(value) => {
            agent[generator].state = GeneratorState::Completed;
            Ok(create_iter_result_object(agent, value, true))
        }
        ExecutionResult::Throw(error) => {
            agent[generator].state = GeneratorState::Completed;
            Err(error)
        }
        ExecutionResult::Yield { vm, yielded_value } => {
            agent[generator].state = GeneratorState::SuspendedYield(vm);
            Ok(create_iter_result_object(agent, yielded_value, false))
        }
        ExecutionResult::Await { .. } => unreachable!("generator bodies cannot await"),
    }
}

/// `return(value)`: complete the generator early without running the body
/// further.
pub(crate) fn generator_proto_return(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let generator = require_generator(agent, this, "return")?;
    let value = args.first().copied().unwrap_or(Value::Undefined);
    if matches!(agent[generator].state, GeneratorState::Executing) {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "Generator is already running",
        ));
    }
    agent[generator].state = GeneratorState::Completed;
    Ok(create_iter_result_object(agent, value, true))
}

/// `@@iterator`: a generator is its own iterator.
pub(crate) fn generator_proto_iterator(
    agent: &mut Agent,
    this: Value,
    _args: &[Value],
) -> JsResult<Value> {
    require_generator(agent, this, "[Symbol.iterator]")?;
    Ok(this)
}
