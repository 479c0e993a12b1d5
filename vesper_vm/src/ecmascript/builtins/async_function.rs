// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The async-function adapter: calling an async function returns a fresh
//! pending promise and schedules the body as a microtask. `await` suspends
//! the body's frame into an [`AwaitReactionHeapData`] cell; promise
//! reactions resume it with the settled value (or rethrow at the await
//! site). The whole frame is preserved across suspension, so every local
//! keeps its value.

use super::promise::{inner_promise_then, promise_resolve, reject_promise, resolve_promise};
use super::promise_abstract_operations::promise_reaction_records::{
    PromiseReactionHandler, PromiseReactionType,
};
use crate::ecmascript::execution::agent::{Agent, JsResult};
use crate::ecmascript::execution::event_loop::{InnerJob, Job};
use crate::ecmascript::types::value::Value;
use crate::engine::vm::{self, ExecutionResult, SuspendedVm};
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use crate::heap::{AwaitReaction, CreateHeapData, HeapSize, Promise, ScriptFunction};

/// A suspension point (or the not-yet-started body) of one async function
/// invocation, together with the promise its completion settles.
#[derive(Debug)]
pub struct AwaitReactionHeapData {
    pub(crate) vm: Option<SuspendedVm>,
    pub(crate) return_promise: Promise,
}

impl HeapSize for AwaitReactionHeapData {}

impl HeapMarkAndSweep for AwaitReactionHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self { vm, return_promise } = self;
        vm.mark_values(queues);
        return_promise.mark_values(queues);
    }
}

/// Calling an async function: build the frame, park it, hand back the
/// promise. The body itself starts from the microtask queue.
pub(crate) fn async_function_call(
    agent: &mut Agent,
    function: ScriptFunction,
    this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let frame = vm::build_frame(agent, function, this, args);
    let return_promise = super::promise::create_pending_promise(agent);
    let reaction = agent.heap.create(AwaitReactionHeapData {
        vm: Some(SuspendedVm::from_start(frame)),
        return_promise,
    });
    agent.enqueue_job(Job {
        inner: InnerJob::AsyncFunctionStart(reaction),
    });
    Ok(Value::Promise(return_promise))
}

/// First entry into the body, from the start microtask.
pub(crate) fn start(agent: &mut Agent, reaction: AwaitReaction) {
    let Some(vm) = agent[reaction].vm.take() else {
        return;
    };
    let result = vm.start(agent);
    settle(agent, reaction, result);
}

/// Re-entry after the awaited promise settled.
pub(crate) fn resume(
    agent: &mut Agent,
    reaction: AwaitReaction,
    reaction_type: PromiseReactionType,
    value: Value,
) {
    let Some(vm) = agent[reaction].vm.take() else {
        return;
    };
    let result = match reaction_type {
        PromiseReactionType::Fulfill => vm.resume(agent, value),
        PromiseReactionType::Reject => vm.resume_throw(agent, value),
    };
    settle(agent, reaction, result);
}

fn settle(agent: &mut Agent, reaction: AwaitReaction, result: ExecutionResult) {
    let return_promise = agent[reaction].return_promise;
    match result {
        ExecutionResult::Return(value) => {
            resolve_promise(agent, return_promise, value);
        }
        ExecutionResult::Throw(error) => {
            reject_promise(agent, return_promise, error.value());
        }
        ExecutionResult::Await { vm, awaited_value } => {
            // Park the continuation, then subscribe it to the awaited value.
            agent[reaction].vm = Some(vm);
            let promise = promise_resolve(agent, awaited_value);
            inner_promise_then(
                agent,
                promise,
                PromiseReactionHandler::Await(reaction),
                PromiseReactionHandler::Await(reaction),
                None,
            );
        }
        ExecutionResult::Yield { .. } => unreachable!("async function bodies cannot yield"),
    }
}
