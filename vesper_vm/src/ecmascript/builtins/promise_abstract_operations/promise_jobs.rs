// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Promise Jobs: the two microtask kinds the promise machinery enqueues.

use super::promise_capability_records::PromiseCapability;
use super::promise_reaction_records::{PromiseReactionHandler, PromiseReactionType};
use super::promise_resolving_functions::create_resolving_functions;
use crate::ecmascript::abstract_operations::operations_on_objects::call_function;
use crate::ecmascript::builtins::async_function;
use crate::ecmascript::execution::agent::{Agent, JsError, JsResult};
use crate::ecmascript::execution::event_loop::{InnerJob, Job};
use crate::ecmascript::types::function::Function;
use crate::ecmascript::types::value::Value;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use crate::heap::{Promise, PromiseReaction};

/// NewPromiseReactionJob: runs one reaction against the settlement value.
#[derive(Debug)]
pub struct PromiseReactionJob {
    reaction: PromiseReaction,
    argument: Value,
}

impl PromiseReactionJob {
    pub(crate) fn run(self, agent: &mut Agent) -> JsResult<()> {
        let Self { reaction, argument } = self;
        let handler = agent[reaction].handler;
        let reaction_type = agent[reaction].reaction_type;
        let handler_result = match handler {
            PromiseReactionHandler::Empty => match reaction_type {
                PromiseReactionType::Fulfill => Ok(argument),
                PromiseReactionType::Reject => Err(JsError::new(argument)),
            },
            PromiseReactionHandler::JobCallback(callback) => {
                call_function(agent, callback, Value::Undefined, &[argument])
            }
            PromiseReactionHandler::Await(await_reaction) => {
                debug_assert!(agent[reaction].capability.is_none());
                async_function::resume(agent, await_reaction, reaction_type, argument);
                Ok(Value::Undefined)
            }
        };

        let Some(capability) = agent[reaction].capability else {
            // Await resumptions carry no downstream promise; an empty
            // handler without capability would silently drop a rejection.
            if matches!(handler, PromiseReactionHandler::Await(_)) {
                return Ok(());
            }
            return handler_result.map(|_| ());
        };
        let capability = PromiseCapability::from_promise(capability);
        match handler_result {
            Err(error) => capability.reject(agent, error.value()),
            Ok(value) => capability.resolve(agent, value),
        }
        Ok(())
    }
}

impl HeapMarkAndSweep for PromiseReactionJob {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self { reaction, argument } = self;
        reaction.mark_values(queues);
        argument.mark_values(queues);
    }
}

pub(crate) fn new_promise_reaction_job(reaction: PromiseReaction, argument: Value) -> Job {
    Job {
        inner: InnerJob::PromiseReaction(PromiseReactionJob { reaction, argument }),
    }
}

/// NewPromiseResolveThenableJob: calls `then(resolve, reject)` on a
/// thenable so its settlement is extracted into the promise.
#[derive(Debug)]
pub struct PromiseResolveThenableJob {
    promise_to_resolve: Promise,
    thenable: Value,
    then: Function,
}

impl PromiseResolveThenableJob {
    pub(crate) fn run(self, agent: &mut Agent) -> JsResult<()> {
        let Self {
            promise_to_resolve,
            thenable,
            then,
        } = self;
        let (resolve_function, reject_function) =
            create_resolving_functions(agent, promise_to_resolve);
        let then_call_result = call_function(
            agent,
            then,
            thenable,
            &[
                Value::ResolvingFunction(resolve_function),
                Value::ResolvingFunction(reject_function),
            ],
        );
        if let Err(error) = then_call_result {
            // The reject resolving function carries the already-resolved
            // guard, so a thenable that settled first wins.
            crate::ecmascript::builtins::promise_abstract_operations::promise_resolving_functions::call(
                agent,
                reject_function,
                &[error.value()],
            )?;
        }
        Ok(())
    }
}

impl HeapMarkAndSweep for PromiseResolveThenableJob {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            promise_to_resolve,
            thenable,
            then,
        } = self;
        promise_to_resolve.mark_values(queues);
        thenable.mark_values(queues);
        then.mark_values(queues);
    }
}

pub(crate) fn new_promise_resolve_thenable_job(
    promise_to_resolve: Promise,
    thenable: Value,
    then: Function,
) -> Job {
    Job {
        inner: InnerJob::PromiseResolveThenable(PromiseResolveThenableJob {
            promise_to_resolve,
            thenable,
            then,
        }),
    }
}
