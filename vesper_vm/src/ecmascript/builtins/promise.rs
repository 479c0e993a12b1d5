// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod data;

use self::data::{PromiseHeapData, PromiseReactions, PromiseState};
use super::promise_abstract_operations::promise_collector_functions::{
    CollectorFunctionType, PromiseGroupHeapData, PromiseGroupKind, create_collector_function,
    settle_group,
};
use super::promise_abstract_operations::promise_finally_functions::FinallyFunctionHeapData;
use super::promise_abstract_operations::promise_jobs::{
    new_promise_reaction_job, new_promise_resolve_thenable_job,
};
use super::promise_abstract_operations::promise_reaction_records::{
    PromiseReactionHandler, PromiseReactionHeapData, PromiseReactionType,
};
use super::promise_abstract_operations::promise_resolving_functions::create_resolving_functions;
use crate::ecmascript::abstract_operations::operations_on_iterator_objects::{
    get_iterator, iterator_next, unpack_iterator_result,
};
use crate::ecmascript::abstract_operations::operations_on_objects::{
    call_function, create_data_property, get_value,
};
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::function::Function;
use crate::ecmascript::types::object::{ObjectHeapData, PropertyKey};
use crate::ecmascript::types::value::Value;
use crate::heap::{CreateHeapData, Promise, PromiseGroup};

pub(crate) fn create_pending_promise(agent: &mut Agent) -> Promise {
    agent.heap.create(PromiseHeapData::default())
}

/// PromiseResolve: passes promises through, wraps everything else.
pub(crate) fn promise_resolve(agent: &mut Agent, value: Value) -> Promise {
    if let Value::Promise(promise) = value {
        return promise;
    }
    let promise = create_pending_promise(agent);
    resolve_promise(agent, promise, value);
    promise
}

/// The resolution algorithm: self-resolution rejects, promises are adopted,
/// thenables are coerced through a job, plain values fulfill.
pub(crate) fn resolve_promise(agent: &mut Agent, promise: Promise, value: Value) {
    if value == Value::Promise(promise) {
        let error = agent.throw_exception(ExceptionType::TypeError, "Chaining cycle detected");
        reject_promise(agent, promise, error.value());
        return;
    }

    if let Value::Promise(inner) = value {
        // Adopt the inner promise's eventual state.
        mark_resolution_delegated(agent, promise);
        inner_promise_then(
            agent,
            inner,
            PromiseReactionHandler::Empty,
            PromiseReactionHandler::Empty,
            Some(promise),
        );
        return;
    }

    if value.is_object() {
        let then = match get_value(agent, value, &PropertyKey::from_str("then")) {
            Ok(then) => then,
            Err(error) => {
                reject_promise(agent, promise, error.value());
                return;
            }
        };
        if let Some(then) = then.into_function() {
            mark_resolution_delegated(agent, promise);
            let job = new_promise_resolve_thenable_job(promise, value, then);
            agent.enqueue_job(job);
            return;
        }
    }

    fulfill_promise(agent, promise, value);
}

fn mark_resolution_delegated(agent: &mut Agent, promise: Promise) {
    if let PromiseState::Pending { is_resolved, .. } = &mut agent[promise].promise_state {
        *is_resolved = true;
    }
}

/// FulfillPromise: settle once, drain the fulfill reactions.
pub(crate) fn fulfill_promise(agent: &mut Agent, promise: Promise, value: Value) {
    let state = &mut agent[promise].promise_state;
    let PromiseState::Pending { .. } = state else {
        return;
    };
    let previous = std::mem::replace(
        state,
        PromiseState::Fulfilled {
            promise_result: value,
        },
    );
    let PromiseState::Pending {
        fulfill_reactions, ..
    } = previous
    else {
        unreachable!()
    };
    if let Some(reactions) = fulfill_reactions {
        reactions.trigger(agent, value);
    }
}

/// RejectPromise: settle once, drain the reject reactions.
pub(crate) fn reject_promise(agent: &mut Agent, promise: Promise, reason: Value) {
    let state = &mut agent[promise].promise_state;
    let PromiseState::Pending { .. } = state else {
        return;
    };
    let previous = std::mem::replace(
        state,
        PromiseState::Rejected {
            promise_result: reason,
            is_handled: false,
        },
    );
    let PromiseState::Pending {
        reject_reactions, ..
    } = previous
    else {
        unreachable!()
    };
    if let Some(reactions) = reject_reactions {
        let PromiseState::Rejected { is_handled, .. } = &mut agent[promise].promise_state else {
            unreachable!()
        };
        *is_handled = true;
        reactions.trigger(agent, reason);
    }
}

/// PerformPromiseThen with raw reaction handlers; used both by the user
/// surface and by the async-function adapter.
pub(crate) fn inner_promise_then(
    agent: &mut Agent,
    promise: Promise,
    on_fulfilled: PromiseReactionHandler,
    on_rejected: PromiseReactionHandler,
    capability: Option<Promise>,
) {
    let fulfill_reaction = agent.heap.create(PromiseReactionHeapData {
        capability,
        reaction_type: PromiseReactionType::Fulfill,
        handler: on_fulfilled,
    });
    let reject_reaction = agent.heap.create(PromiseReactionHeapData {
        capability,
        reaction_type: PromiseReactionType::Reject,
        handler: on_rejected,
    });

    match &mut agent[promise].promise_state {
        PromiseState::Pending {
            fulfill_reactions,
            reject_reactions,
            ..
        } => {
            match fulfill_reactions {
                Some(reactions) => reactions.push(fulfill_reaction),
                None => *fulfill_reactions = Some(PromiseReactions::One(fulfill_reaction)),
            }
            match reject_reactions {
                Some(reactions) => reactions.push(reject_reaction),
                None => *reject_reactions = Some(PromiseReactions::One(reject_reaction)),
            }
        }
        PromiseState::Fulfilled { promise_result } => {
            let argument = *promise_result;
            let job = new_promise_reaction_job(fulfill_reaction, argument);
            agent.enqueue_job(job);
        }
        PromiseState::Rejected {
            promise_result,
            is_handled,
        } => {
            let argument = *promise_result;
            *is_handled = true;
            let job = new_promise_reaction_job(reject_reaction, argument);
            agent.enqueue_job(job);
        }
    }
}

fn handler_from(value: Option<Value>) -> PromiseReactionHandler {
    match value.and_then(Value::into_function) {
        Some(function) => PromiseReactionHandler::JobCallback(function),
        None => PromiseReactionHandler::Empty,
    }
}

// ### The Promise constructor and its properties

/// `new Promise(executor)`: the executor runs synchronously; exceptions it
/// throws reject the promise (unless it already settled itself).
pub(crate) fn promise_constructor(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let Some(executor) = args.first().copied().and_then(Value::into_function) else {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "Promise resolver is not a function",
        ));
    };
    let promise = create_pending_promise(agent);
    let (resolve_function, reject_function) = create_resolving_functions(agent, promise);
    let result = call_function(
        agent,
        executor,
        Value::Undefined,
        &[
            Value::ResolvingFunction(resolve_function),
            Value::ResolvingFunction(reject_function),
        ],
    );
    if let Err(error) = result {
        crate::ecmascript::builtins::promise_abstract_operations::promise_resolving_functions::call(
            agent,
            reject_function,
            &[error.value()],
        )?;
    }
    Ok(Value::Promise(promise))
}

pub(crate) fn promise_static_resolve(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let value = args.first().copied().unwrap_or(Value::Undefined);
    let promise = promise_resolve(agent, value);
    Ok(Value::Promise(promise))
}

pub(crate) fn promise_static_reject(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let reason = args.first().copied().unwrap_or(Value::Undefined);
    let promise = create_pending_promise(agent);
    reject_promise(agent, promise, reason);
    Ok(Value::Promise(promise))
}

/// `Promise.withResolvers()`: the deferred pattern.
pub(crate) fn promise_static_with_resolvers(
    agent: &mut Agent,
    _this: Value,
    _args: &[Value],
) -> JsResult<Value> {
    let promise = create_pending_promise(agent);
    let (resolve_function, reject_function) = create_resolving_functions(agent, promise);
    let prototype = Some(Value::Object(agent.intrinsics().object_prototype));
    let result = Value::Object(agent.heap.create(ObjectHeapData::new(prototype)));
    create_data_property(
        agent,
        result,
        PropertyKey::from_str("promise"),
        Value::Promise(promise),
    );
    create_data_property(
        agent,
        result,
        PropertyKey::from_str("resolve"),
        Value::ResolvingFunction(resolve_function),
    );
    create_data_property(
        agent,
        result,
        PropertyKey::from_str("reject"),
        Value::ResolvingFunction(reject_function),
    );
    Ok(result)
}

/// Element reactions for one combinator element.
enum ElementReactions {
    Collector(CollectorFunctionType),
    ResolveResult,
    RejectResult,
}

fn combinator(
    agent: &mut Agent,
    kind: Option<PromiseGroupKind>,
    iterable: Value,
) -> JsResult<Value> {
    let result_promise = create_pending_promise(agent);
    let group = kind.map(|kind| {
        agent.heap.create(PromiseGroupHeapData {
            result_promise,
            kind,
            remaining: 1,
            results: Vec::new(),
        })
    });

    let iteration = perform_combinator_loop(agent, result_promise, group, kind, iterable);
    if let Err(error) = iteration {
        reject_promise(agent, result_promise, error.value());
        return Ok(Value::Promise(result_promise));
    }

    if let Some(group) = group {
        agent[group].remaining -= 1;
        if agent[group].remaining == 0 {
            // Covers the empty iterable and all-synchronously-settled cases.
            settle_group(agent, group);
        }
    }
    Ok(Value::Promise(result_promise))
}

fn perform_combinator_loop(
    agent: &mut Agent,
    result_promise: Promise,
    group: Option<PromiseGroup>,
    kind: Option<PromiseGroupKind>,
    iterable: Value,
) -> JsResult<()> {
    let record = get_iterator(agent, iterable, false)?;
    let mut index = 0u32;
    loop {
        let step = iterator_next(agent, &record)?;
        let (value, done) = unpack_iterator_result(agent, step)?;
        if done {
            break;
        }
        let element_promise = promise_resolve(agent, value);

        let (on_fulfilled, on_rejected) = match kind {
            None => (ElementReactions::ResolveResult, ElementReactions::RejectResult),
            Some(PromiseGroupKind::All) => (
                ElementReactions::Collector(CollectorFunctionType::Fulfill),
                ElementReactions::RejectResult,
            ),
            Some(PromiseGroupKind::AllSettled) => (
                ElementReactions::Collector(CollectorFunctionType::Fulfill),
                ElementReactions::Collector(CollectorFunctionType::Reject),
            ),
            Some(PromiseGroupKind::Any) => (
                ElementReactions::ResolveResult,
                ElementReactions::Collector(CollectorFunctionType::Reject),
            ),
        };

        if let Some(group) = group {
            agent[group].remaining += 1;
            agent[group].results.push(Value::Undefined);
        }
        let (result_resolve, result_reject) = create_resolving_functions(agent, result_promise);
        let make = |agent: &mut Agent, reactions: ElementReactions| -> Function {
            match reactions {
                ElementReactions::Collector(collector_type) => Function::CollectorFunction(
                    create_collector_function(agent, group.unwrap(), index, collector_type),
                ),
                ElementReactions::ResolveResult => Function::ResolvingFunction(result_resolve),
                ElementReactions::RejectResult => Function::ResolvingFunction(result_reject),
            }
        };
        let on_fulfilled = make(agent, on_fulfilled);
        let on_rejected = make(agent, on_rejected);
        inner_promise_then(
            agent,
            element_promise,
            PromiseReactionHandler::JobCallback(on_fulfilled),
            PromiseReactionHandler::JobCallback(on_rejected),
            None,
        );
        index += 1;
    }
    Ok(())
}

pub(crate) fn promise_static_all(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let iterable = args.first().copied().unwrap_or(Value::Undefined);
    combinator(agent, Some(PromiseGroupKind::All), iterable)
}

pub(crate) fn promise_static_all_settled(
    agent: &mut Agent,
    _this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let iterable = args.first().copied().unwrap_or(Value::Undefined);
    combinator(agent, Some(PromiseGroupKind::AllSettled), iterable)
}

pub(crate) fn promise_static_any(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let iterable = args.first().copied().unwrap_or(Value::Undefined);
    combinator(agent, Some(PromiseGroupKind::Any), iterable)
}

pub(crate) fn promise_static_race(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let iterable = args.first().copied().unwrap_or(Value::Undefined);
    combinator(agent, None, iterable)
}

// ### Promise.prototype

fn require_promise(agent: &mut Agent, this: Value, method: &str) -> JsResult<Promise> {
    match this {
        Value::Promise(promise) => Ok(promise),
        _ => Err(agent.throw_exception(
            ExceptionType::TypeError,
            format!("Promise.prototype.{method} called on a non-promise"),
        )),
    }
}

/// `then(onFulfilled, onRejected)` returns the downstream promise.
pub(crate) fn promise_proto_then(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let promise = require_promise(agent, this, "then")?;
    let result_capability = create_pending_promise(agent);
    let on_fulfilled = handler_from(args.first().copied());
    let on_rejected = handler_from(args.get(1).copied());
    inner_promise_then(
        agent,
        promise,
        on_fulfilled,
        on_rejected,
        Some(result_capability),
    );
    Ok(Value::Promise(result_capability))
}

/// `catch(onRejected)` is `then(undefined, onRejected)`.
pub(crate) fn promise_proto_catch(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let on_rejected = args.first().copied().unwrap_or(Value::Undefined);
    promise_proto_then(agent, this, &[Value::Undefined, on_rejected])
}

/// `finally(onFinally)` runs the callback on both outcomes and propagates
/// the original settlement unchanged, unless the callback throws.
pub(crate) fn promise_proto_finally(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let promise = require_promise(agent, this, "finally")?;
    let callback = args.first().copied().and_then(Value::into_function);
    let result_capability = create_pending_promise(agent);
    let (on_fulfilled, on_rejected) = match callback {
        Some(callback) => {
            let fulfill_wrapper = agent.heap.create(FinallyFunctionHeapData {
                callback,
                reaction_type: PromiseReactionType::Fulfill,
            });
            let reject_wrapper = agent.heap.create(FinallyFunctionHeapData {
                callback,
                reaction_type: PromiseReactionType::Reject,
            });
            (
                PromiseReactionHandler::JobCallback(Function::FinallyFunction(fulfill_wrapper)),
                PromiseReactionHandler::JobCallback(Function::FinallyFunction(reject_wrapper)),
            )
        }
        None => (PromiseReactionHandler::Empty, PromiseReactionHandler::Empty),
    };
    inner_promise_then(
        agent,
        promise,
        on_fulfilled,
        on_rejected,
        Some(result_capability),
    );
    Ok(Value::Promise(result_capability))
}
