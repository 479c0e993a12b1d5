// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-element reactions of the promise combinators and the shared
//! group record they report into. Result ordering always matches input
//! ordering, regardless of settlement order.

use crate::ecmascript::builtins::array::create_array;
use crate::ecmascript::builtins::error::new_aggregate_error;
use crate::ecmascript::builtins::promise::{reject_promise, resolve_promise};
use crate::ecmascript::execution::agent::{Agent, JsResult};
use crate::ecmascript::types::object::{ObjectHeapData, PropertyKey};
use crate::ecmascript::types::value::Value;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use crate::heap::{CollectorFunction, CreateHeapData, HeapSize, Promise, PromiseGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromiseGroupKind {
    All,
    AllSettled,
    Any,
}

/// Shared bookkeeping for one combinator invocation: the result promise,
/// the slots (input order), and how many inputs are still pending.
#[derive(Debug)]
pub struct PromiseGroupHeapData {
    pub(crate) result_promise: Promise,
    pub(crate) kind: PromiseGroupKind,
    pub(crate) remaining: u32,
    pub(crate) results: Vec<Value>,
}

impl HeapSize for PromiseGroupHeapData {}

impl HeapMarkAndSweep for PromiseGroupHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            result_promise,
            kind: _,
            remaining: _,
            results,
        } = self;
        result_promise.mark_values(queues);
        results.mark_values(queues);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CollectorFunctionType {
    Fulfill,
    Reject,
}

/// One element's reaction: stores the settlement into its slot and settles
/// the group when it was the last one out.
#[derive(Debug)]
pub struct CollectorFunctionHeapData {
    pub(crate) group: PromiseGroup,
    pub(crate) index: u32,
    pub(crate) collector_type: CollectorFunctionType,
    pub(crate) already_called: bool,
}

impl HeapSize for CollectorFunctionHeapData {}

impl HeapMarkAndSweep for CollectorFunctionHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            group,
            index: _,
            collector_type: _,
            already_called: _,
        } = self;
        group.mark_values(queues);
    }
}

pub(crate) fn create_collector_function(
    agent: &mut Agent,
    group: PromiseGroup,
    index: u32,
    collector_type: CollectorFunctionType,
) -> CollectorFunction {
    agent.heap.create(CollectorFunctionHeapData {
        group,
        index,
        collector_type,
        already_called: false,
    })
}

fn status_object(agent: &mut Agent, fulfilled: bool, value: Value) -> Value {
    let prototype = Some(Value::Object(agent.intrinsics().object_prototype));
    let object = Value::Object(agent.heap.create(ObjectHeapData::new(prototype)));
    let status = if fulfilled { "fulfilled" } else { "rejected" };
    let status_string = agent.create_string(status);
    crate::ecmascript::abstract_operations::operations_on_objects::create_data_property(
        agent,
        object,
        PropertyKey::from_str("status"),
        status_string,
    );
    crate::ecmascript::abstract_operations::operations_on_objects::create_data_property(
        agent,
        object,
        PropertyKey::from_str(if fulfilled { "value" } else { "reason" }),
        value,
    );
    object
}

pub(crate) fn call(
    agent: &mut Agent,
    function: CollectorFunction,
    args: &[Value],
) -> JsResult<Value> {
    let data = &agent[function];
    if data.already_called {
        return Ok(Value::Undefined);
    }
    let group = data.group;
    let index = data.index as usize;
    let collector_type = data.collector_type;
    agent[function].already_called = true;

    let argument = args.first().copied().unwrap_or(Value::Undefined);
    let kind = agent[group].kind;
    let slot_value = match (kind, collector_type) {
        (PromiseGroupKind::All, CollectorFunctionType::Fulfill) => argument,
        (PromiseGroupKind::Any, CollectorFunctionType::Reject) => argument,
        (PromiseGroupKind::AllSettled, CollectorFunctionType::Fulfill) => {
            status_object(agent, true, argument)
        }
        (PromiseGroupKind::AllSettled, CollectorFunctionType::Reject) => {
            status_object(agent, false, argument)
        }
        _ => Value::Undefined,
    };
    agent[group].results[index] = slot_value;
    agent[group].remaining -= 1;
    if agent[group].remaining == 0 {
        settle_group(agent, group);
    }
    Ok(Value::Undefined)
}

/// Settles the group's result promise once every input has reported.
pub(crate) fn settle_group(agent: &mut Agent, group: PromiseGroup) {
    let result_promise = agent[group].result_promise;
    let kind = agent[group].kind;
    let results = std::mem::take(&mut agent[group].results);
    match kind {
        PromiseGroupKind::All | PromiseGroupKind::AllSettled => {
            let array = create_array(agent, results);
            resolve_promise(agent, result_promise, array);
        }
        PromiseGroupKind::Any => {
            let error = new_aggregate_error(agent, results, "All promises were rejected".into());
            reject_promise(agent, result_promise, error);
        }
    }
}
