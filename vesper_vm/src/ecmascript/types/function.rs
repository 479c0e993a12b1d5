// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::value::Value;
use crate::ecmascript::execution::agent::{Agent, JsResult};
use crate::engine::bytecode::FunctionTemplate;
use crate::heap::{
    BuiltinFunction, CollectorFunction, Environment, FinallyFunction, HeapSize, OrdinaryObject,
    ResolvingFunction, ScriptFunction,
    heap_gc::{HeapMarkAndSweep, WorkQueues},
};
use std::rc::Rc;

/// Any callable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    BuiltinFunction(BuiltinFunction),
    ScriptFunction(ScriptFunction),
    ResolvingFunction(ResolvingFunction),
    FinallyFunction(FinallyFunction),
    CollectorFunction(CollectorFunction),
}

impl Function {
    pub fn into_value(self) -> Value {
        self.into()
    }
}

impl HeapMarkAndSweep for Function {
    fn mark_values(&self, queues: &mut WorkQueues) {
        match self {
            Function::BuiltinFunction(f) => f.mark_values(queues),
            Function::ScriptFunction(f) => f.mark_values(queues),
            Function::ResolvingFunction(f) => f.mark_values(queues),
            Function::FinallyFunction(f) => f.mark_values(queues),
            Function::CollectorFunction(f) => f.mark_values(queues),
        }
    }
}

/// Host callable: receives the agent, the `this` value, and the argument
/// vector.
pub type Behaviour = fn(&mut Agent, Value, &[Value]) -> JsResult<Value>;

/// A native function. Statics hang off `object_index` (`Promise.all`,
/// `Object.keys`, the `prototype` property of constructors, …).
#[derive(Debug)]
pub struct BuiltinFunctionHeapData {
    pub(crate) behaviour: Behaviour,
    pub(crate) name: Box<str>,
    pub(crate) length: u8,
    pub(crate) object_index: Option<OrdinaryObject>,
}

impl HeapSize for BuiltinFunctionHeapData {}

impl HeapMarkAndSweep for BuiltinFunctionHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        self.object_index.mark_values(queues);
    }
}

/// A function compiled from source: a bytecode template plus the environment
/// captured at closure creation. Arrows additionally capture their `this`.
#[derive(Debug)]
pub struct ScriptFunctionHeapData {
    pub(crate) template: Rc<FunctionTemplate>,
    pub(crate) environment: Option<Environment>,
    pub(crate) captured_this: Option<Value>,
    /// The `prototype` property, used as `[[Prototype]]` of constructed
    /// objects. Arrows, async functions, and generators have none.
    pub(crate) prototype: Option<Value>,
    pub(crate) object_index: Option<OrdinaryObject>,
}

impl HeapSize for ScriptFunctionHeapData {}

impl HeapMarkAndSweep for ScriptFunctionHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            template: _,
            environment,
            captured_this,
            prototype,
            object_index,
        } = self;
        environment.mark_values(queues);
        captured_this.mark_values(queues);
        prototype.mark_values(queues);
        object_index.mark_values(queues);
    }
}
