// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::event_loop::EventLoop;
use super::realm::{Intrinsics, initialize_global_object};
use crate::ecmascript::builtins::error::ErrorHeapData;
use crate::ecmascript::builtins::promise::data::PromiseState;
use crate::ecmascript::types::Value;
use crate::ecmascript::types::object::ObjectHeapData;
use crate::ecmascript::types::string::StringHeapData;
use crate::engine::vm::CallFrame;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues, heap_gc};
use crate::heap::{CreateHeapData, DEFAULT_HEAP_BUDGET, Heap, HeapString, OrdinaryObject, Promise};

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub disable_gc: bool,
    pub print_internals: bool,
    /// Allocation budget in bytes; exceeding it triggers collection at the
    /// next safepoint.
    pub heap_budget: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            disable_gc: false,
            print_internals: false,
            heap_budget: DEFAULT_HEAP_BUDGET,
        }
    }
}

pub type JsResult<T> = std::result::Result<T, JsError>;

/// A thrown JavaScript value. Identity is preserved: whatever was thrown is
/// what a `catch` clause observes.
#[derive(Debug, Clone, Copy)]
pub struct JsError(Value);

impl JsError {
    pub(crate) fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(self) -> Value {
        self.0
    }

    /// Human-readable rendition for host-side reporting.
    pub fn message(self, agent: &Agent) -> String {
        match self.0 {
            Value::Error(error) => {
                let data = &agent[error];
                format!("{}: {}", data.kind.as_str(), data.message)
            }
            other => crate::ecmascript::abstract_operations::type_conversion::to_display_string(
                agent, other,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionType {
    Error,
    AggregateError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
}

impl ExceptionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExceptionType::Error => "Error",
            ExceptionType::AggregateError => "AggregateError",
            ExceptionType::RangeError => "RangeError",
            ExceptionType::ReferenceError => "ReferenceError",
            ExceptionType::SyntaxError => "SyntaxError",
            ExceptionType::TypeError => "TypeError",
        }
    }
}

/// The runtime aggregate: owns the heap, the event loop, the global object,
/// and the live call frames. Every operation takes `&mut Agent`; there are
/// no process-global singletons.
pub struct Agent {
    pub heap: Heap,
    pub(crate) event_loop: EventLoop,
    pub(crate) execution_stack: Vec<CallFrame>,
    pub(crate) global_object: OrdinaryObject,
    pub(crate) intrinsics: Intrinsics,
    pub options: RuntimeOptions,
    gc_roots: Vec<Value>,
}

impl Agent {
    pub fn new(options: RuntimeOptions) -> Self {
        let mut heap = Heap::new(options.heap_budget);
        let intrinsics = Intrinsics::create(&mut heap);
        let global_object = heap.create(ObjectHeapData::new(Some(Value::Object(
            intrinsics.object_prototype,
        ))));
        let mut agent = Self {
            heap,
            event_loop: EventLoop::new(),
            execution_stack: Vec::new(),
            global_object,
            intrinsics,
            options,
            gc_roots: Vec::new(),
        };
        initialize_global_object(&mut agent);
        agent
    }

    pub fn global_object(&self) -> OrdinaryObject {
        self.global_object
    }

    pub(crate) fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// Allocates a heap string.
    pub fn create_string(&mut self, value: &str) -> Value {
        Value::String(self.heap.create(StringHeapData::from_str(value)))
    }

    pub(crate) fn create_string_value(&mut self, value: StringHeapData) -> Value {
        Value::String(self.heap.create(value))
    }

    pub fn string_data(&self, string: HeapString) -> &StringHeapData {
        &self.heap[string]
    }

    /// Constructs an error cell and returns it as a throw completion.
    pub fn throw_exception(&mut self, kind: ExceptionType, message: impl Into<Box<str>>) -> JsError {
        let error = self.heap.create(ErrorHeapData::new(kind, message.into()));
        JsError::new(Value::Error(error))
    }

    /// Explicitly roots a value, keeping it (and everything it references)
    /// alive across collections until unrooted.
    pub fn root_value(&mut self, value: Value) {
        self.gc_roots.push(value);
    }

    pub fn unroot_value(&mut self, value: Value) {
        if let Some(position) = self.gc_roots.iter().position(|root| *root == value) {
            self.gc_roots.swap_remove(position);
        }
    }

    /// Runs a full collection immediately, regardless of heap pressure.
    pub fn collect_garbage(&mut self) {
        heap_gc(self);
    }

    pub(crate) fn mark_roots(&self, queues: &mut WorkQueues) {
        self.global_object.mark_values(queues);
        self.intrinsics.mark_values(queues);
        for frame in &self.execution_stack {
            frame.mark_values(queues);
        }
        self.event_loop.mark_values(queues);
        for root in &self.gc_roots {
            root.mark_values(queues);
        }
    }

    /// Drives the event loop until both queues are empty or `stop()` was
    /// requested. An exception thrown by a task ends the current run; the
    /// remaining queued tasks are retained for a subsequent call.
    pub fn run_event_loop(&mut self) -> JsResult<()> {
        self.event_loop.running = true;
        loop {
            // Drain the microtask queue completely; microtasks queued during
            // the drain run in the same drain.
            while self.event_loop.running {
                let Some(job) = self.event_loop.microtasks.pop_front() else {
                    break;
                };
                if let Err(error) = job.run(self) {
                    self.event_loop.running = false;
                    return Err(error);
                }
            }
            if !self.event_loop.running {
                break;
            }
            let Some(task) = self.event_loop.macrotasks.pop_front() else {
                break;
            };
            if let Err(error) = task.run(self) {
                self.event_loop.running = false;
                return Err(error);
            }
        }
        self.event_loop.running = false;
        Ok(())
    }

    /// Requests the event loop to exit at the next task boundary.
    pub fn stop_event_loop(&mut self) {
        self.event_loop.running = false;
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.event_loop.microtasks.is_empty() || !self.event_loop.macrotasks.is_empty()
    }

    /// Reads a property of the global object; the embedder's window into
    /// script results.
    pub fn get_global(&mut self, name: &str) -> JsResult<Value> {
        let global = Value::Object(self.global_object);
        let key = crate::ecmascript::types::PropertyKey::from_str(name);
        crate::ecmascript::abstract_operations::operations_on_objects::get_value(
            self, global, &key,
        )
    }

    /// Current live-byte estimate of the heap.
    pub fn heap_usage(&self) -> usize {
        self.heap.alloc_bytes
    }

    /// Rejected promises nobody has attached a rejection handler to. The CLI
    /// reports these after the loop drains.
    pub fn unhandled_rejections(&self) -> Vec<(Promise, Value)> {
        let mut rejections = Vec::new();
        for (index, slot) in self.heap.promises.slots.iter().enumerate() {
            let Some(data) = slot else {
                continue;
            };
            if let PromiseState::Rejected {
                promise_result,
                is_handled: false,
            } = &data.promise_state
            {
                rejections.push((Promise::from_index(index), *promise_result));
            }
        }
        rejections
    }
}
