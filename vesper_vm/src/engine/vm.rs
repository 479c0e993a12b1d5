// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The dispatch loop. Frames live on the agent's execution stack so the
//! collector can see every live value; one `run_loop` activation drives the
//! frames above its base index until the base frame returns, throws, or
//! suspends (`await` / `yield`).

use super::bytecode::{Constant, Executable, FunctionTemplate, Instruction, Opcode};
use crate::ecmascript::abstract_operations::operations_on_iterator_objects::{
    IteratorRecord, get_iterator, iterator_close, iterator_next, unpack_iterator_result,
};
use crate::ecmascript::abstract_operations::operations_on_objects::{
    call_function, delete_property, get_value, has_property, internal_prototype,
    own_enumerable_keys, set_value,
};
use crate::ecmascript::abstract_operations::testing_and_comparison::{
    abstract_relational_comparison, is_loosely_equal, is_strictly_equal,
};
use crate::ecmascript::abstract_operations::type_conversion::{
    PreferredType, to_boolean, to_number, to_primitive, to_property_key, to_string_value,
};
use crate::ecmascript::builtins::async_function::async_function_call;
use crate::ecmascript::builtins::generator_objects::generator_function_call;
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsError, JsResult};
use crate::ecmascript::execution::environments::{Binding, EnvironmentHeapData};
use crate::ecmascript::types::function::ScriptFunctionHeapData;
use crate::ecmascript::types::object::{ObjectHeapData, PropertyDescriptor, PropertyKey};
use crate::ecmascript::types::string::StringHeapData;
use crate::ecmascript::types::value::Value;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues, heap_gc};
use crate::heap::{CreateHeapData, Environment, ScriptFunction};
use hashbrown::HashSet;
use std::rc::Rc;

const MAX_CALL_STACK_DEPTH: usize = 8192;

#[derive(Debug, Clone, Copy)]
pub(crate) struct HandlerEntry {
    pub(crate) catch_ip: u32,
    pub(crate) stack_len: u32,
    pub(crate) iterators_len: u32,
    pub(crate) for_in_len: u32,
}

#[derive(Debug)]
pub(crate) struct ForInRecord {
    pub(crate) keys: Vec<Box<str>>,
    pub(crate) index: usize,
}

/// One function invocation: instruction pointer, fixed local slots, an
/// operand stack, the `this` binding, and the captured environment chain.
#[derive(Debug)]
pub struct CallFrame {
    pub(crate) executable: Rc<Executable>,
    pub(crate) template: Option<Rc<FunctionTemplate>>,
    pub(crate) ip: usize,
    pub(crate) locals: Vec<Value>,
    pub(crate) stack: Vec<Value>,
    pub(crate) this_value: Value,
    pub(crate) environment: Option<Environment>,
    pub(crate) iterators: Vec<IteratorRecord>,
    pub(crate) for_in: Vec<ForInRecord>,
    pub(crate) handlers: Vec<HandlerEntry>,
    /// Completion value of top-level expression statements.
    pub(crate) result: Value,
    pub(crate) is_construct: bool,
}

impl CallFrame {
    pub(crate) fn for_script(executable: Rc<Executable>) -> Self {
        let local_count = executable.local_count as usize;
        Self {
            executable,
            template: None,
            ip: 0,
            locals: vec![Value::Undefined; local_count],
            stack: Vec::new(),
            this_value: Value::Undefined,
            environment: None,
            iterators: Vec::new(),
            for_in: Vec::new(),
            handlers: Vec::new(),
            result: Value::Undefined,
            is_construct: false,
        }
    }
}

impl HeapMarkAndSweep for CallFrame {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            executable: _,
            template: _,
            ip: _,
            locals,
            stack,
            this_value,
            environment,
            iterators,
            for_in: _,
            handlers: _,
            result,
            is_construct: _,
        } = self;
        locals.mark_values(queues);
        stack.mark_values(queues);
        this_value.mark_values(queues);
        environment.mark_values(queues);
        iterators.mark_values(queues);
        result.mark_values(queues);
    }
}

/// A parked frame: an `await`/`yield` continuation, or a not-yet-started
/// async/generator body.
#[derive(Debug)]
pub struct SuspendedVm {
    frame: CallFrame,
}

impl SuspendedVm {
    pub(crate) fn from_start(frame: CallFrame) -> Self {
        Self { frame }
    }

    pub(crate) fn frame(&self) -> &CallFrame {
        &self.frame
    }

    /// Runs the parked body from its beginning.
    pub(crate) fn start(self, agent: &mut Agent) -> ExecutionResult {
        execute(agent, self.frame)
    }

    /// Resumes after a suspension, pushing the settled value at the
    /// suspension site.
    pub(crate) fn resume(self, agent: &mut Agent, value: Value) -> ExecutionResult {
        let mut frame = self.frame;
        frame.stack.push(value);
        execute(agent, frame)
    }

    /// Resumes in throw mode: the reason unwinds from the suspension site.
    pub(crate) fn resume_throw(self, agent: &mut Agent, reason: Value) -> ExecutionResult {
        let base = agent.execution_stack.len();
        agent.execution_stack.push(self.frame);
        match unwind(agent, base, JsError::new(reason)) {
            Some(result) => result,
            None => run_loop(agent, base),
        }
    }
}

impl HeapMarkAndSweep for SuspendedVm {
    fn mark_values(&self, queues: &mut WorkQueues) {
        self.frame.mark_values(queues);
    }
}

#[derive(Debug)]
pub enum ExecutionResult {
    Return(Value),
    Throw(JsError),
    Await {
        vm: SuspendedVm,
        awaited_value: Value,
    },
    Yield {
        vm: SuspendedVm,
        yielded_value: Value,
    },
}

enum Step {
    Continue,
    Return(Value),
    Await(Value),
    Yield(Value),
}

/// Runs `frame` to completion or suspension.
pub(crate) fn execute(agent: &mut Agent, mut frame: CallFrame) -> ExecutionResult {
    if frame.this_value.is_undefined() && frame.template.is_none() {
        frame.this_value = Value::Object(agent.global_object());
    }
    let base = agent.execution_stack.len();
    agent.execution_stack.push(frame);
    run_loop(agent, base)
}

/// Builds the frame for a script-function call: locals sized from the
/// template, surplus arguments dropped, missing ones undefined, captured
/// locals materialized in a fresh environment.
pub(crate) fn build_frame(
    agent: &mut Agent,
    function: ScriptFunction,
    this: Value,
    args: &[Value],
) -> CallFrame {
    let data = &agent[function];
    let template = data.template.clone();
    let captured_environment = data.environment;
    let captured_this = data.captured_this;
    let executable = template.executable.clone();

    let mut locals = vec![Value::Undefined; executable.local_count as usize];
    for index in 0..template.param_count as usize {
        locals[index] = args.get(index).copied().unwrap_or(Value::Undefined);
    }

    let environment = if template.env_bindings.is_empty() {
        captured_environment
    } else {
        let mut record = EnvironmentHeapData::new(captured_environment);
        for binding in &template.env_bindings {
            record.bindings.insert(
                binding.name.clone(),
                Binding {
                    value: Value::Undefined,
                    mutable: binding.mutable,
                    initialized: false,
                },
            );
        }
        for (param_index, env_index) in &template.captured_params {
            let name = &template.env_bindings[*env_index as usize].name;
            let value = args
                .get(*param_index as usize)
                .copied()
                .unwrap_or(Value::Undefined);
            let binding = record.bindings.get_mut(name).unwrap();
            binding.value = value;
            binding.initialized = true;
        }
        Some(agent.heap.create(record))
    };

    let this_value = if template.is_arrow {
        captured_this.unwrap_or(Value::Undefined)
    } else {
        this
    };

    CallFrame {
        executable,
        template: Some(template),
        ip: 0,
        locals,
        stack: Vec::new(),
        this_value,
        environment,
        iterators: Vec::new(),
        for_in: Vec::new(),
        handlers: Vec::new(),
        result: Value::Undefined,
        is_construct: false,
    }
}

/// Synchronous entry for calls that originate outside the dispatch loop
/// (builtins invoking user callbacks, accessor getters, jobs). Async and
/// generator functions divert to their adapters.
pub(crate) fn call_script_function(
    agent: &mut Agent,
    function: ScriptFunction,
    this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let template = agent[function].template.clone();
    if template.is_async {
        return async_function_call(agent, function, this, args);
    }
    if template.is_generator {
        return generator_function_call(agent, function, this, args);
    }
    if agent.execution_stack.len() >= MAX_CALL_STACK_DEPTH {
        return Err(agent.throw_exception(
            ExceptionType::RangeError,
            "Maximum call stack size exceeded",
        ));
    }
    let frame = build_frame(agent, function, this, args);
    match execute(agent, frame) {
        ExecutionResult::Return(value) => Ok(value),
        ExecutionResult::Throw(error) => Err(error),
        ExecutionResult::Await { .. } | ExecutionResult::Yield { .. } => {
            unreachable!("synchronous function suspended")
        }
    }
}

fn frame(agent: &mut Agent) -> &mut CallFrame {
    agent
        .execution_stack
        .last_mut()
        .expect("execution stack empty")
}

fn pop(agent: &mut Agent) -> Value {
    frame(agent).stack.pop().expect("operand stack underflow")
}

fn push(agent: &mut Agent, value: Value) {
    frame(agent).stack.push(value);
}

fn pop_args(agent: &mut Agent, count: usize) -> Vec<Value> {
    let stack = &mut frame(agent).stack;
    stack.split_off(stack.len() - count)
}

fn run_loop(agent: &mut Agent, base: usize) -> ExecutionResult {
    loop {
        // Collection runs only at this safepoint; between allocations every
        // reference stays stable.
        if agent.heap.should_collect() && !agent.options.disable_gc {
            heap_gc(agent);
            if agent.heap.should_collect() {
                let error = agent.throw_exception(
                    ExceptionType::RangeError,
                    "Allocation failed: heap budget exhausted",
                );
                match unwind(agent, base, error) {
                    Some(result) => return result,
                    None => continue,
                }
            }
        }

        let frame = frame(agent);
        let instruction = frame.executable.instructions[frame.ip];
        frame.ip += 1;

        match step(agent, base, instruction) {
            Ok(Step::Continue) => {}
            Ok(Step::Return(value)) => return ExecutionResult::Return(value),
            Ok(Step::Await(value)) => {
                let frame = agent.execution_stack.pop().unwrap();
                return ExecutionResult::Await {
                    vm: SuspendedVm { frame },
                    awaited_value: value,
                };
            }
            Ok(Step::Yield(value)) => {
                let frame = agent.execution_stack.pop().unwrap();
                return ExecutionResult::Yield {
                    vm: SuspendedVm { frame },
                    yielded_value: value,
                };
            }
            Err(error) => {
                if let Some(result) = unwind(agent, base, error) {
                    return result;
                }
            }
        }
    }
}

/// Unwinds frames until a handler catches the exception or the activation
/// base is reached. Active iterators get their `return()` cleanup on the
/// way out; secondary errors lose to the original exception.
fn unwind(agent: &mut Agent, base: usize, error: JsError) -> Option<ExecutionResult> {
    loop {
        if agent.execution_stack.len() == base {
            return Some(ExecutionResult::Throw(error));
        }
        let top = frame(agent);
        if let Some(handler) = top.handlers.pop() {
            let to_close = top.iterators.split_off(handler.iterators_len as usize);
            top.for_in.truncate(handler.for_in_len as usize);
            top.stack.truncate(handler.stack_len as usize);
            top.ip = handler.catch_ip as usize;
            for record in to_close.iter().rev() {
                let _ = iterator_close(agent, record, true);
            }
            push(agent, error.value());
            return None;
        }
        let to_close = std::mem::take(&mut top.iterators);
        agent.execution_stack.pop();
        for record in to_close.iter().rev() {
            let _ = iterator_close(agent, record, true);
        }
    }
}

fn constant_to_value(agent: &mut Agent, constant: &Constant) -> Value {
    match constant {
        Constant::Undefined => Value::Undefined,
        Constant::Null => Value::Null,
        Constant::Boolean(b) => Value::Boolean(*b),
        Constant::Integer(i) => Value::Integer(*i),
        Constant::Float(f) => Value::Float(*f),
        Constant::String(units) => {
            agent.create_string_value(StringHeapData::from_units(units.to_vec()))
        }
    }
}

fn environment_with_binding(
    agent: &Agent,
    mut environment: Option<Environment>,
    name: &str,
) -> Option<Environment> {
    while let Some(env) = environment {
        if agent.heap[env].bindings.contains_key(name) {
            return Some(env);
        }
        environment = agent.heap[env].parent;
    }
    None
}

fn load_scope(agent: &mut Agent, name: &str) -> JsResult<Value> {
    let environment = frame(agent).environment;
    if let Some(env) = environment_with_binding(agent, environment, name) {
        return Ok(agent.heap[env].bindings[name].value);
    }
    let global = Value::Object(agent.global_object());
    let key = PropertyKey::from_str(name);
    if has_property(agent, global, &key) {
        return get_value(agent, global, &key);
    }
    Err(agent.throw_exception(
        ExceptionType::ReferenceError,
        format!("{name} is not defined"),
    ))
}

fn resolve_scope_soft(agent: &mut Agent, name: &str) -> JsResult<Option<Value>> {
    let environment = frame(agent).environment;
    if let Some(env) = environment_with_binding(agent, environment, name) {
        return Ok(Some(agent.heap[env].bindings[name].value));
    }
    let global = Value::Object(agent.global_object());
    let key = PropertyKey::from_str(name);
    if has_property(agent, global, &key) {
        return get_value(agent, global, &key).map(Some);
    }
    Ok(None)
}

fn store_scope(agent: &mut Agent, name: &str, value: Value) -> JsResult<()> {
    let environment = frame(agent).environment;
    if let Some(env) = environment_with_binding(agent, environment, name) {
        let binding = agent.heap[env].bindings.get_mut(name).unwrap();
        if !binding.mutable && binding.initialized {
            return Err(
                agent.throw_exception(ExceptionType::TypeError, "Assignment to constant variable.")
            );
        }
        let binding = agent.heap[env].bindings.get_mut(name).unwrap();
        binding.value = value;
        binding.initialized = true;
        return Ok(());
    }
    // Unresolved names write through to the global object.
    let global = Value::Object(agent.global_object());
    set_value(agent, global, &PropertyKey::from_str(name), value)
}

fn collect_for_in_keys(agent: &mut Agent, value: Value) -> Vec<Box<str>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut keys: Vec<Box<str>> = Vec::new();
    let mut current = value;
    loop {
        if !current.is_object() {
            break;
        }
        for (key, enumerable) in own_enumerable_keys(agent, current) {
            let text = match &key {
                PropertyKey::Integer(index) => index.to_string(),
                PropertyKey::String(name) => name.to_string(),
                PropertyKey::Symbol(_) => continue,
            };
            if seen.insert(text.clone()) && enumerable {
                keys.push(text.into_boxed_str());
            }
        }
        match internal_prototype(agent, current) {
            Some(prototype) => current = prototype,
            None => break,
        }
    }
    keys
}

/// JavaScript addition: string concatenation when either primitive operand
/// is a string, numeric addition otherwise.
fn add_values(agent: &mut Agent, lhs: Value, rhs: Value) -> JsResult<Value> {
    if let (Value::Integer(a), Value::Integer(b)) = (lhs, rhs) {
        return Ok(match a.checked_add(b) {
            Some(sum) => Value::Integer(sum),
            None => Value::from_f64(f64::from(a) + f64::from(b)),
        });
    }
    let lp = to_primitive(agent, lhs, PreferredType::Number)?;
    let rp = to_primitive(agent, rhs, PreferredType::Number)?;
    if lp.is_string() || rp.is_string() {
        let Value::String(a) = to_string_value(agent, lp)? else {
            unreachable!()
        };
        let Value::String(b) = to_string_value(agent, rp)? else {
            unreachable!()
        };
        let joined = agent.heap[a].concat(&agent.heap[b]);
        return Ok(agent.create_string_value(joined));
    }
    let a = to_number(agent, lp)?;
    let b = to_number(agent, rp)?;
    Ok(Value::from_f64(a + b))
}

fn numeric_binop(agent: &mut Agent, opcode: Opcode, lhs: Value, rhs: Value) -> JsResult<Value> {
    if let (Value::Integer(a), Value::Integer(b)) = (lhs, rhs) {
        match opcode {
            Opcode::Sub => {
                if let Some(result) = a.checked_sub(b) {
                    return Ok(Value::Integer(result));
                }
            }
            Opcode::Mul => {
                if let Some(result) = a.checked_mul(b) {
                    return Ok(Value::Integer(result));
                }
            }
            _ => {}
        }
    }
    let a = to_number(agent, lhs)?;
    let b = to_number(agent, rhs)?;
    let result = match opcode {
        Opcode::Sub => a - b,
        Opcode::Mul => a * b,
        Opcode::Div => a / b,
        Opcode::Mod => a % b,
        _ => unreachable!(),
    };
    Ok(Value::from_f64(result))
}

fn create_closure(agent: &mut Agent, template: Rc<FunctionTemplate>) -> Value {
    let environment = frame(agent).environment;
    let captured_this = if template.is_arrow {
        Some(frame(agent).this_value)
    } else {
        None
    };
    let has_prototype = !template.is_arrow && !template.is_async && !template.is_generator;
    let function = agent.heap.create(ScriptFunctionHeapData {
        template,
        environment,
        captured_this,
        prototype: None,
        object_index: None,
    });
    if has_prototype {
        let object_prototype = agent.intrinsics().object_prototype;
        let prototype = agent
            .heap
            .create(ObjectHeapData::new(Some(Value::Object(object_prototype))));
        agent.heap[prototype].properties.insert(
            PropertyKey::from_str("constructor"),
            PropertyDescriptor {
                value: Some(Value::ScriptFunction(function)),
                writable: Some(true),
                get: None,
                set: None,
                enumerable: Some(false),
                configurable: Some(true),
            },
        );
        agent.heap[function].prototype = Some(Value::Object(prototype));
    }
    Value::ScriptFunction(function)
}

fn dispatch_call(
    agent: &mut Agent,
    callee: Value,
    this: Value,
    args: Vec<Value>,
) -> JsResult<Step> {
    if agent.execution_stack.len() >= MAX_CALL_STACK_DEPTH {
        return Err(agent.throw_exception(
            ExceptionType::RangeError,
            "Maximum call stack size exceeded",
        ));
    }
    match callee {
        Value::ScriptFunction(function) => {
            let template = agent[function].template.clone();
            if template.is_async {
                let promise = async_function_call(agent, function, this, &args)?;
                push(agent, promise);
            } else if template.is_generator {
                let generator = generator_function_call(agent, function, this, &args)?;
                push(agent, generator);
            } else {
                // Grow the frame stack in place; no host recursion.
                let frame = build_frame(agent, function, this, &args);
                agent.execution_stack.push(frame);
            }
            Ok(Step::Continue)
        }
        _ => match callee.into_function() {
            Some(function) => {
                let result = call_function(agent, function, this, &args)?;
                push(agent, result);
                Ok(Step::Continue)
            }
            None => {
                let display =
                    crate::ecmascript::abstract_operations::type_conversion::to_display_string(
                        agent, callee,
                    );
                Err(agent.throw_exception(
                    ExceptionType::TypeError,
                    format!("{display} is not a function"),
                ))
            }
        },
    }
}

fn step(agent: &mut Agent, base: usize, instruction: Instruction) -> JsResult<Step> {
    let Instruction { opcode, a, .. } = instruction;
    match opcode {
        Opcode::Pop => {
            pop(agent);
        }
        Opcode::Dup => {
            let top = *frame(agent).stack.last().expect("operand stack underflow");
            push(agent, top);
        }
        Opcode::LoadConstant => {
            let executable = frame(agent).executable.clone();
            let value = constant_to_value(agent, &executable.constants[a as usize]);
            push(agent, value);
        }
        Opcode::LoadLocal => {
            let value = frame(agent).locals[a as usize];
            push(agent, value);
        }
        Opcode::StoreLocal => {
            let value = pop(agent);
            frame(agent).locals[a as usize] = value;
        }
        Opcode::LoadScope => {
            let executable = frame(agent).executable.clone();
            let value = load_scope(agent, &executable.names[a as usize])?;
            push(agent, value);
        }
        Opcode::StoreScope => {
            let executable = frame(agent).executable.clone();
            let value = pop(agent);
            store_scope(agent, &executable.names[a as usize], value)?;
        }
        Opcode::DeclareGlobal => {
            let executable = frame(agent).executable.clone();
            let name = &executable.names[a as usize];
            let key = PropertyKey::from_str(name);
            let global = agent.global_object();
            if agent.heap[global].own_property(&key).is_none() {
                agent.heap[global].properties.insert(
                    key,
                    PropertyDescriptor {
                        value: Some(Value::Undefined),
                        writable: Some(true),
                        get: None,
                        set: None,
                        enumerable: Some(true),
                        configurable: Some(false),
                    },
                );
            }
        }
        Opcode::TypeofScope => {
            let executable = frame(agent).executable.clone();
            let resolved = resolve_scope_soft(agent, &executable.names[a as usize])?;
            let text = resolved.map_or("undefined", Value::type_of);
            let value = agent.create_string(text);
            push(agent, value);
        }
        Opcode::LoadThis => {
            let this = frame(agent).this_value;
            push(agent, this);
        }

        Opcode::Add => {
            let rhs = pop(agent);
            let lhs = pop(agent);
            let result = add_values(agent, lhs, rhs)?;
            push(agent, result);
        }
        Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod => {
            let rhs = pop(agent);
            let lhs = pop(agent);
            let result = numeric_binop(agent, opcode, lhs, rhs)?;
            push(agent, result);
        }
        Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge => {
            let rhs = pop(agent);
            let lhs = pop(agent);
            let ordering = abstract_relational_comparison(agent, lhs, rhs)?;
            let result = match ordering {
                None => false,
                Some(ordering) => match opcode {
                    Opcode::Lt => ordering.is_lt(),
                    Opcode::Le => ordering.is_le(),
                    Opcode::Gt => ordering.is_gt(),
                    Opcode::Ge => ordering.is_ge(),
                    _ => unreachable!(),
                },
            };
            push(agent, Value::Boolean(result));
        }
        Opcode::Eq => {
            let rhs = pop(agent);
            let lhs = pop(agent);
            let result = is_loosely_equal(agent, lhs, rhs)?;
            push(agent, Value::Boolean(result));
        }
        Opcode::StrictEq => {
            let rhs = pop(agent);
            let lhs = pop(agent);
            let result = is_strictly_equal(agent, lhs, rhs);
            push(agent, Value::Boolean(result));
        }
        Opcode::Not => {
            let value = pop(agent);
            let result = !to_boolean(agent, value);
            push(agent, Value::Boolean(result));
        }
        Opcode::Neg => {
            let value = pop(agent);
            let number = to_number(agent, value)?;
            push(agent, Value::from_f64(-number));
        }
        Opcode::Plus => {
            let value = pop(agent);
            let number = to_number(agent, value)?;
            push(agent, Value::from_f64(number));
        }
        Opcode::TypeofValue => {
            let value = pop(agent);
            let text = value.type_of();
            let result = agent.create_string(text);
            push(agent, result);
        }

        Opcode::Jump => {
            frame(agent).ip = a as usize;
        }
        Opcode::JumpIfFalse => {
            let value = pop(agent);
            if !to_boolean(agent, value) {
                frame(agent).ip = a as usize;
            }
        }
        Opcode::JumpIfTrue => {
            let value = pop(agent);
            if to_boolean(agent, value) {
                frame(agent).ip = a as usize;
            }
        }

        Opcode::Call => {
            let args = pop_args(agent, a as usize);
            let callee = pop(agent);
            return dispatch_call(agent, callee, Value::Undefined, args);
        }
        Opcode::CallMethod => {
            let args = pop_args(agent, a as usize);
            let callee = pop(agent);
            let this = pop(agent);
            return dispatch_call(agent, callee, this, args);
        }
        Opcode::New => {
            let args = pop_args(agent, a as usize);
            let callee = pop(agent);
            return construct(agent, callee, args);
        }
        Opcode::Return => {
            let mut done = agent.execution_stack.pop().expect("execution stack empty");
            let mut value = done.stack.pop().unwrap_or(Value::Undefined);
            if done.is_construct && !value.is_object() {
                value = done.this_value;
            }
            if agent.execution_stack.len() == base {
                return Ok(Step::Return(value));
            }
            push(agent, value);
        }

        Opcode::NewArray => {
            let elements = pop_args(agent, a as usize);
            let array = crate::ecmascript::builtins::array::create_array(agent, elements);
            push(agent, array);
        }
        Opcode::NewObject => {
            let prototype = Value::Object(agent.intrinsics().object_prototype);
            let object = Value::Object(agent.heap.create(ObjectHeapData::new(Some(prototype))));
            push(agent, object);
        }
        Opcode::GetProperty => {
            let executable = frame(agent).executable.clone();
            let key = PropertyKey::from_str(&executable.names[a as usize]);
            let object = pop(agent);
            let value = get_value(agent, object, &key)?;
            push(agent, value);
        }
        Opcode::SetProperty => {
            let executable = frame(agent).executable.clone();
            let key = PropertyKey::from_str(&executable.names[a as usize]);
            let value = pop(agent);
            let object = pop(agent);
            set_value(agent, object, &key, value)?;
            push(agent, value);
        }
        Opcode::GetPropertyComputed => {
            let key = pop(agent);
            let object = pop(agent);
            let key = to_property_key(agent, key)?;
            let value = get_value(agent, object, &key)?;
            push(agent, value);
        }
        Opcode::SetPropertyComputed => {
            let value = pop(agent);
            let key = pop(agent);
            let object = pop(agent);
            let key = to_property_key(agent, key)?;
            set_value(agent, object, &key, value)?;
            push(agent, value);
        }
        Opcode::DeleteProperty => {
            let executable = frame(agent).executable.clone();
            let key = PropertyKey::from_str(&executable.names[a as usize]);
            let object = pop(agent);
            let result = delete_property(agent, object, &key);
            push(agent, Value::Boolean(result));
        }
        Opcode::DeletePropertyComputed => {
            let key = pop(agent);
            let object = pop(agent);
            let key = to_property_key(agent, key)?;
            let result = delete_property(agent, object, &key);
            push(agent, Value::Boolean(result));
        }

        Opcode::CreateClosure | Opcode::CreateAsyncClosure => {
            let executable = frame(agent).executable.clone();
            let template = executable.templates[a as usize].clone();
            debug_assert!(opcode != Opcode::CreateAsyncClosure || template.is_async);
            let function = create_closure(agent, template);
            push(agent, function);
        }

        Opcode::Await => {
            let value = pop(agent);
            if agent.execution_stack.len() != base + 1 {
                return Err(agent.throw_exception(
                    ExceptionType::TypeError,
                    "await is only valid directly inside an async function",
                ));
            }
            return Ok(Step::Await(value));
        }
        Opcode::Yield => {
            let value = pop(agent);
            if agent.execution_stack.len() != base + 1 {
                return Err(agent.throw_exception(
                    ExceptionType::TypeError,
                    "yield is only valid directly inside a generator",
                ));
            }
            return Ok(Step::Yield(value));
        }
        Opcode::Throw => {
            let value = pop(agent);
            return Err(JsError::new(value));
        }
        Opcode::PushExceptionHandler => {
            let top = frame(agent);
            let entry = HandlerEntry {
                catch_ip: a,
                stack_len: top.stack.len() as u32,
                iterators_len: top.iterators.len() as u32,
                for_in_len: top.for_in.len() as u32,
            };
            top.handlers.push(entry);
        }
        Opcode::PopExceptionHandler => {
            frame(agent).handlers.pop();
        }

        Opcode::GetIterator | Opcode::GetAsyncIterator => {
            let value = pop(agent);
            let record = get_iterator(agent, value, opcode == Opcode::GetAsyncIterator)?;
            frame(agent).iterators.push(record);
        }
        Opcode::ForOfNext => {
            let record = *frame(agent).iterators.last().expect("iterator stack empty");
            let result = iterator_next(agent, &record)?;
            let (value, done) = unpack_iterator_result(agent, result)?;
            if done {
                let top = frame(agent);
                top.iterators.pop();
                top.ip = a as usize;
            } else {
                push(agent, value);
            }
        }
        Opcode::ForAwaitNext => {
            let record = *frame(agent).iterators.last().expect("iterator stack empty");
            let result = iterator_next(agent, &record)?;
            push(agent, result);
        }
        Opcode::IteratorUnpack => {
            let result = pop(agent);
            let (value, done) = unpack_iterator_result(agent, result)?;
            if done {
                let top = frame(agent);
                top.iterators.pop();
                top.ip = a as usize;
            } else {
                push(agent, value);
            }
        }
        Opcode::IteratorClose => {
            let record = frame(agent).iterators.pop().expect("iterator stack empty");
            iterator_close(agent, &record, false)?;
        }
        Opcode::ForInStart => {
            let value = pop(agent);
            let keys = collect_for_in_keys(agent, value);
            frame(agent).for_in.push(ForInRecord { keys, index: 0 });
        }
        Opcode::ForInNext => {
            let top = frame(agent);
            let record = top.for_in.last_mut().expect("for-in stack empty");
            if record.index < record.keys.len() {
                let key = record.keys[record.index].clone();
                record.index += 1;
                let value = agent.create_string(&key);
                push(agent, value);
            } else {
                let top = frame(agent);
                top.for_in.pop();
                top.ip = a as usize;
            }
        }
        Opcode::ForInEnd => {
            frame(agent).for_in.pop();
        }

        Opcode::StoreResult => {
            let value = pop(agent);
            frame(agent).result = value;
        }
        Opcode::LoadResult => {
            let value = frame(agent).result;
            push(agent, value);
        }
    }
    Ok(Step::Continue)
}

/// `new F(args)`: ordinary construct for script functions, direct behaviour
/// call for builtin constructors.
fn construct(agent: &mut Agent, callee: Value, args: Vec<Value>) -> JsResult<Step> {
    match callee {
        Value::ScriptFunction(function) => {
            let template = agent[function].template.clone();
            if template.is_async || template.is_generator || template.is_arrow {
                return Err(
                    agent.throw_exception(ExceptionType::TypeError, "callee is not a constructor")
                );
            }
            if agent.execution_stack.len() >= MAX_CALL_STACK_DEPTH {
                return Err(agent.throw_exception(
                    ExceptionType::RangeError,
                    "Maximum call stack size exceeded",
                ));
            }
            let prototype = match agent[function].prototype {
                Some(prototype) if prototype.is_object() => prototype,
                _ => Value::Object(agent.intrinsics().object_prototype),
            };
            let this = Value::Object(agent.heap.create(ObjectHeapData::new(Some(prototype))));
            let mut frame = build_frame(agent, function, this, &args);
            frame.is_construct = true;
            agent.execution_stack.push(frame);
            Ok(Step::Continue)
        }
        Value::BuiltinFunction(function) => {
            let behaviour = agent.heap[function].behaviour;
            let result = behaviour(agent, Value::Undefined, &args)?;
            push(agent, result);
            Ok(Step::Continue)
        }
        _ => Err(agent.throw_exception(ExceptionType::TypeError, "callee is not a constructor")),
    }
}
