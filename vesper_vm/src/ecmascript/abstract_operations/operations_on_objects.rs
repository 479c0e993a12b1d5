// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Operations on Objects: the object-model dispatch every interpreter
//! opcode and builtin goes through. Arrays, strings, functions, errors and
//! the promise machinery expose their specialized slots as virtual
//! properties here; everything else is the ordinary prototype-chain walk.

use super::type_conversion::{to_number, to_string_lossy};
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::function::Function;
use crate::ecmascript::types::object::{ObjectHeapData, PropertyDescriptor, PropertyKey};
use crate::ecmascript::types::value::Value;
use crate::heap::{CreateHeapData, OrdinaryObject};

/// The `[[Prototype]]` link of any value, for chain walks. Number and
/// boolean primitives have no prototype surface in this engine.
pub fn internal_prototype(agent: &Agent, value: Value) -> Option<Value> {
    let intrinsics = agent.intrinsics();
    match value {
        Value::Object(o) => agent.heap[o].prototype,
        Value::Array(_) => Some(Value::Object(intrinsics.array_prototype)),
        Value::String(_) => Some(Value::Object(intrinsics.string_prototype)),
        Value::Error(_) => Some(Value::Object(intrinsics.error_prototype)),
        Value::BuiltinFunction(_)
        | Value::ScriptFunction(_)
        | Value::ResolvingFunction(_)
        | Value::FinallyFunction(_)
        | Value::CollectorFunction(_) => Some(Value::Object(intrinsics.function_prototype)),
        Value::Promise(_) => Some(Value::Object(intrinsics.promise_prototype)),
        Value::Generator(_) => Some(Value::Object(intrinsics.generator_prototype)),
        Value::ArrayIterator(_) => Some(Value::Object(intrinsics.array_iterator_prototype)),
        _ => None,
    }
}

fn backing_object(agent: &Agent, value: Value) -> Option<OrdinaryObject> {
    match value {
        Value::Array(a) => agent.heap[a].object_index,
        Value::Error(e) => agent.heap[e].object_index,
        Value::BuiltinFunction(f) => agent.heap[f].object_index,
        Value::ScriptFunction(f) => agent.heap[f].object_index,
        Value::Promise(p) => agent.heap[p].object_index,
        Value::Generator(g) => agent.heap[g].object_index,
        Value::ArrayIterator(i) => agent.heap[i].object_index,
        _ => None,
    }
}

fn ensure_backing_object(agent: &mut Agent, value: Value) -> Option<OrdinaryObject> {
    if let Some(existing) = backing_object(agent, value) {
        return Some(existing);
    }
    let fresh = agent.heap.create(ObjectHeapData::new(None));
    match value {
        Value::Array(a) => agent.heap[a].object_index = Some(fresh),
        Value::Error(e) => agent.heap[e].object_index = Some(fresh),
        Value::BuiltinFunction(f) => agent.heap[f].object_index = Some(fresh),
        Value::ScriptFunction(f) => agent.heap[f].object_index = Some(fresh),
        Value::Promise(p) => agent.heap[p].object_index = Some(fresh),
        Value::Generator(g) => agent.heap[g].object_index = Some(fresh),
        Value::ArrayIterator(i) => agent.heap[i].object_index = Some(fresh),
        _ => return None,
    }
    Some(fresh)
}

/// The own property of `value` at `key`, synthesizing descriptors for
/// specialized slots (array elements and length, string units, function
/// name/length/prototype, error message/name/errors).
pub fn get_own_property(
    agent: &mut Agent,
    value: Value,
    key: &PropertyKey,
) -> Option<PropertyDescriptor> {
    // Explicitly written properties shadow the synthesized ones.
    if let Some(backing) = backing_object(agent, value) {
        if let Some(descriptor) = agent.heap[backing].own_property(key) {
            return Some(*descriptor);
        }
    }

    match value {
        Value::Object(o) => agent.heap[o].own_property(key).copied(),
        Value::Array(a) => match key {
            PropertyKey::String(name) if &**name == "length" => {
                let length = agent.heap[a].elements.len() as u32;
                Some(PropertyDescriptor::data(
                    Value::from_f64(f64::from(length)),
                    true,
                    false,
                    false,
                ))
            }
            PropertyKey::Integer(index) => {
                let elements = &agent.heap[a].elements;
                elements
                    .get(*index as usize)
                    .map(|element| PropertyDescriptor::data(*element, true, true, true))
            }
            _ => None,
        },
        Value::String(s) => match key {
            PropertyKey::String(name) if &**name == "length" => {
                let length = agent.heap[s].len() as u32;
                Some(PropertyDescriptor::data(
                    Value::from_f64(f64::from(length)),
                    false,
                    false,
                    false,
                ))
            }
            PropertyKey::Integer(index) => {
                let unit = agent.heap[s].char_at(*index as usize);
                if unit.is_empty() {
                    None
                } else {
                    let string = agent.create_string_value(unit);
                    Some(PropertyDescriptor::data(string, false, true, false))
                }
            }
            _ => None,
        },
        Value::Error(e) => match key {
            PropertyKey::String(name) if &**name == "message" => {
                let message = agent.heap[e].message.clone();
                let string = agent.create_string(&message);
                Some(PropertyDescriptor::data(string, true, false, true))
            }
            PropertyKey::String(name) if &**name == "name" => {
                let kind = agent.heap[e].kind;
                let string = agent.create_string(kind.as_str());
                Some(PropertyDescriptor::data(string, true, false, true))
            }
            PropertyKey::String(name) if &**name == "errors" => {
                let errors = agent.heap[e].errors.clone()?;
                let array = crate::ecmascript::builtins::array::create_array(agent, errors);
                Some(PropertyDescriptor::data(array, true, false, true))
            }
            _ => None,
        },
        Value::ScriptFunction(f) => match key {
            PropertyKey::String(name) if &**name == "prototype" => {
                let prototype = agent.heap[f].prototype?;
                Some(PropertyDescriptor::data(prototype, true, false, false))
            }
            PropertyKey::String(name) if &**name == "name" => {
                let text = agent.heap[f].template.name.clone();
                let string = agent.create_string(&text);
                Some(PropertyDescriptor::data(string, false, false, true))
            }
            PropertyKey::String(name) if &**name == "length" => {
                let length = agent.heap[f].template.param_count;
                Some(PropertyDescriptor::data(
                    Value::Integer(length as i32),
                    false,
                    false,
                    true,
                ))
            }
            _ => None,
        },
        Value::BuiltinFunction(f) => match key {
            PropertyKey::String(name) if &**name == "name" => {
                let text = agent.heap[f].name.clone();
                let string = agent.create_string(&text);
                Some(PropertyDescriptor::data(string, false, false, true))
            }
            PropertyKey::String(name) if &**name == "length" => {
                let length = agent.heap[f].length;
                Some(PropertyDescriptor::data(
                    Value::Integer(i32::from(length)),
                    false,
                    false,
                    true,
                ))
            }
            _ => None,
        },
        _ => None,
    }
}

/// `get(key)`: own properties, then the prototype chain; accessor getters
/// run against the original receiver. Undefined on a complete miss.
pub fn get_value(agent: &mut Agent, receiver: Value, key: &PropertyKey) -> JsResult<Value> {
    if receiver.is_undefined() || receiver.is_null() {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            format!(
                "Cannot read properties of {} (reading '{}')",
                if receiver.is_null() { "null" } else { "undefined" },
                key.as_display_string()
            ),
        ));
    }

    let mut current = receiver;
    loop {
        if let Some(descriptor) = get_own_property(agent, current, key) {
            if descriptor.is_accessor_descriptor() {
                return match descriptor.get {
                    Some(getter) => call_function(agent, getter, receiver, &[]),
                    None => Ok(Value::Undefined),
                };
            }
            return Ok(descriptor.value.unwrap_or(Value::Undefined));
        }
        match internal_prototype(agent, current) {
            Some(prototype) => current = prototype,
            None => return Ok(Value::Undefined),
        }
    }
}

/// `set(key, value, receiver)`: an ancestor accessor setter wins; otherwise
/// the write lands as an own data property on the receiver. Failures are
/// silent, as in sloppy-mode JavaScript.
pub fn set_value(agent: &mut Agent, receiver: Value, key: &PropertyKey, value: Value) -> JsResult<()> {
    if receiver.is_undefined() || receiver.is_null() {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            format!(
                "Cannot set properties of {} (setting '{}')",
                if receiver.is_null() { "null" } else { "undefined" },
                key.as_display_string()
            ),
        ));
    }

    let mut current = receiver;
    loop {
        if let Some(descriptor) = get_own_property(agent, current, key) {
            if descriptor.is_accessor_descriptor() {
                if let Some(setter) = descriptor.set {
                    call_function(agent, setter, receiver, &[value])?;
                }
                return Ok(());
            }
            // A non-writable data property anywhere on the chain blocks the
            // write; sloppy mode makes that silent.
            if !descriptor.is_writable() {
                return Ok(());
            }
            break;
        }
        match internal_prototype(agent, current) {
            Some(prototype) => current = prototype,
            None => break,
        }
    }

    write_own_data(agent, receiver, key, value)
}

fn write_own_data(
    agent: &mut Agent,
    receiver: Value,
    key: &PropertyKey,
    value: Value,
) -> JsResult<()> {
    match receiver {
        Value::Object(o) => {
            let data = &mut agent.heap[o];
            if let Some(existing) = data.properties.get_mut(key) {
                if existing.is_writable() {
                    existing.value = Some(value);
                }
            } else if data.extensible {
                data.properties
                    .insert(key.clone(), PropertyDescriptor::data(value, true, true, true));
            }
            Ok(())
        }
        Value::Array(a) => match key {
            PropertyKey::Integer(index) => {
                set_array_element(agent, a, *index, value);
                Ok(())
            }
            PropertyKey::String(name) if &**name == "length" => {
                set_array_length(agent, a, value)
            }
            _ => write_backing(agent, receiver, key, value),
        },
        Value::ScriptFunction(f) => {
            if let PropertyKey::String(name) = key {
                if &**name == "prototype" {
                    agent.heap[f].prototype = Some(value);
                    return Ok(());
                }
            }
            write_backing(agent, receiver, key, value)
        }
        Value::String(_)
        | Value::Integer(_)
        | Value::Float(_)
        | Value::Boolean(_)
        | Value::Symbol(_) => {
            // Writes through primitives are silently dropped.
            Ok(())
        }
        _ => write_backing(agent, receiver, key, value),
    }
}

fn write_backing(agent: &mut Agent, receiver: Value, key: &PropertyKey, value: Value) -> JsResult<()> {
    if let Some(backing) = ensure_backing_object(agent, receiver) {
        let data = &mut agent.heap[backing];
        if let Some(existing) = data.properties.get_mut(key) {
            if existing.is_writable() {
                existing.value = Some(value);
            }
        } else {
            data.properties
                .insert(key.clone(), PropertyDescriptor::data(value, true, true, true));
        }
    }
    Ok(())
}

/// Setting index *i* extends length to `max(length, i + 1)`; the fill is
/// holes, which read back as undefined.
pub(crate) fn set_array_element(
    agent: &mut Agent,
    array: crate::heap::Array,
    index: u32,
    value: Value,
) {
    let elements = &mut agent.heap[array].elements;
    let index = index as usize;
    if index < elements.len() {
        elements[index] = value;
    } else {
        elements.resize(index, Value::Undefined);
        elements.push(value);
    }
}

/// Setting length to *L* deletes indices ≥ *L*; a non-integer or negative
/// length is a RangeError.
pub(crate) fn set_array_length(
    agent: &mut Agent,
    array: crate::heap::Array,
    value: Value,
) -> JsResult<()> {
    let number = to_number(agent, value)?;
    if number < 0.0 || number.trunc() != number || !number.is_finite() || number > f64::from(u32::MAX)
    {
        return Err(agent.throw_exception(ExceptionType::RangeError, "Invalid array length"));
    }
    let length = number as usize;
    let elements = &mut agent.heap[array].elements;
    if length <= elements.len() {
        elements.truncate(length);
    } else {
        elements.resize(length, Value::Undefined);
    }
    Ok(())
}

/// `has(key)`: chain walk without invoking accessors.
pub fn has_property(agent: &mut Agent, value: Value, key: &PropertyKey) -> bool {
    let mut current = value;
    loop {
        if get_own_property(agent, current, key).is_some() {
            return true;
        }
        match internal_prototype(agent, current) {
            Some(prototype) => current = prototype,
            None => return false,
        }
    }
}

/// `delete(key)`: own-only; respects the configurable bit.
pub fn delete_property(agent: &mut Agent, value: Value, key: &PropertyKey) -> bool {
    if let Some(backing) = backing_object(agent, value) {
        let data = &mut agent.heap[backing];
        if let Some(descriptor) = data.properties.get(key) {
            if !descriptor.is_configurable() {
                return false;
            }
            data.properties.shift_remove(key);
            return true;
        }
    }
    match value {
        Value::Object(o) => {
            let data = &mut agent.heap[o];
            match data.properties.get(key) {
                Some(descriptor) if !descriptor.is_configurable() => false,
                Some(_) => {
                    data.properties.shift_remove(key);
                    true
                }
                None => true,
            }
        }
        Value::Array(a) => match key {
            PropertyKey::Integer(index) => {
                let elements = &mut agent.heap[a].elements;
                if (*index as usize) < elements.len() {
                    // Deleting leaves a hole; length is unchanged.
                    elements[*index as usize] = Value::Undefined;
                }
                true
            }
            PropertyKey::String(name) if &**name == "length" => false,
            _ => true,
        },
        _ => true,
    }
}

/// `[[DefineOwnProperty]]` with the descriptor-merging rules. Returns false
/// (without throwing) when the definition is rejected.
pub fn define_property(
    agent: &mut Agent,
    target: Value,
    key: PropertyKey,
    descriptor: PropertyDescriptor,
) -> JsResult<bool> {
    match target {
        Value::Object(o) => Ok(ordinary_define(agent, o, key, descriptor)),
        Value::Array(a) => match &key {
            PropertyKey::Integer(index) => {
                if let Some(value) = descriptor.value {
                    set_array_element(agent, a, *index, value);
                }
                Ok(true)
            }
            PropertyKey::String(name) if &**name == "length" => {
                if let Some(value) = descriptor.value {
                    set_array_length(agent, a, value)?;
                }
                Ok(true)
            }
            _ => {
                let backing = ensure_backing_object(agent, target).unwrap();
                Ok(ordinary_define(agent, backing, key, descriptor))
            }
        },
        _ if target.is_object() => match ensure_backing_object(agent, target) {
            Some(backing) => Ok(ordinary_define(agent, backing, key, descriptor)),
            None => Ok(false),
        },
        _ => Err(agent.throw_exception(
            ExceptionType::TypeError,
            "Object.defineProperty called on non-object",
        )),
    }
}

pub(crate) fn ordinary_define(
    agent: &mut Agent,
    object: OrdinaryObject,
    key: PropertyKey,
    descriptor: PropertyDescriptor,
) -> bool {
    let data = &mut agent.heap[object];
    let Some(current) = data.properties.get_mut(&key) else {
        if !data.extensible {
            return false;
        }
        // Complete the descriptor with defaults.
        let completed = if descriptor.is_accessor_descriptor() {
            PropertyDescriptor {
                value: None,
                writable: None,
                get: descriptor.get,
                set: descriptor.set,
                enumerable: Some(descriptor.enumerable.unwrap_or(false)),
                configurable: Some(descriptor.configurable.unwrap_or(false)),
            }
        } else {
            PropertyDescriptor {
                value: Some(descriptor.value.unwrap_or(Value::Undefined)),
                writable: Some(descriptor.writable.unwrap_or(false)),
                get: None,
                set: None,
                enumerable: Some(descriptor.enumerable.unwrap_or(false)),
                configurable: Some(descriptor.configurable.unwrap_or(false)),
            }
        };
        data.properties.insert(key, completed);
        return true;
    };

    // Merging rules for an existing property.
    if !current.is_configurable() {
        if descriptor.configurable == Some(true) {
            return false;
        }
        if descriptor
            .enumerable
            .is_some_and(|enumerable| enumerable != current.is_enumerable())
        {
            return false;
        }
        if descriptor.is_accessor_descriptor() != current.is_accessor_descriptor() {
            return false;
        }
        if current.is_data_descriptor() && !current.is_writable() {
            if descriptor.writable == Some(true) {
                return false;
            }
            if descriptor.value.is_some() && descriptor.value != current.value {
                return false;
            }
        }
        if current.is_accessor_descriptor()
            && ((descriptor.get.is_some() && descriptor.get != current.get)
                || (descriptor.set.is_some() && descriptor.set != current.set))
        {
            return false;
        }
    }

    // Flipping between data and accessor replaces the opposite fields.
    if descriptor.is_accessor_descriptor() && current.is_data_descriptor() {
        current.value = None;
        current.writable = None;
    } else if descriptor.is_data_descriptor() && current.is_accessor_descriptor() {
        current.get = None;
        current.set = None;
        if current.writable.is_none() {
            current.writable = Some(descriptor.writable.unwrap_or(false));
        }
    }
    if let Some(value) = descriptor.value {
        current.value = Some(value);
    }
    if let Some(writable) = descriptor.writable {
        current.writable = Some(writable);
    }
    if descriptor.get.is_some() {
        current.get = descriptor.get;
    }
    if descriptor.set.is_some() {
        current.set = descriptor.set;
    }
    if let Some(enumerable) = descriptor.enumerable {
        current.enumerable = Some(enumerable);
    }
    if let Some(configurable) = descriptor.configurable {
        current.configurable = Some(configurable);
    }
    true
}

/// CreateDataPropertyOrThrow without the throw: used to build result
/// objects.
pub fn create_data_property(agent: &mut Agent, object: Value, key: PropertyKey, value: Value) {
    match object {
        Value::Object(o) => {
            agent.heap[o]
                .properties
                .insert(key, PropertyDescriptor::data(value, true, true, true));
        }
        _ => {
            let _ = write_own_data(agent, object, &key, value);
        }
    }
}

/// Own keys with enumerability, for `for…in`. Synthesized non-enumerable
/// slots (length, name, …) are excluded.
pub(crate) fn own_enumerable_keys(agent: &mut Agent, value: Value) -> Vec<(PropertyKey, bool)> {
    let mut keys: Vec<(PropertyKey, bool)> = Vec::new();
    match value {
        Value::Object(o) => {
            for key in agent.heap[o].own_keys() {
                let enumerable = agent.heap[o]
                    .own_property(&key)
                    .is_some_and(PropertyDescriptor::is_enumerable);
                keys.push((key, enumerable));
            }
        }
        Value::Array(a) => {
            let length = agent.heap[a].elements.len() as u32;
            for index in 0..length {
                keys.push((PropertyKey::Integer(index), true));
            }
            if let Some(backing) = backing_object(agent, value) {
                for key in agent.heap[backing].own_keys() {
                    let enumerable = agent.heap[backing]
                        .own_property(&key)
                        .is_some_and(PropertyDescriptor::is_enumerable);
                    keys.push((key, enumerable));
                }
            }
        }
        _ if value.is_object() => {
            if let Some(backing) = backing_object(agent, value) {
                for key in agent.heap[backing].own_keys() {
                    let enumerable = agent.heap[backing]
                        .own_property(&key)
                        .is_some_and(PropertyDescriptor::is_enumerable);
                    keys.push((key, enumerable));
                }
            }
        }
        _ => {}
    }
    keys
}

/// IsCallable + Call in one step: invokes any callable value.
pub fn call_value(agent: &mut Agent, callee: Value, this: Value, args: &[Value]) -> JsResult<Value> {
    match callee.into_function() {
        Some(function) => call_function(agent, function, this, args),
        None => {
            let text = to_string_lossy(agent, callee).unwrap_or_else(|_| "value".to_string());
            Err(agent.throw_exception(
                ExceptionType::TypeError,
                format!("{text} is not a function"),
            ))
        }
    }
}

/// Call dispatch over every function kind.
pub fn call_function(
    agent: &mut Agent,
    function: Function,
    this: Value,
    args: &[Value],
) -> JsResult<Value> {
    match function {
        Function::BuiltinFunction(f) => {
            let behaviour = agent.heap[f].behaviour;
            behaviour(agent, this, args)
        }
        Function::ScriptFunction(f) => crate::engine::vm::call_script_function(agent, f, this, args),
        Function::ResolvingFunction(f) => {
            crate::ecmascript::builtins::promise_abstract_operations::promise_resolving_functions::call(
                agent, f, args,
            )
        }
        Function::FinallyFunction(f) => {
            crate::ecmascript::builtins::promise_abstract_operations::promise_finally_functions::call(
                agent, f, args,
            )
        }
        Function::CollectorFunction(f) => {
            crate::ecmascript::builtins::promise_abstract_operations::promise_collector_functions::call(
                agent, f, args,
            )
        }
    }
}

/// GetMethod: undefined/null count as absent; anything else must be
/// callable.
pub fn get_method(agent: &mut Agent, value: Value, key: &PropertyKey) -> JsResult<Option<Function>> {
    let method = get_value(agent, value, key)?;
    if method.is_undefined() || method.is_null() {
        return Ok(None);
    }
    match method.into_function() {
        Some(function) => Ok(Some(function)),
        None => Err(agent.throw_exception(
            ExceptionType::TypeError,
            format!("{} is not a function", key.as_display_string()),
        )),
    }
}
