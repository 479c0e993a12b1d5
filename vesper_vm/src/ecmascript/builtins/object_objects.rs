// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::abstract_operations::operations_on_objects::{
    define_property, get_own_property, get_value, internal_prototype, own_enumerable_keys,
};
use crate::ecmascript::abstract_operations::type_conversion::{to_boolean, to_property_key};
use crate::ecmascript::builtins::array::create_array;
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::object::{ObjectHeapData, PropertyDescriptor, PropertyKey};
use crate::ecmascript::types::value::Value;
use crate::heap::CreateHeapData;

/// `Object(value)`: pass objects through, box nothing else (primitives map
/// to a fresh empty object).
pub(crate) fn object_constructor(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let value = args.first().copied().unwrap_or(Value::Undefined);
    if value.is_object() {
        return Ok(value);
    }
    let prototype = Some(Value::Object(agent.intrinsics().object_prototype));
    Ok(Value::Object(agent.heap.create(ObjectHeapData::new(prototype))))
}

/// Own enumerable string-keyed property names, in `own_keys` order.
pub(crate) fn object_keys(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let value = args.first().copied().unwrap_or(Value::Undefined);
    let mut names = Vec::new();
    for (key, enumerable) in own_enumerable_keys(agent, value) {
        if !enumerable {
            continue;
        }
        let text = match key {
            PropertyKey::Integer(index) => index.to_string(),
            PropertyKey::String(name) => name.to_string(),
            PropertyKey::Symbol(_) => continue,
        };
        names.push(text);
    }
    let elements = names
        .into_iter()
        .map(|name| agent.create_string(&name))
        .collect();
    Ok(create_array(agent, elements))
}

pub(crate) fn object_get_prototype_of(
    agent: &mut Agent,
    _this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let value = args.first().copied().unwrap_or(Value::Undefined);
    if !value.is_object() && !value.is_string() {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "Object.getPrototypeOf called on a non-object",
        ));
    }
    Ok(internal_prototype(agent, value).unwrap_or(Value::Null))
}

/// `Object.create(proto)`: property-descriptor bags are not supported.
pub(crate) fn object_create(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let prototype = args.first().copied().unwrap_or(Value::Undefined);
    let prototype = match prototype {
        Value::Null => None,
        value if value.is_object() => Some(value),
        _ => {
            return Err(agent.throw_exception(
                ExceptionType::TypeError,
                "Object prototype may only be an Object or null",
            ));
        }
    };
    Ok(Value::Object(agent.heap.create(ObjectHeapData::new(prototype))))
}

/// `Object.defineProperty(obj, key, descriptor)` with the full descriptor
/// merging rules; a rejected definition throws.
pub(crate) fn object_define_property(
    agent: &mut Agent,
    _this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let target = args.first().copied().unwrap_or(Value::Undefined);
    if !target.is_object() {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "Object.defineProperty called on a non-object",
        ));
    }
    let key = to_property_key(agent, args.get(1).copied().unwrap_or(Value::Undefined))?;
    let bag = args.get(2).copied().unwrap_or(Value::Undefined);
    if !bag.is_object() {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "Property description must be an object",
        ));
    }

    let mut descriptor = PropertyDescriptor::default();
    for (field, key_name) in [
        ("value", "value"),
        ("get", "get"),
        ("set", "set"),
        ("writable", "writable"),
        ("enumerable", "enumerable"),
        ("configurable", "configurable"),
    ] {
        let property_key = PropertyKey::from_str(key_name);
        if !crate::ecmascript::abstract_operations::operations_on_objects::has_property(
            agent,
            bag,
            &property_key,
        ) {
            continue;
        }
        let value = get_value(agent, bag, &property_key)?;
        match field {
            "value" => descriptor.value = Some(value),
            "get" => {
                descriptor.get = value.into_function();
                if descriptor.get.is_none() && !value.is_undefined() {
                    return Err(
                        agent.throw_exception(ExceptionType::TypeError, "Getter must be a function")
                    );
                }
            }
            "set" => {
                descriptor.set = value.into_function();
                if descriptor.set.is_none() && !value.is_undefined() {
                    return Err(
                        agent.throw_exception(ExceptionType::TypeError, "Setter must be a function")
                    );
                }
            }
            "writable" => descriptor.writable = Some(to_boolean(agent, value)),
            "enumerable" => descriptor.enumerable = Some(to_boolean(agent, value)),
            "configurable" => descriptor.configurable = Some(to_boolean(agent, value)),
            _ => unreachable!(),
        }
    }
    if descriptor.is_accessor_descriptor() && descriptor.is_data_descriptor() {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            "Property descriptors must not specify a value or be writable when a getter or setter has been specified",
        ));
    }

    if !define_property(agent, target, key.clone(), descriptor)? {
        return Err(agent.throw_exception(
            ExceptionType::TypeError,
            format!("Cannot redefine property: {}", key.as_display_string()),
        ));
    }
    Ok(target)
}

pub(crate) fn object_proto_to_string(
    agent: &mut Agent,
    _this: Value,
    _args: &[Value],
) -> JsResult<Value> {
    Ok(agent.create_string("[object Object]"))
}

pub(crate) fn object_proto_value_of(
    _agent: &mut Agent,
    this: Value,
    _args: &[Value],
) -> JsResult<Value> {
    Ok(this)
}

pub(crate) fn object_proto_has_own_property(
    agent: &mut Agent,
    this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let key = to_property_key(agent, args.first().copied().unwrap_or(Value::Undefined))?;
    Ok(Value::Boolean(get_own_property(agent, this, &key).is_some()))
}
