// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::abstract_operations::operations_on_objects::ordinary_define;
use crate::ecmascript::execution::agent::Agent;
use crate::ecmascript::types::function::{Behaviour, BuiltinFunctionHeapData};
use crate::ecmascript::types::object::{PropertyDescriptor, PropertyKey};
use crate::ecmascript::types::value::Value;
use crate::heap::{BuiltinFunction, CreateHeapData, OrdinaryObject};

/// Allocates a native function cell.
pub fn create_builtin_function(
    agent: &mut Agent,
    behaviour: Behaviour,
    name: &str,
    length: u8,
) -> BuiltinFunction {
    agent.heap.create(BuiltinFunctionHeapData {
        behaviour,
        name: name.into(),
        length,
        object_index: None,
    })
}

/// Defines a method-style property: writable and configurable, not
/// enumerable, matching how the standard builtins hang off prototypes.
pub fn define_builtin_function(
    agent: &mut Agent,
    object: OrdinaryObject,
    name: &str,
    length: u8,
    behaviour: Behaviour,
) -> BuiltinFunction {
    let function = create_builtin_function(agent, behaviour, name, length);
    define_builtin_property(agent, object, PropertyKey::from_str(name), Value::BuiltinFunction(function));
    function
}

pub fn define_builtin_property(
    agent: &mut Agent,
    object: OrdinaryObject,
    key: PropertyKey,
    value: Value,
) {
    ordinary_define(
        agent,
        object,
        key,
        PropertyDescriptor {
            value: Some(value),
            writable: Some(true),
            get: None,
            set: None,
            enumerable: Some(false),
            configurable: Some(true),
        },
    );
}
