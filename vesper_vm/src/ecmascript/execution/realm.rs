// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Intrinsic objects and the global surface. The prototype objects are
//! created empty before the agent exists and populated once it does.

use crate::ecmascript::builtins::builtin_function::{
    create_builtin_function, define_builtin_function, define_builtin_property,
};
use crate::ecmascript::builtins::{
    array, array_iterator, error, generator_objects, global_object, math_object, object_objects,
    promise, string_objects,
};
use crate::ecmascript::execution::agent::Agent;
use crate::ecmascript::types::function::Behaviour;
use crate::ecmascript::types::object::{ObjectHeapData, PropertyDescriptor, PropertyKey};
use crate::ecmascript::types::value::{Symbol, Value};
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use crate::heap::{BuiltinFunction, CreateHeapData, Heap, OrdinaryObject};

#[derive(Debug)]
pub(crate) struct Intrinsics {
    pub(crate) object_prototype: OrdinaryObject,
    pub(crate) function_prototype: OrdinaryObject,
    pub(crate) array_prototype: OrdinaryObject,
    pub(crate) string_prototype: OrdinaryObject,
    pub(crate) error_prototype: OrdinaryObject,
    pub(crate) promise_prototype: OrdinaryObject,
    pub(crate) generator_prototype: OrdinaryObject,
    pub(crate) iterator_prototype: OrdinaryObject,
    pub(crate) array_iterator_prototype: OrdinaryObject,
}

impl Intrinsics {
    pub(crate) fn create(heap: &mut Heap) -> Self {
        let object_prototype = heap.create(ObjectHeapData::new(None));
        let proto = |heap: &mut Heap| {
            heap.create(ObjectHeapData::new(Some(Value::Object(object_prototype))))
        };
        let function_prototype = proto(heap);
        let array_prototype = proto(heap);
        let string_prototype = proto(heap);
        let error_prototype = proto(heap);
        let promise_prototype = proto(heap);
        let iterator_prototype = proto(heap);
        let generator_prototype =
            heap.create(ObjectHeapData::new(Some(Value::Object(iterator_prototype))));
        let array_iterator_prototype =
            heap.create(ObjectHeapData::new(Some(Value::Object(iterator_prototype))));
        Self {
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            error_prototype,
            promise_prototype,
            generator_prototype,
            iterator_prototype,
            array_iterator_prototype,
        }
    }
}

impl HeapMarkAndSweep for Intrinsics {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            error_prototype,
            promise_prototype,
            generator_prototype,
            iterator_prototype,
            array_iterator_prototype,
        } = self;
        object_prototype.mark_values(queues);
        function_prototype.mark_values(queues);
        array_prototype.mark_values(queues);
        string_prototype.mark_values(queues);
        error_prototype.mark_values(queues);
        promise_prototype.mark_values(queues);
        generator_prototype.mark_values(queues);
        iterator_prototype.mark_values(queues);
        array_iterator_prototype.mark_values(queues);
    }
}

/// A constructor-style builtin: the function cell plus a backing object for
/// its static properties.
fn builtin_with_statics(
    agent: &mut Agent,
    behaviour: Behaviour,
    name: &str,
    length: u8,
) -> (BuiltinFunction, OrdinaryObject) {
    let function = create_builtin_function(agent, behaviour, name, length);
    let statics = agent.heap.create(ObjectHeapData::new(None));
    agent.heap[function].object_index = Some(statics);
    (function, statics)
}

fn define_frozen_property(agent: &mut Agent, object: OrdinaryObject, key: PropertyKey, value: Value) {
    agent.heap[object].properties.insert(
        key,
        PropertyDescriptor {
            value: Some(value),
            writable: Some(false),
            get: None,
            set: None,
            enumerable: Some(false),
            configurable: Some(false),
        },
    );
}

pub(crate) fn initialize_global_object(agent: &mut Agent) {
    let global = agent.global_object();
    let object_prototype = agent.intrinsics.object_prototype;
    let array_prototype = agent.intrinsics.array_prototype;
    let string_prototype = agent.intrinsics.string_prototype;
    let error_prototype = agent.intrinsics.error_prototype;
    let promise_prototype = agent.intrinsics.promise_prototype;
    let generator_prototype = agent.intrinsics.generator_prototype;
    let iterator_prototype = agent.intrinsics.iterator_prototype;
    let array_iterator_prototype = agent.intrinsics.array_iterator_prototype;

    // ### Object.prototype
    define_builtin_function(
        agent,
        object_prototype,
        "toString",
        0,
        object_objects::object_proto_to_string,
    );
    define_builtin_function(
        agent,
        object_prototype,
        "valueOf",
        0,
        object_objects::object_proto_value_of,
    );
    define_builtin_function(
        agent,
        object_prototype,
        "hasOwnProperty",
        1,
        object_objects::object_proto_has_own_property,
    );

    // ### Array.prototype
    define_builtin_function(agent, array_prototype, "push", 1, array::array_proto_push);
    define_builtin_function(agent, array_prototype, "pop", 0, array::array_proto_pop);
    define_builtin_function(agent, array_prototype, "at", 1, array::array_proto_at);
    define_builtin_function(
        agent,
        array_prototype,
        "indexOf",
        1,
        array::array_proto_index_of,
    );
    define_builtin_function(
        agent,
        array_prototype,
        "includes",
        1,
        array::array_proto_includes,
    );
    define_builtin_function(agent, array_prototype, "join", 1, array::array_proto_join);
    define_builtin_function(
        agent,
        array_prototype,
        "toString",
        0,
        array::array_proto_to_string,
    );
    define_builtin_function(agent, array_prototype, "slice", 2, array::array_proto_slice);
    define_builtin_function(
        agent,
        array_prototype,
        "findLast",
        1,
        array::array_proto_find_last,
    );
    define_builtin_function(
        agent,
        array_prototype,
        "findLastIndex",
        1,
        array::array_proto_find_last_index,
    );
    define_builtin_function(
        agent,
        array_prototype,
        "toReversed",
        0,
        array::array_proto_to_reversed,
    );
    define_builtin_function(
        agent,
        array_prototype,
        "toSorted",
        1,
        array::array_proto_to_sorted,
    );
    define_builtin_function(
        agent,
        array_prototype,
        "toSpliced",
        2,
        array::array_proto_to_spliced,
    );
    define_builtin_function(agent, array_prototype, "with", 2, array::array_proto_with);
    let values = define_builtin_function(
        agent,
        array_prototype,
        "values",
        0,
        array::array_proto_values,
    );
    define_builtin_property(
        agent,
        array_prototype,
        PropertyKey::Symbol(Symbol::Iterator),
        Value::BuiltinFunction(values),
    );

    // ### String.prototype
    define_builtin_function(
        agent,
        string_prototype,
        "charAt",
        1,
        string_objects::string_proto_char_at,
    );
    define_builtin_function(agent, string_prototype, "at", 1, string_objects::string_proto_at);
    define_builtin_function(
        agent,
        string_prototype,
        "charCodeAt",
        1,
        string_objects::string_proto_char_code_at,
    );
    define_builtin_function(
        agent,
        string_prototype,
        "indexOf",
        1,
        string_objects::string_proto_index_of,
    );
    define_builtin_function(
        agent,
        string_prototype,
        "includes",
        1,
        string_objects::string_proto_includes,
    );
    define_builtin_function(
        agent,
        string_prototype,
        "slice",
        2,
        string_objects::string_proto_slice,
    );
    define_builtin_function(
        agent,
        string_prototype,
        "isWellFormed",
        0,
        string_objects::string_proto_is_well_formed,
    );
    define_builtin_function(
        agent,
        string_prototype,
        "toWellFormed",
        0,
        string_objects::string_proto_to_well_formed,
    );

    // ### Iterator prototypes
    let self_iterator =
        create_builtin_function(agent, global_object::return_this, "[Symbol.iterator]", 0);
    define_builtin_property(
        agent,
        iterator_prototype,
        PropertyKey::Symbol(Symbol::Iterator),
        Value::BuiltinFunction(self_iterator),
    );
    define_builtin_function(
        agent,
        array_iterator_prototype,
        "next",
        0,
        array_iterator::array_iterator_proto_next,
    );

    // ### Generator.prototype
    define_builtin_function(
        agent,
        generator_prototype,
        "next",
        1,
        generator_objects::generator_proto_next,
    );
    define_builtin_function(
        agent,
        generator_prototype,
        "return",
        1,
        generator_objects::generator_proto_return,
    );
    let generator_self_iterator = create_builtin_function(
        agent,
        generator_objects::generator_proto_iterator,
        "[Symbol.iterator]",
        0,
    );
    define_builtin_property(
        agent,
        generator_prototype,
        PropertyKey::Symbol(Symbol::Iterator),
        Value::BuiltinFunction(generator_self_iterator),
    );

    // ### Error.prototype
    define_builtin_function(
        agent,
        error_prototype,
        "toString",
        0,
        error_proto_to_string_behaviour,
    );

    // ### Promise.prototype
    define_builtin_function(
        agent,
        promise_prototype,
        "then",
        2,
        promise::promise_proto_then,
    );
    define_builtin_function(
        agent,
        promise_prototype,
        "catch",
        1,
        promise::promise_proto_catch,
    );
    define_builtin_function(
        agent,
        promise_prototype,
        "finally",
        1,
        promise::promise_proto_finally,
    );

    // ### Global constructors
    let (object_constructor, object_statics) = builtin_with_statics(
        agent,
        object_objects::object_constructor,
        "Object",
        1,
    );
    define_builtin_function(agent, object_statics, "keys", 1, object_objects::object_keys);
    define_builtin_function(
        agent,
        object_statics,
        "getPrototypeOf",
        1,
        object_objects::object_get_prototype_of,
    );
    define_builtin_function(agent, object_statics, "create", 2, object_objects::object_create);
    define_builtin_function(
        agent,
        object_statics,
        "defineProperty",
        3,
        object_objects::object_define_property,
    );
    define_builtin_property(
        agent,
        object_statics,
        PropertyKey::from_str("prototype"),
        Value::Object(object_prototype),
    );
    define_builtin_property(
        agent,
        global,
        PropertyKey::from_str("Object"),
        Value::BuiltinFunction(object_constructor),
    );

    let (array_constructor, array_statics) =
        builtin_with_statics(agent, array::array_constructor, "Array", 1);
    define_builtin_function(agent, array_statics, "isArray", 1, array::array_is_array);
    define_builtin_property(
        agent,
        array_statics,
        PropertyKey::from_str("prototype"),
        Value::Object(array_prototype),
    );
    define_builtin_property(
        agent,
        global,
        PropertyKey::from_str("Array"),
        Value::BuiltinFunction(array_constructor),
    );

    let (promise_constructor, promise_statics) =
        builtin_with_statics(agent, promise::promise_constructor, "Promise", 1);
    define_builtin_function(
        agent,
        promise_statics,
        "resolve",
        1,
        promise::promise_static_resolve,
    );
    define_builtin_function(
        agent,
        promise_statics,
        "reject",
        1,
        promise::promise_static_reject,
    );
    define_builtin_function(agent, promise_statics, "all", 1, promise::promise_static_all);
    define_builtin_function(
        agent,
        promise_statics,
        "allSettled",
        1,
        promise::promise_static_all_settled,
    );
    define_builtin_function(agent, promise_statics, "any", 1, promise::promise_static_any);
    define_builtin_function(agent, promise_statics, "race", 1, promise::promise_static_race);
    define_builtin_function(
        agent,
        promise_statics,
        "withResolvers",
        0,
        promise::promise_static_with_resolvers,
    );
    define_builtin_property(
        agent,
        promise_statics,
        PropertyKey::from_str("prototype"),
        Value::Object(promise_prototype),
    );
    define_builtin_property(
        agent,
        global,
        PropertyKey::from_str("Promise"),
        Value::BuiltinFunction(promise_constructor),
    );

    for (name, behaviour) in [
        ("Error", error::error_constructor as Behaviour),
        ("TypeError", error::type_error_constructor),
        ("RangeError", error::range_error_constructor),
        ("ReferenceError", error::reference_error_constructor),
        ("SyntaxError", error::syntax_error_constructor),
        ("AggregateError", error::aggregate_error_constructor),
    ] {
        let (constructor, statics) = builtin_with_statics(agent, behaviour, name, 1);
        define_builtin_property(
            agent,
            statics,
            PropertyKey::from_str("prototype"),
            Value::Object(error_prototype),
        );
        define_builtin_property(
            agent,
            global,
            PropertyKey::from_str(name),
            Value::BuiltinFunction(constructor),
        );
    }

    // ### Namespaces
    let math = agent.heap.create(ObjectHeapData::new(Some(Value::Object(
        object_prototype,
    ))));
    define_builtin_function(agent, math, "floor", 1, math_object::math_floor);
    define_builtin_function(agent, math, "ceil", 1, math_object::math_ceil);
    define_builtin_function(agent, math, "abs", 1, math_object::math_abs);
    define_builtin_function(agent, math, "sqrt", 1, math_object::math_sqrt);
    define_builtin_function(agent, math, "pow", 2, math_object::math_pow);
    define_builtin_function(agent, math, "max", 2, math_object::math_max);
    define_builtin_function(agent, math, "min", 2, math_object::math_min);
    define_builtin_function(agent, math, "random", 0, math_object::math_random);
    define_builtin_property(agent, global, PropertyKey::from_str("Math"), Value::Object(math));

    let symbol_namespace = agent.heap.create(ObjectHeapData::new(Some(Value::Object(
        object_prototype,
    ))));
    define_frozen_property(
        agent,
        symbol_namespace,
        PropertyKey::from_str("iterator"),
        Value::Symbol(Symbol::Iterator),
    );
    define_frozen_property(
        agent,
        symbol_namespace,
        PropertyKey::from_str("asyncIterator"),
        Value::Symbol(Symbol::AsyncIterator),
    );
    define_builtin_property(
        agent,
        global,
        PropertyKey::from_str("Symbol"),
        Value::Object(symbol_namespace),
    );

    let console = agent.heap.create(ObjectHeapData::new(Some(Value::Object(
        object_prototype,
    ))));
    define_builtin_function(agent, console, "log", 1, global_object::global_print);
    define_builtin_property(
        agent,
        global,
        PropertyKey::from_str("console"),
        Value::Object(console),
    );

    // ### Global functions and values
    for (name, length, behaviour) in [
        ("print", 1u8, global_object::global_print as Behaviour),
        ("queueMicrotask", 1, global_object::global_queue_microtask),
        ("setTimeout", 2, global_object::global_set_timeout),
        ("String", 1, global_object::global_string),
        ("Number", 1, global_object::global_number),
        ("Boolean", 1, global_object::global_boolean),
    ] {
        let function = create_builtin_function(agent, behaviour, name, length);
        define_builtin_property(
            agent,
            global,
            PropertyKey::from_str(name),
            Value::BuiltinFunction(function),
        );
    }

    define_frozen_property(
        agent,
        global,
        PropertyKey::from_str("undefined"),
        Value::Undefined,
    );
    define_frozen_property(agent, global, PropertyKey::from_str("NaN"), Value::Float(f64::NAN));
    define_frozen_property(
        agent,
        global,
        PropertyKey::from_str("Infinity"),
        Value::Float(f64::INFINITY),
    );
    define_builtin_property(
        agent,
        global,
        PropertyKey::from_str("globalThis"),
        Value::Object(global),
    );
}

fn error_proto_to_string_behaviour(
    agent: &mut Agent,
    this: Value,
    _args: &[Value],
) -> crate::ecmascript::execution::agent::JsResult<Value> {
    match this {
        Value::Error(error) => {
            let data = &agent[error];
            let text = format!("{}: {}", data.kind.as_str(), data.message);
            Ok(agent.create_string(&text))
        }
        _ => Ok(agent.create_string("Error")),
    }
}
