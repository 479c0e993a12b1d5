// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::abstract_operations::operations_on_iterator_objects::{
    get_iterator, iterator_next, unpack_iterator_result,
};
use crate::ecmascript::abstract_operations::type_conversion::to_string_lossy;
use crate::ecmascript::execution::agent::{Agent, ExceptionType, JsResult};
use crate::ecmascript::types::value::Value;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use crate::heap::{CreateHeapData, HeapSize, OrdinaryObject};

/// An error object: a kind tag, a message, and (for AggregateError) the
/// collected reasons. Extra user properties land in `object_index`.
#[derive(Debug)]
pub struct ErrorHeapData {
    pub(crate) kind: ExceptionType,
    pub(crate) message: Box<str>,
    pub(crate) errors: Option<Vec<Value>>,
    pub(crate) object_index: Option<OrdinaryObject>,
}

impl ErrorHeapData {
    pub(crate) fn new(kind: ExceptionType, message: Box<str>) -> Self {
        Self {
            kind,
            message,
            errors: None,
            object_index: None,
        }
    }
}

impl HeapSize for ErrorHeapData {}

impl HeapMarkAndSweep for ErrorHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            kind: _,
            message: _,
            errors,
            object_index,
        } = self;
        errors.mark_values(queues);
        object_index.mark_values(queues);
    }
}

fn error_constructor_for(agent: &mut Agent, kind: ExceptionType, args: &[Value]) -> JsResult<Value> {
    let message = match args.first() {
        None | Some(Value::Undefined) => String::new(),
        Some(value) => to_string_lossy(agent, *value)?,
    };
    let error = agent
        .heap
        .create(ErrorHeapData::new(kind, message.into_boxed_str()));
    Ok(Value::Error(error))
}

macro_rules! error_constructors {
    ($(($fn_name: ident, $kind: ident),)+) => {
        $(pub(crate) fn $fn_name(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
            error_constructor_for(agent, ExceptionType::$kind, args)
        })+
    };
}

error_constructors! {
    (error_constructor, Error),
    (range_error_constructor, RangeError),
    (reference_error_constructor, ReferenceError),
    (syntax_error_constructor, SyntaxError),
    (type_error_constructor, TypeError),
}

/// `new AggregateError(errors, message)`: collects the reasons from any
/// iterable, in order.
pub(crate) fn aggregate_error_constructor(
    agent: &mut Agent,
    _this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let errors_arg = args.first().copied().unwrap_or(Value::Undefined);
    let message = match args.get(1) {
        None | Some(Value::Undefined) => String::new(),
        Some(value) => to_string_lossy(agent, *value)?,
    };
    let record = get_iterator(agent, errors_arg, false)?;
    let mut errors = Vec::new();
    loop {
        let result = iterator_next(agent, &record)?;
        let (value, done) = unpack_iterator_result(agent, result)?;
        if done {
            break;
        }
        errors.push(value);
    }
    Ok(new_aggregate_error(agent, errors, message.into_boxed_str()))
}

pub(crate) fn new_aggregate_error(agent: &mut Agent, errors: Vec<Value>, message: Box<str>) -> Value {
    let mut data = ErrorHeapData::new(ExceptionType::AggregateError, message);
    data.errors = Some(errors);
    Value::Error(agent.heap.create(data))
}
