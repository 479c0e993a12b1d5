// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::abstract_operations::type_conversion::to_number;
use crate::ecmascript::execution::agent::{Agent, JsResult};
use crate::ecmascript::types::value::Value;

fn unary_number(agent: &mut Agent, args: &[Value]) -> JsResult<f64> {
    to_number(agent, args.first().copied().unwrap_or(Value::Undefined))
}

pub(crate) fn math_floor(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let number = unary_number(agent, args)?;
    Ok(Value::from_f64(number.floor()))
}

pub(crate) fn math_ceil(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let number = unary_number(agent, args)?;
    Ok(Value::from_f64(number.ceil()))
}

pub(crate) fn math_abs(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let number = unary_number(agent, args)?;
    Ok(Value::from_f64(number.abs()))
}

pub(crate) fn math_sqrt(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let number = unary_number(agent, args)?;
    Ok(Value::from_f64(number.sqrt()))
}

pub(crate) fn math_pow(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let base = to_number(agent, args.first().copied().unwrap_or(Value::Undefined))?;
    let exponent = to_number(agent, args.get(1).copied().unwrap_or(Value::Undefined))?;
    Ok(Value::from_f64(base.powf(exponent)))
}

pub(crate) fn math_max(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let mut result = f64::NEG_INFINITY;
    for argument in args {
        let number = to_number(agent, *argument)?;
        if number.is_nan() {
            return Ok(Value::Float(f64::NAN));
        }
        if number > result {
            result = number;
        }
    }
    Ok(Value::from_f64(result))
}

pub(crate) fn math_min(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let mut result = f64::INFINITY;
    for argument in args {
        let number = to_number(agent, *argument)?;
        if number.is_nan() {
            return Ok(Value::Float(f64::NAN));
        }
        if number < result {
            result = number;
        }
    }
    Ok(Value::from_f64(result))
}

pub(crate) fn math_random(_agent: &mut Agent, _this: Value, _args: &[Value]) -> JsResult<Value> {
    Ok(Value::Float(rand::random::<f64>()))
}
