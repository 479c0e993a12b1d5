// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Testing and Comparison abstract operations: SameValue, strict and
//! abstract equality, and the relational comparison.

use super::type_conversion::{PreferredType, to_number, to_primitive};
use crate::ecmascript::execution::agent::{Agent, JsResult};
use crate::ecmascript::types::value::Value;

fn as_number(value: Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(f64::from(i)),
        Value::Float(f) => Some(f),
        _ => None,
    }
}

/// SameValue: distinguishes ±0, equates NaN with itself.
pub fn same_value(agent: &Agent, x: Value, y: Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(x), as_number(y)) {
        if a.is_nan() && b.is_nan() {
            return true;
        }
        return a == b && a.is_sign_negative() == b.is_sign_negative();
    }
    same_non_numeric(agent, x, y)
}

/// IsStrictlyEqual (`===`): NaN is unequal to itself, +0 equals -0.
pub fn is_strictly_equal(agent: &Agent, x: Value, y: Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(x), as_number(y)) {
        return a == b;
    }
    same_non_numeric(agent, x, y)
}

fn same_non_numeric(agent: &Agent, x: Value, y: Value) -> bool {
    match (x, y) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Symbol(a), Value::Symbol(b)) => a == b,
        // String equality is by code-unit content, not handle identity.
        (Value::String(a), Value::String(b)) => {
            a == b || agent.heap[a].units() == agent.heap[b].units()
        }
        // Everything else compares by heap identity.
        _ => x == y,
    }
}

/// IsLooselyEqual (`==`) per the abstract equality coercion table.
pub fn is_loosely_equal(agent: &mut Agent, x: Value, y: Value) -> JsResult<bool> {
    // Same-type comparisons defer to strict equality.
    let same_type = match (x, y) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(_), Value::Boolean(_))
        | (Value::String(_), Value::String(_))
        | (Value::Symbol(_), Value::Symbol(_)) => true,
        _ if as_number(x).is_some() && as_number(y).is_some() => true,
        _ => x.is_object() && y.is_object(),
    };
    if same_type {
        return Ok(is_strictly_equal(agent, x, y));
    }

    match (x, y) {
        (Value::Undefined, Value::Null) | (Value::Null, Value::Undefined) => Ok(true),
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => Ok(false),
        // A boolean coerces to a number first.
        (Value::Boolean(_), _) => {
            let n = to_number(agent, x)?;
            is_loosely_equal(agent, Value::from_f64(n), y)
        }
        (_, Value::Boolean(_)) => {
            let n = to_number(agent, y)?;
            is_loosely_equal(agent, x, Value::from_f64(n))
        }
        // Number compared to string: the string becomes a number.
        (Value::Integer(_) | Value::Float(_), Value::String(_)) => {
            let n = to_number(agent, y)?;
            Ok(as_number(x).unwrap() == n)
        }
        (Value::String(_), Value::Integer(_) | Value::Float(_)) => {
            let n = to_number(agent, x)?;
            Ok(n == as_number(y).unwrap())
        }
        // Object compared to primitive: the object is coerced first.
        _ if x.is_object() => {
            let primitive = to_primitive(agent, x, PreferredType::Number)?;
            is_loosely_equal(agent, primitive, y)
        }
        _ if y.is_object() => {
            let primitive = to_primitive(agent, y, PreferredType::Number)?;
            is_loosely_equal(agent, x, primitive)
        }
        _ => Ok(false),
    }
}

/// IsLessThan and friends. `None` means an operand was NaN, which makes
/// every relational comparison false.
pub fn abstract_relational_comparison(
    agent: &mut Agent,
    x: Value,
    y: Value,
) -> JsResult<Option<std::cmp::Ordering>> {
    let px = to_primitive(agent, x, PreferredType::Number)?;
    let py = to_primitive(agent, y, PreferredType::Number)?;
    if let (Value::String(a), Value::String(b)) = (px, py) {
        let ordering = agent.heap[a].units().cmp(agent.heap[b].units());
        return Ok(Some(ordering));
    }
    let a = to_number(agent, px)?;
    let b = to_number(agent, py)?;
    if a.is_nan() || b.is_nan() {
        return Ok(None);
    }
    Ok(a.partial_cmp(&b))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ecmascript::execution::agent::RuntimeOptions;

    #[test]
    fn same_value_distinguishes_zeroes_and_equates_nan() {
        let agent = Agent::new(RuntimeOptions::default());
        assert!(same_value(&agent, Value::Float(f64::NAN), Value::Float(f64::NAN)));
        assert!(!same_value(&agent, Value::Float(0.0), Value::Float(-0.0)));
        assert!(same_value(&agent, Value::Integer(0), Value::Float(0.0)));
    }

    #[test]
    fn strict_equality_on_numbers() {
        let agent = Agent::new(RuntimeOptions::default());
        assert!(!is_strictly_equal(
            &agent,
            Value::Float(f64::NAN),
            Value::Float(f64::NAN)
        ));
        assert!(is_strictly_equal(&agent, Value::Float(0.0), Value::Float(-0.0)));
        assert!(is_strictly_equal(&agent, Value::Integer(1), Value::Float(1.0)));
    }

    #[test]
    fn strict_equality_on_strings_is_by_content() {
        let mut agent = Agent::new(RuntimeOptions::default());
        let a = agent.create_string("abc");
        let b = agent.create_string("abc");
        let c = agent.create_string("abd");
        assert!(is_strictly_equal(&agent, a, b));
        assert!(!is_strictly_equal(&agent, a, c));
    }

    #[test]
    fn loose_equality_coercions() {
        let mut agent = Agent::new(RuntimeOptions::default());
        let one_string = agent.create_string("1");
        assert!(is_loosely_equal(&mut agent, Value::Integer(1), one_string).unwrap());
        assert!(is_loosely_equal(&mut agent, Value::Undefined, Value::Null).unwrap());
        assert!(
            !is_loosely_equal(&mut agent, Value::Integer(0), Value::Undefined).unwrap()
        );
        assert!(
            is_loosely_equal(&mut agent, Value::Boolean(true), Value::Integer(1)).unwrap()
        );
    }
}
