// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::function::Function;
use super::value::{Symbol, Value};
use crate::heap::{
    HeapSize, OBJECT_HEADER_SIZE, PROPERTY_SIZE,
    heap_gc::{HeapMarkAndSweep, WorkQueues},
};
use indexmap::IndexMap;

pub(crate) type PropertyMap = IndexMap<PropertyKey, PropertyDescriptor, ahash::RandomState>;

/// Property keys. Canonical array-index strings are normalized into the
/// `Integer` variant so that `o[1]` and `o["1"]` address the same property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Integer(u32),
    String(Box<str>),
    Symbol(Symbol),
}

impl PropertyKey {
    pub fn from_str(name: &str) -> Self {
        // "0" is canonical, "01" and "-0" are not.
        if let Ok(index) = name.parse::<u32>() {
            if index.to_string() == name {
                return PropertyKey::Integer(index);
            }
        }
        PropertyKey::String(name.into())
    }

    pub fn as_display_string(&self) -> String {
        match self {
            PropertyKey::Integer(index) => index.to_string(),
            PropertyKey::String(name) => name.to_string(),
            PropertyKey::Symbol(symbol) => symbol.description().to_string(),
        }
    }
}

impl From<u32> for PropertyKey {
    fn from(value: u32) -> Self {
        PropertyKey::Integer(value)
    }
}

/// A data or accessor property. Stored descriptors are always complete: a
/// data property carries `value` and `writable`, an accessor carries at
/// least one of `get`/`set`, and both carry `enumerable` and `configurable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub get: Option<Function>,
    pub set: Option<Function>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl PropertyDescriptor {
    pub fn data(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            get: None,
            set: None,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    pub fn is_data_descriptor(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn is_enumerable(&self) -> bool {
        self.enumerable.unwrap_or(false)
    }

    pub fn is_configurable(&self) -> bool {
        self.configurable.unwrap_or(false)
    }

    pub fn is_writable(&self) -> bool {
        self.writable.unwrap_or(false)
    }
}

impl HeapMarkAndSweep for PropertyDescriptor {
    fn mark_values(&self, queues: &mut WorkQueues) {
        self.value.mark_values(queues);
        self.get.mark_values(queues);
        self.set.mark_values(queues);
    }
}

/// A prototype-chained property bag.
#[derive(Debug)]
pub struct ObjectHeapData {
    pub(crate) prototype: Option<Value>,
    pub(crate) extensible: bool,
    pub(crate) properties: PropertyMap,
}

impl ObjectHeapData {
    pub fn new(prototype: Option<Value>) -> Self {
        Self {
            prototype,
            extensible: true,
            properties: PropertyMap::default(),
        }
    }

    pub(crate) fn own_property(&self, key: &PropertyKey) -> Option<&PropertyDescriptor> {
        self.properties.get(key)
    }

    /// Own keys in ECMAScript order: integer-index keys first in numeric
    /// order, then string keys in insertion order. Symbols are not
    /// enumerated.
    pub(crate) fn own_keys(&self) -> Vec<PropertyKey> {
        let mut integers: Vec<u32> = self
            .properties
            .keys()
            .filter_map(|key| match key {
                PropertyKey::Integer(index) => Some(*index),
                _ => None,
            })
            .collect();
        integers.sort_unstable();
        let mut keys: Vec<PropertyKey> =
            integers.into_iter().map(PropertyKey::Integer).collect();
        keys.extend(self.properties.keys().filter_map(|key| match key {
            PropertyKey::String(name) => Some(PropertyKey::String(name.clone())),
            _ => None,
        }));
        keys
    }
}

impl HeapSize for ObjectHeapData {
    fn size_hint(&self) -> usize {
        OBJECT_HEADER_SIZE + self.properties.len() * PROPERTY_SIZE
    }
}

impl HeapMarkAndSweep for ObjectHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        self.prototype.mark_values(queues);
        for descriptor in self.properties.values() {
            descriptor.mark_values(queues);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonical_integer_keys() {
        assert_eq!(PropertyKey::from_str("0"), PropertyKey::Integer(0));
        assert_eq!(PropertyKey::from_str("42"), PropertyKey::Integer(42));
        assert_eq!(PropertyKey::from_str("01"), PropertyKey::String("01".into()));
        assert_eq!(PropertyKey::from_str("-1"), PropertyKey::String("-1".into()));
        assert_eq!(
            PropertyKey::from_str("length"),
            PropertyKey::String("length".into())
        );
    }

    #[test]
    fn own_keys_order() {
        let mut object = ObjectHeapData::new(None);
        object.properties.insert(
            PropertyKey::from_str("b"),
            PropertyDescriptor::data(Value::Integer(0), true, true, true),
        );
        object.properties.insert(
            PropertyKey::Integer(2),
            PropertyDescriptor::data(Value::Integer(0), true, true, true),
        );
        object.properties.insert(
            PropertyKey::from_str("a"),
            PropertyDescriptor::data(Value::Integer(0), true, true, true),
        );
        object.properties.insert(
            PropertyKey::Integer(0),
            PropertyDescriptor::data(Value::Integer(0), true, true, true),
        );
        let keys = object.own_keys();
        assert_eq!(
            keys,
            vec![
                PropertyKey::Integer(0),
                PropertyKey::Integer(2),
                PropertyKey::String("b".into()),
                PropertyKey::String("a".into()),
            ]
        );
    }
}
