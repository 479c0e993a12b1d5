// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environment records hold the bindings that closures capture. Only
//! captured locals live here; the rest stay in call-frame slots.

use crate::ecmascript::types::Value;
use crate::heap::{
    Environment, HeapSize,
    heap_gc::{HeapMarkAndSweep, WorkQueues},
};
use ahash::AHashMap;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Binding {
    pub(crate) value: Value,
    pub(crate) mutable: bool,
    /// An immutable binding may be written exactly once, by its declaration.
    pub(crate) initialized: bool,
}

#[derive(Debug)]
pub struct EnvironmentHeapData {
    pub(crate) parent: Option<Environment>,
    pub(crate) bindings: AHashMap<Box<str>, Binding>,
}

impl EnvironmentHeapData {
    pub(crate) fn new(parent: Option<Environment>) -> Self {
        Self {
            parent,
            bindings: AHashMap::default(),
        }
    }
}

impl HeapSize for EnvironmentHeapData {
    fn size_hint(&self) -> usize {
        core::mem::size_of::<Self>() + self.bindings.len() * 64
    }
}

impl HeapMarkAndSweep for EnvironmentHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        self.parent.mark_values(queues);
        for binding in self.bindings.values() {
            binding.value.mark_values(queues);
        }
    }
}
