// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mark-and-sweep collection. Marking starts from the agent's roots (global
//! object, intrinsics, live call frames, event loop queues, explicit roots)
//! and traces `mark_values` transitively; the sweep vacates unmarked slots in
//! every arena. Cells are never moved, so handles stay valid across
//! collections.

pub(crate) use super::WorkQueues;
use super::{HeapBits, mark_pass, sweep_heap};
use crate::ecmascript::execution::agent::Agent;

/// The `referenced_cells` enumeration of a heap cell: pushes every handle the
/// value holds onto the mark queues.
pub(crate) trait HeapMarkAndSweep {
    fn mark_values(&self, queues: &mut WorkQueues);
}

impl<T: HeapMarkAndSweep> HeapMarkAndSweep for Option<T> {
    fn mark_values(&self, queues: &mut WorkQueues) {
        if let Some(value) = self {
            value.mark_values(queues);
        }
    }
}

impl<T: HeapMarkAndSweep> HeapMarkAndSweep for Vec<T> {
    fn mark_values(&self, queues: &mut WorkQueues) {
        for value in self {
            value.mark_values(queues);
        }
    }
}

impl<T: HeapMarkAndSweep> HeapMarkAndSweep for [T] {
    fn mark_values(&self, queues: &mut WorkQueues) {
        for value in self {
            value.mark_values(queues);
        }
    }
}

/// Runs a full collection cycle. Only called from safepoints; a mutator
/// holding a live reference must keep it reachable from a root across this
/// call.
pub(crate) fn heap_gc(agent: &mut Agent) {
    let mut queues = WorkQueues::default();
    let mut bits = HeapBits::new(&agent.heap);

    agent.mark_roots(&mut queues);
    // A cycle is safe: a cell already marked is not re-traced.
    while mark_pass(&agent.heap, &mut queues, &mut bits) {}

    sweep_heap(&mut agent.heap, &bits);
}
