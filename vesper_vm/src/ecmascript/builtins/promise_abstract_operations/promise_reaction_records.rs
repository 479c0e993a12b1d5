// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::types::function::Function;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use crate::heap::{AwaitReaction, HeapSize, Promise};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PromiseReactionType {
    Fulfill,
    Reject,
}

/// What runs when the reaction fires: nothing (pass-through), a JavaScript
/// handler, or the resumption of a suspended async function.
#[derive(Debug, Clone, Copy)]
pub(crate) enum PromiseReactionHandler {
    Empty,
    JobCallback(Function),
    Await(AwaitReaction),
}

impl HeapMarkAndSweep for PromiseReactionHandler {
    fn mark_values(&self, queues: &mut WorkQueues) {
        match self {
            PromiseReactionHandler::Empty => {}
            PromiseReactionHandler::JobCallback(function) => function.mark_values(queues),
            PromiseReactionHandler::Await(reaction) => reaction.mark_values(queues),
        }
    }
}

/// A `(handler, downstream-promise)` pair queued on a promise's reaction
/// lists.
#[derive(Debug)]
pub struct PromiseReactionHeapData {
    pub(crate) capability: Option<Promise>,
    pub(crate) reaction_type: PromiseReactionType,
    pub(crate) handler: PromiseReactionHandler,
}

impl HeapSize for PromiseReactionHeapData {}

impl HeapMarkAndSweep for PromiseReactionHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            capability,
            reaction_type: _,
            handler,
        } = self;
        capability.mark_values(queues);
        handler.mark_values(queues);
    }
}
