// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::builtins::promise_abstract_operations::promise_jobs::new_promise_reaction_job;
use crate::ecmascript::execution::agent::Agent;
use crate::ecmascript::types::value::Value;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use crate::heap::{HeapSize, OrdinaryObject, PromiseReaction};

#[derive(Debug, Default)]
pub struct PromiseHeapData {
    pub(crate) object_index: Option<OrdinaryObject>,
    pub(crate) promise_state: PromiseState,
}

#[derive(Debug)]
pub(crate) enum PromiseState {
    Pending {
        fulfill_reactions: Option<PromiseReactions>,
        reject_reactions: Option<PromiseReactions>,
        /// True if the resolution of this promise already depends on another
        /// promise or thenable that has not settled yet.
        is_resolved: bool,
    },
    Fulfilled {
        promise_result: Value,
    },
    Rejected {
        promise_result: Value,
        is_handled: bool,
    },
}

impl Default for PromiseState {
    fn default() -> Self {
        Self::Pending {
            fulfill_reactions: None,
            reject_reactions: None,
            is_resolved: false,
        }
    }
}

#[derive(Debug)]
pub(crate) enum PromiseReactions {
    One(PromiseReaction),
    Many(Vec<PromiseReaction>),
}

impl PromiseReactions {
    pub(crate) fn push(&mut self, reaction: PromiseReaction) {
        match self {
            PromiseReactions::One(existing) => {
                let first = *existing;
                *self = PromiseReactions::Many(vec![first, reaction]);
            }
            PromiseReactions::Many(reactions) => reactions.push(reaction),
        }
    }

    /// TriggerPromiseReactions: queue a reaction job for every registered
    /// reaction, in registration order.
    pub(crate) fn trigger(&self, agent: &mut Agent, argument: Value) {
        match self {
            PromiseReactions::One(reaction) => {
                let job = new_promise_reaction_job(*reaction, argument);
                agent.enqueue_job(job);
            }
            PromiseReactions::Many(reactions) => {
                for reaction in reactions {
                    let job = new_promise_reaction_job(*reaction, argument);
                    agent.enqueue_job(job);
                }
            }
        }
    }
}

impl HeapMarkAndSweep for PromiseReactions {
    fn mark_values(&self, queues: &mut WorkQueues) {
        match self {
            PromiseReactions::One(reaction) => reaction.mark_values(queues),
            PromiseReactions::Many(reactions) => reactions.mark_values(queues),
        }
    }
}

impl HeapSize for PromiseHeapData {}

impl HeapMarkAndSweep for PromiseHeapData {
    fn mark_values(&self, queues: &mut WorkQueues) {
        let Self {
            object_index,
            promise_state,
        } = self;
        object_index.mark_values(queues);
        promise_state.mark_values(queues);
    }
}

impl HeapMarkAndSweep for PromiseState {
    fn mark_values(&self, queues: &mut WorkQueues) {
        match self {
            PromiseState::Pending {
                fulfill_reactions,
                reject_reactions,
                is_resolved: _,
            } => {
                fulfill_reactions.mark_values(queues);
                reject_reactions.mark_values(queues);
            }
            PromiseState::Fulfilled { promise_result }
            | PromiseState::Rejected {
                promise_result,
                is_handled: _,
            } => {
                promise_result.mark_values(queues);
            }
        }
    }
}
