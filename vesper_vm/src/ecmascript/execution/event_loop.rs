// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-tier cooperative scheduler. Microtasks (promise reactions,
//! `queueMicrotask`) strictly precede macrotasks (`setTimeout`, host tasks);
//! within each queue ordering is FIFO and a task always runs to completion.

use crate::ecmascript::abstract_operations::operations_on_objects::call_function;
use crate::ecmascript::builtins::async_function;
use crate::ecmascript::builtins::promise_abstract_operations::promise_jobs::{
    PromiseReactionJob, PromiseResolveThenableJob,
};
use crate::ecmascript::execution::agent::{Agent, JsResult};
use crate::ecmascript::types::{Function, Value};
use crate::heap::AwaitReaction;
use crate::heap::heap_gc::{HeapMarkAndSweep, WorkQueues};
use std::collections::VecDeque;

#[derive(Debug)]
pub(crate) enum InnerJob {
    PromiseReaction(PromiseReactionJob),
    PromiseResolveThenable(PromiseResolveThenableJob),
    /// Starts the body of a freshly called async function.
    AsyncFunctionStart(AwaitReaction),
    /// A bare `queueMicrotask` callback.
    Callback(Function),
}

/// A microtask.
#[derive(Debug)]
pub struct Job {
    pub(crate) inner: InnerJob,
}

impl Job {
    pub(crate) fn run(self, agent: &mut Agent) -> JsResult<()> {
        match self.inner {
            InnerJob::PromiseReaction(job) => job.run(agent),
            InnerJob::PromiseResolveThenable(job) => job.run(agent),
            InnerJob::AsyncFunctionStart(reaction) => {
                async_function::start(agent, reaction);
                Ok(())
            }
            InnerJob::Callback(function) => {
                call_function(agent, function, Value::Undefined, &[]).map(|_| ())
            }
        }
    }
}

impl HeapMarkAndSweep for Job {
    fn mark_values(&self, queues: &mut WorkQueues) {
        match &self.inner {
            InnerJob::PromiseReaction(job) => job.mark_values(queues),
            InnerJob::PromiseResolveThenable(job) => job.mark_values(queues),
            InnerJob::AsyncFunctionStart(reaction) => reaction.mark_values(queues),
            InnerJob::Callback(function) => function.mark_values(queues),
        }
    }
}

#[derive(Debug)]
pub(crate) enum TaskInner {
    Callback(Function),
}

/// A macrotask.
#[derive(Debug)]
pub struct Task {
    pub(crate) inner: TaskInner,
}

impl Task {
    pub(crate) fn run(self, agent: &mut Agent) -> JsResult<()> {
        match self.inner {
            TaskInner::Callback(function) => {
                call_function(agent, function, Value::Undefined, &[]).map(|_| ())
            }
        }
    }
}

impl HeapMarkAndSweep for Task {
    fn mark_values(&self, queues: &mut WorkQueues) {
        match &self.inner {
            TaskInner::Callback(function) => function.mark_values(queues),
        }
    }
}

#[derive(Debug)]
pub struct EventLoop {
    pub(crate) microtasks: VecDeque<Job>,
    pub(crate) macrotasks: VecDeque<Task>,
    pub(crate) running: bool,
}

impl EventLoop {
    pub(crate) fn new() -> Self {
        Self {
            microtasks: VecDeque::new(),
            macrotasks: VecDeque::new(),
            running: false,
        }
    }
}

impl Agent {
    pub(crate) fn enqueue_job(&mut self, job: Job) {
        self.event_loop.microtasks.push_back(job);
    }

    pub(crate) fn enqueue_microtask_callback(&mut self, function: Function) {
        self.enqueue_job(Job {
            inner: InnerJob::Callback(function),
        });
    }

    pub(crate) fn enqueue_macrotask_callback(&mut self, function: Function) {
        self.event_loop.macrotasks.push_back(Task {
            inner: TaskInner::Callback(function),
        });
    }
}

impl HeapMarkAndSweep for EventLoop {
    fn mark_values(&self, queues: &mut WorkQueues) {
        for job in &self.microtasks {
            job.mark_values(queues);
        }
        for task in &self.macrotasks {
            task.mark_values(queues);
        }
    }
}
