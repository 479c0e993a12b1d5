// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ecmascript::builtins::promise::{reject_promise, resolve_promise};
use crate::ecmascript::execution::agent::Agent;
use crate::ecmascript::types::value::Value;
use crate::heap::Promise;

/// The internal resolve/reject pair for a promise the engine itself
/// controls (downstream promises of `then`, async function results,
/// combinator results). The user-facing resolving functions add the
/// already-resolved guard on top of this.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PromiseCapability {
    pub(crate) promise: Promise,
}

impl PromiseCapability {
    pub(crate) fn from_promise(promise: Promise) -> Self {
        Self { promise }
    }

    pub(crate) fn resolve(self, agent: &mut Agent, value: Value) {
        resolve_promise(agent, self.promise, value);
    }

    pub(crate) fn reject(self, agent: &mut Agent, reason: Value) {
        reject_promise(agent, self.promise, reason);
    }
}
