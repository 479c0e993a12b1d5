// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod promise_capability_records;
pub mod promise_collector_functions;
pub mod promise_finally_functions;
pub mod promise_jobs;
pub mod promise_reaction_records;
pub mod promise_resolving_functions;
