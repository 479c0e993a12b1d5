// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod byte_compiler;
pub mod bytecode;
pub mod vm;

use crate::ecmascript::execution::agent::{Agent, JsResult};
use crate::ecmascript::types::Value;
use bytecode::Executable;
use std::rc::Rc;

/// Executes a compiled script against the agent's global scope. The success
/// value is the script's completion value; thrown values surface on the
/// error channel. The event loop is not driven here.
pub fn execute(agent: &mut Agent, executable: Rc<Executable>) -> JsResult<Value> {
    let frame = vm::CallFrame::for_script(executable);
    match vm::execute(agent, frame) {
        vm::ExecutionResult::Return(value) => Ok(value),
        vm::ExecutionResult::Throw(error) => Err(error),
        vm::ExecutionResult::Await { .. } | vm::ExecutionResult::Yield { .. } => {
            unreachable!("top-level scripts cannot suspend")
        }
    }
}
