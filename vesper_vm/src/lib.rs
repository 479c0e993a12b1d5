// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod ecmascript;
pub mod engine;
pub mod heap;

pub use ecmascript::execution::agent::{Agent, ExceptionType, JsError, JsResult, RuntimeOptions};
pub use engine::byte_compiler::{CompileError, compile};
pub use engine::bytecode::Executable;
pub use engine::execute;

use ecmascript::types::Value;
use std::rc::Rc;

/// Runs a source text through the whole pipeline — parse, compile, execute —
/// and then drains the event loop. The returned value is the script's
/// completion value.
pub fn evaluate_script(agent: &mut Agent, source: &str) -> Result<JsResult<Value>, String> {
    let program = vesper_parser::parse(source).map_err(|error| error.to_string())?;
    let executable: Rc<Executable> = compile(&program).map_err(|error| error.to_string())?;
    let result = execute(agent, executable);
    if result.is_ok() {
        if let Err(error) = agent.run_event_loop() {
            return Ok(Err(error));
        }
    }
    Ok(result)
}
