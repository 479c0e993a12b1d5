//! Collector soundness: everything reachable from a root survives a
//! collection, unreachable cells (cycles included) are reclaimed.

use vesper_vm::ecmascript::abstract_operations::type_conversion::to_display_string;
use vesper_vm::{Agent, RuntimeOptions};

fn eval(agent: &mut Agent, source: &str) -> vesper_vm::ecmascript::types::Value {
    vesper_vm::evaluate_script(agent, source)
        .expect("parse/compile failed")
        .expect("evaluation threw")
}

#[test]
fn reachable_cells_survive_collection() {
    let mut agent = Agent::new(RuntimeOptions::default());
    eval(
        &mut agent,
        "var keep = []; for (var i = 0; i < 50; i = i + 1) { keep.push('s' + i); }",
    );
    agent.collect_garbage();
    let last = eval(&mut agent, "keep[49]");
    assert_eq!(to_display_string(&agent, last), "s49");
    let length = eval(&mut agent, "keep.length");
    assert_eq!(to_display_string(&agent, length), "50");
}

#[test]
fn unreachable_cells_are_reclaimed() {
    let mut agent = Agent::new(RuntimeOptions::default());
    eval(
        &mut agent,
        "var garbage = null; \
         for (var i = 0; i < 500; i = i + 1) { \
           garbage = { payload: 'xxxxxxxxxxxxxxxx' + i, prev: garbage }; \
         } \
         garbage = null;",
    );
    let before = agent.heap_usage();
    agent.collect_garbage();
    let after = agent.heap_usage();
    assert!(
        after < before,
        "collection should reclaim the dropped chain ({after} >= {before})"
    );
}

#[test]
fn cyclic_graphs_are_collected_without_looping() {
    let mut agent = Agent::new(RuntimeOptions::default());
    eval(
        &mut agent,
        "var a = {}; var b = { other: a }; a.other = b; a.self = a; a = null; b = null;",
    );
    let before = agent.heap_usage();
    agent.collect_garbage();
    assert!(agent.heap_usage() < before);

    // A still-reachable cycle survives.
    eval(&mut agent, "var keep = {}; keep.self = keep;");
    agent.collect_garbage();
    let probe = eval(&mut agent, "keep.self === keep");
    assert_eq!(
        probe,
        vesper_vm::ecmascript::types::Value::Boolean(true)
    );
}

#[test]
fn collection_during_execution_preserves_frame_roots() {
    // A small budget forces collections at safepoints while frames are
    // live; locals and operand stacks must keep their values.
    let mut agent = Agent::new(RuntimeOptions {
        heap_budget: 60_000,
        ..RuntimeOptions::default()
    });
    let result = eval(
        &mut agent,
        "function work() { \
           var acc = ''; \
           for (var i = 0; i < 2000; i = i + 1) { \
             var tmp = { text: 'chunk-' + i }; \
             acc = tmp.text; \
           } \
           return acc; \
         } \
         work()",
    );
    assert_eq!(to_display_string(&agent, result), "chunk-1999");
}
