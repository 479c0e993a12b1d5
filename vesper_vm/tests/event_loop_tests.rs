//! Scheduler ordering guarantees: microtasks strictly precede macrotasks,
//! FIFO within each queue, and queues survive a task that throws.

use vesper_vm::ecmascript::abstract_operations::type_conversion::to_display_string;
use vesper_vm::{Agent, RuntimeOptions};

fn agent() -> Agent {
    Agent::new(RuntimeOptions::default())
}

#[test]
fn microtasks_run_before_the_next_macrotask() {
    let mut agent = agent();
    // T1, M1, T2 are queued in that order; T1 queues M2 while running.
    vesper_vm::evaluate_script(
        &mut agent,
        "var log = []; \
         setTimeout(function () { log.push('t1'); queueMicrotask(function () { log.push('m2'); }); }); \
         queueMicrotask(function () { log.push('m1'); }); \
         setTimeout(function () { log.push('t2'); });",
    )
    .unwrap()
    .unwrap();
    let log = agent.get_global("log").unwrap();
    assert_eq!(to_display_string(&agent, log), "[ m1, t1, m2, t2 ]");
}

#[test]
fn microtasks_queued_during_a_drain_run_in_the_same_drain() {
    let mut agent = agent();
    vesper_vm::evaluate_script(
        &mut agent,
        "var log = []; \
         setTimeout(function () { log.push('task'); }); \
         queueMicrotask(function () { \
           log.push('a'); \
           queueMicrotask(function () { log.push('b'); }); \
         });",
    )
    .unwrap()
    .unwrap();
    let log = agent.get_global("log").unwrap();
    assert_eq!(to_display_string(&agent, log), "[ a, b, task ]");
}

#[test]
fn queues_are_retained_when_a_task_throws() {
    let mut agent = agent();
    let program = vesper_parser::parse(
        "var log = []; \
         setTimeout(function () { log.push(1); throw 'x'; }); \
         setTimeout(function () { log.push(2); });",
    )
    .unwrap();
    let executable = vesper_vm::compile(&program).unwrap();
    vesper_vm::execute(&mut agent, executable).unwrap();

    // The first run ends with the task's exception.
    let error = agent.run_event_loop().unwrap_err();
    assert_eq!(to_display_string(&agent, error.value()), "x");
    assert!(agent.has_pending_tasks());

    // A subsequent run picks up the remaining task.
    agent.run_event_loop().unwrap();
    let log = agent.get_global("log").unwrap();
    assert_eq!(to_display_string(&agent, log), "[ 1, 2 ]");
}

#[test]
fn promise_reactions_run_in_registration_order() {
    let mut agent = agent();
    vesper_vm::evaluate_script(
        &mut agent,
        "var log = []; \
         var p = Promise.resolve('v'); \
         p.then(function () { log.push('first'); }); \
         p.then(function () { log.push('second'); });",
    )
    .unwrap()
    .unwrap();
    let log = agent.get_global("log").unwrap();
    assert_eq!(to_display_string(&agent, log), "[ first, second ]");
}
