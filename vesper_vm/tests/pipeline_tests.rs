//! End-to-end runs through the whole pipeline: parse, compile, execute,
//! drain the event loop, then observe results through the global object.

use vesper_vm::ecmascript::abstract_operations::type_conversion::to_display_string;
use vesper_vm::ecmascript::types::Value;
use vesper_vm::{Agent, RuntimeOptions};

fn agent() -> Agent {
    Agent::new(RuntimeOptions::default())
}

fn eval(agent: &mut Agent, source: &str) -> Value {
    vesper_vm::evaluate_script(agent, source)
        .expect("parse/compile failed")
        .expect("evaluation threw")
}

fn eval_err(agent: &mut Agent, source: &str) -> Value {
    vesper_vm::evaluate_script(agent, source)
        .expect("parse/compile failed")
        .expect_err("evaluation should have thrown")
        .value()
}

fn global(agent: &mut Agent, name: &str) -> Value {
    agent.get_global(name).unwrap()
}

fn display(agent: &Agent, value: Value) -> String {
    to_display_string(agent, value)
}

#[test]
fn loop_accumulation() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var s=0; for (var i=0;i<5;i=i+1) { s=s+i; } s",
    );
    assert_eq!(result, Value::Integer(10));
}

#[test]
fn recursive_function_calls() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "function fib(n){ if(n<2) return n; return fib(n-1)+fib(n-2); } fib(10)",
    );
    assert_eq!(result, Value::Integer(55));
}

#[test]
fn promise_chaining_through_the_event_loop() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var r; Promise.resolve(1).then(v=>v+1).then(v=>v*10).then(v=>{ r = v; });",
    );
    assert_eq!(global(&mut agent, "r"), Value::Integer(20));
}

#[test]
fn async_functions_settle_their_promise() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var r; async function f(){ const a=await 10; const b=await 20; return a+b; } f().then(v=>{ r = v; });",
    );
    assert_eq!(global(&mut agent, "r"), Value::Integer(30));
}

#[test]
fn promise_any_rejects_with_an_aggregate_error() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var name; var reasons; \
         Promise.any([Promise.reject('a'), Promise.reject('b'), Promise.reject('c')]) \
           .catch(function (e) { name = e.name; reasons = e.errors.join(','); });",
    );
    let name = global(&mut agent, "name");
    assert_eq!(display(&agent, name), "AggregateError");
    let reasons = global(&mut agent, "reasons");
    assert_eq!(display(&agent, reasons), "a,b,c");
}

#[test]
fn to_sorted_returns_a_new_array() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var a=[3,1,2]; var b=a.toSorted(); [b[0], b[1], b[2], a[0], a[1], a[2]]",
    );
    assert_eq!(display(&agent, result), "[ 1, 2, 3, 3, 1, 2 ]");
}

#[test]
fn closures_share_their_captured_environment() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "function counter(start) { return function () { start = start + 1; return start; }; } \
         var c = counter(10); c(); c(); c()",
    );
    assert_eq!(result, Value::Integer(13));
}

#[test]
fn thrown_values_keep_their_identity() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var r; try { throw { code: 42 }; } catch (e) { r = e.code; } r",
    );
    assert_eq!(result, Value::Integer(42));
}

#[test]
fn uncaught_exceptions_surface_on_the_error_channel() {
    let mut agent = agent();
    let reason = eval_err(&mut agent, "throw 'boom';");
    assert_eq!(display(&agent, reason), "boom");
}

#[test]
fn reference_errors_at_execution_time() {
    let mut agent = agent();
    let reason = eval_err(&mut agent, "missing + 1;");
    assert_eq!(display(&agent, reason), "ReferenceError: missing is not defined");
}

#[test]
fn calling_a_non_function_is_a_type_error() {
    let mut agent = agent();
    let reason = eval_err(&mut agent, "var x = 1; x();");
    assert!(display(&agent, reason).starts_with("TypeError:"));
}

#[test]
fn const_assignment_is_a_type_error() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var r; function f() { const a = 1; try { a = 2; } catch (e) { r = e.name; } return a; } f()",
    );
    assert_eq!(result, Value::Integer(1));
    let name = global(&mut agent, "r");
    assert_eq!(display(&agent, name), "TypeError");
}

#[test]
fn for_in_iterates_own_and_inherited_enumerable_keys() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var proto = { a: 1 }; var obj = Object.create(proto); obj.b = 2; \
         var keys = []; for (var k in obj) { keys.push(k); } keys.join(',')",
    );
    assert_eq!(display(&agent, result), "b,a");
}

#[test]
fn for_of_runs_the_body_once_per_value_in_order() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var seen = []; for (var v of [10, 20, 30]) { seen.push(v); } seen.join('-')",
    );
    assert_eq!(display(&agent, result), "10-20-30");
}

#[test]
fn breaking_out_of_for_of_calls_iterator_return() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var closed = false; \
         var iterable = {}; \
         iterable[Symbol.iterator] = function () { \
           var i = 0; \
           return { \
             next: function () { i = i + 1; return { value: i, done: i > 5 }; }, \
             'return': function () { closed = true; return { done: true }; } \
           }; \
         }; \
         var seen = []; \
         for (var v of iterable) { seen.push(v); if (v === 2) { break; } } \
         [closed, seen.join(',')]",
    );
    assert_eq!(display(&agent, result), "[ true, 1,2 ]");
}

#[test]
fn an_exception_in_the_loop_body_also_closes_the_iterator() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var closed = false; \
         var iterable = {}; \
         iterable[Symbol.iterator] = function () { \
           var i = 0; \
           return { \
             next: function () { i = i + 1; return { value: i, done: false }; }, \
             'return': function () { closed = true; return { done: true }; } \
           }; \
         }; \
         try { for (var v of iterable) { throw 'stop'; } } catch (e) {} \
         closed",
    );
    assert_eq!(result, Value::Boolean(true));
}

#[test]
fn generators_suspend_and_resume_synchronously() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "function* g() { var x = yield 1; yield x + 1; } \
         var it = g(); \
         var a = it.next().value; \
         var b = it.next(41).value; \
         var c = it.next().done; \
         [a, b, c]",
    );
    assert_eq!(display(&agent, result), "[ 1, 42, true ]");
}

#[test]
fn generators_implement_the_iteration_protocol() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "function* upTo(n) { for (var i = 1; i <= n; i = i + 1) { yield i; } } \
         var total = 0; \
         for (var v of upTo(4)) { total = total + v; } \
         total",
    );
    assert_eq!(result, Value::Integer(10));
}

#[test]
fn async_locals_survive_suspension() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var r; \
         async function f() { \
           var a = 1; var b = 'x'; var c = [1, 2]; \
           var got = await 10; \
           r = (a === 1) && (b === 'x') && (c[0] === 1) && (got === 10); \
         } \
         f();",
    );
    assert_eq!(global(&mut agent, "r"), Value::Boolean(true));
}

#[test]
fn await_of_a_rejected_promise_throws_at_the_await_site() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var r; async function f() { try { await Promise.reject('bad'); } catch (e) { r = e; } } f();",
    );
    let caught = global(&mut agent, "r");
    assert_eq!(display(&agent, caught), "bad");
}

#[test]
fn for_await_settles_each_value() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var r = []; var done; \
         async function f() { \
           for await (var v of [Promise.resolve(1), 2, Promise.resolve(3)]) { r.push(v); } \
           done = true; \
         } \
         f();",
    );
    assert_eq!(global(&mut agent, "done"), Value::Boolean(true));
    let collected = global(&mut agent, "r");
    assert_eq!(display(&agent, collected), "[ 1, 2, 3 ]");
}

#[test]
fn thenables_are_adopted() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var r; var thenable = { then: function (resolve) { resolve(7); } }; \
         Promise.resolve(thenable).then(function (v) { r = v; });",
    );
    assert_eq!(global(&mut agent, "r"), Value::Integer(7));
}

#[test]
fn promise_race_adopts_the_first_settlement() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var r; Promise.race([Promise.resolve(1), Promise.reject('x')]).then(function (v) { r = v; });",
    );
    assert_eq!(global(&mut agent, "r"), Value::Integer(1));
}

#[test]
fn promise_all_settled_never_rejects() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var r; \
         Promise.allSettled([Promise.resolve(1), Promise.reject('e')]).then(function (results) { \
           r = results[0].status + ',' + results[0].value + ',' + results[1].status + ',' + results[1].reason; \
         });",
    );
    let summary = global(&mut agent, "r");
    assert_eq!(display(&agent, summary), "fulfilled,1,rejected,e");
}

#[test]
fn empty_iterable_combinator_rules() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var all; var settled; var any_name; \
         Promise.all([]).then(function (v) { all = v.length; }); \
         Promise.allSettled([]).then(function (v) { settled = v.length; }); \
         Promise.any([]).catch(function (e) { any_name = e.name; });",
    );
    assert_eq!(global(&mut agent, "all"), Value::Integer(0));
    assert_eq!(global(&mut agent, "settled"), Value::Integer(0));
    let name = global(&mut agent, "any_name");
    assert_eq!(display(&agent, name), "AggregateError");
}

#[test]
fn with_resolvers_supports_the_deferred_pattern() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var r; var d = Promise.withResolvers(); d.promise.then(function (v) { r = v; }); d.resolve(9);",
    );
    assert_eq!(global(&mut agent, "r"), Value::Integer(9));
}

#[test]
fn finally_propagates_the_settlement_unchanged() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var ran = 0; var r; var e; \
         Promise.resolve(5).finally(function () { ran = ran + 1; }).then(function (v) { r = v; }); \
         Promise.reject('no').finally(function () { ran = ran + 1; }).catch(function (v) { e = v; });",
    );
    assert_eq!(global(&mut agent, "ran"), Value::Integer(2));
    assert_eq!(global(&mut agent, "r"), Value::Integer(5));
    let reason = global(&mut agent, "e");
    assert_eq!(display(&agent, reason), "no");
}

#[test]
fn settlement_happens_at_most_once() {
    let mut agent = agent();
    eval(
        &mut agent,
        "var r; \
         new Promise(function (resolve, reject) { resolve(1); resolve(2); reject('late'); }) \
           .then(function (v) { r = v; });",
    );
    assert_eq!(global(&mut agent, "r"), Value::Integer(1));
}

#[test]
fn string_well_formedness_methods() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var s = 'a\\uD800b'; [s.isWellFormed(), s.toWellFormed().isWellFormed(), 'ok'.isWellFormed(), s.length]",
    );
    assert_eq!(display(&agent, result), "[ false, true, true, 3 ]");
}

#[test]
fn operators_and_coercions() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "['1' + 2, '6' * '7', 1 == '1', 1 === '1', null == undefined, typeof missing, !0, 5 % 3, -'4']",
    );
    assert_eq!(
        display(&agent, result),
        "[ 12, 42, true, false, true, undefined, true, 2, -4 ]"
    );
}

#[test]
fn increments_and_compound_assignment() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var i = 1; var a = i++; var b = ++i; var o = { n: 10 }; o.n += 5; o.n++; [a, b, i, o.n]",
    );
    assert_eq!(display(&agent, result), "[ 1, 3, 3, 16 ]");
}

#[test]
fn method_calls_bind_this() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var o = { x: 5, get: function () { return this.x; } }; o.get()",
    );
    assert_eq!(result, Value::Integer(5));
}

#[test]
fn constructors_wire_prototypes() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "function Point(x) { this.x = x; } \
         Point.prototype.double = function () { return this.x * 2; }; \
         var p = new Point(21); p.double()",
    );
    assert_eq!(result, Value::Integer(42));
}

#[test]
fn accessors_run_against_the_receiver() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var o = {}; \
         Object.defineProperty(o, 'twice', { get: function () { return this.x * 2; } }); \
         o.x = 8; o.twice",
    );
    assert_eq!(result, Value::Integer(16));
}

#[test]
fn delete_respects_configurability() {
    let mut agent = agent();
    let result = eval(
        &mut agent,
        "var o = { a: 1 }; \
         Object.defineProperty(o, 'locked', { value: 2, configurable: false }); \
         [delete o.a, delete o.locked, o.a, o.locked]",
    );
    assert_eq!(display(&agent, result), "[ true, false, undefined, 2 ]");
}

#[test]
fn globals_persist_across_scripts_on_one_agent() {
    let mut agent = agent();
    eval(&mut agent, "var x = 5; function bump() { x = x + 1; return x; }");
    let result = eval(&mut agent, "bump(); bump(); x");
    assert_eq!(result, Value::Integer(7));
}

#[test]
fn unhandled_rejections_are_reported() {
    let mut agent = agent();
    eval(&mut agent, "Promise.reject('lost');");
    let rejections = agent.unhandled_rejections();
    assert_eq!(rejections.len(), 1);
    assert_eq!(display(&agent, rejections[0].1), "lost");
}

#[test]
fn allocation_exhaustion_is_a_range_error() {
    let mut agent = Agent::new(RuntimeOptions {
        heap_budget: 2_000,
        ..RuntimeOptions::default()
    });
    let reason = eval_err(
        &mut agent,
        "var keep = []; for (var i = 0; i < 100000; i = i + 1) { keep.push('block-' + i); }",
    );
    assert!(display(&agent, reason).starts_with("RangeError:"));
}
