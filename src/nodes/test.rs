use crate::*;
use std::{cell::Cell, rc::Rc};

/// Counts its ticks in the output variable (or, unwired, in its continuation)
/// and returns the statuses listed in `results` one per tick, repeating the
/// last one.
struct Ticks;

impl Process for Ticks {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new("Ticks", NodeType::Action, "Replays statuses")
            .output(&["count?"])
            .arg(ArgDef::new("results", ArgType::Json, "Status per tick"))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let resumed = node.resume_as::<i64>(env)?;
        let count = match node.output(0) {
            Some(_) => env.output_value(node, 0).and_then(Value::as_i64).unwrap_or(0),
            None => resumed.unwrap_or(0),
        };
        env.set_output(node, 0, count + 1);
        let results = node.arg("results").and_then(Value::as_array).unwrap_or(&[]);
        let status = results
            .get(count as usize)
            .or(results.last())
            .and_then(Value::as_str)
            .and_then(Status::from_name)
            .unwrap_or(Status::Success);
        Ok(match status {
            Status::Running => node.suspend(env, count + 1),
            status => status,
        })
    }
}

fn compile(root: &str) -> (Rc<Context>, Rc<Tree>) {
    let mut registry = Registry::default();
    registry.register(Ticks);
    let ctx = Rc::new(Context::new(registry));
    let source = format!("{{name: main, root: {}}}", root);
    let tree = load_str(&source, &ctx, "main", true).unwrap();
    (ctx, Rc::new(tree))
}

fn new_runner(root: &str) -> TreeRunner {
    let (ctx, tree) = compile(root);
    TreeRunner::new(tree, TreeEnv::new(ctx))
}

fn var(runner: &TreeRunner, key: &str) -> Value {
    runner.env().get(key).cloned().unwrap_or_default()
}

#[test]
fn test_sequence_resumes_at_running_child() {
    let mut runner = new_runner(
        "{name: Sequence, children: [
            {name: Ticks, args: {results: [success]}, output: [a]},
            {name: Ticks, args: {results: [running, success]}, output: [b]},
            {name: Ticks, args: {results: [success]}, output: [c]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.env().stack_len(), 2);
    assert_eq!(runner.env().running_nodes().last().map(|n| n.id()), Some(3));
    assert_eq!(var(&runner, "c"), Value::Null);

    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "a"), Value::from(1));
    assert_eq!(var(&runner, "b"), Value::from(2));
    assert_eq!(var(&runner, "c"), Value::from(1));
    assert_eq!(runner.env().stack_len(), 0);
}

#[test]
fn test_sequence_failure() {
    let mut runner = new_runner(
        "{name: Sequence, children: [
            {name: Ticks, args: {results: [failure]}, output: [a]},
            {name: Ticks, args: {results: [success]}, output: [b]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Failure);
    assert_eq!(var(&runner, "b"), Value::Null);
}

#[test]
fn test_selector() {
    let mut runner = new_runner(
        "{name: Selector, children: [
            {name: Ticks, args: {results: [running, failure]}, output: [a]},
            {name: Ticks, args: {results: [success]}, output: [b]},
            {name: Ticks, args: {results: [success]}, output: [c]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "a"), Value::from(2));
    assert_eq!(var(&runner, "b"), Value::from(1));
    assert_eq!(var(&runner, "c"), Value::Null);

    let mut runner = new_runner("{name: Selector, children: [{name: Ticks, args: {results: [failure]}}]}");
    assert_eq!(runner.run(), TreeStatus::Failure);
}

#[test]
fn test_parallel() {
    let mut runner = new_runner(
        "{name: Parallel, children: [
            {name: Ticks, args: {results: [running, running, success]}, output: [a]},
            {name: Ticks, args: {results: [running, success]}, output: [b]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    // branches keep their own stacks
    assert_eq!(runner.env().stack_len(), 1);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "a"), Value::from(3));
    assert_eq!(var(&runner, "b"), Value::from(2));
}

#[test]
fn test_parallel_nested() {
    let mut runner = new_runner(
        "{name: Parallel, children: [
            {name: Sequence, children: [
                {name: Wait, args: {time: 1}},
                {name: Let, args: {value: done}, output: [first]}]},
            {name: Sequence, children: [
                {name: Wait, args: {time: 2}},
                {name: Let, args: {value: done}, output: [second]}]}]}",
    );
    let ctx = runner.env().context().clone();
    assert_eq!(runner.run(), TreeStatus::Running);
    ctx.advance(1.);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(var(&runner, "first"), Value::from("done"));
    assert_eq!(var(&runner, "second"), Value::Null);
    ctx.advance(1.);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "second"), Value::from("done"));
}

#[test]
fn test_if_else() {
    let root = "{name: IfElse, children: [
        {name: Check, args: {value: 'x > 0'}},
        {name: Let, args: {value: then}, output: [r]},
        {name: Let, args: {value: else}, output: [r]}]}";
    for (x, expected) in [(1, "then"), (0, "else")] {
        let mut runner = new_runner(root);
        runner.env_mut().set("x", x);
        assert_eq!(runner.run(), TreeStatus::Success);
        assert_eq!(var(&runner, "r"), Value::from(expected));
    }

    let mut runner = new_runner(
        "{name: IfElse, children: [
            {name: Ticks, args: {results: [running, failure]}},
            {name: Let, args: {value: then}, output: [r]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "r"), Value::Null);
}

#[test]
fn test_loop() {
    let mut runner = new_runner(
        "{name: Loop, args: {count: 3}, output: [i], children: [
            {name: Calculate, args: {value: 'n + 1'}, output: [n]}]}",
    );
    runner.env_mut().set("n", 0);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(var(&runner, "n"), Value::from(1));
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "n"), Value::from(3));
    assert_eq!(var(&runner, "i"), Value::from(2));

    let mut runner = new_runner(
        "{name: Loop, input: [limit], children: [{name: Ticks, args: {results: [success]}, output: [n]}]}",
    );
    runner.env_mut().set("limit", -1);
    for _ in 0..10 {
        assert_eq!(runner.run(), TreeStatus::Running);
    }
    assert_eq!(var(&runner, "n"), Value::from(10));
}

#[test]
fn test_loop_failure() {
    let mut runner = new_runner(
        "{name: Loop, args: {count: 5}, children: [
            {name: Ticks, args: {results: [success, running, failure]}, output: [n]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Failure);
}

#[test]
fn test_foreach() {
    let mut runner = new_runner(
        "{name: Foreach, input: [items], output: [item, i], children: [
            {name: Push, input: [item], output: [out]}]}",
    );
    runner.env_mut().set("items", vec![1, 2, 3]);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "out"), Value::from(vec![1, 2, 3]));
    assert_eq!(var(&runner, "i"), Value::from(2));

    let mut runner = new_runner(
        "{name: Foreach, input: [items], output: [item], children: [{name: Wait, args: {time: 1}}]}",
    );
    runner.env_mut().set("items", Vec::<i32>::new());
    assert_eq!(runner.run(), TreeStatus::Success);
}

#[test]
fn test_inverter() {
    let cases = [
        ("[success]", TreeStatus::Failure),
        ("[failure]", TreeStatus::Success),
    ];
    for (results, expected) in cases {
        let mut runner = new_runner(&format!(
            "{{name: Inverter, children: [{{name: Ticks, args: {{results: {}}}}}]}}",
            results
        ));
        assert_eq!(runner.run(), expected);
    }

    let mut runner = new_runner(
        "{name: Inverter, children: [{name: Ticks, args: {results: [running, success]}}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    let path: Vec<_> = runner.env().running_nodes().map(|n| n.name().to_owned()).collect();
    assert_eq!(path, vec!["Inverter", "Ticks"]);
    assert_eq!(runner.run(), TreeStatus::Failure);
}

#[test]
fn test_repeat_until_success() {
    let mut runner = new_runner(
        "{name: RepeatUntilSuccess, args: {maxLoop: 3}, children: [
            {name: Ticks, args: {results: [failure, failure, success]}, output: [n]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "n"), Value::from(3));

    let mut runner = new_runner(
        "{name: RepeatUntilSuccess, args: {maxLoop: 3}, children: [
            {name: Ticks, args: {results: [failure]}, output: [n]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Failure);
    assert_eq!(var(&runner, "n"), Value::from(3));
}

#[test]
fn test_repeat_until_failure() {
    let mut runner = new_runner(
        "{name: RepeatUntilFailure, children: [
            {name: Ticks, args: {results: [success, running, success, failure]}, output: [n]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "n"), Value::from(4));
}

#[test]
fn test_sibling_repeats_keep_own_count() {
    let mut runner = new_runner(
        "{name: Sequence, children: [
            {name: RepeatUntilSuccess, args: {maxLoop: 2}, children: [
                {name: Ticks, args: {results: [failure, success]}, output: [a]}]},
            {name: RepeatUntilSuccess, args: {maxLoop: 2}, children: [
                {name: Ticks, args: {results: [failure, success]}, output: [b]}]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "a"), Value::from(2));
    assert_eq!(var(&runner, "b"), Value::from(2));
}

#[test]
fn test_timeout() {
    let mut runner = new_runner("{name: Timeout, args: {time: 2}, children: [{name: Wait, args: {time: 5}}]}");
    let ctx = runner.env().context().clone();
    assert_eq!(runner.run(), TreeStatus::Running);
    ctx.advance(1.);
    assert_eq!(runner.run(), TreeStatus::Running);
    ctx.advance(1.);
    assert_eq!(runner.run(), TreeStatus::Failure);
    assert_eq!(runner.env().stack_len(), 0);

    let mut runner = new_runner("{name: Timeout, args: {time: 5}, children: [{name: Wait, args: {time: 1}}]}");
    let ctx = runner.env().context().clone();
    assert_eq!(runner.run(), TreeStatus::Running);
    ctx.advance(1.);
    assert_eq!(runner.run(), TreeStatus::Success);
}

#[test]
fn test_delay() {
    let mut runner = new_runner(
        "{name: Delay, args: {time: 1}, children: [{name: Let, args: {value: 1}, output: [x]}]}",
    );
    let ctx = runner.env().context().clone();
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(var(&runner, "x"), Value::Null);
    ctx.advance(1.);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "x"), Value::from(1));
}

#[test]
fn test_once() {
    let mut runner = new_runner(
        "{name: Once, children: [{name: Ticks, args: {results: [running, success]}, output: [n]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(runner.run(), TreeStatus::Failure);
    assert_eq!(runner.run(), TreeStatus::Failure);
    assert_eq!(var(&runner, "n"), Value::from(2));
    // the memo is not a blackboard variable
    assert_eq!(runner.env().vars().len(), 1);

    runner.clear();
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "n"), Value::from(2));
}

#[test]
fn test_once_is_per_env() {
    let (ctx, tree) = compile("{name: Once, children: [{name: Ticks, args: {results: [success]}}]}");
    let mut first = TreeRunner::new(tree.clone(), TreeEnv::new(ctx.clone()));
    let mut second = TreeRunner::new(tree, TreeEnv::new(ctx));
    assert_eq!(first.run(), TreeStatus::Success);
    assert_eq!(first.run(), TreeStatus::Failure);
    assert_eq!(second.run(), TreeStatus::Success);
}

#[test]
fn test_always() {
    let mut runner = new_runner(
        "{name: AlwaysSuccess, children: [{name: Ticks, args: {results: [running, failure]}}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.run(), TreeStatus::Success);

    let mut runner = new_runner("{name: AlwaysFail, children: [{name: Ticks, args: {results: [success]}}]}");
    assert_eq!(runner.run(), TreeStatus::Failure);

    let mut runner = new_runner(
        "{name: AlwaysRunning, children: [{name: Ticks, args: {results: [running, success]}, output: [a]}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.env().stack_len(), 2);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(runner.env().stack_len(), 1);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(var(&runner, "a"), Value::from(3));
}

#[test]
fn test_assert() {
    let mut runner = new_runner(
        "{name: Assert, args: {message: hp must be positive}, children: [
            {name: Check, args: {value: 'hp > 0'}}]}",
    );
    let asserts = Rc::new(Cell::new(0));
    let failures = Rc::new(Cell::new(0));
    {
        let asserts = asserts.clone();
        runner.on(RunnerEvent::AssertFailed, move |_| asserts.set(asserts.get() + 1));
        let failures = failures.clone();
        runner.on(RunnerEvent::AfterRunFailure, move |_| failures.set(failures.get() + 1));
    }
    runner.env_mut().set("hp", 3);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(asserts.get(), 0);

    runner.env_mut().set("hp", 0);
    assert_eq!(runner.run(), TreeStatus::Failure);
    assert_eq!(asserts.get(), 1);
    assert_eq!(failures.get(), 1);
}

#[test]
fn test_listen() {
    let mut runner = new_runner(
        "{name: Listen, args: {event: hit}, output: [dmg], children: [
            {name: Calculate, args: {value: 'total + dmg'}, output: [total]}]}",
    );
    let ctx = runner.env().context().clone();
    runner.env_mut().set("total", 0);

    assert_eq!(ctx.dispatch("hit", &[Value::from(1)]), 0);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(ctx.listener_count(), 1);

    assert_eq!(ctx.dispatch("hit", &[Value::from(5)]), 1);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(var(&runner, "total"), Value::from(5));

    ctx.dispatch("hit", &[Value::from(2)]);
    ctx.dispatch("hit", &[Value::from(3)]);
    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(var(&runner, "total"), Value::from(10));

    runner.interrupt();
    assert_eq!(runner.status(), TreeStatus::Interrupted);
    assert_eq!(ctx.listener_count(), 0);
}

#[test]
fn test_listen_once_and_target() {
    let mut runner = new_runner(
        "{name: Listen, args: {event: hit, once: true}, input: [who], children: [
            {name: Let, args: {value: true}, output: [hit]}]}",
    );
    let ctx = runner.env().context().clone();
    runner.env_mut().set("who", "orc");

    assert_eq!(runner.run(), TreeStatus::Running);
    assert_eq!(ctx.dispatch("hit", &[]), 0);
    assert_eq!(ctx.dispatch_target("hit", "orc".into(), &[]), 1);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "hit"), Value::Bool(true));
    assert_eq!(ctx.listener_count(), 0);
}

#[test]
fn test_listen_tree() {
    let (ctx, tree) = compile(
        "{name: ListenTree, args: {event: poke}, output: [by], children: [
            {name: Push, input: [by], output: [pokes]}]}",
    );
    let mut hero = TreeRunner::new(tree.clone(), TreeEnv::new(ctx.clone()).with_target("hero"));
    let mut orc = TreeRunner::new(tree, TreeEnv::new(ctx.clone()).with_target("orc"));
    assert_eq!(hero.run(), TreeStatus::Running);
    assert_eq!(orc.run(), TreeStatus::Running);

    ctx.dispatch_target("poke", "hero".into(), &[Value::from("orc")]);
    hero.run();
    orc.run();
    assert_eq!(var(&hero, "pokes"), Value::from(vec!["orc"]));
    assert_eq!(var(&orc, "pokes"), Value::Null);

    drop(hero);
    assert_eq!(ctx.listener_count(), 1);
}

#[test]
fn test_conditions() {
    let mut runner = new_runner(
        "{name: Sequence, children: [
            {name: IsNull, input: [missing]},
            {name: NotNull, input: [present]},
            {name: Check, args: {value: 'present == 1'}}]}",
    );
    runner.env_mut().set("present", 1);
    assert_eq!(runner.run(), TreeStatus::Success);

    let mut runner = new_runner(
        "{name: Selector, children: [
            {name: AlwaysFail, children: [{name: Let, output: [x]}]},
            {name: IsStatus, args: {status: failure}}]}",
    );
    assert_eq!(runner.run(), TreeStatus::Success);
}

#[test]
fn test_actions() {
    let mut runner = new_runner(
        "{name: Sequence, children: [
            {name: Now, output: [t]},
            {name: Let, args: {value: {a: [1, 2]}}, output: [obj]},
            {name: Calculate, args: {value: 'obj.a[1] * 10'}, output: [x]},
            {name: Push, input: [x], output: [list]},
            {name: Push, input: [x], output: [list]},
            {name: Log, args: {message: list is, level: debug}, input: [list]},
            {name: Clear, args: {temp: true}, output: [obj]}]}",
    );
    runner.env().context().set_time(3.5);
    runner.env_mut().set("__scratch", 1);
    assert_eq!(runner.run(), TreeStatus::Success);
    assert_eq!(var(&runner, "t"), Value::from(3.5));
    assert_eq!(var(&runner, "x"), Value::from(20));
    assert_eq!(var(&runner, "list"), Value::from(vec![20, 20]));
    assert_eq!(var(&runner, "obj"), Value::Null);
    assert_eq!(var(&runner, "__scratch"), Value::Null);
}

#[test]
fn test_push_into_non_array() {
    let mut runner = new_runner("{name: Push, input: [x], output: [list]}");
    runner.env_mut().set("list", "text");
    assert_eq!(runner.run(), TreeStatus::Failure);
}

#[test]
fn test_wait() {
    let mut runner = new_runner("{name: Wait, input: [delay]}");
    let ctx = runner.env().context().clone();
    runner.env_mut().set("delay", 2);
    assert_eq!(runner.run(), TreeStatus::Running);
    ctx.advance(1.5);
    assert_eq!(runner.run(), TreeStatus::Running);
    ctx.advance(0.5);
    assert_eq!(runner.run(), TreeStatus::Success);
}

#[test]
fn test_expression_error_fails_run() {
    let mut runner = new_runner(
        "{name: Sequence, children: [
            {name: Wait, args: {time: 1}},
            {name: Calculate, args: {value: 'a.b'}, output: [x]}]}",
    );
    let ctx = runner.env().context().clone();
    runner.env_mut().set("__tmp", 1);
    assert_eq!(runner.run(), TreeStatus::Running);
    ctx.advance(1.);
    assert_eq!(runner.run(), TreeStatus::Failure);
    assert_eq!(runner.env().stack_len(), 0);
    assert_eq!(var(&runner, "__tmp"), Value::Null);
}
