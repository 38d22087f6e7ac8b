//! Several guards share one compiled tree. Each walks its own route forever
//! while a `ListenTree` branch records noises dispatched at that guard only.
//!
//! Run with `RUST_LOG=debug cargo run --example patrol` to see node logs.

use ::behavior_tree_runner::{
    load, ArgDef, ArgType, Context, Lazy, Node, NodeData, NodeDef, NodeType, Process, Registry,
    RunResult, RunnerEvent, Status, Symbol, TreeData, TreeEnv, TreeRunner, TreeSource,
    TreeStatus, Value,
};
use std::rc::Rc;

static POS: Lazy<Symbol> = Lazy::new(|| "pos".into());

/// Moves `pos` one step towards the input target and succeeds on arrival.
struct MoveTo;

impl Process for MoveTo {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new("MoveTo", NodeType::Action, "Walks towards a point")
            .input(&["target"])
            .arg(ArgDef::optional("speed", ArgType::Float, "Distance per tick"))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let target = env.input(node, 0).and_then(Value::as_f64).unwrap_or(0.);
        let pos = env.get(*POS).and_then(Value::as_f64).unwrap_or(0.);
        let speed = node.arg_f64("speed").unwrap_or(1.);
        let next = if (target - pos).abs() <= speed {
            target
        } else {
            pos + speed * (target - pos).signum()
        };
        env.set(*POS, next);
        if next == target {
            Ok(Status::Success)
        } else {
            Ok(node.suspend(env, ()))
        }
    }
}

fn patrol_tree() -> TreeSource {
    let watch = NodeData::new("ListenTree")
        .arg("event", "noise")
        .output(&["noise_at"])
        .child(
            NodeData::new("Sequence")
                .child(NodeData::new("Push").input(&["noise_at"]).output(&["heard"]))
                .child(
                    NodeData::new("Log")
                        .arg("message", "heard something at")
                        .input(&["noise_at"]),
                ),
        );
    let patrol = NodeData::new("Loop").child(
        NodeData::new("Foreach")
            .input(&["route"])
            .output(&["waypoint"])
            .child(NodeData::new("MoveTo").arg("speed", 2.).input(&["waypoint"]))
            .child(
                NodeData::new("Log")
                    .arg("message", "reached")
                    .input(&["waypoint"]),
            ),
    );
    let root = NodeData::new("Parallel").child(watch).child(patrol);
    TreeSource::from(vec![TreeData::new("guard", root)])
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut registry = Registry::default();
    registry.register(MoveTo);
    let ctx = Rc::new(Context::new(registry));
    let tree = Rc::new(load(&patrol_tree(), &ctx, "guard", true)?);

    let mut guards: Vec<_> = [("north", vec![0., 4., 8.]), ("south", vec![10., 6.])]
        .into_iter()
        .map(|(name, route)| {
            let mut env = TreeEnv::new(ctx.clone()).with_target(name);
            env.set("route", route);
            let mut runner = TreeRunner::new(tree.clone(), env);
            runner.on(RunnerEvent::AfterRunFailure, move |env| {
                println!("{} gave up at {}", name, env.get(*POS).cloned().unwrap_or_default());
            });
            (name, runner)
        })
        .collect();

    for tick in 0..10 {
        if tick == 3 {
            ctx.dispatch_target("noise", "south".into(), &[Value::from(20.)]);
        }
        for (name, runner) in &mut guards {
            let status = runner.run();
            let pos = runner.env().get(*POS).cloned().unwrap_or_default();
            println!("tick {:2} {:5} {:?} pos {}", tick, name, status, pos);
        }
        ctx.advance(1.);
    }

    for (name, runner) in &guards {
        let heard = runner.env().get("heard").cloned().unwrap_or_default();
        println!("{} heard {}", name, heard);
        debug_assert_eq!(runner.status(), TreeStatus::Running);
    }
    Ok(())
}
