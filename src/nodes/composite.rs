use crate::{
    error::RunError, node::Frame, ArgDef, ArgType, Node, NodeDef, NodeType, Process, RunResult,
    Status, TreeEnv, Value,
};

/// Runs children left to right until one fails. A running child is resumed
/// at the same index on the next tick.
pub struct SequenceProcess;

impl Process for SequenceProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Sequence",
            NodeType::Composite,
            "Succeeds when every child succeeds",
        )
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        run_until(node, env, Status::Failure)
    }
}

/// Runs children left to right until one succeeds.
pub struct SelectorProcess;

impl Process for SelectorProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Selector",
            NodeType::Composite,
            "Succeeds as soon as one child succeeds",
        )
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        run_until(node, env, Status::Success)
    }
}

/// Shared body of Sequence and Selector: stop at the first child returning
/// `stop`, otherwise report the opposite once the children are exhausted.
fn run_until(node: &Node, env: &mut TreeEnv, stop: Status) -> RunResult {
    let mut start = 0;
    if let Some(last) = node.resume_as::<usize>(env)? {
        let status = node.child_result(env)?;
        if status == stop {
            return Ok(stop);
        }
        start = last + 1;
    }
    for (i, child) in node.children().iter().enumerate().skip(start) {
        match child.tick(env)? {
            Status::Running => return Ok(node.suspend(env, i)),
            status if status == stop => return Ok(stop),
            _ => (),
        }
    }
    Ok(match stop {
        Status::Failure => Status::Success,
        _ => Status::Failure,
    })
}

/// Continuation of one child of a Parallel node.
struct Branch {
    stack: Vec<Frame>,
    status: Option<Status>,
}

/// Ticks every unfinished child on each tick. Each child keeps a private run
/// stack, so several of them can be running at once.
pub struct ParallelProcess;

impl Process for ParallelProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Parallel",
            NodeType::Composite,
            "Runs all children side by side, succeeding when all have completed",
        )
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let mut branches = match node.resume_as::<Vec<Branch>>(env)? {
            Some(branches) => branches,
            None => node
                .children()
                .iter()
                .map(|_| Branch {
                    stack: vec![],
                    status: None,
                })
                .collect(),
        };

        let outer = std::mem::take(&mut env.stack);
        let result = run_branches(node, env, &mut branches);
        env.stack = outer;
        result?;

        if branches.iter().all(|branch| branch.status.is_some()) {
            Ok(Status::Success)
        } else {
            Ok(node.suspend(env, branches))
        }
    }
}

fn run_branches(node: &Node, env: &mut TreeEnv, branches: &mut [Branch]) -> Result<(), RunError> {
    for (child, branch) in node.children().iter().zip(branches.iter_mut()) {
        if branch.status.is_some() {
            continue;
        }
        env.stack = std::mem::take(&mut branch.stack);
        let status = if env.stack.is_empty() {
            child.tick(env)?
        } else {
            env.resume_stack()?
        };
        branch.stack = std::mem::take(&mut env.stack);
        if status != Status::Running {
            branch.status = Some(status);
        }
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum IfPhase {
    Condition,
    Branch,
}

/// `IfElse(condition, then, else?)`. A missing else branch counts as success.
pub struct IfElseProcess;

impl Process for IfElseProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "IfElse",
            NodeType::Composite,
            "Runs the second child if the first succeeds, the third otherwise",
        )
    }

    fn init(&self, node: &Node, ctx: &crate::Context) -> Result<(), crate::InitError> {
        crate::validate(&self.descriptor(), node, ctx)?;
        let found = node.children().len();
        if found < 2 {
            return Err(crate::InitError::TooFewChildren { expected: 2, found });
        }
        if 3 < found {
            return Err(crate::InitError::TooManyChildren { expected: 3, found });
        }
        Ok(())
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let condition = match node.resume_as::<IfPhase>(env)? {
            None => node.children()[0].tick(env)?,
            Some(IfPhase::Condition) => node.child_result(env)?,
            Some(IfPhase::Branch) => return node.child_result(env),
        };
        let branch = match condition {
            Status::Running => return Ok(node.suspend(env, IfPhase::Condition)),
            Status::Success => 1,
            Status::Failure => 2,
        };
        let Some(child) = node.children().get(branch) else {
            return Ok(Status::Success);
        };
        match child.tick(env)? {
            Status::Running => Ok(node.suspend(env, IfPhase::Branch)),
            status => Ok(status),
        }
    }
}

/// Progress of Loop and Foreach: which iteration, which child, and whether
/// that child is running or the node merely yielded between iterations.
#[derive(Clone)]
struct Iteration {
    index: usize,
    count: Option<usize>,
    child: usize,
    waiting: bool,
    items: Vec<Value>,
}

/// Run the children in sequence once per iteration, yielding between
/// iterations. `before` is called at the start of every iteration.
fn iterate(
    node: &Node,
    env: &mut TreeEnv,
    fresh: impl FnOnce(&mut TreeEnv) -> Iteration,
    before: impl Fn(&Node, &mut TreeEnv, &Iteration),
) -> RunResult {
    let mut state = match node.resume_as::<Iteration>(env)? {
        Some(mut state) if state.waiting => {
            if node.child_result(env)? == Status::Failure {
                return Ok(Status::Failure);
            }
            state.child += 1;
            state.waiting = false;
            state
        }
        Some(state) => state,
        None => fresh(env),
    };
    if state.count.map_or(false, |count| count <= state.index) {
        return Ok(Status::Success);
    }
    if state.child == 0 {
        before(node, env, &state);
    }
    while let Some(child) = node.children().get(state.child) {
        match child.tick(env)? {
            Status::Success => state.child += 1,
            Status::Failure => return Ok(Status::Failure),
            Status::Running => {
                state.waiting = true;
                return Ok(node.suspend(env, state));
            }
        }
    }
    state.index += 1;
    state.child = 0;
    if state.count.map_or(false, |count| count <= state.index) {
        Ok(Status::Success)
    } else {
        Ok(node.suspend(env, state))
    }
}

/// Repeats its children `count` times, or forever when the count is
/// negative or absent. Fails as soon as a child fails.
pub struct LoopProcess;

impl Process for LoopProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Loop",
            NodeType::Composite,
            "Runs the children in sequence repeatedly, one iteration per tick",
        )
        .doc("The input variable, when wired, overrides the `count` argument.")
        .input(&["count?"])
        .output(&["index?"])
        .arg(ArgDef::optional(
            "count",
            ArgType::Int,
            "Number of iterations, negative for no limit",
        ))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        iterate(
            node,
            env,
            |env| {
                let count = env
                    .input(node, 0)
                    .and_then(Value::as_i64)
                    .or_else(|| node.arg_i64("count"))
                    .and_then(|count| usize::try_from(count).ok());
                Iteration {
                    index: 0,
                    count,
                    child: 0,
                    waiting: false,
                    items: vec![],
                }
            },
            |node, env, state| env.set_output(node, 0, state.index),
        )
    }
}

/// Runs its children once per element of the input array, storing the
/// element (and optionally its index) in the output variables.
pub struct ForeachProcess;

impl Process for ForeachProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Foreach",
            NodeType::Composite,
            "Runs the children in sequence for each element of an array",
        )
        .input(&["array"])
        .output(&["item", "index?"])
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        iterate(
            node,
            env,
            |env| {
                let items = env
                    .input(node, 0)
                    .and_then(Value::as_array)
                    .map(<[Value]>::to_vec)
                    .unwrap_or_default();
                Iteration {
                    index: 0,
                    count: Some(items.len()),
                    child: 0,
                    waiting: false,
                    items,
                }
            },
            |node, env, state| {
                if let Some(item) = state.items.get(state.index) {
                    env.set_output(node, 0, item.clone());
                    env.set_output(node, 1, state.index);
                }
            },
        )
    }
}
