use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use tracing::debug;

use super::tick_child;
use crate::{
    error::RunError, ArgDef, ArgType, Node, NodeDef, NodeType, Process, RunResult, Status,
    Subscription, Target, TreeEnv, Value,
};

pub struct InverterProcess;

impl Process for InverterProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Inverter",
            NodeType::Decorator,
            "Swaps success and failure of the child",
        )
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        Ok(match tick_child(node, env)? {
            Status::Running => node.suspend(env, ()),
            Status::Success => Status::Failure,
            Status::Failure => Status::Success,
        })
    }
}

pub struct AlwaysSuccessProcess;

impl Process for AlwaysSuccessProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "AlwaysSuccess",
            NodeType::Decorator,
            "Succeeds once the child completes, whatever its outcome",
        )
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        Ok(match tick_child(node, env)? {
            Status::Running => node.suspend(env, ()),
            _ => Status::Success,
        })
    }
}

pub struct AlwaysFailProcess;

impl Process for AlwaysFailProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "AlwaysFail",
            NodeType::Decorator,
            "Fails once the child completes, whatever its outcome",
        )
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        Ok(match tick_child(node, env)? {
            Status::Running => node.suspend(env, ()),
            _ => Status::Failure,
        })
    }
}

/// Never completes. The child is ticked again on the tick after it
/// completes, so it behaves like an endless background task.
pub struct AlwaysRunningProcess;

impl Process for AlwaysRunningProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "AlwaysRunning",
            NodeType::Decorator,
            "Keeps running, restarting the child whenever it completes",
        )
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        // the payload tells whether the child is the one suspended
        if node.resume_as::<bool>(env)? == Some(true) {
            node.child_result(env)?;
            return Ok(node.suspend(env, false));
        }
        let running = node.children()[0].tick(env)? == Status::Running;
        Ok(node.suspend(env, running))
    }
}

/// Raises [`RunError::Assertion`] when the child fails, aborting the whole run.
pub struct AssertProcess;

impl Process for AssertProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Assert",
            NodeType::Decorator,
            "Aborts the tree with an error if the child fails",
        )
        .arg(ArgDef::optional(
            "message",
            ArgType::String,
            "Reported when the assertion fails",
        ))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        match tick_child(node, env)? {
            Status::Running => Ok(node.suspend(env, ())),
            Status::Success => Ok(Status::Success),
            Status::Failure => {
                let message = match node.arg_str("message") {
                    Some(message) => message.to_owned(),
                    None => format!("{} failed", node.children()[0].name()),
                };
                Err(RunError::Assertion {
                    id: node.id(),
                    message,
                })
            }
        }
    }
}

#[derive(Clone, Copy)]
struct Attempt {
    count: usize,
    waiting: bool,
}

/// RepeatUntilSuccess and RepeatUntilFailure. One attempt is made per tick;
/// the node runs between attempts and gives up with a failure after `maxLoop`
/// attempts.
pub struct RepeatUntilProcess {
    until: Status,
}

impl RepeatUntilProcess {
    pub fn new(until: Status) -> Self {
        Self { until }
    }
}

impl Process for RepeatUntilProcess {
    fn descriptor(&self) -> NodeDef {
        let (name, desc) = match self.until {
            Status::Failure => (
                "RepeatUntilFailure",
                "Repeats the child until it fails, then succeeds",
            ),
            _ => (
                "RepeatUntilSuccess",
                "Repeats the child until it succeeds",
            ),
        };
        NodeDef::new(name, NodeType::Decorator, desc).arg(ArgDef::optional(
            "maxLoop",
            ArgType::Int,
            "Maximum number of attempts, negative for no limit",
        ))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let max = node
            .arg_i64("maxLoop")
            .and_then(|max| usize::try_from(max).ok());
        let (count, status) = match node.resume_as::<Attempt>(env)? {
            Some(Attempt {
                count,
                waiting: true,
            }) => (count, node.child_result(env)?),
            Some(Attempt { count, .. }) => (count, node.children()[0].tick(env)?),
            None => (0, node.children()[0].tick(env)?),
        };
        if status == Status::Running {
            return Ok(node.suspend(
                env,
                Attempt {
                    count,
                    waiting: true,
                },
            ));
        }
        if status == self.until {
            return Ok(Status::Success);
        }
        let count = count + 1;
        if max.map_or(false, |max| max <= count) {
            return Ok(Status::Failure);
        }
        Ok(node.suspend(
            env,
            Attempt {
                count,
                waiting: false,
            },
        ))
    }
}

/// Fails the child subtree if it has not completed within `time` of the
/// context clock.
pub struct TimeoutProcess;

impl Process for TimeoutProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Timeout",
            NodeType::Decorator,
            "Fails if the child does not complete in time",
        )
        .arg(ArgDef::new("time", ArgType::Float, "Time limit"))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        if let Some(deadline) = node.resume_as::<f64>(env)? {
            if deadline <= env.context().time() {
                debug!(node = node.name(), id = node.id(), "timed out");
                return Ok(Status::Failure);
            }
            return node.child_result(env);
        }
        let deadline = env.context().time() + node.arg_f64("time").unwrap_or(0.);
        match node.children()[0].tick(env)? {
            Status::Running => Ok(node.suspend_until(env, deadline, deadline)),
            status => Ok(status),
        }
    }
}

enum DelayState {
    Waiting(f64),
    Child,
}

/// Waits `time`, then runs the child.
pub struct DelayProcess;

impl Process for DelayProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Delay",
            NodeType::Decorator,
            "Runs the child after a delay",
        )
        .arg(ArgDef::new("time", ArgType::Float, "Delay before the child runs"))
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let now = env.context().time();
        match node.resume_as::<DelayState>(env)? {
            Some(DelayState::Child) => return node.child_result(env),
            Some(DelayState::Waiting(deadline)) if now < deadline => {
                return Ok(node.suspend(env, DelayState::Waiting(deadline)));
            }
            Some(DelayState::Waiting(_)) => (),
            None => {
                let deadline = now + node.arg_f64("time").unwrap_or(0.);
                if now < deadline {
                    return Ok(node.suspend(env, DelayState::Waiting(deadline)));
                }
            }
        }
        match node.children()[0].tick(env)? {
            Status::Running => Ok(node.suspend(env, DelayState::Child)),
            status => Ok(status),
        }
    }
}

/// Lets the child complete at most once per environment. Later ticks fail
/// without touching the child.
pub struct OnceProcess;

impl Process for OnceProcess {
    fn descriptor(&self) -> NodeDef {
        NodeDef::new(
            "Once",
            NodeType::Decorator,
            "Runs the child to completion only once",
        )
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        if env.completed.contains(&node.id()) {
            return Ok(Status::Failure);
        }
        match tick_child(node, env)? {
            Status::Running => Ok(node.suspend(env, ())),
            status => {
                env.completed.insert(node.id());
                Ok(status)
            }
        }
    }
}

type Inbox = Rc<RefCell<VecDeque<Vec<Value>>>>;

/// Continuation of a listening node. Dropping it, whether the node completes
/// or the run is abandoned, removes the subscription.
struct ListenState {
    _subscription: Subscription,
    inbox: Inbox,
    waiting: bool,
}

/// Body of Listen and ListenTree: for every event received on `target`,
/// copy its arguments into the output variables and run the child.
fn listen(node: &Node, env: &mut TreeEnv, target: Target) -> RunResult {
    let once = node.arg_bool("once").unwrap_or(false);
    let mut state = match node.resume_as::<ListenState>(env)? {
        Some(mut state) => {
            if state.waiting {
                state.waiting = false;
                let status = node.child_result(env)?;
                if once {
                    return Ok(status);
                }
            }
            state
        }
        None => {
            let event = node.arg_str("event").unwrap_or_default();
            let inbox = Inbox::default();
            let sink = inbox.clone();
            let subscription = env.context().subscribe(
                event,
                target,
                env.caller(),
                move |args: &[Value]| sink.borrow_mut().push_back(args.to_vec()),
            );
            ListenState {
                _subscription: subscription,
                inbox,
                waiting: false,
            }
        }
    };

    loop {
        let next = state.inbox.borrow_mut().pop_front();
        let Some(args) = next else {
            break;
        };
        for (i, arg) in args.into_iter().enumerate() {
            env.set_output(node, i, arg);
        }
        match node.children()[0].tick(env)? {
            Status::Running => {
                state.waiting = true;
                return Ok(node.suspend(env, state));
            }
            status if once => return Ok(status),
            _ => (),
        }
    }
    Ok(node.suspend(env, state))
}

fn listen_def(name: &'static str, desc: &'static str) -> NodeDef {
    NodeDef::new(name, NodeType::Decorator, desc)
        .output(&["args..."])
        .arg(ArgDef::new("event", ArgType::String, "Event name"))
        .arg(ArgDef::optional(
            "once",
            ArgType::Bool,
            "Complete with the child's status after the first event",
        ))
}

/// Subscribes to an event, globally or on the target named by the input
/// variable, and runs the child every time it fires.
pub struct ListenProcess;

impl Process for ListenProcess {
    fn descriptor(&self) -> NodeDef {
        listen_def("Listen", "Runs the child whenever an event is dispatched")
            .doc("Stays running while subscribed. Without an input the event is listened to globally.")
            .input(&["target?"])
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let target = env
            .input(node, 0)
            .and_then(Value::as_str)
            .map_or(Target::Global, Target::from);
        listen(node, env, target)
    }
}

/// Listens to events addressed to this environment's own target.
pub struct ListenTreeProcess;

impl Process for ListenTreeProcess {
    fn descriptor(&self) -> NodeDef {
        listen_def(
            "ListenTree",
            "Runs the child whenever an event targeting this tree is dispatched",
        )
    }

    fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
        let target = env.target();
        listen(node, env, target)
    }
}
