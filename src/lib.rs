//! # behavior-tree-runner
//!
//! A behavior tree engine where a compiled tree is shared by any number of
//! actors, and every actor keeps its own resumable state.
//!
//!
//! ## Overview
//!
//! A behavior tree is a tree of nodes describing decision logic.
//! Composites combine children, decorators alter the outcome of a single
//! child, and leaves (conditions and actions) look at or change the world.
//! The tree is ticked repeatedly, typically once per frame.
//!
//! This crate splits a tree into immutable and mutable halves:
//!
//! * A [`Tree`] is a graph of [`Node`]s compiled from a definition.
//!   It is never mutated after loading, so one tree can drive many actors.
//! * A [`TreeEnv`] is the state of one actor: its blackboard variables and the
//!   stack of nodes that are currently suspended.
//! * A [`TreeRunner`] pairs one tree with one environment and is ticked by the host.
//! * A [`Context`] holds what all of them share: the node type registry, the
//!   expression cache, the event bus and a logical clock.
//!
//! The behavior of a node type lives in a [`Process`]. Exactly one instance of
//! each process exists, shared by every node of that type, so a process must not
//! keep per-node or per-actor state. What a running node needs to remember
//! goes into the environment, either as a variable or as a continuation payload.
//!
//!
//! ## How it looks like
//!
//! Trees are usually written as YAML (or JSON) by a tool and loaded at runtime.
//!
//! ```rust
//! use behavior_tree_runner::*;
//! use std::rc::Rc;
//!
//! let source = r#"
//! name: main
//! root:
//!   name: Sequence
//!   children:
//!   - name: Check
//!     args: { value: "hp > 0" }
//!   - name: Calculate
//!     args: { value: "hp - 1" }
//!     output: [hp]
//! "#;
//!
//! let ctx = Rc::new(Context::default());
//! let tree = Rc::new(load_str(source, &ctx, "main", true).unwrap());
//!
//! let mut env = TreeEnv::new(ctx.clone());
//! env.set("hp", 2);
//! let mut runner = TreeRunner::new(tree, env);
//!
//! assert_eq!(runner.run(), TreeStatus::Success);
//! assert_eq!(runner.env().get("hp"), Some(&Value::from(1)));
//! ```
//!
//!
//! ## Resuming instead of re-walking
//!
//! When a node cannot finish in the current tick it returns
//! [`Status::Running`]. The node stays on the environment's stack together with
//! every ancestor above it, each of which may keep a continuation payload
//! (for example the index of the running child of a `Sequence`).
//!
//! On the next tick the runner does not descend from the root again.
//! It resumes the topmost frame directly, and when that node finishes, it resumes
//! the frame below it, which reads the child's outcome from
//! [`TreeEnv::last_status`]. Siblings that already finished are never
//! evaluated twice, and a tick costs as much as the depth of the running path.
//!
//!
//! ## How to define your own node
//!
//! Implement [`Process`] and register it before creating the [`Context`].
//!
//! ```rust
//! use behavior_tree_runner::*;
//!
//! struct Heal;
//!
//! impl Process for Heal {
//!     fn descriptor(&self) -> NodeDef {
//!         NodeDef::new("Heal", NodeType::Action, "Restore hit points")
//!             .output(&["hp"])
//!             .arg(ArgDef::new("amount", ArgType::Float, "Amount to restore"))
//!     }
//!
//!     fn run(&self, node: &Node, env: &mut TreeEnv) -> RunResult {
//!         let amount = node.arg_f64("amount").unwrap_or(0.);
//!         let hp = env.output_value(node, 0).and_then(Value::as_f64).unwrap_or(0.);
//!         env.set_output(node, 0, hp + amount);
//!         Ok(Status::Success)
//!     }
//! }
//!
//! let mut registry = Registry::default();
//! registry.register(Heal);
//! let ctx = Context::new(registry);
//! ```
//!
//! A node that needs several ticks calls [`Node::suspend`] with whatever it
//! has to remember and gets it back with [`Node::resume_as`] when it is resumed.
//!
//!
//! ## Events
//!
//! [`Context::on`] and [`Context::dispatch`] form a pub/sub bus scoped by
//! event name and target. Every subscription has an owner ([`CallerId`]);
//! [`Context::off_caller`] drops everything an owner registered, which is what
//! [`TreeRunner::clear`] does for its environment. The built-in `Listen` and
//! `ListenTree` decorators subscribe while they are running and unsubscribe as
//! soon as they finish or are interrupted.
//!
//! Each runner also has a small channel of lifecycle events ([`RunnerEvent`])
//! registered with [`TreeRunner::on`].

mod context;
pub mod error;
mod env;
mod event;
pub mod expr;
mod node;
mod node_def;
pub mod nodes;
pub mod parser;
mod process;
mod registry;
mod runner;
mod symbol;
mod value;

pub use crate::context::{Context, Subscription};
pub use crate::env::{InterruptHandle, TreeEnv};
pub use crate::error::{ExprError, InitError, LoadError, RunError, RunResult};
pub use crate::event::{CallerId, ListenerId, Target};
pub use crate::node::{Node, Tree};
pub use crate::node_def::{ArgDef, ArgType, NodeDef, NodeType, SlotDef};
pub use crate::parser::{load, load_str, parse_source, NodeData, TreeData, TreeSource};
pub use crate::process::{validate, Process};
pub use crate::registry::Registry;
pub use crate::runner::{RunnerEvent, TreeRunner};
pub use crate::symbol::Symbol;
pub use crate::value::Value;
pub use ::once_cell::sync::Lazy;

/// Outcome of ticking one node.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum Status {
    Success,
    Failure,
    /// The node should be resumed in the next tick
    Running,
}

impl Status {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "running" => Some(Self::Running),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Running => "running",
        }
    }
}

/// Status of a whole tree as reported by [`TreeRunner`].
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum TreeStatus {
    /// Never run, or cleared.
    Idle,
    Success,
    Failure,
    Running,
    Interrupted,
}

impl From<Status> for TreeStatus {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => Self::Success,
            Status::Failure => Self::Failure,
            Status::Running => Self::Running,
        }
    }
}
