//! Built-in node types.
//!
//! Every process here is a unit struct registered once in
//! [`crate::Registry::default`]. Whatever a node needs to remember between
//! ticks travels through [`crate::Node::suspend`] and
//! [`crate::Node::resume_as`], never through the process itself.

pub mod action;
pub mod composite;
pub mod condition;
pub mod decorator;

use crate::{Node, RunResult, Status, TreeEnv};

/// Tick the only child of a decorator, or pick up its outcome when the
/// decorator is being resumed after the child completed.
fn tick_child(node: &Node, env: &mut TreeEnv) -> RunResult {
    if node.resume(env).is_some() {
        return node.child_result(env);
    }
    match node.children().first() {
        Some(child) => child.tick(env),
        None => Ok(Status::Failure),
    }
}

#[cfg(test)]
mod test;
