use std::{any::Any, collections::BTreeMap, fmt, rc::Rc};

use tracing::trace;

use crate::{
    error::{ExprError, RunError, RunResult},
    Process, Status, Symbol, TreeEnv, Value,
};

/// One compiled node. Nodes are immutable once a tree is loaded and can be
/// shared by any number of environments.
pub struct Node {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) desc: String,
    pub(crate) process: Rc<dyn Process>,
    pub(crate) args: BTreeMap<String, Value>,
    pub(crate) input: Vec<Option<Symbol>>,
    pub(crate) output: Vec<Option<Symbol>>,
    pub(crate) children: Vec<Rc<Node>>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("args", &self.args)
            .field("children", &self.children)
            .finish()
    }
}

impl Node {
    /// Pre-order index of this node in its tree, starting at 1.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn children(&self) -> &[Rc<Node>] {
        &self.children
    }

    pub fn args(&self) -> &BTreeMap<String, Value> {
        &self.args
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    pub fn arg_f64(&self, name: &str) -> Option<f64> {
        self.arg(name).and_then(Value::as_f64)
    }

    pub fn arg_i64(&self, name: &str) -> Option<i64> {
        self.arg(name).and_then(Value::as_i64)
    }

    pub fn arg_bool(&self, name: &str) -> Option<bool> {
        self.arg(name).and_then(Value::as_bool)
    }

    pub fn arg_str(&self, name: &str) -> Option<&str> {
        self.arg(name).and_then(Value::as_str)
    }

    /// Variable wired to input slot `i`, if any.
    pub fn input(&self, i: usize) -> Option<Symbol> {
        self.input.get(i).copied().flatten()
    }

    pub fn output(&self, i: usize) -> Option<Symbol> {
        self.output.get(i).copied().flatten()
    }

    pub fn inputs(&self) -> &[Option<Symbol>] {
        &self.input
    }

    pub fn outputs(&self) -> &[Option<Symbol>] {
        &self.output
    }

    /// Evaluate the expression held by arg `name` against the variables of `env`.
    pub fn evaluate(&self, env: &TreeEnv, name: &str) -> Result<Value, RunError> {
        let code = self.arg_str(name).ok_or_else(|| {
            RunError::Custom(format!(
                "{} #{}: no expression in {:?}",
                self.name, self.id, name
            ))
        })?;
        let expr = env
            .context()
            .compile_code(code)
            .map_err(|e| self.expr_error(e))?;
        expr.evaluate(env).map_err(|e| self.expr_error(e))
    }

    pub fn expr_error(&self, error: ExprError) -> RunError {
        RunError::Expr {
            node: self.name.clone(),
            id: self.id,
            error,
        }
    }

    pub fn bad_resume(&self) -> RunError {
        RunError::BadResume {
            node: self.name.clone(),
            id: self.id,
        }
    }

    /// Tick this node freshly: push a frame for it and run its process.
    pub fn tick(self: &Rc<Self>, env: &mut TreeEnv) -> RunResult {
        let depth = env.stack.len();
        env.stack.push(Frame::new(self.clone()));
        self.exec(env, depth)
    }

    /// Run the process for the frame at `depth`. A terminal status pops that
    /// frame along with anything above it.
    pub(crate) fn exec(&self, env: &mut TreeEnv, depth: usize) -> RunResult {
        if env.debug() {
            trace!(node = %self.name, id = self.id, depth, "exec");
        }
        let status = self.process.run(self, env)?;
        match status {
            Status::Running => {
                if let Some(frame) = env.stack.get_mut(depth) {
                    if frame.state.is_none() {
                        frame.state = Some(Box::new(()));
                    }
                }
            }
            _ => env.stack.truncate(depth),
        }
        if env.debug() {
            trace!(node = %self.name, id = self.id, status = status.name(), "done");
        }
        env.last_status = status;
        Ok(status)
    }

    /// Keep `payload` for the next time this node is resumed and report
    /// [`Status::Running`].
    pub fn suspend(&self, env: &mut TreeEnv, payload: impl Any) -> Status {
        if let Some(frame) = env.frame_mut(self) {
            frame.state = Some(Box::new(payload));
            frame.deadline = None;
        }
        Status::Running
    }

    /// Like [`Self::suspend`], but this node is resumed directly once the
    /// context clock reaches `deadline`, discarding whatever runs above it.
    pub fn suspend_until(&self, env: &mut TreeEnv, payload: impl Any, deadline: f64) -> Status {
        if let Some(frame) = env.frame_mut(self) {
            frame.state = Some(Box::new(payload));
            frame.deadline = Some(deadline);
        }
        Status::Running
    }

    /// Take the payload stored by the last suspend. `None` means a fresh tick.
    pub fn resume(&self, env: &mut TreeEnv) -> Option<Box<dyn Any>> {
        env.frame_mut(self).and_then(|frame| frame.state.take())
    }

    pub fn resume_as<T: 'static>(&self, env: &mut TreeEnv) -> Result<Option<T>, RunError> {
        match self.resume(env) {
            None => Ok(None),
            Some(state) => state
                .downcast::<T>()
                .map(|state| Some(*state))
                .map_err(|_| self.bad_resume()),
        }
    }

    /// Outcome of the child that just completed, for a resumed parent.
    pub fn child_result(&self, env: &TreeEnv) -> RunResult {
        match env.last_status() {
            Status::Running => Err(self.bad_resume()),
            status => Ok(status),
        }
    }

    fn walk<'a>(self: &'a Rc<Self>, out: &mut Vec<&'a Rc<Node>>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }
}

/// One entry of the run stack: a node that has been entered and not yet
/// completed, with its continuation.
pub(crate) struct Frame {
    pub(crate) node: Rc<Node>,
    pub(crate) state: Option<Box<dyn Any>>,
    pub(crate) deadline: Option<f64>,
}

impl Frame {
    fn new(node: Rc<Node>) -> Self {
        Self {
            node,
            state: None,
            deadline: None,
        }
    }
}

/// A compiled tree. Load it once and share it between runners with `Rc`.
#[derive(Debug)]
pub struct Tree {
    pub(crate) name: String,
    pub(crate) desc: String,
    pub(crate) root: Rc<Node>,
}

impl Tree {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn root(&self) -> &Rc<Node> {
        &self.root
    }

    /// All nodes in pre-order, which is also the order of their ids.
    pub fn nodes(&self) -> Vec<&Rc<Node>> {
        let mut ret = vec![];
        self.root.walk(&mut ret);
        ret
    }

    pub fn find(&self, id: u32) -> Option<&Rc<Node>> {
        self.nodes().into_iter().find(|node| node.id == id)
    }
}
