use std::{
    cell::Cell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use tracing::debug;

use crate::{
    error::RunResult,
    event::{CallerId, Target},
    expr::Scope,
    node::Frame,
    Context, Node, Status, Symbol, TreeStatus, Value,
};

/// Mutable state of one actor: blackboard variables and the stack of
/// suspended nodes. A compiled [`crate::Tree`] holds none of this, so any
/// number of environments can run the same tree.
///
/// Variables whose names start with `__` are temporary. They are discarded
/// whenever the run stack is unwound by an interrupt or a runtime error.
pub struct TreeEnv {
    context: Rc<Context>,
    caller: CallerId,
    target: Target,
    vars: HashMap<Symbol, Value>,
    /// Ids of `Once` nodes whose child has completed.
    pub(crate) completed: HashSet<u32>,
    pub(crate) stack: Vec<Frame>,
    pub(crate) last_status: Status,
    pub(crate) status: TreeStatus,
    pub(crate) interrupted: Rc<Cell<bool>>,
    debug: bool,
}

impl TreeEnv {
    pub fn new(context: Rc<Context>) -> Self {
        let caller = context.new_caller();
        Self {
            context,
            caller,
            target: Target::Caller(caller),
            vars: HashMap::new(),
            completed: HashSet::new(),
            stack: vec![],
            last_status: Status::Success,
            status: TreeStatus::Idle,
            interrupted: Rc::new(Cell::new(false)),
            debug: false,
        }
    }

    /// Address this environment as `target` on the event bus, e.g. the id of
    /// the game object it drives. Defaults to [`Target::Caller`] with its own
    /// caller id.
    pub fn with_target(mut self, target: impl Into<Target>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn context(&self) -> &Rc<Context> {
        &self.context
    }

    /// Owner id of every listener registered on behalf of this environment.
    pub fn caller(&self) -> CallerId {
        self.caller
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn get(&self, key: impl Into<Symbol>) -> Option<&Value> {
        self.vars.get(&key.into())
    }

    pub fn set(&mut self, key: impl Into<Symbol>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: impl Into<Symbol>) -> Option<Value> {
        self.vars.remove(&key.into())
    }

    pub fn vars(&self) -> &HashMap<Symbol, Value> {
        &self.vars
    }

    pub fn clear_vars(&mut self) {
        self.vars.clear();
    }

    pub fn is_temp_var(name: &str) -> bool {
        name.starts_with("__")
    }

    pub fn clear_temp_vars(&mut self) {
        self.vars.retain(|key, _| !Self::is_temp_var(key));
    }

    /// Value of the variable wired to input slot `i` of `node`.
    pub fn input(&self, node: &Node, i: usize) -> Option<&Value> {
        node.input(i).and_then(|key| self.vars.get(&key))
    }

    /// Current value of the variable wired to output slot `i` of `node`.
    pub fn output_value(&self, node: &Node, i: usize) -> Option<&Value> {
        node.output(i).and_then(|key| self.vars.get(&key))
    }

    /// Write the variable wired to output slot `i`. Unwired slots are ignored.
    pub fn set_output(&mut self, node: &Node, i: usize, value: impl Into<Value>) {
        if let Some(key) = node.output(i) {
            self.vars.insert(key, value.into());
        }
    }

    /// Status of the node that completed most recently.
    pub fn last_status(&self) -> Status {
        self.last_status
    }

    /// Status of the last run of the tree.
    pub fn status(&self) -> TreeStatus {
        self.status
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Nodes on the run stack, from the root to the innermost running one.
    pub fn running_nodes(&self) -> impl Iterator<Item = &Rc<Node>> + '_ {
        self.stack.iter().map(|frame| &frame.node)
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(self.interrupted.clone())
    }

    pub(crate) fn frame_mut(&mut self, node: &Node) -> Option<&mut Frame> {
        self.stack
            .iter_mut()
            .rev()
            .find(|frame| std::ptr::eq(frame.node.as_ref(), node))
    }

    /// Continue a suspended run: resume the innermost frame, then each frame
    /// below it as the ones above complete.
    pub(crate) fn resume_stack(&mut self) -> RunResult {
        self.expire_deadlines();
        let Some(mut depth) = self.stack.len().checked_sub(1) else {
            return Ok(self.last_status);
        };
        loop {
            let node = self.stack[depth].node.clone();
            let status = node.exec(self, depth)?;
            if status == Status::Running || depth == 0 {
                return Ok(status);
            }
            depth -= 1;
        }
    }

    /// Frames above the outermost expired deadline are dropped, so the node
    /// that armed it is the one resumed.
    fn expire_deadlines(&mut self) {
        let now = self.context.time();
        let expired = self
            .stack
            .iter()
            .position(|frame| frame.deadline.map_or(false, |deadline| deadline <= now));
        if let Some(i) = expired {
            if self.debug {
                debug!(node = %self.stack[i].node.name(), now, "deadline expired");
            }
            self.stack.truncate(i + 1);
        }
    }

    /// Abandon the current run.
    pub(crate) fn unwind(&mut self) {
        self.stack.clear();
        self.clear_temp_vars();
    }
}

impl Scope for TreeEnv {
    fn get(&self, key: Symbol) -> Option<&Value> {
        self.vars.get(&key)
    }
}

impl Drop for TreeEnv {
    fn drop(&mut self) {
        self.stack.clear();
        self.context.off_caller(self.caller);
    }
}

/// Requests an interrupt from outside the runner, for example from an event
/// callback. It takes effect at the start of the runner's next run.
#[derive(Clone)]
pub struct InterruptHandle(Rc<Cell<bool>>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.set(true);
    }

    pub fn is_pending(&self) -> bool {
        self.0.get()
    }
}
