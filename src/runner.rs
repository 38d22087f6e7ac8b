use std::rc::Rc;

use tracing::{debug, error};

use crate::{error::RunError, InterruptHandle, Status, Tree, TreeEnv, TreeStatus};

/// Lifecycle notifications of a [`TreeRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerEvent {
    /// A run is about to start from the root.
    BeforeRun,
    /// The tree completed, with either status.
    AfterRun,
    AfterRunSuccess,
    AfterRunFailure,
    /// A running tree was abandoned.
    Interrupted,
    /// An `Assert` node failed; the run is reported as a failure.
    AssertFailed,
}

type RunnerCallback = Box<dyn FnMut(&TreeEnv)>;

/// Drives one shared [`Tree`] with one [`TreeEnv`].
///
/// Call [`Self::run`] once per host tick. While the tree is running the
/// runner resumes the suspended nodes instead of walking from the root.
pub struct TreeRunner {
    tree: Rc<Tree>,
    env: TreeEnv,
    listeners: Vec<(RunnerEvent, RunnerCallback)>,
}

impl TreeRunner {
    pub fn new(tree: Rc<Tree>, env: TreeEnv) -> Self {
        Self {
            tree,
            env,
            listeners: vec![],
        }
    }

    pub fn tree(&self) -> &Rc<Tree> {
        &self.tree
    }

    pub fn env(&self) -> &TreeEnv {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut TreeEnv {
        &mut self.env
    }

    /// Status of the last run. A pending interrupt of a running tree already
    /// reads as [`TreeStatus::Interrupted`].
    pub fn status(&self) -> TreeStatus {
        if self.env.interrupted.get() && self.is_running() {
            TreeStatus::Interrupted
        } else {
            self.env.status
        }
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.env.interrupt_handle()
    }

    pub fn on(&mut self, event: RunnerEvent, callback: impl FnMut(&TreeEnv) + 'static) {
        self.listeners.push((event, Box::new(callback)));
    }

    /// Tick the tree once.
    pub fn run(&mut self) -> TreeStatus {
        // a request made while nothing was running is dropped
        if self.env.interrupted.replace(false) && self.is_running() {
            self.abort();
            return TreeStatus::Interrupted;
        }

        let result = if self.env.stack.is_empty() {
            self.dispatch(RunnerEvent::BeforeRun);
            let root = self.tree.root.clone();
            root.tick(&mut self.env)
        } else {
            self.env.resume_stack()
        };

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                match &e {
                    RunError::Assertion { .. } => {
                        error!(tree = %self.tree.name, error = %e, "assertion failed");
                        self.dispatch(RunnerEvent::AssertFailed);
                    }
                    _ => error!(tree = %self.tree.name, error = %e, "run failed"),
                }
                self.env.unwind();
                Status::Failure
            }
        };

        self.env.status = status.into();
        match status {
            Status::Running => (),
            Status::Success => {
                self.dispatch(RunnerEvent::AfterRun);
                self.dispatch(RunnerEvent::AfterRunSuccess);
            }
            Status::Failure => {
                self.dispatch(RunnerEvent::AfterRun);
                self.dispatch(RunnerEvent::AfterRunFailure);
            }
        }
        if status != Status::Running {
            self.env.interrupted.set(false);
        }
        self.env.status
    }

    /// Abandon a running tree now. Does nothing unless the tree is running.
    pub fn interrupt(&mut self) {
        if !self.is_running() {
            return;
        }
        self.env.interrupted.set(false);
        self.abort();
    }

    /// Reset to the initial state and drop every event subscription made on
    /// behalf of this runner's environment.
    pub fn clear(&mut self) {
        if self.env.status == TreeStatus::Running {
            self.interrupt();
        }
        self.env.unwind();
        self.env.clear_vars();
        self.env.completed.clear();
        self.env.interrupted.set(false);
        self.env.context().off_caller(self.env.caller());
        self.env.status = TreeStatus::Idle;
    }

    fn is_running(&self) -> bool {
        self.env.status == TreeStatus::Running && !self.env.stack.is_empty()
    }

    fn abort(&mut self) {
        debug!(tree = %self.tree.name, depth = self.env.stack_len(), "interrupted");
        self.dispatch(RunnerEvent::Interrupted);
        self.env.unwind();
        self.env.status = TreeStatus::Interrupted;
    }

    fn dispatch(&mut self, event: RunnerEvent) {
        let env = &self.env;
        for (_, callback) in self.listeners.iter_mut().filter(|(e, _)| *e == event) {
            callback(env);
        }
    }
}
