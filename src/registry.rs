use crate::{
    nodes::{
        action::{
            CalculateProcess, ClearProcess, LetProcess, LogProcess, NowProcess, PushProcess,
            WaitProcess,
        },
        composite::{
            ForeachProcess, IfElseProcess, LoopProcess, ParallelProcess, SelectorProcess,
            SequenceProcess,
        },
        condition::{CheckProcess, IsNullProcess, IsStatusProcess, NotNullProcess},
        decorator::{
            AlwaysFailProcess, AlwaysRunningProcess, AlwaysSuccessProcess, AssertProcess,
            DelayProcess, InverterProcess, ListenProcess, ListenTreeProcess, OnceProcess,
            RepeatUntilProcess, TimeoutProcess,
        },
    },
    NodeDef, Process, Status,
};
use std::{collections::HashMap, rc::Rc};

/// Table of node types by name. Each process is instantiated once and shared
/// by every node of its type in every tree.
pub struct Registry {
    processes: HashMap<String, Rc<dyn Process>>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut ret = Self::empty();
        ret.register(SequenceProcess);
        ret.register(SelectorProcess);
        ret.register(ParallelProcess);
        ret.register(IfElseProcess);
        ret.register(LoopProcess);
        ret.register(ForeachProcess);
        ret.register(InverterProcess);
        ret.register(RepeatUntilProcess::new(Status::Success));
        ret.register(RepeatUntilProcess::new(Status::Failure));
        ret.register(TimeoutProcess);
        ret.register(DelayProcess);
        ret.register(OnceProcess);
        ret.register(AssertProcess);
        ret.register(AlwaysSuccessProcess);
        ret.register(AlwaysFailProcess);
        ret.register(AlwaysRunningProcess);
        ret.register(ListenProcess);
        ret.register(ListenTreeProcess);
        ret.register(CheckProcess);
        ret.register(IsNullProcess);
        ret.register(NotNullProcess);
        ret.register(IsStatusProcess);
        ret.register(CalculateProcess);
        ret.register(LetProcess);
        ret.register(PushProcess);
        ret.register(ClearProcess);
        ret.register(LogProcess);
        ret.register(NowProcess);
        ret.register(WaitProcess);
        ret
    }
}

impl Registry {
    /// A registry without even the built-in node types.
    pub fn empty() -> Self {
        Self {
            processes: HashMap::new(),
        }
    }

    /// Register a process under the name in its descriptor, replacing any
    /// process previously registered with that name.
    pub fn register(&mut self, process: impl Process + 'static) {
        let name = process.descriptor().name;
        self.processes.insert(name.to_owned(), Rc::new(process));
    }

    pub fn get(&self, name: &str) -> Option<&Rc<dyn Process>> {
        self.processes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processes.contains_key(name)
    }

    /// Descriptors of all registered node types, sorted by name.
    pub fn node_defs(&self) -> Vec<NodeDef> {
        let mut defs: Vec<_> = self.processes.values().map(|p| p.descriptor()).collect();
        defs.sort_by_key(|def| def.name);
        defs
    }

    /// Serialize [`Self::node_defs`] for an editor or other tooling.
    pub fn export_defs(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.node_defs())
    }
}
