//! Scoped publish/subscribe used for signalling between trees.
//!
//! Listeners are stored as `event -> target -> [listener]` and every listener
//! records the caller that owns it. A second index from caller to
//! `(event, target)` pairs makes [`EventBus::off_caller`] proportional to the
//! number of listeners that caller owns.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::{Symbol, Value};

/// Who an event is addressed to. Untargeted dispatches and subscriptions use
/// the shared [`Target::Global`] sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Global,
    Id(Symbol),
    /// An environment that was not given a name.
    Caller(CallerId),
}

impl Default for Target {
    fn default() -> Self {
        Self::Global
    }
}

impl<S: AsRef<str>> From<S> for Target {
    fn from(s: S) -> Self {
        Self::Id(s.as_ref().into())
    }
}

/// Identity of a listener owner, usually one [`crate::TreeEnv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerId(pub(crate) u64);

/// Handle of one subscription, returned by `on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type Callback = Rc<dyn Fn(&[Value])>;

struct Listener {
    id: ListenerId,
    caller: CallerId,
    callback: Callback,
}

#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<Symbol, HashMap<Target, Vec<Listener>>>,
    by_caller: HashMap<CallerId, HashSet<(Symbol, Target)>>,
    next_id: u64,
}

impl EventBus {
    pub fn on(
        &mut self,
        event: Symbol,
        target: Target,
        caller: CallerId,
        callback: Callback,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(event)
            .or_default()
            .entry(target)
            .or_default()
            .push(Listener {
                id,
                caller,
                callback,
            });
        self.by_caller
            .entry(caller)
            .or_default()
            .insert((event, target));
        id
    }

    /// Snapshot of the callbacks registered for `(event, target)`, in
    /// subscription order. The bus is not borrowed while they run.
    pub fn callbacks(&self, event: Symbol, target: Target) -> Vec<Callback> {
        self.listeners
            .get(&event)
            .and_then(|targets| targets.get(&target))
            .map(|listeners| listeners.iter().map(|l| l.callback.clone()).collect())
            .unwrap_or_default()
    }

    /// Remove every subscription `caller` holds on `event`, whatever the target.
    pub fn off(&mut self, event: Symbol, caller: CallerId) {
        let Some(keys) = self.by_caller.get_mut(&caller) else {
            return;
        };
        let targets: Vec<Target> = keys
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, t)| *t)
            .collect();
        for target in &targets {
            keys.remove(&(event, *target));
        }
        if keys.is_empty() {
            self.by_caller.remove(&caller);
        }
        for target in targets {
            self.retain(event, target, |l| l.caller != caller);
        }
    }

    /// Remove every subscription `caller` holds, across all events and targets.
    pub fn off_caller(&mut self, caller: CallerId) {
        let Some(keys) = self.by_caller.remove(&caller) else {
            return;
        };
        for (event, target) in keys {
            self.retain(event, target, |l| l.caller != caller);
        }
    }

    /// Remove a single subscription. Unknown ids are ignored.
    pub fn off_listener(&mut self, id: ListenerId, event: Symbol, target: Target) {
        let mut owner = None;
        self.retain(event, target, |l| {
            if l.id == id {
                owner = Some(l.caller);
                false
            } else {
                true
            }
        });
        let Some(caller) = owner else {
            return;
        };
        let still_listening = self
            .listeners
            .get(&event)
            .and_then(|targets| targets.get(&target))
            .map_or(false, |listeners| listeners.iter().any(|l| l.caller == caller));
        if !still_listening {
            if let Some(keys) = self.by_caller.get_mut(&caller) {
                keys.remove(&(event, target));
                if keys.is_empty() {
                    self.by_caller.remove(&caller);
                }
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .values()
            .flat_map(|targets| targets.values())
            .map(Vec::len)
            .sum()
    }

    pub fn has_caller(&self, caller: CallerId) -> bool {
        self.by_caller.contains_key(&caller)
    }

    fn retain(&mut self, event: Symbol, target: Target, mut keep: impl FnMut(&Listener) -> bool) {
        let Some(targets) = self.listeners.get_mut(&event) else {
            return;
        };
        if let Some(listeners) = targets.get_mut(&target) {
            listeners.retain(|l| keep(l));
            if listeners.is_empty() {
                targets.remove(&target);
            }
        }
        if targets.is_empty() {
            self.listeners.remove(&event);
        }
    }
}
