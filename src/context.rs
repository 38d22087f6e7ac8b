use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::{
    error::ExprError,
    event::{CallerId, EventBus, ListenerId, Target},
    expr::Expr,
    Process, Registry, Symbol, Value,
};

/// Services shared by every tree and every environment of one application:
/// the process registry, the expression cache, the event bus and the clock.
///
/// A `Context` is created once, wrapped in an `Rc` and handed to each
/// [`crate::TreeEnv`]. The registry is fixed at construction; everything else
/// uses interior mutability, since ticking is single-threaded.
pub struct Context {
    registry: Registry,
    exprs: RefCell<HashMap<String, Rc<Expr>>>,
    bus: RefCell<EventBus>,
    time: Cell<f64>,
    next_caller: Cell<u64>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Registry::default())
    }
}

impl Context {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            exprs: RefCell::new(HashMap::new()),
            bus: RefCell::new(EventBus::default()),
            time: Cell::new(0.),
            next_caller: Cell::new(0),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn process(&self, name: &str) -> Option<&Rc<dyn Process>> {
        self.registry.get(name)
    }

    /// Parse `code` once and share the result with every later caller using
    /// the same source text.
    pub fn compile_code(&self, code: &str) -> Result<Rc<Expr>, ExprError> {
        if let Some(expr) = self.exprs.borrow().get(code) {
            return Ok(expr.clone());
        }
        let expr = Rc::new(Expr::parse(code)?);
        self.exprs
            .borrow_mut()
            .insert(code.to_owned(), expr.clone());
        Ok(expr)
    }

    pub fn cached_exprs(&self) -> usize {
        self.exprs.borrow().len()
    }

    pub fn time(&self) -> f64 {
        self.time.get()
    }

    pub fn set_time(&self, time: f64) {
        self.time.set(time);
    }

    pub fn advance(&self, dt: f64) {
        self.time.set(self.time.get() + dt);
    }

    pub(crate) fn new_caller(&self) -> CallerId {
        let id = self.next_caller.get() + 1;
        self.next_caller.set(id);
        CallerId(id)
    }

    pub fn on(
        &self,
        event: impl Into<Symbol>,
        target: Target,
        caller: CallerId,
        callback: impl Fn(&[Value]) + 'static,
    ) -> ListenerId {
        self.bus
            .borrow_mut()
            .on(event.into(), target, caller, Rc::new(callback))
    }

    /// Subscribe and get a guard that unsubscribes when dropped.
    pub fn subscribe(
        self: &Rc<Self>,
        event: impl Into<Symbol>,
        target: Target,
        caller: CallerId,
        callback: impl Fn(&[Value]) + 'static,
    ) -> Subscription {
        let event = event.into();
        let id = self.on(event, target, caller, callback);
        Subscription {
            context: self.clone(),
            event,
            target,
            id,
        }
    }

    /// Deliver an untargeted event.
    pub fn dispatch(&self, event: impl Into<Symbol>, args: &[Value]) -> usize {
        self.dispatch_target(event, Target::Global, args)
    }

    /// Deliver an event to the listeners of `(event, target)` and return how
    /// many were called. Listeners may subscribe or unsubscribe from inside the
    /// callback; such changes apply to the next dispatch.
    pub fn dispatch_target(&self, event: impl Into<Symbol>, target: Target, args: &[Value]) -> usize {
        let callbacks = self.bus.borrow().callbacks(event.into(), target);
        for callback in &callbacks {
            callback(args);
        }
        callbacks.len()
    }

    pub fn off(&self, event: impl Into<Symbol>, caller: CallerId) {
        self.bus.borrow_mut().off(event.into(), caller);
    }

    pub fn off_caller(&self, caller: CallerId) {
        self.bus.borrow_mut().off_caller(caller);
    }

    pub fn off_listener(&self, id: ListenerId, event: impl Into<Symbol>, target: Target) {
        self.bus.borrow_mut().off_listener(id, event.into(), target);
    }

    pub fn listener_count(&self) -> usize {
        self.bus.borrow().listener_count()
    }

    pub fn has_listeners(&self, caller: CallerId) -> bool {
        self.bus.borrow().has_caller(caller)
    }
}

/// Keeps one event subscription alive; dropping it unsubscribes.
pub struct Subscription {
    context: Rc<Context>,
    event: Symbol,
    target: Target,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.context.off_listener(self.id, self.event, self.target);
    }
}

#[cfg(test)]
mod test;
