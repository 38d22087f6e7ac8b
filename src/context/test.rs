use super::*;
use std::cell::RefCell;

fn recorder() -> (Rc<RefCell<Vec<Value>>>, impl Fn(&[Value]) + Clone + 'static) {
    let seen = Rc::new(RefCell::new(vec![]));
    let sink = seen.clone();
    (seen, move |args: &[Value]| {
        sink.borrow_mut().extend(args.iter().cloned())
    })
}

#[test]
fn test_compile_code_is_cached() {
    let ctx = Context::default();
    let a = ctx.compile_code("hp > 0").unwrap();
    let b = ctx.compile_code("hp > 0").unwrap();
    assert!(Rc::ptr_eq(&a, &b));
    assert_eq!(ctx.cached_exprs(), 1);
    assert!(ctx.compile_code("hp >").is_err());
    assert_eq!(ctx.cached_exprs(), 1);
}

#[test]
fn test_dispatch_respects_target() {
    let ctx = Context::default();
    let caller = ctx.new_caller();
    let (global, on_global) = recorder();
    let (targeted, on_targeted) = recorder();
    ctx.on("hit", Target::Global, caller, on_global);
    ctx.on("hit", Target::from("orc"), caller, on_targeted);

    assert_eq!(ctx.dispatch("hit", &[Value::from(1)]), 1);
    assert_eq!(ctx.dispatch_target("hit", "orc".into(), &[Value::from(2)]), 1);
    assert_eq!(ctx.dispatch_target("hit", "elf".into(), &[Value::from(3)]), 0);

    assert_eq!(*global.borrow(), vec![Value::from(1)]);
    assert_eq!(*targeted.borrow(), vec![Value::from(2)]);
}

#[test]
fn test_off_only_removes_one_event() {
    let ctx = Context::default();
    let caller = ctx.new_caller();
    let other = ctx.new_caller();
    let (seen, cb) = recorder();
    ctx.on("a", Target::Global, caller, cb.clone());
    ctx.on("a", Target::from("x"), caller, cb.clone());
    ctx.on("b", Target::Global, caller, cb.clone());
    ctx.on("a", Target::Global, other, cb);

    ctx.off("a", caller);
    assert_eq!(ctx.dispatch("a", &[Value::from("a")]), 1);
    assert_eq!(ctx.dispatch_target("a", "x".into(), &[]), 0);
    assert_eq!(ctx.dispatch("b", &[Value::from("b")]), 1);
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn test_off_caller_removes_everything_owned() {
    let ctx = Context::default();
    let caller = ctx.new_caller();
    let other = ctx.new_caller();
    let (_, cb) = recorder();
    for event in ["a", "b", "c"] {
        ctx.on(event, Target::Global, caller, cb.clone());
        ctx.on(event, Target::from("t"), caller, cb.clone());
    }
    ctx.on("a", Target::Global, other, cb);
    assert_eq!(ctx.listener_count(), 7);

    ctx.off_caller(caller);
    assert_eq!(ctx.listener_count(), 1);
    assert!(!ctx.has_listeners(caller));
    assert!(ctx.has_listeners(other));
    assert_eq!(ctx.dispatch("b", &[]), 0);
}

#[test]
fn test_subscription_guard() {
    let ctx = Rc::new(Context::default());
    let caller = ctx.new_caller();
    let (seen, cb) = recorder();
    let sub = ctx.subscribe("ping", Target::Global, caller, cb);
    ctx.dispatch("ping", &[Value::Null]);
    drop(sub);
    ctx.dispatch("ping", &[Value::Null]);
    assert_eq!(seen.borrow().len(), 1);
    assert!(!ctx.has_listeners(caller));
}

#[test]
fn test_unsubscribe_during_dispatch() {
    let ctx = Rc::new(Context::default());
    let caller = ctx.new_caller();
    let count = Rc::new(Cell::new(0));
    let inner_ctx = ctx.clone();
    let inner_count = count.clone();
    ctx.on("tick", Target::Global, caller, move |_| {
        inner_count.set(inner_count.get() + 1);
        inner_ctx.off_caller(caller);
    });
    assert_eq!(ctx.dispatch("tick", &[]), 1);
    assert_eq!(ctx.dispatch("tick", &[]), 0);
    assert_eq!(count.get(), 1);
}

#[test]
fn test_clock() {
    let ctx = Context::default();
    ctx.set_time(1.5);
    ctx.advance(0.5);
    assert_eq!(ctx.time(), 2.);
}
