// SPDX-License-Identifier: MIT OR Apache-2.0

//! Listeners re-entering the contexts they were attached in.

logwise::declare_logging_domain!();

use std::sync::{Arc, Mutex};

use contextwise::{Config, EventEmitter, Namespace, Registry, Value, value};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;

type Seen = Arc<Mutex<Vec<(Option<u32>, Option<u32>)>>>;

fn recorder(first: &Namespace, second: &Namespace) -> (Seen, impl Fn(&[Value]) + Send + Sync + 'static) {
    let seen: Seen = Arc::default();
    let (s, a, b) = (seen.clone(), first.clone(), second.clone());
    (seen, move |_: &[Value]| {
        s.lock().unwrap().push((a.get::<u32>("v"), b.get::<u32>("v")));
    })
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn listener_sees_attach_time_context() {
    let registry = Registry::new();
    let ns = registry.create_namespace("one").unwrap();
    let other = registry.create_namespace("unbound").unwrap();
    let emitter = EventEmitter::new();
    ns.bind_emitter(&emitter);

    let (seen, listener) = recorder(&ns, &other);
    ns.run(|_| {
        ns.set("v", 1u32).unwrap();
        emitter.on("data", listener);
    });

    emitter.emit("data", &[]);
    ns.run(|_| {
        ns.set("v", 2u32).unwrap();
        emitter.emit("data", &[value("payload")]);
    });
    assert_eq!(*seen.lock().unwrap(), vec![(Some(1), None), (Some(1), None)]);
    assert!(ns.active().is_none());
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn two_namespaces_compose() {
    let registry = Registry::new();
    let n1 = registry.create_namespace("n1").unwrap();
    let n2 = registry.create_namespace("n2").unwrap();
    let emitter = EventEmitter::new();
    n1.bind_emitter(&emitter);
    n2.bind_emitter(&emitter);
    n2.bind_emitter(&emitter);

    let (seen, listener) = recorder(&n1, &n2);
    let (c1, c2) = n1.run_and_return(|c1| {
        n2.run_and_return(|c2| {
            emitter.on("data", listener);
            (c1.clone(), c2.clone())
        })
    });
    c1.set("v", 10u32);
    c2.set("v", 20u32);

    emitter.emit("data", &[]);
    assert_eq!(*seen.lock().unwrap(), vec![(Some(10), Some(20))]);
    assert!(n1.active().is_none());
    assert!(n2.active().is_none());
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn listener_without_context_stays_bare() {
    let registry = Registry::new();
    let ns = registry.create_namespace("bare").unwrap();
    let emitter = EventEmitter::new();
    ns.bind_emitter(&emitter);

    let (seen, listener) = recorder(&ns, &ns);
    emitter.on("data", listener);
    ns.run(|_| {
        ns.set("v", 5u32).unwrap();
        emitter.emit("data", &[]);
    });
    emitter.emit("data", &[]);
    assert_eq!(*seen.lock().unwrap(), vec![(Some(5), Some(5)), (None, None)]);
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn listeners_attached_before_binding_are_left_alone() {
    let registry = Registry::new();
    let ns = registry.create_namespace("late").unwrap();
    let emitter = EventEmitter::new();

    let (seen, listener) = recorder(&ns, &ns);
    ns.run(|_| {
        ns.set("v", 1u32).unwrap();
        emitter.on("data", listener);
        ns.bind_emitter(&emitter);
    });
    emitter.emit("data", &[]);
    assert_eq!(*seen.lock().unwrap(), vec![(None, None)]);
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn once_listener_runs_in_context_once() {
    let registry = Registry::new();
    let ns = registry.create_namespace("once").unwrap();
    let emitter = EventEmitter::new();
    ns.bind_emitter(&emitter);

    let (seen, listener) = recorder(&ns, &ns);
    ns.run(|_| {
        ns.set("v", 3u32).unwrap();
        emitter.once("data", listener);
    });
    assert!(emitter.emit("data", &[]));
    assert!(!emitter.emit("data", &[]));
    assert_eq!(*seen.lock().unwrap(), vec![(Some(3), Some(3))]);
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn panicking_listener_leaves_everything_consistent() {
    let registry = Registry::new();
    let ns = registry.create_namespace("panics").unwrap();
    let emitter = EventEmitter::new();
    ns.bind_emitter(&emitter);

    ns.run(|_| {
        emitter.on("data", |_| panic!("listener failed"));
    });
    let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        emitter.emit("data", &[]);
    }));
    assert!(r.is_err());
    assert!(ns.active().is_none());
    assert_eq!(ns.stack_depth(), 0);
    assert_eq!(emitter.listener_count("data"), 1);

    emitter.on("other", |_| {});
    assert!(emitter.emit("other", &[]));
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn bindings_do_not_keep_contexts_alive() {
    let registry = Registry::new();
    let ns = registry.create_namespace("weak").unwrap();
    let emitter = EventEmitter::new();
    ns.bind_emitter(&emitter);

    let (seen, listener) = recorder(&ns, &ns);
    let probe = Arc::new(());
    let ctx = ns.create_context();
    ctx.set("v", 8u32);
    ctx.set("probe", probe.clone());
    ns.enter(&ctx);
    emitter.on("data", listener);
    ns.exit(&ctx).unwrap();

    drop(ctx);
    assert_eq!(Arc::strong_count(&probe), 1);

    emitter.emit("data", &[]);
    assert_eq!(*seen.lock().unwrap(), vec![(None, None)]);
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn strong_references_keep_contexts_alive() {
    let registry = Registry::with_hooks(
        contextwise::hooks::AsyncHooks::new(),
        Config::default().with_weak_references(false),
    );
    let ns = registry.create_namespace("strong").unwrap();
    let emitter = EventEmitter::new();
    ns.bind_emitter(&emitter);

    let (seen, listener) = recorder(&ns, &ns);
    let ctx = ns.create_context();
    ctx.set("v", 8u32);
    ns.enter(&ctx);
    emitter.on("data", listener);
    ns.exit(&ctx).unwrap();
    drop(ctx);

    emitter.emit("data", &[]);
    assert_eq!(*seen.lock().unwrap(), vec![(Some(8), Some(8))]);
}
