// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostic output through logwise when debug is configured.

logwise::declare_logging_domain!();

use std::sync::Arc;

use contextwise::hooks::{AsyncHooks, AsyncResource};
use contextwise::{Config, Registry};
use logwise::{InMemoryLogger, add_global_logger};

#[test]
fn debug_namespace_reports_operations() {
    let logger = Arc::new(InMemoryLogger::new());
    add_global_logger(logger.clone());

    let registry = Registry::with_hooks(AsyncHooks::new(), Config::default().with_debug(true));
    let ns = registry.create_namespace("debug-reporting").unwrap();
    let unit = ns.run_and_return(|_| {
        ns.set("k", 1u8).unwrap();
        AsyncResource::new(registry.hooks(), "Timeout")
    });
    unit.run_in_scope(|| {
        let _ = ns.get::<u8>("k");
    });
    ns.dump_contexts();

    let logs = logger.drain_logs();
    for tag in ["[run] begin", "[enter]", "[set]", "[init] with active", "[before]", "[after]", "[exit]", "[dump_contexts]"] {
        assert!(logs.contains(tag), "missing {tag} in:\n{logs}");
    }
    assert!(logs.contains("name: debug-reporting,"));
    // the callback body runs one level deep
    assert!(logs.contains("  [get]"));
}

#[test]
fn reports_survive_every_build_profile() {
    let logger = Arc::new(InMemoryLogger::new());
    add_global_logger(logger.clone());

    let registry = Registry::with_hooks(AsyncHooks::new(), Config::default().with_debug(true));
    let ns = registry.create_namespace("debug-profile").unwrap();
    ns.run(|_| {
        ns.set("k", 1u8).unwrap();
    });

    let logs = logger.drain_logs();
    assert!(logs.contains("name: debug-profile,"), "no debug output at all:\n{logs}");
    assert!(logs.contains("[set]"));
    assert!(logs.contains("[run] end"));
}

#[test]
fn quiet_namespace_reports_nothing() {
    let logger = Arc::new(InMemoryLogger::new());
    add_global_logger(logger.clone());

    let registry = Registry::with_hooks(AsyncHooks::new(), Config::default());
    let ns = registry.create_namespace("debug-quiet").unwrap();
    ns.run(|_| {
        ns.set("k", 1u8).unwrap();
    });
    ns.dump_contexts();

    let logs = logger.drain_logs();
    assert!(!logs.contains("debug-quiet"), "unexpected output:\n{logs}");
}
