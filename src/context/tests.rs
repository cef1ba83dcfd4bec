// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests for the context module.

use super::context_impl::{Context, Value, value};
use crate::hooks::AsyncId;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::*;
#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn test_inherited_lookup() {
    let root = Context::new(None, "ns", AsyncId::ROOT);
    root.set("a", 1u32);
    root.set("b", "root".to_string());

    let child = Context::new(Some(root.clone()), "ns", AsyncId::ROOT);
    child.set("b", "child".to_string());

    assert_eq!(child.get::<u32>("a"), Some(1));
    assert_eq!(child.get::<String>("b").as_deref(), Some("child"));
    // writes on the child never reach the parent
    assert_eq!(root.get::<String>("b").as_deref(), Some("root"));
    assert_eq!(child.keys(), vec!["b".to_string()]);
    assert!(child.contains_key("a"));
    assert!(!child.contains_key("c"));
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn test_type_mismatch_is_none() {
    let context = Context::new(None, "ns", AsyncId::ROOT);
    context.set("n", 7i64);
    assert_eq!(context.get::<i32>("n"), None);
    assert_eq!(context.get::<i64>("n"), Some(7));
    let raw: Value = context.get_value("n").unwrap();
    assert_eq!(raw.downcast_ref::<i64>(), Some(&7));
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn test_set_value_raw() {
    let context = Context::new(None, "ns", AsyncId::ROOT);
    context.set_value("raw", value(vec![1u8, 2, 3]));
    assert_eq!(context.get::<Vec<u8>>("raw"), Some(vec![1, 2, 3]));
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn test_context_equality() {
    let context1 = Context::new(None, "ns", AsyncId::ROOT);
    let context2 = context1.clone();
    let context3 = Context::new(None, "ns", AsyncId::ROOT);

    // Same Arc pointer should be equal
    assert_eq!(context1, context2);

    // Different Arc pointers should not be equal, even with identical contents
    assert_ne!(context1, context3);
    assert_ne!(context1.context_id(), context3.context_id());
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[allow(clippy::mutable_key_type)] // Context hash is based on Arc pointer, not interior state
fn test_context_hash() {
    use std::collections::HashMap;

    let context1 = Context::new(None, "ns", AsyncId::ROOT);
    let context2 = context1.clone();
    let context3 = Context::new(None, "ns", AsyncId::ROOT);

    let mut map = HashMap::new();
    map.insert(context1.clone(), "value1");
    map.insert(context3.clone(), "value3");
    context1.set("mutated", true);

    assert_eq!(map.get(&context1), Some(&"value1"));
    assert_eq!(map.get(&context2), Some(&"value1")); // same as context1
    assert_eq!(map.get(&context3), Some(&"value3"));
    assert_eq!(map.len(), 2);
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
fn test_context_display() {
    let root = Context::new(None, "display", AsyncId::ROOT);
    let root_display = format!("{}", root);
    assert_eq!(root_display, format!("{} (display@1)", root.context_id()));

    let child = Context::new(Some(root.clone()), "display", AsyncId::ROOT);
    let grandchild = Context::new(Some(child.clone()), "display", AsyncId::ROOT);

    assert!(format!("{}", child).starts_with("  "));
    assert!(format!("{}", grandchild).starts_with("    "));
    assert_eq!(grandchild.nesting_level(), 2);
    assert_eq!(grandchild.parent(), Some(&child));
    assert_eq!(grandchild.namespace_name(), "display");
}
