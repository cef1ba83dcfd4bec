// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostic reporting.
//!
//! When [`Config::debug`](crate::Config::debug) is set, namespaces describe each
//! internal operation as a [`Snapshot`] and hand it to [`print_debug`], which
//! indents it by the namespace's nesting depth and sends it through logwise.
//! When debug is off the snapshot closure never runs.
//!
//! Debug builds report at info level. logwise compiles `info` out of release
//! builds, so there the same reports go out as warnings instead.

use std::fmt::{Debug, Display, Write};

/// Spaces per indent level.
const INDENT_SIZE: usize = 2;

/// Key/value description of one internal operation.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    fields: Vec<(&'static str, String)>,
}

impl Snapshot {
    pub(crate) fn field(&mut self, key: &'static str, value: impl Display) -> &mut Self {
        self.fields.push((key, value.to_string()));
        self
    }

    pub(crate) fn debug_field(&mut self, key: &'static str, value: impl Debug) -> &mut Self {
        self.fields.push((key, format!("{value:?}")));
        self
    }

    fn render(&self, message: &str) -> String {
        let mut out = String::new();
        out.push_str(message);
        if !self.fields.is_empty() {
            out.push_str(" {\n");
            for (key, value) in &self.fields {
                let _ = writeln!(out, "  {key}: {value},");
            }
            out.push('}');
        }
        out
    }
}

/// Renders `message` plus whatever `describe` records, indented by `indent` levels.
pub(crate) fn render(message: &str, indent: usize, describe: impl FnOnce(&mut Snapshot)) -> String {
    let mut snapshot = Snapshot::default();
    describe(&mut snapshot);
    let text = snapshot.render(message);
    if indent == 0 {
        return text;
    }
    let pad = " ".repeat(indent * INDENT_SIZE);
    text.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reports one operation if `enabled`.
#[inline]
pub(crate) fn print_debug(enabled: bool, message: &str, indent: usize, describe: impl FnOnce(&mut Snapshot)) {
    if !enabled {
        return;
    }
    let text = render(message, indent, describe);
    #[cfg(debug_assertions)]
    logwise::info_sync!("{text}", text = text);
    #[cfg(not(debug_assertions))]
    logwise::warn_sync!("{text}", text = text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_arch = "wasm32")]
    use wasm_bindgen_test::*;

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn render_without_fields() {
        assert_eq!(render("[reset]", 0, |_| {}), "[reset]");
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn render_indents_every_line() {
        let text = render("[enter]", 2, |s| {
            s.field("name", "ns").debug_field("stack", vec![1, 2]);
        });
        for line in text.lines() {
            assert!(line.starts_with("    "), "line not indented: {line:?}");
        }
        assert!(text.contains("name: ns,"));
        assert!(text.contains("stack: [1, 2],"));
    }

    #[cfg_attr(not(target_arch = "wasm32"), test)]
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
    fn disabled_reporter_skips_description() {
        let mut described = false;
        print_debug(false, "[get]", 0, |_| described = true);
        assert!(!described);
    }
}
