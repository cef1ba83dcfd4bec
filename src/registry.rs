// SPDX-License-Identifier: MIT OR Apache-2.0

//! Namespace registry and the process-wide default.
//!
//! A [`Registry`] owns a set of uniquely named namespaces and wires each one to
//! its [`AsyncHooks`] host: creating a namespace registers and enables a hook
//! that delivers unit notifications to it, and destroying the namespace disables
//! that hook again.
//!
//! Most programs share one registry, available as [`Registry::global`] and
//! through the free functions [`create_namespace`], [`get_namespace`],
//! [`destroy_namespace`] and [`reset`]. The global registry uses
//! [`AsyncHooks::global`] and reads its [`Config`] from the environment once, on
//! first use.
//!
//! ```
//! let ns = contextwise::create_namespace("registry-docs").unwrap();
//! assert_eq!(contextwise::get_namespace("registry-docs"), Some(ns));
//! contextwise::destroy_namespace("registry-docs");
//! assert!(contextwise::get_namespace("registry-docs").is_none());
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::config::Config;
use crate::error::Error;
use crate::hooks::{AsyncHook, AsyncHooks};
use crate::namespace::Namespace;

struct Entry {
    namespace: Namespace,
    hook: AsyncHook,
}

/// A set of uniquely named namespaces sharing one lifecycle host.
///
/// Dropping the registry disables its namespaces' hooks. The namespaces
/// themselves stay usable through any remaining handles.
pub struct Registry {
    hooks: AsyncHooks,
    config: Config,
    namespaces: Mutex<HashMap<String, Entry>>,
}

impl Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.namespaces().keys().cloned().collect();
        names.sort();
        f.debug_struct("Registry")
            .field("config", &self.config)
            .field("namespaces", &names)
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        // hooks own their namespaces; namespaces own the host
        for entry in self.namespaces().values() {
            entry.hook.disable();
        }
    }
}

static GLOBAL_REGISTRY: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// Creates a registry with its own lifecycle host, configured from the environment.
    pub fn new() -> Registry {
        Registry::with_hooks(AsyncHooks::new(), Config::from_env())
    }

    pub fn with_hooks(hooks: AsyncHooks, config: Config) -> Registry {
        Registry {
            hooks,
            config,
            namespaces: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        GLOBAL_REGISTRY.get_or_init(|| Registry::with_hooks(AsyncHooks::global().clone(), Config::from_env()))
    }

    pub fn hooks(&self) -> &AsyncHooks {
        &self.hooks
    }

    pub fn config(&self) -> Config {
        self.config
    }

    fn namespaces(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.namespaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a namespace and starts delivering unit notifications to it.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingName`] if `name` is empty.
    /// - [`Error::DuplicateNamespace`] if this registry already has `name`.
    pub fn create_namespace(&self, name: &str) -> Result<Namespace, Error> {
        if name.is_empty() {
            return Err(Error::MissingName);
        }
        let mut namespaces = self.namespaces();
        if namespaces.contains_key(name) {
            return Err(Error::DuplicateNamespace(name.to_string()));
        }
        let namespace = Namespace::new(name, self.hooks.clone(), self.config);
        let hook = self.hooks.create_hook(Arc::new(namespace.clone()));
        hook.enable();
        namespaces.insert(
            name.to_string(),
            Entry {
                namespace: namespace.clone(),
                hook,
            },
        );
        drop(namespaces);
        logwise::debuginternal_sync!("created namespace {name}", name = name);
        Ok(namespace)
    }

    pub fn get_namespace(&self, name: &str) -> Option<Namespace> {
        self.namespaces()
            .get(name)
            .map(|entry| entry.namespace.clone())
    }

    /// Resets and removes the namespace called `name`, and stops its notifications.
    ///
    /// Returns the removed namespace; handles to it stay usable but no longer
    /// follow async units. Returns `None` if there is no such namespace.
    pub fn destroy_namespace(&self, name: &str) -> Option<Namespace> {
        let entry = self.namespaces().remove(name)?;
        entry.namespace.reset();
        entry.hook.disable();
        logwise::debuginternal_sync!("destroyed namespace {name}", name = name);
        Some(entry.namespace)
    }

    /// Destroys every namespace.
    pub fn reset(&self) {
        let entries: Vec<Entry> = self.namespaces().drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            entry.namespace.reset();
            entry.hook.disable();
        }
    }

    /// Names of the registered namespaces, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Creates a namespace in the [global registry](Registry::global).
pub fn create_namespace(name: &str) -> Result<Namespace, Error> {
    Registry::global().create_namespace(name)
}

/// Looks up a namespace in the [global registry](Registry::global).
pub fn get_namespace(name: &str) -> Option<Namespace> {
    Registry::global().get_namespace(name)
}

/// Destroys a namespace in the [global registry](Registry::global).
pub fn destroy_namespace(name: &str) -> Option<Namespace> {
    Registry::global().destroy_namespace(name)
}

/// Destroys every namespace in the [global registry](Registry::global).
pub fn reset() {
    Registry::global().reset()
}
