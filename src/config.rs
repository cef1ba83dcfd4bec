// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime configuration.
//!
//! contextwise has two switches, both read from the environment by
//! [`Config::from_env`]:
//!
//! | Variable                  | Effect when exactly `"true"`                                  |
//! |---------------------------|---------------------------------------------------------------|
//! | `DEBUG_CONTEXTWISE`       | every internal operation is reported through `logwise`        |
//! | `CONTEXTWISE_STRONG_REFS` | emitter bindings hold namespaces and contexts strongly        |
//!
//! Any other value, or an unset variable, leaves the default.
//!
//! ```
//! use contextwise::Config;
//!
//! let config = Config::default().with_debug(true);
//! assert!(config.debug);
//! assert!(config.weak_references);
//! ```

/// Name of the variable that enables diagnostic output.
pub const DEBUG_ENV: &str = "DEBUG_CONTEXTWISE";

/// Name of the variable that disables weak references.
pub const STRONG_REFS_ENV: &str = "CONTEXTWISE_STRONG_REFS";

/// Settings shared by a [`Registry`](crate::Registry) and its namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Config {
    /// Report every internal operation through `logwise`, in every build profile.
    pub debug: bool,
    /// Hold emitter bindings and resolved units through weak references.
    ///
    /// When false, those references are strong: nothing breaks, but a namespace or
    /// context bound to a long-lived emitter stays alive as long as the emitter does.
    pub weak_references: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug: false,
            weak_references: true,
        }
    }
}

impl Config {
    /// Reads [`DEBUG_ENV`] and [`STRONG_REFS_ENV`].
    pub fn from_env() -> Config {
        Config {
            debug: env_flag(DEBUG_ENV),
            weak_references: !env_flag(STRONG_REFS_ENV),
        }
    }

    /// Sets [`debug`](Self::debug).
    pub fn with_debug(mut self, debug: bool) -> Config {
        self.debug = debug;
        self
    }

    pub fn with_weak_references(mut self, weak_references: bool) -> Config {
        self.weak_references = weak_references;
        self
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|value| value == "true")
}
