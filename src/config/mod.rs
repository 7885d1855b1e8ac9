//! Router configuration.
//!
//! The switches that govern dispatch are fixed when the [`Router`](crate::router::Router)
//! is built and never change afterwards. Loading them (files, environment,
//! command line) is the host's job; the types derive serde traits so any
//! format the host prefers will do.

use serde::{Deserialize, Serialize};

/// Default memory threshold for decoding request bodies (64 MiB).
pub const DEFAULT_MAX_MEMORY: usize = 64 << 20;

/// Run mode of the hosting process.
///
/// Only [`RunMode::Development`] discloses panic stack locations in response
/// bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum RunMode {
    #[default]
    #[serde(rename = "dev")]
    Development,
    #[serde(rename = "prod")]
    Production,
    #[serde(rename = "test")]
    Test,
}

impl RunMode {
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

/// Immutable dispatch configuration consumed by the router.
///
/// # Examples
///
/// ```
/// use rttp_route::config::{RouterConfig, RunMode};
///
/// let config = RouterConfig::default()
///     .with_run_mode(RunMode::Production)
///     .with_auto_render(false);
///
/// assert!(config.recover_panic);
/// assert!(!config.auto_render);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Largest request body, in bytes, that is decoded into form values.
    pub max_memory: usize,

    /// Controls stack-trace disclosure on recovered panics.
    pub run_mode: RunMode,

    /// When `false`, panics without a registered error handler propagate.
    pub recover_panic: bool,

    /// When `true`, [`Controller::render`](crate::controller::Controller::render)
    /// runs if the verb handler did not write a response.
    pub auto_render: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_memory: DEFAULT_MAX_MEMORY,
            run_mode: RunMode::Development,
            recover_panic: true,
            auto_render: true,
        }
    }
}

impl RouterConfig {
    #[must_use]
    pub fn with_max_memory(mut self, max_memory: usize) -> Self {
        self.max_memory = max_memory;
        self
    }

    #[must_use]
    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    #[must_use]
    pub fn with_recover_panic(mut self, recover_panic: bool) -> Self {
        self.recover_panic = recover_panic;
        self
    }

    #[must_use]
    pub fn with_auto_render(mut self, auto_render: bool) -> Self {
        self.auto_render = auto_render;
        self
    }
}
