//! Ambient configuration: diagnostic toggles that have no effect on
//! forcing semantics, only on what gets logged.
//!
//! Follows the environment-variable-driven convention used for diagnostics
//! across the retrieval pack's runtime crates (`RUST_LOG`-style switches):
//! a small struct with a `from_env` constructor, rather than a config file
//! or CLI flag, since this core has no wire format and no CLI of its own.

use std::env;

const TRACE_VAR: &str = "LAZY_CORE_TRACE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// When set, the driver and strategies emit `log::trace!` records for
    /// every tag transition (`LAZY_CON -> LAZY_EVAL -> LAZY_IND`, and
    /// indirection follows). Off by default: tracing every force is noisy
    /// even at `trace` level in a hot interpreter loop.
    pub trace_transitions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            trace_transitions: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            trace_transitions: env_flag(TRACE_VAR),
        }
    }
}

fn env_flag(var: &str) -> bool {
    match env::var(var) {
        Ok(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => false,
    }
}
