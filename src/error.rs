//! Error handling for the lazy core.
//!
//! There are two error kinds (spec §7). A lazy cycle is not an error value
//! at all -- the core returns the black-holed block and lets the language's
//! ordinary pattern-match-failure mechanism surface it downstream. The
//! second kind, an evaluator requesting to suspend, is fatal: this module
//! defines the typed error describing it and the escalation path to
//! process termination.
//!
//! The typed check (`check_no_yield`) and the side-effecting escalation
//! (`fatal`) are kept separate so the former stays unit-testable without
//! actually aborting the test process -- the same split used by the
//! `ErrorKind`-returning VM loops elsewhere in the retrieval pack before
//! they hit an unrecoverable path.

use thiserror::Error;

use crate::effects::EffectContext;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LazyCoreError {
    #[error("yielding from inside a lazy constructor is currently not supported")]
    YieldNotSupported,
}

/// Check the effect context for a pending yield request after invoking an
/// evaluator. Pure and side-effect-free; callers decide how to escalate.
pub fn check_no_yield(ctx: &dyn EffectContext) -> Result<(), LazyCoreError> {
    if ctx.yielding() {
        Err(LazyCoreError::YieldNotSupported)
    } else {
        Ok(())
    }
}

/// Escalate a fatal core error: log it, then terminate the process
/// immediately. No cleanup is performed -- this deliberately does not
/// panic (which would unwind and run destructors) but aborts, matching
/// spec §7's "no cleanup is performed; process termination is expected."
pub fn fatal(err: LazyCoreError) -> ! {
    log::error!("fatal runtime error ({}): {err}", error_code(err));
    std::process::abort();
}

fn error_code(err: LazyCoreError) -> &'static str {
    match err {
        LazyCoreError::YieldNotSupported => "NOT_SUPPORTED",
    }
}
