//! Forcing strategies: the three variants that differ in whether they
//! copy, install a black hole, and install an indirection (spec §4.3).

use crate::config::Config;
use crate::effects::EffectContext;
use crate::evaluator::EvalClosure;
use crate::header::{self, Tag};
use crate::value::{BlockPtr, Value};

/// Unique strategy (spec §4.3.1): `b` is uniquely owned, so no aliasing is
/// possible. No black-holing, no indirection -- the evaluator's result
/// becomes the iteration's new `next` directly.
///
/// The driver, not this function, is responsible for the post-dispatch
/// yield check (spec §4.4 step 3) -- it applies uniformly across all three
/// strategies, so it lives in one place.
///
/// # Safety
/// `b` must point at a live, uniquely-owned, lazy-tagged block.
pub unsafe fn unique(
    b: BlockPtr,
    eval: &EvalClosure,
    ctx: &mut dyn EffectContext,
    _config: &Config,
) -> Value {
    let owned_eval = eval.dup();
    let res = owned_eval.call(b.as_ref(), ctx);
    res.into_raw()
}

/// Thread-local strategy (spec §4.3.2): `b` has aliases within this thread.
/// Copy-then-overwrite: a fresh copy is evaluated while `b` itself becomes
/// a black hole, then an indirection, so every alias still pointing at the
/// original `b` observes the transition.
///
/// Returns the black hole itself (unchanged) if `b` was already mid-force
/// (re-entrant call from within the evaluator of this very block, caught by
/// the `is_blackhole` check up front), or if the evaluator's result, once
/// any intermediate mutually-recursive forcing unwinds, turns out to be `b`
/// itself in black-hole state -- both are the cycle-detection case, not an
/// error from this function's point of view.
///
/// `config.trace_transitions` gates every `log::trace!` call this function
/// makes, same as it gates the driver's own transition logging.
///
/// # Safety
/// `b` must point at a live, lazy-or-blackhole-tagged block with refcount
/// >= 1 and the thread-shared bit clear.
pub unsafe fn local(
    b: BlockPtr,
    eval: &EvalClosure,
    ctx: &mut dyn EffectContext,
    config: &Config,
) -> Value {
    if header::is_blackhole(b) {
        // Re-entrant force on a block already being forced in this thread.
        // The caller's downstream pattern-match on a user constructor will
        // fail; that failure is the designed surfacing of the cycle.
        if config.trace_transitions {
            log::trace!("force: re-entered black hole at {:p}", b.as_ptr());
        }
        return Value::Block(b);
    }

    let x = header::alloc_copy(b);
    header::abandon_fields(b);
    header::set_scan_size(b, 0);
    header::set_tag(b, Tag::EVAL);
    if config.trace_transitions {
        log::trace!(
            "force: {:p} -> LAZY_EVAL (copy at {:p})",
            b.as_ptr(),
            x.as_ptr()
        );
    }

    let owned_eval = eval.dup();
    let res = owned_eval.call(x.as_ref(), ctx);

    // `x` itself is consumed by the evaluator's contract (reused or
    // dropped); we only still need the result.
    let res = res.into_raw();

    if res == Value::Block(b) {
        // The evaluator's result points back at this very block, still in
        // its black-hole state: `b` forces itself, directly or through a
        // chain of mutual references, and the reentrant branch above is
        // what produced this value further down the call stack. Installing
        // a self-pointing indirection here would make the driver's
        // indirection-follow step loop forever; the black hole already is
        // the correct terminal state, so release the claim `res` carries
        // and hand it back unchanged.
        header::decref_or_free(b);
        if config.trace_transitions {
            log::trace!("force: {:p} self-cycle, stays LAZY_EVAL", b.as_ptr());
        }
        return Value::Block(b);
    }

    header::set_field(b, 0, res);
    header::set_scan_size(b, 1);
    header::set_tag(b, Tag::IND);
    if config.trace_transitions {
        log::trace!("force: {:p} -> LAZY_IND", b.as_ptr());
    }

    Value::Block(b)
}

/// Thread-shared strategy (spec §4.3.3): for this spec's scope, delegates
/// to the thread-local strategy. Exposed as its own entry point so a real
/// concurrent implementation (atomic tag CAS to `LAZY_PREP`, an intrusive
/// wait-list, wake-on-completion) can replace just this function later
/// without touching the driver or the other strategies.
///
/// # Safety
/// Same preconditions as [`local`].
pub unsafe fn thread_shared(
    b: BlockPtr,
    eval: &EvalClosure,
    ctx: &mut dyn EffectContext,
    config: &Config,
) -> Value {
    local(b, eval, ctx, config)
}
