//! Force driver: the top-level iterative loop (spec §4.4).
//!
//! The driver never recurses into itself -- a long chain of indirections or
//! re-forceable results must not grow the native call stack (spec §9).
//! Recursive forcing triggered *inside* an evaluator is fine (it is user
//! code reentering the public API), but this loop body only ever iterates.

use crate::classify::{classify, OwnershipClass};
use crate::config::Config;
use crate::effects::EffectContext;
use crate::error::{check_no_yield, fatal};
use crate::evaluator::EvalClosure;
use crate::header::{self, Tag};
use crate::strategy;
use crate::value::{BlockPtr, Handle, Value};

/// True iff `v` denotes a pointer to a block carrying a lazy-family tag
/// (a lazy constructor, or one of the three reserved tags). Scalars are
/// never lazy.
pub fn is_lazy(v: Value) -> bool {
    match v {
        Value::Scalar(_) => false,
        Value::Block(b) => unsafe { header::is_lazy_or_reserved(b) },
    }
}

/// Force `next` to weak-head-normal form.
///
/// Precondition: `is_lazy(next.value())`. Postcondition: the result is not
/// a lazy tag, unless it is the returned black hole in the cycle case
/// (spec §4.4, §8 scenario 3/4).
pub fn force(next: Handle, eval: &EvalClosure, ctx: &mut dyn EffectContext) -> Handle {
    force_with_config(next, eval, ctx, &Config::default())
}

/// Same as [`force`], but with explicit diagnostic configuration (mainly
/// useful for tests that want to assert on `log` output without relying on
/// environment state).
pub fn force_with_config(
    next: Handle,
    eval: &EvalClosure,
    ctx: &mut dyn EffectContext,
    config: &Config,
) -> Handle {
    debug_assert!(
        is_lazy(next.value()),
        "force() precondition violated: handle is not lazy"
    );

    let mut next = next.into_raw();

    loop {
        let b = match next {
            Value::Scalar(_) => unreachable!("scalars are never lazy"),
            Value::Block(b) => b,
        };
        let tag = unsafe { header::tag_of(b) };

        if tag.is_indirection() {
            next = unsafe { follow_indirection(b, config) };
        } else {
            // Lazy constructor, or a black hole being re-entered from
            // within its own evaluator (spec §4.4 step 3's "else" covers
            // both, since the precondition guarantees one of the four
            // lazy-family tags and LAZY_PREP is unused).
            debug_assert!(tag.is_lazy_tag() || tag.is_blackhole());

            let class = unsafe { classify(b) };
            if config.trace_transitions {
                log::trace!("force: {:p} classified as {:?}", b.as_ptr(), class);
            }
            let result = unsafe {
                match class {
                    OwnershipClass::Unique => strategy::unique(b, eval, ctx, config),
                    OwnershipClass::Local => strategy::local(b, eval, ctx, config),
                    OwnershipClass::ThreadShared => {
                        strategy::thread_shared(b, eval, ctx, config)
                    }
                }
            };

            if let Err(e) = check_no_yield(ctx) {
                fatal(e);
            }
            next = result;
        }

        // Termination checks (spec §4.4 step 4).
        match next {
            Value::Scalar(_) => return unsafe { Handle::from_owned(next) },
            Value::Block(nextb) => {
                let next_tag = unsafe { header::tag_of(nextb) };
                if nextb == b && next_tag.is_blackhole() {
                    // The black hole returned by the thread-local strategy's
                    // cycle-detection branch.
                    return unsafe { Handle::from_owned(next) };
                }
                if !next_tag.is_lazy_or_reserved() {
                    return unsafe { Handle::from_owned(next) };
                }
            }
        }
        // Otherwise continue the loop with the new `b`.
    }
}

/// Consume an indirection block: read its target, free or decref the
/// indirection itself depending on whether it was unique, and adopt the
/// target as the new `next` (spec §4.4 step 2).
///
/// # Safety
/// `b` must point at a live block with tag `LAZY_IND`.
unsafe fn follow_indirection(b: BlockPtr, config: &Config) -> Value {
    let res = {
        let fields = b.as_ref().fields();
        fields[0]
    };
    if header::refcount_of(b) == 0 {
        // We are the sole owner of the indirection; its claim on `res`
        // transfers to us directly, no dup needed.
        if config.trace_transitions {
            log::trace!("force: following+freeing unique indirection {:p}", b.as_ptr());
        }
        // Detach field 0 so `free` doesn't also decref it out from under us.
        header::set_scan_size(b, 0);
        header::free(b);
    } else {
        if config.trace_transitions {
            log::trace!("force: following shared indirection {:p}", b.as_ptr());
        }
        if let Value::Block(p) = res {
            header::dup(p);
        }
        header::decref_or_free(b);
    }
    res
}

/// If `handle` denotes a lazy value, force it; otherwise drop `eval` and
/// return `handle` unchanged (spec §6).
pub fn try_force(handle: Handle, eval: EvalClosure, ctx: &mut dyn EffectContext) -> Handle {
    if is_lazy(handle.value()) {
        force(handle, &eval, ctx)
    } else {
        drop(eval);
        handle
    }
}

/// If `target` is unique, free it and return `value`. Otherwise overwrite
/// `target`'s header to `LAZY_IND` with `scan_size = 1`, store `value` in
/// field 0, and return `target`. Used by evaluators that choose not to
/// reuse their input block (spec §6).
pub fn make_indirect(target: Handle, value: Handle) -> Handle {
    let target = target.into_raw();
    let b = match target {
        Value::Scalar(_) => panic!("make_indirect: target is not a block"),
        Value::Block(b) => b,
    };
    unsafe {
        if header::is_unique(b) {
            header::free(b);
            value
        } else {
            header::abandon_fields(b);
            header::set_scan_size(b, 0);
            header::set_field(b, 0, value.into_raw());
            header::set_scan_size(b, 1);
            header::set_tag(b, Tag::IND);
            Handle::from_owned(Value::Block(b))
        }
    }
}
