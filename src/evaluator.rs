//! The generated-evaluator contract, as a first-class, opaque handle.
//!
//! For each datatype declaration that may be lazy, the compiler generates a
//! closure of contract: given a *borrowed* reference to a block whose tag
//! is one of that datatype's lazy constructors, return an *owned* handle to
//! that block's head-normal form. This crate never inspects the block's
//! payload; it only ever borrows it long enough to hand it to the closure.
//!
//! Generalizes `lazy-st`'s `Evaluate<T>` trait (which consumes `self` to
//! produce a `T`) from "evaluate this captured closure environment" to
//! "evaluate this heap block", since here the thing being evaluated is a
//! block living on the shared heap rather than a value owned outright by
//! the thunk.

use std::rc::Rc;

use crate::effects::EffectContext;
use crate::value::{Block, Handle};

/// A single evaluator invocation: borrow the block, produce an owned
/// result handle. By contract the evaluator does not retain the input
/// reference and does not observe the block's current tag (the forcer may
/// have already rewritten it to a black hole by the time some reentrant
/// caller looks at it through another alias).
pub type EvalFn = fn(&Block, &mut dyn EffectContext) -> Handle;

/// An opaque evaluator closure handle.
///
/// The common case (`Static`) is a plain function pointer generated by the
/// compiler for a datatype -- `dup`/`drop` are free (it is `Copy`). The
/// `Dynamic` case supports evaluators that need to close over runtime state
/// and are therefore refcounted (`Rc`); `dup`/`drop` there are a real
/// increment/decrement, handled by `Rc`'s own `Clone`/`Drop`.
#[derive(Clone)]
pub enum EvalClosure {
    Static(EvalFn),
    Dynamic(Rc<dyn Fn(&Block, &mut dyn EffectContext) -> Handle>),
}

impl EvalClosure {
    pub fn from_fn(f: EvalFn) -> Self {
        EvalClosure::Static(f)
    }

    pub fn from_dynamic<F>(f: F) -> Self
    where
        F: Fn(&Block, &mut dyn EffectContext) -> Handle + 'static,
    {
        EvalClosure::Dynamic(Rc::new(f))
    }

    /// Dup the closure handle so it can survive a call boundary that
    /// consumes it by value (spec §4.3.1 step 1, §4.4 step 3). A no-op in
    /// cost for `Static`; an `Rc` clone for `Dynamic`.
    pub fn dup(&self) -> Self {
        self.clone()
    }

    /// Invoke the evaluator on a borrowed block.
    pub fn call(&self, block: &Block, ctx: &mut dyn EffectContext) -> Handle {
        match self {
            EvalClosure::Static(f) => f(block, ctx),
            EvalClosure::Dynamic(f) => f(block, ctx),
        }
    }
}

impl std::fmt::Debug for EvalClosure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalClosure::Static(p) => write!(f, "EvalClosure::Static({:p})", *p as *const ()),
            EvalClosure::Dynamic(rc) => write!(f, "EvalClosure::Dynamic({:p})", Rc::as_ptr(rc)),
        }
    }
}
