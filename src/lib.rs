//! Lazy-value forcing core over a refcounted block heap.
//!
//! This crate implements the mechanism by which a heap-allocated cell
//! tagged as "unevaluated thunk" is *forced* into weak-head-normal form,
//! cooperating with a reference-counted memory manager that distinguishes
//! unique, thread-local-shared, and thread-shared ownership. It solves
//! three entangled problems at once:
//!
//! - correct handling of recursive self-reference during forcing
//!   (black-holing, see [`strategy::local`]);
//! - in-place reuse of the thunk cell versus allocation of an indirection,
//!   depending on sharing state (see the [`classify`] and [`strategy`]
//!   modules);
//! - iterative forcing of chained thunks without growing the native call
//!   stack (see [`driver::force`]).
//!
//! The language front-end, the generated per-datatype "eval" closures
//! ([`evaluator::EvalClosure`] specifies only the contract they must
//! satisfy), the heap allocator and refcount primitives, and the
//! effect/algebraic-handler subsystem ([`effects::EffectContext`] exposes
//! only the "did the callee request to suspend?" flag) are all external
//! collaborators, not implemented here.
//!
//! Concurrent forcing by multiple threads on the same thunk is
//! acknowledged but not implemented: [`strategy::thread_shared`] delegates
//! to [`strategy::local`]. Forcing a thunk whose evaluator wishes to
//! suspend is a fatal runtime error ([`error::fatal`]), not a recoverable
//! one.
//!
//! ```
//! use lazy_core::effects::NoEffects;
//! use lazy_core::evaluator::EvalClosure;
//! use lazy_core::header::Tag;
//! use lazy_core::value::{Block, Handle, Value};
//!
//! const POINT: Tag = Tag::lazy_con(0);
//!
//! fn eval_point(block: &Block, _ctx: &mut dyn lazy_core::effects::EffectContext) -> Handle {
//!     // A real evaluator would unpack `block`'s fields and build a normal
//!     // form; this one just returns a constant scalar.
//!     let _ = block;
//!     unsafe { Handle::from_owned(Value::Scalar(42)) }
//! }
//!
//! let thunk = Block::new_lazy(POINT, vec![]);
//! let handle = unsafe { Handle::from_owned(Value::Block(thunk)) };
//! let eval = EvalClosure::from_fn(eval_point);
//! let mut ctx = NoEffects;
//!
//! let forced = lazy_core::force(handle, &eval, &mut ctx);
//! assert_eq!(forced.value(), Value::Scalar(42));
//! ```

pub mod classify;
pub mod config;
pub mod driver;
pub mod effects;
pub mod error;
pub mod evaluator;
pub mod header;
pub mod strategy;
pub mod value;

pub use classify::{classify, OwnershipClass};
pub use config::Config;
pub use driver::{force, force_with_config, is_lazy, make_indirect, try_force};
pub use effects::{EffectContext, NoEffects};
pub use error::{check_no_yield, fatal, LazyCoreError};
pub use evaluator::EvalClosure;
pub use header::Tag;
pub use value::{Block, BlockPtr, Handle, Value};
