//! Integration tests for the driver/strategy/header machinery, exercising
//! it the way a generated front-end would: build blocks by hand, write a
//! small evaluator closure, force, and check the resulting tags and values.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use lazy_core::effects::{EffectContext, NoEffects};
use lazy_core::error::{check_no_yield, LazyCoreError};
use lazy_core::header::{self, Tag};
use lazy_core::value::{Block, Handle, Value};
use lazy_core::{classify, force, force_with_config, Config, EvalClosure, OwnershipClass};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn unique_chain_forces_through_every_link() {
    init_logging();
    // t0 -> t1 -> t2 -> 42, all uniquely owned, so each hop takes the
    // unique strategy and no black hole or indirection is ever installed.
    let t2 = Block::new_lazy(Tag::lazy_con(0), vec![]);
    let t1 = Block::new_lazy(Tag::lazy_con(0), vec![]);
    let t0 = Block::new_lazy(Tag::lazy_con(0), vec![]);

    let next_of: Rc<RefCell<HashMap<usize, Value>>> = Rc::new(RefCell::new(HashMap::new()));
    next_of.borrow_mut().insert(t0.as_ptr() as usize, Value::Block(t1));
    next_of.borrow_mut().insert(t1.as_ptr() as usize, Value::Block(t2));
    next_of.borrow_mut().insert(t2.as_ptr() as usize, Value::Scalar(42));

    let eval = {
        let next_of = next_of.clone();
        EvalClosure::from_dynamic(move |block: &Block, _ctx: &mut dyn EffectContext| {
            let key = block as *const Block as usize;
            let next = next_of
                .borrow_mut()
                .remove(&key)
                .expect("evaluator invoked on an unexpected block");
            unsafe { Handle::from_owned(next) }
        })
    };

    let mut ctx = NoEffects;
    let handle = unsafe { Handle::from_owned(Value::Block(t0)) };
    assert_eq!(unsafe { classify(t0) }, OwnershipClass::Unique);

    let forced = force(handle, &eval, &mut ctx);
    assert_eq!(forced.value(), Value::Scalar(42));
}

#[test]
fn shared_thunk_evaluates_at_most_once() {
    // Two aliases of the same thunk; forcing one must turn it into an
    // indirection that the other alias follows without re-running the
    // evaluator.
    let tag = Tag::lazy_con(0);
    let t = Block::new_lazy(tag, vec![]);
    let a = unsafe { Handle::from_owned(Value::Block(t)) };
    let b_alias = a.clone();
    assert_eq!(unsafe { classify(t) }, OwnershipClass::Local);

    let calls = Rc::new(Cell::new(0u32));
    let eval = {
        let calls = calls.clone();
        EvalClosure::from_dynamic(move |_block: &Block, _ctx: &mut dyn EffectContext| {
            calls.set(calls.get() + 1);
            unsafe { Handle::from_owned(Value::Scalar(7)) }
        })
    };

    let mut ctx = NoEffects;
    let forced_a = force(a, &eval, &mut ctx);
    assert_eq!(forced_a.value(), Value::Scalar(7));
    assert_eq!(calls.get(), 1);

    match b_alias.value() {
        Value::Block(p) => assert!(unsafe { header::is_indirection(p) }),
        _ => panic!("expected the shared thunk to still be a block"),
    }

    let forced_b = force(b_alias, &eval, &mut ctx);
    assert_eq!(forced_b.value(), Value::Scalar(7));
    assert_eq!(calls.get(), 1, "the evaluator must not run a second time");
}

#[test]
fn self_referential_cycle_returns_a_black_hole() {
    // A lazy block whose evaluator's own body is "force myself" -- the
    // classic `let x = x in x` black hole. The evaluator closure captures
    // its own alias to `t`, which is what makes `t` non-unique once forced
    // (an alias is live inside the very closure being invoked on it).
    let t = Block::new_lazy(Tag::lazy_con(0), vec![]);
    let outer = unsafe { Handle::from_owned(Value::Block(t)) };
    let captured_alias = outer.clone();
    assert_eq!(unsafe { classify(t) }, OwnershipClass::Local);

    let eval_cell: Rc<RefCell<Option<EvalClosure>>> = Rc::new(RefCell::new(None));
    let captured_alias = Rc::new(RefCell::new(Some(captured_alias)));
    let eval = {
        let eval_cell = eval_cell.clone();
        let captured_alias = captured_alias.clone();
        EvalClosure::from_dynamic(move |_block: &Block, ctx: &mut dyn EffectContext| {
            let alias = captured_alias
                .borrow_mut()
                .take()
                .expect("self-referential evaluator must run at most once");
            let eval = eval_cell.borrow().clone().expect("eval not yet installed");
            force(alias, &eval, ctx)
        })
    };
    *eval_cell.borrow_mut() = Some(eval.clone());

    let mut ctx = NoEffects;
    let forced = force(outer, &eval, &mut ctx);
    match forced.value() {
        Value::Block(p) => assert!(
            unsafe { header::is_blackhole(p) },
            "a self-referential force must terminate in the black hole, not an indirection to itself"
        ),
        Value::Scalar(_) => panic!("expected a black-holed block"),
    }
}

#[test]
fn mutual_cycle_leaves_one_black_hole_and_one_indirection() {
    // a.field(0) holds a claim on b, b.field(0) holds a claim on a. A
    // single generic evaluator reads whichever field it was handed and
    // forces that, recursing through the same `eval` closure.
    let a = Block::new_lazy(Tag::lazy_con(0), vec![Value::Scalar(0)]);
    let b = Block::new_lazy(Tag::lazy_con(0), vec![Value::Scalar(0)]);

    let claim_on_b = unsafe { Handle::from_owned(Value::Block(b)) };
    let claim_on_a = unsafe { Handle::from_owned(Value::Block(a)) };
    unsafe {
        header::set_field(a, 0, claim_on_b.into_raw());
        header::set_field(b, 0, claim_on_a.into_raw());
    }

    // A second, independent claim on each: without this both blocks would
    // be unique, and the unique strategy never black-holes or indirects.
    let outer_a = Handle::dup(Value::Block(a));
    let _extra_b_owner = Handle::dup(Value::Block(b));
    assert_eq!(unsafe { classify(a) }, OwnershipClass::Local);
    assert_eq!(unsafe { classify(b) }, OwnershipClass::Local);

    let eval_cell: Rc<RefCell<Option<EvalClosure>>> = Rc::new(RefCell::new(None));
    let eval = {
        let eval_cell = eval_cell.clone();
        EvalClosure::from_dynamic(move |block: &Block, ctx: &mut dyn EffectContext| {
            let other = block.field(0);
            let other_handle = Handle::dup(other);
            let eval = eval_cell.borrow().clone().expect("eval not yet installed");
            force(other_handle, &eval, ctx)
        })
    };
    *eval_cell.borrow_mut() = Some(eval.clone());

    let mut ctx = NoEffects;
    let forced = force(outer_a, &eval, &mut ctx);

    let a_is_blackhole = unsafe { header::is_blackhole(a) };
    let a_is_indirection = unsafe { header::is_indirection(a) };
    let b_is_blackhole = unsafe { header::is_blackhole(b) };
    let b_is_indirection = unsafe { header::is_indirection(b) };

    assert!(
        (a_is_blackhole && b_is_indirection) || (b_is_blackhole && a_is_indirection),
        "exactly one of the pair must remain a black hole, the other must indirect to it"
    );
    match forced.value() {
        Value::Block(p) => assert!(unsafe { header::is_blackhole(p) }),
        Value::Scalar(_) => panic!("expected a black-holed block"),
    }
}

#[test]
fn unique_indirection_chain_is_freed_as_it_is_followed() {
    // i0 -> i1 -> 99, both indirections uniquely owned: each hop must free
    // the indirection cell itself, not merely decrement it, and the
    // evaluator must never be invoked (indirections don't carry one).
    let i1 = unsafe {
        let p = Block::new_lazy(Tag::lazy_con(0), vec![Value::Scalar(99)]);
        header::set_tag(p, Tag::IND);
        p
    };
    let i0 = unsafe {
        let p = Block::new_lazy(Tag::lazy_con(0), vec![Value::Block(i1)]);
        header::set_tag(p, Tag::IND);
        p
    };

    let eval = EvalClosure::from_fn(|_b, _c| unreachable!("indirections never call the evaluator"));
    let mut ctx = NoEffects;
    let handle = unsafe { Handle::from_owned(Value::Block(i0)) };
    let forced = force(handle, &eval, &mut ctx);
    assert_eq!(forced.value(), Value::Scalar(99));
}

#[test]
fn shared_indirection_is_decremented_not_freed() {
    let i0 = unsafe {
        let p = Block::new_lazy(Tag::lazy_con(0), vec![Value::Scalar(7)]);
        header::set_tag(p, Tag::IND);
        p
    };
    let handle = unsafe { Handle::from_owned(Value::Block(i0)) };
    let extra_alias = handle.clone();

    let eval = EvalClosure::from_fn(|_b, _c| unreachable!("indirections never call the evaluator"));
    let mut ctx = NoEffects;
    let forced = force(handle, &eval, &mut ctx);
    assert_eq!(forced.value(), Value::Scalar(7));

    // `extra_alias` still references i0, so following the indirection must
    // have decremented it rather than freed it.
    assert!(unsafe { header::is_indirection(i0) });
    drop(extra_alias);
}

#[test]
fn traced_force_emits_transition_logs_without_changing_the_result() {
    init_logging();
    let t = Block::new_lazy(Tag::lazy_con(0), vec![]);
    let handle = unsafe { Handle::from_owned(Value::Block(t)) };
    let eval = EvalClosure::from_fn(|_b, _c| unsafe { Handle::from_owned(Value::Scalar(5)) });
    let mut ctx = NoEffects;
    let config = Config {
        trace_transitions: true,
    };
    let forced = force_with_config(handle, &eval, &mut ctx, &config);
    assert_eq!(forced.value(), Value::Scalar(5));
}

#[test]
fn yield_request_is_surfaced_as_a_typed_error() {
    struct Toggle(Cell<bool>);
    impl EffectContext for Toggle {
        fn yielding(&self) -> bool {
            self.0.get()
        }
    }

    let ctx = Toggle(Cell::new(false));
    assert!(check_no_yield(&ctx).is_ok());

    ctx.0.set(true);
    assert_eq!(check_no_yield(&ctx), Err(LazyCoreError::YieldNotSupported));
}
