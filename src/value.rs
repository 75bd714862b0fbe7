//! The value/handle representation the rest of the crate operates on.
//!
//! A [`Value`] is a tagged word: either an unboxed scalar or a pointer to a
//! [`Block`]. Only the pointer case can be lazy. [`Handle`] layers RAII
//! ownership on top of a `Value`, incrementing on [`Clone`] and decrementing
//! on [`Drop`] -- the same shape as `LeanValue` in a Lean-style runtime or
//! `rusty_v8`'s `Local` handles, adapted to our own refcount field instead of
//! an FFI-owned one.

use std::fmt;
use std::ptr::NonNull;

use crate::header::{self, Header, Tag};

/// A heap-allocated cell: a header plus a vector of field slots.
///
/// Only the leading `scan_size` fields (tracked in the header) are owned
/// child handles; for the tags this crate cares about (lazy constructors,
/// `LAZY_EVAL`, `LAZY_IND`) that is the whole vector.
pub struct Block {
    pub(crate) header: Header,
    fields: std::cell::UnsafeCell<Vec<Value>>,
}

impl Block {
    /// Allocate a fresh lazy-constructor block with the given tag and
    /// owned child fields. `scan_size` is set to the field count, per the
    /// invariant that a lazy-constructor block's fields are all owned.
    pub fn new_lazy(tag: Tag, fields: Vec<Value>) -> BlockPtr {
        debug_assert!(tag.is_lazy_tag(), "Block::new_lazy requires a lazy-constructor tag");
        let scan_size = fields.len() as u32;
        let block = Box::new(Block {
            header: Header::new(tag, scan_size),
            fields: std::cell::UnsafeCell::new(fields),
        });
        unsafe { NonNull::new_unchecked(Box::into_raw(block)) }
    }

    /// Borrow the field slots.
    ///
    /// # Safety
    /// The caller must not hold this borrow across a call that mutates the
    /// block's fields (`alloc_copy`, `set_field`) on the same block.
    pub(crate) unsafe fn fields(&self) -> &[Value] {
        &*self.fields.get()
    }

    pub(crate) unsafe fn fields_mut(&self) -> &mut Vec<Value> {
        &mut *self.fields.get()
    }

    /// Read field `idx`. Evaluators use this to unpack a thunk's captured
    /// environment; it is the only way generated code is meant to look
    /// inside a block it was handed.
    ///
    /// Safe to call: `Value` is `Copy` and this only reads, never mutates,
    /// the field vector, so it cannot race with `set_field`/`alloc_copy` in
    /// the single-threaded-per-block-group contract the rest of this crate
    /// assumes (spec §5, §9).
    pub fn field(&self, idx: usize) -> Value {
        unsafe { self.fields() }[idx]
    }

    pub fn tag(&self) -> Tag {
        self.header.tag()
    }

    pub fn scan_size(&self) -> u32 {
        self.header.scan_size()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("tag", &self.header.tag())
            .field("scan_size", &self.header.scan_size())
            .field("refcount", &self.header.refcount())
            .finish()
    }
}

/// Raw, non-owning pointer to a [`Block`].
pub type BlockPtr = NonNull<Block>;

/// A tagged word: an unboxed scalar, or a pointer to a block.
///
/// `Value` itself carries no ownership discipline -- it is `Copy`, like a
/// raw pointer. [`Handle`] is the owning wrapper; borrowed code passes
/// `Value`/`&Block` around directly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Value {
    Scalar(i64),
    Block(BlockPtr),
}

impl Value {
    pub fn as_block(self) -> Option<BlockPtr> {
        match self {
            Value::Block(p) => Some(p),
            Value::Scalar(_) => None,
        }
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, Value::Scalar(_))
    }
}

/// An owned value handle: callee must release it (by forcing, or by
/// dropping it, which decrements the underlying block's refcount).
///
/// This is the owned/borrowed distinction from the data model expressed
/// directly in Rust's ownership model rather than as a documented
/// convention: a `Handle` must eventually be consumed (forced, unwrapped,
/// or dropped); a borrowed reference is just a `&Block` or a bare `Value`.
pub struct Handle(Value);

impl Handle {
    /// Wrap a `Value` as owned, without adjusting its refcount.
    ///
    /// # Safety
    /// The caller must already hold an un-shared reference count for this
    /// value (e.g. it was just returned from an evaluator, or freshly
    /// allocated).
    pub unsafe fn from_owned(v: Value) -> Self {
        Handle(v)
    }

    /// Wrap a `Value` as owned, first incrementing its refcount (the value
    /// was borrowed from elsewhere and we need our own independent claim).
    pub fn dup(v: Value) -> Self {
        if let Value::Block(p) = v {
            unsafe { header::dup(p) };
        }
        Handle(v)
    }

    pub fn value(&self) -> Value {
        self.0
    }

    pub fn as_block(&self) -> Option<BlockPtr> {
        self.0.as_block()
    }

    /// Consume the handle and return its value without releasing
    /// ownership -- the caller now owns the reference count.
    pub fn into_raw(self) -> Value {
        let v = self.0;
        std::mem::forget(self);
        v
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        Handle::dup(self.0)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Value::Block(p) = self.0 {
            unsafe { header::decref_or_free(p) };
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Scalar(n) => write!(f, "Handle::Scalar({n})"),
            Value::Block(p) => write!(f, "Handle::Block({:?})", unsafe { p.as_ref() }),
        }
    }
}
