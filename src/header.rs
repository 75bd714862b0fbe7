//! Block header model: tag/refcount/scan-size layout and the predicates and
//! mutators the rest of the core uses to inspect and rewrite blocks.
//!
//! Tags are arranged so that every lazy-family tag (the open set of
//! per-datatype `LAZY_CON_k` constructors, plus the three reserved tags)
//! occupies a contiguous range at the top of the numeric space. That makes
//! the fast "is this even possibly lazy?" check a single comparison
//! (`is_lazy_or_reserved`), per the re-architecture guidance in the spec
//! this crate implements.

use std::cell::Cell;

use crate::value::{Block, BlockPtr, Value};

/// First tag value in the lazy-family range. Anything below this is owned
/// by the front-end/codegen (normal, non-lazy constructors) and is opaque
/// to this crate.
pub const FIRST_LAZY_TAG: u32 = 0xF000_0000;

/// Reserved for a future thread-shared "preparation" state (an
/// intrusive-wait-list CAS target). Unused by this spec's strategies.
pub const LAZY_PREP: u32 = 0xFFFF_FFFF;
/// Indirection: field 0 holds the forced result.
pub const LAZY_IND: u32 = 0xFFFF_FFFE;
/// Black hole: force is in progress on this block, in this thread.
pub const LAZY_EVAL: u32 = 0xFFFF_FFFD;

/// A block's tag discriminator.
///
/// The lazy-constructor sub-range (`FIRST_LAZY_TAG .. LAZY_EVAL`) is an
/// open set: generated code may use any value in it to mean "still a thunk
/// of datatype X". This crate never inspects which one; it only compares
/// against the three reserved tags and the range boundary.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Tag(pub u32);

impl Tag {
    pub const EVAL: Tag = Tag(LAZY_EVAL);
    pub const IND: Tag = Tag(LAZY_IND);
    pub const PREP: Tag = Tag(LAZY_PREP);

    /// Construct a lazy-constructor tag `n` slots into the open range.
    pub const fn lazy_con(n: u32) -> Tag {
        let t = FIRST_LAZY_TAG + n;
        assert!(t < LAZY_EVAL, "lazy_con index overflows into reserved tags");
        Tag(t)
    }

    /// True for any tag in the lazy-constructor open set (not the three
    /// reserved tags).
    pub fn is_lazy_tag(self) -> bool {
        self.0 >= FIRST_LAZY_TAG && self.0 < LAZY_EVAL
    }

    pub fn is_blackhole(self) -> bool {
        self.0 == LAZY_EVAL
    }

    pub fn is_indirection(self) -> bool {
        self.0 == LAZY_IND
    }

    /// Fast-path predicate: lazy and reserved tags occupy a contiguous
    /// numeric range above all non-lazy tags, so this is a single compare.
    pub fn is_lazy_or_reserved(self) -> bool {
        self.0 >= FIRST_LAZY_TAG
    }
}

const SHARED_BIT: u32 = 1 << 31;

/// `tag`/`scan-size`/`refcount` triple stored at the front of every block.
///
/// Reads and writes are plain `Cell` loads/stores: the thread-local and
/// unique paths never need atomics (spec §5), and the thread-shared
/// strategy in this crate delegates to the thread-local one rather than
/// implementing real cross-thread synchronization (spec §4.3.3, §9).
pub struct Header {
    tag: Cell<Tag>,
    scan_size: Cell<u32>,
    /// Bit 31 is the thread-shared sentinel; the remaining bits are the
    /// count. A count of zero means the holder is the only live reference.
    refcount: Cell<u32>,
}

impl Header {
    pub(crate) fn new(tag: Tag, scan_size: u32) -> Self {
        Header {
            tag: Cell::new(tag),
            scan_size: Cell::new(scan_size),
            refcount: Cell::new(0),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag.get()
    }

    pub fn scan_size(&self) -> u32 {
        self.scan_size.get()
    }

    /// The reference count, with the thread-shared sentinel bit masked off.
    pub fn refcount(&self) -> u32 {
        self.refcount.get() & !SHARED_BIT
    }

    pub fn is_thread_shared(&self) -> bool {
        self.refcount.get() & SHARED_BIT != 0
    }

    pub fn is_unique(&self) -> bool {
        self.refcount() == 0
    }
}

// --- Free-function predicates/mutators over a block pointer ---------------
//
// These operate on a raw `BlockPtr` rather than a borrowed `&Block` because
// most callers (the driver, the strategies) only ever hold pointers, not
// borrows with a tied lifetime -- identical in spirit to how `LeanValue`'s
// helpers and `lean_*` FFI functions take a raw object pointer.

/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn tag_of(b: BlockPtr) -> Tag {
    b.as_ref().header.tag()
}

/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn refcount_of(b: BlockPtr) -> u32 {
    b.as_ref().header.refcount()
}

/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn is_unique(b: BlockPtr) -> bool {
    b.as_ref().header.is_unique()
}

/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn is_thread_shared(b: BlockPtr) -> bool {
    b.as_ref().header.is_thread_shared()
}

/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn is_lazy_tag(b: BlockPtr) -> bool {
    b.as_ref().header.tag().is_lazy_tag()
}

/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn is_blackhole(b: BlockPtr) -> bool {
    b.as_ref().header.tag().is_blackhole()
}

/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn is_indirection(b: BlockPtr) -> bool {
    b.as_ref().header.tag().is_indirection()
}

/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn is_lazy_or_reserved(b: BlockPtr) -> bool {
    b.as_ref().header.tag().is_lazy_or_reserved()
}

/// # Safety
/// `b` must point at a live `Block`; the caller must not be relying on the
/// previous tag after this call.
pub unsafe fn set_tag(mut b: BlockPtr, tag: Tag) {
    b.as_mut().header.tag.set(tag);
}

/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn set_scan_size(mut b: BlockPtr, n: u32) {
    b.as_mut().header.scan_size.set(n);
}

/// Overwrite field `idx`, dropping whatever owned handle previously lived
/// there. Takes ownership of `value`.
///
/// # Safety
/// `b` must point at a live `Block` with at least `idx + 1` fields.
pub unsafe fn set_field(b: BlockPtr, idx: usize, value: Value) {
    let fields = b.as_ref().fields_mut();
    if idx < fields.len() {
        let old = fields[idx];
        fields[idx] = value;
        decref_or_free_value(old);
    } else {
        debug_assert_eq!(idx, fields.len(), "set_field must not leave a hole");
        fields.push(value);
    }
}

/// Increment `b`'s reference count (and nothing else -- `b` is still a
/// valid block regardless of the sentinel bit).
///
/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn dup(b: BlockPtr) {
    let h = &b.as_ref().header;
    let rc = h.refcount.get();
    let shared = rc & SHARED_BIT;
    let count = rc & !SHARED_BIT;
    h.refcount.set(shared | (count + 1));
}

/// Decrement `b`'s reference count. If it was already unique (count zero,
/// meaning this call is dropping the sole remaining reference), free the
/// block instead.
///
/// # Safety
/// `b` must point at a live `Block` not otherwise aliased after this call.
pub unsafe fn decref_or_free(b: BlockPtr) {
    let h = &b.as_ref().header;
    let rc = h.refcount.get();
    let shared = rc & SHARED_BIT;
    let count = rc & !SHARED_BIT;
    if count == 0 {
        free(b);
    } else {
        h.refcount.set(shared | (count - 1));
    }
}

fn decref_or_free_value(v: Value) {
    if let Value::Block(p) = v {
        unsafe { decref_or_free(p) };
    }
}

/// Release a block's owned child fields (within `scan_size`) and deallocate
/// its storage. Does not check the refcount; callers (`decref_or_free`, the
/// driver's indirection-follow step) are responsible for only calling this
/// once refcount has reached zero.
///
/// # Safety
/// `b` must point at a live `Block` with no other surviving references.
pub unsafe fn free(b: BlockPtr) {
    let scan_size = b.as_ref().header.scan_size() as usize;
    for field in b.as_ref().fields().iter().take(scan_size).copied() {
        decref_or_free_value(field);
    }
    drop(Box::from_raw(b.as_ptr()));
}

/// Release (decref) `b`'s own field references within `scan_size` and
/// empty its field vector, without freeing `b` itself.
///
/// Used when marking a block a black hole after [`alloc_copy`]: per the
/// data model, a black hole's fields are "logically abandoned" in favor of
/// the fresh copy, which became an independently valid owner via `dup`
/// inside `alloc_copy`. Releasing the original's claim here is what keeps
/// that `dup` from being a permanent leak -- net effect across the pair of
/// calls is that ownership moves from `b` to the copy rather than being
/// duplicated.
///
/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn abandon_fields(b: BlockPtr) {
    let scan_size = b.as_ref().header.scan_size() as usize;
    let fields = b.as_ref().fields_mut();
    for field in fields.drain(..scan_size) {
        decref_or_free_value(field);
    }
}

/// Mark `b` as reachable from more than one thread. Setting this bit is
/// ultimately the memory manager's job (out of scope for this crate beyond
/// the bit itself, spec §3); exposed as a narrow utility so callers -- and
/// this crate's own tests -- can put a block into the `ThreadShared`
/// ownership class without a real multi-threaded handoff.
///
/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn mark_thread_shared(b: BlockPtr) {
    let h = &b.as_ref().header;
    let rc = h.refcount.get();
    h.refcount.set(rc | SHARED_BIT);
}

/// Allocate a fresh block that is a field-wise copy of `b`, with refcount
/// zero, preserving tag and scan-size. Each owned child handle in the copy
/// is `dup`'d, so the original and the copy are independently valid owners
/// (spec §4.1: `alloc_copy`).
///
/// # Safety
/// `b` must point at a live `Block`.
pub unsafe fn alloc_copy(b: BlockPtr) -> BlockPtr {
    let tag = b.as_ref().header.tag();
    let scan_size = b.as_ref().header.scan_size();
    let fields: Vec<Value> = b.as_ref().fields().to_vec();
    for field in fields.iter().copied() {
        if let Value::Block(p) = field {
            dup(p);
        }
    }
    let copy = Block::new_lazy(tag, fields);
    set_scan_size(copy, scan_size);
    copy
}
