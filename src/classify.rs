//! Ownership classifier: picks a forcing strategy from a block's refcount
//! and thread-shared bit. No locking -- reading a refcount is a plain load.

use crate::header;
use crate::value::BlockPtr;

/// The three ownership classes a lazy block can fall into at force time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OwnershipClass {
    /// Refcount zero: no aliases exist, nothing else can observe this
    /// block changing shape.
    Unique,
    /// Refcount nonzero, thread-shared bit clear: aliases exist, but all
    /// within this thread.
    Local,
    /// Thread-shared sentinel bit set: aliases may be reachable from other
    /// threads.
    ThreadShared,
}

/// Classify `b` into exactly one ownership class. Called once per force
/// iteration by the driver.
///
/// # Safety
/// `b` must point at a live block.
pub unsafe fn classify(b: BlockPtr) -> OwnershipClass {
    if header::is_thread_shared(b) {
        OwnershipClass::ThreadShared
    } else if header::is_unique(b) {
        OwnershipClass::Unique
    } else {
        OwnershipClass::Local
    }
}
