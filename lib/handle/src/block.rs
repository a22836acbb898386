//! Control block and the counting protocol shared by the handle kinds.

use alloc::boxed::Box;
use core::ptr;
use core::sync::atomic::{self, AtomicPtr, AtomicU32, Ordering};

use crate::macros::lifecycle_trace;

/// Refusal point for further increments. A counter that wraps would free the
/// resource while handles still point at it.
const COUNT_LIMIT: u32 = u32::MAX / 2;

/// Shared metadata anchoring the lifetime of one heap resource.
///
/// Exactly one block exists per resource that is ever shared. The block stays
/// allocated until both the strong and the weak side have fully let go.
pub(crate) struct ControlBlock {
    /// Number of owning handles. The resource is destroyed when this hits 0.
    strong: AtomicU32,
    /// Number of observers, plus one unit held collectively by the strong
    /// family. The block itself is freed when this hits 0.
    weak: AtomicU32,
    /// Address of the concrete resource, handed to `destroy` exactly once.
    /// Nulled afterwards.
    target: AtomicPtr<()>,
    /// Deleter recorded for the resource's concrete type at first wrap.
    destroy: unsafe fn(*mut ()),
}

impl ControlBlock {
    /// Allocate a block for a freshly wrapped resource: one owner, no
    /// observers.
    pub(crate) fn allocate(target: *mut (), destroy: unsafe fn(*mut ())) -> *mut ControlBlock {
        let block = Box::into_raw(Box::new(ControlBlock {
            strong: AtomicU32::new(1),
            weak: AtomicU32::new(1),
            target: AtomicPtr::new(target),
            destroy,
        }));
        lifecycle_trace!("block {:p}: allocated for {:p}", block, target);
        block
    }

    pub(crate) fn increment_strong(&self) {
        let old = self.strong.fetch_add(1, Ordering::Relaxed);
        assert!(old <= COUNT_LIMIT, "strong count overflow");
    }

    /// Promotion primitive: take an owning count only if owners still exist.
    pub(crate) fn increment_strong_if_nonzero(&self) -> bool {
        self.strong
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |count| {
                if count == 0 { None } else { Some(count + 1) }
            })
            .is_ok()
    }

    pub(crate) fn increment_weak(&self) {
        let old = self.weak.fetch_add(1, Ordering::Relaxed);
        assert!(old <= COUNT_LIMIT, "weak count overflow");
    }

    pub(crate) fn strong_count(&self) -> u32 {
        self.strong.load(Ordering::Relaxed)
    }

    /// Observer count. The unit held by the strong family is not reported.
    pub(crate) fn weak_count(&self) -> u32 {
        let weak = self.weak.load(Ordering::Relaxed);
        if self.strong.load(Ordering::Relaxed) > 0 {
            weak - 1
        } else {
            weak
        }
    }

    /// Drop one owning count. The thread that takes the count to zero
    /// destroys the resource and then releases the family's weak unit.
    ///
    /// # Safety
    /// `block` must point at a live block, and the caller must actually hold
    /// the count being released.
    pub(crate) unsafe fn release_strong(block: *mut ControlBlock) {
        let counts = unsafe { &*block };
        if counts.strong.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        // All writes made through any former owner must be visible before the
        // resource is torn down.
        atomic::fence(Ordering::Acquire);
        let target = counts.target.swap(ptr::null_mut(), Ordering::Relaxed);
        if !target.is_null() {
            lifecycle_trace!("block {:p}: destroying {:p}", block, target);
            unsafe { (counts.destroy)(target) };
        }
        unsafe { Self::release_weak(block) };
    }

    /// Drop one weak count; frees the block when it was the last.
    ///
    /// # Safety
    /// Same contract as [ControlBlock::release_strong].
    pub(crate) unsafe fn release_weak(block: *mut ControlBlock) {
        if unsafe { &*block }.weak.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        atomic::fence(Ordering::Acquire);
        lifecycle_trace!("block {:p}: deallocated", block);
        drop(unsafe { Box::from_raw(block) });
    }
}

/// Deleter for a `Box`-allocated `T`. Recorded at first wrap so destruction
/// always runs on the concrete type, whatever the handle's declared type.
pub(crate) unsafe fn destroy_boxed<T>(target: *mut ()) {
    drop(unsafe { Box::from_raw(target as *mut T) });
}

pub(crate) unsafe fn destroy_nothing(_target: *mut ()) {}

/// Null the data address of `ptr`, keeping any pointer metadata, so emptied
/// handles report `is_null` even for unsized pointees. The result must not
/// be dereferenced.
pub(crate) fn null_data<T: ?Sized>(ptr: *mut T) -> *mut T {
    ptr.wrapping_byte_sub(ptr as *mut () as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe(&'static AtomicU32);

    impl Drop for Probe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn drop_counter() -> &'static AtomicU32 {
        Box::leak(Box::new(AtomicU32::new(0)))
    }

    fn counted_block(drops: &'static AtomicU32) -> *mut ControlBlock {
        let target = Box::into_raw(Box::new(Probe(drops)));
        ControlBlock::allocate(target as *mut (), destroy_boxed::<Probe>)
    }

    #[test]
    fn fresh_block_reports_one_owner_no_observers() {
        let drops = drop_counter();
        let block = counted_block(drops);
        let counts = unsafe { &*block };
        assert_eq!(counts.strong_count(), 1);
        assert_eq!(counts.weak_count(), 0);
        unsafe { ControlBlock::release_strong(block) };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn last_strong_release_destroys_exactly_once() {
        let drops = drop_counter();
        let block = counted_block(drops);
        unsafe { &*block }.increment_strong();
        unsafe { ControlBlock::release_strong(block) };
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        unsafe { ControlBlock::release_strong(block) };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observers_outlive_the_resource() {
        let drops = drop_counter();
        let block = counted_block(drops);
        unsafe { &*block }.increment_weak();
        unsafe { ControlBlock::release_strong(block) };
        // The resource is gone but the block still answers count queries.
        let counts = unsafe { &*block };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(counts.strong_count(), 0);
        assert_eq!(counts.weak_count(), 1);
        assert!(!counts.increment_strong_if_nonzero());
        unsafe { ControlBlock::release_weak(block) };
    }

    #[test]
    fn promotion_takes_a_count_only_while_owned() {
        let drops = drop_counter();
        let block = counted_block(drops);
        let counts = unsafe { &*block };
        assert!(counts.increment_strong_if_nonzero());
        assert_eq!(counts.strong_count(), 2);
        unsafe { ControlBlock::release_strong(block) };
        unsafe { ControlBlock::release_strong(block) };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
