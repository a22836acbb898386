//! Manual handle exposing the counting protocol directly.

use core::mem;
use core::ptr;

use crate::block::{ControlBlock, null_data};
use crate::shared::Handle;

/// Non-owning view of a shared value that manages counts by hand.
///
/// A [RawHandle<T>] performs no automatic count traffic: it is `Copy`, drops
/// without effect, and instead exposes the increment/decrement operations of
/// the control block for code that must step outside the automatic protocol.
/// Obtain one from [Handle::release] (which transfers the released owning
/// count to the caller) or [Handle::raw_handle] (which transfers nothing).
pub struct RawHandle<T: ?Sized> {
    ptr: *mut T,
    core: *mut ControlBlock,
}

unsafe impl<T: ?Sized + Send + Sync> Send for RawHandle<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RawHandle<T> {}

impl<T: ?Sized> Clone for RawHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for RawHandle<T> {}

impl<T> RawHandle<T> {
    pub const fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            core: ptr::null_mut(),
        }
    }
}

impl<T: ?Sized> RawHandle<T> {
    pub(crate) fn from_parts(ptr: *mut T, core: *mut ControlBlock) -> Self {
        Self { ptr, core }
    }

    fn core(&self) -> Option<&ControlBlock> {
        unsafe { self.core.as_ref() }
    }

    pub fn ref_count(&self) -> u32 {
        self.core().map_or(0, ControlBlock::strong_count)
    }

    pub fn weak_count(&self) -> u32 {
        self.core().map_or(0, ControlBlock::weak_count)
    }

    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null()
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    pub fn reset(&mut self) {
        self.ptr = null_data(self.ptr);
        self.core = ptr::null_mut();
    }
}

/// Unsafe Methods
impl<T: ?Sized> RawHandle<T> {
    /// Take one owning count by hand.
    ///
    /// # Safety
    /// The strong count must still be nonzero, and every manual increment
    /// must eventually be paired with exactly one release, or the value leaks.
    pub unsafe fn increment_strong(&self) {
        if let Some(core) = self.core() {
            core.increment_strong();
        }
    }

    /// Release one owning count by hand. Destroys the value when it was the
    /// last one.
    ///
    /// # Safety
    /// The caller must actually hold the count being released.
    pub unsafe fn decrement_strong(&self) {
        if !self.core.is_null() {
            unsafe { ControlBlock::release_strong(self.core) };
        }
    }

    /// Take one observer count by hand.
    ///
    /// # Safety
    /// Must eventually be paired with exactly one
    /// [RawHandle::decrement_weak], or the control block leaks.
    pub unsafe fn increment_weak(&self) {
        if let Some(core) = self.core() {
            core.increment_weak();
        }
    }

    /// Release one observer count by hand. Frees the control block when both
    /// sides are done.
    ///
    /// # Safety
    /// The caller must actually hold the count being released.
    pub unsafe fn decrement_weak(&self) {
        if !self.core.is_null() {
            unsafe { ControlBlock::release_weak(self.core) };
        }
    }

    /// Re-enter the automatic protocol, adopting one manually held owning
    /// count.
    ///
    /// # Safety
    /// The caller must hold an owning count (for example the one transferred
    /// by [Handle::release]) and hands it over to the returned handle.
    pub unsafe fn into_handle(self) -> Handle<T> {
        Handle::from_parts(self.ptr, self.core)
    }

    /// Direct access to the value.
    ///
    /// # Safety
    /// The strong count must be nonzero for the whole borrow.
    pub unsafe fn get(&self) -> &T {
        unsafe { &*self.ptr }
    }
}

impl<T> Default for RawHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use core::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct Probe {
        drops: &'static AtomicU32,
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn drop_counter() -> &'static AtomicU32 {
        Box::leak(Box::new(AtomicU32::new(0)))
    }

    #[test]
    fn release_transfers_the_count_to_the_caller() {
        let drops = drop_counter();
        let owner = Handle::new(Probe { drops });
        let raw = owner.release();
        assert_eq!(raw.ref_count(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        unsafe { raw.decrement_strong() };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn manual_counts_pair_with_the_automatic_protocol() {
        let drops = drop_counter();
        let owner = Handle::new(Probe { drops });
        let raw = owner.raw_handle();
        unsafe { raw.increment_strong() };
        assert_eq!(owner.ref_count(), 2);
        drop(owner);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(unsafe { raw.get() }.drops.load(Ordering::SeqCst), 0);
        unsafe { raw.decrement_strong() };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn adopting_a_released_count_resumes_automatic_cleanup() {
        let drops = drop_counter();
        let owner = Handle::new(Probe { drops });
        let raw = owner.release();
        let adopted = unsafe { raw.into_handle() };
        assert_eq!(adopted.ref_count(), 1);
        drop(adopted);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn manual_weak_counts_gate_the_block() {
        let owner = Handle::new(1u16);
        let raw = owner.raw_handle();
        unsafe { raw.increment_weak() };
        assert_eq!(owner.weak_count(), 1);
        drop(owner);
        assert_eq!(raw.ref_count(), 0);
        unsafe { raw.decrement_weak() };
    }

    #[test]
    fn empty_raw_handle_is_inert() {
        let raw = RawHandle::<u8>::empty();
        assert!(!raw.is_valid());
        assert_eq!(raw.ref_count(), 0);
        unsafe { raw.increment_strong() };
        unsafe { raw.decrement_strong() };
    }
}
