//! Shared owning handle anchored to an atomically counted control block.

use alloc::boxed::Box;
use core::mem;
use core::ops::Deref;
use core::ptr;

use crate::block::{ControlBlock, destroy_boxed, null_data};
use crate::cast::Upcast;
use crate::raw::RawHandle;
use crate::unique::Unique;
use crate::weak::HandleRef;

/// Strong owning handle over a shared heap value.
///
/// Use [Handle<T>] when multiple parts of the system need shared ownership of
/// a value. All copies of a handle share one control block; cloning
/// increments the strong count and the value is destroyed exactly once, when
/// the count returns to zero. Destruction runs the deleter recorded for the
/// concrete type at first wrap, so a `Handle<dyn Trait>` built with
/// [Handle::upcast] tears down the whole concrete value.
///
/// Key guarantees and semantics:
/// - Call [Handle::create_ref] to derive a non-owning [HandleRef<T>] suitable
///   for parent pointers and other back-references.
/// - Distinct handle instances may be cloned, dropped, and reset from
///   arbitrary threads concurrently. One *instance* must not be mutated from
///   two threads at once.
/// - Equality, ordering, and hashing follow the underlying address, not the
///   control block.
pub struct Handle<T: ?Sized> {
    ptr: *mut T,
    core: *mut ControlBlock,
}

unsafe impl<T: ?Sized + Send + Sync> Send for Handle<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for Handle<T> {}

impl<T> Handle<T> {
    /// Allocate `value` and wrap it with a fresh control block.
    pub fn new(value: T) -> Self {
        let ptr = Box::into_raw(Box::new(value));
        Self {
            ptr,
            core: ControlBlock::allocate(ptr as *mut (), destroy_boxed::<T>),
        }
    }

    /// Adopt a raw allocation, wrapping it with a fresh control block.
    ///
    /// # Safety
    /// `ptr` must come from [Box::into_raw] (or be null) and must not be
    /// owned by anything else.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        if ptr.is_null() {
            return Self::empty();
        }
        Self {
            ptr,
            core: ControlBlock::allocate(ptr as *mut (), destroy_boxed::<T>),
        }
    }

    /// Handle that owns nothing.
    pub const fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            core: ptr::null_mut(),
        }
    }
}

impl<T: ?Sized> Handle<T> {
    /// Allocate a concrete `value` and share it through the wider declared
    /// type `T`. The deleter recorded in the control block targets the
    /// concrete type.
    pub fn upcast<C: Upcast<T>>(value: C) -> Self {
        let concrete = Box::into_raw(Box::new(value));
        Self {
            ptr: <C as Upcast<T>>::upcast_ptr(concrete),
            core: ControlBlock::allocate(concrete as *mut (), destroy_boxed::<C>),
        }
    }

    pub(crate) fn from_parts(ptr: *mut T, core: *mut ControlBlock) -> Self {
        Self { ptr, core }
    }

    fn core(&self) -> Option<&ControlBlock> {
        unsafe { self.core.as_ref() }
    }

    /// Create a non-owning [HandleRef<T>] that refers to the same value.
    ///
    /// The returned observer does not keep the value alive and must be
    /// promoted with [HandleRef::lock] or [HandleRef::upgrade] before use.
    pub fn create_ref(&self) -> HandleRef<T> {
        if let Some(core) = self.core() {
            core.increment_weak();
        }
        HandleRef::from_parts(self.ptr, self.core)
    }

    /// Number of owning handles sharing this value. Zero for an empty handle.
    pub fn ref_count(&self) -> u32 {
        self.core().map_or(0, ControlBlock::strong_count)
    }

    /// Number of observers derived from this family of handles.
    pub fn weak_count(&self) -> u32 {
        self.core().map_or(0, ControlBlock::weak_count)
    }

    /// Whether this is the only owning handle.
    pub fn is_unique(&self) -> bool {
        self.ref_count() == 1
    }

    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null()
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr
    }

    pub fn get(&self) -> Option<&T> {
        if self.ptr.is_null() {
            None
        } else {
            Some(unsafe { &*self.ptr })
        }
    }

    /// Mutable access, granted only while no other owner and no observer
    /// could also reach the value.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        let sole_reacher = match self.core() {
            Some(core) => core.strong_count() == 1 && core.weak_count() == 0,
            None => false,
        };
        if sole_reacher && !self.ptr.is_null() {
            Some(unsafe { &mut *self.ptr })
        } else {
            None
        }
    }

    /// Access without the emptiness check.
    ///
    /// # Safety
    /// The handle must be valid.
    pub unsafe fn get_unchecked(&self) -> &T {
        unsafe { &*self.ptr }
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Drop this handle's ownership, leaving it empty.
    pub fn reset(&mut self) {
        let empty = Self {
            ptr: null_data(self.ptr),
            core: ptr::null_mut(),
        };
        drop(mem::replace(self, empty));
    }

    /// Detach from the automatic protocol without decrementing.
    ///
    /// The returned [RawHandle<T>] carries the owning count this handle held;
    /// the caller is responsible for eventually releasing it, either through
    /// [RawHandle::decrement_strong] or by re-adopting it with
    /// [RawHandle::into_handle].
    pub fn release(self) -> RawHandle<T> {
        let raw = RawHandle::from_parts(self.ptr, self.core);
        mem::forget(self);
        raw
    }

    /// Non-detaching [RawHandle<T>] view. No count traffic.
    pub fn raw_handle(&self) -> RawHandle<T> {
        RawHandle::from_parts(self.ptr, self.core)
    }

    /// Handle to a part of the owned value, sharing this handle's control
    /// block and deleter. The whole value stays alive as long as the
    /// projected handle exists.
    pub fn project<U: ?Sized, F: FnOnce(&T) -> &U>(&self, select: F) -> Handle<U> {
        let value = self.get().expect("projected an empty Handle");
        let part = select(value) as *const U as *mut U;
        unsafe { self.alias(part) }
    }

    /// Alias construction: install `ptr` as the referenced address while
    /// sharing this handle's control block and deleter. Increments the strong
    /// count.
    ///
    /// # Safety
    /// `ptr` must stay valid for as long as the control block keeps the
    /// underlying resource alive, or must never be dereferenced.
    pub unsafe fn alias<U: ?Sized>(&self, ptr: *mut U) -> Handle<U> {
        match self.core() {
            Some(core) => {
                core.increment_strong();
                Handle {
                    ptr,
                    core: self.core,
                }
            }
            None => Handle {
                ptr: null_data(ptr),
                core: ptr::null_mut(),
            },
        }
    }

    /// Consuming variant of [Handle::alias]: steals this handle's owning
    /// count instead of taking a new one.
    ///
    /// # Safety
    /// Same contract as [Handle::alias].
    pub unsafe fn alias_move<U: ?Sized>(self, ptr: *mut U) -> Handle<U> {
        let core = self.core;
        mem::forget(self);
        if core.is_null() {
            return Handle {
                ptr: null_data(ptr),
                core,
            };
        }
        Handle { ptr, core }
    }
}

impl<T: ?Sized> Clone for Handle<T> {
    /// Copying shares the control block and increments the strong count.
    fn clone(&self) -> Self {
        if let Some(core) = self.core() {
            core.increment_strong();
        }
        Self {
            ptr: self.ptr,
            core: self.core,
        }
    }
}

impl<T: ?Sized> Drop for Handle<T> {
    fn drop(&mut self) {
        if !self.core.is_null() {
            unsafe { ControlBlock::release_strong(self.core) };
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get().expect("dereferenced an empty Handle")
    }
}

impl<T> From<T> for Handle<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized> From<Unique<T>> for Handle<T> {
    /// Convert sole ownership into shared ownership. The deleter captured at
    /// construction migrates into the fresh control block.
    fn from(sole: Unique<T>) -> Self {
        let (ptr, target, destroy) = sole.into_parts();
        if target.is_null() {
            return Self {
                ptr: null_data(ptr),
                core: ptr::null_mut(),
            };
        }
        Self {
            ptr,
            core: ControlBlock::allocate(target, destroy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    struct Probe {
        drops: &'static AtomicU32,
        value: u64,
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
    fn clone_and_drop_move_the_count() {
        let drops = drop_counter();
        let original = Handle::new(Probe { drops, value: 9 });
        assert_eq!(original.ref_count(), 1);
        assert!(original.is_unique());
        let copy = original.clone();
        assert_eq!(original.ref_count(), 2);
        assert!(!original.is_unique());
        assert_eq!(copy.value, 9);
        drop(copy);
        assert_eq!(original.ref_count(), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(original);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_behaves_like_a_drop() {
        let drops = drop_counter();
        let mut original = Handle::new(Probe { drops, value: 0 });
        let copy = original.clone();
        original.reset();
        assert!(!original.is_valid());
        assert_eq!(original.ref_count(), 0);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(copy);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_mut_requires_sole_reach() {
        let mut shared = Handle::new(5u32);
        assert!(shared.get_mut().is_some());

        let copy = shared.clone();
        assert!(shared.get_mut().is_none());
        drop(copy);
        assert!(shared.get_mut().is_some());

        let observer = shared.create_ref();
        assert!(shared.get_mut().is_none());
        drop(observer);
        *shared.get_mut().unwrap() = 6;
        assert_eq!(*shared, 6);
    }

    #[test]
    fn projection_keeps_the_whole_value_alive() {
        struct Pair {
            left: Probe,
            right: u16,
        }

        let drops = drop_counter();
        let pair = Handle::new(Pair {
            left: Probe { drops, value: 1 },
            right: 7,
        });
        let right: Handle<u16> = pair.project(|p| &p.right);
        assert_eq!(pair.ref_count(), 2);
        drop(pair);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(*right, 7);
        drop(right);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sole_ownership_converts_into_shared() {
        let drops = drop_counter();
        let sole = Unique::new(Probe { drops, value: 3 });
        let shared: Handle<Probe> = sole.into();
        assert_eq!(shared.ref_count(), 1);
        assert_eq!(shared.value, 3);
        drop(shared);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_handles_answer_queries() {
        let empty = Handle::<u32>::empty();
        assert!(!empty.is_valid());
        assert_eq!(empty.ref_count(), 0);
        assert_eq!(empty.weak_count(), 0);
        assert!(empty.get().is_none());
        let copy = empty.clone();
        assert!(!copy.is_valid());
    }

    #[test]
    #[should_panic(expected = "empty Handle")]
    fn empty_dereference_panics() {
        let empty = Handle::<u32>::empty();
        let _ = *empty;
    }
}
