//! Non-owning observer handle with conditional promotion.

use core::mem;
use core::ptr;

use crate::block::{ControlBlock, null_data};
use crate::macros::lifecycle_trace;
use crate::shared::Handle;

/// Weak (non-owning) handle over a shared heap value.
///
/// A [HandleRef<T>] refers to a value whose owners may drop it at any moment.
/// It never grants direct access: promote it with [HandleRef::lock] or
/// [HandleRef::upgrade] to regain an owning [Handle<T>] first. Observers are
/// counted separately from owners and may outlive the value; the control
/// block stays behind so expiration remains answerable.
///
/// Construct a [HandleRef<T>] from a [Handle<T>] via [Handle::create_ref], or
/// by cloning another observer. There is no construction from a raw pointer.
pub struct HandleRef<T: ?Sized> {
    ptr: *mut T,
    core: *mut ControlBlock,
}

unsafe impl<T: ?Sized + Send + Sync> Send for HandleRef<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for HandleRef<T> {}

impl<T> HandleRef<T> {
    /// Observer of nothing. Always expired.
    pub const fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            core: ptr::null_mut(),
        }
    }
}

impl<T: ?Sized> HandleRef<T> {
    pub(crate) fn from_parts(ptr: *mut T, core: *mut ControlBlock) -> Self {
        Self { ptr, core }
    }

    fn core(&self) -> Option<&ControlBlock> {
        unsafe { self.core.as_ref() }
    }

    /// Current number of owning handles for the observed value.
    pub fn ref_count(&self) -> u32 {
        self.core().map_or(0, ControlBlock::strong_count)
    }

    /// Whether the observed value has already been destroyed.
    pub fn expired(&self) -> bool {
        self.ref_count() == 0
    }

    /// Attempt to promote this observer into an owning [Handle<T>].
    ///
    /// Returns an empty handle if the owners are gone. The owning count is
    /// taken in one atomic step, so a promotion can never resurrect a value
    /// that a concurrent final drop is tearing down.
    pub fn lock(&self) -> Handle<T> {
        match self.core() {
            Some(core) if core.increment_strong_if_nonzero() => {
                Handle::from_parts(self.ptr, self.core)
            }
            Some(_) => {
                lifecycle_trace!("block {:p}: promotion failed, owners gone", self.core);
                Handle::from_parts(null_data(self.ptr), ptr::null_mut())
            }
            None => Handle::from_parts(null_data(self.ptr), ptr::null_mut()),
        }
    }

    /// Promote, reporting expiration as [None].
    ///
    /// **Consumers must handle the [None] case explicitly.**
    pub fn upgrade(&self) -> Option<Handle<T>> {
        let locked = self.lock();
        if locked.is_valid() { Some(locked) } else { None }
    }

    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null()
    }

    /// Last observed address. The value behind it must not be touched once
    /// the owners are gone; promote first.
    pub fn as_ptr(&self) -> *mut T {
        self.ptr
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Stop observing, leaving this handle empty.
    pub fn reset(&mut self) {
        let empty = Self {
            ptr: null_data(self.ptr),
            core: ptr::null_mut(),
        };
        drop(mem::replace(self, empty));
    }
}

impl<T: ?Sized> Clone for HandleRef<T> {
    fn clone(&self) -> Self {
        if let Some(core) = self.core() {
            core.increment_weak();
        }
        Self {
            ptr: self.ptr,
            core: self.core,
        }
    }
}

impl<T: ?Sized> Drop for HandleRef<T> {
    fn drop(&mut self) {
        if !self.core.is_null() {
            unsafe { ControlBlock::release_weak(self.core) };
        }
    }
}

impl<T> Default for HandleRef<T> {
    fn default() -> Self {
        Self::empty()
    }
}
