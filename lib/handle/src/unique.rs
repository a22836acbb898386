//! Exclusive (move-only) owning handle.

use alloc::boxed::Box;
use core::mem;
use core::ops::{Deref, DerefMut};
use core::ptr;

use crate::block::{destroy_boxed, destroy_nothing, null_data};
use crate::cast::Upcast;

/// Sole owner of a heap value.
///
/// A [Unique<T>] has no control block and no sharing; it deletes its value
/// when dropped or [reset](Unique::reset). Transferring ownership is a move,
/// which leaves nothing behind in the source. Use [Unique::upcast] to own a
/// concrete value through a wider declared type; deletion still runs on the
/// concrete type recorded at construction.
pub struct Unique<T: ?Sized> {
    ptr: *mut T,
    /// Concrete-object address fed to `destroy`. Null once ownership is gone.
    target: *mut (),
    destroy: unsafe fn(*mut ()),
}

unsafe impl<T: ?Sized + Send> Send for Unique<T> {}
unsafe impl<T: ?Sized + Sync> Sync for Unique<T> {}

impl<T> Unique<T> {
    /// Allocate `value` and take sole ownership of it.
    pub fn new(value: T) -> Self {
        let ptr = Box::into_raw(Box::new(value));
        Self {
            ptr,
            target: ptr as *mut (),
            destroy: destroy_boxed::<T>,
        }
    }

    /// Adopt a raw allocation.
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
            target: ptr as *mut (),
            destroy: destroy_boxed::<T>,
        }
    }

    /// Handle that owns nothing.
    pub const fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            target: ptr::null_mut(),
            destroy: destroy_nothing,
        }
    }
}

impl<T: ?Sized> Unique<T> {
    /// Allocate a concrete `value` and own it through the wider declared type
    /// `T`. Dropping the handle destroys the full concrete value, not just
    /// the part `T` can see.
    pub fn upcast<C: Upcast<T>>(value: C) -> Self {
        let concrete = Box::into_raw(Box::new(value));
        Self {
            ptr: <C as Upcast<T>>::upcast_ptr(concrete),
            target: concrete as *mut (),
            destroy: destroy_boxed::<C>,
        }
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

    pub fn get_mut(&mut self) -> Option<&mut T> {
        if self.ptr.is_null() {
            None
        } else {
            Some(unsafe { &mut *self.ptr })
        }
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Destroy the owned value, leaving the handle empty.
    pub fn reset(&mut self) {
        if !self.target.is_null() {
            unsafe { (self.destroy)(self.target) };
        }
        self.ptr = null_data(self.ptr);
        self.target = ptr::null_mut();
    }

    /// Relinquish ownership without destroying the value.
    ///
    /// The caller becomes responsible for the allocation. The returned
    /// pointer carries the declared type: an owner built with
    /// [Unique::upcast] hands back the widened view of the concrete value.
    pub fn release(&mut self) -> *mut T {
        let released = self.ptr;
        self.ptr = null_data(self.ptr);
        self.target = ptr::null_mut();
        released
    }

    pub(crate) fn into_parts(self) -> (*mut T, *mut (), unsafe fn(*mut ())) {
        let parts = (self.ptr, self.target, self.destroy);
        mem::forget(self);
        parts
    }
}

impl<T> Default for Unique<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Deref for Unique<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get().expect("dereferenced an empty Unique")
    }
}

impl<T: ?Sized> DerefMut for Unique<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut().expect("dereferenced an empty Unique")
    }
}

impl<T: ?Sized> Drop for Unique<T> {
    fn drop(&mut self) {
        if !self.target.is_null() {
            unsafe { (self.destroy)(self.target) };
        }
    }
}
