//! Re-typing operations over [Handle<T>] that keep the control block and
//! deleter shared.
//!
//! Each cast exists in a borrowing form, which takes a fresh owning count via
//! alias construction, and a consuming `_into` form, which steals the input
//! handle's count without touching the counters.

use core::any::Any;
use core::cell::UnsafeCell;
use core::ptr;

use crate::shared::Handle;

/// Capability declaring that a pointer to `Self` may be widened to a pointer
/// to `B` without moving the object.
///
/// Implement it with [impl_upcast!](crate::impl_upcast) rather than by hand.
/// Every type trivially widens to itself.
///
/// # Safety
/// `upcast_ptr` must return the address of the same object, re-typed; it must
/// not allocate, offset, or fabricate pointers.
pub unsafe trait Upcast<B: ?Sized> {
    fn upcast_ptr(ptr: *mut Self) -> *mut B;
}

unsafe impl<T: ?Sized> Upcast<T> for T {
    fn upcast_ptr(ptr: *mut Self) -> *mut T {
        ptr
    }
}

/// Bridge from any handle-managed value to [dyn Any], so checked casts can
/// interrogate the concrete type. Base traits meant to support
/// [dynamic_cast] declare it as a supertrait: `trait Shape: AsAny { .. }`.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Identity-preserving re-typing along a declared [Upcast] capability.
/// Shares the control block and takes a fresh owning count.
pub fn static_cast<U: ?Sized, T: ?Sized + Upcast<U>>(handle: &Handle<T>) -> Handle<U> {
    let ptr = <T as Upcast<U>>::upcast_ptr(handle.as_ptr());
    unsafe { handle.alias(ptr) }
}

/// Consuming form of [static_cast]: steals the input's owning count.
pub fn static_cast_into<U: ?Sized, T: ?Sized + Upcast<U>>(handle: Handle<T>) -> Handle<U> {
    let ptr = <T as Upcast<U>>::upcast_ptr(handle.as_ptr());
    unsafe { handle.alias_move(ptr) }
}

fn checked_target<U: Any, T: ?Sized + AsAny>(handle: &Handle<T>) -> *mut U {
    match handle.get() {
        Some(value) if value.as_any().is::<U>() => handle.as_ptr() as *mut U,
        _ => ptr::null_mut(),
    }
}

/// Re-typing validated against the concrete type of the managed value.
///
/// A failed check returns a handle with a null resource pointer that still
/// shares the control block and holds an owning count: the original value
/// stays alive until the returned handle is dropped, even though the handle
/// itself grants no access.
pub fn dynamic_cast<U: Any, T: ?Sized + AsAny>(handle: &Handle<T>) -> Handle<U> {
    let ptr = checked_target::<U, T>(handle);
    unsafe { handle.alias(ptr) }
}

/// Consuming form of [dynamic_cast]. A failed check yields a null-pointer
/// handle that keeps the stolen owning count, pinning the value exactly like
/// the borrowing form.
pub fn dynamic_cast_into<U: Any, T: ?Sized + AsAny>(handle: Handle<T>) -> Handle<U> {
    let ptr = checked_target::<U, T>(handle);
    unsafe { handle.alias_move(ptr) }
}

/// Reinterpret the referenced address as a value of an arbitrary type.
///
/// # Safety
/// Any later access through the result must be valid for `U` at that
/// address: size, alignment, and validity of the bytes are entirely the
/// caller's claim.
pub unsafe fn reinterpret_cast<U, T: ?Sized>(handle: &Handle<T>) -> Handle<U> {
    unsafe { handle.alias(handle.as_ptr() as *mut U) }
}

/// Consuming form of [reinterpret_cast].
///
/// # Safety
/// Same contract as [reinterpret_cast].
pub unsafe fn reinterpret_cast_into<U, T: ?Sized>(handle: Handle<T>) -> Handle<U> {
    let ptr = handle.as_ptr() as *mut U;
    unsafe { handle.alias_move(ptr) }
}

/// Re-type a shared value as interior-mutable, regaining write access to an
/// allocation that is otherwise only readable through its handles.
///
/// # Safety
/// The caller must guarantee no other access to the value overlaps any write
/// performed through the returned handle.
pub unsafe fn const_cast<T>(handle: &Handle<T>) -> Handle<UnsafeCell<T>> {
    unsafe { reinterpret_cast(handle) }
}

/// Consuming form of [const_cast].
///
/// # Safety
/// Same contract as [const_cast].
pub unsafe fn const_cast_into<T>(handle: Handle<T>) -> Handle<UnsafeCell<T>> {
    unsafe { reinterpret_cast_into(handle) }
}
