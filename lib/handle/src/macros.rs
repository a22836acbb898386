//! Macro helpers: lifecycle tracing, upcast capability impls, and the
//! address-based comparison matrix shared by every handle kind.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::{Handle, HandleRef, RawHandle, Unique};

/// Trace-level lifecycle logging,
/// only compiled in debug mode.
macro_rules! lifecycle_trace {
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            log::trace!(target: "handle", $($arg)+);
        }
    };
}
pub(crate) use lifecycle_trace;

/// Declare that a concrete type may be owned through a wider declared type.
///
/// `impl_upcast!(Circle => dyn Shape)` lets `Handle<dyn Shape>` and
/// `Unique<dyn Shape>` be constructed from a `Circle` value, and enables
/// [static_cast](crate::static_cast) from `Handle<Circle>` to
/// `Handle<dyn Shape>`.
#[macro_export]
macro_rules! impl_upcast {
    ($concrete:ty => $($wide:ty),+ $(,)?) => {
        $(
            unsafe impl $crate::Upcast<$wide> for $concrete {
                fn upcast_ptr(ptr: *mut Self) -> *mut $wide {
                    ptr
                }
            }
        )+
    };
}

/// Equality, ordering, hashing, and formatting for the handle kinds, all in
/// terms of the underlying thin address. Two handles with different control
/// blocks but equal addresses compare equal.
macro_rules! impl_address_cmp {
    ($($kind:ident),+ $(,)?) => {
        impl_address_cmp!(@rows ($($kind),+) ($($kind),+));
        $( impl_address_cmp!(@kind $kind); )+
    };
    (@rows ($($lhs:ident),+) $all:tt) => {
        $( impl_address_cmp!(@row $lhs $all); )+
    };
    (@row $lhs:ident ($($rhs:ident),+)) => {
        $( impl_address_cmp!(@pair $lhs $rhs); )+
    };
    (@pair $lhs:ident $rhs:ident) => {
        impl<T: ?Sized, U: ?Sized> PartialEq<$rhs<U>> for $lhs<T> {
            fn eq(&self, other: &$rhs<U>) -> bool {
                self.as_ptr() as *const () == other.as_ptr() as *const ()
            }
        }

        impl<T: ?Sized, U: ?Sized> PartialOrd<$rhs<U>> for $lhs<T> {
            fn partial_cmp(&self, other: &$rhs<U>) -> Option<Ordering> {
                (self.as_ptr() as *const ()).partial_cmp(&(other.as_ptr() as *const ()))
            }
        }
    };
    (@kind $kind:ident) => {
        impl<T: ?Sized, U: ?Sized> PartialEq<*mut U> for $kind<T> {
            fn eq(&self, other: &*mut U) -> bool {
                self.as_ptr() as *const () == *other as *const ()
            }
        }

        impl<T: ?Sized, U: ?Sized> PartialEq<*const U> for $kind<T> {
            fn eq(&self, other: &*const U) -> bool {
                self.as_ptr() as *const () == *other as *const ()
            }
        }

        impl<T: ?Sized, U: ?Sized> PartialOrd<*mut U> for $kind<T> {
            fn partial_cmp(&self, other: &*mut U) -> Option<Ordering> {
                (self.as_ptr() as *const ()).partial_cmp(&(*other as *const ()))
            }
        }

        impl<T: ?Sized, U: ?Sized> PartialOrd<*const U> for $kind<T> {
            fn partial_cmp(&self, other: &*const U) -> Option<Ordering> {
                (self.as_ptr() as *const ()).partial_cmp(&(*other as *const ()))
            }
        }

        impl<T: ?Sized> Eq for $kind<T> {}

        impl<T: ?Sized> Ord for $kind<T> {
            fn cmp(&self, other: &Self) -> Ordering {
                (self.as_ptr() as *const ()).cmp(&(other.as_ptr() as *const ()))
            }
        }

        impl<T: ?Sized> Hash for $kind<T> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                (self.as_ptr() as *const ()).hash(state);
            }
        }

        impl<T: ?Sized> fmt::Pointer for $kind<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Pointer::fmt(&self.as_ptr(), f)
            }
        }

        impl<T: ?Sized> fmt::Display for $kind<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Pointer::fmt(&self.as_ptr(), f)
            }
        }

        impl<T: ?Sized> fmt::Debug for $kind<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($kind), "({:p})"), self.as_ptr())
            }
        }
    };
}

impl_address_cmp!(Unique, Handle, HandleRef, RawHandle);
