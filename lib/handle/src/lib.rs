#![no_std]
//! Intrusive reference-counted ownership handles for heap resources.
//!
//! Provide three complementary handle kinds around one heap-allocated value:
//! - [Unique<T>] is the sole owner. It is move-only and deletes the value when
//!   dropped or reset.
//! - [Handle<T>] shares ownership. A family of handles is anchored to one
//!   atomically counted control block, and the value is destroyed exactly
//!   once, when the last owner lets go.
//! - [HandleRef<T>] observes without owning. It can attempt to promote itself
//!   back to a [Handle<T>] with [HandleRef::lock], which yields an empty
//!   handle once all owners are gone.
//!
//! Key guarantees and semantics:
//! - The deleter is recorded from the concrete type at the point the value is
//!   first wrapped, so a handle declared for a base trait destroys the full
//!   concrete value without virtual dispatch. See [Upcast] and [impl_upcast!].
//! - Counter traffic is safe from arbitrary threads as long as each thread
//!   works on its own handle instance. Mutating a *single* handle instance
//!   from several threads at once is not synchronized.
//! - Back-references between shared values must use [HandleRef<T>]; two
//!   [Handle<T>] values owning each other keep both alive forever.
//!
//! The cast operations ([static_cast], [dynamic_cast], [reinterpret_cast],
//! [const_cast]) re-type a [Handle<T>] while keeping the control block and
//! deleter shared. [RawHandle<T>] exposes the counting protocol directly for
//! code that manages ownership by hand.

extern crate alloc;
#[cfg(test)]
extern crate std;

mod block;
mod cast;
mod macros;
mod raw;
mod shared;
mod unique;
mod weak;

pub use cast::{
    AsAny, Upcast, const_cast, const_cast_into, dynamic_cast, dynamic_cast_into, reinterpret_cast,
    reinterpret_cast_into, static_cast, static_cast_into,
};
pub use raw::RawHandle;
pub use shared::Handle;
pub use unique::Unique;
pub use weak::HandleRef;
