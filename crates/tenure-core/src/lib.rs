#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

//! Exclusive-ownership resource handles.
//!
//! [`Owned`] wraps exactly one resource and releases it exactly once through
//! an injected [`Deleter`]. The [`factory`] module couples allocation,
//! construction, and handle creation so construction failures cannot leak
//! storage.

mod deleter;
mod owned;

pub mod factory;

pub use deleter::{BlockDeleter, BoxDeleter, Deleter, FnDeleter, SliceDeleter};
pub use owned::Owned;

#[cfg(test)]
pub(crate) mod test_util {
    use std::sync::{Mutex, MutexGuard};

    /// Serializes tests that observe the factory's global byte accounting.
    pub(crate) fn stats_guard() -> MutexGuard<'static, ()> {
        static LOCK: Mutex<()> = Mutex::new(());
        LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
