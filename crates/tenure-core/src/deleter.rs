//! Release strategies for owned resources.
//!
//! A deleter is the capability invoked exactly once to release a resource.
//! One shape exists per acquisition path: a single heap object
//! ([`BoxDeleter`]), an array of elements ([`SliceDeleter`]), and a raw
//! block obtained outside the default allocation path ([`BlockDeleter`]).
//! [`FnDeleter`] wraps an arbitrary routine supplied by the caller, so the
//! handle stays acquisition-agnostic.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::factory;

/// Releases the resource behind a pointer.
pub trait Deleter<T> {
    /// Release the resource behind `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must reference a live resource acquired through the path this
    /// deleter matches, the caller must hold exclusive ownership of it, and
    /// the resource must not be used afterwards. At most one call per
    /// resource.
    unsafe fn release(&mut self, ptr: NonNull<T>);
}

/// Default strategy for a single heap object allocated like a `Box`.
///
/// Stateless; adds no storage to the handle that carries it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoxDeleter;

impl<T> Deleter<T> for BoxDeleter {
    unsafe fn release(&mut self, ptr: NonNull<T>) {
        unsafe {
            ptr.as_ptr().drop_in_place();
            factory::dealloc_raw(ptr.cast::<u8>(), Layout::new::<T>());
        }
    }
}

/// Array strategy: releases `len` contiguous elements starting at the
/// pointed-to address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceDeleter {
    len: usize,
}

impl SliceDeleter {
    /// Strategy for an array of `len` elements.
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    /// Number of elements released by this strategy.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when the strategy covers no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Deleter<T> for SliceDeleter {
    unsafe fn release(&mut self, ptr: NonNull<T>) {
        // The layout was valid when the array was allocated, so rebuilding
        // it here cannot overflow.
        let layout = Layout::array::<T>(self.len).expect("array layout");
        unsafe {
            let slice = core::ptr::slice_from_raw_parts_mut(ptr.as_ptr(), self.len);
            slice.drop_in_place();
            factory::dealloc_raw(ptr.cast::<u8>(), layout);
        }
    }
}

/// Raw-block strategy for memory acquired through a non-default path.
///
/// Carries the layout the block was acquired with and hands it back
/// verbatim; the block's contents are not dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockDeleter {
    layout: Layout,
}

impl BlockDeleter {
    /// Strategy returning a block of exactly `layout` to the allocator.
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Layout released by this strategy.
    pub fn layout(&self) -> Layout {
        self.layout
    }
}

impl Deleter<u8> for BlockDeleter {
    unsafe fn release(&mut self, ptr: NonNull<u8>) {
        unsafe { factory::dealloc_raw(ptr, self.layout) };
    }
}

/// Strategy wrapping an arbitrary release routine.
///
/// The routine is injected at handle construction and travels with the
/// handle; it runs at most once.
#[derive(Clone, Copy, Debug)]
pub struct FnDeleter<F>(F);

impl<F> FnDeleter<F> {
    /// Wrap `release` as a deleter.
    pub fn new(release: F) -> Self {
        Self(release)
    }
}

impl<T, F: FnMut(NonNull<T>)> Deleter<T> for FnDeleter<F> {
    unsafe fn release(&mut self, ptr: NonNull<T>) {
        (self.0)(ptr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Owned;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn default_strategy_adds_no_storage() {
        assert_eq!(size_of::<BoxDeleter>(), 0);
        // The empty slot is folded into the pointer's niche.
        assert_eq!(size_of::<Owned<u64>>(), size_of::<*const u64>());
    }

    #[test]
    fn fn_deleter_runs_injected_routine() {
        let released = Rc::new(Cell::new(0));
        let probe = Rc::clone(&released);
        let raw = NonNull::from(Box::leak(Box::new(3u8)));
        let handle = unsafe {
            Owned::from_raw_with(
                raw,
                FnDeleter::new(move |ptr: NonNull<u8>| {
                    probe.set(probe.get() + 1);
                    drop(unsafe { Box::from_raw(ptr.as_ptr()) });
                }),
            )
        };
        drop(handle);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn slice_deleter_reports_length() {
        let deleter = SliceDeleter::new(4);
        assert_eq!(deleter.len(), 4);
        assert!(!deleter.is_empty());
        assert!(SliceDeleter::new(0).is_empty());
    }
}
