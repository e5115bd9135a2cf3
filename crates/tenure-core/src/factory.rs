//! Constructive factory.
//!
//! Couples allocation, construction, and handle creation so that a failed
//! construction can never leak its storage: every byte acquired here is
//! either owned by the returned handle or already back with the allocator
//! when the failure propagates.
//!
//! All storage flows through one acquire/release pair, and [`stats`] keeps
//! a live count of the bytes between the two.

use core::alloc::Layout;
use core::convert::Infallible;
use core::ptr::NonNull;
use std::alloc;

use crate::deleter::{BlockDeleter, SliceDeleter};
use crate::owned::Owned;

pub mod stats {
    //! Live accounting of factory-acquired memory.

    use core::sync::atomic::{AtomicUsize, Ordering};

    static OUTSTANDING: AtomicUsize = AtomicUsize::new(0);

    /// Bytes currently acquired by the factory and not yet released.
    ///
    /// Handles adopted from foreign pointers via `Owned::from_raw` are not
    /// counted; their release is absorbed without underflow.
    pub fn outstanding_bytes() -> usize {
        OUTSTANDING.load(Ordering::Relaxed)
    }

    pub(crate) fn on_acquire(bytes: usize) {
        OUTSTANDING.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn on_release(bytes: usize) {
        let _ = OUTSTANDING.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |live| {
            Some(live.saturating_sub(bytes))
        });
    }
}

/// Acquire `layout` from the global allocator and record it.
///
/// `layout` must have a non-zero size; zero-sized resources never reach the
/// allocator.
fn alloc_raw(layout: Layout) -> Option<NonNull<u8>> {
    debug_assert!(layout.size() > 0);
    let raw = unsafe { alloc::alloc(layout) };
    let ptr = NonNull::new(raw)?;
    stats::on_acquire(layout.size());
    Some(ptr)
}

/// Return `ptr` to the global allocator and record the release.
///
/// # Safety
///
/// `ptr` must have been allocated on the global allocator with exactly
/// `layout`, and must not be used afterwards.
pub(crate) unsafe fn dealloc_raw(ptr: NonNull<u8>, layout: Layout) {
    if layout.size() == 0 {
        return;
    }
    stats::on_release(layout.size());
    unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
}

/// Returns the storage to the allocator unless defused; keeps an unwinding
/// constructor from leaking the allocation.
struct AllocGuard {
    raw: NonNull<u8>,
    layout: Layout,
}

impl Drop for AllocGuard {
    fn drop(&mut self) {
        unsafe { dealloc_raw(self.raw, self.layout) };
    }
}

/// Allocate storage for one `T` and move `value` into it.
///
/// Exactly one allocation per call; `value` is relocated, never copied.
pub fn new<T>(value: T) -> Owned<T> {
    match try_new::<T, Infallible>(|| Ok(value)) {
        Ok(handle) => handle,
        Err(never) => match never {},
    }
}

/// Allocate storage for one `T`, run `build`, and wrap the result.
///
/// If `build` returns an error or unwinds, the just-allocated storage is
/// released before the failure propagates; no partially-constructed or
/// leaked allocation escapes this call.
pub fn try_new<T, E>(build: impl FnOnce() -> Result<T, E>) -> Result<Owned<T>, E> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        // Zero-sized resources occupy no storage; a dangling, aligned
        // address stands in for the allocation.
        let ptr = NonNull::<T>::dangling();
        unsafe {
            ptr.as_ptr().write(build()?);
            return Ok(Owned::from_raw(ptr));
        }
    }

    let Some(raw) = alloc_raw(layout) else {
        alloc::handle_alloc_error(layout);
    };
    let guard = AllocGuard { raw, layout };
    let value = match build() {
        Ok(value) => value,
        Err(err) => {
            // Storage goes back before the error leaves the factory.
            drop(guard);
            return Err(err);
        }
    };
    core::mem::forget(guard);

    let ptr = raw.cast::<T>();
    unsafe {
        ptr.as_ptr().write(value);
        Ok(Owned::from_raw(ptr))
    }
}

/// Adopt the elements of `vec` as an owned array.
///
/// The storage is re-recorded under factory accounting and released through
/// a [`SliceDeleter`] of matching length.
pub fn from_vec<T>(vec: Vec<T>) -> Owned<T, SliceDeleter> {
    let boxed: Box<[T]> = vec.into_boxed_slice();
    let len = boxed.len();
    if size_of::<T>() != 0 && len != 0 {
        stats::on_acquire(size_of::<T>() * len);
    }
    let raw = Box::into_raw(boxed) as *mut T;
    // Box pointers are never null, dangling at worst for empty slices.
    let ptr = unsafe { NonNull::new_unchecked(raw) };
    unsafe { Owned::from_raw_with(ptr, SliceDeleter::new(len)) }
}

/// Acquire a zeroed raw block of `size` bytes.
///
/// The block is aligned for `u32` access and released through a
/// [`BlockDeleter`] carrying its exact layout. Returns `None` when `size`
/// is zero, unrepresentable, or refused by the allocator.
pub fn alloc_block(size: usize) -> Option<Owned<u8, BlockDeleter>> {
    if size == 0 {
        return None;
    }
    let layout = Layout::from_size_align(size, align_of::<u32>()).ok()?;
    let raw = unsafe { alloc::alloc_zeroed(layout) };
    let ptr = NonNull::new(raw)?;
    stats::on_acquire(size);
    Some(unsafe { Owned::from_raw_with(ptr, BlockDeleter::new(layout)) })
}
