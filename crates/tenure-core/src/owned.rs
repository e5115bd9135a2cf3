//! Move-only owning handle.
//!
//! [`Owned`] holds at most one resource together with the deleter that
//! releases it. The slot is either empty or owning; across every handle
//! that ever owned a given resource, the deleter fires exactly once, or
//! zero times if ownership left through [`Owned::release`].

use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use crate::deleter::{BoxDeleter, Deleter};
use crate::factory;

/// Exclusive-ownership handle over a single resource.
///
/// Ownership transfers only by move; the type implements neither `Copy`
/// nor `Clone`, so duplicating a handle is rejected at compile time:
///
/// ```compile_fail
/// let first = tenure_core::factory::new(1u32);
/// let second: tenure_core::Owned<u32> = Clone::clone(&first);
/// ```
pub struct Owned<T, D: Deleter<T> = BoxDeleter> {
    slot: Option<NonNull<T>>,
    deleter: D,
    _owns: PhantomData<T>,
}

// A handle may be relocated to another thread when its resource and deleter
// may; concurrent use of one instance is out of contract.
unsafe impl<T: Send, D: Deleter<T> + Send> Send for Owned<T, D> {}

impl<T> Owned<T> {
    /// Adopt `ptr` under the default single-object deleter.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated with the layout of `T` on the global
    /// allocator (`Box::into_raw` or this crate's factory) and no other
    /// owner may remain.
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        unsafe { Self::from_raw_with(ptr, BoxDeleter) }
    }

    /// An empty handle with the default deleter.
    pub fn empty() -> Self {
        Self::empty_with(BoxDeleter)
    }

    /// Release the current resource (if any), then own a freshly allocated
    /// `value`.
    pub fn replace(&mut self, value: T) {
        *self = factory::new(value);
    }
}

impl<T, D: Deleter<T>> Owned<T, D> {
    /// Adopt `ptr`, to be released by `deleter`.
    ///
    /// No allocation happens here; the handle takes ownership immediately.
    ///
    /// # Safety
    ///
    /// `ptr` must reference a live resource acquired through the path
    /// `deleter` releases, and no other owner may remain.
    pub unsafe fn from_raw_with(ptr: NonNull<T>, deleter: D) -> Self {
        Self {
            slot: Some(ptr),
            deleter,
            _owns: PhantomData,
        }
    }

    /// An empty handle carrying `deleter` for later adoption.
    pub fn empty_with(deleter: D) -> Self {
        Self {
            slot: None,
            deleter,
            _owns: PhantomData,
        }
    }

    /// `true` when no resource is owned.
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Borrow the resource, or `None` when the handle is empty.
    pub fn get(&self) -> Option<&T> {
        // Owning slots always reference a live resource.
        self.slot.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Mutably borrow the resource, or `None` when the handle is empty.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.slot.map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    /// Raw view of the resource; null when the handle is empty.
    ///
    /// The pointer carries no ownership and must not outlive the handle.
    pub fn as_ptr(&self) -> *const T {
        self.slot
            .map_or(core::ptr::null(), |ptr| ptr.as_ptr().cast_const())
    }

    /// Mutable raw view of the resource; null when the handle is empty.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.slot.map_or(core::ptr::null_mut(), NonNull::as_ptr)
    }

    /// Give up ownership without running the deleter.
    ///
    /// The caller receives the raw resource and becomes responsible for
    /// exactly one release; the handle is left empty.
    #[must_use = "the caller now owns the resource and must release it"]
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.slot.take()
    }

    /// Release the current resource, if any; the handle becomes empty.
    pub fn reset(&mut self) {
        if let Some(ptr) = self.slot.take() {
            unsafe { self.deleter.release(ptr) };
        }
    }

    /// Release the current resource, then adopt `ptr`.
    ///
    /// The old resource is released before the new one is adopted, also
    /// when the handle was empty (in which case nothing is released).
    ///
    /// # Safety
    ///
    /// Same contract as [`Owned::from_raw_with`] for `ptr` against the
    /// deleter already carried by this handle.
    pub unsafe fn reset_raw(&mut self, ptr: NonNull<T>) {
        self.reset();
        self.slot = Some(ptr);
    }

    /// Access the deleter carried by this handle.
    pub fn deleter(&self) -> &D {
        &self.deleter
    }
}

impl<T, D: Deleter<T>> Deref for Owned<T, D> {
    type Target = T;

    /// Panics when the handle is empty. Callers check [`Owned::is_empty`]
    /// (or use [`Owned::get`]) first; an empty dereference is a fatal
    /// precondition failure, never silently tolerated.
    fn deref(&self) -> &T {
        self.get().expect("dereferenced an empty handle")
    }
}

impl<T, D: Deleter<T>> DerefMut for Owned<T, D> {
    /// Panics when the handle is empty; see [`Deref`].
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut().expect("dereferenced an empty handle")
    }
}

impl<T, D: Deleter<T>> Drop for Owned<T, D> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T, D: Deleter<T>> fmt::Debug for Owned<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("ptr", &self.as_ptr())
            .finish()
    }
}

impl<T> Default for Owned<T> {
    fn default() -> Self {
        Self::empty()
    }
}
