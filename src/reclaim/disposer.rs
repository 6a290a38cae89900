/// The Action performed on a retired Ptr once it is safe to reclaim it.
///
/// The Disposer is consumed when it runs, so a Reclamation-Scheme can never invoke it twice.
///
/// # Example
/// ```rust
/// # use lfcds::reclaim::Disposer;
/// let ptr = Box::into_raw(Box::new(13u64));
///
/// let disposer = |ptr: *mut u64| {
///     drop(unsafe { Box::from_raw(ptr) });
/// };
/// unsafe { disposer.dispose(ptr) };
/// ```
pub trait Disposer<T>: Send + 'static {
    /// Reclaims the given Ptr
    ///
    /// # Safety
    /// The Ptr must be the one that was retired together with this Disposer and no other Thread
    /// is allowed to still access the Data behind it
    unsafe fn dispose(self, ptr: *mut T);
}

impl<T, F> Disposer<T> for F
where
    F: FnOnce(*mut T) + Send + 'static,
{
    unsafe fn dispose(self, ptr: *mut T) {
        self(ptr)
    }
}

/// A Disposer for Ptrs that were obtained by calling [`Box::into_raw`], which simply turns it
/// back into a Box and drops it
#[derive(Debug, Clone, Copy, Default)]
pub struct DropBox;

impl<T> Disposer<T> for DropBox {
    unsafe fn dispose(self, ptr: *mut T) {
        drop(unsafe { Box::from_raw(ptr) });
    }
}
